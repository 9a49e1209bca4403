//! Search orchestration: tasks, their registry, and the per-task source pool.

pub mod manager;
pub mod pool;
pub mod registry;
pub mod task;

pub use manager::SearchManager;
pub use registry::{TaskEntry, TaskRegistry};
pub use task::{SourceFailure, SourceProgress, SourceState, Task, TaskSnapshot, TaskStatus};
