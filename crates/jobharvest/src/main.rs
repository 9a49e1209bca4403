use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use jobharvest::config::load_config_or_default;
use jobharvest::db::{job_repo, stats_repo, Database, JobQuery, SortField};
use jobharvest::logging::{init_tracing, LogFormat};
use jobharvest::sanitize::short_fingerprint;
use jobharvest::search::{ExperienceLevel, JobType, RemotePreference, SearchCriteria};
use jobharvest::{
    Config, DedupGate, HarvestError, RemoteKind, SearchManager, SourceRegistry, TaskSnapshot,
    TaskStatus,
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Conventional exit status for termination by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "jobharvest", version)]
#[command(about = "Search many job boards at once and keep one deduplicated store")]
struct Cli {
    /// Config file (default: ./jobharvest.json, then ~/.jobharvest/config.json)
    #[arg(short, long, global = true, env = "JOBHARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered sources and whether they can run
    Sources,

    /// Run a search across sources and store new postings
    Search(SearchArgs),

    /// Query stored postings
    Jobs(JobsArgs),

    /// Show store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Comma-separated keywords; empty means no keyword filter
    #[arg(short, long, default_value = "")]
    keywords: String,

    /// Comma-separated source ids (default: every available source)
    #[arg(short, long, value_delimiter = ',')]
    sources: Vec<String>,

    #[arg(short, long)]
    location: Option<String>,

    /// any, remote, on-site or hybrid
    #[arg(long, default_value = "any", value_parser = parse_remote)]
    remote: RemotePreference,

    #[arg(long, value_parser = parse_job_type)]
    job_type: Option<JobType>,

    #[arg(long, value_parser = parse_experience)]
    experience: Option<ExperienceLevel>,

    #[arg(long)]
    salary_min: Option<f64>,

    /// Per-source result cap, clamped to the configured bounds
    #[arg(short = 'n', long)]
    max_results: Option<u32>,

    /// Only postings from the last N days, where the source supports it
    #[arg(long)]
    days: Option<u32>,

    /// Print the final task snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct JobsArgs {
    /// Free-text filter over title, company, description, tags and location
    #[arg(short, long)]
    query: Option<String>,

    #[arg(short, long)]
    source: Option<String>,

    #[arg(long, value_parser = parse_remote_kind)]
    remote: Option<RemoteKind>,

    #[arg(long)]
    job_type: Option<String>,

    #[arg(long)]
    salary_min: Option<f64>,

    #[arg(long)]
    days: Option<u32>,

    /// date_posted, date_scraped, title, company, source, salary_min or salary_max
    #[arg(long, default_value = "date_posted", value_parser = parse_sort)]
    sort: SortField,

    #[arg(long)]
    asc: bool,

    #[arg(short = 'n', long, default_value_t = 20)]
    limit: u64,

    #[arg(long, default_value_t = 0)]
    offset: u64,

    #[arg(long)]
    json: bool,
}

fn parse_remote(s: &str) -> Result<RemotePreference, String> {
    RemotePreference::parse(s).ok_or_else(|| format!("unknown remote preference '{}'", s))
}

fn parse_remote_kind(s: &str) -> Result<RemoteKind, String> {
    match RemoteKind::parse(s) {
        RemoteKind::Unknown => Err(format!("unknown remote kind '{}'", s)),
        kind => Ok(kind),
    }
}

fn parse_job_type(s: &str) -> Result<JobType, String> {
    JobType::parse(s).ok_or_else(|| format!("unknown job type '{}'", s))
}

fn parse_experience(s: &str) -> Result<ExperienceLevel, String> {
    ExperienceLevel::parse(s).ok_or_else(|| format!("unknown experience level '{}'", s))
}

fn parse_sort(s: &str) -> Result<SortField, String> {
    SortField::parse(s).ok_or_else(|| format!("unknown sort field '{}'", s))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Text };
    if let Err(e) = init_tracing(&cli.log_level, format) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, HarvestError> {
    let config = load_config_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources => {
            let registry = SourceRegistry::with_builtin_sources(&config)?;
            println!("{:<12} {:<10} {:<6} AVAILABLE", "SOURCE", "KEY", "FREE");
            for s in registry.describe() {
                println!(
                    "{:<12} {:<10} {:<6} {}",
                    s.id,
                    if s.requires_key { "required" } else { "-" },
                    if s.is_free { "yes" } else { "no" },
                    if s.available { "yes" } else { "no" }
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search(args) => run_search(&config, args),
        Commands::Jobs(args) => {
            let db = Database::open(&config.database_path())?;
            list_jobs(&db, args)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stats { json } => {
            let db = Database::open(&config.database_path())?;
            let stats = stats_repo::stats(&db)?;
            if json {
                println!("{}", to_json(&stats));
            } else {
                println!("Total jobs:   {}", stats.total);
                println!("Remote:       {}", stats.remote_count);
                println!("With salary:  {}", stats.with_salary);
                if let (Some(first), Some(last)) = (&stats.first_scraped, &stats.last_scraped) {
                    println!("Scraped:      {} .. {}", first, last);
                }
                println!("\nBy source:");
                for g in &stats.by_source {
                    println!("  {:<20} {}", g.key, g.count);
                }
                println!("\nBy job type:");
                for g in &stats.by_job_type {
                    println!("  {:<20} {}", g.key, g.count);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_search(config: &Config, args: SearchArgs) -> Result<ExitCode, HarvestError> {
    let db = Database::open(&config.database_path())?;
    let registry = SourceRegistry::with_builtin_sources(config)?;

    let sources = if args.sources.is_empty() {
        registry
            .describe()
            .into_iter()
            .filter(|s| s.available)
            .map(|s| s.id)
            .collect()
    } else {
        args.sources
    };

    let mut criteria = SearchCriteria::new(sources).with_keywords(&args.keywords);
    criteria.location = args.location;
    criteria.remote = args.remote;
    criteria.job_type = args.job_type;
    criteria.experience_level = args.experience;
    criteria.salary_min = args.salary_min;
    criteria.max_results_per_source = args.max_results;
    criteria.posted_in_last_days = args.days;

    let manager = Arc::new(SearchManager::new(DedupGate::new(db), registry, config));
    let id = manager.submit(criteria)?;

    let handler_manager = Arc::clone(&manager);
    let handler_id = id.clone();
    let interrupted = AtomicBool::new(false);
    if let Err(e) = ctrlc::set_handler(move || {
        if !first_interrupt(&interrupted) {
            eprintln!("\nInterrupted again, exiting");
            process::exit(INTERRUPTED_EXIT_CODE);
        }
        eprintln!("\nCancelling: running sources will finish, the rest are skipped (Ctrl-C again to exit)");
        if let Err(e) = handler_manager.cancel(&handler_id) {
            warn!("Cancel failed: {}", e);
        }
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut last_line = String::new();
    let snapshot = loop {
        let snapshot = manager.get_task(&id)?;
        if snapshot.is_terminal() {
            break manager.wait(&id)?;
        }
        let line = progress_line(&snapshot);
        if line != last_line {
            eprintln!("{}", line);
            last_line = line;
        }
        thread::sleep(POLL_INTERVAL);
    };

    if args.json {
        println!("{}", to_json(&snapshot));
    } else {
        print_summary(&snapshot);
    }

    info!("Job store: {}", config.database_path().display());
    Ok(match snapshot.status() {
        TaskStatus::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// True for the first interrupt only; later ones should terminate the process.
fn first_interrupt(seen: &AtomicBool) -> bool {
    !seen.swap(true, Ordering::SeqCst)
}

fn progress_line(snapshot: &TaskSnapshot) -> String {
    let task = &snapshot.task;
    format!(
        "[{}/{}] {} found, {} new{}",
        task.completed_sources,
        task.total_sources,
        task.jobs_found,
        task.new_jobs_saved,
        task.current_source
            .as_deref()
            .map(|s| format!(" (fetching {})", s))
            .unwrap_or_default()
    )
}

fn print_summary(snapshot: &TaskSnapshot) {
    let task = &snapshot.task;
    println!(
        "Search {} in {:.1}s: {} jobs found, {} new",
        task.status, snapshot.elapsed_seconds, task.jobs_found, task.new_jobs_saved
    );
    for p in &task.source_status {
        let elapsed = p
            .elapsed_seconds()
            .map(|s| format!("{:.1}s", s))
            .unwrap_or_default();
        println!(
            "  {:<12} {:<10} {:>5} jobs {:>5} new {:>7}",
            p.source,
            format!("{:?}", p.state).to_lowercase(),
            p.jobs,
            p.saved,
            elapsed
        );
    }
    if !task.errors.is_empty() {
        println!("Errors:");
        for e in &task.errors {
            println!("  {}: {}", e.source, e.message);
        }
    }
}

fn list_jobs(db: &Database, args: JobsArgs) -> Result<(), HarvestError> {
    let query = JobQuery {
        text: args.query,
        source: args.source,
        remote: args.remote,
        job_type: args.job_type,
        salary_min: args.salary_min,
        posted_in_last_days: args.days,
        sort: args.sort,
        ascending: args.asc,
        limit: Some(args.limit),
        offset: Some(args.offset),
    };
    let (jobs, total) = job_repo::query(db, &query)?;

    if args.json {
        println!("{}", to_json(&serde_json::json!({ "total": total, "jobs": jobs })));
        return Ok(());
    }

    for job in &jobs {
        let salary = match (job.salary_min, job.salary_max) {
            (Some(min), Some(max)) => format!(" {:.0}-{:.0} {}", min, max, job.salary_currency),
            (Some(v), None) | (None, Some(v)) => format!(" {:.0} {}", v, job.salary_currency),
            (None, None) => String::new(),
        };
        println!(
            "{} {} | {} | {} [{}]{}\n    {}",
            short_fingerprint(&job.fingerprint),
            job.title,
            job.company,
            job.location,
            job.remote,
            salary,
            job.url
        );
    }
    println!("{} of {} jobs", jobs.len(), total);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
