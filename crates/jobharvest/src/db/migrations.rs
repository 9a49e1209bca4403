//! Schema migrations.
//!
//! Applied versions are tracked in a `_migrations` table; pending ones run in
//! order, each at most once.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const CREATE_JOBS: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    fingerprint      TEXT PRIMARY KEY NOT NULL,
    title            TEXT NOT NULL,
    company          TEXT NOT NULL DEFAULT '',
    location         TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    url              TEXT NOT NULL DEFAULT '',
    source           TEXT NOT NULL,
    remote           TEXT NOT NULL DEFAULT 'Unknown',
    salary_min       REAL,
    salary_max       REAL,
    salary_currency  TEXT NOT NULL DEFAULT '',
    job_type         TEXT NOT NULL DEFAULT '',
    experience_level TEXT NOT NULL DEFAULT '',
    date_posted      TEXT NOT NULL DEFAULT '',
    date_scraped     TEXT NOT NULL,
    tags             TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source);
CREATE INDEX IF NOT EXISTS idx_jobs_date_scraped ON jobs(date_scraped);
";

const ADD_COMPANY_LOGO: &str = "ALTER TABLE jobs ADD COLUMN company_logo TEXT;";

/// All migrations in order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: CREATE_JOBS,
    },
    Migration {
        version: 2,
        description: "add_company_logo_to_jobs",
        sql: ADD_COMPANY_LOGO,
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_jobs_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert!(column_exists(&conn, "jobs", "fingerprint").unwrap());
        assert!(column_exists(&conn, "jobs", "company_logo").unwrap());
        assert!(!column_exists(&conn, "jobs", "missing").unwrap());
    }

    #[test]
    fn test_fingerprint_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let insert = "INSERT INTO jobs (fingerprint, title, source, date_scraped)
                      VALUES ('fp1', 't', 's', '2026-01-01 00:00:00')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
