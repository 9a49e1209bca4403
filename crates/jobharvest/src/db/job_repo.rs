//! Job repository: upsert-ignore writes and filtered reads on the `jobs` table.

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{params, Connection, Row};
use serde::Deserialize;

use super::{Database, DatabaseError};
use crate::job::{JobRecord, RemoteKind};

/// Matches values that start with an ISO `YYYY-MM-DD` date.
const ISO_DATE_GLOB: &str = "'[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*'";

const INSERT_IGNORE_SQL: &str = "INSERT OR IGNORE INTO jobs
    (fingerprint, title, company, location, description, url, source, remote,
     salary_min, salary_max, salary_currency, job_type, experience_level,
     date_posted, date_scraped, tags, company_logo)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

fn record_from_row(row: &Row<'_>) -> Result<JobRecord, rusqlite::Error> {
    let remote: String = row.get("remote")?;
    Ok(JobRecord {
        fingerprint: row.get("fingerprint")?,
        title: row.get("title")?,
        company: row.get("company")?,
        location: row.get("location")?,
        description: row.get("description")?,
        url: row.get("url")?,
        source: row.get("source")?,
        remote: RemoteKind::parse(&remote),
        salary_min: row.get("salary_min")?,
        salary_max: row.get("salary_max")?,
        salary_currency: row.get("salary_currency")?,
        job_type: row.get("job_type")?,
        experience_level: row.get("experience_level")?,
        date_posted: row.get("date_posted")?,
        date_scraped: row.get("date_scraped")?,
        tags: row.get("tags")?,
        company_logo: row.get("company_logo")?,
    })
}

/// Column a query result is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DatePosted,
    DateScraped,
    Title,
    Company,
    Source,
    SalaryMin,
    SalaryMax,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date_posted" => Some(SortField::DatePosted),
            "date_scraped" => Some(SortField::DateScraped),
            "title" => Some(SortField::Title),
            "company" => Some(SortField::Company),
            "source" => Some(SortField::Source),
            "salary_min" => Some(SortField::SalaryMin),
            "salary_max" => Some(SortField::SalaryMax),
            _ => None,
        }
    }

    fn order_expr(&self, direction: &str) -> String {
        match self {
            // date_posted is free text; undated rows sort last, then by scrape time.
            SortField::DatePosted => format!(
                "CASE WHEN date_posted GLOB {} THEN date_posted ELSE '0000-00-00' END {dir}, date_scraped {dir}",
                ISO_DATE_GLOB,
                dir = direction
            ),
            SortField::DateScraped => format!("date_scraped {}", direction),
            SortField::Title => format!("title {}", direction),
            SortField::Company => format!("company {}", direction),
            SortField::Source => format!("source {}", direction),
            SortField::SalaryMin => format!("salary_min {}", direction),
            SortField::SalaryMax => format!("salary_max {}", direction),
        }
    }
}

/// Filters, sort and pagination for reading stored jobs.
#[derive(Debug, Default, Clone)]
pub struct JobQuery {
    /// Whitespace-separated terms; every term must appear in title, company,
    /// description, tags or location.
    pub text: Option<String>,
    pub source: Option<String>,
    pub remote: Option<RemoteKind>,
    /// Substring match on the job type.
    pub job_type: Option<String>,
    /// Only jobs with a known minimum salary at or above this value.
    pub salary_min: Option<f64>,
    pub posted_in_last_days: Option<u32>,
    pub sort: SortField,
    pub ascending: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts records, silently skipping fingerprints that already exist.
///
/// Runs in one transaction. Returns how many rows were actually written.
pub fn insert_ignore_batch(db: &Database, records: &[JobRecord]) -> Result<usize, DatabaseError> {
    if records.is_empty() {
        return Ok(0);
    }

    db.with_conn_mut(|conn| insert_records(conn, records))
}

/// Like [`insert_ignore_batch`], but checks `halted` while holding the store
/// lock and writes nothing if it is set. A failed write sets `halted` before
/// the lock is released, so no later caller sharing the flag can write.
///
/// Returns `None` when the write was refused.
pub fn insert_ignore_batch_unless(
    db: &Database,
    records: &[JobRecord],
    halted: &AtomicBool,
) -> Result<Option<usize>, DatabaseError> {
    // Also checked up front: a closed store fails before the closure runs.
    if halted.load(Ordering::SeqCst) {
        return Ok(None);
    }
    db.with_conn_mut(|conn| {
        if halted.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if records.is_empty() {
            return Ok(Some(0));
        }
        match insert_records(conn, records) {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                halted.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    })
}

fn insert_records(conn: &mut Connection, records: &[JobRecord]) -> Result<usize, DatabaseError> {
    let tx = conn.transaction()?;
    let mut saved = 0;
    {
        let mut stmt = tx.prepare_cached(INSERT_IGNORE_SQL)?;
        for r in records {
            saved += stmt.execute(params![
                r.fingerprint,
                r.title,
                r.company,
                r.location,
                r.description,
                r.url,
                r.source,
                r.remote.as_str(),
                r.salary_min,
                r.salary_max,
                r.salary_currency,
                r.job_type,
                r.experience_level,
                r.date_posted,
                r.date_scraped,
                r.tags,
                r.company_logo,
            ])?;
        }
    }
    tx.commit()?;
    Ok(saved)
}

/// Returns true if a job with this fingerprint is stored.
pub fn exists(db: &Database, fingerprint: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM jobs WHERE fingerprint = ?1)",
            params![fingerprint],
            |r| r.get(0),
        )?;
        Ok(found)
    })
}

/// Finds a job by its fingerprint.
pub fn find_by_fingerprint(
    db: &Database,
    fingerprint: &str,
) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE fingerprint = ?1")?;
        let mut rows = stmt.query_map(params![fingerprint], record_from_row)?;
        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, q: &JobQuery) -> Result<(Vec<JobRecord>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref text) = q.text {
            for term in text.split_whitespace() {
                let n = param_values.len() + 1;
                conditions.push(format!(
                    "(title LIKE ?{n} OR company LIKE ?{n} OR description LIKE ?{n} \
                     OR tags LIKE ?{n} OR location LIKE ?{n})"
                ));
                param_values.push(Box::new(format!("%{}%", term)));
            }
        }
        if let Some(ref source) = q.source {
            conditions.push(format!("source = ?{}", param_values.len() + 1));
            param_values.push(Box::new(source.clone()));
        }
        if let Some(remote) = q.remote {
            conditions.push(format!("remote = ?{}", param_values.len() + 1));
            param_values.push(Box::new(remote.as_str()));
        }
        if let Some(ref job_type) = q.job_type {
            conditions.push(format!("job_type LIKE ?{}", param_values.len() + 1));
            param_values.push(Box::new(format!("%{}%", job_type)));
        }
        if let Some(salary_min) = q.salary_min {
            conditions.push(format!(
                "(salary_min IS NOT NULL AND salary_min >= ?{})",
                param_values.len() + 1
            ));
            param_values.push(Box::new(salary_min));
        }
        if let Some(days) = q.posted_in_last_days.filter(|d| *d > 0) {
            conditions.push(format!(
                "(CASE WHEN date_posted GLOB {} THEN substr(date_posted, 1, 10) \
                 ELSE substr(date_scraped, 1, 10) END) >= date('now', ?{})",
                ISO_DATE_GLOB,
                param_values.len() + 1
            ));
            param_values.push(Box::new(format!("-{} days", days)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = q.limit.unwrap_or(100) as i64;
        let offset = q.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let direction = if q.ascending { "ASC" } else { "DESC" };
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            where_clause,
            q.sort.order_expr(direction),
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRecord> = stmt
            .query_map(params_ref.as_slice(), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Returns the total number of stored jobs.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Returns the distinct source identifiers present in the store, sorted.
pub fn distinct_sources(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT source FROM jobs ORDER BY source")?;
        let sources = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    })
}

/// Returns the fingerprints of all jobs from one source.
pub fn fingerprints_for_source(db: &Database, source: &str) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT fingerprint FROM jobs WHERE source = ?1 ORDER BY fingerprint")?;
        let fps = stmt
            .query_map(params![source], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fps)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RawJob;
    use chrono::{Duration, TimeZone, Utc};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn record(title: &str, company: &str, source: &str) -> JobRecord {
        let url = format!("https://jobs.example/{}/{}", company, title).replace(' ', "-");
        let at = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        JobRecord::from_raw(RawJob::new(title, company, &url, source), at)
    }

    #[test]
    fn test_insert_unless_halted() {
        let db = test_db();
        let halted = AtomicBool::new(false);
        let job = record("Rust Engineer", "Acme", "RemoteOK");

        assert_eq!(
            insert_ignore_batch_unless(&db, &[job.clone()], &halted).unwrap(),
            Some(1)
        );

        halted.store(true, Ordering::SeqCst);
        let other = record("Go Engineer", "Acme", "RemoteOK");
        assert_eq!(insert_ignore_batch_unless(&db, &[other], &halted).unwrap(), None);
        assert_eq!(count(&db).unwrap(), 1);
    }

    #[test]
    fn test_failed_insert_sets_halted() {
        let db = test_db();
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE jobs")?;
            Ok(())
        })
        .unwrap();

        let halted = AtomicBool::new(false);
        let job = record("Rust Engineer", "Acme", "RemoteOK");
        assert!(insert_ignore_batch_unless(&db, &[job], &halted).is_err());
        assert!(halted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let mut job = record("Rust Engineer", "Acme", "RemoteOK");
        job.remote = RemoteKind::Remote;
        job.salary_max = Some(150_000.0);
        job.company_logo = Some("https://logo".to_string());
        assert_eq!(insert_ignore_batch(&db, &[job.clone()]).unwrap(), 1);

        let found = find_by_fingerprint(&db, &job.fingerprint).unwrap().unwrap();
        assert_eq!(found, job);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_fingerprint(&db, "nope").unwrap().is_none());
        assert!(!exists(&db, "nope").unwrap());
    }

    #[test]
    fn test_insert_ignore_skips_existing() {
        let db = test_db();
        let a = record("A", "Co", "S1");
        let b = record("B", "Co", "S1");
        assert_eq!(insert_ignore_batch(&db, &[a.clone()]).unwrap(), 1);
        assert_eq!(insert_ignore_batch(&db, &[a, b]).unwrap(), 1);
        assert_eq!(count(&db).unwrap(), 2);
    }

    #[test]
    fn test_insert_ignore_keeps_first_version() {
        let db = test_db();
        let first = record("A", "Co", "S1");
        let mut second = first.clone();
        second.source = "S2".to_string();
        insert_ignore_batch(&db, &[first.clone()]).unwrap();
        insert_ignore_batch(&db, &[second]).unwrap();

        let stored = find_by_fingerprint(&db, &first.fingerprint).unwrap().unwrap();
        assert_eq!(stored.source, "S1");
    }

    #[test]
    fn test_query_no_filter() {
        let db = test_db();
        insert_ignore_batch(
            &db,
            &[record("A", "Co", "S1"), record("B", "Co", "S1"), record("C", "Co", "S2")],
        )
        .unwrap();

        let (rows, total) = query(&db, &JobQuery::default()).unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_query_text_terms_all_must_match() {
        let db = test_db();
        let mut a = record("Senior Rust Engineer", "Acme", "S1");
        a.description = "Tokio and async".to_string();
        let b = record("Rust Developer", "Initech", "S1");
        insert_ignore_batch(&db, &[a, b]).unwrap();

        let (rows, total) = query(
            &db,
            &JobQuery {
                text: Some("rust tokio".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].company, "Acme");
    }

    #[test]
    fn test_query_source_remote_and_job_type() {
        let db = test_db();
        let mut a = record("A", "Co", "S1");
        a.remote = RemoteKind::Remote;
        a.job_type = "Full-time".to_string();
        let mut b = record("B", "Co", "S1");
        b.remote = RemoteKind::OnSite;
        let mut c = record("C", "Co", "S2");
        c.remote = RemoteKind::Remote;
        insert_ignore_batch(&db, &[a, b, c]).unwrap();

        let (_, total) = query(
            &db,
            &JobQuery {
                source: Some("S1".to_string()),
                remote: Some(RemoteKind::Remote),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);

        let (rows, _) = query(
            &db,
            &JobQuery {
                job_type: Some("full".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "A");
    }

    #[test]
    fn test_query_salary_floor_requires_known_salary() {
        let db = test_db();
        let mut a = record("A", "Co", "S1");
        a.salary_min = Some(90_000.0);
        let mut b = record("B", "Co", "S1");
        b.salary_min = Some(40_000.0);
        let c = record("C", "Co", "S1");
        insert_ignore_batch(&db, &[a, b, c]).unwrap();

        let (rows, total) = query(
            &db,
            &JobQuery {
                salary_min: Some(50_000.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].title, "A");
    }

    #[test]
    fn test_query_posted_in_last_days() {
        let db = test_db();
        let recent = (Utc::now() - Duration::days(2)).format("%Y-%m-%d").to_string();
        let old = (Utc::now() - Duration::days(40)).format("%Y-%m-%d").to_string();

        let mut a = record("Recent", "Co", "S1");
        a.date_posted = format!("{}T08:00:00Z", recent);
        let mut b = record("Old", "Co", "S1");
        b.date_posted = old;
        // Unparseable posted date falls back to the scrape date.
        let mut c = record("Fallback", "Co", "S1");
        c.date_posted = "3 days ago".to_string();
        c.date_scraped = Utc::now().format(crate::job::SCRAPED_AT_FORMAT).to_string();
        insert_ignore_batch(&db, &[a, b, c]).unwrap();

        let (rows, total) = query(
            &db,
            &JobQuery {
                posted_in_last_days: Some(7),
                sort: SortField::Title,
                ascending: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].title, "Fallback");
        assert_eq!(rows[1].title, "Recent");
    }

    #[test]
    fn test_query_sort_by_date_posted_puts_undated_last() {
        let db = test_db();
        let mut a = record("A", "Co", "S1");
        a.date_posted = "2026-01-05".to_string();
        let mut b = record("B", "Co", "S1");
        b.date_posted = "2026-02-01".to_string();
        let c = record("C", "Co", "S1");
        insert_ignore_batch(&db, &[a, b, c]).unwrap();

        let (rows, _) = query(&db, &JobQuery::default()).unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_query_pagination() {
        let db = test_db();
        let records: Vec<_> = (0..10).map(|i| record(&format!("T{}", i), "Co", "S1")).collect();
        insert_ignore_batch(&db, &records).unwrap();

        let (rows, total) = query(
            &db,
            &JobQuery {
                sort: SortField::Title,
                ascending: true,
                limit: Some(3),
                offset: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["T3", "T4", "T5"]);
    }

    #[test]
    fn test_distinct_sources_and_fingerprints() {
        let db = test_db();
        let a = record("A", "Co", "Remotive");
        let b = record("B", "Co", "Arbeitnow");
        insert_ignore_batch(&db, &[a.clone(), b]).unwrap();

        assert_eq!(distinct_sources(&db).unwrap(), vec!["Arbeitnow", "Remotive"]);
        assert_eq!(fingerprints_for_source(&db, "Remotive").unwrap(), vec![a.fingerprint]);
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("salary_max"), Some(SortField::SalaryMax));
        assert_eq!(SortField::parse("drop table"), None);
    }
}
