//! Aggregate counts over the job store.

use serde::Serialize;

use super::{Database, DatabaseError};

/// Stored jobs grouped by one column.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
}

/// Summary of what the store currently holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: u64,
    pub remote_count: u64,
    pub with_salary: u64,
    pub by_source: Vec<GroupCount>,
    pub by_job_type: Vec<GroupCount>,
    /// Oldest and newest scrape timestamps, if the store is not empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_scraped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scraped: Option<String>,
}

fn group_counts(conn: &rusqlite::Connection, sql: &str) -> Result<Vec<GroupCount>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(GroupCount {
                key: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns aggregate statistics for the whole store.
pub fn stats(db: &Database) -> Result<JobStats, DatabaseError> {
    db.with_conn(|conn| {
        let (total, remote_count, with_salary, first_scraped, last_scraped): (
            u64,
            u64,
            u64,
            Option<String>,
            Option<String>,
        ) = conn.query_row(
            "SELECT COUNT(*),
             COALESCE(SUM(CASE WHEN remote = 'Remote' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN salary_min IS NOT NULL OR salary_max IS NOT NULL
                          THEN 1 ELSE 0 END), 0),
             MIN(date_scraped), MAX(date_scraped)
             FROM jobs",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        let by_source = group_counts(
            conn,
            "SELECT source, COUNT(*) FROM jobs GROUP BY source ORDER BY COUNT(*) DESC, source",
        )?;

        // Empty job types are reported under a placeholder key.
        let by_job_type = group_counts(
            conn,
            "SELECT CASE WHEN job_type = '' THEN 'unspecified' ELSE job_type END AS jt, COUNT(*)
             FROM jobs GROUP BY jt ORDER BY COUNT(*) DESC, jt",
        )?;

        Ok(JobStats {
            total,
            remote_count,
            with_salary,
            by_source,
            by_job_type,
            first_scraped,
            last_scraped,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo::insert_ignore_batch;
    use crate::job::{JobRecord, RawJob, RemoteKind};
    use chrono::Utc;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn record(title: &str, source: &str) -> JobRecord {
        let url = format!("https://jobs.example/{}", title);
        JobRecord::from_raw(RawJob::new(title, "Co", &url, source), Utc::now())
    }

    #[test]
    fn test_stats_empty() {
        let db = test_db();
        let s = stats(&db).unwrap();
        assert_eq!(s.total, 0);
        assert_eq!(s.remote_count, 0);
        assert!(s.by_source.is_empty());
        assert!(s.first_scraped.is_none());
    }

    #[test]
    fn test_stats_groups() {
        let db = test_db();
        let mut a = record("a", "Remotive");
        a.remote = RemoteKind::Remote;
        a.job_type = "full_time".to_string();
        a.salary_max = Some(100_000.0);
        let mut b = record("b", "Remotive");
        b.remote = RemoteKind::Remote;
        b.job_type = "full_time".to_string();
        let c = record("c", "Arbeitnow");
        insert_ignore_batch(&db, &[a, b, c]).unwrap();

        let s = stats(&db).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.remote_count, 2);
        assert_eq!(s.with_salary, 1);
        assert_eq!(
            s.by_source,
            vec![
                GroupCount { key: "Remotive".to_string(), count: 2 },
                GroupCount { key: "Arbeitnow".to_string(), count: 1 },
            ]
        );
        assert_eq!(s.by_job_type[0].key, "full_time");
        assert_eq!(s.by_job_type[1].key, "unspecified");
        assert!(s.last_scraped.is_some());
    }
}
