//! Forward-only schema migrations, recorded in `_migrations`.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// (version, name, sql). Versions must be strictly increasing.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "create_analysis_jobs_table",
        include_str!("sql/001_create_analysis_jobs.sql"),
    ),
    (
        2,
        "create_connections_table",
        include_str!("sql/002_create_connections.sql"),
    ),
    (
        3,
        "index_jobs_by_subject",
        include_str!("sql/003_index_jobs_by_subject.sql"),
    ),
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(version, _, _)| *version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )
}

/// Applies every migration newer than the recorded version. Each migration
/// and its bookkeeping row commit together.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = current_version(conn)?;
    for &(version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > applied) {
        tracing::info!(version, name, "Applying migration");

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(|e| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied_count(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_latest() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(applied_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        assert_eq!(applied_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        for table in ["analysis_jobs", "connections"] {
            let found: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "{table}");
        }
    }
}
