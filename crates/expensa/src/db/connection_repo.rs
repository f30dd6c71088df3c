//! Row-level access to the `connections` table.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Records a connection. Re-registering an existing id refreshes its timestamp.
pub fn insert(db: &Database, connection_id: &str, connected_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO connections (connection_id, connected_at) VALUES (?1, ?2)
             ON CONFLICT(connection_id) DO UPDATE SET connected_at=excluded.connected_at",
            params![connection_id, connected_at],
        )?;
        Ok(())
    })
}

/// All connection ids, oldest connection first.
pub fn list(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT connection_id FROM connections ORDER BY connected_at, connection_id")?;
        let ids = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Returns whether a row was deleted. Deleting a missing id is not an error.
pub fn delete(db: &Database, connection_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "DELETE FROM connections WHERE connection_id = ?1",
            params![connection_id],
        )?;
        Ok(affected > 0)
    })
}
