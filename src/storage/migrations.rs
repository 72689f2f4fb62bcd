//! Database migrations

use rusqlite::Connection;

use crate::error::{CmError, Result};

const MIGRATIONS: [&str; 1] = [include_str!("../../migrations/001_initial_schema.sql")];

#[allow(clippy::cast_possible_truncation)]
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Apply every migration newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let current_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let target_version = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if current_version >= target_version {
            continue;
        }

        conn.execute_batch(sql).map_err(|err| {
            CmError::Config(format!("migration {target_version} failed: {err}"))
        })?;
        conn.pragma_update(None, "user_version", target_version)?;
    }

    Ok(SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> u32 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(user_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('runs', 'artifacts', 'skipped_stages')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
