use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;
use std::path::Path;

pub type DbConn = SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Open (creating if needed) the SQLite database and bring its schema up to date.
pub fn establish(database_url: &str) -> Result<DbConn, String> {
    ensure_parent_dir(database_url)?;
    let mut conn =
        SqliteConnection::establish(database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    // another run holding the write lock should delay us, not fail us
    conn.batch_execute("PRAGMA busy_timeout = 5000;")
        .map_err(|e| format!("configuring database failed: {}", e))?;
    apply_database_migrations(&mut conn)?;
    Ok(conn)
}

fn ensure_parent_dir(database_url: &str) -> Result<(), String> {
    if database_url == ":memory:" || database_url.starts_with("file:") {
        return Ok(());
    }
    match Path::new(database_url).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .map_err(|e| format!("creating database directory {} failed: {}", dir.display(), e)),
        _ => Ok(()),
    }
}

fn apply_database_migrations(conn: &mut DbConn) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

#[cfg(test)]
pub fn in_memory() -> DbConn {
    establish(":memory:").expect("in-memory database")
}
