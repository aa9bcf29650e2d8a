//! Working database creation and access.
//!
//! The working database is a single-file SQLite database. Rollback-journal
//! mode keeps every committed page in the main file, which is the only file
//! the vault encrypts on lock.

use std::path::Path;

use sqlx::{
    Connection, SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions},
};

use crate::error::Result;

/// Baseline schema applied to every new vault.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a schema-initialized, otherwise empty database at `path`.
pub(crate) async fn create_empty(path: &Path, migrator: &Migrator) -> Result<()> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    let mut conn = SqliteConnection::connect_with(&options).await?;
    migrator.run(&mut conn).await?;
    conn.close().await?;
    Ok(())
}

/// Open a pool on an existing working database.
///
/// Callers must close the pool before the vault is locked.
pub(crate) async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    Ok(pool)
}
