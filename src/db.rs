use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::Result;

/// File name of the index database inside the persist directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Open the index database at `db_path`.
///
/// A writable connection creates the file when missing. The rollback journal
/// is used instead of WAL so a finished index is one self-contained file that
/// can be moved into place.
pub async fn connect(db_path: &Path, read_only: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .read_only(read_only)
        .create_if_missing(!read_only)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(if read_only { 4 } else { 1 })
        .connect_with(options)
        .await?;

    Ok(pool)
}
