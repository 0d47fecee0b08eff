//! Error taxonomy for the indexing and query pipelines.
//!
//! | Variant | Raised when | Effect |
//! |---------|-------------|--------|
//! | [`RagError::Configuration`] | bad config, corpus directory missing, unusable index directory | startup aborts |
//! | [`RagError::NoDocumentsFound`] | corpus directory holds no readable `.pdf`/`.txt` | startup aborts |
//! | [`RagError::Backend`] | embedding, generation, or SQLite failure | build aborts; a query turn is reported and skipped |
//! | [`RagError::UserAbort`] | Ctrl-C | session ends immediately |
//! | [`RagError::Io`] | local filesystem failure | startup aborts |

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(
        "no documents found in '{}': create the folder and put .pdf or .txt files in it",
        .0.display()
    )]
    NoDocumentsFound(PathBuf),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("interrupted by user")]
    UserAbort,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Wrap any backend failure, keeping its full cause chain in the message.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        RagError::Backend(format!("{:#}", err.into()))
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::backend(err)
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
