//! Error types for the highlight engine

use thiserror::Error;

use crate::config::ConfigError;
use crate::highlights::ImportError;
use crate::removal::RemovalError;
use crate::session::SessionClosed;
use crate::store::StoreError;
use crate::tree::TreeError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionClosed),
}

impl From<RemovalError> for Error {
    fn from(err: RemovalError) -> Self {
        match err {
            RemovalError::Store(e) => Error::Store(e),
            RemovalError::Tree(e) => Error::Tree(e),
        }
    }
}
