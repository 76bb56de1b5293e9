//! Application-wide error types.
//!
//! Loader-internal errors live in [`crate::loader::LoadError`]; this module
//! holds the boundary type the binary and facade surface to callers.

use thiserror::Error;

use crate::loader::LoadError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("capability error: {0}")]
    Capability(String),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
