// src/error.rs

//! Error types for the restore core
//!
//! Resolution problems (conflicts, cycles, downgrades, ...) are never errors
//! here: they are collected as diagnostics and returned in the report. This
//! enum only covers contract violations and conditions that abort a run.

use crate::fetch::TransportError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed project model, range syntax or configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    /// The run was cancelled; nothing from it is published
    #[error("Resolution cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
