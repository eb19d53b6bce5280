//! Failure taxonomy of a fetch run.
//!
//! Internal steps work with `anyhow::Result`; the runner maps each step's
//! failure into one of these categories, and `main` turns the category into
//! the process exit code.

use std::time::Duration;
use thiserror::Error;

/// A bounded wait that ran out before its condition held.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("timed out after {}ms waiting for {condition}", .timeout.as_millis())]
pub struct WaitTimeout {
    pub condition: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("browser setup failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("authentication failed: {0:#}")]
    Authentication(anyhow::Error),

    #[error("login was not acknowledged: {0}")]
    LoginTimeout(WaitTimeout),

    #[error("no acquisition strategy produced a token (tried: {}); hints: {}", .tried.join(", "), .hints.join("; "))]
    Acquisition { tried: Vec<String>, hints: Vec<String> },

    #[error("persisting token failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl FetchError {
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Config(_) => "config",
            FetchError::Setup(_) => "setup",
            FetchError::Authentication(_) | FetchError::LoginTimeout(_) => "authentication",
            FetchError::Acquisition { .. } => "acquisition",
            FetchError::Persistence(_) => "persistence",
        }
    }

    /// Process exit code for this failure; never 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            FetchError::Config(_) => 2,
            FetchError::Setup(_) => 3,
            FetchError::Authentication(_) | FetchError::LoginTimeout(_) => 4,
            FetchError::Acquisition { .. } => 5,
            FetchError::Persistence(_) => 6,
        }
    }
}
