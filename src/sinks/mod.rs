//! Where an acquired token ends up.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

use crate::strategies::StrategyKind;
use crate::token::Token;

pub mod firestore;
pub mod google_auth;
pub mod store;

/// The single record downstream consumers read.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token: Token,
    pub expires_at: DateTime<Utc>,
    pub source: String,
    pub method: StrategyKind,
}

/// What the store reported back after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub document: String,
    /// Server timestamp written into `updatedAt`
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub commit_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TokenSink: Send + Sync {
    /// Replace the record in full. Last writer wins.
    async fn write(&self, record: &TokenRecord) -> Result<WriteReceipt>;

    fn describe(&self) -> String;
}

/// Non-success answer from the token endpoint or the store.
#[derive(Debug, Error)]
#[error("{endpoint} returned {status}: {body}")]
pub struct RejectedStatus {
    pub endpoint: &'static str,
    pub status: StatusCode,
    pub body: String,
}

impl RejectedStatus {
    /// Server errors and throttling may pass on their own; other 4xx will not.
    pub fn is_transient(&self) -> bool {
        self.status.is_server_error() || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Transport failures and transient statuses are worth another attempt.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RejectedStatus>()
        .map_or(true, RejectedStatus::is_transient)
}
