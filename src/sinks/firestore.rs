//! Firestore REST sink.
//!
//! The record is written with a single `documents:commit` call. The write
//! carries no update mask, so the stored document is replaced in full, and a
//! `REQUEST_TIME` transform stamps `updatedAt` with the server clock.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::credentials::ServiceAccount;
use crate::config::settings::PersistenceConfig;
use crate::resilience::retry::RetrySettings;
use crate::sinks::google_auth::ServiceAccountAuth;
use crate::sinks::{is_retryable, RejectedStatus, TokenRecord, TokenSink, WriteReceipt};
use crate::utils::constants::FIRESTORE_BASE_URL;

const UPDATED_AT_FIELD: &str = "updatedAt";
/// The emulator accepts this in place of a real access token.
const EMULATOR_BEARER: &str = "owner";

pub enum StoreAuth {
    ServiceAccount(ServiceAccountAuth),
    Emulator,
}

pub struct FirestoreSink {
    client: Client,
    base_url: String,
    project_id: String,
    database: String,
    document_path: String,
    auth: StoreAuth,
    retry: RetrySettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<WriteResult>,
    commit_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteResult {
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    transform_results: Vec<TransformResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformResult {
    timestamp_value: Option<DateTime<Utc>>,
}

impl FirestoreSink {
    /// `emulator_host` (`host:port`) routes writes to a local emulator without OAuth.
    pub fn new(
        cfg: &PersistenceConfig,
        account: ServiceAccount,
        retry: RetrySettings,
        emulator_host: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.http_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        let project_id = account.project_id.clone();
        let (base_url, auth) = match emulator_host.filter(|h| !h.trim().is_empty()) {
            Some(host) => {
                info!(emulator = %host, "writing to the Firestore emulator");
                (format!("http://{}", host.trim()), StoreAuth::Emulator)
            }
            None => {
                let base = cfg.base_url.clone().unwrap_or_else(|| FIRESTORE_BASE_URL.to_owned());
                let auth = ServiceAccountAuth::new(account, client.clone(), retry.clone())?;
                (base, StoreAuth::ServiceAccount(auth))
            }
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            project_id,
            database: cfg.database.clone(),
            document_path: cfg.document_path.trim_matches('/').to_owned(),
            auth,
            retry,
        })
    }

    /// Full resource name, `projects/<p>/databases/<db>/documents/<path>`.
    pub fn document_name(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}",
            self.project_id, self.database, self.document_path
        )
    }

    pub fn commit_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents:commit",
            self.base_url, self.project_id, self.database
        )
    }

    pub fn commit_body(&self, record: &TokenRecord) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": self.document_name(),
                    "fields": {
                        "token": { "stringValue": record.token.as_str() },
                        "expiresAt": { "timestampValue": record.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true) },
                        "source": { "stringValue": record.source },
                        "method": { "stringValue": record.method.method_tag() },
                    }
                },
                "updateTransforms": [{
                    "fieldPath": UPDATED_AT_FIELD,
                    "setToServerValue": "REQUEST_TIME",
                }]
            }]
        })
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            StoreAuth::ServiceAccount(auth) => auth.access_token().await,
            StoreAuth::Emulator => Ok(EMULATOR_BEARER.to_owned()),
        }
    }

    async fn commit(&self, bearer: &str, body: &Value) -> Result<CommitResponse> {
        let url = self.commit_url();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .with_context(|| format!("commit request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RejectedStatus { endpoint: "Firestore commit", status, body }.into());
        }
        resp.json::<CommitResponse>()
            .await
            .context("Firestore commit returned an unexpected body")
    }
}

#[async_trait]
impl TokenSink for FirestoreSink {
    async fn write(&self, record: &TokenRecord) -> Result<WriteReceipt> {
        let body = self.commit_body(record);
        debug!(document = %self.document_name(), token = %record.token.display(), "committing token record");

        let bearer = self.bearer().await?;
        let response = self
            .retry
            .run_with_retry_if(|| self.commit(&bearer, &body), is_retryable)
            .await?;
        let receipt = receipt_from(response, self.document_name(), record.expires_at)?;
        info!(
            document = %receipt.document,
            updated_at = %receipt.updated_at,
            expires_at = %receipt.expires_at,
            "token record written"
        );
        Ok(receipt)
    }

    fn describe(&self) -> String {
        format!("firestore {}", self.document_name())
    }
}

fn receipt_from(response: CommitResponse, document: String, expires_at: DateTime<Utc>) -> Result<WriteReceipt> {
    let write = response.write_results.first();
    let updated_at = write
        .and_then(|w| w.transform_results.first())
        .and_then(|t| t.timestamp_value)
        .or_else(|| write.and_then(|w| w.update_time))
        .or(response.commit_time)
        .ok_or_else(|| anyhow!("commit response carries no timestamp"))?;

    Ok(WriteReceipt {
        document,
        updated_at,
        expires_at,
        commit_time: response.commit_time,
    })
}
