//! OAuth2 access tokens for a Google service account (JWT bearer grant).

use std::time::Duration;

use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::credentials::ServiceAccount;
use crate::helpers::time::now_i64;
use crate::resilience::retry::RetrySettings;
use crate::sinks::{is_retryable, RejectedStatus};
use crate::utils::constants::{FIRESTORE_SCOPE, JWT_BEARER_GRANT_TYPE};

const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    value: String,
    expires_at: i64,
}

pub struct ServiceAccountAuth {
    account: ServiceAccount,
    key: EncodingKey,
    client: Client,
    retry: RetrySettings,
    cached: Mutex<Option<CachedAccessToken>>,
}

impl ServiceAccountAuth {
    pub fn new(account: ServiceAccount, client: Client, retry: RetrySettings) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .context("service account private_key is not a valid RSA PEM")?;
        Ok(Self {
            account,
            key,
            client,
            retry,
            cached: Mutex::new(None),
        })
    }

    /// Signed RS256 assertion for the datastore scope.
    pub fn assertion(&self, issued_at: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: FIRESTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key).context("failed to sign assertion")
    }

    /// Cached access token, exchanging a fresh assertion when needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = now_i64();
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at - EXPIRY_MARGIN_SECS > now) {
            debug!("reusing cached access token");
            return Ok(token.value.clone());
        }

        let response = self
            .retry
            .run_with_retry_if(|| self.exchange(), is_retryable)
            .await?;
        info!(client_email = %self.account.client_email, "obtained service account access token");
        let token = CachedAccessToken {
            value: response.access_token,
            expires_at: now_i64() + response.expires_in,
        };
        *cached = Some(token.clone());
        Ok(token.value)
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let assertion = self.assertion(now_i64())?;
        let resp = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .with_context(|| format!("token request to {} failed", self.account.token_uri))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RejectedStatus { endpoint: "token endpoint", status, body }.into());
        }
        resp.json::<TokenResponse>()
            .await
            .context("token endpoint returned an unexpected body")
    }
}
