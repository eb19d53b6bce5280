//! Secrets read from the process environment.
//!
//! Values are consumed verbatim and never logged; `Debug` output redacts them.

use std::{env, fmt};

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::Deserialize;

use crate::utils::constants::*;

const REDACTED: &str = "<redacted>";

/// Learner account used to log into the site.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read the pair from the named environment variables.
    pub fn from_env(username_var: &str, password_var: &str) -> Result<Self> {
        let username = required_env(username_var)?;
        let password = required_env(password_var)?;
        Ok(Self::new(username, password))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Google service account allowed to write the token document.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    /// Parse the service-account JSON document (as downloaded from the console).
    pub fn from_json(raw: &str) -> Result<Self> {
        let account: ServiceAccount =
            serde_json::from_str(raw).context("service account JSON is malformed")?;
        if account.private_key.trim().is_empty() {
            return Err(anyhow!("service account has an empty private_key"));
        }
        Ok(account)
    }

    /// `FIREBASE_CREDS` holds the whole JSON document; otherwise the account is
    /// assembled from `FIREBASE_PROJECT_ID`, `FIREBASE_CLIENT_EMAIL` and the
    /// base64-encoded PEM in `FIREBASE_PRIVATE_KEY_BASE64`.
    pub fn from_env() -> Result<Self> {
        if let Ok(raw) = env::var(ENV_FIREBASE_CREDS) {
            return Self::from_json(&raw).with_context(|| format!("invalid {}", ENV_FIREBASE_CREDS));
        }

        let project_id = required_env(ENV_FIREBASE_PROJECT_ID)
            .with_context(|| format!("neither {} nor split credentials are set", ENV_FIREBASE_CREDS))?;
        let client_email = required_env(ENV_FIREBASE_CLIENT_EMAIL)?;
        let encoded = required_env(ENV_FIREBASE_PRIVATE_KEY_BASE64)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow!("{} is not valid base64: {}", ENV_FIREBASE_PRIVATE_KEY_BASE64, e))?;
        let private_key = String::from_utf8(decoded)
            .map_err(|_| anyhow!("{} does not decode to UTF-8 PEM", ENV_FIREBASE_PRIVATE_KEY_BASE64))?;

        Ok(Self {
            project_id,
            client_email,
            private_key,
            token_uri: default_token_uri(),
        })
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &REDACTED)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("environment variable {} is not set", name))
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_owned()
}
