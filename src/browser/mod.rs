//! Browser session seam.
//!
//! The login flow and the acquisition strategies only talk to a
//! [`BrowserSession`]; the production implementation drives Chromium over
//! CDP (see [`chromium`]).

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub mod chromium;
pub mod wait;

/// An outgoing request observed while the session was open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl CapturedRequest {
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Local,
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageEntry {
    pub area: StorageArea,
    pub key: String,
    pub value: String,
}

impl StorageEntry {
    pub fn new(area: StorageArea, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            area,
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<Option<String>>;

    async fn element_exists(&self, selector: &str) -> Result<bool>;

    /// Focus the element and type `text` into it.
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    /// Click through `HTMLElement.click()` so overlays cannot swallow it.
    /// Returns false when nothing matches `selector`.
    async fn click_via_script(&self, selector: &str) -> Result<bool>;

    /// Every `localStorage` entry followed by every `sessionStorage` entry.
    async fn storage_entries(&self) -> Result<Vec<StorageEntry>>;

    async fn captured_requests(&self) -> Vec<CapturedRequest>;

    async fn close(&mut self) -> Result<()>;
}
