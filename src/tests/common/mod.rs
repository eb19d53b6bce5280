// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::browser::{BrowserSession, CapturedRequest, StorageEntry};
use crate::config::credentials::ServiceAccount;
use crate::config::settings::{AcquisitionConfig, LoginConfig, PostLoginSignal};
use crate::helpers::time::now;
use crate::sinks::{TokenRecord, TokenSink, WriteReceipt};
use crate::utils::constants::{DEFAULT_PASSWORD_SELECTOR, DEFAULT_REDIRECT_MARKER, DEFAULT_SUBMIT_SELECTOR};

pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/test_service_account_key.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/test_service_account_key.pub.pem");

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// A three-segment token long enough for every check.
pub fn long_token() -> String {
    format!("eyJ{}.{}.{}", "h".repeat(40), "p".repeat(80), "s".repeat(43))
}

pub fn test_service_account(token_uri: &str) -> ServiceAccount {
    ServiceAccount {
        project_id: "wse-test".into(),
        client_email: "fetcher@wse-test.iam.gserviceaccount.com".into(),
        private_key: TEST_PRIVATE_KEY_PEM.into(),
        token_uri: token_uri.into(),
    }
}

pub fn fast_login_config() -> LoginConfig {
    LoginConfig {
        field_timeout_ms: 50,
        poll_interval_ms: 5,
        post_login: PostLoginSignal::UrlContains {
            marker: DEFAULT_REDIRECT_MARKER.into(),
            timeout_ms: 50,
        },
        ..LoginConfig::default()
    }
}

pub fn fast_acquisition_config() -> AcquisitionConfig {
    AcquisitionConfig {
        network_settle_ms: 50,
        redirect_timeout_ms: 50,
        poll_interval_ms: 5,
        ..AcquisitionConfig::default()
    }
}

/// How the scripted site behaves.
#[derive(Debug, Clone)]
pub struct FakeSite {
    pub form_present: bool,
    pub password_field_present: bool,
    pub submit_present: bool,
    /// Where the browser lands after submitting the form
    pub redirect_url: Option<String>,
    /// Storage contents once logged in
    pub storage: Vec<StorageEntry>,
    /// Requests the site issues on every page load once logged in
    pub api_requests: Vec<CapturedRequest>,
    pub fail_close: bool,
}

impl Default for FakeSite {
    fn default() -> Self {
        Self {
            form_present: true,
            password_field_present: true,
            submit_present: true,
            redirect_url: None,
            storage: Vec::new(),
            api_requests: Vec::new(),
            fail_close: false,
        }
    }
}

#[derive(Default)]
struct FakeState {
    url: Option<String>,
    logged_in: bool,
    visited: Vec<String>,
    typed: Vec<(String, String)>,
    clicks: Vec<String>,
    captured: Vec<CapturedRequest>,
    close_calls: usize,
}

/// In-memory [`BrowserSession`]. Clones share state, so a test can keep a
/// handle while the runner owns the session.
#[derive(Clone)]
pub struct FakeSession {
    site: Arc<FakeSite>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn complete_login(&self) {
        self.state.lock().unwrap().logged_in = true;
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = Some(url.to_owned());
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_owned());
        state.url = Some(url.to_owned());
        if state.logged_in {
            state.captured.extend(self.site.api_requests.iter().cloned());
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if selector == DEFAULT_PASSWORD_SELECTOR && !self.site.password_field_present {
            return Ok(false);
        }
        Ok(self.site.form_present && !state.logged_in)
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        if !self.site.form_present {
            return Err(anyhow!("element '{selector}' not found"));
        }
        self.state
            .lock()
            .unwrap()
            .typed
            .push((selector.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn click_via_script(&self, selector: &str) -> Result<bool> {
        if !self.site.form_present || (selector == DEFAULT_SUBMIT_SELECTOR && !self.site.submit_present) {
            return Ok(false);
        }
        let mut state = self.state.lock().unwrap();
        state.clicks.push(selector.to_owned());
        state.logged_in = true;
        if let Some(url) = &self.site.redirect_url {
            state.url = Some(url.clone());
        }
        Ok(true)
    }

    async fn storage_entries(&self) -> Result<Vec<StorageEntry>> {
        let state = self.state.lock().unwrap();
        Ok(if state.logged_in { self.site.storage.clone() } else { Vec::new() })
    }

    async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.lock().unwrap().captured.clone()
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().close_calls += 1;
        if self.site.fail_close {
            return Err(anyhow!("browser already gone"));
        }
        Ok(())
    }
}

/// Keyed by document, so repeated writes replace the single record.
#[derive(Default)]
pub struct MemorySink {
    document: String,
    records: Mutex<HashMap<String, TokenRecord>>,
    writes: Mutex<usize>,
    fail: bool,
}

impl MemorySink {
    pub fn new(document: &str) -> Self {
        Self {
            document: document.to_owned(),
            ..Self::default()
        }
    }

    pub fn failing(document: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(document)
        }
    }

    pub fn records(&self) -> HashMap<String, TokenRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl TokenSink for MemorySink {
    async fn write(&self, record: &TokenRecord) -> Result<WriteReceipt> {
        *self.writes.lock().unwrap() += 1;
        if self.fail {
            return Err(anyhow!("permission denied"));
        }
        self.records
            .lock()
            .unwrap()
            .insert(self.document.clone(), record.clone());
        Ok(WriteReceipt {
            document: self.document.clone(),
            updated_at: now(),
            expires_at: record.expires_at,
            commit_time: None,
        })
    }

    fn describe(&self) -> String {
        format!("memory {}", self.document)
    }
}
