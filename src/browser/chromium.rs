//! Headless Chromium over CDP.
//!
//! Request headers are captured from `Network.requestWillBeSent` for the
//! whole life of the session, so the network strategy can inspect calls the
//! site made on its own.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, CapturedRequest, StorageEntry};
use crate::config::settings::BrowserSettings;

const STORAGE_DUMP_JS: &str = r#"(function() {
  const out = [];
  const dump = (area, store) => {
    try {
      for (let i = 0; i < store.length; i++) {
        const key = store.key(i);
        const value = store.getItem(key);
        if (key !== null && value !== null) out.push({ area, key, value });
      }
    } catch (_) {}
  };
  dump('local', window.localStorage);
  dump('session', window.sessionStorage);
  return out;
})()"#;

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    capture_task: JoinHandle<()>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    closed: bool,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.capture_task.abort();
        self.handler_task.abort();
    }
}

impl ChromiumSession {
    /// Launch with the primary binary, falling back once to the alternate one.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let candidates = launch_candidates(settings, find_chrome());
        if candidates.is_empty() {
            return Err(anyhow!(
                "Chrome/Chromium not found; set browser.executable or install chromium"
            ));
        }

        let mut last_error = None;
        for executable in &candidates {
            info!(executable = %executable, "launching browser");
            match Self::launch_with(executable, settings).await {
                Ok(session) => return Ok(session),
                Err(err) => {
                    warn!(executable = %executable, error = %format!("{err:#}"), "browser launch failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| anyhow!("no browser candidates"))
            .context(format!("could not launch any of {:?}", candidates)))
    }

    async fn launch_with(executable: &str, settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .viewport(Viewport {
                width: settings.window_width,
                height: settings.window_height,
                ..Default::default()
            })
            .request_timeout(Duration::from_millis(settings.request_timeout_ms))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to configure browser: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        match Self::open_page(&browser).await {
            Ok((page, requests, capture_task)) => Ok(Self {
                browser,
                page,
                handler_task,
                capture_task,
                requests,
                closed: false,
            }),
            Err(err) => {
                let _ = browser.close().await;
                handler_task.abort();
                Err(err)
            }
        }
    }

    async fn open_page(
        browser: &Browser,
    ) -> Result<(Page, Arc<Mutex<Vec<CapturedRequest>>>, JoinHandle<()>)> {
        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default())
            .await
            .context("failed to enable network events")?;

        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut events = page.event_listener::<EventRequestWillBeSent>().await?;
        let sink = requests.clone();
        let capture_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let captured = CapturedRequest::new(
                    event.request.url.clone(),
                    header_pairs(event.request.headers.inner()),
                );
                sink.lock().await.push(captured);
            }
        });
        Ok((page, requests, capture_task))
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T> {
        let value = self.page.evaluate(js).await?.into_value()?;
        Ok(value)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!(url = %url, "navigating");
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let js = format!("document.querySelector({}) !== null", serde_json::to_string(selector)?);
        self.evaluate(js).await
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element '{selector}' not found"))?;
        element.focus().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click_via_script(&self, selector: &str) -> Result<bool> {
        let js = format!(
            r#"(function(sel) {{
  const el = document.querySelector(sel);
  if (!el) return false;
  try {{ el.scrollIntoView({{ block: 'center' }}); }} catch (_) {{}}
  el.click();
  return true;
}})({})"#,
            serde_json::to_string(selector)?
        );
        self.evaluate(js).await
    }

    async fn storage_entries(&self) -> Result<Vec<StorageEntry>> {
        self.evaluate(STORAGE_DUMP_JS.to_owned()).await
    }

    async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.capture_task.abort();
        let closed = self.browser.close().await.map(|_| ());
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        closed.context("browser close failed")
    }
}

/// Binaries to try in order: configured (or discovered) primary, then the fallback.
pub fn launch_candidates(settings: &BrowserSettings, discovered: Option<String>) -> Vec<String> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(primary) = settings.executable.clone().or(discovered) {
        candidates.push(primary);
    }
    if let Some(fallback) = &settings.fallback_executable {
        if !candidates.contains(fallback) {
            candidates.push(fallback.clone());
        }
    }
    candidates
}

fn header_pairs(headers: &Value) -> Vec<(String, String)> {
    headers
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect()
        })
        .unwrap_or_default()
}

/// Find Chrome/Chromium executable.
pub fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(str::to_string)
}
