//! Login flow: open the form, type the credentials, submit, and wait for the
//! post-login signal.

use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::browser::wait::{wait_until, WaitError};
use crate::browser::BrowserSession;
use crate::config::credentials::Credentials;
use crate::config::settings::{LoginConfig, PostLoginSignal};
use crate::errors::FetchError;

/// Where the browser ended up after submitting the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub landing_url: Option<String>,
}

pub async fn authenticate(
    session: &dyn BrowserSession,
    cfg: &LoginConfig,
    credentials: &Credentials,
) -> Result<LoginOutcome, FetchError> {
    let poll = Duration::from_millis(cfg.poll_interval_ms);

    info!(url = %cfg.url, "opening login page");
    session
        .goto(&cfg.url)
        .await
        .map_err(FetchError::Authentication)?;

    let username_selector = cfg.username_selector.as_str();
    wait_until(
        &format!("login field '{}'", username_selector),
        Duration::from_millis(cfg.field_timeout_ms),
        poll,
        || async move {
            Ok(session.element_exists(username_selector).await?.then_some(()))
        },
    )
    .await
    .map_err(|err| match err {
        WaitError::Timeout(t) => FetchError::Authentication(anyhow!("login form did not appear: {t}")),
        WaitError::Probe(e) => FetchError::Authentication(e),
    })?;

    if !session
        .element_exists(&cfg.password_selector)
        .await
        .map_err(FetchError::Authentication)?
    {
        return Err(FetchError::Authentication(anyhow!(
            "password field '{}' not found",
            cfg.password_selector
        )));
    }

    session
        .type_into(&cfg.username_selector, &credentials.username)
        .await
        .map_err(FetchError::Authentication)?;
    session
        .type_into(&cfg.password_selector, credentials.password())
        .await
        .map_err(FetchError::Authentication)?;
    debug!("credentials entered");

    let clicked = session
        .click_via_script(&cfg.submit_selector)
        .await
        .map_err(FetchError::Authentication)?;
    if !clicked {
        return Err(FetchError::Authentication(anyhow!(
            "submit control '{}' not found",
            cfg.submit_selector
        )));
    }
    info!("login form submitted");

    let landing_url = match &cfg.post_login {
        PostLoginSignal::UrlContains { marker, timeout_ms } => {
            let marker = marker.as_str();
            let url = wait_until(
                &format!("url containing '{}'", marker),
                Duration::from_millis(*timeout_ms),
                poll,
                || async move {
                    let url = session.current_url().await?;
                    Ok(url.filter(|u| u.contains(marker)))
                },
            )
            .await
            .map_err(|err| match err {
                WaitError::Timeout(t) => FetchError::LoginTimeout(t),
                WaitError::Probe(e) => FetchError::Authentication(e),
            })?;
            Some(url)
        }
        PostLoginSignal::Delay { delay_ms } => {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            session
                .current_url()
                .await
                .map_err(FetchError::Authentication)?
        }
    };

    info!("login acknowledged");
    Ok(LoginOutcome { landing_url })
}
