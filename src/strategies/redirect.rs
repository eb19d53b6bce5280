use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::browser::wait::{wait_until, WaitError};
use crate::config::settings::AcquisitionConfig;
use crate::strategies::{AcquisitionContext, AcquisitionStrategy, StrategyKind};
use crate::token::{Check, Token, TokenRules};

/// Pulls the token out of the post-login redirect URL (`.../autoLogin/<token>`).
pub struct RedirectStrategy {
    marker: String,
    pattern: Regex,
    timeout: Duration,
    poll: Duration,
}

impl RedirectStrategy {
    pub fn from_config(cfg: &AcquisitionConfig) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"{}/({}[A-Za-z0-9_\-.]+)",
            regex::escape(&cfg.redirect_marker),
            regex::escape(&cfg.token.prefix)
        ))
        .context("invalid redirect pattern")?;
        Ok(Self {
            marker: cfg.redirect_marker.clone(),
            pattern,
            timeout: Duration::from_millis(cfg.redirect_timeout_ms),
            poll: Duration::from_millis(cfg.poll_interval_ms),
        })
    }

    pub fn extract(&self, url: &str, rules: &TokenRules) -> Option<Token> {
        let candidate = self.pattern.captures(url)?.get(1)?.as_str();
        rules.accept(candidate, &[Check::SignedShape])
    }
}

#[async_trait]
impl AcquisitionStrategy for RedirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UrlRedirect
    }

    async fn acquire(&self, ctx: &AcquisitionContext<'_>) -> Result<Option<Token>> {
        let marker = self.marker.as_str();
        let landing = ctx.landing_url.filter(|url| url.contains(marker)).map(str::to_owned);

        let url = match landing {
            Some(url) => url,
            None => {
                let session = ctx.session;
                let waited = wait_until(
                    &format!("url containing '{}'", marker),
                    self.timeout,
                    self.poll,
                    || async move { Ok(session.current_url().await?.filter(|u| u.contains(marker))) },
                )
                .await;
                match waited {
                    Ok(url) => url,
                    Err(WaitError::Timeout(t)) => {
                        debug!("{t}");
                        return Ok(None);
                    }
                    Err(WaitError::Probe(e)) => return Err(e),
                }
            }
        };

        Ok(self.extract(&url, ctx.rules))
    }

    fn hint(&self) -> String {
        format!(
            "url-redirect: no URL containing '{}/' followed by a three-segment token was reached",
            self.marker
        )
    }
}
