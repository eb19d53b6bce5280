//! Token acquisition strategies.
//!
//! Each strategy looks for the token in one place and answers `Some(token)`
//! or `None`. [`StrategyChain`] runs them in the configured order and stops
//! at the first token.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::config::settings::AcquisitionConfig;
use crate::errors::FetchError;
use crate::helpers::time::now;
use crate::token::{Token, TokenRules};
use crate::utils::constants::{METHOD_NETWORK, METHOD_STORAGE, METHOD_URL_REDIRECT};

pub mod network;
pub mod redirect;
pub mod storage;

use network::NetworkStrategy;
use redirect::RedirectStrategy;
use storage::StorageStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Network,
    Storage,
    UrlRedirect,
}

impl StrategyKind {
    /// Tag persisted in the record's `method` field.
    pub fn method_tag(&self) -> &'static str {
        match self {
            StrategyKind::Network => METHOD_NETWORK,
            StrategyKind::Storage => METHOD_STORAGE,
            StrategyKind::UrlRedirect => METHOD_URL_REDIRECT,
        }
    }
}

/// What a strategy may look at.
pub struct AcquisitionContext<'a> {
    pub session: &'a dyn BrowserSession,
    /// URL reached right after login, before any strategy navigated away
    pub landing_url: Option<&'a str>,
    pub rules: &'a TokenRules,
}

#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn acquire(&self, ctx: &AcquisitionContext<'_>) -> Result<Option<Token>>;

    /// Shown when the strategy found nothing.
    fn hint(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct AcquiredToken {
    pub token: Token,
    pub method: StrategyKind,
    pub acquired_at: DateTime<Utc>,
}

pub struct StrategyChain {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_config(cfg: &AcquisitionConfig) -> Result<Self> {
        let strategies = cfg
            .strategies
            .iter()
            .map(|kind| build_strategy(*kind, cfg))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(strategies))
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub async fn acquire(&self, ctx: &AcquisitionContext<'_>) -> Result<AcquiredToken, FetchError> {
        let mut tried = Vec::with_capacity(self.strategies.len());
        let mut hints = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            tried.push(kind.method_tag().to_owned());
            info!(strategy = kind.method_tag(), "trying acquisition strategy");

            match strategy.acquire(ctx).await {
                Ok(Some(token)) => {
                    info!(strategy = kind.method_tag(), token = %token.display(), "token acquired");
                    return Ok(AcquiredToken {
                        token,
                        method: kind,
                        acquired_at: now(),
                    });
                }
                Ok(None) => {
                    info!(strategy = kind.method_tag(), "no token found");
                    hints.push(strategy.hint());
                }
                Err(err) => {
                    warn!(strategy = kind.method_tag(), error = %format!("{err:#}"), "strategy failed");
                    hints.push(format!("{}: {:#}", kind.method_tag(), err));
                }
            }
        }

        Err(FetchError::Acquisition { tried, hints })
    }
}

pub fn build_strategy(kind: StrategyKind, cfg: &AcquisitionConfig) -> Result<Box<dyn AcquisitionStrategy>> {
    Ok(match kind {
        StrategyKind::Network => Box::new(NetworkStrategy::from_config(cfg)),
        StrategyKind::Storage => Box::new(StorageStrategy::from_config(cfg)),
        StrategyKind::UrlRedirect => Box::new(RedirectStrategy::from_config(cfg)?),
    })
}
