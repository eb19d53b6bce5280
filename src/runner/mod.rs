//! One fetch run: log in, acquire, persist, and always tear the browser down.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::auth::authenticate;
use crate::browser::BrowserSession;
use crate::config::credentials::Credentials;
use crate::config::settings::FetcherConfig;
use crate::errors::FetchError;
use crate::helpers::time::{expires_at, get_instant};
use crate::sinks::{TokenRecord, TokenSink, WriteReceipt};
use crate::strategies::{AcquisitionContext, StrategyChain, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    LoggingIn,
    ExtractingToken,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::LoggingIn => "logging-in",
            RunState::ExtractingToken => "extracting-token",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run. The token only appears truncated.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub method: StrategyKind,
    pub token_preview: String,
    /// `None` on a dry run
    pub receipt: Option<WriteReceipt>,
    pub final_state: RunState,
}

pub struct TokenFetcher {
    config: FetcherConfig,
    chain: StrategyChain,
    sink: Option<Arc<dyn TokenSink>>,
}

impl TokenFetcher {
    /// Without a sink the run stops after acquisition (dry run).
    pub fn new(config: FetcherConfig, sink: Option<Arc<dyn TokenSink>>) -> Result<Self, FetchError> {
        let chain = StrategyChain::from_config(&config.acquisition).map_err(FetchError::Config)?;
        Ok(Self { config, chain, sink })
    }

    /// Drives `session` through the run and closes it exactly once, whatever
    /// happened. Teardown failures are logged and swallowed.
    pub async fn run<S: BrowserSession>(
        &self,
        mut session: S,
        credentials: &Credentials,
    ) -> Result<RunReport, FetchError> {
        let started = get_instant();
        let mut state = RunState::Init;

        let result = self.drive(&session, credentials, &mut state).await;
        if let Err(err) = &result {
            error!(state = %state, category = err.category(), "run failed: {err}");
            transition(&mut state, RunState::Failed);
        }

        if let Err(err) = session.close().await {
            warn!(error = %format!("{err:#}"), "browser teardown failed");
        } else {
            debug!("browser closed");
        }

        info!(state = %state, elapsed_ms = started.elapsed().as_millis() as u64, "run finished");
        result
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        credentials: &Credentials,
        state: &mut RunState,
    ) -> Result<RunReport, FetchError> {
        transition(state, RunState::LoggingIn);
        let outcome = authenticate(session, &self.config.login, credentials).await?;

        transition(state, RunState::ExtractingToken);
        let ctx = AcquisitionContext {
            session,
            landing_url: outcome.landing_url.as_deref(),
            rules: &self.config.acquisition.token,
        };
        let acquired = self.chain.acquire(&ctx).await?;
        let token_preview = acquired.token.display();

        let Some(sink) = &self.sink else {
            info!(method = acquired.method.method_tag(), token = %token_preview, "dry run: record not written");
            transition(state, RunState::Done);
            return Ok(RunReport {
                method: acquired.method,
                token_preview,
                receipt: None,
                final_state: *state,
            });
        };

        transition(state, RunState::Persisting);
        let persistence = &self.config.persistence;
        let expires_at = expires_at(acquired.acquired_at, persistence.ttl_hours).ok_or_else(|| {
            FetchError::Persistence(anyhow!(
                "ttl of {} hours puts the expiry out of range",
                persistence.ttl_hours
            ))
        })?;
        let record = TokenRecord {
            token: acquired.token,
            expires_at,
            source: persistence.source_tag.clone(),
            method: acquired.method,
        };
        info!(sink = %sink.describe(), expires_at = %record.expires_at, "persisting token");
        let receipt = sink.write(&record).await.map_err(FetchError::Persistence)?;

        transition(state, RunState::Done);
        Ok(RunReport {
            method: record.method,
            token_preview,
            receipt: Some(receipt),
            final_state: *state,
        })
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "run state");
    *state = next;
}
