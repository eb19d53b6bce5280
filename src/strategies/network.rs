use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use tracing::debug;

use crate::browser::wait::{wait_until, WaitError};
use crate::browser::CapturedRequest;
use crate::config::settings::AcquisitionConfig;
use crate::strategies::{AcquisitionContext, AcquisitionStrategy, StrategyKind};
use crate::token::{Check, Token, TokenRules};

const BEARER_PREFIX: &str = "bearer ";

/// Visits an authenticated page and watches the site's own API calls for a
/// bearer `Authorization` header.
pub struct NetworkStrategy {
    authenticated_url: String,
    settle: Duration,
    poll: Duration,
}

impl NetworkStrategy {
    pub fn from_config(cfg: &AcquisitionConfig) -> Self {
        Self {
            authenticated_url: cfg.authenticated_url.clone(),
            settle: Duration::from_millis(cfg.network_settle_ms),
            poll: Duration::from_millis(cfg.poll_interval_ms),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for NetworkStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Network
    }

    async fn acquire(&self, ctx: &AcquisitionContext<'_>) -> Result<Option<Token>> {
        ctx.session.goto(&self.authenticated_url).await?;

        let session = ctx.session;
        let rules = ctx.rules;
        let found = wait_until("bearer authorization header", self.settle, self.poll, || async move {
            Ok(select_bearer_token(&session.captured_requests().await, rules))
        })
        .await;

        match found {
            Ok(token) => Ok(Some(token)),
            Err(WaitError::Timeout(t)) => {
                debug!("{t}");
                Ok(None)
            }
            Err(WaitError::Probe(e)) => Err(e),
        }
    }

    fn hint(&self) -> String {
        format!(
            "network: no request after visiting {} carried a Bearer token with the expected prefix and length",
            self.authenticated_url
        )
    }
}

/// First request whose `Authorization: Bearer <t>` passes prefix and length checks.
pub fn select_bearer_token(requests: &[CapturedRequest], rules: &TokenRules) -> Option<Token> {
    requests.iter().find_map(|request| {
        let value = request.header(AUTHORIZATION.as_str())?.trim();
        let scheme = value.get(..BEARER_PREFIX.len())?;
        if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
            return None;
        }
        rules.accept(&value[BEARER_PREFIX.len()..], &[Check::MinLength])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::common::{fast_acquisition_config, long_token, FakeSession, FakeSite};

    fn request(headers: &[(&str, &str)]) -> CapturedRequest {
        CapturedRequest::new(
            "https://api.wallstreetenglish.com/contractapi/contracts",
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn picks_bearer_value_with_prefix_and_length() {
        let token = long_token();
        let requests = vec![
            request(&[("accept", "application/json")]),
            request(&[("Authorization", "Bearer short")]),
            request(&[("authorization", &format!("Bearer {token}"))]),
        ];
        let found = select_bearer_token(&requests, &TokenRules::default()).unwrap();
        assert_eq!(found.as_str(), token);
    }

    #[test]
    fn ignores_non_bearer_schemes_and_wrong_prefix() {
        let padded = "x".repeat(200);
        let requests = vec![
            request(&[("Authorization", &format!("Basic eyJ{padded}"))]),
            request(&[("Authorization", &format!("Bearer abc{padded}"))]),
        ];
        assert!(select_bearer_token(&requests, &TokenRules::default()).is_none());
    }

    #[test]
    fn short_tokens_are_rejected_as_false_positives() {
        let requests = vec![request(&[("Authorization", "Bearer eyJabc.def.ghi")])];
        assert!(select_bearer_token(&requests, &TokenRules::default()).is_none());
    }

    #[tokio::test]
    async fn navigates_and_reads_captured_headers() {
        let cfg = fast_acquisition_config();
        let token = long_token();
        let session = FakeSession::new(FakeSite {
            api_requests: vec![request(&[("Authorization", &format!("Bearer {token}"))])],
            ..FakeSite::default()
        });
        session.complete_login();
        let rules = TokenRules::default();
        let ctx = AcquisitionContext { session: &session, landing_url: None, rules: &rules };

        let found = NetworkStrategy::from_config(&cfg).acquire(&ctx).await.unwrap();
        assert_eq!(found.unwrap().as_str(), token);
        assert_eq!(session.visited().last().map(String::as_str), Some(cfg.authenticated_url.as_str()));
    }

    #[tokio::test]
    async fn nothing_captured_yields_none_after_settle() {
        let cfg = fast_acquisition_config();
        let session = FakeSession::new(FakeSite::default());
        session.complete_login();
        let rules = TokenRules::default();
        let ctx = AcquisitionContext { session: &session, landing_url: None, rules: &rules };
        assert!(NetworkStrategy::from_config(&cfg).acquire(&ctx).await.unwrap().is_none());
    }
}
