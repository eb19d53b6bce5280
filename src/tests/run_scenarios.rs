#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use crate::browser::{CapturedRequest, StorageArea, StorageEntry};
    use crate::config::credentials::Credentials;
    use crate::config::settings::FetcherConfig;
    use crate::errors::FetchError;
    use crate::helpers::time::now;
    use crate::runner::{RunState, TokenFetcher};
    use crate::sinks::TokenSink;
    use crate::strategies::StrategyKind;
    use crate::tests::common::{
        fast_acquisition_config, fast_login_config, long_token, FakeSession, FakeSite, MemorySink,
    };

    const DOCUMENT: &str = "config/wseToken";
    const REDIRECT: &str = "https://world.wallstreetenglish.com/autoLogin/eyJabc.def.ghi";

    fn config() -> FetcherConfig {
        FetcherConfig {
            login: fast_login_config(),
            acquisition: fast_acquisition_config(),
            ..FetcherConfig::default()
        }
    }

    fn creds() -> Credentials {
        Credentials::new("learner@example.com", "s3cret")
    }

    fn fetcher(cfg: FetcherConfig, sink: &Arc<MemorySink>) -> TokenFetcher {
        let sink: Arc<dyn TokenSink> = sink.clone();
        TokenFetcher::new(cfg, Some(sink)).unwrap()
    }

    #[tokio::test]
    async fn redirect_token_is_persisted_with_ten_hour_expiry() {
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            ..FakeSite::default()
        });

        let before = now();
        let report = fetcher(config(), &sink).run(session.clone(), &creds()).await.unwrap();

        assert_eq!(report.method, StrategyKind::UrlRedirect);
        assert_eq!(report.final_state, RunState::Done);
        let receipt = report.receipt.unwrap();
        let records = sink.records();
        let record = &records[DOCUMENT];
        assert_eq!(record.token.as_str(), "eyJabc.def.ghi");
        assert_eq!(record.method, StrategyKind::UrlRedirect);
        assert_eq!(record.source, "headless-login");

        let ttl = record.expires_at - receipt.updated_at;
        assert!((ttl - ChronoDuration::hours(10)).num_seconds().abs() <= 5, "ttl was {ttl}");
        assert!(record.expires_at >= before + ChronoDuration::hours(10));
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn missing_redirect_fails_without_writing() {
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some("https://world.wallstreetenglish.com/login?failed=1".into()),
            ..FakeSite::default()
        });

        let err = fetcher(config(), &sink).run(session.clone(), &creds()).await.unwrap_err();

        assert!(matches!(err, FetchError::LoginTimeout(_)));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(sink.writes(), 0);
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn storage_token_found_when_redirect_carries_none() {
        let token = format!("eyJ{}.x.y", "a".repeat(130));
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some("https://world.wallstreetenglish.com/autoLogin/".into()),
            storage: vec![
                StorageEntry::new(StorageArea::Local, "foo", "bar"),
                StorageEntry::new(StorageArea::Local, "token", token.clone()),
            ],
            ..FakeSite::default()
        });

        let report = fetcher(config(), &sink).run(session, &creds()).await.unwrap();

        assert_eq!(report.method, StrategyKind::Storage);
        assert_eq!(sink.records()[DOCUMENT].token.as_str(), token);
        assert!(report.token_preview.ends_with("..."));
        assert!(!report.token_preview.contains(&"a".repeat(40)));
    }

    #[tokio::test]
    async fn network_strategy_runs_first_by_default() {
        let token = long_token();
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            api_requests: vec![CapturedRequest::new(
                "https://api.wallstreetenglish.com/me",
                vec![("authorization".into(), format!("Bearer {token}"))],
            )],
            ..FakeSite::default()
        });

        let report = fetcher(config(), &sink).run(session, &creds()).await.unwrap();

        assert_eq!(report.method, StrategyKind::Network);
        assert_eq!(sink.records()[DOCUMENT].token.as_str(), token);
    }

    #[tokio::test]
    async fn teardown_runs_once_whichever_step_fails() {
        // login form never renders
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite { form_present: false, ..FakeSite::default() });
        let err = fetcher(config(), &sink).run(session.clone(), &creds()).await.unwrap_err();
        assert!(matches!(err, FetchError::Authentication(_)));
        assert_eq!(session.close_calls(), 1);

        // logged in, but no strategy finds anything
        let session = FakeSession::new(FakeSite {
            redirect_url: Some("https://world.wallstreetenglish.com/autoLogin/".into()),
            ..FakeSite::default()
        });
        let err = fetcher(config(), &sink).run(session.clone(), &creds()).await.unwrap_err();
        assert!(matches!(err, FetchError::Acquisition { .. }));
        assert_eq!(err.exit_code(), 5);
        assert_eq!(session.close_calls(), 1);

        // store rejects the write
        let failing = Arc::new(MemorySink::failing(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            ..FakeSite::default()
        });
        let err = fetcher(config(), &failing).run(session.clone(), &creds()).await.unwrap_err();
        assert!(matches!(err, FetchError::Persistence(_)));
        assert!(failing.records().is_empty());
        assert_eq!(session.close_calls(), 1);

        assert_eq!(sink.writes(), 0);
    }

    #[tokio::test]
    async fn out_of_range_ttl_fails_persisting_and_still_tears_down() {
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            ..FakeSite::default()
        });
        let mut cfg = config();
        cfg.persistence.ttl_hours = 3_000_000_000;

        let err = fetcher(cfg, &sink).run(session.clone(), &creds()).await.unwrap_err();

        assert!(matches!(err, FetchError::Persistence(_)));
        assert_eq!(err.exit_code(), 6);
        assert_eq!(sink.writes(), 0);
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn teardown_error_does_not_mask_the_outcome() {
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            fail_close: true,
            ..FakeSite::default()
        });

        let report = fetcher(config(), &sink).run(session.clone(), &creds()).await.unwrap();

        assert_eq!(report.final_state, RunState::Done);
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_runs_overwrite_the_single_record() {
        let sink = Arc::new(MemorySink::new(DOCUMENT));
        let second_token = format!("eyJ{}.x.y", "b".repeat(130));

        let first = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            ..FakeSite::default()
        });
        fetcher(config(), &sink).run(first, &creds()).await.unwrap();

        let second = FakeSession::new(FakeSite {
            redirect_url: Some("https://world.wallstreetenglish.com/autoLogin/".into()),
            storage: vec![StorageEntry::new(StorageArea::Session, "wse_auth_token", second_token.clone())],
            ..FakeSite::default()
        });
        fetcher(config(), &sink).run(second, &creds()).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[DOCUMENT].token.as_str(), second_token);
        assert_eq!(records[DOCUMENT].method, StrategyKind::Storage);
        assert_eq!(sink.writes(), 2);
    }

    #[tokio::test]
    async fn dry_run_acquires_without_a_sink() {
        let session = FakeSession::new(FakeSite {
            redirect_url: Some(REDIRECT.into()),
            ..FakeSite::default()
        });
        let report = TokenFetcher::new(config(), None)
            .unwrap()
            .run(session.clone(), &creds())
            .await
            .unwrap();

        assert!(report.receipt.is_none());
        assert_eq!(report.method, StrategyKind::UrlRedirect);
        assert_eq!(session.close_calls(), 1);
    }
}
