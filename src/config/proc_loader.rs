use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_validator;
use crate::config::settings::{FetcherConfig, LoggingConfig};

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<FetcherConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<FetcherConfig> {
    let expanded = expand_env_vars(content);
    let mut config: FetcherConfig = if expanded.trim().is_empty() {
        FetcherConfig::default()
    } else {
        serde_yaml::from_str(&expanded).inspect_err(|e| error!("parse config error: {}", e))?
    };

    // Apply defaults
    if config.settings.logging.is_none() {
        config.settings.logging = Some(LoggingConfig::default());
    }

    debug!("validation config ...");
    proc_validator::validate_config(&config)
        .map_err(|errors| anyhow!("config is not valid: {}", errors.join("; ")))?;

    Ok(config)
}

/// Replace `${VAR}` and `${VAR:default}` with the environment value.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{LogFormat, PostLoginSignal};
    use crate::strategies::StrategyKind;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.login.url, "https://world.wallstreetenglish.com/login");
        assert_eq!(cfg.login.username_selector, "#login-user-name");
        assert_eq!(cfg.persistence.document_path, "config/wseToken");
        assert_eq!(cfg.persistence.ttl_hours, 10);
        assert_eq!(
            cfg.acquisition.strategies,
            vec![StrategyKind::Network, StrategyKind::Storage, StrategyKind::UrlRedirect]
        );
        assert!(cfg.settings.logging.is_some());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
login:
  post_login:
    type: delay
    delay_ms: 5000
acquisition:
  strategies: [url-redirect]
  token:
    min_length: 20
settings:
  logging:
    level: debug
    format: json
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.login.post_login, PostLoginSignal::Delay { delay_ms: 5000 });
        assert_eq!(cfg.login.password_selector, "#login-password");
        assert_eq!(cfg.acquisition.strategies, vec![StrategyKind::UrlRedirect]);
        assert_eq!(cfg.acquisition.token.prefix, "eyJ");
        assert_eq!(cfg.acquisition.token.min_length, 20);
        let logging = cfg.settings.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn env_placeholders_are_expanded_with_defaults() {
        std::env::set_var("WSE_TEST_LOGIN_HOST", "https://staging.example.com");
        std::env::remove_var("WSE_TEST_MISSING_MARKER");
        let yaml = r#"
login:
  url: "${WSE_TEST_LOGIN_HOST}/login"
acquisition:
  redirect_marker: "${WSE_TEST_MISSING_MARKER:autoLogin}"
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.login.url, "https://staging.example.com/login");
        assert_eq!(cfg.acquisition.redirect_marker, "autoLogin");
        std::env::remove_var("WSE_TEST_LOGIN_HOST");
    }

    #[test]
    fn invalid_config_reports_all_errors() {
        let yaml = r#"
login:
  url: "world.wallstreetenglish.com/login"
  field_timeout_ms: 0
acquisition:
  strategies: [storage, storage]
settings:
  retry:
    attempts: 0
    base_delay_ms: 500
    max_delay_ms: 100
persistence:
  document_path: "config"
"#;
        let err = parse_config(yaml).unwrap_err().to_string();
        assert!(err.starts_with("config is not valid"));
        assert!(err.contains("login.url"));
        assert!(err.contains("login.field_timeout_ms"));
        assert!(err.contains("duplicate strategy 'storage'"));
        assert!(err.contains("settings.retry.attempts"));
        assert!(err.contains("max_delay_ms"));
        assert!(err.contains("persistence.document_path"));
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        assert!(parse_config("acquisition:\n  strategies: [cookies]\n").is_err());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "persistence:\n  source_tag: nightly-job\n").unwrap();
        let cfg = file_to_config(file.path()).await.unwrap();
        assert_eq!(cfg.persistence.source_tag, "nightly-job");
    }

    #[test]
    #[serial]
    fn shipped_example_config_is_valid() {
        let cfg = parse_config(include_str!("../../wse-token-fetcher.example.yaml")).unwrap();
        assert_eq!(cfg.login.post_login, PostLoginSignal::default());
        assert_eq!(cfg.acquisition.network_settle_ms, 5000);
        assert_eq!(cfg.persistence.database, "(default)");
    }
}
