//! Configuration validation with aggregated errors.
//! Every issue found is reported at once instead of failing on the first.

use std::collections::HashSet;

use crate::config::settings::{
    AcquisitionConfig, FetcherConfig, LoginConfig, PersistenceConfig, PostLoginSignal, RetryConfig,
};
use crate::utils::constants::MAX_TTL_HOURS;

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_config(cfg: &FetcherConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    if let Some(retry) = &cfg.settings.retry {
        validate_retry(retry, &mut errors);
    }
    if let Some(logging) = &cfg.settings.logging {
        let allowed = ["trace", "debug", "info", "warn", "error"];
        if !allowed.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, allowed
            ));
        }
    }
    if cfg.browser.window_width == 0 || cfg.browser.window_height == 0 {
        errors.push("browser window size must be non-zero".to_string());
    }
    validate_login(&cfg.login, &mut errors);
    validate_acquisition(&cfg.acquisition, &mut errors);
    validate_persistence(&cfg.persistence, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_login(login: &LoginConfig, errors: &mut Vec<String>) {
    check_url("login.url", &login.url, errors);
    for (name, selector) in [
        ("login.username_selector", &login.username_selector),
        ("login.password_selector", &login.password_selector),
        ("login.submit_selector", &login.submit_selector),
        ("login.username_env", &login.username_env),
        ("login.password_env", &login.password_env),
    ] {
        if selector.trim().is_empty() {
            errors.push(format!("{} must not be empty", name));
        }
    }
    check_positive("login.field_timeout_ms", login.field_timeout_ms, errors);
    check_positive("login.poll_interval_ms", login.poll_interval_ms, errors);
    if let PostLoginSignal::UrlContains { marker, timeout_ms } = &login.post_login {
        if marker.trim().is_empty() {
            errors.push("login.post_login.marker must not be empty".to_string());
        }
        check_positive("login.post_login.timeout_ms", *timeout_ms, errors);
    }
}

fn validate_acquisition(acq: &AcquisitionConfig, errors: &mut Vec<String>) {
    if acq.strategies.is_empty() {
        errors.push("acquisition.strategies is empty; at least one strategy required".to_string());
    }
    let mut seen = HashSet::new();
    for kind in &acq.strategies {
        if !seen.insert(kind) {
            errors.push(format!(
                "acquisition.strategies: duplicate strategy '{}'",
                kind.method_tag()
            ));
        }
    }
    check_url("acquisition.authenticated_url", &acq.authenticated_url, errors);
    if acq.redirect_marker.trim().is_empty() {
        errors.push("acquisition.redirect_marker must not be empty".to_string());
    }
    check_positive("acquisition.network_settle_ms", acq.network_settle_ms, errors);
    check_positive("acquisition.redirect_timeout_ms", acq.redirect_timeout_ms, errors);
    check_positive("acquisition.poll_interval_ms", acq.poll_interval_ms, errors);
    if acq.token.prefix.is_empty() {
        errors.push("acquisition.token.prefix must not be empty".to_string());
    }
}

fn validate_persistence(p: &PersistenceConfig, errors: &mut Vec<String>) {
    let segments: Vec<&str> = p.document_path.split('/').collect();
    if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        errors.push(format!(
            "persistence.document_path '{}' must be collection/document pairs",
            p.document_path
        ));
    }
    if p.ttl_hours <= 0 || p.ttl_hours > MAX_TTL_HOURS {
        errors.push(format!(
            "persistence.ttl_hours ({}) must be within 1..={}",
            p.ttl_hours, MAX_TTL_HOURS
        ));
    }
    if p.source_tag.trim().is_empty() {
        errors.push("persistence.source_tag must not be empty".to_string());
    }
    if let Some(base_url) = &p.base_url {
        check_url("persistence.base_url", base_url, errors);
    }
    check_positive("persistence.http_timeout_ms", p.http_timeout_ms, errors);
}

fn check_url(name: &str, value: &str, errors: &mut Vec<String>) {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an absolute http(s) URL", name, value));
    }
}

fn check_positive(name: &str, value: u64, errors: &mut Vec<String>) {
    if value == 0 {
        errors.push(format!("{} must be > 0", name));
    }
}
