use anyhow::Result;
use async_trait::async_trait;

use crate::browser::StorageEntry;
use crate::config::settings::AcquisitionConfig;
use crate::strategies::{AcquisitionContext, AcquisitionStrategy, StrategyKind};
use crate::token::{Check, Token, TokenRules};

/// Reads `localStorage` and `sessionStorage` of the logged-in page.
pub struct StorageStrategy {
    conventional_keys: Vec<String>,
}

impl StorageStrategy {
    pub fn from_config(cfg: &AcquisitionConfig) -> Self {
        Self {
            conventional_keys: cfg.storage_keys.clone(),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for StorageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Storage
    }

    async fn acquire(&self, ctx: &AcquisitionContext<'_>) -> Result<Option<Token>> {
        let entries = ctx.session.storage_entries().await?;
        Ok(select_storage_token(&entries, &self.conventional_keys, ctx.rules))
    }

    fn hint(&self) -> String {
        format!(
            "storage: no value had the signed-token shape and none of the keys {:?} held a token",
            self.conventional_keys
        )
    }
}

/// Any value with prefix, length and signed shape wins; failing that, the
/// conventional keys are checked without the shape requirement.
pub fn select_storage_token(
    entries: &[StorageEntry],
    conventional_keys: &[String],
    rules: &TokenRules,
) -> Option<Token> {
    entries
        .iter()
        .find_map(|entry| rules.accept(unquote(&entry.value), &[Check::MinLength, Check::SignedShape]))
        .or_else(|| {
            conventional_keys.iter().find_map(|key| {
                entries
                    .iter()
                    .filter(|entry| &entry.key == key)
                    .find_map(|entry| rules.accept(unquote(&entry.value), &[Check::MinLength]))
            })
        })
}

/// Sites often store the token JSON-encoded, i.e. wrapped in quotes.
fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed)
}
