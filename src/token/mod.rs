//! Token acceptance rules.
//!
//! A candidate is only ever accepted whole: it must carry the signature
//! prefix, and depending on where it was found, exceed the minimum length
//! and/or have the three-segment `header.payload.signature` shape.

use std::fmt;

use serde::Deserialize;

use crate::utils::constants::{DEFAULT_TOKEN_MIN_LENGTH, DISPLAY_TOKEN_CHARS, TOKEN_SIGNATURE_PREFIX};

/// A validated learner token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form safe for logs.
    pub fn display(&self) -> String {
        truncate_for_display(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.display()).finish()
    }
}

pub fn truncate_for_display(value: &str) -> String {
    let head: String = value.chars().take(DISPLAY_TOKEN_CHARS).collect();
    format!("{head}...")
}

/// Extra checks on top of the prefix, which is always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    MinLength,
    SignedShape,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRules {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Candidates must be strictly longer than this
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

impl Default for TokenRules {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            min_length: default_min_length(),
        }
    }
}

impl TokenRules {
    pub fn accept(&self, candidate: &str, checks: &[Check]) -> Option<Token> {
        let candidate = candidate.trim();
        if candidate.is_empty() || !candidate.starts_with(&self.prefix) {
            return None;
        }
        for check in checks {
            let ok = match check {
                Check::MinLength => candidate.len() > self.min_length,
                Check::SignedShape => is_signed_shape(candidate),
            };
            if !ok {
                return None;
            }
        }
        Some(Token(candidate.to_owned()))
    }
}

/// Exactly three non-empty dot-separated segments.
pub fn is_signed_shape(candidate: &str) -> bool {
    let segments: Vec<&str> = candidate.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

fn default_prefix() -> String {
    TOKEN_SIGNATURE_PREFIX.to_owned()
}

fn default_min_length() -> usize {
    DEFAULT_TOKEN_MIN_LENGTH
}
