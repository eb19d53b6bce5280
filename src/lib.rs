//! # WSE Token Fetcher
//!
//! Logs into the Wall Street English learner site with a headless browser,
//! extracts the learner's bearer token, and stores it together with its
//! expiry in a single Firestore document for downstream consumers.
//!
//! Modules:
//! - `config` — YAML settings, validation and environment credentials
//! - `browser` — browser session seam and the Chromium implementation
//! - `auth` — login flow
//! - `strategies` — network, storage and url-redirect token acquisition
//! - `sinks` — token record persistence (Firestore)
//! - `runner` — one run end to end, teardown included

pub mod auth;
pub mod browser;
pub mod config;
pub mod errors;
pub mod helpers;
pub mod resilience;
pub mod runner;
pub mod sinks;
pub mod strategies;
pub mod token;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::errors::FetchError;
pub use crate::runner::{RunReport, TokenFetcher};
