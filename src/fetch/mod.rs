// src/fetch/mod.rs
pub mod urls;
pub mod zips;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client used against the ANS servers. Certificate
/// validation is disabled because the PDA FTP frontend serves an unstable
/// chain; downloads are integrity-checked only by being parseable.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(180))
        .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0.0.0")
        .build()
        .context("building HTTP client")
}
