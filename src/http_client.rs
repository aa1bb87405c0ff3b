use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Blocking client whose connect and overall timeouts bound every attempt.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent("pickem-ledger/0.1")
        .connect_timeout(timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}
