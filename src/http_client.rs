use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 10;
// Batched analyses with a thinking budget can stream for several minutes.
const STREAM_TIMEOUT_SECS: u64 = 600;

static CLIENT: OnceCell<Client> = OnceCell::new();
static STREAM_CLIENT: OnceCell<Client> = OnceCell::new();

/// Client for small JSON requests (fixtures, single-shot completions).
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Client for long-lived streaming responses.
pub fn streaming_client() -> Result<&'static Client> {
    STREAM_CLIENT.get_or_try_init(|| {
        Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .build()
            .context("failed to build streaming http client")
    })
}
