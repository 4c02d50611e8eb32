//! Upstream option-chain HTTP client.

use crate::error::DataError;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default upstream host serving the option-chain API.
pub const DEFAULT_BASE_URL: &str = "https://www.nseindia.com";

/// Hard deadline for each request; the cycle aborts on expiry, no retry.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

// The upstream rejects non-browser clients
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Identifies one upstream option chain: a symbol plus the index-vs-equity
/// endpoint family. Doubles as the cache key.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChainKey {
    pub symbol: String,
    pub is_index: bool,
}

impl ChainKey {
    /// Build a key; the symbol is trimmed and upper-cased.
    pub fn new(symbol: impl AsRef<str>, is_index: bool) -> Self {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase(),
            is_index,
        }
    }

    pub fn index(symbol: impl AsRef<str>) -> Self {
        Self::new(symbol, true)
    }

    pub fn equity(symbol: impl AsRef<str>) -> Self {
        Self::new(symbol, false)
    }

    /// Endpoint family name.
    pub fn family(&self) -> &'static str {
        if self.is_index { "index" } else { "equity" }
    }
}

impl std::fmt::Display for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.symbol, self.family())
    }
}

/// HTTP client for raw option-chain documents.
///
/// The upstream wants a browser-shaped session: a warm-up request on the HTML
/// chain page hands out the cookies the JSON API then requires.
#[derive(Clone, Debug)]
pub struct ChainClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChainClient {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en,hi;q=0.9"));

        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|error| DataError::Fetch(format!("failed to build http client: {error}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch the raw chain document for `key`.
    ///
    /// Transport errors, timeouts, and non-2xx statuses all map to
    /// [`DataError::Fetch`] with a single human-readable message.
    pub async fn fetch(&self, key: &ChainKey) -> Result<Value, DataError> {
        // Warm-up request to obtain session cookies; its status is irrelevant
        let warm_up_url = format!("{}/option-chain", self.base_url);
        self.http.get(&warm_up_url).send().await.map_err(|error| {
            DataError::Fetch(format!("warm-up request failed ({key}): {error}"))
        })?;

        let api_url = if key.is_index {
            format!(
                "{}/api/option-chain-indices?symbol={}",
                self.base_url, key.symbol
            )
        } else {
            format!(
                "{}/api/option-chain-equities?symbol={}",
                self.base_url, key.symbol
            )
        };
        debug!(%key, %api_url, "fetching option chain");

        let response = self.http.get(&api_url).send().await.map_err(|error| {
            DataError::Fetch(format!("option chain request failed ({key}): {error}"))
        })?;

        if let Err(status_error) = response.error_for_status_ref() {
            return Err(DataError::Fetch(format!(
                "option chain request rejected ({key}): {status_error}"
            )));
        }

        response.json::<Value>().await.map_err(|error| {
            DataError::Fetch(format!("option chain response not JSON ({key}): {error}"))
        })
    }
}
