use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_retry::{strategy::ExponentialBackoff, Retry};

use crate::config::ApiConfig;
use crate::pricing::ProductQuote;
use crate::units::{parse_units_response, UnitRecord, UnitsResponse};

/// New price for one product of a unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub product_id: u64,
    pub price: f64,
}

/// Thin JSON client for the simulation's unit endpoints
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    attempts: usize,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("unit-manager/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build().context("Failed to create HTTP client")?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            attempts: config.attempts(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn retry_strategy(&self) -> impl Iterator<Item = std::time::Duration> {
        // first attempt is not a retry
        ExponentialBackoff::from_millis(100)
            .max_delay(std::time::Duration::from_secs(5))
            .take(self.attempts - 1)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        Retry::spawn(self.retry_strategy(), || async {
            let response = self
                .authorize(self.http.get(&url))
                .send()
                .await
                .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;
            let response = response
                .error_for_status()
                .map_err(|e| anyhow!("Server error for {}: {}", url, e))?;
            response
                .json::<T>()
                .await
                .with_context(|| format!("Invalid JSON from {}", url))
        })
        .await
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        Retry::spawn(self.retry_strategy(), || async {
            self.authorize(self.http.post(&url))
                .json(body)
                .send()
                .await
                .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?
                .error_for_status()
                .map_err(|e| anyhow!("Server error for {}: {}", url, e))?;
            Ok(())
        })
        .await
    }

    /// Fetch and parse the unit listing
    pub async fn fetch_units(&self) -> Result<Vec<UnitRecord>> {
        let response: UnitsResponse = self.get_json("units").await?;
        Ok(parse_units_response(&response))
    }

    /// Market quotes for every product a unit sells
    pub async fn fetch_quotes(&self, unit_id: u64) -> Result<Vec<ProductQuote>> {
        self.get_json(&format!("units/{}/products", unit_id)).await
    }

    pub async fn set_prices(&self, unit_id: u64, changes: &[PriceChange]) -> Result<()> {
        self.post_json(&format!("units/{}/prices", unit_id), &changes)
            .await
    }
}
