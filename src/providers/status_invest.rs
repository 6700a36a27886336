use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{http_client, number_to_decimal};
use crate::core::config::StatusInvestProviderConfig;
use crate::core::{ProviderError, QuoteProvider};

const PROVIDER_ID: &str = "STATUS_INVEST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Equity,
    RealEstateFund,
    Other,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AssetKind::Equity => "Equity",
            AssetKind::RealEstateFund => "Real estate fund",
            AssetKind::Other => "Other",
        };
        f.write_str(label)
    }
}

/// A ticker matching a search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub ticker: String,
    pub name: String,
    pub kind: AssetKind,
}

/// One search result. The service is loose about field types, so a field of an unexpected
/// shape reads as absent instead of failing the whole response.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct SearchItem {
    #[serde(deserialize_with = "lenient")]
    code: Option<String>,
    #[serde(deserialize_with = "lenient")]
    ticker: Option<String>,
    #[serde(rename = "normalizedName", deserialize_with = "lenient")]
    normalized_name: Option<String>,
    #[serde(rename = "nameFormated", deserialize_with = "lenient")]
    name_formatted: Option<String>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    price: Option<Value>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl SearchItem {
    fn ticker(&self) -> Option<&str> {
        self.code
            .as_deref()
            .or(self.ticker.as_deref())
            .or(self.normalized_name.as_deref())
            .filter(|t| !t.is_empty())
    }

    fn price(&self) -> Option<Decimal> {
        match self.price.as_ref()? {
            Value::Number(n) => number_to_decimal(n),
            Value::String(s) => parse_local_decimal(s),
            _ => None,
        }
    }

    fn kind(&self) -> AssetKind {
        let code = match self.kind.as_ref() {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match code {
            Some(k) if k == 1.0 => AssetKind::Equity,
            Some(k) if k == 2.0 => AssetKind::RealEstateFund,
            _ => AssetKind::Other,
        }
    }
}

/// Parses prices such as `156,92` or `1.234,56`.
fn parse_local_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized.parse().ok()
}

/// Quotes and ticker search backed by the StatusInvest search endpoint.
#[derive(Clone)]
pub struct StatusInvestProvider {
    base_url: String,
    client: Client,
}

impl StatusInvestProvider {
    pub fn new(config: &StatusInvestProviderConfig, timeout: Duration) -> Self {
        StatusInvestProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }

    async fn query(&self, q: &str) -> Result<Vec<SearchItem>, ProviderError> {
        let endpoint = format!("{}/home/mainsearchquery", self.base_url);
        let url = Url::parse_with_params(&endpoint, &[("q", q)]).map_err(|e| {
            ProviderError::unavailable(PROVIDER_ID, format!("Failed to build URL: {e}"))
        })?;
        debug!("Requesting search results from {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("Referer", "https://statusinvest.com.br/")
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(PROVIDER_ID, format!("Request error: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::rate_limited(PROVIDER_ID));
        }
        if !status.is_success() {
            return Err(ProviderError::unavailable(
                PROVIDER_ID,
                format!("HTTP error: {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::unavailable(PROVIDER_ID, e.to_string()))?;
        let items: Vec<Value> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::malformed(PROVIDER_ID, format!("Failed to parse JSON for '{q}': {e}"))
        })?;
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<SearchItem>(item) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!("Skipping search result for '{q}': {e}");
                    None
                }
            })
            .collect())
    }

    /// Tickers matching `query`, in the order the service ranks them.
    pub async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ProviderError> {
        let items = self.query(query).await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                let ticker = item.ticker()?.to_string();
                Some(Suggestion {
                    ticker,
                    name: item
                        .name_formatted
                        .clone()
                        .or_else(|| item.name.clone())
                        .unwrap_or_default(),
                    kind: item.kind(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl QuoteProvider for StatusInvestProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    #[instrument(
        name = "StatusInvestPriceFetch",
        skip(self),
        fields(ticker = %ticker)
    )]
    async fn fetch_price(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        let items = self.query(ticker).await?;
        if items.is_empty() {
            return Err(ProviderError::unavailable(PROVIDER_ID, "no results found"));
        }
        items
            .iter()
            .filter(|item| {
                item.ticker()
                    .is_some_and(|t| t.eq_ignore_ascii_case(ticker))
            })
            .find_map(SearchItem::price)
            .ok_or_else(|| {
                ProviderError::unavailable(PROVIDER_ID, format!("price not found for {ticker}"))
            })
    }
}
