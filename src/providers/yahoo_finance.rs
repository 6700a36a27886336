use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{http_client, number_to_decimal};
use crate::core::config::YahooProviderConfig;
use crate::core::{ProviderError, QuoteProvider, RetryPolicy, with_retry};
use std::time::Duration;

const PROVIDER_ID: &str = "YAHOO";

pub struct YahooFinanceProvider {
    base_url: String,
    symbol_suffix: Option<String>,
    retry: RetryPolicy,
    client: Client,
}

impl YahooFinanceProvider {
    pub fn new(config: &YahooProviderConfig, timeout: Duration) -> Self {
        YahooFinanceProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbol_suffix: config.symbol_suffix.clone(),
            retry: RetryPolicy::fixed(
                config.max_attempts,
                Duration::from_millis(config.retry_delay_ms),
            ),
            client: http_client(timeout),
        }
    }

    /// Exchange-qualified symbol: tickers without a `.` get the configured suffix.
    fn symbol(&self, ticker: &str) -> String {
        match &self.symbol_suffix {
            Some(suffix) if !ticker.contains('.') => format!("{ticker}{suffix}"),
            _ => ticker.to_string(),
        }
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );
        debug!("Requesting price data from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("Referer", "https://finance.yahoo.com/")
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
        let data: YahooPriceResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::malformed(PROVIDER_ID, format!("Failed to parse JSON for {symbol}: {e}"))
        })?;

        let meta = data
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|item| item.meta)
            .ok_or_else(|| {
                ProviderError::malformed(PROVIDER_ID, format!("No price data found for {symbol}"))
            })?;

        meta.regular_market_price
            .or(meta.previous_close)
            .as_ref()
            .and_then(number_to_decimal)
            .ok_or_else(|| {
                ProviderError::malformed(PROVIDER_ID, format!("Price not found for {symbol}"))
            })
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<serde_json::Number>,
    #[serde(rename = "previousClose")]
    previous_close: Option<serde_json::Number>,
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// Fetches the market price, retrying only while the API rate limits us.
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(ticker = %ticker)
    )]
    async fn fetch_price(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        let symbol = self.symbol(ticker);
        with_retry(&self.retry, ProviderError::is_retryable, || {
            self.fetch_once(&symbol)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, max_attempts: usize) -> YahooFinanceProvider {
        let config = YahooProviderConfig {
            base_url: server.uri(),
            symbol_suffix: Some(".SA".to_string()),
            max_attempts,
            retry_delay_ms: 0,
        };
        YahooFinanceProvider::new(&config, Duration::from_secs(5))
    }

    async fn mount(server: &MockServer, symbol: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_price_fetch_appends_suffix() {
        let server = MockServer::start().await;
        let body = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 38.45, "currency": "BRL"}}]}}"#;
        mount(&server, "PETR4.SA", ResponseTemplate::new(200).set_body_string(body)).await;

        let price = provider(&server, 2).fetch_price("PETR4").await.unwrap();
        assert_eq!(price, dec!(38.45));
    }

    #[tokio::test]
    async fn test_qualified_symbol_is_kept() {
        let server = MockServer::start().await;
        let body = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 212}}]}}"#;
        mount(&server, "AAPL.US", ResponseTemplate::new(200).set_body_string(body)).await;

        let price = provider(&server, 1).fetch_price("AAPL.US").await.unwrap();
        assert_eq!(price, dec!(212));
    }

    #[tokio::test]
    async fn test_falls_back_to_previous_close() {
        let server = MockServer::start().await;
        let body = r#"{"chart": {"result": [{"meta": {"previousClose": 61.2}}]}}"#;
        mount(&server, "VALE3.SA", ResponseTemplate::new(200).set_body_string(body)).await;

        let price = provider(&server, 1).fetch_price("VALE3").await.unwrap();
        assert_eq!(price, dec!(61.2));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ITUB4.SA"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let err = provider(&server, 2).fetch_price("ITUB4").await.unwrap_err();
        assert_eq!(err, ProviderError::rate_limited(PROVIDER_ID));
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BBAS3.SA"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let body = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 27.1}}]}}"#;
        mount(&server, "BBAS3.SA", ResponseTemplate::new(200).set_body_string(body)).await;

        let price = provider(&server, 2).fetch_price("BBAS3").await.unwrap();
        assert_eq!(price, dec!(27.1));
    }

    #[tokio::test]
    async fn test_server_error_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/XYZ.SA"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server, 3).fetch_price("XYZ").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        assert_eq!(
            err.to_string(),
            "YAHOO unavailable: HTTP error: 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let server = MockServer::start().await;
        mount(
            &server,
            "EMPTY.SA",
            ResponseTemplate::new(200).set_body_string(r#"{"chart": {"result": []}}"#),
        )
        .await;
        mount(
            &server,
            "NULL.SA",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#),
        )
        .await;
        mount(
            &server,
            "BROKEN.SA",
            ResponseTemplate::new(200).set_body_string("<html>"),
        )
        .await;

        let yahoo = provider(&server, 1);
        for ticker in ["EMPTY", "NULL", "BROKEN"] {
            let err = yahoo.fetch_price(ticker).await.unwrap_err();
            assert!(matches!(err, ProviderError::Malformed { .. }), "{ticker}: {err}");
        }
    }
}
