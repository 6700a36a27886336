use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{ProviderError, Quote, QuoteProvider};

/// Ordered fallback over quote providers.
///
/// Providers are consulted one at a time with `delay` between consecutive attempts. The first
/// strictly positive price wins; otherwise the last provider's error is returned.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
    delay: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, delay: Duration) -> Self {
        Self { providers, delay }
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub async fn resolve(&self, ticker: &str) -> Result<Quote, ProviderError> {
        let mut last_error = ProviderError::unavailable("CHAIN", "no quote providers configured");
        for (index, provider) in self.providers.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match provider.fetch_price(ticker).await {
                Ok(price) if price > Decimal::ZERO => {
                    debug!(ticker, provider = provider.id(), %price, "Resolved price");
                    return Ok(Quote {
                        ticker: ticker.to_string(),
                        price,
                        source: provider.id().to_string(),
                    });
                }
                Ok(price) => {
                    warn!(ticker, provider = provider.id(), %price, "Ignoring non-positive price");
                    last_error = ProviderError::malformed(
                        provider.id(),
                        format!("non-positive price {price} for {ticker}"),
                    );
                }
                Err(e) => {
                    warn!(ticker, provider = provider.id(), error = %e, "Quote provider failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
