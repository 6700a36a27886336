//! Pricing abstractions and core types

use crate::core::error::ProviderError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price resolved for a ticker, tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: Decimal,
    pub source: String,
}

/// A single external source of current prices.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Stable identifier used in logs and error messages, e.g. "YAHOO".
    fn id(&self) -> &'static str;

    async fn fetch_price(&self, ticker: &str) -> Result<Decimal, ProviderError>;
}
