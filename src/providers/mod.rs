pub mod chain;
pub mod status_invest;
pub mod yahoo_finance;

pub use chain::ProviderChain;

use crate::core::QuoteProvider;
use crate::core::config::{AppConfig, ProviderKind};
use reqwest::Client;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Exact decimal value of a JSON number, going through its textual form.
pub(crate) fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    let text = n.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Builds the quote chain in the configured order.
pub fn build_chain(config: &AppConfig) -> ProviderChain {
    let timeout = config.sync.http_timeout();
    let providers = config
        .providers
        .order
        .iter()
        .map(|kind| -> Arc<dyn QuoteProvider> {
            match kind {
                ProviderKind::StatusInvest => Arc::new(status_invest::StatusInvestProvider::new(
                    &config.providers.status_invest,
                    timeout,
                )),
                ProviderKind::Yahoo => Arc::new(yahoo_finance::YahooFinanceProvider::new(
                    &config.providers.yahoo,
                    timeout,
                )),
            }
        })
        .collect();
    ProviderChain::new(providers, config.sync.provider_delay())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_number_to_decimal() {
        let n: serde_json::Number = serde_json::from_str("38.45").unwrap();
        assert_eq!(number_to_decimal(&n), Some(dec!(38.45)));
        let n: serde_json::Number = serde_json::from_str("120").unwrap();
        assert_eq!(number_to_decimal(&n), Some(dec!(120)));
    }

    #[test]
    fn test_chain_follows_configured_order() {
        let mut config = AppConfig::default();
        assert_eq!(build_chain(&config).provider_ids(), vec!["STATUS_INVEST", "YAHOO"]);

        config.providers.order = vec![ProviderKind::Yahoo];
        assert_eq!(build_chain(&config).provider_ids(), vec!["YAHOO"]);
    }
}
