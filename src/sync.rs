//! Price synchronization: resolves quotes through the provider chain and writes valuations back.

use crate::core::config::SyncConfig;
use crate::core::models::Investment;
use crate::core::valuation;
use crate::core::{Error, ProviderError, Quote, Result, RetryPolicy, with_retry};
use crate::providers::ProviderChain;
use crate::store::{Store, investments};
use crate::tasks::PeriodicTask;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

/// Timing and retry knobs of the engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Outer retry around the whole chain during bulk refresh.
    pub refresh: RetryPolicy,
    /// Retry of valuation writes while the database is busy.
    pub storage: RetryPolicy,
    pub ticker_delay: Duration,
    pub auto_ticker_delay: Duration,
    pub request_timeout: Duration,
    pub bulk_timeout: Duration,
    pub auto_refresh_interval: Duration,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            refresh: RetryPolicy::fixed(
                config.refresh_attempts,
                Duration::from_millis(config.refresh_retry_delay_ms),
            ),
            storage: RetryPolicy::linear(
                config.storage_attempts,
                Duration::from_millis(config.storage_backoff_ms),
            ),
            ticker_delay: Duration::from_millis(config.ticker_delay_ms),
            auto_ticker_delay: Duration::from_millis(config.auto_ticker_delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            bulk_timeout: Duration::from_secs(config.bulk_timeout_secs),
            auto_refresh_interval: config.auto_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerError {
    pub ticker: String,
    pub reason: String,
}

impl Display for TickerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.ticker, self.reason)
    }
}

/// Outcome of a bulk refresh. Investments with nothing invested appear in neither count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<TickerError>,
}

impl RefreshSummary {
    fn fail(&mut self, ticker: &str, reason: impl ToString) {
        self.failed += 1;
        self.errors.push(TickerError {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[derive(Clone)]
pub struct PriceSyncEngine {
    store: Store,
    chain: ProviderChain,
    settings: SyncSettings,
}

impl PriceSyncEngine {
    pub fn new(store: Store, chain: ProviderChain, settings: SyncSettings) -> Self {
        Self {
            store,
            chain,
            settings,
        }
    }

    /// Resolves a price without touching storage.
    pub async fn quote(&self, ticker: &str) -> Result<Quote> {
        let ticker = normalize(ticker)?;
        timeout(self.settings.request_timeout, self.chain.resolve(&ticker))
            .await
            .map_err(|_| Error::Timeout(self.settings.request_timeout))?
            .map_err(Error::from)
    }

    /// Revalues every investment holding `ticker` at a freshly resolved price.
    ///
    /// Storage is left untouched when the price cannot be resolved.
    pub async fn refresh_one(&self, ticker: &str) -> Result<Vec<Investment>> {
        let ticker = normalize(ticker)?;
        let positions = self
            .store
            .with_conn(|c| investments::list_by_ticker(c, &ticker))?;
        if positions.is_empty() {
            return Err(Error::not_found("Investment", &ticker));
        }
        if positions.iter().all(|p| p.total_invested.is_zero()) {
            debug!(%ticker, "Nothing invested, skipping price lookup");
            return Ok(positions);
        }

        let work = async {
            let quote = self.chain.resolve(&ticker).await?;
            let positions: Vec<&Investment> = positions.iter().collect();
            self.persist(&positions, quote.price).await?;
            info!(%ticker, price = %quote.price, source = %quote.source, "Price refreshed");
            Ok::<_, Error>(())
        };
        timeout(self.settings.request_timeout, work)
            .await
            .map_err(|_| Error::Timeout(self.settings.request_timeout))??;

        self.store
            .with_conn(|c| investments::list_by_ticker(c, &ticker))
    }

    /// Refreshes every investment, isolating failures per investment.
    ///
    /// Each lookup gets the outer retry policy on top of the providers' own retries. Anything
    /// not reached before the bulk deadline is reported as failed.
    pub async fn refresh_all(&self) -> Result<RefreshSummary> {
        let all = self.store.with_conn(investments::list)?;
        let deadline = Instant::now() + self.settings.bulk_timeout;
        let mut summary = RefreshSummary::default();
        let mut resolved: HashMap<String, std::result::Result<Decimal, String>> = HashMap::new();

        let pending: Vec<&Investment> = all
            .iter()
            .filter(|inv| {
                let skip = inv.total_invested.is_zero();
                if skip {
                    debug!(ticker = %inv.ticker, "Skipping investment with nothing invested");
                }
                !skip
            })
            .collect();

        for (index, inv) in pending.iter().enumerate() {
            if Instant::now() >= deadline {
                summary.fail(&inv.ticker, Error::Timeout(self.settings.bulk_timeout));
                continue;
            }

            let price = match resolved.get(&inv.ticker) {
                Some(cached) => cached.clone(),
                None => {
                    let lookup = with_retry(
                        &self.settings.refresh,
                        |_: &ProviderError| true,
                        || self.chain.resolve(&inv.ticker),
                    );
                    let outcome = match timeout_at(deadline, lookup).await {
                        Ok(Ok(quote)) => Ok(quote.price),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(Error::Timeout(self.settings.bulk_timeout).to_string()),
                    };
                    resolved.insert(inv.ticker.clone(), outcome.clone());
                    outcome
                }
            };

            let price = match price {
                Ok(price) => price,
                Err(reason) => {
                    warn!(ticker = %inv.ticker, %reason, "Failed to refresh price");
                    summary.fail(&inv.ticker, reason);
                    continue;
                }
            };

            match self.persist(&[*inv], price).await {
                Ok(_) => {
                    summary.updated += 1;
                    debug!(ticker = %inv.ticker, %price, "Updated investment");
                    if index + 1 < pending.len() && !self.settings.ticker_delay.is_zero() {
                        tokio::time::sleep(self.settings.ticker_delay).await;
                    }
                }
                Err(e) => {
                    warn!(ticker = %inv.ticker, error = %e, "Failed to save valuation");
                    summary.fail(&inv.ticker, format!("failed to save valuation: {e}"));
                }
            }
        }

        info!(
            updated = summary.updated,
            failed = summary.failed,
            "Bulk price refresh finished"
        );
        Ok(summary)
    }

    /// One background pass: a single chain lookup per investment, failures only logged.
    pub async fn auto_refresh_tick(&self) {
        let all = match self.store.with_conn(investments::list) {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "Could not load investments for auto-refresh");
                return;
            }
        };

        let mut updated = 0;
        for inv in all.iter().filter(|inv| !inv.total_invested.is_zero()) {
            let quote = match self.chain.resolve(&inv.ticker).await {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(ticker = %inv.ticker, error = %e, "Auto-refresh lookup failed");
                    continue;
                }
            };
            if let Err(e) = self.persist(&[inv], quote.price).await {
                warn!(ticker = %inv.ticker, error = %e, "Auto-refresh save failed");
                continue;
            }
            updated += 1;
            if !self.settings.auto_ticker_delay.is_zero() {
                tokio::time::sleep(self.settings.auto_ticker_delay).await;
            }
        }
        info!(updated, "Investment prices auto-updated");
    }

    pub fn spawn_auto_refresh(&self) -> PeriodicTask {
        let engine = self.clone();
        PeriodicTask::spawn(
            "Price auto-refresh",
            self.settings.auto_refresh_interval,
            move || {
                let engine = engine.clone();
                async move { engine.auto_refresh_tick().await }
            },
        )
    }

    /// Writes the valuations of `positions` at `price` in one transaction, retrying while
    /// the database is busy. Returns how many positions were valued.
    async fn persist(&self, positions: &[&Investment], price: Decimal) -> Result<usize> {
        let mut valuations = Vec::with_capacity(positions.len());
        for inv in positions {
            if let Some(valuation) = valuation::revalue(inv.quantity, inv.total_invested, price)? {
                valuations.push((inv.id, valuation));
            }
        }
        if valuations.is_empty() {
            return Ok(0);
        }
        with_retry(&self.settings.storage, Error::is_contention, || async {
            self.store.with_transaction(|c| {
                for (id, valuation) in &valuations {
                    investments::set_valuation(c, *id, valuation)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(Error::into_storage_failure)?;
        Ok(valuations.len())
    }
}

fn normalize(ticker: &str) -> Result<String> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(Error::Validation("Ticker must not be empty".to_string()));
    }
    Ok(ticker)
}
