//! Core business logic abstractions

pub mod calendar;
pub mod config;
pub mod error;
pub mod log;
pub mod models;
pub mod price;
pub mod retry;
pub mod valuation;

// Re-export main types for cleaner imports
pub use error::{Error, ProviderError, Result};
pub use price::{Quote, QuoteProvider};
pub use retry::{Backoff, RetryPolicy, with_retry};
