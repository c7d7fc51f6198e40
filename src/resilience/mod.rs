//! Retry helpers for peer deliveries.

pub mod retry;

pub use retry::{RetryConfig, RetryExhausted, retry};
