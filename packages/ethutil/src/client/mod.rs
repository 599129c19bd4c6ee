//! Wrappers stacked on top of a [`ChainBackend`](crate::backend::ChainBackend).

mod logging;
mod rate_limit;

pub use logging::LoggingBackend;
pub use rate_limit::{RateLimitedBackend, RateLimiterConfig};
