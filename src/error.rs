//! Downgrade taxonomy for upstream and cache failures.
//!
//! None of these reach the caller of [`Engine::classify`](crate::engine::Engine::classify):
//! they are logged, recorded on query reports, and turned into "zero
//! records" or "cache miss".

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Catalog store or context provider returned an error.
    #[error("{source_name} unavailable: {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    /// Catalog store or context provider did not answer in time.
    #[error("{source_name} timed out after {}ms", after.as_millis())]
    Timeout {
        source_name: String,
        after: Duration,
    },

    /// Any failure inside the response cache.
    #[error("cache fault: {0}")]
    CacheFault(String),
}

impl Fault {
    pub fn unavailable(source_name: impl Into<String>, err: &anyhow::Error) -> Self {
        Fault::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn timeout(source_name: impl Into<String>, after: Duration) -> Self {
        Fault::Timeout {
            source_name: source_name.into(),
            after,
        }
    }
}
