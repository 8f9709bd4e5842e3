//! Error taxonomy shared by the provider, refresh and query layers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VendorError>;

/// Errors that can cross the core boundary.
///
/// The type is `Clone` because a single in-flight refresh resolves every
/// coalesced waiter with the same result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VendorError {
    /// Network or HTTP failure from the data provider.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The provider rejected a credential because of its quota.
    #[error("Rate limited on key {key}: {message}")]
    RateLimited { key: String, message: String },

    /// Every credential in the pool was rate limited.
    #[error("All {attempts} API keys are rate limited")]
    PoolExhausted { attempts: usize },

    /// The provider has no data for the ticker, or the ticker is malformed.
    #[error("No financial data found for ticker: {0}")]
    TickerNotFound(String),
}

impl VendorError {
    /// Whether the error should move the credential pool to its next key.
    pub fn rotates_key(&self) -> bool {
        matches!(
            self,
            VendorError::RateLimited { .. } | VendorError::UpstreamUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for VendorError {
    fn from(e: reqwest::Error) -> Self {
        VendorError::UpstreamUnavailable(e.to_string())
    }
}
