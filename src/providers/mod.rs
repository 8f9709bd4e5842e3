pub mod alpha_vantage;
pub mod credentials;
pub mod util;

pub use alpha_vantage::AlphaVantageProvider;
pub use credentials::{ApiKeyPool, KeyPoolStatus, KeyUsage};
