pub mod config;
pub mod error;
pub mod events;
pub mod file_config;
pub mod text;
pub mod types;

pub use config::{AppConfig, SmtpConfig};
pub use error::{NewswireError, Result};
pub use file_config::{FeedsConfig, GlobalFeedConfig};
pub use text::FingerprintAlgo;
pub use types::*;
