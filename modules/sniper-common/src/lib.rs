pub mod config;
pub mod error;
pub mod types;

pub use config::{CodeRules, Config};
pub use error::SniperError;
pub use types::*;
