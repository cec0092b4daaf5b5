pub mod config;
pub mod error;
pub mod provider;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{PlansmithError, Result};
pub use provider::Provider;
pub use types::*;
