pub mod app;
#[cfg(feature = "builtin")]
pub mod builtin;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use app::Runtime;
pub use config::{ConfigLoader, ServicesConfig};
pub use errors::{CoreError, CoreResult};
pub use infrastructure::{PluginManager, ServiceContainer};
