pub mod loader;
pub mod services_config;

// Re-export commonly used types
pub use loader::{expand_path, ConfigLoader, CONFIG_FILE_NAME, ENVIRONMENT_VAR};
pub use services_config::{
    ContainerSettings, EnvironmentOverlay, GlobalConfig, LoggingSection, PluginsSection,
    ServiceEntry, ServiceGroup, ServiceOverlay, ServicesConfig,
};
