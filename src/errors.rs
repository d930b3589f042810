use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the container and the plugin manager.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// True when the error only says "this name was never registered".
    pub fn is_unregistered(&self) -> bool {
        matches!(
            self,
            CoreError::Registration(RegistrationError::Unregistered { .. })
        )
    }

    /// True for any dependency-class failure (missing, inactive, cycle).
    pub fn is_dependency(&self) -> bool {
        matches!(self, CoreError::Dependency(_))
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Service '{name}' is not registered")]
    Unregistered { name: String },
    #[error("Plugin '{name}' is already registered")]
    Duplicate { name: String },
    #[error("Service '{name}' cannot be viewed as '{expected}'")]
    TypeMismatch { name: String, expected: &'static str },
}

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("'{dependent}' depends on '{dependency}', which is neither a registered service nor a known plugin")]
    Missing { dependent: String, dependency: String },
    #[error("'{dependent}' depends on plugin '{dependency}', which is {status} instead of active")]
    NotActive {
        dependent: String,
        dependency: String,
        status: String,
    },
    #[error("'{dependent}' depends on service '{dependency}', which failed to resolve: {reason}")]
    Unresolvable {
        dependent: String,
        dependency: String,
        reason: String,
    },
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No implementation is registered for locator '{locator}' (service '{name}')")]
    UnknownLocator { name: String, locator: String },
    #[error("Implementation '{locator}' for service '{name}' does not provide interface '{interface}'")]
    InterfaceMismatch {
        name: String,
        locator: String,
        interface: String,
    },
    #[error("Entry point for plugin '{plugin}' not found: {}", path.display())]
    EntryNotFound { plugin: String, path: PathBuf },
    #[error("Plugin class '{class_name}' not found for plugin '{plugin}'")]
    ClassNotFound { plugin: String, class_name: String },
    #[error("Plugin '{plugin}' does not implement the plugin interface: instance reports name '{reported}'")]
    CapabilityMismatch { plugin: String, reported: String },
    #[error("Failed to construct '{name}': {message}")]
    Construction { name: String, message: String },
}

/// The hook (or pseudo-hook) being run when a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Construct,
    Configure,
    ValidateConfig,
    Initialize,
    Start,
    Stop,
    Restart,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Construct => "construct",
            Stage::Configure => "configure",
            Stage::ValidateConfig => "validate config of",
            Stage::Initialize => "initialize",
            Stage::Start => "start",
            Stage::Stop => "stop",
            Stage::Restart => "restart",
            Stage::Cleanup => "clean up",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("Failed to {stage} '{name}': {message}")]
pub struct InitializationError {
    pub name: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to {stage} '{name}': {message}")]
    Hook {
        name: String,
        stage: Stage,
        message: String,
    },
    #[error("'{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: String,
        to: String,
    },
    #[error("Plugin '{name}' is not loaded")]
    NotLoaded { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Failed to parse JSON from file '{0}': {1}")]
    JsonParse(String, #[source] serde_json::Error),
    #[error("Service '{service}' has unknown scope '{scope}'")]
    InvalidScope { service: String, scope: String },
    #[error("Plugin '{plugin}' has invalid version '{version}': {source}")]
    InvalidVersion {
        plugin: String,
        version: String,
        #[source]
        source: semver::Error,
    },
    #[error("Priority must be between 1 and 4, got {0}")]
    InvalidPriority(u8),
    #[error("Service group '{0}' is not defined")]
    UnknownGroup(String),
    #[error("Required configuration field '{0}' is missing or invalid")]
    FieldMissing(String),
}

/// Wraps a hook failure into the initialization taxonomy.
pub fn initialization_error(name: &str, stage: Stage, err: &anyhow::Error) -> CoreError {
    InitializationError {
        name: name.to_string(),
        stage,
        message: format!("{:#}", err),
    }
    .into()
}

/// Wraps a hook failure into the lifecycle taxonomy.
pub fn lifecycle_error(name: &str, stage: Stage, err: &anyhow::Error) -> CoreError {
    LifecycleError::Hook {
        name: name.to_string(),
        stage,
        message: format!("{:#}", err),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_toml_error() -> toml::de::Error {
        toml::from_str::<toml::Value>("invalid_toml").err().unwrap()
    }

    #[test]
    fn test_cycle_display_joins_path() {
        let err: CoreError = DependencyError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Dependency error: Circular dependency detected: a -> b -> a"
        );
        assert!(err.is_dependency());
        assert!(!err.is_unregistered());
    }

    #[test]
    fn test_hook_errors_carry_stage_and_name() {
        let cause = anyhow::anyhow!("disk full");
        let err = initialization_error("cache", Stage::Initialize, &cause);
        assert_eq!(
            err.to_string(),
            "Initialization error: Failed to initialize 'cache': disk full"
        );

        let err = lifecycle_error("poller", Stage::Stop, &cause);
        assert_eq!(err.to_string(), "Lifecycle error: Failed to stop 'poller': disk full");
    }

    #[test]
    fn test_config_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::FileRead("services.toml".to_string(), io_err);
        assert_eq!(
            format!("{}", err),
            "Failed to read file 'services.toml': file not found"
        );

        let err = ConfigError::TomlParse("services.toml".to_string(), mock_toml_error());
        assert!(format!("{}", err).starts_with("Failed to parse TOML from file 'services.toml': "));
    }

    #[test]
    fn test_unregistered_predicate() {
        let err: CoreError = RegistrationError::Unregistered {
            name: "missing".into(),
        }
        .into();
        assert!(err.is_unregistered());
    }
}
