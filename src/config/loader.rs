use std::{env, fs, path::PathBuf};

use crate::errors::ConfigError;

use super::services_config::ServicesConfig;

/// 默认的服务描述文件名
pub const CONFIG_FILE_NAME: &str = "services.toml";

/// 选择环境覆盖的环境变量
pub const ENVIRONMENT_VAR: &str = "SERVICEHOST_ENV";

/// 展开路径中的 `~` 与环境变量
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Configuration loader responsible for reading the services file and
/// applying the selected environment overlay
pub struct ConfigLoader {
    path: PathBuf,
    environment: Option<String>,
}

impl ConfigLoader {
    /// Loader for `services.toml` in the current directory
    pub fn new() -> Self {
        Self::with_path(CONFIG_FILE_NAME)
    }

    pub fn with_path(path: impl AsRef<str>) -> Self {
        Self {
            path: expand_path(path.as_ref()),
            environment: None,
        }
    }

    /// Explicit environment, takes precedence over `SERVICEHOST_ENV`
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the services file.
    ///
    /// A missing file yields the default (empty) configuration; a file that
    /// exists but does not parse is an error.
    pub fn load(&self) -> Result<ServicesConfig, ConfigError> {
        let mut config = if self.path.exists() {
            let source = self.path.to_string_lossy().to_string();
            let content = fs::read_to_string(&self.path)
                .map_err(|e| ConfigError::FileRead(source.clone(), e))?;
            let config = ServicesConfig::from_toml_str(&content, &source)?;
            tracing::info!("成功加载配置文件: {}", source);
            config
        } else {
            tracing::warn!("配置文件不存在: {}，使用默认配置", self.path.display());
            ServicesConfig::default()
        };

        if let Some(environment) = self.resolve_environment() {
            config.apply_environment(&environment);
        }

        Ok(config)
    }

    fn resolve_environment(&self) -> Option<String> {
        self.environment
            .clone()
            .or_else(|| self.collect_env_var(ENVIRONMENT_VAR))
    }

    fn collect_env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_missing_file_gives_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let loader = ConfigLoader::with_path(missing.to_string_lossy())
            .with_environment(Some("ci".to_string()));

        let config = loader.load().unwrap();
        assert!(config.services.is_empty());
        assert!(config.global.container.auto_wire);
        assert_eq!(config.environment.as_deref(), Some("ci"));
    }

    #[test]
    fn test_load_applies_explicit_environment() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[services.store]
class = "builtin.KeyValueStore"
config = { capacity = 8 }

[environments.test.services.store]
config = { capacity = 2 }
"#,
        );

        let config = ConfigLoader::with_path(&path)
            .with_environment(Some("test".to_string()))
            .load()
            .unwrap();
        assert_eq!(config.service("store").unwrap().config["capacity"], 2);
    }

    #[test]
    fn test_parse_error_is_not_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "[services.store\n");

        let result = ConfigLoader::with_path(&path).load();
        assert!(matches!(result, Err(ConfigError::TomlParse(_, _))));
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/plugins");
        assert!(!expanded.to_string_lossy().starts_with('~') || env::var("HOME").is_err());
        assert!(expanded.ends_with("plugins"));
    }
}
