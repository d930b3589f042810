use crate::domain::interfaces::ConfigMap;
use crate::errors::ConfigError;
use crate::infrastructure::container::{ServiceDescriptor, ServiceLifetime};
use crate::infrastructure::resolver::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_scope() -> String {
    "singleton".to_string()
}

/// 服务描述文件（services.toml）的完整内容
///
/// 表以键名排序保存，批量注册时以此作为基础顺序。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub global: GlobalConfig,
    pub services: BTreeMap<String, ServiceEntry>,
    pub service_groups: BTreeMap<String, ServiceGroup>,
    pub environments: BTreeMap<String, EnvironmentOverlay>,
    pub plugins: PluginsSection,
    /// 已应用的环境名称
    #[serde(skip)]
    pub environment: Option<String>,
}

/// `[services.<name>]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEntry {
    #[serde(skip)]
    pub name: String,
    /// 实现定位符
    #[serde(rename = "class", default)]
    pub class_path: String,
    /// 能力键
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 可选服务：加载或构造失败只记录警告
    #[serde(default)]
    pub optional: bool,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, class_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_path: class_path.into(),
            interface: None,
            scope: default_scope(),
            dependencies: Vec::new(),
            config: ConfigMap::new(),
            enabled: true,
            optional: false,
        }
    }

    pub fn lifetime(&self) -> Result<ServiceLifetime, ConfigError> {
        self.scope
            .parse::<ServiceLifetime>()
            .map_err(|_| ConfigError::InvalidScope {
                service: self.name.clone(),
                scope: self.scope.clone(),
            })
    }

    /// 转换为容器使用的服务描述
    pub fn to_descriptor(&self) -> Result<ServiceDescriptor, ConfigError> {
        let mut descriptor = ServiceDescriptor::new(&self.name, self.lifetime()?)
            .with_dependencies(self.dependencies.iter().cloned())
            .with_config(self.config.clone());
        descriptor.class_path = Some(self.class_path.clone());
        descriptor.interface = self.interface.clone();
        descriptor.enabled = self.enabled;
        descriptor.optional = self.optional;
        Ok(descriptor)
    }
}

/// `[service_groups.<name>]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceGroup {
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `[global]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub container: ContainerSettings,
    pub logging: LoggingSection,
}

/// `[global.container]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// 启动时按配置批量注册
    pub auto_wire: bool,
    /// 为 false 时批量注册后立即构造单例
    pub lazy_loading: bool,
    /// 批量注册前做环路检测
    pub circular_dependency_detection: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            auto_wire: true,
            lazy_loading: true,
            circular_dependency_detection: true,
        }
    }
}

/// `[global.logging]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
    /// dev / test / prod 预设
    pub preset: Option<String>,
}

/// `[environments.<env>]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentOverlay {
    pub services: BTreeMap<String, ServiceOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceOverlay {
    pub config: ConfigMap,
    pub enabled: Option<bool>,
    pub scope: Option<String>,
}

/// `[plugins]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginsSection {
    pub directories: Vec<String>,
}

impl ServicesConfig {
    /// 解析 TOML 文本，`source` 只用于错误信息
    pub fn from_toml_str(content: &str, source: &str) -> Result<Self, ConfigError> {
        let mut config: ServicesConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse(source.to_string(), e))?;
        for (name, entry) in config.services.iter_mut() {
            entry.name = name.clone();
        }
        Ok(config)
    }

    /// 合并环境覆盖：config 按键合并，enabled/scope 直接替换
    pub fn apply_environment(&mut self, environment: &str) {
        self.environment = Some(environment.to_string());

        let overlay = match self.environments.get(environment) {
            Some(overlay) => overlay.clone(),
            None => {
                tracing::info!("未找到环境 {} 的特定配置", environment);
                return;
            }
        };

        for (name, patch) in overlay.services {
            let Some(service) = self.services.get_mut(&name) else {
                tracing::warn!("环境 {} 覆盖了未定义的服务 {}，已忽略", environment, name);
                continue;
            };
            for (key, value) in patch.config {
                service.config.insert(key, value);
            }
            if let Some(enabled) = patch.enabled {
                service.enabled = enabled;
            }
            if let Some(scope) = patch.scope {
                service.scope = scope;
            }
            tracing::debug!("应用环境配置到服务 {}", name);
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.get(name)
    }

    pub fn enabled_services(&self) -> Vec<&ServiceEntry> {
        self.services.values().filter(|s| s.enabled).collect()
    }

    pub fn group(&self, name: &str) -> Option<&ServiceGroup> {
        self.service_groups.get(name)
    }

    /// 组内已定义且启用的服务，按组内声明顺序
    pub fn services_by_group(&self, group: &str) -> Result<Vec<&ServiceEntry>, ConfigError> {
        let group = self
            .group(group)
            .ok_or_else(|| ConfigError::UnknownGroup(group.to_string()))?;
        Ok(group
            .services
            .iter()
            .filter_map(|name| self.service(name))
            .filter(|s| s.enabled)
            .collect())
    }

    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.plugins
            .directories
            .iter()
            .map(|dir| super::loader::expand_path(dir))
            .collect()
    }

    /// 服务依赖图（全部服务，含禁用的）
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.services
            .values()
            .map(|s| (s.name.clone(), s.dependencies.clone()))
            .collect()
    }

    /// 校验配置，返回错误描述列表（空表示通过）
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for service in self.services.values() {
            if service.class_path.is_empty() {
                errors.push(format!("Service '{}' has no class configured", service.name));
            }
            if let Err(e) = service.lifetime() {
                errors.push(e.to_string());
            }
        }

        let graph = self.dependency_graph();
        for (dependent, dependency) in graph.missing_dependencies() {
            errors.push(format!(
                "Service '{}' depends on '{}', which is not defined",
                dependent, dependency
            ));
        }
        for cycle in graph.find_cycles() {
            errors.push(format!("Circular dependency detected: {}", cycle.join(" -> ")));
        }

        for (group_name, group) in &self.service_groups {
            for member in &group.services {
                if !self.services.contains_key(member) {
                    errors.push(format!(
                        "Service group '{}' references undefined service '{}'",
                        group_name, member
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[global.container]
lazy_loading = false

[services.store]
class = "builtin.KeyValueStore"
config = { capacity = 16 }

[services.heartbeat]
class = "builtin.Heartbeat"
scope = "transient"
dependencies = ["store"]

[services.tracer]
class = "builtin.Tracer"
optional = true
enabled = false

[service_groups.core]
services = ["store", "heartbeat", "tracer"]
description = "core services"

[environments.production.services.store]
config = { capacity = 1024, persist = true }

[environments.production.services.tracer]
enabled = true
scope = "scoped"
"#;

    fn sample() -> ServicesConfig {
        ServicesConfig::from_toml_str(SAMPLE, "services.toml").unwrap()
    }

    #[test]
    fn test_parse_fills_names_and_defaults() {
        let config = sample();
        let store = config.service("store").unwrap();
        assert_eq!(store.name, "store");
        assert_eq!(store.scope, "singleton");
        assert!(store.enabled);
        assert!(!store.optional);
        assert_eq!(store.config["capacity"], 16);

        assert!(config.service("tracer").unwrap().optional);
        assert!(!config.global.container.lazy_loading);
        assert!(config.global.container.auto_wire);
    }

    #[test]
    fn test_enabled_services_and_groups() {
        let config = sample();
        let enabled: Vec<&str> = config
            .enabled_services()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(enabled, vec!["heartbeat", "store"]);

        let group: Vec<&str> = config
            .services_by_group("core")
            .unwrap()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(group, vec!["store", "heartbeat"]);

        assert!(matches!(
            config.services_by_group("missing"),
            Err(ConfigError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_environment_overlay_merges_config() {
        let mut config = sample();
        config.apply_environment("production");

        let store = config.service("store").unwrap();
        assert_eq!(store.config["capacity"], 1024);
        assert_eq!(store.config["persist"], true);

        let tracer = config.service("tracer").unwrap();
        assert!(tracer.enabled);
        assert_eq!(tracer.lifetime().unwrap(), ServiceLifetime::Scoped);
        assert_eq!(config.environment.as_deref(), Some("production"));
    }

    #[test]
    fn test_unknown_environment_changes_nothing() {
        let mut config = sample();
        config.apply_environment("staging");
        assert_eq!(config.service("store").unwrap().config["capacity"], 16);
    }

    #[test]
    fn test_to_descriptor() {
        let config = sample();
        let descriptor = config.service("heartbeat").unwrap().to_descriptor().unwrap();
        assert_eq!(descriptor.name, "heartbeat");
        assert_eq!(descriptor.lifetime, ServiceLifetime::Transient);
        assert_eq!(descriptor.dependencies, vec!["store"]);
        assert_eq!(descriptor.class_path.as_deref(), Some("builtin.Heartbeat"));
    }

    #[test]
    fn test_invalid_scope_is_reported() {
        let mut entry = ServiceEntry::new("odd", "x.Y");
        entry.scope = "request".to_string();
        assert!(matches!(
            entry.to_descriptor(),
            Err(ConfigError::InvalidScope { .. })
        ));
    }

    #[test]
    fn test_validate_reports_missing_and_cycles() {
        let content = r#"
[services.a]
class = "x.A"
dependencies = ["b"]

[services.b]
class = "x.B"
dependencies = ["a"]

[services.c]
dependencies = ["ghost"]

[service_groups.g]
services = ["a", "nobody"]
"#;
        let config = ServicesConfig::from_toml_str(content, "bad.toml").unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("'c' has no class")));
        assert!(errors.iter().any(|e| e.contains("'ghost'")));
        assert!(errors.iter().any(|e| e.contains("a -> b -> a")));
        assert!(errors.iter().any(|e| e.contains("'nobody'")));
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_empty());
    }

    #[test]
    fn test_parse_error() {
        let result = ServicesConfig::from_toml_str("[services.a\nclass=", "broken.toml");
        assert!(matches!(result, Err(ConfigError::TomlParse(ref f, _)) if f == "broken.toml"));
    }
}
