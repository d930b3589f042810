//! 插件能力接口

use super::{ConfigMap, HealthCheckResult, ServiceRef};
use crate::errors::CoreResult;
use serde::Serialize;

/// 插件在初始化阶段看到的服务容器视图
pub trait ServiceLocator {
    /// 解析服务实例（按需构造）
    fn resolve(&mut self, name: &str) -> CoreResult<ServiceRef>;

    fn is_registered(&self, name: &str) -> bool;

    /// 插件向容器贡献预构造的服务实例
    fn provide(&mut self, name: &str, instance: ServiceRef);
}

/// 插件暴露的命令描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

impl CommandInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// 插件基础接口
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// 初始化插件，可以从容器中解析所需服务
    fn initialize(&mut self, services: &mut dyn ServiceLocator) -> anyhow::Result<()>;

    fn cleanup(&mut self) -> anyhow::Result<()>;

    fn commands(&self) -> Vec<CommandInfo> {
        Vec::new()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// 配置的 JSON Schema（可选）
    fn config_schema(&self) -> Option<serde_json::Value> {
        None
    }

    fn validate_config(&self, _config: &ConfigMap) -> anyhow::Result<()> {
        Ok(())
    }

    fn health(&self) -> HealthCheckResult {
        HealthCheckResult::healthy()
    }

    fn as_configurable(&mut self) -> Option<&mut dyn ConfigurablePlugin> {
        None
    }

    fn as_lifecycle(&mut self) -> Option<&mut dyn LifecyclePlugin> {
        None
    }
}

/// 可配置插件
pub trait ConfigurablePlugin {
    fn configure(&mut self, config: &ConfigMap) -> anyhow::Result<()>;

    fn configuration(&self) -> ConfigMap;

    /// 合并更新配置
    fn update_configuration(&mut self, patch: &ConfigMap) -> anyhow::Result<()> {
        let mut merged = self.configuration();
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        self.configure(&merged)
    }
}

/// 有启动/停止语义的插件
pub trait LifecyclePlugin {
    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self) -> anyhow::Result<()>;

    fn restart(&mut self) -> anyhow::Result<()> {
        self.stop()?;
        self.start()
    }

    fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Settings {
        config: ConfigMap,
    }

    impl ConfigurablePlugin for Settings {
        fn configure(&mut self, config: &ConfigMap) -> anyhow::Result<()> {
            if config.get("retries").and_then(|v| v.as_u64()) == Some(0) {
                anyhow::bail!("retries must be positive");
            }
            self.config = config.clone();
            Ok(())
        }

        fn configuration(&self) -> ConfigMap {
            self.config.clone()
        }
    }

    #[test]
    fn test_update_configuration_merges_keys() {
        let mut settings = Settings::default();
        let initial = json!({"retries": 3, "verbose": false});
        settings.configure(initial.as_object().unwrap()).unwrap();

        let patch = json!({"verbose": true});
        settings.update_configuration(patch.as_object().unwrap()).unwrap();

        assert_eq!(settings.config["retries"], 3);
        assert_eq!(settings.config["verbose"], true);
    }

    #[test]
    fn test_update_configuration_keeps_old_config_on_failure() {
        let mut settings = Settings::default();
        settings
            .configure(json!({"retries": 3}).as_object().unwrap())
            .unwrap();

        let patch = json!({"retries": 0});
        assert!(settings.update_configuration(patch.as_object().unwrap()).is_err());
        assert_eq!(settings.config["retries"], 3);
    }
}
