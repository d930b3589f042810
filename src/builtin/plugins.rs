//! 内置插件

use super::services::KeyValueStore;
use super::STORE_SERVICE;
use crate::domain::interfaces::service::downcast_service;
use crate::domain::interfaces::{
    CommandInfo, ConfigMap, ConfigurablePlugin, HealthCheckResult, LifecyclePlugin, Plugin,
    ServiceLocator,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// 巡检插件：把标签写入键值存储
#[derive(Default)]
pub struct InspectorPlugin {
    config: ConfigMap,
    store: Option<Arc<KeyValueStore>>,
}

impl InspectorPlugin {
    pub const NAME: &'static str = "inspector";

    fn label(&self) -> &str {
        self.config
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("servicehost")
    }
}

impl Plugin for InspectorPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Writes an inspection label into the key-value store"
    }

    fn initialize(&mut self, services: &mut dyn ServiceLocator) -> anyhow::Result<()> {
        if services.is_registered(STORE_SERVICE) {
            let store = downcast_service::<KeyValueStore>(services.resolve(STORE_SERVICE)?)
                .ok_or_else(|| anyhow::anyhow!("service '{}' is not a KeyValueStore", STORE_SERVICE))?;
            self.store = Some(store);
        }
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        if let Some(store) = self.store.take() {
            store.remove("inspector.label");
        }
        Ok(())
    }

    fn commands(&self) -> Vec<CommandInfo> {
        vec![CommandInfo::new("inspect", "Write the configured label into the store")]
    }

    fn config_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": { "label": { "type": "string" } }
        }))
    }

    fn validate_config(&self, config: &ConfigMap) -> anyhow::Result<()> {
        match config.get("label") {
            Some(label) if !label.is_string() => anyhow::bail!("label must be a string"),
            _ => Ok(()),
        }
    }

    fn health(&self) -> HealthCheckResult {
        match &self.store {
            Some(store) => HealthCheckResult::healthy()
                .with_details(json!({ "entries": store.len() })),
            None => HealthCheckResult::degraded("key-value store unavailable"),
        }
    }

    fn as_configurable(&mut self) -> Option<&mut dyn ConfigurablePlugin> {
        Some(self)
    }
}

impl ConfigurablePlugin for InspectorPlugin {
    fn configure(&mut self, config: &ConfigMap) -> anyhow::Result<()> {
        self.validate_config(config)?;
        self.config = config.clone();
        if let Some(store) = &self.store {
            store.set("inspector.label", Value::from(self.label()))?;
        }
        Ok(())
    }

    fn configuration(&self) -> ConfigMap {
        self.config.clone()
    }
}

/// 脉冲插件：初始化时启动，卸载时停止
#[derive(Default)]
pub struct PulsePlugin {
    running: bool,
    restarts: u32,
}

impl PulsePlugin {
    pub const NAME: &'static str = "pulse";
}

impl Plugin for PulsePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        "0.2.0"
    }

    fn initialize(&mut self, _services: &mut dyn ServiceLocator) -> anyhow::Result<()> {
        self.start()
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.running = false;
        Ok(())
    }

    fn health(&self) -> HealthCheckResult {
        if self.running {
            HealthCheckResult::healthy().with_details(json!({ "restarts": self.restarts }))
        } else {
            HealthCheckResult::unhealthy("pulse is stopped")
        }
    }

    fn as_lifecycle(&mut self) -> Option<&mut dyn LifecyclePlugin> {
        Some(self)
    }
}

impl LifecyclePlugin for PulsePlugin {
    fn start(&mut self) -> anyhow::Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.running = false;
        Ok(())
    }

    fn restart(&mut self) -> anyhow::Result<()> {
        self.stop()?;
        self.restarts += 1;
        self.start()
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ServiceContainer;

    #[test]
    fn test_inspector_writes_label_into_store() {
        let mut container = ServiceContainer::new();
        let store = Arc::new(KeyValueStore::new());
        container.register_instance(STORE_SERVICE, store.clone());

        let mut plugin = InspectorPlugin::default();
        plugin.initialize(&mut container).unwrap();
        plugin
            .configure(json!({"label": "nightly"}).as_object().unwrap())
            .unwrap();

        assert_eq!(store.get("inspector.label"), Some(json!("nightly")));
        assert!(plugin.health().is_healthy());

        plugin.cleanup().unwrap();
        assert!(store.get("inspector.label").is_none());
    }

    #[test]
    fn test_inspector_without_store_is_degraded() {
        let mut container = ServiceContainer::new();
        let mut plugin = InspectorPlugin::default();
        plugin.initialize(&mut container).unwrap();
        assert!(!plugin.health().is_healthy());
        assert!(plugin
            .validate_config(json!({"label": 3}).as_object().unwrap())
            .is_err());
    }

    #[test]
    fn test_pulse_counts_restarts() {
        let mut container = ServiceContainer::new();
        let mut plugin = PulsePlugin::default();
        plugin.initialize(&mut container).unwrap();
        assert!(plugin.is_running());

        plugin.restart().unwrap();
        plugin.restart().unwrap();
        assert_eq!(plugin.restarts, 2);

        plugin.cleanup().unwrap();
        assert!(!plugin.health().is_healthy());
    }
}
