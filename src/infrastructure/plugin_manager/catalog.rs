//! 插件目录：(插件名, 类名) -> 工厂

use crate::domain::interfaces::Plugin;
use crate::errors::LoadError;
use std::collections::HashMap;
use std::sync::Arc;

/// 插件工厂
pub type PluginFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Plugin>> + Send + Sync>;

/// 编译期登记的插件实现
#[derive(Default, Clone)]
pub struct PluginCatalog {
    factories: HashMap<(String, String), PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记插件实现，`class_name` 对应元数据中的同名字段
    pub fn register<F>(
        &mut self,
        plugin: impl Into<String>,
        class_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        let key = (plugin.into(), class_name.into());
        tracing::debug!("登记插件实现: {}::{}", key.0, key.1);
        self.factories.insert(key, Arc::new(factory));
        self
    }

    pub fn contains(&self, plugin: &str, class_name: &str) -> bool {
        self.factories
            .contains_key(&(plugin.to_string(), class_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// 构造插件实例
    pub fn create(&self, plugin: &str, class_name: &str) -> Result<Box<dyn Plugin>, LoadError> {
        let factory = self
            .factories
            .get(&(plugin.to_string(), class_name.to_string()))
            .ok_or_else(|| LoadError::ClassNotFound {
                plugin: plugin.to_string(),
                class_name: class_name.to_string(),
            })?;

        factory().map_err(|e| LoadError::Construction {
            name: plugin.to_string(),
            message: format!("{:#}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interfaces::ServiceLocator;

    struct Echo;

    impl Plugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn initialize(&mut self, _services: &mut dyn ServiceLocator) -> anyhow::Result<()> {
            Ok(())
        }

        fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_create_by_plugin_and_class() {
        let mut catalog = PluginCatalog::new();
        catalog.register("echo", "Plugin", || Ok(Box::new(Echo)));
        catalog.register("broken", "Plugin", || anyhow::bail!("missing resource"));

        assert!(catalog.contains("echo", "Plugin"));
        assert!(!catalog.contains("echo", "Other"));
        assert_eq!(catalog.create("echo", "Plugin").unwrap().name(), "echo");

        let err = catalog.create("echo", "Other").err().unwrap();
        assert!(matches!(err, LoadError::ClassNotFound { ref class_name, .. } if class_name == "Other"));

        let err = catalog.create("broken", "Plugin").err().unwrap();
        assert!(err.to_string().contains("missing resource"));
    }
}
