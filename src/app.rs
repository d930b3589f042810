//! 运行时装配：服务容器只在入口构建一次，再按值交给插件管理器

use crate::config::{ConfigLoader, ServicesConfig};
use crate::errors::CoreResult;
use crate::infrastructure::{
    AutoRegisterReport, ImplementationRegistry, PluginCatalog, PluginManager, ServiceContainer,
};
use serde::Serialize;
use std::path::PathBuf;

/// 服务摘要
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub lifetime: String,
    pub dependencies: Vec<String>,
    pub instantiated: bool,
    pub initialized: bool,
    pub running: bool,
}

/// 运行时：持有插件管理器（以及其中的服务容器）
pub struct Runtime {
    plugins: PluginManager,
    report: AutoRegisterReport,
}

impl Runtime {
    /// 构建容器；开启 auto_wire 时按配置批量注册服务
    pub fn bootstrap(
        config: ServicesConfig,
        registry: ImplementationRegistry,
        catalog: PluginCatalog,
    ) -> CoreResult<Self> {
        let directories = config.plugin_directories();
        let mut container = ServiceContainer::with_config(config, registry);

        let report = if container.settings().auto_wire {
            container.auto_register()?
        } else {
            tracing::info!("auto_wire 已关闭，跳过自动注册");
            AutoRegisterReport::default()
        };

        let mut plugins = PluginManager::new(container, catalog);
        for directory in directories {
            plugins.add_plugin_directory(directory);
        }

        tracing::info!("运行时初始化完成");
        Ok(Self { plugins, report })
    }

    /// 从配置文件构建
    pub fn from_loader(
        loader: &ConfigLoader,
        registry: ImplementationRegistry,
        catalog: PluginCatalog,
    ) -> CoreResult<Self> {
        let config = loader.load()?;
        Self::bootstrap(config, registry, catalog)
    }

    pub fn container(&self) -> &ServiceContainer {
        self.plugins.container()
    }

    pub fn container_mut(&mut self) -> &mut ServiceContainer {
        self.plugins.container_mut()
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginManager {
        &mut self.plugins
    }

    /// 自动注册结果
    pub fn report(&self) -> &AutoRegisterReport {
        &self.report
    }

    pub fn add_plugin_directories<I>(&mut self, directories: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for directory in directories {
            self.plugins.add_plugin_directory(directory);
        }
    }

    /// 按依赖顺序列出已注册的服务
    pub fn service_summaries(&self) -> CoreResult<Vec<ServiceSummary>> {
        let container = self.container();
        let order = container.registration_order()?;
        Ok(order
            .into_iter()
            .filter_map(|name| {
                let descriptor = container.descriptor(&name)?;
                let status = container.get_service_status(&name);
                Some(ServiceSummary {
                    lifetime: descriptor.lifetime.to_string(),
                    dependencies: descriptor.dependencies.clone(),
                    instantiated: status.instantiated,
                    initialized: status.initialized,
                    running: status.running,
                    name,
                })
            })
            .collect())
    }

    /// 先卸载插件（逆加载顺序），再关闭服务（逆依赖顺序）
    pub fn shutdown(&mut self) -> CoreResult<()> {
        self.plugins.shutdown();
        self.plugins.container_mut().shutdown_all()
    }

    /// 拆除全部状态，测试之间隔离用
    pub fn reset(&mut self) -> CoreResult<()> {
        self.plugins.shutdown();
        self.report = AutoRegisterReport::default();
        self.plugins.container_mut().clear()
    }
}

/// 静态校验：配置自身的问题加上实现注册表无法满足的定位符
pub fn validate_config(config: &ServicesConfig, registry: &ImplementationRegistry) -> Vec<String> {
    let mut problems = config.validate();
    for service in config.services.values() {
        if service.class_path.is_empty() {
            continue;
        }
        if let Err(e) = registry.lookup(
            &service.name,
            &service.class_path,
            service.interface.as_deref(),
        ) {
            problems.push(e.to_string());
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interfaces::{Initializable, Service};
    use crate::infrastructure::Constructor;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Ledger {
        initialized: AtomicBool,
    }

    impl Service for Ledger {
        fn as_initializable(&self) -> Option<&dyn Initializable> {
            Some(self)
        }
    }

    impl Initializable for Ledger {
        fn initialize(&self) -> anyhow::Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn cleanup(&self) -> anyhow::Result<()> {
            self.initialized.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "Ledger"
        }

        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }
    }

    fn registry() -> ImplementationRegistry {
        let mut registry = ImplementationRegistry::new();
        registry.register("app.Ledger", ["app.Store"], Constructor::of(|_| Ok(Ledger::default())));
        registry
    }

    const CONFIG: &str = r#"
[global.container]
lazy_loading = false

[services.audit]
class = "app.Ledger"
dependencies = ["ledger"]

[services.ledger]
class = "app.Ledger"
interface = "app.Store"
"#;

    #[test]
    fn test_bootstrap_registers_in_dependency_order() {
        let config = ServicesConfig::from_toml_str(CONFIG, "inline").unwrap();
        let mut runtime = Runtime::bootstrap(config, registry(), PluginCatalog::new()).unwrap();

        assert_eq!(runtime.report().registered, vec!["ledger", "audit"]);
        let summaries = runtime.service_summaries().unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ledger", "audit"]);
        assert!(summaries.iter().all(|s| s.instantiated && s.initialized));

        runtime.reset().unwrap();
        assert!(runtime.container().registered_names().is_empty());
        assert!(runtime.report().registered.is_empty());
    }

    #[test]
    fn test_auto_wire_off_skips_registration() {
        let config = ServicesConfig::from_toml_str(
            "[global.container]\nauto_wire = false\n\n[services.ledger]\nclass = \"app.Ledger\"\n",
            "inline",
        )
        .unwrap();
        let runtime = Runtime::bootstrap(config, registry(), PluginCatalog::new()).unwrap();
        assert!(!runtime.container().is_registered("ledger"));
    }

    #[test]
    fn test_validate_reports_unknown_locators_and_interfaces() {
        let config = ServicesConfig::from_toml_str(
            r#"
[services.a]
class = "app.Missing"

[services.b]
class = "app.Ledger"
interface = "app.Queue"
"#,
            "inline",
        )
        .unwrap();

        let problems = validate_config(&config, &registry());
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("app.Missing")));
        assert!(problems.iter().any(|p| p.contains("app.Queue")));
    }
}
