//! 插件管理器
//!
//! 负责插件的发现、按优先级与依赖排序加载、状态机驱动的生命周期管理。
//! 单个插件失败只会让它进入 ERROR 状态，不影响其他插件。

pub mod catalog;
pub mod discovery;
pub mod metadata;

pub use catalog::{PluginCatalog, PluginFactory};
pub use discovery::{scan_directories, scan_directory, DiscoveredPlugin, METADATA_FILE_NAME};
pub use metadata::{PluginMetadata, PluginPriority, PluginStatus};

use crate::domain::interfaces::{ConfigMap, HealthCheckResult, Plugin};
use crate::errors::{
    initialization_error, lifecycle_error, CoreError, CoreResult, DependencyError, LifecycleError,
    LoadError, Stage,
};
use crate::logging::OperationTimer;
use chrono::Utc;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::container::ServiceContainer;
use super::resolver::order_by_tiers;

/// `list_plugins` 的单项
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub metadata: PluginMetadata,
    pub loaded: bool,
    pub health: Option<HealthCheckResult>,
}

/// 插件管理器
///
/// 独占插件实例与元数据；服务容器按值交给管理器，插件初始化时通过它解析服务。
pub struct PluginManager {
    container: ServiceContainer,
    catalog: PluginCatalog,
    plugins: HashMap<String, Box<dyn Plugin>>,
    /// 包括加载失败的插件
    metadata: HashMap<String, PluginMetadata>,
    /// 插件名 -> 加载时使用的根目录
    sources: HashMap<String, PathBuf>,
    plugin_directories: Vec<PathBuf>,
    load_order: Vec<String>,
}

impl PluginManager {
    pub fn new(container: ServiceContainer, catalog: PluginCatalog) -> Self {
        Self {
            container,
            catalog,
            plugins: HashMap::new(),
            metadata: HashMap::new(),
            sources: HashMap::new(),
            plugin_directories: Vec::new(),
            load_order: Vec::new(),
        }
    }

    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut ServiceContainer {
        &mut self.container
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn plugin_directories(&self) -> &[PathBuf] {
        &self.plugin_directories
    }

    /// 添加插件目录；不存在或已添加的目录返回 false
    pub fn add_plugin_directory(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.is_dir() {
            tracing::warn!("插件目录不存在: {}", path.display());
            return false;
        }
        if self.plugin_directories.iter().any(|d| d == path) {
            tracing::debug!("插件目录已添加: {}", path.display());
            return false;
        }
        self.plugin_directories.push(path.to_path_buf());
        tracing::info!("添加插件目录: {}", path.display());
        true
    }

    /// 发现所有插件目录中的插件
    pub fn discover_plugins(&self) -> Vec<PluginMetadata> {
        let plugins: Vec<PluginMetadata> = scan_directories(&self.plugin_directories)
            .into_iter()
            .map(|p| p.metadata)
            .collect();
        tracing::info!("发现 {} 个插件", plugins.len());
        plugins
    }

    /// 加载插件：查找入口文件、构造实例、校验名称。
    ///
    /// 处于 ERROR 的已加载实例先卸载，再重新加载。
    pub fn load_plugin(&mut self, metadata: PluginMetadata, directory: &Path) -> bool {
        let name = metadata.name.clone();
        if self.plugins.contains_key(&name) {
            let failed = self
                .metadata
                .get(&name)
                .is_some_and(|m| m.status == PluginStatus::Error);
            if !failed {
                tracing::warn!("插件 {} 已经加载", name);
                return true;
            }
            tracing::info!("插件 {} 处于错误状态，卸载后重新加载", name);
            if !self.unload_plugin(&name) {
                tracing::warn!("插件 {} 卸载失败，继续重新加载", name);
            }
        }

        let mut record = metadata;
        record.status = match self.metadata.get(&name) {
            Some(existing) => existing.status,
            None if record.status.can_transition(PluginStatus::Loading) => record.status,
            None => PluginStatus::Unloaded,
        };
        self.metadata.insert(name.clone(), record);

        let timer = OperationTimer::new(&format!("load_plugin:{}", name));
        match self.try_load(&name, directory) {
            Ok(plugin) => {
                let load_time = timer.finish();
                if let Some(record) = self.metadata.get_mut(&name) {
                    record.load_time = Some(load_time);
                    record.loaded_at = Some(Utc::now());
                    record.error_message = None;
                }
                self.plugins.insert(name.clone(), plugin);
                self.sources.insert(name.clone(), directory.to_path_buf());
                self.load_order.push(name.clone());
                tracing::info!("成功加载插件: {} ({:?})", name, load_time);
                true
            }
            Err(e) => {
                self.mark_error(&name, &e);
                false
            }
        }
    }

    fn try_load(&mut self, name: &str, directory: &Path) -> CoreResult<Box<dyn Plugin>> {
        self.transition(name, PluginStatus::Loading)?;

        let (entry_point, class_name) = match self.metadata.get(name) {
            Some(m) => (m.entry_point.clone(), m.class_name.clone()),
            None => return Err(LifecycleError::NotLoaded { name: name.to_string() }.into()),
        };

        let entry = directory.join(name).join(&entry_point);
        if !entry.is_file() {
            return Err(LoadError::EntryNotFound {
                plugin: name.to_string(),
                path: entry,
            }
            .into());
        }

        let catalog = &self.catalog;
        let plugin = match panic::catch_unwind(AssertUnwindSafe(|| catalog.create(name, &class_name))) {
            Ok(created) => created?,
            Err(payload) => {
                return Err(LoadError::Construction {
                    name: name.to_string(),
                    message: panic_message(payload.as_ref()),
                }
                .into())
            }
        };

        if plugin.name() != name {
            return Err(LoadError::CapabilityMismatch {
                plugin: name.to_string(),
                reported: plugin.name().to_string(),
            }
            .into());
        }

        self.transition(name, PluginStatus::Loaded)?;
        Ok(plugin)
    }

    /// 初始化插件：检查依赖、调用 initialize，再按需校验并应用配置
    pub fn initialize_plugin(&mut self, name: &str) -> bool {
        let Some(status) = self.metadata.get(name).map(|m| m.status) else {
            tracing::error!("插件 {} 未加载", name);
            return false;
        };
        if !self.plugins.contains_key(name) {
            tracing::error!("插件 {} 未加载", name);
            return false;
        }
        if status == PluginStatus::Active {
            return true;
        }
        if !status.can_transition(PluginStatus::Initializing) {
            tracing::error!("插件 {} 处于 {} 状态，需要重新加载后才能初始化", name, status);
            return false;
        }

        match self.try_initialize(name) {
            Ok(()) => {
                tracing::info!("插件 {} 初始化成功", name);
                true
            }
            Err(e) => {
                self.mark_error(name, &e);
                false
            }
        }
    }

    fn try_initialize(&mut self, name: &str) -> CoreResult<()> {
        self.transition(name, PluginStatus::Initializing)?;

        let (dependencies, config) = match self.metadata.get(name) {
            Some(m) => (m.dependencies.clone(), m.config.clone()),
            None => return Err(LifecycleError::NotLoaded { name: name.to_string() }.into()),
        };
        for dependency in &dependencies {
            self.check_dependency(name, dependency)?;
        }

        let plugin = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| LifecycleError::NotLoaded { name: name.to_string() })?;
        let container = &mut self.container;
        guarded(|| plugin.initialize(container))
            .map_err(|e| initialization_error(name, Stage::Initialize, &e))?;

        if !config.is_empty() && plugin.as_configurable().is_some() {
            guarded(|| plugin.validate_config(&config))
                .map_err(|e| initialization_error(name, Stage::ValidateConfig, &e))?;
            guarded(|| match plugin.as_configurable() {
                Some(configurable) => configurable.configure(&config),
                None => Ok(()),
            })
            .map_err(|e| initialization_error(name, Stage::Configure, &e))?;
        }

        self.transition(name, PluginStatus::Active)
    }

    /// 依赖要么是已激活的插件，要么是可解析的服务
    fn check_dependency(&mut self, dependent: &str, dependency: &str) -> CoreResult<()> {
        if let Some(meta) = self.metadata.get(dependency) {
            if meta.status == PluginStatus::Active {
                return Ok(());
            }
            return Err(DependencyError::NotActive {
                dependent: dependent.to_string(),
                dependency: dependency.to_string(),
                status: meta.status.to_string(),
            }
            .into());
        }

        if self.container.is_registered(dependency) {
            return self.container.resolve(dependency).map(|_| ()).map_err(|e| {
                DependencyError::Unresolvable {
                    dependent: dependent.to_string(),
                    dependency: dependency.to_string(),
                    reason: e.to_string(),
                }
                .into()
            });
        }

        Err(DependencyError::Missing {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
        }
        .into())
    }

    /// 发现并加载所有启用的插件，返回每个插件的结果
    pub fn load_all_plugins(&mut self) -> BTreeMap<String, bool> {
        let timer = OperationTimer::new("load_all_plugins");
        let mut candidates: HashMap<String, DiscoveredPlugin> = HashMap::new();
        let mut entries = Vec::new();
        for plugin in scan_directories(&self.plugin_directories) {
            if !plugin.metadata.enabled {
                tracing::info!("插件 {} 已禁用，跳过", plugin.metadata.name);
                continue;
            }
            entries.push((
                plugin.metadata.priority,
                plugin.metadata.name.clone(),
                plugin.metadata.dependencies.clone(),
            ));
            candidates.insert(plugin.metadata.name.clone(), plugin);
        }

        let tiers = order_by_tiers(entries);
        let mut results = BTreeMap::new();

        for cycle in &tiers.cycles {
            let error: CoreError = DependencyError::Cycle { path: cycle.clone() }.into();
            for name in cycle {
                let Some(plugin) = candidates.remove(name) else {
                    continue;
                };
                if self.plugins.contains_key(name) {
                    continue;
                }
                let mut record = plugin.metadata;
                record.status = self
                    .metadata
                    .get(name)
                    .map(|m| m.status)
                    .unwrap_or(PluginStatus::Unloaded);
                self.metadata.insert(name.clone(), record);
                self.mark_error(name, &error);
                results.insert(name.clone(), false);
            }
        }

        for name in &tiers.order {
            let Some(plugin) = candidates.remove(name) else {
                continue;
            };
            let ok = self.load_plugin(plugin.metadata, &plugin.directory) && self.initialize_plugin(name);
            results.insert(name.clone(), ok);
        }

        let succeeded = results.values().filter(|ok| **ok).count();
        tracing::info!(
            "插件加载完成: 成功 {} 个，失败 {} 个",
            succeeded,
            results.len() - succeeded
        );
        timer.finish();
        results
    }

    /// 卸载插件：stop（如果支持）再 cleanup
    pub fn unload_plugin(&mut self, name: &str) -> bool {
        if !self.plugins.contains_key(name) {
            tracing::warn!("插件 {} 未加载", name);
            return true;
        }

        match self.try_unload(name) {
            Ok(()) => {
                self.metadata.remove(name);
                self.sources.remove(name);
                self.load_order.retain(|n| n != name);
                tracing::info!("成功卸载插件: {}", name);
                true
            }
            Err(e) => {
                self.plugins.remove(name);
                self.load_order.retain(|n| n != name);
                self.mark_error(name, &e);
                false
            }
        }
    }

    fn try_unload(&mut self, name: &str) -> CoreResult<()> {
        self.transition(name, PluginStatus::Stopping)?;
        let mut plugin = self
            .plugins
            .remove(name)
            .ok_or_else(|| LifecycleError::NotLoaded { name: name.to_string() })?;

        let mut first_error: Option<CoreError> = None;
        if let Some(lifecycle) = plugin.as_lifecycle() {
            if let Err(e) = guarded(|| lifecycle.stop()) {
                first_error = Some(lifecycle_error(name, Stage::Stop, &e));
            }
        }
        if let Err(e) = guarded(|| plugin.cleanup()) {
            first_error.get_or_insert_with(|| lifecycle_error(name, Stage::Cleanup, &e));
        }

        match first_error {
            Some(e) => Err(e),
            None => self.transition(name, PluginStatus::Stopped),
        }
    }

    /// 重启插件：已激活且支持生命周期时调用插件自身的 restart，
    /// 其余情况卸载后重新加载并初始化
    pub fn restart_plugin(&mut self, name: &str) -> bool {
        let has_lifecycle = match self.plugins.get_mut(name) {
            Some(plugin) => plugin.as_lifecycle().is_some(),
            None => {
                tracing::error!("插件 {} 未加载，无法重启", name);
                return false;
            }
        };
        let active = self
            .metadata
            .get(name)
            .is_some_and(|m| m.status == PluginStatus::Active);

        if has_lifecycle && active {
            let result = match self.plugins.get_mut(name).and_then(|p| p.as_lifecycle()) {
                Some(lifecycle) => guarded(|| lifecycle.restart()),
                None => Ok(()),
            };
            return match result {
                Ok(()) => {
                    tracing::info!("插件 {} 已重启", name);
                    true
                }
                Err(e) => {
                    let error = lifecycle_error(name, Stage::Restart, &e);
                    self.mark_error(name, &error);
                    false
                }
            };
        }

        let (Some(mut metadata), Some(directory)) = (
            self.metadata.get(name).cloned(),
            self.sources.get(name).cloned(),
        ) else {
            tracing::error!("插件 {} 缺少加载记录，无法重启", name);
            return false;
        };

        if !self.unload_plugin(name) {
            tracing::error!("插件 {} 卸载失败，放弃重启", name);
            return false;
        }
        metadata.status = PluginStatus::Stopped;
        metadata.error_message = None;
        self.load_plugin(metadata, &directory) && self.initialize_plugin(name)
    }

    /// 合并更新可配置插件的配置
    pub fn update_plugin_config(&mut self, name: &str, patch: &ConfigMap) -> CoreResult<()> {
        let plugin = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| LifecycleError::NotLoaded { name: name.to_string() })?;
        let configurable = plugin.as_configurable().ok_or_else(|| {
            crate::errors::RegistrationError::TypeMismatch {
                name: name.to_string(),
                expected: "ConfigurablePlugin",
            }
        })?;
        guarded(|| configurable.update_configuration(patch))
            .map_err(|e| initialization_error(name, Stage::Configure, &e))?;
        let merged = configurable.configuration();

        if let Some(record) = self.metadata.get_mut(name) {
            record.config = merged;
        }
        tracing::info!("插件 {} 配置已更新", name);
        Ok(())
    }

    /// 按加载顺序的逆序卸载全部插件
    pub fn shutdown(&mut self) {
        let order: Vec<String> = self.load_order.iter().rev().cloned().collect();
        for name in order {
            if !self.unload_plugin(&name) {
                tracing::warn!("关闭时卸载插件 {} 失败", name);
            }
        }
        self.plugins.clear();
        self.metadata.clear();
        self.sources.clear();
        self.load_order.clear();
        tracing::info!("插件管理器已关闭");
    }

    // ---- 查询 ----

    pub fn get_plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    pub fn get_plugin_mut(&mut self, name: &str) -> Option<&mut dyn Plugin> {
        match self.plugins.get_mut(name) {
            Some(plugin) => Some(&mut **plugin),
            None => None,
        }
    }

    pub fn get_plugin_metadata(&self, name: &str) -> Option<&PluginMetadata> {
        self.metadata.get(name)
    }

    /// 所有已知插件（含加载失败的）
    pub fn list_plugins(&self) -> BTreeMap<String, PluginInfo> {
        self.metadata
            .iter()
            .map(|(name, metadata)| {
                let plugin = self.plugins.get(name);
                let info = PluginInfo {
                    metadata: metadata.clone(),
                    loaded: plugin.is_some(),
                    health: plugin.map(|p| p.health()),
                };
                (name.clone(), info)
            })
            .collect()
    }

    pub fn get_plugins_by_status(&self, status: PluginStatus) -> Vec<String> {
        let mut names: Vec<String> = self
            .metadata
            .values()
            .filter(|m| m.status == status)
            .map(|m| m.name.clone())
            .collect();
        names.sort();
        names
    }

    /// 成功加载的顺序
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    fn transition(&mut self, name: &str, to: PluginStatus) -> CoreResult<()> {
        let record = self
            .metadata
            .get_mut(name)
            .ok_or_else(|| LifecycleError::NotLoaded { name: name.to_string() })?;
        record.transition(to)?;
        Ok(())
    }

    fn mark_error(&mut self, name: &str, error: &CoreError) {
        tracing::error!("插件 {} 出错: {}", name, error);
        let Some(record) = self.metadata.get_mut(name) else {
            return;
        };
        if record.status != PluginStatus::Error {
            if let Err(e) = record.transition(PluginStatus::Error) {
                tracing::warn!("{}", e);
            }
        }
        record.error_message = Some(error.to_string());
    }
}

/// 在 catch_unwind 中执行插件钩子，panic 转为错误
fn guarded<T, F>(hook: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
