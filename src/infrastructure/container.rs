//! 依赖注入容器实现
//!
//! 按名称注册和解析服务，支持：
//! - 单例 / 瞬态 / 作用域（作用域按单例处理）
//! - 构造描述自动装配、工厂函数、预构造实例
//! - 按依赖顺序批量注册，按逆序关闭
//! - 循环依赖检测

use crate::config::{ContainerSettings, ServiceEntry, ServicesConfig};
use crate::domain::interfaces::service::downcast_service;
use crate::domain::interfaces::{ConfigMap, Service, ServiceLocator, ServiceRef};
use crate::errors::{
    initialization_error, lifecycle_error, ConfigError, CoreError, CoreResult, DependencyError,
    LoadError, RegistrationError, Stage,
};
use crate::logging::OperationTimer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::provider::{Constructor, Implementation, ImplementationRegistry, ResolvedArgs};
use super::resolver::DependencyGraph;

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLifetime {
    /// 单例 - 整个容器生命周期只有一个实例
    Singleton,
    /// 瞬态 - 每次请求都创建新实例
    Transient,
    /// 作用域 - 目前与单例相同
    Scoped,
}

impl ServiceLifetime {
    /// 实例是否进入缓存
    pub fn is_cached(self) -> bool {
        !matches!(self, ServiceLifetime::Transient)
    }
}

impl FromStr for ServiceLifetime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(ServiceLifetime::Singleton),
            "transient" => Ok(ServiceLifetime::Transient),
            "scoped" => Ok(ServiceLifetime::Scoped),
            other => Err(format!("unknown service scope '{}'", other)),
        }
    }
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceLifetime::Singleton => "singleton",
            ServiceLifetime::Transient => "transient",
            ServiceLifetime::Scoped => "scoped",
        };
        f.write_str(s)
    }
}

/// 服务描述
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    /// 能力键
    pub interface: Option<String>,
    /// 实现定位符（来自配置时存在）
    pub class_path: Option<String>,
    pub lifetime: ServiceLifetime,
    pub dependencies: Vec<String>,
    pub config: ConfigMap,
    pub enabled: bool,
    pub optional: bool,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, lifetime: ServiceLifetime) -> Self {
        Self {
            name: name.into(),
            interface: None,
            class_path: None,
            lifetime,
            dependencies: Vec::new(),
            config: ConfigMap::new(),
            enabled: true,
            optional: false,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// 服务状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub registered: bool,
    pub instantiated: bool,
    pub initialized: bool,
    pub running: bool,
}

/// 批量注册结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoRegisterReport {
    /// 成功注册的服务（按注册顺序）
    pub registered: Vec<String>,
    /// 失败后被跳过的可选服务
    pub skipped: Vec<String>,
    /// 配置校验发现的问题
    pub validation_errors: Vec<String>,
}

/// 容器统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContainerStats {
    /// 总解析次数
    pub total_resolutions: u64,
    /// 单例缓存命中次数
    pub singleton_cache_hits: u64,
    /// 单例缓存未命中次数
    pub singleton_cache_misses: u64,
    /// 瞬态服务创建次数
    pub transient_creations: u64,
    /// 服务注册数量
    pub registered_services: usize,
    /// 活跃单例数量
    pub active_singletons: usize,
}

impl ContainerStats {
    /// 获取缓存命中率（百分比）
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.singleton_cache_hits as f64 / total as f64) * 100.0
        }
    }

    /// 获取性能指标摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} registered services, {} active singletons",
            self.total_resolutions,
            self.cache_hit_rate(),
            self.registered_services,
            self.active_singletons
        )
    }
}

/// 服务注册信息
struct Registration {
    descriptor: ServiceDescriptor,
    implementation: Implementation,
}

impl Registration {
    /// 描述中声明的依赖加上构造参数依赖（去重，保持顺序）
    fn dependency_names(&self) -> Vec<String> {
        let mut names = self.descriptor.dependencies.clone();
        if let Implementation::Constructor(constructor) = &self.implementation {
            for dep in constructor.dependency_names() {
                if !names.iter().any(|n| n == dep) {
                    names.push(dep.to_string());
                }
            }
        }
        names
    }
}

/// 服务容器
///
/// 独占单例缓存；所有操作都是同步的，`&mut self` 表达独占修改。
pub struct ServiceContainer {
    /// 服务注册表
    registrations: HashMap<String, Registration>,
    /// 注册顺序
    order: Vec<String>,
    /// 实例缓存（单例、作用域、预构造实例）
    instances: HashMap<String, ServiceRef>,
    /// 循环依赖检测栈
    resolution_stack: Vec<String>,
    settings: ContainerSettings,
    config: Option<Arc<ServicesConfig>>,
    registry: ImplementationRegistry,
    stats: ContainerStats,
}

impl ServiceContainer {
    /// 创建空容器
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            order: Vec::new(),
            instances: HashMap::new(),
            resolution_stack: Vec::new(),
            settings: ContainerSettings::default(),
            config: None,
            registry: ImplementationRegistry::new(),
            stats: ContainerStats::default(),
        }
    }

    /// 创建绑定了服务配置与实现注册表的容器（不会自动注册）
    pub fn with_config(config: ServicesConfig, registry: ImplementationRegistry) -> Self {
        let mut container = Self::new();
        container.settings = config.global.container;
        container.config = Some(Arc::new(config));
        container.registry = registry;
        tracing::debug!("服务容器已初始化");
        container
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub fn services_config(&self) -> Option<&ServicesConfig> {
        self.config.as_deref()
    }

    pub fn registry(&self) -> &ImplementationRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &ContainerStats {
        &self.stats
    }

    // ---- 注册 ----

    /// 注册构造描述
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: Constructor,
        lifetime: ServiceLifetime,
    ) -> &mut Self {
        let descriptor = ServiceDescriptor::new(name, lifetime);
        self.register_descriptor(descriptor, Implementation::Constructor(constructor))
    }

    /// 注册工厂函数
    pub fn register_factory<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
        lifetime: ServiceLifetime,
    ) -> &mut Self
    where
        F: Fn() -> anyhow::Result<ServiceRef> + Send + Sync + 'static,
    {
        let descriptor = ServiceDescriptor::new(name, lifetime);
        self.register_descriptor(descriptor, Implementation::Factory(Arc::new(factory)))
    }

    /// 注册预构造实例，解析时原样返回
    pub fn register_instance(&mut self, name: impl Into<String>, instance: ServiceRef) -> &mut Self {
        let descriptor = ServiceDescriptor::new(name, ServiceLifetime::Singleton);
        self.register_descriptor(descriptor, Implementation::Instance(instance))
    }

    /// 注册完整的服务描述；同名注册会覆盖，但保留原有顺序位置
    pub fn register_descriptor(
        &mut self,
        descriptor: ServiceDescriptor,
        implementation: Implementation,
    ) -> &mut Self {
        let name = descriptor.name.clone();

        if self.registrations.contains_key(&name) {
            tracing::debug!("覆盖已注册的服务: {}", name);
            if let Err(e) = self.shutdown_service(&name) {
                tracing::warn!("覆盖服务 {} 时关闭旧实例失败: {}", name, e);
            }
        } else {
            self.order.push(name.clone());
        }

        if let Implementation::Instance(instance) = &implementation {
            self.instances.insert(name.clone(), instance.clone());
        }

        tracing::debug!(
            service = %name,
            kind = implementation.kind(),
            lifetime = %descriptor.lifetime,
            "已注册服务"
        );

        self.registrations.insert(
            name,
            Registration {
                descriptor,
                implementation,
            },
        );
        self.refresh_counts();
        self
    }

    /// 关闭并移除注册
    pub fn unregister(&mut self, name: &str) -> CoreResult<bool> {
        if !self.registrations.contains_key(name) {
            return Ok(false);
        }
        let shutdown = self.shutdown_service(name);
        self.registrations.remove(name);
        self.order.retain(|n| n != name);
        self.refresh_counts();
        shutdown.map(|_| true)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    pub fn is_instantiated(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// 已注册的服务名称（按注册顺序）
    pub fn registered_names(&self) -> &[String] {
        &self.order
    }

    pub fn descriptor(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.registrations.get(name).map(|r| &r.descriptor)
    }

    // ---- 解析 ----

    /// 解析服务
    pub fn resolve(&mut self, name: &str) -> CoreResult<ServiceRef> {
        self.stats.total_resolutions += 1;

        let lifetime = match self.registrations.get(name) {
            None => {
                return Err(RegistrationError::Unregistered {
                    name: name.to_string(),
                }
                .into())
            }
            Some(Registration {
                implementation: Implementation::Instance(instance),
                ..
            }) => return Ok(instance.clone()),
            Some(registration) => registration.descriptor.lifetime,
        };

        if lifetime.is_cached() {
            if let Some(cached) = self.instances.get(name) {
                self.stats.singleton_cache_hits += 1;
                return Ok(cached.clone());
            }
            self.stats.singleton_cache_misses += 1;
        } else {
            self.stats.transient_creations += 1;
        }

        // 检查循环依赖
        if let Some(start) = self.resolution_stack.iter().position(|n| n == name) {
            let mut path = self.resolution_stack[start..].to_vec();
            path.push(name.to_string());
            tracing::error!("检测到循环依赖: {}", path.join(" -> "));
            return Err(DependencyError::Cycle { path }.into());
        }

        self.resolution_stack.push(name.to_string());
        let result = self.create_instance(name);
        self.resolution_stack.pop();

        let instance = result?;
        if lifetime.is_cached() {
            self.instances.insert(name.to_string(), instance.clone());
            self.refresh_counts();
        }
        Ok(instance)
    }

    /// 解析并转换为具体类型
    pub fn resolve_as<T: Service>(&mut self, name: &str) -> CoreResult<Arc<T>> {
        let service = self.resolve(name)?;
        downcast_service::<T>(service).ok_or_else(|| {
            RegistrationError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
    }

    fn create_instance(&mut self, name: &str) -> CoreResult<ServiceRef> {
        let (implementation, config) = match self.registrations.get(name) {
            Some(registration) => (
                registration.implementation.clone(),
                registration.descriptor.config.clone(),
            ),
            None => {
                return Err(RegistrationError::Unregistered {
                    name: name.to_string(),
                }
                .into())
            }
        };

        let instance = match implementation {
            Implementation::Instance(instance) => return Ok(instance),
            Implementation::Factory(factory) => factory().map_err(|e| construction_error(name, &e))?,
            Implementation::Constructor(constructor) => {
                let args = self.resolve_arguments(name, &constructor)?;
                constructor
                    .build(&args)
                    .map_err(|e| construction_error(name, &e))?
            }
        };

        run_startup_hooks(name, &instance, &config)?;
        tracing::debug!("已创建服务实例: {}", name);
        Ok(instance)
    }

    /// 逐个解析构造参数：失败时使用默认值，没有默认值则记录警告并省略。
    /// 循环依赖不会被吞掉。
    fn resolve_arguments(&mut self, service: &str, constructor: &Constructor) -> CoreResult<ResolvedArgs> {
        let mut args = ResolvedArgs::new();

        for param in constructor.params() {
            let mut failure = None;
            let mut value = None;

            if let Some(dependency) = &param.dependency {
                match self.resolve(dependency) {
                    Ok(instance) => value = Some(instance),
                    Err(e @ CoreError::Dependency(DependencyError::Cycle { .. })) => return Err(e),
                    Err(e) => failure = Some(e.to_string()),
                }
            }

            if value.is_none() {
                value = param.default.as_ref().map(|default| default());
            }

            match value {
                Some(instance) => args.insert(param.name.clone(), instance),
                None => tracing::warn!(
                    "无法解析服务 {} 的依赖 {}: {}",
                    service,
                    param.name,
                    failure.unwrap_or_else(|| "no dependency or default declared".to_string())
                ),
            }
        }

        Ok(args)
    }

    // ---- 关闭与重启 ----

    /// 关闭指定服务：stop、cleanup，然后移出缓存。
    ///
    /// 钩子失败也会移出缓存，返回第一个错误。
    pub fn shutdown_service(&mut self, name: &str) -> CoreResult<()> {
        let Some(instance) = self.instances.remove(name) else {
            return Ok(());
        };
        self.refresh_counts();

        let mut first_error = None;

        if let Some(lifecycle) = instance.as_lifecycle() {
            match lifecycle.stop() {
                Ok(()) => tracing::debug!("已停止服务: {}", name),
                Err(e) => {
                    tracing::error!("停止服务 {} 失败: {:#}", name, e);
                    first_error.get_or_insert(lifecycle_error(name, Stage::Stop, &e));
                }
            }
        }

        if let Some(initializable) = instance.as_initializable() {
            match initializable.cleanup() {
                Ok(()) => tracing::debug!("已清理服务: {}", name),
                Err(e) => {
                    tracing::error!("清理服务 {} 失败: {:#}", name, e);
                    first_error.get_or_insert(lifecycle_error(name, Stage::Cleanup, &e));
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// 按依赖顺序的逆序关闭所有已实例化的服务
    pub fn shutdown_all(&mut self) -> CoreResult<()> {
        let order = match self.registration_order() {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!("{}，按注册顺序关闭服务", e);
                self.order.clone()
            }
        };

        let mut first_error = None;
        for name in order.iter().rev() {
            if !self.instances.contains_key(name) {
                continue;
            }
            if let Err(e) = self.shutdown_service(name) {
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("所有服务已关闭");
        first_error.map_or(Ok(()), Err)
    }

    /// 重启服务：优先调用 `restart()`，不支持或失败时关闭后重新解析
    pub fn restart_service(&mut self, name: &str) -> CoreResult<ServiceRef> {
        if let Some(instance) = self.instances.get(name).cloned() {
            if let Some(lifecycle) = instance.as_lifecycle() {
                match lifecycle.restart() {
                    Ok(()) => {
                        tracing::debug!("已重启服务: {}", name);
                        return Ok(instance);
                    }
                    Err(e) => tracing::error!("重启服务 {} 失败: {:#}，尝试重新创建", name, e),
                }
            }
        }

        if let Err(e) = self.shutdown_service(name) {
            tracing::warn!("重启前关闭服务 {} 出错: {}", name, e);
        }
        self.resolve(name)
    }

    pub fn get_service_status(&self, name: &str) -> ServiceStatus {
        let instance = self.instances.get(name);
        ServiceStatus {
            name: name.to_string(),
            registered: self.registrations.contains_key(name),
            instantiated: instance.is_some(),
            initialized: instance
                .and_then(|i| i.as_initializable())
                .map(|i| i.is_initialized())
                .unwrap_or(false),
            running: instance
                .and_then(|i| i.as_lifecycle())
                .map(|l| l.is_running())
                .unwrap_or(false),
        }
    }

    /// 关闭所有服务并清空注册信息
    pub fn clear(&mut self) -> CoreResult<()> {
        let shutdown = self.shutdown_all();

        self.registrations.clear();
        self.order.clear();
        self.instances.clear();
        self.resolution_stack.clear();
        self.refresh_counts();

        tracing::debug!("服务容器已清空");
        shutdown
    }

    // ---- 依赖顺序与校验 ----

    fn dependency_graph(&self) -> DependencyGraph {
        self.order
            .iter()
            .filter_map(|name| {
                self.registrations
                    .get(name)
                    .map(|r| (name.clone(), r.dependency_names()))
            })
            .collect()
    }

    /// 依赖顺序：每个服务排在它的依赖之后，其余按注册顺序
    pub fn registration_order(&self) -> CoreResult<Vec<String>> {
        Ok(self.dependency_graph().order()?)
    }

    /// 返回依赖问题描述列表（空表示通过）
    pub fn validate_dependencies(&self) -> Vec<String> {
        let graph = self.dependency_graph();
        let mut errors: Vec<String> = graph
            .missing_dependencies()
            .into_iter()
            .map(|(dependent, dependency)| {
                DependencyError::Missing {
                    dependent,
                    dependency,
                }
                .to_string()
            })
            .collect();

        if self.settings.circular_dependency_detection {
            errors.extend(
                graph
                    .find_cycles()
                    .into_iter()
                    .map(|path| DependencyError::Cycle { path }.to_string()),
            );
        }
        errors
    }

    /// 严格校验：第一个缺失依赖或环路作为错误返回
    pub fn validate_strict(&self) -> CoreResult<()> {
        let graph = self.dependency_graph();
        if let Some((dependent, dependency)) = graph.missing_dependencies().into_iter().next() {
            return Err(DependencyError::Missing {
                dependent,
                dependency,
            }
            .into());
        }
        graph.check_acyclic()?;
        Ok(())
    }

    // ---- 服务配置 ----

    pub fn get_service_config(&self, name: &str) -> Option<&ConfigMap> {
        self.registrations.get(name).map(|r| &r.descriptor.config)
    }

    pub fn get_config_value(&self, name: &str, key: &str) -> Option<&serde_json::Value> {
        self.get_service_config(name).and_then(|config| config.get(key))
    }

    /// 合并更新服务配置，下次构造时生效
    pub fn update_service_config(&mut self, name: &str, updates: ConfigMap) -> bool {
        match self.registrations.get_mut(name) {
            Some(registration) => {
                for (key, value) in updates {
                    registration.descriptor.config.insert(key, value);
                }
                tracing::debug!("更新服务 {} 的配置", name);
                true
            }
            None => {
                tracing::warn!("服务 {} 不存在，无法更新配置", name);
                false
            }
        }
    }

    // ---- 配置驱动注册 ----

    /// 按配置批量注册启用的服务。
    ///
    /// 环路检测在任何注册之前完成；可选服务失败只记录警告并跳过，
    /// 必需服务失败中止整个批次。
    pub fn auto_register(&mut self) -> CoreResult<AutoRegisterReport> {
        let Some(config) = self.config.clone() else {
            tracing::debug!("未绑定服务配置，跳过自动注册");
            return Ok(AutoRegisterReport::default());
        };
        let timer = OperationTimer::new("auto_register");

        let mut report = AutoRegisterReport {
            validation_errors: config.validate(),
            ..Default::default()
        };
        for problem in &report.validation_errors {
            tracing::warn!("配置校验: {}", problem);
        }

        self.register_batch(config.enabled_services(), &mut report)
            .inspect_err(|e| tracing::error!("自动注册服务失败: {}", e))?;

        tracing::info!(
            "自动注册了 {} 个服务，跳过 {} 个",
            report.registered.len(),
            report.skipped.len()
        );
        timer.finish();
        Ok(report)
    }

    /// 先查找全部构造描述并排序，再按依赖顺序注册；非延迟加载时构造缓存型服务。
    ///
    /// 依赖边包括配置声明的依赖和构造参数的依赖。
    fn register_batch(
        &mut self,
        entries: Vec<&ServiceEntry>,
        report: &mut AutoRegisterReport,
    ) -> CoreResult<()> {
        let mut lookups: HashMap<String, Result<Constructor, LoadError>> = entries
            .iter()
            .map(|entry| {
                let lookup = self.registry.lookup(
                    &entry.name,
                    &entry.class_path,
                    entry.interface.as_deref(),
                );
                (entry.name.clone(), lookup)
            })
            .collect();

        let graph: DependencyGraph = entries
            .iter()
            .map(|entry| {
                let mut dependencies = entry.dependencies.clone();
                if let Some(Ok(constructor)) = lookups.get(&entry.name) {
                    for dep in constructor.dependency_names() {
                        if !dependencies.iter().any(|d| d == dep) {
                            dependencies.push(dep.to_string());
                        }
                    }
                }
                (entry.name.clone(), dependencies)
            })
            .collect();

        let order = if self.settings.circular_dependency_detection {
            graph.order()?
        } else {
            graph.nodes().to_vec()
        };

        for name in &order {
            let (Some(entry), Some(lookup)) = (
                entries.iter().find(|e| &e.name == name),
                lookups.remove(name),
            ) else {
                continue;
            };
            let result = lookup
                .map_err(CoreError::from)
                .and_then(|constructor| self.register_entry(entry, constructor));
            match result {
                Ok(()) => report.registered.push(name.clone()),
                Err(e) if entry.optional => {
                    tracing::warn!("可选服务 {} 注册失败，系统将继续运行: {}", name, e);
                    report.skipped.push(name.clone());
                }
                Err(e) => {
                    tracing::error!("注册服务 {} 失败: {}", name, e);
                    return Err(e);
                }
            }
        }

        if !self.settings.lazy_loading {
            self.construct_eagerly(report)?;
        }
        Ok(())
    }

    fn construct_eagerly(&mut self, report: &mut AutoRegisterReport) -> CoreResult<()> {
        for name in report.registered.clone() {
            let (cached, optional) = match self.registrations.get(&name) {
                Some(r) => (r.descriptor.lifetime.is_cached(), r.descriptor.optional),
                None => continue,
            };
            if !cached {
                continue;
            }

            if let Err(e) = self.resolve(&name) {
                if !optional {
                    tracing::error!("构造服务 {} 失败: {}", name, e);
                    return Err(e);
                }
                tracing::warn!("可选服务 {} 构造失败，系统将继续运行: {}", name, e);
                if let Err(e) = self.unregister(&name) {
                    tracing::warn!("移除可选服务 {} 时出错: {}", name, e);
                }
                report.registered.retain(|n| n != &name);
                report.skipped.push(name);
            }
        }
        Ok(())
    }

    /// 从配置条目注册服务
    pub fn register_from_config(&mut self, entry: &ServiceEntry) -> CoreResult<()> {
        let constructor =
            self.registry
                .lookup(&entry.name, &entry.class_path, entry.interface.as_deref())?;
        self.register_entry(entry, constructor)
    }

    fn register_entry(&mut self, entry: &ServiceEntry, constructor: Constructor) -> CoreResult<()> {
        let descriptor = entry.to_descriptor()?;
        self.register_descriptor(descriptor, Implementation::Constructor(constructor));
        tracing::debug!("从配置注册服务: {}", entry.name);
        Ok(())
    }

    /// 注册服务组中的服务，规则与 `auto_register` 相同：
    /// 组内环路在注册前报告，按依赖顺序注册，非延迟加载时构造单例
    pub fn register_service_group(&mut self, group: &str) -> CoreResult<AutoRegisterReport> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| ConfigError::UnknownGroup(group.to_string()))?;
        let entries = config.services_by_group(group)?;

        let mut report = AutoRegisterReport::default();
        self.register_batch(entries, &mut report)
            .inspect_err(|e| tracing::error!("注册服务组 {} 失败: {}", group, e))?;

        tracing::info!(
            "注册服务组 {}，包含 {} 个服务",
            group,
            report.registered.len()
        );
        Ok(report)
    }

    fn refresh_counts(&mut self) {
        self.stats.registered_services = self.registrations.len();
        self.stats.active_singletons = self.instances.len();
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceLocator for ServiceContainer {
    fn resolve(&mut self, name: &str) -> CoreResult<ServiceRef> {
        ServiceContainer::resolve(self, name)
    }

    fn is_registered(&self, name: &str) -> bool {
        ServiceContainer::is_registered(self, name)
    }

    fn provide(&mut self, name: &str, instance: ServiceRef) {
        self.register_instance(name, instance);
    }
}

fn construction_error(name: &str, err: &anyhow::Error) -> CoreError {
    tracing::error!("创建服务实例失败 {}: {:#}", name, err);
    LoadError::Construction {
        name: name.to_string(),
        message: format!("{:#}", err),
    }
    .into()
}

/// configure（配置非空时）→ initialize → start
fn run_startup_hooks(name: &str, instance: &ServiceRef, config: &ConfigMap) -> CoreResult<()> {
    if !config.is_empty() {
        if let Some(configurable) = instance.as_configurable() {
            configurable.configure(config).map_err(|e| {
                tracing::error!("配置服务 {} 失败: {:#}", name, e);
                initialization_error(name, Stage::Configure, &e)
            })?;
        }
    }

    if let Some(initializable) = instance.as_initializable() {
        initializable.initialize().map_err(|e| {
            tracing::error!("初始化服务 {} 失败: {:#}", name, e);
            initialization_error(name, Stage::Initialize, &e)
        })?;
    }

    if let Some(lifecycle) = instance.as_lifecycle() {
        lifecycle.start().map_err(|e| {
            tracing::error!("启动服务 {} 失败: {:#}", name, e);
            lifecycle_error(name, Stage::Start, &e)
        })?;
    }

    Ok(())
}
