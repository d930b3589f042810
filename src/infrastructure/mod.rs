//! 基础设施层
//!
//! 提供具体的技术实现，包括：
//! - 依赖图解析与拓扑排序
//! - 依赖注入容器与实现注册表
//! - 插件管理器

// 容器实现
pub mod container;
pub mod plugin_manager;
pub mod provider;
pub mod resolver;

// 重新导出API
pub use container::{
    AutoRegisterReport, ContainerStats, ServiceContainer, ServiceDescriptor, ServiceLifetime,
    ServiceStatus,
};
pub use plugin_manager::{
    PluginCatalog, PluginInfo, PluginManager, PluginMetadata, PluginPriority, PluginStatus,
};
pub use provider::{Constructor, Implementation, ImplementationRegistry, ResolvedArgs};
pub use resolver::{order_by_tiers, DependencyGraph, TieredOrder};
