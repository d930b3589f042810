//! 内置服务与插件
//!
//! 编译期登记到实现注册表与插件目录，配置文件通过定位符引用。

pub mod plugins;
pub mod services;

pub use plugins::{InspectorPlugin, PulsePlugin};
pub use services::{Heartbeat, KeyValueStore, SystemClock};

use crate::domain::interfaces::ServiceRef;
use crate::infrastructure::{Constructor, ImplementationRegistry, PluginCatalog};
use crate::infrastructure::plugin_manager::metadata::DEFAULT_CLASS_NAME;
use std::sync::Arc;

pub const CLOCK_LOCATOR: &str = "builtin.SystemClock";
pub const STORE_LOCATOR: &str = "builtin.KeyValueStore";
pub const HEARTBEAT_LOCATOR: &str = "builtin.Heartbeat";

/// 能力键
pub const STORE_INTERFACE: &str = "builtin.Store";
pub const LIFECYCLE_INTERFACE: &str = "builtin.Lifecycle";

/// 内置插件约定使用的服务名
pub const STORE_SERVICE: &str = "store";
pub const CLOCK_SERVICE: &str = "clock";

/// 登记内置服务实现
pub fn register_builtins(registry: &mut ImplementationRegistry) {
    registry
        .register(
            CLOCK_LOCATOR,
            Vec::<String>::new(),
            Constructor::of(|_| Ok(SystemClock)),
        )
        .register(
            STORE_LOCATOR,
            [STORE_INTERFACE],
            Constructor::of(|_| Ok(KeyValueStore::new())),
        )
        .register(
            HEARTBEAT_LOCATOR,
            [LIFECYCLE_INTERFACE],
            Constructor::of(|args| {
                Ok(Heartbeat::new(
                    args.require::<KeyValueStore>("store")?,
                    args.require::<SystemClock>("clock")?,
                ))
            })
            .param("store", STORE_SERVICE)
            .param_or("clock", CLOCK_SERVICE, || -> ServiceRef { Arc::new(SystemClock) }),
        );
}

/// 内置插件目录
pub fn builtin_catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog
        .register(InspectorPlugin::NAME, DEFAULT_CLASS_NAME, || {
            Ok(Box::new(InspectorPlugin::default()))
        })
        .register(PulsePlugin::NAME, DEFAULT_CLASS_NAME, || {
            Ok(Box::new(PulsePlugin::default()))
        });
    catalog
}
