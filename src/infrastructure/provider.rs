//! 服务提供者实现
//!
//! 构造描述（参数列表 + 构造闭包）以及按定位符查找实现的注册表。
//! 配置文件中的 `class` 字段就是这里的定位符。

use crate::domain::interfaces::service::downcast_service;
use crate::domain::interfaces::{Service, ServiceRef};
use crate::errors::LoadError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 参数默认值
pub type DefaultFn = Arc<dyn Fn() -> ServiceRef + Send + Sync>;

/// 构造闭包
pub type BuildFn = Arc<dyn Fn(&ResolvedArgs) -> anyhow::Result<ServiceRef> + Send + Sync>;

/// 无参数工厂
pub type Factory = Arc<dyn Fn() -> anyhow::Result<ServiceRef> + Send + Sync>;

/// 构造参数描述
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    /// 依赖的服务名称；为空时只能使用默认值
    pub dependency: Option<String>,
    pub default: Option<DefaultFn>,
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("dependency", &self.dependency)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// 构造时已解析的参数
#[derive(Default)]
pub struct ResolvedArgs {
    values: HashMap<String, ServiceRef>,
}

impl ResolvedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ServiceRef) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRef> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 取出参数并转换为具体类型；缺失或类型不符都返回 `None`
    pub fn get_as<T: Service>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get(name).cloned().and_then(downcast_service::<T>)
    }

    /// 必需参数
    pub fn require<T: Service>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("missing argument '{}'", name))?;
        downcast_service::<T>(value.clone()).ok_or_else(|| {
            anyhow::anyhow!(
                "argument '{}' is not a {}",
                name,
                std::any::type_name::<T>()
            )
        })
    }
}

/// 构造描述：容器按参数列表解析依赖后调用构造闭包
#[derive(Clone)]
pub struct Constructor {
    params: Vec<ParamSpec>,
    build: BuildFn,
}

impl Constructor {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> anyhow::Result<ServiceRef> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// 构造闭包直接返回具体类型
    pub fn of<T, F>(build: F) -> Self
    where
        T: Service,
        F: Fn(&ResolvedArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::new(move |args| {
            let service: ServiceRef = Arc::new(build(args)?);
            Ok(service)
        })
    }

    /// 依赖某个服务的参数
    pub fn param(mut self, name: impl Into<String>, dependency: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            dependency: Some(dependency.into()),
            default: None,
        });
        self
    }

    /// 依赖解析失败时使用默认值的参数
    pub fn param_or<F>(
        mut self,
        name: impl Into<String>,
        dependency: impl Into<String>,
        default: F,
    ) -> Self
    where
        F: Fn() -> ServiceRef + Send + Sync + 'static,
    {
        self.params.push(ParamSpec {
            name: name.into(),
            dependency: Some(dependency.into()),
            default: Some(Arc::new(default)),
        });
        self
    }

    /// 只有默认值的参数
    pub fn param_default<F>(mut self, name: impl Into<String>, default: F) -> Self
    where
        F: Fn() -> ServiceRef + Send + Sync + 'static,
    {
        self.params.push(ParamSpec {
            name: name.into(),
            dependency: None,
            default: Some(Arc::new(default)),
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(|p| p.dependency.as_deref())
    }

    pub fn build(&self, args: &ResolvedArgs) -> anyhow::Result<ServiceRef> {
        (self.build)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// 注册到容器中的实现形式
#[derive(Clone)]
pub enum Implementation {
    Constructor(Constructor),
    Factory(Factory),
    Instance(ServiceRef),
}

impl Implementation {
    pub fn kind(&self) -> &'static str {
        match self {
            Implementation::Constructor(_) => "constructor",
            Implementation::Factory(_) => "factory",
            Implementation::Instance(_) => "instance",
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Constructor(c) => f.debug_tuple("Constructor").field(c).finish(),
            Implementation::Factory(_) => f.write_str("Factory"),
            Implementation::Instance(_) => f.write_str("Instance"),
        }
    }
}

struct RegistryEntry {
    constructor: Constructor,
    interfaces: Vec<String>,
}

/// 实现注册表：定位符 -> 构造描述
///
/// 编译期登记所有可用实现，配置文件只能引用已登记的定位符。
#[derive(Default)]
pub struct ImplementationRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl ImplementationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记实现，`interfaces` 为它满足的能力键
    pub fn register<I, S>(
        &mut self,
        locator: impl Into<String>,
        interfaces: I,
        constructor: Constructor,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locator = locator.into();
        tracing::debug!("登记实现: {}", locator);
        self.entries.insert(
            locator,
            RegistryEntry {
                constructor,
                interfaces: interfaces.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.entries.contains_key(locator)
    }

    pub fn locators(&self) -> Vec<&str> {
        let mut locators: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        locators.sort_unstable();
        locators
    }

    /// 按定位符查找构造描述；指定了能力键时还要求实现声明了该能力
    pub fn lookup(
        &self,
        service: &str,
        locator: &str,
        interface: Option<&str>,
    ) -> Result<Constructor, LoadError> {
        let entry = self.entries.get(locator).ok_or_else(|| LoadError::UnknownLocator {
            name: service.to_string(),
            locator: locator.to_string(),
        })?;

        if let Some(interface) = interface {
            if !entry.interfaces.iter().any(|i| i == interface) {
                return Err(LoadError::InterfaceMismatch {
                    name: service.to_string(),
                    locator: locator.to_string(),
                    interface: interface.to_string(),
                });
            }
        }

        Ok(entry.constructor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;
    impl Service for Clock {}

    struct Reporter {
        clock: Option<Arc<Clock>>,
    }
    impl Service for Reporter {}

    #[test]
    fn test_constructor_lists_dependencies_in_order() {
        let ctor = Constructor::of(|args| {
            Ok(Reporter {
                clock: args.get_as::<Clock>("clock"),
            })
        })
        .param("clock", "clock_service")
        .param_default("fallback", || Arc::new(Clock))
        .param_or("sink", "sink_service", || Arc::new(Clock));

        let deps: Vec<&str> = ctor.dependency_names().collect();
        assert_eq!(deps, vec!["clock_service", "sink_service"]);
        assert_eq!(ctor.params().len(), 3);
    }

    #[test]
    fn test_resolved_args_typed_access() {
        let mut args = ResolvedArgs::new();
        args.insert("clock", Arc::new(Clock) as ServiceRef);

        assert!(args.get_as::<Clock>("clock").is_some());
        assert!(args.get_as::<Reporter>("clock").is_none());
        assert!(args.require::<Clock>("missing").is_err());

        let reporter = Constructor::of(|args| {
            Ok(Reporter {
                clock: Some(args.require::<Clock>("clock")?),
            })
        })
        .build(&args)
        .unwrap();
        let reporter = downcast_service::<Reporter>(reporter).unwrap();
        assert!(reporter.clock.is_some());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ImplementationRegistry::new();
        registry.register(
            "test.Clock",
            ["test.TimeSource"],
            Constructor::of(|_| Ok(Clock)),
        );

        assert!(registry.lookup("clock", "test.Clock", None).is_ok());
        assert!(registry
            .lookup("clock", "test.Clock", Some("test.TimeSource"))
            .is_ok());

        let err = registry.lookup("clock", "test.Missing", None).unwrap_err();
        assert!(matches!(err, LoadError::UnknownLocator { ref locator, .. } if locator == "test.Missing"));

        let err = registry
            .lookup("clock", "test.Clock", Some("test.Other"))
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::InterfaceMismatch { ref locator, ref interface, .. }
                if locator == "test.Clock" && interface == "test.Other"
        ));
        assert!(err.to_string().contains("does not provide interface 'test.Other'"));
        assert_eq!(registry.locators(), vec!["test.Clock"]);
    }
}
