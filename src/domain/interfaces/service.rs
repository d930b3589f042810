//! 服务能力接口
//!
//! 服务以 `Arc<dyn Service>` 的形式在容器与使用方之间共享，
//! 可选能力通过 `as_*` 访问器暴露，未实现的能力返回 `None`。

use super::ConfigMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 容器中共享的服务句柄
pub type ServiceRef = Arc<dyn Service>;

/// 类型擦除辅助，支持从 `dyn Service` 向具体类型向下转换
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 所有可注册服务的基础 trait
///
/// 共享实例只拿得到 `&self`，需要修改状态的服务自行使用内部可变性。
pub trait Service: AsAny {
    fn as_initializable(&self) -> Option<&dyn Initializable> {
        None
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        None
    }

    fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

impl fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("initializable", &self.as_initializable().is_some())
            .field("configurable", &self.as_configurable().is_some())
            .field("lifecycle", &self.as_lifecycle().is_some())
            .finish()
    }
}

/// 需要初始化与清理的服务
pub trait Initializable: Send + Sync {
    fn initialize(&self) -> anyhow::Result<()>;

    fn cleanup(&self) -> anyhow::Result<()>;

    fn name(&self) -> &str;

    fn is_initialized(&self) -> bool;
}

/// 可配置服务
pub trait Configurable: Send + Sync {
    fn configure(&self, config: &ConfigMap) -> anyhow::Result<()>;

    fn config(&self) -> ConfigMap;
}

/// 有启动/停止语义的服务
pub trait Lifecycle: Send + Sync {
    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self) -> anyhow::Result<()>;

    fn restart(&self) -> anyhow::Result<()> {
        self.stop()?;
        self.start()
    }

    fn status(&self) -> LifecycleState;

    fn is_running(&self) -> bool {
        self.status() == LifecycleState::Running
    }
}

/// 生命周期服务的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 将服务句柄向下转换为具体类型
pub fn downcast_service<T: Service>(service: ServiceRef) -> Option<Arc<T>> {
    service.into_any_arc().downcast::<T>().ok()
}

/// 借用形式的向下转换
pub fn downcast_ref<T: Service>(service: &dyn Service) -> Option<&T> {
    service.as_any().downcast_ref::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Plain;
    impl Service for Plain {}

    struct Toggle {
        state: Mutex<LifecycleState>,
    }

    impl Service for Toggle {
        fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
            Some(self)
        }
    }

    impl Lifecycle for Toggle {
        fn start(&self) -> anyhow::Result<()> {
            *self.state.lock() = LifecycleState::Running;
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            *self.state.lock() = LifecycleState::Stopped;
            Ok(())
        }

        fn status(&self) -> LifecycleState {
            *self.state.lock()
        }
    }

    #[test]
    fn test_downcast_through_service_ref() {
        let service: ServiceRef = Arc::new(Plain);
        assert!(downcast_ref::<Plain>(service.as_ref()).is_some());
        assert!(downcast_ref::<Toggle>(service.as_ref()).is_none());

        let plain = downcast_service::<Plain>(service.clone());
        assert!(plain.is_some());
        assert!(downcast_service::<Toggle>(service).is_none());
    }

    #[test]
    fn test_default_accessors_are_none() {
        let service: ServiceRef = Arc::new(Plain);
        assert!(service.as_initializable().is_none());
        assert!(service.as_configurable().is_none());
        assert!(service.as_lifecycle().is_none());
    }

    #[test]
    fn test_default_restart_stops_then_starts() {
        let toggle = Toggle {
            state: Mutex::new(LifecycleState::Stopped),
        };
        let lifecycle: &dyn Lifecycle = &toggle;
        lifecycle.restart().unwrap();
        assert!(lifecycle.is_running());
        assert_eq!(lifecycle.status().to_string(), "running");
    }
}
