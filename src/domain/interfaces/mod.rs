//! 领域层接口定义
//!
//! 定义服务与插件的能力接口，实现依赖倒置：
//! 容器只通过这些 trait 调用生命周期钩子，不关心具体实现。

use serde::Serialize;

pub mod plugin;
pub mod service;

pub use plugin::{
    CommandInfo, ConfigurablePlugin, LifecyclePlugin, Plugin, ServiceLocator,
};
pub use service::{
    AsAny, Configurable, Initializable, Lifecycle, LifecycleState, Service, ServiceRef,
};

/// 服务与插件共用的配置映射
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// 健康检查结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HealthCheckResult {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

impl Default for HealthCheckResult {
    fn default() -> Self {
        Self::healthy()
    }
}

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 健康
    Healthy,
    /// 不健康
    Unhealthy,
    /// 降级
    Degraded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_serializes_lowercase_status() {
        let health = HealthCheckResult::degraded("slow disk");
        assert!(health.is_healthy());
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["message"], "slow disk");
        assert!(json.get("details").is_none());

        assert!(!HealthCheckResult::unhealthy("down").is_healthy());
    }
}
