//! 插件元数据与状态机

use crate::domain::interfaces::ConfigMap;
use crate::errors::{ConfigError, LifecycleError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_ENTRY_POINT: &str = "plugin.rs";
pub const DEFAULT_CLASS_NAME: &str = "Plugin";

/// 插件状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// 未加载
    #[default]
    Unloaded,
    /// 加载中
    Loading,
    /// 已加载
    Loaded,
    /// 初始化中
    Initializing,
    /// 活跃状态
    Active,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

impl PluginStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginStatus::Unloaded => "unloaded",
            PluginStatus::Loading => "loading",
            PluginStatus::Loaded => "loaded",
            PluginStatus::Initializing => "initializing",
            PluginStatus::Active => "active",
            PluginStatus::Stopping => "stopping",
            PluginStatus::Stopped => "stopped",
            PluginStatus::Error => "error",
        }
    }

    /// 状态机允许的迁移
    pub fn can_transition(self, to: PluginStatus) -> bool {
        use PluginStatus::*;
        matches!(
            (self, to),
            (Unloaded, Loading)
                | (Unloaded, Error)
                | (Loading, Loaded)
                | (Loading, Error)
                | (Loaded, Initializing)
                | (Loaded, Stopping)
                | (Initializing, Active)
                | (Initializing, Error)
                | (Active, Stopping)
                | (Active, Error)
                | (Stopping, Stopped)
                | (Stopping, Error)
                | (Stopped, Loading)
                | (Error, Loading)
                | (Error, Stopping)
        )
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 插件优先级，数值越小越先加载
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum PluginPriority {
    /// 关键插件
    Critical = 1,
    /// 高优先级
    High = 2,
    /// 普通优先级
    #[default]
    Normal = 3,
    /// 低优先级
    Low = 4,
}

impl TryFrom<u8> for PluginPriority {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PluginPriority::Critical),
            2 => Ok(PluginPriority::High),
            3 => Ok(PluginPriority::Normal),
            4 => Ok(PluginPriority::Low),
            other => Err(ConfigError::InvalidPriority(other)),
        }
    }
}

impl From<PluginPriority> for u8 {
    fn from(priority: PluginPriority) -> Self {
        priority as u8
    }
}

fn default_true() -> bool {
    true
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

fn default_class_name() -> String {
    DEFAULT_CLASS_NAME.to_string()
}

/// 插件元数据（`metadata.json`）
///
/// status / error_message / load_time / loaded_at 只由插件管理器修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub priority: PluginPriority,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default = "default_class_name")]
    pub class_name: String,
    #[serde(default)]
    pub status: PluginStatus,
    /// 加载耗时（秒）
    #[serde(default, with = "duration_secs")]
    pub load_time: Option<Duration>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// 最近一次成功加载的时间
    #[serde(default)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            dependencies: Vec::new(),
            enabled: true,
            config: ConfigMap::new(),
            priority: PluginPriority::default(),
            entry_point: default_entry_point(),
            class_name: default_class_name(),
            status: PluginStatus::default(),
            load_time: None,
            error_message: None,
            loaded_at: None,
        }
    }

    pub fn with_priority(mut self, priority: PluginPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// 解析 `metadata.json`，并校验名称与语义化版本
    pub fn from_json(content: &str, source: &str) -> Result<Self, ConfigError> {
        let metadata: PluginMetadata = serde_json::from_str(content)
            .map_err(|e| ConfigError::JsonParse(source.to_string(), e))?;
        if metadata.name.trim().is_empty() {
            return Err(ConfigError::FieldMissing("name".to_string()));
        }
        semver::Version::parse(&metadata.version).map_err(|e| ConfigError::InvalidVersion {
            plugin: metadata.name.clone(),
            version: metadata.version.clone(),
            source: e,
        })?;
        Ok(metadata)
    }

    /// 按状态机迁移状态
    pub fn transition(&mut self, to: PluginStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition(to) {
            return Err(LifecycleError::InvalidTransition {
                name: self.name.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!(plugin = %self.name, from = %self.status, to = %to, "插件状态变更");
        self.status = to;
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_defaults() {
        let metadata = PluginMetadata::from_json(
            r#"{"name": "echo", "version": "1.2.0", "priority": 2}"#,
            "echo/metadata.json",
        )
        .unwrap();

        assert_eq!(metadata.priority, PluginPriority::High);
        assert_eq!(metadata.entry_point, "plugin.rs");
        assert_eq!(metadata.class_name, "Plugin");
        assert_eq!(metadata.status, PluginStatus::Unloaded);
        assert!(metadata.enabled);
        assert!(metadata.load_time.is_none());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let err = PluginMetadata::from_json(r#"{"name": "x", "version": "one"}"#, "m.json").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersion { .. }));

        let err = PluginMetadata::from_json(r#"{"name": "x", "version": "1.0.0", "priority": 9}"#, "m.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::JsonParse(..)));

        let err = PluginMetadata::from_json(r#"{"name": " ", "version": "1.0.0"}"#, "m.json").unwrap_err();
        assert!(matches!(err, ConfigError::FieldMissing(_)));
    }

    #[test]
    fn test_serialization_uses_numeric_priority_and_seconds() {
        let mut metadata = PluginMetadata::new("echo", "1.0.0").with_priority(PluginPriority::Low);
        metadata.load_time = Some(Duration::from_millis(1500));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["priority"], 4);
        assert_eq!(json["status"], "unloaded");
        assert_eq!(json["load_time"], 1.5);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(PluginPriority::Critical < PluginPriority::High);
        assert!(PluginPriority::Normal < PluginPriority::Low);
        assert!(matches!(
            PluginPriority::try_from(0),
            Err(ConfigError::InvalidPriority(0))
        ));
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut metadata = PluginMetadata::new("echo", "1.0.0");
        for next in [
            PluginStatus::Loading,
            PluginStatus::Loaded,
            PluginStatus::Initializing,
            PluginStatus::Active,
            PluginStatus::Stopping,
            PluginStatus::Stopped,
            PluginStatus::Loading,
        ] {
            metadata.transition(next).unwrap();
        }
        assert_eq!(metadata.status, PluginStatus::Loading);
    }

    #[test]
    fn test_state_machine_rejects_shortcuts() {
        let mut metadata = PluginMetadata::new("echo", "1.0.0");
        let err = metadata.transition(PluginStatus::Active).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { ref from, ref to, .. }
            if from == "unloaded" && to == "active"));
        assert_eq!(metadata.status, PluginStatus::Unloaded);

        assert!(!PluginStatus::Stopped.can_transition(PluginStatus::Active));
        assert!(!PluginStatus::Active.can_transition(PluginStatus::Loading));
        assert!(PluginStatus::Error.can_transition(PluginStatus::Loading));
        assert!(PluginStatus::Loaded.can_transition(PluginStatus::Stopping));
    }
}
