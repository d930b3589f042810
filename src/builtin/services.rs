//! 内置服务

use crate::domain::interfaces::{
    Configurable, ConfigMap, Initializable, Lifecycle, LifecycleState, Service,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// 时钟服务
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl Service for SystemClock {}

#[derive(Debug, Clone)]
struct StoreSettings {
    namespace: String,
    capacity: Option<usize>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            capacity: None,
        }
    }
}

/// 内存键值存储
///
/// 配置项：`namespace`（字符串）、`capacity`（正整数，可选）。
#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: RwLock<HashMap<String, Value>>,
    settings: RwLock<StoreSettings>,
    initialized: AtomicBool,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self) -> String {
        self.settings.read().namespace.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// 写入键值；超出容量时拒绝新键
    pub fn set(&self, key: impl Into<String>, value: Value) -> anyhow::Result<()> {
        let key = key.into();
        let capacity = self.settings.read().capacity;
        let mut entries = self.entries.write();
        if let Some(capacity) = capacity {
            if !entries.contains_key(&key) && entries.len() >= capacity {
                anyhow::bail!("store is full ({} entries)", capacity);
            }
        }
        entries.insert(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Service for KeyValueStore {
    fn as_initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }
}

impl Initializable for KeyValueStore {
    fn initialize(&self) -> anyhow::Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!("键值存储 {} 已初始化", self.namespace());
        Ok(())
    }

    fn cleanup(&self) -> anyhow::Result<()> {
        self.entries.write().clear();
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "KeyValueStore"
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl Configurable for KeyValueStore {
    fn configure(&self, config: &ConfigMap) -> anyhow::Result<()> {
        let mut next = self.settings.read().clone();
        if let Some(namespace) = config.get("namespace") {
            next.namespace = namespace
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("namespace must be a string"))?
                .to_string();
        }
        if let Some(capacity) = config.get("capacity") {
            let capacity = capacity
                .as_u64()
                .filter(|c| *c > 0)
                .ok_or_else(|| anyhow::anyhow!("capacity must be a positive integer"))?;
            next.capacity = Some(capacity as usize);
        }
        *self.settings.write() = next;
        Ok(())
    }

    fn config(&self) -> ConfigMap {
        let settings = self.settings.read();
        let mut map = ConfigMap::new();
        map.insert("namespace".to_string(), Value::from(settings.namespace.clone()));
        if let Some(capacity) = settings.capacity {
            map.insert("capacity".to_string(), Value::from(capacity as u64));
        }
        map
    }
}

/// 心跳服务：运行时每次 `beat` 把时间写入存储
pub struct Heartbeat {
    store: Arc<KeyValueStore>,
    clock: Arc<SystemClock>,
    state: Mutex<LifecycleState>,
    beats: AtomicU64,
}

impl Heartbeat {
    pub fn new(store: Arc<KeyValueStore>, clock: Arc<SystemClock>) -> Self {
        Self {
            store,
            clock,
            state: Mutex::new(LifecycleState::Stopped),
            beats: AtomicU64::new(0),
        }
    }

    pub fn beat(&self) -> anyhow::Result<u64> {
        if !self.is_running() {
            anyhow::bail!("heartbeat is not running");
        }
        let count = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
        self.store
            .set("heartbeat.last", Value::from(self.clock.now().to_rfc3339()))?;
        Ok(count)
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

impl Service for Heartbeat {
    fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for Heartbeat {
    fn start(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        *state = LifecycleState::Starting;
        self.beats.store(0, Ordering::SeqCst);
        *state = LifecycleState::Running;
        tracing::debug!("心跳服务已启动");
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        *state = LifecycleState::Stopping;
        self.store.remove("heartbeat.last");
        *state = LifecycleState::Stopped;
        Ok(())
    }

    fn status(&self) -> LifecycleState {
        *self.state.lock()
    }
}
