//! 运行时端到端测试：配置文件 + 内置服务 + 内置插件

#![cfg(feature = "builtin")]

use serde_json::json;
use servicehost::builtin::{builtin_catalog, register_builtins, Heartbeat, KeyValueStore};
use servicehost::config::ConfigLoader;
use servicehost::domain::interfaces::{Lifecycle, LifecycleState};
use servicehost::infrastructure::{ImplementationRegistry, PluginStatus};
use servicehost::Runtime;
use std::fs;
use tempfile::TempDir;

fn setup(services: &str) -> (TempDir, Runtime) {
    let temp_dir = TempDir::new().unwrap();
    let plugins = temp_dir.path().join("plugins");
    for (name, metadata) in [
        (
            "inspector",
            json!({"name": "inspector", "version": "1.0.0", "priority": 3,
                   "dependencies": ["store"], "config": {"label": "e2e"}}),
        ),
        ("pulse", json!({"name": "pulse", "version": "0.2.0", "priority": 1})),
    ] {
        let dir = plugins.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), metadata.to_string()).unwrap();
        fs::write(dir.join("plugin.rs"), "// builtin").unwrap();
    }

    let content = format!(
        "{}\n[plugins]\ndirectories = [\"{}\"]\n",
        services,
        plugins.to_string_lossy().replace('\\', "/")
    );
    let path = temp_dir.path().join("services.toml");
    fs::write(&path, content).unwrap();

    let mut registry = ImplementationRegistry::new();
    register_builtins(&mut registry);
    let runtime = Runtime::from_loader(
        &ConfigLoader::with_path(path.to_string_lossy()).with_environment(Some("test".into())),
        registry,
        builtin_catalog(),
    )
    .unwrap();
    (temp_dir, runtime)
}

const SERVICES: &str = r#"
[global.container]
lazy_loading = false

[services.store]
class = "builtin.KeyValueStore"
interface = "builtin.Store"
config = { namespace = "main", capacity = 16 }

[services.heartbeat]
class = "builtin.Heartbeat"
dependencies = ["store"]

[environments.test.services.store]
config = { namespace = "test" }
"#;

#[test]
fn test_services_and_plugins_come_up_together() {
    let (_dir, mut runtime) = setup(SERVICES);

    assert_eq!(runtime.report().registered, vec!["store", "heartbeat"]);
    let heartbeat = runtime
        .container_mut()
        .resolve_as::<Heartbeat>("heartbeat")
        .unwrap();
    assert_eq!(heartbeat.status(), LifecycleState::Running);

    let store = runtime
        .container_mut()
        .resolve_as::<KeyValueStore>("store")
        .unwrap();
    assert_eq!(store.namespace(), "test");

    let results = runtime.plugins_mut().load_all_plugins();
    assert_eq!(results.get("pulse"), Some(&true));
    assert_eq!(results.get("inspector"), Some(&true));
    assert_eq!(runtime.plugins().load_order(), ["pulse", "inspector"]);
    assert_eq!(store.get("inspector.label"), Some(json!("e2e")));

    let listing = runtime.plugins().list_plugins();
    assert!(listing["inspector"].health.as_ref().unwrap().is_healthy());
    assert_eq!(
        runtime.plugins().get_plugins_by_status(PluginStatus::Active),
        vec!["inspector", "pulse"]
    );

    runtime.shutdown().unwrap();
    assert!(runtime.plugins().load_order().is_empty());
    assert!(!runtime.container().is_instantiated("heartbeat"));
    assert_eq!(heartbeat.status(), LifecycleState::Stopped);
}

#[test]
fn test_plugin_fails_when_service_dependency_is_absent() {
    let (_dir, mut runtime) = setup("[global.container]\nauto_wire = false\n");

    let results = runtime.plugins_mut().load_all_plugins();
    assert_eq!(results.get("pulse"), Some(&true));
    assert_eq!(results.get("inspector"), Some(&false));

    runtime.reset().unwrap();
    assert!(runtime.plugins().list_plugins().is_empty());
}
