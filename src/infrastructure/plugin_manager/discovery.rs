//! 插件发现：每个插件占一个子目录，目录中放 `metadata.json`

use super::metadata::PluginMetadata;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 插件描述文件名
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// 扫描得到的插件
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub metadata: PluginMetadata,
    /// 插件所在的根目录（`load_plugin` 的 directory 参数）
    pub directory: PathBuf,
    /// 插件自身的子目录
    pub path: PathBuf,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// 扫描单个插件根目录，按目录名排序
pub fn scan_directory(directory: &Path) -> Vec<DiscoveredPlugin> {
    let mut found = Vec::new();
    if !directory.is_dir() {
        tracing::warn!("插件目录不存在: {}", directory.display());
        return found;
    }

    let walker = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_dir() || is_hidden(path) {
            continue;
        }

        let metadata_file = path.join(METADATA_FILE_NAME);
        if !metadata_file.is_file() {
            tracing::debug!("跳过无描述文件的目录: {}", path.display());
            continue;
        }

        let source = metadata_file.to_string_lossy().to_string();
        let parsed = fs::read_to_string(&metadata_file)
            .map_err(|e| crate::errors::ConfigError::FileRead(source.clone(), e))
            .and_then(|content| PluginMetadata::from_json(&content, &source));

        match parsed {
            Ok(metadata) => {
                tracing::debug!("发现插件: {} v{}", metadata.name, metadata.version);
                found.push(DiscoveredPlugin {
                    metadata,
                    directory: directory.to_path_buf(),
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                tracing::error!("加载插件元数据失败 {}: {}", path.display(), e);
            }
        }
    }

    found
}

/// 依次扫描多个目录；同名插件保留第一个
pub fn scan_directories<'a>(directories: impl IntoIterator<Item = &'a PathBuf>) -> Vec<DiscoveredPlugin> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for directory in directories {
        for plugin in scan_directory(directory) {
            if !seen.insert(plugin.metadata.name.clone()) {
                tracing::warn!(
                    "插件 {} 重复出现，忽略 {}",
                    plugin.metadata.name,
                    plugin.path.display()
                );
                continue;
            }
            found.push(plugin);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir: &str, metadata: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(METADATA_FILE_NAME), metadata).unwrap();
    }

    #[test]
    fn test_scan_skips_hidden_broken_and_bare_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_plugin(root, "beta", r#"{"name": "beta", "version": "0.1.0"}"#);
        write_plugin(root, "alpha", r#"{"name": "alpha", "version": "1.0.0"}"#);
        write_plugin(root, ".cache", r#"{"name": "hidden", "version": "1.0.0"}"#);
        write_plugin(root, "broken", "{ not json");
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("README.md"), "notes").unwrap();

        let found = scan_directory(root);
        let names: Vec<&str> = found.iter().map(|p| p.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(found[0].directory, root);
        assert_eq!(found[0].path, root.join("alpha"));
    }

    #[test]
    fn test_duplicate_names_keep_first_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_plugin(first.path(), "echo", r#"{"name": "echo", "version": "1.0.0"}"#);
        write_plugin(second.path(), "echo", r#"{"name": "echo", "version": "2.0.0"}"#);

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let found = scan_directories(&dirs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.version, "1.0.0");
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_directory(&temp_dir.path().join("absent")).is_empty());
    }
}
