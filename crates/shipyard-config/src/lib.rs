pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// リクエストファイルのパスを直接指定する環境変数
pub const REQUEST_PATH_ENV: &str = "SHIPYARD_REQUEST_PATH";

const CANDIDATES: [&str; 3] = ["shipyard.local.kdl", "shipyard.kdl", ".shipyard.kdl"];

/// Shipyardの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("shipyard");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのshipyard.kdlファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 SHIPYARD_REQUEST_PATH (直接パス指定)
/// 2. カレントディレクトリ: shipyard.local.kdl, shipyard.kdl, .shipyard.kdl
/// 3. ./.shipyard/ ディレクトリ内: 同様の順序
/// 4. ~/.config/shipyard/shipyard.kdl (グローバル設定)
pub fn find_request_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(REQUEST_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points at a missing file", REQUEST_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = first_existing(&current_dir) {
        return Ok(path);
    }

    let project_dir = current_dir.join(".shipyard");
    if project_dir.is_dir()
        && let Some(path) = first_existing(&project_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("shipyard").join("shipyard.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::RequestFileNotFound)
}

/// CLI で明示されたパスを優先し、なければ探索する
pub fn resolve_request_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(ConfigError::PathNotFound(path.to_path_buf())),
        None => find_request_file(),
    }
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// カレントディレクトリを一時的に移動して実行
    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_var_unset(REQUEST_PATH_ENV, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    #[serial]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("shipyard"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_request_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("shipyard.kdl"), "// test").unwrap();

        let found = in_dir(temp_dir.path(), find_request_file).unwrap();
        assert!(found.ends_with("shipyard.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("shipyard.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("shipyard.local.kdl"), "// local").unwrap();

        let found = in_dir(temp_dir.path(), find_request_file).unwrap();
        assert!(found.ends_with("shipyard.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_request_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".shipyard");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("shipyard.kdl"), "// in project dir").unwrap();

        let found = in_dir(temp_dir.path(), find_request_file).unwrap();
        assert!(found.ends_with(".shipyard/shipyard.kdl"));
    }

    #[test]
    #[serial]
    fn test_env_var_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "// custom").unwrap();

        let found = temp_env::with_var(REQUEST_PATH_ENV, Some(&config_path), find_request_file)
            .unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    #[serial]
    fn test_explicit_missing_path() {
        let result = resolve_request_file(Some(Path::new("/nonexistent/shipyard.kdl")));
        assert!(matches!(result, Err(ConfigError::PathNotFound(_))));
    }

    #[test]
    #[serial]
    fn test_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        // グローバル設定の影響を避ける
        let result = temp_env::with_var("XDG_CONFIG_HOME", Some(temp_dir.path()), || {
            in_dir(temp_dir.path(), find_request_file)
        });
        assert!(matches!(result, Err(ConfigError::RequestFileNotFound)));
    }
}
