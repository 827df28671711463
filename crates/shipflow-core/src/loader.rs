//! 設定ファイルの探索と読み込み
//!
//! 以下の優先順位で ship.config.json を検索します:
//! 1. 環境変数 SHIPFLOW_CONFIG_PATH (直接パス指定)
//! 2. カレントディレクトリ: ship.config.json, .ship.config.json
//! 3. ./.shipflow/ および ./config/ ディレクトリ内
//! 4. ~/.config/shipflow/ship.config.json (グローバル設定)

use crate::error::{ConfigError, Result};
use crate::model::DeployConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_CANDIDATES: [&str; 2] = ["ship.config.json", ".ship.config.json"];

/// 設定ファイルのパスを探索
///
/// 見つからない場合は探索した全パスを `ConfigError::NotFound` に載せて返します。
pub fn find_config_file() -> Result<PathBuf> {
    let mut searched: Vec<PathBuf> = Vec::new();

    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("SHIPFLOW_CONFIG_PATH") {
        let path = PathBuf::from(&config_path);
        debug!(path = %path.display(), "SHIPFLOW_CONFIG_PATH を確認");
        if path.exists() {
            return Ok(path);
        }
        searched.push(path);
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CONFIG_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            debug!(path = %path.display(), "設定ファイルを発見");
            return Ok(path);
        }
        searched.push(path);
    }

    // 3. ./.shipflow/ と ./config/ ディレクトリで検索
    for dir in [".shipflow", "config"] {
        let sub_dir = current_dir.join(dir);
        for filename in &CONFIG_CANDIDATES {
            let path = sub_dir.join(filename);
            if path.exists() {
                debug!(path = %path.display(), "設定ファイルを発見");
                return Ok(path);
            }
            searched.push(path);
        }
    }

    // 4. グローバル設定 (~/.config/shipflow/ship.config.json)
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("shipflow").join("ship.config.json");
        if global_config.exists() {
            debug!(path = %global_config.display(), "グローバル設定を使用");
            return Ok(global_config);
        }
        searched.push(global_config);
    }

    Err(ConfigError::NotFound { searched })
}

/// 設定ファイルを読み込み、検証して返す
///
/// `path` 指定があればそのファイルを、なければ探索結果を使用します。
/// 読み込みは実行ごとに1回だけ行い、以後は参照渡しで使い回します。
pub fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    searched: vec![p.to_path_buf()],
                });
            }
            p.to_path_buf()
        }
        None => find_config_file()?,
    };

    let content = std::fs::read_to_string(&path)?;

    let config: DeployConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.clone(),
            message: e.to_string(),
        })?;

    config.validate().map_err(|e| match e {
        // NotFound等はそのまま、検証エラーはファイルパスを付けて返す
        ConfigError::InvalidUrl { .. }
        | ConfigError::UnknownEnvironment(_)
        | ConfigError::UnknownComponent(_) => e,
        ConfigError::Invalid { message, .. } => ConfigError::Invalid {
            path: path.clone(),
            message,
        },
        other => other,
    })?;

    debug!(
        path = %path.display(),
        projects = config.projects.len(),
        environments = config.environments.len(),
        "設定を読み込みました"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const VALID_CONFIG: &str = r#"{
        "projects": {
            "desktop": { "projectId": "myapp", "buildCommand": "npm run build", "outputDir": "dist" }
        },
        "environments": {
            "production": { "desktopUrl": "https://app.example.com" }
        },
        "healthChecks": {
            "desktop": { "endpoint": "/" }
        }
    }"#;

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("ship.config.json"), VALID_CONFIG).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("ship.config.json"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_in_shipflow_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let sub_dir = temp_dir.path().join(".shipflow");
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("ship.config.json"), VALID_CONFIG).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with(".shipflow/ship.config.json"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.json");
        fs::write(&config_path, VALID_CONFIG).unwrap();

        // SAFETY: テスト環境での環境変数設定
        unsafe {
            std::env::set_var("SHIPFLOW_CONFIG_PATH", config_path.to_str().unwrap());
        }

        let result = find_config_file().unwrap();
        assert_eq!(result, config_path);

        // クリーンアップ
        unsafe {
            std::env::remove_var("SHIPFLOW_CONFIG_PATH");
        }
    }

    #[test]
    #[serial]
    fn test_find_config_not_found_lists_searched_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        match find_config_file() {
            Err(ConfigError::NotFound { searched }) => {
                assert!(!searched.is_empty());
            }
            other => panic!("NotFoundを期待しましたが: {:?}", other.map(|p| p.display().to_string())),
        }

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_load_config_valid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ship.config.json");
        fs::write(&path, VALID_CONFIG).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert!(config.environments.contains_key("production"));
    }

    #[test]
    fn test_load_config_broken_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ship.config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_config_unknown_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ship.config.json");
        // deny_unknown_fields により未知キーはスキーマエラー
        fs::write(
            &path,
            r#"{ "projects": {}, "environments": { "production": {} }, "unknownKey": 1 }"#,
        )
        .unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_config_bad_environment_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ship.config.json");
        fs::write(
            &path,
            r#"{ "projects": {}, "environments": { "qa": {} } }"#,
        )
        .unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnvironment(_)));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/ship.config.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
