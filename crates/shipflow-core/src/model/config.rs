//! デプロイ設定モデル
//!
//! ship.config.json の型定義。読み込み後は読み取り専用として
//! Orchestratorから各コンポーネントへ参照渡しされます。

use crate::error::{ConfigError, Result};
use crate::model::{Component, Environment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// デプロイ設定全体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployConfig {
    /// コンポーネントごとのビルド設定（キー: desktop, mobile, backend, firebase-config）
    pub projects: HashMap<String, ProjectConfig>,

    /// 環境ごとのURL設定（キー: development, staging, production）
    pub environments: HashMap<String, EnvironmentConfig>,

    /// グローバルなデプロイ設定
    #[serde(default)]
    pub deployment: DeploymentSettings,

    /// コンポーネントごとのヘルスチェック定義
    #[serde(default)]
    pub health_checks: HashMap<String, HealthCheckConfig>,

    /// 検証ルール（省略時はヘルスチェックのみ）
    #[serde(default)]
    pub verification: Option<VerificationRules>,
}

impl DeployConfig {
    /// コンポーネントのプロジェクト設定を取得
    pub fn project(&self, component: Component) -> Result<&ProjectConfig> {
        self.projects
            .get(component.as_str())
            .ok_or_else(|| ConfigError::MissingProject(component.to_string()))
    }

    /// 環境設定を取得
    pub fn environment(&self, env: Environment) -> Result<&EnvironmentConfig> {
        self.environments
            .get(env.as_str())
            .ok_or_else(|| ConfigError::EnvironmentNotConfigured(env.to_string()))
    }

    /// コンポーネントのヘルスチェック定義を取得
    pub fn health_check(&self, component: Component) -> Result<&HealthCheckConfig> {
        self.health_checks
            .get(component.as_str())
            .ok_or_else(|| ConfigError::MissingHealthCheck(component.to_string()))
    }

    /// 設定全体の整合性を検証
    ///
    /// - 各環境のURLがパース可能であること
    /// - projects のキーが既知のコンポーネントであること
    pub fn validate(&self) -> Result<()> {
        if self.environments.is_empty() {
            return Err(ConfigError::Invalid {
                path: PathBuf::new(),
                message: "environments が空です".to_string(),
            });
        }

        for (name, _) in &self.environments {
            Environment::parse(name)?;
        }

        for (name, _) in &self.projects {
            Component::parse(name)?;
        }

        for (name, _) in &self.health_checks {
            Component::parse(name)?;
        }

        for (env_name, env) in &self.environments {
            for (field, value) in [
                ("desktopUrl", &env.desktop_url),
                ("mobileUrl", &env.mobile_url),
                ("backendUrl", &env.backend_url),
            ] {
                if let Some(value) = value {
                    url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
                        field: format!("environments.{}.{}", env_name, field),
                        value: value.clone(),
                        message: e.to_string(),
                    })?;
                }
            }
        }

        Ok(())
    }

    /// 環境内でのコンポーネントの公開URL
    pub fn component_url(&self, component: Component, env: Environment) -> Option<String> {
        let env_config = self.environments.get(env.as_str())?;
        match component {
            Component::Desktop => env_config.desktop_url.clone(),
            Component::Mobile => env_config.mobile_url.clone(),
            Component::Backend => env_config.backend_url.clone(),
            // ルール設定には公開URLがない
            Component::FirebaseConfig => None,
        }
    }
}

/// コンポーネントごとのビルド・デプロイ設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    /// プラットフォーム側のプロジェクトID
    pub project_id: String,

    /// ホスティングサイト名（省略時はプロジェクトIDを使用）
    #[serde(default)]
    pub site: Option<String>,

    /// 依存インストールコマンド（省略時は "npm ci"）
    #[serde(default)]
    pub install_command: Option<String>,

    /// ビルドコマンド（firebase-config のようにビルド不要なら省略）
    #[serde(default)]
    pub build_command: Option<String>,

    /// ビルド成果物の出力ディレクトリ
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// プロジェクトのソースディレクトリ（省略時はカレント）
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// ビルド前に存在を要求する環境ファイル（.env.production 等）
    #[serde(default)]
    pub env_file: Option<PathBuf>,

    /// ビルドへ注入する追加環境変数
    #[serde(default)]
    pub build_env: HashMap<String, String>,

    /// デプロイ対象のルールファイル（firebase-config用）
    #[serde(default)]
    pub rules_files: Vec<PathBuf>,
}

/// 環境ごとのURL・CDN設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub desktop_url: Option<String>,

    #[serde(default)]
    pub mobile_url: Option<String>,

    #[serde(default)]
    pub backend_url: Option<String>,

    /// CDNパージ対象のゾーンID
    #[serde(default)]
    pub cdn_zone_id: Option<String>,

    /// 本番用カスタムドメイン
    #[serde(default)]
    pub custom_domains: Vec<String>,
}

/// グローバルなデプロイ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentSettings {
    /// 外部コマンド・デプロイ呼び出しのタイムアウト（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// ビルド・デプロイのリトライ回数
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// リトライ間の固定待機時間（秒）
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// 実行サマリの通知先Webhook URL
    #[serde(default)]
    pub notify_webhook: Option<String>,

    /// --monitor 時のポーリング間隔（秒）
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    /// --monitor 時の監視継続時間（秒）
    #[serde(default = "default_monitor_duration_secs")]
    pub monitor_duration_secs: u64,
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_monitor_interval_secs() -> u64 {
    30
}

fn default_monitor_duration_secs() -> u64 {
    300
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
            notify_webhook: None,
            monitor_interval_secs: default_monitor_interval_secs(),
            monitor_duration_secs: default_monitor_duration_secs(),
        }
    }
}

/// ヘルスチェック定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HealthCheckConfig {
    /// チェック対象エンドポイント（絶対URL、または環境URLからの相対パス）
    pub endpoint: String,

    /// HTTPメソッド（省略時はGET）
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,

    /// 期待するステータスコード
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    /// レスポンスボディに含まれるべき文字列
    #[serde(default)]
    pub body_contains: Option<String>,

    /// レスポンスボディが一致すべき正規表現
    #[serde(default)]
    pub body_pattern: Option<String>,

    #[serde(default = "default_check_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_check_timeout_secs() -> u64 {
    30
}

/// 検証ルールセット
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerificationRules {
    /// UIチェック（ヘッドレスブラウザ）
    #[serde(default)]
    pub ui: Vec<UiCheckConfig>,

    #[serde(default)]
    pub performance: Option<PerformanceRule>,

    #[serde(default)]
    pub security: Option<SecurityRule>,

    #[serde(default)]
    pub cache: Option<CacheRule>,
}

/// UIチェック定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UiCheckConfig {
    pub name: String,

    /// チェック対象URL（省略時はコンポーネントの環境URL）
    #[serde(default)]
    pub url: Option<String>,

    /// 存在を要求するCSSセレクタ
    #[serde(default)]
    pub selector: Option<String>,

    /// ページ内に存在を要求するテキスト
    #[serde(default)]
    pub expected_text: Option<String>,

    /// 診断用スクリーンショットを撮るかどうか
    #[serde(default)]
    pub screenshot: bool,
}

/// パフォーマンスルール
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PerformanceRule {
    /// 許容する最大ロード時間（ミリ秒）
    pub max_load_time_ms: u64,
}

/// セキュリティヘッダルール
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityRule {
    /// レスポンスに必須のヘッダ名
    pub required_headers: Vec<String>,
}

/// キャッシュ制御ルール
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheRule {
    pub paths: Vec<CachePathRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CachePathRule {
    /// 環境URLからの相対パス
    pub path: String,

    /// Cache-Control ヘッダに含まれるべき値
    pub expected: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "projects": {
                "desktop": {
                    "projectId": "myapp-prod",
                    "buildCommand": "npm run build",
                    "outputDir": "dist"
                },
                "backend": {
                    "projectId": "myapp-prod",
                    "buildCommand": "npm run build:functions"
                }
            },
            "environments": {
                "production": {
                    "desktopUrl": "https://app.example.com",
                    "backendUrl": "https://api.example.com"
                },
                "staging": {
                    "desktopUrl": "https://stg.example.com"
                }
            },
            "healthChecks": {
                "backend": {
                    "endpoint": "/healthz",
                    "expectedStatus": 200
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_project_lookup() {
        let config = sample_config();
        let project = config.project(Component::Desktop).unwrap();
        assert_eq!(project.project_id, "myapp-prod");
        assert_eq!(project.output_dir, Some(PathBuf::from("dist")));

        // 未定義コンポーネントはエラー
        assert!(config.project(Component::Mobile).is_err());
    }

    #[test]
    fn test_environment_lookup() {
        let config = sample_config();
        let env = config.environment(Environment::Production).unwrap();
        assert_eq!(env.desktop_url.as_deref(), Some("https://app.example.com"));

        assert!(config.environment(Environment::Development).is_err());
    }

    #[test]
    fn test_health_check_lookup() {
        let config = sample_config();
        let hc = config.health_check(Component::Backend).unwrap();
        assert_eq!(hc.endpoint, "/healthz");
        assert_eq!(hc.expected_status, 200);
        assert_eq!(hc.method, "GET");

        assert!(config.health_check(Component::Desktop).is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = sample_config();
        config
            .environments
            .get_mut("production")
            .unwrap()
            .backend_url = Some("not a url".to_string());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::error::ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_deployment_settings_defaults() {
        let settings = DeploymentSettings::default();
        assert_eq!(settings.timeout_secs, 600);
        assert_eq!(settings.retry_count, 3);
        assert_eq!(settings.retry_delay_secs, 5);
    }

    #[test]
    fn test_component_url() {
        let config = sample_config();
        assert_eq!(
            config.component_url(Component::Desktop, Environment::Production),
            Some("https://app.example.com".to_string())
        );
        assert_eq!(
            config.component_url(Component::FirebaseConfig, Environment::Production),
            None
        );
    }
}
