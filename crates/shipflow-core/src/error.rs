use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません\n探索したパス:\n{}\nヒント: ship.config.json をプロジェクトルートに配置するか、SHIPFLOW_CONFIG_PATH で指定してください",
        .searched.iter().map(|p| format!("  - {}", p.display())).collect::<Vec<_>>().join("\n")
    )]
    NotFound { searched: Vec<PathBuf> },

    #[error("設定ファイルが不正です: {path}\n理由: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("不明な環境です: '{0}' (有効: development, staging, production)")]
    UnknownEnvironment(String),

    #[error("不明なコンポーネントです: '{0}' (有効: desktop, mobile, backend, firebase-config, all)")]
    UnknownComponent(String),

    #[error("環境 '{0}' が設定ファイルに定義されていません")]
    EnvironmentNotConfigured(String),

    #[error("コンポーネント '{0}' の projects 設定がありません")]
    MissingProject(String),

    #[error("コンポーネント '{0}' の healthChecks 設定がありません")]
    MissingHealthCheck(String),

    #[error("不正なURLです: {field} = '{value}'\n理由: {message}")]
    InvalidUrl {
        field: String,
        value: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
