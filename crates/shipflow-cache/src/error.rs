use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("ビルド出力ディレクトリにアクセスできません: {0}")]
    OutputDirInaccessible(PathBuf),

    #[error("ファイル読み書きエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDN APIエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("環境変数 {0} が設定されていません")]
    MissingEnvVar(String),

    #[error("CDNパージに失敗しました: {0}")]
    PurgeFailed(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
