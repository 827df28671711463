//! キャッシュバストマニフェスト
//!
//! 何を無効化したか、クライアント側で何をすべきかを記述するJSONを
//! ビルド出力ディレクトリに書き出します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 無効化対象とクライアント向け指示のマニフェスト
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBustManifest {
    pub build_id: String,

    pub created_at: DateTime<Utc>,

    pub environment: String,

    /// 無効化の対象（service-worker, browser-cache, cdn-cache, local-storage）
    pub invalidation_targets: Vec<String>,

    pub client_instructions: ClientInstructions,

    /// このビルドで書き換えたファイル
    pub files_updated: Vec<String>,
}

/// クライアント側で実施すべき無効化処理
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInstructions {
    pub clear_local_storage: bool,
    pub reload_service_worker: bool,
    pub force_reload: bool,
}

impl CacheBustManifest {
    pub fn new(build_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            created_at: Utc::now(),
            environment: environment.into(),
            invalidation_targets: vec![
                "service-worker".to_string(),
                "browser-cache".to_string(),
                "cdn-cache".to_string(),
                "local-storage".to_string(),
            ],
            client_instructions: ClientInstructions {
                clear_local_storage: true,
                reload_service_worker: true,
                force_reload: true,
            },
            files_updated: Vec::new(),
        }
    }
}
