//! CDNキャッシュパージ
//!
//! Cloudflare APIへのBearerトークン認証でゾーンのキャッシュを削除します。

use crate::error::{CacheError, Result};
use serde::Deserialize;

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// CDNパージクライアント
pub struct CdnPurger {
    client: reqwest::Client,
    api_token: String,
    zone_id: String,
}

impl CdnPurger {
    /// 環境変数 CLOUDFLARE_API_TOKEN からクライアントを構築
    pub fn from_env(zone_id: impl Into<String>) -> Result<Self> {
        let api_token = std::env::var("CLOUDFLARE_API_TOKEN")
            .map_err(|_| CacheError::MissingEnvVar("CLOUDFLARE_API_TOKEN".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_token,
            zone_id: zone_id.into(),
        })
    }

    /// ゾーンのキャッシュをパージ
    ///
    /// `files` が空の場合はゾーン全体、指定がある場合はURL単位でパージします。
    pub async fn purge(&self, files: &[String]) -> Result<()> {
        let url = format!("{}/zones/{}/purge_cache", CLOUDFLARE_API_BASE, self.zone_id);

        let body = if files.is_empty() {
            serde_json::json!({ "purge_everything": true })
        } else {
            serde_json::json!({ "files": files })
        };

        tracing::debug!(zone = %self.zone_id, files = files.len(), "CDNパージを実行");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        let api_response: ApiResponse = response.json().await?;

        if !api_response.success {
            let error_msg = api_response
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(CacheError::PurgeFailed(error_msg));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiErrorInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorInfo {
    message: String,
}
