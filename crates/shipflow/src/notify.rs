//! 実行サマリの通知
//!
//! Orchestratorが発行するRunSummaryイベントを通知シンクへ渡します。
//! パイプライン本体は特定の通知手段に依存せず、シンクの失敗は
//! 実行結果に影響しません（fire-and-forget）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shipflow_core::{Component, Environment};
use tracing::{debug, warn};

/// 1回の実行の要約（通知ペイロード）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub environment: Environment,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub component: Component,
    pub success: bool,
    pub deployment_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
    /// 失敗した検証チェック数
    pub failed_checks: usize,
}

/// 通知シンクの抽象
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, summary: &RunSummary) -> anyhow::Result<()>;
}

/// Webhookへサマリを POST するシンク
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(summary)
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Webhookが失敗しました: {}",
                response.status()
            ));
        }

        debug!(url = %self.url, "通知を送信しました");
        Ok(())
    }
}

/// 設定済みのシンクへサマリを送信（失敗は警告のみ）
pub async fn emit(summary: &RunSummary, webhook_url: Option<&str>) {
    let Some(url) = webhook_url else {
        debug!("通知先が未設定のためスキップ");
        return;
    };

    let sink = WebhookSink::new(url);
    if let Err(e) = sink.notify(summary).await {
        warn!("通知の送信に失敗しました（実行結果には影響しません）: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = RunSummary {
            environment: Environment::Production,
            success: false,
            started_at: Utc::now(),
            duration_ms: 1234,
            components: vec![ComponentSummary {
                component: Component::Backend,
                success: false,
                deployment_id: None,
                url: None,
                error: Some("build failed".to_string()),
                failed_checks: 0,
            }],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["environment"], "production");
        assert_eq!(json["durationMs"], 1234);
        assert_eq!(json["components"][0]["component"], "backend");
        assert_eq!(json["components"][0]["failedChecks"], 0);
    }
}
