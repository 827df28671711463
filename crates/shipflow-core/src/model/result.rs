//! デプロイ結果

use crate::model::{Component, Environment};
use serde::{Deserialize, Serialize};

/// 1コンポーネント×1環境のデプロイ試行の結果
///
/// Deployerが生成し、TrackerとOrchestratorのサマリが消費します。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,

    pub component: Component,

    pub environment: Environment,

    /// ホスティング側のデプロイID（取得できた場合）
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// 到達可能なURL
    #[serde(default)]
    pub url: Option<String>,

    /// 所要時間（ミリ秒）
    pub duration_ms: u64,

    /// 失敗時のエラーメッセージ
    #[serde(default)]
    pub error: Option<String>,
}

impl DeploymentResult {
    pub fn success(
        component: Component,
        environment: Environment,
        deployment_id: Option<String>,
        url: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            component,
            environment,
            deployment_id,
            url,
            duration_ms,
            error: None,
        }
    }

    pub fn failure(
        component: Component,
        environment: Environment,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            component,
            environment,
            deployment_id: None,
            url: None,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_roundtrip() {
        let result = DeploymentResult::success(
            Component::Backend,
            Environment::Production,
            Some("dep-123".to_string()),
            Some("https://api.example.com".to_string()),
            4200,
        );

        let json = serde_json::to_string(&result).unwrap();
        let parsed: DeploymentResult = serde_json::from_str(&json).unwrap();

        assert!(parsed.success);
        assert_eq!(parsed.component, Component::Backend);
        assert_eq!(parsed.deployment_id.as_deref(), Some("dep-123"));
        assert!(parsed.error.is_none());
    }
}
