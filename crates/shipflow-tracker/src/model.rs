//! Persisted history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipflow_core::{Component, DeploymentResult, Environment};

/// One historical entry describing a single deploy attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Generated record id (unique within the store)
    pub id: String,

    pub component: Component,

    pub environment: Environment,

    /// Platform-side deployment id, if the deploy produced one
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// Reachable URL of the deployment
    #[serde(default)]
    pub url: Option<String>,

    /// When the attempt was recorded
    pub timestamp: DateTime<Utc>,

    pub duration_ms: u64,

    pub success: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl DeploymentRecord {
    /// Build a new record from a deployment result
    pub fn from_result(result: &DeploymentResult, metadata: RecordMetadata) -> Self {
        Self {
            id: format!("rec-{}", uuid::Uuid::new_v4().simple()),
            component: result.component,
            environment: result.environment,
            deployment_id: result.deployment_id.clone(),
            url: result.url.clone(),
            timestamp: Utc::now(),
            duration_ms: result.duration_ms,
            success: result.success,
            error: result.error.clone(),
            metadata,
        }
    }

    /// Whether this record matches the given filters
    pub fn matches(&self, component: Option<Component>, environment: Option<Environment>) -> bool {
        component.is_none_or(|c| self.component == c)
            && environment.is_none_or(|e| self.environment == e)
    }
}

/// Operator/build context attached to a record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default)]
    pub git_commit: Option<String>,

    #[serde(default)]
    pub git_branch: Option<String>,

    /// Who triggered the run (login name)
    #[serde(default)]
    pub operator: Option<String>,

    /// Version string injected into the build
    #[serde(default)]
    pub version: Option<String>,

    /// Id of the successful deployment this one superseded
    #[serde(default)]
    pub previous_deployment_id: Option<String>,

    /// Record id this deployment was rolled back to, if any
    #[serde(default)]
    pub rolled_back_to: Option<String>,

    #[serde(default)]
    pub rolled_back_at: Option<DateTime<Utc>>,
}

/// The whole persisted store, newest record first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentHistory {
    pub deployments: Vec<DeploymentRecord>,

    pub last_updated: DateTime<Utc>,
}

impl Default for DeploymentHistory {
    fn default() -> Self {
        Self {
            deployments: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

impl DeploymentHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Aggregate statistics over a recency window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful / total, 0.0 when there are no records
    pub success_rate: f64,
    pub average_duration_ms: u64,
}
