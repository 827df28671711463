//! Verification check and result types

use serde::{Deserialize, Serialize};
use shipflow_core::{Component, Environment};
use std::collections::HashMap;

/// Category of a verification check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Health,
    Ui,
    Performance,
    Security,
    Cache,
    Integration,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckType::Health => "health",
            CheckType::Ui => "ui",
            CheckType::Performance => "performance",
            CheckType::Security => "security",
            CheckType::Cache => "cache",
            CheckType::Integration => "integration",
        };
        write!(f, "{}", s)
    }
}

/// One atomic pass/fail assertion against a live deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCheck {
    pub name: String,

    pub check_type: CheckType,

    pub success: bool,

    /// Human-readable outcome
    pub message: String,

    pub duration_ms: u64,

    /// Diagnostic payload (response status, load time, screenshot, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl VerificationCheck {
    pub fn passed(
        name: impl Into<String>,
        check_type: CheckType,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            check_type,
            success: true,
            message: message.into(),
            duration_ms,
            metadata: HashMap::new(),
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        check_type: CheckType,
        message: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            check_type,
            success: false,
            message: message.into(),
            duration_ms,
            metadata: HashMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Aggregated battery outcome for one component/environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub component: Component,

    pub environment: Environment,

    /// Every requested check, regardless of individual outcome
    pub checks: Vec<VerificationCheck>,

    /// AND of all contained checks
    pub success: bool,

    pub duration_ms: u64,
}

impl VerificationResult {
    pub fn from_checks(
        component: Component,
        environment: Environment,
        checks: Vec<VerificationCheck>,
        duration_ms: u64,
    ) -> Self {
        let success = checks.iter().all(|c| c.success);
        Self {
            component,
            environment,
            checks,
            success,
            duration_ms,
        }
    }

    pub fn failed_checks(&self) -> Vec<&VerificationCheck> {
        self.checks.iter().filter(|c| !c.success).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_and_of_all_checks() {
        let all_pass = VerificationResult::from_checks(
            Component::Desktop,
            Environment::Production,
            vec![
                VerificationCheck::passed("a", CheckType::Health, "ok", 1),
                VerificationCheck::passed("b", CheckType::Ui, "ok", 1),
            ],
            2,
        );
        assert!(all_pass.success);

        let one_fail = VerificationResult::from_checks(
            Component::Desktop,
            Environment::Production,
            vec![
                VerificationCheck::passed("a", CheckType::Health, "ok", 1),
                VerificationCheck::failed("b", CheckType::Ui, "selector absent", 1, "not found"),
            ],
            2,
        );
        assert!(!one_fail.success);
        // Every check is still present - no short-circuit
        assert_eq!(one_fail.checks.len(), 2);
        assert_eq!(one_fail.failed_checks().len(), 1);
        assert_eq!(one_fail.failed_checks()[0].name, "b");
    }

    #[test]
    fn test_empty_battery_succeeds() {
        let empty = VerificationResult::from_checks(
            Component::Backend,
            Environment::Staging,
            vec![],
            0,
        );
        assert!(empty.success);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let check = VerificationCheck::passed("load", CheckType::Performance, "ok", 120)
            .with_metadata("loadTimeMs", serde_json::json!(120));

        let json = serde_json::to_string(&check).unwrap();
        let parsed: VerificationCheck = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.metadata["loadTimeMs"], serde_json::json!(120));
        assert_eq!(parsed.check_type, CheckType::Performance);
    }
}
