//! Deployment verification battery
//!
//! Runs health / UI / performance / security / cache checks against a
//! deployed URL. Checks are independent: they all execute (concurrently,
//! fan-out/fan-in) and are all reported, so one failing check never hides
//! the others. Checks are never retried - a failing check is definitive
//! evidence, not a flaky network blip.

pub mod check;
pub mod error;
pub mod health;
pub mod probes;
pub mod ui;

pub use check::{CheckType, VerificationCheck, VerificationResult};
pub use error::{Result, VerifyError};

use futures_util::future::join_all;
use shipflow_core::{Component, Environment, HealthCheckConfig, VerificationRules};
use std::time::Instant;

/// Everything a battery run needs, passed by value per invocation
pub struct BatteryParams<'a> {
    pub component: Component,
    pub environment: Environment,
    /// Public URL of the component in this environment, when it has one
    pub base_url: Option<String>,
    pub health: Option<&'a HealthCheckConfig>,
    pub rules: Option<&'a VerificationRules>,
}

/// Run the full battery and aggregate the results
///
/// Every requested check contributes to the result; the aggregate succeeds
/// only if all of them do.
pub async fn run_battery(params: BatteryParams<'_>) -> VerificationResult {
    let started = Instant::now();
    let mut tasks: Vec<futures_util::future::BoxFuture<'_, Vec<VerificationCheck>>> = Vec::new();

    if let Some(health) = params.health {
        let base = params.base_url.clone();
        tasks.push(Box::pin(async move {
            health::run_health_check(base.as_deref(), health).await
        }));
    }

    if let Some(rules) = params.rules {
        if let Some(base) = params.base_url.clone() {
            for ui_check in &rules.ui {
                let base = base.clone();
                tasks.push(Box::pin(
                    async move { ui::run_ui_check(&base, ui_check).await },
                ));
            }

            if let Some(perf) = &rules.performance {
                let base = base.clone();
                tasks.push(Box::pin(async move {
                    vec![probes::run_performance_check(&base, perf).await]
                }));
            }

            if let Some(security) = &rules.security {
                let base = base.clone();
                tasks.push(Box::pin(async move {
                    vec![probes::run_security_check(&base, security).await]
                }));
            }

            if let Some(cache) = &rules.cache {
                let base = base.clone();
                tasks.push(Box::pin(async move {
                    probes::run_cache_checks(&base, cache).await
                }));
            }
        }
    }

    // Fan-out, then wait for every check - no short-circuiting
    let checks: Vec<VerificationCheck> = join_all(tasks).await.into_iter().flatten().collect();

    VerificationResult::from_checks(
        params.component,
        params.environment,
        checks,
        started.elapsed().as_millis() as u64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve(status_line: &'static str, body: &'static str, requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for _ in 0..requests {
                if let Ok((mut socket, _)) = listener.accept().await {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            }
        });

        format!("http://{}", addr)
    }

    fn health_config(expected_status: u16) -> HealthCheckConfig {
        HealthCheckConfig {
            endpoint: "/healthz".to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            expected_status,
            body_contains: None,
            body_pattern: None,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_battery_with_passing_health() {
        let base = serve("200 OK", "ok", 1).await;
        let health = health_config(200);

        let result = run_battery(BatteryParams {
            component: Component::Backend,
            environment: Environment::Production,
            base_url: Some(base),
            health: Some(&health),
            rules: None,
        })
        .await;

        assert!(result.success);
        assert_eq!(result.checks.len(), 1);
        assert_eq!(result.checks[0].check_type, CheckType::Health);
    }

    #[tokio::test]
    async fn test_battery_reports_all_checks_on_partial_failure() {
        let base = serve("200 OK", "ok", 2).await;
        let health = health_config(200);
        // The cache rule fails (no cache-control header), the health check passes
        let rules: shipflow_core::VerificationRules = serde_json::from_value(serde_json::json!({
            "cache": { "paths": [{ "path": "/", "expected": "no-cache" }] }
        }))
        .unwrap();

        let result = run_battery(BatteryParams {
            component: Component::Desktop,
            environment: Environment::Production,
            base_url: Some(base),
            health: Some(&health),
            rules: Some(&rules),
        })
        .await;

        assert!(!result.success);
        // Both checks ran and are both present
        assert_eq!(result.checks.len(), 2);
        let failed = result.failed_checks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].check_type, CheckType::Cache);
    }

    #[tokio::test]
    async fn test_battery_without_any_configuration() {
        let result = run_battery(BatteryParams {
            component: Component::FirebaseConfig,
            environment: Environment::Staging,
            base_url: None,
            health: None,
            rules: None,
        })
        .await;

        assert!(result.success);
        assert!(result.checks.is_empty());
    }
}
