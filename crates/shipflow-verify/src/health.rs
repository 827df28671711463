//! HTTP health checks
//!
//! Issues a configured request against the deployed endpoint and asserts
//! the response status, optional body expectations and, for HTTPS targets,
//! TLS certificate validity. Each assertion is reported as its own check so
//! partial failure stays diagnosable.

use crate::check::{CheckType, VerificationCheck};
use shipflow_core::HealthCheckConfig;
use std::time::{Duration, Instant};
use tracing::debug;

/// Resolve the endpoint against the component base URL
///
/// Absolute endpoints are used as-is; relative ones are joined onto the
/// base URL.
pub fn resolve_url(base_url: Option<&str>, endpoint: &str) -> Option<String> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Some(endpoint.to_string());
    }
    let base = base_url?;
    Some(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Run the configured health check
pub async fn run_health_check(
    base_url: Option<&str>,
    config: &HealthCheckConfig,
) -> Vec<VerificationCheck> {
    let started = Instant::now();

    let Some(url) = resolve_url(base_url, &config.endpoint) else {
        return vec![VerificationCheck::failed(
            "health: endpoint",
            CheckType::Health,
            "no base URL configured for this component/environment",
            0,
            format!("cannot resolve relative endpoint '{}'", config.endpoint),
        )];
    };

    debug!(url, method = %config.method, "Running health check");

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return vec![VerificationCheck::failed(
                "health: client",
                CheckType::Health,
                "failed to build HTTP client",
                started.elapsed().as_millis() as u64,
                e.to_string(),
            )];
        }
    };

    let method = reqwest::Method::from_bytes(config.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut request = client.request(method, &url);
    for (key, value) in &config.headers {
        request = request.header(key, value);
    }
    if let Some(body) = &config.body {
        request = request.body(body.clone());
    }

    let is_https = url.starts_with("https://");
    let response = request.send().await;
    let elapsed = started.elapsed().as_millis() as u64;

    let mut checks = Vec::new();

    match response {
        Ok(response) => {
            let status = response.status().as_u16();

            // Status assertion
            if status == config.expected_status {
                checks.push(
                    VerificationCheck::passed(
                        "health: status",
                        CheckType::Health,
                        format!("{} returned {}", url, status),
                        elapsed,
                    )
                    .with_metadata("status", serde_json::json!(status)),
                );
            } else {
                checks.push(
                    VerificationCheck::failed(
                        "health: status",
                        CheckType::Health,
                        format!(
                            "{} returned {} (expected {})",
                            url, status, config.expected_status
                        ),
                        elapsed,
                        format!("unexpected status {}", status),
                    )
                    .with_metadata("status", serde_json::json!(status)),
                );
            }

            // TLS certificate: a completed rustls handshake implies the
            // chain verified and the certificate is within its validity window
            if is_https {
                checks.push(VerificationCheck::passed(
                    "health: certificate",
                    CheckType::Health,
                    "TLS certificate verified by the trust store",
                    elapsed,
                ));
            }

            // Body assertions
            if config.body_contains.is_some() || config.body_pattern.is_some() {
                let body_started = Instant::now();
                match response.text().await {
                    Ok(body) => {
                        if let Some(needle) = &config.body_contains {
                            checks.push(body_contains_check(
                                &body,
                                needle,
                                body_started.elapsed().as_millis() as u64,
                            ));
                        }
                        if let Some(pattern) = &config.body_pattern {
                            checks.push(body_pattern_check(
                                &body,
                                pattern,
                                body_started.elapsed().as_millis() as u64,
                            ));
                        }
                    }
                    Err(e) => {
                        checks.push(VerificationCheck::failed(
                            "health: body",
                            CheckType::Health,
                            "failed to read response body",
                            body_started.elapsed().as_millis() as u64,
                            e.to_string(),
                        ));
                    }
                }
            }
        }
        Err(e) => {
            checks.push(VerificationCheck::failed(
                "health: status",
                CheckType::Health,
                format!("request to {} failed", url),
                elapsed,
                e.to_string(),
            ));

            if is_https {
                // Connection-level failure; certificate may be the cause
                checks.push(VerificationCheck::failed(
                    "health: certificate",
                    CheckType::Health,
                    "TLS handshake did not complete",
                    elapsed,
                    e.to_string(),
                ));
            }
        }
    }

    checks
}

fn body_contains_check(body: &str, needle: &str, duration_ms: u64) -> VerificationCheck {
    if body.contains(needle) {
        VerificationCheck::passed(
            "health: body contains",
            CheckType::Health,
            format!("response body contains '{}'", needle),
            duration_ms,
        )
    } else {
        VerificationCheck::failed(
            "health: body contains",
            CheckType::Health,
            format!("response body does not contain '{}'", needle),
            duration_ms,
            "expected substring missing",
        )
    }
}

fn body_pattern_check(body: &str, pattern: &str, duration_ms: u64) -> VerificationCheck {
    match regex::Regex::new(pattern) {
        Ok(re) if re.is_match(body) => VerificationCheck::passed(
            "health: body pattern",
            CheckType::Health,
            format!("response body matches /{}/", pattern),
            duration_ms,
        ),
        Ok(_) => VerificationCheck::failed(
            "health: body pattern",
            CheckType::Health,
            format!("response body does not match /{}/", pattern),
            duration_ms,
            "pattern did not match",
        ),
        Err(e) => VerificationCheck::failed(
            "health: body pattern",
            CheckType::Health,
            format!("invalid pattern /{}/", pattern),
            duration_ms,
            e.to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal one-shot HTTP server for exercising checks without the network
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
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
        });

        format!("http://{}", addr)
    }

    fn config(endpoint: &str, expected_status: u16) -> HealthCheckConfig {
        HealthCheckConfig {
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            expected_status,
            body_contains: None,
            body_pattern: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(Some("https://api.example.com"), "/healthz"),
            Some("https://api.example.com/healthz".to_string())
        );
        assert_eq!(
            resolve_url(Some("https://api.example.com/"), "healthz"),
            Some("https://api.example.com/healthz".to_string())
        );
        assert_eq!(
            resolve_url(None, "https://status.example.com/up"),
            Some("https://status.example.com/up".to_string())
        );
        assert_eq!(resolve_url(None, "/healthz"), None);
    }

    #[tokio::test]
    async fn test_status_match() {
        let base = serve_once("200 OK", "ok").await;
        let checks = run_health_check(Some(&base), &config("/healthz", 200)).await;

        assert_eq!(checks.len(), 1);
        assert!(checks[0].success);
        assert_eq!(checks[0].metadata["status"], serde_json::json!(200));
    }

    #[tokio::test]
    async fn test_status_mismatch() {
        let base = serve_once("503 Service Unavailable", "down").await;
        let checks = run_health_check(Some(&base), &config("/healthz", 200)).await;

        assert_eq!(checks.len(), 1);
        assert!(!checks[0].success);
        assert!(checks[0].message.contains("expected 200"));
    }

    #[tokio::test]
    async fn test_body_contains() {
        let base = serve_once("200 OK", r#"{"status":"healthy"}"#).await;
        let mut cfg = config("/healthz", 200);
        cfg.body_contains = Some("healthy".to_string());

        let checks = run_health_check(Some(&base), &cfg).await;
        assert_eq!(checks.len(), 2);
        assert!(checks.iter().all(|c| c.success));
    }

    #[tokio::test]
    async fn test_body_contains_failure_keeps_status_check() {
        let base = serve_once("200 OK", "degraded").await;
        let mut cfg = config("/healthz", 200);
        cfg.body_contains = Some("healthy".to_string());

        let checks = run_health_check(Some(&base), &cfg).await;
        assert_eq!(checks.len(), 2);
        // Status passed, body assertion failed - both reported
        assert!(checks[0].success);
        assert!(!checks[1].success);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Port 9 on localhost is the discard port - nothing listens there
        let checks = run_health_check(Some("http://127.0.0.1:9"), &config("/healthz", 200)).await;
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].success);
        assert!(checks[0].error.is_some());
    }

    #[tokio::test]
    async fn test_relative_endpoint_without_base_url() {
        let checks = run_health_check(None, &config("/healthz", 200)).await;
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].success);
    }
}
