//! Single-purpose probes: performance, security headers, cache-control
//!
//! Each assertion returns exactly one check.

use crate::check::{CheckType, VerificationCheck};
use shipflow_core::{CacheRule, PerformanceRule, SecurityRule};
use std::time::{Duration, Instant};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

fn probe_client() -> Option<reqwest::Client> {
    reqwest::Client::builder().timeout(PROBE_TIMEOUT).build().ok()
}

/// Fetch the page and compare wall-clock load time against the threshold
pub async fn run_performance_check(url: &str, rule: &PerformanceRule) -> VerificationCheck {
    let started = Instant::now();

    let Some(client) = probe_client() else {
        return VerificationCheck::failed(
            "performance: load time",
            CheckType::Performance,
            "failed to build HTTP client",
            0,
            "client construction failed",
        );
    };

    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            return VerificationCheck::failed(
                "performance: load time",
                CheckType::Performance,
                format!("request to {} failed", url),
                started.elapsed().as_millis() as u64,
                e.to_string(),
            );
        }
    };

    // Download the full body so the measurement covers transfer time
    let body = response.bytes().await;
    let load_time_ms = started.elapsed().as_millis() as u64;

    if let Err(e) = body {
        return VerificationCheck::failed(
            "performance: load time",
            CheckType::Performance,
            format!("body download from {} failed", url),
            load_time_ms,
            e.to_string(),
        );
    }

    let check = if load_time_ms <= rule.max_load_time_ms {
        VerificationCheck::passed(
            "performance: load time",
            CheckType::Performance,
            format!(
                "loaded in {}ms (threshold {}ms)",
                load_time_ms, rule.max_load_time_ms
            ),
            load_time_ms,
        )
    } else {
        VerificationCheck::failed(
            "performance: load time",
            CheckType::Performance,
            format!(
                "loaded in {}ms, over the {}ms threshold",
                load_time_ms, rule.max_load_time_ms
            ),
            load_time_ms,
            "load time threshold exceeded",
        )
    };

    check.with_metadata("loadTimeMs", serde_json::json!(load_time_ms))
}

/// Assert that every required security header is present on the response
pub async fn run_security_check(url: &str, rule: &SecurityRule) -> VerificationCheck {
    let started = Instant::now();

    let Some(client) = probe_client() else {
        return VerificationCheck::failed(
            "security: headers",
            CheckType::Security,
            "failed to build HTTP client",
            0,
            "client construction failed",
        );
    };

    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            return VerificationCheck::failed(
                "security: headers",
                CheckType::Security,
                format!("request to {} failed", url),
                started.elapsed().as_millis() as u64,
                e.to_string(),
            );
        }
    };

    let elapsed = started.elapsed().as_millis() as u64;
    let missing: Vec<String> = rule
        .required_headers
        .iter()
        .filter(|h| !response.headers().contains_key(h.to_lowercase().as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        VerificationCheck::passed(
            "security: headers",
            CheckType::Security,
            format!("all {} required headers present", rule.required_headers.len()),
            elapsed,
        )
    } else {
        VerificationCheck::failed(
            "security: headers",
            CheckType::Security,
            format!("missing required headers: {}", missing.join(", ")),
            elapsed,
            "required security headers missing",
        )
        .with_metadata("missing", serde_json::json!(missing))
    }
}

/// Assert the configured Cache-Control value per path, one check per path
pub async fn run_cache_checks(base_url: &str, rule: &CacheRule) -> Vec<VerificationCheck> {
    let Some(client) = probe_client() else {
        return vec![VerificationCheck::failed(
            "cache: client",
            CheckType::Cache,
            "failed to build HTTP client",
            0,
            "client construction failed",
        )];
    };

    let mut checks = Vec::new();
    for path_rule in &rule.paths {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path_rule.path.trim_start_matches('/')
        );
        let name = format!("cache: {}", path_rule.path);
        let started = Instant::now();

        match client.get(&url).send().await {
            Ok(response) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let cache_control = response
                    .headers()
                    .get(reqwest::header::CACHE_CONTROL)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                if cache_control.contains(&path_rule.expected) {
                    checks.push(
                        VerificationCheck::passed(
                            &name,
                            CheckType::Cache,
                            format!("Cache-Control '{}' contains '{}'", cache_control, path_rule.expected),
                            elapsed,
                        )
                        .with_metadata("cacheControl", serde_json::json!(cache_control)),
                    );
                } else {
                    checks.push(
                        VerificationCheck::failed(
                            &name,
                            CheckType::Cache,
                            format!(
                                "Cache-Control '{}' does not contain '{}'",
                                cache_control, path_rule.expected
                            ),
                            elapsed,
                            "unexpected cache-control value",
                        )
                        .with_metadata("cacheControl", serde_json::json!(cache_control)),
                    );
                }
            }
            Err(e) => {
                checks.push(VerificationCheck::failed(
                    &name,
                    CheckType::Cache,
                    format!("request to {} failed", url),
                    started.elapsed().as_millis() as u64,
                    e.to_string(),
                ));
            }
        }
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipflow_core::CachePathRule;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(headers: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\n{}content-length: {}\r\nconnection: close\r\n\r\n{}",
                    headers,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_performance_within_threshold() {
        let url = serve_once("", "fast").await;
        let check = run_performance_check(
            &url,
            &PerformanceRule {
                max_load_time_ms: 10_000,
            },
        )
        .await;

        assert!(check.success);
        assert!(check.metadata.contains_key("loadTimeMs"));
    }

    #[tokio::test]
    async fn test_performance_over_threshold() {
        let url = serve_once("", "slow").await;
        // A 0ms threshold cannot be met
        let check = run_performance_check(&url, &PerformanceRule { max_load_time_ms: 0 }).await;
        assert!(!check.success);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let url = serve_once(
            "strict-transport-security: max-age=63072000\r\nx-content-type-options: nosniff\r\n",
            "ok",
        )
        .await;

        let check = run_security_check(
            &url,
            &SecurityRule {
                required_headers: vec![
                    "Strict-Transport-Security".to_string(),
                    "X-Content-Type-Options".to_string(),
                ],
            },
        )
        .await;

        assert!(check.success);
    }

    #[tokio::test]
    async fn test_security_headers_missing() {
        let url = serve_once("", "ok").await;

        let check = run_security_check(
            &url,
            &SecurityRule {
                required_headers: vec!["Content-Security-Policy".to_string()],
            },
        )
        .await;

        assert!(!check.success);
        assert!(check.message.contains("Content-Security-Policy"));
    }

    #[tokio::test]
    async fn test_cache_control_match() {
        let url = serve_once("cache-control: no-cache, no-store\r\n", "<html>").await;

        let checks = run_cache_checks(
            &url,
            &CacheRule {
                paths: vec![CachePathRule {
                    path: "/index.html".to_string(),
                    expected: "no-cache".to_string(),
                }],
            },
        )
        .await;

        assert_eq!(checks.len(), 1);
        assert!(checks[0].success);
    }

    #[tokio::test]
    async fn test_cache_control_mismatch() {
        let url = serve_once("cache-control: public, max-age=60\r\n", "<html>").await;

        let checks = run_cache_checks(
            &url,
            &CacheRule {
                paths: vec![CachePathRule {
                    path: "/index.html".to_string(),
                    expected: "no-cache".to_string(),
                }],
            },
        )
        .await;

        assert_eq!(checks.len(), 1);
        assert!(!checks[0].success);
    }
}
