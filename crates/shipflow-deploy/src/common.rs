//! Shared pre/post-deploy helpers
//!
//! Composable pieces used by every deployer variant: package-manifest
//! checks, lightweight deployment verification, the post-deploy cache pass
//! and edge warm-up.

use crate::error::{DeployError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use shipflow_cache::{CacheBustOptions, CacheBuster};
use shipflow_core::{Environment, EnvironmentConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Spinner shown around long build/upload steps
pub struct StepProgress {
    progress_bar: ProgressBar,
}

impl StepProgress {
    pub fn new(message: impl Into<String>) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.progress_bar.set_message(msg.into());
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.progress_bar.finish_with_message(message.into());
    }
}

/// Require a script in the package manifest before building
///
/// The required script name is derived from the configured build command
/// (`npm run build` requires `build`).
pub async fn require_package_script(source_dir: &Path, build_command: &str) -> Result<()> {
    let manifest = source_dir.join("package.json");
    if !manifest.exists() {
        return Err(DeployError::MissingScript {
            script: "build".to_string(),
            manifest,
        });
    }

    let Some(script) = script_name_from_command(build_command) else {
        // Not an npm script invocation, nothing to look up
        return Ok(());
    };

    let content = tokio::fs::read_to_string(&manifest).await?;
    let package: serde_json::Value = serde_json::from_str(&content)?;
    let has_script = package
        .get("scripts")
        .and_then(|s| s.get(&script))
        .is_some();

    if !has_script {
        return Err(DeployError::MissingScript { script, manifest });
    }

    Ok(())
}

fn script_name_from_command(build_command: &str) -> Option<String> {
    let mut parts = build_command.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("npm" | "pnpm" | "yarn"), Some("run"), Some(script)) => Some(script.to_string()),
        _ => None,
    }
}

/// Lightweight post-upload probe
///
/// Confirms the URL answers with a success status and, for client builds,
/// that the entry document looks like HTML and the web manifest and
/// service worker are reachable. This is not the verification battery -
/// battery failures are reported separately.
pub async fn verify_deployment(url: &str, is_client: bool, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await.map_err(|e| {
        DeployError::VerificationFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DeployError::VerificationFailed {
            url: url.to_string(),
            reason: format!("status {}", status),
        });
    }

    if is_client {
        let body = response.text().await.unwrap_or_default();
        let lower = body.to_lowercase();
        if !lower.contains("<html") && !lower.contains("<!doctype") {
            return Err(DeployError::VerificationFailed {
                url: url.to_string(),
                reason: "entry document does not look like HTML".to_string(),
            });
        }

        // Manifest and service worker must be reachable for a PWA client
        ensure_any_reachable(
            &client,
            url,
            &["manifest.webmanifest", "manifest.json"],
            "web manifest",
        )
        .await?;
        ensure_any_reachable(&client, url, &["sw.js", "service-worker.js"], "service worker")
            .await?;
    }

    debug!(url, "Deployment verified");
    Ok(())
}

async fn ensure_any_reachable(
    client: &reqwest::Client,
    base_url: &str,
    candidates: &[&str],
    what: &str,
) -> Result<()> {
    for candidate in candidates {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), candidate);
        if let Ok(response) = client.get(&url).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
    }

    Err(DeployError::VerificationFailed {
        url: base_url.to_string(),
        reason: format!("{} not reachable ({})", what, candidates.join(", ")),
    })
}

/// Post-deploy cache invalidation pass
///
/// Re-runs the cache buster in skip-file-rename mode so the CDN purge and
/// the version/manifest records reflect the deployed state. Non-fatal:
/// failures come back as messages.
pub async fn post_deploy_cache_pass(
    output_dir: &Path,
    environment: Environment,
    env_config: &EnvironmentConfig,
    skip_cache_bust: bool,
) -> Vec<String> {
    if skip_cache_bust {
        debug!("Cache pass skipped by options");
        return Vec::new();
    }

    let mut options = CacheBustOptions::new(environment);
    options.skip_file_rename = true;
    options.cdn_zone_id = env_config.cdn_zone_id.clone();
    options.domains = env_config.custom_domains.clone();

    match CacheBuster::new(output_dir, options).run().await {
        Ok(outcome) => outcome.errors,
        Err(e) => {
            warn!("Post-deploy cache pass failed: {}", e);
            vec![format!("cache-pass: {}", e)]
        }
    }
}

/// Prime edge caches with GET requests against the key URLs
///
/// Best-effort: failures are logged, never propagated.
pub async fn warm_up(urls: &[String], timeout: Duration) {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return;
    };

    for url in urls {
        match client.get(url).send().await {
            Ok(response) => {
                debug!(url, status = response.status().as_u16(), "Warmed up");
            }
            Err(e) => {
                warn!(url, "Warm-up request failed: {}", e);
            }
        }
    }
}

/// Probe the production custom domains, non-fatal
pub async fn check_custom_domains(domains: &[String], timeout: Duration) -> Vec<String> {
    let mut problems = Vec::new();
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return problems;
    };

    for domain in domains {
        let url = format!("https://{}/", domain);
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(domain, "Custom domain answers");
            }
            Ok(response) => {
                let msg = format!("{}: status {}", domain, response.status());
                warn!("Custom domain check: {}", msg);
                problems.push(msg);
            }
            Err(e) => {
                let msg = format!("{}: {}", domain, e);
                warn!("Custom domain check: {}", msg);
                problems.push(msg);
            }
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_script_name_from_command() {
        assert_eq!(
            script_name_from_command("npm run build"),
            Some("build".to_string())
        );
        assert_eq!(
            script_name_from_command("pnpm run build:prod"),
            Some("build:prod".to_string())
        );
        assert_eq!(script_name_from_command("make dist"), None);
    }

    #[tokio::test]
    async fn test_require_package_script_present() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("package.json"),
            r#"{ "scripts": { "build": "vite build" } }"#,
        )
        .unwrap();

        assert!(require_package_script(temp_dir.path(), "npm run build")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_require_package_script_missing() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("package.json"),
            r#"{ "scripts": { "test": "vitest" } }"#,
        )
        .unwrap();

        let err = require_package_script(temp_dir.path(), "npm run build")
            .await
            .unwrap_err();
        match err {
            DeployError::MissingScript { script, .. } => assert_eq!(script, "build"),
            other => panic!("expected MissingScript, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_require_package_script_no_manifest() {
        let temp_dir = tempdir().unwrap();
        let err = require_package_script(temp_dir.path(), "npm run build")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingScript { .. }));
    }

    #[tokio::test]
    async fn test_verify_deployment_unreachable() {
        let err = verify_deployment("http://127.0.0.1:9", false, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::VerificationFailed { .. }));
    }
}
