//! Hosting platform CLI wrapper
//!
//! Wraps the Firebase CLI for hosting and rules deployments. The CLI is
//! treated as an opaque boundary: commands go through the process executor
//! and JSON output is parsed leniently.

use crate::error::{DeployError, Result};
use serde::Deserialize;
use shipflow_exec::{command_exists, execute, ExecOptions};
use std::time::Duration;
use tracing::debug;

/// Firebase CLI wrapper
pub struct HostingCli {
    project_id: String,
    /// CI token from FIREBASE_TOKEN, when present
    token: Option<String>,
}

/// Outcome of a hosting upload
#[derive(Debug, Clone)]
pub struct HostingRelease {
    pub deploy_id: String,
    pub url: String,
}

impl HostingCli {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            token: std::env::var("FIREBASE_TOKEN").ok(),
        }
    }

    /// Check that the CLI is installed
    pub async fn check_cli() -> Result<()> {
        if !command_exists("firebase").await {
            return Err(DeployError::MissingCommand("firebase".to_string()));
        }
        Ok(())
    }

    /// Run a firebase command and return stdout
    async fn run_command(
        &self,
        args: &[&str],
        cwd: Option<&std::path::Path>,
        timeout: Duration,
    ) -> Result<String> {
        let mut full_args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full_args.push("--project".to_string());
        full_args.push(self.project_id.clone());
        full_args.push("--non-interactive".to_string());
        full_args.push("--json".to_string());
        if let Some(token) = &self.token {
            full_args.push("--token".to_string());
            full_args.push(token.clone());
        }

        let arg_refs: Vec<&str> = full_args.iter().map(|s| s.as_str()).collect();
        debug!(project = %self.project_id, "Running: firebase {}", args.join(" "));

        let mut options = ExecOptions::with_timeout(timeout);
        options.cwd = cwd.map(|p| p.to_path_buf());

        let output = execute("firebase", &arg_refs, &options).await?;
        Ok(output.stdout)
    }

    /// Upload the prebuilt hosting artifact and return the release info
    pub async fn deploy_hosting(
        &self,
        site: Option<&str>,
        cwd: Option<&std::path::Path>,
        timeout: Duration,
    ) -> Result<HostingRelease> {
        let only = match site {
            Some(site) => format!("hosting:{}", site),
            None => "hosting".to_string(),
        };

        let stdout = self
            .run_command(&["deploy", "--only", &only], cwd, timeout)
            .await?;

        let response = parse_cli_response(&stdout)?;
        let deploy_id = extract_release_id(&response)
            .unwrap_or_else(|| format!("rel-{}", chrono::Utc::now().format("%Y%m%d%H%M%S")));

        let host = site.unwrap_or(self.project_id.as_str());
        Ok(HostingRelease {
            deploy_id,
            url: format!("https://{}.web.app", host),
        })
    }

    /// Re-activate a previously released hosting version
    ///
    /// Used by the rollback path: the recorded deploy id is the platform's
    /// version reference, and the platform re-points the live channel at it.
    pub async fn rollback_release(
        &self,
        site: Option<&str>,
        version_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        let site = site.unwrap_or(self.project_id.as_str());
        let source = format!("{}:{}", site, version_id);
        let target = format!("{}:live", site);

        let stdout = self
            .run_command(&["hosting:clone", &source, &target], None, timeout)
            .await?;

        parse_cli_response(&stdout)?;
        Ok(())
    }

    /// Deploy specific targets (functions, firestore:rules, storage, ...)
    pub async fn deploy_only(
        &self,
        targets: &[&str],
        cwd: Option<&std::path::Path>,
        timeout: Duration,
    ) -> Result<String> {
        let only = targets.join(",");
        let stdout = self
            .run_command(&["deploy", "--only", &only], cwd, timeout)
            .await?;

        let response = parse_cli_response(&stdout)?;
        Ok(extract_release_id(&response)
            .unwrap_or_else(|| format!("rules-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"))))
    }
}

#[derive(Debug, Deserialize)]
struct CliResponse {
    #[serde(default)]
    status: Option<String>,

    #[serde(default)]
    result: Option<serde_json::Value>,

    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn parse_cli_response(stdout: &str) -> Result<CliResponse> {
    // The CLI sometimes prints progress lines before the JSON document;
    // parse from the first opening brace
    let json_start = stdout.find('{').unwrap_or(0);
    let response: CliResponse = serde_json::from_str(&stdout[json_start..])?;

    if let Some(status) = &response.status {
        if status != "success" {
            let detail = response
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("status {}", status));
            return Err(DeployError::Hosting(detail));
        }
    }

    Ok(response)
}

/// Pull a release identifier out of the deploy result, if the CLI gave one
///
/// The hosting result carries a version resource name like
/// `projects/p/sites/s/versions/abc123`; the last path segment is the id.
fn extract_release_id(response: &CliResponse) -> Option<String> {
    let hosting = response.result.as_ref()?.get("hosting")?;

    let version = match hosting {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|v| v.as_str().map(|s| s.to_string())),
        serde_json::Value::Object(map) => map
            .get("version")
            .and_then(|v| v.as_str().map(|s| s.to_string())),
        _ => None,
    }?;

    version.rsplit('/').next().map(|s| s.to_string())
}
