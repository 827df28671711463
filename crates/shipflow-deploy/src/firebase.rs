//! Firebase rules/config deployer
//!
//! Applies the Firestore/Storage rulesets to the named platform project.
//! There is no build output; "build" validates the rules files and the
//! deploy hands them to the platform CLI.

use crate::artifact::BuildArtifact;
use crate::error::{DeployError, Result};
use crate::hosting::HostingCli;
use crate::{DeployContext, Deployer};
use async_trait::async_trait;
use shipflow_core::{Component, DeploymentResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

/// Deployer for the database rules/config layer
pub struct FirebaseConfigDeployer;

impl FirebaseConfigDeployer {
    pub fn new() -> Self {
        Self
    }

    fn rules_files(ctx: &DeployContext<'_>) -> Result<Vec<PathBuf>> {
        let project = ctx.project(Component::FirebaseConfig)?;
        let source = project
            .source_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let files = if project.rules_files.is_empty() {
            vec![
                source.join("firestore.rules"),
                source.join("storage.rules"),
            ]
        } else {
            project.rules_files.iter().map(|f| source.join(f)).collect()
        };

        Ok(files)
    }

    /// Map a rules file to its CLI deploy target
    fn target_for(path: &Path) -> Option<&'static str> {
        match path.file_name()?.to_str()? {
            "firestore.rules" | "firestore.indexes.json" => Some("firestore"),
            "storage.rules" => Some("storage"),
            _ => None,
        }
    }
}

impl Default for FirebaseConfigDeployer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deployer for FirebaseConfigDeployer {
    fn component(&self) -> Component {
        Component::FirebaseConfig
    }

    fn display_name(&self) -> &str {
        "Firebase rules/config"
    }

    async fn check_prerequisites(&self, ctx: &DeployContext<'_>) -> Result<()> {
        HostingCli::check_cli().await?;

        for file in Self::rules_files(ctx)? {
            if !file.exists() {
                return Err(DeployError::MissingRulesFile(file));
            }
        }

        Ok(())
    }

    async fn build(&self, ctx: &DeployContext<'_>) -> Result<BuildArtifact> {
        // No build step; re-validate the rules files so a deploy never
        // starts against files that vanished since the prerequisite check
        let files = Self::rules_files(ctx)?;
        for file in &files {
            if !file.exists() {
                return Err(DeployError::MissingRulesFile(file.clone()));
            }
        }

        let project = ctx.project(Component::FirebaseConfig)?;
        let mut artifact = BuildArtifact::new(
            project
                .source_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        );
        artifact.warnings = files
            .iter()
            .filter(|f| Self::target_for(f).is_none())
            .map(|f| format!("no deploy target known for {}", f.display()))
            .collect();

        Ok(artifact)
    }

    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        artifact: &BuildArtifact,
    ) -> Result<DeploymentResult> {
        let started = Instant::now();
        let environment = ctx.environment();
        let cli = HostingCli::new(ctx.project_id(Component::FirebaseConfig)?);

        let mut targets: Vec<&str> = Self::rules_files(ctx)?
            .iter()
            .filter_map(|f| Self::target_for(f))
            .collect();
        targets.dedup();
        if targets.is_empty() {
            warn!("No known rules targets; defaulting to firestore");
            targets.push("firestore");
        }

        let mut deploy_id = None;
        let mut last_error = None;
        for attempt in 0..ctx.retry_count().max(1) {
            match cli
                .deploy_only(
                    &targets,
                    Some(artifact.output_dir.as_path()),
                    ctx.timeout(),
                )
                .await
            {
                Ok(id) => {
                    deploy_id = Some(id);
                    break;
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, "Rules deploy failed: {}", e);
                    last_error = Some(e);
                    if attempt + 1 < ctx.retry_count().max(1) {
                        tokio::time::sleep(ctx.retry_delay()).await;
                    }
                }
            }
        }
        let deploy_id = match deploy_id {
            Some(id) => id,
            None => return Err(last_error.expect("at least one attempt")),
        };

        // Rules have no reachable URL; the CLI result is the post-deploy check
        Ok(DeploymentResult::success(
            Component::FirebaseConfig,
            environment,
            Some(deploy_id),
            None,
            started.elapsed().as_millis() as u64,
        ))
    }
}
