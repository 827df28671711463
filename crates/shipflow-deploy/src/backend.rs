//! Backend API deployer
//!
//! The backend ships as serverless functions: install + build through the
//! executor, then a functions-only deploy. There is no static output to
//! cache-bust; freshness comes from the platform rollout itself.

use crate::artifact::BuildArtifact;
use crate::common::{require_package_script, verify_deployment, warm_up, StepProgress};
use crate::error::{DeployError, Result};
use crate::hosting::HostingCli;
use crate::{DeployContext, Deployer};
use async_trait::async_trait;
use shipflow_core::{Component, DeploymentResult};
use shipflow_exec::{command_exists, execute_with_retry, ExecOptions};
use std::path::PathBuf;
use std::time::Instant;
use tracing::warn;

const DEFAULT_INSTALL_COMMAND: &str = "npm ci";
const DEFAULT_BUILD_COMMAND: &str = "npm run build";

/// Deployer for the backend API
pub struct BackendDeployer;

impl BackendDeployer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BackendDeployer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deployer for BackendDeployer {
    fn component(&self) -> Component {
        Component::Backend
    }

    fn display_name(&self) -> &str {
        "Backend API"
    }

    async fn check_prerequisites(&self, ctx: &DeployContext<'_>) -> Result<()> {
        let project = ctx.project(Component::Backend)?;
        let source = project
            .source_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let build_command = project
            .build_command
            .as_deref()
            .unwrap_or(DEFAULT_BUILD_COMMAND);
        require_package_script(&source, build_command).await?;

        if let Some(env_file) = &project.env_file {
            let path = source.join(env_file);
            if !path.exists() {
                return Err(DeployError::MissingEnvFile(path));
            }
        }

        if !command_exists("npm").await {
            return Err(DeployError::MissingCommand("npm".to_string()));
        }
        HostingCli::check_cli().await
    }

    async fn build(&self, ctx: &DeployContext<'_>) -> Result<BuildArtifact> {
        let project = ctx.project(Component::Backend)?;
        let source = project
            .source_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let exec_options = ExecOptions {
            cwd: Some(source.clone()),
            env: project.build_env.clone(),
            timeout: ctx.timeout(),
        };

        let install_command = project
            .install_command
            .as_deref()
            .unwrap_or(DEFAULT_INSTALL_COMMAND);
        let build_command = project
            .build_command
            .as_deref()
            .unwrap_or(DEFAULT_BUILD_COMMAND);

        let progress = StepProgress::new("backend: installing dependencies...");
        execute_with_retry(
            "sh",
            &["-c", install_command],
            &exec_options,
            ctx.retry_count(),
            ctx.retry_delay(),
        )
        .await?;

        progress.set_message("backend: building...");
        execute_with_retry(
            "sh",
            &["-c", build_command],
            &exec_options,
            ctx.retry_count(),
            ctx.retry_delay(),
        )
        .await?;
        progress.finish("backend: build completed");

        Ok(BuildArtifact::new(source))
    }

    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        artifact: &BuildArtifact,
    ) -> Result<DeploymentResult> {
        let started = Instant::now();
        let environment = ctx.environment();
        let cli = HostingCli::new(ctx.project_id(Component::Backend)?);

        let progress = StepProgress::new("backend: deploying functions...");
        let mut deploy_id = None;
        let mut last_error = None;
        for attempt in 0..ctx.retry_count().max(1) {
            match cli
                .deploy_only(
                    &["functions"],
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
                    warn!(attempt = attempt + 1, "Functions deploy failed: {}", e);
                    last_error = Some(e);
                    if attempt + 1 < ctx.retry_count().max(1) {
                        tokio::time::sleep(ctx.retry_delay()).await;
                    }
                }
            }
        }
        let deploy_id = match deploy_id {
            Some(id) => id,
            None => {
                progress.finish("backend: deploy failed");
                return Err(last_error.expect("at least one attempt"));
            }
        };
        progress.finish("backend: deploy completed");

        let url = ctx
            .config
            .component_url(Component::Backend, environment)
            .ok_or_else(|| DeployError::MissingUrl {
                component: Component::Backend.to_string(),
                environment: environment.to_string(),
            })?;

        verify_deployment(&url, false, ctx.timeout()).await?;
        warm_up(&[url.clone()], ctx.timeout()).await;

        Ok(DeploymentResult::success(
            Component::Backend,
            environment,
            Some(deploy_id),
            Some(url),
            started.elapsed().as_millis() as u64,
        ))
    }
}
