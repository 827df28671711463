//! Component deployers
//!
//! One deployer per deployable component (desktop, mobile, backend,
//! firebase-config), all implementing the same trait so the orchestrator
//! can drive them uniformly. Shared pre/post-deploy logic (artifact
//! validation, cache busting, warm-up) lives in composable helpers rather
//! than a base type.

pub mod artifact;
pub mod backend;
pub mod client;
pub mod common;
pub mod desktop;
pub mod error;
pub mod firebase;
pub mod hosting;
pub mod mobile;

pub use artifact::BuildArtifact;
pub use error::{DeployError, Result};

use async_trait::async_trait;
use shipflow_core::{
    Component, DeployConfig, DeploymentOptions, DeploymentResult, Environment, ProjectConfig,
};
use std::time::Duration;

/// Per-run context handed to every deployer call
///
/// Deployers are stateless; everything they need arrives here.
pub struct DeployContext<'a> {
    pub config: &'a DeployConfig,
    pub options: &'a DeploymentOptions,
}

impl<'a> DeployContext<'a> {
    pub fn new(config: &'a DeployConfig, options: &'a DeploymentOptions) -> Self {
        Self { config, options }
    }

    pub fn environment(&self) -> Environment {
        self.options.environment
    }

    pub fn project(&self, component: Component) -> Result<&ProjectConfig> {
        Ok(self.config.project(component)?)
    }

    /// Platform project id, honoring the CLI override
    pub fn project_id(&self, component: Component) -> Result<String> {
        if let Some(id) = &self.options.firebase_project {
            return Ok(id.clone());
        }
        Ok(self.project(component)?.project_id.clone())
    }

    /// Timeout for external calls (CLI override wins over config)
    pub fn timeout(&self) -> Duration {
        self.options
            .timeout
            .unwrap_or(Duration::from_secs(self.config.deployment.timeout_secs))
    }

    pub fn retry_count(&self) -> u32 {
        self.config.deployment.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.config.deployment.retry_delay_secs)
    }
}

/// Deployment abstraction implemented by every component variant
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Which component this deployer handles
    fn component(&self) -> Component;

    /// Display name for progress output
    fn display_name(&self) -> &str;

    /// Fail fast before any build is attempted (missing script, env file,
    /// command on PATH). Fatal to this component only.
    async fn check_prerequisites(&self, ctx: &DeployContext<'_>) -> Result<()>;

    /// Run install + build, validate the produced artifacts and cache-bust
    /// the output directory
    async fn build(&self, ctx: &DeployContext<'_>) -> Result<BuildArtifact>;

    /// Upload the prebuilt artifact, verify it is reachable and healthy,
    /// run the post-deploy cache pass and warm-up
    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        artifact: &BuildArtifact,
    ) -> Result<DeploymentResult>;
}

/// Factory for the per-component deployer variants
pub fn deployer_for(component: Component) -> Box<dyn Deployer> {
    match component {
        Component::Desktop => Box::new(desktop::DesktopDeployer::new()),
        Component::Mobile => Box::new(mobile::MobileDeployer::new()),
        Component::Backend => Box::new(backend::BackendDeployer::new()),
        Component::FirebaseConfig => Box::new(firebase::FirebaseConfigDeployer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_all_components() {
        for component in Component::deploy_order() {
            let deployer = deployer_for(component);
            assert_eq!(deployer.component(), component);
            assert!(!deployer.display_name().is_empty());
        }
    }
}
