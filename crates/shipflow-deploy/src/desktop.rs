//! Desktop web client deployer

use crate::artifact::BuildArtifact;
use crate::client;
use crate::error::Result;
use crate::{DeployContext, Deployer};
use async_trait::async_trait;
use shipflow_core::{Component, DeploymentResult};

/// Deployer for the desktop web client
pub struct DesktopDeployer;

impl DesktopDeployer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopDeployer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deployer for DesktopDeployer {
    fn component(&self) -> Component {
        Component::Desktop
    }

    fn display_name(&self) -> &str {
        "Desktop client"
    }

    async fn check_prerequisites(&self, ctx: &DeployContext<'_>) -> Result<()> {
        client::check_client_prerequisites(ctx, Component::Desktop).await
    }

    async fn build(&self, ctx: &DeployContext<'_>) -> Result<BuildArtifact> {
        // The desktop bundle ships a favicon but no installable icon set
        client::build_client(ctx, Component::Desktop, &["favicon.ico"]).await
    }

    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        artifact: &BuildArtifact,
    ) -> Result<DeploymentResult> {
        client::deploy_client(ctx, Component::Desktop, artifact).await
    }
}
