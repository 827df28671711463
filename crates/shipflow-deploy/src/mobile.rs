//! Mobile/PWA client deployer

use crate::artifact::BuildArtifact;
use crate::client;
use crate::error::Result;
use crate::{DeployContext, Deployer};
use async_trait::async_trait;
use shipflow_core::{Component, DeploymentResult};

/// Installable-app icon set expected in a PWA build; missing entries only
/// warn, the app still works without them
const OPTIONAL_ICONS: [&str; 3] = [
    "icons/icon-192.png",
    "icons/icon-512.png",
    "apple-touch-icon.png",
];

/// Deployer for the mobile/PWA client
pub struct MobileDeployer;

impl MobileDeployer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MobileDeployer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deployer for MobileDeployer {
    fn component(&self) -> Component {
        Component::Mobile
    }

    fn display_name(&self) -> &str {
        "Mobile/PWA client"
    }

    async fn check_prerequisites(&self, ctx: &DeployContext<'_>) -> Result<()> {
        client::check_client_prerequisites(ctx, Component::Mobile).await
    }

    async fn build(&self, ctx: &DeployContext<'_>) -> Result<BuildArtifact> {
        client::build_client(ctx, Component::Mobile, &OPTIONAL_ICONS).await
    }

    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        artifact: &BuildArtifact,
    ) -> Result<DeploymentResult> {
        client::deploy_client(ctx, Component::Mobile, artifact).await
    }
}
