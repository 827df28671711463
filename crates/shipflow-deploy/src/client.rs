//! Shared build/deploy flow for the client components
//!
//! Desktop and mobile are both web clients: install + build via the
//! process executor, PWA artifact validation, cache busting, hosting
//! upload, post-upload verification, then the post-deploy cache pass and
//! warm-up. The per-component deployers call into this flow and add their
//! own specifics (icon expectations, URLs).

use crate::artifact::{validate_client_artifacts, BuildArtifact};
use crate::common::{
    check_custom_domains, post_deploy_cache_pass, require_package_script, verify_deployment,
    warm_up, StepProgress,
};
use crate::error::{DeployError, Result};
use crate::hosting::HostingCli;
use crate::DeployContext;
use shipflow_cache::{CacheBustOptions, CacheBuster};
use shipflow_core::{Component, DeploymentResult, Environment};
use shipflow_exec::{command_exists, execute_with_retry, ExecOptions};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, warn};

const DEFAULT_INSTALL_COMMAND: &str = "npm ci";
const DEFAULT_BUILD_COMMAND: &str = "npm run build";
const DEFAULT_OUTPUT_DIR: &str = "dist";

fn source_dir(ctx: &DeployContext<'_>, component: Component) -> Result<PathBuf> {
    Ok(ctx
        .project(component)?
        .source_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn output_dir(ctx: &DeployContext<'_>, component: Component) -> Result<PathBuf> {
    let project = ctx.project(component)?;
    let relative = project
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    Ok(source_dir(ctx, component)?.join(relative))
}

/// Prerequisites shared by the client components
pub async fn check_client_prerequisites(
    ctx: &DeployContext<'_>,
    component: Component,
) -> Result<()> {
    let project = ctx.project(component)?;
    let source = source_dir(ctx, component)?;

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
    HostingCli::check_cli().await?;

    Ok(())
}

/// Install, build, validate and cache-bust a client component
pub async fn build_client(
    ctx: &DeployContext<'_>,
    component: Component,
    optional_icons: &[&str],
) -> Result<BuildArtifact> {
    let project = ctx.project(component)?;
    let source = source_dir(ctx, component)?;
    let out = output_dir(ctx, component)?;
    let environment = ctx.environment();

    // Environment injected into the build step
    let mut build_env = project.build_env.clone();
    if let Some(api_url) = ctx
        .config
        .component_url(Component::Backend, environment)
    {
        build_env
            .entry("VITE_API_BASE_URL".to_string())
            .or_insert(api_url);
    }
    build_env.insert(
        "VITE_BUILD_VERSION".to_string(),
        format!(
            "{}-{}",
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ),
    );
    build_env.insert(
        "VITE_CACHE_BUST".to_string(),
        CacheBuster::generate_unique_id(),
    );

    let exec_options = ExecOptions {
        cwd: Some(source.clone()),
        env: build_env,
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

    let progress = StepProgress::new(format!("{}: installing dependencies...", component));
    execute_with_retry(
        "sh",
        &["-c", install_command],
        &exec_options,
        ctx.retry_count(),
        ctx.retry_delay(),
    )
    .await?;

    progress.set_message(format!("{}: building...", component));
    execute_with_retry(
        "sh",
        &["-c", build_command],
        &exec_options,
        ctx.retry_count(),
        ctx.retry_delay(),
    )
    .await?;
    progress.finish(format!("{}: build completed", component));

    let mut artifact = BuildArtifact::new(&out);
    artifact.warnings = validate_client_artifacts(&out, optional_icons)?;

    if ctx.options.skip_cache_bust {
        debug!("Cache busting skipped by options");
        return Ok(artifact);
    }

    let env_config = ctx.config.environment(environment)?;
    let mut cache_options = CacheBustOptions::new(environment);
    cache_options.cdn_zone_id = env_config.cdn_zone_id.clone();
    cache_options.domains = env_config.custom_domains.clone();
    // The CDN purge belongs to the post-deploy pass; here we only rewrite
    cache_options.skip_cdn_purge = true;

    let outcome = CacheBuster::new(&out, cache_options).run().await?;
    artifact.build_id = Some(outcome.unique_id);
    artifact.warnings.extend(outcome.errors);

    Ok(artifact)
}

/// Upload a prebuilt client artifact and verify it
pub async fn deploy_client(
    ctx: &DeployContext<'_>,
    component: Component,
    artifact: &BuildArtifact,
) -> Result<DeploymentResult> {
    let started = Instant::now();
    let project = ctx.project(component)?;
    let environment = ctx.environment();
    let env_config = ctx.config.environment(environment)?;
    let source = source_dir(ctx, component)?;

    let cli = HostingCli::new(ctx.project_id(component)?);

    // Deploy errors are retried per the configured policy
    let progress = StepProgress::new(format!("{}: uploading to hosting...", component));
    let mut release = None;
    let mut last_error = None;
    for attempt in 0..ctx.retry_count().max(1) {
        match cli
            .deploy_hosting(project.site.as_deref(), Some(source.as_path()), ctx.timeout())
            .await
        {
            Ok(r) => {
                release = Some(r);
                break;
            }
            Err(e) => {
                warn!(attempt = attempt + 1, "Hosting upload failed: {}", e);
                last_error = Some(e);
                if attempt + 1 < ctx.retry_count().max(1) {
                    tokio::time::sleep(ctx.retry_delay()).await;
                }
            }
        }
    }
    let release = match release {
        Some(r) => r,
        None => {
            progress.finish(format!("{}: upload failed", component));
            return Err(last_error.expect("at least one attempt"));
        }
    };
    progress.finish(format!("{}: upload completed", component));

    // Prefer the configured public URL over the platform default
    let url = ctx
        .config
        .component_url(component, environment)
        .unwrap_or_else(|| release.url.clone());

    verify_deployment(&url, true, ctx.timeout()).await?;

    // Production extras are best-effort
    if environment == Environment::Production && !env_config.custom_domains.is_empty() {
        let problems = check_custom_domains(&env_config.custom_domains, ctx.timeout()).await;
        if !problems.is_empty() {
            warn!("Custom domain association issues: {}", problems.join("; "));
        }
    }

    let cache_errors = post_deploy_cache_pass(
        &artifact.output_dir,
        environment,
        env_config,
        ctx.options.skip_cache_bust,
    )
    .await;
    if !cache_errors.is_empty() {
        warn!("Post-deploy cache pass: {}", cache_errors.join("; "));
    }

    let warmup_urls = vec![
        url.clone(),
        format!("{}/index.html", url.trim_end_matches('/')),
        format!("{}/manifest.webmanifest", url.trim_end_matches('/')),
    ];
    warm_up(&warmup_urls, ctx.timeout()).await;

    Ok(DeploymentResult::success(
        component,
        environment,
        Some(release.deploy_id),
        Some(url),
        started.elapsed().as_millis() as u64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipflow_core::{ComponentSelector, DeployConfig, DeploymentOptions};

    fn config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "projects": {
                "desktop": {
                    "projectId": "myapp",
                    "buildCommand": "npm run build",
                    "outputDir": "dist",
                    "sourceDir": "/tmp/shipflow-test-src"
                }
            },
            "environments": {
                "production": { "desktopUrl": "https://app.example.com" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_output_dir_joins_source_dir() {
        let config = config();
        let options = DeploymentOptions::new(
            Environment::Production,
            ComponentSelector::One(Component::Desktop),
        );
        let ctx = DeployContext::new(&config, &options);

        let out = output_dir(&ctx, Component::Desktop).unwrap();
        assert_eq!(out, PathBuf::from("/tmp/shipflow-test-src/dist"));
    }

    #[tokio::test]
    async fn test_prerequisites_fail_without_package_json() {
        let config = config();
        let options = DeploymentOptions::new(
            Environment::Production,
            ComponentSelector::One(Component::Desktop),
        );
        let ctx = DeployContext::new(&config, &options);

        // /tmp/shipflow-test-src has no package.json
        let err = check_client_prerequisites(&ctx, Component::Desktop)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingScript { .. }));
    }
}
