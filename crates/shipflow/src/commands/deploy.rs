use crate::{orchestrator, utils};
use colored::Colorize;
use shipflow_core::{DeployConfig, DeploymentOptions, Environment};
use std::time::Duration;

/// deployコマンドの引数
pub struct DeployArgs {
    pub environment: Option<String>,
    pub component: String,
    pub dry_run: bool,
    pub monitor: bool,
    pub force: bool,
    pub no_cache_bust: bool,
    pub project: Option<String>,
    pub timeout: Option<u64>,
    pub yes: bool,
}

pub async fn handle(config: &DeployConfig, args: DeployArgs) -> anyhow::Result<bool> {
    println!("{}", "デプロイを開始します...".blue().bold());

    let environment = utils::determine_environment(args.environment, config)?;
    let selector = utils::parse_selector(&args.component)?;
    println!("環境: {}", environment.to_string().cyan());

    let components = selector.resolve();
    println!();
    println!(
        "{}",
        format!("デプロイ対象コンポーネント ({} 個):", components.len()).bold()
    );
    for component in &components {
        let project_id = config
            .project(*component)
            .map(|p| p.project_id.clone())
            .unwrap_or_else(|_| "(設定なし)".to_string());
        println!("  • {} ({})", component.to_string().cyan(), project_id);
    }

    // 本番への実デプロイは --yes を要求（dry-runは除く）
    if environment == Environment::Production && !args.dry_run && !args.yes {
        println!();
        println!(
            "{}",
            "警告: production 環境へデプロイしようとしています。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(false);
    }

    let mut options = DeploymentOptions::new(environment, selector);
    options.dry_run = args.dry_run;
    options.monitor = args.monitor;
    options.force = args.force;
    options.skip_cache_bust = args.no_cache_bust;
    options.firebase_project = args.project;
    options.timeout = args.timeout.map(Duration::from_secs);

    let outcome = orchestrator::run(config, &options).await?;
    Ok(outcome.success)
}
