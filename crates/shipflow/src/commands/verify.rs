use crate::utils;
use colored::Colorize;
use shipflow_core::DeployConfig;
use shipflow_verify::{run_battery, BatteryParams};

/// デプロイ済み環境に対して検証バッテリのみを実行
pub async fn handle(
    config: &DeployConfig,
    environment: Option<String>,
    component: String,
) -> anyhow::Result<bool> {
    let environment = utils::determine_environment(environment, config)?;
    let selector = utils::parse_selector(&component)?;

    println!(
        "{}",
        format!("検証を実行します (環境: {})", environment).blue().bold()
    );

    let mut all_success = true;
    for component in selector.resolve() {
        let health = config.health_check(component).ok();
        let rules = if component.is_client() {
            config.verification.as_ref()
        } else {
            None
        };
        let base_url = config.component_url(component, environment);

        if health.is_none() && rules.is_none() {
            println!();
            println!("■ {} : 検証設定がないためスキップ", component);
            continue;
        }

        println!();
        println!("{}", format!("■ {}", component).bold());
        let result = run_battery(BatteryParams {
            component,
            environment,
            base_url,
            health,
            rules,
        })
        .await;

        for check in &result.checks {
            if check.success {
                println!(
                    "  {} {} ({})",
                    "✓".green(),
                    check.name,
                    utils::format_duration_ms(check.duration_ms)
                );
            } else {
                println!(
                    "  {} {} - {}",
                    "✗".red(),
                    check.name,
                    check.error.as_deref().unwrap_or(&check.message)
                );
            }
        }

        if !result.success {
            all_success = false;
        }
    }

    println!();
    if all_success {
        println!("{}", "✓ すべての検証が通りました".green().bold());
    } else {
        println!("{}", "✗ 失敗した検証があります".red().bold());
    }

    Ok(all_success)
}
