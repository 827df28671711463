use colored::Colorize;
use shipflow_core::{Component, DeployConfig};

/// 設定ファイルの内容を検証して表示
///
/// 読み込み時点でスキーマ検証は済んでいるため、ここでは内容の要約と
/// コンポーネントごとの設定の揃い具合を表示する。
pub fn handle(config: &DeployConfig) -> anyhow::Result<()> {
    println!("{}", "設定ファイルを検証しています...".blue());

    config.validate()?;

    println!();
    println!("{}", "環境:".bold());
    for (name, env) in &config.environments {
        let urls = [
            env.desktop_url.as_deref(),
            env.mobile_url.as_deref(),
            env.backend_url.as_deref(),
        ]
        .iter()
        .flatten()
        .count();
        println!("  • {} (URL {} 件)", name.cyan(), urls);
    }

    println!();
    println!("{}", "コンポーネント:".bold());
    for component in Component::deploy_order() {
        let has_project = config.project(component).is_ok();
        let has_health = config.health_check(component).is_ok();
        let mark = if has_project && has_health {
            "✓".green()
        } else if has_project {
            "⚠".yellow()
        } else {
            "-".normal()
        };
        let note = match (has_project, has_health) {
            (true, true) => "",
            (true, false) => " (healthChecks 未定義)",
            _ => " (projects 未定義)",
        };
        println!("  {} {}{}", mark, component, note);
    }

    println!();
    println!("{}", "✓ 設定は有効です".green().bold());
    Ok(())
}
