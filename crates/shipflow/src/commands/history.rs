use crate::utils;
use colored::Colorize;
use shipflow_core::{Component, Environment};
use shipflow_tracker::HistoryTracker;

fn parse_filters(
    environment: Option<String>,
    component: Option<String>,
) -> anyhow::Result<(Option<Environment>, Option<Component>)> {
    let environment = environment.map(|e| Environment::parse(&e)).transpose()?;
    let component = component.map(|c| Component::parse(&c)).transpose()?;
    Ok((environment, component))
}

/// 履歴の一覧表示
pub async fn handle_list(
    environment: Option<String>,
    component: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    let (environment, component) = parse_filters(environment, component)?;
    let tracker = HistoryTracker::new()?;
    let records = tracker.list(component, environment, limit).await?;

    if records.is_empty() {
        println!("{}", "デプロイ履歴がありません".yellow());
        return Ok(());
    }

    println!("{}", format!("デプロイ履歴 ({} 件):", records.len()).bold());
    for record in &records {
        let mark = if record.success {
            "✓".green()
        } else {
            "✗".red()
        };
        let mut line = format!(
            "  {} {}  {:<16} {:<12} {:>8}",
            mark,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.component.to_string(),
            record.environment.to_string(),
            utils::format_duration_ms(record.duration_ms),
        );
        if let Some(id) = &record.deployment_id {
            line.push_str(&format!("  {}", id.cyan()));
        }
        if record.metadata.rolled_back_to.is_some() {
            line.push_str(&format!("  {}", "(ロールバック済)".yellow()));
        }
        println!("{}", line);

        if let Some(error) = &record.error {
            println!("      エラー: {}", error);
        }
    }

    Ok(())
}

/// 統計の表示
pub async fn handle_stats(
    environment: Option<String>,
    component: Option<String>,
    days: i64,
) -> anyhow::Result<()> {
    let (environment, component) = parse_filters(environment, component)?;
    let tracker = HistoryTracker::new()?;
    let stats = tracker.get_statistics(component, environment, days).await?;

    println!("{}", format!("直近{}日間のデプロイ統計:", days).bold());
    println!("  総数:     {}", stats.total);
    println!("  成功:     {}", stats.successful.to_string().green());
    println!("  失敗:     {}", stats.failed.to_string().red());
    println!("  成功率:   {:.1}%", stats.success_rate * 100.0);
    println!(
        "  平均時間: {}",
        utils::format_duration_ms(stats.average_duration_ms)
    );

    Ok(())
}

/// 古い履歴の削除
pub async fn handle_cleanup(days: i64, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!(
            "{}",
            format!("{}日より古い履歴を削除します。", days).yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    let tracker = HistoryTracker::new()?;
    let removed = tracker.cleanup(days).await?;

    println!(
        "{}",
        format!("✓ {} 件の履歴を削除しました", removed).green()
    );
    Ok(())
}
