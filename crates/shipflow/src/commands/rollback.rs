use crate::rollback::{RollbackManager, RollbackOutcome};
use crate::utils;
use colored::Colorize;
use shipflow_core::{Component, DeployConfig};
use shipflow_tracker::HistoryTracker;

/// rollbackコマンドの処理
pub async fn handle(
    config: &DeployConfig,
    environment: Option<String>,
    component: String,
    list: bool,
    emergency: bool,
    yes: bool,
) -> anyhow::Result<bool> {
    let environment = utils::determine_environment(environment, config)?;
    let component = Component::parse(&component)?;
    let tracker = HistoryTracker::new()?;

    // --list: 候補の表示のみ
    if list {
        return handle_list(&tracker, component, environment).await;
    }

    println!(
        "{}",
        format!("ロールバック: {} ({})", component, environment)
            .blue()
            .bold()
    );

    // 実行前の確認（--yesでスキップ）
    if !yes {
        println!();
        println!(
            "{}",
            "警告: 現在のデプロイを直前の正常なデプロイへ巻き戻します。".yellow()
        );
        if emergency {
            println!(
                "{}",
                "緊急モードでは再検証もスキップされます。".yellow().bold()
            );
        }
        println!("実行するには --yes オプションを指定してください");
        return Ok(false);
    }

    let manager = RollbackManager::new(config, component, environment, emergency);
    let outcome = manager.run(&tracker).await?;

    println!();
    match &outcome {
        RollbackOutcome::NoCandidate => {
            // 正常系: 何も巻き戻していない
        }
        RollbackOutcome::Success { from, to } => {
            println!(
                "{}",
                format!(
                    "✓ ロールバック完了: {} → {}",
                    from.deployment_id.as_deref().unwrap_or(&from.id),
                    to.deployment_id.as_deref().unwrap_or(&to.id)
                )
                .green()
                .bold()
            );
        }
        RollbackOutcome::RedeployFailed(reason) => {
            println!(
                "{}",
                format!("✗ 再デプロイに失敗しました: {}", reason).red().bold()
            );
        }
        RollbackOutcome::VerificationFailed(reason) => {
            println!(
                "{}",
                format!("✗ ロールバック後の再検証に失敗しました: {}", reason)
                    .red()
                    .bold()
            );
            println!("  失敗したロールバックをさらに巻き戻すことはしません。手動で確認してください。");
        }
    }

    Ok(outcome.is_success())
}

/// 候補一覧の表示（--list）
async fn handle_list(
    tracker: &HistoryTracker,
    component: Component,
    environment: shipflow_core::Environment,
) -> anyhow::Result<bool> {
    let latest = tracker.get_latest_deployment(component, environment).await?;
    let candidate = tracker
        .get_rollback_candidate(component, environment)
        .await?;

    println!(
        "{}",
        format!("ロールバック候補 ({} / {}):", component, environment).bold()
    );

    match &latest {
        Some(record) => println!(
            "  現在: {} ({})",
            record.deployment_id.as_deref().unwrap_or(&record.id).cyan(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  現在: {}", "(成功したデプロイなし)".yellow()),
    }

    match &candidate {
        Some(record) => println!(
            "  候補: {} ({})",
            record.deployment_id.as_deref().unwrap_or(&record.id).cyan(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!(
            "  候補: {}",
            "(なし: 成功したデプロイが2件未満)".yellow()
        ),
    }

    Ok(true)
}
