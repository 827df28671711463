//! デプロイパイプラインの制御ループ
//!
//! コンポーネントごとに 前提条件 → ビルド → デプロイ → 検証 → 記録 を
//! 実行します。コンポーネント単位のエラーは失敗結果に変換して残りの
//! コンポーネントを処理し続けます（コンポーネント間の分離）。
//! 履歴ストアへの書き込みは実行内Mutexで直列化します。

use crate::notify::{self, ComponentSummary, RunSummary};
use crate::utils;
use chrono::Utc;
use colored::Colorize;
use shipflow_core::{Component, DeployConfig, DeploymentOptions, DeploymentResult};
use shipflow_deploy::{deployer_for, DeployContext};
use shipflow_tracker::HistoryTracker;
use shipflow_verify::{run_battery, BatteryParams, VerificationResult};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// 1コンポーネント分のパイプライン結果
pub struct ComponentOutcome {
    pub component: Component,
    pub result: DeploymentResult,
    pub verification: Option<VerificationResult>,
    /// 履歴に記録されたレコードID（記録失敗・dry-run時はNone）
    pub record_id: Option<String>,
    pub warnings: Vec<String>,
}

impl ComponentOutcome {
    /// デプロイと検証の両方が通って初めて成功
    pub fn success(&self) -> bool {
        self.result.success
            && self
                .verification
                .as_ref()
                .is_none_or(|v| v.success)
    }

    fn failed(component: Component, result: DeploymentResult) -> Self {
        Self {
            component,
            result,
            verification: None,
            record_id: None,
            warnings: Vec::new(),
        }
    }
}

/// 1回の実行全体の結果
pub struct RunOutcome {
    pub outcomes: Vec<ComponentOutcome>,
    pub success: bool,
    pub duration_ms: u64,
}

/// パイプラインを実行
pub async fn run(config: &DeployConfig, options: &DeploymentOptions) -> anyhow::Result<RunOutcome> {
    let started_at = Utc::now();
    let started = Instant::now();
    let components = options.component.resolve();

    // 参照される環境・コンポーネントの設定はビルド開始前に検証する
    config.environment(options.environment)?;
    for &component in &components {
        config.project(component)?;
        config.health_check(component)?;
    }

    let tracker = Mutex::new(HistoryTracker::new()?);
    let ctx = DeployContext::new(config, options);

    let mut outcomes = Vec::new();
    for (index, &component) in components.iter().enumerate() {
        println!();
        println!(
            "{}",
            format!(
                "■ [{}/{}] {} ({})",
                index + 1,
                components.len(),
                component,
                options.environment
            )
            .blue()
            .bold()
        );

        let outcome = run_component(&ctx, component, &tracker).await;
        if outcome.success() {
            println!("  {} {} 完了", "✓".green(), component);
        } else {
            println!("  {} {} 失敗", "✗".red(), component);
        }
        outcomes.push(outcome);
    }

    let success = outcomes.iter().all(|o| o.success());
    let duration_ms = started.elapsed().as_millis() as u64;

    print_summary(&outcomes, success, duration_ms);

    // 通知イベントを発行（シンクの失敗は実行結果に影響しない）
    let summary = RunSummary {
        environment: options.environment,
        success,
        started_at,
        duration_ms,
        components: outcomes
            .iter()
            .map(|o| ComponentSummary {
                component: o.component,
                success: o.success(),
                deployment_id: o.result.deployment_id.clone(),
                url: o.result.url.clone(),
                error: o.result.error.clone(),
                failed_checks: o
                    .verification
                    .as_ref()
                    .map(|v| v.failed_checks().len())
                    .unwrap_or(0),
            })
            .collect(),
    };
    notify::emit(&summary, config.deployment.notify_webhook.as_deref()).await;

    Ok(RunOutcome {
        outcomes,
        success,
        duration_ms,
    })
}

/// 1コンポーネント分のパイプライン
async fn run_component(
    ctx: &DeployContext<'_>,
    component: Component,
    tracker: &Mutex<HistoryTracker>,
) -> ComponentOutcome {
    let pipeline_started = Instant::now();
    let environment = ctx.environment();
    let deployer = deployer_for(component);

    // 前提条件（失敗はこのコンポーネントのみ致命、履歴には残さない）
    if let Err(e) = deployer.check_prerequisites(ctx).await {
        println!("  {} 前提条件エラー: {}", "✗".red(), e);
        return ComponentOutcome::failed(
            component,
            DeploymentResult::failure(
                component,
                environment,
                pipeline_started.elapsed().as_millis() as u64,
                format!("prerequisite: {}", e),
            ),
        );
    }
    println!("  ✓ 前提条件チェック完了");

    // dry-run: 計画のみ表示してビルド・デプロイは行わない
    if ctx.options.dry_run {
        print_plan(ctx, component);
        return ComponentOutcome {
            component,
            result: DeploymentResult::success(
                component,
                environment,
                None,
                ctx.config.component_url(component, environment),
                pipeline_started.elapsed().as_millis() as u64,
            ),
            verification: None,
            record_id: None,
            warnings: vec!["dry-run: ビルド・デプロイは実行していません".to_string()],
        };
    }

    // ビルド
    let artifact = match deployer.build(ctx).await {
        Ok(artifact) => artifact,
        Err(e) => {
            println!("  {} ビルドエラー: {}", "✗".red(), e);
            let result = DeploymentResult::failure(
                component,
                environment,
                pipeline_started.elapsed().as_millis() as u64,
                format!("build: {}", e),
            );
            let record_id = record(tracker, &result).await;
            return ComponentOutcome {
                record_id,
                ..ComponentOutcome::failed(component, result)
            };
        }
    };
    for warning in &artifact.warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }

    // デプロイ
    let mut result = match deployer.deploy(ctx, &artifact).await {
        Ok(result) => result,
        Err(e) => {
            println!("  {} デプロイエラー: {}", "✗".red(), e);
            let result = DeploymentResult::failure(
                component,
                environment,
                pipeline_started.elapsed().as_millis() as u64,
                format!("deploy: {}", e),
            );
            let record_id = record(tracker, &result).await;
            return ComponentOutcome {
                record_id,
                ..ComponentOutcome::failed(component, result)
            };
        }
    };
    // 記録上の所要時間はビルドを含むパイプライン全体
    result.duration_ms = pipeline_started.elapsed().as_millis() as u64;

    // 検証バッテリ
    let mut verification = run_verification(ctx, component).await;
    if let Some(v) = &verification {
        report_verification(v);
    }

    // --monitor: 一定時間ポーリングして遅延障害を捕捉
    if ctx.options.monitor {
        if let Some(initial) = verification.take() {
            verification = Some(monitor_verification(ctx, component, initial).await);
        }
    }

    // 記録: 検証に失敗したデプロイは失敗として残し、
    // ロールバック候補に選ばれないようにする
    let verification_failed = verification.as_ref().is_some_and(|v| !v.success);
    let record_result = if verification_failed {
        let failed_count = verification
            .as_ref()
            .map(|v| v.failed_checks().len())
            .unwrap_or(0);
        DeploymentResult {
            success: false,
            error: Some(format!("verification: {} check(s) failed", failed_count)),
            ..result.clone()
        }
    } else {
        result.clone()
    };
    let record_id = record(tracker, &record_result).await;

    ComponentOutcome {
        component,
        result,
        verification,
        record_id,
        warnings: artifact.warnings,
    }
}

/// 履歴ストアへ記録（失敗は警告のみ: デプロイ自体の成否には影響させない）
async fn record(tracker: &Mutex<HistoryTracker>, result: &DeploymentResult) -> Option<String> {
    let metadata = utils::collect_metadata().await;
    let tracker = tracker.lock().await;
    match tracker.record_deployment(result, metadata).await {
        Ok(record) => Some(record.id),
        Err(e) => {
            warn!("履歴の記録に失敗しました: {}", e);
            println!(
                "  {} 履歴を記録できませんでした（デプロイ自体は完了しています）: {}",
                "⚠".yellow(),
                e
            );
            None
        }
    }
}

/// コンポーネントに設定された検証バッテリを実行
async fn run_verification(
    ctx: &DeployContext<'_>,
    component: Component,
) -> Option<VerificationResult> {
    let environment = ctx.environment();
    let health = ctx.config.health_check(component).ok();
    // UI・パフォーマンス等のルールはURLを持つクライアントにのみ適用
    let rules = if component.is_client() {
        ctx.config.verification.as_ref()
    } else {
        None
    };
    let base_url = ctx.config.component_url(component, environment);

    if health.is_none() && rules.is_none() {
        return None;
    }

    println!("  ↻ 検証バッテリを実行中...");
    Some(
        run_battery(BatteryParams {
            component,
            environment,
            base_url,
            health,
            rules,
        })
        .await,
    )
}

/// --monitor 時のポーリング検証
async fn monitor_verification(
    ctx: &DeployContext<'_>,
    component: Component,
    initial: VerificationResult,
) -> VerificationResult {
    let interval = Duration::from_secs(ctx.config.deployment.monitor_interval_secs);
    let deadline = Instant::now() + Duration::from_secs(ctx.config.deployment.monitor_duration_secs);

    println!(
        "  ↻ 監視モード: {}秒間、{}秒間隔で検証を継続します",
        ctx.config.deployment.monitor_duration_secs,
        ctx.config.deployment.monitor_interval_secs
    );

    let mut last = initial;
    while Instant::now() + interval <= deadline {
        tokio::time::sleep(interval).await;

        let Some(next) = run_verification(ctx, component).await else {
            break;
        };
        if next.success != last.success {
            if next.success {
                println!("  {} 検証が回復しました", "✓".green());
            } else {
                println!("  {} 検証が失敗に転じました", "✗".red());
                report_verification(&next);
            }
        }
        last = next;
    }

    last
}

fn report_verification(result: &VerificationResult) {
    for check in &result.checks {
        if check.success {
            println!("    {} {} ({})", "✓".green(), check.name, utils::format_duration_ms(check.duration_ms));
        } else {
            println!(
                "    {} {} - {}",
                "✗".red(),
                check.name,
                check.error.as_deref().unwrap_or(&check.message)
            );
        }
    }
}

fn print_plan(ctx: &DeployContext<'_>, component: Component) {
    let environment = ctx.environment();
    println!("  {} dry-run: 実行計画", "→".cyan());
    if let Ok(project) = ctx.project(component) {
        println!(
            "    プロジェクト: {}",
            ctx.project_id(component)
                .unwrap_or_else(|_| project.project_id.clone())
        );
        if let Some(build_command) = &project.build_command {
            println!("    ビルド: {}", build_command);
        }
        if let Some(output_dir) = &project.output_dir {
            println!("    出力: {}", output_dir.display());
        }
    }
    if let Some(url) = ctx.config.component_url(component, environment) {
        println!("    URL: {}", url);
    }
}

/// 実行全体のサマリ表示
fn print_summary(outcomes: &[ComponentOutcome], success: bool, duration_ms: u64) {
    println!();
    println!("{}", "デプロイ結果サマリ:".bold());
    for outcome in outcomes {
        let mark = if outcome.success() {
            "✓".green()
        } else {
            "✗".red()
        };
        let mut line = format!(
            "  {} {:<16} {:>8}",
            mark,
            outcome.component.to_string(),
            utils::format_duration_ms(outcome.result.duration_ms)
        );
        if let Some(url) = &outcome.result.url {
            line.push_str(&format!("  {}", url.cyan()));
        }
        println!("{}", line);

        if let Some(error) = &outcome.result.error {
            println!("      エラー: {}", error);
        }
        if let Some(v) = &outcome.verification {
            if !v.success {
                for check in v.failed_checks() {
                    println!("      検証失敗: {}", check.name);
                }
            }
        }
    }

    println!();
    if success {
        println!(
            "{}",
            format!("✓ すべてのコンポーネントが完了しました ({})", utils::format_duration_ms(duration_ms))
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!("✗ 失敗したコンポーネントがあります ({})", utils::format_duration_ms(duration_ms))
                .red()
                .bold()
        );
    }
}
