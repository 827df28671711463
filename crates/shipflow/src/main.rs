mod commands;
mod notify;
mod orchestrator;
mod rollback;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(name = "ship")]
#[command(about = "ビルド・デプロイ・検証・ロールバックをひとつの流れに。", long_about = None)]
struct Cli {
    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    /// エラー以外のログを抑制
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// コンポーネントをデプロイ
    Deploy {
        /// 環境名 (development, staging, production)
        environment: Option<String>,
        /// 環境名 (-e/--env フラグ、SHIPFLOW_ENV 環境変数)
        #[arg(
            short = 'e',
            long = "env",
            env = "SHIPFLOW_ENV",
            conflicts_with = "environment",
            hide = true
        )]
        env_flag: Option<String>,
        /// 対象コンポーネント (desktop, mobile, backend, firebase-config, all)
        #[arg(short = 'c', long, default_value = "all")]
        component: String,
        /// 前提条件チェックまでで停止し、計画のみ表示
        #[arg(long)]
        dry_run: bool,
        /// デプロイ後、一定時間検証をポーリング
        #[arg(long)]
        monitor: bool,
        /// 失敗があっても終了コード0で終了
        #[arg(short, long)]
        force: bool,
        /// キャッシュバスト処理をスキップ
        #[arg(long)]
        no_cache_bust: bool,
        /// Firebaseプロジェクトを上書き指定
        #[arg(long)]
        project: Option<String>,
        /// 外部呼び出しのタイムアウト（秒）
        #[arg(long)]
        timeout: Option<u64>,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// デプロイ済み環境の検証のみ実行
    Verify {
        /// 環境名 (development, staging, production)
        environment: Option<String>,
        /// 環境名 (-e/--env フラグ、SHIPFLOW_ENV 環境変数)
        #[arg(
            short = 'e',
            long = "env",
            env = "SHIPFLOW_ENV",
            conflicts_with = "environment",
            hide = true
        )]
        env_flag: Option<String>,
        /// 対象コンポーネント
        #[arg(short = 'c', long, default_value = "all")]
        component: String,
    },
    /// デプロイ履歴を管理
    #[command(subcommand)]
    History(HistoryCommands),
    /// 直前の正常なデプロイへロールバック
    Rollback {
        /// 環境名 (development, staging, production)
        environment: Option<String>,
        /// 環境名 (-e/--env フラグ、SHIPFLOW_ENV 環境変数)
        #[arg(
            short = 'e',
            long = "env",
            env = "SHIPFLOW_ENV",
            conflicts_with = "environment",
            hide = true
        )]
        env_flag: Option<String>,
        /// 対象コンポーネント
        #[arg(short = 'c', long)]
        component: String,
        /// 候補の一覧を表示するだけで実行しない
        #[arg(long)]
        list: bool,
        /// 緊急モード（再検証をスキップ）
        #[arg(long)]
        emergency: bool,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 設定ファイルを検証
    Validate,
    /// バージョン情報を表示
    Version,
}

/// デプロイ履歴のサブコマンド
#[derive(Subcommand)]
enum HistoryCommands {
    /// 履歴を一覧表示
    List {
        /// 環境名でフィルタ
        environment: Option<String>,
        /// コンポーネントでフィルタ
        #[arg(short = 'c', long)]
        component: Option<String>,
        /// 表示する最大件数
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// 成功率・所要時間の統計を表示
    Stats {
        /// 環境名でフィルタ
        environment: Option<String>,
        /// コンポーネントでフィルタ
        #[arg(short = 'c', long)]
        component: Option<String>,
        /// 集計対象の日数
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// 古い履歴を削除
    Cleanup {
        /// 保持する日数
        #[arg(long, default_value = "90")]
        days: i64,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログレベル: --verbose で debug、--quiet で error
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("shipflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // 設定は実行ごとに1回だけ読み込み、以後は参照渡し
    let config = match shipflow_core::load_config(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    // コマンドディスパッチ
    match cli.command {
        Commands::Deploy {
            environment,
            env_flag,
            component,
            dry_run,
            monitor,
            force,
            no_cache_bust,
            project,
            timeout,
            yes,
        } => {
            let environment = environment.or(env_flag);
            let success = commands::deploy::handle(
                &config,
                commands::deploy::DeployArgs {
                    environment,
                    component,
                    dry_run,
                    monitor,
                    force,
                    no_cache_bust,
                    project,
                    timeout,
                    yes,
                },
            )
            .await?;

            if !success && !force {
                std::process::exit(1);
            }
        }
        Commands::Verify {
            environment,
            env_flag,
            component,
        } => {
            let environment = environment.or(env_flag);
            let success = commands::verify::handle(&config, environment, component).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::History(history_cmd) => match history_cmd {
            HistoryCommands::List {
                environment,
                component,
                limit,
            } => {
                commands::history::handle_list(environment, component, limit).await?;
            }
            HistoryCommands::Stats {
                environment,
                component,
                days,
            } => {
                commands::history::handle_stats(environment, component, days).await?;
            }
            HistoryCommands::Cleanup { days, yes } => {
                commands::history::handle_cleanup(days, yes).await?;
            }
        },
        Commands::Rollback {
            environment,
            env_flag,
            component,
            list,
            emergency,
            yes,
        } => {
            let environment = environment.or(env_flag);
            let success = commands::rollback::handle(
                &config,
                environment,
                component,
                list,
                emergency,
                yes,
            )
            .await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Validate => {
            commands::validate::handle(&config)?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
