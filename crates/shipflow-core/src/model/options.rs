//! 実行オプション

use crate::model::{ComponentSelector, Environment};
use std::time::Duration;

/// 1回の実行に対するオプション（パース後は不変）
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    /// デプロイ先環境
    pub environment: Environment,

    /// 対象コンポーネント（単一 or 全部）
    pub component: ComponentSelector,

    /// 前提条件チェックまでで停止し、計画のみ表示
    pub dry_run: bool,

    /// デプロイ後、一定時間検証をポーリング
    pub monitor: bool,

    /// 失敗があっても終了コード0で終了
    pub force: bool,

    /// キャッシュバスト処理をスキップ
    pub skip_cache_bust: bool,

    /// Firebaseプロジェクトの上書き指定
    pub firebase_project: Option<String>,

    /// 外部呼び出しのタイムアウト上書き
    pub timeout: Option<Duration>,
}

impl DeploymentOptions {
    pub fn new(environment: Environment, component: ComponentSelector) -> Self {
        Self {
            environment,
            component,
            dry_run: false,
            monitor: false,
            force: false,
            skip_cache_bust: false,
            firebase_project: None,
            timeout: None,
        }
    }
}
