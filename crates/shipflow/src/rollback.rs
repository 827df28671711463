//! ロールバック制御
//!
//! 状態機械: Idle → CandidateLookup → (候補なし: Abort | 候補あり:
//! Redeploying) → Verifying → (成功: MarkRollback,Done | 失敗:
//! ReportFailure,Done)。候補なしは正常系の終端で、ロールバックの失敗が
//! さらなる自動ロールバックを誘発することはありません。

use colored::Colorize;
use shipflow_core::{Component, DeployConfig, Environment};
use shipflow_deploy::hosting::HostingCli;
use shipflow_tracker::{DeploymentRecord, HistoryTracker};
use shipflow_verify::{run_battery, BatteryParams};
use std::time::Duration;
use tracing::{debug, info};

/// 状態機械の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RollbackState {
    Idle,
    CandidateLookup,
    Redeploying,
    Verifying,
    Done,
}

impl std::fmt::Display for RollbackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RollbackState::Idle => "idle",
            RollbackState::CandidateLookup => "candidate-lookup",
            RollbackState::Redeploying => "redeploying",
            RollbackState::Verifying => "verifying",
            RollbackState::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// ロールバックの終端結果
#[derive(Debug)]
pub enum RollbackOutcome {
    /// 戻り先がない（正常系: 「ロールバック先がありません」）
    NoCandidate,
    /// 成功。fromからtoへ巻き戻した
    Success {
        from: DeploymentRecord,
        to: DeploymentRecord,
    },
    /// 再デプロイに失敗
    RedeployFailed(String),
    /// 再検証に失敗（失敗したロールバックをさらに巻き戻すことはしない）
    VerificationFailed(String),
}

impl RollbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RollbackOutcome::Success { .. } | RollbackOutcome::NoCandidate
        )
    }
}

/// ロールバックの実行器
pub struct RollbackManager<'a> {
    config: &'a DeployConfig,
    component: Component,
    environment: Environment,
    /// 緊急モード: 再検証をスキップ
    emergency: bool,
}

impl<'a> RollbackManager<'a> {
    pub fn new(
        config: &'a DeployConfig,
        component: Component,
        environment: Environment,
        emergency: bool,
    ) -> Self {
        Self {
            config,
            component,
            environment,
            emergency,
        }
    }

    /// 状態機械を実行
    pub async fn run(&self, tracker: &HistoryTracker) -> anyhow::Result<RollbackOutcome> {
        let mut state = RollbackState::Idle;
        let mut candidate: Option<DeploymentRecord> = None;
        let mut current_live: Option<DeploymentRecord> = None;

        loop {
            debug!(state = %state, "ロールバック状態遷移");
            match state {
                RollbackState::Idle => {
                    state = RollbackState::CandidateLookup;
                }

                RollbackState::CandidateLookup => {
                    current_live = tracker
                        .get_latest_deployment(self.component, self.environment)
                        .await?;
                    candidate = tracker
                        .get_rollback_candidate(self.component, self.environment)
                        .await?;

                    match &candidate {
                        None => {
                            // 正常系の終端: エラーではない
                            println!(
                                "{}",
                                "ロールバック先がありません（成功したデプロイが2件未満）".yellow()
                            );
                            return Ok(RollbackOutcome::NoCandidate);
                        }
                        Some(record) => {
                            println!(
                                "ロールバック候補: {} ({})",
                                record
                                    .deployment_id
                                    .as_deref()
                                    .unwrap_or(&record.id)
                                    .cyan(),
                                record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                            );
                            state = RollbackState::Redeploying;
                        }
                    }
                }

                RollbackState::Redeploying => {
                    let record = candidate.as_ref().expect("checked in CandidateLookup");
                    println!("{}", "記録されたリリースを再デプロイ中...".blue());

                    if let Err(e) = self.redeploy(record).await {
                        return Ok(RollbackOutcome::RedeployFailed(e.to_string()));
                    }
                    state = RollbackState::Verifying;
                }

                RollbackState::Verifying => {
                    if self.emergency {
                        println!(
                            "{}",
                            "⚠ 緊急モード: 再検証をスキップします".yellow().bold()
                        );
                        state = RollbackState::Done;
                        continue;
                    }

                    let record = candidate.as_ref().expect("checked in CandidateLookup");
                    println!("{}", "巻き戻したデプロイを再検証中...".blue());

                    let verification = run_battery(BatteryParams {
                        component: self.component,
                        environment: self.environment,
                        base_url: record
                            .url
                            .clone()
                            .or_else(|| self.config.component_url(self.component, self.environment)),
                        health: self.config.health_check(self.component).ok(),
                        rules: if self.component.is_client() {
                            self.config.verification.as_ref()
                        } else {
                            None
                        },
                    })
                    .await;

                    if !verification.success {
                        let failed: Vec<String> = verification
                            .failed_checks()
                            .iter()
                            .map(|c| c.name.clone())
                            .collect();
                        // 失敗したロールバックはこれ以上巻き戻さず報告のみ
                        return Ok(RollbackOutcome::VerificationFailed(failed.join(", ")));
                    }
                    state = RollbackState::Done;
                }

                RollbackState::Done => {
                    let to = candidate.take().expect("checked in CandidateLookup");
                    let from = match current_live.take() {
                        Some(record) => record,
                        None => {
                            // 現行liveの記録がない場合はmarkの対象がない
                            info!("現行デプロイの記録がないため rolledBackTo は記録しません");
                            return Ok(RollbackOutcome::Success { from: to.clone(), to });
                        }
                    };

                    tracker.mark_rollback(&from.id, &to.id).await?;
                    return Ok(RollbackOutcome::Success { from, to });
                }
            }
        }
    }

    /// 候補の記録されたアーティファクト参照で再デプロイ
    ///
    /// ホスティング系コンポーネントは記録されたリリースIDをそのまま
    /// 再アクティベート。リリースIDで巻き戻せないコンポーネントは
    /// 同じデプロイ経路を再実行する。
    async fn redeploy(&self, record: &DeploymentRecord) -> anyhow::Result<()> {
        let project = self.config.project(self.component)?;
        let cli = HostingCli::new(project.project_id.clone());
        let timeout = Duration::from_secs(self.config.deployment.timeout_secs);

        match self.component {
            Component::Desktop | Component::Mobile => {
                let deployment_id = record.deployment_id.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("記録にリリースIDがないため巻き戻せません: {}", record.id)
                })?;
                cli.rollback_release(project.site.as_deref(), deployment_id, timeout)
                    .await?;
            }
            Component::Backend => {
                cli.deploy_only(
                    &["functions"],
                    project.source_dir.as_deref(),
                    timeout,
                )
                .await?;
            }
            Component::FirebaseConfig => {
                cli.deploy_only(
                    &["firestore", "storage"],
                    project.source_dir.as_deref(),
                    timeout,
                )
                .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipflow_core::DeploymentResult;
    use shipflow_tracker::RecordMetadata;
    use tempfile::tempdir;

    fn config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "projects": {
                "backend": { "projectId": "myapp" }
            },
            "environments": {
                "production": { "backendUrl": "https://api.example.com" }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_candidate_is_normal_terminal_state() {
        let temp_dir = tempdir().unwrap();
        let tracker = HistoryTracker::with_dir(temp_dir.path());
        let config = config();

        let manager = RollbackManager::new(
            &config,
            Component::Backend,
            Environment::Production,
            false,
        );
        let outcome = manager.run(&tracker).await.unwrap();

        assert!(matches!(outcome, RollbackOutcome::NoCandidate));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_single_success_still_no_candidate() {
        let temp_dir = tempdir().unwrap();
        let tracker = HistoryTracker::with_dir(temp_dir.path());
        let config = config();

        tracker
            .record_deployment(
                &DeploymentResult::success(
                    Component::Backend,
                    Environment::Production,
                    Some("dep-1".to_string()),
                    None,
                    100,
                ),
                RecordMetadata::default(),
            )
            .await
            .unwrap();

        let manager = RollbackManager::new(
            &config,
            Component::Backend,
            Environment::Production,
            false,
        );
        let outcome = manager.run(&tracker).await.unwrap();
        assert!(matches!(outcome, RollbackOutcome::NoCandidate));
    }
}
