//! History store persistence and queries
//!
//! Manages the `deployment-history.json` file. The whole document is read
//! into memory, mutated, and written back per call; a deployment that ran
//! concurrently from another process is guarded against with an advisory
//! lock file (concurrent invocations are unsupported, the lock makes that
//! loud instead of silently losing updates).

use crate::error::{Result, TrackerError};
use crate::model::{DeploymentHistory, DeploymentRecord, DeploymentStatistics, RecordMetadata};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use shipflow_core::{Component, DeploymentResult, Environment};
use std::path::{Path, PathBuf};
use tokio::fs;

const HISTORY_FILE: &str = "deployment-history.json";
const HISTORY_BACKUP: &str = "deployment-history.json.backup";
const LOCK_FILE: &str = "history.lock.json";

/// Size-based retention: newest records kept per store
const MAX_RECORDS: usize = 100;

/// Time-based retention default, in days
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Reader/writer for the deployment history store
pub struct HistoryTracker {
    /// Directory holding the history file and its lock
    store_dir: PathBuf,
}

impl HistoryTracker {
    /// Tracker over the default user-scoped store location
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir().ok_or(TrackerError::DataDirNotFound)?;
        Ok(Self {
            store_dir: data_dir.join("shipflow"),
        })
    }

    /// Tracker over an explicit directory (tests, custom layouts)
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            store_dir: dir.as_ref().to_path_buf(),
        }
    }

    fn history_path(&self) -> PathBuf {
        self.store_dir.join(HISTORY_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.store_dir.join(HISTORY_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.store_dir.join(LOCK_FILE)
    }

    async fn ensure_store_dir(&self) -> Result<()> {
        if !self.store_dir.exists() {
            fs::create_dir_all(&self.store_dir).await?;
            tracing::debug!("Created history directory: {}", self.store_dir.display());
        }
        Ok(())
    }

    /// Load the current history
    pub async fn load(&self) -> Result<DeploymentHistory> {
        let path = self.history_path();
        if !path.exists() {
            tracing::debug!("History file not found, returning empty history");
            return Ok(DeploymentHistory::new());
        }

        let content = fs::read_to_string(&path).await?;
        let history: DeploymentHistory = serde_json::from_str(&content)?;

        tracing::debug!("Loaded history with {} records", history.deployments.len());
        Ok(history)
    }

    /// Save the history, keeping the previous file as a backup
    pub async fn save(&self, history: &DeploymentHistory) -> Result<()> {
        self.ensure_store_dir().await?;

        let path = self.history_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(history)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved history with {} records", history.deployments.len());
        Ok(())
    }

    /// Acquire the advisory lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<HistoryLock> {
        self.ensure_store_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Stale locks (older than 1 hour) are reclaimed
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(TrackerError::Locked {
                    holder: lock_info.holder,
                    since: lock_info.acquired_at,
                });
            }

            tracing::warn!("Removing stale history lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired history lock");
        Ok(HistoryLock {
            lock_path,
            released: false,
        })
    }

    /// Record one deployment attempt
    ///
    /// Computes the previous successful deployment for the same
    /// (component, environment) pair, prepends the new record, trims the
    /// store to the retention cap and persists.
    pub async fn record_deployment(
        &self,
        result: &DeploymentResult,
        mut metadata: RecordMetadata,
    ) -> Result<DeploymentRecord> {
        let lock = self.acquire_lock().await?;
        let mut history = self.load().await?;

        metadata.previous_deployment_id = history
            .deployments
            .iter()
            .find(|r| {
                r.success && r.component == result.component && r.environment == result.environment
            })
            .map(|r| r.id.clone());

        let record = DeploymentRecord::from_result(result, metadata);

        // Newest first; oldest dropped when over the cap
        history.deployments.insert(0, record.clone());
        history.deployments.truncate(MAX_RECORDS);
        history.last_updated = Utc::now();

        self.save(&history).await?;
        lock.release().await?;

        Ok(record)
    }

    /// Latest successful deployment for the pair
    pub async fn get_latest_deployment(
        &self,
        component: Component,
        environment: Environment,
    ) -> Result<Option<DeploymentRecord>> {
        let history = self.load().await?;
        Ok(history
            .deployments
            .into_iter()
            .find(|r| r.success && r.component == component && r.environment == environment))
    }

    /// Rollback candidate: the second most recent successful deployment
    ///
    /// The most recent one is assumed to be currently live, so it is not a
    /// useful rollback target. Returns `None` when fewer than two
    /// successful deployments exist for the pair.
    pub async fn get_rollback_candidate(
        &self,
        component: Component,
        environment: Environment,
    ) -> Result<Option<DeploymentRecord>> {
        let history = self.load().await?;
        Ok(history
            .deployments
            .into_iter()
            .filter(|r| r.success && r.component == component && r.environment == environment)
            .nth(1))
    }

    /// Stamp a record as rolled back
    ///
    /// Idempotent: a second call with the same arguments overwrites the
    /// fields with the same values.
    pub async fn mark_rollback(&self, from_id: &str, to_id: &str) -> Result<DeploymentRecord> {
        let lock = self.acquire_lock().await?;
        let mut history = self.load().await?;

        let record = history
            .deployments
            .iter_mut()
            .find(|r| r.id == from_id)
            .ok_or_else(|| TrackerError::RecordNotFound(from_id.to_string()))?;

        record.metadata.rolled_back_to = Some(to_id.to_string());
        record.metadata.rolled_back_at = Some(Utc::now());
        let updated = record.clone();

        history.last_updated = Utc::now();
        self.save(&history).await?;
        lock.release().await?;

        Ok(updated)
    }

    /// Aggregate statistics over the given recency window
    pub async fn get_statistics(
        &self,
        component: Option<Component>,
        environment: Option<Environment>,
        days: i64,
    ) -> Result<DeploymentStatistics> {
        let history = self.load().await?;
        let cutoff = Utc::now() - ChronoDuration::days(days);

        let records: Vec<&DeploymentRecord> = history
            .deployments
            .iter()
            .filter(|r| r.timestamp >= cutoff && r.matches(component, environment))
            .collect();

        let total = records.len();
        let successful = records.iter().filter(|r| r.success).count();
        let failed = total - successful;
        let average_duration_ms = if total > 0 {
            records.iter().map(|r| r.duration_ms).sum::<u64>() / total as u64
        } else {
            0
        };
        let success_rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };

        Ok(DeploymentStatistics {
            total,
            successful,
            failed,
            success_rate,
            average_duration_ms,
        })
    }

    /// Remove records older than the window, returning how many were removed
    pub async fn cleanup(&self, days_to_keep: i64) -> Result<usize> {
        let lock = self.acquire_lock().await?;
        let mut history = self.load().await?;

        let cutoff = Utc::now() - ChronoDuration::days(days_to_keep);
        let before = history.deployments.len();
        history.deployments.retain(|r| r.timestamp >= cutoff);
        let removed = before - history.deployments.len();

        if removed > 0 {
            history.last_updated = Utc::now();
            self.save(&history).await?;
        }
        lock.release().await?;

        tracing::debug!(removed, "History cleanup finished");
        Ok(removed)
    }

    /// Query records, newest first, with optional filters and limit
    pub async fn list(
        &self,
        component: Option<Component>,
        environment: Option<Environment>,
        limit: usize,
    ) -> Result<Vec<DeploymentRecord>> {
        let history = self.load().await?;
        Ok(history
            .deployments
            .into_iter()
            .filter(|r| r.matches(component, environment))
            .take(limit)
            .collect())
    }
}

/// Lock file contents
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the history lock
#[derive(Debug)]
pub struct HistoryLock {
    lock_path: PathBuf,
    released: bool,
}

impl HistoryLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
