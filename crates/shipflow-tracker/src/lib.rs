//! Deployment history tracking
//!
//! Append-only history of deployment attempts, persisted as a single JSON
//! document at a user-scoped location. Answers "latest successful
//! deployment" and "rollback candidate" queries and owns all reads and
//! writes of the store.

pub mod error;
pub mod model;
mod store;

pub use error::{Result, TrackerError};
pub use model::{DeploymentHistory, DeploymentRecord, DeploymentStatistics, RecordMetadata};
pub use store::{HistoryLock, HistoryTracker};
