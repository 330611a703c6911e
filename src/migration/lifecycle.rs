//! Migration lifecycle
//!
//! The only persisted state is two unix timestamps; zero means unset.
//!
//! ```text
//! Planned (approvedAt = 0) -> Approved (executedAt = 0) -> Executed
//! ```
//!
//! Everything here is pure. Connection resolution and execution dispatch
//! happen in the reconciler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("migration was already executed at {0}")]
    AlreadyExecuted(i64),

    #[error("migration has not been approved")]
    NotApproved,

    #[error("timestamp must be positive, got {0}")]
    InvalidTimestamp(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Planned,
    Approved,
    Executed,
}

/// What the reconciler should do on this observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Awaiting approval
    Wait,
    /// Approved and not yet executed: dispatch the statements
    Execute,
    /// Nothing left to do
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    #[serde(default)]
    pub approved_at: i64,
    #[serde(default)]
    pub executed_at: i64,
    /// Most recent execution failure; cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MigrationStatus {
    pub fn phase(&self) -> MigrationPhase {
        if self.executed_at > 0 {
            MigrationPhase::Executed
        } else if self.approved_at > 0 {
            MigrationPhase::Approved
        } else {
            MigrationPhase::Planned
        }
    }

    pub fn next_action(&self) -> LifecycleAction {
        match self.phase() {
            MigrationPhase::Planned => LifecycleAction::Wait,
            MigrationPhase::Approved => LifecycleAction::Execute,
            MigrationPhase::Executed => LifecycleAction::Done,
        }
    }

    /// Records approval. Approving twice keeps the first timestamp.
    pub fn approve(&mut self, now: i64) -> Result<i64, LifecycleError> {
        if now <= 0 {
            return Err(LifecycleError::InvalidTimestamp(now));
        }
        if self.executed_at > 0 {
            return Err(LifecycleError::AlreadyExecuted(self.executed_at));
        }
        if self.approved_at == 0 {
            self.approved_at = now;
        }
        Ok(self.approved_at)
    }

    /// Records a successful execution. The timestamp never precedes approval.
    pub fn record_executed(&mut self, now: i64) -> Result<i64, LifecycleError> {
        if now <= 0 {
            return Err(LifecycleError::InvalidTimestamp(now));
        }
        match self.phase() {
            MigrationPhase::Planned => Err(LifecycleError::NotApproved),
            MigrationPhase::Executed => Err(LifecycleError::AlreadyExecuted(self.executed_at)),
            MigrationPhase::Approved => {
                self.executed_at = now.max(self.approved_at);
                self.last_error = None;
                Ok(self.executed_at)
            }
        }
    }

    /// Records a failed execution. The migration stays approved so the next
    /// reconciliation dispatches it again. An executed migration keeps its
    /// outcome.
    pub fn record_failure(&mut self, error: impl Into<String>) -> Result<(), LifecycleError> {
        if self.executed_at > 0 {
            return Err(LifecycleError::AlreadyExecuted(self.executed_at));
        }
        self.last_error = Some(error.into());
        Ok(())
    }
}
