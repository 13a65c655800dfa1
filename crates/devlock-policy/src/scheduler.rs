//! # Lock Task Activation Scheduler
//!
//! Enters a lock task mode as a single named unit of work, verifies the
//! mode took effect, and retries within a fixed budget.
//!
//! ## Lifecycle
//!
//! 1. **Pending**: work accepted, task not yet started.
//! 2. **Executing**: an attempt is in progress.
//! 3. **Completed**: the activator reports the requested mode is in effect.
//! 4. **Failed**: the retry budget ran out.
//! 5. **Cancelled**: replaced by work for a different mode, or deactivated.
//!
//! ## De-duplication
//!
//! At most one unit of work exists. Scheduling the mode that is already
//! pending or executing returns the existing work id. Scheduling a different
//! mode cancels the existing work first.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use devlock_core::{ActivationConfig, LockTaskType, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ActivationError;

/// Terminal reports retained for [`ActivationScheduler::wait_for`].
const REPORT_HISTORY: usize = 16;

// ─── Activator Contract ──────────────────────────────────────────────

/// Platform collaborator that pins and unpins lock task screens.
#[async_trait]
pub trait ModeActivator: Send + Sync {
    /// Attempt to enter `mode`.
    async fn enter(&self, mode: LockTaskType) -> Result<(), ActivationError>;

    /// The mode currently in effect, if any.
    async fn current_mode(&self) -> Option<LockTaskType>;

    /// Leave whatever mode is in effect.
    async fn exit(&self) -> Result<(), ActivationError>;
}

// ─── Status and Reports ──────────────────────────────────────────────

/// The lifecycle status of an activation work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl ActivationStatus {
    /// Return whether this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.metric_label())
    }
}

/// Progress of one activation work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub work_id: Uuid,
    pub mode: LockTaskType,
    pub status: ActivationStatus,
    /// Attempts started so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    pub updated_at: Timestamp,
}

impl ActivationReport {
    fn new(work_id: Uuid, mode: LockTaskType, status: ActivationStatus, attempts: u32) -> Self {
        Self {
            work_id,
            mode,
            status,
            attempts,
            last_error: None,
            updated_at: Timestamp::now(),
        }
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────

struct ActivationWork {
    work_id: Uuid,
    mode: LockTaskType,
    status: ActivationStatus,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    activator: Arc<dyn ModeActivator>,
    config: ActivationConfig,
    slot: Mutex<Option<ActivationWork>>,
    history: Mutex<VecDeque<ActivationReport>>,
    reports: watch::Sender<Option<ActivationReport>>,
}

impl Shared {
    /// Publish `report` if its work is still the current one and has not
    /// already finished. Must be called with the slot locked.
    fn publish_locked(&self, slot: &mut Option<ActivationWork>, report: ActivationReport) {
        match slot.as_mut() {
            Some(work) if work.work_id == report.work_id && !work.status.is_terminal() => {
                work.status = report.status
            }
            _ => return,
        }
        if report.status.is_terminal() {
            metrics::counter!(
                "devlock_mode_activation_total",
                "outcome" => report.status.metric_label()
            )
            .increment(1);
            let mut history = self.history.lock();
            if history.len() == REPORT_HISTORY {
                history.pop_front();
            }
            history.push_back(report.clone());
        }
        self.reports.send_replace(Some(report));
    }

    fn publish(&self, report: ActivationReport) {
        let mut slot = self.slot.lock();
        self.publish_locked(&mut slot, report);
    }

    /// Cancel the current work if it has not finished.
    fn cancel_locked(&self, slot: &mut Option<ActivationWork>) {
        let Some(work) = slot.as_mut() else {
            return;
        };
        if work.status.is_terminal() {
            return;
        }
        if let Some(handle) = work.handle.take() {
            handle.abort();
        }
        tracing::info!(work_id = %work.work_id, mode = %work.mode, "lock task activation cancelled");
        let report = ActivationReport::new(work.work_id, work.mode, ActivationStatus::Cancelled, 0);
        self.publish_locked(slot, report);
    }
}

/// Owns the single lock task activation work slot.
#[derive(Clone)]
pub struct ActivationScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ActivationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationScheduler")
            .field("config", &self.shared.config)
            .field("latest", &self.latest())
            .finish()
    }
}

impl ActivationScheduler {
    pub fn new(activator: Arc<dyn ModeActivator>, config: ActivationConfig) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                activator,
                config,
                slot: Mutex::new(None),
                history: Mutex::new(VecDeque::with_capacity(REPORT_HISTORY)),
                reports,
            }),
        }
    }

    /// Schedule activation of `mode`, returning the id of the work unit
    /// that will carry it out.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, mode: LockTaskType) -> Uuid {
        let mut slot = self.shared.slot.lock();
        if let Some(work) = slot.as_ref() {
            if work.mode == mode && !work.status.is_terminal() {
                tracing::debug!(work_id = %work.work_id, %mode, "lock task activation already scheduled");
                return work.work_id;
            }
        }
        self.shared.cancel_locked(&mut slot);

        let work_id = Uuid::new_v4();
        *slot = Some(ActivationWork {
            work_id,
            mode,
            status: ActivationStatus::Pending,
            handle: None,
        });
        self.shared.publish_locked(
            &mut slot,
            ActivationReport::new(work_id, mode, ActivationStatus::Pending, 0),
        );

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run_activation(shared, work_id, mode));
        if let Some(work) = slot.as_mut() {
            work.handle = Some(handle);
        }
        tracing::info!(%work_id, %mode, "lock task activation scheduled");
        work_id
    }

    /// Cancel pending work and leave any active mode.
    pub async fn deactivate(&self) -> Result<(), ActivationError> {
        {
            let mut slot = self.shared.slot.lock();
            self.shared.cancel_locked(&mut slot);
        }
        self.shared.activator.exit().await
    }

    /// The most recently published report.
    pub fn latest(&self) -> Option<ActivationReport> {
        self.shared.reports.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ActivationReport>> {
        self.shared.reports.subscribe()
    }

    /// Wait until `work_id` reaches a terminal status.
    pub async fn wait_for(&self, work_id: Uuid) -> ActivationReport {
        let mut rx = self.subscribe();
        loop {
            let finished = self
                .shared
                .history
                .lock()
                .iter()
                .rev()
                .find(|r| r.work_id == work_id)
                .cloned();
            if let Some(report) = finished {
                return report;
            }
            // The sender lives in `self.shared`, so the channel cannot close
            // while we hold `self`.
            let _ = rx.changed().await;
        }
    }
}

async fn run_activation(shared: Arc<Shared>, work_id: Uuid, mode: LockTaskType) {
    let max_attempts = shared.config.max_attempts.max(1);
    let mut last_error: Option<String> = None;

    for attempt in 1..=max_attempts {
        let mut report = ActivationReport::new(work_id, mode, ActivationStatus::Executing, attempt);
        report.last_error = last_error.clone();
        shared.publish(report);

        let failure = match shared.activator.enter(mode).await {
            Ok(()) => match shared.activator.current_mode().await {
                Some(observed) if observed == mode => {
                    tracing::info!(%work_id, %mode, attempt, "lock task mode in effect");
                    shared.publish(ActivationReport::new(
                        work_id,
                        mode,
                        ActivationStatus::Completed,
                        attempt,
                    ));
                    return;
                }
                observed => format!(
                    "mode {mode} not in effect after entry (observed {})",
                    observed.map_or("none", |m| m.as_str())
                ),
            },
            Err(e) => e.to_string(),
        };

        tracing::warn!(%work_id, %mode, attempt, error = %failure, "lock task activation attempt failed");
        last_error = Some(failure);
        if attempt < max_attempts {
            tokio::time::sleep(shared.config.retry_delay() * attempt).await;
        }
    }

    tracing::error!(%work_id, %mode, attempts = max_attempts, "lock task activation gave up");
    let mut report = ActivationReport::new(work_id, mode, ActivationStatus::Failed, max_attempts);
    report.last_error = last_error;
    shared.publish(report);
}
