//! # Device Policy Controller
//!
//! Enforces policy for the current `(provision, device)` pair and keeps the
//! lock task mode that enforcement produced.
//!
//! ## Design
//!
//! The enforced mode is the chained value of this controller's
//! [`SequentialGuard`]. `None` means no enforcement has succeeded since the
//! controller started or since [`DevicePolicyController::invalidate`]; a read
//! in that state enforces first. A failed enforcement leaves the previous
//! mode in place.
//!
//! The provision side of the pair comes from the shared
//! [`ProvisionCursor`], the device side from the store. Provision
//! transitions run as jobs on the same guard (see
//! [`DevicePolicyController::exclusive`]), so an enforcement never observes
//! a cursor value whose own enforcement has not finished.

use std::future::Future;
use std::sync::Arc;

use devlock_core::{LockTaskType, RecoveryConfig};
use devlock_policy::{ActivationScheduler, PolicyFanout};
use devlock_state::resolve_lock_task_type;

use crate::error::EngineError;
use crate::guard::SequentialGuard;
use crate::platform::DevicePlatform;
use crate::provision::ProvisionCursor;
use crate::recovery::{RecoveryActions, RecoveryAlarm};
use crate::store::StateStore;

#[derive(Clone)]
pub struct DevicePolicyController {
    inner: Arc<Inner>,
}

struct Inner {
    cursor: ProvisionCursor,
    store: Arc<dyn StateStore>,
    fanout: PolicyFanout,
    activation: ActivationScheduler,
    platform: Arc<dyn DevicePlatform>,
    recovery: Arc<dyn RecoveryActions>,
    config: RecoveryConfig,
    enforced: SequentialGuard<Option<LockTaskType>>,
}

impl std::fmt::Debug for DevicePolicyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePolicyController")
            .field("fanout", &self.inner.fanout)
            .field("activation", &self.inner.activation)
            .finish_non_exhaustive()
    }
}

impl DevicePolicyController {
    pub fn new(
        cursor: ProvisionCursor,
        store: Arc<dyn StateStore>,
        fanout: PolicyFanout,
        activation: ActivationScheduler,
        platform: Arc<dyn DevicePlatform>,
        recovery: Arc<dyn RecoveryActions>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cursor,
                store,
                fanout,
                activation,
                platform,
                recovery,
                config,
                enforced: SequentialGuard::new(None),
            }),
        }
    }

    pub fn activation(&self) -> &ActivationScheduler {
        &self.inner.activation
    }

    /// Enforce the current pair and start its lock task mode.
    pub fn enforce_current_policies(
        &self,
    ) -> impl Future<Output = Result<LockTaskType, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.enforced.submit(move |_| async move {
            let mode = inner.enforce(false).await?;
            Ok((Some(mode), mode))
        })
    }

    /// Enforce with the mode forced to `CRITICAL_ERROR`, then schedule the
    /// mandatory reset and report `cause` upstream.
    ///
    /// If any step fails the process is escalated: a retry alarm is armed,
    /// the recovery collaborator is asked to terminate, and
    /// [`EngineError::CriticalEnforcement`] is returned.
    pub fn enforce_current_policies_for_critical_failure(
        &self,
        cause: String,
    ) -> impl Future<Output = Result<LockTaskType, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.enforced.submit(move |_| async move {
            let mode = inner.critical(&cause).await?;
            Ok((Some(mode), mode))
        })
    }

    /// The enforced mode, enforcing first if none is cached.
    pub fn get_current_lock_task_type(
        &self,
    ) -> impl Future<Output = Result<LockTaskType, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.enforced.submit(move |cached| async move {
            if let Some(mode) = cached {
                return Ok((cached, mode));
            }
            let mode = inner.enforce(false).await?;
            Ok((Some(mode), mode))
        })
    }

    /// Run `job` on the enforced-mode guard with exclusive use of the
    /// provision cursor. The job gets the cached mode and returns the mode to
    /// cache next alongside its result, so a failing job can still record the
    /// mode its recovery entered.
    pub(crate) fn exclusive<F, Fut, R>(
        &self,
        job: F,
    ) -> impl Future<Output = Result<R, EngineError>> + Send + 'static
    where
        F: FnOnce(PolicySession, Option<LockTaskType>) -> Fut + Send + 'static,
        Fut: Future<Output = (Option<LockTaskType>, Result<R, EngineError>)> + Send + 'static,
        R: Send + 'static,
    {
        let session = PolicySession {
            inner: Arc::clone(&self.inner),
        };
        let queued = self.inner.enforced.submit(move |cached| async move {
            let (mode, result) = job(session, cached).await;
            Ok::<_, EngineError>((mode, result))
        });
        async move { queued.await? }
    }

    /// Drop the cached mode so the next read re-enforces.
    pub fn invalidate(&self) -> impl Future<Output = Result<(), EngineError>> + Send + 'static {
        self.inner.enforced.submit(|_| async move {
            tracing::debug!("enforced lock task mode invalidated");
            Ok((None, ()))
        })
    }
}

/// Enforcement entry points for a job already running on the enforced-mode
/// guard. Calling these does not queue another job.
pub(crate) struct PolicySession {
    inner: Arc<Inner>,
}

impl PolicySession {
    pub(crate) async fn enforce(&self) -> Result<LockTaskType, EngineError> {
        self.inner.enforce(false).await
    }

    pub(crate) async fn enforce_for_critical_failure(
        &self,
        cause: &str,
    ) -> Result<LockTaskType, EngineError> {
        self.inner.critical(cause).await
    }
}

impl Inner {
    async fn enforce(&self, critical: bool) -> Result<LockTaskType, EngineError> {
        let provision = self.cursor.get().await?;
        let device = self.store.device_state().await?;

        let step = match self.fanout.enforce(provision, device).await {
            Ok(step) => {
                metrics::counter!("devlock_enforcement_total", "outcome" => "success").increment(1);
                step
            }
            Err(e) => {
                metrics::counter!("devlock_enforcement_total", "outcome" => "failure").increment(1);
                return Err(e.into());
            }
        };

        let mode = if critical {
            LockTaskType::CriticalError
        } else {
            resolve_lock_task_type(provision, device)
        };
        tracing::info!(
            provision_state = %provision,
            device_state = %device,
            %step,
            %mode,
            "policy enforced"
        );
        self.start_lock_task_if_needed(mode).await;
        Ok(mode)
    }

    async fn critical(&self, cause: &str) -> Result<LockTaskType, EngineError> {
        match self.enforce_critical(cause).await {
            Ok(mode) => Ok(mode),
            Err(e) => Err(self.escalate(cause, e).await),
        }
    }

    async fn enforce_critical(&self, cause: &str) -> Result<LockTaskType, EngineError> {
        let mode = self.enforce(true).await?;
        self.recovery.schedule_mandatory_reset(cause).await?;
        self.recovery.report_critical_failure(cause).await?;
        tracing::warn!(%mode, cause, "critical failure mode entered, reset scheduled");
        Ok(mode)
    }

    async fn escalate(&self, cause: &str, failure: EngineError) -> EngineError {
        let reason = format!("{cause}; critical path: {failure}");
        metrics::counter!("devlock_critical_failures_total").increment(1);
        tracing::error!(%reason, "critical enforcement failed, terminating");
        if let Err(e) = self
            .recovery
            .schedule_alarm(
                RecoveryAlarm::CriticalEnforcementRetry,
                self.config.critical_retry_delay(),
            )
            .await
        {
            tracing::error!(error = %e, "could not arm critical enforcement retry");
        }
        self.recovery.terminate(&reason).await;
        EngineError::CriticalEnforcement { reason }
    }

    async fn start_lock_task_if_needed(&self, mode: LockTaskType) {
        if !mode.is_active() {
            if let Err(e) = self.activation.deactivate().await {
                tracing::warn!(error = %e, "could not leave lock task mode");
            }
            return;
        }
        if !self.platform.is_user_unlocked().await {
            tracing::info!(%mode, "user locked, lock task activation deferred");
            return;
        }
        self.activation.schedule(mode);
    }
}
