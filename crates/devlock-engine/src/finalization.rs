//! # Finalization Controller
//!
//! After the device is cleared the program is finalized: the cleared state
//! is recorded locally, then reported to the check-in service. The report is
//! retried from a recovery alarm until acknowledged.
//!
//! Transitions run on the controller's own [`SequentialGuard`] with the
//! finalization state as the chained value (`None` until first loaded).

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use devlock_core::{FinalizationEvent, FinalizationState, RecoveryConfig};
use devlock_state::next_finalization_state;
use thiserror::Error;

use crate::error::EngineError;
use crate::guard::SequentialGuard;
use crate::recovery::{RecoveryActions, RecoveryAlarm};
use crate::store::StateStore;

/// The check-in service did not acknowledge the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("finalization report failed: {message}")]
pub struct ReportError {
    pub message: String,
}

impl ReportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait FinalizationReporter: Send + Sync {
    /// Tell the check-in service the program is finalized. `Ok` is the
    /// acknowledgement.
    async fn report_finalized(&self) -> Result<(), ReportError>;
}

#[derive(Clone)]
pub struct FinalizationController {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn StateStore>,
    reporter: Arc<dyn FinalizationReporter>,
    recovery: Arc<dyn RecoveryActions>,
    config: RecoveryConfig,
    chain: SequentialGuard<Option<FinalizationState>>,
}

impl std::fmt::Debug for FinalizationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizationController").finish_non_exhaustive()
    }
}

type Transition = Box<dyn FnOnce(FinalizationState) -> Result<FinalizationState, EngineError> + Send>;

impl FinalizationController {
    pub fn new(
        store: Arc<dyn StateStore>,
        reporter: Arc<dyn FinalizationReporter>,
        recovery: Arc<dyn RecoveryActions>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                reporter,
                recovery,
                config,
                chain: SequentialGuard::new(None),
            }),
        }
    }

    pub fn get_state(
        &self,
    ) -> impl Future<Output = Result<FinalizationState, EngineError>> + Send + 'static {
        self.run(Box::new(Ok::<_, EngineError>), false)
    }

    /// Record that restrictions were cleared and report upstream. Repeated
    /// notifications are no-ops once cleared.
    pub fn notify_restrictions_cleared(
        &self,
    ) -> impl Future<Output = Result<FinalizationState, EngineError>> + Send + 'static {
        self.run(
            Box::new(|current: FinalizationState| -> Result<_, EngineError> {
                Ok(next_finalization_state(
                    current,
                    FinalizationEvent::RestrictionsCleared,
                )?)
            }),
            true,
        )
    }

    /// Re-send a pending report. Does nothing unless the state is
    /// `FINALIZED_UNREPORTED`.
    pub fn retry_report(
        &self,
    ) -> impl Future<Output = Result<FinalizationState, EngineError>> + Send + 'static {
        self.run(Box::new(Ok::<_, EngineError>), true)
    }

    fn run(
        &self,
        transition: Transition,
        report: bool,
    ) -> impl Future<Output = Result<FinalizationState, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.chain.submit(move |cached| async move {
            let current = match cached {
                Some(state) => state,
                None => inner.store.finalization_state().await?,
            };
            let mut state = transition(current)?;
            if state != current {
                inner.store.set_finalization_state(state).await?;
                tracing::info!(previous = %current, next = %state, "finalization state advanced");
            }
            if report {
                state = inner.report_if_pending(state).await?;
            }
            Ok((Some(state), state))
        })
    }
}

impl Inner {
    async fn report_if_pending(
        &self,
        state: FinalizationState,
    ) -> Result<FinalizationState, EngineError> {
        if state != FinalizationState::FinalizedUnreported {
            return Ok(state);
        }
        match self.reporter.report_finalized().await {
            Ok(()) => {
                let next = next_finalization_state(state, FinalizationEvent::ReportAcknowledged)?;
                self.store.set_finalization_state(next).await?;
                tracing::info!("finalization acknowledged");
                Ok(next)
            }
            Err(e) => {
                tracing::warn!(error = %e, "finalization report failed, retry armed");
                self.recovery
                    .schedule_alarm(
                        RecoveryAlarm::FinalizationReportRetry,
                        self.config.finalization_retry_delay(),
                    )
                    .await?;
                Ok(state)
            }
        }
    }
}
