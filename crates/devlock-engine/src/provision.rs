//! # Provision State Controller
//!
//! Owns the provisioning state machine. Every transition is one job on the
//! policy controller's guard, the same [`SequentialGuard`] that owns the
//! enforced lock task mode. Racing events are applied in submission order,
//! each is evaluated against the state the previous one left behind, and no
//! other enforcement can run between a transition moving the cursor and
//! that transition's own enforcement finishing.
//!
//! ## Transition protocol
//!
//! 1. Read the cursor (`previous`).
//! 2. Compute `next` from the transition table. An illegal event fails the
//!    job and the cursor stays at `previous`.
//! 3. Persist `next` and run its state-entry side effects.
//! 4. Move the cursor to `next` and enforce policy for the new pair.
//! 5. If enforcement fails, move the cursor back to `previous`, run the
//!    critical-failure path, and return the enforcement error. The
//!    persisted value keeps `next`.
//!
//! The cursor is the in-memory provision state every enforcement decision
//! reads. It is loaded from the store once and written only from inside a
//! transition job.
//!
//! [`SequentialGuard`]: crate::guard::SequentialGuard

use std::future::Future;
use std::sync::Arc;

use devlock_core::{
    LockTaskType, ProvisionEvent, ProvisionState, RecoveryConfig, StorageError, Timestamp,
};
use devlock_state::next_state_for_event;
use parking_lot::RwLock;
use tokio::sync::OnceCell;

use crate::error::EngineError;
use crate::platform::DevicePlatform;
use crate::policy::{DevicePolicyController, PolicySession};
use crate::recovery::{RecoveryActions, RecoveryAlarm};
use crate::store::StateStore;

// ─── Cursor ──────────────────────────────────────────────────────────

/// Lazily loaded, shared view of the provision state used for enforcement.
#[derive(Clone)]
pub struct ProvisionCursor {
    inner: Arc<CursorInner>,
}

struct CursorInner {
    store: Arc<dyn StateStore>,
    cell: OnceCell<RwLock<ProvisionState>>,
}

impl std::fmt::Debug for ProvisionCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionCursor")
            .field("loaded", &self.inner.cell.get().map(|s| *s.read()))
            .finish()
    }
}

impl ProvisionCursor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Arc::new(CursorInner {
                store,
                cell: OnceCell::new(),
            }),
        }
    }

    async fn slot(&self) -> Result<&RwLock<ProvisionState>, StorageError> {
        self.inner
            .cell
            .get_or_try_init(|| async {
                let loaded = self.inner.store.provision_state().await?;
                tracing::debug!(provision_state = %loaded, "provision state loaded");
                Ok::<_, StorageError>(RwLock::new(loaded))
            })
            .await
    }

    pub async fn get(&self) -> Result<ProvisionState, StorageError> {
        Ok(*self.slot().await?.read())
    }

    pub(crate) async fn set(&self, state: ProvisionState) -> Result<(), StorageError> {
        *self.slot().await?.write() = state;
        Ok(())
    }
}

// ─── Controller ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProvisionStateController {
    inner: Arc<Inner>,
}

struct Inner {
    cursor: ProvisionCursor,
    store: Arc<dyn StateStore>,
    platform: Arc<dyn DevicePlatform>,
    recovery: Arc<dyn RecoveryActions>,
    policy: DevicePolicyController,
    config: RecoveryConfig,
}

impl std::fmt::Debug for ProvisionStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionStateController")
            .field("cursor", &self.inner.cursor)
            .finish_non_exhaustive()
    }
}

impl ProvisionStateController {
    pub fn new(
        cursor: ProvisionCursor,
        store: Arc<dyn StateStore>,
        platform: Arc<dyn DevicePlatform>,
        recovery: Arc<dyn RecoveryActions>,
        policy: DevicePolicyController,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cursor,
                store,
                platform,
                recovery,
                policy,
                config,
            }),
        }
    }

    /// The provision state enforcement currently acts on.
    pub async fn get_state(&self) -> Result<ProvisionState, EngineError> {
        Ok(self.inner.cursor.get().await?)
    }

    /// Apply `event`. The transition is queued before this returns, so two
    /// calls made in sequence are applied in that order even if their
    /// futures are awaited concurrently.
    pub fn set_next_state_for_event(
        &self,
        event: ProvisionEvent,
    ) -> impl Future<Output = Result<ProvisionState, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner
            .policy
            .exclusive(move |session, mut enforced| async move {
                let result = inner.apply_event(&session, &mut enforced, event).await;
                (enforced, result)
            })
    }

    /// Raise `READY` once out-of-box setup is satisfied. Otherwise arm the
    /// setup-completion timeout and wait for a later callback.
    pub async fn notify_provisioning_ready(&self) -> Result<(), EngineError> {
        if self.inner.setup_satisfied().await? {
            self.set_next_state_for_event(ProvisionEvent::Ready).await?;
            return Ok(());
        }
        tracing::debug!("setup incomplete, provisioning deferred");
        self.inner
            .recovery
            .schedule_alarm(
                RecoveryAlarm::SetupCompletionTimeout,
                self.inner.config.setup_completion_timeout(),
            )
            .await?;
        Ok(())
    }

    /// The active user unlocked. The enforced mode may no longer be in
    /// effect, so it is invalidated before re-deriving.
    pub async fn on_user_unlocked(&self) -> Result<(), EngineError> {
        self.inner.policy.invalidate().await?;
        self.reconcile().await
    }

    pub async fn on_user_setup_completed(&self) -> Result<(), EngineError> {
        self.reconcile().await
    }

    /// The setup-completion timeout fired.
    pub async fn on_setup_completion_timeout(&self) -> Result<(), EngineError> {
        self.inner.store.set_setup_wizard_timed_out(true).await?;
        tracing::info!("setup completion timed out, treating setup as satisfied");
        self.reconcile().await
    }

    /// Auto-advance out of `UNPROVISIONED` when setup is satisfied and
    /// provisioning is ready; otherwise re-enforce current policy.
    pub async fn reconcile(&self) -> Result<(), EngineError> {
        let state = self.get_state().await?;
        if state == ProvisionState::Unprovisioned
            && self.inner.setup_satisfied().await?
            && self.inner.store.provisioning_ready().await?
        {
            self.set_next_state_for_event(ProvisionEvent::Ready).await?;
        } else {
            self.inner.policy.enforce_current_policies().await?;
        }
        Ok(())
    }
}

impl Inner {
    async fn setup_satisfied(&self) -> Result<bool, EngineError> {
        if self.platform.is_setup_complete().await {
            return Ok(true);
        }
        Ok(self.store.setup_wizard_timed_out().await?)
    }

    /// Run one transition. `enforced` is the cached lock task mode and is
    /// updated to whatever mode this transition's enforcement entered.
    async fn apply_event(
        &self,
        session: &PolicySession,
        enforced: &mut Option<LockTaskType>,
        event: ProvisionEvent,
    ) -> Result<ProvisionState, EngineError> {
        let previous = self.cursor.get().await?;
        let next = match next_state_for_event(previous, event) {
            Ok(next) => next,
            Err(e) => {
                metrics::counter!("devlock_transition_rejected_total", "event" => event.as_str())
                    .increment(1);
                tracing::warn!(state = %previous, %event, "illegal provision transition rejected");
                return Err(e.into());
            }
        };

        self.store.set_provision_state(next).await?;
        self.enter_state(event, next).await?;
        self.cursor.set(next).await?;
        metrics::counter!("devlock_provision_transitions_total", "event" => event.as_str())
            .increment(1);
        tracing::info!(%previous, %next, %event, "provision state advanced");

        match session.enforce().await {
            Ok(mode) => {
                *enforced = Some(mode);
                Ok(next)
            }
            Err(e) => {
                self.cursor.set(previous).await?;
                tracing::warn!(
                    %previous,
                    attempted = %next,
                    error = %e,
                    "policy enforcement failed, provision cursor rolled back"
                );
                *enforced = Some(session.enforce_for_critical_failure(&e.to_string()).await?);
                Err(e)
            }
        }
    }

    async fn enter_state(
        &self,
        event: ProvisionEvent,
        next: ProvisionState,
    ) -> Result<(), EngineError> {
        if event == ProvisionEvent::Ready {
            self.store
                .set_provisioning_start_time(Timestamp::now())
                .await?;
        }
        if next == ProvisionState::ProvisionInProgress {
            self.platform.enable_setup_component().await?;
        }
        if event == ProvisionEvent::Success {
            self.platform.notify_provision_succeeded().await?;
        }
        Ok(())
    }
}
