//! Hand-written collaborators for the engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devlock_core::{EngineConfig, LockTaskType, StorageError};
use devlock_engine::{
    bootstrap, Collaborators, DeviceLockEngine, DevicePlatform, FinalizationReporter,
    InMemoryStore, PersistedState, PlatformError, RecoveryActions, RecoveryAlarm, RecoveryError,
    ReportError, StateChange, StateStore,
};
use devlock_policy::{
    ActivationError, ActivationReport, CapabilityError, ModeActivator, PolicyCapability,
};
use devlock_state::PolicyStep;
use parking_lot::Mutex;
use tokio::sync::Notify;

// ─── Capability ──────────────────────────────────────────────────────

/// Holds the next callback for `step` until released.
pub struct Gate {
    step: PolicyStep,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
pub struct ScriptedCapability {
    pub name: String,
    pub fail_on: Mutex<HashSet<PolicyStep>>,
    pub reject_on: Mutex<HashSet<PolicyStep>>,
    pub calls: Mutex<Vec<PolicyStep>>,
    pub gate: Mutex<Option<Gate>>,
}

impl ScriptedCapability {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_on(&self, step: PolicyStep) {
        self.fail_on.lock().insert(step);
    }

    pub fn reject_on(&self, step: PolicyStep) {
        self.reject_on.lock().insert(step);
    }

    pub fn heal(&self) {
        self.fail_on.lock().clear();
        self.reject_on.lock().clear();
    }

    pub fn calls(&self) -> Vec<PolicyStep> {
        self.calls.lock().clone()
    }

    /// Block the next `step` callback. Returns `(reached, release)`: the
    /// first is notified once the callback is waiting, the second lets it
    /// continue.
    pub fn hold(&self, step: PolicyStep) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some(Gate {
            step,
            reached: Arc::clone(&reached),
            release: Arc::clone(&release),
        });
        (reached, release)
    }

    async fn pass(&self, step: PolicyStep) -> Result<bool, CapabilityError> {
        let gate = {
            let mut gate = self.gate.lock();
            if gate.as_ref().is_some_and(|g| g.step == step) {
                gate.take()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }
        self.handle(step)
    }

    fn handle(&self, step: PolicyStep) -> Result<bool, CapabilityError> {
        self.calls.lock().push(step);
        if self.reject_on.lock().contains(&step) {
            return Err(CapabilityError::new(format!("{} refused {step}", self.name)));
        }
        Ok(!self.fail_on.lock().contains(&step))
    }
}

#[async_trait]
impl PolicyCapability for ScriptedCapability {
    fn name(&self) -> &str {
        &self.name
    }
    async fn on_unprovisioned(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::Unprovisioned).await
    }
    async fn on_provision_in_progress(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::ProvisionInProgress).await
    }
    async fn on_provisioned(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::Provisioned).await
    }
    async fn on_provision_paused(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::ProvisionPaused).await
    }
    async fn on_provision_failed(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::ProvisionFailed).await
    }
    async fn on_locked(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::Locked).await
    }
    async fn on_unlocked(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::Unlocked).await
    }
    async fn on_cleared(&self) -> Result<bool, CapabilityError> {
        self.pass(PolicyStep::Cleared).await
    }
}

// ─── Activator ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockActivator {
    pub current: Mutex<Option<LockTaskType>>,
    pub entered: Mutex<Vec<LockTaskType>>,
    pub exits: AtomicUsize,
}

#[async_trait]
impl ModeActivator for MockActivator {
    async fn enter(&self, mode: LockTaskType) -> Result<(), ActivationError> {
        self.entered.lock().push(mode);
        *self.current.lock() = Some(mode);
        Ok(())
    }

    async fn current_mode(&self) -> Option<LockTaskType> {
        *self.current.lock()
    }

    async fn exit(&self) -> Result<(), ActivationError> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = None;
        Ok(())
    }
}

// ─── Platform ────────────────────────────────────────────────────────

pub struct MockPlatform {
    pub setup_complete: AtomicBool,
    pub user_unlocked: AtomicBool,
    pub setup_component_enabled: AtomicUsize,
    pub provision_succeeded: AtomicUsize,
    pub fail_setup_component: AtomicBool,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            setup_complete: AtomicBool::new(true),
            user_unlocked: AtomicBool::new(true),
            setup_component_enabled: AtomicUsize::new(0),
            provision_succeeded: AtomicUsize::new(0),
            fail_setup_component: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DevicePlatform for MockPlatform {
    async fn is_setup_complete(&self) -> bool {
        self.setup_complete.load(Ordering::SeqCst)
    }

    async fn is_user_unlocked(&self) -> bool {
        self.user_unlocked.load(Ordering::SeqCst)
    }

    async fn enable_setup_component(&self) -> Result<(), PlatformError> {
        if self.fail_setup_component.load(Ordering::SeqCst) {
            return Err(PlatformError::new(
                "enable_setup_component",
                "package manager unavailable",
            ));
        }
        self.setup_component_enabled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_provision_succeeded(&self) -> Result<(), PlatformError> {
        self.provision_succeeded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─── Recovery ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRecovery {
    pub resets: Mutex<Vec<String>>,
    pub reports: Mutex<Vec<String>>,
    pub alarms: Mutex<Vec<(RecoveryAlarm, Duration)>>,
    pub terminations: Mutex<Vec<String>>,
    pub fail_reset: AtomicBool,
}

impl MockRecovery {
    pub fn alarms_of(&self, alarm: RecoveryAlarm) -> usize {
        self.alarms.lock().iter().filter(|(a, _)| *a == alarm).count()
    }
}

#[async_trait]
impl RecoveryActions for MockRecovery {
    async fn schedule_mandatory_reset(&self, reason: &str) -> Result<(), RecoveryError> {
        if self.fail_reset.load(Ordering::SeqCst) {
            return Err(RecoveryError::new("reset service unavailable"));
        }
        self.resets.lock().push(reason.to_string());
        Ok(())
    }

    async fn report_critical_failure(&self, reason: &str) -> Result<(), RecoveryError> {
        self.reports.lock().push(reason.to_string());
        Ok(())
    }

    async fn schedule_alarm(
        &self,
        alarm: RecoveryAlarm,
        delay: Duration,
    ) -> Result<(), RecoveryError> {
        self.alarms.lock().push((alarm, delay));
        Ok(())
    }

    async fn terminate(&self, reason: &str) {
        self.terminations.lock().push(reason.to_string());
    }
}

// ─── Reporter ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockReporter {
    pub fail: AtomicBool,
    pub attempts: AtomicUsize,
}

#[async_trait]
impl FinalizationReporter for MockReporter {
    async fn report_finalized(&self) -> Result<(), ReportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReportError::new("check-in service unreachable"));
        }
        Ok(())
    }
}

// ─── Store ───────────────────────────────────────────────────────────

/// In-memory store whose provision-state writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_provision_writes: AtomicBool,
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self) -> Result<PersistedState, StorageError> {
        self.inner.load().await
    }

    async fn write(&self, change: StateChange) -> Result<(), StorageError> {
        if matches!(change, StateChange::Provision(_))
            && self.fail_provision_writes.load(Ordering::SeqCst)
        {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.write(change).await
    }
}

// ─── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: DeviceLockEngine,
    pub store: Arc<dyn StateStore>,
    pub capabilities: Vec<Arc<ScriptedCapability>>,
    pub activator: Arc<MockActivator>,
    pub platform: Arc<MockPlatform>,
    pub recovery: Arc<MockRecovery>,
    pub reporter: Arc<MockReporter>,
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.activation.max_attempts = 3;
    config.activation.retry_delay_ms = 1;
    config
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(PersistedState::default())
    }

    pub fn with_state(doc: PersistedState) -> Self {
        Self::build(test_config(), Arc::new(InMemoryStore::with_state(doc)))
    }

    pub fn with_config(config: EngineConfig, doc: PersistedState) -> Self {
        Self::build(config, Arc::new(InMemoryStore::with_state(doc)))
    }

    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        Self::build(test_config(), store)
    }

    fn build(config: EngineConfig, store: Arc<dyn StateStore>) -> Self {
        let capabilities = vec![
            Arc::new(ScriptedCapability::named("restrictions")),
            Arc::new(ScriptedCapability::named("roles")),
            Arc::new(ScriptedCapability::named("keep-alive")),
        ];
        let activator = Arc::new(MockActivator::default());
        let platform = Arc::new(MockPlatform::default());
        let recovery = Arc::new(MockRecovery::default());
        let reporter = Arc::new(MockReporter::default());

        let engine = bootstrap(
            config,
            Collaborators {
                store: Arc::clone(&store),
                capabilities: capabilities
                    .iter()
                    .map(|c| Arc::clone(c) as Arc<dyn PolicyCapability>)
                    .collect(),
                activator: Arc::clone(&activator) as Arc<dyn ModeActivator>,
                platform: Arc::clone(&platform) as Arc<dyn DevicePlatform>,
                recovery: Arc::clone(&recovery) as Arc<dyn RecoveryActions>,
                reporter: Arc::clone(&reporter) as Arc<dyn FinalizationReporter>,
            },
        )
        .expect("test config is valid");

        Self {
            engine,
            store,
            capabilities,
            activator,
            platform,
            recovery,
            reporter,
        }
    }

    pub async fn doc(&self) -> PersistedState {
        self.store.load().await.expect("store readable")
    }

    /// The step every capability received, asserting they all agree.
    pub fn steps(&self) -> Vec<PolicyStep> {
        let first = self.capabilities[0].calls();
        for cap in &self.capabilities[1..] {
            assert_eq!(cap.calls(), first, "capabilities disagree");
        }
        first
    }

    pub fn clear_calls(&self) {
        for cap in &self.capabilities {
            cap.calls.lock().clear();
        }
    }

    /// Wait for the most recently scheduled activation to finish.
    pub async fn settle_activation(&self) -> Option<ActivationReport> {
        let scheduler = self.engine.policy().activation();
        let work_id = scheduler.latest()?.work_id;
        Some(
            tokio::time::timeout(Duration::from_secs(5), scheduler.wait_for(work_id))
                .await
                .expect("activation should settle"),
        )
    }
}
