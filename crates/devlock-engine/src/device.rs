//! # Device State Controller
//!
//! Handles lock, unlock, and clear requests. Before a kiosk identity exists
//! (`UNPROVISIONED`) a request only moves an in-memory pseudo state. From
//! `KIOSK_PROVISIONED` on it moves the persisted device state and enforces
//! policy. The first lock or unlock after kiosk setup also completes
//! provisioning with `SUCCESS`.

use std::future::Future;
use std::sync::Arc;

use devlock_core::{DeviceConfig, DeviceState, ProvisionEvent, ProvisionState};
use devlock_state::{plan_device_request, DevicePlan, DeviceRequest};
use parking_lot::RwLock;

use crate::error::EngineError;
use crate::finalization::FinalizationController;
use crate::guard::SequentialGuard;
use crate::policy::DevicePolicyController;
use crate::provision::ProvisionStateController;
use crate::store::StateStore;

#[derive(Clone)]
pub struct DeviceStateController {
    inner: Arc<Inner>,
}

struct Inner {
    provision: ProvisionStateController,
    policy: DevicePolicyController,
    finalization: FinalizationController,
    store: Arc<dyn StateStore>,
    pseudo: RwLock<DeviceState>,
    config: DeviceConfig,
    requests: SequentialGuard<()>,
}

impl std::fmt::Debug for DeviceStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStateController")
            .field("pseudo", &*self.inner.pseudo.read())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DeviceStateController {
    pub fn new(
        provision: ProvisionStateController,
        policy: DevicePolicyController,
        finalization: FinalizationController,
        store: Arc<dyn StateStore>,
        config: DeviceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provision,
                policy,
                finalization,
                store,
                pseudo: RwLock::new(DeviceState::Undefined),
                config,
                requests: SequentialGuard::new(()),
            }),
        }
    }

    pub fn lock_device(
        &self,
    ) -> impl Future<Output = Result<DeviceState, EngineError>> + Send + 'static {
        self.submit(DeviceRequest::Lock)
    }

    pub fn unlock_device(
        &self,
    ) -> impl Future<Output = Result<DeviceState, EngineError>> + Send + 'static {
        self.submit(DeviceRequest::Unlock)
    }

    pub fn clear_device(
        &self,
    ) -> impl Future<Output = Result<DeviceState, EngineError>> + Send + 'static {
        self.submit(DeviceRequest::Clear)
    }

    /// The persisted device state.
    pub async fn get_device_state(&self) -> Result<DeviceState, EngineError> {
        Ok(self.inner.store.device_state().await?)
    }

    /// The in-memory state requests move while unprovisioned.
    pub fn pseudo_state(&self) -> DeviceState {
        *self.inner.pseudo.read()
    }

    /// Whether the device is locked, reading the pseudo state while
    /// unprovisioned.
    pub async fn is_locked(&self) -> Result<bool, EngineError> {
        Ok(self.inner.effective_state().await?.1 == DeviceState::Locked)
    }

    fn submit(
        &self,
        request: DeviceRequest,
    ) -> impl Future<Output = Result<DeviceState, EngineError>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.requests.submit(move |()| async move {
            let state = inner.handle(request).await?;
            Ok(((), state))
        })
    }
}

impl Inner {
    async fn effective_state(&self) -> Result<(ProvisionState, DeviceState), EngineError> {
        let provision = self.provision.get_state().await?;
        let effective = if provision == ProvisionState::Unprovisioned {
            *self.pseudo.read()
        } else {
            self.store.device_state().await?
        };
        Ok((provision, effective))
    }

    async fn handle(&self, request: DeviceRequest) -> Result<DeviceState, EngineError> {
        let (provision, effective) = self.effective_state().await?;
        let plan = plan_device_request(
            provision,
            effective,
            request,
            self.config.allow_clear_when_unprovisioned,
        )
        .map_err(|e| {
            tracing::warn!(%request, provision_state = %provision, error = %e, "device request rejected");
            e
        })?;

        match plan {
            DevicePlan::Pseudo(target) => {
                *self.pseudo.write() = target;
                tracing::info!(%request, device_state = %target, "pseudo device state updated");
                Ok(target)
            }
            DevicePlan::Persist(target) => {
                self.store.set_device_state(target).await?;
                tracing::info!(%request, previous = %effective, device_state = %target, "device state persisted");
                self.policy.enforce_current_policies().await?;

                if request != DeviceRequest::Clear && provision == ProvisionState::KioskProvisioned {
                    self.provision
                        .set_next_state_for_event(ProvisionEvent::Success)
                        .await?;
                }
                if target == DeviceState::Cleared {
                    self.finalization.notify_restrictions_cleared().await?;
                }
                Ok(target)
            }
        }
    }
}
