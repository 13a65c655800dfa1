//! # Capability Fan-out
//!
//! Every enforcement resolves one [`PolicyStep`] and issues it to all
//! registered capabilities at once, each on its own task. The step
//! succeeds only if every capability resolves to `Ok(true)`.

use std::sync::Arc;

use devlock_core::{DeviceState, ProvisionState};
use devlock_state::{resolve_policy_step, PolicyStep};
use futures::future::join_all;

use crate::capability::{apply_step, PolicyCapability};
use crate::error::{CapabilityFailure, FailureKind, PolicyError};

/// The registered capability set.
#[derive(Clone, Default)]
pub struct PolicyFanout {
    capabilities: Vec<Arc<dyn PolicyCapability>>,
}

impl std::fmt::Debug for PolicyFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFanout")
            .field(
                "capabilities",
                &self.capabilities.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PolicyFanout {
    pub fn new(capabilities: Vec<Arc<dyn PolicyCapability>>) -> Self {
        Self { capabilities }
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Resolve the step for `(provision, device)` and apply it everywhere.
    ///
    /// Returns the step that was applied.
    pub async fn enforce(
        &self,
        provision: ProvisionState,
        device: DeviceState,
    ) -> Result<PolicyStep, PolicyError> {
        let step = resolve_policy_step(provision, device);
        if step == PolicyStep::Idle || self.capabilities.is_empty() {
            tracing::debug!(%provision, %device, %step, "no capability callbacks to issue");
            return Ok(step);
        }

        let handles = self.capabilities.iter().map(|capability| {
            let capability = Arc::clone(capability);
            tokio::spawn(async move { apply_step(capability.as_ref(), step).await })
        });
        let results = join_all(handles).await;

        let failures: Vec<CapabilityFailure> = self
            .capabilities
            .iter()
            .zip(results)
            .filter_map(|(capability, joined)| {
                let kind = match joined {
                    Ok(Ok(true)) => return None,
                    Ok(Ok(false)) => FailureKind::ReturnedFalse,
                    Ok(Err(e)) => FailureKind::Rejected(e.message),
                    Err(join_err) => FailureKind::Aborted(join_err.to_string()),
                };
                tracing::warn!(
                    capability = capability.name(),
                    %step,
                    failure = %kind,
                    "policy capability failed"
                );
                Some(CapabilityFailure {
                    capability: capability.name().to_string(),
                    kind,
                })
            })
            .collect();

        if failures.is_empty() {
            tracing::debug!(%provision, %device, %step, count = self.len(), "policy step applied");
            Ok(step)
        } else {
            Err(PolicyError::EnforcementAggregate {
                provision_state: provision,
                device_state: device,
                step,
                failures,
            })
        }
    }
}
