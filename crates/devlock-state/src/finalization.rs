//! # Finalization Transitions
//!
//! ```text
//! UNFINALIZED ──RESTRICTIONS_CLEARED──▶ FINALIZED_UNREPORTED ──REPORT_ACKNOWLEDGED──▶ FINALIZED
//! ```
//!
//! Re-delivering `RESTRICTIONS_CLEARED` once cleared is a no-op rather than
//! an error, since the device controller notifies on every successful clear.

use devlock_core::{FinalizationEvent, FinalizationState, StateError};

/// Compute the next finalization state.
pub fn next_finalization_state(
    current: FinalizationState,
    event: FinalizationEvent,
) -> Result<FinalizationState, StateError> {
    use FinalizationEvent as E;
    use FinalizationState as S;

    match (current, event) {
        (S::Unfinalized, E::RestrictionsCleared) => Ok(S::FinalizedUnreported),
        (S::FinalizedUnreported | S::Finalized, E::RestrictionsCleared) => Ok(current),
        (S::FinalizedUnreported, E::ReportAcknowledged) => Ok(S::Finalized),
        (S::Unfinalized | S::Finalized, E::ReportAcknowledged) => {
            Err(StateError::IllegalFinalization {
                state: current,
                event,
            })
        }
    }
}
