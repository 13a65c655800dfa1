//! # Provision Transition Table
//!
//! ```text
//! | Current               | Event   | Next                  |
//! |-----------------------|---------|-----------------------|
//! | UNPROVISIONED         | READY   | PROVISION_IN_PROGRESS |
//! | PROVISION_IN_PROGRESS | PAUSE   | PROVISION_PAUSED      |
//! | PROVISION_PAUSED      | RESUME  | PROVISION_IN_PROGRESS |
//! | PROVISION_IN_PROGRESS | KIOSK   | KIOSK_PROVISIONED     |
//! | PROVISION_IN_PROGRESS | FAILURE | PROVISION_FAILED      |
//! | PROVISION_FAILED      | RETRY   | PROVISION_IN_PROGRESS |
//! | KIOSK_PROVISIONED     | SUCCESS | PROVISION_SUCCEEDED   |
//! ```
//!
//! Any other pair is rejected. The table is exhaustive over the event, so
//! adding an event forces this match to be revisited.

use devlock_core::{ProvisionEvent, ProvisionState, StateError};

/// Compute the next provision state for `event` from `current`.
pub fn next_state_for_event(
    current: ProvisionState,
    event: ProvisionEvent,
) -> Result<ProvisionState, StateError> {
    use ProvisionEvent as E;
    use ProvisionState as S;

    let next = match (event, current) {
        (E::Ready, S::Unprovisioned) => S::ProvisionInProgress,
        (E::Pause, S::ProvisionInProgress) => S::ProvisionPaused,
        (E::Resume, S::ProvisionPaused) => S::ProvisionInProgress,
        (E::Kiosk, S::ProvisionInProgress) => S::KioskProvisioned,
        (E::Failure, S::ProvisionInProgress) => S::ProvisionFailed,
        (E::Retry, S::ProvisionFailed) => S::ProvisionInProgress,
        (E::Success, S::KioskProvisioned) => S::ProvisionSucceeded,
        (E::Ready | E::Pause | E::Resume | E::Kiosk | E::Failure | E::Retry | E::Success, _) => {
            return Err(StateError::IllegalTransition {
                state: current,
                event,
            });
        }
    };
    Ok(next)
}

/// Whether `event` is legal from `current`.
pub fn is_legal(current: ProvisionState, event: ProvisionEvent) -> bool {
    next_state_for_event(current, event).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGAL: &[(ProvisionState, ProvisionEvent, ProvisionState)] = &[
        (
            ProvisionState::Unprovisioned,
            ProvisionEvent::Ready,
            ProvisionState::ProvisionInProgress,
        ),
        (
            ProvisionState::ProvisionInProgress,
            ProvisionEvent::Pause,
            ProvisionState::ProvisionPaused,
        ),
        (
            ProvisionState::ProvisionPaused,
            ProvisionEvent::Resume,
            ProvisionState::ProvisionInProgress,
        ),
        (
            ProvisionState::ProvisionInProgress,
            ProvisionEvent::Kiosk,
            ProvisionState::KioskProvisioned,
        ),
        (
            ProvisionState::ProvisionInProgress,
            ProvisionEvent::Failure,
            ProvisionState::ProvisionFailed,
        ),
        (
            ProvisionState::ProvisionFailed,
            ProvisionEvent::Retry,
            ProvisionState::ProvisionInProgress,
        ),
        (
            ProvisionState::KioskProvisioned,
            ProvisionEvent::Success,
            ProvisionState::ProvisionSucceeded,
        ),
    ];

    fn expected(state: ProvisionState, event: ProvisionEvent) -> Option<ProvisionState> {
        LEGAL
            .iter()
            .find(|(s, e, _)| *s == state && *e == event)
            .map(|(_, _, next)| *next)
    }

    #[test]
    fn test_every_pair_matches_table() {
        for state in ProvisionState::ALL {
            for event in ProvisionEvent::ALL {
                let result = next_state_for_event(*state, *event);
                match expected(*state, *event) {
                    Some(next) => assert_eq!(result, Ok(next), "{state} --{event}-->"),
                    None => assert_eq!(
                        result,
                        Err(StateError::IllegalTransition {
                            state: *state,
                            event: *event,
                        }),
                        "{state} --{event}--> should be illegal"
                    ),
                }
            }
        }
    }

    #[test]
    fn test_exactly_seven_legal_pairs() {
        let legal = ProvisionState::ALL
            .iter()
            .flat_map(|s| ProvisionEvent::ALL.iter().map(move |e| (*s, *e)))
            .filter(|(s, e)| is_legal(*s, *e))
            .count();
        assert_eq!(legal, 7);
    }

    #[test]
    fn test_succeeded_is_a_sink() {
        for event in ProvisionEvent::ALL {
            assert!(!is_legal(ProvisionState::ProvisionSucceeded, *event));
        }
    }

    #[test]
    fn test_full_happy_path() {
        let mut state = ProvisionState::Unprovisioned;
        for event in [
            ProvisionEvent::Ready,
            ProvisionEvent::Pause,
            ProvisionEvent::Resume,
            ProvisionEvent::Failure,
            ProvisionEvent::Retry,
            ProvisionEvent::Kiosk,
            ProvisionEvent::Success,
        ] {
            state = next_state_for_event(state, event).unwrap();
        }
        assert_eq!(state, ProvisionState::ProvisionSucceeded);
    }

    #[test]
    fn test_error_message_names_state_and_event() {
        let err = next_state_for_event(ProvisionState::Unprovisioned, ProvisionEvent::Success)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SUCCESS"));
        assert!(msg.contains("UNPROVISIONED"));
    }
}
