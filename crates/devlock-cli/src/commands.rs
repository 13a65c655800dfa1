//! # Subcommands
//!
//! Each subcommand maps to one engine entry point. After it runs, the CLI
//! waits for any lock task activation it scheduled and prints the engine
//! status as JSON on stdout.

use std::time::Duration;

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use devlock_core::ProvisionEvent;
use devlock_engine::{DeviceLockEngine, RecoveryAlarm};

/// Upper bound on waiting for a scheduled activation to settle.
const ACTIVATION_WAIT: Duration = Duration::from_secs(30);

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print provision, device, and finalization state.
    Status,
    /// Raise a provisioning event.
    Event {
        #[arg(value_enum)]
        event: EventArg,
    },
    /// Lock the device.
    Lock,
    /// Unlock the device.
    Unlock,
    /// Clear all restrictions and finalize.
    Clear,
    /// Re-enforce policy for the current state.
    Enforce,
    /// Out-of-box setup finished.
    SetupComplete,
    /// The active user unlocked the device.
    UserUnlocked,
    /// The check-in service allows provisioning.
    Ready,
    /// Fire a recovery alarm.
    Alarm {
        #[arg(value_enum)]
        alarm: AlarmArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventArg {
    Ready,
    Pause,
    Resume,
    Kiosk,
    Failure,
    Retry,
    Success,
}

impl From<EventArg> for ProvisionEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Ready => Self::Ready,
            EventArg::Pause => Self::Pause,
            EventArg::Resume => Self::Resume,
            EventArg::Kiosk => Self::Kiosk,
            EventArg::Failure => Self::Failure,
            EventArg::Retry => Self::Retry,
            EventArg::Success => Self::Success,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmArg {
    SetupTimeout,
    CriticalRetry,
    FinalizationRetry,
}

impl From<AlarmArg> for RecoveryAlarm {
    fn from(arg: AlarmArg) -> Self {
        match arg {
            AlarmArg::SetupTimeout => Self::SetupCompletionTimeout,
            AlarmArg::CriticalRetry => Self::CriticalEnforcementRetry,
            AlarmArg::FinalizationRetry => Self::FinalizationReportRetry,
        }
    }
}

/// Run `command` and return the status document to print.
pub async fn run(engine: &DeviceLockEngine, command: Command) -> anyhow::Result<serde_json::Value> {
    match command {
        Command::Status => {}
        Command::Event { event } => {
            let event = ProvisionEvent::from(event);
            engine
                .provision()
                .set_next_state_for_event(event)
                .await
                .with_context(|| format!("event {event} failed"))?;
        }
        Command::Lock => {
            engine.device().lock_device().await.context("lock failed")?;
        }
        Command::Unlock => {
            engine.device().unlock_device().await.context("unlock failed")?;
        }
        Command::Clear => {
            engine.device().clear_device().await.context("clear failed")?;
        }
        Command::Enforce => {
            let mode = engine
                .policy()
                .enforce_current_policies()
                .await
                .context("enforcement failed")?;
            tracing::info!(%mode, "policy enforced");
        }
        Command::SetupComplete => {
            engine.provision().on_user_setup_completed().await?;
        }
        Command::UserUnlocked => {
            engine.provision().on_user_unlocked().await?;
        }
        Command::Ready => {
            engine.on_provisioning_ready().await?;
        }
        Command::Alarm { alarm } => {
            engine.on_recovery_alarm(alarm.into()).await?;
        }
    }

    settle_activation(engine).await;
    let status = engine.status().await?;
    Ok(serde_json::to_value(status)?)
}

async fn settle_activation(engine: &DeviceLockEngine) {
    let scheduler = engine.policy().activation();
    let Some(latest) = scheduler.latest() else {
        return;
    };
    if latest.status.is_terminal() {
        return;
    }
    match tokio::time::timeout(ACTIVATION_WAIT, scheduler.wait_for(latest.work_id)).await {
        Ok(report) => tracing::debug!(status = %report.status, mode = %report.mode, "activation settled"),
        Err(_) => tracing::warn!(work_id = %latest.work_id, "activation still running, not waiting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_event_has_an_argument() {
        for &event in EventArg::value_variants() {
            let mapped = ProvisionEvent::from(event);
            assert!(ProvisionEvent::ALL.contains(&mapped));
        }
        assert_eq!(EventArg::value_variants().len(), ProvisionEvent::ALL.len());
    }

    #[test]
    fn test_every_alarm_has_an_argument() {
        let mapped: Vec<RecoveryAlarm> = AlarmArg::value_variants()
            .iter()
            .map(|&a| a.into())
            .collect();
        assert_eq!(mapped, RecoveryAlarm::ALL);
    }
}
