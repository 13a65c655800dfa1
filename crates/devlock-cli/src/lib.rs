//! # devlock-cli: Device Lock Engine Command Line
//!
//! Drives a file-backed engine one command at a time, so the
//! provisioning and lock state machines can be exercised from a shell.
//!
//! ## Subcommands
//!
//! - `status`: current cursor, persisted document, expected mode
//! - `event <name>`: raise a provisioning event
//! - `lock` / `unlock` / `clear`: device requests
//! - `enforce`: re-enforce policy for the current pair
//! - `setup-complete` / `user-unlocked` / `ready`: lifecycle callbacks
//! - `alarm <kind>`: fire a recovery alarm
//!
//! ## Crate Policy
//!
//! - Argument parsing and stand-in collaborators live here; every state
//!   decision is delegated to `devlock-engine`.

pub mod commands;
pub mod standins;
