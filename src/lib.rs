//! opencode configuration sync engine.
//!
//! Reconciles the local opencode configuration, data and state directories
//! with a private git mirror: decides what moves in which direction,
//! re-applies machine-local overrides without committing them, serializes
//! runs with an advisory lock, and keeps authentication files in an optional
//! out-of-band secrets store.
//!
//! The public API is organised into layers:
//!
//! - **[`locations`]**, **[`config`]**: where things live and how the sync is configured
//! - **[`merge`]**, **[`plan`]**, **[`manifest`]**, **[`apply`]**: pure planning and file movement
//! - **[`lock`]**, **[`secrets`]**, **[`git`]**, **[`hosting`]**: side-effecting collaborators
//! - **[`sync`]**: the orchestrator driving every flow
//! - **[`commands`]**, **[`watch`]**: the command-line front end
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod apply;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod fs_util;
pub mod git;
pub mod host;
pub mod hosting;
pub mod locations;
pub mod lock;
pub mod logging;
pub mod manifest;
pub mod merge;
pub mod plan;
pub mod platform;
pub mod secrets;
pub mod sync;
pub mod watch;
