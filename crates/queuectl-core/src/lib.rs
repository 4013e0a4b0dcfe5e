//! # queuectl-core
//!
//! Data model shared by every other `queuectl` crate: the [`Job`] record,
//! its [`JobState`] machine, [`Priority`], the runtime-tunable [`Config`]
//! singleton, and the [`ConfigError`] it reports on invalid input.
//!
//! This crate does no IO. It exists so that `queuectl-store`,
//! `queuectl-executor`, `queuectl-worker`, and `queuectl-cli` all agree on
//! one definition of a job instead of each re-deriving it.

mod config;
mod error;
mod job;

pub use config::{cli_key_to_field, Config};
pub use error::ConfigError;
pub use job::{Job, JobState, Priority};
