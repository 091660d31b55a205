//! Orchestration of a whole validation run
//!
//! The runner turns a test profile into suites, pushes the profile's
//! initial configurations, and executes each suite on its own task while a
//! shared connection lock keeps the device conversation strictly serial.
//! The outcome is a `TestRun` report with a definite verdict for every
//! attempted case.

mod init;
mod run;
mod runner;
mod state;

pub use init::{apply_init_configs, InitConfigError};
pub use run::{LoadFailure, RunOptions, TestRun};
pub use runner::{build_suites, Runner, RunnerError};
pub use state::{InvalidTransition, RunState};
