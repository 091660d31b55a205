//! Catalog of Test Classes
//!
//! Each module groups the test classes of one family: read checks, write
//! checks, set/get round trips, config-to-state convergence and the three
//! telemetry subscription modes. Profile entries name a class as
//! `family.Class`; `build_suite` binds the entry's arguments and returns the
//! runnable suite.

mod config_state;
mod get;
mod registry;
mod set;
mod setget;
mod telemetry_once;
mod telemetry_onchange;
mod telemetry_sample;

pub use registry::{build_suite, resolve, BuildError, SuiteBuilder};
