//! Test case abstraction for device validation runs
//!
//! This crate provides the building blocks every test class is made of: the
//! `TestCase` trait, the per-case execution context with its session and
//! check helpers, the retrying case executor, and the result types collected
//! into the final report.

mod case;
mod context;
mod result;

pub use case::{
    run_case, run_suite, CaseFailure, CaseOutcome, CommonArgs, RetryPolicy, TestCase, TestSuite,
};
pub use context::{CaseContext, CaseEnv};
pub use result::{CaseResult, Outcome, SuiteResult};
