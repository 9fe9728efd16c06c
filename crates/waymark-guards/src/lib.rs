//! Waymark guard pipeline
//!
//! The steps between recognition and commit:
//! - `collect_checks` diffs the candidate snapshot against the current one
//! - `run_guards` evaluates exit guards, then entry guards
//! - `resolve_data` runs resolvers and attaches their values to the candidate

mod diff;
mod error;
mod executor;
mod resolve;

pub use diff::{collect_checks, should_run_guards_and_resolvers, CanActivateCheck, CanDeactivateCheck, Checks};
pub use error::GuardError;
pub use executor::{run_guards, ActivationEvent, Verdict};
pub use resolve::{resolve_data, ResolveOutcome};

pub type Result<T> = std::result::Result<T, GuardError>;
