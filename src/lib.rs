//! infraplan — deterministic topology and IAM policy planning for
//! containerized web apps.
//!
//! A project file resolves into one resource graph per run: every network,
//! storage and compute resource each environment needs, the dependency order
//! to provision them in, and least-privilege policy sets for the roles that
//! touch them.

pub mod cli;
pub mod core;
