//! Core planning logic — configuration, naming, topology, policy, emission.

pub mod emitter;
pub mod error;
pub mod naming;
pub mod parser;
pub mod planner;
pub mod policy;
pub mod topology;
pub mod types;
