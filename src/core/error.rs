//! IP-002: Error taxonomy for a planning run.
//!
//! Every error is terminal for the run and carries the offending field or
//! logical id in its message.

use std::fmt;
use thiserror::Error;

/// Why a project configuration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    MissingField,
    InvalidReference,
    DuplicateEnvironment,
    InvalidValue,
    Parse,
    Io,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "missing field"),
            Self::InvalidReference => write!(f, "invalid reference"),
            Self::DuplicateEnvironment => write!(f, "duplicate environment"),
            Self::InvalidValue => write!(f, "invalid value"),
            Self::Parse => write!(f, "parse error"),
            Self::Io => write!(f, "io error"),
        }
    }
}

/// Malformed or inconsistent project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} `{field}`: {message}")]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{} is required", field);
        Self::new(ConfigErrorKind::MissingField, field, message)
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue, field, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyErrorKind {
    UnresolvedReference,
}

/// An environment's resource set could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("environment '{environment}': {message}")]
pub struct TopologyError {
    pub kind: TopologyErrorKind,
    pub environment: String,
    pub message: String,
}

impl TopologyError {
    pub fn unresolved(environment: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: TopologyErrorKind::UnresolvedReference,
            environment: environment.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    MissingDependency,
    DuplicateSid,
}

/// Policy composition hit an internal invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("policy composition failed: {message}")]
pub struct PolicyError {
    pub kind: PolicyErrorKind,
    pub message: String,
}

impl PolicyError {
    pub fn new(kind: PolicyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanErrorKind {
    CyclicDependency,
    UnknownDependency,
    DuplicateLogicalId,
    UnresolvedPlaceholder,
    Serialization,
}

/// The resource graph could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PlanError {
    pub kind: PlanErrorKind,
    /// Logical ids involved in the failure
    pub logical_ids: Vec<String>,
    pub message: String,
}

impl PlanError {
    pub fn new(kind: PlanErrorKind, logical_ids: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            logical_ids,
            message: message.into(),
        }
    }
}

/// Any failure of a planning run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("plan: {0}")]
    Plan(#[from] PlanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip002_config_error_display_names_field() {
        let e = ConfigError::missing("dns.domain");
        assert_eq!(e.kind, ConfigErrorKind::MissingField);
        assert_eq!(e.to_string(), "missing field `dns.domain`: dns.domain is required");
    }

    #[test]
    fn test_ip002_planning_error_from() {
        let e: PlanningError = PlanError::new(
            PlanErrorKind::CyclicDependency,
            vec!["a".to_string(), "b".to_string()],
            "dependency cycle detected involving: a, b",
        )
        .into();
        assert!(matches!(e, PlanningError::Plan(_)));
        assert!(e.to_string().contains("cycle"));
    }

    #[test]
    fn test_ip002_topology_error_display() {
        let e = TopologyError::unresolved("qa", "environment is not declared");
        assert_eq!(e.kind, TopologyErrorKind::UnresolvedReference);
        assert!(e.to_string().starts_with("environment 'qa'"));
    }
}
