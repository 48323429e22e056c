//! IP-003: Project document parsing and resolution.
//!
//! Parses project.yaml and resolves it into a canonical [`ProjectConfig`]:
//! - owner, repository, target and dns domain are required
//! - environments are non-empty, well-formed and unique
//! - secrets are flat key-value payloads keyed by declared environments
//! - vpc reuse and layout fields are mutually consistent

use super::error::{ConfigError, ConfigErrorKind};
use super::types::*;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static OWNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("valid regex"));
static REPOSITORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));
static ENVIRONMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));
static SUBNET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));
static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("valid regex"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]$").expect("valid regex"));
static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+(\.[a-z0-9-]+)+$").expect("valid regex"));
static CIDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,3}\.){3}[0-9]{1,3}/([0-9]|[12][0-9]|3[0-2])$").expect("valid regex")
});

/// Parse a project file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::new(
            ConfigErrorKind::Io,
            path.display().to_string(),
            format!("failed to read {}: {}", path.display(), e),
        )
    })?;
    parse_config(&content)
}

/// Parse a project document from a string. JSON documents are accepted too.
pub fn parse_config(yaml: &str) -> Result<RawProjectConfig, ConfigError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| {
        ConfigError::new(ConfigErrorKind::Parse, "<document>", format!("YAML parse error: {}", e))
    })
}

/// Load and resolve a project file in one step.
pub fn load_project(path: &Path) -> Result<ProjectConfig, ConfigError> {
    resolve(parse_config_file(path)?)
}

/// Validate a raw document and apply defaults.
pub fn resolve(raw: RawProjectConfig) -> Result<ProjectConfig, ConfigError> {
    let owner = required_text("owner", raw.owner)?;
    if !OWNER_RE.is_match(&owner) {
        return Err(ConfigError::invalid(
            "owner",
            format!("'{}' is not a valid repository owner", owner),
        ));
    }

    let repository = required_text("repository", raw.repository)?;
    if !REPOSITORY_RE.is_match(&repository) {
        return Err(ConfigError::invalid(
            "repository",
            format!("'{}' is not a valid repository name", repository),
        ));
    }

    let environments = resolve_environments(&raw.environments)?;
    let target = resolve_target(raw.target)?;

    let dns_domain = required_text("dns.domain", raw.dns.and_then(|d| d.domain))?;
    if !DOMAIN_RE.is_match(&dns_domain) {
        return Err(ConfigError::invalid(
            "dns.domain",
            format!("'{}' is not a lowercase DNS domain", dns_domain),
        ));
    }

    let allow_all_outbound = raw.vpc.allow_all_outbound.unwrap_or(true);
    let network = resolve_network(raw.vpc)?;
    let task = resolve_task(&raw.task)?;
    let secrets = resolve_secrets(&environments, raw.secrets)?;

    Ok(ProjectConfig {
        owner,
        repository,
        environments,
        target,
        dns_domain,
        network,
        storage_reuse: raw.storage.reuse,
        allow_all_outbound,
        test_mode: raw.test.unwrap_or(false),
        task,
        secrets,
    })
}

fn required_text(field: &str, value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::missing(field)),
    }
}

fn resolve_environments(labels: &[String]) -> Result<Vec<Environment>, ConfigError> {
    if labels.is_empty() {
        return Err(ConfigError::new(
            ConfigErrorKind::MissingField,
            "environments",
            "at least one environment is required",
        ));
    }

    let mut seen = IndexSet::new();
    for (i, label) in labels.iter().enumerate() {
        if !ENVIRONMENT_RE.is_match(label) {
            return Err(ConfigError::invalid(
                format!("environments[{}]", i),
                format!(
                    "'{}' must be lowercase alphanumerics separated by single hyphens",
                    label
                ),
            ));
        }
        if !seen.insert(label.as_str()) {
            return Err(ConfigError::new(
                ConfigErrorKind::DuplicateEnvironment,
                format!("environments[{}]", i),
                format!("environment '{}' is declared more than once", label),
            ));
        }
    }

    Ok(labels.iter().map(Environment::new).collect())
}

fn resolve_target(raw: Option<RawTarget>) -> Result<AwsTarget, ConfigError> {
    let raw = raw.unwrap_or_default();
    let account = required_text("target.account", raw.account)?;
    if !ACCOUNT_RE.is_match(&account) {
        return Err(ConfigError::invalid(
            "target.account",
            format!("'{}' is not a 12-digit account id", account),
        ));
    }
    let region = required_text("target.region", raw.region)?;
    if !REGION_RE.is_match(&region) {
        return Err(ConfigError::invalid(
            "target.region",
            format!("'{}' is not a region name", region),
        ));
    }
    Ok(AwsTarget { account, region })
}

fn resolve_network(vpc: RawVpc) -> Result<NetworkSource, ConfigError> {
    if vpc.reuse {
        let external_id = match vpc.external_id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(ConfigError::new(
                    ConfigErrorKind::MissingField,
                    "vpc.external_id",
                    "vpc.external_id is required when vpc.reuse is true",
                ))
            }
        };
        let layout_field = [
            ("vpc.cidr", vpc.cidr.is_some()),
            ("vpc.max_azs", vpc.max_azs.is_some()),
            ("vpc.subnets", vpc.subnets.is_some()),
        ]
        .into_iter()
        .find(|(_, present)| *present);
        if let Some((field, _)) = layout_field {
            return Err(ConfigError::new(
                ConfigErrorKind::InvalidReference,
                field,
                format!("{} only applies to a newly created vpc", field),
            ));
        }
        return Ok(NetworkSource::Reuse {
            external_id,
            private_subnet_ids: vpc.private_subnet_ids,
        });
    }

    if vpc.external_id.is_some() {
        return Err(ConfigError::new(
            ConfigErrorKind::InvalidReference,
            "vpc.external_id",
            "vpc.external_id requires vpc.reuse: true",
        ));
    }
    if !vpc.private_subnet_ids.is_empty() {
        return Err(ConfigError::new(
            ConfigErrorKind::InvalidReference,
            "vpc.private_subnet_ids",
            "vpc.private_subnet_ids requires vpc.reuse: true",
        ));
    }

    let defaults = NetworkLayout::default();
    let cidr = vpc.cidr.unwrap_or(defaults.cidr);
    if !CIDR_RE.is_match(&cidr) {
        return Err(ConfigError::invalid(
            "vpc.cidr",
            format!("'{}' is not an IPv4 CIDR block", cidr),
        ));
    }
    let max_azs = vpc.max_azs.unwrap_or(defaults.max_azs);
    if max_azs == 0 {
        return Err(ConfigError::invalid("vpc.max_azs", "max_azs must be at least 1"));
    }

    let subnets = vpc.subnets.unwrap_or(defaults.subnets);
    let mut names = IndexSet::new();
    for (i, subnet) in subnets.iter().enumerate() {
        if !(16..=28).contains(&subnet.cidr_mask) {
            return Err(ConfigError::invalid(
                format!("vpc.subnets[{}].cidr_mask", i),
                format!("cidr mask {} is outside 16..=28", subnet.cidr_mask),
            ));
        }
        if !SUBNET_NAME_RE.is_match(&subnet.name) {
            return Err(ConfigError::invalid(
                format!("vpc.subnets[{}].name", i),
                format!(
                    "'{}' must be lowercase alphanumerics separated by single hyphens",
                    subnet.name
                ),
            ));
        }
        if !names.insert(subnet.name.as_str()) {
            return Err(ConfigError::invalid(
                format!("vpc.subnets[{}].name", i),
                format!("subnet name '{}' is used twice", subnet.name),
            ));
        }
    }
    for tier in SubnetTier::ALL {
        if !subnets.iter().any(|s| s.tier == tier) {
            return Err(ConfigError::new(
                ConfigErrorKind::MissingField,
                format!("vpc.subnets.{}", tier),
                format!("a new vpc needs a {} subnet tier", tier),
            ));
        }
    }

    Ok(NetworkSource::Create(NetworkLayout {
        cidr,
        max_azs,
        subnets,
    }))
}

fn resolve_task(task: &RawTask) -> Result<TaskSizing, ConfigError> {
    let defaults = TaskSizing::default();
    let memory_mib = task.memory_mib.unwrap_or(defaults.memory_mib);
    let cpu = task.cpu.unwrap_or(defaults.cpu);
    if memory_mib == 0 {
        return Err(ConfigError::invalid("task.memory_mib", "memory must be positive"));
    }
    if cpu == 0 {
        return Err(ConfigError::invalid("task.cpu", "cpu must be positive"));
    }
    Ok(TaskSizing { memory_mib, cpu })
}

fn resolve_secrets(
    environments: &[Environment],
    mut raw: IndexMap<String, serde_yaml_ng::Value>,
) -> Result<IndexMap<Environment, IndexMap<String, String>>, ConfigError> {
    if let Some(unknown) = raw
        .keys()
        .find(|key| !environments.iter().any(|e| e.as_str() == key.as_str()))
    {
        return Err(ConfigError::new(
            ConfigErrorKind::InvalidReference,
            format!("secrets.{}", unknown),
            format!("secrets reference undeclared environment '{}'", unknown),
        ));
    }

    let mut secrets = IndexMap::new();
    for env in environments {
        let field = format!("secrets.{}", env);
        let payload = match raw.shift_remove(env.as_str()) {
            Some(value) => flatten_payload(&field, &value)?,
            None => IndexMap::new(),
        };
        secrets.insert(env.clone(), payload);
    }
    Ok(secrets)
}

/// A payload is either a flat mapping or a string holding a flat JSON object.
fn flatten_payload(
    field: &str,
    value: &serde_yaml_ng::Value,
) -> Result<IndexMap<String, String>, ConfigError> {
    match value {
        serde_yaml_ng::Value::Null => Ok(IndexMap::new()),
        serde_yaml_ng::Value::Mapping(map) => {
            let mut flat = IndexMap::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml_ng::Value::String(s) if !s.is_empty() => s.clone(),
                    _ => {
                        return Err(ConfigError::invalid(
                            field,
                            "secret keys must be non-empty strings",
                        ))
                    }
                };
                let val = yaml_scalar_to_string(v).ok_or_else(|| {
                    ConfigError::invalid(
                        format!("{}.{}", field, key),
                        "secret values must be scalars",
                    )
                })?;
                flat.insert(key, val);
            }
            Ok(flat)
        }
        serde_yaml_ng::Value::String(text) => {
            let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                ConfigError::invalid(field, format!("secret payload is not JSON: {}", e))
            })?;
            let object = parsed.as_object().ok_or_else(|| {
                ConfigError::invalid(field, "secret payload must be a JSON object")
            })?;
            let mut flat = IndexMap::new();
            for (k, v) in object {
                let val = match v {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Null => String::new(),
                    _ => {
                        return Err(ConfigError::invalid(
                            format!("{}.{}", field, k),
                            "secret values must be scalars",
                        ))
                    }
                };
                flat.insert(k.clone(), val);
            }
            Ok(flat)
        }
        _ => Err(ConfigError::invalid(
            field,
            "secret payload must be a key-value mapping",
        )),
    }
}
