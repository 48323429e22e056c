//! IP-008: Plan generation — run the topology, policy and emission passes.

use super::emitter;
use super::error::PlanningError;
use super::parser;
use super::policy;
use super::topology;
use super::types::*;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use std::path::Path;

/// Resolve a project into its resource graph.
pub fn plan(config: &ProjectConfig, options: &PlanOptions) -> Result<ResourceGraph, PlanningError> {
    let passes: Vec<Vec<ResourceDescriptor>> = if options.parallel {
        config
            .environments
            .par_iter()
            .map(|env| topology::build(config, env, options))
            .collect::<Result<_, _>>()?
    } else {
        config
            .environments
            .iter()
            .map(|env| topology::build(config, env, options))
            .collect::<Result<_, _>>()?
    };

    let mut descriptors = topology::build_shared(config);
    for pass in passes {
        descriptors.extend(pass);
    }
    let descriptors = dedup_identical(descriptors);

    let bootstrap = options.network_only_bootstrap && !config.vpc_reuse();
    let policies = if bootstrap {
        tracing::warn!("network-only bootstrap: policy composition skipped");
        policy::empty_sets(config)
    } else {
        policy::compose(config, &descriptors)?
    };

    let graph = emitter::emit(descriptors, policies)?;
    tracing::info!(
        project = %format!("{}/{}", config.owner, config.repository),
        environments = config.environments.len(),
        resources = graph.resources.len(),
        fingerprint = %graph.fingerprint,
        "plan complete"
    );
    Ok(graph)
}

/// Load a project file and plan it.
pub fn plan_file(path: &Path, options: &PlanOptions) -> Result<ResourceGraph, PlanningError> {
    let config = parser::load_project(path)?;
    plan(&config, options)
}

/// Drop exact repeats of shared descriptors emitted by every environment pass.
/// Conflicting repeats are kept for the emitter to reject.
fn dedup_identical(descriptors: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
    let mut out: Vec<ResourceDescriptor> = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        if !out.iter().any(|o| *o == d) {
            out.push(d);
        }
    }
    out
}

/// Counts and exceptions for the plan footer.
pub fn summarize(graph: &ResourceGraph) -> PlanSummary {
    let environments: IndexSet<&Environment> = graph
        .resources
        .values()
        .filter_map(|d| d.environment.as_ref())
        .collect();

    let mut to_create = 0u32;
    let mut to_reference = 0u32;
    for d in graph.resources.values() {
        match d.disposition {
            Disposition::Create => to_create += 1,
            Disposition::Reference => to_reference += 1,
        }
    }

    let mut statements = IndexMap::new();
    let mut exceptions = Vec::new();
    for set in graph.policies.iter() {
        statements.insert(set.role, set.statements.len());
        for st in set.exceptions() {
            let reason = st.unscoped.clone().unwrap_or_default();
            exceptions.push((set.role, st.sid.clone(), reason));
        }
    }

    PlanSummary {
        environments: environments.len(),
        to_create,
        to_reference,
        statements,
        exceptions,
    }
}

/// One-line human description of a planned resource.
pub fn describe(d: &ResourceDescriptor) -> String {
    let verb = match d.disposition {
        Disposition::Create => "create",
        Disposition::Reference => "reference",
    };
    match d.kind {
        ResourceKind::ObjectStore => {
            format!("{}: {} bucket {}", d.logical_id, verb, d.derived_name)
        }
        ResourceKind::Subnet => match d.properties["tier"].as_str() {
            Some(tier) => format!("{}: {} {} subnet {}", d.logical_id, verb, tier, d.derived_name),
            None => format!("{}: {} subnet {}", d.logical_id, verb, d.derived_name),
        },
        ResourceKind::LoadBalancedService => format!(
            "{}: {} service {} on port {}",
            d.logical_id, verb, d.derived_name, topology::CONTAINER_PORT
        ),
        _ => format!("{}: {} {} {}", d.logical_id, verb, d.kind, d.derived_name),
    }
}
