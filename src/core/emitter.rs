//! IP-007: Plan emission — merge descriptors, order them, fingerprint the graph.
//!
//! Ordering is Kahn's algorithm. Ready nodes are released by rank: global
//! resources first, then environments in the order they first appear, then
//! resource kind, then insertion order.

use super::error::{PlanError, PlanErrorKind};
use super::types::*;
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// `(environment rank, kind, insertion index)`
type Rank = (usize, ResourceKind, usize);

/// Order descriptors into a resource graph.
pub fn emit(
    descriptors: Vec<ResourceDescriptor>,
    policies: PolicySets,
) -> Result<ResourceGraph, PlanError> {
    let merged = merge(descriptors)?;
    let order = execution_order(&merged)?;

    let mut resources = merged;
    let mut ordered = IndexMap::with_capacity(resources.len());
    for id in &order {
        if let Some(d) = resources.swap_remove(id) {
            ordered.insert(id.clone(), d);
        }
    }

    let fingerprint = fingerprint(&ordered, &policies, &order)?;
    tracing::debug!(
        resources = ordered.len(),
        fingerprint = %fingerprint,
        "resource graph emitted"
    );
    Ok(ResourceGraph {
        resources: ordered,
        policies,
        order,
        fingerprint,
    })
}

/// Key descriptors by logical id. Identical repeats collapse into one entry.
fn merge(
    descriptors: Vec<ResourceDescriptor>,
) -> Result<IndexMap<String, ResourceDescriptor>, PlanError> {
    let mut merged: IndexMap<String, ResourceDescriptor> = IndexMap::new();
    for d in descriptors {
        match merged.get(&d.logical_id) {
            Some(existing) if *existing == d => continue,
            Some(_) => {
                return Err(PlanError::new(
                    PlanErrorKind::DuplicateLogicalId,
                    vec![d.logical_id.clone()],
                    format!("logical id '{}' is declared twice with different contents", d.logical_id),
                ));
            }
            None => {
                merged.insert(d.logical_id.clone(), d);
            }
        }
    }
    Ok(merged)
}

fn ranks(resources: &IndexMap<String, ResourceDescriptor>) -> Vec<Rank> {
    let mut env_rank: HashMap<&Environment, usize> = HashMap::new();
    for env in resources.values().filter_map(|d| d.environment.as_ref()) {
        let next = env_rank.len() + 1;
        env_rank.entry(env).or_insert(next);
    }
    resources
        .values()
        .enumerate()
        .map(|(i, d)| {
            let env = d
                .environment
                .as_ref()
                .and_then(|e| env_rank.get(e).copied())
                .unwrap_or(0);
            (env, d.kind, i)
        })
        .collect()
}

/// Topological order over `depends_on` edges.
pub fn execution_order(
    resources: &IndexMap<String, ResourceDescriptor>,
) -> Result<Vec<String>, PlanError> {
    let n = resources.len();
    let mut in_degree = vec![0usize; n];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, (id, d)) in resources.iter().enumerate() {
        for dep in &d.depends_on {
            let j = resources.get_index_of(dep).ok_or_else(|| {
                PlanError::new(
                    PlanErrorKind::UnknownDependency,
                    vec![id.clone(), dep.clone()],
                    format!("resource '{}' depends on unknown '{}'", id, dep),
                )
            })?;
            adjacency[j].push(i);
            in_degree[i] += 1;
        }
    }

    let rank = ranks(resources);
    let mut ready: BinaryHeap<Reverse<Rank>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(|i| Reverse(rank[i]))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse((_, _, current))) = ready.pop() {
        order.push(current);
        for &next in &adjacency[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(rank[next]));
            }
        }
    }

    if order.len() != n {
        let members: Vec<String> = cycle_members(&in_degree, &adjacency)
            .into_iter()
            .filter_map(|i| resources.get_index(i).map(|(id, _)| id.clone()))
            .collect();
        return Err(PlanError::new(
            PlanErrorKind::CyclicDependency,
            members.clone(),
            format!("dependency cycle detected involving: {}", members.join(", ")),
        ));
    }

    Ok(order
        .into_iter()
        .filter_map(|i| resources.get_index(i).map(|(id, _)| id.clone()))
        .collect())
}

/// Nodes Kahn's pass left behind, minus the dependents that only hang off a
/// cycle. Leftover nodes with no leftover dependents are peeled until none remain.
fn cycle_members(in_degree: &[usize], adjacency: &[Vec<usize>]) -> Vec<usize> {
    let mut left: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
    loop {
        let tails: Vec<usize> = (0..left.len())
            .filter(|&i| left[i] && !adjacency[i].iter().any(|&next| left[next]))
            .collect();
        if tails.is_empty() {
            break;
        }
        for i in tails {
            left[i] = false;
        }
    }
    (0..left.len()).filter(|&i| left[i]).collect()
}

/// BLAKE3 over the canonical JSON of the graph. Returns `"blake3:{hex}"`.
pub fn fingerprint(
    resources: &IndexMap<String, ResourceDescriptor>,
    policies: &PolicySets,
    order: &[String],
) -> Result<String, PlanError> {
    let canonical = serde_json::to_string(&(resources, policies, order)).map_err(|e| {
        PlanError::new(
            PlanErrorKind::Serialization,
            Vec::new(),
            format!("cannot serialize resource graph: {}", e),
        )
    })?;
    Ok(format!("blake3:{}", blake3::hash(canonical.as_bytes()).to_hex()))
}

/// Substitute `{{id:<logical_id>}}` placeholders with provider-assigned ids.
pub fn resolve_arn_template(
    template: &str,
    ids: &HashMap<String, String>,
) -> Result<String, PlanError> {
    let unresolved = |id: &str, message: String| {
        PlanError::new(
            PlanErrorKind::UnresolvedPlaceholder,
            vec![id.to_string()],
            message,
        )
    };

    let mut result = template.to_string();
    let mut start = 0;
    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .map(|c| open + c + 2)
            .ok_or_else(|| unresolved("", format!("unclosed placeholder at position {}", open)))?;
        let key = result[open + 2..close - 2].trim();
        let logical_id = key
            .strip_prefix("id:")
            .ok_or_else(|| unresolved(key, format!("unknown placeholder: {}", key)))?;
        let value = ids
            .get(logical_id)
            .ok_or_else(|| unresolved(logical_id, format!("no provider id for '{}'", logical_id)))?
            .clone();
        result.replace_range(open..close, &value);
        start = open + value.len();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy;
    use crate::core::topology::{self, tests::make_config};
    use serde_json::json;

    fn node(id: &str, env: Option<&str>, kind: ResourceKind, deps: &[&str]) -> ResourceDescriptor {
        ResourceDescriptor {
            kind,
            logical_id: id.to_string(),
            environment: env.map(Environment::new),
            disposition: Disposition::Create,
            derived_name: id.to_string(),
            derived_arn_template: format!("arn:aws:test:::{}", id),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            removal: RemovalPolicy::Destroy,
            tags: IndexMap::new(),
            properties: json!({}),
        }
    }

    fn no_policies() -> PolicySets {
        policy::empty_sets(&make_config(false, false))
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|o| o == id).unwrap()
    }

    #[test]
    fn test_ip007_dependencies_precede_dependents() {
        let graph = emit(
            vec![
                node("b", None, ResourceKind::Cluster, &["a"]),
                node("a", None, ResourceKind::Cluster, &[]),
            ],
            no_policies(),
        )
        .unwrap();
        assert_eq!(graph.order, vec!["a", "b"]);
        assert_eq!(graph.resources.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_ip007_tie_break_global_then_env_then_kind() {
        let graph = emit(
            vec![
                node("prod/cluster", Some("production"), ResourceKind::Cluster, &[]),
                node("stg/cluster", Some("staging"), ResourceKind::Cluster, &[]),
                node("stg/registry", Some("staging"), ResourceKind::ContainerRegistry, &[]),
                node("identity", None, ResourceKind::ApplicationIdentity, &[]),
                node("network", None, ResourceKind::Network, &[]),
            ],
            no_policies(),
        )
        .unwrap();
        assert_eq!(
            graph.order,
            vec![
                "network",
                "identity",
                "prod/cluster",
                "stg/registry",
                "stg/cluster",
            ]
        );
    }

    #[test]
    fn test_ip007_tie_break_insertion_order_within_kind() {
        let graph = emit(
            vec![
                node("subnet-z", None, ResourceKind::Subnet, &[]),
                node("subnet-a", None, ResourceKind::Subnet, &[]),
            ],
            no_policies(),
        )
        .unwrap();
        assert_eq!(graph.order, vec!["subnet-z", "subnet-a"]);
    }

    #[test]
    fn test_ip007_cycle_names_members() {
        let err = emit(
            vec![
                node("root", None, ResourceKind::Network, &[]),
                node("a", None, ResourceKind::Cluster, &["b"]),
                node("b", None, ResourceKind::Cluster, &["a"]),
            ],
            no_policies(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::CyclicDependency);
        assert_eq!(err.logical_ids, vec!["a", "b"]);
        assert!(err.message.contains("cycle"));
    }

    #[test]
    fn test_ip007_cycle_excludes_dependents_of_cycle() {
        let err = emit(
            vec![
                node("a", None, ResourceKind::Cluster, &["b"]),
                node("b", None, ResourceKind::Cluster, &["a"]),
                node("c", None, ResourceKind::Cluster, &["a"]),
                node("d", None, ResourceKind::Cluster, &["c"]),
            ],
            no_policies(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::CyclicDependency);
        assert_eq!(err.logical_ids, vec!["a", "b"]);
        assert_eq!(err.message, "dependency cycle detected involving: a, b");
    }

    #[test]
    fn test_ip007_self_dependency_is_cycle() {
        let err = emit(
            vec![node("a", None, ResourceKind::Cluster, &["a"])],
            no_policies(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::CyclicDependency);
    }

    #[test]
    fn test_ip007_unknown_dependency() {
        let err = emit(
            vec![node("a", None, ResourceKind::Cluster, &["ghost"])],
            no_policies(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::UnknownDependency);
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn test_ip007_identical_duplicates_collapse() {
        let graph = emit(
            vec![
                node("network", None, ResourceKind::Network, &[]),
                node("network", None, ResourceKind::Network, &[]),
            ],
            no_policies(),
        )
        .unwrap();
        assert_eq!(graph.resources.len(), 1);
    }

    #[test]
    fn test_ip007_conflicting_duplicates_rejected() {
        let mut other = node("network", None, ResourceKind::Network, &[]);
        other.derived_name = "different".to_string();
        let err = emit(
            vec![node("network", None, ResourceKind::Network, &[]), other],
            no_policies(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::DuplicateLogicalId);
        assert_eq!(err.logical_ids, vec!["network"]);
    }

    #[test]
    fn test_ip007_full_topology_orders() {
        let config = make_config(false, false);
        let mut ds = topology::build_shared(&config);
        for env in &config.environments {
            ds.extend(topology::build(&config, env, &PlanOptions::default()).unwrap());
        }
        let graph = emit(ds, no_policies()).unwrap();
        assert_eq!(graph.order.len(), graph.resources.len());
        for (id, d) in &graph.resources {
            for dep in &d.depends_on {
                assert!(position(&graph.order, dep) < position(&graph.order, id));
            }
        }
        assert_eq!(graph.order[0], "network");
    }

    #[test]
    fn test_ip007_fingerprint_stable_and_sensitive() {
        let a = emit(
            vec![node("a", None, ResourceKind::Cluster, &[])],
            no_policies(),
        )
        .unwrap();
        let b = emit(
            vec![node("a", None, ResourceKind::Cluster, &[])],
            no_policies(),
        )
        .unwrap();
        let c = emit(
            vec![node("c", None, ResourceKind::Cluster, &[])],
            no_policies(),
        )
        .unwrap();
        assert!(a.fingerprint.starts_with("blake3:"));
        assert_eq!(a.fingerprint.len(), 7 + 64);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_ip007_resolve_arn_template() {
        let ids = HashMap::from([("network".to_string(), "vpc-0abc".to_string())]);
        let arn = resolve_arn_template("arn:aws:ec2:us-east-1:123456789012:vpc/{{id:network}}", &ids)
            .unwrap();
        assert_eq!(arn, "arn:aws:ec2:us-east-1:123456789012:vpc/vpc-0abc");
    }

    #[test]
    fn test_ip007_resolve_without_placeholders() {
        let arn = resolve_arn_template("arn:aws:s3:::media.example.com", &HashMap::new()).unwrap();
        assert_eq!(arn, "arn:aws:s3:::media.example.com");
    }

    #[test]
    fn test_ip007_resolve_unknown_id() {
        let err = resolve_arn_template("vpc/{{id:network}}", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::UnresolvedPlaceholder);
        assert_eq!(err.logical_ids, vec!["network"]);
    }

    #[test]
    fn test_ip007_resolve_unclosed() {
        let err = resolve_arn_template("vpc/{{id:network", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind, PlanErrorKind::UnresolvedPlaceholder);
        assert!(err.message.contains("unclosed"));
    }
}
