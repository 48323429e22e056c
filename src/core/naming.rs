//! IP-004: Deterministic resource names and ARNs.
//!
//! Every name and ARN in a plan is built here and nowhere else. All functions
//! are pure and total: the same identity fields always give the same string.

use super::types::Environment;

/// Log group flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Build,
    Service,
}

fn stem(owner: &str, repo: &str) -> String {
    format!("{}-{}", owner, repo)
}

fn env_stem(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-{}-{}", owner, repo, env)
}

/// `{{id:<logical_id>}}` placeholder for a provider-assigned identifier.
pub fn id_placeholder(logical_id: &str) -> String {
    format!("{{{{id:{}}}}}", logical_id)
}

// ============================================================================
// Names
// ============================================================================

pub fn network_name(owner: &str, repo: &str) -> String {
    format!("{}-vpc", stem(owner, repo))
}

pub fn subnet_name(owner: &str, repo: &str, subnet: &str) -> String {
    format!("{}-{}", stem(owner, repo), subnet)
}

pub fn cluster_name(owner: &str, repo: &str, env: Option<&Environment>) -> String {
    match env {
        Some(env) => env_stem(owner, repo, env),
        None => stem(owner, repo),
    }
}

pub fn log_group_name(kind: LogKind, owner: &str, repo: &str, env: &Environment) -> String {
    match kind {
        LogKind::Build => format!("/aws/codebuild/{}-image-build", env_stem(owner, repo, env)),
        LogKind::Service => format!("/ecs/{}-web", env_stem(owner, repo, env)),
    }
}

/// Media bucket: `media.<domain>` for production, `media-<env>.<domain>` otherwise.
pub fn bucket_name(domain: &str, env: &Environment) -> String {
    if env.is_production() {
        format!("media.{}", domain)
    } else {
        format!("media-{}.{}", env, domain)
    }
}

/// Registry names must be lowercase.
pub fn registry_name(owner: &str, repo: &str, env: &Environment) -> String {
    env_stem(owner, repo, env).to_lowercase()
}

/// Image reference the build pushes and the task pulls.
pub fn image_uri(region: &str, account: &str, registry: &str, tag: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com/{}:{}", account, region, registry, tag)
}

pub fn secret_name(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}/{}/{}", env, owner, repo)
}

pub fn security_group_name(owner: &str, repo: &str, env: &Environment) -> String {
    env_stem(owner, repo, env)
}

pub fn build_project_name(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-image-build", env_stem(owner, repo, env))
}

/// Service role assumed by every build project of the repository.
pub fn build_role_name(owner: &str, repo: &str) -> String {
    format!("{}-image-build-service-role", stem(owner, repo))
}

pub fn managed_policy_name(owner: &str, repo: &str) -> String {
    format!("CodeBuild-{}", stem(owner, repo))
}

pub fn role_policy_name(owner: &str, repo: &str, role: &str) -> String {
    format!("{}-{}-policy", stem(owner, repo), role)
}

pub fn task_role_name(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-task-role", env_stem(owner, repo, env))
}

pub fn execution_role_name(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-execution-role", env_stem(owner, repo, env))
}

pub fn task_family(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-web", env_stem(owner, repo, env))
}

pub fn service_name(owner: &str, repo: &str, env: &Environment) -> String {
    format!("{}-web", env_stem(owner, repo, env))
}

pub fn application_user_name(owner: &str, repo: &str) -> String {
    format!("{}-app", stem(owner, repo))
}

/// PascalCase form of an environment label, for statement ids.
pub fn policy_sid(env: &Environment) -> String {
    env.as_str()
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

// ============================================================================
// ARNs
// ============================================================================

pub fn role_arn_prefix(account: &str) -> String {
    format!("arn:aws:iam::{}:role/", account)
}

pub fn role_arn(account: &str, role_name: &str) -> String {
    format!("{}{}", role_arn_prefix(account), role_name)
}

/// Build roles live under the `/service-role/` path.
pub fn service_role_arn(account: &str, role_name: &str) -> String {
    format!("{}service-role/{}", role_arn_prefix(account), role_name)
}

pub fn user_arn(account: &str, user_name: &str) -> String {
    format!("arn:aws:iam::{}:user/{}", account, user_name)
}

/// Every registry of the repository, across environments.
pub fn ecr_repo_arn_pattern(region: &str, account: &str, owner: &str, repo: &str) -> String {
    format!(
        "arn:aws:ecr:{}:{}:repository/{}-*",
        region,
        account,
        stem(owner, repo).to_lowercase()
    )
}

pub fn ecr_repo_arn(region: &str, account: &str, registry: &str) -> String {
    format!("arn:aws:ecr:{}:{}:repository/{}", region, account, registry)
}

/// The provider appends a random suffix to secret ARNs, hence the `-*`.
pub fn secret_arn_pattern(
    region: &str,
    account: &str,
    env: &Environment,
    owner: &str,
    repo: &str,
) -> String {
    format!(
        "arn:aws:secretsmanager:{}:{}:secret:{}-*",
        region,
        account,
        secret_name(owner, repo, env)
    )
}

pub fn log_group_arn(region: &str, account: &str, log_group: &str) -> String {
    format!("arn:aws:logs:{}:{}:log-group:{}", region, account, log_group)
}

/// Service log groups of every environment.
pub fn service_log_group_arn_pattern(region: &str, account: &str, owner: &str, repo: &str) -> String {
    format!(
        "arn:aws:logs:{}:{}:log-group:/ecs/{}-*",
        region,
        account,
        stem(owner, repo)
    )
}

pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}", bucket)
}

pub fn bucket_objects_arn(bucket: &str) -> String {
    format!("{}/*", bucket_arn(bucket))
}

/// Artifact buckets created by the delivery pipeline service.
pub fn artifact_bucket_arn_pattern(region: &str) -> String {
    format!("arn:aws:s3:::codepipeline-{}-*", region)
}

pub fn network_arn(region: &str, account: &str, vpc_id: &str) -> String {
    format!("arn:aws:ec2:{}:{}:vpc/{}", region, account, vpc_id)
}

pub fn subnet_arn(region: &str, account: &str, subnet_id: &str) -> String {
    format!("arn:aws:ec2:{}:{}:subnet/{}", region, account, subnet_id)
}

pub fn security_group_arn(region: &str, account: &str, group_id: &str) -> String {
    format!("arn:aws:ec2:{}:{}:security-group/{}", region, account, group_id)
}

pub fn network_interface_arn_pattern(region: &str, account: &str) -> String {
    format!("arn:aws:ec2:{}:{}:network-interface/*", region, account)
}

pub fn build_project_arn(region: &str, account: &str, project: &str) -> String {
    format!("arn:aws:codebuild:{}:{}:project/{}", region, account, project)
}

pub fn report_group_arn_pattern(region: &str, account: &str, project: &str) -> String {
    format!("arn:aws:codebuild:{}:{}:report-group/{}-*", region, account, project)
}

pub fn cluster_arn(region: &str, account: &str, cluster: &str) -> String {
    format!("arn:aws:ecs:{}:{}:cluster/{}", region, account, cluster)
}

/// All revisions of a task definition family.
pub fn task_definition_arn(region: &str, account: &str, family: &str) -> String {
    format!("arn:aws:ecs:{}:{}:task-definition/{}:*", region, account, family)
}

pub fn service_arn(region: &str, account: &str, cluster: &str, service: &str) -> String {
    format!("arn:aws:ecs:{}:{}:service/{}/{}", region, account, cluster, service)
}

pub fn events_service_linked_role_arn(account: &str) -> String {
    format!(
        "{}aws-service-role/events.amazonaws.com/*",
        role_arn_prefix(account)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn env(label: &str) -> Environment {
        Environment::new(label)
    }

    #[test]
    fn test_ip004_bucket_name_production() {
        assert_eq!(bucket_name("example.com", &env("production")), "media.example.com");
    }

    #[test]
    fn test_ip004_bucket_name_other() {
        assert_eq!(
            bucket_name("example.com", &env("staging")),
            "media-staging.example.com"
        );
    }

    #[test]
    fn test_ip004_cluster_name_with_and_without_env() {
        assert_eq!(cluster_name("acme", "site", None), "acme-site");
        assert_eq!(cluster_name("acme", "site", Some(&env("qa"))), "acme-site-qa");
    }

    #[test]
    fn test_ip004_log_group_names() {
        assert_eq!(
            log_group_name(LogKind::Build, "acme", "site", &env("qa")),
            "/aws/codebuild/acme-site-qa-image-build"
        );
        assert_eq!(
            log_group_name(LogKind::Service, "acme", "site", &env("qa")),
            "/ecs/acme-site-qa-web"
        );
    }

    #[test]
    fn test_ip004_arn_shapes() {
        assert_eq!(role_arn_prefix("123456789012"), "arn:aws:iam::123456789012:role/");
        assert_eq!(
            ecr_repo_arn_pattern("us-east-1", "123456789012", "Acme", "site"),
            "arn:aws:ecr:us-east-1:123456789012:repository/acme-site-*"
        );
        assert_eq!(
            secret_arn_pattern("us-east-1", "123456789012", &env("qa"), "acme", "site"),
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:qa/acme/site-*"
        );
        assert_eq!(
            service_role_arn("1", "r"),
            "arn:aws:iam::1:role/service-role/r"
        );
        assert_eq!(bucket_objects_arn("media.x.io"), "arn:aws:s3:::media.x.io/*");
    }

    #[test]
    fn test_ip004_id_placeholder() {
        assert_eq!(id_placeholder("subnet-private"), "{{id:subnet-private}}");
    }

    #[test]
    fn test_ip004_policy_sid() {
        assert_eq!(policy_sid(&env("staging")), "Staging");
        assert_eq!(policy_sid(&env("pre-prod")), "PreProd");
        assert_eq!(policy_sid(&env("eu-2")), "Eu2");
    }

    #[test]
    fn test_ip004_registry_name_lowercase() {
        assert_eq!(registry_name("Acme", "Site", &env("qa")), "acme-site-qa");
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    fn env_names(owner: &str, repo: &str, e: &Environment) -> Vec<String> {
        vec![
            cluster_name(owner, repo, Some(e)),
            log_group_name(LogKind::Build, owner, repo, e),
            log_group_name(LogKind::Service, owner, repo, e),
            bucket_name("example.com", e),
            registry_name(owner, repo, e),
            secret_name(owner, repo, e),
            security_group_name(owner, repo, e),
            build_project_name(owner, repo, e),
            task_role_name(owner, repo, e),
            execution_role_name(owner, repo, e),
            task_family(owner, repo, e),
            service_name(owner, repo, e),
        ]
    }

    proptest! {
        #[test]
        fn test_ip004_names_deterministic(owner in label(), repo in label(), e in label()) {
            let e = Environment::new(e);
            prop_assert_eq!(env_names(&owner, &repo, &e), env_names(&owner, &repo, &e));
        }

        #[test]
        fn test_ip004_distinct_envs_never_collide(
            owner in label(),
            repo in label(),
            a in "[a-z0-9]{1,6}(-[a-z0-9]{1,4})?",
            b in "[a-z0-9]{1,6}(-[a-z0-9]{1,4})?",
        ) {
            prop_assume!(a != b);
            let (ea, eb) = (Environment::new(a), Environment::new(b));
            let na = env_names(&owner, &repo, &ea);
            let nb = env_names(&owner, &repo, &eb);
            for (x, y) in na.iter().zip(nb.iter()) {
                prop_assert_ne!(x, y);
            }
        }

        #[test]
        fn test_ip004_distinct_tuples_never_collide(
            t1 in (label(), label(), proptest::option::of(label())),
            t2 in (label(), label(), proptest::option::of(label())),
        ) {
            prop_assume!(t1 != t2);
            let e1 = t1.2.clone().map(Environment::new);
            let e2 = t2.2.clone().map(Environment::new);
            prop_assert_ne!(
                cluster_name(&t1.0, &t1.1, e1.as_ref()),
                cluster_name(&t2.0, &t2.1, e2.as_ref())
            );
        }
    }
}
