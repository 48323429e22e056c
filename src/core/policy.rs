//! IP-006: Least-privilege policy composition.
//!
//! Builds one statement set per role from the ARNs the topology actually
//! produced. A statement may only reach outside those ARNs when it carries an
//! `unscoped` reason; those exceptions are listed in every plan summary.

use super::error::{PolicyError, PolicyErrorKind};
use super::naming;
use super::types::*;
use indexmap::{IndexMap, IndexSet};
use serde_json::json;

const NO_RESOURCE_ARN: &str = "action has no resource-level ARN";

/// Kinds each environment must provide for a role's statements.
const REQUIREMENTS: [(Role, &[ResourceKind]); 4] = [
    (
        Role::BuildRole,
        &[
            ResourceKind::BuildPipeline,
            ResourceKind::SecurityGroup,
            ResourceKind::ContainerRegistry,
            ResourceKind::SecretStore,
            ResourceKind::BuildLogGroup,
        ],
    ),
    (
        Role::ExecutionRole,
        &[
            ResourceKind::ExecutionRole,
            ResourceKind::ContainerRegistry,
            ResourceKind::ServiceLogGroup,
            ResourceKind::SecretStore,
        ],
    ),
    (
        Role::TaskRole,
        &[
            ResourceKind::TaskRole,
            ResourceKind::SecretStore,
            ResourceKind::ObjectStore,
        ],
    ),
    (
        Role::ApplicationUserRole,
        &[
            ResourceKind::ObjectStore,
            ResourceKind::Cluster,
            ResourceKind::TaskDefinition,
            ResourceKind::LoadBalancedService,
            ResourceKind::TaskRole,
            ResourceKind::ExecutionRole,
        ],
    ),
];

impl PolicyStatement {
    /// An `Allow` statement on the given resources.
    pub fn allow(sid: &str, actions: &[&str], resource_arns: Vec<String>) -> Self {
        Self {
            sid: sid.to_string(),
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resource_arns,
            conditions: None,
            unscoped: None,
        }
    }

    pub fn with_condition(mut self, operator: &str, key: &str, values: Vec<String>) -> Self {
        self.conditions
            .get_or_insert_with(IndexMap::new)
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), values);
        self
    }

    /// Mark the statement as an explicit exception to least privilege.
    pub fn exempt(mut self, reason: &str) -> Self {
        self.unscoped = Some(reason.to_string());
        self
    }

    fn to_document(&self) -> serde_json::Value {
        let mut doc = json!({
            "Sid": self.sid,
            "Effect": self.effect,
            "Action": self.actions,
            "Resource": self.resource_arns,
        });
        if let Some(conditions) = &self.conditions {
            let rendered: serde_json::Map<String, serde_json::Value> = conditions
                .iter()
                .map(|(op, keys)| {
                    let keys: serde_json::Map<String, serde_json::Value> = keys
                        .iter()
                        .map(|(k, values)| {
                            let v = match values.as_slice() {
                                [single] => json!(single),
                                many => json!(many),
                            };
                            (k.clone(), v)
                        })
                        .collect();
                    (op.clone(), serde_json::Value::Object(keys))
                })
                .collect();
            doc["Condition"] = serde_json::Value::Object(rendered);
        }
        doc
    }
}

impl PolicySet {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            statements: Vec::new(),
        }
    }

    /// Append a statement. Sids are unique within a set.
    pub fn push(&mut self, statement: PolicyStatement) -> Result<(), PolicyError> {
        if self.statements.iter().any(|s| s.sid == statement.sid) {
            return Err(PolicyError::new(
                PolicyErrorKind::DuplicateSid,
                format!("{} policy already has a statement '{}'", self.role, statement.sid),
            ));
        }
        self.statements.push(statement);
        Ok(())
    }

    pub fn exceptions(&self) -> impl Iterator<Item = &PolicyStatement> {
        self.statements.iter().filter(|s| s.unscoped.is_some())
    }

    /// Render as an IAM policy document.
    pub fn to_document(&self) -> serde_json::Value {
        json!({
            "Version": "2012-10-17",
            "Statement": self
                .statements
                .iter()
                .map(PolicyStatement::to_document)
                .collect::<Vec<_>>(),
        })
    }
}

/// Read-only index over the descriptors handed to the composer.
struct Inventory<'a> {
    descriptors: &'a [ResourceDescriptor],
    environments: Vec<&'a Environment>,
}

impl<'a> Inventory<'a> {
    fn new(descriptors: &'a [ResourceDescriptor]) -> Self {
        let mut seen = IndexSet::new();
        for d in descriptors {
            if let Some(env) = &d.environment {
                seen.insert(env);
            }
        }
        Self {
            descriptors,
            environments: seen.into_iter().collect(),
        }
    }

    fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &'a ResourceDescriptor> + '_ {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    fn find(&self, env: Option<&Environment>, kind: ResourceKind) -> Option<&'a ResourceDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.kind == kind && d.environment.as_ref() == env)
    }

    /// ARNs of every descriptor of a kind, in order, without repeats.
    fn arns(&self, kind: ResourceKind) -> Vec<String> {
        let unique: IndexSet<String> = self
            .of_kind(kind)
            .map(|d| d.derived_arn_template.clone())
            .collect();
        unique.into_iter().collect()
    }

    fn check_requirements(&self) -> Result<(), PolicyError> {
        if self.find(None, ResourceKind::Network).is_none() {
            return Err(missing("the plan has no network descriptor"));
        }
        if self.find(None, ResourceKind::ApplicationIdentity).is_none() {
            return Err(missing(format!(
                "{} policy needs an application-identity descriptor",
                Role::ApplicationUserRole
            )));
        }
        if self.environments.is_empty() {
            return Err(missing("the plan has no environment resources"));
        }
        for env in self.environments.iter().copied() {
            for (role, kinds) in REQUIREMENTS {
                if let Some(kind) = kinds.iter().find(|k| self.find(Some(env), **k).is_none()) {
                    return Err(missing(format!(
                        "environment '{}' has no {} descriptor (required by the {} policy)",
                        env, kind, role
                    )));
                }
            }
        }
        Ok(())
    }

    /// Condition restricting interface creation to the private subnets.
    fn private_subnet_condition(&self) -> (&'static str, Vec<String>) {
        let created: Vec<String> = self
            .of_kind(ResourceKind::Subnet)
            .filter(|d| d.properties["tier"] == SubnetTier::Private.to_string().as_str())
            .map(|d| d.derived_arn_template.clone())
            .collect();
        if !created.is_empty() {
            return ("ec2:Subnet", created);
        }
        let referenced: Vec<String> = self
            .find(None, ResourceKind::Network)
            .and_then(|n| n.properties["privateSubnetArns"].as_array())
            .map(|arns| {
                arns.iter()
                    .filter_map(|a| a.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if !referenced.is_empty() {
            return ("ec2:Subnet", referenced);
        }
        ("ec2:Vpc", self.arns(ResourceKind::Network))
    }
}

fn missing(message: impl Into<String>) -> PolicyError {
    PolicyError::new(PolicyErrorKind::MissingDependency, message)
}

fn with_suffix(arns: &[String], suffix: &str) -> Vec<String> {
    arns.iter()
        .flat_map(|a| [a.clone(), format!("{}{}", a, suffix)])
        .collect()
}

/// Compose the four policy sets from a plan's descriptors.
pub fn compose(
    config: &ProjectConfig,
    descriptors: &[ResourceDescriptor],
) -> Result<PolicySets, PolicyError> {
    let inventory = Inventory::new(descriptors);
    inventory.check_requirements()?;

    let sets = PolicySets {
        build: build_role(config, &inventory)?,
        execution: execution_role(config, &inventory)?,
        task: task_role(config, &inventory)?,
        application_user: application_user_role(config, &inventory)?,
    };
    for set in sets.iter() {
        tracing::debug!(
            role = %set.role,
            statements = set.statements.len(),
            exceptions = set.exceptions().count(),
            "policy set composed"
        );
    }
    Ok(sets)
}

/// Statement-free policy sets carrying the role policy names.
pub fn empty_sets(config: &ProjectConfig) -> PolicySets {
    let (owner, repo) = (&config.owner, &config.repository);
    PolicySets {
        build: PolicySet::new(Role::BuildRole, naming::managed_policy_name(owner, repo)),
        execution: PolicySet::new(
            Role::ExecutionRole,
            naming::role_policy_name(owner, repo, "execution"),
        ),
        task: PolicySet::new(Role::TaskRole, naming::role_policy_name(owner, repo, "task")),
        application_user: PolicySet::new(
            Role::ApplicationUserRole,
            naming::role_policy_name(owner, repo, "app"),
        ),
    }
}

fn build_role(config: &ProjectConfig, inv: &Inventory<'_>) -> Result<PolicySet, PolicyError> {
    let (region, account) = (&config.target.region, &config.target.account);
    let mut set = PolicySet::new(
        Role::BuildRole,
        naming::managed_policy_name(&config.owner, &config.repository),
    );

    set.push(PolicyStatement::allow(
        "ManageECR",
        &[
            "ecr:GetDownloadUrlForLayer",
            "ecr:BatchGetImage",
            "ecr:CompleteLayerUpload",
            "ecr:UploadLayerPart",
            "ecr:InitiateLayerUpload",
            "ecr:BatchCheckLayerAvailability",
            "ecr:PutImage",
        ],
        inv.arns(ResourceKind::ContainerRegistry),
    ))?;
    set.push(
        PolicyStatement::allow("GetECRAuthorizedToken", &["ecr:GetAuthorizationToken"], vec!["*".into()])
            .exempt(NO_RESOURCE_ARN),
    )?;
    set.push(PolicyStatement::allow(
        "ManageSecretValue",
        &["secretsmanager:GetSecretValue"],
        inv.arns(ResourceKind::SecretStore),
    ))?;
    set.push(PolicyStatement::allow(
        "ManageLogsOnCloudWatch",
        &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
        with_suffix(&inv.arns(ResourceKind::BuildLogGroup), ":*"),
    ))?;
    set.push(
        PolicyStatement::allow(
            "ManageS3Bucket",
            &[
                "s3:PutObject",
                "s3:GetObject",
                "s3:GetObjectVersion",
                "s3:GetBucketAcl",
                "s3:GetBucketLocation",
            ],
            vec![naming::artifact_bucket_arn_pattern(region)],
        )
        .exempt("artifact buckets are created by the delivery pipeline, not by this plan"),
    )?;
    let report_groups = inv
        .of_kind(ResourceKind::BuildPipeline)
        .map(|d| naming::report_group_arn_pattern(region, account, &d.derived_name))
        .collect();
    set.push(
        PolicyStatement::allow(
            "ManageCodebuild",
            &[
                "codebuild:CreateReportGroup",
                "codebuild:CreateReport",
                "codebuild:UpdateReport",
                "codebuild:BatchPutTestCases",
                "codebuild:BatchPutCodeCoverages",
            ],
            report_groups,
        )
        .exempt("report groups are created by the build at run time"),
    )?;
    set.push(
        PolicyStatement::allow(
            "ManageEC2VPC",
            &[
                "ec2:CreateNetworkInterface",
                "ec2:DescribeDhcpOptions",
                "ec2:DescribeNetworkInterfaces",
                "ec2:DeleteNetworkInterface",
                "ec2:DescribeSubnets",
                "ec2:DescribeSecurityGroups",
                "ec2:DescribeVpcs",
            ],
            vec!["*".into()],
        )
        .exempt(NO_RESOURCE_ARN),
    )?;
    let (subnet_key, subnet_values) = inv.private_subnet_condition();
    set.push(
        PolicyStatement::allow(
            "ManageEC2NetworkInterface",
            &["ec2:CreateNetworkInterfacePermission"],
            vec![naming::network_interface_arn_pattern(region, account)],
        )
        .with_condition("StringEquals", subnet_key, subnet_values)
        .with_condition(
            "StringEquals",
            "ec2:AuthorizedService",
            vec!["codebuild.amazonaws.com".into()],
        )
        .exempt("network interfaces are created by the build service at run time"),
    )?;
    Ok(set)
}

fn execution_role(config: &ProjectConfig, inv: &Inventory<'_>) -> Result<PolicySet, PolicyError> {
    let (region, account) = (&config.target.region, &config.target.account);
    let mut set = PolicySet::new(
        Role::ExecutionRole,
        naming::role_policy_name(&config.owner, &config.repository, "execution"),
    );

    set.push(PolicyStatement::allow(
        "PullImages",
        &[
            "ecr:BatchCheckLayerAvailability",
            "ecr:GetDownloadUrlForLayer",
            "ecr:BatchGetImage",
        ],
        inv.arns(ResourceKind::ContainerRegistry),
    ))?;
    set.push(
        PolicyStatement::allow("GetECRAuthorizedToken", &["ecr:GetAuthorizationToken"], vec!["*".into()])
            .exempt(NO_RESOURCE_ARN),
    )?;
    set.push(
        PolicyStatement::allow(
            "WriteTaskLogs",
            &["logs:CreateLogStream", "logs:PutLogEvents"],
            vec![naming::service_log_group_arn_pattern(
                region,
                account,
                &config.owner,
                &config.repository,
            )],
        )
        .exempt("log streams are created dynamically per task"),
    )?;
    set.push(PolicyStatement::allow(
        "ReadTaskSecrets",
        &["secretsmanager:GetSecretValue"],
        inv.arns(ResourceKind::SecretStore),
    ))?;
    set.push(
        PolicyStatement::allow(
            "CreateEventsServiceLinkedRole",
            &["iam:CreateServiceLinkedRole"],
            vec![naming::events_service_linked_role_arn(account)],
        )
        .with_condition(
            "StringLike",
            "iam:AWSServiceName",
            vec!["events.amazonaws.com".into()],
        )
        .exempt("service-linked roles are owned by the event bus service"),
    )?;
    Ok(set)
}

fn task_role(config: &ProjectConfig, inv: &Inventory<'_>) -> Result<PolicySet, PolicyError> {
    let mut set = PolicySet::new(
        Role::TaskRole,
        naming::role_policy_name(&config.owner, &config.repository, "task"),
    );

    for env in inv.environments.iter().copied() {
        let secret = inv
            .find(Some(env), ResourceKind::SecretStore)
            .ok_or_else(|| missing(format!("environment '{}' has no secret-store", env)))?;
        let has_payload = secret.properties["keys"]
            .as_array()
            .is_some_and(|keys| !keys.is_empty());
        if !has_payload {
            continue;
        }
        let bucket = inv
            .find(Some(env), ResourceKind::ObjectStore)
            .ok_or_else(|| missing(format!("environment '{}' has no object-store", env)))?;
        let sid = naming::policy_sid(env);

        set.push(PolicyStatement::allow(
            &format!("ReadSecrets{}", sid),
            &["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
            vec![secret.derived_arn_template.clone()],
        ))?;
        set.push(PolicyStatement::allow(
            &format!("ReadMedia{}", sid),
            &["s3:GetObject", "s3:ListBucket"],
            with_suffix(&[bucket.derived_arn_template.clone()], "/*"),
        ))?;
    }
    Ok(set)
}

fn application_user_role(
    config: &ProjectConfig,
    inv: &Inventory<'_>,
) -> Result<PolicySet, PolicyError> {
    let mut set = PolicySet::new(
        Role::ApplicationUserRole,
        naming::role_policy_name(&config.owner, &config.repository, "app"),
    );

    set.push(PolicyStatement::allow(
        "ManageMediaBuckets",
        &[
            "s3:ListBucket",
            "s3:GetObject",
            "s3:PutObject",
            "s3:PutObjectAcl",
            "s3:DeleteObject",
        ],
        with_suffix(&inv.arns(ResourceKind::ObjectStore), "/*"),
    ))?;
    set.push(PolicyStatement::allow(
        "DeployServices",
        &["ecs:UpdateService", "ecs:DescribeServices"],
        inv.arns(ResourceKind::LoadBalancedService),
    ))?;
    set.push(PolicyStatement::allow(
        "DescribeClusters",
        &["ecs:DescribeClusters", "ecs:ListServices"],
        inv.arns(ResourceKind::Cluster),
    ))?;
    set.push(
        PolicyStatement::allow(
            "RegisterTaskDefinitions",
            &["ecs:RegisterTaskDefinition", "ecs:DescribeTaskDefinition"],
            vec!["*".into()],
        )
        .exempt(NO_RESOURCE_ARN),
    )?;
    let mut roles = inv.arns(ResourceKind::TaskRole);
    roles.extend(inv.arns(ResourceKind::ExecutionRole));
    set.push(PolicyStatement::allow("PassTaskRoles", &["iam:PassRole"], roles))?;
    set.push(
        PolicyStatement::allow("SendEmail", &["ses:*"], vec!["*".into()])
            .exempt("application mail delivery; kept broad as a reviewed exception"),
    )?;
    set.push(
        PolicyStatement::allow("ManageLogs", &["logs:*"], vec!["*".into()])
            .exempt("application log tooling; kept broad as a reviewed exception"),
    )?;
    set.push(
        PolicyStatement::allow("ManageSecrets", &["secretsmanager:*"], vec!["*".into()])
            .exempt("rotation tooling needs list and create access"),
    )?;
    Ok(set)
}

/// Every `(role, sid, arn)` in a least-privilege role that is neither flagged
/// unscoped nor covered by an ARN of the graph.
pub fn least_privilege_violations(graph: &ResourceGraph) -> Vec<(Role, String, String)> {
    let produced: Vec<&str> = graph
        .resources
        .values()
        .map(|d| d.derived_arn_template.as_str())
        .collect();
    let covered = |arn: &str| {
        produced.iter().any(|p| {
            arn == *p
                || arn
                    .strip_prefix(p)
                    .is_some_and(|rest| rest == ":*" || rest == "/*")
        })
    };

    let mut violations = Vec::new();
    for set in graph.policies.iter().filter(|s| s.role.is_least_privilege()) {
        for st in set.statements.iter().filter(|s| s.unscoped.is_none()) {
            for arn in st.resource_arns.iter().filter(|a| !covered(a)) {
                violations.push((set.role, st.sid.clone(), arn.clone()));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::{self, tests::make_config};

    fn descriptors(config: &ProjectConfig) -> Vec<ResourceDescriptor> {
        let mut out = topology::build_shared(config);
        for env in &config.environments {
            for d in topology::build(config, env, &PlanOptions::default()).unwrap() {
                if !out.iter().any(|o| o.logical_id == d.logical_id) {
                    out.push(d);
                }
            }
        }
        out
    }

    fn sids(set: &PolicySet) -> Vec<&str> {
        set.statements.iter().map(|s| s.sid.as_str()).collect()
    }

    fn statement<'a>(set: &'a PolicySet, sid: &str) -> &'a PolicyStatement {
        set.statements.iter().find(|s| s.sid == sid).unwrap()
    }

    #[test]
    fn test_ip006_build_role_statements() {
        let config = make_config(false, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        assert_eq!(sets.build.name, "CodeBuild-acme-wordpress");
        assert_eq!(
            sids(&sets.build),
            vec![
                "ManageECR",
                "GetECRAuthorizedToken",
                "ManageSecretValue",
                "ManageLogsOnCloudWatch",
                "ManageS3Bucket",
                "ManageCodebuild",
                "ManageEC2VPC",
                "ManageEC2NetworkInterface",
            ]
        );
        let ecr = statement(&sets.build, "ManageECR");
        assert_eq!(
            ecr.resource_arns,
            vec![
                "arn:aws:ecr:us-east-1:123456789012:repository/acme-wordpress-staging",
                "arn:aws:ecr:us-east-1:123456789012:repository/acme-wordpress-production",
            ]
        );
        let logs = statement(&sets.build, "ManageLogsOnCloudWatch");
        assert_eq!(logs.resource_arns.len(), 4);
        assert!(logs.resource_arns[1].ends_with("acme-wordpress-staging-image-build:*"));
    }

    #[test]
    fn test_ip006_network_interface_condition_uses_private_subnets() {
        let config = make_config(false, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        let st = statement(&sets.build, "ManageEC2NetworkInterface");
        let cond = &st.conditions.as_ref().unwrap()["StringEquals"];
        assert_eq!(
            cond["ec2:Subnet"],
            vec!["arn:aws:ec2:us-east-1:123456789012:subnet/{{id:subnet-private}}"]
        );
        assert_eq!(cond["ec2:AuthorizedService"], vec!["codebuild.amazonaws.com"]);
    }

    #[test]
    fn test_ip006_network_interface_condition_falls_back_to_vpc() {
        let config = make_config(true, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        let st = statement(&sets.build, "ManageEC2NetworkInterface");
        let cond = &st.conditions.as_ref().unwrap()["StringEquals"];
        assert_eq!(
            cond["ec2:Vpc"],
            vec!["arn:aws:ec2:us-east-1:123456789012:vpc/vpc-123"]
        );
    }

    #[test]
    fn test_ip006_execution_role_statements() {
        let config = make_config(false, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        assert_eq!(
            sids(&sets.execution),
            vec![
                "PullImages",
                "GetECRAuthorizedToken",
                "WriteTaskLogs",
                "ReadTaskSecrets",
                "CreateEventsServiceLinkedRole",
            ]
        );
        let slr = statement(&sets.execution, "CreateEventsServiceLinkedRole");
        assert_eq!(
            slr.conditions.as_ref().unwrap()["StringLike"]["iam:AWSServiceName"],
            vec!["events.amazonaws.com"]
        );
    }

    #[test]
    fn test_ip006_task_role_only_for_environments_with_secrets() {
        let config = make_config(false, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        assert_eq!(sids(&sets.task), vec!["ReadSecretsStaging", "ReadMediaStaging"]);
        let media = statement(&sets.task, "ReadMediaStaging");
        assert_eq!(
            media.resource_arns,
            vec![
                "arn:aws:s3:::media-staging.example.com",
                "arn:aws:s3:::media-staging.example.com/*",
            ]
        );
    }

    #[test]
    fn test_ip006_task_role_empty_without_secrets() {
        let mut config = make_config(false, false);
        for payload in config.secrets.values_mut() {
            payload.clear();
        }
        let sets = compose(&config, &descriptors(&config)).unwrap();
        assert!(sets.task.statements.is_empty());
    }

    #[test]
    fn test_ip006_application_user_exceptions() {
        let config = make_config(false, false);
        let sets = compose(&config, &descriptors(&config)).unwrap();
        let exceptions: Vec<_> = sets
            .application_user
            .exceptions()
            .map(|s| s.sid.as_str())
            .collect();
        assert_eq!(
            exceptions,
            vec!["RegisterTaskDefinitions", "SendEmail", "ManageLogs", "ManageSecrets"]
        );
        assert_eq!(statement(&sets.application_user, "SendEmail").actions, vec!["ses:*"]);
        let buckets = statement(&sets.application_user, "ManageMediaBuckets");
        assert!(buckets
            .resource_arns
            .contains(&"arn:aws:s3:::media.example.com/*".to_string()));
    }

    #[test]
    fn test_ip006_missing_security_group() {
        let config = make_config(false, false);
        let ds: Vec<_> = descriptors(&config)
            .into_iter()
            .filter(|d| !(d.kind == ResourceKind::SecurityGroup && d.logical_id.starts_with("staging/")))
            .collect();
        let err = compose(&config, &ds).unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::MissingDependency);
        assert!(err.message.contains("security-group"));
        assert!(err.message.contains("staging"));
    }

    #[test]
    fn test_ip006_missing_network() {
        let config = make_config(false, false);
        let ds: Vec<_> = descriptors(&config)
            .into_iter()
            .filter(|d| d.kind != ResourceKind::Network)
            .collect();
        let err = compose(&config, &ds).unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::MissingDependency);
    }

    #[test]
    fn test_ip006_duplicate_sid_rejected() {
        let mut set = PolicySet::new(Role::TaskRole, "t");
        set.push(PolicyStatement::allow("A", &["s3:GetObject"], vec!["*".into()]))
            .unwrap();
        let err = set
            .push(PolicyStatement::allow("A", &["s3:PutObject"], vec!["*".into()]))
            .unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::DuplicateSid);
    }

    #[test]
    fn test_ip006_document_rendering() {
        let mut set = PolicySet::new(Role::BuildRole, "p");
        set.push(
            PolicyStatement::allow("X", &["ec2:CreateNetworkInterfacePermission"], vec!["*".into()])
                .with_condition("StringEquals", "ec2:AuthorizedService", vec!["codebuild.amazonaws.com".into()])
                .with_condition("StringEquals", "ec2:Subnet", vec!["a".into(), "b".into()]),
        )
        .unwrap();
        let doc = set.to_document();
        assert_eq!(doc["Version"], "2012-10-17");
        let st = &doc["Statement"][0];
        assert_eq!(st["Effect"], "Allow");
        assert_eq!(
            st["Condition"]["StringEquals"]["ec2:AuthorizedService"],
            "codebuild.amazonaws.com"
        );
        assert_eq!(st["Condition"]["StringEquals"]["ec2:Subnet"], json!(["a", "b"]));
        assert!(st.get("unscoped").is_none());
    }

    #[test]
    fn test_ip006_compose_deterministic() {
        let config = make_config(false, true);
        let ds = descriptors(&config);
        assert_eq!(compose(&config, &ds).unwrap(), compose(&config, &ds).unwrap());
    }
}
