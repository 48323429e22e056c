//! IP-005: Per-environment topology resolution.
//!
//! One pass per environment decides which resources to create and which to
//! reference, in three steps: network, storage, compute. Passes are pure and
//! share nothing, so they can run in any order or in parallel.

use super::error::TopologyError;
use super::naming::{self, LogKind};
use super::types::*;
use indexmap::IndexMap;
use serde_json::json;

/// Container listening port, host and container side.
pub const CONTAINER_PORT: u16 = 3000;
/// Load balancer health check path.
pub const HEALTH_CHECK_PATH: &str = "/health_check";
/// Database port opened on the security group.
pub const DATABASE_PORT: u16 = 3306;
/// Local build cache modes.
pub const BUILD_CACHE_MODES: [&str; 2] = ["LOCAL_DOCKER_LAYER_CACHE", "LOCAL_SOURCE_CACHE"];
/// Buildspec location inside the repository.
pub const BUILDSPEC_PATH: &str = ".aws/codebuild/buildspec.yml";
/// Image tag the build publishes and the service runs.
pub const IMAGE_TAG: &str = "latest";

/// Logical id: the kind slug for shared resources, `<env>/<slug>` otherwise.
pub fn logical_id(env: Option<&Environment>, kind: ResourceKind) -> String {
    match env {
        Some(env) => format!("{}/{}", env, kind.slug()),
        None => kind.slug().to_string(),
    }
}

fn subnet_logical_id(subnet: &str) -> String {
    format!("{}-{}", ResourceKind::Subnet.slug(), subnet)
}

impl ResourceDescriptor {
    fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

fn descriptor(
    config: &ProjectConfig,
    env: Option<&Environment>,
    kind: ResourceKind,
    disposition: Disposition,
    derived_name: String,
    derived_arn_template: String,
) -> ResourceDescriptor {
    let removal = match disposition {
        Disposition::Reference => RemovalPolicy::Retain,
        Disposition::Create if config.test_mode => RemovalPolicy::Destroy,
        Disposition::Create if kind.is_stateful() => RemovalPolicy::Retain,
        Disposition::Create => RemovalPolicy::Destroy,
    };

    let mut tags = IndexMap::new();
    tags.insert("Project".to_string(), config.repository.clone());
    if let Some(env) = env {
        tags.insert("Env".to_string(), env.to_string());
    }

    ResourceDescriptor {
        kind,
        logical_id: logical_id(env, kind),
        environment: env.cloned(),
        disposition,
        derived_name,
        derived_arn_template,
        depends_on: Vec::new(),
        removal,
        tags,
        properties: json!({}),
    }
}

/// Network resolution. The descriptors are shared by every environment and
/// identical in every pass.
pub fn network_descriptors(config: &ProjectConfig) -> Vec<ResourceDescriptor> {
    let ProjectConfig { owner, repository, target, .. } = config;

    match &config.network {
        NetworkSource::Reuse {
            external_id,
            private_subnet_ids,
        } => {
            let subnet_arns: Vec<String> = private_subnet_ids
                .iter()
                .map(|id| naming::subnet_arn(&target.region, &target.account, id))
                .collect();
            vec![descriptor(
                config,
                None,
                ResourceKind::Network,
                Disposition::Reference,
                external_id.clone(),
                naming::network_arn(&target.region, &target.account, external_id),
            )
            .with_properties(json!({
                "vpcId": external_id,
                "privateSubnetIds": private_subnet_ids,
                "privateSubnetArns": subnet_arns,
            }))]
        }
        NetworkSource::Create(layout) => {
            let network_id = logical_id(None, ResourceKind::Network);
            let subnet_configuration: Vec<_> = layout
                .subnets
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "tier": s.tier.to_string(),
                        "subnetType": s.tier.subnet_type(),
                        "cidrMask": s.cidr_mask,
                    })
                })
                .collect();

            let mut out = vec![descriptor(
                config,
                None,
                ResourceKind::Network,
                Disposition::Create,
                naming::network_name(owner, repository),
                naming::network_arn(
                    &target.region,
                    &target.account,
                    &naming::id_placeholder(&network_id),
                ),
            )
            .with_properties(json!({
                "cidr": layout.cidr,
                "maxAzs": layout.max_azs,
                "subnetConfiguration": subnet_configuration,
            }))];

            for subnet in &layout.subnets {
                let mut d = descriptor(
                    config,
                    None,
                    ResourceKind::Subnet,
                    Disposition::Create,
                    naming::subnet_name(owner, repository, &subnet.name),
                    String::new(),
                );
                d.logical_id = subnet_logical_id(&subnet.name);
                d.derived_arn_template = naming::subnet_arn(
                    &target.region,
                    &target.account,
                    &naming::id_placeholder(&d.logical_id),
                );
                out.push(
                    d.with_depends_on(vec![network_id.clone()]).with_properties(json!({
                        "tier": subnet.tier.to_string(),
                        "subnetType": subnet.tier.subnet_type(),
                        "cidrMask": subnet.cidr_mask,
                        "availabilityZones": layout.max_azs,
                    })),
                );
            }
            out
        }
    }
}

/// Subnets the build project and the service run in: private tier logical
/// ids for a created network, the configured ids for a referenced one.
fn private_subnets(config: &ProjectConfig) -> Vec<String> {
    match &config.network {
        NetworkSource::Reuse {
            private_subnet_ids, ..
        } => private_subnet_ids.clone(),
        NetworkSource::Create(layout) => layout
            .subnets
            .iter()
            .filter(|s| s.tier == SubnetTier::Private)
            .map(|s| subnet_logical_id(&s.name))
            .collect(),
    }
}

/// Shared identity for the application layer.
pub fn build_shared(config: &ProjectConfig) -> Vec<ResourceDescriptor> {
    let user = naming::application_user_name(&config.owner, &config.repository);
    vec![descriptor(
        config,
        None,
        ResourceKind::ApplicationIdentity,
        Disposition::Create,
        user.clone(),
        naming::user_arn(&config.target.account, &user),
    )
    .with_properties(json!({
        "userName": user,
        "policySet": Role::ApplicationUserRole.to_string(),
    }))]
}

/// Resolve the resources of one environment.
pub fn build(
    config: &ProjectConfig,
    env: &Environment,
    options: &PlanOptions,
) -> Result<Vec<ResourceDescriptor>, TopologyError> {
    if config.environment_index(env).is_none() {
        return Err(TopologyError::unresolved(
            env.as_str(),
            "environment is not declared in the project",
        ));
    }
    if let NetworkSource::Reuse { external_id, .. } = &config.network {
        if external_id.trim().is_empty() {
            return Err(TopologyError::unresolved(
                env.as_str(),
                "network reuse requested without an external vpc id",
            ));
        }
    }

    // Step 1: network
    let mut out = network_descriptors(config);
    if options.network_only_bootstrap && !config.vpc_reuse() {
        tracing::warn!(
            environment = %env,
            "network-only bootstrap: skipping storage and compute after creating the vpc"
        );
        return Ok(out);
    }

    // Step 2: storage
    out.push(object_store(config, env));

    // Step 3: compute
    out.extend(compute(config, env));

    tracing::debug!(
        environment = %env,
        resources = out.len(),
        "environment topology resolved"
    );
    Ok(out)
}

fn object_store(config: &ProjectConfig, env: &Environment) -> ResourceDescriptor {
    let bucket = naming::bucket_name(&config.dns_domain, env);
    let bucket_arn = naming::bucket_arn(&bucket);
    let objects_arn = naming::bucket_objects_arn(&bucket);

    if config.storage_reuse {
        return descriptor(
            config,
            Some(env),
            ResourceKind::ObjectStore,
            Disposition::Reference,
            bucket.clone(),
            bucket_arn.clone(),
        )
        .with_properties(json!({
            "bucketName": bucket,
            "bucketArn": bucket_arn,
            "objectsArn": objects_arn,
        }));
    }

    descriptor(
        config,
        Some(env),
        ResourceKind::ObjectStore,
        Disposition::Create,
        bucket.clone(),
        bucket_arn.clone(),
    )
    .with_properties(json!({
        "bucketName": bucket,
        "bucketArn": bucket_arn,
        "objectsArn": objects_arn,
        "publicReadAccess": true,
        "bucketPolicy": {
            "Version": "2012-10-17",
            "Statement": [{
                "Sid": "PublicReadGetObject",
                "Effect": "Allow",
                "Principal": "*",
                "Action": "s3:GetObject",
                "Resource": objects_arn,
            }],
        },
    }))
}

fn compute(config: &ProjectConfig, env: &Environment) -> Vec<ResourceDescriptor> {
    let ProjectConfig { owner, repository: repo, target, .. } = config;
    let (region, account) = (target.region.as_str(), target.account.as_str());
    let id = |kind| logical_id(Some(env), kind);
    let network_id = logical_id(None, ResourceKind::Network);
    let subnets = private_subnets(config);

    let registry = naming::registry_name(owner, repo, env);
    let image = naming::image_uri(region, account, &registry, IMAGE_TAG);
    let container_registry = descriptor(
        config,
        Some(env),
        ResourceKind::ContainerRegistry,
        Disposition::Create,
        registry.clone(),
        naming::ecr_repo_arn(region, account, &registry),
    )
    .with_properties(json!({
        "repositoryName": registry,
        "imageUri": image,
    }));

    let build_logs = naming::log_group_name(LogKind::Build, owner, repo, env);
    let build_log_group = descriptor(
        config,
        Some(env),
        ResourceKind::BuildLogGroup,
        Disposition::Create,
        build_logs.clone(),
        naming::log_group_arn(region, account, &build_logs),
    )
    .with_properties(json!({ "logGroupName": build_logs }));

    let service_logs = naming::log_group_name(LogKind::Service, owner, repo, env);
    let service_log_group = descriptor(
        config,
        Some(env),
        ResourceKind::ServiceLogGroup,
        Disposition::Create,
        service_logs.clone(),
        naming::log_group_arn(region, account, &service_logs),
    )
    .with_properties(json!({ "logGroupName": service_logs }));

    let payload = config.secrets.get(env).cloned().unwrap_or_default();
    let secret = naming::secret_name(owner, repo, env);
    let secret_store = descriptor(
        config,
        Some(env),
        ResourceKind::SecretStore,
        Disposition::Create,
        secret.clone(),
        naming::secret_arn_pattern(region, account, env, owner, repo),
    )
    .with_properties(json!({
        "secretName": secret,
        "keys": payload.keys().collect::<Vec<_>>(),
    }));

    let security_group_id = id(ResourceKind::SecurityGroup);
    let security_group = descriptor(
        config,
        Some(env),
        ResourceKind::SecurityGroup,
        Disposition::Create,
        naming::security_group_name(owner, repo, env),
        naming::security_group_arn(region, account, &naming::id_placeholder(&security_group_id)),
    )
    .with_depends_on(vec![network_id.clone()])
    .with_properties(json!({
        "vpc": network_id,
        "ingress": [{ "protocol": "tcp", "port": DATABASE_PORT, "cidr": "0.0.0.0/0" }],
        "allowAllOutbound": config.allow_all_outbound,
    }));

    let project = naming::build_project_name(owner, repo, env);
    let build_role = naming::build_role_name(owner, repo);
    let build_pipeline = descriptor(
        config,
        Some(env),
        ResourceKind::BuildPipeline,
        Disposition::Create,
        project.clone(),
        naming::build_project_arn(region, account, &project),
    )
    .with_depends_on(vec![
        security_group_id.clone(),
        id(ResourceKind::ContainerRegistry),
        id(ResourceKind::SecretStore),
        id(ResourceKind::BuildLogGroup),
    ])
    .with_properties(json!({
        "projectName": project,
        "description": format!(
            "Build to project {}, source from github, deploy to ECS fargate.",
            repo
        ),
        "source": { "type": "GITHUB", "owner": owner, "repo": repo },
        "buildSpec": BUILDSPEC_PATH,
        "privileged": true,
        "buildImage": image,
        "cache": { "type": "LOCAL", "modes": BUILD_CACHE_MODES },
        "logging": { "cloudWatch": true, "logGroup": build_logs },
        "serviceRole": {
            "roleName": build_role,
            "path": "/service-role/",
            "arn": naming::service_role_arn(account, &build_role),
            "managedPolicy": naming::managed_policy_name(owner, repo),
        },
        "vpc": network_id,
        "subnets": subnets,
        "securityGroups": [security_group_id],
        "environmentVariables": {
            "ENVIRONMENT": env.as_str(),
            "SECRET_NAME": secret,
        },
    }));

    let cluster_name = naming::cluster_name(owner, repo, Some(env));
    let cluster = descriptor(
        config,
        Some(env),
        ResourceKind::Cluster,
        Disposition::Create,
        cluster_name.clone(),
        naming::cluster_arn(region, account, &cluster_name),
    )
    .with_depends_on(vec![network_id.clone()])
    .with_properties(json!({ "clusterName": cluster_name, "vpc": network_id }));

    let task_role_name = naming::task_role_name(owner, repo, env);
    let task_role = descriptor(
        config,
        Some(env),
        ResourceKind::TaskRole,
        Disposition::Create,
        task_role_name.clone(),
        naming::role_arn(account, &task_role_name),
    )
    .with_properties(json!({
        "roleName": task_role_name,
        "assumedBy": "ecs-tasks.amazonaws.com",
        "policySet": Role::TaskRole.to_string(),
    }));

    let execution_role_name = naming::execution_role_name(owner, repo, env);
    let execution_role = descriptor(
        config,
        Some(env),
        ResourceKind::ExecutionRole,
        Disposition::Create,
        execution_role_name.clone(),
        naming::role_arn(account, &execution_role_name),
    )
    .with_properties(json!({
        "roleName": execution_role_name,
        "assumedBy": "ecs-tasks.amazonaws.com",
        "policySet": Role::ExecutionRole.to_string(),
    }));

    let secret_ref = naming::id_placeholder(&id(ResourceKind::SecretStore));
    let container_secrets: Vec<_> = payload
        .keys()
        .map(|key| json!({ "name": key, "valueFrom": format!("{}:{}::", secret_ref, key) }))
        .collect();
    let family = naming::task_family(owner, repo, env);
    let task_definition = descriptor(
        config,
        Some(env),
        ResourceKind::TaskDefinition,
        Disposition::Create,
        family.clone(),
        naming::task_definition_arn(region, account, &family),
    )
    .with_depends_on(vec![
        id(ResourceKind::ContainerRegistry),
        id(ResourceKind::ServiceLogGroup),
        id(ResourceKind::TaskRole),
        id(ResourceKind::ExecutionRole),
        id(ResourceKind::SecretStore),
    ])
    .with_properties(json!({
        "family": family,
        "cpu": config.task.cpu,
        "memoryMiB": config.task.memory_mib,
        "networkMode": "awsvpc",
        "requiresCompatibilities": ["FARGATE"],
        "taskRole": id(ResourceKind::TaskRole),
        "executionRole": id(ResourceKind::ExecutionRole),
        "container": {
            "name": "web",
            "image": image,
            "portMappings": [{
                "containerPort": CONTAINER_PORT,
                "hostPort": CONTAINER_PORT,
                "protocol": "tcp",
            }],
            "logging": { "driver": "awslogs", "logGroup": service_logs, "streamPrefix": "web" },
            "secrets": container_secrets,
        },
    }));

    let service = naming::service_name(owner, repo, env);
    let load_balanced_service = descriptor(
        config,
        Some(env),
        ResourceKind::LoadBalancedService,
        Disposition::Create,
        service.clone(),
        naming::service_arn(region, account, &cluster_name, &service),
    )
    .with_depends_on(vec![
        id(ResourceKind::TaskDefinition),
        id(ResourceKind::Cluster),
        security_group_id.clone(),
    ])
    .with_properties(json!({
        "serviceName": service,
        "cluster": id(ResourceKind::Cluster),
        "taskDefinition": id(ResourceKind::TaskDefinition),
        "desiredCount": 1,
        "publicLoadBalancer": true,
        "listenerPort": 80,
        "targetPort": CONTAINER_PORT,
        "healthCheck": { "path": HEALTH_CHECK_PATH },
        "securityGroups": [security_group_id],
        "subnets": subnets,
        "domainZone": config.dns_domain,
    }));

    vec![
        container_registry,
        build_log_group,
        service_log_group,
        secret_store,
        security_group,
        build_pipeline,
        cluster,
        task_role,
        execution_role,
        task_definition,
        load_balanced_service,
    ]
}
