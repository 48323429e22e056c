//! IP-001: Project configuration, resource descriptors, policy sets, and the plan graph.
//!
//! The raw types mirror the YAML document a project is described with. The
//! canonical types are what the resolver produces after validation and
//! defaulting; everything downstream only ever sees the canonical form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Raw project document
// ============================================================================

/// Project document as written by the user. Every field is optional so the
/// resolver can report exactly which one is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProjectConfig {
    /// GitHub owner
    #[serde(default)]
    pub owner: Option<String>,

    /// GitHub repository name
    #[serde(default)]
    pub repository: Option<String>,

    /// Deployment environments (order-preserving)
    #[serde(default)]
    pub environments: Vec<String>,

    /// Account and region the stack is planned for
    #[serde(default)]
    pub target: Option<RawTarget>,

    /// DNS settings
    #[serde(default)]
    pub dns: Option<RawDns>,

    /// Network reuse flags and layout
    #[serde(default)]
    pub vpc: RawVpc,

    /// Object storage reuse flag
    #[serde(default)]
    pub storage: RawStorage,

    /// Test mode: every created resource is destroyed with the stack
    #[serde(default)]
    pub test: Option<bool>,

    /// Task sizing overrides
    #[serde(default)]
    pub task: RawTask,

    /// Per-environment secret payloads
    #[serde(default)]
    pub secrets: IndexMap<String, serde_yaml_ng::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTarget {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDns {
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVpc {
    /// Reference an existing VPC instead of creating one
    #[serde(default)]
    pub reuse: bool,

    /// Existing VPC id (required with `reuse: true`)
    #[serde(default)]
    pub external_id: Option<String>,

    /// Private subnets of the existing VPC, if known
    #[serde(default)]
    pub private_subnet_ids: Vec<String>,

    /// CIDR block for a new VPC
    #[serde(default)]
    pub cidr: Option<String>,

    /// Availability zones for a new VPC
    #[serde(default)]
    pub max_azs: Option<u32>,

    /// Subnet tiers for a new VPC
    #[serde(default)]
    pub subnets: Option<Vec<SubnetSpec>>,

    /// Security group egress policy
    #[serde(default)]
    pub allow_all_outbound: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStorage {
    #[serde(default)]
    pub reuse: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTask {
    #[serde(default)]
    pub memory_mib: Option<u32>,
    #[serde(default)]
    pub cpu: Option<u32>,
}

// ============================================================================
// Canonical project configuration
// ============================================================================

/// Deployment environment label. Used purely as a namespacing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        self.0 == "production"
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cloud account and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsTarget {
    pub account: String,
    pub region: String,
}

/// Subnet tier of a newly created network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    Public,
    Private,
    Isolated,
}

impl SubnetTier {
    pub const ALL: [SubnetTier; 3] = [Self::Public, Self::Private, Self::Isolated];

    /// Provider-side subnet type name.
    pub fn subnet_type(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE_WITH_EGRESS",
            Self::Isolated => "PRIVATE_ISOLATED",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}

/// One subnet tier in a network layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub name: String,
    pub tier: SubnetTier,
    #[serde(default = "default_cidr_mask")]
    pub cidr_mask: u8,
}

fn default_cidr_mask() -> u8 {
    24
}

/// Layout of a network the plan creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLayout {
    pub cidr: String,
    pub max_azs: u32,
    pub subnets: Vec<SubnetSpec>,
}

impl Default for NetworkLayout {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            subnets: SubnetTier::ALL
                .iter()
                .map(|tier| SubnetSpec {
                    name: tier.to_string(),
                    tier: *tier,
                    cidr_mask: default_cidr_mask(),
                })
                .collect(),
        }
    }
}

/// Where the network comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum NetworkSource {
    /// Reference an already-provisioned VPC.
    Reuse {
        external_id: String,
        #[serde(default)]
        private_subnet_ids: Vec<String>,
    },
    /// Create a new VPC with the given tiers.
    Create(NetworkLayout),
}

/// Fargate task sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSizing {
    pub memory_mib: u32,
    pub cpu: u32,
}

impl Default for TaskSizing {
    fn default() -> Self {
        Self {
            memory_mib: 512,
            cpu: 256,
        }
    }
}

/// Validated project configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub owner: String,
    pub repository: String,
    pub environments: Vec<Environment>,
    pub target: AwsTarget,
    pub dns_domain: String,
    pub network: NetworkSource,
    pub storage_reuse: bool,
    pub allow_all_outbound: bool,
    pub test_mode: bool,
    pub task: TaskSizing,
    /// One entry per declared environment, possibly empty.
    pub secrets: IndexMap<Environment, IndexMap<String, String>>,
}

impl ProjectConfig {
    pub fn vpc_reuse(&self) -> bool {
        matches!(self.network, NetworkSource::Reuse { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match &self.network {
            NetworkSource::Reuse { external_id, .. } => Some(external_id),
            NetworkSource::Create(_) => None,
        }
    }

    /// Position of an environment in declaration order.
    pub fn environment_index(&self, env: &Environment) -> Option<usize> {
        self.environments.iter().position(|e| e == env)
    }
}

// ============================================================================
// Resource descriptors
// ============================================================================

/// Resource kind. Declaration order is the emission tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Network,
    Subnet,
    SecurityGroup,
    BuildPipeline,
    BuildLogGroup,
    ServiceLogGroup,
    ContainerRegistry,
    SecretStore,
    ObjectStore,
    Cluster,
    TaskRole,
    ExecutionRole,
    TaskDefinition,
    LoadBalancedService,
    ApplicationIdentity,
}

impl ResourceKind {
    /// Stable slug used in logical ids.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security-group",
            Self::BuildPipeline => "build-pipeline",
            Self::BuildLogGroup => "build-log-group",
            Self::ServiceLogGroup => "service-log-group",
            Self::ContainerRegistry => "container-registry",
            Self::SecretStore => "secret-store",
            Self::ObjectStore => "object-store",
            Self::Cluster => "cluster",
            Self::TaskRole => "task-role",
            Self::ExecutionRole => "execution-role",
            Self::TaskDefinition => "task-definition",
            Self::LoadBalancedService => "load-balanced-service",
            Self::ApplicationIdentity => "application-identity",
        }
    }

    /// Whether the kind holds data that outlives a stack teardown.
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            Self::BuildLogGroup
                | Self::ServiceLogGroup
                | Self::ContainerRegistry
                | Self::SecretStore
                | Self::ObjectStore
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Create a new resource or reference an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Create,
    Reference,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Reference => write!(f, "REFERENCE"),
        }
    }
}

/// What happens to the resource when the stack is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Retain,
    Destroy,
}

/// A single planned resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub logical_id: String,
    /// `None` for resources shared by every environment
    pub environment: Option<Environment>,
    pub disposition: Disposition,
    pub derived_name: String,
    /// ARN, possibly containing `{{id:<logical_id>}}` placeholders
    pub derived_arn_template: String,
    pub depends_on: Vec<String>,
    pub removal: RemovalPolicy,
    pub tags: IndexMap<String, String>,
    /// Kind-specific attributes for the provisioning layer
    pub properties: serde_json::Value,
}

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Logical IAM role a policy set is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    BuildRole,
    ExecutionRole,
    TaskRole,
    ApplicationUserRole,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Self::BuildRole,
        Self::ExecutionRole,
        Self::TaskRole,
        Self::ApplicationUserRole,
    ];

    /// Roles whose statements must stay within the plan's own ARNs.
    pub fn is_least_privilege(&self) -> bool {
        !matches!(self, Self::ApplicationUserRole)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildRole => write!(f, "build"),
            Self::ExecutionRole => write!(f, "execution"),
            Self::TaskRole => write!(f, "task"),
            Self::ApplicationUserRole => write!(f, "app"),
        }
    }
}

/// One IAM permission statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resource_arns: Vec<String>,
    /// Operator -> condition key -> values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<IndexMap<String, IndexMap<String, Vec<String>>>>,
    /// Reason the statement is an explicit exception to least privilege
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unscoped: Option<String>,
}

/// Ordered statements for one role. Sids are unique within a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    pub role: Role,
    pub name: String,
    pub statements: Vec<PolicyStatement>,
}

/// The four policy sets of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySets {
    pub build: PolicySet,
    pub execution: PolicySet,
    pub task: PolicySet,
    pub application_user: PolicySet,
}

impl PolicySets {
    pub fn get(&self, role: Role) -> &PolicySet {
        match role {
            Role::BuildRole => &self.build,
            Role::ExecutionRole => &self.execution,
            Role::TaskRole => &self.task,
            Role::ApplicationUserRole => &self.application_user,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicySet> {
        Role::ALL.into_iter().map(move |role| self.get(role))
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Caller-controlled planning switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Fan environment passes out over the rayon pool
    pub parallel: bool,
    /// Stop each pass after creating a new network
    pub network_only_bootstrap: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            network_only_bootstrap: false,
        }
    }
}

/// Final planning artifact handed to the provisioning layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Descriptors keyed by logical id, in emission order
    pub resources: IndexMap<String, ResourceDescriptor>,
    pub policies: PolicySets,
    /// Topological emission order
    pub order: Vec<String>,
    /// `blake3:<hex>` over resources, policies and order
    pub fingerprint: String,
}

/// Counts for the plan footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub environments: usize,
    pub to_create: u32,
    pub to_reference: u32,
    pub statements: IndexMap<Role, usize>,
    /// `(role, sid, reason)` for every unscoped statement
    pub exceptions: Vec<(Role, String, String)>,
}

// ============================================================================
// YAML helper
// ============================================================================

/// Convert a scalar serde_yaml_ng::Value to a string. Returns `None` for
/// mappings, sequences, and tagged values.
pub fn yaml_scalar_to_string(val: &serde_yaml_ng::Value) -> Option<String> {
    match val {
        serde_yaml_ng::Value::String(s) => Some(s.clone()),
        serde_yaml_ng::Value::Number(n) => Some(n.to_string()),
        serde_yaml_ng::Value::Bool(b) => Some(b.to_string()),
        serde_yaml_ng::Value::Null => Some(String::new()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
