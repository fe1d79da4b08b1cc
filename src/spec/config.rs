//! Service spec configuration types

use crate::graph::Ref;
use crate::identity::PolicyDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative description of one containerized network service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Namespace all derived resource names embed (defaulted when omitted)
    #[serde(default)]
    pub namespace: Option<String>,
    /// Target cluster reference
    pub cluster: Ref,
    /// Containers in the task
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    /// Task-level CPU units (defaults to 256)
    #[serde(default)]
    pub cpu_units: Option<u32>,
    /// Task-level memory in MB (defaults to 512)
    #[serde(default)]
    pub memory_mb: Option<u32>,
    /// Subnets the service places tasks in
    #[serde(default)]
    pub subnets: Vec<Ref>,
    /// VPC the service security group is scoped to
    pub vpc: Ref,
    /// Custom IAM policy attached verbatim to the task role
    #[serde(default)]
    pub task_policy: Option<PolicyDocument>,
    /// Optional load-balancer integration
    #[serde(default)]
    pub alb: Option<AlbIntegrationSpec>,
}

/// One container within the task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name (unique within the spec)
    pub name: String,
    /// Image reference
    pub image: String,
    /// Container CPU units
    #[serde(default)]
    pub cpu_units: Option<u32>,
    /// Container memory in MB
    #[serde(default)]
    pub memory_mb: Option<u32>,
    /// Port mappings
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    /// Plain environment variables
    #[serde(default)]
    pub environment: Option<EnvironmentConfig>,
    /// Secret-sourced environment variables
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
    /// Log group to stream container logs to (logs are discarded when unset)
    #[serde(default)]
    pub log_group: Option<Ref>,
    /// Secret holding private registry credentials
    #[serde(default)]
    pub repository_credentials: Option<Ref>,
    /// Command override
    #[serde(default)]
    pub command: Vec<String>,
    /// Entrypoint override
    #[serde(default)]
    pub entrypoint: Vec<String>,
    /// Whether the task fails when this container exits (defaults to true)
    #[serde(default)]
    pub essential: Option<bool>,
    /// Container-level health check
    #[serde(default)]
    pub health_check: Option<ContainerHealthCheck>,
    /// Ulimits
    #[serde(default)]
    pub ulimits: Vec<Ulimit>,
    /// Mount points
    #[serde(default)]
    pub mount_points: Vec<MountPoint>,
    /// Working directory
    #[serde(default)]
    pub working_dir: Option<String>,
    /// User
    #[serde(default)]
    pub user: Option<String>,
}

/// Environment variables, as a map or as KEY=value strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    /// Array of KEY=value strings
    Array(Vec<String>),
    /// Map of key to value
    Map(BTreeMap<String, String>),
}

impl EnvironmentConfig {
    /// Resolve to (name, value) pairs; map form is emitted in key order
    pub fn resolve(&self) -> Vec<(String, String)> {
        match self {
            EnvironmentConfig::Array(items) => items
                .iter()
                .filter_map(|item| {
                    item.split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                })
                .collect(),
            EnvironmentConfig::Map(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
        }
    }
}

/// Container port mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port the container listens on
    pub container_port: u16,
    /// Host port (platform-assigned when unset)
    #[serde(default)]
    pub host_port: Option<u16>,
    /// Protocol (tcp/udp, defaults to tcp)
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Where a secret value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretSource {
    /// Secrets Manager secret
    SecretsManager,
    /// Systems Manager parameter
    ParameterStore,
}

/// A secret-sourced environment variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRef {
    /// Environment variable name injected into the container
    pub env_var_name: String,
    /// ARN of the secret or parameter
    pub source_arn: Ref,
    /// Secret backend
    pub source: SecretSource,
    /// JSON key within the secret value
    #[serde(default)]
    pub json_key: Option<String>,
}

/// Load-balancer integration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbIntegrationSpec {
    /// Listener the rule is attached to
    pub listener: Ref,
    /// Security group of the load balancer (ingress source)
    pub alb_security_group: Ref,
    /// Which container/port receives forwarded traffic
    pub port_mapping: ServicePortRef,
    /// Actions evaluated before the forward action, in order
    #[serde(default)]
    pub pre_forward_actions: Vec<PreForwardAction>,
    /// Listener rule priority (platform-assigned when unset)
    #[serde(default)]
    pub rule_priority: Option<u32>,
    /// Target group health check
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,
}

/// Reference to a container port within the spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePortRef {
    /// Name of the container receiving traffic
    pub container_name: String,
    /// Container port receiving traffic
    pub container_port: u16,
}

/// An action evaluated before forwarding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PreForwardAction {
    /// Authenticate against an OIDC identity provider
    AuthenticateOidc {
        /// Issuer URL
        issuer: String,
        /// Authorization endpoint
        authorization_endpoint: String,
        /// Token endpoint
        token_endpoint: String,
        /// User info endpoint
        user_info_endpoint: String,
        /// OIDC client id
        client_id: String,
        /// Reference to the client secret
        client_secret: Ref,
        /// Requested scope
        #[serde(default)]
        scope: Option<String>,
    },
    /// Authenticate against a Cognito user pool
    AuthenticateCognito {
        /// User pool ARN
        user_pool_arn: Ref,
        /// User pool client id
        user_pool_client_id: String,
        /// User pool domain
        user_pool_domain: String,
    },
}

/// Target group health check settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Request path
    #[serde(default)]
    pub path: Option<String>,
    /// Interval between checks in seconds
    #[serde(default)]
    pub interval_seconds: Option<u32>,
    /// Per-check timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
    /// Consecutive successes before healthy
    #[serde(default)]
    pub healthy_threshold: Option<u32>,
    /// Consecutive failures before unhealthy
    #[serde(default)]
    pub unhealthy_threshold: Option<u32>,
    /// Expected HTTP status codes
    #[serde(default)]
    pub matcher: Option<String>,
}

/// Container health check command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerHealthCheck {
    /// Check command
    pub command: Vec<String>,
    /// Interval between checks in seconds
    #[serde(default)]
    pub interval_seconds: Option<u32>,
    /// Per-check timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
    /// Retries before unhealthy
    #[serde(default)]
    pub retries: Option<u32>,
    /// Grace period after start in seconds
    #[serde(default)]
    pub start_period_seconds: Option<u32>,
}

/// Ulimit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ulimit {
    /// Limit name
    pub name: String,
    /// Soft limit
    pub soft: i64,
    /// Hard limit
    pub hard: i64,
}

/// Mount point
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountPoint {
    /// Source volume name
    pub source_volume: String,
    /// Path inside the container
    pub container_path: String,
    /// Read only
    #[serde(default)]
    pub read_only: Option<bool>,
}
