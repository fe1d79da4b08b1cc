//! Container definition compiler: spec containers to the platform's
//! container-definition JSON shape

use crate::spec::config::ContainerSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log driver used for log-group streaming
pub const LOG_DRIVER: &str = "awslogs";

/// A name/value environment entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
}

/// Secret injection entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretInjection {
    /// Environment variable name
    pub name: String,
    /// Secret ARN, optionally suffixed with a JSON key
    pub value_from: String,
}

/// Port mapping in the platform shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMappingDefinition {
    /// Container port
    pub container_port: u16,
    /// Host port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    /// Protocol
    pub protocol: String,
}

/// Log configuration block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    /// Log driver
    pub log_driver: String,
    /// Driver options
    pub options: BTreeMap<String, String>,
}

/// Container health check in the platform shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckDefinition {
    /// Check command
    pub command: Vec<String>,
    /// Interval in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    /// Timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    /// Retries before unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Start period in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<u32>,
}

/// Ulimit in the platform shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UlimitDefinition {
    /// Limit name
    pub name: String,
    /// Soft limit
    pub soft_limit: i64,
    /// Hard limit
    pub hard_limit: i64,
}

/// Mount point in the platform shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPointDefinition {
    /// Source volume
    pub source_volume: String,
    /// Container path
    pub container_path: String,
    /// Read only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// One platform-native container definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    /// Container name
    pub name: String,
    /// Image reference
    pub image: String,
    /// CPU units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    /// Memory in MB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    /// Whether the task fails when this container exits
    pub essential: bool,
    /// Port mappings
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub port_mappings: Vec<PortMappingDefinition>,
    /// Plain environment variables
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub environment: Vec<KeyValuePair>,
    /// Secret-sourced environment variables
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub secrets: Vec<SecretInjection>,
    /// Log configuration (omitted when no log group is set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_configuration: Option<LogConfiguration>,
    /// Private registry credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_credentials: Option<RepositoryCredentials>,
    /// Command override
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub command: Vec<String>,
    /// Entrypoint override
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entry_point: Vec<String>,
    /// Health check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckDefinition>,
    /// Ulimits
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ulimits: Vec<UlimitDefinition>,
    /// Mount points
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mount_points: Vec<MountPointDefinition>,
    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// User
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Private registry credential reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCredentials {
    /// Secret holding the credentials
    pub credentials_parameter: String,
}

/// Container definition compiler
pub struct ContainerCompiler;

impl ContainerCompiler {
    /// Map spec containers to platform container definitions, one-to-one
    /// and order-preserving. Shape translation only; semantic validation
    /// has already happened.
    pub fn compile(containers: &[ContainerSpec], region: &str) -> Vec<ContainerDefinition> {
        containers
            .iter()
            .map(|c| Self::compile_one(c, region))
            .collect()
    }

    fn compile_one(container: &ContainerSpec, region: &str) -> ContainerDefinition {
        let environment = container
            .environment
            .as_ref()
            .map(|env| {
                env.resolve()
                    .into_iter()
                    .map(|(name, value)| KeyValuePair { name, value })
                    .collect()
            })
            .unwrap_or_default();

        let secrets = container
            .secrets
            .iter()
            .map(|s| SecretInjection {
                name: s.env_var_name.clone(),
                value_from: match &s.json_key {
                    Some(key) => format!("{}:{}", s.source_arn, key),
                    None => s.source_arn.clone(),
                },
            })
            .collect();

        let log_configuration = container.log_group.as_ref().map(|group| {
            let mut options = BTreeMap::new();
            options.insert("awslogs-group".to_string(), group.clone());
            options.insert("awslogs-region".to_string(), region.to_string());
            options.insert("awslogs-stream-prefix".to_string(), container.name.clone());
            LogConfiguration {
                log_driver: LOG_DRIVER.to_string(),
                options,
            }
        });

        ContainerDefinition {
            name: container.name.clone(),
            image: container.image.clone(),
            cpu: container.cpu_units,
            memory: container.memory_mb,
            essential: container.essential.unwrap_or(true),
            port_mappings: container
                .port_mappings
                .iter()
                .map(|p| PortMappingDefinition {
                    container_port: p.container_port,
                    host_port: p.host_port,
                    protocol: p.protocol.clone().unwrap_or_else(|| "tcp".to_string()),
                })
                .collect(),
            environment,
            secrets,
            log_configuration,
            repository_credentials: container.repository_credentials.as_ref().map(|arn| {
                RepositoryCredentials {
                    credentials_parameter: arn.clone(),
                }
            }),
            command: container.command.clone(),
            entry_point: container.entrypoint.clone(),
            health_check: container.health_check.as_ref().map(|h| HealthCheckDefinition {
                command: h.command.clone(),
                interval: h.interval_seconds,
                timeout: h.timeout_seconds,
                retries: h.retries,
                start_period: h.start_period_seconds,
            }),
            ulimits: container
                .ulimits
                .iter()
                .map(|u| UlimitDefinition {
                    name: u.name.clone(),
                    soft_limit: u.soft,
                    hard_limit: u.hard,
                })
                .collect(),
            mount_points: container
                .mount_points
                .iter()
                .map(|m| MountPointDefinition {
                    source_volume: m.source_volume.clone(),
                    container_path: m.container_path.clone(),
                    read_only: m.read_only,
                })
                .collect(),
            working_directory: container.working_dir.clone(),
            user: container.user.clone(),
        }
    }
}
