//! Service spec validation and normalization

use crate::error::{KeelError, Result};
use crate::spec::config::{EnvironmentConfig, ServiceSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Default task-level CPU units
pub const DEFAULT_CPU_UNITS: u32 = 256;

/// Default task-level memory in MB
pub const DEFAULT_MEMORY_MB: u32 = 512;

/// Maximum namespace length. Derived physical names append a random
/// suffix and a fixed tag; the platform's name ceiling is 32 characters.
pub const MAX_NAMESPACE_LEN: usize = 22;

/// Listener rule priority bounds imposed by the platform
pub const MIN_RULE_PRIORITY: u32 = 1;
/// Upper listener rule priority bound
pub const MAX_RULE_PRIORITY: u32 = 50_000;

/// Namespace shape: lowercase alphanumeric with hyphens, letter first
pub const NAMESPACE_PATTERN: &str = "^[a-z][a-z0-9-]*$";

/// Permitted task-level (cpu units, memory MB) pairs
pub const CPU_MEMORY_COMBINATIONS: &[(u32, &[u32])] = &[
    (256, &[512, 1024, 2048]),
    (512, &[1024, 2048, 3072, 4096]),
    (1024, &[2048, 3072, 4096, 5120, 6144, 7168, 8192]),
    (
        2048,
        &[
            4096, 5120, 6144, 7168, 8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384,
        ],
    ),
    (
        4096,
        &[
            8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384, 17408, 18432, 19456,
            20480, 21504, 22528, 23552, 24576, 25600, 26624, 27648, 28672, 29696, 30720,
        ],
    ),
];

/// Whether a (cpu, memory) pair is a permitted task size
pub fn is_valid_cpu_memory(cpu_units: u32, memory_mb: u32) -> bool {
    CPU_MEMORY_COMBINATIONS
        .iter()
        .any(|(cpu, mems)| *cpu == cpu_units && mems.contains(&memory_mb))
}

/// One constraint violation, tied to the input field that caused it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Input field path
    pub field: String,
    /// Human-readable description
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All violations found in one validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Collected violations
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Whether any violation was recorded
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, field: &str, message: String) {
        self.violations.push(Violation {
            field: field.to_string(),
            message,
        });
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for violation in &self.violations {
            writeln!(f, "  - {}", violation)?;
        }
        Ok(())
    }
}

/// A spec with defaults applied and every invariant checked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSpec {
    /// Resolved namespace
    pub namespace: String,
    /// Resolved task-level CPU units
    pub cpu_units: u32,
    /// Resolved task-level memory in MB
    pub memory_mb: u32,
    /// The caller's spec, unmodified
    pub spec: ServiceSpec,
}

/// Spec validator: gates every downstream builder
pub struct Validator;

impl Validator {
    /// Apply defaults, check every invariant, and return the normalized
    /// spec, or the complete list of violations. Never mutates the input
    /// and never returns a partial result.
    pub fn validate(spec: &ServiceSpec) -> Result<NormalizedSpec> {
        let namespace = spec
            .namespace
            .clone()
            .unwrap_or_else(generate_namespace);
        let cpu_units = spec.cpu_units.unwrap_or(DEFAULT_CPU_UNITS);
        let memory_mb = spec.memory_mb.unwrap_or(DEFAULT_MEMORY_MB);

        let mut report = ValidationReport::default();

        if namespace.len() > MAX_NAMESPACE_LEN {
            report.push(
                "namespace",
                format!(
                    "namespace '{}' is {} characters long, maximum is {}",
                    namespace,
                    namespace.len(),
                    MAX_NAMESPACE_LEN
                ),
            );
        }

        let shape = regex::Regex::new(NAMESPACE_PATTERN).unwrap();
        if !shape.is_match(&namespace) {
            report.push(
                "namespace",
                format!("namespace '{}' must match {}", namespace, NAMESPACE_PATTERN),
            );
        }

        if !is_valid_cpu_memory(cpu_units, memory_mb) {
            report.push(
                "cpu_units/memory_mb",
                format!(
                    "invalid combination: {} cpu units with {} MB memory is not a supported task size",
                    cpu_units, memory_mb
                ),
            );
        }

        if spec.containers.is_empty() {
            report.push("containers", "at least one container is required".to_string());
        }

        let mut seen = HashSet::new();
        for container in &spec.containers {
            if !seen.insert(container.name.as_str()) {
                report.push(
                    "containers",
                    format!("duplicate container name '{}'", container.name),
                );
            }

            if let Some(EnvironmentConfig::Array(items)) = &container.environment {
                for item in items {
                    if !item.contains('=') {
                        report.push(
                            "containers",
                            format!(
                                "container '{}' environment entry '{}' is not KEY=value",
                                container.name, item
                            ),
                        );
                    }
                }
            }
        }

        // Widened sums: per-container values are caller-controlled and
        // must not overflow-panic before they can be reported
        let container_cpu: u64 = spec
            .containers
            .iter()
            .filter_map(|c| c.cpu_units)
            .map(u64::from)
            .sum();
        if container_cpu > u64::from(cpu_units) {
            report.push(
                "containers",
                format!(
                    "container cpu units total {} exceeds task limit {}",
                    container_cpu, cpu_units
                ),
            );
        }

        let container_memory: u64 = spec
            .containers
            .iter()
            .filter_map(|c| c.memory_mb)
            .map(u64::from)
            .sum();
        if container_memory > u64::from(memory_mb) {
            report.push(
                "containers",
                format!(
                    "container memory total {} MB exceeds task limit {} MB",
                    container_memory, memory_mb
                ),
            );
        }

        if let Some(ref alb) = spec.alb {
            if let Some(priority) = alb.rule_priority {
                if !(MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(&priority) {
                    report.push(
                        "alb.rule_priority",
                        format!(
                            "rule priority {} is outside the allowed range {}..={}",
                            priority, MIN_RULE_PRIORITY, MAX_RULE_PRIORITY
                        ),
                    );
                }
            }

            let target = &alb.port_mapping.container_name;
            if !spec.containers.iter().any(|c| &c.name == target) {
                report.push(
                    "alb.port_mapping.container_name",
                    format!("references unknown container '{}'", target),
                );
            }
        }

        if !report.is_empty() {
            return Err(KeelError::Validation(report));
        }

        Ok(NormalizedSpec {
            namespace,
            cpu_units,
            memory_mb,
            spec: spec.clone(),
        })
    }
}

/// Generate a default namespace for specs that omit one
fn generate_namespace() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("svc-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::config::{AlbIntegrationSpec, ContainerSpec, ServicePortRef};

    fn base_spec() -> ServiceSpec {
        ServiceSpec {
            namespace: Some("orders".to_string()),
            cluster: "prod".to_string(),
            vpc: "vpc-1".to_string(),
            subnets: vec!["subnet-1".to_string()],
            containers: vec![ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn violations(spec: &ServiceSpec) -> Vec<Violation> {
        match Validator::validate(spec) {
            Err(KeelError::Validation(report)) => report.violations,
            other => panic!("expected validation failure, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let normalized = Validator::validate(&base_spec()).unwrap();
        assert_eq!(normalized.cpu_units, DEFAULT_CPU_UNITS);
        assert_eq!(normalized.memory_mb, DEFAULT_MEMORY_MB);
        assert_eq!(normalized.namespace, "orders");
    }

    #[test]
    fn test_generated_namespace_is_valid() {
        let mut spec = base_spec();
        spec.namespace = None;

        let normalized = Validator::validate(&spec).unwrap();
        assert!(normalized.namespace.starts_with("svc-"));
        assert!(normalized.namespace.len() <= MAX_NAMESPACE_LEN);
    }

    #[test]
    fn test_invalid_cpu_memory_pair_names_both_values() {
        let mut spec = base_spec();
        spec.cpu_units = Some(256);
        spec.memory_mb = Some(768);

        let vs = violations(&spec);
        assert_eq!(vs.len(), 1);
        assert!(vs[0].message.contains("256"));
        assert!(vs[0].message.contains("768"));
    }

    #[test]
    fn test_valid_pairs_pass() {
        for (cpu, mems) in CPU_MEMORY_COMBINATIONS {
            for mem in *mems {
                assert!(is_valid_cpu_memory(*cpu, *mem));
            }
        }
        assert!(!is_valid_cpu_memory(128, 512));
        assert!(!is_valid_cpu_memory(256, 30720));
    }

    #[test]
    fn test_container_cpu_sum_over_limit_fails() {
        let mut spec = base_spec();
        spec.cpu_units = Some(1024);
        spec.memory_mb = Some(2048);
        spec.containers = vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                cpu_units: Some(800),
                ..Default::default()
            },
            ContainerSpec {
                name: "sidecar".to_string(),
                image: "envoy".to_string(),
                cpu_units: Some(400),
                ..Default::default()
            },
        ];

        let vs = violations(&spec);
        assert!(vs[0].message.contains("1200"));
        assert!(vs[0].message.contains("1024"));
    }

    #[test]
    fn test_container_cpu_sum_equal_to_limit_passes() {
        let mut spec = base_spec();
        spec.cpu_units = Some(1024);
        spec.memory_mb = Some(2048);
        spec.containers = vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                cpu_units: Some(512),
                ..Default::default()
            },
            ContainerSpec {
                name: "sidecar".to_string(),
                image: "envoy".to_string(),
                cpu_units: Some(512),
                ..Default::default()
            },
        ];

        assert!(Validator::validate(&spec).is_ok());
    }

    #[test]
    fn test_namespace_length_boundary() {
        let mut spec = base_spec();
        spec.namespace = Some("a".repeat(22));
        assert!(Validator::validate(&spec).is_ok());

        spec.namespace = Some("a".repeat(23));
        assert!(Validator::validate(&spec).is_err());
    }

    #[test]
    fn test_rule_priority_boundaries() {
        for (priority, ok) in [(0, false), (1, true), (50_000, true), (50_001, false)] {
            let mut spec = base_spec();
            spec.alb = Some(AlbIntegrationSpec {
                listener: "arn:listener".to_string(),
                alb_security_group: "sg-alb".to_string(),
                port_mapping: ServicePortRef {
                    container_name: "api".to_string(),
                    container_port: 8080,
                },
                rule_priority: Some(priority),
                ..Default::default()
            });

            assert_eq!(Validator::validate(&spec).is_ok(), ok, "priority {}", priority);
        }
    }

    #[test]
    fn test_dangling_container_reference() {
        let mut spec = base_spec();
        spec.alb = Some(AlbIntegrationSpec {
            listener: "arn:listener".to_string(),
            alb_security_group: "sg-alb".to_string(),
            port_mapping: ServicePortRef {
                container_name: "missing".to_string(),
                container_port: 8080,
            },
            ..Default::default()
        });

        let vs = violations(&spec);
        assert!(vs[0].message.contains("missing"));
    }

    #[test]
    fn test_all_violations_collected() {
        let mut spec = base_spec();
        spec.namespace = Some("x".repeat(30));
        spec.cpu_units = Some(123);
        spec.memory_mb = Some(456);
        spec.containers = vec![];

        let vs = violations(&spec);
        assert!(vs.len() >= 3);
    }

    #[test]
    fn test_huge_container_values_reported_without_panic() {
        let mut spec = base_spec();
        spec.containers = vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                cpu_units: Some(u32::MAX),
                memory_mb: Some(u32::MAX),
                ..Default::default()
            },
            ContainerSpec {
                name: "worker".to_string(),
                image: "worker".to_string(),
                cpu_units: Some(u32::MAX),
                memory_mb: Some(u32::MAX),
                ..Default::default()
            },
        ];

        let vs = violations(&spec);
        assert!(vs.iter().any(|v| v.message.contains("exceeds task limit")));
    }

    #[test]
    fn test_malformed_environment_entry_rejected() {
        let mut spec = base_spec();
        spec.containers[0].environment = Some(crate::spec::config::EnvironmentConfig::Array(vec![
            "MODE=prod".to_string(),
            "BROKEN".to_string(),
        ]));

        let vs = violations(&spec);
        assert_eq!(vs.len(), 1);
        assert!(vs[0].message.contains("BROKEN"));
        assert!(vs[0].message.contains("KEY=value"));
    }

    #[test]
    fn test_duplicate_container_names() {
        let mut spec = base_spec();
        spec.containers.push(ContainerSpec {
            name: "api".to_string(),
            image: "other".to_string(),
            ..Default::default()
        });

        let vs = violations(&spec);
        assert!(vs.iter().any(|v| v.message.contains("duplicate")));
    }
}
