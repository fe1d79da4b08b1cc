//! Identity builder: execution role, task role, and derived IAM policies

use crate::graph::LogicalId;
use crate::spec::config::{SecretSource, ServiceSpec};
use crate::validate::NormalizedSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Principal allowed to assume task roles
pub const TASK_TRUST_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Baseline managed policy every execution role carries
pub const BASELINE_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// IAM policy document version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the listed actions
    Allow,
    /// Deny the listed actions
    Deny,
}

/// Statement principal (service principals only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Service principal
    #[serde(rename = "Service")]
    pub service: String,
}

/// One IAM policy statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    /// Effect
    pub effect: Effect,
    /// Actions
    pub action: Vec<String>,
    /// Resources the actions are scoped to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    /// Principal (trust policies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

/// An IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Document version
    pub version: String,
    /// Statements
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// Document with the given statements and the standard version
    pub fn with_statements(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: statements,
        }
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::with_statements(Vec::new())
    }
}

/// A named inline policy attached to a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlinePolicy {
    /// Policy name, unique per role
    pub name: String,
    /// Policy document
    pub document: PolicyDocument,
}

/// A derived IAM role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// Trust policy
    pub trust_policy: PolicyDocument,
    /// Attached managed policy ARNs
    pub managed_policy_arns: Vec<String>,
    /// Attached inline policies
    pub inline_policies: Vec<InlinePolicy>,
}

/// Execution and task roles for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Role the platform assumes to pull images and configure logging
    pub execution_role: RoleDescriptor,
    /// Role the running application assumes
    pub task_role: RoleDescriptor,
}

/// Identity builder
pub struct IdentityBuilder;

impl IdentityBuilder {
    /// Derive the execution and task roles for a normalized spec
    pub fn build(normalized: &NormalizedSpec) -> ServiceIdentity {
        let trust = trust_policy();

        let execution_role = RoleDescriptor {
            id: LogicalId::derive(&normalized.namespace, "execution-role"),
            trust_policy: trust.clone(),
            managed_policy_arns: vec![BASELINE_EXECUTION_POLICY_ARN.to_string()],
            inline_policies: derive_execution_policies(&normalized.spec),
        };

        let mut task_inline = Vec::new();
        if let Some(ref policy) = normalized.spec.task_policy {
            // Attached verbatim: the compiler does not interpret its contents
            task_inline.push(InlinePolicy {
                name: "task-policy".to_string(),
                document: policy.clone(),
            });
        }

        let task_role = RoleDescriptor {
            id: LogicalId::derive(&normalized.namespace, "task-role"),
            trust_policy: trust,
            managed_policy_arns: Vec::new(),
            inline_policies: task_inline,
        };

        ServiceIdentity {
            execution_role,
            task_role,
        }
    }
}

/// Trust policy permitting the task-launch principal to assume the role
fn trust_policy() -> PolicyDocument {
    PolicyDocument::with_statements(vec![PolicyStatement {
        effect: Effect::Allow,
        action: vec!["sts:AssumeRole".to_string()],
        resource: Vec::new(),
        principal: Some(Principal {
            service: TASK_TRUST_PRINCIPAL.to_string(),
        }),
    }])
}

/// Derive the conditional inline policies of the execution role from the
/// features the spec actually uses. Pure: one pass over the spec, one
/// statement set per feature, ARNs deduplicated and sorted.
pub fn derive_execution_policies(spec: &ServiceSpec) -> Vec<InlinePolicy> {
    let mut policies = Vec::new();

    // Stream actions act on log-stream ARNs, so each group is granted
    // with the :* stream wildcard
    let log_groups: BTreeSet<String> = spec
        .containers
        .iter()
        .filter_map(|c| c.log_group.as_ref())
        .map(|group| format!("{}:*", group))
        .collect();
    if !log_groups.is_empty() {
        policies.push(InlinePolicy {
            name: "logs".to_string(),
            document: PolicyDocument::with_statements(vec![PolicyStatement {
                effect: Effect::Allow,
                action: vec![
                    "logs:CreateLogStream".to_string(),
                    "logs:PutLogEvents".to_string(),
                ],
                resource: log_groups.into_iter().collect(),
                principal: None,
            }]),
        });
    }

    let secret_arns: BTreeSet<String> = spec
        .containers
        .iter()
        .flat_map(|c| c.secrets.iter())
        .filter(|s| s.source == SecretSource::SecretsManager)
        .map(|s| s.source_arn.clone())
        .collect();
    if !secret_arns.is_empty() {
        policies.push(InlinePolicy {
            name: "secrets-manager".to_string(),
            document: PolicyDocument::with_statements(vec![PolicyStatement {
                effect: Effect::Allow,
                action: vec!["secretsmanager:GetSecretValue".to_string()],
                resource: secret_arns.into_iter().collect(),
                principal: None,
            }]),
        });
    }

    let parameter_arns: BTreeSet<String> = spec
        .containers
        .iter()
        .flat_map(|c| c.secrets.iter())
        .filter(|s| s.source == SecretSource::ParameterStore)
        .map(|s| s.source_arn.clone())
        .collect();
    if !parameter_arns.is_empty() {
        policies.push(InlinePolicy {
            name: "parameter-store".to_string(),
            document: PolicyDocument::with_statements(vec![PolicyStatement {
                effect: Effect::Allow,
                action: vec![
                    "ssm:GetParameter".to_string(),
                    "ssm:GetParameters".to_string(),
                ],
                resource: parameter_arns.into_iter().collect(),
                principal: None,
            }]),
        });
    }

    let credential_arns: BTreeSet<String> = spec
        .containers
        .iter()
        .filter_map(|c| c.repository_credentials.clone())
        .collect();
    if !credential_arns.is_empty() {
        policies.push(InlinePolicy {
            name: "repository-credentials".to_string(),
            document: PolicyDocument::with_statements(vec![PolicyStatement {
                effect: Effect::Allow,
                action: vec!["secretsmanager:GetSecretValue".to_string()],
                resource: credential_arns.into_iter().collect(),
                principal: None,
            }]),
        });
    }

    policies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::config::{ContainerSpec, SecretRef};
    use crate::validate::Validator;

    fn spec_with_containers(containers: Vec<ContainerSpec>) -> ServiceSpec {
        ServiceSpec {
            namespace: Some("orders".to_string()),
            cluster: "prod".to_string(),
            vpc: "vpc-1".to_string(),
            containers,
            ..Default::default()
        }
    }

    fn secret(name: &str, arn: &str, source: SecretSource, key: Option<&str>) -> SecretRef {
        SecretRef {
            env_var_name: name.to_string(),
            source_arn: arn.to_string(),
            source,
            json_key: key.map(str::to_string),
        }
    }

    #[test]
    fn test_bare_spec_has_only_baseline_policy() {
        let spec = spec_with_containers(vec![ContainerSpec {
            name: "api".to_string(),
            image: "nginx".to_string(),
            ..Default::default()
        }]);

        let normalized = Validator::validate(&spec).unwrap();
        let identity = IdentityBuilder::build(&normalized);

        assert_eq!(
            identity.execution_role.managed_policy_arns,
            vec![BASELINE_EXECUTION_POLICY_ARN.to_string()]
        );
        assert!(identity.execution_role.inline_policies.is_empty());
        assert!(identity.task_role.inline_policies.is_empty());
    }

    #[test]
    fn test_trust_policy_names_task_principal() {
        let spec = spec_with_containers(vec![ContainerSpec {
            name: "api".to_string(),
            image: "nginx".to_string(),
            ..Default::default()
        }]);

        let normalized = Validator::validate(&spec).unwrap();
        let identity = IdentityBuilder::build(&normalized);

        let principal = identity.execution_role.trust_policy.statement[0]
            .principal
            .as_ref()
            .unwrap();
        assert_eq!(principal.service, TASK_TRUST_PRINCIPAL);
    }

    #[test]
    fn test_duplicate_secret_arns_deduplicated() {
        let arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:db";
        let spec = spec_with_containers(vec![ContainerSpec {
            name: "api".to_string(),
            image: "nginx".to_string(),
            secrets: vec![
                secret("DB_USER", arn, SecretSource::SecretsManager, Some("user")),
                secret("DB_PASS", arn, SecretSource::SecretsManager, Some("pass")),
            ],
            ..Default::default()
        }]);

        let policies = derive_execution_policies(&spec);
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, "secrets-manager");
        assert_eq!(policies[0].document.statement[0].resource, vec![arn.to_string()]);
    }

    #[test]
    fn test_log_groups_unioned_across_containers() {
        let spec = spec_with_containers(vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                log_group: Some("arn:aws:logs:us-east-1:1:log-group:/svc/api".to_string()),
                ..Default::default()
            },
            ContainerSpec {
                name: "sidecar".to_string(),
                image: "envoy".to_string(),
                log_group: Some("arn:aws:logs:us-east-1:1:log-group:/svc/sidecar".to_string()),
                ..Default::default()
            },
        ]);

        let policies = derive_execution_policies(&spec);
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, "logs");
        assert_eq!(
            policies[0].document.statement[0].resource,
            vec![
                "arn:aws:logs:us-east-1:1:log-group:/svc/api:*".to_string(),
                "arn:aws:logs:us-east-1:1:log-group:/svc/sidecar:*".to_string(),
            ]
        );
    }

    #[test]
    fn test_shared_log_group_grants_one_stream_wildcard() {
        let group = "arn:aws:logs:us-east-1:1:log-group:/svc/shared";
        let spec = spec_with_containers(vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                log_group: Some(group.to_string()),
                ..Default::default()
            },
            ContainerSpec {
                name: "worker".to_string(),
                image: "worker".to_string(),
                log_group: Some(group.to_string()),
                ..Default::default()
            },
        ]);

        let policies = derive_execution_policies(&spec);
        assert_eq!(
            policies[0].document.statement[0].resource,
            vec![format!("{}:*", group)]
        );
    }

    #[test]
    fn test_parameter_store_gets_its_own_policy() {
        let spec = spec_with_containers(vec![ContainerSpec {
            name: "api".to_string(),
            image: "nginx".to_string(),
            secrets: vec![
                secret(
                    "TOKEN",
                    "arn:aws:ssm:us-east-1:1:parameter/svc/token",
                    SecretSource::ParameterStore,
                    None,
                ),
                secret(
                    "DB",
                    "arn:aws:secretsmanager:us-east-1:1:secret:db",
                    SecretSource::SecretsManager,
                    None,
                ),
            ],
            ..Default::default()
        }]);

        let policies = derive_execution_policies(&spec);
        let names: Vec<&str> = policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["secrets-manager", "parameter-store"]);
    }

    #[test]
    fn test_repository_credentials_deduplicated() {
        let arn = "arn:aws:secretsmanager:us-east-1:1:secret:registry";
        let spec = spec_with_containers(vec![
            ContainerSpec {
                name: "api".to_string(),
                image: "private/app".to_string(),
                repository_credentials: Some(arn.to_string()),
                ..Default::default()
            },
            ContainerSpec {
                name: "worker".to_string(),
                image: "private/worker".to_string(),
                repository_credentials: Some(arn.to_string()),
                ..Default::default()
            },
        ]);

        let policies = derive_execution_policies(&spec);
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].document.statement[0].resource, vec![arn.to_string()]);
    }

    #[test]
    fn test_custom_task_policy_attached_verbatim() {
        let custom = PolicyDocument::with_statements(vec![PolicyStatement {
            effect: Effect::Allow,
            action: vec!["s3:GetObject".to_string()],
            resource: vec!["arn:aws:s3:::bucket/*".to_string()],
            principal: None,
        }]);

        let mut spec = spec_with_containers(vec![ContainerSpec {
            name: "api".to_string(),
            image: "nginx".to_string(),
            ..Default::default()
        }]);
        spec.task_policy = Some(custom.clone());

        let normalized = Validator::validate(&spec).unwrap();
        let identity = IdentityBuilder::build(&normalized);

        assert_eq!(identity.task_role.inline_policies.len(), 1);
        assert_eq!(identity.task_role.inline_policies[0].document, custom);
    }

    #[test]
    fn test_policy_document_json_shape() {
        let doc = PolicyDocument::with_statements(vec![PolicyStatement {
            effect: Effect::Allow,
            action: vec!["logs:PutLogEvents".to_string()],
            resource: vec!["arn:aws:logs:us-east-1:1:log-group:/g".to_string()],
            principal: None,
        }]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["Version"], "2012-10-17");
        assert_eq!(json["Statement"][0]["Effect"], "Allow");
        assert_eq!(json["Statement"][0]["Action"][0], "logs:PutLogEvents");
    }
}
