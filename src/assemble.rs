//! Service assembler: combines identity, network, container, and
//! load-balancer artifacts into the final service descriptor and graph

use crate::alb::{AlbArtifacts, AlbBuilder, LoadBalancerBinding};
use crate::container::{ContainerCompiler, ContainerDefinition};
use crate::error::Result;
use crate::graph::{LogicalId, Ref, ResourceGraph, ResourceKind};
use crate::identity::{IdentityBuilder, ServiceIdentity};
use crate::network::{NetworkBuilder, SecurityGroupDescriptor};
use crate::spec::config::ServiceSpec;
use crate::validate::Validator;
use serde::{Deserialize, Serialize};

/// Network mode every task definition uses
pub const NETWORK_MODE: &str = "awsvpc";

/// Launch compatibility every task definition requires
pub const LAUNCH_COMPATIBILITY: &str = "FARGATE";

/// Deployment-wide settings supplied by the caller's configuration layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Region log streams are created in
    pub region: String,
}

/// Derived task definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinitionDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// Task family name
    pub family: String,
    /// Task-level CPU units
    pub cpu_units: u32,
    /// Task-level memory in MB
    pub memory_mb: u32,
    /// Network mode
    pub network_mode: String,
    /// Required launch compatibilities
    pub requires_compatibilities: Vec<String>,
    /// Execution role
    pub execution_role: LogicalId,
    /// Task role
    pub task_role: LogicalId,
    /// Compiled container definitions
    pub container_definitions: Vec<ContainerDefinition>,
}

impl TaskDefinitionDescriptor {
    /// Container definitions in the platform's serialized representation
    pub fn container_definitions_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.container_definitions)?)
    }
}

/// Derived compute service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// Target cluster
    pub cluster: Ref,
    /// Task definition the service runs
    pub task_definition: LogicalId,
    /// Service security group
    pub security_group: LogicalId,
    /// Subnets tasks are placed in
    pub subnets: Vec<Ref>,
    /// Whether tasks get public IPs
    pub assign_public_ip: bool,
    /// Load-balancer registration, when integrated
    pub load_balancer: Option<LoadBalancerBinding>,
    /// Resources that must exist before this service is created
    pub depends_on: Vec<LogicalId>,
}

/// Stable outputs consumed by external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOutputs {
    /// Execution role identity
    pub execution_role: LogicalId,
    /// Task role identity
    pub task_role: LogicalId,
    /// Security group identity
    pub security_group: LogicalId,
    /// Task definition identity
    pub task_definition: LogicalId,
    /// Target group identity, when ALB-integrated
    pub target_group: Option<LogicalId>,
    /// Listener rule identity, when ALB-integrated
    pub listener_rule: Option<LogicalId>,
}

/// The complete compiled resource graph for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledService {
    /// Resolved namespace
    pub namespace: String,
    /// Execution and task roles
    pub identity: ServiceIdentity,
    /// Security group
    pub security_group: SecurityGroupDescriptor,
    /// Task definition
    pub task_definition: TaskDefinitionDescriptor,
    /// Compute service
    pub service: ServiceDescriptor,
    /// Load-balancer artifacts, when integrated
    pub alb: Option<AlbArtifacts>,
    /// Dependency graph over every derived resource
    pub graph: ResourceGraph,
    /// Stable outputs
    pub outputs: ServiceOutputs,
}

/// The service provisioning compiler. A pure, synchronous pass: the same
/// normalized spec always produces a structurally identical graph.
pub struct ServiceCompiler {
    context: DeploymentContext,
}

impl ServiceCompiler {
    /// Create a compiler for one deployment context
    pub fn new(context: DeploymentContext) -> Self {
        Self { context }
    }

    /// Compile a service spec into its resource graph. Validation gates
    /// everything: no descriptor is produced unless the whole spec is
    /// consistent.
    pub fn compile(&self, spec: &ServiceSpec) -> Result<CompiledService> {
        let normalized = Validator::validate(spec)?;
        tracing::debug!(namespace = %normalized.namespace, "spec validated");

        let identity = IdentityBuilder::build(&normalized);
        let security_group = NetworkBuilder::build(&normalized);
        let container_definitions =
            ContainerCompiler::compile(&normalized.spec.containers, &self.context.region);
        let alb = AlbBuilder::build(&normalized, &security_group);

        let task_definition = TaskDefinitionDescriptor {
            id: LogicalId::derive(&normalized.namespace, "task-def"),
            family: normalized.namespace.clone(),
            cpu_units: normalized.cpu_units,
            memory_mb: normalized.memory_mb,
            network_mode: NETWORK_MODE.to_string(),
            requires_compatibilities: vec![LAUNCH_COMPATIBILITY.to_string()],
            execution_role: identity.execution_role.id.clone(),
            task_role: identity.task_role.id.clone(),
            container_definitions,
        };

        let depends_on = alb
            .as_ref()
            .map(|a| a.service_prerequisites())
            .unwrap_or_default();

        let service = ServiceDescriptor {
            id: LogicalId::derive(&normalized.namespace, "service"),
            cluster: normalized.spec.cluster.clone(),
            task_definition: task_definition.id.clone(),
            security_group: security_group.id.clone(),
            subnets: normalized.spec.subnets.clone(),
            assign_public_ip: false,
            load_balancer: alb.as_ref().map(|a| a.binding.clone()),
            depends_on,
        };

        let graph = build_graph(&identity, &security_group, &task_definition, &service, &alb);

        let outputs = ServiceOutputs {
            execution_role: identity.execution_role.id.clone(),
            task_role: identity.task_role.id.clone(),
            security_group: security_group.id.clone(),
            task_definition: task_definition.id.clone(),
            target_group: alb.as_ref().map(|a| a.target_group.id.clone()),
            listener_rule: alb.as_ref().map(|a| a.listener_rule.id.clone()),
        };

        tracing::info!(
            namespace = %normalized.namespace,
            resources = graph.nodes.len(),
            alb = alb.is_some(),
            "service compiled"
        );

        Ok(CompiledService {
            namespace: normalized.namespace,
            identity,
            security_group,
            task_definition,
            service,
            alb,
            graph,
            outputs,
        })
    }
}

/// Assemble the dependency graph. Edges follow resource references, plus
/// the explicit listener-rule-before-service constraint.
fn build_graph(
    identity: &ServiceIdentity,
    security_group: &SecurityGroupDescriptor,
    task_definition: &TaskDefinitionDescriptor,
    service: &ServiceDescriptor,
    alb: &Option<AlbArtifacts>,
) -> ResourceGraph {
    let mut graph = ResourceGraph::new();

    graph.add_node(identity.execution_role.id.clone(), ResourceKind::ExecutionRole);
    graph.add_node(identity.task_role.id.clone(), ResourceKind::TaskRole);
    graph.add_node(security_group.id.clone(), ResourceKind::SecurityGroup);
    graph.add_node(task_definition.id.clone(), ResourceKind::TaskDefinition);

    graph.add_edge(&task_definition.id, &identity.execution_role.id);
    graph.add_edge(&task_definition.id, &identity.task_role.id);

    if let Some(artifacts) = alb {
        graph.add_node(artifacts.target_group.id.clone(), ResourceKind::TargetGroup);
        graph.add_node(artifacts.listener_rule.id.clone(), ResourceKind::ListenerRule);
        graph.add_edge(&artifacts.listener_rule.id, &artifacts.target_group.id);
    }

    graph.add_node(service.id.clone(), ResourceKind::Service);
    graph.add_edge(&service.id, &task_definition.id);
    graph.add_edge(&service.id, &security_group.id);
    for prerequisite in &service.depends_on {
        graph.add_edge(&service.id, prerequisite);
    }

    graph
}
