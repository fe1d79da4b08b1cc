//! Resource identities and the creation-order dependency graph

use crate::error::{KeelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque reference to an externally-managed resource (VPC id, subnet id,
/// listener ARN, secret ARN, ...). Never dereferenced by the compiler.
pub type Ref = String;

/// Stable logical identity of a derived resource, deterministically
/// derived from the service namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive a logical id from the namespace and a resource suffix
    pub fn derive(namespace: &str, suffix: &str) -> Self {
        Self(format!("{}-{}", namespace, suffix))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of resources the compiler derives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Role assumed by the platform to launch the task
    ExecutionRole,
    /// Role assumed by the running application
    TaskRole,
    /// Service security group
    SecurityGroup,
    /// Load balancer target group
    TargetGroup,
    /// Load balancer listener rule
    ListenerRule,
    /// Task definition
    TaskDefinition,
    /// The compute service itself
    Service,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::ExecutionRole => write!(f, "execution-role"),
            ResourceKind::TaskRole => write!(f, "task-role"),
            ResourceKind::SecurityGroup => write!(f, "security-group"),
            ResourceKind::TargetGroup => write!(f, "target-group"),
            ResourceKind::ListenerRule => write!(f, "listener-rule"),
            ResourceKind::TaskDefinition => write!(f, "task-definition"),
            ResourceKind::Service => write!(f, "service"),
        }
    }
}

/// A node in the resource graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Logical identity
    pub id: LogicalId,
    /// Resource kind
    pub kind: ResourceKind,
}

/// A directed dependency edge: `from` must not be created until `to` exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The dependent resource
    pub from: LogicalId,
    /// The prerequisite resource
    pub to: LogicalId,
}

/// Dependency graph over the derived resources of one service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// All derived resources
    pub nodes: Vec<ResourceNode>,
    /// Creation-order constraints
    pub edges: Vec<DependencyEdge>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource node
    pub fn add_node(&mut self, id: LogicalId, kind: ResourceKind) {
        self.nodes.push(ResourceNode { id, kind });
    }

    /// Record that `from` must be created after `to`
    pub fn add_edge(&mut self, from: &LogicalId, to: &LogicalId) {
        self.edges.push(DependencyEdge {
            from: from.clone(),
            to: to.clone(),
        });
    }

    /// Prerequisites of a resource
    pub fn dependencies_of(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.edges
            .iter()
            .filter(|e| &e.from == id)
            .map(|e| &e.to)
            .collect()
    }

    /// Resolve a creation order honoring every edge (prerequisites first)
    pub fn creation_order(&self) -> Result<Vec<LogicalId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for node in &self.nodes {
            self.visit(&node.id, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        id: &LogicalId,
        visited: &mut HashSet<LogicalId>,
        visiting: &mut HashSet<LogicalId>,
        order: &mut Vec<LogicalId>,
    ) -> Result<()> {
        if visited.contains(id) {
            return Ok(());
        }

        if visiting.contains(id) {
            return Err(KeelError::DependencyCycle(id.to_string()));
        }

        visiting.insert(id.clone());

        let deps: Vec<LogicalId> = self.dependencies_of(id).into_iter().cloned().collect();
        for dep in deps {
            self.visit(&dep, visited, visiting, order)?;
        }

        visiting.remove(id);
        visited.insert(id.clone());
        order.push(id.clone());

        Ok(())
    }
}
