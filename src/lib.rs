//! Keel - a declarative service provisioning compiler
//!
//! Keel takes a declarative description of a containerized network service
//! (compute limits, containers, secrets, optional load-balancer
//! integration, optional custom IAM policy) and deterministically derives
//! a complete, internally consistent graph of identity, networking,
//! compute, and routing resource descriptors, with correct creation-order
//! dependencies and fail-fast validation:
//!
//! - Aggregate spec validation (every violation reported at once)
//! - Execution/task role derivation with feature-scoped IAM policies
//! - Security group derivation with conditional load-balancer ingress
//! - Container definition compilation (secret and log resolution)
//! - Target group and ordered listener rule derivation
//! - Explicit creation-order dependency graph
//!
//! Physical resource creation is out of scope: Keel emits descriptors for
//! an external provisioning engine to apply.

pub mod alb;
pub mod assemble;
pub mod container;
pub mod error;
pub mod graph;
pub mod identity;
pub mod network;
pub mod spec;
pub mod validate;

pub use assemble::{CompiledService, DeploymentContext, ServiceCompiler};
pub use error::{KeelError, Result};
