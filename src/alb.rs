//! Load-balancer integration builder: target group, listener rule, and
//! the creation-order prerequisite the service must honor

use crate::graph::{LogicalId, Ref};
use crate::network::SecurityGroupDescriptor;
use crate::spec::config::{HealthCheckSpec, PreForwardAction};
use crate::validate::NormalizedSpec;
use serde::{Deserialize, Serialize};

/// Seconds a deregistering target keeps draining
pub const DEREGISTRATION_DELAY_SECONDS: u32 = 30;

/// Seconds of ramp-up before a new target receives its full traffic share
pub const SLOW_START_SECONDS: u32 = 60;

/// Target group protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetProtocol {
    /// Plain HTTP between load balancer and targets
    Http,
}

/// Target registration type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Register task IPs directly
    Ip,
}

/// Resolved target group health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupHealthCheck {
    /// Request path
    pub path: String,
    /// Interval between checks in seconds
    pub interval_seconds: u32,
    /// Per-check timeout in seconds
    pub timeout_seconds: u32,
    /// Consecutive successes before healthy
    pub healthy_threshold: u32,
    /// Consecutive failures before unhealthy
    pub unhealthy_threshold: u32,
    /// Expected HTTP status codes
    pub matcher: String,
}

impl Default for TargetGroupHealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold: 5,
            unhealthy_threshold: 2,
            matcher: "200".to_string(),
        }
    }
}

impl TargetGroupHealthCheck {
    /// Resolve from the spec's health check, falling back to defaults
    /// field by field
    pub fn resolve(spec: Option<&HealthCheckSpec>) -> Self {
        let defaults = Self::default();
        match spec {
            None => defaults,
            Some(hc) => Self {
                path: hc.path.clone().unwrap_or(defaults.path),
                interval_seconds: hc.interval_seconds.unwrap_or(defaults.interval_seconds),
                timeout_seconds: hc.timeout_seconds.unwrap_or(defaults.timeout_seconds),
                healthy_threshold: hc.healthy_threshold.unwrap_or(defaults.healthy_threshold),
                unhealthy_threshold: hc
                    .unhealthy_threshold
                    .unwrap_or(defaults.unhealthy_threshold),
                matcher: hc.matcher.clone().unwrap_or(defaults.matcher),
            },
        }
    }
}

/// Derived target group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetGroupDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// VPC the targets live in
    pub vpc: Ref,
    /// Port traffic is forwarded to
    pub port: u16,
    /// Protocol
    pub protocol: TargetProtocol,
    /// Target registration type
    pub target_type: TargetType,
    /// Deregistration delay in seconds
    pub deregistration_delay_seconds: u32,
    /// Slow start window in seconds
    pub slow_start_seconds: u32,
    /// Health check
    pub health_check: TargetGroupHealthCheck,
}

/// Listener rule match condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCondition {
    /// Match request paths against a pattern
    PathPattern(String),
}

/// One listener rule action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleAction {
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
        #[serde(skip_serializing_if = "Option::is_none")]
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
    /// Forward to a target group
    Forward {
        /// Destination target group
        target_group: LogicalId,
    },
}

impl From<&PreForwardAction> for RuleAction {
    fn from(action: &PreForwardAction) -> Self {
        match action {
            PreForwardAction::AuthenticateOidc {
                issuer,
                authorization_endpoint,
                token_endpoint,
                user_info_endpoint,
                client_id,
                client_secret,
                scope,
            } => RuleAction::AuthenticateOidc {
                issuer: issuer.clone(),
                authorization_endpoint: authorization_endpoint.clone(),
                token_endpoint: token_endpoint.clone(),
                user_info_endpoint: user_info_endpoint.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                scope: scope.clone(),
            },
            PreForwardAction::AuthenticateCognito {
                user_pool_arn,
                user_pool_client_id,
                user_pool_domain,
            } => RuleAction::AuthenticateCognito {
                user_pool_arn: user_pool_arn.clone(),
                user_pool_client_id: user_pool_client_id.clone(),
                user_pool_domain: user_pool_domain.clone(),
            },
        }
    }
}

/// An action with its evaluation order. The load balancer evaluates
/// actions by `order`, so authentication must precede the forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedAction {
    /// 1-based evaluation order
    pub order: u32,
    /// The action
    #[serde(flatten)]
    pub action: RuleAction,
}

/// Derived listener rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerRuleDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// Listener the rule attaches to
    pub listener: Ref,
    /// Rule priority (platform-assigned when unset; only safe on a
    /// listener with no conflicting rules, a caller responsibility)
    pub priority: Option<u32>,
    /// Match conditions
    pub conditions: Vec<RuleCondition>,
    /// Ordered action chain
    pub actions: Vec<OrderedAction>,
}

/// How the service registers with the load balancer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerBinding {
    /// Target group tasks register with
    pub target_group: LogicalId,
    /// Container receiving traffic
    pub container_name: String,
    /// Container port receiving traffic
    pub container_port: u16,
}

/// All load-balancer artifacts for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbArtifacts {
    /// Target group
    pub target_group: TargetGroupDescriptor,
    /// Listener rule
    pub listener_rule: ListenerRuleDescriptor,
    /// Service registration
    pub binding: LoadBalancerBinding,
}

impl AlbArtifacts {
    /// Resources that must exist before the service is created. The
    /// platform refuses to bind a service to a target group that is not
    /// yet attached to a listener, so the rule is a hard prerequisite.
    pub fn service_prerequisites(&self) -> Vec<LogicalId> {
        vec![self.listener_rule.id.clone()]
    }
}

/// Load-balancer integration builder
pub struct AlbBuilder;

impl AlbBuilder {
    /// Derive the target group and listener rule when ALB integration is
    /// requested; `None` otherwise.
    pub fn build(
        normalized: &NormalizedSpec,
        security_group: &SecurityGroupDescriptor,
    ) -> Option<AlbArtifacts> {
        let alb = normalized.spec.alb.as_ref()?;

        let target_group = TargetGroupDescriptor {
            id: LogicalId::derive(&normalized.namespace, "tg"),
            vpc: security_group.vpc.clone(),
            port: alb.port_mapping.container_port,
            protocol: TargetProtocol::Http,
            target_type: TargetType::Ip,
            deregistration_delay_seconds: DEREGISTRATION_DELAY_SECONDS,
            slow_start_seconds: SLOW_START_SECONDS,
            health_check: TargetGroupHealthCheck::resolve(alb.health_check.as_ref()),
        };

        let mut actions: Vec<OrderedAction> = alb
            .pre_forward_actions
            .iter()
            .enumerate()
            .map(|(i, action)| OrderedAction {
                order: i as u32 + 1,
                action: RuleAction::from(action),
            })
            .collect();
        actions.push(OrderedAction {
            order: actions.len() as u32 + 1,
            action: RuleAction::Forward {
                target_group: target_group.id.clone(),
            },
        });

        let listener_rule = ListenerRuleDescriptor {
            id: LogicalId::derive(&normalized.namespace, "listener-rule"),
            listener: alb.listener.clone(),
            priority: alb.rule_priority,
            conditions: vec![RuleCondition::PathPattern("/*".to_string())],
            actions,
        };

        let binding = LoadBalancerBinding {
            target_group: target_group.id.clone(),
            container_name: alb.port_mapping.container_name.clone(),
            container_port: alb.port_mapping.container_port,
        };

        Some(AlbArtifacts {
            target_group,
            listener_rule,
            binding,
        })
    }
}
