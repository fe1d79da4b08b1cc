//! Network builder: service security group and rules

use crate::graph::{LogicalId, Ref};
use crate::validate::NormalizedSpec;
use serde::{Deserialize, Serialize};

/// IP protocol of a security group rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// Any protocol
    All,
}

impl std::fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpProtocol::Tcp => write!(f, "tcp"),
            IpProtocol::Udp => write!(f, "udp"),
            IpProtocol::All => write!(f, "all"),
        }
    }
}

/// Source of an ingress rule. Always a security-group reference:
/// service ingress is never opened to CIDR ranges by this builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSource {
    /// Peer security group
    SecurityGroup(Ref),
}

/// Inbound rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Protocol
    pub protocol: IpProtocol,
    /// First port in range
    pub from_port: u16,
    /// Last port in range
    pub to_port: u16,
    /// Traffic source
    pub source: RuleSource,
    /// Rule description
    pub description: String,
}

/// Outbound rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgressRule {
    /// Protocol
    pub protocol: IpProtocol,
    /// First port in range (0 = all when protocol is all)
    pub from_port: u16,
    /// Last port in range
    pub to_port: u16,
    /// Destination CIDR
    pub destination_cidr: String,
    /// Rule description
    pub description: String,
}

impl EgressRule {
    /// The unrestricted allow-all egress rule
    pub fn allow_all() -> Self {
        Self {
            protocol: IpProtocol::All,
            from_port: 0,
            to_port: 0,
            destination_cidr: "0.0.0.0/0".to_string(),
            description: "allow all outbound traffic".to_string(),
        }
    }
}

/// Derived security group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupDescriptor {
    /// Logical identity
    pub id: LogicalId,
    /// Group description
    pub description: String,
    /// VPC the group is scoped to
    pub vpc: Ref,
    /// Inbound rules
    pub ingress: Vec<IngressRule>,
    /// Outbound rules
    pub egress: Vec<EgressRule>,
}

/// Network builder
pub struct NetworkBuilder;

impl NetworkBuilder {
    /// Derive the service security group. Egress is always wide open; the
    /// service needs outbound access to the control plane and its
    /// dependencies. Ingress exists only when ALB integration is present,
    /// and only from the ALB's security group on the container port.
    pub fn build(normalized: &NormalizedSpec) -> SecurityGroupDescriptor {
        let mut ingress = Vec::new();

        if let Some(ref alb) = normalized.spec.alb {
            let port = alb.port_mapping.container_port;
            ingress.push(IngressRule {
                protocol: IpProtocol::Tcp,
                from_port: port,
                to_port: port,
                source: RuleSource::SecurityGroup(alb.alb_security_group.clone()),
                description: "traffic from load balancer".to_string(),
            });
        }

        SecurityGroupDescriptor {
            id: LogicalId::derive(&normalized.namespace, "sg"),
            description: format!("security group for service {}", normalized.namespace),
            vpc: normalized.spec.vpc.clone(),
            ingress,
            egress: vec![EgressRule::allow_all()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::config::{AlbIntegrationSpec, ContainerSpec, ServicePortRef, ServiceSpec};
    use crate::validate::Validator;

    fn spec(alb: Option<AlbIntegrationSpec>) -> ServiceSpec {
        ServiceSpec {
            namespace: Some("orders".to_string()),
            cluster: "prod".to_string(),
            vpc: "vpc-1".to_string(),
            containers: vec![ContainerSpec {
                name: "api".to_string(),
                image: "nginx".to_string(),
                ..Default::default()
            }],
            alb,
            ..Default::default()
        }
    }

    #[test]
    fn test_egress_only_without_alb() {
        let normalized = Validator::validate(&spec(None)).unwrap();
        let sg = NetworkBuilder::build(&normalized);

        assert!(sg.ingress.is_empty());
        assert_eq!(sg.egress, vec![EgressRule::allow_all()]);
        assert_eq!(sg.vpc, "vpc-1");
    }

    #[test]
    fn test_alb_ingress_scoped_to_alb_security_group() {
        let alb = AlbIntegrationSpec {
            listener: "arn:listener".to_string(),
            alb_security_group: "sg-alb".to_string(),
            port_mapping: ServicePortRef {
                container_name: "api".to_string(),
                container_port: 8080,
            },
            ..Default::default()
        };

        let normalized = Validator::validate(&spec(Some(alb))).unwrap();
        let sg = NetworkBuilder::build(&normalized);

        assert_eq!(sg.ingress.len(), 1);
        let rule = &sg.ingress[0];
        assert_eq!(rule.protocol, IpProtocol::Tcp);
        assert_eq!(rule.from_port, 8080);
        assert_eq!(rule.to_port, 8080);
        assert_eq!(
            rule.source,
            RuleSource::SecurityGroup("sg-alb".to_string())
        );
    }
}
