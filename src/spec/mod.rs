//! Service spec model and parsing

pub mod config;
pub mod parser;

pub use config::{
    AlbIntegrationSpec, ContainerSpec, EnvironmentConfig, HealthCheckSpec, PortMapping,
    PreForwardAction, SecretRef, SecretSource, ServicePortRef, ServiceSpec,
};
pub use parser::SpecParser;
