//! Service spec file parser

use super::config::{EnvironmentConfig, ServiceSpec};
use crate::error::{KeelError, Result};
use std::path::Path;

/// Default spec file names
pub const DEFAULT_SPEC_FILES: &[&str] = &[
    "service.yaml",
    "service.yml",
    "keel.yaml",
    "keel.yml",
    "keel.json",
];

/// Service spec file parser
pub struct SpecParser;

impl SpecParser {
    /// Find a spec file in a directory
    pub fn find_spec_file(dir: &Path) -> Option<std::path::PathBuf> {
        for name in DEFAULT_SPEC_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Load a spec file and interpolate `${VAR}` references from the
    /// process environment. This is the entry point the CLI uses.
    pub fn load_file(path: &Path) -> Result<ServiceSpec> {
        let mut spec = Self::parse_file(path)?;
        let env: std::collections::HashMap<String, String> = std::env::vars().collect();
        Self::interpolate(&mut spec, &env);
        Ok(spec)
    }

    /// Parse a spec file from a path (YAML or JSON by extension)
    pub fn parse_file(path: &Path) -> Result<ServiceSpec> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeelError::SpecParse(format!("Failed to read file: {}", e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| KeelError::SpecParse(format!("Failed to parse JSON: {}", e))),
            _ => Self::parse_str(&content),
        }
    }

    /// Parse a spec from a YAML string
    pub fn parse_str(content: &str) -> Result<ServiceSpec> {
        serde_yaml::from_str(content)
            .map_err(|e| KeelError::SpecParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Interpolate environment variables in the reference and string
    /// fields of the spec: images, environment values, log groups,
    /// secret ARNs, and the cluster/VPC/subnet/listener references
    pub fn interpolate(spec: &mut ServiceSpec, env: &std::collections::HashMap<String, String>) {
        let sub = |s: &mut String| *s = interpolate_string(s, env);

        sub(&mut spec.cluster);
        sub(&mut spec.vpc);
        spec.subnets.iter_mut().for_each(sub);

        for container in spec.containers.iter_mut() {
            sub(&mut container.image);

            if let Some(ref mut environment) = container.environment {
                match environment {
                    EnvironmentConfig::Map(map) => map.values_mut().for_each(sub),
                    EnvironmentConfig::Array(arr) => arr.iter_mut().for_each(sub),
                }
            }

            if let Some(ref mut group) = container.log_group {
                sub(group);
            }
            if let Some(ref mut credentials) = container.repository_credentials {
                sub(credentials);
            }
            for secret in container.secrets.iter_mut() {
                sub(&mut secret.source_arn);
            }
        }

        if let Some(ref mut alb) = spec.alb {
            sub(&mut alb.listener);
            sub(&mut alb.alb_security_group);
        }
    }
}

/// Interpolate environment variables in a string. `${VAR}` and `$VAR`
/// resolve to the variable's value (empty when unset, as a shell would);
/// `${VAR:-default}` falls back to the default when unset.
fn interpolate_string(s: &str, env: &std::collections::HashMap<String, String>) -> String {
    let braced = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap();
    let result = braced.replace_all(s, |caps: &regex::Captures| {
        match (env.get(&caps[1]), caps.get(2)) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => String::new(),
        }
    });

    let bare = regex::Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    bare.replace_all(&result, |caps: &regex::Captures| {
        env.get(&caps[1]).cloned().unwrap_or_default()
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::config::SecretSource;

    #[test]
    fn test_parse_simple_spec() {
        let yaml = r#"
namespace: orders
cluster: prod-cluster
vpc: vpc-0abc
subnets:
  - subnet-1
  - subnet-2
containers:
  - name: api
    image: registry.example.com/orders:1.4.2
    port_mappings:
      - container_port: 8080
    environment:
      RUST_LOG: info
"#;

        let spec = SpecParser::parse_str(yaml).unwrap();
        assert_eq!(spec.namespace.as_deref(), Some("orders"));
        assert_eq!(spec.containers.len(), 1);
        assert_eq!(spec.containers[0].port_mappings[0].container_port, 8080);
    }

    #[test]
    fn test_parse_secrets() {
        let yaml = r#"
cluster: prod-cluster
vpc: vpc-0abc
containers:
  - name: api
    image: nginx
    secrets:
      - env_var_name: DB_PASSWORD
        source_arn: arn:aws:secretsmanager:us-east-1:123456789012:secret:db
        source: secrets-manager
        json_key: password
"#;

        let spec = SpecParser::parse_str(yaml).unwrap();
        let secret = &spec.containers[0].secrets[0];
        assert_eq!(secret.source, SecretSource::SecretsManager);
        assert_eq!(secret.json_key.as_deref(), Some("password"));
    }

    #[test]
    fn test_parse_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(
            &path,
            "cluster: c\nvpc: vpc-1\ncontainers:\n  - name: web\n    image: nginx\n",
        )
        .unwrap();

        let found = SpecParser::find_spec_file(dir.path()).unwrap();
        assert_eq!(found, path);

        let spec = SpecParser::parse_file(&path).unwrap();
        assert_eq!(spec.containers[0].name, "web");
    }

    #[test]
    fn test_interpolate_string() {
        use std::collections::HashMap;

        let mut env = HashMap::new();
        env.insert("TAG".to_string(), "1.0.0".to_string());

        assert_eq!(interpolate_string("nginx:${TAG}", &env), "nginx:1.0.0");
        assert_eq!(interpolate_string("nginx:$TAG", &env), "nginx:1.0.0");
        assert_eq!(
            interpolate_string("nginx:${VERSION:-latest}", &env),
            "nginx:latest"
        );
        // Unset without a default resolves empty, as a shell would
        assert_eq!(interpolate_string("nginx:${VERSION}", &env), "nginx:");
    }

    #[test]
    fn test_interpolate_spec_fields() {
        use std::collections::HashMap;

        let yaml = r#"
cluster: ${CLUSTER:-prod}
vpc: $VPC_ID
containers:
  - name: api
    image: registry.example.com/api:${TAG}
    log_group: /svc/${CLUSTER:-prod}/api
    environment:
      MODE: ${MODE:-production}
"#;

        let mut env = HashMap::new();
        env.insert("VPC_ID".to_string(), "vpc-0abc".to_string());
        env.insert("TAG".to_string(), "2.1.0".to_string());

        let mut spec = SpecParser::parse_str(yaml).unwrap();
        SpecParser::interpolate(&mut spec, &env);

        assert_eq!(spec.cluster, "prod");
        assert_eq!(spec.vpc, "vpc-0abc");
        assert_eq!(spec.containers[0].image, "registry.example.com/api:2.1.0");
        assert_eq!(
            spec.containers[0].log_group.as_deref(),
            Some("/svc/prod/api")
        );
    }

    #[test]
    fn test_load_file_interpolates_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(
            &path,
            "cluster: c\nvpc: vpc-1\ncontainers:\n  - name: web\n    image: nginx:${KEEL_TEST_PARSER_TAG:-fallback}\n",
        )
        .unwrap();

        let spec = SpecParser::load_file(&path).unwrap();
        assert_eq!(spec.containers[0].image, "nginx:fallback");

        std::env::set_var("KEEL_TEST_PARSER_TAG", "9.9.9");
        let spec = SpecParser::load_file(&path).unwrap();
        assert_eq!(spec.containers[0].image, "nginx:9.9.9");
        std::env::remove_var("KEEL_TEST_PARSER_TAG");
    }
}
