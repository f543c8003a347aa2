//! Environment configuration.
//!
//! Every literal the two stacks declare has a default here, so an empty
//! config file (or none at all) reproduces the stock environment. Secrets are
//! never read from or written to the config file; callers supply them from
//! the process environment.

use std::fmt;
use std::fs;
use std::path::Path;

use forge_core::AttributeTable;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IacError, IacResult};

/// Settings for the database and service stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Region for log shipping; the stack's own region when unset.
    pub region: Option<String>,
    pub database_stack_name: String,
    pub service_stack_name: String,
    pub database: DatabaseConfig,
    pub service: ServiceConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            region: None,
            database_stack_name: "DatabaseStack".to_string(),
            service_stack_name: "PrismaServiceStack".to_string(),
            database: DatabaseConfig::default(),
            service: ServiceConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> IacResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EnvironmentConfig = serde_yaml::from_str(&content)?;
        debug!("Loaded environment config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a YAML file. Secrets are not written.
    pub fn to_file(&self, path: &Path) -> IacResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Check the settings the stacks cannot be declared without.
    pub fn validate(&self) -> IacResult<()> {
        if self.database_stack_name == self.service_stack_name {
            return Err(IacError::Config(format!(
                "database and service stacks share the name {}",
                self.database_stack_name
            )));
        }

        for (stack, network) in [("database", &self.database.network), ("service", &self.service.network)] {
            if network.subnet_cidrs.len() != 2 || network.availability_zones.len() != 2 {
                return Err(IacError::Config(format!(
                    "{} network needs exactly two subnets and two availability zones",
                    stack
                )));
            }
        }

        if self.service.container_port == 0 || self.service.listener_port == 0 {
            return Err(IacError::Config("service ports must be non-zero".to_string()));
        }

        for missing in self.secrets.missing() {
            warn!("{} is not set; the value is left out of the templates", missing);
        }
        Ok(())
    }
}

/// A VPC with two public subnets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub vpc_cidr: String,
    pub subnet_cidrs: Vec<String>,
    pub availability_zones: Vec<String>,
}

impl NetworkConfig {
    fn new(vpc_cidr: &str, subnet_cidrs: [&str; 2]) -> Self {
        Self {
            vpc_cidr: vpc_cidr.to_string(),
            subnet_cidrs: subnet_cidrs.iter().map(|s| s.to_string()).collect(),
            availability_zones: vec!["us-east-2b".to_string(), "us-east-2a".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Instance identifier, also used in resource name tags.
    pub name: String,
    pub network: NetworkConfig,
    pub engine: String,
    pub parameter_group_family: String,
    pub cluster_parameter_group: String,
    pub max_connections: u32,
    pub instance_class: String,
    pub port: u16,
    pub backup_retention_days: u32,
    pub backup_window: String,
    pub maintenance_window: String,
    pub alarms: AlarmConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "prisma-db".to_string(),
            network: NetworkConfig::new("10.192.0.0/16", ["10.192.12.0/24", "10.192.13.0/24"]),
            engine: "aurora-mysql".to_string(),
            parameter_group_family: "aurora-mysql5.7".to_string(),
            cluster_parameter_group: "default.aurora-mysql5.7".to_string(),
            max_connections: 300,
            instance_class: "db.t2.small".to_string(),
            port: 3306,
            backup_retention_days: 35,
            backup_window: "02:00-03:00".to_string(),
            maintenance_window: "mon:03:00-mon:04:00".to_string(),
            alarms: AlarmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Percent.
    pub cpu_threshold: u32,
    /// Bytes.
    pub freeable_memory_threshold: u64,
    pub period_seconds: u32,
    pub evaluation_periods: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 80,
            freeable_memory_threshold: 700_000_000,
            period_seconds: 300,
            evaluation_periods: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Used in subnet name tags.
    pub name: String,
    pub network: NetworkConfig,
    pub image: String,
    pub prisma_version: String,
    pub cpu: String,
    pub memory: String,
    pub jvm_opts: String,
    pub container_port: u16,
    pub listener_port: u16,
    pub health_check_path: String,
    pub idle_timeout_seconds: u32,
    pub log_retention_days: u32,
    pub desired_count: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "prisma-db".to_string(),
            network: NetworkConfig::new("10.0.0.0/16", ["10.0.0.0/24", "10.0.1.0/24"]),
            image: "prismagraphql/prisma".to_string(),
            prisma_version: "1.34.0".to_string(),
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
            jvm_opts: "-Xmx1350m".to_string(),
            container_port: 60000,
            listener_port: 80,
            health_check_path: "/status".to_string(),
            idle_timeout_seconds: 30,
            log_retention_days: 7,
            desired_count: 1,
        }
    }
}

impl ServiceConfig {
    /// Full image reference, `image:version`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.prisma_version)
    }
}

/// Credentials injected into the database cluster and the Prisma config.
#[derive(Clone, Default, PartialEq)]
pub struct Secrets {
    pub database_username: Option<String>,
    pub database_password: Option<String>,
    pub management_secret: Option<String>,
}

impl Secrets {
    /// Names of the unset secrets, as their environment variables.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.database_username.is_none() {
            missing.push("DATABASE_USERNAME");
        }
        if self.database_password.is_none() {
            missing.push("DATABASE_PASSWORD");
        }
        if self.management_secret.is_none() {
            missing.push("PRISMA_MANAGEMENT_SECRET");
        }
        missing
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("database_username", &self.database_username)
            .field("database_password", &redact(&self.database_password))
            .field("management_secret", &redact(&self.management_secret))
            .finish()
    }
}

/// Load materialized attributes (`stack -> id -> attribute -> value`)
/// from a YAML or JSON file.
pub fn load_attributes(path: &Path) -> IacResult<AttributeTable> {
    let content = fs::read_to_string(path)?;
    let attributes: AttributeTable = serde_yaml::from_str(&content)?;
    debug!("Loaded materialized attributes from {:?}", path);
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Attribute, LogicalId, Reference};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.database.name, "prisma-db");
        assert_eq!(config.database.network.subnet_cidrs, vec!["10.192.12.0/24", "10.192.13.0/24"]);
        assert_eq!(config.service.image_ref(), "prismagraphql/prisma:1.34.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: EnvironmentConfig = serde_yaml::from_str(
            "region: eu-west-1\nservice:\n  desired_count: 3\n",
        )
        .unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.service.desired_count, 3);
        assert_eq!(config.service.container_port, 60000);
        assert_eq!(config.database.backup_retention_days, 35);
    }

    #[test]
    fn test_secrets_never_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forge.yaml");
        let config = EnvironmentConfig::default().with_secrets(Secrets {
            database_username: Some("admin".to_string()),
            database_password: Some("hunter2".to_string()),
            management_secret: None,
        });

        config.to_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hunter2"));

        let loaded = EnvironmentConfig::from_file(&path).unwrap();
        assert_eq!(loaded.secrets, Secrets::default());
        assert_eq!(loaded.database, config.database);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secrets = Secrets {
            database_username: Some("admin".to_string()),
            database_password: Some("hunter2".to_string()),
            management_secret: Some("s3cret".to_string()),
        };
        let printed = format!("{:?}", secrets);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn test_validate_rejects_shared_stack_name() {
        let mut config = EnvironmentConfig::default();
        config.service_stack_name = config.database_stack_name.clone();
        assert!(matches!(config.validate(), Err(IacError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_single_subnet() {
        let mut config = EnvironmentConfig::default();
        config.service.network.subnet_cidrs.pop();
        assert!(matches!(config.validate(), Err(IacError::Config(_))));
    }

    #[test]
    fn test_load_attributes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attributes.yaml");
        fs::write(
            &path,
            "DatabaseStack:\n  DatabaseCluster:\n    Endpoint.Address: db.example.internal\n",
        )
        .unwrap();

        let attributes = load_attributes(&path).unwrap();
        assert!(!attributes.is_empty());
    }

    #[test]
    fn test_attribute_file_accepts_lowercase_ref() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attributes.yaml");
        fs::write(&path, "PrismaServiceStack:\n  ECSCluster:\n    ref: prisma-cluster-1\n").unwrap();

        let attributes = load_attributes(&path).unwrap();
        let reference = Reference::new(LogicalId::new("ECSCluster").unwrap(), Attribute::Ref);
        assert_eq!(
            attributes.lookup("PrismaServiceStack", &reference),
            Some(&serde_json::json!("prisma-cluster-1"))
        );
    }
}
