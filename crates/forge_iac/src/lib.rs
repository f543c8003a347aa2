//! # forge_iac
//!
//! The two-tier Prisma environment for stackforge: an Aurora MySQL database
//! stack and a Fargate service stack that imports the database endpoint.
//!
//! ## Features
//!
//! - Database and service stack declarations with configurable literals
//! - Cross-stack endpoint link through the `forge_core` bridge
//! - JSON or YAML templates plus an assembly index on disk
//! - Materialized attribute files for resolving late-bound values
//!
//! ## Upgrading deployed stacks
//!
//! The service stack names its target group `PrismaTargetGroup` (formerly
//! `PrismsTargetGroup`), so applying it over an existing deployment replaces
//! that resource. The container ingress rule now takes the load balancer
//! security group as its source. See [`service`] for details.
//!
//! ## Example
//!
//! ```rust,no_run
//! use forge_core::AttributeTable;
//! use forge_iac::{Environment, EnvironmentConfig, TemplateFormat, TemplateWriter};
//!
//! let config = EnvironmentConfig::default().with_region("us-east-2");
//! let env = Environment::synthesize(&config, AttributeTable::new()).unwrap();
//!
//! TemplateWriter::new("forge.out")
//!     .with_format(TemplateFormat::Yaml)
//!     .write(&env)
//!     .unwrap();
//! ```

pub mod config;
pub mod database;
pub mod environment;
pub mod error;
pub mod provider;
pub mod service;
pub mod writer;

pub use config::{load_attributes, AlarmConfig, DatabaseConfig, EnvironmentConfig, NetworkConfig, Secrets, ServiceConfig};
pub use database::{DatabaseResources, DatabaseStack};
pub use environment::Environment;
pub use error::{IacError, IacResult};
pub use provider::ResourceKind;
pub use service::{DatabaseLink, ServiceResources, ServiceStack};
pub use writer::{TemplateFormat, TemplateWriter, ASSEMBLY_FILE};
