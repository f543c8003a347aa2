//! # forge_core
//!
//! Resource-graph construction and synthesis engine for stackforge.
//!
//! This crate turns declared resources into ordered, resolved manifests and
//! carries computed values from one stack to another.
//!
//! # Architecture
//!
//! - **Values**: property bags are trees of tagged [`Value`]s; references are
//!   variants, never strings
//! - **Graph**: references and explicit hints are merged into one edge set and
//!   checked for cycles
//! - **Synthesizer**: emits nodes in a deterministic topological order and
//!   resolves references as their targets are emitted
//! - **Stacks and bridge**: a synthesized stack publishes its outputs; later
//!   stacks import them
//! - **App**: the composition root that sequences stacks
//!
//! # Example
//!
//! ```rust
//! use forge_core::{App, Properties, SynthResult};
//!
//! let mut app = App::new();
//!
//! app.stack("Data", |stack, _| -> SynthResult<()> {
//!     let cluster = stack.declare("Cluster", "AWS::RDS::DBCluster", Properties::new())?;
//!     stack.output("Endpoint", cluster.attr("Endpoint.Address"))
//! })?;
//!
//! app.stack("Service", |stack, bridge| -> SynthResult<()> {
//!     let endpoint = stack.import(bridge, "Data", "Endpoint")?;
//!     stack.declare("Task", "AWS::ECS::TaskDefinition", Properties::new().with("Host", endpoint))?;
//!     Ok(())
//! })?;
//!
//! let service = app.manifest("Service").unwrap();
//! assert_eq!(service.order(), vec!["Task"]);
//! # Ok::<(), forge_core::SynthError>(())
//! ```

pub mod app;
pub mod bridge;
pub mod error;
pub mod graph;
pub mod node;
pub mod resolver;
pub mod stack;
pub mod synth;
pub mod value;

// Re-export main types for convenience
pub use app::{App, AssemblyStack, CloudAssembly};
pub use bridge::{Bridge, CrossStackExport, ExportHandle};
pub use error::{SynthError, SynthResult};
pub use graph::DependencyGraph;
pub use node::{Resource, ResourceNode};
pub use resolver::{AttributeTable, ReferenceResolver};
pub use stack::{Stack, StackState};
pub use synth::{export_name, Manifest, ManifestEntry, ManifestOutput, ManifestSummary, OutputDeclaration, Synthesizer};
pub use value::{Attribute, DeferredToken, LateBinding, LogicalId, Properties, Reference, Value};
