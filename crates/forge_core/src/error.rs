//! Error types for stack construction and synthesis.
//!
//! Every variant is a structural fault in the declared graph. None of them
//! is transient, so nothing here is retried: the declaration has to change.

use thiserror::Error;

use crate::value::LogicalId;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that can occur while building or synthesizing stacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("Unknown reference in stack {stack}: {from} refers to {target}")]
    UnknownReference {
        stack: String,
        from: String,
        target: LogicalId,
    },

    #[error("Cyclic dependency in stack {stack}: {}", format_cycle(.cycle))]
    CyclicDependency { stack: String, cycle: Vec<LogicalId> },

    #[error("Synthesis of stack {stack} stalled with {} pending resource(s): {}", .pending.len(), join_ids(.pending))]
    SynthesisStalled {
        stack: String,
        pending: Vec<LogicalId>,
    },

    #[error("Graph of stack {stack} indexes {graph_nodes} resource(s), synthesis was given {nodes} that do not match")]
    GraphMismatch {
        stack: String,
        graph_nodes: usize,
        nodes: usize,
    },

    #[error("Stack {stack} is sealed ({state}), cannot {action}")]
    StackSealed {
        stack: String,
        state: String,
        action: String,
    },

    #[error("Unresolved export {stack}:{output}: source stack has not been synthesized")]
    UnresolvedExport { stack: String, output: String },

    #[error("Unknown export {stack}:{output}")]
    UnknownExport { stack: String, output: String },

    #[error("Stack {0} has not been synthesized")]
    StackNotSynthesized(String),

    #[error("Duplicate logical id in stack {stack}: {id}")]
    DuplicateLogicalId { stack: String, id: LogicalId },

    #[error("Invalid logical id: {0:?}")]
    InvalidLogicalId(String),

    #[error("Invalid stack name: {0:?}")]
    InvalidStackName(String),

    #[error("Duplicate output in stack {stack}: {output}")]
    DuplicateOutput { stack: String, output: String },

    #[error("Duplicate stack: {0}")]
    DuplicateStack(String),
}

impl SynthError {
    /// Whether this error is a fault in a single stack's resource graph,
    /// as opposed to a sequencing fault between stacks.
    pub fn is_graph_fault(&self) -> bool {
        matches!(
            self,
            SynthError::UnknownReference { .. }
                | SynthError::CyclicDependency { .. }
                | SynthError::SynthesisStalled { .. }
                | SynthError::GraphMismatch { .. }
                | SynthError::DuplicateLogicalId { .. }
                | SynthError::InvalidLogicalId(_)
                | SynthError::DuplicateOutput { .. }
        )
    }
}

/// Render a cycle as `A -> B -> C -> A`.
fn format_cycle(cycle: &[LogicalId]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", join_ids_with(cycle, " -> "), first),
        None => String::new(),
    }
}

fn join_ids(ids: &[LogicalId]) -> String {
    join_ids_with(ids, ", ")
}

fn join_ids_with(ids: &[LogicalId], separator: &str) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
