//! Error types for model construction and policy iteration.

use thiserror::Error;

/// Errors raised while building or querying a Dec-POMDP, its distributions and controllers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// A probability is negative (beyond tolerance) or not finite.
    #[error("invalid probability {probability}")]
    InvalidProbability { probability: f64 },

    /// Probabilities do not sum to 1.
    #[error("distribution not normalized: sum = {sum} (expected 1.0)")]
    NotNormalized { sum: f64 },

    /// Empty distribution.
    #[error("distribution cannot be empty")]
    EmptyDistribution,

    /// A joint vector does not carry exactly one entry per agent.
    #[error("expected one entry per agent ({expected}), got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unknown {kind} `{name}`")]
    UnknownSymbol { kind: &'static str, name: String },

    #[error("duplicate {kind} `{name}`")]
    DuplicateSymbol { kind: &'static str, name: String },

    #[error("discount factor {0} is outside [0, 1]")]
    InvalidDiscount(f64),

    #[error("a Dec-POMDP needs at least one {0}")]
    Empty(&'static str),

    /// A model function has no entry for a queried argument.
    #[error("{function} function is undefined for {context}")]
    Undefined { function: &'static str, context: String },

    #[error("node {node} is not part of the controller of `{agent}`")]
    UnknownNode { agent: String, node: String },

    /// A replacement distribution refers to the pruned node or to nodes that do not exist.
    #[error("invalid replacement for node {node}: {reason}")]
    InvalidReplacement { node: String, reason: &'static str },
}

/// Errors raised by the heuristic policy iteration pipeline.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Infinite horizon planning requires a contraction.
    #[error("a discount factor of 1 is not supported by policy iteration")]
    UndiscountedModel,

    /// The linear equation system of the value function is singular.
    #[error("value function equation system with {unknowns} unknowns has no unique solution")]
    ValueFunctionUnsolvable { unknowns: usize },

    /// |A| · n^|O| overflows for the controller of `agent`.
    #[error("exhaustive backup of `{agent}` with {nodes} nodes and {observations} observations is too large")]
    BackupTooLarge { agent: String, nodes: usize, observations: usize },

    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A value was required for a (state, node combination) pair that was never computed.
    #[error("no value for state {state} and node combination {nodes}")]
    MissingValue { state: String, nodes: String },
}

pub type Result<T, E = SolverError> = std::result::Result<T, E>;
