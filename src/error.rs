//! Error types for program evaluation, evolution, structure search and persistence.

use thiserror::Error;

/// Errors raised while building, decoding or evaluating a program.
///
/// Some variants are internal invariant violations (a well-typed program can
/// never produce them); see [`ProgramError::is_fatal`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// The buffer holds an opcode that no template is registered for.
    #[error("unknown opcode {opcode} at index {index}")]
    UnknownOpcode {
        /// Raw opcode value.
        opcode: u16,
        /// Buffer index of the offending header.
        index: usize,
    },
    /// A node header or payload runs past the end of the buffer.
    #[error("truncated program buffer at index {index}")]
    Truncated {
        /// Buffer index where decoding ran out of words.
        index: usize,
    },
    /// An opcode popped more operands than the stack held.
    #[error("value stack underflow while evaluating `{opcode}`")]
    StackUnderflow {
        /// Name of the opcode being evaluated.
        opcode: &'static str,
    },
    /// An operand had the wrong type for the operation.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: &'static str,
    },
    /// Non-protected division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A variable was read before any value was bound to it.
    #[error("variable `{0}` has no value")]
    UnsetVariable(String),
    /// A variable name or index that the context does not define.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// A variable was defined twice in the same context.
    #[error("variable `{0}` already defined")]
    DuplicateVariable(String),
    /// `compute` was handed the wrong number of inputs.
    #[error("invalid input count: expected {expected}, got {actual}")]
    InputCount {
        /// Number of variables defined by the context.
        expected: usize,
        /// Number of inputs supplied.
        actual: usize,
    },
    /// An expression could not be parsed.
    #[error("parse error at {position}: {message}")]
    Parse {
        /// Byte offset into the source text.
        position: usize,
        /// What went wrong.
        message: String,
    },
    /// The generator could not find an opcode for the requested types.
    #[error("no opcodes available for {0}")]
    NoOpcodes(String),
    /// Node index outside the program.
    #[error("node {0} is out of range")]
    NodeOutOfRange(usize),
    /// A tree nests deeper than evaluation allows.
    #[error("program depth {depth} exceeds the limit of {max}")]
    TooDeep {
        /// Depth reached, or the first depth past the limit.
        depth: usize,
        /// Deepest tree allowed.
        max: usize,
    },
}

impl ProgramError {
    /// True for internal invariant violations that must abort training rather
    /// than merely invalidate one genome.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownOpcode { .. } | Self::Truncated { .. } | Self::StackUnderflow { .. }
        )
    }
}

/// Errors raised by the evolutionary algorithm.
#[derive(Error, Debug)]
pub enum EaError {
    /// Invalid configuration, detected at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Offspring or genome generation kept failing.
    #[error("generation error: {0}")]
    Generation(String),
    /// A validation-mode consistency check failed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Fatal program error surfaced during scoring or an operator.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Errors raised by the Bayesian network and structure search.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BayesError {
    /// No event carries the given label.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    /// An event with this label already exists.
    #[error("duplicate event `{0}`")]
    DuplicateEvent(String),
    /// An event was created without any choices.
    #[error("event `{0}` has no choices")]
    NoChoices(String),
    /// Training data does not match the number of events.
    #[error("data has {actual} inputs but the network has {expected} events")]
    InputWidth {
        /// Number of events.
        expected: usize,
        /// Number of inputs per record.
        actual: usize,
    },
    /// Search configured with zero allowed parents.
    #[error("maximum parents must be at least 1")]
    MaxParents,
    /// Classification requested before a target event was chosen.
    #[error("no classification target defined")]
    NoClassificationTarget,
    /// A discrete input is not a valid choice index for its event.
    #[error("value {value} is not a valid choice for event `{event}`")]
    InvalidChoice {
        /// Event label.
        event: String,
        /// Offending input value.
        value: f64,
    },
    /// A dependency between events that cannot exist.
    #[error("invalid dependency: {0}")]
    InvalidDependency(String),
    /// An event's probability table is missing or no longer matches its parents.
    #[error("event `{0}` has no probability table; finalize the structure first")]
    MissingTable(String),
    /// A probability table row does not sum to one.
    #[error("invalid probability table: {0}")]
    InvalidTable(String),
}

/// Errors raised while saving or loading programs and populations.
#[derive(Error, Debug)]
pub enum PersistError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot decoded but is not a valid program or population.
    #[error("invalid snapshot: {0}")]
    Invalid(String),
    /// A stored program failed to decode.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Result type for program operations.
pub type PrgResult<T> = Result<T, ProgramError>;

/// Result type for evolutionary operations.
pub type EaResult<T> = Result<T, EaError>;

/// Result type for Bayesian network operations.
pub type BayesResult<T> = Result<T, BayesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ProgramError::UnknownOpcode { opcode: 999, index: 0 }.is_fatal());
        assert!(ProgramError::StackUnderflow { opcode: "+" }.is_fatal());
        assert!(!ProgramError::DivisionByZero.is_fatal());
        assert!(
            !ProgramError::TypeMismatch {
                expected: "float",
                actual: "string"
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_display() {
        let err = ProgramError::UnknownOpcode { opcode: 77, index: 3 };
        assert_eq!(err.to_string(), "unknown opcode 77 at index 3");
        let err = EaError::Configuration("bad".into());
        assert!(err.to_string().contains("bad"));
    }
}
