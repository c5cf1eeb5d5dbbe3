//! Bytecode errors

use thiserror::Error;

/// Errors that can occur while building or reading bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    /// Constant index past the end of the pool
    #[error("constant index {index} out of range (pool has {len} entries)")]
    ConstantOutOfRange {
        /// Requested index
        index: u32,
        /// Pool length
        len: usize,
    },

    /// Constant has a different payload kind than the caller asserted
    #[error("constant {index} is {found}, expected {expected}")]
    ConstantKind {
        /// Requested index
        index: u32,
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind actually stored
        found: &'static str,
    },

    /// A label was referenced but never placed
    #[error("label L{0} was never placed")]
    UnplacedLabel(u32),

    /// A label was placed twice
    #[error("label L{0} placed twice")]
    DuplicateLabel(u32),
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
