//! Error types for compilation and execution.
//!
//! # Error Categories
//!
//! - [`CompileError`] - The AST could not be turned into bytecode. Transform
//!   failures from `lanevm_ast` are wrapped unchanged.
//! - [`ExecuteError`] - A program could not run against the supplied streams,
//!   functions or globals, or its bytecode was malformed.

use lanevm_ast::NodeId;
use lanevm_foundation::{RegisterType, StreamDataType};
use thiserror::Error;

/// Failure while compiling an AST into a [`ByteCodeProgram`](crate::ByteCodeProgram).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A transform pass rejected the AST.
    #[error("transform failed: {0}")]
    Transform(#[from] lanevm_ast::Error),

    /// The AST has no output nodes, so there is nothing to compute.
    #[error("expression has no outputs")]
    NoOutputs,

    /// A node id does not refer to a node of the AST being compiled.
    #[error("invalid node reference {0}")]
    InvalidNode(NodeId),

    /// A node reached emission without a resolved data type.
    #[error("node {node} has no resolved type")]
    UnresolvedType {
        /// Description of the offending node.
        node: String,
    },

    /// A node kind or operand type has no bytecode encoding.
    #[error("no bytecode encoding for {node}")]
    NoEncoding {
        /// Description of the offending node.
        node: String,
    },

    /// Two overlapping live intervals were assigned the same register.
    #[error("register r{register} assigned to overlapping values {first} and {second}")]
    RegisterAllocation {
        /// The shared register.
        register: u32,
        /// Node owning the earlier interval.
        first: NodeId,
        /// Node owning the later interval.
        second: NodeId,
    },
}

/// Failure while executing a program in the [`Vm`](crate::Vm).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    /// A program input has no matching stream.
    #[error("input stream '{name}' not found")]
    InputNotFound {
        /// Name of the program input.
        name: String,
    },

    /// A program output has no matching stream and missing outputs are not allowed.
    #[error("output stream '{name}' not found")]
    OutputNotFound {
        /// Name of the program output.
        name: String,
    },

    /// Positional binding needs exactly one stream per program slot.
    #[error("expected {expected} {kind} streams, got {actual}")]
    StreamCountMismatch {
        /// `"input"` or `"output"`.
        kind: &'static str,
        /// Number of streams the program declares.
        expected: usize,
        /// Number of streams supplied.
        actual: usize,
    },

    /// A stream's element type cannot feed the register type the program expects.
    #[error("stream '{name}' has type {actual}, expected a {expected} stream")]
    StreamTypeMismatch {
        /// Name of the stream.
        name: String,
        /// Register type of the program slot.
        expected: RegisterType,
        /// Data type of the supplied stream.
        actual: StreamDataType,
    },

    /// A stream buffer is too short for the requested instance count.
    #[error("stream '{name}' holds {actual} bytes, {required} required")]
    StreamTooSmall {
        /// Name of the stream.
        name: String,
        /// Bytes needed to address every instance at the stream's stride.
        required: usize,
        /// Bytes available.
        actual: usize,
    },

    /// A program function is not registered with the VM.
    #[error("function '{name}' is not registered")]
    FunctionNotFound {
        /// Mangled name of the function.
        name: String,
    },

    /// A registered function shares a mangled name but not a signature.
    #[error("function '{name}' does not match the registered signature")]
    FunctionSignatureMismatch {
        /// Mangled name of the function.
        name: String,
    },

    /// The code stream could not be decoded or referenced a missing slot.
    #[error("malformed bytecode at word {offset}: {message}")]
    MalformedByteCode {
        /// Word offset of the offending instruction.
        offset: usize,
        /// What was wrong with it.
        message: String,
    },
}

impl ExecuteError {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedByteCode {
            offset,
            message: message.into(),
        }
    }
}
