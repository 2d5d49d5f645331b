//! Errors raised while transforming an expression graph.
//!
//! # Error Categories
//!
//! - **Typing errors**: [`Error::NoMatchingOverload`], [`Error::ImplicitConversion`]
//! - **Lowering errors**: [`Error::CrossRequiresVec3`], [`Error::InvalidSubscript`],
//!   [`Error::ScalarizationFailed`], [`Error::ConstructorTooManyArguments`]
//! - **Validation errors**: [`Error::UnresolvedReturnType`], [`Error::UnresolvedOverload`],
//!   [`Error::NotEnoughArguments`], [`Error::ArgumentTypeMismatch`],
//!   [`Error::UnexpectedConstructor`]
//! - **Graph errors**: [`Error::InvalidOutputTransform`], [`Error::InvalidNode`],
//!   [`Error::NoOutputs`]
//!
//! Any error aborts compilation; no partially transformed graph is ever
//! handed to the linearizer.

use lanevm_foundation::DataType;
use thiserror::Error;

use crate::node::NodeId;

/// Transform result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the transform pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No operator signature or function overload accepts the argument types.
    #[error("no matching overload found for '{op}'")]
    NoMatchingOverload { op: String },

    /// A child has fewer vector elements than its parent expects and is not
    /// a scalar that could be broadcast.
    #[error("cannot implicitly convert '{from}' to '{to}'")]
    ImplicitConversion { from: DataType, to: DataType },

    /// Cross product applied to something other than three-element vectors.
    #[error("cross product is only defined for vec3, got {elements} elements")]
    CrossRequiresVec3 { elements: u8 },

    /// A swizzle selects a component the operand does not have.
    #[error("invalid subscript .{component} for '{what}' of type '{data_type}'")]
    InvalidSubscript {
        component: char,
        what: String,
        data_type: DataType,
    },

    /// A multi-component swizzle survived vector lowering.
    #[error("failed to scalarize swizzle with {components} components")]
    ScalarizationFailed { components: usize },

    /// A constructor still combines several scalars after scalarization.
    #[error("constructor of type '{data_type}' has too many arguments ({count})")]
    ConstructorTooManyArguments { data_type: DataType, count: usize },

    /// A node reached validation without a resolved return type.
    #[error("unresolved return type on '{op}'")]
    UnresolvedReturnType { op: String },

    /// An operator or function call reached validation without an overload.
    #[error("unresolved overload on '{op}'")]
    UnresolvedOverload { op: String },

    /// A function call supplies fewer arguments than its signature requires.
    #[error("not enough arguments for function '{function}': expected at least {required}, got {given}")]
    NotEnoughArguments {
        function: String,
        required: usize,
        given: usize,
    },

    /// A child's type differs from the type its parent expects.
    #[error("invalid data type for argument {index} on '{op}': expected {expected}, got {actual}")]
    ArgumentTypeMismatch {
        op: String,
        index: usize,
        expected: DataType,
        actual: DataType,
    },

    /// A constructor call survived lowering. This is a compiler bug.
    #[error("internal error: constructor call remains after lowering")]
    UnexpectedConstructor,

    /// A pass replaced an output node with something that is not an output.
    #[error("transform of output '{name}' did not produce an output node")]
    InvalidOutputTransform { name: String },

    /// A node id does not refer to a node in this graph.
    #[error("invalid node reference {0}")]
    InvalidNode(NodeId),

    /// The graph has no outputs to compute.
    #[error("expression graph has no outputs")]
    NoOutputs,
}
