//! lanevm AST
//!
//! In-memory expression graph and the transform passes that turn a typed,
//! possibly vectorized expression into a scalar, validated graph ready for
//! linearization.
//!
//! # Architecture
//!
//! - [`node`] - Node kinds, operators and constant values
//! - [`store`] - The [`Ast`] arena, node factories and structural deduplication
//! - [`overloads`] - Operator signature tables and overload resolution
//! - [`transforms`] - Traversal drivers and the compilation pass pipeline
//! - [`error`] - Typed transform errors

pub mod error;
pub mod node;
pub mod overloads;
pub mod store;
pub mod transforms;

pub use error::{Error, Result};
pub use node::{
    BinaryOp, ConstantValue, FunctionId, Node, NodeId, NodeOp, Scalar, TernaryOp, UnaryOp,
};
pub use store::Ast;
pub use transforms::{run_pipeline, PassTrace};
