//! lanevm Foundation
//!
//! Shared building blocks for the lanevm expression compiler and VM:
//! the register/stream type model, the four-lane register value, the
//! canonical scalar arithmetic used by both constant folding and execution,
//! half-float conversion, stable hashing and deterministic random mixing.

pub mod arith;
pub mod half;
pub mod rng;
pub mod simd;
pub mod stable_hash;
pub mod types;

pub use simd::{Register, LANES};
pub use stable_hash::StableHasher;
pub use types::{
    DataType, FunctionDesc, RegisterType, StreamDataType, StreamDesc, StreamElement,
    VectorComponent,
};
