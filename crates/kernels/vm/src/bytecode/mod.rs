//! Register bytecode for lanevm expressions.
//!
//! # Design Principles
//!
//! 1. **Opcodes are data** - Layout and operand type come from one metadata table
//! 2. **Table dispatch** - Each opcode maps to one handler, looked up in O(1)
//! 3. **Immutable programs** - A compiled program never changes and is `Sync`
//!
//! # Architecture
//!
//! - [`opcode`] - Opcode enumeration, word layouts and instruction decoding
//! - [`registry`] - Opcode metadata and handler tables
//! - [`handlers`] - Lane implementations of every opcode
//! - [`program`] - The [`ByteCodeProgram`] container and its disassembly
//!
//! # Encoding
//!
//! Every word is a `u32`. Registers and side-table slots are plain indices;
//! immediates are the raw bits of the constant (IEEE-754 for floats, two's
//! complement for ints, all-ones or zero for bools).

pub mod handlers;
pub mod opcode;
pub mod program;
pub mod registry;

pub use handlers::Handler;
pub use opcode::{Instruction, Instructions, Layout, OpCode, OpcodeMetadata, OPCODE_COUNT};
pub use program::ByteCodeProgram;
pub use registry::{handler_for, metadata_for, opcode_specs, OpcodeSpec};
