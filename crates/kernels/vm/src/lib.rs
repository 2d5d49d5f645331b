//! lanevm Virtual Machine.
//!
//! Compiles a transformed expression [`Ast`](lanevm_ast::Ast) into flat
//! register bytecode and executes it over batches of four instances.
//!
//! # Architecture
//!
//! - [`compiler`] - Linearization, linear-scan register allocation and emission
//! - [`bytecode`] - Opcode table, handler registry and the immutable [`ByteCodeProgram`]
//! - [`executor`] - Stream binding and the [`Vm`] dispatch loop
//! - [`function`] - Native function table and built-ins
//! - [`config`] - Compiler and execution switches
//! - [`error`] - Compile and execute error types
//!
//! # Execution Model
//!
//! Every temporary register holds one [`Register`](lanevm_foundation::Register)
//! per batch of four instances. Each instruction runs over all batches before
//! the next one starts, so the register file is laid out register-major:
//! `registers[reg * batches + batch]`.
//!
//! # Example
//!
//! ```ignore
//! use lanevm_ast::{Ast, BinaryOp};
//! use lanevm_foundation::{StreamDataType, StreamDesc};
//! use lanevm_vm::{Compiler, GlobalData, ProcessingStream, ProcessingStreamMut, Vm};
//!
//! let mut ast = Ast::new();
//! let x = ast.create_input(StreamDesc::new("x", StreamDataType::FLOAT));
//! let two = ast.create_float(2.0);
//! let sum = ast.create_binary(BinaryOp::Add, x, two);
//! ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sum);
//!
//! let program = Compiler::default().compile(&mut ast)?;
//! let input = [1.0f32, 2.0, 3.0];
//! let mut output = [0.0f32; 3];
//! Vm::new().execute(
//!     &program,
//!     &[ProcessingStream::from_slice("x", StreamDataType::FLOAT, &input)],
//!     &mut [ProcessingStreamMut::from_slice("o", StreamDataType::FLOAT, &mut output)],
//!     3,
//!     &GlobalData::new(),
//! )?;
//! ```

pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod function;

pub use bytecode::{ByteCodeProgram, Instruction, Layout, OpCode, OpcodeMetadata};
pub use compiler::{Compiler, LiveInterval};
pub use config::{CompilerConfig, ExecuteFlags};
pub use error::{CompileError, ExecuteError};
pub use executor::{ProcessingStream, ProcessingStreamMut, Vm};
pub use function::{ExpressionFunction, GlobalData, GlobalValue, NativeFunction};
