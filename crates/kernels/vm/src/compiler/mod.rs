//! AST to bytecode compiler.
//!
//! # Architecture
//!
//! Compilation runs in four stages over a mutable [`Ast`]:
//!
//! 1. **Transform** - the `lanevm_ast` pipeline types, scalarizes, folds,
//!    lowers and deduplicates the graph
//! 2. **Linearize** - [`linearize`] orders the reachable nodes and computes a
//!    [`LiveInterval`] per value
//! 3. **Allocate** - [`regalloc`] maps intervals onto as few registers as
//!    the peak number of live values allows
//! 4. **Emit** - [`emit`] writes the code words and side tables
//!
//! The AST is consumed in the sense that the pipeline rewrites it in place;
//! compile a fresh graph for each program.

mod emit;
mod linearize;
mod regalloc;


use lanevm_ast::{run_pipeline, Ast};
use tracing::{debug, instrument};

use crate::bytecode::ByteCodeProgram;
use crate::config::CompilerConfig;
use crate::error::CompileError;

use self::linearize::LinearizeScratch;
use self::regalloc::AllocScratch;

pub use regalloc::LiveInterval;

/// Compiles expression graphs into [`ByteCodeProgram`]s.
///
/// Keeps its traversal and allocation buffers between compilations.
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
    linearize: LinearizeScratch,
    alloc: AllocScratch,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Transforms `ast` and compiles it.
    ///
    /// # Errors
    ///
    /// - [`CompileError::NoOutputs`] if the graph has no outputs
    /// - [`CompileError::Transform`] if a transform pass rejects the graph
    /// - [`CompileError::UnresolvedType`] or [`CompileError::NoEncoding`] if a
    ///   node survives the pipeline in a form the VM cannot run
    /// - [`CompileError::RegisterAllocation`] if verification is enabled and
    ///   finds two live values sharing a register
    #[instrument(skip_all, fields(nodes = ast.len(), outputs = ast.outputs().len()))]
    pub fn compile(&mut self, ast: &mut Ast) -> Result<ByteCodeProgram, CompileError> {
        if ast.outputs().is_empty() {
            return Err(CompileError::NoOutputs);
        }
        run_pipeline(ast, self.config.trace_passes)?;

        let linear = linearize::linearize(ast, &mut self.linearize)?;
        let allocation = regalloc::allocate(&linear.intervals, &mut self.alloc);
        if self.config.verify_register_allocation {
            regalloc::verify(&linear.intervals, &allocation)?;
        }
        let program = emit::emit(ast, &linear, &allocation)?;

        debug!(
            instructions = program.num_instructions(),
            registers = program.num_temp_registers(),
            inputs = program.inputs().len(),
            outputs = program.outputs().len(),
            "compiled expression program"
        );
        Ok(program)
    }

    /// Live intervals of the program `ast` compiles to, in instruction
    /// order, paired with their assigned registers.
    ///
    /// Runs the transform pipeline on `ast` like [`compile`](Self::compile).
    pub fn live_intervals(&mut self, ast: &mut Ast) -> Result<Vec<(LiveInterval, u32)>, CompileError> {
        if ast.outputs().is_empty() {
            return Err(CompileError::NoOutputs);
        }
        run_pipeline(ast, self.config.trace_passes)?;
        let linear = linearize::linearize(ast, &mut self.linearize)?;
        let allocation = regalloc::allocate(&linear.intervals, &mut self.alloc);
        Ok(linear
            .intervals
            .into_iter()
            .zip(allocation.registers)
            .collect())
    }
}
