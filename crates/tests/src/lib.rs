//! Integration test harness for lanevm.
//!
//! Drives the full pipeline on float streams:
//! Build AST → Transform → Compile → Execute → Verify.

use lanevm_ast::{Ast, NodeId};
use lanevm_foundation::{StreamDataType, StreamDesc};
use lanevm_vm::{
    ByteCodeProgram, Compiler, CompilerConfig, ExecuteError, ExpressionFunction, GlobalData,
    GlobalValue, ProcessingStream, ProcessingStreamMut, Vm,
};

/// Scalar float stream descriptor.
pub fn float(name: &str) -> StreamDesc {
    StreamDesc::new(name, StreamDataType::FLOAT)
}

/// Declares a scalar float input.
pub fn float_input(ast: &mut Ast, name: &str) -> NodeId {
    ast.create_input(float(name))
}

/// Declares a scalar float output.
pub fn float_output(ast: &mut Ast, name: &str, expression: NodeId) -> NodeId {
    ast.create_output(float(name), expression)
}

/// Test harness owning one compiler, one VM and the globals handed to it.
#[derive(Debug, Default)]
pub struct TestHarness {
    compiler: Compiler,
    vm: Vm,
    globals: GlobalData,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            compiler: Compiler::new(config),
            ..Self::default()
        }
    }

    /// Compile an AST built by `build`.
    ///
    /// # Panics
    ///
    /// Panics if compilation fails.
    pub fn compile(&mut self, build: impl FnOnce(&mut Ast)) -> ByteCodeProgram {
        let mut ast = Ast::new();
        build(&mut ast);
        match self.compiler.compile(&mut ast) {
            Ok(program) => program,
            Err(e) => panic!("Compilation failed: {e}"),
        }
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    pub fn register_function(&mut self, function: ExpressionFunction) {
        self.vm.register_function(function);
    }

    pub fn set_global(&mut self, name: &str, value: GlobalValue) {
        self.globals.insert(name.to_string(), value);
    }

    /// Execute `program` over named float inputs, returning one float
    /// vector of `count` values per named output.
    pub fn try_run(
        &mut self,
        program: &ByteCodeProgram,
        inputs: &[(&str, &[f32])],
        outputs: &[&str],
        count: usize,
    ) -> Result<Vec<Vec<f32>>, ExecuteError> {
        let input_streams: Vec<_> = inputs
            .iter()
            .map(|(name, values)| ProcessingStream::from_slice(*name, StreamDataType::FLOAT, values))
            .collect();
        let mut buffers = vec![vec![0.0f32; count]; outputs.len()];
        let mut output_streams: Vec<_> = outputs
            .iter()
            .zip(buffers.iter_mut())
            .map(|(name, buffer)| {
                ProcessingStreamMut::from_slice(*name, StreamDataType::FLOAT, buffer.as_mut_slice())
            })
            .collect();

        self.vm.execute(
            program,
            &input_streams,
            &mut output_streams,
            count,
            &self.globals,
        )?;
        drop(output_streams);
        Ok(buffers)
    }

    /// Execute and return the single output `o`.
    ///
    /// # Panics
    ///
    /// Panics if execution fails.
    pub fn run(&mut self, program: &ByteCodeProgram, inputs: &[(&str, &[f32])], count: usize) -> Vec<f32> {
        match self.try_run(program, inputs, &["o"], count) {
            Ok(mut outputs) => outputs.remove(0),
            Err(e) => panic!("Execution failed: {e}"),
        }
    }
}

/// Asserts two float slices agree within `epsilon`.
///
/// # Panics
///
/// Panics on a length mismatch or the first value outside tolerance.
pub fn assert_close(actual: &[f32], expected: &[f32], epsilon: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= epsilon,
            "index {i}: got {a}, expected {e} (epsilon {epsilon})"
        );
    }
}
