//! Bytecode executor.
//!
//! # Design Principles
//!
//! 1. **Bind before run** - Streams and functions are resolved and size
//!    checked up front; handlers never see an unbound slot
//! 2. **Instruction-major** - Each instruction processes every batch before
//!    the next instruction starts
//! 3. **No partial lanes** - The last batch replicates its final valid
//!    instance into unused lanes and stores only valid lanes
//!
//! # Concurrency
//!
//! A [`Vm`] owns its register file, so it executes one program at a time.
//! Run one `Vm` per thread over a shared [`ByteCodeProgram`].

mod binding;
mod stream;


use std::fmt;

use indexmap::IndexMap;
use lanevm_foundation::{FunctionDesc, Register, LANES};
use tracing::{instrument, trace};

use crate::bytecode::{handler_for, ByteCodeProgram, Instruction};
use crate::config::ExecuteFlags;
use crate::error::ExecuteError;
use crate::function::{builtin_functions, ExpressionFunction, GlobalData, NativeFunction};

pub(crate) use binding::{InputView, OutputSlot};
pub use stream::{ProcessingStream, ProcessingStreamMut};

/// State handed to every opcode handler during one execution.
///
/// Only the crate's handlers can see inside it.
pub struct ExecutionContext<'a> {
    pub(crate) registers: &'a mut [Register],
    pub(crate) num_registers: usize,
    pub(crate) batches: usize,
    pub(crate) num_instances: usize,
    pub(crate) inputs: Vec<InputView<'a>>,
    pub(crate) outputs: Vec<Option<OutputSlot>>,
    pub(crate) output_buffers: Vec<&'a mut [u8]>,
    pub(crate) functions: Vec<NativeFunction>,
    pub(crate) globals: &'a GlobalData,
    pub(crate) scratch: &'a mut Vec<Register>,
}

impl ExecutionContext<'_> {
    /// Offset of the first batch of temporary register `index`.
    pub(crate) fn register(
        &self,
        instruction: &Instruction<'_>,
        index: u32,
    ) -> Result<usize, ExecuteError> {
        let index = index as usize;
        if index < self.num_registers {
            Ok(index * self.batches)
        } else {
            Err(ExecuteError::malformed(
                instruction.offset,
                format!("register r{index} out of range ({} allocated)", self.num_registers),
            ))
        }
    }
}

/// Executes compiled programs over batches of four instances.
pub struct Vm {
    flags: ExecuteFlags,
    functions: IndexMap<String, ExpressionFunction>,
    registers: Vec<Register>,
    scratch: Vec<Register>,
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("flags", &self.flags)
            .field("functions", &self.functions.len())
            .field("registers", &self.registers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Creates a VM with [`ExecuteFlags::USER_FRIENDLY`] and the built-in functions.
    pub fn new() -> Self {
        Self::with_flags(ExecuteFlags::default())
    }

    pub fn with_flags(flags: ExecuteFlags) -> Self {
        let mut vm = Self {
            flags,
            functions: IndexMap::new(),
            registers: Vec::new(),
            scratch: Vec::new(),
        };
        for function in builtin_functions() {
            vm.register_function(function);
        }
        vm
    }

    pub fn flags(&self) -> ExecuteFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ExecuteFlags) {
        self.flags = flags;
    }

    /// Registers a function under its mangled name, returning the function
    /// it replaces.
    pub fn register_function(&mut self, function: ExpressionFunction) -> Option<ExpressionFunction> {
        self.functions.insert(function.desc.mangled_name(), function)
    }

    pub fn unregister_function(&mut self, desc: &FunctionDesc) -> Option<ExpressionFunction> {
        self.functions.shift_remove(&desc.mangled_name())
    }

    /// Registered functions, in registration order. Their descriptors are
    /// the overload candidates to hand to `Ast::create_function_call`.
    pub fn functions(&self) -> impl Iterator<Item = &ExpressionFunction> {
        self.functions.values()
    }

    /// Every registered overload of `name`.
    pub fn function_overloads(&self, name: &str) -> Vec<FunctionDesc> {
        self.functions
            .values()
            .filter(|f| f.desc.name == name)
            .map(|f| f.desc.clone())
            .collect()
    }

    /// Runs `program` for `num_instances` instances.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An input or (unless allowed) output has no matching stream
    /// - A stream has the wrong element type or is too small
    /// - A program function is missing or registered with another signature
    /// - The bytecode is malformed
    ///
    /// Outputs are left partially written when a malformed instruction is
    /// hit mid-program.
    #[instrument(
        skip_all,
        fields(instructions = program.num_instructions(), instances = num_instances)
    )]
    pub fn execute(
        &mut self,
        program: &ByteCodeProgram,
        inputs: &[ProcessingStream<'_>],
        outputs: &mut [ProcessingStreamMut<'_>],
        num_instances: usize,
        globals: &GlobalData,
    ) -> Result<(), ExecuteError> {
        if num_instances == 0 {
            return Ok(());
        }

        let input_views = binding::bind_inputs(program, inputs, num_instances, self.flags)?;
        let output_slots = binding::bind_outputs(program, outputs, num_instances, self.flags)?;
        let functions = binding::bind_functions(program, &self.functions)?;

        let batches = num_instances.div_ceil(LANES);
        let num_registers = program.num_temp_registers() as usize;
        self.registers.clear();
        self.registers.resize(num_registers * batches, Register::ZERO);

        let mut ctx = ExecutionContext {
            registers: &mut self.registers,
            num_registers,
            batches,
            num_instances,
            inputs: input_views,
            outputs: output_slots,
            output_buffers: outputs.iter_mut().map(ProcessingStreamMut::bytes_mut).collect(),
            functions,
            globals,
            scratch: &mut self.scratch,
        };

        for instruction in program.instructions() {
            let instruction = instruction?;
            handler_for(instruction.opcode)(&instruction, &mut ctx)?;
        }
        trace!(batches, registers = num_registers, "execution complete");
        Ok(())
    }
}
