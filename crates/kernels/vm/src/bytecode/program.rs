//! Compiled bytecode program.
//!
//! A [`ByteCodeProgram`] is the only artifact the compiler hands to the VM.
//! It is immutable after construction and can be shared between threads that
//! each execute it with their own [`Vm`](crate::Vm).

use std::fmt;

use lanevm_foundation::{FunctionDesc, RegisterType, StreamDesc};
use serde::{Deserialize, Serialize};

use super::opcode::{Instruction, Instructions, Layout};
use super::registry::metadata_for;

/// Flat `u32` code stream plus the side tables it indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ByteCodeProgram {
    code: Vec<u32>,
    inputs: Vec<StreamDesc>,
    outputs: Vec<StreamDesc>,
    functions: Vec<FunctionDesc>,
    num_instructions: u32,
    num_temp_registers: u32,
}

impl ByteCodeProgram {
    pub(crate) fn new(
        code: Vec<u32>,
        inputs: Vec<StreamDesc>,
        outputs: Vec<StreamDesc>,
        functions: Vec<FunctionDesc>,
        num_instructions: u32,
        num_temp_registers: u32,
    ) -> Self {
        Self {
            code,
            inputs,
            outputs,
            functions,
            num_instructions,
            num_temp_registers,
        }
    }

    /// Raw code words.
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    /// Input streams, indexed by `Load` instructions.
    pub fn inputs(&self) -> &[StreamDesc] {
        &self.inputs
    }

    /// Output streams, indexed by `Store` instructions.
    pub fn outputs(&self) -> &[StreamDesc] {
        &self.outputs
    }

    /// Native functions, indexed by `Call` instructions.
    pub fn functions(&self) -> &[FunctionDesc] {
        &self.functions
    }

    pub fn num_instructions(&self) -> u32 {
        self.num_instructions
    }

    /// Temporary registers needed per batch of four instances.
    pub fn num_temp_registers(&self) -> u32 {
        self.num_temp_registers
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Decodes the code stream instruction by instruction.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.code)
    }
}

fn write_constant(f: &mut fmt::Formatter<'_>, ty: RegisterType, bits: u32) -> fmt::Result {
    match ty {
        RegisterType::Float => write!(f, "{:?}", f32::from_bits(bits)),
        RegisterType::Int => write!(f, "{}", bits as i32),
        RegisterType::Bool => write!(f, "{}", bits != 0),
        RegisterType::Unknown => write!(f, "{bits:#010x}"),
    }
}

fn write_instruction(
    f: &mut fmt::Formatter<'_>,
    program: &ByteCodeProgram,
    instruction: &Instruction<'_>,
) -> fmt::Result {
    let ty = metadata_for(instruction.opcode).operand_type;
    write!(f, "{:04} {:<9}", instruction.offset, instruction.opcode.mnemonic())?;
    match (instruction.layout(), instruction.operands) {
        (Layout::Unary, [r, a]) => write!(f, " r{r}, r{a}"),
        (Layout::Binary, [r, a, b]) => write!(f, " r{r}, r{a}, r{b}"),
        (Layout::BinaryConst, [r, a, c]) => {
            write!(f, " r{r}, r{a}, ")?;
            write_constant(f, ty, *c)
        }
        (Layout::Ternary, [r, a, b, c]) => write!(f, " r{r}, r{a}, r{b}, r{c}"),
        (Layout::MovConst, [r, c]) => {
            write!(f, " r{r}, ")?;
            write_constant(f, ty, *c)
        }
        (Layout::Load, [r, input]) => {
            let name = program.inputs.get(*input as usize).map(|d| d.name.as_str());
            write!(f, " r{r}, {}", name.unwrap_or("?"))
        }
        (Layout::Store, [output, r]) => {
            let name = program.outputs.get(*output as usize).map(|d| d.name.as_str());
            write!(f, " {}, r{r}", name.unwrap_or("?"))
        }
        (Layout::StoreConst, [output, c]) => {
            let name = program.outputs.get(*output as usize).map(|d| d.name.as_str());
            write!(f, " {}, ", name.unwrap_or("?"))?;
            write_constant(f, ty, *c)
        }
        (Layout::Call, [function, r, _argc, args @ ..]) => {
            let name = program.functions.get(*function as usize).map(FunctionDesc::mangled_name);
            write!(f, " r{r}, {}(", name.as_deref().unwrap_or("?"))?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "r{arg}")?;
            }
            f.write_str(")")
        }
        (_, operands) => write!(f, " {operands:?}"),
    }
}

impl fmt::Display for ByteCodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} instructions, {} temp registers",
            self.num_instructions, self.num_temp_registers
        )?;
        for desc in &self.inputs {
            writeln!(f, "; in  {desc}")?;
        }
        for desc in &self.outputs {
            writeln!(f, "; out {desc}")?;
        }
        for instruction in self.instructions() {
            match instruction {
                Ok(instruction) => write_instruction(f, self, &instruction)?,
                Err(e) => write!(f, "; {e}")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
