//! Bytecode emission.
//!
//! Walks the linearized steps and writes one instruction per step. Opcodes
//! are chosen from the node kind and the register type of the operand that
//! decides it: the left operand for binaries, the operand for unaries, the
//! result for selects and conversions.

use indexmap::IndexMap;
use lanevm_ast::{Ast, BinaryOp, Node, NodeId, NodeOp, TernaryOp, UnaryOp};
use lanevm_foundation::{FunctionDesc, RegisterType, StreamDesc};

use super::linearize::{is_immediate, Linearized};
use super::regalloc::Allocation;
use crate::bytecode::{ByteCodeProgram, OpCode};
use crate::error::CompileError;

fn no_encoding(node: &Node) -> CompileError {
    CompileError::NoEncoding {
        node: node.describe(),
    }
}

fn register_type(node: &Node) -> Result<RegisterType, CompileError> {
    match node.return_type.register_type() {
        RegisterType::Unknown => Err(CompileError::UnresolvedType {
            node: node.describe(),
        }),
        register => Ok(register),
    }
}

/// Raw bits of a scalar constant.
fn immediate(node: &Node) -> Result<u32, CompileError> {
    let constant = node.as_constant().ok_or_else(|| no_encoding(node))?;
    if constant.register_type() == RegisterType::Unknown {
        return Err(CompileError::UnresolvedType {
            node: node.describe(),
        });
    }
    constant
        .as_scalar()
        .map(|scalar| scalar.bits())
        .ok_or_else(|| no_encoding(node))
}

fn unary_opcode(op: UnaryOp, operand: RegisterType, result: RegisterType) -> Option<OpCode> {
    use RegisterType::{Bool as B, Float as F, Int as I};
    let opcode = match (op, operand) {
        (UnaryOp::Absolute, F) => OpCode::AbsF_R,
        (UnaryOp::Absolute, I) => OpCode::AbsI_R,
        (UnaryOp::Sqrt, F) => OpCode::SqrtF_R,
        (UnaryOp::Exp, F) => OpCode::ExpF_R,
        (UnaryOp::Ln, F) => OpCode::LnF_R,
        (UnaryOp::Log2, F) => OpCode::Log2F_R,
        (UnaryOp::Log2, I) => OpCode::Log2I_R,
        (UnaryOp::Log10, F) => OpCode::Log10F_R,
        (UnaryOp::Pow2, F) => OpCode::Pow2F_R,
        (UnaryOp::Sin, F) => OpCode::SinF_R,
        (UnaryOp::Cos, F) => OpCode::CosF_R,
        (UnaryOp::Tan, F) => OpCode::TanF_R,
        (UnaryOp::ASin, F) => OpCode::ASinF_R,
        (UnaryOp::ACos, F) => OpCode::ACosF_R,
        (UnaryOp::ATan, F) => OpCode::ATanF_R,
        (UnaryOp::Round, F) => OpCode::RoundF_R,
        (UnaryOp::Floor, F) => OpCode::FloorF_R,
        (UnaryOp::Ceil, F) => OpCode::CeilF_R,
        (UnaryOp::Trunc, F) => OpCode::TruncF_R,
        (UnaryOp::LogicalNot, B) => OpCode::NotB_R,
        (UnaryOp::BitwiseNot, I) => OpCode::NotI_R,
        (UnaryOp::TypeConversion, I) if result == F => OpCode::IToF_R,
        (UnaryOp::TypeConversion, F) if result == I => OpCode::FToI_R,
        _ => return None,
    };
    Some(opcode)
}

/// The `_RR` form of a binary operator over `left` operands.
fn binary_opcode(op: BinaryOp, left: RegisterType) -> Option<OpCode> {
    use RegisterType::{Bool as B, Float as F, Int as I};
    let opcode = match (op, left) {
        (BinaryOp::Add, F) => OpCode::AddF_RR,
        (BinaryOp::Add, I) => OpCode::AddI_RR,
        (BinaryOp::Subtract, F) => OpCode::SubF_RR,
        (BinaryOp::Subtract, I) => OpCode::SubI_RR,
        (BinaryOp::Multiply, F) => OpCode::MulF_RR,
        (BinaryOp::Multiply, I) => OpCode::MulI_RR,
        (BinaryOp::Divide, F) => OpCode::DivF_RR,
        (BinaryOp::Divide, I) => OpCode::DivI_RR,
        (BinaryOp::Min, F) => OpCode::MinF_RR,
        (BinaryOp::Min, I) => OpCode::MinI_RR,
        (BinaryOp::Max, F) => OpCode::MaxF_RR,
        (BinaryOp::Max, I) => OpCode::MaxI_RR,
        (BinaryOp::BitshiftLeft, I) => OpCode::ShlI_RR,
        (BinaryOp::BitshiftRight, I) => OpCode::ShrI_RR,
        (BinaryOp::BitwiseAnd, I) => OpCode::AndI_RR,
        (BinaryOp::BitwiseXor, I) => OpCode::XorI_RR,
        (BinaryOp::BitwiseOr, I) => OpCode::OrI_RR,
        (BinaryOp::Equal, F) => OpCode::EqF_RR,
        (BinaryOp::Equal, I) => OpCode::EqI_RR,
        (BinaryOp::Equal, B) => OpCode::EqB_RR,
        (BinaryOp::NotEqual, F) => OpCode::NEqF_RR,
        (BinaryOp::NotEqual, I) => OpCode::NEqI_RR,
        (BinaryOp::NotEqual, B) => OpCode::NEqB_RR,
        (BinaryOp::Less, F) => OpCode::LtF_RR,
        (BinaryOp::Less, I) => OpCode::LtI_RR,
        (BinaryOp::LessEqual, F) => OpCode::LEqF_RR,
        (BinaryOp::LessEqual, I) => OpCode::LEqI_RR,
        (BinaryOp::Greater, F) => OpCode::GtF_RR,
        (BinaryOp::Greater, I) => OpCode::GtI_RR,
        (BinaryOp::GreaterEqual, F) => OpCode::GEqF_RR,
        (BinaryOp::GreaterEqual, I) => OpCode::GEqI_RR,
        (BinaryOp::LogicalAnd, B) => OpCode::AndB_RR,
        (BinaryOp::LogicalOr, B) => OpCode::OrB_RR,
        _ => return None,
    };
    Some(opcode)
}

fn select_opcode(result: RegisterType) -> Option<OpCode> {
    match result {
        RegisterType::Float => Some(OpCode::SelF_RRR),
        RegisterType::Int => Some(OpCode::SelI_RRR),
        RegisterType::Bool => Some(OpCode::SelB_RRR),
        RegisterType::Unknown => None,
    }
}

/// Float streams use the F forms; int and bool values travel as integers.
fn store_opcodes(stream: RegisterType) -> (OpCode, OpCode) {
    match stream {
        RegisterType::Float => (OpCode::StoreF, OpCode::StoreF_C),
        _ => (OpCode::StoreI, OpCode::StoreI_C),
    }
}

/// Accumulates code words and side tables.
struct Emitter<'a> {
    ast: &'a Ast,
    linear: &'a Linearized,
    allocation: &'a Allocation,
    code: Vec<u32>,
    inputs: IndexMap<String, StreamDesc>,
    outputs: IndexMap<String, StreamDesc>,
    functions: IndexMap<String, FunctionDesc>,
}

impl<'a> Emitter<'a> {
    /// Physical register of a node that owns one.
    fn register(&self, id: NodeId) -> Result<u32, CompileError> {
        self.linear
            .registers
            .get(&id)
            .map(|&vreg| self.allocation.registers[vreg])
            .ok_or(CompileError::InvalidNode(id))
    }

    fn input_slot(&mut self, desc: &StreamDesc) -> u32 {
        let entry = self.inputs.entry(desc.name.clone());
        let index = entry.index();
        entry.or_insert_with(|| desc.clone());
        index as u32
    }

    fn output_slot(&mut self, desc: &StreamDesc) -> u32 {
        let entry = self.outputs.entry(desc.name.clone());
        let index = entry.index();
        entry.or_insert_with(|| desc.clone());
        index as u32
    }

    fn function_slot(&mut self, desc: &FunctionDesc) -> u32 {
        let entry = self.functions.entry(desc.mangled_name());
        let index = entry.index();
        entry.or_insert_with(|| desc.clone());
        index as u32
    }

    fn emit(&mut self, id: NodeId, result: Option<usize>) -> Result<(), CompileError> {
        let ast = self.ast;
        let node = ast.node(id);
        let r = match result {
            Some(vreg) => self.allocation.registers[vreg],
            None => 0,
        };

        match &node.op {
            NodeOp::Constant(_) => {
                let bits = immediate(node)?;
                self.code.extend([OpCode::MovX_C as u32, r, bits]);
            }
            NodeOp::Input(desc) => {
                let opcode = match desc.data_type.register_type() {
                    RegisterType::Float => OpCode::LoadF,
                    RegisterType::Int => OpCode::LoadI,
                    _ => return Err(no_encoding(node)),
                };
                let slot = self.input_slot(desc);
                self.code.extend([opcode as u32, r, slot]);
            }
            NodeOp::Output { desc, expression } => {
                let (store, store_const) = store_opcodes(desc.data_type.register_type());
                let slot = self.output_slot(desc);
                if is_immediate(ast, id, 0, *expression) {
                    let bits = immediate(ast.node(*expression))?;
                    self.code.extend([store_const as u32, slot, bits]);
                } else {
                    let value = self.register(*expression)?;
                    self.code.extend([store as u32, slot, value]);
                }
            }
            NodeOp::Unary { op, operand } => {
                let operand_type = register_type(ast.node(*operand))?;
                let opcode = unary_opcode(*op, operand_type, register_type(node)?)
                    .ok_or_else(|| no_encoding(node))?;
                let a = self.register(*operand)?;
                self.code.extend([opcode as u32, r, a]);
            }
            NodeOp::Binary { op, left, right } => {
                let left_type = register_type(ast.node(*left))?;
                let opcode = binary_opcode(*op, left_type).ok_or_else(|| no_encoding(node))?;
                let a = self.register(*left)?;
                if is_immediate(ast, id, 1, *right) {
                    let opcode = opcode.const_form().ok_or_else(|| no_encoding(node))?;
                    let bits = immediate(ast.node(*right))?;
                    self.code.extend([opcode as u32, r, a, bits]);
                } else {
                    let b = self.register(*right)?;
                    self.code.extend([opcode as u32, r, a, b]);
                }
            }
            NodeOp::Ternary {
                op: TernaryOp::Select,
                args: [condition, if_true, if_false],
            } => {
                let opcode = select_opcode(register_type(node)?).ok_or_else(|| no_encoding(node))?;
                let (a, b, c) = (
                    self.register(*condition)?,
                    self.register(*if_true)?,
                    self.register(*if_false)?,
                );
                self.code.extend([opcode as u32, r, a, b, c]);
            }
            NodeOp::FunctionCall { descs, arguments } => {
                let desc = node
                    .overload
                    .and_then(|o| descs.get(o as usize))
                    .map(|&fid| ast.function(fid))
                    .ok_or_else(|| CompileError::UnresolvedType {
                        node: node.describe(),
                    })?;
                let slot = self.function_slot(desc);
                self.code.extend([OpCode::Call as u32, slot, r, arguments.len() as u32]);
                for &argument in arguments {
                    let register = self.register(argument)?;
                    self.code.push(register);
                }
            }
            NodeOp::Ternary { .. } | NodeOp::Swizzle { .. } | NodeOp::ConstructorCall { .. } => {
                return Err(no_encoding(node));
            }
        }
        Ok(())
    }
}

/// Writes the bytecode for a linearized, allocated graph.
///
/// # Errors
///
/// Returns [`CompileError::UnresolvedType`] for a node without a type and
/// [`CompileError::NoEncoding`] for a node kind or operand type the
/// instruction set cannot express.
pub(crate) fn emit(
    ast: &Ast,
    linear: &Linearized,
    allocation: &Allocation,
) -> Result<ByteCodeProgram, CompileError> {
    let mut emitter = Emitter {
        ast,
        linear,
        allocation,
        code: Vec::with_capacity(linear.steps.len() * 4),
        inputs: IndexMap::new(),
        outputs: IndexMap::new(),
        functions: IndexMap::new(),
    };

    // Input slots follow the declaration order of the AST, not first use.
    let loaded: Vec<&StreamDesc> = ast
        .inputs()
        .iter()
        .filter(|desc| {
            linear.steps.iter().any(|step| {
                matches!(&ast.node(step.node).op, NodeOp::Input(used) if used.name == desc.name)
            })
        })
        .collect();
    for desc in loaded {
        emitter.input_slot(desc);
    }

    for step in &linear.steps {
        emitter.emit(step.node, step.virtual_register)?;
    }

    let Emitter {
        code,
        inputs,
        outputs,
        functions,
        ..
    } = emitter;
    Ok(ByteCodeProgram::new(
        code,
        inputs.into_values().collect(),
        outputs.into_values().collect(),
        functions.into_values().collect(),
        linear.steps.len() as u32,
        allocation.num_registers,
    ))
}
