//! Opcode definitions and instruction decoding.
//!
//! Opcodes carry no behavior. Their word layout and operand type live in the
//! metadata table of [`registry`](super::registry), and their lane semantics
//! in the handler table next to it.
//!
//! # Design Rules
//!
//! 1. **Dense discriminants** - Opcodes number from zero in declaration order,
//!    so a code word indexes the registry tables directly
//! 2. **Paired binaries** - Every `_RR` opcode has an `_RC` twin whose right
//!    operand is an immediate
//! 3. **Fail loudly** - Unknown words and truncated instructions decode to
//!    [`ExecuteError::MalformedByteCode`]
//!
//! # Suffixes
//!
//! - `_R` - one register operand
//! - `_RR` / `_RC` - register and register, or register and constant
//! - `_RRR` - three register operands
//! - `_C` - a constant operand

use lanevm_foundation::RegisterType;
use serde::{Deserialize, Serialize};

use super::registry::metadata_for;
use crate::error::ExecuteError;

macro_rules! opcodes {
    ($($name:ident),* $(,)?) => {
        /// Bytecode operation. The discriminant is the first word of an instruction.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum OpCode {
            $($name),*
        }

        impl OpCode {
            /// Every opcode, in discriminant order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$name),*];

            /// Assembly name used by the disassembler.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name)),*
                }
            }
        }
    };
}

opcodes! {
    // === Unary ===
    AbsF_R, AbsI_R, SqrtF_R,
    ExpF_R, LnF_R, Log2F_R, Log2I_R, Log10F_R, Pow2F_R,
    SinF_R, CosF_R, TanF_R,
    ASinF_R, ACosF_R, ATanF_R,
    RoundF_R, FloorF_R, CeilF_R, TruncF_R,
    NotB_R, NotI_R,
    IToF_R, FToI_R,

    // === Binary ===
    AddF_RR, AddF_RC, AddI_RR, AddI_RC,
    SubF_RR, SubF_RC, SubI_RR, SubI_RC,
    MulF_RR, MulF_RC, MulI_RR, MulI_RC,
    DivF_RR, DivF_RC, DivI_RR, DivI_RC,
    MinF_RR, MinF_RC, MinI_RR, MinI_RC,
    MaxF_RR, MaxF_RC, MaxI_RR, MaxI_RC,
    ShlI_RR, ShlI_RC, ShrI_RR, ShrI_RC,
    AndI_RR, AndI_RC, XorI_RR, XorI_RC, OrI_RR, OrI_RC,
    EqF_RR, EqF_RC, EqI_RR, EqI_RC, EqB_RR, EqB_RC,
    NEqF_RR, NEqF_RC, NEqI_RR, NEqI_RC, NEqB_RR, NEqB_RC,
    LtF_RR, LtF_RC, LtI_RR, LtI_RC,
    LEqF_RR, LEqF_RC, LEqI_RR, LEqI_RC,
    GtF_RR, GtF_RC, GtI_RR, GtI_RC,
    GEqF_RR, GEqF_RC, GEqI_RR, GEqI_RC,
    AndB_RR, AndB_RC, OrB_RR, OrB_RC,

    // === Ternary ===
    SelF_RRR, SelI_RRR, SelB_RRR,

    // === Special ===
    MovX_C,
    LoadF, LoadI,
    StoreF, StoreI,
    StoreF_C, StoreI_C,
    Call,
}

/// Number of opcodes; the registry tables have exactly this many entries.
pub const OPCODE_COUNT: usize = OpCode::ALL.len();

impl TryFrom<u32> for OpCode {
    type Error = u32;

    fn try_from(word: u32) -> Result<Self, Self::Error> {
        OpCode::ALL.get(word as usize).copied().ok_or(word)
    }
}

impl OpCode {
    /// The `_RC` twin of a `_RR` binary, which directly follows it.
    pub fn const_form(self) -> Option<OpCode> {
        if metadata_for(self).layout != Layout::Binary {
            return None;
        }
        OpCode::ALL
            .get(self as usize + 1)
            .copied()
            .filter(|&twin| metadata_for(twin).layout == Layout::BinaryConst)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Word layout of an instruction after its opcode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// `[r, a]`
    Unary,
    /// `[r, a, b]`
    Binary,
    /// `[r, a, constant]`
    BinaryConst,
    /// `[r, a, b, c]`
    Ternary,
    /// `[r, constant]`
    MovConst,
    /// `[r, input]`
    Load,
    /// `[output, r]`
    Store,
    /// `[output, constant]`
    StoreConst,
    /// `[function, r, argc, args...]`
    Call,
}

impl Layout {
    /// Operand word count, or `None` when it depends on the instruction.
    pub const fn fixed_operands(self) -> Option<usize> {
        match self {
            Layout::Unary | Layout::MovConst | Layout::Load | Layout::Store | Layout::StoreConst => {
                Some(2)
            }
            Layout::Binary | Layout::BinaryConst => Some(3),
            Layout::Ternary => Some(4),
            Layout::Call => None,
        }
    }
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeMetadata {
    /// Word layout of the operands.
    pub layout: Layout,
    /// Register type of the source operands and of any immediate.
    /// `Unknown` for raw-bit moves and calls.
    pub operand_type: RegisterType,
}

/// Decoded view of one instruction inside a code stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// Word offset of the opcode within the program.
    pub offset: usize,
    /// The operation.
    pub opcode: OpCode,
    /// Operand words following the opcode.
    pub operands: &'a [u32],
}

impl<'a> Instruction<'a> {
    /// Decodes the instruction starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::MalformedByteCode`] for an unknown opcode word
    /// or an instruction running past the end of `code`.
    pub fn decode(code: &'a [u32], offset: usize) -> Result<Self, ExecuteError> {
        let word = *code
            .get(offset)
            .ok_or_else(|| ExecuteError::malformed(offset, "offset past end of code"))?;
        let opcode = OpCode::try_from(word)
            .map_err(|w| ExecuteError::malformed(offset, format!("unknown opcode {w}")))?;

        let count = match metadata_for(opcode).layout.fixed_operands() {
            Some(count) => count,
            None => {
                let argc = code
                    .get(offset + 3)
                    .ok_or_else(|| ExecuteError::malformed(offset, "truncated call header"))?;
                3 + *argc as usize
            }
        };

        let operands = code
            .get(offset + 1..offset + 1 + count)
            .ok_or_else(|| ExecuteError::malformed(offset, format!("truncated {opcode}")))?;
        Ok(Self {
            offset,
            opcode,
            operands,
        })
    }

    /// Total length in words, opcode included.
    pub fn len(&self) -> usize {
        1 + self.operands.len()
    }

    /// Word layout of this instruction.
    pub fn layout(&self) -> Layout {
        metadata_for(self.opcode).layout
    }

    /// Operands of a fixed-size instruction as an array.
    pub fn fixed<const N: usize>(&self) -> Result<[u32; N], ExecuteError> {
        <[u32; N]>::try_from(self.operands).map_err(|_| {
            ExecuteError::malformed(
                self.offset,
                format!("{} expects {N} operands", self.opcode),
            )
        })
    }

    /// Splits a call into `(function, result register, argument registers)`.
    pub fn call_operands(&self) -> Result<(u32, u32, &'a [u32]), ExecuteError> {
        match self.operands {
            [function, result, _argc, args @ ..] => Ok((*function, *result, args)),
            _ => Err(ExecuteError::malformed(self.offset, "truncated call")),
        }
    }
}

/// Iterator over the instructions of a code stream.
///
/// Yields one error and then stops when the stream is malformed.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    code: &'a [u32],
    offset: usize,
}

impl<'a> Instructions<'a> {
    pub(crate) fn new(code: &'a [u32]) -> Self {
        Self { code, offset: 0 }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ExecuteError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.code.len() {
            return None;
        }
        match Instruction::decode(self.code, self.offset) {
            Ok(instruction) => {
                self.offset += instruction.len();
                Some(Ok(instruction))
            }
            Err(e) => {
                self.offset = self.code.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_are_dense() {
        for (index, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, index);
            assert_eq!(OpCode::try_from(index as u32), Ok(*op));
        }
        assert_eq!(OpCode::try_from(OPCODE_COUNT as u32), Err(OPCODE_COUNT as u32));
    }

    #[test]
    fn test_const_form_pairs() {
        assert_eq!(OpCode::AddF_RR.const_form(), Some(OpCode::AddF_RC));
        assert_eq!(OpCode::OrB_RR.const_form(), Some(OpCode::OrB_RC));
        assert_eq!(OpCode::AddF_RC.const_form(), None);
        assert_eq!(OpCode::SelF_RRR.const_form(), None);
    }

    #[test]
    fn test_decode_call_uses_argument_count() {
        let code = [OpCode::Call as u32, 0, 2, 2, 0, 1, OpCode::MovX_C as u32, 3, 7];
        let decoded: Vec<_> = Instructions::new(&code).collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].call_operands().unwrap(), (0, 2, &[0, 1][..]));
        assert_eq!(decoded[1].offset, 6);
        assert_eq!(decoded[1].fixed::<2>().unwrap(), [3, 7]);
    }

    #[test]
    fn test_truncated_instruction_is_malformed() {
        let code = [OpCode::AddF_RR as u32, 0, 1];
        let mut iter = Instructions::new(&code);
        assert!(matches!(
            iter.next(),
            Some(Err(ExecuteError::MalformedByteCode { offset: 0, .. }))
        ));
        assert!(iter.next().is_none());
    }
}
