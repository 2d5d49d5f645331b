//! Opcode handler implementations.
//!
//! Every handler runs its instruction over all batches of the execution
//! before returning. Results are computed lane-wise with the primitives of
//! [`lanevm_foundation::arith`], the same functions constant folding uses.
//!
//! A handler reads its sources and writes its destination one batch at a
//! time, so the destination register may alias a source whose live interval
//! ends at this instruction.

use lanevm_foundation::{arith, Register, LANES};

use super::opcode::{Instruction, Layout};
use super::registry::metadata_for;
use crate::error::ExecuteError;
use crate::executor::{ExecutionContext, OutputSlot};

/// Signature of every opcode handler.
pub type Handler = fn(&Instruction<'_>, &mut ExecutionContext<'_>) -> Result<(), ExecuteError>;

// === Shapes ===

fn unary(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
    op: impl Fn(Register) -> Register,
) -> Result<(), ExecuteError> {
    let [r, a] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    let a = ctx.register(instruction, a)?;
    for batch in 0..ctx.batches {
        ctx.registers[r + batch] = op(ctx.registers[a + batch]);
    }
    Ok(())
}

/// Shared by the `_RR` and `_RC` form of an operation; the layout decides
/// whether the third operand is a register or an immediate.
fn binary(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
    op: impl Fn(Register, Register) -> Register,
) -> Result<(), ExecuteError> {
    let [r, a, b] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    let a = ctx.register(instruction, a)?;
    if instruction.layout() == Layout::BinaryConst {
        let constant = Register::splat_bits(b);
        for batch in 0..ctx.batches {
            ctx.registers[r + batch] = op(ctx.registers[a + batch], constant);
        }
    } else {
        let b = ctx.register(instruction, b)?;
        for batch in 0..ctx.batches {
            ctx.registers[r + batch] = op(ctx.registers[a + batch], ctx.registers[b + batch]);
        }
    }
    Ok(())
}

macro_rules! lane_handlers {
    ($shape:ident { $($name:ident => $lane:expr,)* }) => {
        $(
            pub fn $name(
                instruction: &Instruction<'_>,
                ctx: &mut ExecutionContext<'_>,
            ) -> Result<(), ExecuteError> {
                $shape(instruction, ctx, $lane)
            }
        )*
    };
}

// === Unary ===

lane_handlers!(unary {
    handle_abs_f => |a: Register| a.map_f32(arith::abs_f),
    handle_abs_i => |a: Register| a.map_i32(arith::abs_i),
    handle_sqrt_f => |a: Register| a.map_f32(arith::sqrt_f),
    handle_exp_f => |a: Register| a.map_f32(arith::exp_f),
    handle_ln_f => |a: Register| a.map_f32(arith::ln_f),
    handle_log2_f => |a: Register| a.map_f32(arith::log2_f),
    handle_log2_i => |a: Register| a.map_i32(arith::log2_i),
    handle_log10_f => |a: Register| a.map_f32(arith::log10_f),
    handle_pow2_f => |a: Register| a.map_f32(arith::pow2_f),
    handle_sin_f => |a: Register| a.map_f32(arith::sin_f),
    handle_cos_f => |a: Register| a.map_f32(arith::cos_f),
    handle_tan_f => |a: Register| a.map_f32(arith::tan_f),
    handle_asin_f => |a: Register| a.map_f32(arith::asin_f),
    handle_acos_f => |a: Register| a.map_f32(arith::acos_f),
    handle_atan_f => |a: Register| a.map_f32(arith::atan_f),
    handle_round_f => |a: Register| a.map_f32(arith::round_f),
    handle_floor_f => |a: Register| a.map_f32(arith::floor_f),
    handle_ceil_f => |a: Register| a.map_f32(arith::ceil_f),
    handle_trunc_f => |a: Register| a.map_f32(arith::trunc_f),
    handle_not_b => |a: Register| a.map_bool(arith::not_b),
    handle_not_i => |a: Register| a.map_i32(arith::not_i),
    handle_i_to_f => |a: Register| a.map_i32_to_f32(arith::i_to_f),
    handle_f_to_i => |a: Register| a.map_f32_to_i32(arith::f_to_i),
});

// === Binary ===

lane_handlers!(binary {
    handle_add_f => |a: Register, b| a.zip_f32(b, arith::add_f),
    handle_add_i => |a: Register, b| a.zip_i32(b, arith::add_i),
    handle_sub_f => |a: Register, b| a.zip_f32(b, arith::sub_f),
    handle_sub_i => |a: Register, b| a.zip_i32(b, arith::sub_i),
    handle_mul_f => |a: Register, b| a.zip_f32(b, arith::mul_f),
    handle_mul_i => |a: Register, b| a.zip_i32(b, arith::mul_i),
    handle_div_f => |a: Register, b| a.zip_f32(b, arith::div_f),
    handle_div_i => |a: Register, b| a.zip_i32(b, arith::div_i),
    handle_min_f => |a: Register, b| a.zip_f32(b, arith::min_f),
    handle_min_i => |a: Register, b| a.zip_i32(b, arith::min_i),
    handle_max_f => |a: Register, b| a.zip_f32(b, arith::max_f),
    handle_max_i => |a: Register, b| a.zip_i32(b, arith::max_i),
    handle_shl_i => |a: Register, b| a.zip_i32(b, arith::shl_i),
    handle_shr_i => |a: Register, b| a.zip_i32(b, arith::shr_i),
    handle_and_i => |a: Register, b| a.zip_i32(b, arith::and_i),
    handle_xor_i => |a: Register, b| a.zip_i32(b, arith::xor_i),
    handle_or_i => |a: Register, b| a.zip_i32(b, arith::or_i),
    handle_eq_f => |a: Register, b| a.cmp_f32(b, |x, y| x == y),
    handle_eq_i => |a: Register, b| a.cmp_i32(b, |x, y| x == y),
    handle_eq_b => |a: Register, b| a.zip_bool(b, |x, y| x == y),
    handle_neq_f => |a: Register, b| a.cmp_f32(b, |x, y| x != y),
    handle_neq_i => |a: Register, b| a.cmp_i32(b, |x, y| x != y),
    handle_neq_b => |a: Register, b| a.zip_bool(b, |x, y| x != y),
    handle_lt_f => |a: Register, b| a.cmp_f32(b, |x, y| x < y),
    handle_lt_i => |a: Register, b| a.cmp_i32(b, |x, y| x < y),
    handle_leq_f => |a: Register, b| a.cmp_f32(b, |x, y| x <= y),
    handle_leq_i => |a: Register, b| a.cmp_i32(b, |x, y| x <= y),
    handle_gt_f => |a: Register, b| a.cmp_f32(b, |x, y| x > y),
    handle_gt_i => |a: Register, b| a.cmp_i32(b, |x, y| x > y),
    handle_geq_f => |a: Register, b| a.cmp_f32(b, |x, y| x >= y),
    handle_geq_i => |a: Register, b| a.cmp_i32(b, |x, y| x >= y),
    handle_and_b => |a: Register, b| a.zip_bool(b, arith::and_b),
    handle_or_b => |a: Register, b| a.zip_bool(b, arith::or_b),
});

// === Ternary ===

/// `r = a ? b : c`, one bit-select for every register type.
pub fn handle_select(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let [r, a, b, c] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    let a = ctx.register(instruction, a)?;
    let b = ctx.register(instruction, b)?;
    let c = ctx.register(instruction, c)?;
    for batch in 0..ctx.batches {
        let regs = &mut *ctx.registers;
        regs[r + batch] = regs[a + batch].select(regs[b + batch], regs[c + batch]);
    }
    Ok(())
}

// === Special ===

/// Broadcasts raw constant bits into every lane of a register.
pub fn handle_mov_const(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let [r, bits] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    ctx.registers[r..r + ctx.batches].fill(Register::splat_bits(bits));
    Ok(())
}

/// Reads an input stream into a register.
///
/// The final partial batch repeats the last valid instance in its unused
/// lanes, so no lane computes on garbage and no read leaves the buffer.
pub fn handle_load(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let [r, input] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    let view = ctx.inputs.get(input as usize).ok_or_else(|| {
        ExecuteError::malformed(instruction.offset, format!("input {input} out of range"))
    })?;
    if view.element.register_type() != metadata_for(instruction.opcode).operand_type {
        return Err(ExecuteError::malformed(
            instruction.offset,
            format!("{} cannot read a {} stream", instruction.opcode, view.element.name()),
        ));
    }

    let last = ctx.num_instances - 1;
    for batch in 0..ctx.batches {
        let first = batch * LANES;
        ctx.registers[r + batch] =
            Register(std::array::from_fn(|lane| view.read((first + lane).min(last))));
    }
    Ok(())
}

/// Resolves an output slot. `None` means the output was left unbound and
/// stores to it are skipped.
fn output_slot(
    instruction: &Instruction<'_>,
    ctx: &ExecutionContext<'_>,
    output: u32,
) -> Result<Option<OutputSlot>, ExecuteError> {
    match ctx.outputs.get(output as usize) {
        Some(slot) => Ok(*slot),
        None => Err(ExecuteError::malformed(
            instruction.offset,
            format!("output {output} out of range"),
        )),
    }
}

/// Writes the valid lanes of a register to an output stream.
pub fn handle_store(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let [output, r] = instruction.fixed()?;
    let r = ctx.register(instruction, r)?;
    let Some(slot) = output_slot(instruction, ctx, output)? else {
        return Ok(());
    };
    let buffer = &mut *ctx.output_buffers[slot.stream];
    for instance in 0..ctx.num_instances {
        let bits = ctx.registers[r + instance / LANES].0[instance % LANES];
        slot.write(buffer, instance, bits);
    }
    Ok(())
}

/// Writes one constant to every instance of an output stream.
pub fn handle_store_const(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let [output, bits] = instruction.fixed()?;
    let Some(slot) = output_slot(instruction, ctx, output)? else {
        return Ok(());
    };
    let buffer = &mut *ctx.output_buffers[slot.stream];
    for instance in 0..ctx.num_instances {
        slot.write(buffer, instance, bits);
    }
    Ok(())
}

/// Calls a native function with one register slice per argument.
///
/// The function writes into scratch space that is copied to the result
/// register afterwards, since the result may share a register with an
/// argument.
pub fn handle_call(
    instruction: &Instruction<'_>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), ExecuteError> {
    let (function, r, args) = instruction.call_operands()?;
    let function = *ctx.functions.get(function as usize).ok_or_else(|| {
        ExecuteError::malformed(instruction.offset, format!("function {function} out of range"))
    })?;
    let r = ctx.register(instruction, r)?;
    let bases = args
        .iter()
        .map(|&arg| ctx.register(instruction, arg))
        .collect::<Result<Vec<_>, _>>()?;

    let batches = ctx.batches;
    let registers: &[Register] = &*ctx.registers;
    let inputs: Vec<&[Register]> = bases
        .iter()
        .map(|&base| &registers[base..base + batches])
        .collect();
    ctx.scratch.clear();
    ctx.scratch.resize(batches, Register::ZERO);
    function(&inputs, ctx.scratch.as_mut_slice(), ctx.globals);

    ctx.registers[r..r + batches].copy_from_slice(&ctx.scratch[..]);
    Ok(())
}
