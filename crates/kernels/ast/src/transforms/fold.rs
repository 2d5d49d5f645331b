//! Constant folding and algebraic simplification.
//!
//! Operators whose operands are all scalar constants are evaluated with
//! [`lanevm_foundation::arith`], the same functions the VM uses per lane.
//! Operators with one constant operand are canonicalized so the constant
//! sits on the right, where the emitter can encode it as an immediate, and
//! simplified where an identity applies.

use lanevm_foundation::{arith, RegisterType};

use crate::error::Result;
use crate::node::{BinaryOp, NodeId, NodeOp, Scalar, TernaryOp, UnaryOp};
use crate::store::Ast;

use super::{Pass, TraversalOrder};

pub struct FoldConstants;

pub(crate) fn scalar_of(ast: &Ast, id: NodeId) -> Option<Scalar> {
    ast.node(id).as_constant().and_then(|c| c.as_scalar())
}

fn fold_float_unary(op: UnaryOp, x: f32) -> Option<f32> {
    let f: fn(f32) -> f32 = match op {
        UnaryOp::Negate => arith::neg_f,
        UnaryOp::Absolute => arith::abs_f,
        UnaryOp::Saturate => arith::saturate_f,
        UnaryOp::Sqrt => arith::sqrt_f,
        UnaryOp::Exp => arith::exp_f,
        UnaryOp::Ln => arith::ln_f,
        UnaryOp::Log2 => arith::log2_f,
        UnaryOp::Log10 => arith::log10_f,
        UnaryOp::Pow2 => arith::pow2_f,
        UnaryOp::Sin => arith::sin_f,
        UnaryOp::Cos => arith::cos_f,
        UnaryOp::Tan => arith::tan_f,
        UnaryOp::ASin => arith::asin_f,
        UnaryOp::ACos => arith::acos_f,
        UnaryOp::ATan => arith::atan_f,
        UnaryOp::RadToDeg => arith::rad_to_deg,
        UnaryOp::DegToRad => arith::deg_to_rad,
        UnaryOp::Round => arith::round_f,
        UnaryOp::Floor => arith::floor_f,
        UnaryOp::Ceil => arith::ceil_f,
        UnaryOp::Trunc => arith::trunc_f,
        UnaryOp::Frac => arith::frac_f,
        _ => return None,
    };
    Some(f(x))
}

fn fold_unary(op: UnaryOp, target: RegisterType, v: Scalar) -> Option<Scalar> {
    match (op, v) {
        (UnaryOp::TypeConversion, v) => v.convert(target),
        (UnaryOp::LogicalNot, Scalar::Bool(b)) => Some(Scalar::Bool(arith::not_b(b))),
        (UnaryOp::All | UnaryOp::Any, Scalar::Bool(b)) => Some(Scalar::Bool(b)),
        (UnaryOp::Negate, Scalar::Int(x)) => Some(Scalar::Int(arith::neg_i(x))),
        (UnaryOp::Absolute, Scalar::Int(x)) => Some(Scalar::Int(arith::abs_i(x))),
        (UnaryOp::Saturate, Scalar::Int(x)) => Some(Scalar::Int(arith::saturate_i(x))),
        (UnaryOp::Log2, Scalar::Int(x)) => Some(Scalar::Int(arith::log2_i(x))),
        (UnaryOp::Pow2, Scalar::Int(x)) => Some(Scalar::Int(arith::pow2_i(x))),
        (UnaryOp::BitwiseNot, Scalar::Int(x)) => Some(Scalar::Int(arith::not_i(x))),
        (op, Scalar::Float(x)) => fold_float_unary(op, x).map(Scalar::Float),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, a: Scalar, b: Scalar) -> Option<Scalar> {
    use Scalar::{Bool, Float, Int};

    let folded = match (a, b) {
        (Bool(x), Bool(y)) => match op {
            BinaryOp::Equal => Bool(x == y),
            BinaryOp::NotEqual => Bool(x != y),
            BinaryOp::LogicalAnd => Bool(arith::and_b(x, y)),
            BinaryOp::LogicalOr => Bool(arith::or_b(x, y)),
            _ => return None,
        },
        (Int(x), Int(y)) => match op {
            BinaryOp::Add => Int(arith::add_i(x, y)),
            BinaryOp::Subtract => Int(arith::sub_i(x, y)),
            BinaryOp::Multiply => Int(arith::mul_i(x, y)),
            BinaryOp::Divide => Int(arith::div_i(x, y)),
            BinaryOp::Modulo => Int(arith::mod_i(x, y)),
            BinaryOp::Pow => Int(arith::pow_i(x, y)),
            BinaryOp::Min => Int(arith::min_i(x, y)),
            BinaryOp::Max => Int(arith::max_i(x, y)),
            BinaryOp::BitshiftLeft => Int(arith::shl_i(x, y)),
            BinaryOp::BitshiftRight => Int(arith::shr_i(x, y)),
            BinaryOp::BitwiseAnd => Int(arith::and_i(x, y)),
            BinaryOp::BitwiseXor => Int(arith::xor_i(x, y)),
            BinaryOp::BitwiseOr => Int(arith::or_i(x, y)),
            BinaryOp::Equal => Bool(x == y),
            BinaryOp::NotEqual => Bool(x != y),
            BinaryOp::Less => Bool(x < y),
            BinaryOp::LessEqual => Bool(x <= y),
            BinaryOp::Greater => Bool(x > y),
            BinaryOp::GreaterEqual => Bool(x >= y),
            _ => return None,
        },
        (Float(x), Float(y)) => match op {
            BinaryOp::Add => Float(arith::add_f(x, y)),
            BinaryOp::Subtract => Float(arith::sub_f(x, y)),
            BinaryOp::Multiply => Float(arith::mul_f(x, y)),
            BinaryOp::Divide => Float(arith::div_f(x, y)),
            BinaryOp::Modulo => Float(arith::mod_f(x, y)),
            BinaryOp::Log => Float(arith::log_f(x, y)),
            BinaryOp::Pow => Float(arith::pow_f(x, y)),
            BinaryOp::Min => Float(arith::min_f(x, y)),
            BinaryOp::Max => Float(arith::max_f(x, y)),
            BinaryOp::Equal => Bool(x == y),
            BinaryOp::NotEqual => Bool(x != y),
            BinaryOp::Less => Bool(x < y),
            BinaryOp::LessEqual => Bool(x <= y),
            BinaryOp::Greater => Bool(x > y),
            BinaryOp::GreaterEqual => Bool(x >= y),
            _ => return None,
        },
        _ => return None,
    };
    Some(folded)
}

fn fold_ternary(op: TernaryOp, a: Scalar, b: Scalar, c: Scalar) -> Option<Scalar> {
    use Scalar::{Float, Int};

    match (op, a, b, c) {
        (TernaryOp::Clamp, Int(v), Int(lo), Int(hi)) => Some(Int(arith::clamp_i(v, lo, hi))),
        (TernaryOp::Clamp, Float(v), Float(lo), Float(hi)) => {
            Some(Float(arith::clamp_f(v, lo, hi)))
        }
        (TernaryOp::Lerp, Float(x), Float(y), Float(s)) => Some(Float(arith::lerp_f(x, y, s))),
        (TernaryOp::SmoothStep, Float(e0), Float(e1), Float(x)) => {
            Some(Float(arith::smoothstep_f(e0, e1, x)))
        }
        (TernaryOp::SmootherStep, Float(e0), Float(e1), Float(x)) => {
            Some(Float(arith::smootherstep_f(e0, e1, x)))
        }
        _ => None,
    }
}

/// `x / 2^k` for ints as `(x + ((x >> 31) & (2^k - 1))) >> k`.
/// The bias rounds negative dividends toward zero, matching `arith::div_i`
/// for every input including `i32::MIN`.
fn divide_by_power_of_two(ast: &mut Ast, x: NodeId, shift: u32) -> NodeId {
    let sign_shift = ast.create_int(31);
    let sign = ast.create_binary(BinaryOp::BitshiftRight, x, sign_shift);
    let mask = ast.create_int(arith::sub_i(arith::shl_i(1, shift as i32), 1));
    let bias = ast.create_binary(BinaryOp::BitwiseAnd, sign, mask);
    let biased = ast.create_binary(BinaryOp::Add, x, bias);
    let k = ast.create_int(shift as i32);
    ast.create_binary(BinaryOp::BitshiftRight, biased, k)
}

impl FoldConstants {
    fn fold_left_constant(
        &mut self,
        ast: &mut Ast,
        id: NodeId,
        op: BinaryOp,
        constant: Scalar,
        left: NodeId,
        right: NodeId,
    ) -> Result<NodeId> {
        let swap_to = match (constant, op) {
            (Scalar::Bool(false), BinaryOp::LogicalAnd) => return Ok(left),
            (Scalar::Bool(true), BinaryOp::LogicalOr) => return Ok(left),
            (
                Scalar::Bool(_),
                BinaryOp::Equal | BinaryOp::NotEqual | BinaryOp::LogicalAnd | BinaryOp::LogicalOr,
            ) => op,
            (Scalar::Bool(_), _) => return Ok(id),
            (c, BinaryOp::Add) if c.is_zero() => return Ok(right),
            (c, BinaryOp::Multiply) if c.is_zero() => return Ok(left),
            (c, BinaryOp::Multiply) if c.is_one() => return Ok(right),
            (
                _,
                BinaryOp::Add
                | BinaryOp::Multiply
                | BinaryOp::Min
                | BinaryOp::Max
                | BinaryOp::BitwiseAnd
                | BinaryOp::BitwiseXor
                | BinaryOp::BitwiseOr
                | BinaryOp::Equal
                | BinaryOp::NotEqual,
            ) => op,
            (_, op) => match op.mirrored() {
                Some(mirrored) => mirrored,
                None => return Ok(id),
            },
        };
        let swapped = ast.create_binary(swap_to, right, left);
        self.transform(ast, swapped)
    }

    fn fold_right_constant(
        ast: &mut Ast,
        id: NodeId,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        constant: Scalar,
    ) -> NodeId {
        match constant {
            Scalar::Bool(b) => match op {
                BinaryOp::LogicalAnd if !b => right,
                BinaryOp::LogicalOr if b => right,
                _ => id,
            },
            Scalar::Int(c) => match op {
                BinaryOp::Add | BinaryOp::Subtract if c == 0 => left,
                BinaryOp::Multiply if c == 0 => right,
                BinaryOp::Multiply | BinaryOp::Divide if c == 1 => left,
                BinaryOp::Divide if c > 1 && (c as u32).is_power_of_two() => {
                    divide_by_power_of_two(ast, left, c.trailing_zeros())
                }
                BinaryOp::Pow if c == 1 => left,
                BinaryOp::BitshiftLeft | BinaryOp::BitshiftRight if c == 0 => left,
                _ => id,
            },
            Scalar::Float(c) => match op {
                BinaryOp::Add | BinaryOp::Subtract if c == 0.0 => left,
                BinaryOp::Multiply if c == 0.0 => right,
                BinaryOp::Multiply | BinaryOp::Divide if c == 1.0 => left,
                BinaryOp::Divide => {
                    let reciprocal = ast.create_float(arith::div_f(1.0, c));
                    ast.create_binary(BinaryOp::Multiply, left, reciprocal)
                }
                BinaryOp::Pow if c == 1.0 => left,
                _ => id,
            },
        }
    }
}

impl Pass for FoldConstants {
    fn name(&self) -> &'static str {
        "FoldConstants"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PostOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let node = ast.node(id);
        let target = node.return_type.register_type();

        match node.op.clone() {
            NodeOp::Unary { op, operand } => {
                let folded = scalar_of(ast, operand).and_then(|v| fold_unary(op, target, v));
                Ok(folded.map_or(id, |v| ast.create_scalar(v)))
            }
            NodeOp::Binary { op, left, right } => {
                match (scalar_of(ast, left), scalar_of(ast, right)) {
                    (Some(a), Some(b)) => {
                        Ok(fold_binary(op, a, b).map_or(id, |v| ast.create_scalar(v)))
                    }
                    (Some(a), None) => self.fold_left_constant(ast, id, op, a, left, right),
                    (None, Some(b)) => Ok(Self::fold_right_constant(ast, id, op, left, right, b)),
                    (None, None) => Ok(id),
                }
            }
            NodeOp::Ternary { op, args } => {
                let [a, b, c] = args.map(|arg| scalar_of(ast, arg));
                if op == TernaryOp::Select {
                    return Ok(match a {
                        Some(Scalar::Bool(true)) => args[1],
                        Some(Scalar::Bool(false)) => args[2],
                        _ => id,
                    });
                }
                let folded = match (a, b, c) {
                    (Some(a), Some(b), Some(c)) => fold_ternary(op, a, b, c),
                    _ => None,
                };
                Ok(folded.map_or(id, |v| ast.create_scalar(v)))
            }
            _ => Ok(id),
        }
    }
}
