//! Lowering of operators the VM has no opcode for.
//!
//! Each rewrite produces exactly the primitive sequence the matching
//! composite in [`lanevm_foundation::arith`] is defined as, so folded and
//! executed results agree.

use lanevm_foundation::{arith, RegisterType};

use crate::error::{Error, Result};
use crate::node::{BinaryOp, NodeId, NodeOp, Scalar, TernaryOp, UnaryOp};
use crate::store::Ast;

use super::fold::scalar_of;
use super::{Pass, TraversalOrder};

pub struct ReplaceUnsupportedInstructions;

fn zero(ast: &mut Ast, register: RegisterType) -> NodeId {
    match register {
        RegisterType::Bool => ast.create_bool(false),
        RegisterType::Int => ast.create_int(0),
        _ => ast.create_float(0.0),
    }
}

fn one(ast: &mut Ast, register: RegisterType) -> NodeId {
    match register {
        RegisterType::Bool => ast.create_bool(true),
        RegisterType::Int => ast.create_int(1),
        _ => ast.create_float(1.0),
    }
}

fn float_constant(ast: &mut Ast, register: RegisterType, value: f32) -> NodeId {
    match register {
        RegisterType::Int => ast.create_int(value as i32),
        _ => ast.create_float(value),
    }
}

fn register_of(ast: &Ast, id: NodeId) -> RegisterType {
    ast.node(id).return_type.register_type()
}

fn to_float(ast: &mut Ast, id: NodeId) -> NodeId {
    if register_of(ast, id) == RegisterType::Float {
        id
    } else {
        ast.create_conversion(id, RegisterType::Float)
    }
}

fn lower_unary(ast: &mut Ast, id: NodeId, op: UnaryOp, x: NodeId) -> NodeId {
    let register = ast.node(id).return_type.register_type();
    match op {
        UnaryOp::Negate => {
            let z = zero(ast, register);
            ast.create_binary(BinaryOp::Subtract, z, x)
        }
        UnaryOp::Saturate => {
            let (lo, hi) = (zero(ast, register), one(ast, register));
            let upper = ast.create_binary(BinaryOp::Min, hi, x);
            ast.create_binary(BinaryOp::Max, lo, upper)
        }
        UnaryOp::Pow2 if register == RegisterType::Int => {
            let unit = ast.create_int(1);
            ast.create_binary(BinaryOp::BitshiftLeft, unit, x)
        }
        UnaryOp::RadToDeg => {
            let factor = ast.create_float(arith::RAD_TO_DEG);
            ast.create_binary(BinaryOp::Multiply, x, factor)
        }
        UnaryOp::DegToRad => {
            let factor = ast.create_float(arith::DEG_TO_RAD);
            ast.create_binary(BinaryOp::Multiply, x, factor)
        }
        UnaryOp::Frac => {
            let whole = ast.create_unary(UnaryOp::Trunc, x);
            ast.create_binary(BinaryOp::Subtract, x, whole)
        }
        UnaryOp::All | UnaryOp::Any => x,
        UnaryOp::TypeConversion => {
            let from = register_of(ast, x);
            if from == register {
                x
            } else if register == RegisterType::Bool {
                let z = zero(ast, from);
                ast.create_binary(BinaryOp::NotEqual, x, z)
            } else if from == RegisterType::Bool {
                let (t, f) = (one(ast, register), zero(ast, register));
                ast.create_ternary(TernaryOp::Select, x, t, f)
            } else {
                id
            }
        }
        _ => id,
    }
}

fn lower_pow(ast: &mut Ast, id: NodeId, base: NodeId, exponent: NodeId) -> NodeId {
    let register = ast.node(id).return_type.register_type();
    if scalar_of(ast, base).is_some_and(|b| b.is_value(2)) {
        return ast.create_unary(UnaryOp::Pow2, exponent);
    }
    if let Some(e) = scalar_of(ast, exponent) {
        if e.is_one() {
            return base;
        }
        let whole = match e {
            Scalar::Int(v) => Some(v),
            Scalar::Float(v) => arith::whole_exponent(v),
            Scalar::Bool(_) => None,
        };
        if let Some(chain) = whole.and_then(arith::pow_chain) {
            return arith::eval_chain(base, chain, |a, b| {
                ast.create_binary(BinaryOp::Multiply, a, b)
            });
        }
    }

    let base = to_float(ast, base);
    let exponent = to_float(ast, exponent);
    let log = ast.create_unary(UnaryOp::Log2, base);
    let scaled = ast.create_binary(BinaryOp::Multiply, exponent, log);
    let result = ast.create_unary(UnaryOp::Pow2, scaled);
    if register == RegisterType::Int {
        let rounded = ast.create_unary(UnaryOp::Round, result);
        ast.create_conversion(rounded, RegisterType::Int)
    } else {
        result
    }
}

fn lower_binary(ast: &mut Ast, id: NodeId, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
    match op {
        BinaryOp::Modulo => {
            let mut quotient = ast.create_binary(BinaryOp::Divide, left, right);
            if register_of(ast, quotient) == RegisterType::Float {
                quotient = ast.create_unary(UnaryOp::Trunc, quotient);
            }
            let product = ast.create_binary(BinaryOp::Multiply, right, quotient);
            ast.create_binary(BinaryOp::Subtract, left, product)
        }
        BinaryOp::Log => {
            let log_value = ast.create_unary(UnaryOp::Log2, right);
            match scalar_of(ast, left) {
                Some(Scalar::Float(base)) if base == 2.0 => log_value,
                Some(Scalar::Float(base)) => {
                    let factor = ast.create_float(arith::div_f(1.0, arith::log2_f(base)));
                    ast.create_binary(BinaryOp::Multiply, log_value, factor)
                }
                _ => {
                    let log_base = ast.create_unary(UnaryOp::Log2, left);
                    ast.create_binary(BinaryOp::Divide, log_value, log_base)
                }
            }
        }
        BinaryOp::Pow => lower_pow(ast, id, left, right),
        _ => id,
    }
}

fn lower_ternary(ast: &mut Ast, id: NodeId, op: TernaryOp, [a, b, c]: [NodeId; 3]) -> NodeId {
    let register = ast.node(id).return_type.register_type();
    match op {
        TernaryOp::Clamp => {
            let upper = ast.create_binary(BinaryOp::Min, c, a);
            ast.create_binary(BinaryOp::Max, b, upper)
        }
        TernaryOp::Lerp => {
            let delta = ast.create_binary(BinaryOp::Subtract, b, a);
            let scaled = ast.create_binary(BinaryOp::Multiply, c, delta);
            ast.create_binary(BinaryOp::Add, a, scaled)
        }
        TernaryOp::SmoothStep | TernaryOp::SmootherStep => {
            let offset = ast.create_binary(BinaryOp::Subtract, c, a);
            let range = ast.create_binary(BinaryOp::Subtract, b, a);
            let ratio = ast.create_binary(BinaryOp::Divide, offset, range);
            let t = ast.create_unary(UnaryOp::Saturate, ratio);
            let t2 = ast.create_binary(BinaryOp::Multiply, t, t);
            if op == TernaryOp::SmoothStep {
                let (two, three) = (
                    float_constant(ast, register, 2.0),
                    float_constant(ast, register, 3.0),
                );
                let two_t = ast.create_binary(BinaryOp::Multiply, two, t);
                let tail = ast.create_binary(BinaryOp::Subtract, three, two_t);
                ast.create_binary(BinaryOp::Multiply, t2, tail)
            } else {
                let (six, fifteen, ten) = (
                    float_constant(ast, register, 6.0),
                    float_constant(ast, register, 15.0),
                    float_constant(ast, register, 10.0),
                );
                let t6 = ast.create_binary(BinaryOp::Multiply, t, six);
                let t6_15 = ast.create_binary(BinaryOp::Subtract, t6, fifteen);
                let t_t6_15 = ast.create_binary(BinaryOp::Multiply, t, t6_15);
                let inner = ast.create_binary(BinaryOp::Add, t_t6_15, ten);
                let t3 = ast.create_binary(BinaryOp::Multiply, t2, t);
                ast.create_binary(BinaryOp::Multiply, t3, inner)
            }
        }
        TernaryOp::Select => id,
    }
}

impl Pass for ReplaceUnsupportedInstructions {
    fn name(&self) -> &'static str {
        "ReplaceUnsupportedInstructions"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PreOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let node = ast.node(id);
        match node.op.clone() {
            NodeOp::Unary { op, operand } => Ok(lower_unary(ast, id, op, operand)),
            NodeOp::Binary { op, left, right } => Ok(lower_binary(ast, id, op, left, right)),
            NodeOp::Ternary { op, args } => Ok(lower_ternary(ast, id, op, args)),
            NodeOp::ConstructorCall { arguments } => match arguments.as_slice() {
                [single] => Ok(*single),
                _ => Err(Error::ConstructorTooManyArguments {
                    data_type: node.return_type,
                    count: arguments.len(),
                }),
            },
            _ => Ok(id),
        }
    }
}
