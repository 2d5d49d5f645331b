//! Expansion of vector-only operators into per-component arithmetic.

use lanevm_foundation::{RegisterType, VectorComponent};

use crate::error::{Error, Result};
use crate::node::{BinaryOp, NodeId, NodeOp, UnaryOp};
use crate::store::Ast;

use super::{Pass, TraversalOrder};

/// Rewrites Length, Normalize, All, Any, Dot, Cross and Reflect in terms of
/// component swizzles and element-wise operators.
pub struct ReplaceVectorInstructions;

fn component(ast: &mut Ast, expression: NodeId, index: usize) -> NodeId {
    ast.create_swizzle(&[VectorComponent::from_index(index)], expression)
}

/// `a.x*b.x + a.y*b.y + ...` over `elements` components.
fn expand_dot(ast: &mut Ast, a: NodeId, b: NodeId, elements: u8) -> NodeId {
    if elements <= 1 {
        return ast.create_binary(BinaryOp::Multiply, a, b);
    }
    let mut sum = {
        let (ax, bx) = (component(ast, a, 0), component(ast, b, 0));
        ast.create_binary(BinaryOp::Multiply, ax, bx)
    };
    for index in 1..elements as usize {
        let (ac, bc) = (component(ast, a, index), component(ast, b, index));
        let product = ast.create_binary(BinaryOp::Multiply, ac, bc);
        sum = ast.create_binary(BinaryOp::Add, sum, product);
    }
    sum
}

fn expand_length(ast: &mut Ast, a: NodeId) -> NodeId {
    let elements = ast.node(a).return_type.element_count();
    let dot = expand_dot(ast, a, a, elements);
    ast.create_unary(UnaryOp::Sqrt, dot)
}

/// Folds the components of `a` with `op`.
fn reduce(ast: &mut Ast, a: NodeId, elements: u8, op: BinaryOp) -> NodeId {
    let mut acc = component(ast, a, 0);
    for index in 1..elements as usize {
        let next = component(ast, a, index);
        acc = ast.create_binary(op, acc, next);
    }
    acc
}

impl Pass for ReplaceVectorInstructions {
    fn name(&self) -> &'static str {
        "ReplaceVectorInstructions"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PreOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let node = ast.node(id);
        let return_type = node.return_type;
        let elements = node.num_input_elements;

        let replacement = match node.op.clone() {
            NodeOp::Unary {
                op: UnaryOp::Length,
                operand,
            } => expand_length(ast, operand),
            NodeOp::Unary {
                op: UnaryOp::Normalize,
                operand,
            } => {
                let length = expand_length(ast, operand);
                let divisor = ast.create_constructor_call(return_type, vec![length]);
                ast.create_binary(BinaryOp::Divide, operand, divisor)
            }
            NodeOp::Unary {
                op: op @ (UnaryOp::All | UnaryOp::Any),
                operand,
            } => {
                if elements <= 1 {
                    return Ok(id);
                }
                let join = if op == UnaryOp::All {
                    BinaryOp::LogicalAnd
                } else {
                    BinaryOp::LogicalOr
                };
                reduce(ast, operand, elements, join)
            }
            NodeOp::Binary {
                op: BinaryOp::Dot,
                left,
                right,
            } => expand_dot(ast, left, right, elements),
            NodeOp::Binary {
                op: BinaryOp::Cross,
                left,
                right,
            } => {
                if elements != 3 {
                    return Err(Error::CrossRequiresVec3 { elements });
                }
                let a_yzx = ast.create_swizzle_str("yzx", left);
                let b_zxy = ast.create_swizzle_str("zxy", right);
                let a_zxy = ast.create_swizzle_str("zxy", left);
                let b_yzx = ast.create_swizzle_str("yzx", right);
                let lhs = ast.create_binary(BinaryOp::Multiply, a_yzx, b_zxy);
                let rhs = ast.create_binary(BinaryOp::Multiply, a_zxy, b_yzx);
                ast.create_binary(BinaryOp::Subtract, lhs, rhs)
            }
            NodeOp::Binary {
                op: BinaryOp::Reflect,
                left,
                right,
            } => {
                let dot = expand_dot(ast, left, right, elements);
                let two = match return_type.register_type() {
                    RegisterType::Int => ast.create_int(2),
                    _ => ast.create_float(2.0),
                };
                let scaled = ast.create_binary(BinaryOp::Multiply, dot, two);
                let broadcast = ast.create_constructor_call(return_type, vec![scaled]);
                let offset = ast.create_binary(BinaryOp::Multiply, right, broadcast);
                ast.create_binary(BinaryOp::Subtract, left, offset)
            }
            _ => return Ok(id),
        };
        Ok(replacement)
    }
}
