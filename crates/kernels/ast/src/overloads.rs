//! Operator signature tables and overload resolution.
//!
//! Every operator has a fixed list of scalar signatures. A node picks the
//! signature with the smallest conversion distance to its children's
//! register types; vector width is carried separately in
//! [`Node::num_input_elements`](crate::Node::num_input_elements).
//!
//! # Distance
//!
//! For each argument the distance is `expected - actual` in
//! [`RegisterType`] order. Widening (bool to int, int to float) costs 1 per
//! step. Narrowing costs [`RegisterType::COUNT`] per step, so a candidate
//! that narrows any argument loses to one that only widens.

use lanevm_foundation::{DataType, RegisterType, VectorComponent};

use crate::node::{BinaryOp, FunctionId, NodeId, NodeOp, Scalar, TernaryOp, UnaryOp};
use crate::store::Ast;

/// One scalar operator signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub ret: RegisterType,
    pub args: &'static [RegisterType],
}

const B: RegisterType = RegisterType::Bool;
const I: RegisterType = RegisterType::Int;
const F: RegisterType = RegisterType::Float;

const fn sig(ret: RegisterType, args: &'static [RegisterType]) -> Signature {
    Signature { ret, args }
}

const UNARY_FI: &[Signature] = &[sig(F, &[F]), sig(I, &[I])];
const UNARY_F: &[Signature] = &[sig(F, &[F])];
const UNARY_I: &[Signature] = &[sig(I, &[I])];
const UNARY_B: &[Signature] = &[sig(B, &[B])];

const BINARY_FI: &[Signature] = &[sig(F, &[F, F]), sig(I, &[I, I])];
const BINARY_F: &[Signature] = &[sig(F, &[F, F])];
const BINARY_I: &[Signature] = &[sig(I, &[I, I])];
const BINARY_B: &[Signature] = &[sig(B, &[B, B])];
const EQUALITY: &[Signature] = &[sig(B, &[F, F]), sig(B, &[I, I]), sig(B, &[B, B])];
const ORDERING: &[Signature] = &[sig(B, &[F, F]), sig(B, &[I, I])];

const CLAMP: &[Signature] = &[sig(F, &[F, F, F]), sig(I, &[I, I, I])];
const SELECT: &[Signature] = &[sig(F, &[B, F, F]), sig(I, &[B, I, I]), sig(B, &[B, B, B])];
const TERNARY_F: &[Signature] = &[sig(F, &[F, F, F])];

/// Signatures of a unary operator. Type conversions have none; their
/// target type is fixed when the node is created.
pub fn unary_signatures(op: UnaryOp) -> &'static [Signature] {
    match op {
        UnaryOp::Negate
        | UnaryOp::Absolute
        | UnaryOp::Saturate
        | UnaryOp::Log2
        | UnaryOp::Pow2 => UNARY_FI,
        UnaryOp::Sqrt
        | UnaryOp::Exp
        | UnaryOp::Ln
        | UnaryOp::Log10
        | UnaryOp::Sin
        | UnaryOp::Cos
        | UnaryOp::Tan
        | UnaryOp::ASin
        | UnaryOp::ACos
        | UnaryOp::ATan
        | UnaryOp::RadToDeg
        | UnaryOp::DegToRad
        | UnaryOp::Round
        | UnaryOp::Floor
        | UnaryOp::Ceil
        | UnaryOp::Trunc
        | UnaryOp::Frac
        | UnaryOp::Length
        | UnaryOp::Normalize => UNARY_F,
        UnaryOp::BitwiseNot => UNARY_I,
        UnaryOp::LogicalNot | UnaryOp::All | UnaryOp::Any => UNARY_B,
        UnaryOp::TypeConversion => &[],
    }
}

pub fn binary_signatures(op: BinaryOp) -> &'static [Signature] {
    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::Pow
        | BinaryOp::Min
        | BinaryOp::Max
        | BinaryOp::Dot
        | BinaryOp::Cross
        | BinaryOp::Reflect => BINARY_FI,
        BinaryOp::Log => BINARY_F,
        BinaryOp::BitshiftLeft
        | BinaryOp::BitshiftRight
        | BinaryOp::BitwiseAnd
        | BinaryOp::BitwiseXor
        | BinaryOp::BitwiseOr => BINARY_I,
        BinaryOp::Equal | BinaryOp::NotEqual => EQUALITY,
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            ORDERING
        }
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => BINARY_B,
    }
}

pub fn ternary_signatures(op: TernaryOp) -> &'static [Signature] {
    match op {
        TernaryOp::Clamp => CLAMP,
        TernaryOp::Select => SELECT,
        TernaryOp::Lerp | TernaryOp::SmoothStep | TernaryOp::SmootherStep => TERNARY_F,
    }
}

/// Conversion cost from `actual` to `expected`.
fn distance(expected: RegisterType, actual: RegisterType) -> i32 {
    let d = expected as i32 - actual as i32;
    if d < 0 {
        -d * RegisterType::COUNT
    } else {
        d
    }
}

/// Index of the cheapest candidate. The first candidate wins ties.
fn best_candidate<'a>(
    candidates: impl Iterator<Item = &'a [RegisterType]>,
    actual: &[RegisterType],
) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, expected) in candidates.enumerate() {
        let total: i32 = expected
            .iter()
            .zip(actual)
            .map(|(&e, &a)| distance(e, a))
            .sum();
        if best.map_or(true, |(_, d)| total < d) {
            best = Some((index, total));
        }
    }
    best.map(|(index, _)| index)
}

/// Child types, or `None` while any child is untyped.
fn child_types(ast: &Ast, children: &[NodeId]) -> Option<Vec<DataType>> {
    children
        .iter()
        .map(|&c| {
            let t = ast.node(c).return_type;
            (!t.is_unknown()).then_some(t)
        })
        .collect()
}

fn max_elements(types: &[DataType]) -> u8 {
    types.iter().map(|t| t.element_count()).max().unwrap_or(1)
}

/// Picks the overload of `id` and sets its return type.
///
/// Does nothing if the node is already resolved or any child is still
/// untyped. Never fails: nodes that match no signature keep an unknown
/// return type and are reported by type deduction.
pub fn resolve_overloads(ast: &mut Ast, id: NodeId) {
    let node = ast.node(id);
    if node.overload.is_some() {
        return;
    }
    let children = node.children();
    let Some(types) = child_types(ast, &children) else {
        return;
    };
    let registers: Vec<RegisterType> = types.iter().map(|t| t.register_type()).collect();
    let elements = max_elements(&types);

    match node.op.clone() {
        NodeOp::Unary {
            op: UnaryOp::TypeConversion,
            ..
        } => {
            let target = node.return_type.register_type();
            let node = ast.node_mut(id);
            node.return_type = DataType::new(target, elements);
            node.num_input_elements = elements;
            node.overload = Some(0);
        }
        NodeOp::Unary { op, .. } => resolve_operator(
            ast,
            id,
            unary_signatures(op),
            &registers,
            elements,
            op.always_single_element(),
        ),
        NodeOp::Binary { op, .. } => resolve_operator(
            ast,
            id,
            binary_signatures(op),
            &registers,
            elements,
            op.always_single_element(),
        ),
        NodeOp::Ternary { op, .. } => {
            resolve_operator(ast, id, ternary_signatures(op), &registers, elements, false)
        }
        NodeOp::Swizzle { components, .. } => {
            let register = types[0].register_type();
            let node = ast.node_mut(id);
            node.return_type = DataType::new(register, components.len() as u8);
            node.num_input_elements = elements;
        }
        NodeOp::FunctionCall { descs, arguments } => {
            resolve_function_call(ast, id, &descs, arguments, &registers, elements)
        }
        NodeOp::ConstructorCall { arguments } => {
            normalize_constructor(ast, id, arguments, &types);
        }
        NodeOp::Constant(_) | NodeOp::Input(_) | NodeOp::Output { .. } => {
            ast.node_mut(id).num_input_elements = elements;
        }
    }
}

fn resolve_operator(
    ast: &mut Ast,
    id: NodeId,
    signatures: &'static [Signature],
    registers: &[RegisterType],
    elements: u8,
    single_element: bool,
) {
    let Some(index) = best_candidate(signatures.iter().map(|s| s.args), registers) else {
        return;
    };
    let returned = if single_element { 1 } else { elements };
    let node = ast.node_mut(id);
    node.return_type = DataType::new(signatures[index].ret, returned);
    node.num_input_elements = elements;
    node.overload = Some(index as u8);
}

fn resolve_function_call(
    ast: &mut Ast,
    id: NodeId,
    descs: &[FunctionId],
    mut arguments: Vec<NodeId>,
    registers: &[RegisterType],
    elements: u8,
) {
    let signatures: Vec<(usize, &[RegisterType])> = descs
        .iter()
        .enumerate()
        .filter_map(|(index, &fid)| {
            let desc = ast.function(fid);
            (registers.len() >= desc.num_required_inputs as usize)
                .then_some((index, desc.input_types.as_slice()))
        })
        .collect();
    let Some(best) = best_candidate(signatures.iter().map(|(_, args)| *args), registers) else {
        return;
    };
    let (index, _) = signatures[best];
    let desc = ast.function(descs[index]);
    let output = desc.output_type;
    arguments.truncate(desc.input_types.len());

    let node = ast.node_mut(id);
    node.return_type = DataType::new(output, elements);
    node.num_input_elements = elements;
    node.overload = Some(index as u8);
    if let NodeOp::FunctionCall { arguments: args, .. } = &mut node.op {
        *args = arguments;
    }
}

/// Rewrites constructor arguments to exactly one scalar per element.
fn normalize_constructor(ast: &mut Ast, id: NodeId, arguments: Vec<NodeId>, types: &[DataType]) {
    let target = ast.node(id).return_type;
    let count = target.element_count() as usize;

    let normalized = if arguments.len() == 1 && types[0].is_scalar() && count > 1 {
        vec![arguments[0]; count]
    } else {
        let mut flat = Vec::with_capacity(count);
        for (&arg, ty) in arguments.iter().zip(types) {
            if ty.is_scalar() {
                flat.push(arg);
            } else {
                for c in 0..ty.element_count() as usize {
                    flat.push(ast.create_swizzle(&[VectorComponent::from_index(c)], arg));
                }
            }
        }
        flat.truncate(count);
        if flat.len() < count {
            if let Some(zero) = Scalar::zero(target.register_type()) {
                let pad = ast.create_constant(zero.into());
                flat.resize(count, pad);
            }
        }
        flat
    };

    let node = ast.node_mut(id);
    node.num_input_elements = 1;
    node.overload = Some(0);
    node.op = NodeOp::ConstructorCall {
        arguments: normalized,
    };
}

/// Type that child `index` of `id` must have once types are deduced.
///
/// Returns [`DataType::UNKNOWN`] where no check applies: conversions and
/// swizzles accept anything, and unresolved nodes have no expectation.
pub fn expected_child_type(ast: &Ast, id: NodeId, index: usize) -> DataType {
    let node = ast.node(id);
    let elements = node.num_input_elements;
    let Some(overload) = node.overload.map(usize::from) else {
        return match node.op {
            NodeOp::Output { .. } => node.return_type,
            _ => DataType::UNKNOWN,
        };
    };

    let expected = match &node.op {
        NodeOp::Unary {
            op: UnaryOp::TypeConversion,
            ..
        }
        | NodeOp::Swizzle { .. } => return DataType::UNKNOWN,
        NodeOp::Unary { op, .. } => arg_type(unary_signatures(*op), overload, index),
        NodeOp::Binary { op, .. } => arg_type(binary_signatures(*op), overload, index),
        NodeOp::Ternary { op, .. } => arg_type(ternary_signatures(*op), overload, index),
        NodeOp::Output { .. } => return node.return_type,
        NodeOp::FunctionCall { descs, .. } => descs
            .get(overload)
            .and_then(|&fid| ast.function(fid).input_types.get(index).copied()),
        NodeOp::ConstructorCall { .. } => {
            return DataType::new(node.return_type.register_type(), 1);
        }
        NodeOp::Constant(_) | NodeOp::Input(_) => None,
    };
    expected.map_or(DataType::UNKNOWN, |register| {
        DataType::new(register, elements)
    })
}

fn arg_type(signatures: &[Signature], overload: usize, index: usize) -> Option<RegisterType> {
    signatures
        .get(overload)
        .and_then(|s| s.args.get(index).copied())
}
