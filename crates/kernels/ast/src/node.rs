//! Expression graph nodes.
//!
//! A [`Node`] is one operation in the expression DAG. Children are referred
//! to by [`NodeId`] into the owning [`Ast`](crate::Ast) arena, so a node can
//! be shared by any number of parents without reference counting.
//!
//! # Node Categories
//!
//! - **Operators** - [`NodeOp::Unary`], [`NodeOp::Binary`], [`NodeOp::Ternary`]
//! - **Leaves** - [`NodeOp::Constant`], [`NodeOp::Input`]
//! - **Roots** - [`NodeOp::Output`]
//! - **Vector plumbing** - [`NodeOp::Swizzle`], [`NodeOp::ConstructorCall`]
//! - **Calls** - [`NodeOp::FunctionCall`] into the native function table

use std::fmt;

use lanevm_foundation::{arith, DataType, RegisterType, StreamDesc, VectorComponent};

/// Index of a node in its [`Ast`](crate::Ast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Index of a function descriptor in the AST function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Single-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Absolute,
    Saturate,
    Sqrt,
    Exp,
    Ln,
    Log2,
    Log10,
    Pow2,
    Sin,
    Cos,
    Tan,
    ASin,
    ACos,
    ATan,
    RadToDeg,
    DegToRad,
    Round,
    Floor,
    Ceil,
    Trunc,
    Frac,
    Length,
    Normalize,
    BitwiseNot,
    LogicalNot,
    All,
    Any,
    /// Register type change. The target type is the node's return type.
    TypeConversion,
}

impl UnaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "Negate",
            UnaryOp::Absolute => "Absolute",
            UnaryOp::Saturate => "Saturate",
            UnaryOp::Sqrt => "Sqrt",
            UnaryOp::Exp => "Exp",
            UnaryOp::Ln => "Ln",
            UnaryOp::Log2 => "Log2",
            UnaryOp::Log10 => "Log10",
            UnaryOp::Pow2 => "Pow2",
            UnaryOp::Sin => "Sin",
            UnaryOp::Cos => "Cos",
            UnaryOp::Tan => "Tan",
            UnaryOp::ASin => "ASin",
            UnaryOp::ACos => "ACos",
            UnaryOp::ATan => "ATan",
            UnaryOp::RadToDeg => "RadToDeg",
            UnaryOp::DegToRad => "DegToRad",
            UnaryOp::Round => "Round",
            UnaryOp::Floor => "Floor",
            UnaryOp::Ceil => "Ceil",
            UnaryOp::Trunc => "Trunc",
            UnaryOp::Frac => "Frac",
            UnaryOp::Length => "Length",
            UnaryOp::Normalize => "Normalize",
            UnaryOp::BitwiseNot => "BitwiseNot",
            UnaryOp::LogicalNot => "LogicalNot",
            UnaryOp::All => "All",
            UnaryOp::Any => "Any",
            UnaryOp::TypeConversion => "TypeConversion",
        }
    }

    /// Ops that reduce a vector to one element.
    pub const fn always_single_element(self) -> bool {
        matches!(self, UnaryOp::Length | UnaryOp::All | UnaryOp::Any)
    }
}

/// Two-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// `Log(base, value)`.
    Log,
    /// `Pow(base, exponent)`.
    Pow,
    Min,
    Max,
    Dot,
    Cross,
    /// `Reflect(incident, normal)`.
    Reflect,
    BitshiftLeft,
    BitshiftRight,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Subtract => "Subtract",
            BinaryOp::Multiply => "Multiply",
            BinaryOp::Divide => "Divide",
            BinaryOp::Modulo => "Modulo",
            BinaryOp::Log => "Log",
            BinaryOp::Pow => "Pow",
            BinaryOp::Min => "Min",
            BinaryOp::Max => "Max",
            BinaryOp::Dot => "Dot",
            BinaryOp::Cross => "Cross",
            BinaryOp::Reflect => "Reflect",
            BinaryOp::BitshiftLeft => "BitshiftLeft",
            BinaryOp::BitshiftRight => "BitshiftRight",
            BinaryOp::BitwiseAnd => "BitwiseAnd",
            BinaryOp::BitwiseXor => "BitwiseXor",
            BinaryOp::BitwiseOr => "BitwiseOr",
            BinaryOp::Equal => "Equal",
            BinaryOp::NotEqual => "NotEqual",
            BinaryOp::Less => "Less",
            BinaryOp::LessEqual => "LessEqual",
            BinaryOp::Greater => "Greater",
            BinaryOp::GreaterEqual => "GreaterEqual",
            BinaryOp::LogicalAnd => "LogicalAnd",
            BinaryOp::LogicalOr => "LogicalOr",
        }
    }

    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Multiply
                | BinaryOp::Min
                | BinaryOp::Max
                | BinaryOp::BitwiseAnd
                | BinaryOp::BitwiseXor
                | BinaryOp::BitwiseOr
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
        )
    }

    /// The comparison that gives the same result with swapped operands.
    pub const fn mirrored(self) -> Option<Self> {
        match self {
            BinaryOp::Less => Some(BinaryOp::Greater),
            BinaryOp::LessEqual => Some(BinaryOp::GreaterEqual),
            BinaryOp::Greater => Some(BinaryOp::Less),
            BinaryOp::GreaterEqual => Some(BinaryOp::LessEqual),
            _ => None,
        }
    }

    pub const fn always_single_element(self) -> bool {
        matches!(self, BinaryOp::Dot)
    }
}

/// Three-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TernaryOp {
    /// `Clamp(value, low, high)`.
    Clamp,
    /// `Select(condition, if_true, if_false)`.
    Select,
    /// `Lerp(a, b, s)`.
    Lerp,
    /// `SmoothStep(edge0, edge1, x)`.
    SmoothStep,
    /// `SmootherStep(edge0, edge1, x)`.
    SmootherStep,
}

impl TernaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            TernaryOp::Clamp => "Clamp",
            TernaryOp::Select => "Select",
            TernaryOp::Lerp => "Lerp",
            TernaryOp::SmoothStep => "SmoothStep",
            TernaryOp::SmootherStep => "SmootherStep",
        }
    }
}

/// A single typed literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl Scalar {
    pub const fn register_type(self) -> RegisterType {
        match self {
            Scalar::Bool(_) => RegisterType::Bool,
            Scalar::Int(_) => RegisterType::Int,
            Scalar::Float(_) => RegisterType::Float,
        }
    }

    /// Raw 32-bit lane encoding.
    pub fn bits(self) -> u32 {
        match self {
            Scalar::Bool(true) => 0xFFFF_FFFF,
            Scalar::Bool(false) => 0,
            Scalar::Int(v) => v as u32,
            Scalar::Float(v) => v.to_bits(),
        }
    }

    pub fn from_bits(register: RegisterType, bits: u32) -> Option<Self> {
        match register {
            RegisterType::Bool => Some(Scalar::Bool(bits != 0)),
            RegisterType::Int => Some(Scalar::Int(bits as i32)),
            RegisterType::Float => Some(Scalar::Float(f32::from_bits(bits))),
            RegisterType::Unknown => None,
        }
    }

    /// Zero of the given register type; `false` for bools.
    pub fn zero(register: RegisterType) -> Option<Self> {
        Self::from_bits(register, 0)
    }

    /// One of the given register type; `true` for bools.
    pub fn one(register: RegisterType) -> Option<Self> {
        match register {
            RegisterType::Bool => Some(Scalar::Bool(true)),
            RegisterType::Int => Some(Scalar::Int(1)),
            RegisterType::Float => Some(Scalar::Float(1.0)),
            RegisterType::Unknown => None,
        }
    }

    /// Value conversion with the same semantics as the VM conversion ops.
    pub fn convert(self, to: RegisterType) -> Option<Self> {
        let converted = match (self, to) {
            (_, RegisterType::Unknown) => return None,
            (Scalar::Bool(b), RegisterType::Bool) => Scalar::Bool(b),
            (Scalar::Bool(b), RegisterType::Int) => Scalar::Int(b as i32),
            (Scalar::Bool(b), RegisterType::Float) => Scalar::Float(if b { 1.0 } else { 0.0 }),
            (Scalar::Int(v), RegisterType::Bool) => Scalar::Bool(v != 0),
            (Scalar::Int(v), RegisterType::Int) => Scalar::Int(v),
            (Scalar::Int(v), RegisterType::Float) => Scalar::Float(arith::i_to_f(v)),
            (Scalar::Float(v), RegisterType::Bool) => Scalar::Bool(v != 0.0),
            (Scalar::Float(v), RegisterType::Int) => Scalar::Int(arith::f_to_i(v)),
            (Scalar::Float(v), RegisterType::Float) => Scalar::Float(v),
        };
        Some(converted)
    }

    pub fn is_zero(self) -> bool {
        match self {
            Scalar::Bool(b) => !b,
            Scalar::Int(v) => v == 0,
            Scalar::Float(v) => v == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v == 1,
            Scalar::Float(v) => v == 1.0,
        }
    }

    /// Whether the value equals `n` exactly.
    pub fn is_value(self, n: i32) -> bool {
        match self {
            Scalar::Bool(_) => false,
            Scalar::Int(v) => v == n,
            Scalar::Float(v) => v == n as f32,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// A literal with 1-4 components of one register type.
///
/// Stored as raw lane bits so constants hash and compare bit-exactly
/// (`-0.0 != 0.0`, and identical NaNs are equal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantValue {
    register: RegisterType,
    count: u8,
    bits: [u32; 4],
}

impl ConstantValue {
    pub fn float(value: f32) -> Self {
        Self::scalar(Scalar::Float(value))
    }

    pub fn int(value: i32) -> Self {
        Self::scalar(Scalar::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::scalar(Scalar::Bool(value))
    }

    pub fn scalar(value: Scalar) -> Self {
        Self {
            register: value.register_type(),
            count: 1,
            bits: [value.bits(), 0, 0, 0],
        }
    }

    pub fn floats(values: &[f32]) -> Self {
        Self::from_bits(RegisterType::Float, values.iter().map(|v| v.to_bits()))
    }

    pub fn ints(values: &[i32]) -> Self {
        Self::from_bits(RegisterType::Int, values.iter().map(|&v| v as u32))
    }

    pub fn bools(values: &[bool]) -> Self {
        Self::from_bits(
            RegisterType::Bool,
            values.iter().map(|&b| Scalar::Bool(b).bits()),
        )
    }

    fn from_bits(register: RegisterType, values: impl Iterator<Item = u32>) -> Self {
        let mut bits = [0u32; 4];
        let mut count = 0u8;
        for (slot, value) in bits.iter_mut().zip(values) {
            *slot = value;
            count += 1;
        }
        Self {
            register,
            count,
            bits,
        }
    }

    #[inline]
    pub fn register_type(&self) -> RegisterType {
        self.register
    }

    #[inline]
    pub fn element_count(&self) -> u8 {
        self.count
    }

    pub fn data_type(&self) -> DataType {
        if self.is_valid() {
            DataType::new(self.register, self.count)
        } else {
            DataType::UNKNOWN
        }
    }

    /// A known register type with 1-4 components.
    pub fn is_valid(&self) -> bool {
        self.register != RegisterType::Unknown && (1..=4).contains(&self.count)
    }

    pub fn component(&self, component: VectorComponent) -> Option<Scalar> {
        let index = component.index();
        if index >= self.count as usize {
            return None;
        }
        Scalar::from_bits(self.register, self.bits[index])
    }

    /// The value if this constant has exactly one component.
    pub fn as_scalar(&self) -> Option<Scalar> {
        if self.count == 1 {
            Scalar::from_bits(self.register, self.bits[0])
        } else {
            None
        }
    }

    /// Raw lane bits of the used components.
    pub fn bits(&self) -> &[u32] {
        &self.bits[..self.count as usize]
    }
}

impl From<Scalar> for ConstantValue {
    fn from(value: Scalar) -> Self {
        Self::scalar(value)
    }
}

/// The operation a node performs, together with its child references.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Ternary {
        op: TernaryOp,
        args: [NodeId; 3],
    },
    Constant(ConstantValue),
    /// Component selection, 1-4 components.
    Swizzle {
        components: Vec<VectorComponent>,
        expression: NodeId,
    },
    Input(StreamDesc),
    Output {
        desc: StreamDesc,
        expression: NodeId,
    },
    /// Native call with overload candidates from the AST function table.
    FunctionCall {
        descs: Vec<FunctionId>,
        arguments: Vec<NodeId>,
    },
    /// Vector construction. The target type is the node's return type.
    ConstructorCall { arguments: Vec<NodeId> },
}

/// One node of the expression graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: NodeOp,
    pub return_type: DataType,
    /// Index of the chosen operator signature or function candidate.
    pub overload: Option<u8>,
    /// Largest element count among the children.
    pub num_input_elements: u8,
    /// Structural hash, refreshed by [`Ast::update_hash`](crate::Ast::update_hash).
    pub hash: u64,
}

impl Node {
    pub fn new(op: NodeOp, return_type: DataType) -> Self {
        Self {
            op,
            return_type,
            overload: None,
            num_input_elements: 0,
            hash: 0,
        }
    }

    pub fn children(&self) -> Vec<NodeId> {
        match &self.op {
            NodeOp::Unary { operand, .. } => vec![*operand],
            NodeOp::Binary { left, right, .. } => vec![*left, *right],
            NodeOp::Ternary { args, .. } => args.to_vec(),
            NodeOp::Constant(_) | NodeOp::Input(_) => Vec::new(),
            NodeOp::Swizzle { expression, .. } | NodeOp::Output { expression, .. } => {
                vec![*expression]
            }
            NodeOp::FunctionCall { arguments, .. } | NodeOp::ConstructorCall { arguments } => {
                arguments.clone()
            }
        }
    }

    pub fn num_children(&self) -> usize {
        match &self.op {
            NodeOp::Unary { .. } | NodeOp::Swizzle { .. } | NodeOp::Output { .. } => 1,
            NodeOp::Binary { .. } => 2,
            NodeOp::Ternary { .. } => 3,
            NodeOp::Constant(_) | NodeOp::Input(_) => 0,
            NodeOp::FunctionCall { arguments, .. } | NodeOp::ConstructorCall { arguments } => {
                arguments.len()
            }
        }
    }

    pub fn child(&self, index: usize) -> Option<NodeId> {
        match &self.op {
            NodeOp::Unary { operand, .. } if index == 0 => Some(*operand),
            NodeOp::Binary { left, .. } if index == 0 => Some(*left),
            NodeOp::Binary { right, .. } if index == 1 => Some(*right),
            NodeOp::Ternary { args, .. } => args.get(index).copied(),
            NodeOp::Swizzle { expression, .. } | NodeOp::Output { expression, .. }
                if index == 0 =>
            {
                Some(*expression)
            }
            NodeOp::FunctionCall { arguments, .. } | NodeOp::ConstructorCall { arguments } => {
                arguments.get(index).copied()
            }
            _ => None,
        }
    }

    /// Replaces child `index`. Out-of-range indices are ignored.
    pub fn set_child(&mut self, index: usize, child: NodeId) {
        let slot = match &mut self.op {
            NodeOp::Unary { operand, .. } if index == 0 => operand,
            NodeOp::Binary { left, .. } if index == 0 => left,
            NodeOp::Binary { right, .. } if index == 1 => right,
            NodeOp::Ternary { args, .. } if index < 3 => &mut args[index],
            NodeOp::Swizzle { expression, .. } | NodeOp::Output { expression, .. }
                if index == 0 =>
            {
                expression
            }
            NodeOp::FunctionCall { arguments, .. } | NodeOp::ConstructorCall { arguments }
                if index < arguments.len() =>
            {
                &mut arguments[index]
            }
            _ => return,
        };
        *slot = child;
    }

    /// Short human-readable name of the operation, used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.op {
            NodeOp::Unary { op, .. } => op.name().to_string(),
            NodeOp::Binary { op, .. } => op.name().to_string(),
            NodeOp::Ternary { op, .. } => op.name().to_string(),
            NodeOp::Constant(_) => "Constant".to_string(),
            NodeOp::Swizzle { components, .. } => {
                let mut name = String::from("Swizzle .");
                name.extend(components.iter().map(|c| c.as_char()));
                name
            }
            NodeOp::Input(desc) => format!("Input '{}'", desc.name),
            NodeOp::Output { desc, .. } => format!("Output '{}'", desc.name),
            NodeOp::FunctionCall { .. } => "FunctionCall".to_string(),
            NodeOp::ConstructorCall { .. } => format!("Constructor {}", self.return_type),
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match &self.op {
            NodeOp::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self.op, NodeOp::Output { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bits() {
        assert_eq!(Scalar::Bool(true).bits(), 0xFFFF_FFFF);
        assert_eq!(Scalar::Int(-1).bits(), 0xFFFF_FFFF);
        assert_eq!(Scalar::Float(1.0).bits(), 0x3F80_0000);
    }

    #[test]
    fn test_scalar_convert() {
        assert_eq!(
            Scalar::Float(-2.7).convert(RegisterType::Int),
            Some(Scalar::Int(-2))
        );
        assert_eq!(
            Scalar::Bool(true).convert(RegisterType::Float),
            Some(Scalar::Float(1.0))
        );
        assert_eq!(
            Scalar::Int(0).convert(RegisterType::Bool),
            Some(Scalar::Bool(false))
        );
        assert_eq!(Scalar::Int(3).convert(RegisterType::Unknown), None);
    }

    #[test]
    fn test_constant_components() {
        let v = ConstantValue::floats(&[1.0, 2.0, 3.0]);
        assert_eq!(v.data_type(), DataType::new(RegisterType::Float, 3));
        assert_eq!(v.component(VectorComponent::Y), Some(Scalar::Float(2.0)));
        assert_eq!(v.component(VectorComponent::W), None);
        assert_eq!(v.as_scalar(), None);
        assert_eq!(ConstantValue::int(7).as_scalar(), Some(Scalar::Int(7)));
    }

    #[test]
    fn test_constant_bit_equality() {
        assert_ne!(ConstantValue::float(0.0), ConstantValue::float(-0.0));
        assert_eq!(
            ConstantValue::float(f32::NAN),
            ConstantValue::float(f32::NAN)
        );
    }

    #[test]
    fn test_set_child() {
        let mut node = Node::new(
            NodeOp::Binary {
                op: BinaryOp::Add,
                left: NodeId::new(0),
                right: NodeId::new(1),
            },
            DataType::FLOAT,
        );
        node.set_child(1, NodeId::new(5));
        node.set_child(2, NodeId::new(9));
        assert_eq!(node.children(), vec![NodeId::new(0), NodeId::new(5)]);
        assert_eq!(node.child(1), Some(NodeId::new(5)));
        assert_eq!(node.child(2), None);
    }

    #[test]
    fn test_mirrored_comparisons() {
        assert_eq!(BinaryOp::Less.mirrored(), Some(BinaryOp::Greater));
        assert_eq!(BinaryOp::GreaterEqual.mirrored(), Some(BinaryOp::LessEqual));
        assert_eq!(BinaryOp::Add.mirrored(), None);
        assert!(BinaryOp::Max.is_commutative());
        assert!(!BinaryOp::Subtract.is_commutative());
    }
}
