//! The expression graph arena.
//!
//! [`Ast`] owns every node of one compilation. Factories append nodes and
//! return their [`NodeId`]; nodes are never removed, so ids stay valid for the
//! lifetime of the arena. Passes that rewrite the graph create new nodes and
//! redirect parents to them, leaving the old ones unreachable.
//!
//! # Deduplication
//!
//! [`Ast::deduplicate`] collapses structurally identical nodes. The
//! structural hash is only a bucket key; a hit is accepted after
//! [`Ast::is_equal`] confirms the two nodes really are the same.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use lanevm_foundation::{
    DataType, FunctionDesc, RegisterType, StableHasher, StreamDesc, VectorComponent,
};

use crate::error::{Error, Result};
use crate::node::{
    BinaryOp, ConstantValue, FunctionId, Node, NodeId, NodeOp, Scalar, TernaryOp, UnaryOp,
};
use crate::overloads::resolve_overloads;

/// Arena of expression nodes plus the input, output and function tables.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    outputs: Vec<NodeId>,
    inputs: Vec<StreamDesc>,
    functions: IndexSet<FunctionDesc>,
    dedup: HashMap<u64, Vec<NodeId>>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever created, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id. Panics on an id from another arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Node by id, reporting foreign ids as [`Error::InvalidNode`].
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::InvalidNode(id))
    }

    /// Output roots in declaration order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub(crate) fn set_outputs(&mut self, outputs: Vec<NodeId>) {
        self.outputs = outputs;
    }

    /// Input streams in first-use order.
    pub fn inputs(&self) -> &[StreamDesc] {
        &self.inputs
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDesc {
        &self.functions[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDesc> {
        self.functions.iter()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        resolve_overloads(self, id);
        id
    }

    // === Factories ===

    pub fn create_unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.push(Node::new(NodeOp::Unary { op, operand }, DataType::UNKNOWN))
    }

    /// Type conversion of `operand` to `target`, keeping its element count.
    pub fn create_conversion(&mut self, operand: NodeId, target: RegisterType) -> NodeId {
        self.push(Node::new(
            NodeOp::Unary {
                op: UnaryOp::TypeConversion,
                operand,
            },
            DataType::new(target, 1),
        ))
    }

    pub fn create_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.push(Node::new(
            NodeOp::Binary { op, left, right },
            DataType::UNKNOWN,
        ))
    }

    pub fn create_ternary(
        &mut self,
        op: TernaryOp,
        first: NodeId,
        second: NodeId,
        third: NodeId,
    ) -> NodeId {
        self.push(Node::new(
            NodeOp::Ternary {
                op,
                args: [first, second, third],
            },
            DataType::UNKNOWN,
        ))
    }

    pub fn create_constant(&mut self, value: ConstantValue) -> NodeId {
        self.push(Node::new(NodeOp::Constant(value), value.data_type()))
    }

    pub fn create_float(&mut self, value: f32) -> NodeId {
        self.create_constant(ConstantValue::float(value))
    }

    pub fn create_int(&mut self, value: i32) -> NodeId {
        self.create_constant(ConstantValue::int(value))
    }

    pub fn create_bool(&mut self, value: bool) -> NodeId {
        self.create_constant(ConstantValue::bool(value))
    }

    pub(crate) fn create_scalar(&mut self, value: Scalar) -> NodeId {
        self.create_constant(value.into())
    }

    pub fn create_swizzle(&mut self, components: &[VectorComponent], expression: NodeId) -> NodeId {
        self.push(Node::new(
            NodeOp::Swizzle {
                components: components.to_vec(),
                expression,
            },
            DataType::UNKNOWN,
        ))
    }

    /// Swizzle from a component string such as `"xyz"` or `"bgr"`.
    ///
    /// Unknown characters are skipped.
    pub fn create_swizzle_str(&mut self, components: &str, expression: NodeId) -> NodeId {
        let components: Vec<VectorComponent> =
            components.chars().filter_map(VectorComponent::from_char).collect();
        self.create_swizzle(&components, expression)
    }

    /// Input node; the stream is added to the input table on first use.
    pub fn create_input(&mut self, desc: StreamDesc) -> NodeId {
        if !self.inputs.iter().any(|d| d.name == desc.name) {
            self.inputs.push(desc.clone());
        }
        let data_type = desc.data_type.data_type();
        self.push(Node::new(NodeOp::Input(desc), data_type))
    }

    /// Output node, registered as a root of the graph.
    pub fn create_output(&mut self, desc: StreamDesc, expression: NodeId) -> NodeId {
        let id = self.make_output(desc, expression);
        self.outputs.push(id);
        id
    }

    /// Output node that is not registered as a root.
    pub(crate) fn make_output(&mut self, desc: StreamDesc, expression: NodeId) -> NodeId {
        let data_type = desc.data_type.data_type();
        self.push(Node::new(NodeOp::Output { desc, expression }, data_type))
    }

    /// Call to a native function. Each candidate is added to the function
    /// table; the overload is chosen once the arguments are typed.
    pub fn create_function_call(
        &mut self,
        candidates: &[FunctionDesc],
        arguments: Vec<NodeId>,
    ) -> NodeId {
        let descs = candidates
            .iter()
            .map(|desc| {
                let (index, _) = self.functions.insert_full(desc.clone());
                FunctionId::new(index as u32)
            })
            .collect();
        self.push(Node::new(
            NodeOp::FunctionCall { descs, arguments },
            DataType::UNKNOWN,
        ))
    }

    /// Function call over candidates already in the function table.
    pub(crate) fn create_function_call_ids(
        &mut self,
        descs: Vec<FunctionId>,
        arguments: Vec<NodeId>,
    ) -> NodeId {
        self.push(Node::new(
            NodeOp::FunctionCall { descs, arguments },
            DataType::UNKNOWN,
        ))
    }

    pub fn create_constructor_call(&mut self, data_type: DataType, arguments: Vec<NodeId>) -> NodeId {
        self.push(Node::new(NodeOp::ConstructorCall { arguments }, data_type))
    }

    // === Input table ===

    /// Replaces every vector input stream by its scalar components, in place.
    pub(crate) fn scalarize_input_table(&mut self) {
        let mut scalar = Vec::with_capacity(self.inputs.len());
        for desc in self.inputs.drain(..) {
            let count = desc.data_type.element_count();
            if count == 1 {
                scalar.push(desc);
                continue;
            }
            for component in VectorComponent::ALL.iter().take(count as usize) {
                scalar.push(component_stream(&desc, *component));
            }
        }
        self.inputs = scalar;
    }

    // === Traversal ===

    /// Every node reachable from the outputs, children before parents.
    ///
    /// Each node appears once, in the order an iterative depth-first walk
    /// finishes it.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(NodeId, bool)> = Vec::new();
        for &root in self.outputs.iter().rev() {
            stack.push((root, false));
        }
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.node(id).children().into_iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Number of nodes reachable from the outputs.
    pub fn reachable_count(&self) -> usize {
        self.post_order().len()
    }

    // === Structural identity ===

    /// Recomputes the structural hash of `id` from its payload and the
    /// current hashes of its children.
    pub fn update_hash(&mut self, id: NodeId) -> u64 {
        let node = self.node(id);
        let mut hasher = StableHasher::new();
        hasher
            .write_u8(node.return_type.register_type() as u8)
            .write_u8(node.return_type.element_count());

        match &node.op {
            NodeOp::Unary { op, .. } => {
                hasher.write_u8(1).write_str(op.name());
            }
            NodeOp::Binary { op, .. } => {
                hasher.write_u8(2).write_str(op.name());
            }
            NodeOp::Ternary { op, .. } => {
                hasher.write_u8(3).write_str(op.name());
            }
            NodeOp::Constant(value) => {
                hasher.write_u8(4).write_u8(value.register_type() as u8);
                for &bits in value.bits() {
                    hasher.write_u32(bits);
                }
            }
            NodeOp::Swizzle { components, .. } => {
                hasher.write_u8(5);
                for c in components {
                    hasher.write_u8(*c as u8);
                }
            }
            NodeOp::Input(desc) => {
                hasher.write_u8(6).write_str(&desc.name);
                hasher.write_str(&desc.data_type.to_string());
            }
            NodeOp::Output { desc, .. } => {
                hasher.write_u8(7).write_str(&desc.name);
                hasher.write_str(&desc.data_type.to_string());
            }
            NodeOp::FunctionCall { descs, .. } => {
                hasher.write_u8(8);
                for &fid in descs {
                    hasher.write_str(&self.function(fid).mangled_name());
                }
            }
            NodeOp::ConstructorCall { .. } => {
                hasher.write_u8(9);
            }
        }

        let mut child_hashes: Vec<u64> = node
            .children()
            .iter()
            .map(|&c| self.node(c).hash)
            .collect();
        if matches!(node.op, NodeOp::Binary { op, .. } if op.is_commutative()) {
            child_hashes.sort_unstable();
        }
        for h in child_hashes {
            hasher.write_u64(h);
        }

        let hash = hasher.finish();
        self.node_mut(id).hash = hash;
        hash
    }

    /// Full structural equality. Children are compared by id, so both nodes
    /// must already point at deduplicated children.
    pub fn is_equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (na, nb) = (self.node(a), self.node(b));
        if na.return_type != nb.return_type {
            return false;
        }
        match (&na.op, &nb.op) {
            (
                NodeOp::Binary {
                    op: op_a,
                    left: la,
                    right: ra,
                },
                NodeOp::Binary {
                    op: op_b,
                    left: lb,
                    right: rb,
                },
            ) => {
                op_a == op_b
                    && ((la == lb && ra == rb) || (op_a.is_commutative() && la == rb && ra == lb))
            }
            (
                NodeOp::FunctionCall {
                    descs: da,
                    arguments: aa,
                },
                NodeOp::FunctionCall {
                    descs: db,
                    arguments: ab,
                },
            ) => na.overload == nb.overload && da == db && aa == ab,
            (op_a, op_b) => op_a == op_b,
        }
    }

    /// Returns an existing node structurally equal to `id`, or registers
    /// `id` as the canonical instance.
    pub fn deduplicate(&mut self, id: NodeId) -> NodeId {
        let hash = self.update_hash(id);
        if let Some(bucket) = self.dedup.get(&hash) {
            if let Some(&existing) = bucket.iter().find(|&&other| self.is_equal(other, id)) {
                return existing;
            }
        }
        self.dedup.entry(hash).or_default().push(id);
        id
    }

    /// Forgets every canonical instance.
    pub fn clear_deduplication(&mut self) {
        self.dedup.clear();
    }
}

/// Scalar stream `name.c` for one component of a vector stream.
pub(crate) fn component_stream(desc: &StreamDesc, component: VectorComponent) -> StreamDesc {
    StreamDesc::new(
        format!("{}.{}", desc.name, component.as_char()),
        desc.data_type.scalar(),
    )
}
