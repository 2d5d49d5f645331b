//! Instruction ordering and register lifetimes.
//!
//! The graph is flattened into a sequence where every node follows the
//! nodes it reads. Shared nodes are emitted once. Constants that can be
//! encoded as immediates are left out of the sequence entirely.

use std::collections::{HashMap, HashSet};

use lanevm_ast::{Ast, NodeId, NodeOp};

use super::regalloc::LiveInterval;
use crate::error::CompileError;

/// One graph node in instruction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub node: NodeId,
    /// Virtual register written by this step. `None` for stores.
    pub virtual_register: Option<usize>,
}

/// The linear program before physical registers are assigned.
#[derive(Debug, Default)]
pub(crate) struct Linearized {
    pub steps: Vec<Step>,
    /// Live interval per virtual register, indexed by virtual register.
    pub intervals: Vec<LiveInterval>,
    /// Virtual register of every node that owns one.
    pub registers: HashMap<NodeId, usize>,
}

/// Reusable traversal buffers.
#[derive(Debug, Default)]
pub(crate) struct LinearizeScratch {
    stack: Vec<(NodeId, bool)>,
    visited: HashSet<NodeId>,
}

/// Whether `child` of `parent` is encoded inside the parent's instruction.
pub(crate) fn is_immediate(ast: &Ast, parent: NodeId, index: usize, child: NodeId) -> bool {
    if ast.node(child).as_constant().is_none() {
        return false;
    }
    match ast.node(parent).op {
        NodeOp::Binary { .. } => index == 1,
        NodeOp::Output { .. } => true,
        _ => false,
    }
}

fn check(ast: &Ast, id: NodeId) -> Result<(), CompileError> {
    ast.get(id).map(|_| ()).map_err(|_| CompileError::InvalidNode(id))
}

/// Orders every node reachable from the outputs, children first.
///
/// # Errors
///
/// Returns [`CompileError::NoOutputs`] for a graph without outputs and
/// [`CompileError::InvalidNode`] for a reference outside the arena.
pub(crate) fn linearize(
    ast: &Ast,
    scratch: &mut LinearizeScratch,
) -> Result<Linearized, CompileError> {
    if ast.outputs().is_empty() {
        return Err(CompileError::NoOutputs);
    }

    let LinearizeScratch { stack, visited } = scratch;
    stack.clear();
    visited.clear();

    let mut order = Vec::new();
    for &output in ast.outputs() {
        check(ast, output)?;
        stack.push((output, false));
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            let children = ast.node(id).children();
            for (index, &child) in children.iter().enumerate().rev() {
                check(ast, child)?;
                if !visited.contains(&child) && !is_immediate(ast, id, index, child) {
                    stack.push((child, false));
                }
            }
        }
    }

    let mut linear = Linearized::default();
    for (index, &node) in order.iter().enumerate() {
        let at = index as u32;
        for (slot, child) in ast.node(node).children().into_iter().enumerate() {
            if is_immediate(ast, node, slot, child) {
                continue;
            }
            if let Some(&vreg) = linear.registers.get(&child) {
                let interval = &mut linear.intervals[vreg];
                interval.end = interval.end.max(at);
            }
        }

        let virtual_register = if ast.node(node).is_output() {
            None
        } else {
            let vreg = linear.intervals.len();
            linear.intervals.push(LiveInterval {
                start: at,
                end: at,
                node,
            });
            linear.registers.insert(node, vreg);
            Some(vreg)
        };
        linear.steps.push(Step {
            node,
            virtual_register,
        });
    }
    Ok(linear)
}
