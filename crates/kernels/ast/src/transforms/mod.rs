//! Transform passes and the traversal drivers that run them.
//!
//! A [`Pass`] rewrites one node at a time: it receives a node id and returns
//! the id that should replace it (possibly the same one). The drivers walk the
//! graph from the outputs, redirect parents to the replacements and make sure
//! each shared node is transformed once per pass.
//!
//! # Traversal Orders
//!
//! - **Post-order**: children are transformed before their parents, so a pass
//!   sees fully rewritten operands. Used by type deduction, constant folding
//!   and CSE.
//! - **Pre-order**: a node is transformed before its children, and a
//!   replacement is transformed again until it is stable. Used by lowering
//!   passes that expand a node into a subtree whose parts need further
//!   lowering.
//!
//! # Pipeline
//!
//! [`run_pipeline`] applies the passes in their fixed order. The first error
//! aborts the pipeline.

mod cse;
mod fold;
mod lower;
mod scalarize;
mod types;
mod validate;
mod vector;

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeOp};
use crate::store::Ast;

pub use cse::EliminateCommonSubexpressions;
pub use fold::FoldConstants;
pub use lower::ReplaceUnsupportedInstructions;
pub use scalarize::{scalarize_outputs, ScalarizeInputs, ScalarizeVectorInstructions};
pub use types::DeduceTypes;
pub use validate::Validate;
pub use vector::ReplaceVectorInstructions;

/// Direction a driver walks the graph in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    PreOrder,
    PostOrder,
}

/// A node-level graph rewrite.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn order(&self) -> TraversalOrder;

    /// Returns the node that replaces `node`.
    fn transform(&mut self, ast: &mut Ast, node: NodeId) -> Result<NodeId>;
}

/// Record of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTrace {
    pub pass: &'static str,
    /// Nodes reachable from the outputs after the pass.
    pub reachable_nodes: usize,
}

/// Runs `pass` over every node reachable from the outputs.
pub fn run_pass(ast: &mut Ast, pass: &mut dyn Pass) -> Result<()> {
    if ast.outputs().is_empty() {
        return Err(Error::NoOutputs);
    }
    for &output in ast.outputs() {
        ast.get(output)?;
    }
    match pass.order() {
        TraversalOrder::PostOrder => run_post_order(ast, pass),
        TraversalOrder::PreOrder => run_pre_order(ast, pass),
    }
}

fn output_name(ast: &Ast, id: NodeId) -> String {
    match &ast.node(id).op {
        NodeOp::Output { desc, .. } => desc.name.clone(),
        _ => id.to_string(),
    }
}

fn check_output(ast: &Ast, old: NodeId, new: NodeId) -> Result<()> {
    if ast.node(new).is_output() {
        Ok(())
    } else {
        Err(Error::InvalidOutputTransform {
            name: output_name(ast, old),
        })
    }
}

/// Redirects the children of `id` to their cached replacements.
fn update_children(ast: &mut Ast, id: NodeId, cache: &HashMap<NodeId, NodeId>) {
    let children = ast.node(id).children();
    for (index, child) in children.into_iter().enumerate() {
        if let Some(&replacement) = cache.get(&child) {
            if replacement != child {
                ast.node_mut(id).set_child(index, replacement);
            }
        }
    }
}

fn run_post_order(ast: &mut Ast, pass: &mut dyn Pass) -> Result<()> {
    let mut cache: HashMap<NodeId, NodeId> = HashMap::new();
    for id in ast.post_order() {
        update_children(ast, id, &cache);
        let replacement = pass.transform(ast, id)?;
        cache.insert(id, replacement);
    }

    let mut outputs = ast.outputs().to_vec();
    for output in &mut outputs {
        let replacement = cache.get(output).copied().unwrap_or(*output);
        check_output(ast, *output, replacement)?;
        *output = replacement;
    }
    ast.set_outputs(outputs);
    Ok(())
}

/// Transforms `id` until the pass returns it unchanged.
fn transform_to_fixpoint(
    ast: &mut Ast,
    pass: &mut dyn Pass,
    cache: &mut HashMap<NodeId, NodeId>,
    id: NodeId,
) -> Result<NodeId> {
    if let Some(&done) = cache.get(&id) {
        return Ok(done);
    }
    let mut current = id;
    loop {
        let next = pass.transform(ast, current)?;
        if next == current {
            break;
        }
        current = next;
    }
    cache.insert(id, current);
    cache.insert(current, current);
    Ok(current)
}

fn run_pre_order(ast: &mut Ast, pass: &mut dyn Pass) -> Result<()> {
    let mut cache: HashMap<NodeId, NodeId> = HashMap::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut outputs = ast.outputs().to_vec();

    for output in &mut outputs {
        let replacement = transform_to_fixpoint(ast, pass, &mut cache, *output)?;
        check_output(ast, *output, replacement)?;
        *output = replacement;

        let mut stack = vec![replacement];
        while let Some(parent) = stack.pop() {
            if !visited.insert(parent) {
                continue;
            }
            let children = ast.node(parent).children();
            for (index, child) in children.into_iter().enumerate() {
                let new_child = transform_to_fixpoint(ast, pass, &mut cache, child)?;
                if new_child != child {
                    ast.node_mut(parent).set_child(index, new_child);
                }
                stack.push(new_child);
            }
        }
    }

    ast.set_outputs(outputs);
    Ok(())
}

fn run_traced(
    ast: &mut Ast,
    pass: &mut dyn Pass,
    traces: &mut Option<Vec<PassTrace>>,
) -> Result<()> {
    run_pass(ast, pass)?;
    record(ast, pass.name(), traces);
    Ok(())
}

fn record(ast: &Ast, name: &'static str, traces: &mut Option<Vec<PassTrace>>) {
    if let Some(traces) = traces {
        let reachable_nodes = ast.reachable_count();
        trace!(pass = name, reachable_nodes, "pass complete");
        traces.push(PassTrace {
            pass: name,
            reachable_nodes,
        });
    }
}

/// Runs the full compilation pipeline over `ast`.
///
/// With `trace_passes`, each pass is logged at trace level and recorded in
/// the returned list; otherwise the list is empty.
pub fn run_pipeline(ast: &mut Ast, trace_passes: bool) -> Result<Vec<PassTrace>> {
    let mut traces = trace_passes.then(Vec::new);

    run_traced(ast, &mut DeduceTypes, &mut traces)?;
    run_traced(ast, &mut ReplaceVectorInstructions, &mut traces)?;

    ast.scalarize_input_table();
    run_traced(ast, &mut ScalarizeInputs, &mut traces)?;
    scalarize_outputs(ast)?;
    record(ast, "ScalarizeOutputs", &mut traces);

    run_traced(ast, &mut ScalarizeVectorInstructions, &mut traces)?;
    run_traced(ast, &mut FoldConstants, &mut traces)?;
    run_traced(ast, &mut ReplaceUnsupportedInstructions, &mut traces)?;
    run_traced(ast, &mut FoldConstants, &mut traces)?;

    ast.clear_deduplication();
    run_traced(ast, &mut EliminateCommonSubexpressions, &mut traces)?;
    run_traced(ast, &mut Validate, &mut traces)?;

    Ok(traces.unwrap_or_default())
}

#[cfg(test)]
mod tests;
