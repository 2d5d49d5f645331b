//! Common subexpression elimination.

use crate::error::Result;
use crate::node::NodeId;
use crate::store::Ast;

use super::{Pass, TraversalOrder};

/// Collapses structurally identical nodes onto one canonical instance.
///
/// Runs post-order, so by the time a node is hashed its children have
/// already been replaced by their canonical instances and an id comparison
/// is enough to prove the children equal.
pub struct EliminateCommonSubexpressions;

impl Pass for EliminateCommonSubexpressions {
    fn name(&self) -> &'static str {
        "EliminateCommonSubexpressions"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PostOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        Ok(ast.deduplicate(id))
    }
}
