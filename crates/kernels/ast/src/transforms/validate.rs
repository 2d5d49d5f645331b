//! Final consistency check before linearization.

use tracing::error;

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeOp};
use crate::overloads::expected_child_type;
use crate::store::Ast;

use super::{Pass, TraversalOrder};

/// Rejects any graph the emitter could not encode faithfully.
pub struct Validate;

impl Pass for Validate {
    fn name(&self) -> &'static str {
        "Validate"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PreOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let node = ast.node(id);
        if node.return_type.is_unknown() {
            return Err(Error::UnresolvedReturnType {
                op: node.describe(),
            });
        }

        match &node.op {
            NodeOp::ConstructorCall { .. } => {
                error!(node = %id, "constructor call survived lowering");
                return Err(Error::UnexpectedConstructor);
            }
            NodeOp::Constant(value) if !value.is_valid() => {
                return Err(Error::UnresolvedReturnType {
                    op: node.describe(),
                });
            }
            NodeOp::Unary { .. } | NodeOp::Binary { .. } | NodeOp::Ternary { .. }
                if node.overload.is_none() =>
            {
                return Err(Error::UnresolvedOverload {
                    op: node.describe(),
                });
            }
            NodeOp::FunctionCall { descs, arguments } => {
                let desc = node
                    .overload
                    .and_then(|o| descs.get(o as usize))
                    .map(|&fid| ast.function(fid))
                    .ok_or_else(|| Error::UnresolvedOverload {
                        op: node.describe(),
                    })?;
                if arguments.len() < desc.num_required_inputs as usize {
                    return Err(Error::NotEnoughArguments {
                        function: desc.name.clone(),
                        required: desc.num_required_inputs as usize,
                        given: arguments.len(),
                    });
                }
            }
            _ => {}
        }

        for (index, child) in node.children().into_iter().enumerate() {
            let expected = expected_child_type(ast, id, index);
            let actual = ast.node(child).return_type;
            if !expected.is_unknown() && expected != actual {
                return Err(Error::ArgumentTypeMismatch {
                    op: node.describe(),
                    index,
                    expected,
                    actual,
                });
            }
        }
        Ok(id)
    }
}
