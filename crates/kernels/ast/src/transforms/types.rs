//! Type deduction and implicit conversion.

use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::overloads::{expected_child_type, resolve_overloads};
use crate::store::Ast;

use super::{Pass, TraversalOrder};

/// Resolves every node's overload and makes child types match exactly.
///
/// A child of the wrong register type is wrapped in a conversion; a scalar
/// feeding a vector slot is wrapped in a broadcasting constructor. Anything
/// else that still mismatches in width is an error.
pub struct DeduceTypes;

impl Pass for DeduceTypes {
    fn name(&self) -> &'static str {
        "DeduceTypes"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PostOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        resolve_overloads(ast, id);
        let node = ast.node(id);
        if node.return_type.is_unknown() {
            return Err(Error::NoMatchingOverload {
                op: node.describe(),
            });
        }

        for (index, child) in node.children().into_iter().enumerate() {
            let expected = expected_child_type(ast, id, index);
            let actual = ast.node(child).return_type;
            if expected.is_unknown() || expected == actual {
                continue;
            }

            let mut replacement = child;
            if expected.register_type() != actual.register_type() {
                replacement = ast.create_conversion(replacement, expected.register_type());
            }
            let converted = ast.node(replacement).return_type;
            if converted.element_count() < expected.element_count() && converted.is_scalar() {
                replacement = ast.create_constructor_call(expected, vec![replacement]);
            } else if converted.element_count() != expected.element_count() {
                return Err(Error::ImplicitConversion {
                    from: actual,
                    to: expected,
                });
            }
            ast.node_mut(id).set_child(index, replacement);
        }
        Ok(id)
    }
}
