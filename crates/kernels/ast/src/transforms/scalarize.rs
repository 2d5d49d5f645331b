//! Splitting of vector streams and vector expressions into scalars.
//!
//! After these passes every output is scalar and every remaining node
//! produces one element. Vector values only survive as constructor calls
//! feeding single-component swizzles, which are resolved here too.

use lanevm_foundation::VectorComponent;

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeOp, UnaryOp};
use crate::store::{component_stream, Ast};

use super::{Pass, TraversalOrder};

/// Replaces vector inputs with a constructor over scalar component inputs
/// named `name.x`, `name.y`, ...
pub struct ScalarizeInputs;

impl Pass for ScalarizeInputs {
    fn name(&self) -> &'static str {
        "ScalarizeInputs"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PostOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let node = ast.node(id);
        let NodeOp::Input(desc) = &node.op else {
            return Ok(id);
        };
        let count = desc.data_type.element_count() as usize;
        if count <= 1 {
            return Ok(id);
        }
        let desc = desc.clone();
        let data_type = node.return_type;
        let components = VectorComponent::ALL[..count]
            .iter()
            .map(|&c| ast.create_input(component_stream(&desc, c)))
            .collect();
        Ok(ast.create_constructor_call(data_type, components))
    }
}

/// Replaces each vector output `name` with scalar outputs `name.x`, ...
/// over single-component swizzles of the same expression, in place.
pub fn scalarize_outputs(ast: &mut Ast) -> Result<()> {
    let mut outputs = Vec::with_capacity(ast.outputs().len());
    let roots = ast.outputs().to_vec();
    for output in roots {
        let node = ast.get(output)?;
        let NodeOp::Output { desc, expression } = &node.op else {
            return Err(Error::InvalidOutputTransform {
                name: output.to_string(),
            });
        };
        let count = desc.data_type.element_count() as usize;
        if count <= 1 {
            outputs.push(output);
            continue;
        }
        let (desc, expression) = (desc.clone(), *expression);
        for &component in &VectorComponent::ALL[..count] {
            let swizzle = ast.create_swizzle(&[component], expression);
            outputs.push(ast.make_output(component_stream(&desc, component), swizzle));
        }
    }
    ast.set_outputs(outputs);
    Ok(())
}

/// Resolves single-component swizzles down to scalar operations.
///
/// A swizzle of an operator becomes the operator applied to swizzles of its
/// operands; those are resolved in turn as the traversal descends.
pub struct ScalarizeVectorInstructions;

impl ScalarizeVectorInstructions {
    fn extract(ast: &mut Ast, id: NodeId, component: VectorComponent) -> Result<NodeId> {
        let node = ast.node(id);
        let return_type = node.return_type;
        if return_type.is_scalar() && component == VectorComponent::X {
            return Ok(id);
        }
        let invalid = || Error::InvalidSubscript {
            component: component.as_char(),
            what: node.describe(),
            data_type: return_type,
        };
        let index = component.index();

        match node.op.clone() {
            NodeOp::Constant(value) => {
                let scalar = value.component(component).ok_or_else(invalid)?;
                Ok(ast.create_scalar(scalar))
            }
            NodeOp::Swizzle {
                components,
                expression,
            } => {
                let inner = *components.get(index).ok_or_else(invalid)?;
                Self::extract(ast, expression, inner)
            }
            NodeOp::Input(desc) => {
                if index >= desc.data_type.element_count() as usize {
                    return Err(invalid());
                }
                Ok(ast.create_input(component_stream(&desc, component)))
            }
            NodeOp::ConstructorCall { arguments } => {
                arguments.get(index).copied().ok_or_else(invalid)
            }
            NodeOp::Unary { op, operand } => {
                let operand = ast.create_swizzle(&[component], operand);
                Ok(match op {
                    UnaryOp::TypeConversion => {
                        ast.create_conversion(operand, return_type.register_type())
                    }
                    op => ast.create_unary(op, operand),
                })
            }
            NodeOp::Binary { op, left, right } => {
                let left = ast.create_swizzle(&[component], left);
                let right = ast.create_swizzle(&[component], right);
                Ok(ast.create_binary(op, left, right))
            }
            NodeOp::Ternary { op, args } => {
                let [a, b, c] = args.map(|arg| ast.create_swizzle(&[component], arg));
                Ok(ast.create_ternary(op, a, b, c))
            }
            NodeOp::FunctionCall { descs, arguments } => {
                let chosen = node
                    .overload
                    .and_then(|o| descs.get(o as usize).copied())
                    .ok_or_else(|| Error::UnresolvedOverload {
                        op: node.describe(),
                    })?;
                let arguments = arguments
                    .into_iter()
                    .map(|arg| ast.create_swizzle(&[component], arg))
                    .collect();
                Ok(ast.create_function_call_ids(vec![chosen], arguments))
            }
            NodeOp::Output { .. } => Err(Error::ScalarizationFailed { components: 1 }),
        }
    }
}

impl Pass for ScalarizeVectorInstructions {
    fn name(&self) -> &'static str {
        "ScalarizeVectorInstructions"
    }

    fn order(&self) -> TraversalOrder {
        TraversalOrder::PreOrder
    }

    fn transform(&mut self, ast: &mut Ast, id: NodeId) -> Result<NodeId> {
        let (component, expression) = match &ast.node(id).op {
            NodeOp::Swizzle {
                components,
                expression,
            } => match components.as_slice() {
                [component] => (*component, *expression),
                _ => {
                    return Err(Error::ScalarizationFailed {
                        components: components.len(),
                    })
                }
            },
            _ => return Ok(id),
        };
        Self::extract(ast, expression, component)
    }
}
