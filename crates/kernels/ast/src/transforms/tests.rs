use super::*;
use crate::node::{BinaryOp, ConstantValue, Scalar, TernaryOp, UnaryOp};
use lanevm_foundation::{
    DataType, FunctionDesc, RegisterType, StreamDataType, StreamDesc, StreamElement,
};

fn float_in(ast: &mut Ast, name: &str) -> NodeId {
    ast.create_input(StreamDesc::new(name, StreamDataType::FLOAT))
}

fn output_expr(ast: &Ast, output: NodeId) -> NodeId {
    match &ast.node(output).op {
        NodeOp::Output { expression, .. } => *expression,
        other => panic!("expected output, got {other:?}"),
    }
}

fn constant(ast: &Ast, id: NodeId) -> Option<Scalar> {
    ast.node(id).as_constant().and_then(ConstantValue::as_scalar)
}

#[test]
fn test_add_constant_keeps_immediate_on_right() {
    let mut ast = Ast::new();
    let x = float_in(&mut ast, "x");
    let two = ast.create_float(2.0);
    let sum = ast.create_binary(BinaryOp::Add, two, x);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sum);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    match ast.node(expr).op {
        NodeOp::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            assert!(matches!(ast.node(left).op, NodeOp::Input(_)));
            assert_eq!(constant(&ast, right), Some(Scalar::Float(2.0)));
        }
        ref other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_constant_expression_folds_completely() {
    let mut ast = Ast::new();
    let a = ast.create_int(1);
    let b = ast.create_int(2);
    let sum = ast.create_binary(BinaryOp::Add, a, b);
    ast.create_output(StreamDesc::new("o", StreamDataType::INT), sum);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    assert_eq!(constant(&ast, expr), Some(Scalar::Int(3)));
}

#[test]
fn test_int_operand_converted_to_float() {
    let mut ast = Ast::new();
    let i = ast.create_input(StreamDesc::new("i", StreamDataType::INT));
    let half = ast.create_float(1.5);
    let sum = ast.create_binary(BinaryOp::Add, i, half);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sum);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary { left, .. } = ast.node(expr).op else {
        panic!("expected binary");
    };
    assert!(matches!(
        ast.node(left).op,
        NodeOp::Unary {
            op: UnaryOp::TypeConversion,
            ..
        }
    ));
    assert_eq!(ast.node(left).return_type, DataType::FLOAT);
}

#[test]
fn test_vector_output_is_scalarized() {
    let mut ast = Ast::new();
    let float3 = StreamDataType::new(StreamElement::Float, 3);
    let v = ast.create_input(StreamDesc::new("v", float3));
    let two = ast.create_float(2.0);
    let scaled = ast.create_binary(BinaryOp::Multiply, v, two);
    ast.create_output(StreamDesc::new("o", float3), scaled);

    run_pipeline(&mut ast, false).unwrap();

    let names: Vec<String> = ast
        .outputs()
        .iter()
        .map(|&o| match &ast.node(o).op {
            NodeOp::Output { desc, .. } => desc.to_string(),
            _ => String::new(),
        })
        .collect();
    assert_eq!(names, ["float o.x", "float o.y", "float o.z"]);

    let inputs: Vec<&str> = ast.inputs().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(inputs, ["v.x", "v.y", "v.z"]);

    let expr = output_expr(&ast, ast.outputs()[1]);
    let NodeOp::Binary {
        op: BinaryOp::Multiply,
        left,
        right,
    } = ast.node(expr).op
    else {
        panic!("expected multiply");
    };
    match &ast.node(left).op {
        NodeOp::Input(desc) => assert_eq!(desc.name, "v.y"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(constant(&ast, right), Some(Scalar::Float(2.0)));
}

#[test]
fn test_dot_expands_to_sum_of_products() {
    let mut ast = Ast::new();
    let float3 = StreamDataType::new(StreamElement::Float, 3);
    let a = ast.create_input(StreamDesc::new("a", float3));
    let b = ast.create_input(StreamDesc::new("b", float3));
    let dot = ast.create_binary(BinaryOp::Dot, a, b);
    ast.create_output(StreamDesc::new("d", StreamDataType::FLOAT), dot);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary {
        op: BinaryOp::Add,
        left,
        right,
    } = ast.node(expr).op
    else {
        panic!("expected add");
    };
    assert!(matches!(
        ast.node(left).op,
        NodeOp::Binary {
            op: BinaryOp::Add,
            ..
        }
    ));
    assert!(matches!(
        ast.node(right).op,
        NodeOp::Binary {
            op: BinaryOp::Multiply,
            ..
        }
    ));
}

#[test]
fn test_cross_requires_vec3() {
    let mut ast = Ast::new();
    let float2 = StreamDataType::new(StreamElement::Float, 2);
    let a = ast.create_input(StreamDesc::new("a", float2));
    let cross = ast.create_binary(BinaryOp::Cross, a, a);
    ast.create_output(StreamDesc::new("c", float2), cross);

    assert_eq!(
        run_pipeline(&mut ast, false),
        Err(Error::CrossRequiresVec3 { elements: 2 })
    );
}

#[test]
fn test_cse_merges_commutative_products() {
    let mut ast = Ast::new();
    let x = float_in(&mut ast, "x");
    let y = float_in(&mut ast, "y");
    let x2 = float_in(&mut ast, "x");
    let xy = ast.create_binary(BinaryOp::Multiply, x, y);
    let yx = ast.create_binary(BinaryOp::Multiply, y, x2);
    let sum = ast.create_binary(BinaryOp::Add, xy, yx);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sum);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary { left, right, .. } = ast.node(expr).op else {
        panic!("expected binary");
    };
    assert_eq!(left, right);
    assert_eq!(ast.reachable_count(), 5);
}

#[test]
fn test_no_outputs_is_error() {
    let mut ast = Ast::new();
    float_in(&mut ast, "x");
    assert_eq!(run_pipeline(&mut ast, false), Err(Error::NoOutputs));
}

#[test]
fn test_function_without_enough_arguments_has_no_overload() {
    let mut ast = Ast::new();
    let f = FunctionDesc::new(
        "scale",
        vec![RegisterType::Float, RegisterType::Float],
        RegisterType::Float,
    );
    let x = float_in(&mut ast, "x");
    let call = ast.create_function_call(&[f], vec![x]);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), call);

    assert!(matches!(
        run_pipeline(&mut ast, false),
        Err(Error::NoMatchingOverload { .. })
    ));
}

#[test]
fn test_select_with_constant_condition() {
    let mut ast = Ast::new();
    let cond = ast.create_bool(true);
    let x = float_in(&mut ast, "x");
    let one = ast.create_float(1.0);
    let sel = ast.create_ternary(TernaryOp::Select, cond, x, one);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sel);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    assert!(matches!(ast.node(expr).op, NodeOp::Input(_)));
}

#[test]
fn test_int_division_by_power_of_two_becomes_shift() {
    let mut ast = Ast::new();
    let x = ast.create_input(StreamDesc::new("x", StreamDataType::INT));
    let four = ast.create_int(4);
    let div = ast.create_binary(BinaryOp::Divide, x, four);
    ast.create_output(StreamDesc::new("o", StreamDataType::INT), div);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary {
        op: BinaryOp::BitshiftRight,
        left,
        right,
    } = ast.node(expr).op
    else {
        panic!("expected shift");
    };
    assert_eq!(constant(&ast, right), Some(Scalar::Int(2)));
    assert!(matches!(
        ast.node(left).op,
        NodeOp::Binary {
            op: BinaryOp::Add,
            ..
        }
    ));
}

#[test]
fn test_whole_pow_becomes_multiplication_chain() {
    let mut ast = Ast::new();
    let x = float_in(&mut ast, "x");
    let three = ast.create_float(3.0);
    let pow = ast.create_binary(BinaryOp::Pow, x, three);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), pow);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary {
        op: BinaryOp::Multiply,
        left,
        right,
    } = ast.node(expr).op
    else {
        panic!("expected multiply");
    };
    assert!(matches!(ast.node(right).op, NodeOp::Input(_)));
    let NodeOp::Binary {
        op: BinaryOp::Multiply,
        left: a,
        right: b,
    } = ast.node(left).op
    else {
        panic!("expected inner multiply");
    };
    assert_eq!(a, b);
}

#[test]
fn test_swizzle_past_vector_end_is_rejected() {
    let mut ast = Ast::new();
    let float2 = StreamDataType::new(StreamElement::Float, 2);
    let v = ast.create_input(StreamDesc::new("v", float2));
    let z = ast.create_swizzle_str("z", v);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), z);

    assert!(matches!(
        run_pipeline(&mut ast, false),
        Err(Error::InvalidSubscript { component: 'z', .. })
    ));
}

#[test]
fn test_saturate_lowered_to_min_max() {
    let mut ast = Ast::new();
    let x = float_in(&mut ast, "x");
    let sat = ast.create_unary(UnaryOp::Saturate, x);
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), sat);

    run_pipeline(&mut ast, false).unwrap();

    let expr = output_expr(&ast, ast.outputs()[0]);
    let NodeOp::Binary {
        op: BinaryOp::Max,
        left,
        right,
    } = ast.node(expr).op
    else {
        panic!("expected max");
    };
    assert_eq!(constant(&ast, right), Some(Scalar::Float(0.0)));
    assert!(matches!(
        ast.node(left).op,
        NodeOp::Binary {
            op: BinaryOp::Min,
            ..
        }
    ));
}

#[test]
fn test_pipeline_traces_every_pass() {
    let mut ast = Ast::new();
    let x = float_in(&mut ast, "x");
    ast.create_output(StreamDesc::new("o", StreamDataType::FLOAT), x);

    let traces = run_pipeline(&mut ast, true).unwrap();
    let names: Vec<&str> = traces.iter().map(|t| t.pass).collect();
    assert_eq!(
        names,
        [
            "DeduceTypes",
            "ReplaceVectorInstructions",
            "ScalarizeInputs",
            "ScalarizeOutputs",
            "ScalarizeVectorInstructions",
            "FoldConstants",
            "ReplaceUnsupportedInstructions",
            "FoldConstants",
            "EliminateCommonSubexpressions",
            "Validate",
        ]
    );
    assert!(traces.iter().all(|t| t.reachable_nodes == 2));
    assert!(run_pipeline(&mut Ast::new(), false).is_err());
}
