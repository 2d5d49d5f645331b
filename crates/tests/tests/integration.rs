//! Integration tests for end-to-end lanevm execution.
//!
//! These tests verify the full pipeline:
//! Build AST → Transform → Compile → Execute → Verify

use rayon::prelude::*;

use lanevm_ast::{BinaryOp, TernaryOp, UnaryOp};
use lanevm_foundation::half::{f16_bits_to_f32, f32_to_f16_bits};
use lanevm_foundation::rng::random_unit;
use lanevm_foundation::{FunctionDesc, Register, RegisterType, StreamDataType, StreamDesc, StreamElement};
use lanevm_tests::{assert_close, float, float_input, float_output, TestHarness};
use lanevm_vm::{
    ByteCodeProgram, CompilerConfig, ExecuteError, ExecuteFlags, ExpressionFunction, GlobalData,
    GlobalValue, OpCode, ProcessingStream, ProcessingStreamMut, Vm,
};

fn count_opcode(program: &ByteCodeProgram, opcode: OpCode) -> usize {
    program
        .instructions()
        .filter_map(Result::ok)
        .filter(|instruction| instruction.opcode == opcode)
        .count()
}

/// `o = x + 2.0`
fn add_two(harness: &mut TestHarness) -> ByteCodeProgram {
    harness.compile(|ast| {
        let x = float_input(ast, "x");
        let two = ast.create_float(2.0);
        let sum = ast.create_binary(BinaryOp::Add, x, two);
        float_output(ast, "o", sum);
    })
}

/// Adding a constant over a count that is not a multiple of four.
#[test]
fn test_add_constant_over_partial_batch() {
    let mut harness = TestHarness::new();
    let program = add_two(&mut harness);

    let output = harness.run(&program, &[("x", &[1.0, 2.0, 3.0, 4.0, 5.0])], 5);

    assert_eq!(output, [3.0, 4.0, 5.0, 6.0, 7.0]);
}

/// A fully constant expression folds to a single immediate store.
#[test]
fn test_constant_expression_folds_to_one_store() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let one = ast.create_int(1);
        let two = ast.create_int(2);
        let sum = ast.create_binary(BinaryOp::Add, one, two);
        ast.create_output(StreamDesc::new("o", StreamDataType::INT), sum);
    });

    assert_eq!(program.code(), [OpCode::StoreI_C as u32, 0, 3]);
    assert_eq!(program.num_temp_registers(), 0);

    for count in [1usize, 3, 4, 5, 64] {
        let mut output = vec![0i32; count];
        harness
            .vm_mut()
            .execute(
                &program,
                &[],
                &mut [ProcessingStreamMut::from_slice("o", StreamDataType::INT, &mut output)],
                count,
                &GlobalData::new(),
            )
            .unwrap();
        assert!(output.iter().all(|&v| v == 3), "count {count}: {output:?}");
    }
}

/// Every count of the form 4k + r produces exactly `count` results.
#[test]
fn test_remainder_counts() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let y = float_input(ast, "y");
        let product = ast.create_binary(BinaryOp::Multiply, x, y);
        let one = ast.create_float(1.0);
        let sum = ast.create_binary(BinaryOp::Add, product, one);
        float_output(ast, "o", sum);
    });

    for count in [1usize, 2, 3, 4, 5, 6, 7, 8, 13, 1023, 1024, 1025] {
        let x: Vec<f32> = (0..count).map(|i| i as f32).collect();
        let y: Vec<f32> = (0..count).map(|i| (i % 7) as f32).collect();
        let output = harness.run(&program, &[("x", &x), ("y", &y)], count);

        let expected: Vec<f32> = (0..count).map(|i| i as f32 * (i % 7) as f32 + 1.0).collect();
        assert_eq!(output, expected, "count {count}");
    }
}

/// Structurally equal subtrees are computed once.
#[test]
fn test_shared_subexpression_is_computed_once() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let y = float_input(ast, "y");
        let a = ast.create_binary(BinaryOp::Multiply, x, y);
        let b = ast.create_binary(BinaryOp::Multiply, x, y);
        let sin = ast.create_unary(UnaryOp::Sin, a);
        let cos = ast.create_unary(UnaryOp::Cos, b);
        let sum = ast.create_binary(BinaryOp::Add, sin, cos);
        float_output(ast, "o", sum);
    });
    assert_eq!(count_opcode(&program, OpCode::MulF_RR), 1);

    let x = [0.0f32, 0.5, 1.0, 2.0];
    let y = [1.0f32, 2.0, -1.0, 0.25];
    let output = harness.run(&program, &[("x", &x), ("y", &y)], 4);
    let expected: Vec<f32> = x
        .iter()
        .zip(&y)
        .map(|(x, y)| (x * y).sin() + (x * y).cos())
        .collect();
    assert_close(&output, &expected, 1e-5);
}

/// No two values live at the same time share a register.
#[test]
fn test_register_allocation_is_sound_for_wide_trees() {
    let mut harness = TestHarness::with_config(CompilerConfig {
        verify_register_allocation: true,
        ..CompilerConfig::default()
    });
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let program = harness.compile(|ast| {
        let leaves: Vec<_> = names
            .iter()
            .map(|name| {
                let input = float_input(ast, name);
                ast.create_unary(UnaryOp::Sqrt, input)
            })
            .collect();
        let mut level = leaves;
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| ast.create_binary(BinaryOp::Multiply, pair[0], pair[1]))
                .collect();
        }
        float_output(ast, "o", level[0]);
    });
    assert!(program.num_temp_registers() < program.num_instructions());

    let data: Vec<Vec<f32>> = (0..names.len())
        .map(|k| (0..6).map(|i| ((k + 1) * (i + 1)) as f32).collect())
        .collect();
    let inputs: Vec<(&str, &[f32])> = names
        .iter()
        .zip(&data)
        .map(|(name, values)| (*name, values.as_slice()))
        .collect();
    let output = harness.run(&program, &inputs, 6);

    let expected: Vec<f32> = (0..6)
        .map(|i| data.iter().map(|values| values[i].sqrt()).product())
        .collect();
    for (a, e) in output.iter().zip(&expected) {
        assert!((a - e).abs() <= e.abs() * 1e-5, "got {a}, expected {e}");
    }
}

/// Lowered ternaries compute the textbook formulas.
#[test]
fn test_lowered_ternaries() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let zero = ast.create_float(0.0);
        let one = ast.create_float(1.0);
        let ten = ast.create_float(10.0);
        let clamped = ast.create_ternary(TernaryOp::Clamp, x, zero, one);
        let lerped = ast.create_ternary(TernaryOp::Lerp, zero, ten, x);
        let stepped = ast.create_ternary(TernaryOp::SmoothStep, zero, one, x);
        float_output(ast, "clamp", clamped);
        float_output(ast, "lerp", lerped);
        float_output(ast, "smooth", stepped);
    });

    let x = [-0.5f32, 0.0, 0.25, 0.5, 1.0, 2.0];
    let outputs = harness
        .try_run(&program, &[("x", &x)], &["clamp", "lerp", "smooth"], x.len())
        .unwrap();

    assert_eq!(outputs[0], [0.0, 0.0, 0.25, 0.5, 1.0, 1.0]);
    assert_close(&outputs[1], &[-5.0, 0.0, 2.5, 5.0, 10.0, 20.0], 1e-5);
    assert_close(&outputs[2], &[0.0, 0.0, 0.15625, 0.5, 1.0, 1.0], 1e-5);
}

/// Comparisons produce masks that drive selects.
#[test]
fn test_select_on_comparison() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let y = float_input(ast, "y");
        let less = ast.create_binary(BinaryOp::Less, x, y);
        let picked = ast.create_ternary(TernaryOp::Select, less, x, y);
        float_output(ast, "o", picked);
    });

    let x = [1.0f32, 5.0, -2.0, 3.0, 3.0];
    let y = [2.0f32, 4.0, -3.0, 3.0, 0.0];
    let output = harness.run(&program, &[("x", &x), ("y", &y)], 5);
    assert_eq!(output, [1.0, 4.0, -3.0, 3.0, 0.0]);
}

/// Transcendentals and powers agree with the standard library.
#[test]
fn test_math_functions() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let three = ast.create_float(3.0);
        let cube = ast.create_binary(BinaryOp::Pow, x, three);
        let exp = ast.create_unary(UnaryOp::Exp, x);
        let ln = ast.create_unary(UnaryOp::Ln, exp);
        float_output(ast, "cube", cube);
        float_output(ast, "ln_exp", ln);
    });

    let x = [0.5f32, 1.0, 2.0, 3.0];
    let outputs = harness
        .try_run(&program, &[("x", &x)], &["cube", "ln_exp"], x.len())
        .unwrap();
    assert_close(&outputs[0], &[0.125, 1.0, 8.0, 27.0], 1e-3);
    assert_close(&outputs[1], &x, 1e-4);
}

/// A compiled program survives a JSON round trip and still executes.
#[test]
fn test_program_json_round_trip() {
    let mut harness = TestHarness::new();
    let program = add_two(&mut harness);

    let json = serde_json::to_string(&program).unwrap();
    let decoded: ByteCodeProgram = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, program);
    assert_eq!(decoded.to_string(), program.to_string());

    let output = harness.run(&decoded, &[("x", &[0.5, 1.5])], 2);
    assert_eq!(output, [2.5, 3.5]);
}

/// One immutable program, one VM per thread.
#[test]
fn test_concurrent_execution_shares_program() {
    let mut harness = TestHarness::new();
    let program = add_two(&mut harness);

    let input: Vec<f32> = (0..10_007).map(|i| i as f32).collect();
    let mut output = vec![0.0f32; input.len()];

    output
        .par_chunks_mut(1_001)
        .zip(input.par_chunks(1_001))
        .for_each(|(out, chunk)| {
            let mut vm = Vm::new();
            vm.execute(
                &program,
                &[ProcessingStream::from_slice("x", StreamDataType::FLOAT, chunk)],
                &mut [ProcessingStreamMut::from_slice("o", StreamDataType::FLOAT, out)],
                chunk.len(),
                &GlobalData::new(),
            )
            .unwrap();
        });

    assert!(output.iter().enumerate().all(|(i, &v)| v == i as f32 + 2.0));
}

/// Narrow stream types convert to and from 32-bit registers.
#[test]
fn test_narrow_stream_types() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let h = ast.create_input(StreamDesc::new("h", StreamDataType::HALF));
        let s = ast.create_input(StreamDesc::new("s", StreamDataType::SHORT));
        let b = ast.create_input(StreamDesc::new("b", StreamDataType::BYTE));
        let half = ast.create_float(0.5);
        let halved = ast.create_binary(BinaryOp::Multiply, h, half);
        let sum = ast.create_binary(BinaryOp::Add, s, b);
        ast.create_output(StreamDesc::new("ho", StreamDataType::HALF), halved);
        ast.create_output(StreamDesc::new("io", StreamDataType::INT), sum);
        ast.create_output(StreamDesc::new("bo", StreamDataType::BYTE), sum);
    });

    let halves = [3.0f32, -1.0, 0.5].map(f32_to_f16_bits);
    let shorts = [1000i16, -20, 127];
    let bytes = [5i8, -8, 1];
    let mut half_out = [0u16; 3];
    let mut int_out = [0i32; 3];
    let mut byte_out = [0i8; 3];

    harness
        .vm_mut()
        .execute(
            &program,
            &[
                ProcessingStream::from_slice("h", StreamDataType::HALF, &halves),
                ProcessingStream::from_slice("s", StreamDataType::SHORT, &shorts),
                ProcessingStream::from_slice("b", StreamDataType::BYTE, &bytes),
            ],
            &mut [
                ProcessingStreamMut::from_slice("ho", StreamDataType::HALF, &mut half_out),
                ProcessingStreamMut::from_slice("io", StreamDataType::INT, &mut int_out),
                ProcessingStreamMut::from_slice("bo", StreamDataType::BYTE, &mut byte_out),
            ],
            3,
            &GlobalData::new(),
        )
        .unwrap();

    assert_eq!(half_out.map(f16_bits_to_f32), [1.5, -0.5, 0.25]);
    assert_eq!(int_out, [1005, -28, 128]);
    assert_eq!(byte_out, [(1005i32 as i8), -28, (128i32 as i8)]);
}

/// Integer division by a constant power of two matches runtime division,
/// including at `i32::MIN`.
#[test]
fn test_int_division_by_constant_power_of_two_matches_runtime_division() {
    let int = |name: &str| StreamDesc::new(name, StreamDataType::INT);
    let dividends = [i32::MIN, i32::MIN + 1, -7, -4, -1, 0, 1, 7, 8, i32::MAX];

    for divisor in [2i32, 4, 1024, 1 << 30] {
        let mut harness = TestHarness::new();
        let program = harness.compile(|ast| {
            let x = ast.create_input(int("x"));
            let d = ast.create_input(int("d"));
            let constant = ast.create_int(divisor);
            let folded = ast.create_binary(BinaryOp::Divide, x, constant);
            let runtime = ast.create_binary(BinaryOp::Divide, x, d);
            ast.create_output(int("folded"), folded);
            ast.create_output(int("runtime"), runtime);
        });
        assert_eq!(count_opcode(&program, OpCode::DivI_RR), 1);

        let divisors = [divisor; 10];
        let mut folded = [0i32; 10];
        let mut runtime = [0i32; 10];
        harness
            .vm_mut()
            .execute(
                &program,
                &[
                    ProcessingStream::from_slice("x", StreamDataType::INT, &dividends),
                    ProcessingStream::from_slice("d", StreamDataType::INT, &divisors),
                ],
                &mut [
                    ProcessingStreamMut::from_slice("folded", StreamDataType::INT, &mut folded),
                    ProcessingStreamMut::from_slice("runtime", StreamDataType::INT, &mut runtime),
                ],
                dividends.len(),
                &GlobalData::new(),
            )
            .unwrap();

        let expected = dividends.map(|x| x.wrapping_div(divisor));
        assert_eq!(folded, expected, "divisor {divisor}");
        assert_eq!(runtime, expected, "divisor {divisor}");
    }
}

/// Vector streams are split into per-component program slots.
#[test]
fn test_vector_length_over_vec3_stream() {
    let vec3 = StreamDataType::new(StreamElement::Float, 3);
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let v = ast.create_input(StreamDesc::new("v", vec3));
        let length = ast.create_unary(UnaryOp::Length, v);
        float_output(ast, "len", length);
    });

    let input = [3.0f32, 4.0, 0.0, 1.0, 2.0, 2.0, 0.0, 0.0, 0.0, 6.0, 0.0, 8.0, 2.0, 3.0, 6.0];
    let mut output = [0.0f32; 5];
    harness
        .vm_mut()
        .execute(
            &program,
            &[ProcessingStream::from_slice("v", vec3, &input)],
            &mut [ProcessingStreamMut::from_slice("len", StreamDataType::FLOAT, &mut output)],
            5,
            &GlobalData::new(),
        )
        .unwrap();
    assert_close(&output, &[5.0, 3.0, 0.0, 10.0, 7.0], 1e-5);
}

/// Positional binding requires exactly the program's streams.
#[test]
fn test_positional_binding_counts_streams() {
    let mut harness = TestHarness::new();
    let program = add_two(&mut harness);
    harness.vm_mut().set_flags(ExecuteFlags::BEST_PERFORMANCE);

    let output = harness.run(&program, &[("anything", &[1.0])], 1);
    assert_eq!(output, [3.0]);

    let result = harness.try_run(&program, &[], &["o"], 1);
    assert_eq!(
        result,
        Err(ExecuteError::StreamCountMismatch {
            kind: "input",
            expected: 1,
            actual: 0
        })
    );
}

fn weighted(inputs: &[&[Register]], output: &mut [Register], globals: &GlobalData) {
    let weight = match globals.get("weight") {
        Some(GlobalValue::Float(w)) => *w,
        _ => 0.0,
    };
    match inputs {
        [a] => {
            for (out, a) in output.iter_mut().zip(*a) {
                *out = a.map_f32(|v| v * weight);
            }
        }
        [a, b, ..] => {
            for ((out, a), b) in output.iter_mut().zip(*a).zip(*b) {
                *out = a.zip_f32(*b, |a, b| a * weight + b);
            }
        }
        [] => output.fill(Register::ZERO),
    }
}

fn weighted_desc() -> FunctionDesc {
    FunctionDesc::new(
        "weighted",
        vec![RegisterType::Float, RegisterType::Float],
        RegisterType::Float,
    )
    .with_required_inputs(1)
}

/// Native functions resolve by overload and read globals.
#[test]
fn test_native_function_overloads_and_globals() {
    let mut harness = TestHarness::new();
    harness.register_function(ExpressionFunction::new(weighted_desc(), weighted));
    harness.set_global("weight", GlobalValue::Float(3.0));

    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let y = float_input(ast, "y");
        let one = ast.create_function_call(&[weighted_desc()], vec![x]);
        let two = ast.create_function_call(&[weighted_desc()], vec![x, y]);
        float_output(ast, "one", one);
        float_output(ast, "two", two);
    });
    assert_eq!(program.functions(), [weighted_desc()]);
    assert_eq!(count_opcode(&program, OpCode::Call), 2);

    let x = [1.0f32, 2.0, 3.0, 4.0, 5.0];
    let y = [10.0f32; 5];
    let outputs = harness
        .try_run(&program, &[("x", &x), ("y", &y)], &["one", "two"], 5)
        .unwrap();
    assert_eq!(outputs[0], [3.0, 6.0, 9.0, 12.0, 15.0]);
    assert_eq!(outputs[1], [13.0, 16.0, 19.0, 22.0, 25.0]);
}

/// The built-in random depends only on the instance's seed.
#[test]
fn test_random_is_deterministic_per_seed() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let seed = ast.create_conversion(x, RegisterType::Int);
        let random = ast.create_function_call(&[ExpressionFunction::random().desc], vec![seed]);
        float_output(ast, "o", random);
    });

    let seeds: Vec<f32> = (0..11).map(|i| i as f32).collect();
    let full = harness.run(&program, &[("x", &seeds)], seeds.len());
    let shifted = harness.run(&program, &[("x", &seeds[3..])], seeds.len() - 3);

    assert_eq!(&full[3..], shifted.as_slice());
    for (i, value) in full.iter().enumerate() {
        assert!((0.0..1.0).contains(value));
        assert_eq!(*value, random_unit(i as i32, 0));
    }
}

/// Summing N floats through the VM matches a direct sum.
#[test]
fn test_round_trip_sum() {
    let mut harness = TestHarness::new();
    let program = harness.compile(|ast| {
        let x = float_input(ast, "x");
        let zero = ast.create_float(0.0);
        let same = ast.create_binary(BinaryOp::Add, x, zero);
        float_output(ast, "o", same);
    });

    let input: Vec<f32> = (0..4099).map(|i| (i as f32 * 0.37).sin()).collect();
    let output = harness.run(&program, &[("x", &input)], input.len());

    assert_eq!(output, input);
    assert_eq!(output.iter().sum::<f32>(), input.iter().sum::<f32>());
}

/// Missing inputs surface as errors, never partial results.
#[test]
fn test_missing_input_is_an_error() {
    let mut harness = TestHarness::new();
    let program = add_two(&mut harness);

    assert_eq!(
        harness.try_run(&program, &[("y", &[1.0])], &["o"], 1),
        Err(ExecuteError::InputNotFound {
            name: "x".to_string()
        })
    );
    assert_eq!(program.inputs(), [float("x")]);
}
