//! Sample expression programs with generated input data.

use clap::ValueEnum;
use lanevm_ast::{Ast, BinaryOp, TernaryOp, UnaryOp};
use lanevm_foundation::{RegisterType, StreamDataType, StreamDesc, StreamElement};
use lanevm_vm::ExpressionFunction;

/// Programs the demo can compile and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sample {
    /// `o = x + 2.0`
    Offset,
    /// `o = smoothstep(0, n, x) * sin(x)`
    Wave,
    /// `o = random(seed)`
    Noise,
    /// `len = length(v)`, `dir = normalize(v)` over a vec3 stream
    Vector,
}

/// Raw bytes of one caller-owned stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamData {
    pub desc: StreamDesc,
    pub bytes: Vec<u8>,
}

impl StreamData {
    pub fn floats(desc: StreamDesc, values: impl IntoIterator<Item = f32>) -> Self {
        let bytes = values.into_iter().flat_map(f32::to_ne_bytes).collect();
        Self { desc, bytes }
    }

    pub fn ints(desc: StreamDesc, values: impl IntoIterator<Item = i32>) -> Self {
        let bytes = values.into_iter().flat_map(i32::to_ne_bytes).collect();
        Self { desc, bytes }
    }

    /// Zeroed storage for `instances` values of `desc`.
    pub fn zeroed(desc: StreamDesc, instances: usize) -> Self {
        let bytes = vec![0; desc.data_type.size() * instances];
        Self { desc, bytes }
    }

    /// One formatted string per instance, components separated by commas.
    pub fn format_values(&self) -> Vec<String> {
        let data_type = self.desc.data_type;
        let element = data_type.element_size();
        self.bytes
            .chunks_exact(data_type.size())
            .map(|value| {
                value
                    .chunks_exact(element)
                    .map(|bytes| format_element(data_type.element(), bytes))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}

fn format_element(element: StreamElement, bytes: &[u8]) -> String {
    match (element, bytes) {
        (StreamElement::Float, &[a, b, c, d]) => format!("{:.4}", f32::from_ne_bytes([a, b, c, d])),
        (StreamElement::Int, &[a, b, c, d]) => i32::from_ne_bytes([a, b, c, d]).to_string(),
        (StreamElement::Short, &[a, b]) => i16::from_ne_bytes([a, b]).to_string(),
        (StreamElement::Byte, &[a]) => (a as i8).to_string(),
        (StreamElement::Half, &[a, b]) => format!(
            "{:.4}",
            lanevm_foundation::half::f16_bits_to_f32(u16::from_ne_bytes([a, b]))
        ),
        _ => "?".to_string(),
    }
}

fn float(name: &str) -> StreamDesc {
    StreamDesc::new(name, StreamDataType::FLOAT)
}

fn float3(name: &str) -> StreamDesc {
    StreamDesc::new(name, StreamDataType::new(StreamElement::Float, 3))
}

impl Sample {
    /// Builds the expression graph.
    pub fn build(self) -> Ast {
        let mut ast = Ast::new();
        match self {
            Sample::Offset => {
                let x = ast.create_input(float("x"));
                let two = ast.create_float(2.0);
                let sum = ast.create_binary(BinaryOp::Add, x, two);
                ast.create_output(float("o"), sum);
            }
            Sample::Wave => {
                let x = ast.create_input(float("x"));
                let n = ast.create_input(StreamDesc::new("n", StreamDataType::INT));
                let zero = ast.create_float(0.0);
                let edge = ast.create_conversion(n, RegisterType::Float);
                let ramp = ast.create_ternary(TernaryOp::SmoothStep, zero, edge, x);
                let sin = ast.create_unary(UnaryOp::Sin, x);
                let wave = ast.create_binary(BinaryOp::Multiply, ramp, sin);
                ast.create_output(float("o"), wave);
            }
            Sample::Noise => {
                let seed = ast.create_input(StreamDesc::new("seed", StreamDataType::INT));
                let random = ExpressionFunction::random().desc;
                let call = ast.create_function_call(&[random], vec![seed]);
                ast.create_output(float("o"), call);
            }
            Sample::Vector => {
                let v = ast.create_input(float3("v"));
                let length = ast.create_unary(UnaryOp::Length, v);
                let direction = ast.create_unary(UnaryOp::Normalize, v);
                ast.create_output(float("len"), length);
                ast.create_output(float3("dir"), direction);
            }
        }
        ast
    }

    /// Input streams for `instances` instances.
    pub fn inputs(self, instances: usize) -> Vec<StreamData> {
        let ramp = move |scale: f32| (0..instances).map(move |i| i as f32 * scale);
        match self {
            Sample::Offset => vec![StreamData::floats(float("x"), ramp(1.0))],
            Sample::Wave => vec![
                StreamData::floats(float("x"), ramp(0.25)),
                StreamData::ints(
                    StreamDesc::new("n", StreamDataType::INT),
                    std::iter::repeat(instances.max(1) as i32 / 4).take(instances),
                ),
            ],
            Sample::Noise => vec![StreamData::ints(
                StreamDesc::new("seed", StreamDataType::INT),
                0..instances as i32,
            )],
            Sample::Vector => vec![StreamData::floats(
                float3("v"),
                (0..instances).flat_map(|i| {
                    let t = i as f32;
                    [t + 1.0, t * 0.5, 2.0]
                }),
            )],
        }
    }

    /// Zeroed output streams for `instances` instances.
    pub fn outputs(self, instances: usize) -> Vec<StreamData> {
        let descs = match self {
            Sample::Offset | Sample::Wave | Sample::Noise => vec![float("o")],
            Sample::Vector => vec![float("len"), float3("dir")],
        };
        descs
            .into_iter()
            .map(|desc| StreamData::zeroed(desc, instances))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_sizes_match_instances() {
        for sample in Sample::value_variants() {
            for data in sample.inputs(7).iter().chain(&sample.outputs(7)) {
                assert_eq!(data.bytes.len(), data.desc.data_type.size() * 7);
            }
        }
    }

    #[test]
    fn test_format_values_groups_components() {
        let data = StreamData::floats(float3("v"), [1.0, 2.0, 3.0]);
        assert_eq!(data.format_values(), ["1.0000, 2.0000, 3.0000"]);
    }
}
