//! Native functions callable from expressions.
//!
//! A native function receives one register slice per argument, each holding
//! one [`Register`] per batch of four instances, and fills an output slice of
//! the same length. Functions are registered under their mangled name, so
//! overloads sharing a plain name coexist.

use std::fmt;

use indexmap::IndexMap;
use lanevm_foundation::{rng, FunctionDesc, Register, RegisterType, LANES};
use serde::{Deserialize, Serialize};

/// Named values visible to every native function during one execution.
pub type GlobalData = IndexMap<String, GlobalValue>;

/// Signature of a native function: argument registers, result registers, globals.
pub type NativeFunction = fn(&[&[Register]], &mut [Register], &GlobalData);

/// A global value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GlobalValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl GlobalValue {
    pub fn register_type(self) -> RegisterType {
        match self {
            GlobalValue::Bool(_) => RegisterType::Bool,
            GlobalValue::Int(_) => RegisterType::Int,
            GlobalValue::Float(_) => RegisterType::Float,
        }
    }

    /// Broadcasts the value into all four lanes.
    pub fn splat(self) -> Register {
        match self {
            GlobalValue::Bool(v) => Register::splat_bool(v),
            GlobalValue::Int(v) => Register::splat_i32(v),
            GlobalValue::Float(v) => Register::splat_f32(v),
        }
    }
}

/// A native function together with the signature the compiler resolves against.
#[derive(Clone)]
pub struct ExpressionFunction {
    pub desc: FunctionDesc,
    pub func: NativeFunction,
}

impl ExpressionFunction {
    pub fn new(desc: FunctionDesc, func: NativeFunction) -> Self {
        Self { desc, func }
    }

    /// `random(int seed, int offset = 0) -> float` in `[0, 1)`.
    pub fn random() -> Self {
        Self::new(
            FunctionDesc::new(
                "random",
                vec![RegisterType::Int, RegisterType::Int],
                RegisterType::Float,
            )
            .with_required_inputs(1),
            random,
        )
    }

    /// `random_int(int seed, int offset = 0) -> int`, non-negative.
    pub fn random_int() -> Self {
        Self::new(
            FunctionDesc::new(
                "random_int",
                vec![RegisterType::Int, RegisterType::Int],
                RegisterType::Int,
            )
            .with_required_inputs(1),
            random_int,
        )
    }
}

impl fmt::Debug for ExpressionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionFunction")
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Functions every [`Vm`](crate::Vm) starts with.
pub fn builtin_functions() -> Vec<ExpressionFunction> {
    vec![ExpressionFunction::random(), ExpressionFunction::random_int()]
}

/// Applies `lane` to the seed and optional offset of every instance.
///
/// The result depends only on the lane values, never on batch position,
/// so the same instance gets the same value at any batch size.
fn seeded(inputs: &[&[Register]], output: &mut [Register], lane: impl Fn(i32, i32) -> u32) {
    let Some(seeds) = inputs.first() else {
        output.fill(Register::ZERO);
        return;
    };
    let offsets = inputs.get(1);
    for (batch, out) in output.iter_mut().enumerate() {
        let seed = seeds[batch].i32s();
        let offset = offsets.map_or([0; LANES], |o| o[batch].i32s());
        *out = Register(std::array::from_fn(|l| lane(seed[l], offset[l])));
    }
}

fn random(inputs: &[&[Register]], output: &mut [Register], _globals: &GlobalData) {
    seeded(inputs, output, |seed, offset| {
        rng::random_unit(seed, offset).to_bits()
    });
}

fn random_int(inputs: &[&[Register]], output: &mut [Register], _globals: &GlobalData) {
    seeded(inputs, output, |seed, offset| {
        rng::random_int(seed, offset) as u32
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_is_batch_independent() {
        let seeds = [Register::from_i32([1, 2, 3, 4]), Register::from_i32([5, 6, 7, 8])];
        let mut out = [Register::ZERO; 2];
        random(&[&seeds[..]], &mut out, &GlobalData::new());

        let mut single = [Register::ZERO; 1];
        random(&[&seeds[1..]], &mut single, &GlobalData::new());
        assert_eq!(out[1], single[0]);

        for value in out.iter().flat_map(|r| r.f32s()) {
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_random_offset_defaults_to_zero() {
        let seeds = [Register::splat_i32(42)];
        let zeros = [Register::ZERO];
        let mut implicit = [Register::ZERO];
        let mut explicit = [Register::ZERO];
        random_int(&[&seeds[..]], &mut implicit, &GlobalData::new());
        random_int(&[&seeds[..], &zeros[..]], &mut explicit, &GlobalData::new());
        assert_eq!(implicit, explicit);
        assert!(implicit[0].i32s().iter().all(|&v| v >= 0));
    }

    #[test]
    fn test_builtins_have_distinct_mangled_names() {
        let names: Vec<String> = builtin_functions()
            .iter()
            .map(|f| f.desc.mangled_name())
            .collect();
        assert_eq!(names, ["random_II", "random_int_II"]);
    }
}
