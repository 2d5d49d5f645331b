//! Opcode registry: metadata and handler tables.

use std::sync::OnceLock;

use lanevm_foundation::RegisterType;

use super::handlers::*;
use super::opcode::{Layout, OpCode, OpcodeMetadata, OPCODE_COUNT};

/// One registry entry linking an opcode to its metadata and handler.
#[derive(Clone, Copy)]
pub struct OpcodeSpec {
    /// The opcode this entry describes.
    pub opcode: OpCode,
    /// Static layout information.
    pub metadata: OpcodeMetadata,
    /// Lane implementation.
    pub handler: Handler,
}

/// Returns every registered opcode specification.
pub fn opcode_specs() -> &'static [OpcodeSpec] {
    static SPECS: OnceLock<Vec<OpcodeSpec>> = OnceLock::new();
    SPECS.get_or_init(build_specs)
}

/// Metadata for an opcode in O(1).
///
/// # Panics
///
/// Panics if the opcode has no registry entry.
pub fn metadata_for(opcode: OpCode) -> &'static OpcodeMetadata {
    static METADATA: OnceLock<[&'static OpcodeMetadata; OPCODE_COUNT]> = OnceLock::new();
    METADATA.get_or_init(|| {
        let mut table: [Option<&'static OpcodeMetadata>; OPCODE_COUNT] = [None; OPCODE_COUNT];
        for spec in opcode_specs() {
            table[spec.opcode as usize] = Some(&spec.metadata);
        }
        std::array::from_fn(|index| {
            table[index].unwrap_or_else(|| panic!("missing metadata for opcode {}", OpCode::ALL[index]))
        })
    })[opcode as usize]
}

/// Handler for an opcode in O(1).
///
/// # Panics
///
/// Panics if the opcode has no registry entry.
pub fn handler_for(opcode: OpCode) -> Handler {
    static HANDLERS: OnceLock<[Handler; OPCODE_COUNT]> = OnceLock::new();
    HANDLERS.get_or_init(|| {
        let mut table: [Option<Handler>; OPCODE_COUNT] = [None; OPCODE_COUNT];
        for spec in opcode_specs() {
            table[spec.opcode as usize] = Some(spec.handler);
        }
        std::array::from_fn(|index| {
            table[index].unwrap_or_else(|| panic!("missing handler for opcode {}", OpCode::ALL[index]))
        })
    })[opcode as usize]
}

fn build_specs() -> Vec<OpcodeSpec> {
    use OpCode::*;

    const B: RegisterType = RegisterType::Bool;
    const I: RegisterType = RegisterType::Int;
    const F: RegisterType = RegisterType::Float;
    const X: RegisterType = RegisterType::Unknown;

    macro_rules! op {
        ($opcode:ident, $layout:ident, $ty:expr, $handler:ident) => {
            OpcodeSpec {
                opcode: $opcode,
                metadata: OpcodeMetadata {
                    layout: Layout::$layout,
                    operand_type: $ty,
                },
                handler: $handler,
            }
        };
        ($rr:ident / $rc:ident, $ty:expr, $handler:ident) => {
            [
                op!($rr, Binary, $ty, $handler),
                op!($rc, BinaryConst, $ty, $handler),
            ]
        };
    }

    let mut specs = vec![
        op!(AbsF_R, Unary, F, handle_abs_f),
        op!(AbsI_R, Unary, I, handle_abs_i),
        op!(SqrtF_R, Unary, F, handle_sqrt_f),
        op!(ExpF_R, Unary, F, handle_exp_f),
        op!(LnF_R, Unary, F, handle_ln_f),
        op!(Log2F_R, Unary, F, handle_log2_f),
        op!(Log2I_R, Unary, I, handle_log2_i),
        op!(Log10F_R, Unary, F, handle_log10_f),
        op!(Pow2F_R, Unary, F, handle_pow2_f),
        op!(SinF_R, Unary, F, handle_sin_f),
        op!(CosF_R, Unary, F, handle_cos_f),
        op!(TanF_R, Unary, F, handle_tan_f),
        op!(ASinF_R, Unary, F, handle_asin_f),
        op!(ACosF_R, Unary, F, handle_acos_f),
        op!(ATanF_R, Unary, F, handle_atan_f),
        op!(RoundF_R, Unary, F, handle_round_f),
        op!(FloorF_R, Unary, F, handle_floor_f),
        op!(CeilF_R, Unary, F, handle_ceil_f),
        op!(TruncF_R, Unary, F, handle_trunc_f),
        op!(NotB_R, Unary, B, handle_not_b),
        op!(NotI_R, Unary, I, handle_not_i),
        op!(IToF_R, Unary, I, handle_i_to_f),
        op!(FToI_R, Unary, F, handle_f_to_i),
        op!(SelF_RRR, Ternary, F, handle_select),
        op!(SelI_RRR, Ternary, I, handle_select),
        op!(SelB_RRR, Ternary, B, handle_select),
        op!(MovX_C, MovConst, X, handle_mov_const),
        op!(LoadF, Load, F, handle_load),
        op!(LoadI, Load, I, handle_load),
        op!(StoreF, Store, F, handle_store),
        op!(StoreI, Store, I, handle_store),
        op!(StoreF_C, StoreConst, F, handle_store_const),
        op!(StoreI_C, StoreConst, I, handle_store_const),
        op!(Call, Call, X, handle_call),
    ];

    let binaries = [
        op!(AddF_RR / AddF_RC, F, handle_add_f),
        op!(AddI_RR / AddI_RC, I, handle_add_i),
        op!(SubF_RR / SubF_RC, F, handle_sub_f),
        op!(SubI_RR / SubI_RC, I, handle_sub_i),
        op!(MulF_RR / MulF_RC, F, handle_mul_f),
        op!(MulI_RR / MulI_RC, I, handle_mul_i),
        op!(DivF_RR / DivF_RC, F, handle_div_f),
        op!(DivI_RR / DivI_RC, I, handle_div_i),
        op!(MinF_RR / MinF_RC, F, handle_min_f),
        op!(MinI_RR / MinI_RC, I, handle_min_i),
        op!(MaxF_RR / MaxF_RC, F, handle_max_f),
        op!(MaxI_RR / MaxI_RC, I, handle_max_i),
        op!(ShlI_RR / ShlI_RC, I, handle_shl_i),
        op!(ShrI_RR / ShrI_RC, I, handle_shr_i),
        op!(AndI_RR / AndI_RC, I, handle_and_i),
        op!(XorI_RR / XorI_RC, I, handle_xor_i),
        op!(OrI_RR / OrI_RC, I, handle_or_i),
        op!(EqF_RR / EqF_RC, F, handle_eq_f),
        op!(EqI_RR / EqI_RC, I, handle_eq_i),
        op!(EqB_RR / EqB_RC, B, handle_eq_b),
        op!(NEqF_RR / NEqF_RC, F, handle_neq_f),
        op!(NEqI_RR / NEqI_RC, I, handle_neq_i),
        op!(NEqB_RR / NEqB_RC, B, handle_neq_b),
        op!(LtF_RR / LtF_RC, F, handle_lt_f),
        op!(LtI_RR / LtI_RC, I, handle_lt_i),
        op!(LEqF_RR / LEqF_RC, F, handle_leq_f),
        op!(LEqI_RR / LEqI_RC, I, handle_leq_i),
        op!(GtF_RR / GtF_RC, F, handle_gt_f),
        op!(GtI_RR / GtI_RC, I, handle_gt_i),
        op!(GEqF_RR / GEqF_RC, F, handle_geq_f),
        op!(GEqI_RR / GEqI_RC, I, handle_geq_i),
        op!(AndB_RR / AndB_RC, B, handle_and_b),
        op!(OrB_RR / OrB_RC, B, handle_or_b),
    ];
    specs.extend(binaries.into_iter().flatten());
    specs
}
