//! Compiler and execution switches.

use serde::{Deserialize, Serialize};

/// Configuration for [`Compiler`](crate::Compiler).
///
/// The default only verifies register allocation when `debug_assertions`
/// are on. Release builds skip the check unless
/// `verify_register_allocation` is set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Re-check every pair of live intervals after register allocation.
    /// Quadratic in the instruction count. Defaults to `cfg!(debug_assertions)`,
    /// so release builds must opt in.
    pub verify_register_allocation: bool,

    /// Record the reachable node count after each transform pass.
    pub trace_passes: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            verify_register_allocation: cfg!(debug_assertions),
            trace_passes: false,
        }
    }
}

/// How [`Vm::execute`](crate::Vm::execute) binds streams to a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteFlags {
    /// Match program inputs and outputs to streams by name instead of position.
    pub map_streams_by_name: bool,

    /// Serve `name.x`, `name.y`, ... slots from one vector stream called `name`.
    /// Only applies when mapping by name.
    pub scalarize_streams: bool,

    /// Skip stores to program outputs that have no stream.
    pub allow_missing_outputs: bool,
}

impl ExecuteFlags {
    /// Name-based binding with vector stream splitting and optional outputs.
    pub const USER_FRIENDLY: Self = Self {
        map_streams_by_name: true,
        scalarize_streams: true,
        allow_missing_outputs: true,
    };

    /// Positional binding; the caller supplies exactly the program's scalar streams.
    pub const BEST_PERFORMANCE: Self = Self {
        map_streams_by_name: false,
        scalarize_streams: false,
        allow_missing_outputs: false,
    };
}

impl Default for ExecuteFlags {
    fn default() -> Self {
        Self::USER_FRIENDLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CompilerConfig = serde_json::from_str(r#"{"trace_passes": true}"#).unwrap();
        assert!(config.trace_passes);
        assert_eq!(
            config.verify_register_allocation,
            CompilerConfig::default().verify_register_allocation
        );
    }

    #[test]
    fn test_allocation_check_follows_debug_assertions() {
        assert_eq!(
            CompilerConfig::default().verify_register_allocation,
            cfg!(debug_assertions)
        );
        let config: CompilerConfig =
            serde_json::from_str(r#"{"verify_register_allocation": true}"#).unwrap();
        assert!(config.verify_register_allocation);
    }

    #[test]
    fn test_flag_presets() {
        assert_eq!(ExecuteFlags::default(), ExecuteFlags::USER_FRIENDLY);
        let flags: ExecuteFlags = serde_json::from_str(r#"{"allow_missing_outputs": false}"#).unwrap();
        assert!(flags.map_streams_by_name);
        assert!(!flags.allow_missing_outputs);
    }
}
