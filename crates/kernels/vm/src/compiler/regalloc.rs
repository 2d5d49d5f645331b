//! Linear-scan register allocation.
//!
//! Intervals are inclusive instruction ranges. A register is released once
//! the instruction that last reads it starts, so an instruction may write
//! its result into the register of an operand it consumes. Nothing is ever
//! spilled; the register file simply grows to the peak number of live
//! values.

use lanevm_ast::NodeId;
use tracing::error;

use crate::error::CompileError;

/// Instruction range over which a value must stay in its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveInterval {
    /// Index of the instruction that writes the value.
    pub start: u32,
    /// Index of the last instruction that reads it.
    pub end: u32,
    /// Node that produces the value.
    pub node: NodeId,
}

impl LiveInterval {
    /// Whether both intervals need their register at the same time.
    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Physical register per interval plus the size of the register file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub registers: Vec<u32>,
    pub num_registers: u32,
}

#[derive(Debug, Default)]
pub(crate) struct AllocScratch {
    order: Vec<usize>,
    active: Vec<usize>,
    free: Vec<u32>,
}

/// Assigns a physical register to every interval.
pub(crate) fn allocate(intervals: &[LiveInterval], scratch: &mut AllocScratch) -> Allocation {
    let AllocScratch {
        order,
        active,
        free,
    } = scratch;
    order.clear();
    active.clear();
    free.clear();

    order.extend(0..intervals.len());
    order.sort_by_key(|&i| intervals[i].start);

    let mut registers = vec![0u32; intervals.len()];
    let mut num_registers = 0u32;
    for &current in order.iter() {
        let start = intervals[current].start;
        active.retain(|&live| {
            if intervals[live].end <= start {
                free.push(registers[live]);
                false
            } else {
                true
            }
        });

        let register = free.pop().unwrap_or(active.len() as u32);
        registers[current] = register;
        num_registers = num_registers.max(register + 1);
        active.push(current);
    }

    Allocation {
        registers,
        num_registers,
    }
}

/// Checks every pair of intervals sharing a register for overlap.
///
/// # Errors
///
/// Returns [`CompileError::RegisterAllocation`] for the first conflicting pair.
pub(crate) fn verify(intervals: &[LiveInterval], allocation: &Allocation) -> Result<(), CompileError> {
    for (i, a) in intervals.iter().enumerate() {
        for (j, b) in intervals.iter().enumerate().skip(i + 1) {
            let register = allocation.registers[i];
            if register == allocation.registers[j] && a.overlaps(b) {
                error!(
                    register,
                    first = %a.node,
                    second = %b.node,
                    "register shared by overlapping live intervals"
                );
                return Err(CompileError::RegisterAllocation {
                    register,
                    first: a.node,
                    second: b.node,
                });
            }
        }
    }
    Ok(())
}
