//! Dead Store Elimination for the bytecode optimizer.
//!
//! This module removes local-variable stores that are never read:
//! 1. Count references per slot: a store resets its slot's count to one,
//!    every later numeric load of the slot adds one
//! 2. Decide, before deleting anything, which stores with a count of one are
//!    safe to remove
//! 3. Delete each of those stores together with the instruction that
//!    produced its value
//!
//! A single pass: removing a store never makes this pass revisit the
//! producers feeding it.

use std::collections::HashMap;

use tracing::trace;

use crate::bytecode::{ConstantPool, Instruction, InstructionHandle, InstructionList, LocalKind};
use crate::error::ModelResult;

use super::cfg::{self, BackEdge};
use super::editor;
use super::types::{DseStats, OptimizationStats};

/// Dead Store Eliminator
///
/// A store is removed when its slot's reference count is one and
/// additionally:
/// - no load or `iinc` of the slot follows it,
/// - no backward branch spanning it reads the slot (the next iteration
///   would),
/// - no load or `iinc` of the slot is reachable from it along branches,
/// - it is not itself a branch target, and
/// - the instruction before it is a numeric constant push or numeric load,
///   i.e. the value's producer.
///
/// Stores of references are never removed.
pub struct DeadStoreEliminator {
    /// Statistics about eliminations performed
    stats: DseStats,
}

impl Default for DeadStoreEliminator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadStoreEliminator {
    /// Create a new dead store eliminator
    pub fn new() -> Self {
        Self {
            stats: DseStats::new(),
        }
    }

    /// Get elimination statistics
    pub fn stats(&self) -> &DseStats {
        &self.stats
    }

    /// Remove dead stores from one method body
    pub fn eliminate(
        &mut self,
        code: &mut InstructionList,
        pool: &ConstantPool,
        stats: &mut OptimizationStats,
    ) -> ModelResult<()> {
        let doomed = self.find_dead_stores(code, pool);

        for (producer, store) in doomed {
            editor::delete(code, producer, stats)?;
            editor::delete(code, store, stats)?;
            self.stats.stores_removed += 1;
            self.stats.producers_removed += 1;
            stats.dead_stores_removed += 1;
            trace!(target: "jfold::dse", %store, %producer, "Removed dead store");
        }
        Ok(())
    }

    /// `(producer, store)` pairs to delete
    fn find_dead_stores(
        &mut self,
        code: &InstructionList,
        pool: &ConstantPool,
    ) -> Vec<(InstructionHandle, InstructionHandle)> {
        let entries: Vec<(InstructionHandle, &Instruction)> = code.iter().collect();
        let counts = reference_counts(&entries);
        let back_edges = cfg::back_edges(code);
        let positions = code.positions();

        let mut doomed = Vec::new();
        for (index, &(store, instruction)) in entries.iter().enumerate() {
            let Instruction::Store {
                kind: LocalKind::Numeric(numeric),
                slot,
            } = *instruction
            else {
                continue;
            };
            self.stats.stores_examined += 1;
            if counts.get(&slot) != Some(&1) {
                continue;
            }
            self.stats.stores_unreferenced += 1;

            let width = numeric.width();
            let read_later = entries[index + 1..]
                .iter()
                .any(|(_, later)| reads_slot(later, slot, width));
            let read_by_loop = back_edges
                .iter()
                .any(|edge| spans_read(edge, index, &entries, &positions, slot, width));
            let read_on_path = !read_later
                && !read_by_loop
                && cfg::reachable_from(code, store)
                    .iter()
                    .filter_map(|handle| code.get(*handle))
                    .any(|reached| reads_slot(reached, slot, width));
            let producer = index
                .checked_sub(1)
                .map(|i| entries[i])
                .filter(|(_, previous)| previous.is_numeric_producer(pool));

            match producer {
                Some((producer, _))
                    if !read_later
                        && !read_by_loop
                        && !read_on_path
                        && !cfg::is_merge_point(code, store) =>
                {
                    doomed.push((producer, store));
                }
                _ => {
                    self.stats.stores_kept += 1;
                    trace!(target: "jfold::dse", %store, slot, "Unreferenced store kept");
                }
            }
        }
        doomed
    }
}

/// Count per slot, following the last store of each slot
fn reference_counts(entries: &[(InstructionHandle, &Instruction)]) -> HashMap<u16, usize> {
    let mut counts = HashMap::new();
    for (_, instruction) in entries {
        match instruction {
            Instruction::Store { slot, .. } => {
                counts.insert(*slot, 1);
            }
            Instruction::Load {
                kind: LocalKind::Numeric(_),
                slot,
            } => {
                if let Some(count) = counts.get_mut(slot) {
                    *count += 1;
                }
            }
            _ => {}
        }
    }
    counts
}

/// Whether the instruction reads any of `width` slots starting at `slot`
fn reads_slot(instruction: &Instruction, slot: u16, width: u16) -> bool {
    match *instruction {
        Instruction::Load { kind, slot: loaded } => overlaps(loaded, kind.width(), slot, width),
        Instruction::Increment { slot: incremented, .. } => overlaps(incremented, 1, slot, width),
        _ => false,
    }
}

fn overlaps(a: u16, a_width: u16, b: u16, b_width: u16) -> bool {
    cfg::covers(a, a_width, b) || cfg::covers(b, b_width, a)
}

/// Whether the back edge's span contains position `index` and reads the slot
fn spans_read(
    edge: &BackEdge,
    index: usize,
    entries: &[(InstructionHandle, &Instruction)],
    positions: &HashMap<InstructionHandle, usize>,
    slot: u16,
    width: u16,
) -> bool {
    let (Some(&start), Some(&end)) = (positions.get(&edge.target), positions.get(&edge.branch))
    else {
        return false;
    };
    (start..=end).contains(&index)
        && entries[start..=end]
            .iter()
            .any(|(_, instruction)| reads_slot(instruction, slot, width))
}
