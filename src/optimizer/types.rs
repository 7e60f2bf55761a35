//! Types and statistics for bytecode optimization.

use crate::bytecode::LostTarget;
use crate::error::OptimizeError;

/// Statistics about optimizations performed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationStats {
    /// Arithmetic instructions replaced by a constant push
    pub arithmetic_folded: usize,
    /// Conversions (`i2l`, `d2i`, `i2b`, ...) folded
    pub conversions_folded: usize,
    /// `lcmp` instructions folded
    pub comparisons_folded: usize,
    /// Conditional branches resolved at compile time
    pub branches_resolved: usize,
    /// Else blocks removed after a branch resolved to its then block
    pub else_blocks_removed: usize,
    /// Dead stores removed (each with its producer)
    pub dead_stores_removed: usize,
    /// Total instructions deleted
    pub instructions_removed: usize,
    /// Loads of a slot the enclosing loop mutates
    pub guarded_loads: usize,
    /// Loads of a slot with no known value
    pub unbound_loads: usize,
    /// Divisions left alone because the divisor is zero
    pub division_by_zero_skipped: usize,
    /// Branches left pointing into a deleted range
    pub lost_targets: usize,
    pub methods_optimized: usize,
    pub methods_skipped: usize,
    pub methods_aborted: usize,
}

impl OptimizationStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total optimizations performed
    pub fn total_optimizations(&self) -> usize {
        self.arithmetic_folded
            + self.conversions_folded
            + self.comparisons_folded
            + self.branches_resolved
            + self.else_blocks_removed
            + self.dead_stores_removed
    }

    /// Add another set of counters into this one
    pub fn merge(&mut self, other: &OptimizationStats) {
        self.arithmetic_folded += other.arithmetic_folded;
        self.conversions_folded += other.conversions_folded;
        self.comparisons_folded += other.comparisons_folded;
        self.branches_resolved += other.branches_resolved;
        self.else_blocks_removed += other.else_blocks_removed;
        self.dead_stores_removed += other.dead_stores_removed;
        self.instructions_removed += other.instructions_removed;
        self.guarded_loads += other.guarded_loads;
        self.unbound_loads += other.unbound_loads;
        self.division_by_zero_skipped += other.division_by_zero_skipped;
        self.lost_targets += other.lost_targets;
        self.methods_optimized += other.methods_optimized;
        self.methods_skipped += other.methods_skipped;
        self.methods_aborted += other.methods_aborted;
    }
}

/// Statistics about dead store elimination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DseStats {
    /// Numeric stores examined
    pub stores_examined: usize,
    /// Stores whose reference count stayed at one
    pub stores_unreferenced: usize,
    /// Unreferenced stores kept because removal was unsafe
    pub stores_kept: usize,
    /// Stores removed
    pub stores_removed: usize,
    /// Producers removed with them
    pub producers_removed: usize,
}

impl DseStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }
}

/// What happened to one method
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    /// Rewritten; any branches left dangling by a range deletion are listed
    Optimized { lost_targets: Vec<LostTarget> },
    /// Excluded by configuration
    Skipped,
    /// Optimization failed; the method is unchanged
    Aborted(OptimizeError),
}

/// Per-method result of optimizing a class
#[derive(Debug, Clone, PartialEq)]
pub struct MethodReport {
    pub method: String,
    pub outcome: MethodOutcome,
}

impl MethodReport {
    pub fn lost_targets(&self) -> &[LostTarget] {
        match &self.outcome {
            MethodOutcome::Optimized { lost_targets } => lost_targets,
            _ => &[],
        }
    }
}
