//! Bytecode Optimizer
//!
//! Per-method optimization of a [`ClassModel`]: constant folding, conditional
//! branch resolution and dead store elimination.
//!
//! # Passes
//!
//! | Pass | Effect |
//! |------|--------|
//! | Fold | `iconst_2; iconst_3; iadd` → `iconst_5`; conversions and `lcmp` likewise |
//! | Branch | `iconst_1; ifeq L` → branch removed, else block removed at the then-block `goto` |
//! | Dead store | `bipush 7; istore_2` with slot 2 never read → removed |
//!
//! The fold pass walks each method once in program order, simulating the
//! operand stack and local variables. Loads of a slot that the enclosing loop
//! mutates suspend folding until the next unmodeled instruction. The dead
//! store pass runs once over the folded code.
//!
//! # Isolation
//!
//! Each method is optimized on a copy of its code and of the constant pool.
//! If the method aborts (an operator the folder does not model, or a model
//! error) the copy is discarded and the class is left as it was for that
//! method.
//!
//! # Example
//!
//! ```ignore
//! // Before optimization:
//! // iconst_2
//! // iconst_3
//! // iadd
//! // ireturn
//!
//! // After optimization:
//! // iconst_5
//! // ireturn
//! ```

mod branch;
pub mod cfg;
mod context;
mod dse;
mod editor;
mod evaluator;
pub mod folding;
mod types;


use tracing::{debug, warn};

use crate::bytecode::{ClassModel, Method};
use crate::config::OptimizerConfig;

// Re-export public types
pub use context::MethodContext;
pub use dse::DeadStoreEliminator;
pub use editor::{delete, delete_range};
pub use evaluator::{EvaluationStack, StackEntry, VariableBindings};
pub use types::{DseStats, MethodOutcome, MethodReport, OptimizationStats};

/// Class Optimizer
///
/// Runs the passes over every method of a class, keeping running statistics
/// across the classes it is given.
pub struct ClassOptimizer {
    config: OptimizerConfig,
    /// Statistics about optimizations performed
    stats: OptimizationStats,
}

impl Default for ClassOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl ClassOptimizer {
    /// Create a new class optimizer
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            stats: OptimizationStats::new(),
        }
    }

    /// Get optimization statistics
    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize every method of the class in place.
    ///
    /// Classes rejected by the class filter are left untouched and yield no
    /// reports.
    pub fn optimize(&mut self, class: &mut ClassModel) -> Vec<MethodReport> {
        if !self.config.accepts_class(&class.name) {
            debug!(target: "jfold::class", class = %class.name, "Class filtered out");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(class.methods.len());
        for method in class.methods.iter_mut() {
            let outcome = if self.config.accepts_method(&method.name) {
                self.optimize_method(&class.name, method, &mut class.constant_pool)
            } else {
                self.stats.methods_skipped += 1;
                MethodOutcome::Skipped
            };
            reports.push(MethodReport {
                method: method.name.clone(),
                outcome,
            });
        }
        reports
    }

    fn optimize_method(
        &mut self,
        class_name: &str,
        method: &mut Method,
        pool: &mut crate::bytecode::ConstantPool,
    ) -> MethodOutcome {
        let mut code = method.code.clone();
        let mut working_pool = pool.clone();
        let result = MethodContext::new(&mut code, &mut working_pool, &self.config).run();

        match result {
            Ok((stats, lost_targets)) => {
                method.code = code;
                *pool = working_pool;
                method.recompute_limits();
                self.stats.merge(&stats);
                self.stats.methods_optimized += 1;
                debug!(
                    target: "jfold::class",
                    class = class_name,
                    method = %method.name,
                    optimizations = stats.total_optimizations(),
                    removed = stats.instructions_removed,
                    "Optimized method"
                );
                MethodOutcome::Optimized { lost_targets }
            }
            Err(err) => {
                self.stats.methods_aborted += 1;
                warn!(
                    target: "jfold::class",
                    class = class_name,
                    method = %method.name,
                    error = %err,
                    "Method left unoptimized"
                );
                MethodOutcome::Aborted(err)
            }
        }
    }
}

/// Optimize a class with the given configuration
///
/// Convenience function that creates an optimizer and runs it once.
pub fn optimize_class(
    class: &mut ClassModel,
    config: OptimizerConfig,
) -> (Vec<MethodReport>, OptimizationStats) {
    let mut optimizer = ClassOptimizer::new(config);
    let reports = optimizer.optimize(class);
    (reports, optimizer.stats().clone())
}
