//! Per-method optimization state and the pass driver.

use tracing::trace;

use crate::bytecode::{ConstantPool, Instruction, InstructionHandle, InstructionList, LostTarget};
use crate::config::OptimizerConfig;
use crate::error::OptimizeResult;

use super::cfg::{self, LoopRegions};
use super::dse::DeadStoreEliminator;
use super::evaluator::{EvaluationStack, VariableBindings};
use super::types::OptimizationStats;

/// Everything one method's optimization needs, created fresh for the method
/// and dropped when it is done
pub struct MethodContext<'a> {
    pub(super) code: &'a mut InstructionList,
    pub(super) pool: &'a mut ConstantPool,
    pub(super) config: &'a OptimizerConfig,
    pub(super) stack: EvaluationStack,
    pub(super) bindings: VariableBindings,
    /// Set by a load of a slot its loop mutates; suspends folding
    pub(super) fold_guard: bool,
    pub(super) loops: LoopRegions,
    /// Gotos ending a then block whose branch resolved to fall through
    pub(super) pending_else: Vec<InstructionHandle>,
    pub(super) lost_targets: Vec<LostTarget>,
    pub(super) stats: OptimizationStats,
}

impl<'a> MethodContext<'a> {
    pub fn new(
        code: &'a mut InstructionList,
        pool: &'a mut ConstantPool,
        config: &'a OptimizerConfig,
    ) -> Self {
        Self {
            code,
            pool,
            config,
            stack: EvaluationStack::new(),
            bindings: VariableBindings::new(),
            fold_guard: false,
            loops: LoopRegions::default(),
            pending_else: Vec::new(),
            lost_targets: Vec::new(),
            stats: OptimizationStats::new(),
        }
    }

    /// Fold, resolve branches, then remove dead stores.
    ///
    /// Returns the counters and any branch targets lost to range deletion.
    pub fn run(mut self) -> OptimizeResult<(OptimizationStats, Vec<LostTarget>)> {
        if self.config.fold_constants || self.config.resolve_branches {
            self.fold_pass()?;
        }
        if self.config.eliminate_dead_stores {
            let mut eliminator = DeadStoreEliminator::new();
            eliminator.eliminate(self.code, self.pool, &mut self.stats)?;
            trace!(target: "jfold::dse", stats = ?eliminator.stats(), "Dead store pass finished");
        }
        Ok((self.stats, self.lost_targets))
    }

    fn fold_pass(&mut self) -> OptimizeResult<()> {
        self.loops = LoopRegions::scan(self.code);
        trace!(target: "jfold::fold", loops = self.loops.len(), "Fold pass started");

        for handle in self.code.handles() {
            // Deleted earlier in this pass
            let Some(instruction) = self.code.get(handle).cloned() else {
                continue;
            };
            if cfg::is_merge_point(self.code, handle) {
                self.stack.clear();
                self.bindings.clear();
            }
            self.visit(handle, instruction)?;
        }
        Ok(())
    }

    fn visit(&mut self, handle: InstructionHandle, instruction: Instruction) -> OptimizeResult<()> {
        match instruction {
            Instruction::Push(push) => self.visit_push(handle, push),
            Instruction::Load { kind, slot } => self.visit_load(handle, kind, slot),
            Instruction::Store { kind, slot } => self.visit_store(kind, slot),
            Instruction::Arithmetic { kind, op } => self.visit_arithmetic(handle, kind, op)?,
            Instruction::Convert { from, to } => self.visit_convert(handle, from, to)?,
            Instruction::Narrow(narrowing) => self.visit_narrow(handle, narrowing)?,
            Instruction::CompareLong => self.visit_lcmp(handle)?,
            Instruction::If { condition, target } => self.visit_branch(handle, condition, target)?,
            Instruction::Goto { target } => self.visit_goto(handle, target)?,
            Instruction::Increment { slot, .. } => self.visit_increment(slot),
            Instruction::Other { .. } => self.visit_other(),
        }
        Ok(())
    }
}
