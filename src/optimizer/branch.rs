//! Conditional branch resolution and else-block removal.
//!
//! A resolved branch that would not jump is deleted so control falls into
//! the then block; the forward `goto` that ends the then block is
//! remembered and, when the walk reaches it, removed together with the else
//! block it skips. A resolved branch that would jump takes the then block
//! with it.

use tracing::{debug, trace};

use crate::bytecode::{Condition, Instruction, InstructionHandle};
use crate::error::OptimizeResult;

use super::cfg;
use super::context::MethodContext;
use super::editor;
use super::evaluator::known_operands;
use super::folding;

impl MethodContext<'_> {
    pub(super) fn visit_branch(
        &mut self,
        handle: InstructionHandle,
        condition: Condition,
        target: InstructionHandle,
    ) -> OptimizeResult<()> {
        let operands = self.stack.pop_n(condition.arity());

        let resolvable = self.config.resolve_branches
            && !self.fold_guard
            && cfg::is_forward(self.code, handle, target);
        let decided = if resolvable {
            known_operands(&operands).and_then(|(values, producers)| {
                folding::evaluate_condition(condition, &values).map(|jumps| (jumps, producers))
            })
        } else {
            None
        };

        let Some((jumps, producers)) = decided else {
            // Whatever is left on the stack is shared with the jump target
            self.stack.clear();
            return Ok(());
        };

        if jumps {
            self.take_branch(handle, target)?;
        } else {
            self.skip_branch(handle, target)?;
        }
        for producer in producers {
            editor::delete(self.code, producer, &mut self.stats)?;
        }
        self.stats.branches_resolved += 1;
        Ok(())
    }

    /// The branch always jumps: drop it and the then block up to its target
    fn take_branch(
        &mut self,
        handle: InstructionHandle,
        target: InstructionHandle,
    ) -> OptimizeResult<()> {
        let Some(last) = self.code.prev(target) else {
            return Ok(());
        };
        let lost = editor::delete_range(self.code, handle, last, &mut self.stats)?;
        self.lost_targets.extend(lost);
        trace!(target: "jfold::branch", %handle, %target, "Branch always taken, then block removed");
        Ok(())
    }

    /// The branch never jumps: drop it and remember the goto that skips the
    /// else block
    fn skip_branch(
        &mut self,
        handle: InstructionHandle,
        target: InstructionHandle,
    ) -> OptimizeResult<()> {
        if let Some(before_target) = self.code.prev(target) {
            if let Some(Instruction::Goto { target: join }) = self.code.get(before_target) {
                if cfg::is_forward(self.code, before_target, *join) {
                    self.pending_else.push(before_target);
                }
            }
        }
        editor::delete(self.code, handle, &mut self.stats)?;
        trace!(target: "jfold::branch", %handle, "Branch never taken, removed");
        Ok(())
    }

    pub(super) fn visit_goto(
        &mut self,
        handle: InstructionHandle,
        target: InstructionHandle,
    ) -> OptimizeResult<()> {
        let Some(index) = self.pending_else.iter().position(|pending| *pending == handle) else {
            self.end_of_block();
            return Ok(());
        };
        self.pending_else.swap_remove(index);

        if !cfg::is_forward(self.code, handle, target) {
            debug!(target: "jfold::branch", %handle, "Else block no longer removable");
            self.end_of_block();
            return Ok(());
        }
        // Else block first, then the goto itself: branches into the goto
        // move on to the join point
        let first = self.code.next(handle).filter(|first| *first != target);
        if let (Some(first), Some(last)) = (first, self.code.prev(target)) {
            let lost = editor::delete_range(self.code, first, last, &mut self.stats)?;
            self.lost_targets.extend(lost);
        }
        editor::delete(self.code, handle, &mut self.stats)?;
        self.stats.else_blocks_removed += 1;
        trace!(target: "jfold::branch", %handle, %target, "Else block removed");
        Ok(())
    }

    /// Nothing falls through an unconditional jump
    fn end_of_block(&mut self) {
        self.stack.clear();
        self.bindings.clear();
    }
}
