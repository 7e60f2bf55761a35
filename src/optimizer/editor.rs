//! Instruction deletion with branch-target bookkeeping.
//!
//! [`delete`] removes one instruction and moves every branch that targeted
//! it to the following instruction. [`delete_range`] removes a span and does
//! not repair anything: branches from outside the span into it are reported
//! back, logged and counted, and the class then fails validation on save.

use tracing::{trace, warn};

use crate::bytecode::{InstructionHandle, InstructionList, LostTarget};
use crate::error::ModelResult;

use super::types::OptimizationStats;

/// Remove one instruction, retargeting its referrers to its successor
pub fn delete(
    code: &mut InstructionList,
    handle: InstructionHandle,
    stats: &mut OptimizationStats,
) -> ModelResult<()> {
    let removed = code.get(handle).cloned();
    let repairs = code.unlink(handle)?;
    for repair in &repairs {
        code.retarget(repair.referrer, repair.new_target)?;
        trace!(
            target: "jfold::editor",
            referrer = %repair.referrer,
            from = %repair.old_target,
            to = %repair.new_target,
            "Retargeted branch"
        );
    }
    stats.instructions_removed += 1;
    trace!(target: "jfold::editor", %handle, instruction = ?removed, "Deleted instruction");
    Ok(())
}

/// Remove `from..=to` without repairing branches into the span
pub fn delete_range(
    code: &mut InstructionList,
    from: InstructionHandle,
    to: InstructionHandle,
    stats: &mut OptimizationStats,
) -> ModelResult<Vec<LostTarget>> {
    let before = code.len();
    let lost = code.unlink_range(from, to)?;
    let removed = before - code.len();
    stats.instructions_removed += removed;
    stats.lost_targets += lost.len();

    for entry in &lost {
        warn!(
            target: "jfold::editor",
            referrer = %entry.referrer,
            lost = %entry.target,
            "Branch target lost in deleted range"
        );
    }
    trace!(target: "jfold::editor", %from, %to, removed, "Deleted range");
    Ok(lost)
}
