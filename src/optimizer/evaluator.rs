//! Symbolic evaluation: the simulated operand stack, local-variable
//! bindings, and the per-instruction folding rules.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::bytecode::{
    ArithOp, ConstantValue, Instruction, InstructionHandle, LocalKind, Narrowing, NumericKind,
    Push,
};
use crate::error::{OptimizeError, OptimizeResult};

use super::cfg;
use super::context::MethodContext;
use super::editor;
use super::folding;

/// One simulated operand-stack value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackEntry {
    /// Value known at compile time, with the side-effect-free instruction
    /// that pushed it
    Known {
        value: ConstantValue,
        producer: InstructionHandle,
    },
    Unknown,
}

impl StackEntry {
    pub fn value(&self) -> Option<ConstantValue> {
        match self {
            StackEntry::Known { value, .. } => Some(*value),
            StackEntry::Unknown => None,
        }
    }
}

/// Operand stack mirror; popping past the bottom yields unknown values
#[derive(Debug, Clone, Default)]
pub struct EvaluationStack {
    entries: Vec<StackEntry>,
}

impl EvaluationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_known(&mut self, value: ConstantValue, producer: InstructionHandle) {
        self.entries.push(StackEntry::Known { value, producer });
    }

    pub fn push_unknown(&mut self) {
        self.entries.push(StackEntry::Unknown);
    }

    pub fn pop(&mut self) -> StackEntry {
        self.entries.pop().unwrap_or(StackEntry::Unknown)
    }

    /// Pop `n` entries, returned in the order they were pushed (top last)
    pub fn pop_n(&mut self, n: usize) -> SmallVec<[StackEntry; 2]> {
        let mut popped: SmallVec<[StackEntry; 2]> = (0..n).map(|_| self.pop()).collect();
        popped.reverse();
        popped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Values and producers of a fully known operand list
pub fn known_operands(
    entries: &[StackEntry],
) -> Option<(SmallVec<[ConstantValue; 2]>, SmallVec<[InstructionHandle; 2]>)> {
    entries
        .iter()
        .map(|entry| match *entry {
            StackEntry::Known { value, producer } => Some((value, producer)),
            StackEntry::Unknown => None,
        })
        .collect::<Option<SmallVec<[(ConstantValue, InstructionHandle); 2]>>>()
        .map(|pairs| pairs.into_iter().unzip())
}

/// Compile-time values of local-variable slots
#[derive(Debug, Clone, Default)]
pub struct VariableBindings {
    slots: HashMap<u16, ConstantValue>,
}

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: u16) -> OptimizeResult<ConstantValue> {
        self.slots
            .get(&slot)
            .copied()
            .ok_or(OptimizeError::UnboundVariable { slot })
    }

    /// Bind a value, invalidating any wide value it overlaps
    pub fn bind(&mut self, slot: u16, value: ConstantValue) {
        self.forget(slot, value.kind().width());
        self.slots.insert(slot, value);
    }

    /// Forget `width` slots starting at `slot`, and a wide value in the slot
    /// below that spills into it
    pub fn forget(&mut self, slot: u16, width: u16) {
        for s in slot..slot.saturating_add(width) {
            self.slots.remove(&s);
        }
        if let Some(below) = slot.checked_sub(1) {
            if self.slots.get(&below).is_some_and(|v| v.kind().width() == 2) {
                self.slots.remove(&below);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl MethodContext<'_> {
    pub(super) fn visit_push(&mut self, handle: InstructionHandle, push: Push) {
        match push.value(self.pool) {
            Some(value) => self.stack.push_known(value, handle),
            // String or class literal
            None => self.stack.push_unknown(),
        }
    }

    pub(super) fn visit_load(&mut self, handle: InstructionHandle, kind: LocalKind, slot: u16) {
        let Some(numeric) = kind.numeric() else {
            self.stack.push_unknown();
            return;
        };
        // Independent of the binding: loop heads are merge points and hold none
        if self.load_is_unsafe(handle, slot) {
            self.stats.guarded_loads += 1;
            self.fold_guard = true;
            debug!(target: "jfold::fold", %handle, slot, "Slot mutated inside loop, folding suspended");
            self.stack.push_unknown();
            return;
        }

        match self.bindings.get(slot) {
            Ok(value) if value.kind() == numeric => self.stack.push_known(value, handle),
            Ok(_) => self.stack.push_unknown(),
            Err(err) => {
                self.stats.unbound_loads += 1;
                trace!(target: "jfold::fold", %handle, error = %err, "Load not folded");
                self.stack.push_unknown();
            }
        }
    }

    fn load_is_unsafe(&self, handle: InstructionHandle, slot: u16) -> bool {
        self.loops
            .region_containing(self.code, handle)
            .is_some_and(|region| cfg::region_mutates_slot(self.code, region, slot))
    }

    pub(super) fn visit_store(&mut self, kind: LocalKind, slot: u16) {
        let entry = self.stack.pop();
        match (kind.numeric(), entry.value()) {
            (Some(numeric), Some(value)) if value.kind() == numeric => {
                self.bindings.bind(slot, value)
            }
            _ => self.bindings.forget(slot, kind.width()),
        }
    }

    pub(super) fn visit_increment(&mut self, slot: u16) {
        self.bindings.forget(slot, 1);
        self.fold_guard = false;
    }

    /// Unmodeled instruction: its stack effect is unknown
    pub(super) fn visit_other(&mut self) {
        self.stack.clear();
        self.fold_guard = false;
    }

    fn folding_enabled(&self) -> bool {
        self.config.fold_constants && !self.fold_guard
    }

    pub(super) fn visit_arithmetic(
        &mut self,
        handle: InstructionHandle,
        kind: NumericKind,
        op: ArithOp,
    ) -> OptimizeResult<()> {
        let operands = self.stack.pop_n(op.arity());
        let known = if self.folding_enabled() {
            known_operands(&operands)
        } else {
            None
        };
        let Some((values, producers)) = known else {
            self.stack.push_unknown();
            return Ok(());
        };

        match folding::fold_arithmetic(kind, op, &values)? {
            Some(result) => {
                self.commit_fold(handle, &producers, result)?;
                self.stats.arithmetic_folded += 1;
            }
            None => {
                if folding::divides_by_zero(op, &values) {
                    self.stats.division_by_zero_skipped += 1;
                    debug!(target: "jfold::fold", %handle, "Division by zero left unfolded");
                }
                self.stack.push_unknown();
            }
        }
        Ok(())
    }

    pub(super) fn visit_convert(
        &mut self,
        handle: InstructionHandle,
        from: NumericKind,
        to: NumericKind,
    ) -> OptimizeResult<()> {
        self.fold_unary(handle, |value| folding::fold_conversion(from, to, value))
    }

    pub(super) fn visit_narrow(
        &mut self,
        handle: InstructionHandle,
        narrowing: Narrowing,
    ) -> OptimizeResult<()> {
        self.fold_unary(handle, |value| folding::fold_narrowing(narrowing, value))
    }

    fn fold_unary(
        &mut self,
        handle: InstructionHandle,
        fold: impl FnOnce(ConstantValue) -> Option<ConstantValue>,
    ) -> OptimizeResult<()> {
        let entry = self.stack.pop();
        let folded = match entry {
            StackEntry::Known { value, producer } if self.folding_enabled() => {
                fold(value).map(|result| (result, producer))
            }
            _ => None,
        };
        match folded {
            Some((result, producer)) => {
                self.commit_fold(handle, &[producer], result)?;
                self.stats.conversions_folded += 1;
            }
            None => self.stack.push_unknown(),
        }
        Ok(())
    }

    pub(super) fn visit_lcmp(&mut self, handle: InstructionHandle) -> OptimizeResult<()> {
        let operands = self.stack.pop_n(2);
        let folded = if self.folding_enabled() {
            known_operands(&operands).and_then(|(values, producers)| {
                folding::fold_lcmp(values[0], values[1]).map(|result| (result, producers))
            })
        } else {
            None
        };
        match folded {
            Some((result, producers)) => {
                self.commit_fold(handle, &producers, result)?;
                self.stats.comparisons_folded += 1;
            }
            None => self.stack.push_unknown(),
        }
        Ok(())
    }

    /// Replace the consumer in place with a push of `result`, then delete
    /// the producers. Branches into a producer move forward onto the next
    /// instruction, ending at the consumer.
    fn commit_fold(
        &mut self,
        handle: InstructionHandle,
        producers: &[InstructionHandle],
        result: ConstantValue,
    ) -> OptimizeResult<()> {
        let push = Push::for_value(result, self.pool)?;
        let replaced = self.code.replace(handle, Instruction::Push(push))?;
        for &producer in producers {
            editor::delete(self.code, producer, &mut self.stats)?;
        }
        trace!(
            target: "jfold::fold",
            %handle,
            instruction = %replaced,
            %result,
            "Folded"
        );
        self.stack.push_known(result, handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{InstructionList, Opcode};

    fn some_handle() -> InstructionHandle {
        InstructionList::new().push(Instruction::other(Opcode::Nop))
    }

    #[test]
    fn test_pop_n_returns_push_order() {
        let mut stack = EvaluationStack::new();
        stack.push_unknown();
        stack.push_known(ConstantValue::Int(7), some_handle());
        let popped = stack.pop_n(2);
        assert_eq!(popped[0], StackEntry::Unknown);
        assert_eq!(popped[1].value(), Some(ConstantValue::Int(7)));
        // Empty stack pops unknown values
        assert_eq!(stack.pop(), StackEntry::Unknown);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_unknown_operand_blocks_fold() {
        let entries = [
            StackEntry::Known {
                value: ConstantValue::Int(1),
                producer: some_handle(),
            },
            StackEntry::Unknown,
        ];
        assert!(known_operands(&entries).is_none());
    }

    #[test]
    fn test_wide_binding_overlap() {
        let mut bindings = VariableBindings::new();
        bindings.bind(1, ConstantValue::Long(9));
        bindings.bind(3, ConstantValue::Int(4));
        // Writing slot 2 clobbers the long held in 1..=2
        bindings.bind(2, ConstantValue::Int(0));
        assert_eq!(
            bindings.get(1),
            Err(OptimizeError::UnboundVariable { slot: 1 })
        );
        assert_eq!(bindings.get(3), Ok(ConstantValue::Int(4)));
        // A long written at 2 clobbers slot 3
        bindings.bind(2, ConstantValue::Long(1));
        assert!(bindings.get(3).is_err());
        assert_eq!(bindings.len(), 1);
    }
}
