//! Mutable instruction sequence with stable handles
//!
//! Instructions live in an arena and are threaded into program order by a
//! doubly linked list. A handle names one arena slot for the lifetime of the
//! list and is never reused, so it can serve as a branch target while the
//! sequence around it is edited.
//!
//! Removal primitives do not patch branches themselves. [`InstructionList::unlink`]
//! returns the [`Retarget`] repairs the caller has to apply, and
//! [`InstructionList::unlink_range`] returns the [`LostTarget`]s it could not
//! repair.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::instruction::Instruction;
use crate::error::{ModelError, ModelResult};

/// Stable identity of one instruction in an [`InstructionList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionHandle(u32);

impl InstructionHandle {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstructionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Branch repair produced by removing a targeted instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retarget {
    pub referrer: InstructionHandle,
    pub old_target: InstructionHandle,
    pub new_target: InstructionHandle,
}

/// Branch left pointing into a removed range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostTarget {
    pub referrer: InstructionHandle,
    pub target: InstructionHandle,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    instruction: Instruction,
    prev: Option<InstructionHandle>,
    next: Option<InstructionHandle>,
    live: bool,
}

/// Ordered, editable instruction sequence of one method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionList {
    nodes: Vec<Node>,
    head: Option<InstructionHandle>,
    tail: Option<InstructionHandle>,
    len: usize,
}

impl InstructionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live instructions
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an instruction, returns its handle
    pub fn push(&mut self, instruction: Instruction) -> InstructionHandle {
        let handle = InstructionHandle(self.nodes.len() as u32);
        self.nodes.push(Node {
            instruction,
            prev: self.tail,
            next: None,
            live: true,
        });
        match self.tail {
            Some(tail) => self.nodes[tail.index()].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        handle
    }

    pub fn is_live(&self, handle: InstructionHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn get(&self, handle: InstructionHandle) -> Option<&Instruction> {
        self.node(handle).map(|node| &node.instruction)
    }

    /// Replace an instruction in place; the handle keeps its identity and
    /// every branch targeting it stays valid
    pub fn replace(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> ModelResult<Instruction> {
        let node = self.node_mut(handle)?;
        Ok(std::mem::replace(&mut node.instruction, instruction))
    }

    pub fn first(&self) -> Option<InstructionHandle> {
        self.head
    }

    pub fn last(&self) -> Option<InstructionHandle> {
        self.tail
    }

    pub fn next(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).and_then(|node| node.next)
    }

    pub fn prev(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).and_then(|node| node.prev)
    }

    /// Snapshot of live handles in program order
    pub fn handles(&self) -> Vec<InstructionHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Iterate live instructions in program order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Index of a live instruction in program order
    pub fn position(&self, handle: InstructionHandle) -> Option<usize> {
        if !self.is_live(handle) {
            return None;
        }
        self.iter().position(|(h, _)| h == handle)
    }

    /// Program-order index of every live instruction
    pub fn positions(&self) -> HashMap<InstructionHandle, usize> {
        self.iter()
            .enumerate()
            .map(|(pos, (handle, _))| (handle, pos))
            .collect()
    }

    /// Live branches whose target is `handle`
    pub fn targeters(&self, handle: InstructionHandle) -> Vec<InstructionHandle> {
        self.iter()
            .filter(|(_, instruction)| instruction.target() == Some(handle))
            .map(|(h, _)| h)
            .collect()
    }

    /// Point the branch at `referrer` to `new_target`
    pub fn retarget(
        &mut self,
        referrer: InstructionHandle,
        new_target: InstructionHandle,
    ) -> ModelResult<()> {
        if !self.is_live(new_target) {
            return Err(ModelError::StaleHandle(new_target));
        }
        self.node_mut(referrer)?.instruction.set_target(new_target);
        Ok(())
    }

    /// Remove one instruction from the sequence.
    ///
    /// Branches that targeted it are not modified; the returned repairs
    /// name the instruction that followed it as their new target. Fails with
    /// [`ModelError::TargetLost`] (leaving the list untouched) when the
    /// instruction is targeted but has no successor.
    pub fn unlink(&mut self, handle: InstructionHandle) -> ModelResult<Vec<Retarget>> {
        if !self.is_live(handle) {
            return Err(ModelError::StaleHandle(handle));
        }
        let referrers: Vec<_> = self
            .targeters(handle)
            .into_iter()
            .filter(|referrer| *referrer != handle)
            .collect();
        let repairs = match self.next(handle) {
            Some(next) => referrers
                .into_iter()
                .map(|referrer| Retarget {
                    referrer,
                    old_target: handle,
                    new_target: next,
                })
                .collect(),
            None if referrers.is_empty() => Vec::new(),
            None => return Err(ModelError::TargetLost { instruction: handle }),
        };
        self.detach(handle);
        Ok(repairs)
    }

    /// Remove the contiguous span `from..=to`.
    ///
    /// Branches outside the span that target an instruction inside it are
    /// left untouched and reported as [`LostTarget`]s.
    pub fn unlink_range(
        &mut self,
        from: InstructionHandle,
        to: InstructionHandle,
    ) -> ModelResult<Vec<LostTarget>> {
        if !self.is_live(from) || !self.is_live(to) {
            return Err(ModelError::InvalidRange { from, to });
        }

        let mut span = Vec::new();
        let mut cursor = Some(from);
        while let Some(handle) = cursor {
            span.push(handle);
            if handle == to {
                break;
            }
            cursor = self.next(handle);
        }
        if span.last() != Some(&to) {
            return Err(ModelError::InvalidRange { from, to });
        }

        let removed: HashSet<_> = span.iter().copied().collect();
        let lost = self
            .iter()
            .filter(|(handle, _)| !removed.contains(handle))
            .filter_map(|(referrer, instruction)| {
                instruction
                    .target()
                    .filter(|target| removed.contains(target))
                    .map(|target| LostTarget { referrer, target })
            })
            .collect();

        for handle in span {
            self.detach(handle);
        }
        Ok(lost)
    }

    /// Check that every branch targets a live instruction
    pub fn validate(&self) -> ModelResult<()> {
        for (referrer, instruction) in self.iter() {
            if let Some(target) = instruction.target() {
                if !self.is_live(target) {
                    return Err(ModelError::DanglingTarget { referrer, target });
                }
            }
        }
        Ok(())
    }

    fn node(&self, handle: InstructionHandle) -> Option<&Node> {
        self.nodes.get(handle.index()).filter(|node| node.live)
    }

    fn node_mut(&mut self, handle: InstructionHandle) -> ModelResult<&mut Node> {
        self.nodes
            .get_mut(handle.index())
            .filter(|node| node.live)
            .ok_or(ModelError::StaleHandle(handle))
    }

    fn detach(&mut self, handle: InstructionHandle) {
        let (prev, next) = {
            let node = &mut self.nodes[handle.index()];
            node.live = false;
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(prev) => self.nodes[prev.index()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next.index()].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }
}

/// Program-order iterator over live instructions
pub struct Iter<'a> {
    list: &'a InstructionList,
    cursor: Option<InstructionHandle>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (InstructionHandle, &'a Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = &self.list.nodes[handle.index()];
        self.cursor = node.next;
        Some((handle, &node.instruction))
    }
}
