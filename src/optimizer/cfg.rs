//! Control-flow facts the passes need: loop regions, back edges, merge
//! points and reachability.
//!
//! Loop regions are found once per pass from the layout at the start of the
//! pass. Lookup is first-match in discovery order over the half-open
//! position interval `[start, end)`, not innermost-region.

use std::collections::HashSet;

use crate::bytecode::{Instruction, InstructionHandle, InstructionList, Opcode};

/// Span delimited by a backward `goto` and its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    /// Target of the backward jump
    pub start: InstructionHandle,
    /// The backward `goto`
    pub end: InstructionHandle,
}

/// Loop regions of one method, in discovery order
#[derive(Debug, Clone, Default)]
pub struct LoopRegions {
    regions: Vec<LoopRegion>,
}

impl LoopRegions {
    /// Record every unconditional branch whose target precedes it
    pub fn scan(code: &InstructionList) -> Self {
        let positions = code.positions();
        let regions = code
            .iter()
            .filter_map(|(handle, instruction)| match instruction {
                Instruction::Goto { target } => {
                    let start = *positions.get(target)?;
                    (start < positions[&handle]).then_some(LoopRegion {
                        start: *target,
                        end: handle,
                    })
                }
                _ => None,
            })
            .collect();
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoopRegion> {
        self.regions.iter()
    }

    /// First region, in discovery order, whose `[start, end)` contains the
    /// instruction. Regions with a deleted bound are skipped.
    pub fn region_containing(
        &self,
        code: &InstructionList,
        handle: InstructionHandle,
    ) -> Option<LoopRegion> {
        if self.regions.is_empty() {
            return None;
        }
        let positions = code.positions();
        let at = *positions.get(&handle)?;
        self.regions.iter().copied().find(|region| {
            match (positions.get(&region.start), positions.get(&region.end)) {
                (Some(&start), Some(&end)) => start <= at && at < end,
                _ => false,
            }
        })
    }
}

/// Whether anything from the region start up to its closing branch stores
/// to or increments `slot`
pub fn region_mutates_slot(code: &InstructionList, region: LoopRegion, slot: u16) -> bool {
    let mut cursor = Some(region.start);
    while let Some(handle) = cursor {
        if handle == region.end {
            break;
        }
        match code.get(handle) {
            Some(Instruction::Store { kind, slot: stored }) => {
                if covers(*stored, kind.width(), slot) {
                    return true;
                }
            }
            Some(Instruction::Increment { slot: incremented, .. }) if *incremented == slot => {
                return true
            }
            _ => {}
        }
        cursor = code.next(handle);
    }
    false
}

/// Whether a `width`-slot access at `base` touches `slot`
pub fn covers(base: u16, width: u16, slot: u16) -> bool {
    slot >= base && slot - base < width
}

/// Any branch, conditional or not, to an instruction at or before itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackEdge {
    pub target: InstructionHandle,
    pub branch: InstructionHandle,
}

/// Every backward branch, in program order
pub fn back_edges(code: &InstructionList) -> Vec<BackEdge> {
    let positions = code.positions();
    code.iter()
        .filter_map(|(branch, instruction)| {
            let target = instruction.target()?;
            (*positions.get(&target)? <= positions[&branch]).then_some(BackEdge { target, branch })
        })
        .collect()
}

/// Whether some live branch jumps to this instruction, so control can
/// reach it from more than one place
pub fn is_merge_point(code: &InstructionList, handle: InstructionHandle) -> bool {
    code.iter()
        .any(|(_, instruction)| instruction.target() == Some(handle))
}

/// Whether the branch at `from` jumps strictly forward to `to`
pub fn is_forward(code: &InstructionList, from: InstructionHandle, to: InstructionHandle) -> bool {
    match (code.position(from), code.position(to)) {
        (Some(from), Some(to)) => to > from,
        _ => false,
    }
}

/// Whether control never falls through to the next instruction
pub fn ends_flow(instruction: &Instruction) -> bool {
    match instruction {
        Instruction::Goto { .. } => true,
        Instruction::Other { opcode, .. } => matches!(
            opcode,
            Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
                | Opcode::Return
                | Opcode::Athrow
        ),
        _ => false,
    }
}

fn successors(code: &InstructionList, handle: InstructionHandle) -> Vec<InstructionHandle> {
    let Some(instruction) = code.get(handle) else {
        return Vec::new();
    };
    let mut successors: Vec<InstructionHandle> = instruction.target().into_iter().collect();
    if !ends_flow(instruction) {
        successors.extend(code.next(handle));
    }
    successors
}

/// Every instruction some path from `from` can execute after it. `from`
/// itself is included only when a path loops back to it.
pub fn reachable_from(
    code: &InstructionList,
    from: InstructionHandle,
) -> HashSet<InstructionHandle> {
    let mut seen = HashSet::new();
    let mut work = successors(code, from);
    while let Some(handle) = work.pop() {
        if seen.insert(handle) {
            work.extend(successors(code, handle));
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{LocalKind, NumericKind};

    fn nop() -> Instruction {
        Instruction::other(Opcode::Nop)
    }

    #[test]
    fn test_scan_finds_backward_gotos_only() {
        let mut code = InstructionList::new();
        let head = code.push(nop());
        let forward = code.push(nop());
        let body = code.push(nop());
        let back = code.push(Instruction::Goto { target: head });
        let exit = code.push(Instruction::other(Opcode::Return));
        code.replace(forward, Instruction::Goto { target: exit }).unwrap();

        let regions = LoopRegions::scan(&code);
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions.region_containing(&code, body),
            Some(LoopRegion { start: head, end: back })
        );
        // The closing branch itself lies outside [start, end)
        assert_eq!(regions.region_containing(&code, back), None);
        assert_eq!(regions.region_containing(&code, exit), None);
    }

    #[test]
    fn test_lookup_follows_discovery_order() {
        let mut code = InstructionList::new();
        let outer = code.push(nop());
        let inner = code.push(nop());
        let load = code.push(nop());
        let inner_back = code.push(Instruction::Goto { target: inner });
        let outer_back = code.push(Instruction::Goto { target: outer });

        let regions = LoopRegions::scan(&code);
        assert_eq!(regions.len(), 2);
        // Discovery order is program order of the closing branches
        assert_eq!(
            regions.region_containing(&code, load),
            Some(LoopRegion { start: inner, end: inner_back })
        );
        assert_eq!(
            regions.region_containing(&code, inner_back),
            Some(LoopRegion { start: outer, end: outer_back })
        );
    }

    #[test]
    fn test_region_mutation_includes_wide_stores() {
        let mut code = InstructionList::new();
        let head = code.push(Instruction::Store {
            kind: LocalKind::Numeric(NumericKind::Long),
            slot: 2,
        });
        let back = code.push(Instruction::Goto { target: head });
        let region = LoopRegion { start: head, end: back };
        assert!(region_mutates_slot(&code, region, 3));
        assert!(!region_mutates_slot(&code, region, 1));
        assert_eq!(back_edges(&code).len(), 1);
        assert!(is_merge_point(&code, head));
        assert!(!is_merge_point(&code, back));
    }

    #[test]
    fn test_reachability_follows_jumps_not_layout() {
        let mut code = InstructionList::new();
        let entry = code.push(nop());
        let read = code.push(nop());
        let ret = code.push(Instruction::other(Opcode::Ireturn));
        let hop = code.push(Instruction::Goto { target: read });
        let skipped = code.push(nop());
        let set = code.push(nop());
        let back = code.push(Instruction::Goto { target: hop });
        code.replace(entry, Instruction::Goto { target: set }).unwrap();

        let reached = reachable_from(&code, set);
        assert!(reached.contains(&read));
        assert!(reached.contains(&ret));
        assert!(reached.contains(&back));
        assert!(!reached.contains(&skipped));
        assert!(!reached.contains(&set));
        assert!(reachable_from(&code, ret).is_empty());
    }
}
