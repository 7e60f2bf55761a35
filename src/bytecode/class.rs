//! Class and method model
//!
//! The in-memory form the optimizer rewrites. Reading and writing go through
//! the text listing in [`super::listing`]; writes are validated first and
//! land atomically.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::instruction::{Instruction, Push};
use super::list::{InstructionHandle, InstructionList};
use super::listing;
use super::opcodes::Opcode;
use super::pool::ConstantPool;
use crate::error::{ModelError, ModelResult};

/// One method body
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub code: InstructionList,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl Method {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            code: InstructionList::new(),
            max_stack: 0,
            max_locals: 0,
        }
    }

    /// Recompute `max_locals` and `max_stack` after the code was rewritten.
    ///
    /// `max_locals` grows to cover every slot the code touches and never
    /// shrinks. `max_stack` is replaced only when every instruction has a
    /// known stack effect and all paths agree on the depth at each join;
    /// otherwise the declared value is kept.
    pub fn recompute_limits(&mut self) {
        let touched = self
            .code
            .iter()
            .filter_map(|(_, instruction)| match instruction {
                Instruction::Load { kind, slot } | Instruction::Store { kind, slot } => {
                    Some(slot.saturating_add(kind.width()))
                }
                Instruction::Increment { slot, .. } => Some(slot.saturating_add(1)),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.max_locals = self.max_locals.max(touched);

        if let Some(depth) = max_stack_depth(&self.code) {
            self.max_stack = depth;
        }
    }
}

/// Stack words popped and pushed, `None` when not modeled
fn stack_effect(instruction: &Instruction) -> Option<(u16, u16)> {
    use super::instruction::ArithOp;

    let effect = match instruction {
        Instruction::Push(Push::LConst(_) | Push::DConst(_) | Push::Ldc2W(_)) => (0, 2),
        Instruction::Push(_) => (0, 1),
        Instruction::Load { kind, .. } => (0, kind.width()),
        Instruction::Store { kind, .. } => (kind.width(), 0),
        Instruction::Arithmetic { kind, op } => {
            let width = kind.width();
            match op {
                ArithOp::Neg => (width, width),
                // Shift distance is always an int
                ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr => (width + 1, width),
                _ => (width * 2, width),
            }
        }
        Instruction::Convert { from, to } => (from.width(), to.width()),
        Instruction::Narrow(_) => (1, 1),
        Instruction::CompareLong => (4, 1),
        Instruction::If { condition, .. } => (condition.arity() as u16, 0),
        Instruction::Goto { .. } | Instruction::Increment { .. } => (0, 0),
        Instruction::Other { opcode, .. } => match opcode {
            Opcode::Nop | Opcode::Return => (0, 0),
            Opcode::AconstNull => (0, 1),
            Opcode::Pop | Opcode::Ireturn | Opcode::Freturn | Opcode::Areturn => (1, 0),
            Opcode::Pop2 | Opcode::Lreturn | Opcode::Dreturn => (2, 0),
            Opcode::Dup => (1, 2),
            _ => return None,
        },
    };
    Some(effect)
}

fn ends_block(instruction: &Instruction) -> bool {
    match instruction {
        Instruction::Goto { .. } => true,
        Instruction::Other { opcode, .. } => matches!(
            opcode,
            Opcode::Return
                | Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
        ),
        _ => false,
    }
}

fn max_stack_depth(code: &InstructionList) -> Option<u16> {
    let mut entry_depth: HashMap<InstructionHandle, u16> = HashMap::new();
    let mut depth = Some(0u16);
    let mut max = 0u16;

    for (handle, instruction) in code.iter() {
        depth = match (depth, entry_depth.get(&handle).copied()) {
            (Some(current), Some(recorded)) if current != recorded => return None,
            (Some(current), _) => Some(current),
            (None, recorded) => recorded,
        };
        // Unreachable by fall-through and not yet jumped to
        let current = depth?;
        entry_depth.insert(handle, current);

        let (pops, pushes) = stack_effect(instruction)?;
        let after = current.checked_sub(pops)? + pushes;
        max = max.max(after).max(current);

        if let Some(target) = instruction.target() {
            match entry_depth.get(&target) {
                Some(recorded) if *recorded != after => return None,
                Some(_) => {}
                None => {
                    entry_depth.insert(target, after);
                }
            }
        }
        depth = if ends_block(instruction) { None } else { Some(after) };
    }
    Some(max)
}

/// One class: its constant pool and methods
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    pub name: String,
    pub constant_pool: ConstantPool,
    pub methods: Vec<Method>,
}

impl ClassModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constant_pool: ConstantPool::new(),
            methods: Vec::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Assemble a class from its listing
    pub fn from_listing(text: &str) -> ModelResult<Self> {
        listing::parse(text)
    }

    /// Disassemble to a listing that [`ClassModel::from_listing`] accepts
    pub fn to_listing(&self) -> String {
        listing::print(self)
    }

    /// Check every method's branch targets
    pub fn validate(&self) -> ModelResult<()> {
        self.methods
            .iter()
            .try_for_each(|method| method.code.validate())
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let class = Self::from_listing(&text)?;
        debug!(
            target: "jfold::class",
            path = %path.display(),
            class = %class.name,
            methods = class.methods.len(),
            "Loaded class"
        );
        Ok(class)
    }

    /// Validate, then write through a temporary sibling file so the
    /// destination is either fully written or left as it was
    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        self.validate()?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, self.to_listing()).map_err(|e| io_error(&staging, e))?;
        if let Err(e) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(path, e));
        }
        debug!(target: "jfold::class", path = %path.display(), class = %self.name, "Saved class");
        Ok(())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ModelError {
    ModelError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
