//! Typed instruction model
//!
//! One closed enum covers every instruction the optimizer reasons about.
//! Everything it does not model is carried as [`Instruction::Other`] with its
//! opcode and raw operands, so the stream can always be written back.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use super::list::InstructionHandle;
use super::opcodes::Opcode;
use super::pool::ConstantPool;
use super::value::{ConstantValue, LocalKind, NumericKind};
use crate::error::ModelResult;

/// Encoded forms of a constant push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// `iconst_m1` .. `iconst_5`
    IConst(i8),
    /// `lconst_0`, `lconst_1`
    LConst(u8),
    /// `fconst_0` .. `fconst_2`
    FConst(u8),
    /// `dconst_0`, `dconst_1`
    DConst(u8),
    BiPush(i8),
    SiPush(i16),
    Ldc(u16),
    LdcW(u16),
    Ldc2W(u16),
}

impl Push {
    /// Synthesize the push for a folded result.
    ///
    /// Ints in `[0, 5]` use the immediate `iconst_<n>` form; every other
    /// value is added to the pool and loaded by index.
    pub fn for_value(value: ConstantValue, pool: &mut ConstantPool) -> ModelResult<Push> {
        match value {
            ConstantValue::Int(v) if (0..=5).contains(&v) => Ok(Push::IConst(v as i8)),
            ConstantValue::Int(_) | ConstantValue::Float(_) => {
                let index = pool.add(value)?;
                if index <= u8::MAX as u16 {
                    Ok(Push::Ldc(index))
                } else {
                    Ok(Push::LdcW(index))
                }
            }
            ConstantValue::Long(_) | ConstantValue::Double(_) => Ok(Push::Ldc2W(pool.add(value)?)),
        }
    }

    /// Value pushed, or `None` for a pool entry that is not numeric
    /// (`ldc` of a string or class literal)
    pub fn value(&self, pool: &ConstantPool) -> Option<ConstantValue> {
        match *self {
            Push::IConst(v) => Some(ConstantValue::Int(v as i32)),
            Push::LConst(v) => Some(ConstantValue::Long(v as i64)),
            Push::FConst(v) => Some(ConstantValue::Float(v as f32)),
            Push::DConst(v) => Some(ConstantValue::Double(v as f64)),
            Push::BiPush(v) => Some(ConstantValue::Int(v as i32)),
            Push::SiPush(v) => Some(ConstantValue::Int(v as i32)),
            Push::Ldc(index) | Push::LdcW(index) | Push::Ldc2W(index) => pool.number(index),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match *self {
            Push::IConst(v) => offset_opcode(Opcode::Iconst0, v as i32),
            Push::LConst(v) => offset_opcode(Opcode::Lconst0, v as i32),
            Push::FConst(v) => offset_opcode(Opcode::Fconst0, v as i32),
            Push::DConst(v) => offset_opcode(Opcode::Dconst0, v as i32),
            Push::BiPush(_) => Opcode::Bipush,
            Push::SiPush(_) => Opcode::Sipush,
            Push::Ldc(_) => Opcode::Ldc,
            Push::LdcW(_) => Opcode::LdcW,
            Push::Ldc2W(_) => Opcode::Ldc2W,
        }
    }
}

/// Binary and unary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl ArithOp {
    /// Number of stack operands consumed
    pub fn arity(self) -> usize {
        match self {
            ArithOp::Neg => 1,
            _ => 2,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "rem",
            ArithOp::Neg => "neg",
            ArithOp::Shl => "shl",
            ArithOp::Shr => "shr",
            ArithOp::Ushr => "ushr",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Xor => "xor",
        }
    }
}

/// `i2b`, `i2c`, `i2s`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Narrowing {
    Byte,
    Char,
    Short,
}

/// Comparison relation of a conditional branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Relation {
    /// Whether `ordering` (first operand compared to second) satisfies the relation
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Relation::Eq => ordering == Ordering::Equal,
            Relation::Ne => ordering != Ordering::Equal,
            Relation::Lt => ordering == Ordering::Less,
            Relation::Ge => ordering != Ordering::Less,
            Relation::Gt => ordering == Ordering::Greater,
            Relation::Le => ordering != Ordering::Greater,
        }
    }

    fn index(self) -> i32 {
        match self {
            Relation::Eq => 0,
            Relation::Ne => 1,
            Relation::Lt => 2,
            Relation::Ge => 3,
            Relation::Gt => 4,
            Relation::Le => 5,
        }
    }
}

/// Condition under which a conditional branch jumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `if<rel>`: one int compared against zero
    Zero(Relation),
    /// `if_icmp<rel>`: two ints
    IntCompare(Relation),
    /// `if_acmpeq` (`true`) / `if_acmpne` (`false`)
    RefEqual(bool),
    /// `ifnull` (`true`) / `ifnonnull` (`false`)
    Null(bool),
}

impl Condition {
    /// Number of stack operands consumed
    pub fn arity(self) -> usize {
        match self {
            Condition::Zero(_) | Condition::Null(_) => 1,
            Condition::IntCompare(_) | Condition::RefEqual(_) => 2,
        }
    }

    pub fn opcode(self) -> Opcode {
        match self {
            Condition::Zero(rel) => offset_opcode(Opcode::Ifeq, rel.index()),
            Condition::IntCompare(rel) => offset_opcode(Opcode::IfIcmpeq, rel.index()),
            Condition::RefEqual(true) => Opcode::IfAcmpeq,
            Condition::RefEqual(false) => Opcode::IfAcmpne,
            Condition::Null(true) => Opcode::Ifnull,
            Condition::Null(false) => Opcode::Ifnonnull,
        }
    }
}

/// One bytecode instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Constant push
    Push(Push),
    /// Load from a local slot
    Load { kind: LocalKind, slot: u16 },
    /// Store to a local slot
    Store { kind: LocalKind, slot: u16 },
    Arithmetic { kind: NumericKind, op: ArithOp },
    Convert { from: NumericKind, to: NumericKind },
    Narrow(Narrowing),
    /// `lcmp`: three-way long comparison
    CompareLong,
    /// Conditional branch
    If {
        condition: Condition,
        target: InstructionHandle,
    },
    /// Unconditional branch (`goto`, `goto_w`)
    Goto { target: InstructionHandle },
    /// `iinc`
    Increment { slot: u16, delta: i16 },
    /// Anything the optimizer does not model
    Other {
        opcode: Opcode,
        operands: SmallVec<[i32; 2]>,
    },
}

impl Instruction {
    /// Operand-less instruction of an unmodeled opcode
    pub fn other(opcode: Opcode) -> Self {
        Instruction::Other {
            opcode,
            operands: SmallVec::new(),
        }
    }

    /// Branch target, if this instruction is a branch
    pub fn target(&self) -> Option<InstructionHandle> {
        match self {
            Instruction::If { target, .. } | Instruction::Goto { target } => Some(*target),
            _ => None,
        }
    }

    /// Point this branch at a new target; no-op for non-branches
    pub fn set_target(&mut self, new_target: InstructionHandle) {
        match self {
            Instruction::If { target, .. } | Instruction::Goto { target } => *target = new_target,
            _ => {}
        }
    }

    /// Opcode of the shortest encoding
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Push(push) => push.opcode(),
            Instruction::Load { kind, slot } => local_opcode(*kind, *slot, false),
            Instruction::Store { kind, slot } => local_opcode(*kind, *slot, true),
            Instruction::Arithmetic { kind, op } => {
                let mnemonic = format!("{}{}", kind.prefix(), op.suffix());
                Opcode::from_mnemonic(&mnemonic).unwrap_or(Opcode::Nop)
            }
            Instruction::Convert { from, to } => {
                let mnemonic = format!("{}2{}", from.prefix(), to.prefix());
                Opcode::from_mnemonic(&mnemonic).unwrap_or(Opcode::Nop)
            }
            Instruction::Narrow(Narrowing::Byte) => Opcode::I2b,
            Instruction::Narrow(Narrowing::Char) => Opcode::I2c,
            Instruction::Narrow(Narrowing::Short) => Opcode::I2s,
            Instruction::CompareLong => Opcode::Lcmp,
            Instruction::If { condition, .. } => condition.opcode(),
            Instruction::Goto { .. } => Opcode::Goto,
            Instruction::Increment { .. } => Opcode::Iinc,
            Instruction::Other { opcode, .. } => *opcode,
        }
    }

    /// Encoded length in bytes, `wide` prefix included
    pub fn encoded_len(&self) -> usize {
        match self {
            Instruction::Push(push) => 1 + push.opcode().operand_len(),
            Instruction::Load { slot, .. } | Instruction::Store { slot, .. } => match *slot {
                0..=3 => 1,
                4..=255 => 2,
                _ => 4,
            },
            Instruction::Increment { slot, delta } => {
                if *slot <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                    3
                } else {
                    6
                }
            }
            Instruction::Other { opcode, .. } => 1 + opcode.operand_len(),
            _ => 1 + self.opcode().operand_len(),
        }
    }

    /// Whether this instruction is a numeric constant push or a load of a
    /// numeric local, i.e. a producer with no side effects
    pub fn is_numeric_producer(&self, pool: &ConstantPool) -> bool {
        match self {
            Instruction::Push(push) => push.value(pool).is_some(),
            Instruction::Load { kind, .. } => kind.numeric().is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();
        match self {
            Instruction::Push(Push::BiPush(v)) => write!(f, "{} {}", opcode, v),
            Instruction::Push(Push::SiPush(v)) => write!(f, "{} {}", opcode, v),
            Instruction::Push(Push::Ldc(i) | Push::LdcW(i) | Push::Ldc2W(i)) => {
                write!(f, "{} #{}", opcode, i)
            }
            Instruction::Load { slot, .. } | Instruction::Store { slot, .. } if *slot > 3 => {
                write!(f, "{} {}", opcode, slot)
            }
            Instruction::If { target, .. } | Instruction::Goto { target } => {
                write!(f, "{} {}", opcode, target)
            }
            Instruction::Increment { slot, delta } => write!(f, "{} {} {}", opcode, slot, delta),
            Instruction::Other { opcode, operands } => {
                write!(f, "{}", opcode)?;
                for (i, operand) in operands.iter().enumerate() {
                    if i == 0 && opcode.references_pool() {
                        write!(f, " #{}", operand)?;
                    } else {
                        write!(f, " {}", operand)?;
                    }
                }
                Ok(())
            }
            _ => write!(f, "{}", opcode),
        }
    }
}

fn offset_opcode(base: Opcode, offset: i32) -> Opcode {
    Opcode::from_byte((base.to_byte() as i32 + offset) as u8).unwrap_or(Opcode::Nop)
}

fn local_opcode(kind: LocalKind, slot: u16, store: bool) -> Opcode {
    let kind_index = match kind {
        LocalKind::Numeric(NumericKind::Int) => 0,
        LocalKind::Numeric(NumericKind::Long) => 1,
        LocalKind::Numeric(NumericKind::Float) => 2,
        LocalKind::Numeric(NumericKind::Double) => 3,
        LocalKind::Reference => 4,
    };
    let (long_form, short_form) = if store {
        (Opcode::Istore, Opcode::Istore0)
    } else {
        (Opcode::Iload, Opcode::Iload0)
    };
    if slot <= 3 {
        offset_opcode(short_form, kind_index * 4 + slot as i32)
    } else {
        offset_opcode(long_form, kind_index)
    }
}
