//! JVM bytecode model
//!
//! This module provides the class model the optimizer works on:
//!
//! - `opcodes`: the JVM opcode table
//! - `value`: numeric kinds and compile-time constant values
//! - `instruction`: the typed instruction enum
//! - `list`: editable instruction sequence with stable handles
//! - `pool`: constant pool
//! - `class`: classes, methods and their limits
//! - `listing`: text assembler and disassembler

pub mod class;
pub mod instruction;
pub mod list;
pub mod listing;
pub mod opcodes;
pub mod pool;
pub mod value;

pub use class::{ClassModel, Method};
pub use instruction::{ArithOp, Condition, Instruction, Narrowing, Push, Relation};
pub use list::{InstructionHandle, InstructionList, LostTarget, Retarget};
pub use opcodes::Opcode;
pub use pool::{ConstantPool, MemberKind, PoolEntry};
pub use value::{ConstantValue, LocalKind, NumericKind};
