//! Constant pool
//!
//! Indexed the way the class-file format indexes it: entry 0 is unused and
//! `long`/`double` entries occupy two consecutive indices.

use std::fmt;

use super::value::ConstantValue;
use crate::error::{ModelError, ModelResult};

/// Kind of a symbolic member reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

/// One constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    /// Index 0 and the upper half of 64-bit entries
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    NameAndType { name: u16, descriptor: u16 },
    Member {
        kind: MemberKind,
        class: u16,
        name_and_type: u16,
    },
}

impl PoolEntry {
    /// Number of indices the entry occupies
    pub fn width(&self) -> usize {
        match self {
            PoolEntry::Long(_) | PoolEntry::Double(_) => 2,
            _ => 1,
        }
    }

    fn as_number(&self) -> Option<ConstantValue> {
        match *self {
            PoolEntry::Integer(v) => Some(ConstantValue::Int(v)),
            PoolEntry::Long(v) => Some(ConstantValue::Long(v)),
            PoolEntry::Float(v) => Some(ConstantValue::Float(v)),
            PoolEntry::Double(v) => Some(ConstantValue::Double(v)),
            _ => None,
        }
    }
}

impl From<ConstantValue> for PoolEntry {
    fn from(value: ConstantValue) -> Self {
        match value {
            ConstantValue::Int(v) => PoolEntry::Integer(v),
            ConstantValue::Long(v) => PoolEntry::Long(v),
            ConstantValue::Float(v) => PoolEntry::Float(v),
            ConstantValue::Double(v) => PoolEntry::Double(v),
        }
    }
}

impl fmt::Display for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolEntry::Unusable => write!(f, "unusable"),
            PoolEntry::Utf8(s) => write!(f, "utf8 {:?}", s),
            PoolEntry::Integer(v) => write!(f, "int {}", v),
            PoolEntry::Float(v) => write!(f, "float {:?}", v),
            PoolEntry::Long(v) => write!(f, "long {}", v),
            PoolEntry::Double(v) => write!(f, "double {:?}", v),
            PoolEntry::Class(name) => write!(f, "class #{}", name),
            PoolEntry::String(utf8) => write!(f, "string #{}", utf8),
            PoolEntry::NameAndType { name, descriptor } => {
                write!(f, "nameandtype #{} #{}", name, descriptor)
            }
            PoolEntry::Member {
                kind,
                class,
                name_and_type,
            } => {
                let tag = match kind {
                    MemberKind::Field => "fieldref",
                    MemberKind::Method => "methodref",
                    MemberKind::InterfaceMethod => "interfacemethodref",
                };
                write!(f, "{} #{} #{}", tag, class, name_and_type)
            }
        }
    }
}

/// Constant pool with "add value, get index" insertion
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool (only the unusable entry 0)
    pub fn new() -> Self {
        Self {
            entries: vec![PoolEntry::Unusable],
        }
    }

    /// Pool count as written in a class file (highest index + 1)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&PoolEntry> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Unusable) | None => None,
            Some(entry) => Some(entry),
        }
    }

    /// Resolve an index to a numeric value
    pub fn number(&self, index: u16) -> Option<ConstantValue> {
        self.get(index).and_then(PoolEntry::as_number)
    }

    /// Usable entries with their indices, in index order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &PoolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !matches!(entry, PoolEntry::Unusable))
            .map(|(i, entry)| (i as u16, entry))
    }

    /// Append an entry without deduplication, returns its index
    pub fn push(&mut self, entry: PoolEntry) -> ModelResult<u16> {
        let index = self.entries.len();
        if index + entry.width() > u16::MAX as usize {
            return Err(ModelError::PoolOverflow);
        }
        let width = entry.width();
        self.entries.push(entry);
        if width == 2 {
            self.entries.push(PoolEntry::Unusable);
        }
        Ok(index as u16)
    }

    /// Add a numeric constant, reusing an existing entry with the same bits
    pub fn add(&mut self, value: ConstantValue) -> ModelResult<u16> {
        if let Some(index) = self.find_number(value) {
            return Ok(index);
        }
        self.push(PoolEntry::from(value))
    }

    pub fn add_integer(&mut self, value: i32) -> ModelResult<u16> {
        self.add(ConstantValue::Int(value))
    }

    pub fn add_long(&mut self, value: i64) -> ModelResult<u16> {
        self.add(ConstantValue::Long(value))
    }

    pub fn add_float(&mut self, value: f32) -> ModelResult<u16> {
        self.add(ConstantValue::Float(value))
    }

    pub fn add_double(&mut self, value: f64) -> ModelResult<u16> {
        self.add(ConstantValue::Double(value))
    }

    /// Add a UTF-8 entry, reusing an identical one
    pub fn add_utf8(&mut self, text: &str) -> ModelResult<u16> {
        let existing = self
            .iter()
            .find(|(_, entry)| matches!(entry, PoolEntry::Utf8(s) if s == text))
            .map(|(index, _)| index);
        match existing {
            Some(index) => Ok(index),
            None => self.push(PoolEntry::Utf8(text.to_string())),
        }
    }

    /// Add a string literal (UTF-8 entry plus `String` entry)
    pub fn add_string(&mut self, text: &str) -> ModelResult<u16> {
        let utf8 = self.add_utf8(text)?;
        let existing = self
            .iter()
            .find(|(_, entry)| **entry == PoolEntry::String(utf8))
            .map(|(index, _)| index);
        match existing {
            Some(index) => Ok(index),
            None => self.push(PoolEntry::String(utf8)),
        }
    }

    fn find_number(&self, value: ConstantValue) -> Option<u16> {
        self.iter()
            .find(|(_, entry)| entry.as_number() == Some(value))
            .map(|(index, _)| index)
    }
}
