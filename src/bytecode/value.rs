//! Compile-time constant values and the numeric kinds they belong to.

use std::fmt;

/// Numeric computational types of the JVM operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumericKind {
    /// Number of local-variable slots (and stack words) a value occupies
    pub fn width(self) -> u16 {
        match self {
            NumericKind::Long | NumericKind::Double => 2,
            NumericKind::Int | NumericKind::Float => 1,
        }
    }

    /// Mnemonic prefix (`i`, `l`, `f`, `d`)
    pub fn prefix(self) -> char {
        match self {
            NumericKind::Int => 'i',
            NumericKind::Long => 'l',
            NumericKind::Float => 'f',
            NumericKind::Double => 'd',
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericKind::Int => "int",
            NumericKind::Long => "long",
            NumericKind::Float => "float",
            NumericKind::Double => "double",
        };
        write!(f, "{}", name)
    }
}

/// Type of a local-variable load or store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    Numeric(NumericKind),
    Reference,
}

impl LocalKind {
    pub fn width(self) -> u16 {
        match self {
            LocalKind::Numeric(kind) => kind.width(),
            LocalKind::Reference => 1,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            LocalKind::Numeric(kind) => kind.prefix(),
            LocalKind::Reference => 'a',
        }
    }

    /// Numeric kind, or `None` for references
    pub fn numeric(self) -> Option<NumericKind> {
        match self {
            LocalKind::Numeric(kind) => Some(kind),
            LocalKind::Reference => None,
        }
    }
}

/// A numeric value known at compile time
///
/// Conversions between kinds follow `java.lang.Number` semantics: integer
/// narrowing keeps the low-order bits, float-to-integer conversion rounds
/// toward zero and saturates, NaN converts to zero. Rust `as` casts have
/// exactly these semantics.
///
/// Equality compares floating-point values by bit pattern, so `NaN == NaN`
/// and `0.0 != -0.0`.
#[derive(Debug, Clone, Copy)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl ConstantValue {
    pub fn kind(&self) -> NumericKind {
        match self {
            ConstantValue::Int(_) => NumericKind::Int,
            ConstantValue::Long(_) => NumericKind::Long,
            ConstantValue::Float(_) => NumericKind::Float,
            ConstantValue::Double(_) => NumericKind::Double,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match *self {
            ConstantValue::Int(v) => v,
            ConstantValue::Long(v) => v as i32,
            ConstantValue::Float(v) => v as i32,
            ConstantValue::Double(v) => v as i32,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            ConstantValue::Int(v) => v as i64,
            ConstantValue::Long(v) => v,
            ConstantValue::Float(v) => v as i64,
            ConstantValue::Double(v) => v as i64,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match *self {
            ConstantValue::Int(v) => v as f32,
            ConstantValue::Long(v) => v as f32,
            ConstantValue::Float(v) => v,
            ConstantValue::Double(v) => v as f32,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            ConstantValue::Int(v) => v as f64,
            ConstantValue::Long(v) => v as f64,
            ConstantValue::Float(v) => v as f64,
            ConstantValue::Double(v) => v,
        }
    }

    /// Convert to another numeric kind
    pub fn convert(&self, to: NumericKind) -> ConstantValue {
        match to {
            NumericKind::Int => ConstantValue::Int(self.as_i32()),
            NumericKind::Long => ConstantValue::Long(self.as_i64()),
            NumericKind::Float => ConstantValue::Float(self.as_f32()),
            NumericKind::Double => ConstantValue::Double(self.as_f64()),
        }
    }

    /// Whether the value is zero of its own kind (either sign for floats)
    pub fn is_zero(&self) -> bool {
        match *self {
            ConstantValue::Int(v) => v == 0,
            ConstantValue::Long(v) => v == 0,
            ConstantValue::Float(v) => v == 0.0,
            ConstantValue::Double(v) => v == 0.0,
        }
    }

    /// Parse a listing literal: `5`, `5L`, `1.5f`, `2.5d`, `2.5`
    pub fn parse_literal(text: &str) -> Option<ConstantValue> {
        if let Some(digits) = text.strip_suffix(['L', 'l']) {
            return digits.parse().ok().map(ConstantValue::Long);
        }
        if let Some(digits) = text.strip_suffix(['f', 'F']) {
            return digits.parse().ok().map(ConstantValue::Float);
        }
        if let Some(digits) = text.strip_suffix(['d', 'D']) {
            return digits.parse().ok().map(ConstantValue::Double);
        }
        if let Ok(v) = text.parse::<i32>() {
            return Some(ConstantValue::Int(v));
        }
        text.parse().ok().map(ConstantValue::Double)
    }
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstantValue::Int(a), ConstantValue::Int(b)) => a == b,
            (ConstantValue::Long(a), ConstantValue::Long(b)) => a == b,
            (ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::Double(a), ConstantValue::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for ConstantValue {}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{}", v),
            ConstantValue::Long(v) => write!(f, "{}L", v),
            ConstantValue::Float(v) => write!(f, "{:?}f", v),
            ConstantValue::Double(v) => write!(f, "{:?}d", v),
        }
    }
}
