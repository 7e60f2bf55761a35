//! Error types for the class model, the optimizer and configuration loading.

use crate::bytecode::InstructionHandle;

/// Failures raised by the class model (instruction list, constant pool,
/// listing reader/writer)
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Removed instruction is a branch target and has no successor to take over
    TargetLost { instruction: InstructionHandle },
    /// Range bounds are dead or out of program order
    InvalidRange {
        from: InstructionHandle,
        to: InstructionHandle,
    },
    /// Handle does not name a live instruction
    StaleHandle(InstructionHandle),
    /// A branch still points at a removed instruction
    DanglingTarget {
        referrer: InstructionHandle,
        target: InstructionHandle,
    },
    /// Constant pool index is missing or has the wrong kind
    UnknownConstant(u16),
    /// Constant pool is full
    PoolOverflow,
    /// Malformed listing
    Parse { line: usize, message: String },
    /// Reading or writing a listing failed
    Io { path: String, message: String },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetLost { instruction } => {
                write!(
                    f,
                    "Branch target {} removed with no following instruction",
                    instruction
                )
            }
            Self::InvalidRange { from, to } => {
                write!(f, "Invalid instruction range {}..={}", from, to)
            }
            Self::StaleHandle(handle) => write!(f, "Instruction {} is not live", handle),
            Self::DanglingTarget { referrer, target } => {
                write!(
                    f,
                    "Branch at {} targets removed instruction {}",
                    referrer, target
                )
            }
            Self::UnknownConstant(index) => write!(f, "No numeric constant at #{}", index),
            Self::PoolOverflow => write!(f, "Constant pool overflow (max 65535 entries)"),
            Self::Parse { line, message } => write!(f, "Line {}: {}", line, message),
            Self::Io { path, message } => write!(f, "{}: {}", path, message),
        }
    }
}

impl std::error::Error for ModelError {}

/// Result type for class model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Failures raised while optimizing a method
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// Operator the folder does not model; aborts the method
    UnsupportedOperation(String),
    /// Local slot has no compile-time value
    UnboundVariable { slot: u16 },
    /// Underlying model operation failed
    Model(ModelError),
}

impl std::fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedOperation(op) => write!(f, "Unsupported operation: {}", op),
            Self::UnboundVariable { slot } => write!(f, "Unbound variable in slot {}", slot),
            Self::Model(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for OptimizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for OptimizeError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

/// Result type for optimization
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// Failures loading an optimizer configuration file
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "Failed to read config '{}': {}", path, message)
            }
            Self::Parse(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
