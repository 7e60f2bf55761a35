//! jfold - JVM Bytecode Optimizer Library
//!
//! This library rewrites the method bodies of a JVM class to remove work
//! that can be done at compile time. It folds constant arithmetic, resolves
//! conditional branches whose outcome is known, and removes stores to local
//! variables that are never read.
//!
//! # Architecture
//!
//! The pipeline consists of two main stages:
//!
//! 1. **Class Model** (`bytecode` module)
//!    - Constant pool with numeric, string and member-reference entries
//!    - Per-method instruction lists with stable handles, so branches keep
//!      pointing at the right instruction while code is inserted and removed
//!    - A textual listing format (`javap`-like) that is parsed and printed
//!
//! 2. **Optimizer** (`optimizer` module)
//!    - Fold pass: a single forward walk simulating the operand stack and
//!      local variables, folding arithmetic, conversions and `lcmp`, and
//!      resolving forward conditional branches
//!    - Dead store pass: removes a store and its producer when the slot is
//!      never read afterwards
//!
//! # Example
//!
//! ```rust
//! use jfold::{optimize_class, ClassModel, OptimizerConfig};
//!
//! let listing = "class Sample
//! method answer ()I
//!   iconst_2
//!   iconst_3
//!   iadd
//!   ireturn
//! end
//! ";
//!
//! let mut class = ClassModel::from_listing(listing).unwrap();
//! let (_reports, stats) = optimize_class(&mut class, OptimizerConfig::default());
//!
//! assert_eq!(stats.arithmetic_folded, 1);
//! assert_eq!(class.method("answer").unwrap().code.len(), 2);
//! ```
//!
//! # Soundness
//!
//! - Only forward branches are resolved
//! - Values flowing into a branch target are forgotten at the target
//! - A division by a constant zero is left for the runtime to throw
//! - An operator the folder does not model aborts that method alone, leaving
//!   its code as it was

pub mod bytecode;
pub mod config;
pub mod error;
pub mod optimizer;

pub use bytecode::{ClassModel, ConstantPool, Instruction, InstructionHandle, InstructionList, Method};
pub use config::OptimizerConfig;
pub use error::{ConfigError, ModelError, ModelResult, OptimizeError, OptimizeResult};
pub use optimizer::{
    optimize_class, ClassOptimizer, MethodOutcome, MethodReport, OptimizationStats,
};
