//! # Sable SSA
//!
//! Compiles stack bytecode units into SSA control-flow graphs.
//!
//! ## Pipeline
//!
//! 1. **Label resolution**: one merge block per jump target
//! 2. **Translation**: a single forward pass simulating the operand stack,
//!    with phis materialized on the edges into merge blocks
//! 3. **Cleanup**: pruning of unreachable blocks and trivial phis
//!
//! Any inconsistency in the bytecode aborts compilation of the unit with a
//! [`CompileError`]; constructs outside the supported subset are reported as
//! [`ErrorKind::Unsupported`] so callers can fall back to interpretation.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod assign;
pub mod builder;
pub mod cleanup;
mod compiler;
pub mod driver;
pub mod error;
pub mod ir;
pub mod labels;
pub mod options;
pub mod protocol;
pub mod stack;

pub use driver::{ModuleError, UnitRef, compile_module, compile_unit};
pub use error::{CompileError, CompileResult, ErrorKind, Fault, Location};
pub use ir::{BasicBlock, BlockId, Cfg, Op, Phi, Stmt, Terminator, ValueId, ValueType};
pub use options::{CompileOptions, UnitKind};
