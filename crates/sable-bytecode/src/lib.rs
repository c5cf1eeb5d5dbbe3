//! # Sable Bytecode
//!
//! This crate defines the stack bytecode consumed by the sable SSA compiler.
//!
//! ## Design Principles
//!
//! - **Stack-based**: Operations pop operands from and push results to an
//!   operand stack
//! - **Label-addressed**: Jumps name labels; each unit binds labels to offsets
//! - **Typed pool**: Operands index a shared constant pool and callers assert
//!   the payload kind they expect
//! - **Serializable**: Units derive serde so producers can cache them

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod ast;
pub mod constant;
pub mod error;
pub mod instruction;
pub mod operand;
pub mod unit;

pub use ast::{Ast, AstArg, TMP_SYMBOL, VTMP_SYMBOL};
pub use constant::{Constant, ConstantPool};
pub use error::BytecodeError;
pub use instruction::{Instruction, Opcode};
pub use operand::{AstIndex, ConstantIndex, Label, SymbolIndex};
pub use unit::{CodeBuilder, CodeUnit};
