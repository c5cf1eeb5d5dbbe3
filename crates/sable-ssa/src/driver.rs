//! Entry points

use std::collections::BTreeMap;
use std::fmt;

use sable_bytecode::{CodeUnit, ConstantIndex, ConstantPool};
use thiserror::Error;

use crate::compiler::Compiler;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Cfg, Op};
use crate::options::{CompileOptions, UnitKind};

/// Compile one unit to an SSA graph
pub fn compile_unit(
    unit: &CodeUnit,
    pool: &ConstantPool,
    options: CompileOptions,
) -> CompileResult<Cfg> {
    Compiler::new(unit, pool, options)?.compile()
}

/// Identity of a unit within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitRef {
    /// The unit passed to [`compile_module`]
    Root,
    /// A `Code` constant of the pool
    Pool(ConstantIndex),
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root unit"),
            Self::Pool(idx) => write!(f, "unit #{}", idx.index()),
        }
    }
}

/// Compilation failure in one unit of a module
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{unit}: {error}")]
pub struct ModuleError {
    /// Failing unit
    pub unit: UnitRef,
    /// Underlying error
    pub error: CompileError,
}

/// Compile `root` and every promise and closure body reachable from it.
///
/// Each unit is compiled once, independently of the others: promise bodies
/// as [`UnitKind::Promise`], closure bodies as [`UnitKind::Function`]. The
/// root keeps the kind set in `options`.
pub fn compile_module(
    root: &CodeUnit,
    pool: &ConstantPool,
    options: CompileOptions,
) -> Result<BTreeMap<UnitRef, Cfg>, ModuleError> {
    let mut compiled = BTreeMap::new();
    let mut worklist = vec![(UnitRef::Root, root, options.unit_kind)];

    while let Some((unit_ref, unit, kind)) = worklist.pop() {
        if compiled.contains_key(&unit_ref) {
            continue;
        }
        let cfg = compile_unit(unit, pool, options.unit_kind(kind)).map_err(|error| {
            ModuleError {
                unit: unit_ref,
                error,
            }
        })?;

        for (_, stmt) in cfg.stmts() {
            let (code, kind) = match stmt.op {
                Op::MkPromise { code } => (code, UnitKind::Promise),
                Op::MkClosure { closure } => (closure, UnitKind::Function),
                _ => continue,
            };
            let nested = UnitRef::Pool(code);
            if compiled.contains_key(&nested) {
                continue;
            }
            // Checked when the statement was emitted
            if let Ok(body) = pool.code(code) {
                worklist.push((nested, body, kind));
            }
        }

        tracing::debug!(target: "sable::ssa", unit = %unit_ref, "unit done");
        compiled.insert(unit_ref, cfg);
    }

    Ok(compiled)
}
