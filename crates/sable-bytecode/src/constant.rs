//! Constant pool shared by a unit and its nested promise/closure bodies

use serde::{Deserialize, Serialize};

use crate::ast::Ast;
use crate::error::{BytecodeError, Result};
use crate::operand::{AstIndex, ConstantIndex, Label, SymbolIndex};
use crate::unit::CodeUnit;

/// A constant value in the constant pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// The null value
    Null,
    /// Logical scalar (`None` is NA)
    Logical(Option<bool>),
    /// Integer scalar (`None` is NA)
    Int(Option<i32>),
    /// Double scalar
    Real(f64),
    /// Character scalar
    Str(String),
    /// Symbol (variable or function name)
    Symbol(String),
    /// Source expression, used as a call-site descriptor
    Ast(Ast),
    /// Compiled body of a promise or closure
    Code(Box<CodeUnit>),
    /// Character vector (switch arm names)
    Strings(Vec<String>),
    /// Jump table (switch arm targets)
    LabelTable(Vec<Label>),
}

impl Constant {
    /// Short kind name used in diagnostics
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Logical(_) => "logical",
            Self::Int(_) => "integer",
            Self::Real(_) => "double",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Ast(_) => "ast",
            Self::Code(_) => "code",
            Self::Strings(_) => "strings",
            Self::LabelTable(_) => "label table",
        }
    }

    /// Create a symbol constant
    #[inline]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Get as symbol name if this is a symbol constant
    #[inline]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

/// Constant pool with deduplication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantPool {
    constants: Vec<Constant>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
        }
    }

    /// Add a constant to the pool, returns its index
    ///
    /// Deduplicates identical constants. Code bodies are never deduplicated so
    /// that every nested unit keeps its own identity.
    pub fn add(&mut self, constant: Constant) -> ConstantIndex {
        if !matches!(constant, Constant::Code(_)) {
            for (idx, existing) in self.constants.iter().enumerate() {
                if *existing == constant {
                    return ConstantIndex(idx as u32);
                }
            }
        }

        let idx = ConstantIndex(self.constants.len() as u32);
        self.constants.push(constant);
        idx
    }

    /// Add a symbol constant
    #[inline]
    pub fn add_symbol(&mut self, name: &str) -> SymbolIndex {
        SymbolIndex(self.add(Constant::symbol(name)).0)
    }

    /// Add an AST constant
    #[inline]
    pub fn add_ast(&mut self, ast: Ast) -> AstIndex {
        AstIndex(self.add(Constant::Ast(ast)).0)
    }

    /// Add a code body
    #[inline]
    pub fn add_code(&mut self, unit: CodeUnit) -> ConstantIndex {
        self.add(Constant::Code(Box::new(unit)))
    }

    /// Get a constant by index
    pub fn get(&self, index: ConstantIndex) -> Result<&Constant> {
        self.constants
            .get(index.0 as usize)
            .ok_or(BytecodeError::ConstantOutOfRange {
                index: index.0,
                len: self.constants.len(),
            })
    }

    /// Get a symbol name
    pub fn symbol(&self, index: SymbolIndex) -> Result<&str> {
        match self.get(ConstantIndex(index.0))? {
            Constant::Symbol(name) => Ok(name),
            other => Err(mismatch(index.0, "symbol", other)),
        }
    }

    /// Get an AST descriptor
    pub fn ast(&self, index: AstIndex) -> Result<&Ast> {
        match self.get(ConstantIndex(index.0))? {
            Constant::Ast(ast) => Ok(ast),
            other => Err(mismatch(index.0, "ast", other)),
        }
    }

    /// Get a nested code body
    pub fn code(&self, index: ConstantIndex) -> Result<&CodeUnit> {
        match self.get(index)? {
            Constant::Code(unit) => Ok(unit),
            other => Err(mismatch(index.0, "code", other)),
        }
    }

    /// Get a character vector
    pub fn strings(&self, index: ConstantIndex) -> Result<&[String]> {
        match self.get(index)? {
            Constant::Strings(names) => Ok(names),
            other => Err(mismatch(index.0, "strings", other)),
        }
    }

    /// Get a jump table
    pub fn label_table(&self, index: ConstantIndex) -> Result<&[Label]> {
        match self.get(index)? {
            Constant::LabelTable(labels) => Ok(labels),
            other => Err(mismatch(index.0, "label table", other)),
        }
    }

    /// Number of constants in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Check if the pool is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

fn mismatch(index: u32, expected: &'static str, found: &Constant) -> BytecodeError {
    BytecodeError::ConstantKind {
        index,
        expected,
        found: found.kind_name(),
    }
}
