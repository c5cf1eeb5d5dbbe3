//! Code units (function, promise and top-level bodies)

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::instruction::Instruction;
use crate::operand::Label;

/// A compiled body: instructions plus the label table binding jump targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Unit name (empty for anonymous bodies)
    pub name: Option<String>,

    /// Bytecode instructions
    pub instructions: Vec<Instruction>,

    /// Label id -> instruction offset
    pub labels: Vec<Option<u32>>,
}

impl CodeUnit {
    /// Create a new unit builder
    pub fn builder() -> CodeBuilder {
        CodeBuilder::new()
    }

    /// Get the unit name or `<anonymous>`
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Offset a label is bound to, if it is bound
    #[inline]
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Is the unit empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Builder for code units.
///
/// Labels are allocated up front with [`CodeBuilder::new_label`] and bound with
/// [`CodeBuilder::place_label`] to the offset of the *next* emitted
/// instruction, so a label can name the point right after a sequence whose
/// length is not known when the jump is emitted. Nothing is patched: bindings
/// are collected and checked once by [`CodeBuilder::finish`].
#[derive(Debug, Default)]
pub struct CodeBuilder {
    name: Option<String>,
    instructions: Vec<Instruction>,
    labels: Vec<Option<u32>>,
}

impl CodeBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set unit name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allocate a fresh, unplaced label
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Bind `label` to the offset of the next emitted instruction
    pub fn place_label(&mut self, label: Label) -> Result<()> {
        let slot = self
            .labels
            .get_mut(label.0 as usize)
            .ok_or(BytecodeError::UnplacedLabel(label.0))?;
        if slot.is_some() {
            return Err(BytecodeError::DuplicateLabel(label.0));
        }
        *slot = Some(self.instructions.len() as u32);
        Ok(())
    }

    /// Emit one instruction, returns its offset
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Add an instruction (chainable)
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Offset the next instruction will get
    #[inline]
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    /// Check that every label used by an instruction is placed and build the unit
    pub fn finish(self) -> Result<CodeUnit> {
        let mut used = FxHashSet::default();
        for instruction in &self.instructions {
            if let Some(label) = instruction.label() {
                used.insert(label.0);
            }
        }
        for id in used {
            if self.labels.get(id as usize).copied().flatten().is_none() {
                return Err(BytecodeError::UnplacedLabel(id));
            }
        }

        Ok(CodeUnit {
            name: self.name,
            instructions: self.instructions,
            labels: self.labels,
        })
    }
}
