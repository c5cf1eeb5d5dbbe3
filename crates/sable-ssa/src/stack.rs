//! Virtual operand stack.
//!
//! Mirrors the interpreter's operand stack at compile time, holding the SSA
//! value that occupies each slot. Its depth at any offset equals the
//! interpreter's depth at that offset.

use std::fmt;

use crate::error::Fault;
use crate::ir::ValueId;

/// Compile-time operand stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualStack {
    slots: Vec<ValueId>,
}

impl VirtualStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value
    #[inline]
    pub fn push(&mut self, value: ValueId) {
        self.slots.push(value);
    }

    /// Pop the top value
    #[inline]
    pub fn pop(&mut self) -> Result<ValueId, Fault> {
        self.slots.pop().ok_or(Fault::StackUnderflow)
    }

    /// Top value
    #[inline]
    pub fn peek(&self) -> Result<ValueId, Fault> {
        self.peek_nth(0)
    }

    /// Value `n` slots below the top
    pub fn peek_nth(&self, n: usize) -> Result<ValueId, Fault> {
        self.slots
            .len()
            .checked_sub(n + 1)
            .map(|i| self.slots[i])
            .ok_or(Fault::StackUnderflow)
    }

    /// Pop the top `n` values, returned bottom first
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<ValueId>, Fault> {
        let start = self
            .slots
            .len()
            .checked_sub(n)
            .ok_or(Fault::StackUnderflow)?;
        Ok(self.slots.split_off(start))
    }

    /// Replace the top value
    pub fn replace_top(&mut self, value: ValueId) -> Result<ValueId, Fault> {
        let top = self.slots.last_mut().ok_or(Fault::StackUnderflow)?;
        Ok(std::mem::replace(top, value))
    }

    /// Exchange the two top values
    pub fn swap(&mut self) -> Result<(), Fault> {
        let len = self.slots.len();
        if len < 2 {
            return Err(Fault::StackUnderflow);
        }
        self.slots.swap(len - 1, len - 2);
        Ok(())
    }

    /// Replace the whole contents (block entry)
    pub fn reset(&mut self, slots: &[ValueId]) {
        self.slots.clear();
        self.slots.extend_from_slice(slots);
    }

    /// Current depth
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Is the stack empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots, bottom first
    #[inline]
    pub fn as_slice(&self) -> &[ValueId] {
        &self.slots
    }
}

impl fmt::Display for VirtualStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}
