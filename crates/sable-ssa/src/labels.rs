//! Label resolution and block allocation.
//!
//! Runs once over the whole unit before translation: every offset named by a
//! label operand (or a switch jump table) gets exactly one merge block.

use rustc_hash::FxHashMap;
use sable_bytecode::{CodeUnit, ConstantPool, Instruction, Label};

use crate::builder::Builder;
use crate::error::Fault;
use crate::ir::BlockId;

/// Offset -> block map for one unit
#[derive(Debug, Default)]
pub struct LabelMap {
    by_offset: FxHashMap<u32, BlockId>,
    by_label: FxHashMap<Label, u32>,
}

impl LabelMap {
    /// Allocate blocks for every jump target in `unit`.
    ///
    /// On failure returns the offset of the offending instruction with the fault.
    pub fn resolve(
        unit: &CodeUnit,
        pool: &ConstantPool,
        builder: &mut Builder,
    ) -> Result<Self, (usize, Fault)> {
        let mut map = Self::default();
        for (pc, instruction) in unit.instructions.iter().enumerate() {
            for label in targets(instruction, pool).map_err(|fault| (pc, fault))? {
                map.bind(unit, label, builder).map_err(|fault| (pc, fault))?;
            }
        }
        tracing::trace!(
            target: "sable::ssa",
            unit = unit.display_name(),
            blocks = map.by_offset.len(),
            "labels resolved"
        );
        Ok(map)
    }

    fn bind(&mut self, unit: &CodeUnit, label: Label, builder: &mut Builder) -> Result<(), Fault> {
        let offset = unit
            .label_offset(label)
            .filter(|offset| (*offset as usize) < unit.len())
            .ok_or(Fault::BadLabel {
                label,
                offset: unit.label_offset(label),
            })?;
        self.by_label.insert(label, offset);
        self.by_offset
            .entry(offset)
            .or_insert_with(|| builder.new_merge_block());
        Ok(())
    }

    /// Block for a resolved label
    pub fn block(&self, label: Label) -> Result<BlockId, Fault> {
        self.by_label
            .get(&label)
            .and_then(|offset| self.by_offset.get(offset))
            .copied()
            .ok_or(Fault::BadLabel {
                label,
                offset: None,
            })
    }

    /// Block starting at `offset`, if some label targets it
    pub fn block_at(&self, offset: usize) -> Option<BlockId> {
        u32::try_from(offset)
            .ok()
            .and_then(|offset| self.by_offset.get(&offset))
            .copied()
    }

    /// Number of allocated blocks
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Were no blocks allocated
    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

/// Every label an instruction may transfer control to
fn targets(instruction: &Instruction, pool: &ConstantPool) -> Result<Vec<Label>, Fault> {
    let mut labels: Vec<Label> = instruction.label().into_iter().collect();
    if let Instruction::Switch {
        chr_labels,
        num_labels,
        ..
    } = instruction
    {
        if let Some(chr) = chr_labels {
            labels.extend_from_slice(pool.label_table(*chr)?);
        }
        labels.extend_from_slice(pool.label_table(*num_labels)?);
    }
    Ok(labels)
}
