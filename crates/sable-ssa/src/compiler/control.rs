//! Conditional branches, short-circuit logic and `switch`

use sable_bytecode::{AstIndex, ConstantIndex, Label};

use super::Compiler;
use crate::error::Fault;
use crate::ir::{BlockId, CallSite, Op, TypeTest, ValueId};

impl Compiler<'_> {
    /// `BrIfNot`: fall through when the condition holds, else jump to `label`
    pub(super) fn branch_if_not(&mut self, call: AstIndex, label: Label) -> Result<(), Fault> {
        let cond = self.stack.pop()?;
        let call = self.site(call)?;
        let test = self.builder.emit(Op::AsTest { arg: cond, call });
        let target = self.labels.block(label)?;
        let next = self.builder.new_direct_block();
        self.branch(test, next, target)?;
        self.enter(next)
    }

    /// `And1st`/`Or1st`: coerce the first operand and skip the second when
    /// it already decides the result. The coerced value stays on the stack
    /// as the result of the skipped path.
    pub(super) fn short_circuit_first(
        &mut self,
        call: AstIndex,
        label: Label,
        and: bool,
    ) -> Result<(), Fault> {
        let value = self.stack.pop()?;
        let call = self.site(call)?;
        let logical = self.push_op(Op::AsLogical { arg: value, call });
        let decided = if and {
            self.builder.emit(Op::IsFalse { arg: logical })
        } else {
            self.builder.emit(Op::IsTrue { arg: logical })
        };
        let target = self.labels.block(label)?;
        let next = self.builder.new_direct_block();
        self.branch(decided, target, next)?;
        self.enter(next)
    }

    /// `And2nd`/`Or2nd`: combine the coerced first operand with the second
    pub(super) fn short_circuit_second(&mut self, call: AstIndex, and: bool) -> Result<(), Fault> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        let call = self.site(call)?;
        let rhs = self.builder.emit(Op::AsLogical { arg: rhs, call });
        if and {
            self.push_op(Op::LogicalAnd { lhs, rhs });
        } else {
            self.push_op(Op::LogicalOr { lhs, rhs });
        }
        Ok(())
    }

    /// `Switch`: character subjects test arm names in order, anything else
    /// selects an arm by number. Both chains end in their default target.
    pub(super) fn switch(
        &mut self,
        call: AstIndex,
        names: Option<ConstantIndex>,
        chr_labels: Option<ConstantIndex>,
        num_labels: ConstantIndex,
    ) -> Result<(), Fault> {
        let subject = self.stack.pop()?;
        let site = self.site(call)?;
        let num_targets = self.switch_targets(num_labels)?;

        match (names, chr_labels) {
            (None, None) => self.numeric_chain(subject, site, &num_targets),
            (Some(names), Some(chr_labels)) => {
                let names = self.pool.strings(names)?.to_vec();
                let chr_targets = self.switch_targets(chr_labels)?;
                if chr_targets.len() != names.len() + 1 {
                    return Err(Fault::invalid(format!(
                        "switch has {} names but {} character targets",
                        names.len(),
                        chr_targets.len()
                    )));
                }

                let is_chr = self.builder.emit(Op::IsType {
                    test: TypeTest::Character,
                    arg: subject,
                });
                let test = self.builder.emit(Op::AsTest {
                    arg: is_chr,
                    call: site.clone(),
                });
                let chr_block = self.builder.new_direct_block();
                let num_block = self.builder.new_direct_block();
                self.branch(test, chr_block, num_block)?;

                self.enter(chr_block)?;
                self.string_chain(subject, &names, &chr_targets)?;
                self.enter(num_block)?;
                self.numeric_chain(subject, site, &num_targets)
            }
            _ => Err(Fault::invalid(
                "switch names and character targets must be given together",
            )),
        }
    }

    fn switch_targets(&self, table: ConstantIndex) -> Result<Vec<BlockId>, Fault> {
        let targets = self
            .pool
            .label_table(table)?
            .iter()
            .map(|label| self.labels.block(*label))
            .collect::<Result<Vec<_>, _>>()?;
        if targets.is_empty() {
            return Err(Fault::invalid("switch jump table has no default target"));
        }
        Ok(targets)
    }

    /// `targets` holds one block per name plus a trailing default
    fn string_chain(
        &mut self,
        subject: ValueId,
        names: &[String],
        targets: &[BlockId],
    ) -> Result<(), Fault> {
        for (name, target) in names.iter().zip(targets) {
            let test = self.builder.emit(Op::StrEq {
                arg: subject,
                name: name.clone(),
            });
            let next = self.builder.new_direct_block();
            self.branch(test, *target, next)?;
            self.enter(next)?;
        }
        self.jump(targets[names.len()])
    }

    /// `targets` holds one block per arm plus a trailing default
    fn numeric_chain(
        &mut self,
        subject: ValueId,
        call: CallSite,
        targets: &[BlockId],
    ) -> Result<(), Fault> {
        let Some((default, arms)) = targets.split_last() else {
            return Err(Fault::invalid("switch jump table has no default target"));
        };
        let index = self.builder.emit(Op::SwitchIndex { arg: subject, call });
        for (i, target) in arms.iter().enumerate() {
            let arm = self.builder.emit(Op::IndexConst(i as u32 + 1));
            let test = self.builder.emit(Op::IndexEq {
                lhs: index,
                rhs: arm,
            });
            let next = self.builder.new_direct_block();
            self.branch(test, *target, next)?;
            self.enter(next)?;
        }
        self.jump(*default)
    }
}
