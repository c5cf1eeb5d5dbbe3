//! Post-translation cleanup.
//!
//! Translation materializes a phi for every stack slot of every merge block
//! and leaves behind blocks that only dead code jumped to. Both passes are
//! optional and run to a fixpoint.

use crate::ir::{BlockId, Cfg, ValueId};
use crate::options::CompileOptions;

/// Run the passes enabled in `options`
pub fn run(cfg: &mut Cfg, options: &CompileOptions) {
    let pruned = if options.prune_unreachable {
        prune_unreachable(cfg)
    } else {
        0
    };
    let simplified = if options.simplify_phis {
        simplify_phis(cfg)
    } else {
        0
    };
    tracing::debug!(
        target: "sable::ssa",
        unit = %cfg.name,
        pruned,
        simplified,
        "cleanup"
    );
}

/// Delete non-entry blocks without predecessors, repeatedly. Returns the
/// number of blocks deleted.
pub fn prune_unreachable(cfg: &mut Cfg) -> usize {
    let entry = cfg.entry();
    let mut removed = 0;
    loop {
        let dead: Vec<BlockId> = cfg
            .blocks()
            .filter(|bb| bb.id != entry && bb.preds.is_empty())
            .map(|bb| bb.id)
            .collect();
        if dead.is_empty() {
            return removed;
        }
        for block in dead {
            cfg.remove_block(block);
            removed += 1;
        }
    }
}

/// Replace every phi whose inputs, ignoring itself, are one single value by
/// that value. Returns the number of phis removed.
pub fn simplify_phis(cfg: &mut Cfg) -> usize {
    let mut removed = 0;
    while let Some((block, phi, value)) = find_trivial_phi(cfg) {
        if let Some(bb) = cfg.block_mut(block) {
            bb.phis.retain(|p| p.value != phi);
        }
        cfg.replace_uses(phi, value);
        removed += 1;
    }
    removed
}

fn find_trivial_phi(cfg: &Cfg) -> Option<(BlockId, ValueId, ValueId)> {
    cfg.blocks().find_map(|bb| {
        bb.phis.iter().find_map(|phi| {
            let mut distinct = phi
                .inputs
                .iter()
                .map(|(_, v)| *v)
                .filter(|v| *v != phi.value);
            let first = distinct.next()?;
            distinct
                .all(|v| v == first)
                .then_some((bb.id, phi.value, first))
        })
    })
}
