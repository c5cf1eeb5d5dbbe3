//! Shared helpers for assembling bytecode in tests

#![allow(dead_code)]

use sable_bytecode::{
    Ast, AstIndex, CodeBuilder, CodeUnit, Constant, ConstantIndex, ConstantPool, Instruction,
    Label, SymbolIndex,
};
use sable_ssa::{BlockId, Cfg, CompileOptions, CompileResult, Op, Terminator, compile_unit};
use tracing_subscriber::filter::EnvFilter;

/// Route compiler traces to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bytecode assembler holding a unit under construction and its pool
pub struct Asm {
    pub pool: ConstantPool,
    code: CodeBuilder,
}

impl Asm {
    pub fn new() -> Self {
        Self {
            pool: ConstantPool::new(),
            code: CodeBuilder::new().name("test"),
        }
    }

    pub fn sym(&mut self, name: &str) -> SymbolIndex {
        self.pool.add_symbol(name)
    }

    pub fn ast(&mut self, ast: Ast) -> AstIndex {
        self.pool.add_ast(ast)
    }

    /// Descriptor for a call of `fun` on symbol arguments
    pub fn site(&mut self, fun: &str, args: &[&str]) -> AstIndex {
        self.ast(Ast::call(fun, args.iter().map(|a| Ast::symbol(*a))))
    }

    pub fn constant(&mut self, constant: Constant) -> ConstantIndex {
        self.pool.add(constant)
    }

    pub fn label(&mut self) -> Label {
        self.code.new_label()
    }

    pub fn place(&mut self, label: Label) -> &mut Self {
        self.code.place_label(label).expect("label placed twice");
        self
    }

    pub fn op(&mut self, instruction: Instruction) -> &mut Self {
        self.code.emit(instruction);
        self
    }

    pub fn get_var(&mut self, name: &str) -> &mut Self {
        let symbol = self.sym(name);
        self.op(Instruction::GetVar { symbol })
    }

    pub fn finish(self) -> (CodeUnit, ConstantPool) {
        let unit = self.code.finish().expect("unplaced label");
        (unit, self.pool)
    }

    pub fn compile(self, options: CompileOptions) -> CompileResult<Cfg> {
        init_tracing();
        let (unit, pool) = self.finish();
        compile_unit(&unit, &pool, options)
    }
}

/// Every phi has exactly one input per predecessor edge
pub fn assert_phi_edges_complete(cfg: &Cfg) {
    for bb in cfg.blocks() {
        for phi in &bb.phis {
            let mut inputs: Vec<BlockId> = phi.inputs.iter().map(|(b, _)| *b).collect();
            let mut preds = bb.preds.clone();
            inputs.sort();
            preds.sort();
            assert_eq!(
                inputs, preds,
                "phi {} of {} does not match predecessors\n{}",
                phi.value, bb.id, cfg
            );
        }
    }
}

/// Every live block is terminated and only targets live blocks
pub fn assert_well_formed(cfg: &Cfg) {
    for bb in cfg.blocks() {
        assert!(bb.terminator.is_some(), "{} unterminated\n{}", bb.id, cfg);
        for succ in bb.successors() {
            let target = cfg.block(succ).expect("edge into removed block");
            assert!(target.preds.contains(&bb.id));
        }
    }
    assert_phi_edges_complete(cfg);
}

/// All statements with their ops, in block order
pub fn ops(cfg: &Cfg) -> Vec<&Op> {
    cfg.stmts().map(|(_, s)| &s.op).collect()
}

pub fn count_ops(cfg: &Cfg, pred: impl Fn(&Op) -> bool) -> usize {
    cfg.stmts().filter(|(_, s)| pred(&s.op)).count()
}

pub fn returns(cfg: &Cfg) -> Vec<BlockId> {
    cfg.blocks()
        .filter(|bb| matches!(bb.terminator, Some(Terminator::Return(_))))
        .map(|bb| bb.id)
        .collect()
}
