//! Integration tests for call assembly, complex assignment and generic
//! dispatch

mod common;

use common::{Asm, assert_well_formed, count_ops, ops, returns};
use sable_bytecode::{Ast, AstArg, CodeUnit, Constant, Instruction};
use sable_ssa::ir::{CallSite, FunLookup, Scope};
use sable_ssa::{
    BlockId, Cfg, CompileOptions, ErrorKind, Fault, Op, Terminator, UnitKind, UnitRef, ValueId,
    compile_module,
};

fn only_return(cfg: &Cfg) -> ValueId {
    let exits = returns(cfg);
    assert_eq!(exits.len(), 1, "{cfg}");
    match cfg.block(exits[0]).unwrap().terminator {
        Some(Terminator::Return(value)) => value,
        _ => unreachable!(),
    }
}

fn find_block(cfg: &Cfg, pred: impl Fn(&Op) -> bool) -> BlockId {
    cfg.stmts()
        .find(|(_, s)| pred(&s.op))
        .map(|(b, _)| b)
        .unwrap_or_else(|| panic!("no matching statement\n{cfg}"))
}

/// Rewritten descriptors of every call, in block order
fn place_sites(cfg: &Cfg) -> Vec<String> {
    ops(cfg)
        .into_iter()
        .filter_map(|op| match op {
            Op::Call { call, .. } | Op::NamedCall { call, .. } => match call {
                CallSite::Place { rewritten, .. } => Some(rewritten.to_string()),
                CallSite::Pool(_) => None,
            },
            _ => None,
        })
        .collect()
}

// ==================== Calls ====================

#[test]
fn test_positional_call() {
    let mut asm = Asm::new();
    let call = asm.site("f", &["x"]);
    let f = asm.sym("f");
    asm.op(Instruction::GetFun { symbol: f })
        .get_var("x")
        .op(Instruction::PushArg)
        .op(Instruction::Call { call })
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    let result = only_return(&cfg);
    let Some(Op::Call { callee, args, .. }) = cfg.defining_op(result) else {
        panic!("expected a call\n{cfg}");
    };
    assert!(matches!(
        cfg.defining_op(*callee),
        Some(Op::LdFun { name, lookup: FunLookup::Local }) if name == "f"
    ));
    assert_eq!(args.len(), 1);
}

/// `f(x, y = 1)` keeps argument names
#[test]
fn test_named_call() {
    let mut asm = Asm::new();
    let call = asm.site("f", &["x", "y"]);
    let f = asm.sym("f");
    let y = asm.sym("y");
    let one = asm.constant(Constant::Real(1.0));
    asm.op(Instruction::GetGlobFun { symbol: f })
        .get_var("x")
        .op(Instruction::PushArg)
        .op(Instruction::PushConstArg { constant: one })
        .op(Instruction::SetTag { symbol: y })
        .op(Instruction::Call { call })
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    let result = only_return(&cfg);
    let Some(Op::NamedCall { args, names, .. }) = cfg.defining_op(result) else {
        panic!("expected a named call\n{cfg}");
    };
    assert_eq!(args.len(), 2);
    assert_eq!(names, &vec![None, Some("y".to_string())]);
}

/// Builtins ignore names and get missing and `...` markers positionally
#[test]
fn test_builtin_call_with_markers() {
    let mut asm = Asm::new();
    let call = asm.site("list", &["a"]);
    let list = asm.sym("list");
    let a = asm.sym("a");
    asm.op(Instruction::GetBuiltin { symbol: list })
        .op(Instruction::PushTrueArg)
        .op(Instruction::SetTag { symbol: a })
        .op(Instruction::DoMissing)
        .op(Instruction::DoDots)
        .op(Instruction::CallBuiltin { call })
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    let result = only_return(&cfg);
    let Some(Op::CallBuiltin { builtin, args, .. }) = cfg.defining_op(result) else {
        panic!("expected a builtin call\n{cfg}");
    };
    assert_eq!(builtin, "list");
    assert_eq!(args.len(), 3);
    assert_eq!(cfg.defining_op(args[1]), Some(&Op::MissingArg));
    assert_eq!(cfg.defining_op(args[2]), Some(&Op::ExpandDots));
}

#[test]
fn test_check_fun_calls_stack_value() {
    let mut asm = Asm::new();
    let call = asm.site("g", &[]);
    asm.get_var("g")
        .op(Instruction::CheckFun)
        .op(Instruction::Call { call })
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    let result = only_return(&cfg);
    let Some(Op::Call { callee, args, .. }) = cfg.defining_op(result) else {
        panic!("expected a call\n{cfg}");
    };
    assert!(matches!(cfg.defining_op(*callee), Some(Op::LdVar { name, .. }) if name == "g"));
    assert!(args.is_empty());
}

#[test]
fn test_argument_outside_call() {
    let mut asm = Asm::new();
    asm.get_var("x").op(Instruction::PushArg);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(err.fault, Fault::ProtocolUnderflow("call"));
    assert_eq!(
        err.to_string().split(": ").last(),
        Some("call stack underflow")
    );
}

#[test]
fn test_tag_without_argument() {
    let mut asm = Asm::new();
    let f = asm.sym("f");
    let y = asm.sym("y");
    asm.op(Instruction::GetFun { symbol: f })
        .op(Instruction::SetTag { symbol: y });

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(err.location.pc, 1);
}

#[test]
fn test_unfinished_call_is_unbalanced() {
    let mut asm = Asm::new();
    let f = asm.sym("f");
    asm.op(Instruction::GetFun { symbol: f })
        .op(Instruction::LdNull)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.fault,
        Fault::unbalanced("call", "1 still open at end of code")
    );
    assert_eq!(err.location.pc, 3);
}

/// `while (c) c(TRUE, break)`: the call is never finished on any path
/// that reaches the loop end
#[test]
fn test_break_inside_call_arguments() {
    let mut asm = Asm::new();
    let cond = asm.site("while", &["c"]);
    let site = asm.site("c", &["TRUE", "break"]);
    let c = asm.sym("c");
    let head = asm.label();
    let end = asm.label();
    asm.op(Instruction::StartLoopCntxt { end })
        .place(head)
        .get_var("c")
        .op(Instruction::BrIfNot {
            call: cond,
            label: end,
        })
        .op(Instruction::GetBuiltin { symbol: c })
        .op(Instruction::PushTrueArg)
        .op(Instruction::DoLoopBreak)
        .op(Instruction::PushArg)
        .op(Instruction::CallBuiltin { call: site })
        .op(Instruction::Pop)
        .op(Instruction::Goto { label: head })
        .place(end)
        .op(Instruction::EndLoopCntxt)
        .op(Instruction::LdNull)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    assert_eq!(
        count_ops(&cfg, |op| matches!(op, Op::CallBuiltin { .. })),
        0
    );

    let exit = cfg.block(returns(&cfg)[0]).unwrap();
    assert_eq!(exit.preds.len(), 2, "{cfg}");
}

/// `repeat c(break)` and `repeat c(next)`: the only edge into the end carries
/// the open call, or nothing reaches the end at all
#[test]
fn test_jump_out_of_call_in_repeat() {
    for is_break in [true, false] {
        let mut asm = Asm::new();
        let site = asm.site("c", &["jump"]);
        let c = asm.sym("c");
        let head = asm.label();
        let end = asm.label();
        let jump = if is_break {
            Instruction::DoLoopBreak
        } else {
            Instruction::DoLoopNext
        };
        asm.op(Instruction::StartLoopCntxt { end })
            .place(head)
            .op(Instruction::GetBuiltin { symbol: c })
            .op(jump)
            .op(Instruction::PushArg)
            .op(Instruction::CallBuiltin { call: site })
            .op(Instruction::Pop)
            .op(Instruction::Goto { label: head })
            .place(end)
            .op(Instruction::EndLoopCntxt)
            .op(Instruction::LdNull)
            .op(Instruction::Return);

        let cfg = asm.compile(CompileOptions::default()).unwrap();
        assert_well_formed(&cfg);
        assert_eq!(returns(&cfg).len(), usize::from(is_break), "{cfg}");
    }
}

/// A call opened outside the loop stays open past its end
#[test]
fn test_call_left_open_across_loop_is_unbalanced() {
    let mut asm = Asm::new();
    let cond = asm.site("while", &["c"]);
    let f = asm.sym("f");
    let head = asm.label();
    let end = asm.label();
    asm.op(Instruction::GetFun { symbol: f })
        .op(Instruction::StartLoopCntxt { end })
        .place(head)
        .get_var("c")
        .op(Instruction::BrIfNot {
            call: cond,
            label: end,
        })
        .op(Instruction::DoLoopBreak)
        .place(end)
        .op(Instruction::EndLoopCntxt)
        .op(Instruction::LdNull)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.fault,
        Fault::unbalanced("call", "1 still open at end of code")
    );
}

// ==================== Complex assignment ====================

/// `a[i][[j]] <- v`
fn nested_assignment(asm: &mut Asm, target: &str) {
    let place = Ast::call(
        "[[",
        [
            Ast::call("[", [Ast::symbol("a"), Ast::symbol("i")]),
            Ast::symbol("j"),
        ],
    );
    let call = asm.ast(Ast::call("<-", [place, Ast::symbol("v")]));
    let a = asm.sym("a");
    let end = asm.sym(target);
    let getter = asm.sym("[");
    let setter2 = asm.sym("[[<-");
    let setter = asm.sym("[<-");

    asm.get_var("v")
        .op(Instruction::StartAssign { symbol: a, call })
        .op(Instruction::Dup2nd)
        .op(Instruction::GetFun { symbol: getter })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::GetterCall { layer: 1 })
        .op(Instruction::Swap)
        .op(Instruction::GetFun { symbol: setter2 })
        .get_var("j")
        .op(Instruction::PushArg)
        .op(Instruction::SetterCall { layer: 0 })
        .op(Instruction::GetFun { symbol: setter })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::SetterCall { layer: 1 })
        .op(Instruction::EndAssign { symbol: end })
        .op(Instruction::Return);
}

#[test]
fn test_complex_assignment_order() {
    let mut asm = Asm::new();
    nested_assignment(&mut asm, "a");

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_eq!(cfg.block_count(), 1);
    assert_eq!(
        place_sites(&cfg),
        vec![
            "[(*tmp*, i)",
            "[[<-(*tmp*, j, value = v)",
            "[<-(*tmp*, i, value = *vtmp*)",
        ]
    );

    let entry = cfg.block(cfg.entry()).unwrap();
    let outer_setter = entry
        .stmts
        .iter()
        .rev()
        .find(|s| matches!(s.op, Op::NamedCall { .. }))
        .unwrap();
    let store = entry.stmts.last().unwrap();
    assert!(matches!(
        &store.op,
        Op::StVar { name, value, .. } if name == "a" && *value == outer_setter.value
    ));

    // The expression's value is the right-hand side
    let rhs = entry.stmts[0].value;
    assert!(matches!(&entry.stmts[0].op, Op::LdVar { name, .. } if name == "v"));
    assert_eq!(entry.terminator, Some(Terminator::Return(rhs)));
}

/// The inner setter updates the value the getter produced
#[test]
fn test_setter_chains_getter_result() {
    let mut asm = Asm::new();
    nested_assignment(&mut asm, "a");

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    let calls: Vec<&Op> = ops(&cfg)
        .into_iter()
        .filter(|op| matches!(op, Op::Call { .. } | Op::NamedCall { .. }))
        .collect();
    let (Op::Call { .. }, Op::NamedCall { args: inner, .. }, Op::NamedCall { args: outer, .. }) =
        (calls[0], calls[1], calls[2])
    else {
        panic!("unexpected call shapes\n{cfg}");
    };
    let getter = cfg
        .stmts()
        .find(|(_, s)| matches!(s.op, Op::Call { .. }))
        .map(|(_, s)| s.value)
        .unwrap();
    let setter0 = cfg
        .stmts()
        .find(|(_, s)| matches!(&s.op, Op::NamedCall { args, .. } if args == inner))
        .map(|(_, s)| s.value)
        .unwrap();
    assert_eq!(inner[0], getter);
    assert_eq!(outer[2], setter0);
    assert_eq!(outer.len(), 3);
}

#[test]
fn test_assignment_end_mismatch() {
    let mut asm = Asm::new();
    nested_assignment(&mut asm, "b");

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(matches!(err.fault, Fault::AssignMismatch(_)));
    assert!(err.to_string().contains("complex-assign stack mismatch"));
}

#[test]
fn test_assignment_place_must_name_target() {
    let mut asm = Asm::new();
    let place = Ast::call("[", [Ast::symbol("other"), Ast::symbol("i")]);
    let call = asm.ast(Ast::call("<-", [place, Ast::symbol("v")]));
    let a = asm.sym("a");
    asm.get_var("v")
        .op(Instruction::StartAssign { symbol: a, call });

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(matches!(err.fault, Fault::AssignMismatch(_)));
    assert_eq!(err.location.pc, 1);
}

/// `names(a) <<- v` reads and writes `a` in the enclosing scope
#[test]
fn test_super_assignment() {
    let mut asm = Asm::new();
    let place = Ast::call("names", [Ast::symbol("a")]);
    let call = asm.ast(Ast::call("<<-", [place, Ast::symbol("v")]));
    let a = asm.sym("a");
    let setter = asm.sym("names<-");
    asm.get_var("v")
        .op(Instruction::StartAssign2 { symbol: a, call })
        .op(Instruction::GetFun { symbol: setter })
        .op(Instruction::SetterCall { layer: 0 })
        .op(Instruction::EndAssign2 { symbol: a })
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_eq!(place_sites(&cfg), vec!["names<-(*tmp*, value = v)"]);

    let entry = cfg.block(cfg.entry()).unwrap();
    let load = entry
        .stmts
        .iter()
        .find(|s| matches!(&s.op, Op::LdVar { name, .. } if name == "a"))
        .unwrap();
    assert!(matches!(load.op, Op::LdVar { scope: Scope::Super, .. }));

    let setter_call = entry
        .stmts
        .iter()
        .find(|s| matches!(s.op, Op::NamedCall { .. }))
        .unwrap();
    let Op::NamedCall { args, .. } = &setter_call.op else {
        unreachable!()
    };
    assert_eq!(args[0], load.value);
    assert!(matches!(
        &entry.stmts.last().unwrap().op,
        Op::StVar { name, scope: Scope::Super, value }
            if name == "a" && *value == setter_call.value
    ));

    // The expression's value is the right-hand side
    assert_eq!(
        entry.terminator,
        Some(Terminator::Return(entry.stmts[0].value))
    );
}

#[test]
fn test_super_assignment_closed_as_local() {
    let mut asm = Asm::new();
    let place = Ast::call("names", [Ast::symbol("a")]);
    let call = asm.ast(Ast::call("<<-", [place, Ast::symbol("v")]));
    let a = asm.sym("a");
    asm.get_var("v")
        .op(Instruction::StartAssign2 { symbol: a, call })
        .op(Instruction::Pop)
        .op(Instruction::EndAssign { symbol: a });

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(matches!(err.fault, Fault::AssignMismatch(_)));
}

#[test]
fn test_truncated_assignment_is_unbalanced() {
    let mut asm = Asm::new();
    let place = Ast::call("names", [Ast::symbol("a")]);
    let call = asm.ast(Ast::call("<-", [place, Ast::symbol("v")]));
    let a = asm.sym("a");
    asm.get_var("v")
        .op(Instruction::StartAssign { symbol: a, call })
        .op(Instruction::Pop)
        .op(Instruction::Pop)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(
        err.to_string().contains("unbalanced complex-assign bracket"),
        "{err}"
    );
}

/// A place whose function is not a symbol cannot be assigned through
#[test]
fn test_setter_through_expression_is_unsupported() {
    let mut asm = Asm::new();
    let fun = Ast::Call {
        fun: Box::new(Ast::call("getter", [])),
        args: vec![AstArg::positional(Ast::symbol("a"))],
    };
    let call = asm.ast(Ast::call("<-", [fun, Ast::symbol("v")]));
    let a = asm.sym("a");
    let f = asm.sym("f");
    asm.get_var("v")
        .op(Instruction::StartAssign { symbol: a, call })
        .op(Instruction::GetFun { symbol: f })
        .op(Instruction::SetterCall { layer: 0 });

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

// ==================== Generic dispatch ====================

/// `x[i]`: the fast and slow paths meet in the after block
#[test]
fn test_subset_dispatch_reconverges() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubset { call, after })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::DfltSubset)
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    assert_eq!(count_ops(&cfg, |op| matches!(op, Op::IsPlain { .. })), 1);

    let fast = find_block(&cfg, |op| matches!(op, Op::Extract { .. }));
    let slow = find_block(&cfg, |op| {
        matches!(op, Op::CallBuiltin { builtin, args, .. } if builtin == "[" && args.len() == 1)
    });
    assert_ne!(fast, slow);

    let exit = cfg.block(returns(&cfg)[0]).unwrap();
    assert_eq!(exit.preds.len(), 2);
    assert!(exit.preds.contains(&fast) && exit.preds.contains(&slow));
    assert_eq!(exit.phis.len(), 1);

    let Some(Op::Extract {
        double, indices, ..
    }) = cfg
        .stmts()
        .find(|(_, s)| matches!(s.op, Op::Extract { .. }))
        .map(|(_, s)| &s.op)
    else {
        unreachable!()
    };
    assert!(!double);
    assert_eq!(indices.len(), 1);
}

/// Inside a complex assignment the after block carries every live slot
#[test]
fn test_dispatch_phis_match_entry_depth() {
    let build = || {
        let mut asm = Asm::new();
        let place = Ast::call("[", [Ast::symbol("x"), Ast::symbol("i")]);
        let call = asm.ast(Ast::call("<-", [place.clone(), Ast::symbol("v")]));
        let site = asm.ast(place);
        let x = asm.sym("x");
        let after = asm.label();
        asm.get_var("v")
            .op(Instruction::StartAssign { symbol: x, call })
            .op(Instruction::StartSubassign { call: site, after })
            .get_var("i")
            .op(Instruction::PushArg)
            .op(Instruction::DfltSubassign)
            .place(after)
            .op(Instruction::EndAssign { symbol: x })
            .op(Instruction::Return);
        asm
    };

    let raw = build().compile(CompileOptions::default().raw()).unwrap();
    let exit = raw.block(returns(&raw)[0]).unwrap();
    // [v, x] once the right-hand side is popped
    assert_eq!(exit.phis.len(), 2);
    assert_eq!(
        count_ops(&raw, |op| matches!(op, Op::Subassign { double: false, .. })),
        1
    );
    assert_eq!(
        count_ops(&raw, |op| matches!(
            op,
            Op::CallBuiltin { builtin, args, .. } if builtin == "[<-" && args.len() == 2
        )),
        1
    );

    // Both paths carry the same right-hand side
    let clean = build().compile(CompileOptions::default()).unwrap();
    let exit = clean.block(returns(&clean)[0]).unwrap();
    assert_eq!(exit.phis.len(), 1);
    assert!(matches!(
        &exit.stmts[0].op,
        Op::StVar { name, value, .. } if name == "x" && *value == exit.phis[0].value
    ));
}

#[test]
fn test_nary_dispatch_reads_stack_indices() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["m", "i", "j"]);
    let after = asm.label();
    asm.get_var("m")
        .op(Instruction::StartSubsetN { call, after })
        .get_var("i")
        .get_var("j")
        .op(Instruction::DfltSubsetN { n: 2 })
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    assert_eq!(
        count_ops(&cfg, |op| matches!(op, Op::Extract { indices, .. } if indices.len() == 2)),
        1
    );
}

#[test]
fn test_nary_dispatch_with_many_indices() {
    let mut asm = Asm::new();
    let call = asm.site("[[", &["a", "i", "j", "k", "l"]);
    let after = asm.label();
    asm.get_var("a")
        .op(Instruction::StartSubset2N { call, after })
        .get_var("i")
        .get_var("j")
        .get_var("k")
        .get_var("l")
        .op(Instruction::DfltSubset2N { n: 4 })
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_eq!(count_ops(&cfg, |op| matches!(op, Op::Extract { .. })), 0);
    assert_eq!(
        count_ops(&cfg, |op| matches!(
            op,
            Op::CallBuiltin { builtin, args, .. } if builtin == "[[" && args.len() == 5
        )),
        1
    );
}

/// `x[i, drop = FALSE]` falls back to a named call of the builtin
#[test]
fn test_named_index_uses_generic_call() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let drop = asm.sym("drop");
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubset { call, after })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::PushFalseArg)
        .op(Instruction::SetTag { symbol: drop })
        .op(Instruction::DfltSubset)
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    assert_eq!(count_ops(&cfg, |op| matches!(op, Op::Extract { .. })), 0);
    let (callee, names) = cfg
        .stmts()
        .find_map(|(_, s)| match &s.op {
            Op::NamedCall { callee, names, .. } => Some((*callee, names.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(names, vec![None, None, Some("drop".to_string())]);
    assert!(matches!(cfg.defining_op(callee), Some(Op::LdBuiltin { name }) if name == "["));
}

#[test]
fn test_c_dispatch() {
    let mut asm = Asm::new();
    let call = asm.site("c", &["a", "b"]);
    let after = asm.label();
    asm.get_var("a")
        .op(Instruction::StartC { call, after })
        .get_var("b")
        .op(Instruction::PushArg)
        .op(Instruction::DfltC)
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    let arities: Vec<usize> = ops(&cfg)
        .into_iter()
        .filter_map(|op| match op {
            Op::CallBuiltin { builtin, args, .. } if builtin == "c" => Some(args.len()),
            _ => None,
        })
        .collect();
    assert_eq!(arities.len(), 2);
    assert!(arities.contains(&1) && arities.contains(&2));
}

#[test]
fn test_dispatch_end_must_precede_after_block() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubset { call, after })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::DfltSubset)
        .op(Instruction::Invisible)
        .place(after)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(matches!(err.fault, Fault::NotBeforeAfterBlock(_)));
    assert!(err.to_string().contains("immediately before the after block"));
    assert_eq!(err.location.pc, 4);
}

#[test]
fn test_dispatch_closed_by_wrong_kind() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubset { call, after })
        .get_var("i")
        .op(Instruction::PushArg)
        .op(Instruction::DfltSubset2)
        .place(after)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert!(
        err.to_string().contains("unbalanced dispatch bracket"),
        "{err}"
    );
}

/// The fast path falls into the after block without its `Dflt*`
#[test]
fn test_truncated_dispatch_is_unbalanced() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubsetN { call, after })
        .place(after)
        .op(Instruction::Return);

    let err = asm.compile(CompileOptions::default()).unwrap_err();
    assert!(
        err.to_string().contains("unbalanced dispatch bracket"),
        "{err}"
    );
}

/// `x[return(NULL)]`: the closing instruction is dead, the slow path still
/// reaches the after block
#[test]
fn test_return_inside_dispatch() {
    let mut asm = Asm::new();
    let call = asm.site("[", &["x", "i"]);
    let after = asm.label();
    asm.get_var("x")
        .op(Instruction::StartSubsetN { call, after })
        .op(Instruction::LdNull)
        .op(Instruction::Return)
        .op(Instruction::DfltSubsetN { n: 1 })
        .place(after)
        .op(Instruction::Return);

    let cfg = asm.compile(CompileOptions::default()).unwrap();
    assert_well_formed(&cfg);
    assert_eq!(returns(&cfg).len(), 2);
    assert_eq!(
        count_ops(&cfg, |op| matches!(op, Op::CallBuiltin { .. })),
        1,
        "only the slow path calls the generic accessor\n{cfg}"
    );
}

// ==================== Modules ====================

fn nested_unit(name: &str, body: &[Instruction]) -> CodeUnit {
    body.iter()
        .fold(CodeUnit::builder().name(name), |b, i| b.instruction(i.clone()))
        .finish()
        .unwrap()
}

#[test]
fn test_module_compiles_nested_units() {
    let mut asm = Asm::new();
    let x = asm.sym("x");
    let promise = nested_unit("promise", &[Instruction::GetVar { symbol: x }, Instruction::Return]);
    let closure = nested_unit("closure", &[Instruction::LdNull, Instruction::Return]);
    let promise = asm.pool.add_code(promise);
    let closure = asm.pool.add_code(closure);
    let call = asm.site("f", &["x", "g"]);
    let f = asm.sym("f");
    asm.op(Instruction::GetFun { symbol: f })
        .op(Instruction::MakeProm { code: promise })
        .op(Instruction::MakeClosure { closure })
        .op(Instruction::PushArg)
        .op(Instruction::Call { call })
        .op(Instruction::Return);

    let (root, pool) = asm.finish();
    let units = compile_module(&root, &pool, CompileOptions::default()).unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units[&UnitRef::Root].name, "test");
    assert_eq!(units[&UnitRef::Pool(promise)].name, "promise");
    assert_eq!(units[&UnitRef::Pool(closure)].name, "closure");
}

/// A promise body breaking out of the caller's loop is reported against
/// the promise
#[test]
fn test_module_error_names_unit() {
    let mut asm = Asm::new();
    let promise = nested_unit("promise", &[Instruction::DoLoopBreak]);
    let promise = asm.pool.add_code(promise);
    let call = asm.site("f", &["x"]);
    let f = asm.sym("f");
    asm.op(Instruction::GetFun { symbol: f })
        .op(Instruction::MakeProm { code: promise })
        .op(Instruction::Call { call })
        .op(Instruction::Return);

    let (root, pool) = asm.finish();
    let err = compile_module(&root, &pool, CompileOptions::default()).unwrap_err();
    assert_eq!(err.unit, UnitRef::Pool(promise));
    assert!(err.error.is_unsupported());
    assert!(err.to_string().starts_with(&format!("unit #{}: ", promise.index())));

    // The same body compiled as a function is malformed
    let body = pool.code(promise).unwrap();
    let err = sable_ssa::compile_unit(
        body,
        &pool,
        CompileOptions::default().unit_kind(UnitKind::Function),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
}
