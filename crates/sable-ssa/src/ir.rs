//! SSA control-flow graph.
//!
//! Blocks and values live in flat arenas addressed by [`BlockId`] and
//! [`ValueId`]. Edges are the ids stored in terminators and phi inputs, so the
//! graph has no pointer cycles even with loop back-edges. Removed blocks leave a
//! hole in the arena and ids stay stable.

use std::fmt;

use sable_bytecode::{Ast, AstIndex, ConstantIndex};
use serde::Serialize;

/// Basic block id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

/// SSA value id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Class of an SSA value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    /// A language value
    Value,
    /// Native boolean, only consumed by branches
    Test,
    /// Native integer, used by for-loop counters
    Index,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Value => "val",
            Self::Test => "test",
            Self::Index => "idx",
        })
    }
}

/// Where a value is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueDef {
    /// Phi of a block
    Phi(BlockId),
    /// Statement of a block
    Stmt(BlockId),
}

/// Arena entry for a value
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueInfo {
    /// Value class
    pub ty: ValueType,
    /// Defining site
    pub def: ValueDef,
}

/// Call-site descriptor attached to an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CallSite {
    /// Expression from the constant pool
    Pool(AstIndex),
    /// One layer of a complex assignment
    Place {
        /// Layer as written in the source
        original: Ast,
        /// Layer with its sub-target replaced by `*tmp*`
        rewritten: Ast,
    },
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool(idx) => write!(f, "@{}", idx.index()),
            Self::Place { rewritten, .. } => write!(f, "`{}`", rewritten),
        }
    }
}

/// Literal operand of [`Op::Const`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Literal {
    /// null
    Null,
    /// TRUE
    True,
    /// FALSE
    False,
    /// Constant-pool payload
    Pool(ConstantIndex),
}

/// Variable scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// Current environment
    Local,
    /// Enclosing environments (`<<-`)
    Super,
}

/// How a function name is looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunLookup {
    /// Lexical lookup skipping non-functions
    Local,
    /// Global environment
    Global,
    /// Value bound to the symbol in the base environment
    Symbol,
}

/// Binary operator
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Expt,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    And,
    Or,
    Colon,
    LogBase,
}

/// Unary operator
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    Sqrt,
    Exp,
    Log,
    SeqAlong,
    SeqLen,
    /// Math function by table index
    Math1(u32),
}

/// Type predicate
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeTest {
    Null,
    Logical,
    Integer,
    Double,
    Complex,
    Character,
    Symbol,
    Object,
    Numeric,
}

/// Statement operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Op {
    /// Literal value
    Const(Literal),
    /// Variable read
    LdVar {
        /// Variable name
        name: String,
        /// Lookup scope
        scope: Scope,
        /// Missing arguments read as the missing marker instead of erroring
        missing_ok: bool,
    },
    /// `..n` read
    LdDdVal {
        /// Symbol (`..1`, `..2`, ...)
        name: String,
        /// Missing arguments allowed
        missing_ok: bool,
    },
    /// Variable write
    StVar {
        /// Variable name
        name: String,
        /// Target scope
        scope: Scope,
        /// Stored value
        value: ValueId,
    },
    /// Function lookup
    LdFun {
        /// Function name
        name: String,
        /// Lookup strategy
        lookup: FunLookup,
    },
    /// Builtin as a first-class value
    LdBuiltin {
        /// Builtin name
        name: String,
    },
    /// Promise over a nested code unit
    MkPromise {
        /// Code constant
        code: ConstantIndex,
    },
    /// Closure over a nested code unit
    MkClosure {
        /// Code constant
        closure: ConstantIndex,
    },
    /// Binary arithmetic, comparison or logic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Unary arithmetic or math
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Type predicate returning a logical value
    IsType {
        /// Predicate
        test: TypeTest,
        /// Operand
        arg: ValueId,
    },
    /// Condition of `if`/`while` as a native test
    AsTest {
        /// Operand
        arg: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Coerce to a logical scalar (for `&&`/`||`)
    AsLogical {
        /// Operand
        arg: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Scalar `&&` of two logical scalars
    LogicalAnd {
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Scalar `||` of two logical scalars
    LogicalOr {
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Is a logical scalar FALSE
    IsFalse {
        /// Operand
        arg: ValueId,
    },
    /// Is a logical scalar TRUE
    IsTrue {
        /// Operand
        arg: ValueId,
    },
    /// Does the value have no class-based override
    IsPlain {
        /// Operand
        arg: ValueId,
    },
    /// Length of a sequence
    Length {
        /// Sequence
        seq: ValueId,
    },
    /// Native integer literal
    IndexConst(u32),
    /// Native integer add
    IndexAdd {
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Native integer `<=`
    IndexLe {
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Native integer `==`
    IndexEq {
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// One-based element of a for-loop sequence
    ForElement {
        /// Sequence
        seq: ValueId,
        /// One-based index
        index: ValueId,
    },
    /// Arm number selected by a numeric switch
    SwitchIndex {
        /// Switch subject
        arg: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Does a character switch subject equal `name`
    StrEq {
        /// Switch subject
        arg: ValueId,
        /// Arm name
        name: String,
    },
    /// Positional call of a function value
    Call {
        /// Callee
        callee: ValueId,
        /// Arguments
        args: Vec<ValueId>,
        /// Call site
        call: CallSite,
    },
    /// Call of a function value with argument names
    NamedCall {
        /// Callee
        callee: ValueId,
        /// Arguments
        args: Vec<ValueId>,
        /// Names, parallel to `args`
        names: Vec<Option<String>>,
        /// Call site
        call: CallSite,
    },
    /// Positional call of a statically known builtin
    CallBuiltin {
        /// Builtin name
        builtin: String,
        /// Arguments
        args: Vec<ValueId>,
        /// Call site
        call: CallSite,
    },
    /// Call of a special on its unevaluated call expression
    CallSpecial {
        /// Call site
        call: CallSite,
    },
    /// Explicitly missing argument
    MissingArg,
    /// `...` expansion argument
    ExpandDots,
    /// `x[i]`, `x[i, j]`, `x[i, j, k]` and the `[[` forms
    Extract {
        /// `[[` rather than `[`
        double: bool,
        /// Container
        target: ValueId,
        /// One to three indices
        indices: Vec<ValueId>,
        /// Call site
        call: CallSite,
    },
    /// `x[i] <- v` and friends; produces the updated container
    Subassign {
        /// `[[<-` rather than `[<-`
        double: bool,
        /// Container
        target: ValueId,
        /// One to three indices
        indices: Vec<ValueId>,
        /// New element value
        value: ValueId,
        /// Call site
        call: CallSite,
    },
    /// Set result visibility
    SetVisible(bool),
}

impl Op {
    /// Class of the value this operation defines
    pub fn result_type(&self) -> ValueType {
        match self {
            Self::AsTest { .. }
            | Self::IsFalse { .. }
            | Self::IsTrue { .. }
            | Self::IsPlain { .. }
            | Self::IndexLe { .. }
            | Self::IndexEq { .. }
            | Self::StrEq { .. } => ValueType::Test,
            Self::Length { .. }
            | Self::IndexConst(_)
            | Self::IndexAdd { .. }
            | Self::SwitchIndex { .. } => ValueType::Index,
            _ => ValueType::Value,
        }
    }

    /// Apply `f` to every value operand
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Self::StVar { value, .. } => f(value),
            Self::Binary { lhs, rhs, .. }
            | Self::LogicalAnd { lhs, rhs }
            | Self::LogicalOr { lhs, rhs }
            | Self::IndexAdd { lhs, rhs }
            | Self::IndexLe { lhs, rhs }
            | Self::IndexEq { lhs, rhs } => {
                f(lhs);
                f(rhs);
            }
            Self::Unary { arg, .. }
            | Self::IsType { arg, .. }
            | Self::AsTest { arg, .. }
            | Self::AsLogical { arg, .. }
            | Self::IsFalse { arg }
            | Self::IsTrue { arg }
            | Self::IsPlain { arg }
            | Self::SwitchIndex { arg, .. }
            | Self::StrEq { arg, .. } => f(arg),
            Self::Length { seq } => f(seq),
            Self::ForElement { seq, index } => {
                f(seq);
                f(index);
            }
            Self::Call { callee, args, .. } | Self::NamedCall { callee, args, .. } => {
                f(callee);
                args.iter_mut().for_each(f);
            }
            Self::CallBuiltin { args, .. } => args.iter_mut().for_each(f),
            Self::Extract {
                target, indices, ..
            } => {
                f(target);
                indices.iter_mut().for_each(f);
            }
            Self::Subassign {
                target,
                indices,
                value,
                ..
            } => {
                f(target);
                indices.iter_mut().for_each(&mut f);
                f(value);
            }
            Self::Const(_)
            | Self::LdVar { .. }
            | Self::LdDdVal { .. }
            | Self::LdFun { .. }
            | Self::LdBuiltin { .. }
            | Self::MkPromise { .. }
            | Self::MkClosure { .. }
            | Self::IndexConst(_)
            | Self::CallSpecial { .. }
            | Self::MissingArg
            | Self::ExpandDots
            | Self::SetVisible(_) => {}
        }
    }

    /// Value operands in order
    pub fn operands(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        self.clone().for_each_operand_mut(|v| out.push(*v));
        out
    }
}

/// One statement: an operation and the value it defines
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    /// Defined value
    pub value: ValueId,
    /// Operation
    pub op: Op,
}

/// Phi node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phi {
    /// Defined value
    pub value: ValueId,
    /// Declared class; every input must have it
    pub ty: ValueType,
    /// One input per wired predecessor edge
    pub inputs: Vec<(BlockId, ValueId)>,
}

/// Block terminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Terminator {
    /// Unconditional jump
    Goto(BlockId),
    /// Two-way branch on a `Test` value
    Branch {
        /// Condition
        cond: ValueId,
        /// Taken when true
        then: BlockId,
        /// Taken when false
        otherwise: BlockId,
    },
    /// Return from the unit
    Return(ValueId),
    /// Return from the enclosing function
    NonLocalReturn(ValueId),
}

impl Terminator {
    /// Successor blocks in edge order
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Goto(target) => vec![*target],
            Self::Branch {
                then, otherwise, ..
            } => vec![*then, *otherwise],
            Self::Return(_) | Self::NonLocalReturn(_) => Vec::new(),
        }
    }

    fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Self::Branch { cond, .. } => f(cond),
            Self::Return(v) | Self::NonLocalReturn(v) => f(v),
            Self::Goto(_) => {}
        }
    }
}

/// Basic block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicBlock {
    /// Own id
    pub id: BlockId,
    /// Phi nodes, in stack-slot order for merge blocks
    pub phis: Vec<Phi>,
    /// Statements in execution order
    pub stmts: Vec<Stmt>,
    /// Terminator, `None` while the block is being built
    pub terminator: Option<Terminator>,
    /// Predecessors in edge-creation order
    pub preds: Vec<BlockId>,
}

impl BasicBlock {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            phis: Vec::new(),
            stmts: Vec::new(),
            terminator: None,
            preds: Vec::new(),
        }
    }

    /// Successor blocks
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }
}

/// A compiled unit
#[derive(Debug, Clone, Serialize)]
pub struct Cfg {
    /// Unit name
    pub name: String,
    entry: BlockId,
    blocks: Vec<Option<BasicBlock>>,
    values: Vec<ValueInfo>,
}

impl Cfg {
    /// Create a graph holding only an empty entry block
    pub fn new(name: impl Into<String>) -> Self {
        let mut cfg = Self {
            name: name.into(),
            entry: BlockId(0),
            blocks: Vec::new(),
            values: Vec::new(),
        };
        cfg.entry = cfg.add_block();
        cfg
    }

    /// Entry block
    #[inline]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Allocate an empty block
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(BasicBlock::new(id)));
        id
    }

    /// Live block by id
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Live block by id, mutable
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Live blocks in id order
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter_map(Option::as_ref)
    }

    /// Number of live blocks
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Class of a value
    pub fn value_type(&self, value: ValueId) -> ValueType {
        self.values[value.0 as usize].ty
    }

    /// Arena entry of a value
    pub fn value_info(&self, value: ValueId) -> ValueInfo {
        self.values[value.0 as usize]
    }

    fn new_value(&mut self, ty: ValueType, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueInfo { ty, def });
        id
    }

    /// Append a statement to `block`
    pub fn append(&mut self, block: BlockId, op: Op) -> ValueId {
        let value = self.new_value(op.result_type(), ValueDef::Stmt(block));
        if let Some(bb) = self.block_mut(block) {
            debug_assert!(bb.terminator.is_none(), "append to terminated {block}");
            bb.stmts.push(Stmt { value, op });
        }
        value
    }

    /// Add an input-less phi to `block`
    pub fn add_phi(&mut self, block: BlockId, ty: ValueType) -> ValueId {
        let value = self.new_value(ty, ValueDef::Phi(block));
        if let Some(bb) = self.block_mut(block) {
            bb.phis.push(Phi {
                value,
                ty,
                inputs: Vec::new(),
            });
        }
        value
    }

    /// Record `value` as the input of phi `phi` along the edge from `pred`
    pub fn add_phi_input(&mut self, block: BlockId, phi: ValueId, pred: BlockId, value: ValueId) {
        if let Some(bb) = self.block_mut(block) {
            if let Some(p) = bb.phis.iter_mut().find(|p| p.value == phi) {
                p.inputs.push((pred, value));
            }
        }
    }

    /// Terminate `block` and record it as a predecessor of each successor
    pub fn set_terminator(&mut self, block: BlockId, terminator: Terminator) {
        let succs = terminator.successors();
        if let Some(bb) = self.block_mut(block) {
            debug_assert!(bb.terminator.is_none(), "{block} terminated twice");
            bb.terminator = Some(terminator);
        }
        for succ in succs {
            if let Some(bb) = self.block_mut(succ) {
                bb.preds.push(block);
            }
        }
    }

    /// Delete a block, detaching it from its successors' predecessor lists
    /// and phi inputs
    pub fn remove_block(&mut self, id: BlockId) {
        let Some(removed) = self.blocks.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        for succ in removed.successors() {
            if let Some(bb) = self.block_mut(succ) {
                bb.preds.retain(|p| *p != id);
                for phi in &mut bb.phis {
                    phi.inputs.retain(|(p, _)| *p != id);
                }
            }
        }
    }

    /// Rewrite every use of `old` to `new`
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        let swap = |v: &mut ValueId| {
            if *v == old {
                *v = new;
            }
        };
        for bb in self.blocks.iter_mut().flatten() {
            for phi in &mut bb.phis {
                for (_, v) in &mut phi.inputs {
                    swap(v);
                }
            }
            for stmt in &mut bb.stmts {
                stmt.op.for_each_operand_mut(swap);
            }
            if let Some(term) = &mut bb.terminator {
                term.for_each_operand_mut(swap);
            }
        }
    }

    /// Statement defining `value`, if it is a statement
    pub fn defining_op(&self, value: ValueId) -> Option<&Op> {
        let ValueDef::Stmt(block) = self.value_info(value).def else {
            return None;
        };
        self.block(block)?
            .stmts
            .iter()
            .find(|s| s.value == value)
            .map(|s| &s.op)
    }

    /// Every statement in block-id order
    pub fn stmts(&self) -> impl Iterator<Item = (BlockId, &Stmt)> {
        self.blocks()
            .flat_map(|bb| bb.stmts.iter().map(move |s| (bb.id, s)))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::True => f.write_str("TRUE"),
            Self::False => f.write_str("FALSE"),
            Self::Pool(idx) => write!(f, "#{}", idx.index()),
        }
    }
}

fn join(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(lit) => write!(f, "const {}", lit),
            Self::LdVar {
                name,
                scope,
                missing_ok,
            } => {
                let op = match scope {
                    Scope::Local => "ldvar",
                    Scope::Super => "ldvar_super",
                };
                let tail = if *missing_ok { " missok" } else { "" };
                write!(f, "{} {}{}", op, name, tail)
            }
            Self::LdDdVal { name, .. } => write!(f, "ldddval {}", name),
            Self::StVar { name, scope, value } => match scope {
                Scope::Local => write!(f, "stvar {} {}", name, value),
                Scope::Super => write!(f, "stvar_super {} {}", name, value),
            },
            Self::LdFun { name, lookup } => write!(f, "ldfun {} {:?}", name, lookup),
            Self::LdBuiltin { name } => write!(f, "ldbuiltin `{}`", name),
            Self::MkPromise { code } => write!(f, "mkpromise #{}", code.index()),
            Self::MkClosure { closure } => write!(f, "mkclosure #{}", closure.index()),
            Self::Binary { op, lhs, rhs, call } => {
                write!(f, "{:?} {}, {} {}", op, lhs, rhs, call)
            }
            Self::Unary { op, arg, call } => write!(f, "{:?} {} {}", op, arg, call),
            Self::IsType { test, arg } => write!(f, "is {:?} {}", test, arg),
            Self::AsTest { arg, .. } => write!(f, "astest {}", arg),
            Self::AsLogical { arg, .. } => write!(f, "aslogical {}", arg),
            Self::LogicalAnd { lhs, rhs } => write!(f, "land {}, {}", lhs, rhs),
            Self::LogicalOr { lhs, rhs } => write!(f, "lor {}, {}", lhs, rhs),
            Self::IsFalse { arg } => write!(f, "isfalse {}", arg),
            Self::IsTrue { arg } => write!(f, "istrue {}", arg),
            Self::IsPlain { arg } => write!(f, "isplain {}", arg),
            Self::Length { seq } => write!(f, "length {}", seq),
            Self::IndexConst(n) => write!(f, "idx {}", n),
            Self::IndexAdd { lhs, rhs } => write!(f, "idx_add {}, {}", lhs, rhs),
            Self::IndexLe { lhs, rhs } => write!(f, "idx_le {}, {}", lhs, rhs),
            Self::IndexEq { lhs, rhs } => write!(f, "idx_eq {}, {}", lhs, rhs),
            Self::ForElement { seq, index } => write!(f, "for_elt {}[{}]", seq, index),
            Self::SwitchIndex { arg, .. } => write!(f, "switch_idx {}", arg),
            Self::StrEq { arg, name } => write!(f, "streq {}, {:?}", arg, name),
            Self::Call { callee, args, call } => {
                write!(f, "call {}({}) {}", callee, join(args), call)
            }
            Self::NamedCall {
                callee,
                args,
                names,
                call,
            } => {
                write!(f, "named_call {}(", callee)?;
                for (i, (arg, name)) in args.iter().zip(names).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match name {
                        Some(name) => write!(f, "{} = {}", name, arg)?,
                        None => write!(f, "{}", arg)?,
                    }
                }
                write!(f, ") {}", call)
            }
            Self::CallBuiltin {
                builtin,
                args,
                call,
            } => write!(f, "call_builtin `{}`({}) {}", builtin, join(args), call),
            Self::CallSpecial { call } => write!(f, "call_special {}", call),
            Self::MissingArg => f.write_str("missing"),
            Self::ExpandDots => f.write_str("dots"),
            Self::Extract {
                double,
                target,
                indices,
                ..
            } => {
                let (open, close) = if *double { ("[[", "]]") } else { ("[", "]") };
                write!(f, "extract {}{}{}{}", target, open, join(indices), close)
            }
            Self::Subassign {
                double,
                target,
                indices,
                value,
                ..
            } => {
                let (open, close) = if *double { ("[[", "]]") } else { ("[", "]") };
                write!(
                    f,
                    "subassign {}{}{}{} <- {}",
                    target,
                    open,
                    join(indices),
                    close,
                    value
                )
            }
            Self::SetVisible(visible) => write!(f, "visible {}", visible),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Goto(target) => write!(f, "goto {}", target),
            Self::Branch {
                cond,
                then,
                otherwise,
            } => write!(f, "branch {} ? {} : {}", cond, then, otherwise),
            Self::Return(v) => write!(f, "return {}", v),
            Self::NonLocalReturn(v) => write!(f, "nonlocal_return {}", v),
        }
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cfg {} (entry {})", self.name, self.entry)?;
        for bb in self.blocks() {
            write!(f, "{}:", bb.id)?;
            if !bb.preds.is_empty() {
                let preds: Vec<_> = bb.preds.iter().map(ToString::to_string).collect();
                write!(f, " <- {}", preds.join(", "))?;
            }
            writeln!(f)?;
            for phi in &bb.phis {
                let inputs: Vec<_> = phi
                    .inputs
                    .iter()
                    .map(|(b, v)| format!("{}: {}", b, v))
                    .collect();
                writeln!(f, "  {}: {} = phi [{}]", phi.value, phi.ty, inputs.join(", "))?;
            }
            for stmt in &bb.stmts {
                writeln!(f, "  {} = {}", stmt.value, stmt.op)?;
            }
            match &bb.terminator {
                Some(term) => writeln!(f, "  {}", term)?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }
        Ok(())
    }
}
