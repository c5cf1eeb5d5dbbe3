//! Bytecode instructions (opcodes)

use serde::{Deserialize, Serialize};

use crate::operand::{AstIndex, ConstantIndex, Label, SymbolIndex};

/// Bytecode opcodes
///
/// Stack-based instruction set. Operands are carried by [`Instruction`]; the
/// opcode alone names the operation for diagnostics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Constants ====================
    /// Push constant: [] -> [constants\[idx\]]
    LdConst,
    /// Push null
    LdNull,
    /// Push TRUE
    LdTrue,
    /// Push FALSE
    LdFalse,

    // ==================== Variables ====================
    /// Push variable value
    GetVar,
    /// Push variable value, missing arguments allowed
    GetVarMissOk,
    /// Push `..n` value
    DdVal,
    /// Push `..n` value, missing arguments allowed
    DdValMissOk,
    /// Store top into local variable, value stays on the stack
    SetVar,
    /// Store top into enclosing-scope variable (`<<-`)
    SetVar2,

    // ==================== Stack ====================
    /// Drop top
    Pop,
    /// Duplicate top
    Dup,
    /// Push a copy of the second element
    Dup2nd,
    /// Exchange the two top elements
    Swap,
    /// [a, b] -> [null]
    SetLoopVal,
    /// Mark result invisible
    Invisible,
    /// Mark result visible
    Visible,

    // ==================== Control Flow ====================
    /// Unconditional jump
    Goto,
    /// Pop condition, jump if false
    BrIfNot,
    /// Return top from the unit
    Return,
    /// Return top from the enclosing function (non-local)
    ReturnJmp,
    /// Multi-way jump through jump tables
    Switch,
    /// `&&` first operand
    And1st,
    /// `&&` second operand
    And2nd,
    /// `||` first operand
    Or1st,
    /// `||` second operand
    Or2nd,

    // ==================== Loops ====================
    /// Open a while/repeat loop context
    StartLoopCntxt,
    /// Close a while/repeat loop context
    EndLoopCntxt,
    /// `next`
    DoLoopNext,
    /// `break`
    DoLoopBreak,
    /// Open a for loop over the popped sequence
    StartFor,
    /// End of a for loop body
    StepFor,
    /// Close a for loop context
    EndFor,

    // ==================== Calls ====================
    /// Begin call of a function found by name
    GetFun,
    /// Begin call of a global function
    GetGlobFun,
    /// Begin call of a function bound to a symbol
    GetSymFun,
    /// Begin call of a builtin
    GetBuiltin,
    /// Begin call of an internal builtin
    GetIntlBuiltin,
    /// Begin call of the popped function value
    CheckFun,
    /// Add promise argument
    MakeProm,
    /// Add missing argument
    DoMissing,
    /// Add `...` expansion
    DoDots,
    /// Name the last argument
    SetTag,
    /// Pop and add argument
    PushArg,
    /// Add constant argument
    PushConstArg,
    /// Add null argument
    PushNullArg,
    /// Add TRUE argument
    PushTrueArg,
    /// Add FALSE argument
    PushFalseArg,
    /// Finish call
    Call,
    /// Finish builtin call
    CallBuiltin,
    /// Call a special on its unevaluated arguments
    CallSpecial,
    /// Push a closure
    MakeClosure,

    // ==================== Arithmetic ====================
    /// lhs + rhs
    Add,
    /// lhs - rhs
    Sub,
    /// lhs * rhs
    Mul,
    /// lhs / rhs
    Div,
    /// lhs ^ rhs
    Expt,
    /// sqrt(x)
    Sqrt,
    /// exp(x)
    Exp,
    /// -x
    UMinus,
    /// +x
    UPlus,
    /// lhs:rhs
    Colon,
    /// seq_along(x)
    SeqAlong,
    /// seq_len(x)
    SeqLen,
    /// log(x)
    Log,
    /// log(x, base)
    LogBase,
    /// One-argument math function by table index
    Math1,

    // ==================== Comparison / Logic ====================
    /// lhs == rhs
    Eq,
    /// lhs != rhs
    Ne,
    /// lhs < rhs
    Lt,
    /// lhs <= rhs
    Le,
    /// lhs >= rhs
    Ge,
    /// lhs > rhs
    Gt,
    /// lhs & rhs
    And,
    /// lhs | rhs
    Or,
    /// !x
    Not,

    // ==================== Type Tests ====================
    /// is.null
    IsNull,
    /// is.logical
    IsLogical,
    /// is.integer
    IsInteger,
    /// is.double
    IsDouble,
    /// is.complex
    IsComplex,
    /// is.character
    IsCharacter,
    /// is.symbol
    IsSymbol,
    /// is.object
    IsObject,
    /// is.numeric
    IsNumeric,

    // ==================== Complex Assignment ====================
    /// Open a local complex assignment
    StartAssign,
    /// Close a local complex assignment
    EndAssign,
    /// Open a super complex assignment
    StartAssign2,
    /// Close a super complex assignment
    EndAssign2,
    /// Generic getter call for one place layer
    GetterCall,
    /// Generic setter call for one place layer
    SetterCall,

    // ==================== Generic Dispatch ====================
    /// Open `x[...]`
    StartSubset,
    /// Close `x[...]`
    DfltSubset,
    /// Open `x[[...]]`
    StartSubset2,
    /// Close `x[[...]]`
    DfltSubset2,
    /// Open `x[...] <- v`
    StartSubassign,
    /// Close `x[...] <- v`
    DfltSubassign,
    /// Open `x[[...]] <- v`
    StartSubassign2,
    /// Close `x[[...]] <- v`
    DfltSubassign2,
    /// Open `c(...)`
    StartC,
    /// Close `c(...)`
    DfltC,
    /// Open `x[...]` with stack-passed indices
    StartSubsetN,
    /// Close `x[...]` with stack-passed indices
    DfltSubsetN,
    /// Open `x[[...]]` with stack-passed indices
    StartSubset2N,
    /// Close `x[[...]]` with stack-passed indices
    DfltSubset2N,
    /// Open `x[...] <- v` with stack-passed indices
    StartSubassignN,
    /// Close `x[...] <- v` with stack-passed indices
    DfltSubassignN,
    /// Open `x[[...]] <- v` with stack-passed indices
    StartSubassign2N,
    /// Close `x[[...]] <- v` with stack-passed indices
    DfltSubassign2N,
    /// Legacy `x$name`
    Dollar,
    /// Legacy `x$name <- v`
    DollarGets,
    /// Guard against shadowed base functions
    BaseGuard,

    // ==================== Reference Counts ====================
    /// Increment link count of top
    IncLnk,
    /// Decrement link count of top
    DecLnk,
    /// Decrement link count of the top n
    DecLnkN,
    /// Increment link count of the stack
    IncLnkStk,
    /// Decrement link count of the stack
    DecLnkStk,
}

impl Opcode {
    /// Get the name of this opcode
    pub const fn name(self) -> &'static str {
        match self {
            // Constants
            Self::LdConst => "LDCONST",
            Self::LdNull => "LDNULL",
            Self::LdTrue => "LDTRUE",
            Self::LdFalse => "LDFALSE",
            // Variables
            Self::GetVar => "GETVAR",
            Self::GetVarMissOk => "GETVAR_MISSOK",
            Self::DdVal => "DDVAL",
            Self::DdValMissOk => "DDVAL_MISSOK",
            Self::SetVar => "SETVAR",
            Self::SetVar2 => "SETVAR2",
            // Stack
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Dup2nd => "DUP2ND",
            Self::Swap => "SWAP",
            Self::SetLoopVal => "SETLOOPVAL",
            Self::Invisible => "INVISIBLE",
            Self::Visible => "VISIBLE",
            // Control flow
            Self::Goto => "GOTO",
            Self::BrIfNot => "BRIFNOT",
            Self::Return => "RETURN",
            Self::ReturnJmp => "RETURNJMP",
            Self::Switch => "SWITCH",
            Self::And1st => "AND1ST",
            Self::And2nd => "AND2ND",
            Self::Or1st => "OR1ST",
            Self::Or2nd => "OR2ND",
            // Loops
            Self::StartLoopCntxt => "STARTLOOPCNTXT",
            Self::EndLoopCntxt => "ENDLOOPCNTXT",
            Self::DoLoopNext => "DOLOOPNEXT",
            Self::DoLoopBreak => "DOLOOPBREAK",
            Self::StartFor => "STARTFOR",
            Self::StepFor => "STEPFOR",
            Self::EndFor => "ENDFOR",
            // Calls
            Self::GetFun => "GETFUN",
            Self::GetGlobFun => "GETGLOBFUN",
            Self::GetSymFun => "GETSYMFUN",
            Self::GetBuiltin => "GETBUILTIN",
            Self::GetIntlBuiltin => "GETINTLBUILTIN",
            Self::CheckFun => "CHECKFUN",
            Self::MakeProm => "MAKEPROM",
            Self::DoMissing => "DOMISSING",
            Self::DoDots => "DODOTS",
            Self::SetTag => "SETTAG",
            Self::PushArg => "PUSHARG",
            Self::PushConstArg => "PUSHCONSTARG",
            Self::PushNullArg => "PUSHNULLARG",
            Self::PushTrueArg => "PUSHTRUEARG",
            Self::PushFalseArg => "PUSHFALSEARG",
            Self::Call => "CALL",
            Self::CallBuiltin => "CALLBUILTIN",
            Self::CallSpecial => "CALLSPECIAL",
            Self::MakeClosure => "MAKECLOSURE",
            // Arithmetic
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Expt => "EXPT",
            Self::Sqrt => "SQRT",
            Self::Exp => "EXP",
            Self::UMinus => "UMINUS",
            Self::UPlus => "UPLUS",
            Self::Colon => "COLON",
            Self::SeqAlong => "SEQALONG",
            Self::SeqLen => "SEQLEN",
            Self::Log => "LOG",
            Self::LogBase => "LOGBASE",
            Self::Math1 => "MATH1",
            // Comparison / logic
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Ge => "GE",
            Self::Gt => "GT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            // Type tests
            Self::IsNull => "ISNULL",
            Self::IsLogical => "ISLOGICAL",
            Self::IsInteger => "ISINTEGER",
            Self::IsDouble => "ISDOUBLE",
            Self::IsComplex => "ISCOMPLEX",
            Self::IsCharacter => "ISCHARACTER",
            Self::IsSymbol => "ISSYMBOL",
            Self::IsObject => "ISOBJECT",
            Self::IsNumeric => "ISNUMERIC",
            // Complex assignment
            Self::StartAssign => "STARTASSIGN",
            Self::EndAssign => "ENDASSIGN",
            Self::StartAssign2 => "STARTASSIGN2",
            Self::EndAssign2 => "ENDASSIGN2",
            Self::GetterCall => "GETTER_CALL",
            Self::SetterCall => "SETTER_CALL",
            // Generic dispatch
            Self::StartSubset => "STARTSUBSET",
            Self::DfltSubset => "DFLTSUBSET",
            Self::StartSubset2 => "STARTSUBSET2",
            Self::DfltSubset2 => "DFLTSUBSET2",
            Self::StartSubassign => "STARTSUBASSIGN",
            Self::DfltSubassign => "DFLTSUBASSIGN",
            Self::StartSubassign2 => "STARTSUBASSIGN2",
            Self::DfltSubassign2 => "DFLTSUBASSIGN2",
            Self::StartC => "STARTC",
            Self::DfltC => "DFLTC",
            Self::StartSubsetN => "STARTSUBSET_N",
            Self::DfltSubsetN => "SUBSET_N",
            Self::StartSubset2N => "STARTSUBSET2_N",
            Self::DfltSubset2N => "SUBSET2_N",
            Self::StartSubassignN => "STARTSUBASSIGN_N",
            Self::DfltSubassignN => "SUBASSIGN_N",
            Self::StartSubassign2N => "STARTSUBASSIGN2_N",
            Self::DfltSubassign2N => "SUBASSIGN2_N",
            Self::Dollar => "DOLLAR",
            Self::DollarGets => "DOLLARGETS",
            Self::BaseGuard => "BASEGUARD",
            // Reference counts
            Self::IncLnk => "INCLNK",
            Self::DecLnk => "DECLNK",
            Self::DecLnkN => "DECLNK_N",
            Self::IncLnkStk => "INCLNKSTK",
            Self::DecLnkStk => "DECLNKSTK",
        }
    }
}

/// A decoded instruction with its operands
///
/// `call` operands are call-site descriptors (the source expression of the
/// operation), used for diagnostics and dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Instruction {
    // Constants
    LdConst { constant: ConstantIndex },
    LdNull,
    LdTrue,
    LdFalse,

    // Variables
    GetVar { symbol: SymbolIndex },
    GetVarMissOk { symbol: SymbolIndex },
    DdVal { symbol: SymbolIndex },
    DdValMissOk { symbol: SymbolIndex },
    SetVar { symbol: SymbolIndex },
    SetVar2 { symbol: SymbolIndex },

    // Stack
    Pop,
    Dup,
    Dup2nd,
    Swap,
    SetLoopVal,
    Invisible,
    Visible,

    // Control flow
    Goto { label: Label },
    BrIfNot { call: AstIndex, label: Label },
    Return,
    ReturnJmp,
    /// `names`/`chr_labels` are present together: one label per name plus a
    /// trailing default. `num_labels` holds one label per arm plus a default.
    Switch {
        call: AstIndex,
        names: Option<ConstantIndex>,
        chr_labels: Option<ConstantIndex>,
        num_labels: ConstantIndex,
    },
    And1st { call: AstIndex, label: Label },
    And2nd { call: AstIndex },
    Or1st { call: AstIndex, label: Label },
    Or2nd { call: AstIndex },

    // Loops
    StartLoopCntxt { end: Label },
    EndLoopCntxt,
    DoLoopNext,
    DoLoopBreak,
    StartFor {
        call: AstIndex,
        symbol: SymbolIndex,
        end: Label,
    },
    StepFor,
    EndFor,

    // Calls
    GetFun { symbol: SymbolIndex },
    GetGlobFun { symbol: SymbolIndex },
    GetSymFun { symbol: SymbolIndex },
    GetBuiltin { symbol: SymbolIndex },
    GetIntlBuiltin { symbol: SymbolIndex },
    CheckFun,
    MakeProm { code: ConstantIndex },
    DoMissing,
    DoDots,
    SetTag { symbol: SymbolIndex },
    PushArg,
    PushConstArg { constant: ConstantIndex },
    PushNullArg,
    PushTrueArg,
    PushFalseArg,
    Call { call: AstIndex },
    CallBuiltin { call: AstIndex },
    CallSpecial { call: AstIndex },
    MakeClosure { closure: ConstantIndex },

    // Arithmetic
    Add { call: AstIndex },
    Sub { call: AstIndex },
    Mul { call: AstIndex },
    Div { call: AstIndex },
    Expt { call: AstIndex },
    Sqrt { call: AstIndex },
    Exp { call: AstIndex },
    UMinus { call: AstIndex },
    UPlus { call: AstIndex },
    Colon { call: AstIndex },
    SeqAlong { call: AstIndex },
    SeqLen { call: AstIndex },
    Log { call: AstIndex },
    LogBase { call: AstIndex },
    Math1 { call: AstIndex, op: u32 },

    // Comparison / logic
    Eq { call: AstIndex },
    Ne { call: AstIndex },
    Lt { call: AstIndex },
    Le { call: AstIndex },
    Ge { call: AstIndex },
    Gt { call: AstIndex },
    And { call: AstIndex },
    Or { call: AstIndex },
    Not { call: AstIndex },

    // Type tests
    IsNull,
    IsLogical,
    IsInteger,
    IsDouble,
    IsComplex,
    IsCharacter,
    IsSymbol,
    IsObject,
    IsNumeric,

    // Complex assignment
    /// `call` is the whole assignment expression, e.g. `a[i][[j]] <- v`
    StartAssign { symbol: SymbolIndex, call: AstIndex },
    EndAssign { symbol: SymbolIndex },
    StartAssign2 { symbol: SymbolIndex, call: AstIndex },
    EndAssign2 { symbol: SymbolIndex },
    /// `layer` 0 is the outermost call of the place
    GetterCall { layer: u32 },
    SetterCall { layer: u32 },

    // Generic dispatch
    StartSubset { call: AstIndex, after: Label },
    DfltSubset,
    StartSubset2 { call: AstIndex, after: Label },
    DfltSubset2,
    StartSubassign { call: AstIndex, after: Label },
    DfltSubassign,
    StartSubassign2 { call: AstIndex, after: Label },
    DfltSubassign2,
    StartC { call: AstIndex, after: Label },
    DfltC,
    StartSubsetN { call: AstIndex, after: Label },
    DfltSubsetN { n: u32 },
    StartSubset2N { call: AstIndex, after: Label },
    DfltSubset2N { n: u32 },
    StartSubassignN { call: AstIndex, after: Label },
    DfltSubassignN { n: u32 },
    StartSubassign2N { call: AstIndex, after: Label },
    DfltSubassign2N { n: u32 },
    Dollar { call: AstIndex, symbol: SymbolIndex },
    DollarGets { call: AstIndex, symbol: SymbolIndex },
    BaseGuard { call: AstIndex, label: Label },

    // Reference counts
    IncLnk,
    DecLnk,
    DecLnkN { n: u32 },
    IncLnkStk,
    DecLnkStk,
}

impl Instruction {
    /// Opcode of this instruction
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::LdConst { .. } => Opcode::LdConst,
            Self::LdNull => Opcode::LdNull,
            Self::LdTrue => Opcode::LdTrue,
            Self::LdFalse => Opcode::LdFalse,
            Self::GetVar { .. } => Opcode::GetVar,
            Self::GetVarMissOk { .. } => Opcode::GetVarMissOk,
            Self::DdVal { .. } => Opcode::DdVal,
            Self::DdValMissOk { .. } => Opcode::DdValMissOk,
            Self::SetVar { .. } => Opcode::SetVar,
            Self::SetVar2 { .. } => Opcode::SetVar2,
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::Dup2nd => Opcode::Dup2nd,
            Self::Swap => Opcode::Swap,
            Self::SetLoopVal => Opcode::SetLoopVal,
            Self::Invisible => Opcode::Invisible,
            Self::Visible => Opcode::Visible,
            Self::Goto { .. } => Opcode::Goto,
            Self::BrIfNot { .. } => Opcode::BrIfNot,
            Self::Return => Opcode::Return,
            Self::ReturnJmp => Opcode::ReturnJmp,
            Self::Switch { .. } => Opcode::Switch,
            Self::And1st { .. } => Opcode::And1st,
            Self::And2nd { .. } => Opcode::And2nd,
            Self::Or1st { .. } => Opcode::Or1st,
            Self::Or2nd { .. } => Opcode::Or2nd,
            Self::StartLoopCntxt { .. } => Opcode::StartLoopCntxt,
            Self::EndLoopCntxt => Opcode::EndLoopCntxt,
            Self::DoLoopNext => Opcode::DoLoopNext,
            Self::DoLoopBreak => Opcode::DoLoopBreak,
            Self::StartFor { .. } => Opcode::StartFor,
            Self::StepFor => Opcode::StepFor,
            Self::EndFor => Opcode::EndFor,
            Self::GetFun { .. } => Opcode::GetFun,
            Self::GetGlobFun { .. } => Opcode::GetGlobFun,
            Self::GetSymFun { .. } => Opcode::GetSymFun,
            Self::GetBuiltin { .. } => Opcode::GetBuiltin,
            Self::GetIntlBuiltin { .. } => Opcode::GetIntlBuiltin,
            Self::CheckFun => Opcode::CheckFun,
            Self::MakeProm { .. } => Opcode::MakeProm,
            Self::DoMissing => Opcode::DoMissing,
            Self::DoDots => Opcode::DoDots,
            Self::SetTag { .. } => Opcode::SetTag,
            Self::PushArg => Opcode::PushArg,
            Self::PushConstArg { .. } => Opcode::PushConstArg,
            Self::PushNullArg => Opcode::PushNullArg,
            Self::PushTrueArg => Opcode::PushTrueArg,
            Self::PushFalseArg => Opcode::PushFalseArg,
            Self::Call { .. } => Opcode::Call,
            Self::CallBuiltin { .. } => Opcode::CallBuiltin,
            Self::CallSpecial { .. } => Opcode::CallSpecial,
            Self::MakeClosure { .. } => Opcode::MakeClosure,
            Self::Add { .. } => Opcode::Add,
            Self::Sub { .. } => Opcode::Sub,
            Self::Mul { .. } => Opcode::Mul,
            Self::Div { .. } => Opcode::Div,
            Self::Expt { .. } => Opcode::Expt,
            Self::Sqrt { .. } => Opcode::Sqrt,
            Self::Exp { .. } => Opcode::Exp,
            Self::UMinus { .. } => Opcode::UMinus,
            Self::UPlus { .. } => Opcode::UPlus,
            Self::Colon { .. } => Opcode::Colon,
            Self::SeqAlong { .. } => Opcode::SeqAlong,
            Self::SeqLen { .. } => Opcode::SeqLen,
            Self::Log { .. } => Opcode::Log,
            Self::LogBase { .. } => Opcode::LogBase,
            Self::Math1 { .. } => Opcode::Math1,
            Self::Eq { .. } => Opcode::Eq,
            Self::Ne { .. } => Opcode::Ne,
            Self::Lt { .. } => Opcode::Lt,
            Self::Le { .. } => Opcode::Le,
            Self::Ge { .. } => Opcode::Ge,
            Self::Gt { .. } => Opcode::Gt,
            Self::And { .. } => Opcode::And,
            Self::Or { .. } => Opcode::Or,
            Self::Not { .. } => Opcode::Not,
            Self::IsNull => Opcode::IsNull,
            Self::IsLogical => Opcode::IsLogical,
            Self::IsInteger => Opcode::IsInteger,
            Self::IsDouble => Opcode::IsDouble,
            Self::IsComplex => Opcode::IsComplex,
            Self::IsCharacter => Opcode::IsCharacter,
            Self::IsSymbol => Opcode::IsSymbol,
            Self::IsObject => Opcode::IsObject,
            Self::IsNumeric => Opcode::IsNumeric,
            Self::StartAssign { .. } => Opcode::StartAssign,
            Self::EndAssign { .. } => Opcode::EndAssign,
            Self::StartAssign2 { .. } => Opcode::StartAssign2,
            Self::EndAssign2 { .. } => Opcode::EndAssign2,
            Self::GetterCall { .. } => Opcode::GetterCall,
            Self::SetterCall { .. } => Opcode::SetterCall,
            Self::StartSubset { .. } => Opcode::StartSubset,
            Self::DfltSubset => Opcode::DfltSubset,
            Self::StartSubset2 { .. } => Opcode::StartSubset2,
            Self::DfltSubset2 => Opcode::DfltSubset2,
            Self::StartSubassign { .. } => Opcode::StartSubassign,
            Self::DfltSubassign => Opcode::DfltSubassign,
            Self::StartSubassign2 { .. } => Opcode::StartSubassign2,
            Self::DfltSubassign2 => Opcode::DfltSubassign2,
            Self::StartC { .. } => Opcode::StartC,
            Self::DfltC => Opcode::DfltC,
            Self::StartSubsetN { .. } => Opcode::StartSubsetN,
            Self::DfltSubsetN { .. } => Opcode::DfltSubsetN,
            Self::StartSubset2N { .. } => Opcode::StartSubset2N,
            Self::DfltSubset2N { .. } => Opcode::DfltSubset2N,
            Self::StartSubassignN { .. } => Opcode::StartSubassignN,
            Self::DfltSubassignN { .. } => Opcode::DfltSubassignN,
            Self::StartSubassign2N { .. } => Opcode::StartSubassign2N,
            Self::DfltSubassign2N { .. } => Opcode::DfltSubassign2N,
            Self::Dollar { .. } => Opcode::Dollar,
            Self::DollarGets { .. } => Opcode::DollarGets,
            Self::BaseGuard { .. } => Opcode::BaseGuard,
            Self::IncLnk => Opcode::IncLnk,
            Self::DecLnk => Opcode::DecLnk,
            Self::DecLnkN { .. } => Opcode::DecLnkN,
            Self::IncLnkStk => Opcode::IncLnkStk,
            Self::DecLnkStk => Opcode::DecLnkStk,
        }
    }

    /// Name of this instruction's opcode
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.opcode().name()
    }

    /// Label operand of this instruction, if any.
    ///
    /// Jump tables referenced by `Switch` live in the constant pool and are
    /// not included.
    pub fn label(&self) -> Option<Label> {
        match self {
            Self::Goto { label }
            | Self::BrIfNot { label, .. }
            | Self::And1st { label, .. }
            | Self::Or1st { label, .. }
            | Self::BaseGuard { label, .. } => Some(*label),
            Self::StartLoopCntxt { end } | Self::StartFor { end, .. } => Some(*end),
            Self::StartSubset { after, .. }
            | Self::StartSubset2 { after, .. }
            | Self::StartSubassign { after, .. }
            | Self::StartSubassign2 { after, .. }
            | Self::StartC { after, .. }
            | Self::StartSubsetN { after, .. }
            | Self::StartSubset2N { after, .. }
            | Self::StartSubassignN { after, .. }
            | Self::StartSubassign2N { after, .. } => Some(*after),
            _ => None,
        }
    }

    /// Does control never continue to the next instruction
    pub const fn diverts(&self) -> bool {
        matches!(
            self,
            Self::Goto { .. }
                | Self::Return
                | Self::ReturnJmp
                | Self::Switch { .. }
                | Self::DoLoopNext
                | Self::DoLoopBreak
                | Self::StepFor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_name() {
        assert_eq!(Opcode::Add.name(), "ADD");
        assert_eq!(Opcode::DfltSubsetN.name(), "SUBSET_N");
        assert_eq!(Instruction::Return.name(), "RETURN");
    }

    #[test]
    fn test_label_operands() {
        let goto = Instruction::Goto { label: Label(3) };
        assert_eq!(goto.label(), Some(Label(3)));
        assert!(goto.diverts());

        let start = Instruction::StartSubset {
            call: AstIndex(0),
            after: Label(1),
        };
        assert_eq!(start.label(), Some(Label(1)));
        assert!(!start.diverts());
        assert_eq!(Instruction::PushArg.label(), None);
    }
}
