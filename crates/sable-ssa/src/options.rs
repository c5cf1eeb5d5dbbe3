//! Compiler configuration

/// What kind of body a unit is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnitKind {
    /// Closure body
    #[default]
    Function,
    /// Promise (lazily evaluated argument) body
    Promise,
    /// Top-level expression. Compiled like [`UnitKind::Function`]; the
    /// kind only shows up in traces.
    TopLevel,
}

/// Options for one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Kind of the unit being compiled
    pub unit_kind: UnitKind,
    /// Delete blocks left without predecessors
    pub prune_unreachable: bool,
    /// Replace phis that have a single distinct input
    pub simplify_phis: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            unit_kind: UnitKind::Function,
            prune_unreachable: true,
            simplify_phis: true,
        }
    }
}

impl CompileOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unit kind
    pub fn unit_kind(mut self, kind: UnitKind) -> Self {
        self.unit_kind = kind;
        self
    }

    /// Enable or disable unreachable-block pruning
    pub fn prune_unreachable(mut self, enabled: bool) -> Self {
        self.prune_unreachable = enabled;
        self
    }

    /// Enable or disable trivial-phi simplification
    pub fn simplify_phis(mut self, enabled: bool) -> Self {
        self.simplify_phis = enabled;
        self
    }

    /// Skip both cleanup passes, leaving the graph exactly as translated
    pub fn raw(self) -> Self {
        self.prune_unreachable(false).simplify_phis(false)
    }
}
