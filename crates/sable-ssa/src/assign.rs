//! Complex assignment (`f(g(x)) <- v`).
//!
//! The place expression is flattened into layers. Layer 0 is the whole place
//! (`*tmp*[[j]]` for `a[i][[j]]`), the last layer is the access applied
//! directly to the target variable. Reads walk the layers from the variable
//! outwards, writes walk them back starting at layer 0:
//!
//! ```text
//! a[i][[j]] <- v
//!
//!   layer 1: `[`(*tmp*, i)      getter: t1 = a[i]
//!   layer 0: `[[`(*tmp*, j)     setter: t2 = `[[<-`(t1, j, value = v)
//!   layer 1                     setter: t3 = `[<-`(a, i, value = *vtmp*)
//!   a <- t3
//! ```

use sable_bytecode::{Ast, AstArg};

use crate::error::Fault;
use crate::ir::{CallSite, Scope};

/// One layer of a flattened place
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceStep {
    /// Layer as written
    pub original: Ast,
    /// Layer with its sub-target replaced by `*tmp*`
    pub rewritten: Ast,
}

impl PlaceStep {
    /// Descriptor of the getter call for this layer
    pub fn getter_site(&self) -> CallSite {
        CallSite::Place {
            original: self.original.clone(),
            rewritten: self.rewritten.clone(),
        }
    }

    /// Descriptor of the setter call for this layer, `fun<-`(*tmp*, ..., value = `value`)
    pub fn setter_site(&self, value: Ast) -> Result<CallSite, Fault> {
        let fun = self.rewritten.fun_name().ok_or_else(|| {
            Fault::unsupported(format!(
                "assignment through non-symbol function in `{}`",
                self.original
            ))
        })?;
        let mut args = self.rewritten.args().to_vec();
        args.push(AstArg::named("value", value));
        Ok(CallSite::Place {
            original: self.original.clone(),
            rewritten: Ast::call_with(format!("{}<-", fun), args),
        })
    }
}

/// Split a place expression into its target variable and layers
pub fn flatten_place(place: &Ast) -> Result<(String, Vec<PlaceStep>), Fault> {
    let mut steps = Vec::new();
    let mut current = place;
    loop {
        match current {
            Ast::Symbol(name) if !steps.is_empty() => return Ok((name.clone(), steps)),
            Ast::Call { fun, args } => {
                let (first, rest) = args.split_first().ok_or_else(|| {
                    Fault::invalid(format!("assignment place `{}` has no arguments", current))
                })?;
                let rewritten_args = std::iter::once(AstArg::positional(Ast::tmp()))
                    .chain(rest.iter().cloned())
                    .collect();
                steps.push(PlaceStep {
                    original: current.clone(),
                    rewritten: Ast::Call {
                        fun: fun.clone(),
                        args: rewritten_args,
                    },
                });
                current = &first.value;
            }
            _ => {
                return Err(Fault::invalid(format!(
                    "invalid complex assignment target `{}`",
                    place
                )));
            }
        }
    }
}

/// An open complex assignment
#[derive(Debug, Clone, PartialEq)]
pub struct PendingComplexAssign {
    /// Local (`<-`) or super (`<<-`) assignment
    pub scope: Scope,
    /// Target variable
    pub name: String,
    rhs_ast: Ast,
    steps: Vec<PlaceStep>,
    last_getter: Option<usize>,
    last_setter: Option<usize>,
}

impl PendingComplexAssign {
    /// Open an assignment from its `place <- rhs` expression
    pub fn new(scope: Scope, symbol: &str, call: &Ast) -> Result<Self, Fault> {
        let [place, value] = call.args() else {
            return Err(Fault::invalid(format!(
                "complex assignment `{}` does not have a place and a value",
                call
            )));
        };
        let (name, steps) = flatten_place(&place.value)?;
        if name != symbol {
            return Err(Fault::AssignMismatch(format!(
                "place `{}` assigns `{}`, instruction names `{}`",
                place.value, name, symbol
            )));
        }
        Ok(Self {
            scope,
            name,
            rhs_ast: value.value.clone(),
            steps,
            last_getter: None,
            last_setter: None,
        })
    }

    /// Descriptor for the getter of `layer`; getters run from the last layer down to 1
    pub fn getter(&mut self, layer: u32) -> Result<CallSite, Fault> {
        let layer = layer as usize;
        if layer == 0 || layer >= self.steps.len() {
            return Err(self.bad_layer("getter", layer));
        }
        if self.last_setter.is_some() || self.last_getter.is_some_and(|last| layer >= last) {
            return Err(Fault::invalid(format!(
                "getter for layer {} of `{}` out of order",
                layer, self.name
            )));
        }
        self.last_getter = Some(layer);
        Ok(self.steps[layer].getter_site())
    }

    /// Descriptor for the setter of `layer`; setters run from layer 0 upwards
    pub fn setter(&mut self, layer: u32) -> Result<CallSite, Fault> {
        let layer = layer as usize;
        if layer >= self.steps.len() {
            return Err(self.bad_layer("setter", layer));
        }
        if self.last_setter.is_some_and(|last| layer <= last) {
            return Err(Fault::invalid(format!(
                "setter for layer {} of `{}` out of order",
                layer, self.name
            )));
        }
        self.last_setter = Some(layer);
        let value = if layer == 0 {
            self.rhs_ast.clone()
        } else {
            Ast::vtmp()
        };
        self.steps[layer].setter_site(value)
    }

    fn bad_layer(&self, what: &str, layer: usize) -> Fault {
        Fault::invalid(format!(
            "{} layer {} outside place of `{}` ({} layers)",
            what,
            layer,
            self.name,
            self.steps.len()
        ))
    }
}
