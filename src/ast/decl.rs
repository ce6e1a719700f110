//! Declarations and the program root.
//!
//! Declarations carry stable integer ids assigned by the frontend.
//! References (`ExprKind::Var`, `ExprKind::Call`) are bound to these ids, so
//! rewrite passes can rebuild a declaration and redirect its references
//! through an explicit old-id to new-id map instead of mutating shared nodes.

use crate::ast::stmt::Block;
use crate::ast::types::{StructDecl, Type};

use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunId(pub usize);

/// Mints fresh declaration ids. Owned by the [`Program`] so passes that
/// synthesize declarations keep ids unique program-wide.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdGen {
    next: usize,
}

impl IdGen {
    pub fn starting_at(next: usize) -> IdGen {
        IdGen { next }
    }

    pub fn fresh_var(&mut self) -> VarId {
        self.next += 1;
        VarId(self.next - 1)
    }

    pub fn fresh_fun(&mut self) -> FunId {
        self.next += 1;
        FunId(self.next - 1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub id: VarId,
    pub name: String,
    pub ty: Type,
}

impl VarDecl {
    pub fn new(id: VarId, name: impl Into<String>, ty: Type) -> VarDecl {
        VarDecl { id, name: name.into(), ty }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunDecl {
    pub id: FunId,
    pub name: String,
    pub ret: Type,
    pub params: Vec<VarDecl>,
    /// Ignored for the builtin functions, which get hand-written bodies.
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub structs: Vec<Rc<StructDecl>>,
    pub globals: Vec<VarDecl>,
    pub funcs: Vec<FunDecl>,
    pub ids: IdGen,
}

impl Program {
    pub fn fun(&self, id: FunId) -> &FunDecl {
        self.funcs
            .iter()
            .find(|fun| fun.id == id)
            .expect("name analysis binds calls to declared functions")
    }
}
