//! Hoists every local declaration to the function's top-level block.
//!
//! Frame layout assigns one slot per declaration for the whole activation,
//! so nesting carries no information; flattening it lets the generator walk
//! a single list of locals per function. Shadowing is not a concern because
//! references are bound to declaration ids, not names.
//!
//! The pass is idempotent: hoisting an already-flat function changes nothing.

use crate::ast::decl::{FunDecl, Program, VarDecl};
use crate::ast::stmt::Block;
use crate::pass::fold::{self, Fold};

use std::mem;

pub fn rewrite(program: Program) -> Program {
    HoistLocals { collected: Vec::new() }.fold_program(program)
}

struct HoistLocals {
    collected: Vec<VarDecl>,
}

impl Fold for HoistLocals {
    fn fold_fun_decl(&mut self, fun: FunDecl) -> FunDecl {
        let body = self.fold_block(fun.body);
        FunDecl {
            id: fun.id,
            name: fun.name,
            ret: fun.ret,
            params: fun.params,
            body: Block::new(mem::take(&mut self.collected), body.stmts),
        }
    }

    // Locals are collected before descending so hoisting preserves
    // declaration order, outermost first.
    fn fold_block(&mut self, block: Block) -> Block {
        self.collected.extend(block.locals);
        fold::walk_block(self, Block::new(Vec::new(), block.stmts))
    }
}
