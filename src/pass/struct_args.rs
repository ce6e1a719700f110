//! Passes struct arguments by pointer.
//!
//! A struct parameter is rebuilt as a pointer parameter of the same name,
//! and the body gets a fresh local struct initialized from it on entry, so
//! callee-side mutation keeps value semantics. References to the old
//! parameter are redirected to the local. Call sites wrap struct arguments
//! in an address-of.
//!
//! The synthesized copy is a whole-struct assignment; running the
//! struct-assignment pass afterwards decomposes it into field stores.

use crate::ast::decl::{FunDecl, IdGen, Program, VarDecl, VarId};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::{Block, Stmt};
use crate::pass::fold::{self, Fold};

use std::collections::HashMap;
use std::mem;

pub fn rewrite(mut program: Program) -> Program {
    let mut pass = StructArgs {
        ids: mem::take(&mut program.ids),
        vars: HashMap::new(),
    };
    let mut program = pass.fold_program(program);
    program.ids = pass.ids;
    program
}

struct StructArgs {
    ids: IdGen,
    /// Old struct-parameter id to the id of its replacement local.
    vars: HashMap<VarId, VarId>,
}

impl Fold for StructArgs {
    fn fold_fun_decl(&mut self, fun: FunDecl) -> FunDecl {
        let mut copy_locals = Vec::new();
        let mut copy_stmts = Vec::new();

        let params: Vec<VarDecl> = fun
            .params
            .into_iter()
            .map(|param| {
                if !param.ty.is_struct() {
                    return param;
                }
                let local = VarDecl::new(self.ids.fresh_var(), param.name.clone(), param.ty.clone());
                let pointer =
                    VarDecl::new(self.ids.fresh_var(), param.name, param.ty.pointer_to());
                self.vars.insert(param.id, local.id);
                copy_stmts.push(Stmt::assign(
                    Expr::var(local.id, local.ty.clone()),
                    Expr::var(pointer.id, pointer.ty.clone()).deref(),
                ));
                copy_locals.push(local);
                pointer
            })
            .collect();

        let body = self.fold_block(fun.body);
        let mut locals = copy_locals;
        locals.extend(body.locals);
        let mut stmts = copy_stmts;
        stmts.extend(body.stmts);

        FunDecl {
            id: fun.id,
            name: fun.name,
            ret: fun.ret,
            params,
            body: Block::new(locals, stmts),
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr.kind {
            ExprKind::Call { fun, args } => {
                let args = args
                    .into_iter()
                    .map(|arg| {
                        let arg = self.fold_expr(arg);
                        if arg.ty.is_struct() {
                            arg.address_of()
                        } else {
                            arg
                        }
                    })
                    .collect();
                Expr::new(ExprKind::Call { fun, args }, expr.ty)
            }
            _ => fold::walk_expr(self, expr),
        }
    }

    fn map_var(&mut self, id: VarId) -> VarId {
        *self.vars.get(&id).unwrap_or(&id)
    }
}
