//! Rewrites every value-returning function into a void function taking a
//! pointer to a caller-owned return slot as its first parameter.
//!
//! Applying the rewrite to all non-void functions, not only struct-returning
//! ones, keeps the calling convention uniform: after this pass no call
//! produces a value and `$v0` stays reserved for environment calls.
//!
//! At each call site a hidden local of the return type is synthesized; the
//! call becomes a statement passing the local's address and the original
//! expression position is replaced by a read of the local.

use crate::ast::decl::{FunDecl, FunId, IdGen, Program, VarDecl};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::Stmt;
use crate::ast::types::Type;
use crate::pass::fold::{self, Fold};

use std::collections::HashMap;
use std::mem;

pub fn rewrite(mut program: Program) -> Program {
    let mut pass = StructReturns {
        ids: mem::take(&mut program.ids),
        funs: HashMap::new(),
        ret_slot: None,
        extras: Vec::new(),
        extra_locals: Vec::new(),
    };

    // Mint replacement ids up front so calls to functions declared later in
    // the program still redirect.
    for fun in &program.funcs {
        if fun.ret != Type::Void {
            let new_id = pass.ids.fresh_fun();
            pass.funs.insert(fun.id, new_id);
        }
    }

    let mut program = pass.fold_program(program);
    program.ids = pass.ids;
    program
}

struct StructReturns {
    ids: IdGen,
    /// Old function id to rewritten function id.
    funs: HashMap<FunId, FunId>,
    /// Return-slot parameter of the function currently being rewritten.
    ret_slot: Option<VarDecl>,
    extras: Vec<Stmt>,
    extra_locals: Vec<VarDecl>,
}

impl Fold for StructReturns {
    fn fold_fun_decl(&mut self, fun: FunDecl) -> FunDecl {
        if fun.ret == Type::Void {
            self.ret_slot = None;
            return fold::walk_fun_decl(self, fun);
        }

        let slot = VarDecl::new(self.ids.fresh_var(), ".ret", fun.ret.clone().pointer_to());
        self.ret_slot = Some(slot.clone());

        let mut params = vec![slot];
        params.extend(fun.params);

        FunDecl {
            id: self.funs[&fun.id],
            name: fun.name,
            ret: Type::Void,
            params,
            body: self.fold_block(fun.body),
        }
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::Return(Some(value)) => {
                let value = self.fold_expr(value);
                let slot = self
                    .ret_slot
                    .clone()
                    .expect("typechecking rejects value returns in void functions");
                let target = Expr::var(slot.id, slot.ty).deref();
                vec![Stmt::assign(target, value), Stmt::Return(None)]
            }
            stmt => fold::walk_stmt(self, stmt),
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr.kind {
            ExprKind::Call { fun, args } if expr.ty != Type::Void => {
                // Inner calls first, so their calls-as-statements land ahead
                // of this one and evaluation order is preserved.
                let args: Vec<Expr> = args.into_iter().map(|arg| self.fold_expr(arg)).collect();

                let hidden = VarDecl::new(self.ids.fresh_var(), ".ret", expr.ty.clone());
                self.extra_locals.push(hidden.clone());

                let mut new_args = vec![Expr::var(hidden.id, hidden.ty.clone()).address_of()];
                new_args.extend(args);

                let call = Expr::new(
                    ExprKind::Call { fun: self.map_fun(fun), args: new_args },
                    Type::Void,
                );
                self.extras.push(Stmt::Expr(call));

                Expr::var(hidden.id, expr.ty)
            }
            _ => fold::walk_expr(self, expr),
        }
    }

    fn map_fun(&mut self, id: FunId) -> FunId {
        *self.funs.get(&id).unwrap_or(&id)
    }

    fn take_extras(&mut self) -> Vec<Stmt> {
        mem::take(&mut self.extras)
    }

    fn take_extra_locals(&mut self) -> Vec<VarDecl> {
        mem::take(&mut self.extra_locals)
    }
}
