//! Decomposes whole-struct assignments into per-field stores.
//!
//! Both sides are first captured in hidden pointer locals so each side's
//! address computation runs exactly once, then every field is copied through
//! those pointers. Nested struct fields recurse into the same rewrite, so
//! afterwards only word- and byte-sized assignments remain.
//!
//! Must run after return-value and struct-argument lowering; those passes
//! are what guarantee every struct rvalue has an address.

use crate::ast::decl::{IdGen, Program, VarDecl};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::Stmt;
use crate::ast::types::Type;
use crate::pass::fold::{self, Fold};

use std::mem;

pub fn rewrite(mut program: Program) -> Program {
    let mut pass = StructAssigns {
        ids: mem::take(&mut program.ids),
        extra_locals: Vec::new(),
    };
    let mut program = pass.fold_program(program);
    program.ids = pass.ids;
    program
}

struct StructAssigns {
    ids: IdGen,
    extra_locals: Vec<VarDecl>,
}

impl Fold for StructAssigns {
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::Assign { lvalue, rvalue } if rvalue.ty.is_struct() => {
                let lvalue = self.fold_expr(lvalue);
                let rvalue = self.fold_expr(rvalue);

                let Type::Struct(decl) = rvalue.ty.clone() else {
                    unreachable!("is_struct checked");
                };
                let pointer_ty = rvalue.ty.clone().pointer_to();

                let laddr = VarDecl::new(self.ids.fresh_var(), ".laddr", pointer_ty.clone());
                let raddr = VarDecl::new(self.ids.fresh_var(), ".raddr", pointer_ty.clone());

                let mut stmts = vec![
                    Stmt::assign(Expr::var(laddr.id, pointer_ty.clone()), lvalue.address_of()),
                    Stmt::assign(Expr::var(raddr.id, pointer_ty.clone()), rvalue.address_of()),
                ];

                for field in &decl.fields {
                    let access = |slot: &VarDecl| {
                        Expr::new(
                            ExprKind::FieldAccess {
                                object: Box::new(
                                    Expr::var(slot.id, pointer_ty.clone()).deref(),
                                ),
                                field: field.name.clone(),
                            },
                            field.ty.clone(),
                        )
                    };
                    let copy = Stmt::assign(access(&laddr), access(&raddr));
                    // nested struct fields decompose recursively
                    stmts.extend(self.fold_stmt(copy));
                }

                self.extra_locals.push(laddr);
                self.extra_locals.push(raddr);
                stmts
            }
            stmt => fold::walk_stmt(self, stmt),
        }
    }

    fn take_extra_locals(&mut self) -> Vec<VarDecl> {
        mem::take(&mut self.extra_locals)
    }
}
