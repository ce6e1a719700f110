//! Register promotion of function locals.
//!
//! A scalar local whose address is never taken needs no stack slot; it can
//! live in a virtual register for the whole activation and let the register
//! allocator decide where it really goes. Structs and arrays stay in memory
//! because they are accessed through addresses, and globals and parameters
//! stay in memory because their slots are part of the calling convention.

use crate::ast::decl::{FunDecl, VarId};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::{Block, Stmt};

use std::collections::HashSet;

/// The set of locals of `fun` that can live in registers.
pub fn promotable(fun: &FunDecl) -> HashSet<VarId> {
    let mut candidates: HashSet<VarId> = fun
        .body
        .locals
        .iter()
        .filter(|decl| !decl.ty.is_struct() && !decl.ty.is_array())
        .map(|decl| decl.id)
        .collect();

    demote_block(&fun.body, &mut candidates);
    candidates
}

fn demote_block(block: &Block, candidates: &mut HashSet<VarId>) {
    for stmt in &block.stmts {
        demote_stmt(stmt, candidates);
    }
}

fn demote_stmt(stmt: &Stmt, candidates: &mut HashSet<VarId>) {
    match stmt {
        Stmt::Block(block) => demote_block(block, candidates),
        Stmt::Expr(expr) => demote_expr(expr, candidates),
        Stmt::Assign { lvalue, rvalue } => {
            demote_expr(lvalue, candidates);
            demote_expr(rvalue, candidates);
        }
        Stmt::If { cond, then_branch, else_branch } => {
            demote_expr(cond, candidates);
            demote_stmt(then_branch, candidates);
            if let Some(branch) = else_branch {
                demote_stmt(branch, candidates);
            }
        }
        Stmt::While { cond, body } => {
            demote_expr(cond, candidates);
            demote_stmt(body, candidates);
        }
        Stmt::Return(value) => {
            if let Some(value) = value {
                demote_expr(value, candidates);
            }
        }
    }
}

fn demote_expr(expr: &Expr, candidates: &mut HashSet<VarId>) {
    match &expr.kind {
        // only a direct &v pins v; &v.f and &v[i] imply v is a struct or
        // array and those were never candidates
        ExprKind::AddressOf(inner) => {
            if let ExprKind::Var(id) = inner.kind {
                candidates.remove(&id);
            }
            demote_expr(inner, candidates);
        }
        ExprKind::Var(_)
        | ExprKind::IntLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::SizeOf(_) => {}
        ExprKind::Binary { left, right, .. } => {
            demote_expr(left, candidates);
            demote_expr(right, candidates);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                demote_expr(arg, candidates);
            }
        }
        ExprKind::FieldAccess { object, .. } => demote_expr(object, candidates),
        ExprKind::ArrayAccess { array, index } => {
            demote_expr(array, candidates);
            demote_expr(index, candidates);
        }
        ExprKind::Deref(inner) | ExprKind::Cast(inner) => demote_expr(inner, candidates),
    }
}
