//! Default tree fold shared by every rewrite pass.
//!
//! A pass implements [`Fold`] and overrides the handful of hooks it cares
//! about; the `walk_*` free functions rebuild everything else unchanged.
//! Passes never mutate the input tree: declaration identity flows through
//! the `map_var`/`map_fun` hooks, which consult the pass's explicit
//! replacement map when a declaration was rebuilt under a new id.

use crate::ast::decl::{FunDecl, FunId, Program, VarDecl, VarId};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::{Block, Stmt};

pub trait Fold: Sized {
    fn fold_program(&mut self, program: Program) -> Program {
        walk_program(self, program)
    }

    fn fold_fun_decl(&mut self, fun: FunDecl) -> FunDecl {
        walk_fun_decl(self, fun)
    }

    fn fold_var_decl(&mut self, decl: VarDecl) -> VarDecl {
        decl
    }

    fn fold_block(&mut self, block: Block) -> Block {
        walk_block(self, block)
    }

    /// A statement may rewrite to any number of statements (including none).
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        walk_stmt(self, stmt)
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        walk_expr(self, expr)
    }

    /// Redirects a variable reference to its rebuilt declaration.
    fn map_var(&mut self, id: VarId) -> VarId {
        id
    }

    /// Redirects a call to its rebuilt function declaration.
    fn map_fun(&mut self, id: FunId) -> FunId {
        id
    }

    /// Statements queued up while folding a nested expression; they are
    /// spliced in front of the statement being rebuilt.
    fn take_extras(&mut self) -> Vec<Stmt> {
        Vec::new()
    }

    /// Declarations synthesized while folding; appended to the locals of the
    /// enclosing block (local-hoisting moves them up later).
    fn take_extra_locals(&mut self) -> Vec<VarDecl> {
        Vec::new()
    }
}

pub fn walk_program<F: Fold>(fold: &mut F, program: Program) -> Program {
    Program {
        structs: program.structs,
        globals: program
            .globals
            .into_iter()
            .map(|decl| fold.fold_var_decl(decl))
            .collect(),
        funcs: program
            .funcs
            .into_iter()
            .map(|fun| fold.fold_fun_decl(fun))
            .collect(),
        ids: program.ids,
    }
}

pub fn walk_fun_decl<F: Fold>(fold: &mut F, fun: FunDecl) -> FunDecl {
    FunDecl {
        id: fun.id,
        name: fun.name,
        ret: fun.ret,
        params: fun
            .params
            .into_iter()
            .map(|param| fold.fold_var_decl(param))
            .collect(),
        body: fold.fold_block(fun.body),
    }
}

pub fn walk_block<F: Fold>(fold: &mut F, block: Block) -> Block {
    let mut locals: Vec<VarDecl> = block
        .locals
        .into_iter()
        .map(|decl| fold.fold_var_decl(decl))
        .collect();

    let mut stmts = Vec::new();
    for stmt in block.stmts {
        let folded = fold.fold_stmt(stmt);
        stmts.extend(fold.take_extras());
        stmts.extend(folded);
    }

    locals.extend(fold.take_extra_locals());
    Block::new(locals, stmts)
}

pub fn walk_stmt<F: Fold>(fold: &mut F, stmt: Stmt) -> Vec<Stmt> {
    let stmt = match stmt {
        Stmt::Block(block) => Stmt::Block(fold.fold_block(block)),
        Stmt::Expr(expr) => Stmt::Expr(fold.fold_expr(expr)),
        Stmt::Assign { lvalue, rvalue } => Stmt::Assign {
            lvalue: fold.fold_expr(lvalue),
            rvalue: fold.fold_expr(rvalue),
        },
        Stmt::If { cond, then_branch, else_branch } => Stmt::If {
            cond: fold.fold_expr(cond),
            then_branch: Box::new(fold_branch(fold, *then_branch)),
            else_branch: else_branch.map(|branch| Box::new(fold_branch(fold, *branch))),
        },
        Stmt::While { cond, body } => Stmt::While {
            cond: fold.fold_expr(cond),
            body: Box::new(fold_branch(fold, *body)),
        },
        Stmt::Return(value) => Stmt::Return(value.map(|value| fold.fold_expr(value))),
    };
    vec![stmt]
}

// A control-flow body is a single statement; if a pass expanded it, the
// replacements are wrapped back up in a block.
fn fold_branch<F: Fold>(fold: &mut F, stmt: Stmt) -> Stmt {
    let mut folded = fold.fold_stmt(stmt);
    if folded.len() == 1 {
        folded.pop().expect("length checked")
    } else {
        Stmt::Block(Block::new(Vec::new(), folded))
    }
}

pub fn walk_expr<F: Fold>(fold: &mut F, expr: Expr) -> Expr {
    let Expr { kind, ty } = expr;
    let kind = match kind {
        ExprKind::Var(id) => ExprKind::Var(fold.map_var(id)),
        ExprKind::Call { fun, args } => ExprKind::Call {
            fun: fold.map_fun(fun),
            args: args.into_iter().map(|arg| fold.fold_expr(arg)).collect(),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: Box::new(fold.fold_expr(*left)),
            right: Box::new(fold.fold_expr(*right)),
        },
        ExprKind::FieldAccess { object, field } => ExprKind::FieldAccess {
            object: Box::new(fold.fold_expr(*object)),
            field,
        },
        ExprKind::ArrayAccess { array, index } => ExprKind::ArrayAccess {
            array: Box::new(fold.fold_expr(*array)),
            index: Box::new(fold.fold_expr(*index)),
        },
        ExprKind::AddressOf(inner) => ExprKind::AddressOf(Box::new(fold.fold_expr(*inner))),
        ExprKind::Deref(inner) => ExprKind::Deref(Box::new(fold.fold_expr(*inner))),
        ExprKind::Cast(inner) => ExprKind::Cast(Box::new(fold.fold_expr(*inner))),
        kind @ (ExprKind::IntLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::SizeOf(_)) => kind,
    };
    Expr { kind, ty }
}
