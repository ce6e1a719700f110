//! Statement nodes.

use crate::ast::decl::VarDecl;
use crate::ast::expr::Expr;

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub locals: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(locals: Vec<VarDecl>, stmts: Vec<Stmt>) -> Block {
        Block { locals, stmts }
    }

    /// A block holding a single statement and no locals, as synthesized by
    /// block normalization.
    pub fn wrapping(stmt: Stmt) -> Block {
        Block { locals: Vec::new(), stmts: vec![stmt] }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Block(Block),
    Expr(Expr),
    Assign { lvalue: Expr, rvalue: Expr },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    Return(Option<Expr>),
}

impl Stmt {
    pub fn assign(lvalue: Expr, rvalue: Expr) -> Stmt {
        Stmt::Assign { lvalue, rvalue }
    }

    /// One-line description used for assembly comments.
    pub fn describe(&self) -> &'static str {
        match self {
            Stmt::Block(_) => "block",
            Stmt::Expr(_) => "expression",
            Stmt::Assign { .. } => "assign",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::Return(_) => "return",
        }
    }
}
