//! Expression nodes. Every expression carries the type the frontend
//! resolved for it; the backend never re-derives types.

use crate::ast::decl::{FunId, VarId};
use crate::ast::types::Type;

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Reference to a declared variable, bound by name analysis.
    Var(VarId),
    IntLiteral(i32),
    CharLiteral(u8),
    StringLiteral(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Call to a declared function, bound by name analysis.
    Call { fun: FunId, args: Vec<Expr> },
    FieldAccess { object: Box<Expr>, field: String },
    ArrayAccess { array: Box<Expr>, index: Box<Expr> },
    AddressOf(Box<Expr>),
    /// Pointer dereference `*e`.
    Deref(Box<Expr>),
    Cast(Box<Expr>),
    SizeOf(Type),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Expr {
        Expr { kind, ty }
    }

    pub fn var(id: VarId, ty: Type) -> Expr {
        Expr::new(ExprKind::Var(id), ty)
    }

    pub fn int(value: i32) -> Expr {
        Expr::new(ExprKind::IntLiteral(value), Type::Int)
    }

    pub fn address_of(self) -> Expr {
        let ty = self.ty.clone().pointer_to();
        Expr::new(ExprKind::AddressOf(Box::new(self)), ty)
    }

    pub fn deref(self) -> Expr {
        let ty = match &self.ty {
            Type::Pointer(inner) => (**inner).clone(),
            ty => unreachable!("dereference of non-pointer {}", ty),
        };
        Expr::new(ExprKind::Deref(Box::new(self)), ty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}
