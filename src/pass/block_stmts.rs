//! Wraps bare `if`/`while` bodies in blocks.
//!
//! Later passes splice synthesized statements and declarations into the
//! enclosing block; normalizing every control-flow body to a block first
//! means they always have one to splice into.

use crate::ast::decl::Program;
use crate::ast::stmt::{Block, Stmt};
use crate::pass::fold::{self, Fold};

pub fn rewrite(program: Program) -> Program {
    BlockStmts.fold_program(program)
}

struct BlockStmts;

impl Fold for BlockStmts {
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        fold::walk_stmt(self, stmt)
            .into_iter()
            .map(|stmt| match stmt {
                Stmt::If { cond, then_branch, else_branch } => Stmt::If {
                    cond,
                    then_branch: Box::new(ensure_block(*then_branch)),
                    else_branch: else_branch.map(|branch| Box::new(ensure_block(*branch))),
                },
                Stmt::While { cond, body } => Stmt::While {
                    cond,
                    body: Box::new(ensure_block(*body)),
                },
                stmt => stmt,
            })
            .collect()
    }
}

fn ensure_block(stmt: Stmt) -> Stmt {
    match stmt {
        already @ Stmt::Block(_) => already,
        stmt => Stmt::Block(Block::wrapping(stmt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{FunDecl, FunId, IdGen, VarId};
    use crate::ast::expr::Expr;
    use crate::ast::types::Type;

    fn program_with_body(stmts: Vec<Stmt>) -> Program {
        Program {
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: vec![FunDecl {
                id: FunId(0),
                name: "f".into(),
                ret: Type::Void,
                params: Vec::new(),
                body: Block::new(Vec::new(), stmts),
            }],
            ids: IdGen::starting_at(1),
        }
    }

    #[test]
    fn bare_branches_get_wrapped() {
        let x = Expr::var(VarId(9), Type::Int);
        let program = program_with_body(vec![Stmt::If {
            cond: Expr::int(1),
            then_branch: Box::new(Stmt::assign(x.clone(), Expr::int(2))),
            else_branch: Some(Box::new(Stmt::While {
                cond: Expr::int(0),
                body: Box::new(Stmt::assign(x, Expr::int(3))),
            })),
        }]);

        let rewritten = rewrite(program);
        let body = &rewritten.funcs[0].body.stmts;
        let Stmt::If { then_branch, else_branch, .. } = &body[0] else {
            panic!("if survives rewriting");
        };
        assert!(matches!(**then_branch, Stmt::Block(_)));
        let Stmt::Block(else_block) = &**else_branch.as_ref().unwrap() else {
            panic!("else branch wrapped");
        };
        let Stmt::While { body: loop_body, .. } = &else_block.stmts[0] else {
            panic!("loop kept inside wrapped else");
        };
        assert!(matches!(**loop_body, Stmt::Block(_)));
    }

    #[test]
    fn existing_blocks_not_rewrapped() {
        let block = Stmt::Block(Block::wrapping(Stmt::Return(None)));
        let program = program_with_body(vec![Stmt::While {
            cond: Expr::int(1),
            body: Box::new(block.clone()),
        }]);

        let rewritten = rewrite(program);
        let Stmt::While { body, .. } = &rewritten.funcs[0].body.stmts[0] else {
            panic!("loop survives rewriting");
        };
        assert_eq!(**body, block);
    }
}
