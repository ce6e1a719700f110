//! AST rewrite passes run before code generation.
//!
//! After [`lower`] the tree satisfies the generator's preconditions: every
//! control-flow body is a block, no call produces a value, no struct is
//! passed or assigned by value, and every local is declared in its
//! function's top-level block.

pub mod block_stmts;
pub mod fold;
pub mod hoist_locals;
pub mod struct_args;
pub mod struct_assign;
pub mod struct_returns;

use crate::ast::decl::Program;

use log::debug;

/// Runs the rewrite passes in their one valid order.
///
/// Struct-argument lowering synthesizes whole-struct copies and return
/// lowering synthesizes struct locals, so struct-assignment decomposition
/// has to come after both; hoisting runs last to pick up everything the
/// other passes declared.
pub fn lower(program: Program) -> Program {
    let program = block_stmts::rewrite(program);
    let program = struct_returns::rewrite(program);
    let program = struct_args::rewrite(program);
    let program = struct_assign::rewrite(program);
    let program = hoist_locals::rewrite(program);
    debug!("lowered {} functions", program.funcs.len());
    program
}
