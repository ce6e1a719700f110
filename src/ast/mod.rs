//! The typed, name-resolved AST this backend consumes.
//!
//! The frontend (scanner, parser, name analysis, typechecking) is a separate
//! concern; by the time a [`Program`](decl::Program) reaches this crate every
//! expression carries its resolved [`Type`](types::Type) and every variable
//! and call reference is bound to a declaration id. The backend treats a
//! violation of that contract as a bug, not a user error.

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;
