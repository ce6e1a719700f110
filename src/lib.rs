//! MIPS backend for a small typed C-like language.
//!
//! Input is a typed, name-resolved [`Program`](ast::decl::Program); output
//! is MIPS assembly text. The pipeline has three phases:
//!
//! 1. [`pass`] rewrites the tree until it matches the shapes the generator
//!    handles: blocks everywhere, no value-producing calls, no struct
//!    values in flight, all locals hoisted.
//! 2. [`gen`] lowers the rewritten tree to assembly over an unbounded
//!    supply of virtual registers.
//! 3. [`regalloc`] colors the virtual registers onto the architectural
//!    set, spilling to static storage when a section will not fit.
//!
//! The crate logs phase statistics through the `log` facade and leaves
//! installing a logger to the embedding driver.

pub mod asm;
pub mod ast;
pub mod gen;
pub mod pass;
pub mod regalloc;

use thiserror::Error;

/// The conditions this backend can reject a program for. Anything else a
/// malformed input could trigger is a frontend contract violation and
/// panics instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("program defines no main function")]
    MissingMain,
    #[error("a function exceeds the colorable register pressure")]
    RegisterPressure,
}

/// Compiles a program to MIPS assembly text.
pub fn compile(program: ast::decl::Program) -> Result<String, BackendError> {
    let program = pass::lower(program);
    let (asm, mut labels) = gen::generate(&program)?;
    let allocated = regalloc::allocate(asm, &mut labels)?;
    Ok(allocated.to_string())
}
