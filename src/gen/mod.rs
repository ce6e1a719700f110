//! Code generation: lowered AST to assembly over virtual registers.
//!
//! The program generator lays out globals, emits the entry wrapper and the
//! environment-call builtins, and hands each remaining function to
//! [`FunGen`](func::FunGen). All intermediate values go to fresh virtual
//! registers; only the calling convention and the environment-call contract
//! use architectural registers directly.

pub mod expr;
pub mod func;
pub mod promote;

pub use func::FunGen;

use crate::asm::{
    ArchReg, AssemblyProgram, Directive, Instruction, Label, Labels, Register, Section,
    SectionKind, VirtualRegs,
};
use crate::ast::decl::{FunId, Program, VarId};
use crate::BackendError;

use log::debug;

use std::collections::HashMap;

/// Where a variable's value lives during one activation.
#[derive(Clone, Debug, PartialEq)]
pub enum Memory {
    /// Offset from `$fp`: positive for incoming arguments, negative for
    /// stack locals.
    Stack(i32),
    /// A label in a data section.
    Static(Label),
    /// A promoted local, living in a virtual register.
    Reg(Register),
}

const BUILTINS: [&str; 6] = ["print_i", "print_c", "print_s", "read_i", "read_c", "mcmalloc"];

/// Lowers a rewritten program to assembly over virtual registers. The label
/// allocator is handed back so register allocation can mint spill labels
/// from the same sequence.
pub fn generate(program: &Program) -> Result<(AssemblyProgram, Labels), BackendError> {
    let mut labels = Labels::new();
    let mut vregs = VirtualRegs::new();
    let mut asm = AssemblyProgram::new();

    // one slot per global, word aligned
    let mut globals: HashMap<VarId, Memory> = HashMap::new();
    if !program.globals.is_empty() {
        let section = asm.new_section(SectionKind::Data);
        for decl in &program.globals {
            let label = labels.named(&decl.name);
            section.emit_label(label.clone());
            section.emit_directive(Directive::Space(decl.ty.aligned_bytes()));
            globals.insert(decl.id, Memory::Static(label));
        }
    }

    let fun_labels: HashMap<FunId, Label> = program
        .funcs
        .iter()
        .map(|fun| (fun.id, labels.named(&fun.name)))
        .collect();

    let main = program
        .funcs
        .iter()
        .find(|fun| fun.name == "main")
        .ok_or(BackendError::MissingMain)?;
    emit_entry(asm.new_section(SectionKind::Text), labels.entry(), &fun_labels[&main.id]);

    for fun in &program.funcs {
        let label = fun_labels[&fun.id].clone();
        if BUILTINS.contains(&fun.name.as_str()) {
            emit_builtin(asm.new_section(SectionKind::Text), &fun.name, label);
            continue;
        }
        let gen = FunGen::new(program, fun, &fun_labels, &globals, &mut labels, &mut vregs);
        let (text, strings) = gen.generate(label);
        for section in strings {
            asm.push_section(section);
        }
        asm.push_section(text);
    }

    debug!("generated {} sections", asm.sections.len());
    Ok((asm, labels))
}

/// The process entry point: calls the rewritten `main` with the address of
/// a stack slot for its exit value, then exits with that value. Pure
/// architectural registers, so register allocation leaves it alone.
fn emit_entry(section: &mut Section, entry: Label, main: &Label) {
    let sp = Register::Arch(ArchReg::Sp);
    let t0 = Register::Arch(ArchReg::T0);
    let a0 = Register::Arch(ArchReg::A0);
    let v0 = Register::Arch(ArchReg::V0);

    section.emit_directive(Directive::Globl(entry.to_string()));
    section.emit_label(entry);
    section.comment("exit-value slot and its address as the first argument");
    section.emit(Instruction::addi(t0, sp, -4));
    section.emit(Instruction::sw(t0, sp, -8));
    section.emit(Instruction::addi(sp, sp, -8));
    section.emit(Instruction::jal(main.clone()));
    section.emit(Instruction::addi(sp, sp, 8));
    section.comment("exit with the value main stored in the slot");
    section.emit(Instruction::lw(a0, sp, -4));
    section.emit(Instruction::load_imm(v0, 17));
    section.emit(Instruction::Syscall);
}

/// Hand-written bodies for the environment-call builtins.
///
/// Builtins run frameless: their arguments sit where the caller staged
/// them, at `0($sp)` upwards, and results go out through the leading
/// return-slot pointer like any other rewritten function. The architectural
/// registers the body touches are parked below `$sp` around the call.
fn emit_builtin(section: &mut Section, name: &str, label: Label) {
    let sp = Register::Arch(ArchReg::Sp);
    let a0 = Register::Arch(ArchReg::A0);
    let a1 = Register::Arch(ArchReg::A1);
    let v0 = Register::Arch(ArchReg::V0);

    section.emit_label(label);
    match name {
        "print_i" | "print_c" | "print_s" => {
            let (code, width) = match name {
                "print_i" => (1, "lw"),
                "print_c" => (11, "lb"),
                _ => (4, "lw"),
            };
            section.emit(Instruction::sw(a0, sp, -4));
            section.emit(Instruction::sw(v0, sp, -8));
            section.emit(Instruction::Load { op: width, val: a0, addr: sp, imm: 0 });
            section.emit(Instruction::load_imm(v0, code));
            section.emit(Instruction::Syscall);
            section.emit(Instruction::lw(a0, sp, -4));
            section.emit(Instruction::lw(v0, sp, -8));
        }
        "read_i" | "read_c" => {
            let (code, width) = if name == "read_i" { (5, "sw") } else { (12, "sb") };
            section.emit(Instruction::sw(v0, sp, -4));
            section.emit(Instruction::sw(a1, sp, -8));
            section.emit(Instruction::lw(a1, sp, 0));
            section.emit(Instruction::load_imm(v0, code));
            section.emit(Instruction::Syscall);
            section.emit(Instruction::Store { op: width, val: v0, addr: a1, imm: 0 });
            section.emit(Instruction::lw(a1, sp, -8));
            section.emit(Instruction::lw(v0, sp, -4));
        }
        "mcmalloc" => {
            section.emit(Instruction::sw(a0, sp, -4));
            section.emit(Instruction::sw(v0, sp, -8));
            section.emit(Instruction::sw(a1, sp, -12));
            section.emit(Instruction::lw(a1, sp, 0));
            section.emit(Instruction::lw(a0, sp, 4));
            section.emit(Instruction::load_imm(v0, 9));
            section.emit(Instruction::Syscall);
            section.emit(Instruction::sw(v0, a1, 0));
            section.emit(Instruction::lw(a1, sp, -12));
            section.emit(Instruction::lw(v0, sp, -8));
            section.emit(Instruction::lw(a0, sp, -4));
        }
        name => unreachable!("unknown builtin {}", name),
    }
    section.emit(Instruction::jr_ra());
}
