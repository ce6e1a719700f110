//! Per-function code generation: frame layout, prologue/epilogue and
//! statement lowering.
//!
//! Frame shape, from high addresses down: incoming arguments (first one at
//! `4($fp)`), the saved caller `$fp` (which `$fp` points at), then the
//! word-aligned local slots. The prologue reserves the locals plus the
//! saved-fp word below the entry `$sp`, saves the allocated registers
//! through the `PushRegisters` placeholder and finally pushes `$ra`; the
//! epilogue mirrors it exactly.

use crate::asm::{ArchReg, Instruction, Label, Labels, Register, Section, SectionKind, VirtualRegs};
use crate::ast::decl::{FunDecl, FunId, Program, VarDecl, VarId};
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::stmt::{Block, Stmt};
use crate::ast::types::Type;
use crate::gen::{promote, Memory};

use std::collections::HashMap;

pub(super) const ZERO: Register = Register::Arch(ArchReg::Zero);
pub(super) const SP: Register = Register::Arch(ArchReg::Sp);
pub(super) const FP: Register = Register::Arch(ArchReg::Fp);
pub(super) const RA: Register = Register::Arch(ArchReg::Ra);

/// Load opcode for a value of `ty`: byte-sized values use `lb`.
pub(super) fn load_op(ty: &Type) -> &'static str {
    if ty.bytes() == 1 {
        "lb"
    } else {
        "lw"
    }
}

pub(super) fn store_op(ty: &Type) -> &'static str {
    if ty.bytes() == 1 {
        "sb"
    } else {
        "sw"
    }
}

/// Total size of the argument area a caller prepares for `params`.
pub(super) fn arg_area(params: &[VarDecl]) -> i32 {
    params.iter().map(|param| param.ty.aligned_bytes() as i32).sum()
}

pub struct FunGen<'a> {
    pub(super) program: &'a Program,
    fun: &'a FunDecl,
    pub(super) fun_labels: &'a HashMap<FunId, Label>,
    pub(super) memory: HashMap<VarId, Memory>,
    pub(super) labels: &'a mut Labels,
    pub(super) vregs: &'a mut VirtualRegs,
    pub(super) section: Section,
    /// One data section per string literal encountered in the body.
    pub(super) strings: Vec<Section>,
    epilogue: Label,
    locals_size: i32,
}

impl<'a> FunGen<'a> {
    pub fn new(
        program: &'a Program,
        fun: &'a FunDecl,
        fun_labels: &'a HashMap<FunId, Label>,
        globals: &HashMap<VarId, Memory>,
        labels: &'a mut Labels,
        vregs: &'a mut VirtualRegs,
    ) -> FunGen<'a> {
        let mut memory = globals.clone();

        let mut offset = 4;
        for param in &fun.params {
            memory.insert(param.id, Memory::Stack(offset));
            offset += param.ty.aligned_bytes() as i32;
        }

        let promoted = promote::promotable(fun);
        let mut locals_size = 0;
        for local in &fun.body.locals {
            if promoted.contains(&local.id) {
                memory.insert(local.id, Memory::Reg(vregs.fresh()));
            } else {
                locals_size += local.ty.aligned_bytes() as i32;
                memory.insert(local.id, Memory::Stack(-locals_size));
            }
        }

        let epilogue = labels.named("epilogue");
        FunGen {
            program,
            fun,
            fun_labels,
            memory,
            labels,
            vregs,
            section: Section::new(SectionKind::Text),
            strings: Vec::new(),
            epilogue,
            locals_size,
        }
    }

    /// Emits the whole function and hands back its text section plus the
    /// data sections of any string literals in the body.
    pub fn generate(mut self, label: Label) -> (Section, Vec<Section>) {
        self.section.comment(format!("function {}", self.fun.name));
        self.prologue(label);
        for stmt in &self.fun.body.stmts {
            self.stmt(stmt);
        }
        self.epilogue();
        (self.section, self.strings)
    }

    fn prologue(&mut self, label: Label) {
        self.section.emit_label(label);
        self.section.emit(Instruction::sw(FP, SP, -4));
        self.section.emit(Instruction::addi(FP, SP, -4));
        self.section.emit(Instruction::addi(SP, SP, -(4 + self.locals_size)));
        self.section.emit(Instruction::PushRegisters);
        self.section.emit(Instruction::addi(SP, SP, -4));
        self.section.emit(Instruction::sw(RA, SP, 0));
    }

    // Single epilogue per function; returns jump here. Fall-through off the
    // end of a void body arrives naturally.
    fn epilogue(&mut self) {
        self.section.emit_label(self.epilogue.clone());
        self.section.emit(Instruction::lw(RA, SP, 0));
        self.section.emit(Instruction::addi(SP, SP, 4));
        self.section.emit(Instruction::PopRegisters);
        self.section.emit(Instruction::addi(SP, SP, 4 + self.locals_size));
        self.section.emit(Instruction::lw(FP, SP, -4));
        self.section.emit(Instruction::jr_ra());
    }

    fn block(&mut self, block: &Block) {
        debug_assert!(block.locals.is_empty(), "locals are hoisted before code generation");
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        if !matches!(stmt, Stmt::Block(_)) {
            self.section.comment(stmt.describe());
        }
        match stmt {
            Stmt::Block(block) => self.block(block),
            Stmt::Expr(expr) => match &expr.kind {
                ExprKind::Call { fun, args } => self.call(*fun, args),
                _ => {
                    let _ = self.expr(expr);
                }
            },
            Stmt::Assign { lvalue, rvalue } => self.assign(lvalue, rvalue),
            Stmt::If { cond, then_branch, else_branch } => {
                let skip = self.labels.fresh();
                let cond = self.expr(cond);
                self.section.emit(Instruction::Branch {
                    op: "beq",
                    src1: cond,
                    src2: ZERO,
                    target: skip.clone(),
                });
                match else_branch {
                    None => {
                        self.stmt(then_branch);
                        self.section.emit_label(skip);
                    }
                    Some(else_branch) => {
                        let end = self.labels.fresh();
                        self.stmt(then_branch);
                        self.section.emit(Instruction::jump(end.clone()));
                        self.section.emit_label(skip);
                        self.stmt(else_branch);
                        self.section.emit_label(end);
                    }
                }
            }
            Stmt::While { cond, body } => {
                let top = self.labels.fresh();
                let end = self.labels.fresh();
                self.section.emit_label(top.clone());
                let cond = self.expr(cond);
                self.section.emit(Instruction::Branch {
                    op: "beq",
                    src1: cond,
                    src2: ZERO,
                    target: end.clone(),
                });
                self.stmt(body);
                self.section.emit(Instruction::jump(top));
                self.section.emit_label(end);
            }
            Stmt::Return(None) => {
                self.section.emit(Instruction::jump(self.epilogue.clone()));
            }
            Stmt::Return(Some(_)) => {
                unreachable!("value returns are rewritten before code generation")
            }
        }
    }

    fn assign(&mut self, lvalue: &Expr, rvalue: &Expr) {
        // a promoted local is not addressable; its assignment is a move
        if let ExprKind::Var(id) = &lvalue.kind {
            if let Memory::Reg(reg) = self.memory[id].clone() {
                let value = self.expr(rvalue);
                self.section.emit(Instruction::mov(reg, value));
                return;
            }
        }
        let addr = self.addr(lvalue);
        let value = self.expr(rvalue);
        self.section.emit(Instruction::Store {
            op: store_op(&lvalue.ty),
            val: value,
            addr,
            imm: 0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::IdGen;
    use crate::ast::expr::{BinaryOp, Expr};

    fn generate(fun: FunDecl) -> Vec<Instruction> {
        let program = Program {
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: vec![fun],
            ids: IdGen::starting_at(100),
        };
        let fun = &program.funcs[0];
        let mut labels = Labels::new();
        let mut vregs = VirtualRegs::new();
        let fun_labels: HashMap<FunId, Label> =
            [(fun.id, labels.named(&fun.name))].into_iter().collect();
        let globals = HashMap::new();
        let label = fun_labels[&fun.id].clone();
        let gen = FunGen::new(&program, fun, &fun_labels, &globals, &mut labels, &mut vregs);
        let (section, _) = gen.generate(label);
        section.instructions().cloned().collect()
    }

    #[test]
    fn frame_reserves_aligned_locals() {
        // one char local, address taken so it stays on the stack
        let c = VarDecl::new(VarId(0), "c", Type::Char);
        let fun = FunDecl {
            id: FunId(1),
            name: "f".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(
                vec![c.clone()],
                vec![Stmt::Expr(Expr::var(c.id, Type::Char).address_of())],
            ),
        };

        let instrs = generate(fun);
        // 4 for the saved fp plus one aligned slot
        assert!(instrs.contains(&Instruction::addi(SP, SP, -8)));
        assert!(instrs.contains(&Instruction::sw(FP, SP, -4)));
        assert!(instrs.contains(&Instruction::addi(FP, SP, -4)));
        assert!(instrs.contains(&Instruction::jr_ra()));
    }

    #[test]
    fn promoted_local_never_touches_the_frame() {
        // x = 1; x = x + 2; with x scalar and never addressed
        let x = VarDecl::new(VarId(0), "x", Type::Int);
        let read = Expr::var(x.id, Type::Int);
        let fun = FunDecl {
            id: FunId(1),
            name: "f".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(
                vec![x.clone()],
                vec![
                    Stmt::assign(read.clone(), Expr::int(1)),
                    Stmt::assign(
                        read.clone(),
                        Expr::new(
                            ExprKind::Binary {
                                op: BinaryOp::Add,
                                left: Box::new(read),
                                right: Box::new(Expr::int(2)),
                            },
                            Type::Int,
                        ),
                    ),
                ],
            ),
        };

        let instrs = generate(fun);
        // the frame holds only the saved fp, and nothing goes through it
        assert!(instrs.contains(&Instruction::addi(SP, SP, -4)));
        assert!(!instrs.iter().any(|instr| matches!(
            instr,
            Instruction::Load { addr: FP, .. } | Instruction::Store { addr: FP, .. }
        )));
    }

    #[test]
    fn while_loop_branches_back() {
        let fun = FunDecl {
            id: FunId(0),
            name: "f".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(
                Vec::new(),
                vec![Stmt::While {
                    cond: Expr::int(1),
                    body: Box::new(Stmt::Block(Block::wrapping(Stmt::Return(None)))),
                }],
            ),
        };

        let instrs = generate(fun);
        let branches = instrs
            .iter()
            .filter(|instr| matches!(instr, Instruction::Branch { op: "beq", .. }))
            .count();
        assert_eq!(branches, 1);
        // the loop-back jump plus the return's jump to the epilogue
        let jumps = instrs
            .iter()
            .filter(|instr| matches!(instr, Instruction::Jump { op: "j", .. }))
            .count();
        assert_eq!(jumps, 2);
    }
}
