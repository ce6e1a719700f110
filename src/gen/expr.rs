//! Expression and address generation, mutually recursive.
//!
//! `expr` produces a register holding a value, `addr` a register holding an
//! address. Struct- and array-typed expressions have no register-sized
//! value, so `expr` falls through to their address; by the time code
//! generation runs the rewrite passes guarantee such values are only ever
//! consumed through addresses.

use crate::asm::{Directive, Instruction, Label, Register, Section, SectionKind};
use crate::ast::decl::FunId;
use crate::ast::expr::{BinaryOp, Expr, ExprKind};
use crate::ast::types::{word_align, Type};
use crate::gen::func::{arg_area, load_op, store_op, FunGen, FP, SP, ZERO};
use crate::gen::Memory;

impl FunGen<'_> {
    pub(super) fn expr(&mut self, expr: &Expr) -> Register {
        if expr.ty.is_struct() || expr.ty.is_array() {
            return self.addr(expr);
        }

        match &expr.kind {
            ExprKind::Var(id) => match self.memory[id].clone() {
                // copy out of the home register so later operations never
                // clobber the variable in place
                Memory::Reg(home) => {
                    let value = self.vregs.fresh();
                    self.section.emit(Instruction::mov(value, home));
                    value
                }
                Memory::Stack(offset) => {
                    let value = self.vregs.fresh();
                    self.section.emit(Instruction::Load {
                        op: load_op(&expr.ty),
                        val: value,
                        addr: FP,
                        imm: offset,
                    });
                    value
                }
                Memory::Static(label) => {
                    let addr = self.vregs.fresh();
                    self.section.emit(Instruction::LoadAddress { dst: addr, label });
                    let value = self.vregs.fresh();
                    self.section.emit(Instruction::Load {
                        op: load_op(&expr.ty),
                        val: value,
                        addr,
                        imm: 0,
                    });
                    value
                }
            },
            ExprKind::IntLiteral(value) => {
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::load_imm(dst, *value));
                dst
            }
            ExprKind::CharLiteral(value) => {
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::load_imm(dst, *value as i32));
                dst
            }
            ExprKind::StringLiteral(literal) => {
                let label = self.string_literal(literal);
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::LoadAddress { dst, label });
                dst
            }
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right),
            ExprKind::Call { .. } => {
                unreachable!("value calls are rewritten before code generation")
            }
            ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. } | ExprKind::Deref(_) => {
                let addr = self.addr(expr);
                let value = self.vregs.fresh();
                self.section.emit(Instruction::Load {
                    op: load_op(&expr.ty),
                    val: value,
                    addr,
                    imm: 0,
                });
                value
            }
            ExprKind::AddressOf(inner) => self.addr(inner),
            ExprKind::Cast(inner) => self.expr(inner),
            ExprKind::SizeOf(ty) => {
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::load_imm(dst, ty.bytes() as i32));
                dst
            }
        }
    }

    pub(super) fn addr(&mut self, expr: &Expr) -> Register {
        match &expr.kind {
            ExprKind::Var(id) => match self.memory[id].clone() {
                Memory::Stack(offset) => {
                    let dst = self.vregs.fresh();
                    self.section.emit(Instruction::addi(dst, FP, offset));
                    dst
                }
                Memory::Static(label) => {
                    let dst = self.vregs.fresh();
                    self.section.emit(Instruction::LoadAddress { dst, label });
                    dst
                }
                Memory::Reg(_) => unreachable!("promoted locals have no address"),
            },
            ExprKind::FieldAccess { object, field } => {
                let Type::Struct(decl) = &object.ty else {
                    unreachable!("field access on non-struct {}", object.ty)
                };
                let offset = decl
                    .field_offset(field)
                    .expect("typechecking resolves field names") as i32;
                let base = self.addr(object);
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::addi(dst, base, offset));
                dst
            }
            ExprKind::ArrayAccess { array, index } => {
                let base = if array.ty.is_array() {
                    self.addr(array)
                } else {
                    // pointer indexing: the base is the pointer's value
                    self.expr(array)
                };
                let index = self.expr(index);
                let size = self.vregs.fresh();
                self.section.emit(Instruction::load_imm(size, expr.ty.bytes() as i32));
                self.section.emit(Instruction::MulDiv { op: "mult", src1: index, src2: size });
                let scaled = self.vregs.fresh();
                self.section.emit(Instruction::MoveFrom { op: "mflo", dst: scaled });
                let dst = self.vregs.fresh();
                self.section.emit(Instruction::add(dst, base, scaled));
                dst
            }
            ExprKind::Deref(inner) => self.expr(inner),
            kind => unreachable!("no address for rvalue {:?}", kind),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Register {
        match op {
            BinaryOp::And => return self.short_circuit(left, right, true),
            BinaryOp::Or => return self.short_circuit(left, right, false),
            _ => {}
        }

        let l = self.expr(left);
        let r = self.expr(right);
        let dst = self.vregs.fresh();
        match op {
            BinaryOp::Add => self.section.emit(Instruction::add(dst, l, r)),
            BinaryOp::Sub => self.section.emit(Instruction::R { op: "sub", dst, src1: l, src2: r }),
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let op_name = if op == BinaryOp::Mul { "mult" } else { "div" };
                self.section.emit(Instruction::MulDiv { op: op_name, src1: l, src2: r });
                let from = if op == BinaryOp::Mod { "mfhi" } else { "mflo" };
                self.section.emit(Instruction::MoveFrom { op: from, dst });
            }
            BinaryOp::Lt => {
                self.section.emit(Instruction::R { op: "slt", dst, src1: l, src2: r });
            }
            BinaryOp::Gt => {
                self.section.emit(Instruction::R { op: "slt", dst, src1: r, src2: l });
            }
            // a >= b is !(a < b)
            BinaryOp::Ge => {
                self.section.emit(Instruction::R { op: "slt", dst, src1: l, src2: r });
                self.section.emit(Instruction::I { op: "xori", dst, src: dst, imm: 1 });
            }
            BinaryOp::Le => {
                self.section.emit(Instruction::R { op: "slt", dst, src1: r, src2: l });
                self.section.emit(Instruction::I { op: "xori", dst, src: dst, imm: 1 });
            }
            // a != b is (0 <u a^b); equality flips it
            BinaryOp::Ne => {
                self.section.emit(Instruction::R { op: "xor", dst, src1: l, src2: r });
                self.section.emit(Instruction::R { op: "sltu", dst, src1: ZERO, src2: dst });
            }
            BinaryOp::Eq => {
                self.section.emit(Instruction::R { op: "xor", dst, src1: l, src2: r });
                self.section.emit(Instruction::R { op: "sltu", dst, src1: ZERO, src2: dst });
                self.section.emit(Instruction::I { op: "xori", dst, src: dst, imm: 1 });
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
        dst
    }

    // Logical and/or evaluate the right operand only when the left one did
    // not decide the result.
    fn short_circuit(&mut self, left: &Expr, right: &Expr, is_and: bool) -> Register {
        let dst = self.vregs.fresh();
        let decided = self.labels.fresh();
        let end = self.labels.fresh();
        let branch = if is_and { "beq" } else { "bne" };

        let l = self.expr(left);
        self.section.emit(Instruction::Branch {
            op: branch,
            src1: l,
            src2: ZERO,
            target: decided.clone(),
        });
        let r = self.expr(right);
        self.section.emit(Instruction::Branch {
            op: branch,
            src1: r,
            src2: ZERO,
            target: decided.clone(),
        });
        self.section.emit(Instruction::load_imm(dst, if is_and { 1 } else { 0 }));
        self.section.emit(Instruction::jump(end.clone()));
        self.section.emit_label(decided);
        self.section.emit(Instruction::load_imm(dst, if is_and { 0 } else { 1 }));
        self.section.emit_label(end);
        dst
    }

    /// Evaluates arguments left to right and stores them into the callee's
    /// argument area, laid out below the current `$sp` exactly where the
    /// callee's frame expects them once `$sp` has dropped.
    pub(super) fn call(&mut self, fun: FunId, args: &[Expr]) {
        let callee = self.program.fun(fun);
        let area = arg_area(&callee.params);

        let mut staged = 0;
        for (param, arg) in callee.params.iter().zip(args) {
            let value = self.expr(arg);
            self.section.emit(Instruction::Store {
                op: store_op(&param.ty),
                val: value,
                addr: SP,
                imm: staged - area,
            });
            staged += param.ty.aligned_bytes() as i32;
        }

        self.section.emit(Instruction::addi(SP, SP, -area));
        self.section.emit(Instruction::jal(self.fun_labels[&fun].clone()));
        self.section.emit(Instruction::addi(SP, SP, area));
    }

    fn string_literal(&mut self, literal: &str) -> Label {
        let label = self.labels.named("str");
        let mut section = Section::new(SectionKind::Data);
        section.emit_label(label.clone());
        section.emit_directive(Directive::Asciiz(literal.into()));
        // keep the next data emission word aligned
        let used = literal.len() as u32 + 1;
        let pad = word_align(used) - used;
        if pad > 0 {
            section.emit_directive(Directive::Space(pad));
        }
        self.strings.push(section);
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{Label, Labels, VirtualRegs};
    use crate::ast::decl::{FunDecl, IdGen, Program, VarDecl, VarId};
    use crate::ast::stmt::{Block, Stmt};

    use std::collections::HashMap;

    fn lower_expr(expr: Expr) -> Vec<Instruction> {
        lower_fun(FunDecl {
            id: FunId(90),
            name: "f".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(Vec::new(), vec![Stmt::Expr(expr)]),
        })
    }

    fn lower_fun(fun: FunDecl) -> Vec<Instruction> {
        let program = Program {
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: vec![fun],
            ids: IdGen::starting_at(200),
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

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
            Type::Int,
        )
    }

    #[test]
    fn multiplication_goes_through_lo() {
        let instrs = lower_expr(binary(BinaryOp::Mul, Expr::int(6), Expr::int(7)));
        let mult = instrs
            .iter()
            .position(|instr| matches!(instr, Instruction::MulDiv { op: "mult", .. }))
            .expect("mult emitted");
        assert!(matches!(instrs[mult + 1], Instruction::MoveFrom { op: "mflo", .. }));
    }

    #[test]
    fn modulo_reads_hi() {
        let instrs = lower_expr(binary(BinaryOp::Mod, Expr::int(7), Expr::int(3)));
        assert!(instrs
            .iter()
            .any(|instr| matches!(instr, Instruction::MoveFrom { op: "mfhi", .. })));
    }

    #[test]
    fn equality_is_xor_sltu_xori() {
        let instrs = lower_expr(binary(BinaryOp::Eq, Expr::int(1), Expr::int(2)));
        let ops: Vec<&str> = instrs
            .iter()
            .filter_map(|instr| match instr {
                Instruction::R { op, .. } => Some(*op),
                Instruction::I { op: "xori", .. } => Some("xori"),
                _ => None,
            })
            .collect();
        assert_eq!(ops, vec!["xor", "sltu", "xori"]);
    }

    #[test]
    fn logical_and_short_circuits() {
        let instrs = lower_expr(binary(BinaryOp::And, Expr::int(1), Expr::int(0)));
        let branches = instrs
            .iter()
            .filter(|instr| matches!(instr, Instruction::Branch { op: "beq", .. }))
            .count();
        assert_eq!(branches, 2);
    }

    #[test]
    fn call_stages_arguments_below_sp() {
        let callee_param = VarDecl::new(VarId(0), "x", Type::Int);
        let callee = FunDecl {
            id: FunId(1),
            name: "callee".into(),
            ret: Type::Void,
            params: vec![callee_param],
            body: Block::new(Vec::new(), Vec::new()),
        };
        let caller = FunDecl {
            id: FunId(2),
            name: "caller".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(
                Vec::new(),
                vec![Stmt::Expr(Expr::new(
                    ExprKind::Call { fun: FunId(1), args: vec![Expr::int(5)] },
                    Type::Void,
                ))],
            ),
        };

        let program = Program {
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: vec![callee, caller],
            ids: IdGen::starting_at(10),
        };
        let mut labels = Labels::new();
        let mut vregs = VirtualRegs::new();
        let fun_labels: HashMap<FunId, Label> = program
            .funcs
            .iter()
            .map(|fun| (fun.id, labels.named(&fun.name)))
            .collect();
        let globals = HashMap::new();
        let caller = &program.funcs[1];
        let label = fun_labels[&caller.id].clone();
        let gen = FunGen::new(&program, caller, &fun_labels, &globals, &mut labels, &mut vregs);
        let (section, _) = gen.generate(label);
        let instrs: Vec<Instruction> = section.instructions().cloned().collect();

        // the single word argument lands at -4($sp), then sp drops by 4;
        // the value is still virtual, which tells it apart from the
        // prologue's fp save at the same offset
        let store = instrs
            .iter()
            .position(|instr| {
                matches!(instr, Instruction::Store { op: "sw", addr: SP, imm: -4, val }
                    if val.is_virtual())
            })
            .expect("argument store emitted");
        assert_eq!(instrs[store + 1], Instruction::addi(SP, SP, -4));
        assert!(matches!(&instrs[store + 2], Instruction::Jump { op: "jal", .. }));
        assert_eq!(instrs[store + 3], Instruction::addi(SP, SP, 4));
    }

    #[test]
    fn global_reads_go_through_la() {
        let g = VarDecl::new(VarId(0), "g", Type::Int);
        let fun = FunDecl {
            id: FunId(1),
            name: "f".into(),
            ret: Type::Void,
            params: Vec::new(),
            body: Block::new(
                Vec::new(),
                vec![Stmt::Expr(Expr::var(g.id, Type::Int))],
            ),
        };
        let program = Program {
            structs: Vec::new(),
            globals: vec![g],
            funcs: vec![fun],
            ids: IdGen::starting_at(2),
        };

        let mut labels = Labels::new();
        let mut vregs = VirtualRegs::new();
        let global_label = labels.named("g");
        let globals: HashMap<VarId, crate::gen::Memory> =
            [(VarId(0), crate::gen::Memory::Static(global_label.clone()))]
                .into_iter()
                .collect();
        let fun = &program.funcs[0];
        let fun_labels: HashMap<FunId, Label> =
            [(fun.id, labels.named(&fun.name))].into_iter().collect();
        let label = fun_labels[&fun.id].clone();
        let gen = FunGen::new(&program, fun, &fun_labels, &globals, &mut labels, &mut vregs);
        let (section, _) = gen.generate(label);

        let la = section
            .instructions()
            .find(|instr| matches!(instr, Instruction::LoadAddress { .. }));
        assert!(matches!(la, Some(Instruction::LoadAddress { label, .. }) if *label == global_label));
    }

    #[test]
    fn char_width_loads_and_stores() {
        let p = VarDecl::new(VarId(0), "p", Type::Char.pointer_to());
        let fun = FunDecl {
            id: FunId(1),
            name: "f".into(),
            ret: Type::Void,
            params: vec![p.clone()],
            body: Block::new(
                Vec::new(),
                vec![Stmt::assign(
                    Expr::var(p.id, p.ty.clone()).deref(),
                    Expr::new(ExprKind::CharLiteral(b'a'), Type::Char),
                )],
            ),
        };

        let instrs = lower_fun(fun);
        assert!(instrs
            .iter()
            .any(|instr| matches!(instr, Instruction::Store { op: "sb", .. })));
    }
}
