//! Instruction shapes.
//!
//! Each shape knows the register it defines (if any) and the registers it
//! uses; the register allocator is driven entirely by those two views plus
//! [`Instruction::map_registers`], which rebuilds an instruction with
//! substituted registers.

use crate::asm::register::{ArchReg, Register};
use crate::asm::Label;

use std::collections::HashMap;
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Three-register instruction: `op dst,src1,src2`.
    R {
        op: &'static str,
        dst: Register,
        src1: Register,
        src2: Register,
    },
    /// Register-immediate instruction: `op dst,src,imm`.
    I {
        op: &'static str,
        dst: Register,
        src: Register,
        imm: i32,
    },
    /// `mult`/`div`: reads two registers, writes the hi/lo pair.
    MulDiv {
        op: &'static str,
        src1: Register,
        src2: Register,
    },
    /// `mflo`/`mfhi`: moves the hi/lo pair into a register.
    MoveFrom { op: &'static str, dst: Register },
    /// Conditional branch: `op src1,src2,label`. Fall-through remains
    /// possible.
    Branch {
        op: &'static str,
        src1: Register,
        src2: Register,
        target: Label,
    },
    /// `j`/`jal label`.
    Jump { op: &'static str, target: Label },
    /// `jr reg`, the return idiom.
    Jr { reg: Register },
    /// `lw`/`lb val,imm(addr)`.
    Load {
        op: &'static str,
        val: Register,
        addr: Register,
        imm: i32,
    },
    /// `sw`/`sb val,imm(addr)`.
    Store {
        op: &'static str,
        val: Register,
        addr: Register,
        imm: i32,
    },
    /// `la dst,label`.
    LoadAddress { dst: Register, label: Label },
    /// Environment call; code in `$v0`, result in `$v0`.
    Syscall,
    /// Placeholder expanded by the register allocator into saves of every
    /// physical register the function ended up using.
    PushRegisters,
    /// Placeholder expanded into the matching restores.
    PopRegisters,
}

impl Instruction {
    pub fn add(dst: Register, src1: Register, src2: Register) -> Instruction {
        Instruction::R { op: "add", dst, src1, src2 }
    }

    pub fn addi(dst: Register, src: Register, imm: i32) -> Instruction {
        Instruction::I { op: "addi", dst, src, imm }
    }

    /// Loads a small constant: `addi dst,$zero,imm`.
    pub fn load_imm(dst: Register, imm: i32) -> Instruction {
        Instruction::addi(dst, Register::Arch(ArchReg::Zero), imm)
    }

    /// Register-to-register move: `addi dst,src,0`.
    pub fn mov(dst: Register, src: Register) -> Instruction {
        Instruction::addi(dst, src, 0)
    }

    pub fn lw(val: Register, addr: Register, imm: i32) -> Instruction {
        Instruction::Load { op: "lw", val, addr, imm }
    }

    pub fn sw(val: Register, addr: Register, imm: i32) -> Instruction {
        Instruction::Store { op: "sw", val, addr, imm }
    }

    pub fn jump(target: Label) -> Instruction {
        Instruction::Jump { op: "j", target }
    }

    pub fn jal(target: Label) -> Instruction {
        Instruction::Jump { op: "jal", target }
    }

    pub fn jr_ra() -> Instruction {
        Instruction::Jr { reg: Register::Arch(ArchReg::Ra) }
    }

    /// The register this instruction writes, if any.
    pub fn def(&self) -> Option<Register> {
        match self {
            Instruction::R { dst, .. }
            | Instruction::I { dst, .. }
            | Instruction::MoveFrom { dst, .. }
            | Instruction::LoadAddress { dst, .. } => Some(*dst),
            Instruction::Load { val, .. } => Some(*val),
            Instruction::Syscall => Some(Register::Arch(ArchReg::V0)),
            Instruction::MulDiv { .. }
            | Instruction::Branch { .. }
            | Instruction::Jump { .. }
            | Instruction::Jr { .. }
            | Instruction::Store { .. }
            | Instruction::PushRegisters
            | Instruction::PopRegisters => None,
        }
    }

    /// The registers this instruction reads.
    pub fn uses(&self) -> Vec<Register> {
        match self {
            Instruction::R { src1, src2, .. }
            | Instruction::MulDiv { src1, src2, .. }
            | Instruction::Branch { src1, src2, .. } => vec![*src1, *src2],
            Instruction::I { src, .. } => vec![*src],
            Instruction::Load { addr, .. } => vec![*addr],
            Instruction::Store { val, addr, .. } => vec![*val, *addr],
            Instruction::Jr { reg } => vec![*reg],
            Instruction::Syscall => vec![Register::Arch(ArchReg::V0)],
            Instruction::MoveFrom { .. }
            | Instruction::Jump { .. }
            | Instruction::LoadAddress { .. }
            | Instruction::PushRegisters
            | Instruction::PopRegisters => Vec::new(),
        }
    }

    /// Rebuilds the instruction with every operand register substituted
    /// through `map`; registers absent from the map are kept.
    pub fn map_registers(&self, map: &HashMap<Register, Register>) -> Instruction {
        let get = |reg: &Register| *map.get(reg).unwrap_or(reg);

        match self {
            Instruction::R { op, dst, src1, src2 } => Instruction::R {
                op,
                dst: get(dst),
                src1: get(src1),
                src2: get(src2),
            },
            Instruction::I { op, dst, src, imm } => Instruction::I {
                op,
                dst: get(dst),
                src: get(src),
                imm: *imm,
            },
            Instruction::MulDiv { op, src1, src2 } => Instruction::MulDiv {
                op,
                src1: get(src1),
                src2: get(src2),
            },
            Instruction::MoveFrom { op, dst } => Instruction::MoveFrom { op, dst: get(dst) },
            Instruction::Branch { op, src1, src2, target } => Instruction::Branch {
                op,
                src1: get(src1),
                src2: get(src2),
                target: target.clone(),
            },
            Instruction::Load { op, val, addr, imm } => Instruction::Load {
                op,
                val: get(val),
                addr: get(addr),
                imm: *imm,
            },
            Instruction::Store { op, val, addr, imm } => Instruction::Store {
                op,
                val: get(val),
                addr: get(addr),
                imm: *imm,
            },
            Instruction::Jr { reg } => Instruction::Jr { reg: get(reg) },
            Instruction::LoadAddress { dst, label } => Instruction::LoadAddress {
                dst: get(dst),
                label: label.clone(),
            },
            Instruction::Jump { .. }
            | Instruction::Syscall
            | Instruction::PushRegisters
            | Instruction::PopRegisters => self.clone(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::R { op, dst, src1, src2 } => {
                write!(f, "{} {},{},{}", op, dst, src1, src2)
            }
            Instruction::I { op, dst, src, imm } => write!(f, "{} {},{},{}", op, dst, src, imm),
            Instruction::MulDiv { op, src1, src2 } => write!(f, "{} {},{}", op, src1, src2),
            Instruction::MoveFrom { op, dst } => write!(f, "{} {}", op, dst),
            Instruction::Branch { op, src1, src2, target } => {
                write!(f, "{} {},{},{}", op, src1, src2, target)
            }
            Instruction::Jump { op, target } => write!(f, "{} {}", op, target),
            Instruction::Jr { reg } => write!(f, "jr {}", reg),
            Instruction::Load { op, val, addr, imm } => {
                write!(f, "{} {},{}({})", op, val, imm, addr)
            }
            Instruction::Store { op, val, addr, imm } => {
                write!(f, "{} {},{}({})", op, val, imm, addr)
            }
            Instruction::LoadAddress { dst, label } => write!(f, "la {},{}", dst, label),
            Instruction::Syscall => write!(f, "syscall"),
            Instruction::PushRegisters | Instruction::PopRegisters => {
                unreachable!("placeholders are expanded during register allocation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::register::VirtReg;
    use crate::asm::Labels;

    fn virt(id: usize) -> Register {
        Register::Virtual(VirtReg(id))
    }

    #[test]
    fn def_and_uses_per_shape() {
        let add = Instruction::add(virt(0), virt(1), virt(2));
        assert_eq!(add.def(), Some(virt(0)));
        assert_eq!(add.uses(), vec![virt(1), virt(2)]);

        let load = Instruction::lw(virt(3), virt(4), 8);
        assert_eq!(load.def(), Some(virt(3)));
        assert_eq!(load.uses(), vec![virt(4)]);

        let store = Instruction::sw(virt(3), virt(4), 8);
        assert_eq!(store.def(), None);
        assert_eq!(store.uses(), vec![virt(3), virt(4)]);

        let mult = Instruction::MulDiv { op: "mult", src1: virt(5), src2: virt(6) };
        assert_eq!(mult.def(), None);
        assert_eq!(mult.uses(), vec![virt(5), virt(6)]);

        let mflo = Instruction::MoveFrom { op: "mflo", dst: virt(7) };
        assert_eq!(mflo.def(), Some(virt(7)));
        assert!(mflo.uses().is_empty());

        let mut labels = Labels::new();
        let la = Instruction::LoadAddress { dst: virt(8), label: labels.fresh() };
        assert_eq!(la.def(), Some(virt(8)));
        assert!(la.uses().is_empty());
    }

    #[test]
    fn map_registers_substitutes_operands() {
        let map: HashMap<Register, Register> = [
            (virt(1), Register::Arch(ArchReg::T0)),
            (virt(2), Register::Arch(ArchReg::T1)),
        ]
        .into_iter()
        .collect();

        let add = Instruction::add(virt(1), virt(1), virt(2));
        let mapped = add.map_registers(&map);
        assert_eq!(
            mapped,
            Instruction::add(
                Register::Arch(ArchReg::T0),
                Register::Arch(ArchReg::T0),
                Register::Arch(ArchReg::T1),
            )
        );

        // registers outside the map survive untouched
        let jr = Instruction::jr_ra();
        assert_eq!(jr.map_registers(&map), jr);
    }

    #[test]
    fn rendering() {
        let mut labels = Labels::new();
        let target = labels.named("top");

        assert_eq!(
            Instruction::add(
                Register::Arch(ArchReg::T0),
                Register::Arch(ArchReg::T1),
                Register::Arch(ArchReg::T2)
            )
            .to_string(),
            "add $t0,$t1,$t2"
        );
        assert_eq!(
            Instruction::lw(Register::Arch(ArchReg::T0), Register::Arch(ArchReg::Fp), -8)
                .to_string(),
            "lw $t0,-8($fp)"
        );
        assert_eq!(
            Instruction::Branch {
                op: "beq",
                src1: Register::Arch(ArchReg::T0),
                src2: Register::Arch(ArchReg::Zero),
                target: target.clone(),
            }
            .to_string(),
            "beq $t0,$zero,top_0"
        );
        assert_eq!(Instruction::jump(target).to_string(), "j top_0");
    }
}
