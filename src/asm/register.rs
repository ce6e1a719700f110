//! Architectural and virtual registers.

use std::fmt::Display;

/// The fixed MIPS register set this backend works with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArchReg {
    Zero,
    V0,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    T9,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    Sp,
    Fp,
    Ra,
}

impl Display for ArchReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchReg::Zero => "zero",
            ArchReg::V0 => "v0",
            ArchReg::A0 => "a0",
            ArchReg::A1 => "a1",
            ArchReg::A2 => "a2",
            ArchReg::A3 => "a3",
            ArchReg::T0 => "t0",
            ArchReg::T1 => "t1",
            ArchReg::T2 => "t2",
            ArchReg::T3 => "t3",
            ArchReg::T4 => "t4",
            ArchReg::T5 => "t5",
            ArchReg::T6 => "t6",
            ArchReg::T7 => "t7",
            ArchReg::T8 => "t8",
            ArchReg::T9 => "t9",
            ArchReg::S0 => "s0",
            ArchReg::S1 => "s1",
            ArchReg::S2 => "s2",
            ArchReg::S3 => "s3",
            ArchReg::S4 => "s4",
            ArchReg::S5 => "s5",
            ArchReg::S6 => "s6",
            ArchReg::S7 => "s7",
            ArchReg::Sp => "sp",
            ArchReg::Fp => "fp",
            ArchReg::Ra => "ra",
        };
        write!(f, "${}", name)
    }
}

/// Identity of a virtual register, unbounded and minted fresh per
/// intermediate value. Must not survive register allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtReg(pub usize);

impl Display for VirtReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$v_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Arch(ArchReg),
    Virtual(VirtReg),
}

impl Register {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Register::Virtual(_))
    }

    pub fn virt(&self) -> Option<VirtReg> {
        match self {
            Register::Virtual(reg) => Some(*reg),
            Register::Arch(_) => None,
        }
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Register::Arch(reg) => reg.fmt(f),
            Register::Virtual(reg) => reg.fmt(f),
        }
    }
}

impl From<ArchReg> for Register {
    fn from(reg: ArchReg) -> Register {
        Register::Arch(reg)
    }
}

impl From<VirtReg> for Register {
    fn from(reg: VirtReg) -> Register {
        Register::Virtual(reg)
    }
}

/// Sequential virtual-register allocator, threaded through code generation.
#[derive(Debug, Default)]
pub struct VirtualRegs {
    next: usize,
}

impl VirtualRegs {
    pub fn new() -> VirtualRegs {
        VirtualRegs::default()
    }

    pub fn fresh(&mut self) -> Register {
        self.next += 1;
        Register::Virtual(VirtReg(self.next - 1))
    }
}
