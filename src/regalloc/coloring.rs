//! Chaitin-style graph coloring and instruction rewriting.
//!
//! Colors are drawn from `$t0`-`$t9` and `$s0`-`$s4`; `$s5`-`$s7` are kept
//! out of the pool as scratch for shuttling spilled values. Spilled
//! registers live in one static word each, addressed by label.

use crate::asm::register::VirtReg;
use crate::asm::{ArchReg, Instruction, Label, Labels, Register};
use crate::regalloc::interference::Interference;
use crate::BackendError;

use std::collections::{BTreeMap, HashMap, HashSet};

pub const AVAILABLE: [ArchReg; 15] = [
    ArchReg::T0,
    ArchReg::T1,
    ArchReg::T2,
    ArchReg::T3,
    ArchReg::T4,
    ArchReg::T5,
    ArchReg::T6,
    ArchReg::T7,
    ArchReg::T8,
    ArchReg::T9,
    ArchReg::S0,
    ArchReg::S1,
    ArchReg::S2,
    ArchReg::S3,
    ArchReg::S4,
];

pub const SCRATCH: [ArchReg; 3] = [ArchReg::S5, ArchReg::S6, ArchReg::S7];

/// The coloring result: where each virtual register of one section went.
#[derive(Debug)]
pub struct RegisterMap {
    colors: HashMap<VirtReg, ArchReg>,
    /// Spilled registers and their static homes, ordered for deterministic
    /// data-section emission.
    spills: BTreeMap<VirtReg, Label>,
    /// Colors actually handed out, in pool order.
    used: Vec<ArchReg>,
}

/// Simplify/spill loop: keep removing the cheapest node. A node with fewer
/// live neighbors than colors is guaranteed colorable and goes on the
/// stack; when none qualifies the most constrained node is spilled to a
/// fresh static slot. Nodes come back off the stack taking the first pool
/// color no neighbor holds.
pub fn color(graph: &Interference, labels: &mut Labels) -> Result<RegisterMap, BackendError> {
    let n = graph.nodes.len();
    let mut removed = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut spills: BTreeMap<VirtReg, Label> = BTreeMap::new();

    let degree = |i: usize, removed: &[bool]| {
        graph.adj[i].iter().filter(|&&j| !removed[j]).count()
    };

    loop {
        let live: Vec<usize> = (0..n).filter(|&i| !removed[i]).collect();
        if live.is_empty() {
            break;
        }
        // first-index tie-breaking keeps the output deterministic
        let &min = live
            .iter()
            .min_by_key(|&&i| degree(i, &removed))
            .expect("nonempty checked");
        if degree(min, &removed) < AVAILABLE.len() {
            stack.push(min);
            removed[min] = true;
        } else {
            let &victim = live
                .iter()
                .max_by_key(|&&i| degree(i, &removed))
                .expect("nonempty checked");
            spills.insert(graph.nodes[victim], labels.named("spill"));
            removed[victim] = true;
        }
    }

    let mut colors: HashMap<VirtReg, ArchReg> = HashMap::new();
    while let Some(i) = stack.pop() {
        let taken: HashSet<ArchReg> = graph.adj[i]
            .iter()
            .filter_map(|&j| colors.get(&graph.nodes[j]))
            .copied()
            .collect();
        let color = AVAILABLE
            .iter()
            .find(|color| !taken.contains(color))
            .ok_or(BackendError::RegisterPressure)?;
        colors.insert(graph.nodes[i], *color);
    }

    let used: Vec<ArchReg> = AVAILABLE
        .iter()
        .filter(|color| colors.values().any(|c| c == *color))
        .copied()
        .collect();

    Ok(RegisterMap { colors, spills, used })
}

impl RegisterMap {
    pub fn spills(&self) -> &BTreeMap<VirtReg, Label> {
        &self.spills
    }

    pub fn colored(&self) -> usize {
        self.colors.len()
    }

    /// Rewrites one instruction into its physical form. Placeholders expand
    /// into the save/restore sequences; everything else has its virtual
    /// registers substituted, with spilled uses loaded into scratch before
    /// and a spilled definition stored back after.
    pub fn rewrite(&self, instr: &Instruction) -> Vec<Instruction> {
        let sp = Register::Arch(ArchReg::Sp);
        match instr {
            Instruction::PushRegisters => {
                let mut out = Vec::new();
                for &reg in &self.saved_registers() {
                    let reg = Register::Arch(reg);
                    out.push(Instruction::addi(sp, sp, -4));
                    out.push(Instruction::sw(reg, sp, 0));
                }
                // spill homes are static, so a nested activation of this
                // function would overwrite them; park their current values
                // on the stack alongside the registers
                let shuttle = Register::Arch(SCRATCH[0]);
                for label in self.spills.values() {
                    out.push(Instruction::LoadAddress { dst: shuttle, label: label.clone() });
                    out.push(Instruction::lw(shuttle, shuttle, 0));
                    out.push(Instruction::addi(sp, sp, -4));
                    out.push(Instruction::sw(shuttle, sp, 0));
                }
                out
            }
            Instruction::PopRegisters => {
                let mut out = Vec::new();
                let value = Register::Arch(SCRATCH[0]);
                let addr = Register::Arch(SCRATCH[1]);
                for label in self.spills.values().rev() {
                    out.push(Instruction::lw(value, sp, 0));
                    out.push(Instruction::addi(sp, sp, 4));
                    out.push(Instruction::LoadAddress { dst: addr, label: label.clone() });
                    out.push(Instruction::Store { op: "sw", val: value, addr, imm: 0 });
                }
                for &reg in self.saved_registers().iter().rev() {
                    let reg = Register::Arch(reg);
                    out.push(Instruction::lw(reg, sp, 0));
                    out.push(Instruction::addi(sp, sp, 4));
                }
                out
            }
            instr => self.substitute(instr),
        }
    }

    /// Registers the prologue must preserve for the caller: every color in
    /// use plus, if anything spilled, the scratch set.
    fn saved_registers(&self) -> Vec<ArchReg> {
        let mut list = self.used.clone();
        if !self.spills.is_empty() {
            list.extend(SCRATCH);
        }
        list
    }

    fn substitute(&self, instr: &Instruction) -> Vec<Instruction> {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        let mut map: HashMap<Register, Register> = HashMap::new();
        let mut scratch = SCRATCH.iter().map(|&reg| Register::Arch(reg));

        for reg in instr.uses() {
            let Some(virt) = reg.virt() else { continue };
            if map.contains_key(&reg) {
                continue;
            }
            if let Some(&color) = self.colors.get(&virt) {
                map.insert(reg, Register::Arch(color));
            } else if let Some(label) = self.spills.get(&virt) {
                let slot = scratch.next().expect("at most two register uses per shape");
                pre.push(Instruction::LoadAddress { dst: slot, label: label.clone() });
                pre.push(Instruction::lw(slot, slot, 0));
                map.insert(reg, slot);
            } else {
                panic!("unmapped virtual register {}", virt);
            }
        }

        if let Some(reg) = instr.def() {
            if let Some(virt) = reg.virt() {
                if let Some(&color) = self.colors.get(&virt) {
                    map.insert(reg, Register::Arch(color));
                } else if let Some(label) = self.spills.get(&virt) {
                    // reuse the use's scratch when the value is both read
                    // and written
                    let slot = match map.get(&reg) {
                        Some(&slot) => slot,
                        None => {
                            let slot =
                                scratch.next().expect("def fits in the scratch set");
                            map.insert(reg, slot);
                            slot
                        }
                    };
                    let addr = SCRATCH
                        .iter()
                        .map(|&reg| Register::Arch(reg))
                        .find(|&candidate| candidate != slot)
                        .expect("three scratch registers");
                    post.push(Instruction::LoadAddress { dst: addr, label: label.clone() });
                    post.push(Instruction::Store { op: "sw", val: slot, addr, imm: 0 });
                } else {
                    panic!("unmapped virtual register {}", virt);
                }
            }
        }

        pre.push(instr.map_registers(&map));
        pre.extend(post);
        pre
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::register::VirtualRegs;
    use crate::asm::{Section, SectionKind};
    use crate::regalloc::cfg::Cfg;

    fn graph_for(section: &Section) -> Interference {
        let mut cfg = Cfg::build(section);
        cfg.liveness();
        Interference::build(&cfg)
    }

    #[test]
    fn interfering_registers_get_distinct_colors() {
        let mut vregs = VirtualRegs::new();
        let a = vregs.fresh();
        let b = vregs.fresh();
        let c = vregs.fresh();

        let mut section = Section::new(SectionKind::Text);
        section.emit(Instruction::load_imm(a, 1));
        section.emit(Instruction::load_imm(b, 2));
        section.emit(Instruction::add(c, a, b));
        section.emit(Instruction::mov(c, c));
        section.emit(Instruction::jr_ra());

        let mut labels = Labels::new();
        let map = color(&graph_for(&section), &mut labels).unwrap();

        assert!(map.spills().is_empty());
        assert_eq!(map.colored(), 3);
        let a = map.colors[&a.virt().unwrap()];
        let b = map.colors[&b.virt().unwrap()];
        assert_ne!(a, b);
    }

    #[test]
    fn coloring_is_deterministic() {
        let mut vregs = VirtualRegs::new();
        let regs: Vec<_> = (0..6).map(|_| vregs.fresh()).collect();

        let mut section = Section::new(SectionKind::Text);
        for (i, &reg) in regs.iter().enumerate() {
            section.emit(Instruction::load_imm(reg, i as i32));
        }
        let sum = vregs.fresh();
        for pair in regs.chunks(2) {
            section.emit(Instruction::add(sum, pair[0], pair[1]));
        }
        section.emit(Instruction::jr_ra());

        let mut labels = Labels::new();
        let first = color(&graph_for(&section), &mut labels).unwrap();
        let mut labels = Labels::new();
        let second = color(&graph_for(&section), &mut labels).unwrap();
        assert_eq!(first.colors, second.colors);
        assert_eq!(first.used, second.used);
    }

    #[test]
    fn pressure_beyond_the_pool_spills() {
        // one more simultaneously-live value than there are colors
        let count = AVAILABLE.len() + 1;
        let mut vregs = VirtualRegs::new();
        let regs: Vec<_> = (0..count).map(|_| vregs.fresh()).collect();

        let mut section = Section::new(SectionKind::Text);
        for (i, &reg) in regs.iter().enumerate() {
            section.emit(Instruction::load_imm(reg, i as i32));
        }
        let sink = vregs.fresh();
        for &reg in &regs {
            section.emit(Instruction::add(sink, reg, reg));
        }
        // keep them all live until the very end
        let last = *regs.last().unwrap();
        section.emit(Instruction::add(sink, regs[0], last));
        section.emit(Instruction::jr_ra());

        let mut labels = Labels::new();
        let map = color(&graph_for(&section), &mut labels).unwrap();
        assert!(!map.spills().is_empty());
        assert_eq!(map.colored() + map.spills().len(), count + 1);
    }

    #[test]
    fn spilled_use_and_def_shuttle_through_scratch() {
        let mut labels = Labels::new();
        let slot = labels.named("spill");
        let mut vregs = VirtualRegs::new();
        let v = vregs.fresh();

        let map = RegisterMap {
            colors: HashMap::new(),
            spills: [(v.virt().unwrap(), slot.clone())].into_iter().collect(),
            used: Vec::new(),
        };

        // v = v + v: load once, operate, store back
        let rewritten = map.rewrite(&Instruction::add(v, v, v));
        assert_eq!(rewritten.len(), 5);
        assert!(matches!(&rewritten[0], Instruction::LoadAddress { label, .. } if *label == slot));
        assert!(matches!(rewritten[1], Instruction::Load { op: "lw", .. }));
        let Instruction::R { op: "add", dst, src1, src2 } = &rewritten[2] else {
            panic!("operation survives in the middle");
        };
        assert!(!dst.is_virtual() && !src1.is_virtual() && !src2.is_virtual());
        assert_eq!(dst, src1);
        assert!(matches!(&rewritten[3], Instruction::LoadAddress { label, .. } if *label == slot));
        assert!(matches!(rewritten[4], Instruction::Store { op: "sw", .. }));
    }

    #[test]
    fn placeholders_park_spill_homes_on_the_stack() {
        let mut labels = Labels::new();
        let slot = labels.named("spill");
        let map = RegisterMap {
            colors: [(VirtReg(0), ArchReg::T0)].into_iter().collect(),
            spills: [(VirtReg(1), slot.clone())].into_iter().collect(),
            used: vec![ArchReg::T0],
        };

        // prologue: color, scratch set, then the spill home's current value
        let saves = map.rewrite(&Instruction::PushRegisters);
        assert_eq!(saves.len(), 2 + 3 * 2 + 4);
        let read = saves
            .iter()
            .position(|instr| {
                matches!(instr, Instruction::LoadAddress { label, .. } if *label == slot)
            })
            .expect("prologue reads the spill home");
        assert!(matches!(saves[read + 1], Instruction::Load { op: "lw", .. }));
        assert!(matches!(saves[read + 3], Instruction::Store { op: "sw", .. }));

        // epilogue mirrors it: pop the saved value back into the home first
        let restores = map.rewrite(&Instruction::PopRegisters);
        assert_eq!(restores.len(), saves.len());
        assert!(matches!(restores[0], Instruction::Load { op: "lw", .. }));
        assert!(
            matches!(&restores[2], Instruction::LoadAddress { label, .. } if *label == slot)
        );
        assert!(matches!(restores[3], Instruction::Store { op: "sw", .. }));
        // the colored register comes back out last
        assert!(matches!(
            restores[restores.len() - 2],
            Instruction::Load { val: Register::Arch(ArchReg::T0), .. }
        ));
    }

    #[test]
    fn placeholders_expand_to_save_and_restore() {
        let map = RegisterMap {
            colors: [(VirtReg(0), ArchReg::T0), (VirtReg(1), ArchReg::T3)]
                .into_iter()
                .collect(),
            spills: BTreeMap::new(),
            used: vec![ArchReg::T0, ArchReg::T3],
        };

        let saves = map.rewrite(&Instruction::PushRegisters);
        let restores = map.rewrite(&Instruction::PopRegisters);
        assert_eq!(saves.len(), 4);
        assert_eq!(restores.len(), 4);
        // restores mirror the saves in reverse
        assert!(matches!(saves[1], Instruction::Store { val: Register::Arch(ArchReg::T0), .. }));
        assert!(matches!(restores[0], Instruction::Load { val: Register::Arch(ArchReg::T3), .. }));
    }
}
