//! Interference graph over virtual registers.
//!
//! Index arena: node order is first appearance in the instruction stream,
//! adjacency is by node index. Two registers interfere when they appear
//! together in a live-in or live-out set, which is what stops them sharing
//! a color.

use crate::asm::register::VirtReg;
use crate::regalloc::cfg::Cfg;

use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub struct Interference {
    pub nodes: Vec<VirtReg>,
    index: HashMap<VirtReg, usize>,
    pub adj: Vec<BTreeSet<usize>>,
}

impl Interference {
    pub fn build(cfg: &Cfg) -> Interference {
        let mut graph = Interference {
            nodes: Vec::new(),
            index: HashMap::new(),
            adj: Vec::new(),
        };

        // every mentioned virtual gets a node, even if it never interferes
        for node in &cfg.nodes {
            for reg in node.instr.def().into_iter().chain(node.instr.uses()) {
                if let Some(reg) = reg.virt() {
                    graph.add(reg);
                }
            }
        }

        for node in &cfg.nodes {
            graph.connect_all(&node.live_in);
            graph.connect_all(&node.live_out);
        }
        graph
    }

    pub fn index_of(&self, reg: VirtReg) -> usize {
        self.index[&reg]
    }

    fn add(&mut self, reg: VirtReg) -> usize {
        if let Some(&i) = self.index.get(&reg) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(reg);
        self.index.insert(reg, i);
        self.adj.push(BTreeSet::new());
        i
    }

    fn connect_all(&mut self, live: &BTreeSet<VirtReg>) {
        for (n, a) in live.iter().enumerate() {
            for b in live.iter().skip(n + 1) {
                let a = self.add(*a);
                let b = self.add(*b);
                self.adj[a].insert(b);
                self.adj[b].insert(a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::register::VirtualRegs;
    use crate::asm::{Instruction, Section, SectionKind};

    #[test]
    fn overlapping_values_interfere_disjoint_ones_do_not() {
        let mut vregs = VirtualRegs::new();
        let a = vregs.fresh();
        let b = vregs.fresh();
        let c = vregs.fresh();

        // a and b are live together; c only starts once both are dead
        let mut section = Section::new(SectionKind::Text);
        section.emit(Instruction::load_imm(a, 1));
        section.emit(Instruction::load_imm(b, 2));
        section.emit(Instruction::add(c, a, b));
        section.emit(Instruction::mov(c, c));
        section.emit(Instruction::jr_ra());

        let mut cfg = Cfg::build(&section);
        cfg.liveness();
        let graph = Interference::build(&cfg);

        let (a, b, c) = (a.virt().unwrap(), b.virt().unwrap(), c.virt().unwrap());
        let (ai, bi, ci) = (graph.index_of(a), graph.index_of(b), graph.index_of(c));
        assert!(graph.adj[ai].contains(&bi));
        assert!(graph.adj[bi].contains(&ai));
        assert!(!graph.adj[ci].contains(&ai));
        assert!(!graph.adj[ci].contains(&bi));
        assert_eq!(graph.nodes.len(), 3);
    }
}
