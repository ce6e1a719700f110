//! Per-section control-flow graph and liveness analysis.
//!
//! Nodes are instruction indices into the section, edges are stored as
//! successor index lists. `jal` is a fall-through edge, not a control edge
//! to the callee: the called function preserves every allocatable register,
//! so values live across a call simply stay live. `j` and `jr` sever
//! fall-through.

use crate::asm::register::VirtReg;
use crate::asm::{Instruction, Item, Label, Section, SectionKind};

use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub struct Node {
    pub instr: Instruction,
    pub succs: Vec<usize>,
    pub live_in: BTreeSet<VirtReg>,
    pub live_out: BTreeSet<VirtReg>,
}

#[derive(Debug)]
pub struct Cfg {
    pub nodes: Vec<Node>,
}

impl Cfg {
    pub fn build(section: &Section) -> Cfg {
        debug_assert_eq!(section.kind, SectionKind::Text);

        // attach each label to the next instruction; trailing labels point
        // at nothing reachable and are dropped
        let mut instrs: Vec<Instruction> = Vec::new();
        let mut label_at: HashMap<Label, usize> = HashMap::new();
        let mut pending: Vec<Label> = Vec::new();
        for item in &section.items {
            match item {
                Item::Label(label) => pending.push(label.clone()),
                Item::Instruction(instr) => {
                    for label in pending.drain(..) {
                        label_at.insert(label, instrs.len());
                    }
                    instrs.push(instr.clone());
                }
                Item::Directive(_) | Item::Comment(_) => {}
            }
        }

        let last = instrs.len().saturating_sub(1);
        let nodes = instrs
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                let target = |label: &Label| {
                    *label_at
                        .get(label)
                        .unwrap_or_else(|| panic!("branch target {} outside section", label))
                };
                let fall = if i < last { vec![i + 1] } else { Vec::new() };
                let succs = match instr {
                    Instruction::Branch { target: label, .. } => {
                        let mut succs = fall;
                        succs.push(target(label));
                        succs
                    }
                    Instruction::Jump { op: "j", target: label } => vec![target(label)],
                    Instruction::Jr { .. } => Vec::new(),
                    _ => fall,
                };
                Node {
                    instr: instr.clone(),
                    succs,
                    live_in: BTreeSet::new(),
                    live_out: BTreeSet::new(),
                }
            })
            .collect();

        Cfg { nodes }
    }

    /// Backward fixed point over the virtual registers only; architectural
    /// registers are outside the allocator's jurisdiction. Returns the
    /// number of sweeps until stable.
    pub fn liveness(&mut self) -> usize {
        let mut sweeps = 0;
        loop {
            sweeps += 1;
            let mut changed = false;
            for i in (0..self.nodes.len()).rev() {
                let succs = self.nodes[i].succs.clone();
                let mut out = BTreeSet::new();
                for succ in succs {
                    out.extend(self.nodes[succ].live_in.iter().copied());
                }

                let node = &self.nodes[i];
                let mut live_in: BTreeSet<VirtReg> =
                    node.instr.uses().iter().filter_map(|reg| reg.virt()).collect();
                let def = node.instr.def().and_then(|reg| reg.virt());
                live_in.extend(out.iter().filter(|reg| Some(**reg) != def));

                let node = &mut self.nodes[i];
                if out != node.live_out || live_in != node.live_in {
                    node.live_out = out;
                    node.live_in = live_in;
                    changed = true;
                }
            }
            if !changed {
                return sweeps;
            }
        }
    }
}
