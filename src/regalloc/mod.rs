//! Register allocation: rewrites each text section from virtual to
//! architectural registers.
//!
//! Data sections pass through untouched. Each text section is analyzed in
//! isolation (the calling convention makes that sound: allocatable
//! registers are callee-saved through the prologue placeholders), gets its
//! virtuals colored or spilled, and comes out as a spill data section plus
//! the rewritten text.

pub mod cfg;
pub mod coloring;
pub mod interference;

use crate::asm::{AssemblyProgram, Directive, Item, Labels, Section, SectionKind};
use crate::BackendError;
use cfg::Cfg;
use coloring::{color, RegisterMap};
use interference::Interference;

use log::debug;

pub fn allocate(
    program: AssemblyProgram,
    labels: &mut Labels,
) -> Result<AssemblyProgram, BackendError> {
    let mut out = AssemblyProgram::new();
    for section in program.sections {
        match section.kind {
            SectionKind::Data => out.push_section(section),
            SectionKind::Text => {
                let map = allocate_section(&section, labels)?;

                if !map.spills().is_empty() {
                    let spill_data = out.new_section(SectionKind::Data);
                    for label in map.spills().values() {
                        spill_data.emit_label(label.clone());
                        spill_data.emit_directive(Directive::Space(4));
                    }
                }

                let mut text = Section::new(SectionKind::Text);
                for item in &section.items {
                    match item {
                        Item::Instruction(instr) => {
                            for rewritten in map.rewrite(instr) {
                                text.emit(rewritten);
                            }
                        }
                        item => text.items.push(item.clone()),
                    }
                }
                out.push_section(text);
            }
        }
    }
    Ok(out)
}

fn allocate_section(section: &Section, labels: &mut Labels) -> Result<RegisterMap, BackendError> {
    let mut cfg = Cfg::build(section);
    let sweeps = cfg.liveness();
    let graph = Interference::build(&cfg);
    let map = color(&graph, labels)?;
    debug!(
        "allocated section: {} virtuals colored, {} spilled, liveness in {} sweeps",
        map.colored(),
        map.spills().len(),
        sweeps,
    );
    Ok(map)
}
