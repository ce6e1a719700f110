//! Assembly intermediate representation: an ordered list of sections, each
//! an ordered list of items (labels, directives, comments, instructions).
//! Instructions reference virtual registers until
//! [register allocation](crate::regalloc) rewrites them.

pub mod instruction;
pub mod register;

pub use instruction::Instruction;
pub use register::{ArchReg, Register, VirtReg, VirtualRegs};

use std::fmt::Display;
use std::fmt::Write;

/// A label with a globally unique identity and an optional display name.
///
/// The single entry label renders as a bare `main` so the assembler picks it
/// up as the program entry; every other label is suffixed with its id to
/// keep names collision-free.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    id: usize,
    name: Option<String>,
    entry: bool,
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.entry {
            return write!(f, "main");
        }
        match &self.name {
            Some(name) => write!(f, "{}_{}", name, self.id),
            None => write!(f, "L{}", self.id),
        }
    }
}

/// Allocates labels from a threaded counter. There is no global label state;
/// whoever needs fresh labels borrows the allocator.
#[derive(Debug, Default)]
pub struct Labels {
    next: usize,
}

impl Labels {
    pub fn new() -> Labels {
        Labels::default()
    }

    pub fn fresh(&mut self) -> Label {
        self.next += 1;
        Label { id: self.next - 1, name: None, entry: false }
    }

    pub fn named(&mut self, name: impl Into<String>) -> Label {
        self.next += 1;
        Label { id: self.next - 1, name: Some(name.into()), entry: false }
    }

    /// The assembly entry point. At most one should ever be created.
    pub fn entry(&mut self) -> Label {
        self.next += 1;
        Label { id: self.next - 1, name: Some("main".into()), entry: true }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    /// `.space n`: reserve n bytes of zeroed data.
    Space(u32),
    /// `.asciiz "s"`: a nul-terminated string literal.
    Asciiz(String),
    /// `.globl name`: export a label.
    Globl(String),
}

impl Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::Space(size) => write!(f, ".space {}", size),
            Directive::Asciiz(literal) => write!(f, ".asciiz \"{}\"", escape(literal)),
            Directive::Globl(name) => write!(f, ".globl {}", name),
        }
    }
}

fn escape(literal: &str) -> String {
    literal
        .chars()
        .flat_map(|c| match c {
            '\n' => vec!['\\', 'n'],
            '\t' => vec!['\\', 't'],
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            c => vec![c],
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Label(Label),
    Directive(Directive),
    Comment(String),
    Instruction(Instruction),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Data,
    Text,
}

/// One `.data` or `.text` section. Instructions may only be emitted into
/// text sections; the register allocator relies on one text section per
/// function.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub items: Vec<Item>,
}

impl Section {
    pub fn new(kind: SectionKind) -> Section {
        Section { kind, items: Vec::new() }
    }

    pub fn emit(&mut self, instruction: Instruction) {
        debug_assert_eq!(self.kind, SectionKind::Text);
        self.items.push(Item::Instruction(instruction));
    }

    pub fn emit_label(&mut self, label: Label) {
        self.items.push(Item::Label(label));
    }

    pub fn emit_directive(&mut self, directive: Directive) {
        self.items.push(Item::Directive(directive));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.items.push(Item::Comment(text.into()));
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|item| match item {
            Item::Instruction(instruction) => Some(instruction),
            _ => None,
        })
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SectionKind::Data => writeln!(f, ".data")?,
            SectionKind::Text => writeln!(f, ".text")?,
        }
        for item in &self.items {
            match item {
                Item::Label(label) => writeln!(f, "{}:", label)?,
                Item::Directive(directive) => writeln!(f, "{}", directive)?,
                Item::Comment(text) => writeln!(f, "# {}", text)?,
                Item::Instruction(instruction) => writeln!(f, "{}", instruction)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssemblyProgram {
    pub sections: Vec<Section>,
}

impl AssemblyProgram {
    pub fn new() -> AssemblyProgram {
        AssemblyProgram::default()
    }

    /// Opens a fresh section and returns it for emission.
    pub fn new_section(&mut self, kind: SectionKind) -> &mut Section {
        self.sections.push(Section::new(kind));
        self.sections.last_mut().expect("just pushed")
    }

    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }
}

impl Display for AssemblyProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for section in &self.sections {
            write!(out, "{}\n", section)?;
        }
        f.write_str(&out)
    }
}
