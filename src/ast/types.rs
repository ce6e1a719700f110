//! Types of the source language and their memory layout on the target.

use std::fmt::Display;
use std::rc::Rc;

/// Rounds `size` up to the next multiple of 4, the target word size.
pub fn word_align(size: u32) -> u32 {
    (size + 3) & !3
}

#[derive(Clone, Debug)]
pub enum Type {
    Int,
    Char,
    Void,
    Pointer(Box<Type>),
    Array { size: u32, element: Box<Type> },
    Struct(Rc<StructDecl>),
}

impl Type {
    /// Size of a value of this type in bytes.
    pub fn bytes(&self) -> u32 {
        match self {
            Type::Int => 4,
            Type::Char => 1,
            Type::Void => 0,
            Type::Pointer(_) => 4,
            Type::Array { size, element } => size * element.bytes(),
            Type::Struct(decl) => decl.bytes(),
        }
    }

    /// Size of the stack slot this type occupies: byte-sized values still
    /// take a full word.
    pub fn aligned_bytes(&self) -> u32 {
        word_align(self.bytes())
    }

    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }
}

// Struct types with the same tag always share a layout, so comparing names
// is enough (the frontend rejects conflicting redefinitions).
impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Int, Type::Int) | (Type::Char, Type::Char) | (Type::Void, Type::Void) => true,
            (Type::Pointer(left), Type::Pointer(right)) => left == right,
            (
                Type::Array { size: left_size, element: left },
                Type::Array { size: right_size, element: right },
            ) => left_size == right_size && left == right,
            (Type::Struct(left), Type::Struct(right)) => left.name == right.name,
            _ => false,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Void => write!(f, "void"),
            Type::Pointer(inner) => write!(f, "{} *", inner),
            Type::Array { size, element } => write!(f, "{}[{}]", element, size),
            Type::Struct(decl) => write!(f, "struct {}", decl.name),
        }
    }
}

/// Field layout of a struct declaration. Shared by every `Type::Struct`
/// referring to the same tag.
#[derive(Debug, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl StructDecl {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, Type)>) -> Rc<StructDecl> {
        Rc::new(StructDecl {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field { name: name.into(), ty })
                .collect(),
        })
    }

    /// Fields are laid out in declaration order, each one starting on a
    /// 4-byte boundary.
    pub fn bytes(&self) -> u32 {
        self.fields.iter().map(|field| word_align(field.ty.bytes())).sum()
    }

    /// Byte offset of `name` from the start of the struct.
    pub fn field_offset(&self, name: &str) -> Option<u32> {
        let mut offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += word_align(field.ty.bytes());
        }
        None
    }

    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.ty)
    }
}
