use std::fmt;

use super::DescriptorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Double => "Double",
        }
    }
}

/// A type as computed by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Unit,
    Nothing,
    Primitive { kind: PrimitiveKind, nullable: bool },
    Any { nullable: bool },
    String { nullable: bool },
    Class { class: DescriptorId, arguments: Vec<SemanticType>, nullable: bool },
    Array { element: Box<SemanticType>, nullable: bool },
    PrimitiveArray { kind: PrimitiveKind, nullable: bool },
    TypeParameter { name: String, upper_bound: Box<SemanticType>, nullable: bool },
    Function { parameters: Vec<SemanticType>, return_type: Box<SemanticType> },
}

impl SemanticType {
    pub fn int() -> Self {
        Self::Primitive { kind: PrimitiveKind::Int, nullable: false }
    }

    pub fn boolean() -> Self {
        Self::Primitive { kind: PrimitiveKind::Boolean, nullable: false }
    }

    pub fn string() -> Self {
        Self::String { nullable: false }
    }

    pub fn any() -> Self {
        Self::Any { nullable: false }
    }

    pub fn class(class: DescriptorId) -> Self {
        Self::Class { class, arguments: Vec::new(), nullable: false }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Primitive { nullable, .. }
            | Self::Any { nullable }
            | Self::String { nullable }
            | Self::Class { nullable, .. }
            | Self::Array { nullable, .. }
            | Self::PrimitiveArray { nullable, .. }
            | Self::TypeParameter { nullable, .. } => *nullable,
            Self::Unit | Self::Nothing | Self::Function { .. } => false,
        }
    }

    pub fn make_nullable(self) -> Self {
        match self {
            Self::Primitive { kind, .. } => Self::Primitive { kind, nullable: true },
            Self::Any { .. } => Self::Any { nullable: true },
            Self::String { .. } => Self::String { nullable: true },
            Self::Class { class, arguments, .. } => Self::Class { class, arguments, nullable: true },
            Self::Array { element, .. } => Self::Array { element, nullable: true },
            Self::PrimitiveArray { kind, .. } => Self::PrimitiveArray { kind, nullable: true },
            Self::TypeParameter { name, upper_bound, .. } => Self::TypeParameter { name, upper_bound, nullable: true },
            other => other,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nullable = if self.is_nullable() { "?" } else { "" };
        match self {
            Self::Unit => write!(f, "Unit"),
            Self::Nothing => write!(f, "Nothing"),
            Self::Primitive { kind, .. } => write!(f, "{}{}", kind.name(), nullable),
            Self::Any { .. } => write!(f, "Any{}", nullable),
            Self::String { .. } => write!(f, "String{}", nullable),
            Self::Class { class, arguments, .. } => {
                write!(f, "#{}", class.0)?;
                if !arguments.is_empty() {
                    let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                write!(f, "{}", nullable)
            }
            Self::Array { element, .. } => write!(f, "Array<{}>{}", element, nullable),
            Self::PrimitiveArray { kind, .. } => write!(f, "{}Array{}", kind.name(), nullable),
            Self::TypeParameter { name, .. } => write!(f, "{}{}", name, nullable),
            Self::Function { parameters, return_type } => {
                let params: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), return_type)
            }
        }
    }
}
