//! Target-machine type representation

use std::fmt;

use super::defs::OBJECT_CLASS;
use super::opcodes::*;
use crate::common::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JvmType {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
    /// Reference type by internal name (`java/lang/String`)
    Object(String),
    Array(Box<JvmType>),
}

impl JvmType {
    pub fn object(internal_name: impl Into<String>) -> Self {
        JvmType::Object(internal_name.into())
    }

    pub fn java_object() -> Self {
        JvmType::Object(OBJECT_CLASS.to_string())
    }

    pub fn array_of(element: JvmType) -> Self {
        JvmType::Array(Box::new(element))
    }

    /// Parses a field descriptor (`I`, `Ljava/lang/Object;`, `[J`)
    pub fn from_descriptor(descriptor: &str) -> Result<Self> {
        let (ty, rest) = parse_one(descriptor)?;
        if !rest.is_empty() {
            return Err(Error::internal(format!("trailing characters in descriptor '{}'", descriptor)));
        }
        Ok(ty)
    }

    pub fn descriptor(&self) -> String {
        match self {
            JvmType::Void => "V".to_string(),
            JvmType::Boolean => "Z".to_string(),
            JvmType::Char => "C".to_string(),
            JvmType::Byte => "B".to_string(),
            JvmType::Short => "S".to_string(),
            JvmType::Int => "I".to_string(),
            JvmType::Float => "F".to_string(),
            JvmType::Long => "J".to_string(),
            JvmType::Double => "D".to_string(),
            JvmType::Object(name) => format!("L{};", name),
            JvmType::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// Name used in type instructions: internal name for classes, descriptor for arrays
    pub fn internal_name(&self) -> String {
        match self {
            JvmType::Object(name) => name.clone(),
            other => other.descriptor(),
        }
    }

    /// Number of local-variable / operand-stack slots
    pub fn size(&self) -> u16 {
        match self {
            JvmType::Void => 0,
            JvmType::Long | JvmType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, JvmType::Object(_) | JvmType::Array(_) | JvmType::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JvmType::Object(_) | JvmType::Array(_))
    }

    /// Types that live as `int` on the operand stack
    pub fn is_int_like(&self) -> bool {
        matches!(self, JvmType::Boolean | JvmType::Char | JvmType::Byte | JvmType::Short | JvmType::Int)
    }

    pub fn element_type(&self) -> Option<&JvmType> {
        match self {
            JvmType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Wrapper class of a primitive, the type itself otherwise
    pub fn boxed(&self) -> JvmType {
        let wrapper = match self {
            JvmType::Boolean => "java/lang/Boolean",
            JvmType::Char => "java/lang/Character",
            JvmType::Byte => "java/lang/Byte",
            JvmType::Short => "java/lang/Short",
            JvmType::Int => "java/lang/Integer",
            JvmType::Float => "java/lang/Float",
            JvmType::Long => "java/lang/Long",
            JvmType::Double => "java/lang/Double",
            other => return other.clone(),
        };
        JvmType::object(wrapper)
    }

    /// Primitive behind a wrapper class, if any
    pub fn unboxed(&self) -> Option<JvmType> {
        let name = match self {
            JvmType::Object(name) => name.as_str(),
            _ => return None,
        };
        let primitive = match name {
            "java/lang/Boolean" => JvmType::Boolean,
            "java/lang/Character" => JvmType::Char,
            "java/lang/Byte" => JvmType::Byte,
            "java/lang/Short" => JvmType::Short,
            "java/lang/Integer" => JvmType::Int,
            "java/lang/Float" => JvmType::Float,
            "java/lang/Long" => JvmType::Long,
            "java/lang/Double" => JvmType::Double,
            _ => return None,
        };
        Some(primitive)
    }

    /// Name of the `xxxValue()` unboxing method
    pub fn primitive_name(&self) -> &'static str {
        match self {
            JvmType::Boolean => "boolean",
            JvmType::Char => "char",
            JvmType::Byte => "byte",
            JvmType::Short => "short",
            JvmType::Int => "int",
            JvmType::Float => "float",
            JvmType::Long => "long",
            JvmType::Double => "double",
            JvmType::Void => "void",
            _ => "object",
        }
    }

    /// Adapts an `I`-typed opcode to this type, like ASM's `Type.getOpcode`.
    ///
    /// Works for `ILOAD`, `ISTORE`, `IALOAD`, `IASTORE`, `IADD`..`INEG` and `IRETURN`.
    pub fn opcode(&self, int_opcode: u8) -> u8 {
        if int_opcode == IALOAD || int_opcode == IASTORE {
            let offset = match self {
                JvmType::Boolean | JvmType::Byte => 5,
                JvmType::Char => 6,
                JvmType::Short => 7,
                JvmType::Int => 0,
                JvmType::Long => 1,
                JvmType::Float => 2,
                JvmType::Double => 3,
                _ => 4,
            };
            return int_opcode + offset;
        }
        let offset = match self {
            JvmType::Void => return RETURN,
            JvmType::Boolean | JvmType::Char | JvmType::Byte | JvmType::Short | JvmType::Int => 0,
            JvmType::Long => 1,
            JvmType::Float => 2,
            JvmType::Double => 3,
            JvmType::Object(_) | JvmType::Array(_) => 4,
        };
        // arithmetic families are strided by four types, with no reference variant
        if (IADD..=INEG + 3).contains(&int_opcode) {
            int_opcode + offset.min(3)
        } else {
            int_opcode + offset
        }
    }
}

impl fmt::Display for JvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

fn parse_one(descriptor: &str) -> Result<(JvmType, &str)> {
    let mut chars = descriptor.chars();
    let first = chars
        .next()
        .ok_or_else(|| Error::internal("empty type descriptor"))?;
    let rest = &descriptor[1..];
    let ty = match first {
        'V' => JvmType::Void,
        'Z' => JvmType::Boolean,
        'C' => JvmType::Char,
        'B' => JvmType::Byte,
        'S' => JvmType::Short,
        'I' => JvmType::Int,
        'F' => JvmType::Float,
        'J' => JvmType::Long,
        'D' => JvmType::Double,
        'L' => {
            let end = rest
                .find(';')
                .ok_or_else(|| Error::internal(format!("unterminated class descriptor '{}'", descriptor)))?;
            return Ok((JvmType::Object(rest[..end].to_string()), &rest[end + 1..]));
        }
        '[' => {
            let (element, rest) = parse_one(rest)?;
            return Ok((JvmType::Array(Box::new(element)), rest));
        }
        other => return Err(Error::internal(format!("bad descriptor character '{}'", other))),
    };
    Ok((ty, rest))
}

/// A method descriptor split into its parts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub arguments: Vec<JvmType>,
    pub return_type: JvmType,
}

impl MethodType {
    pub fn new(arguments: Vec<JvmType>, return_type: JvmType) -> Self {
        Self { arguments, return_type }
    }

    pub fn parse(descriptor: &str) -> Result<Self> {
        let body = descriptor
            .strip_prefix('(')
            .ok_or_else(|| Error::internal(format!("method descriptor '{}' must start with '('", descriptor)))?;
        let close = body
            .find(')')
            .ok_or_else(|| Error::internal(format!("method descriptor '{}' has no ')'", descriptor)))?;
        let mut params = &body[..close];
        let mut arguments = Vec::new();
        while !params.is_empty() {
            let (ty, rest) = parse_one(params)?;
            arguments.push(ty);
            params = rest;
        }
        let return_type = JvmType::from_descriptor(&body[close + 1..])?;
        Ok(Self { arguments, return_type })
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.arguments.iter().map(|a| a.descriptor()).collect();
        format!("({}){}", params, self.return_type.descriptor())
    }

    /// Total slots taken by the arguments
    pub fn arguments_size(&self) -> u16 {
        self.arguments.iter().map(|a| a.size()).sum()
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_descriptor_parses_back() {
        let descriptor = "(I[JLjava/lang/String;D)[Ljava/lang/Object;";
        let method = MethodType::parse(descriptor).unwrap();
        assert_eq!(
            method.arguments,
            vec![
                JvmType::Int,
                JvmType::array_of(JvmType::Long),
                JvmType::object("java/lang/String"),
                JvmType::Double,
            ]
        );
        assert_eq!(method.return_type, JvmType::array_of(JvmType::java_object()));
        assert_eq!(method.arguments_size(), 5);
        assert_eq!(method.descriptor(), descriptor);
    }

    #[test]
    fn test_malformed_descriptors_are_rejected() {
        assert!(JvmType::from_descriptor("Ljava/lang/String").is_err());
        assert!(JvmType::from_descriptor("II").is_err());
        assert!(MethodType::parse("I)V").is_err());
    }

    #[test]
    fn test_typed_opcodes() {
        assert_eq!(JvmType::Long.opcode(ILOAD), LLOAD);
        assert_eq!(JvmType::object("a/B").opcode(ISTORE), ASTORE);
        assert_eq!(JvmType::Char.opcode(IALOAD), CALOAD);
        assert_eq!(JvmType::Boolean.opcode(IASTORE), BASTORE);
        assert_eq!(JvmType::Double.opcode(IADD), IADD + 3);
        assert_eq!(JvmType::Void.opcode(IRETURN), RETURN);
    }

    #[test]
    fn test_boxing_is_symmetric_for_primitives() {
        for ty in [JvmType::Boolean, JvmType::Char, JvmType::Int, JvmType::Long, JvmType::Double] {
            assert_eq!(ty.boxed().unboxed(), Some(ty.clone()));
        }
        assert_eq!(JvmType::java_object().boxed(), JvmType::java_object());
        assert_eq!(JvmType::java_object().unboxed(), None);
    }
}
