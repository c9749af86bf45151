//! Constant pool with entry deduplication

use std::collections::HashMap;

use crate::common::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
}

impl Constant {
    /// Long and double entries take two pool slots
    fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let encoded = modified_utf8(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
        }
        bytes
    }
}

/// Lookup key; floats are compared by bit pattern so `NaN` and `-0.0` dedupe correctly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Utf8(s) => ConstantKey::Utf8(s.clone()),
            Constant::Integer(v) => ConstantKey::Integer(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(v.to_bits()),
            Constant::Class(i) => ConstantKey::Class(*i),
            Constant::String(i) => ConstantKey::String(*i),
            Constant::FieldRef(a, b) => ConstantKey::FieldRef(*a, *b),
            Constant::MethodRef(a, b) => ConstantKey::MethodRef(*a, *b),
            Constant::InterfaceMethodRef(a, b) => ConstantKey::InterfaceMethodRef(*a, *b),
            Constant::NameAndType(a, b) => ConstantKey::NameAndType(*a, *b),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: HashMap<ConstantKey, u16>,
    /// Next free slot; slot 0 is reserved
    next: u16,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new(), index: HashMap::new(), next: 1 }
    }

    /// Value written as `constant_pool_count`
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    fn add(&mut self, constant: Constant) -> Result<u16> {
        let key = ConstantKey::from(&constant);
        if let Some(index) = self.index.get(&key) {
            return Ok(*index);
        }
        let width = constant.width();
        let index = self.next;
        self.next = self
            .next
            .checked_add(width)
            .ok_or_else(|| Error::internal("constant pool exceeds 65535 entries"))?;
        self.constants.push(constant);
        self.index.insert(key, index);
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        let length = modified_utf8(value).len();
        if length > u16::MAX as usize {
            return Err(Error::internal(format!("UTF8 constant of {} bytes exceeds 65535", length)));
        }
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.add(Constant::Class(name_index))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::InterfaceMethodRef(class_index, name_and_type_index))
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.add(Constant::String(utf8_index))
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> Result<u16> {
        self.add(Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> Result<u16> {
        self.add(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> Result<u16> {
        self.add(Constant::Double(value))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.constants {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

/// Java's modified UTF-8: NUL as two bytes, supplementary characters as surrogate pairs
fn modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let b = pool.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.add_utf8("java/lang/Object").unwrap(), 1);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_long(7).unwrap(), 1);
        assert_eq!(pool.add_integer(7).unwrap(), 3);
        assert_eq!(pool.count(), 4);
    }

    #[test]
    fn test_oversized_utf8_is_rejected() {
        let mut pool = ConstantPool::new();
        let long = "x".repeat(70_000);
        let err = pool.add_string(&long).unwrap_err();
        assert!(err.is_internal(), "{}", err);
        assert_eq!(pool.count(), 1);

        let limit = "x".repeat(65_535);
        assert!(pool.add_utf8(&limit).is_ok());
        // NUL widens to two bytes
        let widened = "\0".repeat(40_000);
        assert!(pool.add_utf8(&widened).is_err());
    }

    #[test]
    fn test_nul_uses_two_bytes() {
        assert_eq!(modified_utf8("a\0"), vec![b'a', 0xC0, 0x80]);
    }
}
