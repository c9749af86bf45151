//! Where each generated member ended up
//!
//! Class generation records the JVM method of every function and accessor and
//! the backing field of every property. Call sites and accessor synthesis look
//! members up here instead of recomputing their shape.

use std::collections::HashMap;

use crate::ast::DescriptorId;
use crate::common::error::{Error, Result};

use super::callable::JvmMethodSignature;
use super::jvm_type::JvmType;

#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry {
    pub owner: String,
    pub signature: JvmMethodSignature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub owner: String,
    pub name: String,
    pub ty: JvmType,
    pub is_static: bool,
}

#[derive(Debug, Default)]
pub struct MemberMap {
    methods: HashMap<DescriptorId, MethodEntry>,
    fields: HashMap<DescriptorId, FieldEntry>,
    src_classes: HashMap<DescriptorId, String>,
}

impl MemberMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_method(&mut self, member: DescriptorId, owner: impl Into<String>, signature: JvmMethodSignature) -> Result<()> {
        if let Some(existing) = self.methods.get(&member) {
            return Err(Error::internal(format!(
                "method for {} already recorded as {}.{}{}",
                member,
                existing.owner,
                existing.signature.name,
                existing.signature.descriptor()
            )));
        }
        self.methods.insert(member, MethodEntry { owner: owner.into(), signature });
        Ok(())
    }

    pub fn record_field(&mut self, property: DescriptorId, field: FieldEntry) -> Result<()> {
        if let Some(existing) = self.fields.get(&property) {
            return Err(Error::internal(format!(
                "field for {} already recorded as {}.{}",
                property, existing.owner, existing.name
            )));
        }
        self.fields.insert(property, field);
        Ok(())
    }

    /// Class holding the compiled body of a namespace member
    pub fn record_src_class(&mut self, member: DescriptorId, class_name: impl Into<String>) -> Result<()> {
        let class_name = class_name.into();
        if let Some(existing) = self.src_classes.get(&member) {
            return Err(Error::internal(format!(
                "source class for {} already recorded as {}, not {}",
                member, existing, class_name
            )));
        }
        self.src_classes.insert(member, class_name);
        Ok(())
    }

    pub fn method(&self, member: DescriptorId) -> Option<&MethodEntry> {
        self.methods.get(&member)
    }

    pub fn field(&self, property: DescriptorId) -> Option<&FieldEntry> {
        self.fields.get(&property)
    }

    pub fn src_class(&self, member: DescriptorId) -> Option<&str> {
        self.src_classes.get(&member).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(owner: &str, name: &str) -> FieldEntry {
        FieldEntry { owner: owner.to_string(), name: name.to_string(), ty: JvmType::Int, is_static: false }
    }

    #[test]
    fn test_duplicate_field_is_internal_error() {
        let mut map = MemberMap::new();
        let property = DescriptorId(3);
        map.record_field(property, field("a/B", "x")).unwrap();

        let err = map.record_field(property, field("a/C", "x")).unwrap_err();
        assert!(err.is_internal());
        // the first entry wins
        assert_eq!(map.field(property).map(|f| f.owner.as_str()), Some("a/B"));
    }

    #[test]
    fn test_src_class_recorded_once() {
        let mut map = MemberMap::new();
        let function = DescriptorId(4);
        assert!(map.src_class(function).is_none());
        map.record_src_class(function, "p/namespace$src$A").unwrap();
        assert_eq!(map.src_class(function), Some("p/namespace$src$A"));
        assert!(map.record_src_class(function, "p/namespace$src$B").is_err());
    }
}
