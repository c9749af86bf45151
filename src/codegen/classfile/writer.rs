//! Trait-based serialization for classfile structures

use std::io::Write;

use super::attribute::AttributeInfo;
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::constpool::ConstantPool;

/// An object which can be written into a classfile
pub trait ClassfileWritable {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    fn to_classfile_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to_classfile(&mut buffer)?;
        Ok(buffer)
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

fn write_member<W: Write>(
    buffer: &mut W,
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: &[AttributeInfo],
) -> std::io::Result<()> {
    buffer.write_all(&access_flags.to_be_bytes())?;
    buffer.write_all(&name_index.to_be_bytes())?;
    buffer.write_all(&descriptor_index.to_be_bytes())?;
    buffer.write_all(&(attributes.len() as u16).to_be_bytes())?;
    for attribute in attributes {
        attribute.write_to_classfile(buffer)?;
    }
    Ok(())
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_member(buffer, self.access_flags, self.name_index, self.descriptor_index, &self.attributes)
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_member(buffer, self.access_flags, self.name_index, self.descriptor_index, &self.attributes)
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;

        self.constant_pool.write_to_classfile(buffer)?;

        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;

        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }

        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            field.write_to_classfile(buffer)?;
        }

        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            method.write_to_classfile(buffer)?;
        }

        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}
