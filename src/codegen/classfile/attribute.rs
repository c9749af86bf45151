//! Attribute payloads for class, field and method entries

use crate::common::error::Result;

use super::constpool::ConstantPool;
use crate::codegen::builder::{AnnotationModel, AnnotationValue};

/// Attribute with its name already in the pool
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> Result<Self> {
        Ok(Self { name_index: pool.add_utf8(name)?, info })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        // no exception handlers are ever generated
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend_from_slice(&attribute.to_bytes());
        }
        bytes
    }
}

#[derive(Debug, Default)]
pub struct LineNumberTableAttribute {
    pub entries: Vec<(u16, u16)>,
}

impl LineNumberTableAttribute {
    pub fn add_line_number(&mut self, start_pc: u16, line_number: u16) {
        self.entries.push((start_pc, line_number));
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for (start_pc, line_number) in &self.entries {
            bytes.extend_from_slice(&start_pc.to_be_bytes());
            bytes.extend_from_slice(&line_number.to_be_bytes());
        }
        bytes
    }
}

#[derive(Debug)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

#[derive(Debug, Default)]
pub struct LocalVariableTableAttribute {
    pub entries: Vec<LocalVariableEntry>,
}

impl LocalVariableTableAttribute {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for e in &self.entries {
            bytes.extend_from_slice(&e.start_pc.to_be_bytes());
            bytes.extend_from_slice(&e.length.to_be_bytes());
            bytes.extend_from_slice(&e.name_index.to_be_bytes());
            bytes.extend_from_slice(&e.descriptor_index.to_be_bytes());
            bytes.extend_from_slice(&e.index.to_be_bytes());
        }
        bytes
    }
}

/// Attribute whose payload is a single pool index (`Signature`, `SourceFile`, `ConstantValue`)
pub fn index_attribute(pool: &mut ConstantPool, name: &str, index: u16) -> Result<AttributeInfo> {
    AttributeInfo::new(pool, name, index.to_be_bytes().to_vec())
}

pub fn exceptions_attribute(pool: &mut ConstantPool, exceptions: &[String]) -> Result<AttributeInfo> {
    let mut info = Vec::new();
    info.extend_from_slice(&(exceptions.len() as u16).to_be_bytes());
    for exception in exceptions {
        info.extend_from_slice(&pool.add_class(exception)?.to_be_bytes());
    }
    AttributeInfo::new(pool, "Exceptions", info)
}

/// `RuntimeVisibleAnnotations` and `RuntimeInvisibleAnnotations`, whichever are non-empty
pub fn annotations_attributes(pool: &mut ConstantPool, annotations: &[AnnotationModel]) -> Result<Vec<AttributeInfo>> {
    let mut attributes = Vec::new();
    for (visible, name) in [(true, "RuntimeVisibleAnnotations"), (false, "RuntimeInvisibleAnnotations")] {
        let selected: Vec<&AnnotationModel> = annotations.iter().filter(|a| a.visible == visible).collect();
        if selected.is_empty() {
            continue;
        }
        let mut info = Vec::new();
        info.extend_from_slice(&(selected.len() as u16).to_be_bytes());
        for annotation in selected {
            write_annotation(pool, annotation, &mut info)?;
        }
        attributes.push(AttributeInfo::new(pool, name, info)?);
    }
    Ok(attributes)
}

pub fn parameter_annotations_attribute(pool: &mut ConstantPool, parameters: &[Vec<AnnotationModel>]) -> Result<AttributeInfo> {
    let mut info = vec![parameters.len() as u8];
    for annotations in parameters {
        let visible: Vec<&AnnotationModel> = annotations.iter().filter(|a| a.visible).collect();
        info.extend_from_slice(&(visible.len() as u16).to_be_bytes());
        for annotation in visible {
            write_annotation(pool, annotation, &mut info)?;
        }
    }
    AttributeInfo::new(pool, "RuntimeVisibleParameterAnnotations", info)
}

fn write_annotation(pool: &mut ConstantPool, annotation: &AnnotationModel, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&pool.add_utf8(&annotation.descriptor)?.to_be_bytes());
    out.extend_from_slice(&(annotation.values.len() as u16).to_be_bytes());
    for (name, value) in &annotation.values {
        out.extend_from_slice(&pool.add_utf8(name)?.to_be_bytes());
        write_element_value(pool, value, out)?;
    }
    Ok(())
}

fn write_element_value(pool: &mut ConstantPool, value: &AnnotationValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        AnnotationValue::Int(v) => {
            out.push(b'I');
            out.extend_from_slice(&pool.add_integer(*v)?.to_be_bytes());
        }
        AnnotationValue::Bool(v) => {
            out.push(b'Z');
            out.extend_from_slice(&pool.add_integer(*v as i32)?.to_be_bytes());
        }
        AnnotationValue::String(v) => {
            out.push(b's');
            out.extend_from_slice(&pool.add_utf8(v)?.to_be_bytes());
        }
        AnnotationValue::Array(values) => {
            out.push(b'[');
            out.extend_from_slice(&(values.len() as u16).to_be_bytes());
            for value in values {
                write_element_value(pool, value, out)?;
            }
        }
    }
    Ok(())
}
