//! Core classfile structures and their assembly from a class model

use crate::codegen::builder::{ClassModel, FieldModel, MethodModel};
use crate::codegen::defs::MAGIC;
use crate::codegen::insn::LdcValue;
use crate::common::error::{Error, Result};

use super::attribute::{self, AttributeInfo};
use super::code;
use super::constpool::ConstantPool;

#[derive(Debug)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Lays out a finished class model; `debug_info` controls line and local tables
    pub fn assemble(model: &ClassModel, debug_info: bool) -> Result<Self> {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(&model.name)?;
        let super_class = pool.add_class(&model.super_name)?;
        let interfaces = model
            .interfaces
            .iter()
            .map(|i| pool.add_class(i))
            .collect::<Result<Vec<u16>>>()?;

        let fields = model
            .fields
            .iter()
            .map(|f| assemble_field(&mut pool, f))
            .collect::<Result<Vec<_>>>()?;
        let methods = model
            .methods
            .iter()
            .map(|m| assemble_method(&mut pool, m, debug_info))
            .collect::<Result<Vec<_>>>()?;

        let mut attributes = Vec::new();
        if let Some(source) = &model.source_file {
            if debug_info {
                let index = pool.add_utf8(source)?;
                attributes.push(attribute::index_attribute(&mut pool, "SourceFile", index)?);
            }
        }
        if let Some(signature) = &model.signature {
            let index = pool.add_utf8(signature)?;
            attributes.push(attribute::index_attribute(&mut pool, "Signature", index)?);
        }
        attributes.extend(attribute::annotations_attributes(&mut pool, &model.annotations)?);

        Ok(Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: model.version,
            constant_pool: pool,
            access_flags: model.access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

fn assemble_field(pool: &mut ConstantPool, field: &FieldModel) -> Result<FieldInfo> {
    let mut attributes = Vec::new();
    if let Some(value) = &field.constant {
        let index = match value {
            LdcValue::Int(v) => pool.add_integer(*v)?,
            LdcValue::Float(v) => pool.add_float(*v)?,
            LdcValue::Long(v) => pool.add_long(*v)?,
            LdcValue::Double(v) => pool.add_double(*v)?,
            LdcValue::String(v) => pool.add_string(v)?,
            LdcValue::Type(ty) => {
                return Err(Error::internal(format!(
                    "field {} cannot have a class literal {} as constant value",
                    field.name, ty
                )))
            }
        };
        attributes.push(attribute::index_attribute(pool, "ConstantValue", index)?);
    }
    if let Some(signature) = &field.signature {
        let index = pool.add_utf8(signature)?;
        attributes.push(attribute::index_attribute(pool, "Signature", index)?);
    }
    attributes.extend(attribute::annotations_attributes(pool, &field.annotations)?);
    Ok(FieldInfo {
        access_flags: field.access,
        name_index: pool.add_utf8(&field.name)?,
        descriptor_index: pool.add_utf8(&field.descriptor)?,
        attributes,
    })
}

fn assemble_method(pool: &mut ConstantPool, method: &MethodModel, debug_info: bool) -> Result<MethodInfo> {
    let mut attributes = Vec::new();
    if let Some(body) = &method.code {
        let code = code::encode(&body.insns, &body.locals, body.max_locals, pool, debug_info)
            .map_err(|e| Error::internal(format!("{}{}: {}", method.name, method.descriptor, e)))?;
        attributes.push(AttributeInfo::new(pool, "Code", code.to_bytes())?);
    }
    if !method.exceptions.is_empty() {
        attributes.push(attribute::exceptions_attribute(pool, &method.exceptions)?);
    }
    if let Some(signature) = &method.signature {
        let index = pool.add_utf8(signature)?;
        attributes.push(attribute::index_attribute(pool, "Signature", index)?);
    }
    attributes.extend(attribute::annotations_attributes(pool, &method.annotations)?);
    if method.parameter_annotations.iter().any(|p| !p.is_empty()) {
        attributes.push(attribute::parameter_annotations_attribute(pool, &method.parameter_annotations)?);
    }
    Ok(MethodInfo {
        access_flags: method.access,
        name_index: pool.add_utf8(&method.name)?,
        descriptor_index: pool.add_utf8(&method.descriptor)?,
        attributes,
    })
}
