//! Class builders
//!
//! Generators describe a class through the builder protocol: `define_class`
//! first, then any number of fields, methods and annotations, then `done`.
//! The builder keeps a mode-neutral model and renders it once finished, as
//! classfile bytes or as a readable listing depending on the output mode.

use std::collections::HashSet;

use log::{debug, trace};

use crate::common::config::OutputMode;
use crate::common::error::{Error, Result};

use super::classfile;
use super::insn::{InstructionAdapter, Insn, LdcValue, LocalVariable};
use super::text;

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Int(i32),
    Bool(bool),
    String(String),
    Array(Vec<AnnotationValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationModel {
    pub descriptor: String,
    pub visible: bool,
    pub values: Vec<(String, AnnotationValue)>,
}

impl AnnotationModel {
    /// Runtime-visible annotation
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self { descriptor: descriptor.into(), visible: true, values: Vec::new() }
    }

    pub fn invisible(descriptor: impl Into<String>) -> Self {
        Self { visible: false, ..Self::new(descriptor) }
    }

    pub fn with(mut self, name: &str, value: AnnotationValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct FieldModel {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub constant: Option<LdcValue>,
    pub annotations: Vec<AnnotationModel>,
}

#[derive(Debug, Clone)]
pub struct MethodCode {
    pub insns: Vec<Insn>,
    pub locals: Vec<LocalVariable>,
    pub max_locals: u16,
}

#[derive(Debug, Clone)]
pub struct MethodModel {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    pub annotations: Vec<AnnotationModel>,
    pub parameter_annotations: Vec<Vec<AnnotationModel>>,
    pub code: Option<MethodCode>,
}

impl MethodModel {
    pub fn visit_code(&mut self, code: InstructionAdapter, max_locals: u16) {
        let (insns, locals) = code.into_parts();
        self.code = Some(MethodCode { insns, locals, max_locals });
    }

    pub fn visit_annotation(&mut self, annotation: AnnotationModel) {
        self.annotations.push(annotation);
    }

    pub fn visit_parameter_annotation(&mut self, parameter: usize, annotation: AnnotationModel) {
        if self.parameter_annotations.len() <= parameter {
            self.parameter_annotations.resize(parameter + 1, Vec::new());
        }
        self.parameter_annotations[parameter].push(annotation);
    }
}

#[derive(Debug, Clone)]
pub struct ClassModel {
    pub version: u16,
    pub access: u16,
    pub name: String,
    pub signature: Option<String>,
    pub super_name: String,
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    pub annotations: Vec<AnnotationModel>,
}

impl ClassModel {
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Rendered content of a finished class
#[derive(Debug, Clone, PartialEq)]
pub enum ClassContent {
    Binary(Vec<u8>),
    Text(String),
}

impl ClassContent {
    pub fn mode(&self) -> OutputMode {
        match self {
            ClassContent::Binary(_) => OutputMode::Binary,
            ClassContent::Text(_) => OutputMode::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedClass {
    pub model: ClassModel,
    pub content: ClassContent,
}

impl GeneratedClass {
    pub fn name(&self) -> &str {
        &self.model.name
    }
}

/// Member counts of a class under construction, see [`ClassBuilder::rollback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    fields: usize,
    methods: usize,
}

pub struct ClassBuilder {
    mode: OutputMode,
    debug_info: bool,
    class: Option<ClassModel>,
    signatures: HashSet<(String, String)>,
    finished: bool,
}

impl ClassBuilder {
    pub fn new(mode: OutputMode, debug_info: bool) -> Self {
        Self {
            mode,
            debug_info,
            class: None,
            signatures: HashSet::new(),
            finished: false,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn define_class(
        &mut self,
        version: u16,
        access: u16,
        name: &str,
        signature: Option<String>,
        super_name: &str,
        interfaces: Vec<String>,
    ) -> Result<()> {
        if self.class.is_some() {
            return Err(Error::internal(format!("class {} defined twice", name)));
        }
        trace!("define class {} extends {} implements {:?}", name, super_name, interfaces);
        self.class = Some(ClassModel {
            version,
            access,
            name: name.to_string(),
            signature,
            super_name: super_name.to_string(),
            interfaces,
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
        });
        Ok(())
    }

    fn class_mut(&mut self) -> Result<&mut ClassModel> {
        if self.finished {
            return Err(Error::internal("class builder used after done()"));
        }
        self.class
            .as_mut()
            .ok_or_else(|| Error::internal("class builder used before define_class()"))
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class.as_ref().map(|c| c.name.as_str())
    }

    pub fn visit_source(&mut self, file: &str) -> Result<()> {
        self.class_mut()?.source_file = Some(file.to_string());
        Ok(())
    }

    pub fn new_field(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<String>,
        constant: Option<LdcValue>,
    ) -> Result<&mut FieldModel> {
        let class = self.class_mut()?;
        if class.fields.iter().any(|f| f.name == name) {
            return Err(Error::internal(format!("duplicate field {}.{}", class.name, name)));
        }
        class.fields.push(FieldModel {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature,
            constant,
            annotations: Vec::new(),
        });
        let last = class.fields.len() - 1;
        Ok(&mut class.fields[last])
    }

    pub fn new_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<String>,
        exceptions: Vec<String>,
    ) -> Result<&mut MethodModel> {
        let key = (name.to_string(), descriptor.to_string());
        let class = self
            .class
            .as_mut()
            .filter(|_| !self.finished)
            .ok_or_else(|| Error::internal(format!("method {}{} added outside of a class definition", name, descriptor)))?;
        if !self.signatures.insert(key) {
            return Err(Error::internal(format!("duplicate method {}.{}{}", class.name, name, descriptor)));
        }
        trace!("new method {}.{}{}", class.name, name, descriptor);
        class.methods.push(MethodModel {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature,
            exceptions,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            code: None,
        });
        let last = class.methods.len() - 1;
        Ok(&mut class.methods[last])
    }

    pub fn checkpoint(&self) -> Checkpoint {
        let (fields, methods) = self.class.as_ref().map_or((0, 0), |c| (c.fields.len(), c.methods.len()));
        Checkpoint { fields, methods }
    }

    /// Drops every field and method added since `checkpoint`
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let class = self.class_mut()?;
        class.fields.truncate(checkpoint.fields);
        let at = checkpoint.methods.min(class.methods.len());
        let dropped = class.methods.split_off(at);
        debug!("rolled back {} method(s) of {}", dropped.len(), class.name);
        for method in dropped {
            self.signatures.remove(&(method.name, method.descriptor));
        }
        Ok(())
    }

    pub fn new_annotation(&mut self, annotation: AnnotationModel) -> Result<()> {
        self.class_mut()?.annotations.push(annotation);
        Ok(())
    }

    /// Finishes the class and renders it for the builder's mode
    pub fn done(&mut self) -> Result<GeneratedClass> {
        if self.finished {
            return Err(Error::internal("done() called twice on a class builder"));
        }
        let model = self
            .class
            .take()
            .ok_or_else(|| Error::internal("done() called before define_class()"))?;
        self.finished = true;
        let content = match self.mode {
            OutputMode::Binary => ClassContent::Binary(classfile::to_bytes(&model, self.debug_info)?),
            OutputMode::Text => ClassContent::Text(text::render(&model)?),
        };
        Ok(GeneratedClass { model, content })
    }
}
