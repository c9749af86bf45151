//! Readable listing of a class model
//!
//! The layout follows ASM's `Textifier`: one header comment per member with its
//! access flags, upper-case mnemonics and `Ln` labels numbered in order of
//! first appearance.

use std::collections::HashMap;
use std::fmt::Write;

use crate::common::error::Result;

use super::builder::{AnnotationModel, AnnotationValue, ClassModel, FieldModel, MethodModel};
use super::classfile::code::max_stack;
use super::defs::access::*;
use super::insn::{Insn, Label, LdcValue};
use super::opcodes::opcode_name;

pub fn render(class: &ClassModel) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "// class version {}.0 ({})", class.version, class.version)?;
    writeln!(out, "// access flags 0x{:x}", class.access)?;
    if let Some(signature) = &class.signature {
        writeln!(out, "// signature {}", signature)?;
    }
    write!(out, "{}{} extends {}", class_modifiers(class.access), class.name, class.super_name)?;
    if !class.interfaces.is_empty() {
        write!(out, " implements {}", class.interfaces.join(" "))?;
    }
    writeln!(out, " {{")?;
    if let Some(source) = &class.source_file {
        writeln!(out)?;
        writeln!(out, "  // compiled from: {}", source)?;
    }
    for annotation in &class.annotations {
        writeln!(out)?;
        writeln!(out, "  {}", annotation_text(annotation))?;
    }
    for field in &class.fields {
        writeln!(out)?;
        write_field(field, &mut out)?;
    }
    for method in &class.methods {
        write_method(method, &mut out)?;
    }
    writeln!(out, "}}")?;
    Ok(out)
}

fn class_modifiers(access: u16) -> String {
    let mut out = String::new();
    if access & ACC_PUBLIC != 0 {
        out.push_str("public ");
    }
    if access & ACC_FINAL != 0 {
        out.push_str("final ");
    }
    if access & ACC_INTERFACE != 0 {
        out.push_str("abstract interface ");
    } else {
        if access & ACC_ABSTRACT != 0 {
            out.push_str("abstract ");
        }
        out.push_str("class ");
    }
    out
}

fn member_modifiers(access: u16) -> String {
    let flags = [
        (ACC_PUBLIC, "public "),
        (ACC_PRIVATE, "private "),
        (ACC_PROTECTED, "protected "),
        (ACC_FINAL, "final "),
        (ACC_STATIC, "static "),
        (ACC_BRIDGE, "bridge "),
        (ACC_ABSTRACT, "abstract "),
        (ACC_SYNTHETIC, "synthetic "),
    ];
    flags
        .iter()
        .filter(|(flag, _)| access & flag != 0)
        .map(|(_, name)| *name)
        .collect()
}

fn annotation_text(annotation: &AnnotationModel) -> String {
    let values: Vec<String> = annotation
        .values
        .iter()
        .map(|(name, value)| format!("{}={}", name, value_text(value)))
        .collect();
    let visibility = if annotation.visible { "" } else { " // invisible" };
    format!("@{}({}){}", annotation.descriptor, values.join(", "), visibility)
}

fn value_text(value: &AnnotationValue) -> String {
    match value {
        AnnotationValue::Int(v) => v.to_string(),
        AnnotationValue::Bool(v) => v.to_string(),
        AnnotationValue::String(v) => format!("{:?}", v),
        AnnotationValue::Array(values) => {
            let values: Vec<String> = values.iter().map(value_text).collect();
            format!("{{{}}}", values.join(", "))
        }
    }
}

fn write_field(field: &FieldModel, out: &mut String) -> Result<()> {
    writeln!(out, "  // access flags 0x{:x}", field.access)?;
    if let Some(signature) = &field.signature {
        writeln!(out, "  // signature {}", signature)?;
    }
    write!(out, "  {}{} {}", member_modifiers(field.access), field.descriptor, field.name)?;
    if let Some(value) = &field.constant {
        write!(out, " = {}", ldc_text(value))?;
    }
    writeln!(out)?;
    for annotation in &field.annotations {
        writeln!(out, "  {}", annotation_text(annotation))?;
    }
    Ok(())
}

fn ldc_text(value: &LdcValue) -> String {
    match value {
        LdcValue::Int(v) => v.to_string(),
        LdcValue::Float(v) => format!("{:?}F", v),
        LdcValue::Long(v) => format!("{}L", v),
        LdcValue::Double(v) => format!("{:?}", v),
        LdcValue::String(v) => format!("{:?}", v),
        LdcValue::Type(ty) => format!("{}.class", ty.descriptor()),
    }
}

fn write_method(method: &MethodModel, out: &mut String) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "  // access flags 0x{:x}", method.access)?;
    if let Some(signature) = &method.signature {
        writeln!(out, "  // signature {}", signature)?;
    }
    write!(out, "  {}{}{}", member_modifiers(method.access), method.name, method.descriptor)?;
    if !method.exceptions.is_empty() {
        write!(out, " throws {}", method.exceptions.join(" "))?;
    }
    writeln!(out)?;
    for annotation in &method.annotations {
        writeln!(out, "  {}", annotation_text(annotation))?;
    }
    for (index, annotations) in method.parameter_annotations.iter().enumerate() {
        for annotation in annotations {
            writeln!(out, "  {} // parameter {}", annotation_text(annotation), index)?;
        }
    }
    if let Some(code) = &method.code {
        let mut labels = LabelNames::default();
        for insn in &code.insns {
            writeln!(out, "    {}", insn_text(insn, &mut labels))?;
        }
        for local in &code.locals {
            writeln!(
                out,
                "    LOCALVARIABLE {} {} {} {} {}",
                local.name,
                local.descriptor,
                labels.name(local.start),
                labels.name(local.end),
                local.index
            )?;
        }
        writeln!(out, "    MAXSTACK = {}", max_stack(&code.insns)?)?;
        writeln!(out, "    MAXLOCALS = {}", code.max_locals)?;
    }
    Ok(())
}

#[derive(Default)]
struct LabelNames {
    names: HashMap<Label, usize>,
}

impl LabelNames {
    fn name(&mut self, label: Label) -> String {
        let next = self.names.len();
        format!("L{}", self.names.entry(label).or_insert(next))
    }
}

fn insn_text(insn: &Insn, labels: &mut LabelNames) -> String {
    match insn {
        Insn::Op(opcode) => opcode_name(*opcode).to_uppercase(),
        Insn::IntOp(opcode, operand) => format!("{} {}", opcode_name(*opcode).to_uppercase(), operand),
        Insn::Var(opcode, index) => format!("{} {}", opcode_name(*opcode).to_uppercase(), index),
        Insn::Iinc(index, delta) => format!("IINC {} {}", index, delta),
        Insn::Type(opcode, name) => format!("{} {}", opcode_name(*opcode).to_uppercase(), name),
        Insn::Field { opcode, owner, name, descriptor } => {
            format!("{} {}.{} : {}", opcode_name(*opcode).to_uppercase(), owner, name, descriptor)
        }
        Insn::Method { opcode, owner, name, descriptor, .. } => {
            format!("{} {}.{} {}", opcode_name(*opcode).to_uppercase(), owner, name, descriptor)
        }
        Insn::Jump(opcode, label) => format!("{} {}", opcode_name(*opcode).to_uppercase(), labels.name(*label)),
        Insn::Ldc(value) => format!("LDC {}", ldc_text(value)),
        Insn::Label(label) => labels.name(*label),
        Insn::Line(line, label) => format!("LINENUMBER {} {}", line, labels.name(*label)),
    }
}
