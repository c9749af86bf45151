// Common test utilities
#![allow(dead_code)]

use jetgen::codegen::insn::Insn;
use jetgen::codegen::{ClassFileFactory, ClassModel};
use jetgen::codegen::builder::MethodModel;
use jetgen::{samples, Config, Result};

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Generates a bundled sample with `config`
pub fn generate_sample(name: &str, config: Config) -> Result<ClassFileFactory> {
    init_logging();
    let program = samples::find(name).expect("unknown sample").program();
    jetgen::generate_files(&program.files, program.bindings, config)
}

pub fn class<'f>(factory: &'f ClassFileFactory, name: &str) -> &'f ClassModel {
    factory
        .model(name)
        .unwrap_or_else(|| panic!("class {} not generated; have {:?}", name, factory.class_names().collect::<Vec<_>>()))
}

pub fn method<'c>(class: &'c ClassModel, name: &str, descriptor: &str) -> &'c MethodModel {
    class.method(name, descriptor).unwrap_or_else(|| {
        let have: Vec<String> = class.methods.iter().map(|m| format!("{}{}", m.name, m.descriptor)).collect();
        panic!("{}.{}{} not found; have {:?}", class.name, name, descriptor, have)
    })
}

/// Instructions of a method without labels and line markers
pub fn code(method: &MethodModel) -> Vec<Insn> {
    method
        .code
        .as_ref()
        .expect("method has no code")
        .insns
        .iter()
        .filter(|i| !matches!(i, Insn::Label(_) | Insn::Line(..)))
        .cloned()
        .collect()
}

/// `owner.name` of every method call, in order
pub fn calls(method: &MethodModel) -> Vec<String> {
    code(method)
        .into_iter()
        .filter_map(|i| match i {
            Insn::Method { owner, name, .. } => Some(format!("{}.{}", owner, name)),
            _ => None,
        })
        .collect()
}

/// `owner.name` of every field access, in order
pub fn field_accesses(method: &MethodModel) -> Vec<String> {
    code(method)
        .into_iter()
        .filter_map(|i| match i {
            Insn::Field { owner, name, .. } => Some(format!("{}.{}", owner, name)),
            _ => None,
        })
        .collect()
}

pub fn has_flag(access: u16, flag: u16) -> bool {
    access & flag != 0
}
