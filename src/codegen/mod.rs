//! JVM backend for Jet
//!
//! Lowers resolved Jet files into JVM classes:
//!
//! - **type_mapper / callable**: semantic types and functions to JVM descriptors and call shapes
//! - **context / closure / frame_map**: lexical nesting, captures and local slots
//! - **expression / stack_value / arguments**: method bodies
//! - **namespace / class_body / function / property / closure_codegen / accessor**: class members
//! - **builder / output / classfile / text**: class models and their binary or textual encoding

pub mod accessor;
pub mod arguments;
pub mod builder;
pub mod callable;
pub mod class_body;
pub mod classfile;
pub mod closure;
pub mod closure_codegen;
pub mod context;
pub mod defs;
pub mod expression;
pub mod frame_map;
pub mod function;
pub mod insn;
pub mod jvm_type;
pub mod member_map;
pub mod namespace;
pub mod opcodes;
pub mod output;
pub mod property;
pub mod signature;
pub mod stack_value;
pub mod state;
pub mod text;
pub mod type_mapper;

pub use builder::{ClassBuilder, ClassModel, GeneratedClass};
pub use jvm_type::{JvmType, MethodType};
pub use output::ClassFileFactory;
pub use state::GenerationState;

use indexmap::IndexMap;
use log::info;

use crate::ast::{BindingContext, DescriptorId, JetFile};
use crate::common::config::Config;
use crate::common::error::{Error, Result};

/// Generates every class of `files`.
///
/// Files are grouped by namespace in first-seen order. Under
/// `FailurePolicy::RecordAndContinue` failed files are recorded on the
/// returned factory instead of aborting the run.
pub fn generate_files(files: &[JetFile], mut bindings: BindingContext, config: Config) -> Result<ClassFileFactory> {
    bindings.record_shared_vars(files)?;
    let mut state = GenerationState::new(bindings, config);

    let mut namespaces: IndexMap<DescriptorId, Vec<&JetFile>> = IndexMap::new();
    for file in files {
        namespaces.entry(file.namespace).or_default().push(file);
    }
    for (namespace, files) in &namespaces {
        namespace::generate_namespace(&mut state, *namespace, files)?;
    }

    let pending = state.accessors.pending_owners();
    if !pending.is_empty() && state.factory.failures().is_empty() {
        return Err(Error::internal(format!(
            "accessors requested on classes already finished: {}",
            pending.join(", ")
        )));
    }
    let factory = state.into_factory();
    info!(
        "generated {} class(es), {} file failure(s)",
        factory.class_names().count(),
        factory.failures().len()
    );
    Ok(factory)
}
