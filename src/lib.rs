//! jetgen: JVM backend for the Jet language
//!
//! Takes the resolved output of a Jet front end and generates JVM classes.
//!
//! ## Architecture
//!
//! - **ast**: resolved syntax tree and the binding table of descriptors
//! - **codegen**: lowering of namespaces, classes and bodies to class models,
//!   encoded as `.class` bytes or as textual listings
//! - **common**: configuration and the error taxonomy
//! - **samples**: bundled resolved programs used by the CLI and tests
//! - **bin**: command-line driver
//!
//! ## Generation flow
//!
//! ```text
//! JetFile + BindingContext → shared-variable pass → namespaces → classes → ClassFileFactory
//!                                                      ↓
//!                          Declare → Synthetic → Body → Constructor → <clinit> → Done
//! ```

pub mod ast;
pub mod codegen;
pub mod common;
pub mod samples;

pub use codegen::{generate_files, ClassFileFactory};
pub use common::config::{BuiltinsMapping, Config, FailurePolicy, OutputMode};
pub use common::error::{Error, FileFailure, Result};

use log::info;

/// Generates `files` and fails with [`Error::Compilation`] if any file failed
pub fn compile(files: &[ast::JetFile], bindings: ast::BindingContext, config: Config) -> Result<ClassFileFactory> {
    info!("compiling {} file(s)", files.len());
    let mut factory = generate_files(files, bindings, config)?;
    factory.check_failures()?;
    Ok(factory)
}
