//! Resolved program model handed over by the front end
//!
//! The backend never parses or resolves anything itself. It consumes:
//!
//! - **types**: semantic types as the front end computed them
//! - **descriptors**: declarations (classes, functions, properties, parameters, locals)
//! - **binding**: the binding table owning every descriptor plus derived facts
//! - **nodes**: the resolved syntax tree whose nodes point at descriptors

mod binding;
mod descriptors;
mod nodes;
mod types;

pub use binding::*;
pub use descriptors::*;
pub use nodes::*;
pub use types::*;

use std::fmt;

/// Source location information
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
