use std::fmt;
use thiserror::Error;

use crate::ast::SourceLocation;

/// Result type for jetgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the jetgen backend
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// A violated invariant of this phase or of the one that fed it.
    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    #[error("Unsupported construct at {location}: {construct}")]
    Unsupported {
        construct: String,
        location: SourceLocation,
    },

    #[error("Error generating {declaration} in {class} ({owner_kind})")]
    Declaration {
        class: String,
        declaration: String,
        owner_kind: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Output mode mismatch: requested {requested} output from a builder configured for {actual}")]
    OutputMode { requested: String, actual: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Compilation failed for {} file(s)", failures.len())]
    Compilation { failures: Vec<FileFailure> },
}

/// An exception recorded against the file that produced it.
#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: Error,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.error)
    }
}

impl Error {
    /// Create an internal-consistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Create an unsupported-construct error with the offending location attached
    pub fn unsupported(construct: impl Into<String>, location: &SourceLocation) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            location: location.clone(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Wrap a failure with the identity of the member that triggered it
    pub fn in_declaration(
        self,
        class: impl Into<String>,
        declaration: impl Into<String>,
        owner_kind: impl fmt::Display,
    ) -> Self {
        Self::Declaration {
            class: class.into(),
            declaration: declaration.into(),
            owner_kind: owner_kind.to_string(),
            source: Box::new(self),
        }
    }

    pub fn is_internal(&self) -> bool {
        match self {
            Self::Internal { .. } => true,
            Self::Declaration { source, .. } => source.is_internal(),
            _ => false,
        }
    }

    /// The innermost error once per-declaration wrapping is peeled off
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Declaration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
