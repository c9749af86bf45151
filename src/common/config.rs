//! Per-run configuration threaded explicitly into code generation

use std::env;
use std::fmt;

use super::error::{Error, Result};
use crate::codegen::defs::JAVA_6;

/// Whether built-in types map onto native JVM types.
///
/// `Disabled` is only used when compiling the standard library itself: built-ins
/// then map to their own `jet/` classes and referencing `java/*` is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinsMapping {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Binary,
    Text,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Binary => write!(f, "binary"),
            OutputMode::Text => write!(f, "text"),
        }
    }
}

/// What the driver does when generating one file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    RecordAndContinue,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub builtins_mapping: BuiltinsMapping,
    pub output_mode: OutputMode,
    pub failure_policy: FailurePolicy,
    pub class_version: u16,
    pub emit_debug_info: bool,
    pub emit_signature_annotations: bool,
    pub read_only_accessor_setters: bool,
    pub namespace_parts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            builtins_mapping: BuiltinsMapping::Enabled,
            output_mode: OutputMode::Binary,
            failure_policy: FailurePolicy::Abort,
            class_version: JAVA_6,
            emit_debug_info: true,
            emit_signature_annotations: true,
            read_only_accessor_setters: false,
            namespace_parts: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `JETGEN_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = env::var("JETGEN_BUILTINS") {
            config.builtins_mapping = match value.as_str() {
                "enabled" => BuiltinsMapping::Enabled,
                "disabled" => BuiltinsMapping::Disabled,
                other => return Err(Error::config(format!("unknown builtins mapping '{}'", other))),
            };
        }
        if let Ok(value) = env::var("JETGEN_OUTPUT") {
            config.output_mode = match value.as_str() {
                "binary" => OutputMode::Binary,
                "text" => OutputMode::Text,
                other => return Err(Error::config(format!("unknown output mode '{}'", other))),
            };
        }
        if let Ok(value) = env::var("JETGEN_FAILURE_POLICY") {
            config.failure_policy = match value.as_str() {
                "abort" => FailurePolicy::Abort,
                "continue" => FailurePolicy::RecordAndContinue,
                other => return Err(Error::config(format!("unknown failure policy '{}'", other))),
            };
        }
        if let Ok(value) = env::var("JETGEN_CLASS_VERSION") {
            config.class_version = value
                .parse()
                .map_err(|_| Error::config(format!("invalid class version '{}'", value)))?;
        }
        if let Ok(value) = env::var("JETGEN_DEBUG_INFO") {
            config.emit_debug_info = parse_flag("JETGEN_DEBUG_INFO", &value)?;
        }
        Ok(config)
    }

    pub fn with_builtins_mapping(mut self, mapping: BuiltinsMapping) -> Self {
        self.builtins_mapping = mapping;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.emit_debug_info = enabled;
        self
    }

    pub fn with_signature_annotations(mut self, enabled: bool) -> Self {
        self.emit_signature_annotations = enabled;
        self
    }

    pub fn with_read_only_accessor_setters(mut self, enabled: bool) -> Self {
        self.read_only_accessor_setters = enabled;
        self
    }

    pub fn with_namespace_parts(mut self, enabled: bool) -> Self {
        self.namespace_parts = enabled;
        self
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::config(format!("{} expects a boolean, got '{}'", name, other))),
    }
}
