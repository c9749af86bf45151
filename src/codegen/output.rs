//! Output aggregation
//!
//! Every generated class passes through the [`ClassFileFactory`]. It hands out
//! builders configured for the run's output mode, collects the finished
//! classes in generation order and serves them back as `.class` payloads or
//! `.txt` listings.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};

use crate::common::config::{FailurePolicy, OutputMode};
use crate::common::error::{Error, FileFailure, Result};

use super::builder::{ClassBuilder, ClassContent, ClassModel, GeneratedClass};

impl GeneratedClass {
    /// Relative output path: `pkg/Name.class` or `pkg/Name.txt`
    pub fn file_name(&self) -> String {
        match self.content {
            ClassContent::Binary(_) => format!("{}.class", self.model.name),
            ClassContent::Text(_) => format!("{}.txt", self.model.name),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match &self.content {
            ClassContent::Binary(bytes) => Ok(bytes),
            ClassContent::Text(_) => Err(Error::OutputMode {
                requested: OutputMode::Binary.to_string(),
                actual: OutputMode::Text.to_string(),
            }),
        }
    }

    pub fn as_text(&self) -> Result<&str> {
        match &self.content {
            ClassContent::Text(text) => Ok(text),
            ClassContent::Binary(_) => Err(Error::OutputMode {
                requested: OutputMode::Text.to_string(),
                actual: OutputMode::Binary.to_string(),
            }),
        }
    }
}

pub struct ClassFileFactory {
    mode: OutputMode,
    debug_info: bool,
    policy: FailurePolicy,
    classes: IndexMap<String, GeneratedClass>,
    failures: Vec<FileFailure>,
}

impl ClassFileFactory {
    pub fn new(mode: OutputMode, debug_info: bool, policy: FailurePolicy) -> Self {
        Self {
            mode,
            debug_info,
            policy,
            classes: IndexMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Fresh builder in this factory's mode
    pub fn new_builder(&self) -> ClassBuilder {
        ClassBuilder::new(self.mode, self.debug_info)
    }

    /// Finishes a builder and registers its class
    pub fn finish(&mut self, builder: &mut ClassBuilder) -> Result<()> {
        let class = builder.done()?;
        self.add(class)
    }

    pub fn add(&mut self, class: GeneratedClass) -> Result<()> {
        if class.content.mode() != self.mode {
            return Err(Error::OutputMode {
                requested: self.mode.to_string(),
                actual: class.content.mode().to_string(),
            });
        }
        let name = class.name().to_string();
        if self.classes.contains_key(&name) {
            return Err(Error::internal(format!("class {} generated twice", name)));
        }
        debug!("generated class {}", name);
        self.classes.insert(name, class);
        Ok(())
    }

    /// Applies the failure policy to the outcome of one source file.
    ///
    /// Under `Abort` the error is returned as is; under `RecordAndContinue` it
    /// is kept against the file and generation goes on.
    pub fn handle_file_result(&mut self, file: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(error) => match self.policy {
                FailurePolicy::Abort => Err(error),
                FailurePolicy::RecordAndContinue => {
                    log::warn!("{}: {}", file, error);
                    self.failures.push(FileFailure { file: file.to_string(), error });
                    Ok(())
                }
            },
        }
    }

    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<FileFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Turns the recorded failures, if any, into one [`Error::Compilation`]
    pub fn check_failures(&mut self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(Error::Compilation { failures: self.take_failures() })
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Drops the classes generated after the first `count`
    pub fn discard_since(&mut self, count: usize) {
        for (name, _) in self.classes.drain(count.min(self.classes.len())..) {
            debug!("discarded class {}", name);
        }
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn class(&self, name: &str) -> Option<&GeneratedClass> {
        self.classes.get(name)
    }

    pub fn model(&self, name: &str) -> Option<&ClassModel> {
        self.classes.get(name).map(|c| &c.model)
    }

    /// Output paths in generation order
    pub fn files(&self) -> Vec<String> {
        self.classes.values().map(GeneratedClass::file_name).collect()
    }

    fn by_file(&self, file: &str) -> Result<&GeneratedClass> {
        self.classes
            .values()
            .find(|c| c.file_name() == file)
            .ok_or_else(|| Error::internal(format!("no output file {}", file)))
    }

    pub fn as_bytes(&self, file: &str) -> Result<&[u8]> {
        if self.mode != OutputMode::Binary {
            return Err(Error::OutputMode {
                requested: OutputMode::Binary.to_string(),
                actual: self.mode.to_string(),
            });
        }
        self.by_file(file)?.as_bytes()
    }

    pub fn as_text(&self, file: &str) -> Result<&str> {
        if self.mode != OutputMode::Text {
            return Err(Error::OutputMode {
                requested: OutputMode::Text.to_string(),
                actual: self.mode.to_string(),
            });
        }
        self.by_file(file)?.as_text()
    }

    /// Writes every class below `dir`, creating package directories
    pub fn write_to(&self, dir: &Path) -> Result<usize> {
        for class in self.classes.values() {
            let path = dir.join(class.file_name());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            match &class.content {
                ClassContent::Binary(bytes) => fs::write(&path, bytes)?,
                ClassContent::Text(text) => fs::write(&path, text)?,
            }
        }
        info!("wrote {} class file(s) to {}", self.classes.len(), dir.display());
        Ok(self.classes.len())
    }
}
