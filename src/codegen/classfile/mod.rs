//! Binary classfile encoding

pub mod attribute;
pub mod class;
pub mod code;
pub mod constpool;
pub mod writer;

pub use class::ClassFile;
pub use writer::ClassfileWritable;

use crate::codegen::builder::ClassModel;
use crate::common::error::Result;

/// Encodes a finished class model as classfile bytes
pub fn to_bytes(model: &ClassModel, debug_info: bool) -> Result<Vec<u8>> {
    let class_file = ClassFile::assemble(model, debug_info)?;
    Ok(class_file.to_classfile_bytes()?)
}
