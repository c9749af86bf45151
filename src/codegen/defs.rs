//! Classfile and naming conventions shared by every generator

/// Header of a class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Class file major versions
pub mod major_versions {
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_7: u16 = 51;
    pub const JAVA_8: u16 = 52;
}

/// Default target: old enough that no StackMapTable is required
pub const JAVA_6: u16 = major_versions::JAVA_6_0;

/// Class holding the top-level declarations of a namespace
pub const NAMESPACE_CLASS_NAME: &str = "namespace";
/// Infix of per-file namespace part classes: `namespace$src$<File>`
pub const NAMESPACE_PART_INFIX: &str = "$src$";
pub const TRAIT_IMPL_SUFFIX: &str = "$$TImpl";
pub const DEFAULT_METHOD_SUFFIX: &str = "$default";
pub const ACCESSOR_INFIX: &str = "$b$";
pub const CONSTRUCTOR_ACCESSOR_NAME: &str = "$init";
pub const INSTANCE_FIELD: &str = "$instance";
pub const THIS_FIELD_PREFIX: &str = "this$";
pub const RECEIVER_FIELD_PREFIX: &str = "receiver$";
pub const SHARED_VALUE_FIELD: &str = "ref";
pub const INVOKE_METHOD_NAME: &str = "invoke";

pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const STRING_CLASS: &str = "java/lang/String";
pub const STRING_BUILDER_CLASS: &str = "java/lang/StringBuilder";
pub const SHARED_VAR_PREFIX: &str = "jet/runtime/SharedVar$";
pub const FUNCTION_CLASS_PREFIX: &str = "jet/Function";
pub const FUNCTION_IMPL_CLASS_PREFIX: &str = "jet/FunctionImpl";
pub const INTRINSICS_CLASS: &str = "jet/runtime/Intrinsics";
pub const JET_METHOD_ANNOTATION: &str = "Ljet/runtime/typeinfo/JetMethod;";
pub const JET_VALUE_PARAMETER_ANNOTATION: &str = "Ljet/runtime/typeinfo/JetValueParameter;";

/// Access flags for classes, fields and methods
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}
