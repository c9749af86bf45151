//! Resolved call targets

use std::fmt;

use super::defs::DEFAULT_METHOD_SUFFIX;
use super::insn::InstructionAdapter;
use super::jvm_type::{JvmType, MethodType};
use super::opcodes::*;

/// Emitted shape of a function: descriptor plus what the signature records need
#[derive(Debug, Clone, PartialEq)]
pub struct JvmMethodSignature {
    pub name: String,
    pub method_type: MethodType,
    pub generic_signature: Option<String>,
    /// Type of the implicit `this` passed as first argument (trait-impl members)
    pub this_parameter: Option<JvmType>,
    /// Extension receiver, passed after `this_parameter`
    pub receiver_parameter: Option<JvmType>,
    /// Declared value parameters only
    pub value_parameters: Vec<JvmType>,
    pub kotlin_type_parameters: String,
    pub kotlin_return_type: String,
}

impl JvmMethodSignature {
    pub fn descriptor(&self) -> String {
        self.method_type.descriptor()
    }

    pub fn return_type(&self) -> &JvmType {
        &self.method_type.return_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

impl InvokeKind {
    pub fn opcode(self) -> u8 {
        match self {
            InvokeKind::Static => INVOKESTATIC,
            InvokeKind::Virtual => INVOKEVIRTUAL,
            InvokeKind::Interface => INVOKEINTERFACE,
            InvokeKind::Special => INVOKESPECIAL,
        }
    }
}

/// Fully resolved call target, built per call site and consumed immediately
#[derive(Debug, Clone)]
pub struct CallableMethod {
    pub owner: String,
    pub signature: JvmMethodSignature,
    pub invoke_kind: InvokeKind,
    /// Receiver object must be on the stack below the arguments
    pub needs_this: bool,
    /// Outer instance passed to a constructor of a capturing class
    pub needs_outer_receiver: bool,
    pub accepts_type_info: bool,
    pub has_default_overload: bool,
    /// Owner of the `$default` overload, when it differs from `owner`
    pub default_owner: Option<String>,
}

impl CallableMethod {
    pub fn value_parameter_types(&self) -> &[JvmType] {
        &self.signature.value_parameters
    }

    pub fn return_type(&self) -> &JvmType {
        self.signature.return_type()
    }

    pub fn invoke(&self, v: &mut InstructionAdapter) {
        v.invoke(self.invoke_kind, &self.owner, &self.signature.name, &self.signature.descriptor());
    }

    /// Descriptor of the `$default` overload: receiver first for instance members, mask last
    pub fn default_method_type(&self) -> MethodType {
        let mut arguments = Vec::new();
        if self.needs_this && self.signature.name != "<init>" {
            arguments.push(JvmType::object(self.owner.clone()));
        }
        arguments.extend(self.signature.method_type.arguments.iter().cloned());
        arguments.push(JvmType::Int);
        MethodType::new(arguments, self.signature.return_type().clone())
    }

    pub fn default_method_name(&self) -> String {
        if self.signature.name == "<init>" {
            self.signature.name.clone()
        } else {
            format!("{}{}", self.signature.name, DEFAULT_METHOD_SUFFIX)
        }
    }

    /// Calls the `$default` overload; constructors take the mask as an extra `<init>` argument
    pub fn invoke_default(&self, v: &mut InstructionAdapter) {
        let owner = self.default_owner.as_deref().unwrap_or(&self.owner);
        let descriptor = self.default_method_type().descriptor();
        if self.signature.name == "<init>" {
            v.invokespecial(owner, "<init>", &descriptor);
        } else {
            v.invokestatic(owner, &self.default_method_name(), &descriptor);
        }
    }
}

impl fmt::Display for CallableMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}.{}{}",
            self.invoke_kind,
            self.owner,
            self.signature.name,
            self.signature.descriptor()
        )?;
        if self.accepts_type_info {
            write!(f, " [generic]")?;
        }
        Ok(())
    }
}
