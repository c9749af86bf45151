//! Capture tables of function literals and object literals
//!
//! The body of a literal is generated before its class is finished. Every
//! outer value the body touches is recorded here on first use and becomes a
//! constructor parameter and a field of the literal's class.

use indexmap::IndexMap;

use crate::ast::{BindingContext, DescriptorId};
use crate::common::error::{Error, Result};

use super::context::CodegenContext;
use super::defs::{RECEIVER_FIELD_PREFIX, THIS_FIELD_PREFIX};
use super::insn::InstructionAdapter;
use super::jvm_type::JvmType;
use super::stack_value::StackValue;

/// What a captured field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKey {
    /// Local variable or parameter of an enclosing function
    Variable(DescriptorId),
    /// Instance of an enclosing class
    This(DescriptorId),
    /// Extension receiver of an enclosing function
    Receiver(DescriptorId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnclosedValueDescriptor {
    pub key: CaptureKey,
    pub field_name: String,
    /// Type of the field: the cell class for shared variables
    pub field_type: JvmType,
    /// Type of the value seen by code
    pub value_type: JvmType,
    pub shared: bool,
}

impl EnclosedValueDescriptor {
    fn plain(key: CaptureKey, field_name: String, ty: JvmType) -> Self {
        Self { key, field_name, field_type: ty.clone(), value_type: ty, shared: false }
    }

    /// Access path from inside the literal's own methods; pushes `this` first
    pub fn inner_value(&self, owner: &str, v: &mut InstructionAdapter) -> StackValue {
        v.load(0, &JvmType::object(owner));
        if self.shared {
            StackValue::FieldForShared {
                owner: owner.to_string(),
                name: self.field_name.clone(),
                cell: self.field_type.clone(),
                ty: self.value_type.clone(),
            }
        } else {
            StackValue::field(self.field_type.clone(), owner, self.field_name.clone(), false)
        }
    }
}

#[derive(Debug)]
pub struct MutableClosure {
    class_name: String,
    captured: IndexMap<CaptureKey, EnclosedValueDescriptor>,
    variables: usize,
}

impl MutableClosure {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            captured: IndexMap::new(),
            variables: 0,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }

    /// Captures in order of first reference
    pub fn captures(&self) -> impl Iterator<Item = &EnclosedValueDescriptor> {
        self.captured.values()
    }

    pub fn get(&self, key: CaptureKey) -> Option<&EnclosedValueDescriptor> {
        self.captured.get(&key)
    }

    /// Records a variable on first reference; later calls return the same entry
    pub fn capture_variable(&mut self, variable: DescriptorId, value_type: JvmType, cell: Option<JvmType>) -> &EnclosedValueDescriptor {
        let key = CaptureKey::Variable(variable);
        if !self.captured.contains_key(&key) {
            self.variables += 1;
            let captured = EnclosedValueDescriptor {
                key,
                field_name: format!("${}", self.variables),
                shared: cell.is_some(),
                field_type: cell.unwrap_or_else(|| value_type.clone()),
                value_type,
            };
            self.captured.insert(key, captured);
        }
        &self.captured[&key]
    }

    /// Captures the instance of an enclosing class as `this$0`, `this$1`, ...
    pub fn capture_this(&mut self, class: DescriptorId, class_type: JvmType) -> &EnclosedValueDescriptor {
        let key = CaptureKey::This(class);
        if !self.captured.contains_key(&key) {
            let field_name = format!("{}{}", THIS_FIELD_PREFIX, self.count(|k| matches!(k, CaptureKey::This(_))));
            self.captured.insert(key, EnclosedValueDescriptor::plain(key, field_name, class_type));
        }
        &self.captured[&key]
    }

    pub fn capture_receiver(&mut self, function: DescriptorId, receiver_type: JvmType) -> &EnclosedValueDescriptor {
        let key = CaptureKey::Receiver(function);
        if !self.captured.contains_key(&key) {
            let field_name = format!("{}{}", RECEIVER_FIELD_PREFIX, self.count(|k| matches!(k, CaptureKey::Receiver(_))));
            self.captured.insert(key, EnclosedValueDescriptor::plain(key, field_name, receiver_type));
        }
        &self.captured[&key]
    }

    fn count(&self, filter: impl Fn(&CaptureKey) -> bool) -> usize {
        self.captured.keys().filter(|k| filter(k)).count()
    }

    /// Constructor descriptor taking every capture in order
    pub fn constructor_descriptor(&self) -> String {
        let mut descriptor = String::from("(");
        for capture in self.captures() {
            descriptor.push_str(&capture.field_type.descriptor());
        }
        descriptor.push_str(")V");
        descriptor
    }
}

/// Resolves a variable that is not in the current frame.
///
/// The variable's declaring function must enclose the current code, and the
/// current code must belong to a literal class able to hold the capture.
pub fn resolve<'c>(
    closure: Option<&'c mut MutableClosure>,
    context: &CodegenContext<'_>,
    bindings: &BindingContext,
    variable: DescriptorId,
    value_type: JvmType,
    cell: Option<JvmType>,
) -> Result<&'c EnclosedValueDescriptor> {
    let container = bindings
        .container(variable)?
        .ok_or_else(|| Error::internal(format!("variable {} has no container", variable)))?;
    if context.find_function(container).is_none() {
        return Err(Error::internal(format!(
            "{} '{}' is referenced outside of the function declaring it",
            variable,
            bindings.get(variable)?.name()
        )));
    }
    let closure = closure.ok_or_else(|| {
        Error::internal(format!(
            "{} is declared in an enclosing function but the current code has no closure to capture it",
            variable
        ))
    })?;
    Ok(closure.capture_variable(variable, value_type, cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDescriptor, FunctionKind, Modality, SemanticType, VariableDescriptor, Visibility};
    use crate::codegen::context::OwnerKind;

    #[test]
    fn test_capture_names_follow_first_reference() {
        let mut closure = MutableClosure::new("p/namespace$1");
        let a = DescriptorId(10);
        let b = DescriptorId(11);
        let cell = JvmType::object("jet/runtime/SharedVar$Int");

        assert_eq!(closure.capture_variable(a, JvmType::Int, None).field_name, "$1");
        assert_eq!(closure.capture_variable(b, JvmType::Int, Some(cell.clone())).field_name, "$2");
        for _ in 0..3 {
            assert_eq!(closure.capture_variable(a, JvmType::Int, None).field_name, "$1");
        }
        assert_eq!(closure.capture_this(DescriptorId(1), JvmType::object("p/A")).field_name, "this$0");

        let names: Vec<&str> = closure.captures().map(|c| c.field_name.as_str()).collect();
        assert_eq!(names, vec!["$1", "$2", "this$0"]);
        let shared = closure.get(CaptureKey::Variable(b)).unwrap();
        assert!(shared.shared);
        assert_eq!(shared.field_type, cell);
        assert_eq!(shared.value_type, JvmType::Int);
        assert_eq!(closure.constructor_descriptor(), "(ILjet/runtime/SharedVar$Int;Lp/A;)V");
    }

    fn bindings() -> (BindingContext, DescriptorId, DescriptorId) {
        let mut bindings = BindingContext::new();
        let ns = bindings.add_namespace("p");
        let function = bindings.add_function(FunctionDescriptor {
            name: "f".to_string(),
            container: ns,
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            modality: Modality::Final,
            receiver: None,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type: SemanticType::Unit,
        });
        let variable = bindings.add_variable(VariableDescriptor {
            name: "x".to_string(),
            container: function,
            ty: SemanticType::int(),
            mutable: false,
        });
        (bindings, function, variable)
    }

    #[test]
    fn test_resolve_needs_a_host_class() {
        let (bindings, function, variable) = bindings();
        let namespace = CodegenContext::namespace(DescriptorId(0), "p/namespace", OwnerKind::Namespace);
        let method = namespace.enter_method(function).unwrap();
        let literal = DescriptorId(99);
        let closure_context = method.enter_closure(literal, "p/namespace$1");

        let err = resolve(None, &closure_context, &bindings, variable, JvmType::Int, None).unwrap_err();
        assert!(err.is_internal());

        let mut closure = MutableClosure::new("p/namespace$1");
        let captured = resolve(Some(&mut closure), &closure_context, &bindings, variable, JvmType::Int, None).unwrap();
        assert_eq!(captured.field_name, "$1");
        assert!(!captured.shared);
    }

    #[test]
    fn test_resolve_rejects_foreign_variables() {
        let (bindings, _, variable) = bindings();
        let namespace = CodegenContext::namespace(DescriptorId(0), "p/namespace", OwnerKind::Namespace);
        let other = namespace.enter_method(DescriptorId(50)).unwrap();
        let mut closure = MutableClosure::new("p/namespace$1");
        assert!(resolve(Some(&mut closure), &other, &bindings, variable, JvmType::Int, None).is_err());
        assert!(closure.is_empty());
    }
}
