//! Synthetic accessors
//!
//! Code physically inside a nested class (an inner class, a function literal,
//! an object literal) cannot touch the private members of the class that
//! encloses it. For each such member and requesting class the owner gets one
//! static forwarding method named `<member>$b$<index>`, or `$init$b$<index>`
//! for constructors. Requests are recorded while the owner's body is being
//! generated and the forwarding methods are emitted when the owner finishes.

use indexmap::IndexMap;
use log::debug;

use crate::ast::{BindingContext, Descriptor, DescriptorId, FunctionKind};
use crate::common::error::{Error, Result};

use super::builder::ClassBuilder;
use super::callable::{CallableMethod, InvokeKind, JvmMethodSignature};
use super::context::OwnerKind;
use super::defs::access::*;
use super::defs::{ACCESSOR_INFIX, CONSTRUCTOR_ACCESSOR_NAME, CONSTRUCTOR_METHOD_NAME};
use super::insn::InstructionAdapter;
use super::jvm_type::{JvmType, MethodType};
use super::stack_value::AccessorMethod;
use super::state::GenerationState;
use super::type_mapper::{getter_name, setter_name};

const ACCESSOR_FLAGS: u16 = ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Function,
    Constructor,
    Property,
}

/// One synthesized accessor of a member of `owner`
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub member: DescriptorId,
    pub kind: AccessorKind,
    pub owner: String,
    pub requester: String,
    pub index: usize,
    /// `f$b$0`, `$init$b$1` or, for properties, `x$b$2`
    pub name: String,
}

impl Accessor {
    /// Getter of a property accessor: `getX$b$2`
    pub fn getter_name(&self) -> String {
        getter_name(&self.name)
    }

    pub fn setter_name(&self) -> String {
        setter_name(&self.name)
    }

    fn owner_type(&self) -> JvmType {
        JvmType::object(self.owner.clone())
    }

    /// Shape of the forwarding method for a function or constructor
    pub fn method_signature(&self, original: &JvmMethodSignature) -> JvmMethodSignature {
        let mut arguments = Vec::new();
        let return_type = match self.kind {
            AccessorKind::Constructor => {
                arguments.extend(original.method_type.arguments.iter().cloned());
                self.owner_type()
            }
            _ => {
                arguments.push(self.owner_type());
                arguments.extend(original.method_type.arguments.iter().cloned());
                original.return_type().clone()
            }
        };
        JvmMethodSignature {
            name: self.name.clone(),
            method_type: MethodType::new(arguments, return_type),
            generic_signature: None,
            ..original.clone()
        }
    }

    /// Call target replacing a direct call of the original member
    pub fn callable(&self, original: &CallableMethod) -> CallableMethod {
        CallableMethod {
            owner: self.owner.clone(),
            signature: self.method_signature(&original.signature),
            invoke_kind: InvokeKind::Static,
            needs_this: self.kind != AccessorKind::Constructor,
            needs_outer_receiver: false,
            accepts_type_info: original.accepts_type_info,
            has_default_overload: original.has_default_overload,
            default_owner: original.default_owner.clone(),
        }
    }

    pub fn getter(&self, ty: &JvmType) -> AccessorMethod {
        AccessorMethod {
            owner: self.owner.clone(),
            name: self.getter_name(),
            descriptor: MethodType::new(vec![self.owner_type()], ty.clone()).descriptor(),
            invoke_kind: InvokeKind::Static,
        }
    }

    pub fn setter(&self, ty: &JvmType) -> AccessorMethod {
        AccessorMethod {
            owner: self.owner.clone(),
            name: self.setter_name(),
            descriptor: MethodType::new(vec![self.owner_type(), ty.clone()], JvmType::Void).descriptor(),
            invoke_kind: InvokeKind::Static,
        }
    }
}

/// Accessors requested per owner class, in request order
#[derive(Debug, Default)]
pub struct AccessorRegistry {
    owners: IndexMap<String, IndexMap<(DescriptorId, String), Accessor>>,
}

impl AccessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accessor of `member` for `requester`, creating it on first request
    pub fn request(
        &mut self,
        bindings: &BindingContext,
        owner: &str,
        member: DescriptorId,
        requester: &str,
    ) -> Result<&Accessor> {
        let (kind, base) = match bindings.get(member)? {
            Descriptor::Function(f) if f.kind == FunctionKind::Constructor => {
                (AccessorKind::Constructor, CONSTRUCTOR_ACCESSOR_NAME.to_string())
            }
            Descriptor::Function(f) if f.kind == FunctionKind::Function => (AccessorKind::Function, f.name.clone()),
            Descriptor::Property(p) => (AccessorKind::Property, p.name.clone()),
            other => {
                return Err(Error::internal(format!(
                    "no accessor can be synthesized for {} '{}'",
                    other.kind_name(),
                    other.name()
                )))
            }
        };
        let table = self.owners.entry(owner.to_string()).or_default();
        let key = (member, requester.to_string());
        if !table.contains_key(&key) {
            let index = table.len();
            let accessor = Accessor {
                member,
                kind,
                owner: owner.to_string(),
                requester: requester.to_string(),
                index,
                name: format!("{}{}{}", base, ACCESSOR_INFIX, index),
            };
            debug!("accessor {}.{} for {}", owner, accessor.name, requester);
            table.insert(key.clone(), accessor);
        }
        Ok(&table[&key])
    }

    /// Accessors of one owner in request order
    pub fn accessors(&self, owner: &str) -> Vec<&Accessor> {
        self.owners.get(owner).map(|t| t.values().collect()).unwrap_or_default()
    }

    /// Removes and returns the accessors of a finished owner
    pub fn take(&mut self, owner: &str) -> Vec<Accessor> {
        self.owners
            .shift_remove(owner)
            .map(|t| t.into_values().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, owner: &str) -> usize {
        self.owners.get(owner).map_or(0, IndexMap::len)
    }

    /// Forgets the accessors of `owner` requested after the first `len`
    pub fn truncate(&mut self, owner: &str, len: usize) {
        if let Some(table) = self.owners.get_mut(owner) {
            table.truncate(len);
        }
    }

    /// Owners with accessors that were never emitted
    pub fn pending_owners(&self) -> Vec<&str> {
        self.owners
            .iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(owner, _)| owner.as_str())
            .collect()
    }
}

/// Emits the forwarding methods requested against `owner`
pub fn generate_accessors(state: &mut GenerationState, builder: &mut ClassBuilder, owner: &str) -> Result<()> {
    for accessor in state.accessors.take(owner) {
        match accessor.kind {
            AccessorKind::Function | AccessorKind::Constructor => function_accessor(state, builder, &accessor)?,
            AccessorKind::Property => property_accessor(state, builder, &accessor)?,
        }
    }
    Ok(())
}

fn original_signature(state: &GenerationState, member: DescriptorId) -> Result<JvmMethodSignature> {
    match state.member_map.method(member) {
        Some(entry) => Ok(entry.signature.clone()),
        None => state.type_mapper.map_signature(member, &OwnerKind::Implementation),
    }
}

/// Loads every argument of `method_type` starting at slot 0
fn load_arguments(method_type: &MethodType, v: &mut InstructionAdapter) {
    let mut slot = 0;
    for argument in &method_type.arguments {
        v.load(slot, argument);
        slot += argument.size();
    }
}

fn function_accessor(state: &mut GenerationState, builder: &mut ClassBuilder, accessor: &Accessor) -> Result<()> {
    let original = original_signature(state, accessor.member)?;
    let signature = accessor.method_signature(&original);
    let mut v = InstructionAdapter::new();
    if accessor.kind == AccessorKind::Constructor {
        v.anew(&accessor.owner);
        v.dup_value(&accessor.owner_type());
        load_arguments(&original.method_type, &mut v);
        v.invokespecial(&accessor.owner, CONSTRUCTOR_METHOD_NAME, &original.descriptor());
    } else {
        load_arguments(&signature.method_type, &mut v);
        v.invokespecial(&accessor.owner, &original.name, &original.descriptor());
    }
    v.areturn(signature.return_type());
    let max_locals = signature.method_type.arguments_size();
    builder
        .new_method(ACCESSOR_FLAGS, &signature.name, &signature.descriptor(), None, Vec::new())?
        .visit_code(v, max_locals);
    Ok(())
}

fn property_accessor(state: &mut GenerationState, builder: &mut ClassBuilder, accessor: &Accessor) -> Result<()> {
    let bindings = state.bindings();
    let property = bindings.property(accessor.member)?;
    let ty = state.type_mapper.map_type(&property.ty, super::type_mapper::MapTypeMode::Value)?;
    let owner_type = accessor.owner_type();
    let direct = property.uses_direct_field();

    let getter = accessor.getter(&ty);
    let mut v = InstructionAdapter::new();
    v.load(0, &owner_type);
    if direct {
        v.getfield(&accessor.owner, &property.name, &ty.descriptor());
    } else {
        let original = state.type_mapper.map_getter_signature(accessor.member, &OwnerKind::Implementation)?;
        v.invokespecial(&accessor.owner, &original.name, &original.descriptor());
    }
    v.areturn(&ty);
    builder
        .new_method(ACCESSOR_FLAGS, &getter.name, &getter.descriptor, None, Vec::new())?
        .visit_code(v, 1);

    if property.mutable || state.config.read_only_accessor_setters {
        let setter = accessor.setter(&ty);
        let mut v = InstructionAdapter::new();
        if property.mutable {
            v.load(0, &owner_type);
            v.load(1, &ty);
            if direct {
                v.putfield(&accessor.owner, &property.name, &ty.descriptor());
            } else {
                let original = state.type_mapper.map_setter_signature(accessor.member, &OwnerKind::Implementation)?;
                v.invokespecial(&accessor.owner, &original.name, &original.descriptor());
            }
        }
        v.areturn(&JvmType::Void);
        builder
            .new_method(ACCESSOR_FLAGS, &setter.name, &setter.descriptor, None, Vec::new())?
            .visit_code(v, 1 + ty.size());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDescriptor, Modality, SemanticType, Visibility};

    fn bindings_with_function() -> (BindingContext, DescriptorId, DescriptorId) {
        let mut bindings = BindingContext::new();
        let namespace = bindings.add_namespace("p");
        let function = bindings.add_function(FunctionDescriptor {
            name: "f".to_string(),
            container: namespace,
            kind: FunctionKind::Function,
            visibility: Visibility::Private,
            modality: Modality::Final,
            receiver: None,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type: SemanticType::int(),
        });
        (bindings, namespace, function)
    }

    #[test]
    fn test_request_is_idempotent_per_requester() {
        let (bindings, _, f) = bindings_with_function();
        let mut registry = AccessorRegistry::new();

        let first = registry.request(&bindings, "p/A", f, "p/A$1").unwrap().name.clone();
        let again = registry.request(&bindings, "p/A", f, "p/A$1").unwrap().name.clone();
        let other = registry.request(&bindings, "p/A", f, "p/A$2").unwrap().name.clone();

        assert_eq!(first, "f$b$0");
        assert_eq!(again, first);
        assert_eq!(other, "f$b$1");
        assert_eq!(registry.accessors("p/A").len(), 2);
    }

    #[test]
    fn test_take_clears_pending_owner() {
        let (bindings, _, f) = bindings_with_function();
        let mut registry = AccessorRegistry::new();
        registry.request(&bindings, "p/A", f, "p/A$1").unwrap();
        assert_eq!(registry.pending_owners(), vec!["p/A"]);

        let taken = registry.take("p/A");
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].kind, AccessorKind::Function);
        assert!(registry.pending_owners().is_empty());
        assert!(registry.take("p/A").is_empty());
    }

    #[test]
    fn test_namespace_has_no_accessor() {
        let (bindings, namespace, _) = bindings_with_function();
        let mut registry = AccessorRegistry::new();
        let err = registry.request(&bindings, "p/A", namespace, "p/A$1").unwrap_err();
        assert!(err.is_internal());
        assert!(registry.accessors("p/A").is_empty());
    }

    #[test]
    fn test_function_accessor_takes_owner_first() {
        let accessor = Accessor {
            member: DescriptorId(0),
            kind: AccessorKind::Function,
            owner: "p/A".to_string(),
            requester: "p/A$1".to_string(),
            index: 0,
            name: "f$b$0".to_string(),
        };
        let getter = accessor.getter(&JvmType::Int);
        assert_eq!(getter.name, "getF$b$0");
        assert_eq!(getter.descriptor, "(Lp/A;)I");
        assert_eq!(accessor.setter(&JvmType::Int).descriptor, "(Lp/A;I)V");
    }
}
