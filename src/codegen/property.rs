//! Backing fields and accessor methods of properties
//!
//! Initializers are not handled here: the class generator collects them and
//! runs them in the constructor, or in `<clinit>` for namespace properties.

use log::debug;

use crate::ast::*;
use crate::common::error::{Error, Result};

use super::builder::ClassBuilder;
use super::callable::JvmMethodSignature;
use super::closure::MutableClosure;
use super::context::{CodegenContext, OwnerKind};
use super::defs::access::*;
use super::expression::ExpressionCodegen;
use super::function::{annotations, member_flags};
use super::insn::InstructionAdapter;
use super::jvm_type::JvmType;
use super::member_map::FieldEntry;
use super::state::GenerationState;
use super::type_mapper::MapTypeMode;

/// Source pieces of one property; constructor properties have none
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertySource<'d> {
    pub annotations: &'d [AnnotationEntry],
    pub getter: Option<&'d FunctionBody>,
    pub setter: Option<&'d SetterDecl>,
    pub location: Option<&'d SourceLocation>,
}

impl<'d> PropertySource<'d> {
    pub fn of(decl: &'d PropertyDecl) -> Self {
        Self {
            annotations: &decl.annotations,
            getter: decl.getter.as_ref(),
            setter: decl.setter.as_ref(),
            location: Some(&decl.location),
        }
    }
}

fn field_flags(property: &PropertyDescriptor, kind: &OwnerKind) -> u16 {
    let access = match kind {
        OwnerKind::Namespace | OwnerKind::StaticDelegate(_) => ACC_STATIC,
        _ => ACC_PRIVATE,
    };
    if property.mutable {
        access
    } else {
        access | ACC_FINAL
    }
}

/// Emits the backing field, getter and setter of a property into `builder`
pub fn generate_property(
    state: &mut GenerationState,
    builder: &mut ClassBuilder,
    context: &CodegenContext<'_>,
    mut closure: Option<&mut MutableClosure>,
    property_id: DescriptorId,
    source: PropertySource<'_>,
) -> Result<()> {
    let bindings = state.bindings();
    let property = bindings.property(property_id)?;
    let kind = context.owner_kind().clone();
    let owner = builder
        .class_name()
        .ok_or_else(|| Error::internal(format!("property {} generated before its class", property.name)))?
        .to_string();
    let ty = state.type_mapper.map_type(&property.ty, MapTypeMode::Value)?;
    let is_static = matches!(kind, OwnerKind::Namespace | OwnerKind::StaticDelegate(_));
    debug!("property {}.{}: {}", owner, property.name, ty);

    if property.has_backing_field {
        let field = builder.new_field(field_flags(property, &kind), &property.name, &ty.descriptor(), None, None)?;
        for annotation in annotations(source.annotations)? {
            field.annotations.push(annotation);
        }
        state.member_map.record_field(
            property_id,
            FieldEntry { owner: owner.clone(), name: property.name.clone(), ty: ty.clone(), is_static },
        )?;
    } else if source.getter.is_none() && property.modality != Modality::Abstract && kind != OwnerKind::TraitImpl {
        let location = source.location.cloned().unwrap_or_default();
        return Err(Error::unsupported(
            format!("property {} without backing field or getter", property.name),
            &location,
        ));
    }

    if property.uses_direct_field() {
        return Ok(());
    }

    let flags = member_flags(property.visibility, property.modality, &kind);
    let getter = state.type_mapper.map_getter_signature(property_id, &kind)?;
    let code = match source.getter {
        Some(body) => Some(custom_accessor(state, context, closure.as_deref_mut(), property_id, &getter, body, None)?),
        None if property.has_backing_field => Some(default_getter(&owner, property, &ty, is_static)),
        None => None,
    };
    emit_accessor(builder, flags, &kind, &getter, code)?;

    if property.mutable {
        let setter = state.type_mapper.map_setter_signature(property_id, &kind)?;
        let code = match source.setter {
            Some(decl) => Some(custom_accessor(
                state,
                context,
                closure.as_deref_mut(),
                property_id,
                &setter,
                &decl.body,
                Some(decl.parameter),
            )?),
            None if property.has_backing_field => Some(default_setter(&owner, property, &ty, is_static)),
            None => None,
        };
        emit_accessor(builder, flags, &kind, &setter, code)?;
    }
    Ok(())
}

/// Accessors without code are abstract, except on trait-impl holders where they are left out
fn emit_accessor(
    builder: &mut ClassBuilder,
    flags: u16,
    kind: &OwnerKind,
    signature: &JvmMethodSignature,
    code: Option<(InstructionAdapter, u16)>,
) -> Result<()> {
    if code.is_none() && *kind == OwnerKind::TraitImpl {
        return Ok(());
    }
    let flags = if code.is_none() { flags | ACC_ABSTRACT } else { flags };
    let method = builder.new_method(flags, &signature.name, &signature.descriptor(), None, Vec::new())?;
    if let Some((code, max_locals)) = code {
        method.visit_code(code, max_locals);
    }
    Ok(())
}

fn default_getter(owner: &str, property: &PropertyDescriptor, ty: &JvmType, is_static: bool) -> (InstructionAdapter, u16) {
    let mut v = InstructionAdapter::new();
    if is_static {
        v.getstatic(owner, &property.name, &ty.descriptor());
    } else {
        v.load(0, &JvmType::object(owner));
        v.getfield(owner, &property.name, &ty.descriptor());
    }
    v.areturn(ty);
    (v, if is_static { 0 } else { 1 })
}

fn default_setter(owner: &str, property: &PropertyDescriptor, ty: &JvmType, is_static: bool) -> (InstructionAdapter, u16) {
    let mut v = InstructionAdapter::new();
    if is_static {
        v.load(0, ty);
        v.putstatic(owner, &property.name, &ty.descriptor());
    } else {
        v.load(0, &JvmType::object(owner));
        v.load(1, ty);
        v.putfield(owner, &property.name, &ty.descriptor());
    }
    v.areturn(&JvmType::Void);
    let this = if is_static { 0 } else { 1 };
    (v, this + ty.size())
}

/// Accessor whose body was written in source
fn custom_accessor(
    state: &mut GenerationState,
    context: &CodegenContext<'_>,
    closure: Option<&mut MutableClosure>,
    property: DescriptorId,
    signature: &JvmMethodSignature,
    body: &FunctionBody,
    parameter: Option<DescriptorId>,
) -> Result<(InstructionAdapter, u16)> {
    let owner = context
        .physical_class_name()
        .ok_or_else(|| Error::internal("property accessor outside of any class"))?
        .to_string();
    let method_context = context.enter_method(property)?;
    let mut codegen = ExpressionCodegen::new(state, &method_context, closure, signature.return_type().clone());
    match (&signature.this_parameter, context.owner_kind()) {
        (Some(this), _) => {
            codegen.enter_this(this);
        }
        (None, OwnerKind::Implementation) => {
            codegen.enter_this(&JvmType::object(owner));
        }
        _ => {}
    }
    if let Some(parameter) = parameter {
        codegen.enter_parameter(parameter)?;
    }
    codegen.gen_function_body(body)?;
    Ok(codegen.finish())
}
