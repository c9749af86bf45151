//! Methods generated for functions
//!
//! A function lands in a physical class according to the owner kind of its
//! context: an instance method, a static namespace member, a static body on a
//! trait's `$$TImpl` holder, or a static forwarder on a namespace facade.
//! Functions with default parameter values also get a `$default` overload.

use log::debug;

use crate::ast::*;
use crate::common::error::{Error, Result};

use super::builder::{AnnotationModel, AnnotationValue, ClassBuilder, MethodModel};
use super::callable::JvmMethodSignature;
use super::closure::MutableClosure;
use super::context::{CodegenContext, OwnerKind};
use super::defs::access::*;
use super::defs::*;
use super::expression::ExpressionCodegen;
use super::insn::InstructionAdapter;
use super::jvm_type::JvmType;
use super::opcodes::*;
use super::state::GenerationState;

/// Access flags of a member with the given visibility and modality
pub fn member_flags(visibility: Visibility, modality: Modality, kind: &OwnerKind) -> u16 {
    match kind {
        // namespace members stay package-visible when private so nested classes reach them directly
        OwnerKind::Namespace | OwnerKind::StaticDelegate(_) => {
            let access = if visibility == Visibility::Private { 0 } else { ACC_PUBLIC };
            access | ACC_STATIC
        }
        OwnerKind::TraitImpl => ACC_PUBLIC | ACC_STATIC,
        OwnerKind::Implementation => {
            let access = match visibility {
                Visibility::Public | Visibility::Internal => ACC_PUBLIC,
                Visibility::Protected => ACC_PROTECTED,
                Visibility::Private => ACC_PRIVATE,
            };
            let modality = match modality {
                Modality::Final if visibility != Visibility::Private => ACC_FINAL,
                Modality::Abstract => ACC_ABSTRACT,
                _ => 0,
            };
            access | modality
        }
    }
}

/// Annotations without arguments become invisible class-file annotations
pub fn annotations(entries: &[AnnotationEntry]) -> Result<Vec<AnnotationModel>> {
    entries
        .iter()
        .map(|entry| {
            if !entry.arguments.is_empty() {
                return Err(Error::unsupported(
                    format!("annotation {} with arguments", entry.class),
                    &entry.location,
                ));
            }
            Ok(AnnotationModel::invisible(format!("L{};", entry.class)))
        })
        .collect()
}

/// `JetMethod` and `JetValueParameter` records for a generated function
pub fn signature_annotations(
    state: &GenerationState,
    method: &mut MethodModel,
    function: DescriptorId,
    signature: &JvmMethodSignature,
) -> Result<()> {
    if !state.config.emit_signature_annotations {
        return Ok(());
    }
    let bindings = state.bindings();
    let descriptor = bindings.function(function)?;
    let mut record = AnnotationModel::new(JET_METHOD_ANNOTATION);
    if !signature.kotlin_type_parameters.is_empty() {
        record = record.with("typeParameters", AnnotationValue::String(signature.kotlin_type_parameters.clone()));
    }
    if descriptor.kind != FunctionKind::Constructor {
        record = record.with("returnType", AnnotationValue::String(signature.kotlin_return_type.clone()));
    }
    method.visit_annotation(record);

    let mut index = signature.this_parameter.iter().count();
    if let Some(receiver) = &descriptor.receiver {
        method.visit_parameter_annotation(
            index,
            AnnotationModel::new(JET_VALUE_PARAMETER_ANNOTATION)
                .with("name", AnnotationValue::String("this$receiver".to_string()))
                .with("receiver", AnnotationValue::Bool(true))
                .with("type", AnnotationValue::String(state.type_mapper.type_string(receiver))),
        );
        index += 1;
    }
    for parameter in &descriptor.value_parameters {
        let parameter = bindings.value_parameter(*parameter)?;
        let mut record = AnnotationModel::new(JET_VALUE_PARAMETER_ANNOTATION)
            .with("name", AnnotationValue::String(parameter.name.clone()))
            .with("type", AnnotationValue::String(state.type_mapper.type_string(&parameter.ty)));
        if parameter.declares_default {
            record = record.with("hasDefaultValue", AnnotationValue::Bool(true));
        }
        if parameter.vararg_element.is_some() {
            record = record.with("vararg", AnnotationValue::Bool(true));
        }
        method.visit_parameter_annotation(index, record);
        index += 1;
    }
    Ok(())
}

fn is_vararg(bindings: &BindingContext, function: &FunctionDescriptor) -> Result<bool> {
    match function.value_parameters.last() {
        Some(last) => Ok(bindings.value_parameter(*last)?.vararg_element.is_some()),
        None => Ok(false),
    }
}

/// Whether the `$default` overload of a namespace function belongs in this class
fn owns_default_overload(state: &GenerationState, kind: &OwnerKind) -> bool {
    !(matches!(kind, OwnerKind::Namespace) && state.config.namespace_parts)
}

/// Generates a function declared in source: the method itself, or its
/// forwarder on a facade, plus the `$default` overload when it has defaults
pub fn generate_function(
    state: &mut GenerationState,
    builder: &mut ClassBuilder,
    context: &CodegenContext<'_>,
    closure: Option<&mut MutableClosure>,
    decl: &FunctionDecl,
) -> Result<()> {
    let bindings = state.bindings();
    let function = bindings.function(decl.descriptor)?;
    let kind = context.owner_kind().clone();
    let owner = builder
        .class_name()
        .ok_or_else(|| Error::internal(format!("function {} generated before its class", function.name)))?
        .to_string();
    let signature = state.type_mapper.map_signature(decl.descriptor, &kind)?;
    debug!("function {}.{}{} ({})", owner, signature.name, signature.descriptor(), kind);

    let has_defaults = decl.parameters.iter().any(|p| p.default_value.is_some());
    if has_defaults {
        check_default_mask(&decl.parameters, &decl.location)?;
    }

    let mut flags = member_flags(function.visibility, function.modality, &kind);
    if is_vararg(&bindings, function)? {
        flags |= ACC_VARARGS;
    }
    let annotations = annotations(&decl.annotations)?;

    let code = match (&kind, &decl.body) {
        (OwnerKind::StaticDelegate(part), _) => {
            let part_signature = state.type_mapper.map_signature(decl.descriptor, &OwnerKind::Namespace)?;
            Some(delegate_body(&signature, part, &part_signature, InvokeTarget::Static))
        }
        (_, Some(body)) => {
            let method_context = context.enter_method(decl.descriptor)?;
            let mut codegen = ExpressionCodegen::new(&mut *state, &method_context, closure, signature.return_type().clone());
            enter_implicit_parameters(&mut codegen, &kind, &owner, &signature);
            for parameter in &decl.parameters {
                codegen.enter_parameter(parameter.descriptor)?;
            }
            codegen.mark_line(&decl.location);
            codegen.gen_function_body(body)?;
            Some(codegen.finish())
        }
        (_, None) if function.modality == Modality::Abstract => None,
        (_, None) => {
            return Err(Error::internal(format!("non-abstract function {} has no body", function.name)));
        }
    };
    if code.is_none() {
        flags |= ACC_ABSTRACT;
    }

    match &kind {
        OwnerKind::StaticDelegate(part) => state.member_map.record_src_class(decl.descriptor, part.clone())?,
        OwnerKind::TraitImpl => {}
        _ => state.member_map.record_method(decl.descriptor, owner.clone(), signature.clone())?,
    }

    let method = builder.new_method(flags, &signature.name, &signature.descriptor(), signature.generic_signature.clone(), Vec::new())?;
    for annotation in annotations {
        method.visit_annotation(annotation);
    }
    signature_annotations(state, method, decl.descriptor, &signature)?;
    if let Some((code, max_locals)) = code {
        method.visit_code(code, max_locals);
    }

    if has_defaults && owns_default_overload(state, &kind) {
        generate_default_method(state, builder, context, decl)?;
    }
    Ok(())
}

/// Slot 0 and the extension receiver, in argument order
fn enter_implicit_parameters(codegen: &mut ExpressionCodegen<'_>, kind: &OwnerKind, owner: &str, signature: &JvmMethodSignature) {
    match &signature.this_parameter {
        Some(this) => {
            codegen.enter_this(this);
        }
        None if *kind == OwnerKind::Implementation => {
            codegen.enter_this(&JvmType::object(owner));
        }
        None => {}
    }
    if let Some(receiver) = &signature.receiver_parameter {
        codegen.enter_receiver(receiver);
    }
}

/// The `$default` mask is one int: a bit per value parameter
pub fn check_default_mask(parameters: &[ParameterDecl], location: &SourceLocation) -> Result<()> {
    if parameters.len() > 32 {
        return Err(Error::unsupported(
            format!("default values with {} parameters, at most 32 fit the mask", parameters.len()),
            location,
        ));
    }
    Ok(())
}

/// Evaluates the default value of every parameter whose mask bit is set
pub fn gen_default_values(codegen: &mut ExpressionCodegen<'_>, parameters: &[ParameterDecl], mask: u16) -> Result<()> {
    for (index, parameter) in parameters.iter().enumerate() {
        let Some(default) = &parameter.default_value else {
            continue;
        };
        let skip = codegen.v.new_label();
        codegen.v.load(mask, &JvmType::Int);
        codegen.v.iconst(1 << index);
        codegen.v.op(IAND);
        codegen.v.ifeq(skip);
        let value = codegen.gen(default)?;
        let slot = codegen
            .frame
            .index_of(parameter.descriptor)
            .ok_or_else(|| Error::internal(format!("parameter {} has no slot", parameter.descriptor)))?;
        let ty = codegen.variable_type(parameter.descriptor)?;
        value.put(&ty, &mut codegen.v)?;
        codegen.v.store(slot, &ty);
        codegen.v.mark(skip);
    }
    Ok(())
}

/// `name$default(receiver?, params..., mask)`: fills in defaults and calls the original
fn generate_default_method(
    state: &mut GenerationState,
    builder: &mut ClassBuilder,
    context: &CodegenContext<'_>,
    decl: &FunctionDecl,
) -> Result<()> {
    let bindings = state.bindings();
    let function = bindings.function(decl.descriptor)?;
    let kind = context.owner_kind().clone();
    let owner = builder
        .class_name()
        .ok_or_else(|| Error::internal("default overload generated before its class"))?
        .to_string();
    let callable = state.type_mapper.map_to_callable_method(decl.descriptor, false)?;
    let method_type = callable.default_method_type();
    let signature = state.type_mapper.map_signature(decl.descriptor, &kind)?;
    let name = callable.default_method_name();

    let method_context = context.enter_method(decl.descriptor)?;
    let mut codegen = ExpressionCodegen::new(&mut *state, &method_context, None, signature.return_type().clone());
    let this = match (&kind, &signature.this_parameter) {
        (_, Some(this)) => Some(this.clone()),
        (OwnerKind::Implementation, None) => Some(JvmType::object(owner.clone())),
        _ => None,
    };
    if let Some(this) = &this {
        codegen.enter_this(this);
    }
    if let Some(receiver) = &signature.receiver_parameter {
        codegen.enter_receiver(receiver);
    }
    for parameter in &decl.parameters {
        codegen.enter_parameter(parameter.descriptor)?;
    }
    let mask = codegen.frame.enter_temp(&JvmType::Int);
    codegen.mark_line(&decl.location);
    gen_default_values(&mut codegen, &decl.parameters, mask)?;

    let mut slot = 0;
    for argument in &method_type.arguments[..method_type.arguments.len() - 1] {
        codegen.v.load(slot, argument);
        slot += argument.size();
    }
    let descriptor = signature.descriptor();
    match &kind {
        OwnerKind::Implementation if function.visibility == Visibility::Private => {
            codegen.v.invokespecial(&owner, &signature.name, &descriptor)
        }
        OwnerKind::Implementation => codegen.v.invokevirtual(&owner, &signature.name, &descriptor),
        _ => codegen.v.invokestatic(&owner, &signature.name, &descriptor),
    }
    codegen.v.areturn(signature.return_type());
    let (code, max_locals) = codegen.finish();

    let access = if function.visibility == Visibility::Private { 0 } else { ACC_PUBLIC };
    builder
        .new_method(access | ACC_STATIC | ACC_SYNTHETIC, &name, &method_type.descriptor(), None, Vec::new())?
        .visit_code(code, max_locals);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeTarget {
    Static,
    /// Instance method: `this` is loaded first and passed along
    Instance,
}

/// Loads every argument of `signature` and calls `target_owner.target`, returning its result
pub fn delegate_body(
    signature: &JvmMethodSignature,
    target_owner: &str,
    target: &JvmMethodSignature,
    kind: InvokeTarget,
) -> (InstructionAdapter, u16) {
    let mut v = InstructionAdapter::new();
    let mut slot = 0;
    if kind == InvokeTarget::Instance {
        v.load(0, &JvmType::java_object());
        slot = 1;
    }
    for argument in &signature.method_type.arguments {
        v.load(slot, argument);
        slot += argument.size();
    }
    v.invokestatic(target_owner, &target.name, &target.descriptor());
    v.areturn(signature.return_type());
    (v, slot)
}

/// Implementation of a trait function a class inherits without overriding:
/// calls the static body on the trait's `$$TImpl` class with `this` first
pub fn generate_trait_forwarder(state: &mut GenerationState, builder: &mut ClassBuilder, function: DescriptorId) -> Result<()> {
    let owner = state.type_mapper.owner(function, &OwnerKind::TraitImpl)?;
    let signature = state.type_mapper.map_signature(function, &OwnerKind::Implementation)?;
    let target = state.type_mapper.map_signature(function, &OwnerKind::TraitImpl)?;
    debug!("trait forwarder {} -> {}.{}", signature.name, owner, target.name);
    let (code, max_locals) = delegate_body(&signature, &owner, &target, InvokeTarget::Instance);
    let method = builder.new_method(ACC_PUBLIC, &signature.name, &signature.descriptor(), signature.generic_signature.clone(), Vec::new())?;
    signature_annotations(state, method, function, &signature)?;
    method.visit_code(code, max_locals);
    Ok(())
}
