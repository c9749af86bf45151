//! Class generation
//!
//! A class is generated in fixed phases: header, synthetic members, source
//! members in declaration order, the primary constructor together with its
//! property parameters, the static initializer, and finally the members that
//! only become known while the rest was generated (captures and accessors).
//!
//! A trait produces two classes: the interface and, when some member has a
//! body, a final `$$TImpl` holder of static bodies.

use std::collections::HashSet;
use std::rc::Rc;

use log::debug;

use crate::ast::*;
use crate::common::error::{Error, Result};

use super::accessor;
use super::builder::ClassBuilder;
use super::closure::MutableClosure;
use super::closure_codegen::{capture_fields, capture_prologue, capture_slots};
use super::context::{CodegenContext, OwnerKind};
use super::defs::access::*;
use super::defs::*;
use super::expression::ExpressionCodegen;
use super::function::{self, annotations, check_default_mask, delegate_body, gen_default_values, signature_annotations, InvokeTarget};
use super::insn::InstructionAdapter;
use super::jvm_type::{JvmType, MethodType};
use super::property::{self, PropertySource};
use super::state::GenerationState;
use super::type_mapper::MapTypeMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Declare,
    Synthetic,
    Body,
    PrimaryConstructorProperties,
    StaticInit,
    Done,
}

impl Phase {
    fn next(self) -> Phase {
        match self {
            Phase::Declare => Phase::Synthetic,
            Phase::Synthetic => Phase::Body,
            Phase::Body => Phase::PrimaryConstructorProperties,
            Phase::PrimaryConstructorProperties => Phase::StaticInit,
            Phase::StaticInit | Phase::Done => Phase::Done,
        }
    }
}

/// Fragment of `<clinit>`, emitted in accumulation order
#[derive(Debug, Clone, PartialEq, Eq)]
enum StaticInit {
    /// `$instance = new C()`
    Instance,
}

/// Generates `decl` and everything nested in it.
///
/// `closure` is set for object literals: their constructor then takes the
/// captured values and its descriptor comes from the capture table.
pub fn generate_class(
    state: &mut GenerationState,
    parent: &CodegenContext<'_>,
    decl: &ClassDecl,
    closure: Option<&mut MutableClosure>,
) -> Result<()> {
    let bindings = state.bindings();
    let class = bindings.class(decl.descriptor)?;
    let class_name = state.type_mapper.class_internal_name(decl.descriptor)?;
    debug!("generating class {}", class_name);
    if class.is_trait() {
        return generate_trait(state, parent, decl, &class_name);
    }
    let context = parent.enter_class(decl.descriptor, class_name.clone(), OwnerKind::Implementation);
    let builder = state.new_builder();
    let mut codegen = ClassBodyCodegen {
        state,
        context: &context,
        decl,
        class: class.clone(),
        class_name,
        super_name: OBJECT_CLASS.to_string(),
        builder,
        closure,
        phase: Phase::Declare,
        property_initializers: Vec::new(),
        static_init: Vec::new(),
    };
    codegen.generate()
}

struct ClassBodyCodegen<'a, 'd> {
    state: &'a mut GenerationState,
    context: &'a CodegenContext<'a>,
    decl: &'d ClassDecl,
    class: ClassDescriptor,
    class_name: String,
    super_name: String,
    builder: ClassBuilder,
    closure: Option<&'a mut MutableClosure>,
    phase: Phase,
    property_initializers: Vec<&'d PropertyDecl>,
    static_init: Vec<StaticInit>,
}

impl<'a, 'd> ClassBodyCodegen<'a, 'd> {
    fn generate(&mut self) -> Result<()> {
        loop {
            match self.phase {
                Phase::Declare => self.declare()?,
                Phase::Synthetic => self.synthetic()?,
                Phase::Body => self.body()?,
                Phase::PrimaryConstructorProperties => self.primary_constructor()?,
                Phase::StaticInit => self.static_initializer()?,
                Phase::Done => return self.done(),
            }
            self.phase = self.phase.next();
        }
    }

    fn wrap(&self, declaration: &str) -> impl FnOnce(Error) -> Error + '_ {
        let declaration = declaration.to_string();
        move |error| error.in_declaration(self.class_name.clone(), declaration, self.context.owner_kind())
    }

    fn declare(&mut self) -> Result<()> {
        let class = &self.class;
        let mut access = if class.visibility == Visibility::Private { 0 } else { ACC_PUBLIC };
        access |= ACC_SUPER;
        access |= match (class.kind, class.modality) {
            (ClassKind::Object | ClassKind::AnonymousObject, _) | (_, Modality::Final) => ACC_FINAL,
            (_, Modality::Abstract) => ACC_ABSTRACT,
            _ => 0,
        };
        if let Some(superclass) = &class.superclass {
            self.super_name = self.state.type_mapper.map_type(superclass, MapTypeMode::Impl)?.internal_name();
        }
        let interfaces = class
            .traits
            .iter()
            .map(|t| Ok(self.state.type_mapper.map_type(t, MapTypeMode::Impl)?.internal_name()))
            .collect::<Result<Vec<String>>>()?;
        let signature = self.state.type_mapper.class_signature(self.decl.descriptor, &self.super_name, &interfaces)?;
        self.builder.define_class(
            self.state.config.class_version,
            access,
            &self.class_name,
            signature,
            &self.super_name,
            interfaces,
        )?;
        if let Some(file) = &self.state.current_file {
            self.builder.visit_source(file)?;
        }
        for annotation in annotations(&self.decl.annotations)? {
            self.builder.new_annotation(annotation)?;
        }
        Ok(())
    }

    fn synthetic(&mut self) -> Result<()> {
        if self.class.is_object() {
            let ty = JvmType::object(self.class_name.clone());
            self.builder
                .new_field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, INSTANCE_FIELD, &ty.descriptor(), None, None)?;
            self.static_init.push(StaticInit::Instance);
        }
        if self.class.modality != Modality::Abstract {
            self.trait_forwarders()?;
        }
        Ok(())
    }

    /// Forwarders for trait bodies this class inherits without overriding
    fn trait_forwarders(&mut self) -> Result<()> {
        let bindings = self.state.bindings();
        let mut declared = HashSet::new();
        for member in &self.class.members {
            match bindings.get(*member)? {
                Descriptor::Function(_) => {
                    let signature = self.state.type_mapper.map_signature(*member, &OwnerKind::Implementation)?;
                    declared.insert((signature.name.clone(), signature.descriptor()));
                }
                Descriptor::Property(p) => {
                    declared.insert((p.name.clone(), String::new()));
                }
                _ => {}
            }
        }
        if let Some(constructor) = self.class.primary_constructor {
            for parameter in &bindings.function(constructor)?.value_parameters {
                let parameter = bindings.value_parameter(*parameter)?;
                if parameter.property.is_some() {
                    declared.insert((parameter.name.clone(), String::new()));
                }
            }
        }

        let mut traits = Vec::new();
        collect_traits(&bindings, &self.class.traits, &mut traits)?;
        for trait_id in traits {
            for member in &bindings.class(trait_id)?.members {
                match bindings.get(*member)? {
                    Descriptor::Function(f) if f.modality != Modality::Abstract => {
                        let signature = self.state.type_mapper.map_signature(*member, &OwnerKind::Implementation)?;
                        if declared.insert((signature.name.clone(), signature.descriptor())) {
                            function::generate_trait_forwarder(self.state, &mut self.builder, *member)
                                .map_err(self.wrap(&f.name))?;
                        }
                    }
                    Descriptor::Property(p) if p.custom_accessors => {
                        if declared.insert((p.name.clone(), String::new())) {
                            self.property_forwarders(*member, p).map_err(self.wrap(&p.name))?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn property_forwarders(&mut self, property: DescriptorId, descriptor: &PropertyDescriptor) -> Result<()> {
        let mapper = &self.state.type_mapper;
        let owner = mapper.owner(property, &OwnerKind::TraitImpl)?;
        let mut pairs = vec![(
            mapper.map_getter_signature(property, &OwnerKind::Implementation)?,
            mapper.map_getter_signature(property, &OwnerKind::TraitImpl)?,
        )];
        if descriptor.mutable {
            pairs.push((
                mapper.map_setter_signature(property, &OwnerKind::Implementation)?,
                mapper.map_setter_signature(property, &OwnerKind::TraitImpl)?,
            ));
        }
        for (signature, target) in pairs {
            let (code, max_locals) = delegate_body(&signature, &owner, &target, InvokeTarget::Instance);
            self.builder
                .new_method(ACC_PUBLIC, &signature.name, &signature.descriptor(), None, Vec::new())?
                .visit_code(code, max_locals);
        }
        Ok(())
    }

    fn body(&mut self) -> Result<()> {
        let decl = self.decl;
        for declaration in &decl.declarations {
            let name = self.state.bindings().get(declaration.descriptor())?.name().to_string();
            let result = match declaration {
                Declaration::Function(f) => function::generate_function(
                    self.state,
                    &mut self.builder,
                    self.context,
                    self.closure.as_deref_mut(),
                    f,
                ),
                Declaration::Property(p) => {
                    if p.initializer.is_some() {
                        self.property_initializers.push(p);
                    }
                    property::generate_property(
                        self.state,
                        &mut self.builder,
                        self.context,
                        self.closure.as_deref_mut(),
                        p.descriptor,
                        PropertySource::of(p),
                    )
                }
                Declaration::Class(c) => generate_class(self.state, self.context, c, None),
            };
            result.map_err(self.wrap(&name))?;
        }
        Ok(())
    }

    fn primary_constructor(&mut self) -> Result<()> {
        let decl = self.decl;
        let parameters: &[ParameterDecl] = decl.primary_constructor.as_ref().map_or(&[][..], |c| c.parameters.as_slice());
        let bindings = self.state.bindings();
        for parameter in parameters {
            if let Some(property) = bindings.value_parameter(parameter.descriptor)?.property {
                property::generate_property(
                    self.state,
                    &mut self.builder,
                    self.context,
                    None,
                    property,
                    PropertySource::default(),
                )
                .map_err(self.wrap(bindings.get(property)?.name()))?;
            }
        }
        let has_defaults = parameters.iter().any(|p| p.default_value.is_some());
        if has_defaults {
            check_default_mask(parameters, &decl.location).map_err(self.wrap(CONSTRUCTOR_METHOD_NAME))?;
        }
        self.constructor(parameters, &bindings).map_err(self.wrap(CONSTRUCTOR_METHOD_NAME))?;
        if has_defaults {
            self.default_constructor(parameters).map_err(self.wrap(CONSTRUCTOR_METHOD_NAME))?;
        }
        Ok(())
    }

    fn constructor_id(&self) -> DescriptorId {
        self.decl.primary_constructor.as_ref().map_or(self.decl.descriptor, |c| c.descriptor)
    }

    /// Super call, property parameters, property initializers, then init blocks
    fn constructor(&mut self, parameters: &[ParameterDecl], bindings: &Rc<BindingContext>) -> Result<()> {
        if self.closure.is_some() && !parameters.is_empty() {
            return Err(Error::internal(format!("object literal {} declares constructor parameters", self.class_name)));
        }
        let decl = self.decl;
        let this_type = JvmType::object(self.class_name.clone());
        let constructor = self.constructor_id();
        let method_context = self.context.enter_method(constructor)?;

        let (mut code, mut max_locals) = {
            let mut codegen =
                ExpressionCodegen::new(&mut *self.state, &method_context, self.closure.as_deref_mut(), JvmType::Void);
            codegen.enter_this(&this_type);
            for parameter in parameters {
                codegen.enter_parameter(parameter.descriptor)?;
            }
            codegen.mark_line(&decl.location);
            codegen.gen_super_constructor_call(&this_type, decl.super_call.as_ref(), &self.super_name)?;

            for parameter in parameters {
                let Some(property) = bindings.value_parameter(parameter.descriptor)?.property else {
                    continue;
                };
                let Some(field) = codegen.state.member_map.field(property).cloned() else {
                    continue;
                };
                let slot = codegen
                    .frame
                    .index_of(parameter.descriptor)
                    .ok_or_else(|| Error::internal(format!("constructor parameter {} has no slot", parameter.descriptor)))?;
                let ty = codegen.variable_type(parameter.descriptor)?;
                codegen.v.load(0, &this_type);
                codegen.v.load(slot, &ty);
                codegen.v.putfield(&field.owner, &field.name, &field.ty.descriptor());
            }
            for property in &self.property_initializers {
                let Some(initializer) = &property.initializer else {
                    continue;
                };
                let field = codegen.state.member_map.field(property.descriptor).cloned().ok_or_else(|| {
                    Error::unsupported("initializer of a property without backing field", &property.location)
                })?;
                codegen.gen_field_initializer(&field.owner, &field.name, &field.ty, false, initializer)?;
            }
            for block in &decl.initializers {
                codegen.gen_scope(block)?;
            }
            codegen.v.areturn(&JvmType::Void);
            codegen.finish()
        };

        let has_primary = decl.primary_constructor.is_some();
        let signature = if has_primary {
            Some(self.state.type_mapper.map_signature(constructor, &OwnerKind::Implementation)?)
        } else {
            None
        };
        let descriptor = match (&self.closure, &signature) {
            (Some(closure), _) => {
                let (prologue, _) = capture_prologue(&self.class_name, closure).into_parts();
                code.insert_front(prologue);
                max_locals = max_locals.max(capture_slots(closure));
                closure.constructor_descriptor()
            }
            (None, Some(signature)) => signature.descriptor(),
            (None, None) => MethodType::new(Vec::new(), JvmType::Void).descriptor(),
        };

        let private = has_primary && bindings.function(constructor)?.visibility == Visibility::Private;
        let access = if self.class.is_object() || private { ACC_PRIVATE } else { ACC_PUBLIC };
        debug!("constructor {}{}", self.class_name, descriptor);
        let method = self.builder.new_method(access, CONSTRUCTOR_METHOD_NAME, &descriptor, None, Vec::new())?;
        if let Some(signature) = &signature {
            signature_annotations(self.state, method, constructor, signature)?;
        }
        method.visit_code(code, max_locals);
        if let Some(signature) = signature {
            self.state.member_map.record_method(constructor, self.class_name.clone(), signature)?;
        }
        Ok(())
    }

    /// `<init>(params..., int mask)`: fills in defaults, then delegates to the real constructor
    fn default_constructor(&mut self, parameters: &[ParameterDecl]) -> Result<()> {
        let constructor = self.constructor_id();
        let callable = self.state.type_mapper.map_to_callable_method(constructor, false)?;
        let method_type = callable.default_method_type();
        let original = callable.signature.descriptor();
        let this_type = JvmType::object(self.class_name.clone());
        let method_context = self.context.enter_method(constructor)?;

        let mut codegen = ExpressionCodegen::new(&mut *self.state, &method_context, None, JvmType::Void);
        codegen.enter_this(&this_type);
        for parameter in parameters {
            codegen.enter_parameter(parameter.descriptor)?;
        }
        let mask = codegen.frame.enter_temp(&JvmType::Int);
        gen_default_values(&mut codegen, parameters, mask)?;
        codegen.v.load(0, &this_type);
        let mut slot = 1;
        for argument in &callable.signature.method_type.arguments {
            codegen.v.load(slot, argument);
            slot += argument.size();
        }
        codegen.v.invokespecial(&self.class_name, CONSTRUCTOR_METHOD_NAME, &original);
        codegen.v.areturn(&JvmType::Void);
        let (code, max_locals) = codegen.finish();

        self.builder
            .new_method(ACC_PUBLIC | ACC_SYNTHETIC, CONSTRUCTOR_METHOD_NAME, &method_type.descriptor(), None, Vec::new())?
            .visit_code(code, max_locals);
        Ok(())
    }

    fn static_initializer(&mut self) -> Result<()> {
        if self.static_init.is_empty() {
            return Ok(());
        }
        let ty = JvmType::object(self.class_name.clone());
        let mut v = InstructionAdapter::new();
        for item in &self.static_init {
            match item {
                StaticInit::Instance => {
                    v.anew(&self.class_name);
                    v.dup_value(&ty);
                    v.invokespecial(&self.class_name, CONSTRUCTOR_METHOD_NAME, "()V");
                    v.putstatic(&self.class_name, INSTANCE_FIELD, &ty.descriptor());
                }
            }
        }
        v.areturn(&JvmType::Void);
        self.builder
            .new_method(ACC_STATIC, STATIC_INITIALIZER_METHOD_NAME, "()V", None, Vec::new())?
            .visit_code(v, 0);
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        if let Some(closure) = &self.closure {
            capture_fields(&mut self.builder, closure)?;
        }
        accessor::generate_accessors(self.state, &mut self.builder, &self.class_name)?;
        self.state.factory.finish(&mut self.builder)?;
        debug!("finished class {}", self.class_name);
        Ok(())
    }
}

/// Every trait reachable from `supertypes`, each once, nearest first
fn collect_traits(bindings: &BindingContext, supertypes: &[SemanticType], out: &mut Vec<DescriptorId>) -> Result<()> {
    for supertype in supertypes {
        if let SemanticType::Class { class, .. } = supertype {
            let descriptor = bindings.class(*class)?;
            if descriptor.is_trait() && !out.contains(class) {
                out.push(*class);
                collect_traits(bindings, &descriptor.traits, out)?;
            }
        }
    }
    Ok(())
}

fn generate_trait(state: &mut GenerationState, parent: &CodegenContext<'_>, decl: &ClassDecl, class_name: &str) -> Result<()> {
    let bindings = state.bindings();
    let class = bindings.class(decl.descriptor)?;
    let wrap = |name: &str| {
        let name = name.to_string();
        move |error: Error| error.in_declaration(class_name, name, OwnerKind::Implementation)
    };

    let interfaces = class
        .traits
        .iter()
        .map(|t| Ok(state.type_mapper.map_type(t, MapTypeMode::Impl)?.internal_name()))
        .collect::<Result<Vec<String>>>()?;
    let signature = state.type_mapper.class_signature(decl.descriptor, OBJECT_CLASS, &interfaces)?;
    let mut builder = state.new_builder();
    builder.define_class(
        state.config.class_version,
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        class_name,
        signature,
        OBJECT_CLASS,
        interfaces,
    )?;
    if let Some(file) = &state.current_file {
        builder.visit_source(file)?;
    }
    for annotation in annotations(&decl.annotations)? {
        builder.new_annotation(annotation)?;
    }

    let context = parent.enter_class(decl.descriptor, class_name, OwnerKind::Implementation);
    let mut has_bodies = false;
    for declaration in &decl.declarations {
        match declaration {
            Declaration::Function(f) => {
                has_bodies |= f.body.is_some();
                let name = bindings.function(f.descriptor)?.name.clone();
                abstract_function(state, &mut builder, class_name, f).map_err(wrap(&name))?;
            }
            Declaration::Property(p) => {
                let property = bindings.property(p.descriptor)?;
                has_bodies |= p.getter.is_some() || p.setter.is_some();
                abstract_accessors(state, &mut builder, p.descriptor, property.mutable).map_err(wrap(&property.name))?;
            }
            Declaration::Class(c) => {
                let name = bindings.class(c.descriptor)?.name.clone();
                generate_class(state, &context, c, None).map_err(wrap(&name))?;
            }
        }
    }
    state.factory.finish(&mut builder)?;

    if has_bodies {
        generate_trait_impl(state, parent, decl, class_name)?;
    }
    Ok(())
}

fn abstract_function(state: &mut GenerationState, builder: &mut ClassBuilder, owner: &str, decl: &FunctionDecl) -> Result<()> {
    let signature = state.type_mapper.map_signature(decl.descriptor, &OwnerKind::Implementation)?;
    let method = builder.new_method(
        ACC_PUBLIC | ACC_ABSTRACT,
        &signature.name,
        &signature.descriptor(),
        signature.generic_signature.clone(),
        Vec::new(),
    )?;
    for annotation in annotations(&decl.annotations)? {
        method.visit_annotation(annotation);
    }
    signature_annotations(state, method, decl.descriptor, &signature)?;
    state.member_map.record_method(decl.descriptor, owner, signature)
}

fn abstract_accessors(state: &mut GenerationState, builder: &mut ClassBuilder, property: DescriptorId, mutable: bool) -> Result<()> {
    let mut signatures = vec![state.type_mapper.map_getter_signature(property, &OwnerKind::Implementation)?];
    if mutable {
        signatures.push(state.type_mapper.map_setter_signature(property, &OwnerKind::Implementation)?);
    }
    for signature in signatures {
        builder.new_method(ACC_PUBLIC | ACC_ABSTRACT, &signature.name, &signature.descriptor(), None, Vec::new())?;
    }
    Ok(())
}

/// `Trait$$TImpl`: static bodies taking the trait instance first
fn generate_trait_impl(state: &mut GenerationState, parent: &CodegenContext<'_>, decl: &ClassDecl, class_name: &str) -> Result<()> {
    let bindings = state.bindings();
    let impl_name = format!("{}{}", class_name, TRAIT_IMPL_SUFFIX);
    debug!("generating trait bodies {}", impl_name);
    let mut builder = state.new_builder();
    builder.define_class(
        state.config.class_version,
        ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
        &impl_name,
        None,
        OBJECT_CLASS,
        Vec::new(),
    )?;
    if let Some(file) = &state.current_file {
        builder.visit_source(file)?;
    }

    let context = parent.enter_class(decl.descriptor, impl_name.clone(), OwnerKind::TraitImpl);
    for declaration in &decl.declarations {
        let name = bindings.get(declaration.descriptor())?.name().to_string();
        let result = match declaration {
            Declaration::Function(f) if f.body.is_some() => function::generate_function(state, &mut builder, &context, None, f),
            Declaration::Property(p) if p.getter.is_some() || p.setter.is_some() => {
                property::generate_property(state, &mut builder, &context, None, p.descriptor, PropertySource::of(p))
            }
            _ => Ok(()),
        };
        result.map_err(|error| error.in_declaration(impl_name.clone(), name, OwnerKind::TraitImpl))?;
    }
    accessor::generate_accessors(state, &mut builder, &impl_name)?;
    state.factory.finish(&mut builder)
}
