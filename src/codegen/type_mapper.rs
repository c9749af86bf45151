//! Descriptor/type bridge: semantic types and declarations to JVM shapes

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::common::config::BuiltinsMapping;
use crate::common::error::{Error, Result};

use super::callable::{CallableMethod, InvokeKind, JvmMethodSignature};
use super::context::OwnerKind;
use super::defs::*;
use super::jvm_type::{JvmType, MethodType};
use super::signature::{self, SignatureWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapTypeMode {
    /// Value positions: primitives stay primitive unless nullable
    Value,
    /// Type arguments: always boxed
    TypeParameter,
    /// The implementation class of a declaration
    Impl,
    /// The trait-impl holder of a trait
    TraitImpl,
}

pub struct TypeMapper {
    bindings: Rc<BindingContext>,
    mapping: BuiltinsMapping,
    cache: RefCell<HashMap<(SemanticType, MapTypeMode), JvmType>>,
    anonymous_names: RefCell<HashMap<DescriptorId, String>>,
}

impl TypeMapper {
    pub fn new(bindings: Rc<BindingContext>, mapping: BuiltinsMapping) -> Self {
        Self {
            bindings,
            mapping,
            cache: RefCell::new(HashMap::new()),
            anonymous_names: RefCell::new(HashMap::new()),
        }
    }

    pub fn bindings(&self) -> &BindingContext {
        &self.bindings
    }

    pub fn builtins_mapping(&self) -> BuiltinsMapping {
        self.mapping
    }

    /// Names an object literal's class before its body is generated
    pub fn record_anonymous_class(&self, class: DescriptorId, internal_name: impl Into<String>) {
        self.anonymous_names.borrow_mut().insert(class, internal_name.into());
    }

    pub fn map_type(&self, ty: &SemanticType, mode: MapTypeMode) -> Result<JvmType> {
        let key = (ty.clone(), mode);
        if let Some(known) = self.cache.borrow().get(&key) {
            return Ok(known.clone());
        }
        let mapped = self.map_type_uncached(ty, mode)?;
        self.check_valid_type(&mapped)?;
        self.cache.borrow_mut().insert(key, mapped.clone());
        Ok(mapped)
    }

    /// `Unit` returns become `void`
    pub fn map_return_type(&self, ty: &SemanticType) -> Result<JvmType> {
        match ty {
            SemanticType::Unit => Ok(JvmType::Void),
            other => self.map_type(other, MapTypeMode::Value),
        }
    }

    fn map_type_uncached(&self, ty: &SemanticType, mode: MapTypeMode) -> Result<JvmType> {
        let builtins = self.mapping == BuiltinsMapping::Enabled;
        let boxed = |t: JvmType| if mode == MapTypeMode::TypeParameter { t.boxed() } else { t };
        let ty = match ty {
            SemanticType::Unit => JvmType::object("jet/Tuple0"),
            SemanticType::Nothing => JvmType::object("jet/Nothing"),
            SemanticType::Primitive { kind, nullable } => {
                if !builtins {
                    return Ok(JvmType::object(format!("jet/{}", kind.name())));
                }
                let primitive = primitive_type(*kind);
                if *nullable {
                    primitive.boxed()
                } else {
                    boxed(primitive)
                }
            }
            SemanticType::Any { .. } => JvmType::java_object(),
            SemanticType::String { .. } => {
                if builtins {
                    JvmType::object(STRING_CLASS)
                } else {
                    JvmType::object("jet/String")
                }
            }
            SemanticType::Class { class, .. } => {
                let name = self.class_internal_name(*class)?;
                if mode == MapTypeMode::TraitImpl {
                    JvmType::object(format!("{}{}", name, TRAIT_IMPL_SUFFIX))
                } else {
                    JvmType::object(name)
                }
            }
            SemanticType::Array { element, .. } => {
                if !builtins {
                    return Ok(JvmType::object("jet/Array"));
                }
                match element.as_ref() {
                    SemanticType::TypeParameter { .. } => JvmType::array_of(JvmType::java_object()),
                    other => JvmType::array_of(self.map_type(other, MapTypeMode::Value)?.boxed()),
                }
            }
            SemanticType::PrimitiveArray { kind, .. } => {
                if builtins {
                    JvmType::array_of(primitive_type(*kind))
                } else {
                    JvmType::object(format!("jet/{}Array", kind.name()))
                }
            }
            SemanticType::TypeParameter { upper_bound, .. } => {
                self.map_type(upper_bound, MapTypeMode::TypeParameter)?
            }
            SemanticType::Function { parameters, .. } => {
                JvmType::object(format!("{}{}", FUNCTION_CLASS_PREFIX, parameters.len()))
            }
        };
        Ok(ty)
    }

    /// Standard library compilation must stay clear of `java.*`
    fn check_valid_type(&self, ty: &JvmType) -> Result<()> {
        if self.mapping == BuiltinsMapping::Disabled {
            let descriptor = ty.descriptor();
            if descriptor != "Ljava/lang/Object;" && descriptor.trim_start_matches('[').starts_with("Ljava/") {
                return Err(Error::internal(format!("builtins must not reference java.* classes: {}", descriptor)));
            }
        }
        Ok(())
    }

    /// Internal name of a class: `pkg/Outer$Inner`
    pub fn class_internal_name(&self, class: DescriptorId) -> Result<String> {
        let descriptor = self.bindings.class(class)?;
        if descriptor.kind == ClassKind::AnonymousObject {
            return self
                .anonymous_names
                .borrow()
                .get(&class)
                .cloned()
                .ok_or_else(|| Error::internal(format!("no name recorded for anonymous class {}", class)));
        }
        match self.bindings.get(descriptor.container)? {
            Descriptor::Namespace(ns) => Ok(qualified(&ns.fq_name, &descriptor.name)),
            Descriptor::Class(_) => Ok(format!("{}${}", self.class_internal_name(descriptor.container)?, descriptor.name)),
            other => Err(Error::internal(format!(
                "class {} declared inside a {} is not supported by the type mapper",
                descriptor.name,
                other.kind_name()
            ))),
        }
    }

    /// Facade class holding the top-level declarations of a namespace
    pub fn namespace_class_name(&self, namespace: &NamespaceDescriptor) -> String {
        qualified(&namespace.fq_name, NAMESPACE_CLASS_NAME)
    }

    /// Per-file part class: `pkg/namespace$src$File`
    pub fn namespace_part_name(&self, namespace: &NamespaceDescriptor, file_name: &str) -> String {
        let stem = file_name
            .rsplit('/')
            .next()
            .unwrap_or(file_name)
            .trim_end_matches(".jet")
            .trim_end_matches(".kt");
        let sanitized: String = stem.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect();
        format!("{}{}{}", self.namespace_class_name(namespace), NAMESPACE_PART_INFIX, sanitized)
    }

    /// Dotted name used in signature records
    pub fn fq_name(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::Class { class, .. } => self
                .class_internal_name(*class)
                .map(|name| name.replace('/', "."))
                .unwrap_or_else(|_| format!("{}", class)),
            other => other.to_string(),
        }
    }

    pub fn type_string(&self, ty: &SemanticType) -> String {
        signature::type_string(ty, &|t| self.fq_name(t))
    }

    /// Class that physically holds a member for the given owner kind
    pub fn owner(&self, member: DescriptorId, kind: &OwnerKind) -> Result<String> {
        let container = self
            .bindings
            .container(member)?
            .ok_or_else(|| Error::internal(format!("{} has no container", member)))?;
        match self.bindings.get(container)? {
            Descriptor::Namespace(ns) => Ok(self.namespace_class_name(ns)),
            Descriptor::Class(_) => {
                let name = self.class_internal_name(container)?;
                if *kind == OwnerKind::TraitImpl {
                    Ok(format!("{}{}", name, TRAIT_IMPL_SUFFIX))
                } else {
                    Ok(name)
                }
            }
            other => Err(Error::internal(format!(
                "member {} is owned by a {}, not a class or namespace",
                member,
                other.kind_name()
            ))),
        }
    }

    /// Cell class used for a captured variable of the given type
    pub fn shared_var_type(&self, ty: &JvmType) -> JvmType {
        let suffix = match ty {
            JvmType::Boolean => "Boolean",
            JvmType::Char => "Char",
            JvmType::Byte => "Byte",
            JvmType::Short => "Short",
            JvmType::Int => "Int",
            JvmType::Float => "Float",
            JvmType::Long => "Long",
            JvmType::Double => "Double",
            _ => "Object",
        };
        JvmType::object(format!("{}{}", SHARED_VAR_PREFIX, suffix))
    }

    fn generic_fragment(&self, ty: &SemanticType) -> Result<String> {
        Ok(match ty {
            SemanticType::TypeParameter { name, .. } => format!("T{};", name),
            SemanticType::Class { class, arguments, .. } if !arguments.is_empty() => {
                let mut out = format!("L{}<", self.class_internal_name(*class)?);
                for argument in arguments {
                    let boxed = self.map_type(argument, MapTypeMode::TypeParameter)?;
                    match argument {
                        SemanticType::TypeParameter { .. } | SemanticType::Class { .. } => {
                            out.push_str(&self.generic_fragment(argument)?)
                        }
                        _ => out.push_str(&boxed.descriptor()),
                    }
                }
                out.push_str(">;");
                out
            }
            SemanticType::Array { element, .. } if signature::is_generic(element) => {
                format!("[{}", self.generic_fragment(element)?)
            }
            other => self.map_type(other, MapTypeMode::Value)?.descriptor(),
        })
    }

    fn return_fragment(&self, ty: &SemanticType) -> Result<String> {
        match ty {
            SemanticType::Unit => Ok("V".to_string()),
            other => self.generic_fragment(other),
        }
    }

    fn bounds(&self, parameters: &[TypeParameterDescriptor]) -> Result<Vec<String>> {
        parameters.iter().map(|p| self.generic_fragment(&p.upper_bound)).collect()
    }

    /// Generic `Signature` attribute of a class, if it has one
    pub fn class_signature(&self, class: DescriptorId, super_name: &str, interfaces: &[String]) -> Result<Option<String>> {
        let descriptor = self.bindings.class(class)?;
        let mut writer = SignatureWriter::new();
        writer.type_parameters(&descriptor.type_parameters, &self.bounds(&descriptor.type_parameters)?);
        match descriptor.superclass.as_ref().filter(|s| signature::is_generic(s)) {
            Some(superclass) => writer.raw(&self.generic_fragment(superclass)?, true),
            None => writer.raw(&format!("L{};", super_name), false),
        }
        for (index, interface) in interfaces.iter().enumerate() {
            match descriptor.traits.get(index).filter(|t| signature::is_generic(t)) {
                Some(t) => writer.raw(&self.generic_fragment(t)?, true),
                None => writer.raw(&format!("L{};", interface), false),
            }
        }
        Ok(writer.finish())
    }

    /// JVM shape of a function for the given owner kind
    pub fn map_signature(&self, function: DescriptorId, kind: &OwnerKind) -> Result<JvmMethodSignature> {
        let descriptor = self.bindings.function(function)?;
        let name = match descriptor.kind {
            FunctionKind::Constructor => CONSTRUCTOR_METHOD_NAME.to_string(),
            FunctionKind::Literal => INVOKE_METHOD_NAME.to_string(),
            FunctionKind::Function => descriptor.name.clone(),
        };

        let this_parameter = if *kind == OwnerKind::TraitImpl {
            let container = descriptor.container;
            Some(JvmType::object(self.class_internal_name(container)?))
        } else {
            None
        };
        let receiver_parameter = match &descriptor.receiver {
            Some(receiver) => Some(self.map_type(receiver, MapTypeMode::Value)?),
            None => None,
        };

        let mut value_parameters = Vec::new();
        let mut writer = SignatureWriter::new();
        writer.type_parameters(&descriptor.type_parameters, &self.bounds(&descriptor.type_parameters)?);
        writer.open_parameters();
        if let Some(this) = &this_parameter {
            writer.raw(&this.descriptor(), false);
        }
        if let (Some(receiver), Some(mapped)) = (&descriptor.receiver, &receiver_parameter) {
            writer.raw(&self.generic_or(receiver, mapped)?, signature::is_generic(receiver));
        }
        for parameter in &descriptor.value_parameters {
            let parameter = self.bindings.value_parameter(*parameter)?;
            let mapped = self.map_type(&parameter.ty, MapTypeMode::Value)?;
            writer.raw(&self.generic_or(&parameter.ty, &mapped)?, signature::is_generic(&parameter.ty));
            value_parameters.push(mapped);
        }
        writer.close_parameters();
        let return_type = match descriptor.kind {
            FunctionKind::Constructor => JvmType::Void,
            _ => self.map_return_type(&descriptor.return_type)?,
        };
        writer.raw(&self.return_fragment(&descriptor.return_type)?, signature::is_generic(&descriptor.return_type));

        let mut arguments: Vec<JvmType> = this_parameter.iter().cloned().collect();
        arguments.extend(receiver_parameter.iter().cloned());
        arguments.extend(value_parameters.iter().cloned());

        let class_name = |t: &SemanticType| self.fq_name(t);
        Ok(JvmMethodSignature {
            name,
            method_type: MethodType::new(arguments, return_type),
            generic_signature: if descriptor.kind == FunctionKind::Constructor { None } else { writer.finish() },
            this_parameter,
            receiver_parameter,
            value_parameters,
            kotlin_type_parameters: signature::type_parameters_string(&descriptor.type_parameters, &class_name),
            kotlin_return_type: self.type_string(&descriptor.return_type),
        })
    }

    fn generic_or(&self, ty: &SemanticType, mapped: &JvmType) -> Result<String> {
        if signature::is_generic(ty) {
            self.generic_fragment(ty)
        } else {
            Ok(mapped.descriptor())
        }
    }

    /// `getX()`: receiver first when the property is an extension or owned by a trait-impl
    pub fn map_getter_signature(&self, property: DescriptorId, kind: &OwnerKind) -> Result<JvmMethodSignature> {
        let descriptor = self.bindings.property(property)?;
        let ty = self.map_type(&descriptor.ty, MapTypeMode::Value)?;
        let this_parameter = self.accessor_this(descriptor, kind)?;
        let arguments: Vec<JvmType> = this_parameter.iter().cloned().collect();
        Ok(JvmMethodSignature {
            name: getter_name(&descriptor.name),
            method_type: MethodType::new(arguments, ty),
            generic_signature: None,
            this_parameter,
            receiver_parameter: None,
            value_parameters: Vec::new(),
            kotlin_type_parameters: String::new(),
            kotlin_return_type: self.type_string(&descriptor.ty),
        })
    }

    pub fn map_setter_signature(&self, property: DescriptorId, kind: &OwnerKind) -> Result<JvmMethodSignature> {
        let descriptor = self.bindings.property(property)?;
        let ty = self.map_type(&descriptor.ty, MapTypeMode::Value)?;
        let this_parameter = self.accessor_this(descriptor, kind)?;
        let mut arguments: Vec<JvmType> = this_parameter.iter().cloned().collect();
        arguments.push(ty.clone());
        Ok(JvmMethodSignature {
            name: setter_name(&descriptor.name),
            method_type: MethodType::new(arguments, JvmType::Void),
            generic_signature: None,
            this_parameter,
            receiver_parameter: None,
            value_parameters: vec![ty],
            kotlin_type_parameters: String::new(),
            kotlin_return_type: self.type_string(&descriptor.ty),
        })
    }

    fn accessor_this(&self, property: &PropertyDescriptor, kind: &OwnerKind) -> Result<Option<JvmType>> {
        if *kind == OwnerKind::TraitImpl {
            Ok(Some(JvmType::object(self.class_internal_name(property.container)?)))
        } else {
            Ok(None)
        }
    }

    /// Resolves how a call site reaches `function`
    pub fn map_to_callable_method(&self, function: DescriptorId, super_call: bool) -> Result<CallableMethod> {
        let descriptor = self.bindings.function(function)?;
        let container = descriptor.container;
        let has_defaults = descriptor
            .value_parameters
            .iter()
            .map(|p| self.bindings.value_parameter(*p).map(|p| p.declares_default))
            .collect::<Result<Vec<bool>>>()?
            .into_iter()
            .any(|d| d);
        let accepts_type_info = !descriptor.type_parameters.is_empty();

        let (owner, invoke_kind, kind, needs_this, default_owner) = match self.bindings.get(container)? {
            Descriptor::Namespace(ns) => {
                (self.namespace_class_name(ns), InvokeKind::Static, OwnerKind::Namespace, false, None)
            }
            Descriptor::Class(class) => {
                let class_name = self.class_internal_name(container)?;
                if descriptor.kind == FunctionKind::Constructor {
                    (class_name, InvokeKind::Special, OwnerKind::Implementation, true, None)
                } else if class.is_trait() && super_call {
                    let impl_name = format!("{}{}", class_name, TRAIT_IMPL_SUFFIX);
                    (impl_name, InvokeKind::Static, OwnerKind::TraitImpl, false, None)
                } else if class.is_trait() {
                    let impl_name = format!("{}{}", class_name, TRAIT_IMPL_SUFFIX);
                    (class_name, InvokeKind::Interface, OwnerKind::Implementation, true, Some(impl_name))
                } else if super_call || descriptor.visibility == Visibility::Private {
                    (class_name, InvokeKind::Special, OwnerKind::Implementation, true, None)
                } else {
                    (class_name, InvokeKind::Virtual, OwnerKind::Implementation, true, None)
                }
            }
            other => {
                return Err(Error::internal(format!(
                    "cannot call {} declared inside a {}",
                    descriptor.name,
                    other.kind_name()
                )))
            }
        };

        Ok(CallableMethod {
            owner,
            signature: self.map_signature(function, &kind)?,
            invoke_kind,
            needs_this,
            needs_outer_receiver: false,
            accepts_type_info,
            has_default_overload: has_defaults,
            default_owner,
        })
    }
}

pub fn primitive_type(kind: PrimitiveKind) -> JvmType {
    match kind {
        PrimitiveKind::Boolean => JvmType::Boolean,
        PrimitiveKind::Char => JvmType::Char,
        PrimitiveKind::Byte => JvmType::Byte,
        PrimitiveKind::Short => JvmType::Short,
        PrimitiveKind::Int => JvmType::Int,
        PrimitiveKind::Float => JvmType::Float,
        PrimitiveKind::Long => JvmType::Long,
        PrimitiveKind::Double => JvmType::Double,
    }
}

fn qualified(fq_name: &str, simple: &str) -> String {
    if fq_name.is_empty() {
        simple.to_string()
    } else {
        format!("{}/{}", fq_name.replace('.', "/"), simple)
    }
}

pub fn getter_name(property: &str) -> String {
    format!("get{}", capitalize(property))
}

pub fn setter_name(property: &str) -> String {
    format!("set{}", capitalize(property))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
