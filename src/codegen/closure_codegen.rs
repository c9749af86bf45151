//! Classes synthesized for function literals and object literals

use log::debug;

use crate::ast::{ClassDecl, FunctionLiteral, SemanticType, SourceLocation};
use crate::common::error::{Error, Result};

use super::builder::ClassBuilder;
use super::class_body;
use super::closure::MutableClosure;
use super::context::OwnerKind;
use super::defs::access::*;
use super::defs::*;
use super::expression::ExpressionCodegen;
use super::insn::InstructionAdapter;
use super::jvm_type::{JvmType, MethodType};
use super::stack_value::{coerce, StackValue};
use super::type_mapper::MapTypeMode;

impl ExpressionCodegen<'_> {
    fn literal_class_name(&mut self) -> Result<String> {
        let outer = self
            .context
            .physical_class_name()
            .ok_or_else(|| Error::internal("literal outside of any class"))?
            .to_string();
        Ok(self.state.next_anonymous_name(&outer))
    }

    /// Pushes the captured values in constructor order and instantiates the literal class
    fn instantiate(&mut self, class_name: &str, closure: &MutableClosure, location: &SourceLocation) -> Result<()> {
        let class_type = JvmType::object(class_name);
        self.v.anew(class_name);
        self.v.dup_value(&class_type);
        for capture in closure.captures() {
            self.push_capture(capture.key, location)?;
        }
        self.v.invokespecial(class_name, CONSTRUCTOR_METHOD_NAME, &closure.constructor_descriptor());
        Ok(())
    }

    /// `{ x -> ... }` becomes a `FunctionImpl<N>` subclass holding its captures
    pub(super) fn gen_function_literal(
        &mut self,
        literal: &FunctionLiteral,
        ty: &SemanticType,
        location: &SourceLocation,
    ) -> Result<StackValue> {
        let class_name = self.literal_class_name()?;
        let signature = self
            .state
            .type_mapper
            .map_signature(literal.descriptor, &OwnerKind::Implementation)?;
        let function = self.bindings.function(literal.descriptor)?.clone();
        let arity = signature.method_type.arguments.len();
        debug!("function literal {} with arity {}", class_name, arity);

        let mut closure = MutableClosure::new(class_name.clone());
        let (body, max_locals) = {
            let context = self.context.enter_closure(literal.descriptor, class_name.clone());
            let return_type = signature.return_type().clone();
            let mut codegen = ExpressionCodegen::new(&mut *self.state, &context, Some(&mut closure), return_type.clone());
            codegen.enter_this(&JvmType::object(class_name.clone()));
            if let Some(receiver) = &signature.receiver_parameter {
                codegen.enter_receiver(receiver);
            }
            for parameter in &literal.parameters {
                codegen.enter_parameter(parameter.descriptor)?;
            }
            let value = codegen.gen_block(&literal.body, &function.return_type)?;
            if codegen.falls_through() {
                value.put(&return_type, &mut codegen.v)?;
                codegen.v.areturn(&return_type);
            }
            codegen.finish()
        };

        let super_name = format!("{}{}", FUNCTION_IMPL_CLASS_PREFIX, arity);
        let mut builder = self.state.new_builder();
        builder.define_class(
            self.state.config.class_version,
            ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
            &class_name,
            None,
            &super_name,
            Vec::new(),
        )?;
        self.visit_source(&mut builder)?;
        capture_fields(&mut builder, &closure)?;
        literal_constructor(&mut builder, &class_name, &super_name, &closure)?;
        builder
            .new_method(ACC_PUBLIC | ACC_FINAL, INVOKE_METHOD_NAME, &signature.descriptor(), signature.generic_signature.clone(), Vec::new())?
            .visit_code(body, max_locals);
        erased_bridge(&mut builder, &class_name, &signature.method_type)?;
        self.state.factory.finish(&mut builder)?;

        self.mark_line(location);
        self.instantiate(&class_name, &closure, location)?;
        let function_type = match self.state.type_mapper.map_type(ty, MapTypeMode::Value)? {
            JvmType::Object(name) if name.starts_with(FUNCTION_CLASS_PREFIX) => JvmType::Object(name),
            _ => JvmType::object(format!("{}{}", FUNCTION_CLASS_PREFIX, arity)),
        };
        Ok(StackValue::on_stack(function_type))
    }

    /// `object : Base() { ... }` becomes a named class instantiated in place
    pub(super) fn gen_object_literal(&mut self, class: &ClassDecl) -> Result<StackValue> {
        let class_name = self.literal_class_name()?;
        self.state.type_mapper.record_anonymous_class(class.descriptor, class_name.clone());
        debug!("object literal {}", class_name);

        let mut closure = MutableClosure::new(class_name.clone());
        class_body::generate_class(&mut *self.state, self.context, class, Some(&mut closure))?;
        self.instantiate(&class_name, &closure, &class.location)?;
        Ok(StackValue::on_stack(JvmType::object(class_name)))
    }

    fn visit_source(&self, builder: &mut ClassBuilder) -> Result<()> {
        if let Some(file) = &self.state.current_file {
            builder.visit_source(file)?;
        }
        Ok(())
    }
}

/// One private final field per capture
pub(super) fn capture_fields(builder: &mut ClassBuilder, closure: &MutableClosure) -> Result<()> {
    for capture in closure.captures() {
        builder.new_field(ACC_PRIVATE | ACC_FINAL, &capture.field_name, &capture.field_type.descriptor(), None, None)?;
    }
    Ok(())
}

/// Stores constructor arguments `1..` into the capture fields
pub(super) fn capture_prologue(class_name: &str, closure: &MutableClosure) -> InstructionAdapter {
    let this = JvmType::object(class_name);
    let mut v = InstructionAdapter::new();
    let mut slot = 1;
    for capture in closure.captures() {
        v.load(0, &this);
        v.load(slot, &capture.field_type);
        v.putfield(class_name, &capture.field_name, &capture.field_type.descriptor());
        slot += capture.field_type.size();
    }
    v
}

/// Local slots taken by `this` and the captures
pub(super) fn capture_slots(closure: &MutableClosure) -> u16 {
    1 + closure.captures().map(|c| c.field_type.size()).sum::<u16>()
}

fn literal_constructor(builder: &mut ClassBuilder, class_name: &str, super_name: &str, closure: &MutableClosure) -> Result<()> {
    let mut v = InstructionAdapter::new();
    v.load(0, &JvmType::object(class_name));
    v.invokespecial(super_name, CONSTRUCTOR_METHOD_NAME, "()V");
    let (prologue, _) = capture_prologue(class_name, closure).into_parts();
    v.append(&prologue);
    v.areturn(&JvmType::Void);
    builder
        .new_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, &closure.constructor_descriptor(), None, Vec::new())?
        .visit_code(v, capture_slots(closure));
    Ok(())
}

/// `invoke(Object...)Object` forwarding to the typed `invoke`
fn erased_bridge(builder: &mut ClassBuilder, class_name: &str, typed: &MethodType) -> Result<()> {
    let object = JvmType::java_object();
    let erased = MethodType::new(vec![object.clone(); typed.arguments.len()], object.clone());
    if erased.descriptor() == typed.descriptor() {
        return Ok(());
    }
    let mut v = InstructionAdapter::new();
    v.load(0, &JvmType::object(class_name));
    for (index, argument) in typed.arguments.iter().enumerate() {
        v.load(index as u16 + 1, &object);
        coerce(&object, argument, &mut v)?;
    }
    v.invokevirtual(class_name, INVOKE_METHOD_NAME, &typed.descriptor());
    coerce(&typed.return_type, &object, &mut v)?;
    v.areturn(&object);
    builder
        .new_method(ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC, INVOKE_METHOD_NAME, &erased.descriptor(), None, Vec::new())?
        .visit_code(v, erased.arguments_size() + 1);
    Ok(())
}
