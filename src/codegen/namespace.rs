//! Top-level declarations of a namespace
//!
//! Functions and properties declared outside any class land on the facade
//! class `<pkg>/namespace`. With per-file parts enabled, function bodies move
//! to `<pkg>/namespace$src$<File>` and the facade keeps static forwarders,
//! the `$default` overloads and every property.

use log::{debug, warn};

use crate::ast::*;
use crate::common::error::{Error, Result};

use super::accessor;
use super::builder::{Checkpoint, ClassBuilder};
use super::class_body;
use super::context::{CodegenContext, OwnerKind};
use super::defs::access::*;
use super::defs::*;
use super::expression::ExpressionCodegen;
use super::function;
use super::jvm_type::JvmType;
use super::property::{self, PropertySource};
use super::state::GenerationState;

/// Generates every file of one namespace, applying the failure policy per file
pub fn generate_namespace(state: &mut GenerationState, namespace: DescriptorId, files: &[&JetFile]) -> Result<()> {
    let bindings = state.bindings();
    let descriptor = bindings.namespace(namespace)?;
    let facade_name = state.type_mapper.namespace_class_name(descriptor);
    let has_members = files
        .iter()
        .flat_map(|f| &f.declarations)
        .any(|d| !matches!(d, Declaration::Class(_)));
    debug!("namespace '{}' over {} file(s)", descriptor.fq_name, files.len());

    let mut facade = if has_members {
        let mut builder = state.new_builder();
        builder.define_class(
            state.config.class_version,
            ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
            &facade_name,
            None,
            OBJECT_CLASS,
            Vec::new(),
        )?;
        if let [file] = files {
            builder.visit_source(&file.name)?;
        }
        Some(builder)
    } else {
        None
    };

    let context = CodegenContext::namespace(namespace, facade_name.clone(), OwnerKind::Namespace);
    let mut initializers = Vec::new();
    for file in files {
        state.current_file = Some(file.name.clone());
        let checkpoint = FileCheckpoint::take(state, facade.as_ref(), &facade_name, &initializers);
        let result = generate_file(state, &context, facade.as_mut(), file, &mut initializers);
        if result.is_err() {
            checkpoint.restore(state, facade.as_mut(), &facade_name, &mut initializers)?;
        }
        state.factory.handle_file_result(&file.name, result)?;
    }
    state.current_file = None;

    if let Some(mut facade) = facade {
        static_initializer(state, &context, &mut facade, &initializers)?;
        accessor::generate_accessors(state, &mut facade, &facade_name)?;
        state.factory.finish(&mut facade)?;
    }
    Ok(())
}

/// Facade and output state before a file is generated.
///
/// A failed file leaves nothing behind: no facade members or forwarders, no
/// property initializers, no classes and no accessors requested on the facade.
struct FileCheckpoint {
    facade: Option<Checkpoint>,
    initializers: usize,
    classes: usize,
    accessors: usize,
}

impl FileCheckpoint {
    fn take(
        state: &GenerationState,
        facade: Option<&ClassBuilder>,
        facade_name: &str,
        initializers: &[(String, &PropertyDecl)],
    ) -> Self {
        Self {
            facade: facade.map(ClassBuilder::checkpoint),
            initializers: initializers.len(),
            classes: state.factory.class_count(),
            accessors: state.accessors.count(facade_name),
        }
    }

    fn restore(
        self,
        state: &mut GenerationState,
        facade: Option<&mut ClassBuilder>,
        facade_name: &str,
        initializers: &mut Vec<(String, &PropertyDecl)>,
    ) -> Result<()> {
        if let (Some(builder), Some(checkpoint)) = (facade, self.facade) {
            builder.rollback(checkpoint)?;
        }
        initializers.truncate(self.initializers);
        state.factory.discard_since(self.classes);
        state.accessors.truncate(facade_name, self.accessors);
        Ok(())
    }
}

fn facade_of<'b>(facade: &'b mut Option<&mut ClassBuilder>) -> Result<&'b mut ClassBuilder> {
    facade
        .as_deref_mut()
        .ok_or_else(|| Error::internal("top-level member without a namespace facade"))
}

fn generate_file<'f>(
    state: &mut GenerationState,
    context: &CodegenContext<'_>,
    mut facade: Option<&mut ClassBuilder>,
    file: &'f JetFile,
    initializers: &mut Vec<(String, &'f PropertyDecl)>,
) -> Result<()> {
    let bindings = state.bindings();
    let facade_name = context
        .physical_class_name()
        .ok_or_else(|| Error::internal("namespace context without a class"))?
        .to_string();
    let has_functions = file.declarations.iter().any(|d| matches!(d, Declaration::Function(_)));
    let mut part = if state.config.namespace_parts && has_functions {
        let namespace = bindings.namespace(file.namespace)?;
        let part_name = state.type_mapper.namespace_part_name(namespace, &file.name);
        let mut builder = state.new_builder();
        builder.define_class(
            state.config.class_version,
            ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
            &part_name,
            None,
            OBJECT_CLASS,
            Vec::new(),
        )?;
        builder.visit_source(&file.name)?;
        Some((part_name, builder))
    } else {
        None
    };

    for declaration in &file.declarations {
        let name = bindings.get(declaration.descriptor())?.name().to_string();
        let result = match declaration {
            Declaration::Class(class) => class_body::generate_class(state, context, class, None),
            Declaration::Function(decl) => match part.as_mut() {
                Some((part_name, builder)) => {
                    let part_context = CodegenContext::namespace(file.namespace, part_name.clone(), OwnerKind::Namespace);
                    let delegate = CodegenContext::namespace(
                        file.namespace,
                        facade_name.clone(),
                        OwnerKind::StaticDelegate(part_name.clone()),
                    );
                    function::generate_function(state, builder, &part_context, None, decl)
                        .and_then(|()| function::generate_function(state, facade_of(&mut facade)?, &delegate, None, decl))
                }
                None => function::generate_function(state, facade_of(&mut facade)?, context, None, decl),
            },
            Declaration::Property(decl) => {
                if decl.initializer.is_some() {
                    initializers.push((file.name.clone(), decl));
                }
                property::generate_property(
                    state,
                    facade_of(&mut facade)?,
                    context,
                    None,
                    decl.descriptor,
                    PropertySource::of(decl),
                )
            }
        };
        result.map_err(|error| error.in_declaration(facade_name.clone(), name, context.owner_kind()))?;
    }

    if let Some((part_name, mut builder)) = part {
        accessor::generate_accessors(state, &mut builder, &part_name)?;
        state.factory.finish(&mut builder)?;
    }
    Ok(())
}

/// `<clinit>` of the facade running top-level property initializers in source order.
///
/// A failing initializer is charged to its file; the facade then goes without
/// a static initializer.
fn static_initializer(
    state: &mut GenerationState,
    context: &CodegenContext<'_>,
    facade: &mut ClassBuilder,
    initializers: &[(String, &PropertyDecl)],
) -> Result<()> {
    if initializers.is_empty() {
        return Ok(());
    }
    let method_context = context.enter_method(context.descriptor())?;
    let mut failures = Vec::new();
    let (code, max_locals) = {
        let mut codegen = ExpressionCodegen::new(&mut *state, &method_context, None, JvmType::Void);
        for (file, property) in initializers {
            let Some(initializer) = &property.initializer else {
                continue;
            };
            let result = match codegen.state.member_map.field(property.descriptor).cloned() {
                Some(field) => codegen.gen_field_initializer(&field.owner, &field.name, &field.ty, true, initializer),
                None => Err(Error::unsupported("initializer of a property without backing field", &property.location)),
            };
            if let Err(error) = result {
                failures.push((file.clone(), error));
            }
        }
        codegen.v.areturn(&JvmType::Void);
        codegen.finish()
    };

    if failures.is_empty() {
        facade
            .new_method(ACC_STATIC, STATIC_INITIALIZER_METHOD_NAME, "()V", None, Vec::new())?
            .visit_code(code, max_locals);
        return Ok(());
    }
    warn!("dropping static initializer of {}", context.physical_class_name().unwrap_or_default());
    for (file, error) in failures {
        state.factory.handle_file_result(&file, Err(error))?;
    }
    Ok(())
}
