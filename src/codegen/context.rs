//! Codegen context chain
//!
//! Contexts form an immutable tree mirroring lexical nesting. A child only
//! borrows its parent for lookups; the parent lives on the stack of the
//! generator that entered it and outlives every child built from it.

use std::fmt;
use std::iter;

use crate::ast::DescriptorId;
use crate::common::error::{Error, Result};

/// Physical role of the class the current code lands in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// Top-level declarations of a namespace
    Namespace,
    /// Concrete class body
    Implementation,
    /// Static holder of a trait's default method bodies
    TraitImpl,
    /// Facade member forwarding to the named class
    StaticDelegate(String),
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKind::Namespace => write!(f, "namespace"),
            OwnerKind::Implementation => write!(f, "implementation"),
            OwnerKind::TraitImpl => write!(f, "trait-impl"),
            OwnerKind::StaticDelegate(owner) => write!(f, "static-delegate({})", owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextKind {
    Namespace { namespace: DescriptorId, class_name: String },
    Class { class: DescriptorId, class_name: String },
    /// Function, constructor or property accessor body
    Method { function: DescriptorId },
    /// Synthesized class of a function literal
    Closure { function: DescriptorId, class_name: String },
}

#[derive(Debug)]
pub struct CodegenContext<'p> {
    kind: ContextKind,
    owner_kind: OwnerKind,
    parent: Option<&'p CodegenContext<'p>>,
}

impl<'p> CodegenContext<'p> {
    pub fn namespace(namespace: DescriptorId, class_name: impl Into<String>, owner_kind: OwnerKind) -> Self {
        Self {
            kind: ContextKind::Namespace { namespace, class_name: class_name.into() },
            owner_kind,
            parent: None,
        }
    }

    pub fn enter_class(&self, class: DescriptorId, class_name: impl Into<String>, owner_kind: OwnerKind) -> CodegenContext<'_> {
        CodegenContext {
            kind: ContextKind::Class { class, class_name: class_name.into() },
            owner_kind,
            parent: Some(self),
        }
    }

    /// Method bodies always live in some physical class
    pub fn enter_method(&self, function: DescriptorId) -> Result<CodegenContext<'_>> {
        if self.physical_class_name().is_none() {
            return Err(Error::internal(format!(
                "method {} entered without an enclosing class or namespace",
                function
            )));
        }
        Ok(CodegenContext {
            kind: ContextKind::Method { function },
            owner_kind: self.owner_kind.clone(),
            parent: Some(self),
        })
    }

    pub fn enter_closure(&self, function: DescriptorId, class_name: impl Into<String>) -> CodegenContext<'_> {
        CodegenContext {
            kind: ContextKind::Closure { function, class_name: class_name.into() },
            owner_kind: OwnerKind::Implementation,
            parent: Some(self),
        }
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn owner_kind(&self) -> &OwnerKind {
        &self.owner_kind
    }

    pub fn parent(&self) -> Option<&'p CodegenContext<'p>> {
        self.parent
    }

    /// This context followed by every enclosing one
    pub fn ancestors<'s>(&'s self) -> impl Iterator<Item = &'s CodegenContext<'s>> {
        let start: &'s CodegenContext<'s> = self;
        iter::successors(Some(start), |context| context.parent)
    }

    /// Descriptor this context was entered for
    pub fn descriptor(&self) -> DescriptorId {
        match &self.kind {
            ContextKind::Namespace { namespace, .. } => *namespace,
            ContextKind::Class { class, .. } => *class,
            ContextKind::Method { function } | ContextKind::Closure { function, .. } => *function,
        }
    }

    /// Internal name of the class the current code is emitted into
    pub fn physical_class_name(&self) -> Option<&str> {
        self.ancestors().find_map(|context| match &context.kind {
            ContextKind::Namespace { class_name, .. }
            | ContextKind::Class { class_name, .. }
            | ContextKind::Closure { class_name, .. } => Some(class_name.as_str()),
            ContextKind::Method { .. } => None,
        })
    }

    /// Nearest context that is a physical class: namespace, class or closure
    pub fn class_context(&self) -> Option<&CodegenContext<'_>> {
        self.ancestors().find(|context| !matches!(context.kind, ContextKind::Method { .. }))
    }

    /// Innermost function whose frame the current code runs in
    pub fn current_function(&self) -> Option<DescriptorId> {
        self.ancestors().find_map(|context| match &context.kind {
            ContextKind::Method { function } | ContextKind::Closure { function, .. } => Some(*function),
            _ => None,
        })
    }

    /// Whether code here runs inside a class nested in (not equal to) the class of `class`
    pub fn is_nested_in(&self, class: DescriptorId) -> bool {
        match self.class_context() {
            Some(context) => match &context.kind {
                ContextKind::Class { class: own, .. } if *own == class => false,
                _ => context.ancestors().skip(1).any(|c| matches!(&c.kind, ContextKind::Class { class: outer, .. } if *outer == class)),
            },
            None => false,
        }
    }

    /// Searches outward for the method or closure context of `function`
    pub fn find_function(&self, function: DescriptorId) -> Option<&CodegenContext<'_>> {
        self.ancestors().find(|context| match &context.kind {
            ContextKind::Method { function: f } | ContextKind::Closure { function: f, .. } => *f == function,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_flows_into_methods() {
        let namespace = CodegenContext::namespace(DescriptorId(0), "p/namespace", OwnerKind::Namespace);
        let class = namespace.enter_class(DescriptorId(1), "p/A", OwnerKind::TraitImpl);
        let method = class.enter_method(DescriptorId(2)).unwrap();

        assert_eq!(method.owner_kind(), &OwnerKind::TraitImpl);
        assert_eq!(method.physical_class_name(), Some("p/A"));
        assert_eq!(method.parent().map(|c| c.descriptor()), Some(DescriptorId(1)));
        assert_eq!(method.current_function(), Some(DescriptorId(2)));
    }

    #[test]
    fn test_closure_is_its_own_physical_class() {
        let namespace = CodegenContext::namespace(DescriptorId(0), "p/namespace", OwnerKind::Namespace);
        let class = namespace.enter_class(DescriptorId(1), "p/A", OwnerKind::Implementation);
        let method = class.enter_method(DescriptorId(2)).unwrap();
        let closure = method.enter_closure(DescriptorId(3), "p/A$1");
        let body = closure.enter_method(DescriptorId(3)).unwrap();

        assert_eq!(body.physical_class_name(), Some("p/A$1"));
        assert!(body.is_nested_in(DescriptorId(1)));
        assert!(!method.is_nested_in(DescriptorId(1)));
        assert!(body.find_function(DescriptorId(2)).is_some());
        assert!(body.find_function(DescriptorId(9)).is_none());
        assert_eq!(body.ancestors().count(), 5);
    }
}
