//! Binding table: owns every descriptor and the facts the front end derived about them

use std::collections::HashSet;

use super::*;
use crate::common::error::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct BindingContext {
    descriptors: Vec<Descriptor>,
    shared_vars: HashSet<DescriptorId>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, descriptor: Descriptor) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len() as u32);
        self.descriptors.push(descriptor);
        id
    }

    pub fn add_namespace(&mut self, fq_name: impl Into<String>) -> DescriptorId {
        self.add(Descriptor::Namespace(NamespaceDescriptor { fq_name: fq_name.into() }))
    }

    pub fn add_class(&mut self, class: ClassDescriptor) -> DescriptorId {
        let container = class.container;
        let id = self.add(Descriptor::Class(class));
        self.register_member(container, id);
        id
    }

    pub fn add_function(&mut self, function: FunctionDescriptor) -> DescriptorId {
        let container = function.container;
        let is_constructor = function.kind == FunctionKind::Constructor;
        let id = self.add(Descriptor::Function(function));
        if is_constructor {
            if let Some(Descriptor::Class(class)) = self.descriptors.get_mut(container.0 as usize) {
                class.primary_constructor = Some(id);
            }
        } else {
            self.register_member(container, id);
        }
        id
    }

    pub fn add_property(&mut self, property: PropertyDescriptor) -> DescriptorId {
        let container = property.container;
        let id = self.add(Descriptor::Property(property));
        self.register_member(container, id);
        id
    }

    /// Adds a value parameter and appends it to its function's parameter list
    pub fn add_value_parameter(&mut self, parameter: ValueParameterDescriptor) -> DescriptorId {
        let container = parameter.container;
        let id = self.add(Descriptor::ValueParameter(parameter));
        if let Some(Descriptor::Function(function)) = self.descriptors.get_mut(container.0 as usize) {
            function.value_parameters.push(id);
        }
        id
    }

    pub fn add_variable(&mut self, variable: VariableDescriptor) -> DescriptorId {
        self.add(Descriptor::Variable(variable))
    }

    fn register_member(&mut self, container: DescriptorId, member: DescriptorId) {
        if let Some(Descriptor::Class(class)) = self.descriptors.get_mut(container.0 as usize) {
            class.members.push(member);
        }
    }

    pub fn get(&self, id: DescriptorId) -> Result<&Descriptor> {
        self.descriptors
            .get(id.0 as usize)
            .ok_or_else(|| Error::internal(format!("unknown descriptor {}", id)))
    }

    pub fn container(&self, id: DescriptorId) -> Result<Option<DescriptorId>> {
        Ok(match self.get(id)? {
            Descriptor::Namespace(_) => None,
            Descriptor::Class(d) => Some(d.container),
            Descriptor::Function(d) => Some(d.container),
            Descriptor::Property(d) => Some(d.container),
            Descriptor::ValueParameter(d) => Some(d.container),
            Descriptor::Variable(d) => Some(d.container),
        })
    }

    pub fn namespace(&self, id: DescriptorId) -> Result<&NamespaceDescriptor> {
        match self.get(id)? {
            Descriptor::Namespace(d) => Ok(d),
            other => Err(mismatch(id, "namespace", other)),
        }
    }

    pub fn class(&self, id: DescriptorId) -> Result<&ClassDescriptor> {
        match self.get(id)? {
            Descriptor::Class(d) => Ok(d),
            other => Err(mismatch(id, "class", other)),
        }
    }

    pub fn function(&self, id: DescriptorId) -> Result<&FunctionDescriptor> {
        match self.get(id)? {
            Descriptor::Function(d) => Ok(d),
            other => Err(mismatch(id, "function", other)),
        }
    }

    pub fn property(&self, id: DescriptorId) -> Result<&PropertyDescriptor> {
        match self.get(id)? {
            Descriptor::Property(d) => Ok(d),
            other => Err(mismatch(id, "property", other)),
        }
    }

    pub fn value_parameter(&self, id: DescriptorId) -> Result<&ValueParameterDescriptor> {
        match self.get(id)? {
            Descriptor::ValueParameter(d) => Ok(d),
            other => Err(mismatch(id, "value parameter", other)),
        }
    }

    /// Declared type and mutability of a local variable or value parameter
    pub fn variable(&self, id: DescriptorId) -> Result<(&SemanticType, bool)> {
        match self.get(id)? {
            Descriptor::Variable(d) => Ok((&d.ty, d.mutable)),
            Descriptor::ValueParameter(d) => Ok((&d.ty, false)),
            other => Err(mismatch(id, "variable", other)),
        }
    }

    pub fn is_shared(&self, variable: DescriptorId) -> bool {
        self.shared_vars.contains(&variable)
    }

    /// Marks every `var` referenced from a function other than the one declaring it.
    ///
    /// Such a variable lives on after its frame returns and is written through
    /// more than one scope, so it must be wrapped in a shared cell.
    pub fn record_shared_vars(&mut self, files: &[JetFile]) -> Result<()> {
        let mut found = HashSet::new();
        for file in files {
            let mut walker = SharedVarWalker { bindings: &*self, scopes: Vec::new(), found: &mut found };
            walker.declarations(&file.declarations)?;
        }
        self.shared_vars.extend(found);
        Ok(())
    }
}

fn mismatch(id: DescriptorId, expected: &str, actual: &Descriptor) -> Error {
    Error::internal(format!("descriptor {} is a {}, expected {}", id, actual.kind_name(), expected))
}

struct SharedVarWalker<'a> {
    bindings: &'a BindingContext,
    scopes: Vec<DescriptorId>,
    found: &'a mut HashSet<DescriptorId>,
}

impl SharedVarWalker<'_> {
    fn declarations(&mut self, declarations: &[Declaration]) -> Result<()> {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => self.class(class)?,
                Declaration::Function(function) => {
                    self.scopes.push(function.descriptor);
                    for parameter in &function.parameters {
                        if let Some(value) = &parameter.default_value {
                            self.expr(value)?;
                        }
                    }
                    match &function.body {
                        Some(FunctionBody::Block(stmts)) => self.stmts(stmts)?,
                        Some(FunctionBody::Expression(expr)) => self.expr(expr)?,
                        None => {}
                    }
                    self.scopes.pop();
                }
                Declaration::Property(property) => {
                    self.scopes.push(property.descriptor);
                    if let Some(init) = &property.initializer {
                        self.expr(init)?;
                    }
                    for body in property.getter.iter().chain(property.setter.iter().map(|s| &s.body)) {
                        match body {
                            FunctionBody::Block(stmts) => self.stmts(stmts)?,
                            FunctionBody::Expression(expr) => self.expr(expr)?,
                        }
                    }
                    self.scopes.pop();
                }
            }
        }
        Ok(())
    }

    fn class(&mut self, class: &ClassDecl) -> Result<()> {
        self.scopes.push(class.descriptor);
        if let Some(call) = &class.super_call {
            self.call(call)?;
        }
        if let Some(constructor) = &class.primary_constructor {
            self.scopes.push(constructor.descriptor);
            for parameter in &constructor.parameters {
                if let Some(value) = &parameter.default_value {
                    self.expr(value)?;
                }
            }
            for block in &class.initializers {
                self.stmts(block)?;
            }
            self.scopes.pop();
        }
        self.declarations(&class.declarations)?;
        self.scopes.pop();
        Ok(())
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            match stmt {
                Stmt::Expr(expr) => self.expr(expr)?,
                Stmt::Local { initializer, .. } => {
                    if let Some(init) = initializer {
                        self.expr(init)?;
                    }
                }
                Stmt::Return { value, .. } => {
                    if let Some(value) = value {
                        self.expr(value)?;
                    }
                }
                Stmt::While { condition, body } | Stmt::DoWhile { body, condition } => {
                    self.expr(condition)?;
                    self.stmts(body)?;
                }
                Stmt::Break { .. } | Stmt::Continue { .. } => {}
            }
        }
        Ok(())
    }

    fn call(&mut self, call: &Call) -> Result<()> {
        if let Some(receiver) = &call.receiver {
            self.expr(receiver)?;
        }
        for argument in &call.arguments {
            match argument {
                ResolvedArgument::Expression(expr) => self.expr(expr)?,
                ResolvedArgument::Vararg(exprs) => {
                    for expr in exprs {
                        self.expr(expr)?;
                    }
                }
                ResolvedArgument::Default => {}
            }
        }
        Ok(())
    }

    fn reference(&mut self, id: DescriptorId) -> Result<()> {
        if let Descriptor::Variable(variable) = self.bindings.get(id)? {
            let declared_here = self.scopes.last() == Some(&variable.container);
            if variable.mutable && !declared_here {
                self.found.insert(id);
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Constant(_) | ExprKind::This { .. } | ExprKind::BackingField(_) => Ok(()),
            ExprKind::StringTemplate(entries) => {
                for entry in entries {
                    if let TemplateEntry::Expr(e) = entry {
                        self.expr(e)?;
                    }
                }
                Ok(())
            }
            ExprKind::Variable(id) => self.reference(*id),
            ExprKind::Property { receiver, .. } => match receiver {
                Some(r) => self.expr(r),
                None => Ok(()),
            },
            ExprKind::Binary { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::IncDec { target, .. } => self.expr(target),
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                self.expr(target)?;
                self.expr(value)
            }
            ExprKind::Call(call) => self.call(call),
            ExprKind::Invoke { callee, arguments } => {
                self.expr(callee)?;
                for argument in arguments {
                    self.expr(argument)?;
                }
                Ok(())
            }
            ExprKind::Index { array, index } => {
                self.expr(array)?;
                self.expr(index)
            }
            ExprKind::If { condition, then_branch, else_branch } => {
                self.expr(condition)?;
                self.expr(then_branch)?;
                match else_branch {
                    Some(e) => self.expr(e),
                    None => Ok(()),
                }
            }
            ExprKind::Block(stmts) => self.stmts(stmts),
            ExprKind::FunctionLiteral(literal) => {
                self.scopes.push(literal.descriptor);
                self.stmts(&literal.body)?;
                self.scopes.pop();
                Ok(())
            }
            ExprKind::ObjectLiteral(class) => self.class(class),
            ExprKind::Is { expr, .. } | ExprKind::Cast { expr, .. } => self.expr(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::ProgramBuilder;

    #[test]
    fn test_only_vars_written_from_nested_scopes_are_shared() {
        let mut p = ProgramBuilder::new("p");
        let ns = p.namespace();
        let int = SemanticType::int();
        let f = p.function(ns, "f", SemanticType::Unit);
        let captured_var = p.local(f, "m", int.clone(), true);
        let local_var = p.local(f, "k", int.clone(), true);
        let captured_val = p.local(f, "n", int.clone(), false);
        let literal = p.literal(f, SemanticType::Unit);

        let literal_expr = Expr::new(
            ExprKind::FunctionLiteral(Box::new(FunctionLiteral {
                descriptor: literal,
                parameters: Vec::new(),
                body: vec![Stmt::Expr(Expr::assign(
                    Expr::variable(captured_var, int.clone()),
                    Expr::variable(captured_val, int.clone()),
                ))],
            })),
            SemanticType::Function { parameters: Vec::new(), return_type: Box::new(SemanticType::Unit) },
        );
        let body = vec![
            Stmt::local(captured_var, Expr::int(0)),
            Stmt::local(local_var, Expr::int(0)),
            Stmt::local(captured_val, Expr::int(1)),
            Stmt::Expr(literal_expr),
            Stmt::Expr(Expr::assign(Expr::variable(local_var, int.clone()), Expr::int(2))),
        ];
        let file = p.file(
            "f.jet",
            vec![Declaration::Function(FunctionDecl {
                descriptor: f,
                location: SourceLocation::default(),
                annotations: Vec::new(),
                parameters: Vec::new(),
                body: Some(FunctionBody::Block(body)),
            })],
        );
        let mut program = p.finish(vec![file]);

        program.bindings.record_shared_vars(&program.files).unwrap();
        assert!(program.bindings.is_shared(captured_var));
        assert!(!program.bindings.is_shared(local_var));
        assert!(!program.bindings.is_shared(captured_val));
    }

    #[test]
    fn test_typed_lookup_reports_kind_mismatch() {
        let mut bindings = BindingContext::new();
        let ns = bindings.add_namespace("p.q");
        assert_eq!(bindings.namespace(ns).unwrap().fq_name, "p.q");
        let err = bindings.class(ns).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("expected class"), "{}", err);
    }
}
