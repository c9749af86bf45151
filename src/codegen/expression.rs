//! Expression and statement lowering
//!
//! [`ExpressionCodegen`] walks one method body. Each expression becomes a
//! [`StackValue`] whose receiver, if any, is already on the stack; the caller
//! decides whether to read it, branch on it or store into it. Statements emit
//! directly and manage the frame: locals enter on declaration and leave in
//! reverse order when their block ends.

use std::rc::Rc;

use log::trace;

use crate::ast::*;
use crate::common::error::{Error, Result};

use super::accessor::Accessor;
use super::arguments::{generate_arguments, ArgumentGenerator};
use super::callable::{CallableMethod, InvokeKind};
use super::closure::{self, CaptureKey, MutableClosure};
use super::context::{CodegenContext, ContextKind, OwnerKind};
use super::defs::*;
use super::frame_map::FrameMap;
use super::insn::{InstructionAdapter, Insn, Label};
use super::jvm_type::{JvmType, MethodType};
use super::opcodes::*;
use super::stack_value::{AccessorMethod, StackValue};
use super::state::GenerationState;
use super::type_mapper::{getter_name, setter_name, MapTypeMode};

struct LoopBlock {
    continue_label: Label,
    break_label: Label,
}

struct ScopedLocal {
    descriptor: DescriptorId,
    name: String,
    type_descriptor: String,
    start: Label,
    index: u16,
}

pub struct ExpressionCodegen<'a> {
    pub(super) state: &'a mut GenerationState,
    pub(super) bindings: Rc<BindingContext>,
    pub v: InstructionAdapter,
    pub frame: FrameMap,
    pub(super) context: &'a CodegenContext<'a>,
    pub(super) closure: Option<&'a mut MutableClosure>,
    return_type: JvmType,
    /// Slot and type of the current function's extension receiver
    receiver: Option<(u16, JvmType)>,
    loops: Vec<LoopBlock>,
    scopes: Vec<Vec<ScopedLocal>>,
    last_line: u32,
}

impl<'a> ExpressionCodegen<'a> {
    pub fn new(
        state: &'a mut GenerationState,
        context: &'a CodegenContext<'a>,
        closure: Option<&'a mut MutableClosure>,
        return_type: JvmType,
    ) -> Self {
        let bindings = state.bindings();
        Self {
            state,
            bindings,
            v: InstructionAdapter::new(),
            frame: FrameMap::new(),
            context,
            closure,
            return_type,
            receiver: None,
            loops: Vec::new(),
            scopes: Vec::new(),
            last_line: 0,
        }
    }

    pub fn return_type(&self) -> &JvmType {
        &self.return_type
    }

    /// Reserves slot 0 for `this`
    pub fn enter_this(&mut self, ty: &JvmType) -> u16 {
        self.frame.enter_temp(ty)
    }

    pub fn enter_receiver(&mut self, ty: &JvmType) -> u16 {
        let index = self.frame.enter_temp(ty);
        self.receiver = Some((index, ty.clone()));
        index
    }

    pub fn enter_parameter(&mut self, parameter: DescriptorId) -> Result<u16> {
        if self.bindings.is_shared(parameter) {
            return Err(Error::internal(format!("parameter {} cannot be a shared variable", parameter)));
        }
        let ty = self.variable_type(parameter)?;
        Ok(self.frame.enter(parameter, &ty))
    }

    /// Instructions and the local count reached
    pub fn finish(self) -> (InstructionAdapter, u16) {
        let max_locals = self.frame.max_locals();
        (self.v, max_locals)
    }

    fn map(&self, ty: &SemanticType) -> Result<JvmType> {
        self.state.type_mapper.map_type(ty, MapTypeMode::Value)
    }

    pub(super) fn variable_type(&self, variable: DescriptorId) -> Result<JvmType> {
        let (ty, _) = self.bindings.variable(variable)?;
        self.map(ty)
    }

    /// Whether control can reach the end of the code emitted so far
    pub fn falls_through(&self) -> bool {
        match self.v.insns().last() {
            Some(Insn::Op(op)) => !((IRETURN..=RETURN).contains(op) || *op == ATHROW),
            Some(Insn::Jump(op, _)) => *op != GOTO,
            _ => true,
        }
    }

    pub fn mark_line(&mut self, location: &SourceLocation) {
        if self.state.config.emit_debug_info && location.line > 0 && location.line != self.last_line {
            self.last_line = location.line;
            self.v.line_number(location.line);
        }
    }

    // bodies

    /// Generates a whole function body and its final return
    pub fn gen_function_body(&mut self, body: &FunctionBody) -> Result<()> {
        match body {
            FunctionBody::Expression(expr) => {
                self.mark_line(&expr.location);
                let return_type = self.return_type.clone();
                self.gen(expr)?.put(&return_type, &mut self.v)?;
                if self.falls_through() {
                    self.v.areturn(&return_type);
                }
            }
            FunctionBody::Block(stmts) => {
                self.gen_scope(stmts)?;
                self.gen_fallthrough_return();
            }
        }
        Ok(())
    }

    /// Closes a body whose last statement may complete normally
    pub fn gen_fallthrough_return(&mut self) {
        if self.falls_through() {
            let return_type = self.return_type.clone();
            self.v.zero(&return_type);
            self.v.areturn(&return_type);
        }
    }

    /// Statements of a block in their own local scope
    pub fn gen_scope(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.scopes.push(Vec::new());
        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }
        self.leave_scope()
    }

    fn leave_scope(&mut self) -> Result<()> {
        let locals = self
            .scopes
            .pop()
            .ok_or_else(|| Error::internal("scope closed twice"))?;
        if locals.is_empty() {
            return Ok(());
        }
        let end = self.v.new_label();
        self.v.mark(end);
        for local in locals.into_iter().rev() {
            self.frame.leave(local.descriptor)?;
            self.v.local_variable(&local.name, &local.type_descriptor, local.start, end, local.index);
        }
        Ok(())
    }

    // statements

    pub fn gen_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.mark_line(&expr.location);
                match self.gen(expr)? {
                    StackValue::PreIncrement { index, delta } => self.v.iinc(index, delta),
                    value if self.falls_through() => value.put(&JvmType::Void, &mut self.v)?,
                    _ => {}
                }
                Ok(())
            }
            Stmt::Local { descriptor, initializer, location } => {
                self.mark_line(location);
                self.gen_local(*descriptor, initializer.as_ref())
            }
            Stmt::Return { value, location } => {
                self.mark_line(location);
                let return_type = self.return_type.clone();
                match value {
                    Some(value) => self.gen(value)?.put(&return_type, &mut self.v)?,
                    None => self.v.zero(&return_type),
                }
                if self.falls_through() {
                    self.v.areturn(&return_type);
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                let start = self.v.new_label();
                let end = self.v.new_label();
                self.v.mark(start);
                self.gen_condition(condition, end, true)?;
                self.loops.push(LoopBlock { continue_label: start, break_label: end });
                let result = self.gen_scope(body);
                self.loops.pop();
                result?;
                if self.falls_through() {
                    self.v.goto_(start);
                }
                self.v.mark(end);
                Ok(())
            }
            Stmt::DoWhile { body, condition } => {
                let start = self.v.new_label();
                let next = self.v.new_label();
                let end = self.v.new_label();
                self.v.mark(start);
                self.loops.push(LoopBlock { continue_label: next, break_label: end });
                // locals of the body stay visible to the condition
                self.scopes.push(Vec::new());
                let result = stmts_then(self, body);
                self.loops.pop();
                result?;
                self.v.mark(next);
                self.gen_condition(condition, start, false)?;
                self.leave_scope()?;
                self.v.mark(end);
                Ok(())
            }
            Stmt::Break { location } => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.break_label)
                    .ok_or_else(|| Error::unsupported("break outside of a loop", location))?;
                self.v.goto_(target);
                Ok(())
            }
            Stmt::Continue { location } => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.continue_label)
                    .ok_or_else(|| Error::unsupported("continue outside of a loop", location))?;
                self.v.goto_(target);
                Ok(())
            }
        }
    }

    fn gen_local(&mut self, variable: DescriptorId, initializer: Option<&Expr>) -> Result<()> {
        let ty = self.variable_type(variable)?;
        let name = self.bindings.get(variable)?.name().to_string();
        let (index, stored) = if self.bindings.is_shared(variable) {
            let cell = self.state.type_mapper.shared_var_type(&ty);
            let index = self.frame.enter(variable, &cell);
            self.v.anew(&cell.internal_name());
            self.v.dup_value(&cell);
            self.v.invokespecial(&cell.internal_name(), CONSTRUCTOR_METHOD_NAME, "()V");
            self.v.store(index, &cell);
            if let Some(init) = initializer {
                self.gen(init)?.put(&ty, &mut self.v)?;
                StackValue::Shared { index, cell: cell.clone(), ty: ty.clone() }.store(&ty, &mut self.v)?;
            }
            (index, cell)
        } else {
            if let Some(init) = initializer {
                self.gen(init)?.put(&ty, &mut self.v)?;
            }
            let index = self.frame.enter(variable, &ty);
            if initializer.is_some() {
                self.v.store(index, &ty);
            }
            (index, ty)
        };
        trace!("local {} -> slot {}", name, index);
        let start = self.v.new_label();
        self.v.mark(start);
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| Error::internal(format!("local {} declared outside of any scope", name)))?;
        scope.push(ScopedLocal { descriptor: variable, name, type_descriptor: stored.descriptor(), start, index });
        Ok(())
    }

    // conditions

    /// Branches to `label` when `expr` is false (`jump_if_false`) or true,
    /// short-circuiting `&&`, `||` and `!` without materializing booleans
    pub fn gen_condition(&mut self, expr: &Expr, label: Label, jump_if_false: bool) -> Result<()> {
        match &expr.kind {
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                if jump_if_false {
                    self.gen_condition(left, label, true)?;
                    self.gen_condition(right, label, true)
                } else {
                    let skip = self.v.new_label();
                    self.gen_condition(left, skip, true)?;
                    self.gen_condition(right, label, false)?;
                    self.v.mark(skip);
                    Ok(())
                }
            }
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                if jump_if_false {
                    let skip = self.v.new_label();
                    self.gen_condition(left, skip, false)?;
                    self.gen_condition(right, label, true)?;
                    self.v.mark(skip);
                    Ok(())
                } else {
                    self.gen_condition(left, label, false)?;
                    self.gen_condition(right, label, false)
                }
            }
            ExprKind::Unary { op: UnaryOp::Not, operand } => self.gen_condition(operand, label, !jump_if_false),
            _ => self.gen(expr)?.cond_jump(label, jump_if_false, &mut self.v),
        }
    }

    // expressions

    pub fn gen(&mut self, expr: &Expr) -> Result<StackValue> {
        match &expr.kind {
            ExprKind::Constant(value) => Ok(StackValue::constant(value.clone(), self.map(&expr.ty)?)),
            ExprKind::StringTemplate(entries) => self.gen_template(entries),
            ExprKind::Variable(variable) => self.lookup_variable(*variable),
            ExprKind::Property { receiver, property } => {
                self.gen_property(receiver.as_deref(), *property, &expr.location)
            }
            ExprKind::BackingField(property) => self.gen_backing_field(*property, &expr.location),
            ExprKind::This { class } => self.gen_this(*class, &expr.location),
            ExprKind::Binary { op, left, right } => self.gen_binary(*op, left, right, expr),
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, expr),
            ExprKind::IncDec { op, target } => self.gen_inc_dec(*op, target),
            ExprKind::Assign { target, value } => {
                let target = self.gen(target)?;
                let ty = target.ty();
                self.gen(value)?.put(&ty, &mut self.v)?;
                target.store(&ty, &mut self.v)?;
                Ok(StackValue::None)
            }
            ExprKind::CompoundAssign { op, target, value } => self.gen_compound_assign(*op, target, value),
            ExprKind::Call(call) => self.gen_call(call, &expr.location),
            ExprKind::Invoke { callee, arguments } => self.gen_invoke(callee, arguments),
            ExprKind::Index { array, index } => {
                let array_type = self.map(&array.ty)?;
                let element = array_type
                    .element_type()
                    .cloned()
                    .ok_or_else(|| Error::unsupported(format!("indexing a value of type {}", array.ty), &expr.location))?;
                self.gen(array)?.put(&array_type, &mut self.v)?;
                self.gen(index)?.put(&JvmType::Int, &mut self.v)?;
                Ok(StackValue::ArrayElement { ty: element })
            }
            ExprKind::If { condition, then_branch, else_branch } => {
                self.gen_if(condition, then_branch, else_branch.as_deref(), &expr.ty)
            }
            ExprKind::Block(stmts) => self.gen_block(stmts, &expr.ty),
            ExprKind::FunctionLiteral(literal) => self.gen_function_literal(literal, &expr.ty, &expr.location),
            ExprKind::ObjectLiteral(class) => self.gen_object_literal(class),
            ExprKind::Is { expr: value, ty, negated } => {
                if ty.is_nullable() {
                    return Err(Error::unsupported(format!("is-check against nullable type {}", ty), &expr.location));
                }
                self.gen(value)?.put(&JvmType::java_object(), &mut self.v)?;
                let target = self.state.type_mapper.map_type(ty, MapTypeMode::TypeParameter)?;
                self.v.instance_of(&target);
                let test = StackValue::on_stack(JvmType::Boolean);
                Ok(if *negated { StackValue::Not(Box::new(test)) } else { test })
            }
            ExprKind::Cast { expr: value, ty } => {
                let target = self.map(ty)?;
                self.gen(value)?.put(&target, &mut self.v)?;
                Ok(StackValue::on_stack(target))
            }
        }
    }

    pub(super) fn gen_block(&mut self, stmts: &[Stmt], ty: &SemanticType) -> Result<StackValue> {
        let value_type = if ty.is_unit() { None } else { Some(self.map(ty)?) };
        let (last, init) = match (stmts.split_last(), &value_type) {
            (Some((Stmt::Expr(last), init)), Some(_)) => (Some(last), init),
            _ => (None, stmts),
        };
        self.scopes.push(Vec::new());
        for stmt in init {
            self.gen_stmt(stmt)?;
        }
        let mut result = StackValue::None;
        if let (Some(last), Some(value_type)) = (last, value_type) {
            self.mark_line(&last.location);
            // read before the block's locals go out of scope
            self.gen(last)?.put(&value_type, &mut self.v)?;
            result = StackValue::on_stack(value_type);
        }
        self.leave_scope()?;
        Ok(result)
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        ty: &SemanticType,
    ) -> Result<StackValue> {
        let value_type = match else_branch {
            Some(_) if !ty.is_unit() => self.map(ty)?,
            _ => JvmType::Void,
        };
        let else_label = self.v.new_label();
        let end = self.v.new_label();
        self.gen_condition(condition, else_label, true)?;
        self.gen_branch(then_branch, &value_type)?;
        match else_branch {
            Some(else_branch) => {
                if self.falls_through() {
                    self.v.goto_(end);
                }
                self.v.mark(else_label);
                self.gen_branch(else_branch, &value_type)?;
                self.v.mark(end);
            }
            None => self.v.mark(else_label),
        }
        Ok(if value_type == JvmType::Void { StackValue::None } else { StackValue::on_stack(value_type) })
    }

    fn gen_branch(&mut self, branch: &Expr, ty: &JvmType) -> Result<()> {
        let value = self.gen(branch)?;
        if self.falls_through() {
            value.put(ty, &mut self.v)?;
        }
        Ok(())
    }

    // variables and receivers

    fn lookup_variable(&mut self, variable: DescriptorId) -> Result<StackValue> {
        let ty = self.variable_type(variable)?;
        let shared = self.bindings.is_shared(variable);
        if let Some(index) = self.frame.index_of(variable) {
            if shared {
                let cell = self.state.type_mapper.shared_var_type(&ty);
                return Ok(StackValue::Shared { index, cell, ty });
            }
            return Ok(StackValue::local(index, ty));
        }
        let cell = if shared { Some(self.state.type_mapper.shared_var_type(&ty)) } else { None };
        let captured = closure::resolve(
            self.closure.as_deref_mut(),
            self.context,
            &self.bindings,
            variable,
            ty,
            cell,
        )?
        .clone();
        let owner = self.closure_class_name()?;
        Ok(captured.inner_value(&owner, &mut self.v))
    }

    /// Pushes the cell of a shared variable itself, for handing it to a nested literal
    fn push_shared_cell(&mut self, variable: DescriptorId) -> Result<JvmType> {
        let ty = self.variable_type(variable)?;
        let cell = self.state.type_mapper.shared_var_type(&ty);
        if let Some(index) = self.frame.index_of(variable) {
            self.v.load(index, &cell);
            return Ok(cell);
        }
        let captured = closure::resolve(
            self.closure.as_deref_mut(),
            self.context,
            &self.bindings,
            variable,
            ty,
            Some(cell.clone()),
        )?
        .clone();
        let owner = self.closure_class_name()?;
        self.v.load(0, &JvmType::object(owner.clone()));
        self.v.getfield(&owner, &captured.field_name, &cell.descriptor());
        Ok(cell)
    }

    fn closure_class_name(&self) -> Result<String> {
        self.closure
            .as_ref()
            .map(|c| c.class_name().to_string())
            .ok_or_else(|| Error::internal("captured value accessed outside of a literal class"))
    }

    /// Pushes whatever a nested literal captured under `key`, seen from this code
    pub(super) fn push_capture(&mut self, key: CaptureKey, location: &SourceLocation) -> Result<JvmType> {
        match key {
            CaptureKey::Variable(variable) if self.bindings.is_shared(variable) => self.push_shared_cell(variable),
            CaptureKey::Variable(variable) => {
                let value = self.lookup_variable(variable)?;
                let ty = value.ty();
                value.put(&ty, &mut self.v)?;
                Ok(ty)
            }
            CaptureKey::This(class) => {
                let value = self.gen_this_of(class, location)?;
                let ty = value.ty();
                value.put(&ty, &mut self.v)?;
                Ok(ty)
            }
            CaptureKey::Receiver(function) => {
                let value = self.gen_receiver_of(function, location)?;
                let ty = value.ty();
                value.put(&ty, &mut self.v)?;
                Ok(ty)
            }
        }
    }

    /// `this`: the innermost implicit receiver, or the instance of `class`
    fn gen_this(&mut self, class: Option<DescriptorId>, location: &SourceLocation) -> Result<StackValue> {
        if let Some(class) = class {
            return self.gen_this_of(class, location);
        }
        let mut found = None;
        for context in self.context.ancestors() {
            match context.kind() {
                ContextKind::Method { function } => {
                    // property accessors and initializers run in method contexts of non-functions
                    if matches!(self.bindings.get(*function)?, Descriptor::Function(f) if f.receiver.is_some()) {
                        found = Some(CaptureKey::Receiver(*function));
                        break;
                    }
                }
                ContextKind::Class { class, .. } => {
                    found = Some(CaptureKey::This(*class));
                    break;
                }
                _ => {}
            }
        }
        match found {
            Some(CaptureKey::Receiver(function)) => self.gen_receiver_of(function, location),
            Some(CaptureKey::This(class)) => self.gen_this_of(class, location),
            _ => Err(Error::unsupported("'this' outside of a class or extension", location)),
        }
    }

    pub(super) fn gen_this_of(&mut self, class: DescriptorId, location: &SourceLocation) -> Result<StackValue> {
        let class_type = JvmType::object(self.state.type_mapper.class_internal_name(class)?);
        let own_class = self.context.class_context().map(|c| c.kind().clone());
        if let Some(ContextKind::Class { class: own, .. }) = own_class {
            let has_this = !matches!(self.context.owner_kind(), OwnerKind::Namespace | OwnerKind::StaticDelegate(_));
            if own == class && has_this {
                return Ok(StackValue::local(0, class_type));
            }
        }
        if self.closure.is_some() && self.context.is_nested_in(class) {
            let owner = self.closure_class_name()?;
            let captured = self
                .closure
                .as_deref_mut()
                .map(|c| c.capture_this(class, class_type.clone()).clone())
                .ok_or_else(|| Error::internal("closure vanished while capturing this"))?;
            return Ok(captured.inner_value(&owner, &mut self.v));
        }
        if self.bindings.class(class)?.is_object() {
            let name = class_type.internal_name();
            return Ok(StackValue::field(class_type, name, INSTANCE_FIELD, true));
        }
        Err(Error::unsupported(
            format!("access to the instance of {} from here", self.bindings.class(class)?.name),
            location,
        ))
    }

    /// Pushes the nearest enclosing instance that inherits the members of `container`
    fn push_implicit_receiver(&mut self, container: DescriptorId, location: &SourceLocation) -> Result<()> {
        let mut class = container;
        for context in self.context.ancestors() {
            if let ContextKind::Class { class: candidate, .. } = context.kind() {
                if self.is_subclass(*candidate, container)? {
                    class = *candidate;
                    break;
                }
            }
        }
        let value = self.gen_this_of(class, location)?;
        let ty = value.ty();
        value.put(&ty, &mut self.v)
    }

    fn is_subclass(&self, class: DescriptorId, base: DescriptorId) -> Result<bool> {
        if class == base {
            return Ok(true);
        }
        let descriptor = self.bindings.class(class)?;
        for supertype in descriptor.superclass.iter().chain(&descriptor.traits) {
            if let SemanticType::Class { class: parent, .. } = supertype {
                if self.is_subclass(*parent, base)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn gen_receiver_of(&mut self, function: DescriptorId, location: &SourceLocation) -> Result<StackValue> {
        if self.context.current_function() == Some(function) {
            if let Some((index, ty)) = &self.receiver {
                return Ok(StackValue::local(*index, ty.clone()));
            }
        }
        let receiver = self
            .bindings
            .function(function)?
            .receiver
            .clone()
            .ok_or_else(|| Error::unsupported("receiver of a function without one", location))?;
        let ty = self.map(&receiver)?;
        let owner = self.closure_class_name()?;
        let captured = self
            .closure
            .as_deref_mut()
            .map(|c| c.capture_receiver(function, ty).clone())
            .ok_or_else(|| Error::internal("receiver captured outside of a literal class"))?;
        Ok(captured.inner_value(&owner, &mut self.v))
    }

    // members

    /// Whether a private member of `class` must go through an accessor from here
    fn needs_accessor(&self, class: DescriptorId) -> bool {
        self.context.is_nested_in(class)
    }

    fn request_accessor(&mut self, owner: &str, member: DescriptorId) -> Result<Accessor> {
        let requester = self
            .context
            .physical_class_name()
            .ok_or_else(|| Error::internal("accessor requested outside of any class"))?
            .to_string();
        let bindings = Rc::clone(&self.bindings);
        Ok(self.state.accessors.request(&bindings, owner, member, &requester)?.clone())
    }

    fn gen_property(&mut self, receiver: Option<&Expr>, property: DescriptorId, location: &SourceLocation) -> Result<StackValue> {
        let bindings = Rc::clone(&self.bindings);
        let descriptor = bindings.property(property)?;
        let ty = self.map(&descriptor.ty)?;
        let container = descriptor.container;
        match bindings.get(container)? {
            Descriptor::Namespace(namespace) => {
                let owner = self.state.type_mapper.namespace_class_name(namespace);
                if descriptor.uses_direct_field() {
                    return Ok(StackValue::field(ty, owner, descriptor.name.clone(), true));
                }
                let getter = AccessorMethod {
                    owner: owner.clone(),
                    name: getter_name(&descriptor.name),
                    descriptor: MethodType::new(Vec::new(), ty.clone()).descriptor(),
                    invoke_kind: InvokeKind::Static,
                };
                let setter = descriptor.mutable.then(|| AccessorMethod {
                    owner: owner.clone(),
                    name: setter_name(&descriptor.name),
                    descriptor: MethodType::new(vec![ty.clone()], JvmType::Void).descriptor(),
                    invoke_kind: InvokeKind::Static,
                });
                Ok(StackValue::Property { ty, getter: Some(getter), setter, owner, name: descriptor.name.clone(), is_static: true })
            }
            Descriptor::Class(class) => {
                let owner = self.state.type_mapper.class_internal_name(container)?;
                let owner_type = JvmType::object(owner.clone());
                match receiver {
                    Some(receiver) => self.gen(receiver)?.put(&owner_type, &mut self.v)?,
                    None => self.push_implicit_receiver(container, location)?,
                }
                let private = descriptor.visibility == Visibility::Private;
                if private && self.needs_accessor(container) {
                    let accessor = self.request_accessor(&owner, property)?;
                    let setter = (descriptor.mutable || self.state.config.read_only_accessor_setters).then(|| accessor.setter(&ty));
                    return Ok(StackValue::Property {
                        getter: Some(accessor.getter(&ty)),
                        setter,
                        ty,
                        owner,
                        name: descriptor.name.clone(),
                        is_static: false,
                    });
                }
                if descriptor.uses_direct_field() {
                    return Ok(StackValue::field(ty, owner, descriptor.name.clone(), false));
                }
                let invoke_kind = if class.is_trait() {
                    InvokeKind::Interface
                } else if private {
                    InvokeKind::Special
                } else {
                    InvokeKind::Virtual
                };
                let getter = AccessorMethod {
                    owner: owner.clone(),
                    name: getter_name(&descriptor.name),
                    descriptor: MethodType::new(Vec::new(), ty.clone()).descriptor(),
                    invoke_kind,
                };
                let setter = descriptor.mutable.then(|| AccessorMethod {
                    owner: owner.clone(),
                    name: setter_name(&descriptor.name),
                    descriptor: MethodType::new(vec![ty.clone()], JvmType::Void).descriptor(),
                    invoke_kind,
                });
                Ok(StackValue::Property { ty, getter: Some(getter), setter, owner, name: descriptor.name.clone(), is_static: false })
            }
            other => Err(Error::internal(format!("property {} owned by a {}", descriptor.name, other.kind_name()))),
        }
    }

    fn gen_backing_field(&mut self, property: DescriptorId, location: &SourceLocation) -> Result<StackValue> {
        let bindings = Rc::clone(&self.bindings);
        let descriptor = bindings.property(property)?;
        if !descriptor.has_backing_field {
            return Err(Error::unsupported(format!("'${}' of a property without backing field", descriptor.name), location));
        }
        let ty = self.map(&descriptor.ty)?;
        let container = descriptor.container;
        match bindings.get(container)? {
            Descriptor::Namespace(namespace) => {
                let owner = self.state.type_mapper.namespace_class_name(namespace);
                Ok(StackValue::field(ty, owner, descriptor.name.clone(), true))
            }
            Descriptor::Class(_) => {
                let owner = self.state.type_mapper.class_internal_name(container)?;
                self.push_implicit_receiver(container, location)?;
                Ok(StackValue::field(ty, owner, descriptor.name.clone(), false))
            }
            other => Err(Error::internal(format!("property {} owned by a {}", descriptor.name, other.kind_name()))),
        }
    }

    // operators

    fn gen_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, expr: &Expr) -> Result<StackValue> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let when_false = self.v.new_label();
                let end = self.v.new_label();
                self.gen_condition(expr, when_false, true)?;
                self.v.iconst(1);
                self.v.goto_(end);
                self.v.mark(when_false);
                self.v.iconst(0);
                self.v.mark(end);
                Ok(StackValue::on_stack(JvmType::Boolean))
            }
            op if op.is_comparison() => self.gen_comparison(op, left, right),
            BinaryOp::Add if matches!(expr.ty, SemanticType::String { .. }) => {
                let mut parts = Vec::new();
                flatten_concat(expr, &mut parts);
                self.v.anew(STRING_BUILDER_CLASS);
                self.v.op(DUP);
                self.v.invokespecial(STRING_BUILDER_CLASS, CONSTRUCTOR_METHOD_NAME, "()V");
                for part in parts {
                    self.gen_append(part)?;
                }
                self.v.invokevirtual(STRING_BUILDER_CLASS, "toString", "()Ljava/lang/String;");
                Ok(StackValue::on_stack(JvmType::object(STRING_CLASS)))
            }
            op => {
                let ty = self.map(&expr.ty)?;
                let ty = ty.unboxed().unwrap_or(ty);
                let operand = if ty.is_int_like() { JvmType::Int } else { ty.clone() };
                self.gen(left)?.put(&operand, &mut self.v)?;
                self.gen(right)?.put(&operand, &mut self.v)?;
                self.v.arith(arith_opcode(op)?, &operand);
                self.v.cast(&operand, &ty);
                Ok(StackValue::on_stack(ty))
            }
        }
    }

    fn gen_comparison(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<StackValue> {
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Identity | BinaryOp::NotIdentity);
        let negated = matches!(op, BinaryOp::NotEq | BinaryOp::NotIdentity);
        if equality {
            let null_side = match (&left.kind, &right.kind) {
                (_, ExprKind::Constant(Constant::Null)) => Some(left),
                (ExprKind::Constant(Constant::Null), _) => Some(right),
                _ => None,
            };
            if let Some(other) = null_side {
                let ty = self.map(&other.ty)?.boxed();
                self.gen(other)?.put(&ty, &mut self.v)?;
                return Ok(StackValue::IsNull { negated });
            }
        }
        let left_type = self.map(&left.ty)?;
        let right_type = self.map(&right.ty)?;
        let numeric = |t: &JvmType| if t.is_primitive() { Some(t.clone()) } else { t.unboxed() };
        // a nullable box compared with a primitive must not be unboxed
        let boxed_equality =
            matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && left_type.is_primitive() != right_type.is_primitive();
        let operand = match (numeric(&left_type), numeric(&right_type)) {
            (Some(l), Some(r)) if !boxed_equality && (left_type.is_primitive() || right_type.is_primitive() || !equality) => {
                promote(&l, &r)
            }
            _ => {
                if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
                    let object = JvmType::java_object();
                    self.gen(left)?.put(&object, &mut self.v)?;
                    self.gen(right)?.put(&object, &mut self.v)?;
                    self.v.invokestatic(INTRINSICS_CLASS, "areEqual", "(Ljava/lang/Object;Ljava/lang/Object;)Z");
                    let equal = StackValue::on_stack(JvmType::Boolean);
                    return Ok(if negated { StackValue::Not(Box::new(equal)) } else { equal });
                }
                if !equality {
                    return Err(Error::internal(format!("ordering comparison of {} and {}", left_type, right_type)));
                }
                JvmType::java_object()
            }
        };
        self.gen(left)?.put(&operand, &mut self.v)?;
        self.gen(right)?.put(&operand, &mut self.v)?;
        Ok(StackValue::Compare { op, operand })
    }

    fn gen_append(&mut self, part: &Expr) -> Result<()> {
        let ty = self.map(&part.ty)?;
        let argument = append_type(&ty);
        self.gen(part)?.put(&argument, &mut self.v)?;
        self.v.invokevirtual(
            STRING_BUILDER_CLASS,
            "append",
            &format!("({})L{};", argument.descriptor(), STRING_BUILDER_CLASS),
        );
        Ok(())
    }

    fn gen_template(&mut self, entries: &[TemplateEntry]) -> Result<StackValue> {
        self.v.anew(STRING_BUILDER_CLASS);
        self.v.op(DUP);
        self.v.invokespecial(STRING_BUILDER_CLASS, CONSTRUCTOR_METHOD_NAME, "()V");
        for entry in entries {
            match entry {
                TemplateEntry::Literal(text) => {
                    self.v.aconst(text);
                    self.v.invokevirtual(
                        STRING_BUILDER_CLASS,
                        "append",
                        &format!("(Ljava/lang/String;)L{};", STRING_BUILDER_CLASS),
                    );
                }
                TemplateEntry::Expr(expr) => self.gen_append(expr)?,
            }
        }
        self.v.invokevirtual(STRING_BUILDER_CLASS, "toString", "()Ljava/lang/String;");
        Ok(StackValue::on_stack(JvmType::object(STRING_CLASS)))
    }

    fn gen_unary(&mut self, op: UnaryOp, operand: &Expr, expr: &Expr) -> Result<StackValue> {
        match op {
            UnaryOp::Not => Ok(StackValue::Not(Box::new(self.gen(operand)?))),
            UnaryOp::Minus | UnaryOp::Plus => {
                let ty = self.map(&expr.ty)?;
                let ty = ty.unboxed().unwrap_or(ty);
                self.gen(operand)?.put(&ty, &mut self.v)?;
                if op == UnaryOp::Minus {
                    self.v.neg(&ty);
                }
                Ok(StackValue::on_stack(ty))
            }
        }
    }

    /// `++x`, `x--`: the target's receiver is evaluated once and duplicated
    fn gen_inc_dec(&mut self, op: IncDecOp, target: &Expr) -> Result<StackValue> {
        let value = self.gen(target)?;
        if let StackValue::Local { index, ty: JvmType::Int } = &value {
            let delta = op.delta() as i16;
            if op.is_prefix() {
                return Ok(StackValue::PreIncrement { index: *index, delta });
            }
            self.v.load(*index, &JvmType::Int);
            self.v.iinc(*index, delta);
            return Ok(StackValue::on_stack(JvmType::Int));
        }
        let ty = value.ty();
        let numeric = ty.unboxed().unwrap_or_else(|| ty.clone());
        let operand = if numeric.is_int_like() { JvmType::Int } else { numeric.clone() };
        let receiver = value.receiver_size();
        value.dup_receiver(&mut self.v);
        value.put(&numeric, &mut self.v)?;
        if !op.is_prefix() {
            self.v.dup_under(numeric.size(), receiver);
        }
        self.v.cast(&numeric, &operand);
        push_one(&operand, &mut self.v);
        self.v.arith(if op.delta() > 0 { IADD } else { ISUB }, &operand);
        self.v.cast(&operand, &numeric);
        if op.is_prefix() {
            self.v.dup_under(numeric.size(), receiver);
        }
        value.store(&numeric, &mut self.v)?;
        Ok(StackValue::on_stack(numeric))
    }

    fn gen_compound_assign(&mut self, op: BinaryOp, target: &Expr, value: &Expr) -> Result<StackValue> {
        let place = self.gen(target)?;
        let ty = place.ty();
        place.dup_receiver(&mut self.v);
        if op == BinaryOp::Add && matches!(target.ty, SemanticType::String { .. }) {
            let string = JvmType::object(STRING_CLASS);
            place.put(&string, &mut self.v)?;
            self.gen(value)?.put(&JvmType::java_object(), &mut self.v)?;
            self.v.invokestatic(
                INTRINSICS_CLASS,
                "stringPlus",
                "(Ljava/lang/String;Ljava/lang/Object;)Ljava/lang/String;",
            );
            place.store(&string, &mut self.v)?;
            return Ok(StackValue::None);
        }
        let numeric = ty.unboxed().unwrap_or_else(|| ty.clone());
        let operand = if numeric.is_int_like() { JvmType::Int } else { numeric.clone() };
        place.put(&operand, &mut self.v)?;
        self.gen(value)?.put(&operand, &mut self.v)?;
        self.v.arith(arith_opcode(op)?, &operand);
        self.v.cast(&operand, &numeric);
        place.store(&numeric, &mut self.v)?;
        Ok(StackValue::None)
    }

    // calls

    fn gen_call(&mut self, call: &Call, location: &SourceLocation) -> Result<StackValue> {
        let bindings = Rc::clone(&self.bindings);
        let function = bindings.function(call.callee)?;
        let uses_defaults = call.arguments.iter().any(|a| matches!(a, ResolvedArgument::Default));
        let mut callable = self.state.type_mapper.map_to_callable_method(call.callee, call.super_call)?;
        let private = function.visibility == Visibility::Private;
        let container = function.container;
        let nested_private = private && matches!(bindings.get(container)?, Descriptor::Class(_)) && self.needs_accessor(container);

        if function.kind == FunctionKind::Constructor {
            let class_type = JvmType::object(callable.owner.clone());
            if nested_private {
                if uses_defaults {
                    return Err(Error::unsupported("default arguments of a private constructor from a nested class", location));
                }
                let accessor = self.request_accessor(&callable.owner, call.callee)?;
                let accessor = accessor.callable(&callable);
                generate_arguments(self, &call.arguments, &callable.signature.value_parameters)?;
                accessor.invoke(&mut self.v);
                return Ok(StackValue::on_stack(class_type));
            }
            self.v.anew(&callable.owner);
            self.v.dup_value(&class_type);
            self.gen_arguments_and_invoke(&callable, &call.arguments)?;
            return Ok(StackValue::on_stack(class_type));
        }

        if function.receiver.is_some() && !matches!(bindings.get(container)?, Descriptor::Namespace(_)) {
            return Err(Error::unsupported(format!("member extension function {}", function.name), location));
        }
        if callable.signature.this_parameter.is_some() {
            self.push_implicit_receiver(container, location)?;
        }
        if let Some(receiver_type) = callable.signature.receiver_parameter.clone() {
            match &call.receiver {
                Some(receiver) => self.gen(receiver)?.put(&receiver_type, &mut self.v)?,
                None => self.gen_this(None, location)?.put(&receiver_type, &mut self.v)?,
            }
        } else if callable.needs_this {
            let owner_type = JvmType::object(callable.owner.clone());
            match &call.receiver {
                Some(receiver) if !call.super_call => self.gen(receiver)?.put(&owner_type, &mut self.v)?,
                _ => self.push_implicit_receiver(container, location)?,
            }
        }
        if nested_private && !uses_defaults {
            let accessor = self.request_accessor(&callable.owner, call.callee)?;
            callable = accessor.callable(&callable);
        }
        self.gen_arguments_and_invoke(&callable, &call.arguments)?;
        Ok(StackValue::on_stack(callable.return_type().clone()))
    }

    /// Pushes the arguments and calls either the method or its `$default` overload
    pub(super) fn gen_arguments_and_invoke(&mut self, callable: &CallableMethod, arguments: &[ResolvedArgument]) -> Result<()> {
        let parameter_types = callable.value_parameter_types().to_vec();
        let mask = generate_arguments(self, arguments, &parameter_types)?;
        if mask != 0 {
            if !callable.has_default_overload {
                return Err(Error::internal(format!("default arguments passed to {} which declares none", callable)));
            }
            self.v.iconst(mask as i32);
            callable.invoke_default(&mut self.v);
        } else {
            callable.invoke(&mut self.v);
        }
        Ok(())
    }

    /// `this.<init>` of the superclass, explicit or implicit
    pub fn gen_super_constructor_call(&mut self, this_type: &JvmType, call: Option<&Call>, super_name: &str) -> Result<()> {
        self.v.load(0, this_type);
        match call {
            Some(call) => {
                let callable = self.state.type_mapper.map_to_callable_method(call.callee, true)?;
                self.gen_arguments_and_invoke(&callable, &call.arguments)
            }
            None => {
                self.v.invokespecial(super_name, CONSTRUCTOR_METHOD_NAME, "()V");
                Ok(())
            }
        }
    }

    /// Evaluates `value` into a field of `owner`, of `this` unless static
    pub fn gen_field_initializer(&mut self, owner: &str, name: &str, ty: &JvmType, is_static: bool, value: &Expr) -> Result<()> {
        self.mark_line(&value.location);
        if !is_static {
            self.v.load(0, &JvmType::object(owner));
        }
        self.gen(value)?.put(ty, &mut self.v)?;
        StackValue::field(ty.clone(), owner, name, is_static).store(ty, &mut self.v)
    }

    /// Calls a function-typed value through `jet/FunctionN.invoke`
    fn gen_invoke(&mut self, callee: &Expr, arguments: &[Expr]) -> Result<StackValue> {
        let function_class = format!("{}{}", FUNCTION_CLASS_PREFIX, arguments.len());
        self.gen(callee)?.put(&JvmType::object(function_class.clone()), &mut self.v)?;
        let object = JvmType::java_object();
        for argument in arguments {
            self.gen(argument)?.put(&object, &mut self.v)?;
        }
        let erased = MethodType::new(vec![object.clone(); arguments.len()], object.clone());
        self.v.invokeinterface(&function_class, INVOKE_METHOD_NAME, &erased.descriptor());
        Ok(StackValue::on_stack(object))
    }
}

impl ArgumentGenerator for ExpressionCodegen<'_> {
    fn generate_expression(&mut self, _index: usize, expr: &Expr, ty: &JvmType) -> Result<()> {
        self.gen(expr)?.put(ty, &mut self.v)
    }

    fn generate_default(&mut self, _index: usize, ty: &JvmType) -> Result<()> {
        self.v.zero(ty);
        Ok(())
    }

    fn generate_vararg(&mut self, index: usize, elements: &[Expr], ty: &JvmType) -> Result<()> {
        let element = ty
            .element_type()
            .cloned()
            .ok_or_else(|| Error::internal(format!("vararg parameter {} has non-array type {}", index, ty)))?;
        self.v.iconst(elements.len() as i32);
        self.v.newarray(&element);
        for (position, expr) in elements.iter().enumerate() {
            self.v.op(DUP);
            self.v.iconst(position as i32);
            self.gen(expr)?.put(&element, &mut self.v)?;
            self.v.array_store(&element);
        }
        Ok(())
    }
}

fn stmts_then(codegen: &mut ExpressionCodegen<'_>, stmts: &[Stmt]) -> Result<()> {
    for stmt in stmts {
        codegen.gen_stmt(stmt)?;
    }
    Ok(())
}

fn flatten_concat<'e>(expr: &'e Expr, parts: &mut Vec<&'e Expr>) {
    match &expr.kind {
        ExprKind::Binary { op: BinaryOp::Add, left, right } if matches!(expr.ty, SemanticType::String { .. }) => {
            flatten_concat(left, parts);
            parts.push(right);
        }
        _ => parts.push(expr),
    }
}

/// Parameter type of the `StringBuilder.append` overload taking `ty`
fn append_type(ty: &JvmType) -> JvmType {
    match ty {
        JvmType::Byte | JvmType::Short | JvmType::Int => JvmType::Int,
        JvmType::Boolean | JvmType::Char | JvmType::Long | JvmType::Float | JvmType::Double => ty.clone(),
        JvmType::Object(name) if name == STRING_CLASS => ty.clone(),
        _ => JvmType::java_object(),
    }
}

/// Binary numeric promotion
fn promote(left: &JvmType, right: &JvmType) -> JvmType {
    for wide in [JvmType::Double, JvmType::Float, JvmType::Long] {
        if *left == wide || *right == wide {
            return wide;
        }
    }
    JvmType::Int
}

fn arith_opcode(op: BinaryOp) -> Result<u8> {
    match op {
        BinaryOp::Add => Ok(IADD),
        BinaryOp::Sub => Ok(ISUB),
        BinaryOp::Mul => Ok(IMUL),
        BinaryOp::Div => Ok(IDIV),
        BinaryOp::Rem => Ok(IREM),
        other => Err(Error::internal(format!("{:?} is not an arithmetic operator", other))),
    }
}

fn push_one(ty: &JvmType, v: &mut InstructionAdapter) {
    match ty {
        JvmType::Long => v.lconst(1),
        JvmType::Float => v.fconst(1.0),
        JvmType::Double => v.dconst(1.0),
        _ => v.iconst(1),
    }
}
