//! Deferred descriptions of where an expression's value lives
//!
//! A [`StackValue`] is an access path: whatever receiver it needs (object for a
//! field, array and index for an element) has already been pushed when the
//! value is handed out. The path itself can then be read (`put`), branched on
//! (`cond_jump`) or written (`store`), as often as the caller needs, without
//! re-evaluating the receiver. Read-modify-write sequences duplicate the
//! receiver first with `dup_receiver`.

use crate::ast::{BinaryOp, Constant};
use crate::common::error::{Error, Result};

use super::callable::InvokeKind;
use super::defs::{OBJECT_CLASS, SHARED_VALUE_FIELD};
use super::insn::{InstructionAdapter, Label};
use super::jvm_type::JvmType;
use super::opcodes::*;

/// A method used to read or write a property
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorMethod {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub invoke_kind: InvokeKind,
}

impl AccessorMethod {
    fn invoke(&self, v: &mut InstructionAdapter) {
        v.invoke(self.invoke_kind, &self.owner, &self.name, &self.descriptor);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    /// Statement result; reads as `Unit`
    None,
    /// Already computed and sitting on the stack
    OnStack { ty: JvmType },
    Local { index: u16, ty: JvmType },
    Constant { value: Constant, ty: JvmType },
    /// Comparison whose two operands are on the stack
    Compare { op: BinaryOp, operand: JvmType },
    /// Null test of the reference on the stack
    IsNull { negated: bool },
    Not(Box<StackValue>),
    /// Array and index on the stack
    ArrayElement { ty: JvmType },
    /// `declared` is the field's own type, `ty` the value type seen by callers
    Field { ty: JvmType, declared: JvmType, owner: String, name: String, is_static: bool },
    Property {
        ty: JvmType,
        getter: Option<AccessorMethod>,
        setter: Option<AccessorMethod>,
        owner: String,
        name: String,
        is_static: bool,
    },
    /// Local slot holding a shared cell
    Shared { index: u16, cell: JvmType, ty: JvmType },
    /// Shared cell stored in a field of the object on the stack
    FieldForShared { owner: String, name: String, cell: JvmType, ty: JvmType },
    /// `++i` on an int local
    PreIncrement { index: u16, delta: i16 },
}

impl StackValue {
    pub fn on_stack(ty: JvmType) -> Self {
        StackValue::OnStack { ty }
    }

    pub fn local(index: u16, ty: JvmType) -> Self {
        StackValue::Local { index, ty }
    }

    pub fn field(ty: JvmType, owner: impl Into<String>, name: impl Into<String>, is_static: bool) -> Self {
        StackValue::Field { declared: ty.clone(), ty, owner: owner.into(), name: name.into(), is_static }
    }

    pub fn constant(value: Constant, ty: JvmType) -> Self {
        StackValue::Constant { value, ty }
    }

    pub fn ty(&self) -> JvmType {
        match self {
            StackValue::None => JvmType::Void,
            StackValue::OnStack { ty }
            | StackValue::Local { ty, .. }
            | StackValue::Constant { ty, .. }
            | StackValue::ArrayElement { ty }
            | StackValue::Field { ty, .. }
            | StackValue::Property { ty, .. }
            | StackValue::Shared { ty, .. }
            | StackValue::FieldForShared { ty, .. } => ty.clone(),
            StackValue::Compare { .. } | StackValue::IsNull { .. } | StackValue::Not(_) => JvmType::Boolean,
            StackValue::PreIncrement { .. } => JvmType::Int,
        }
    }

    /// Whether `cond_jump` branches directly instead of testing a materialized boolean.
    ///
    /// Anything else still works as a condition through the generic fallback.
    pub fn is_branch_fusable(&self) -> bool {
        match self {
            StackValue::Compare { .. } | StackValue::IsNull { .. } => true,
            StackValue::Constant { value: Constant::Boolean(_), .. } => true,
            StackValue::Not(inner) => inner.is_branch_fusable(),
            _ => false,
        }
    }

    /// Pushes the value coerced to `target`
    pub fn put(&self, target: &JvmType, v: &mut InstructionAdapter) -> Result<()> {
        match self {
            StackValue::None => coerce(&JvmType::Void, target, v),
            StackValue::OnStack { ty } => coerce(ty, target, v),
            StackValue::Local { index, ty } => {
                v.load(*index, ty);
                coerce(ty, target, v)
            }
            StackValue::Constant { value, ty } => {
                let natural = push_constant(value, ty, v);
                coerce(&natural, target, v)
            }
            StackValue::Compare { .. } | StackValue::IsNull { .. } => {
                self.materialize(v)?;
                coerce(&JvmType::Boolean, target, v)
            }
            StackValue::Not(inner) => {
                if inner.is_branch_fusable() {
                    self.materialize(v)?;
                } else {
                    inner.put(&JvmType::Boolean, v)?;
                    v.iconst(1);
                    v.op(IXOR);
                }
                coerce(&JvmType::Boolean, target, v)
            }
            StackValue::ArrayElement { ty } => {
                v.array_load(ty);
                coerce(ty, target, v)
            }
            StackValue::Field { ty, declared, owner, name, is_static } => {
                if *is_static {
                    v.getstatic(owner, name, &declared.descriptor());
                } else {
                    v.getfield(owner, name, &declared.descriptor());
                }
                coerce(declared, ty, v)?;
                coerce(ty, target, v)
            }
            StackValue::Property { ty, getter, owner, name, is_static, .. } => {
                match getter {
                    Some(getter) => getter.invoke(v),
                    None if *is_static => v.getstatic(owner, name, &ty.descriptor()),
                    None => v.getfield(owner, name, &ty.descriptor()),
                }
                coerce(ty, target, v)
            }
            StackValue::Shared { index, cell, ty } => {
                v.load(*index, cell);
                read_cell(cell, ty, v)?;
                coerce(ty, target, v)
            }
            StackValue::FieldForShared { owner, name, cell, ty } => {
                v.getfield(owner, name, &cell.descriptor());
                read_cell(cell, ty, v)?;
                coerce(ty, target, v)
            }
            StackValue::PreIncrement { index, delta } => {
                v.iinc(*index, *delta);
                v.load(*index, &JvmType::Int);
                coerce(&JvmType::Int, target, v)
            }
        }
    }

    /// Assigns the value of type `top` on the stack (above any receiver)
    pub fn store(&self, top: &JvmType, v: &mut InstructionAdapter) -> Result<()> {
        match self {
            StackValue::Local { index, ty } => {
                coerce(top, ty, v)?;
                v.store(*index, ty);
                Ok(())
            }
            StackValue::ArrayElement { ty } => {
                coerce(top, ty, v)?;
                v.array_store(ty);
                Ok(())
            }
            StackValue::Field { ty, declared, owner, name, is_static } => {
                coerce(top, ty, v)?;
                coerce(ty, declared, v)?;
                if *is_static {
                    v.putstatic(owner, name, &declared.descriptor());
                } else {
                    v.putfield(owner, name, &declared.descriptor());
                }
                Ok(())
            }
            StackValue::Property { ty, setter, owner, name, is_static, .. } => {
                coerce(top, ty, v)?;
                match setter {
                    Some(setter) => setter.invoke(v),
                    None if *is_static => v.putstatic(owner, name, &ty.descriptor()),
                    None => v.putfield(owner, name, &ty.descriptor()),
                }
                Ok(())
            }
            StackValue::Shared { index, cell, ty } => {
                coerce(top, ty, v)?;
                v.load(*index, cell);
                swap(v, cell, ty);
                write_cell(cell, ty, v);
                Ok(())
            }
            StackValue::FieldForShared { owner, name, cell, ty } => {
                coerce(top, ty, v)?;
                // holder below the value: bring it up, read the cell, put the value back on top
                if ty.size() == 2 {
                    v.op(DUP2_X1);
                    v.op(POP2);
                } else {
                    v.swap();
                }
                v.getfield(owner, name, &cell.descriptor());
                swap(v, cell, ty);
                write_cell(cell, ty, v);
                Ok(())
            }
            other => Err(Error::internal(format!("cannot store into {:?}", other))),
        }
    }

    /// Branches to `label` when the value is false (`jump_if_false`) or true
    pub fn cond_jump(&self, label: Label, jump_if_false: bool, v: &mut InstructionAdapter) -> Result<()> {
        match self {
            StackValue::Constant { value: Constant::Boolean(value), .. } => {
                if *value != jump_if_false {
                    v.goto_(label);
                }
                Ok(())
            }
            StackValue::Compare { op, operand } => {
                let opcode = compare_jump(*op, operand, v)?;
                v.jump(if jump_if_false { negate_jump(opcode) } else { opcode }, label);
                Ok(())
            }
            StackValue::IsNull { negated } => {
                let opcode = if *negated { IFNONNULL } else { IFNULL };
                v.jump(if jump_if_false { negate_jump(opcode) } else { opcode }, label);
                Ok(())
            }
            StackValue::Not(inner) => inner.cond_jump(label, !jump_if_false, v),
            other => {
                other.put(&JvmType::Boolean, v)?;
                v.jump(if jump_if_false { IFEQ } else { IFNE }, label);
                Ok(())
            }
        }
    }

    /// Stack slots taken by the receiver of this access path
    pub fn receiver_size(&self) -> u16 {
        match self {
            StackValue::Field { is_static: false, .. }
            | StackValue::Property { is_static: false, .. }
            | StackValue::FieldForShared { .. } => 1,
            StackValue::ArrayElement { .. } => 2,
            _ => 0,
        }
    }

    /// Duplicates the receiver so the path can be both read and written
    pub fn dup_receiver(&self, v: &mut InstructionAdapter) {
        match self.receiver_size() {
            1 => v.op(DUP),
            2 => v.op(DUP2),
            _ => {}
        }
    }

    fn materialize(&self, v: &mut InstructionAdapter) -> Result<()> {
        let when_false = v.new_label();
        let end = v.new_label();
        self.cond_jump(when_false, true, v)?;
        v.iconst(1);
        v.goto_(end);
        v.mark(when_false);
        v.iconst(0);
        v.mark(end);
        Ok(())
    }
}

fn push_constant(value: &Constant, ty: &JvmType, v: &mut InstructionAdapter) -> JvmType {
    match value {
        Constant::Null => {
            v.aconst_null();
            ty.clone()
        }
        Constant::Boolean(b) => {
            v.iconst(*b as i32);
            JvmType::Boolean
        }
        Constant::Char(c) => {
            v.iconst(*c as i32);
            JvmType::Char
        }
        Constant::Int(i) => {
            v.iconst(*i);
            JvmType::Int
        }
        Constant::Long(l) => {
            v.lconst(*l);
            JvmType::Long
        }
        Constant::Float(f) => {
            v.fconst(*f);
            JvmType::Float
        }
        Constant::Double(d) => {
            v.dconst(*d);
            JvmType::Double
        }
        Constant::String(s) => {
            v.aconst(s);
            JvmType::object(super::defs::STRING_CLASS)
        }
    }
}

/// Emits the comparison prologue and returns the branch-if-true opcode
fn compare_jump(op: BinaryOp, operand: &JvmType, v: &mut InstructionAdapter) -> Result<u8> {
    if operand.is_reference() {
        return match op {
            BinaryOp::Identity | BinaryOp::Eq => Ok(IF_ACMPEQ),
            BinaryOp::NotIdentity | BinaryOp::NotEq => Ok(IF_ACMPNE),
            other => Err(Error::internal(format!("{:?} is not a reference comparison", other))),
        };
    }
    let int_compare = operand.is_int_like();
    if !int_compare {
        // NaN must make <, <= false and >, >= false alike
        let nan_greater = matches!(op, BinaryOp::Lt | BinaryOp::Le);
        v.compare(operand, nan_greater);
    }
    let opcode = match op {
        BinaryOp::Eq | BinaryOp::Identity => IFEQ,
        BinaryOp::NotEq | BinaryOp::NotIdentity => IFNE,
        BinaryOp::Lt => IFLT,
        BinaryOp::Le => IFLE,
        BinaryOp::Gt => IFGT,
        BinaryOp::Ge => IFGE,
        other => return Err(Error::internal(format!("{:?} is not a comparison", other))),
    };
    // IF_ICMPxx sits at a fixed distance from IFxx
    Ok(if int_compare { opcode + (IF_ICMPEQ - IFEQ) } else { opcode })
}

fn read_cell(cell: &JvmType, ty: &JvmType, v: &mut InstructionAdapter) -> Result<()> {
    let stored = ref_type(ty);
    v.getfield(&cell.internal_name(), SHARED_VALUE_FIELD, &stored.descriptor());
    coerce(&stored, ty, v)
}

fn write_cell(cell: &JvmType, ty: &JvmType, v: &mut InstructionAdapter) {
    let stored = ref_type(ty);
    v.putfield(&cell.internal_name(), SHARED_VALUE_FIELD, &stored.descriptor());
}

fn ref_type(ty: &JvmType) -> JvmType {
    if ty.is_primitive() {
        ty.clone()
    } else {
        JvmType::java_object()
    }
}

/// Swaps a one-slot `top` with the `below` value under it
fn swap(v: &mut InstructionAdapter, top: &JvmType, below: &JvmType) {
    if below.size() == 2 {
        debug_assert_eq!(top.size(), 1);
        v.op(DUP_X2);
        v.op(POP);
    } else {
        v.swap();
    }
}

/// Converts the value on the stack from one type to another:
/// numeric widening/narrowing, boxing, unboxing and reference casts
pub fn coerce(from: &JvmType, to: &JvmType, v: &mut InstructionAdapter) -> Result<()> {
    if from == to {
        return Ok(());
    }
    match (from, to) {
        (_, JvmType::Void) => v.pop_value(from),
        (JvmType::Void, to) if to.is_reference() => {
            v.getstatic("jet/Tuple0", "VALUE", "Ljet/Tuple0;");
        }
        (JvmType::Void, to) => v.zero(to),
        (from, to) if from.is_primitive() && to.is_primitive() => {
            if !(from.is_int_like() && *to == JvmType::Boolean || *from == JvmType::Boolean && to.is_int_like()) {
                v.cast(from, to);
            }
        }
        (from, to) if from.is_primitive() => {
            let boxed = from.boxed();
            v.invokestatic(
                &boxed.internal_name(),
                "valueOf",
                &format!("({}){}", from.descriptor(), boxed.descriptor()),
            );
            if *to != boxed && to.internal_name() != OBJECT_CLASS && to.internal_name() != "java/lang/Number" {
                v.checkcast(to);
            }
        }
        (from, to) if to.is_primitive() => match from.unboxed() {
            Some(primitive) => {
                let method = format!("{}Value", primitive.primitive_name());
                v.invokevirtual(&from.internal_name(), &method, &format!("(){}", primitive.descriptor()));
                coerce(&primitive, to, v)?;
            }
            None => {
                let wrapper = match to {
                    JvmType::Boolean => JvmType::object("java/lang/Boolean"),
                    JvmType::Char => JvmType::object("java/lang/Character"),
                    _ => JvmType::object("java/lang/Number"),
                };
                v.checkcast(&wrapper);
                let method = format!("{}Value", to.primitive_name());
                v.invokevirtual(&wrapper.internal_name(), &method, &format!("(){}", to.descriptor()));
            }
        },
        (_, to) => {
            if to.internal_name() != OBJECT_CLASS {
                v.checkcast(to);
            }
        }
    }
    Ok(())
}
