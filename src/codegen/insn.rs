//! Instruction recording
//!
//! Generators talk to an [`InstructionAdapter`], a typed emitter in the style of
//! ASM's `InstructionAdapter`. It records a flat [`Insn`] list that the output
//! layer later renders as text or encodes into a `Code` attribute.

use super::callable::InvokeKind;
use super::jvm_type::JvmType;
use super::opcodes::{self, *};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum LdcValue {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Type(JvmType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Instruction without operands
    Op(u8),
    /// `BIPUSH`, `SIPUSH`, `NEWARRAY`
    IntOp(u8, i32),
    Var(u8, u16),
    Iinc(u16, i16),
    /// `NEW`, `ANEWARRAY`, `CHECKCAST`, `INSTANCEOF`
    Type(u8, String),
    Field { opcode: u8, owner: String, name: String, descriptor: String },
    Method { opcode: u8, owner: String, name: String, descriptor: String, interface: bool },
    Jump(u8, Label),
    Ldc(LdcValue),
    Label(Label),
    Line(u32, Label),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: String,
    pub start: Label,
    pub end: Label,
    pub index: u16,
}

#[derive(Debug, Default, Clone)]
pub struct InstructionAdapter {
    insns: Vec<Insn>,
    locals: Vec<LocalVariable>,
    next_label: u32,
}

impl InstructionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    pub fn into_parts(self) -> (Vec<Insn>, Vec<LocalVariable>) {
        (self.insns, self.locals)
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn mark(&mut self, label: Label) {
        self.insns.push(Insn::Label(label));
    }

    /// Replays a previously recorded sequence
    pub fn append(&mut self, insns: &[Insn]) {
        self.insns.extend_from_slice(insns);
    }

    /// Puts label-free code ahead of everything emitted so far
    pub fn insert_front(&mut self, insns: Vec<Insn>) {
        self.insns.splice(0..0, insns);
    }

    pub fn line_number(&mut self, line: u32) {
        let label = self.new_label();
        self.mark(label);
        self.insns.push(Insn::Line(line, label));
    }

    pub fn local_variable(&mut self, name: &str, descriptor: &str, start: Label, end: Label, index: u16) {
        self.locals.push(LocalVariable {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            start,
            end,
            index,
        });
    }

    pub fn op(&mut self, opcode: u8) {
        self.insns.push(Insn::Op(opcode));
    }

    // constants

    pub fn iconst(&mut self, value: i32) {
        match value {
            -1..=5 => self.op((ICONST_0 as i32 + value) as u8),
            -128..=127 => self.insns.push(Insn::IntOp(BIPUSH, value)),
            -32768..=32767 => self.insns.push(Insn::IntOp(SIPUSH, value)),
            _ => self.insns.push(Insn::Ldc(LdcValue::Int(value))),
        }
    }

    pub fn lconst(&mut self, value: i64) {
        match value {
            0 => self.op(LCONST_0),
            1 => self.op(LCONST_1),
            _ => self.insns.push(Insn::Ldc(LdcValue::Long(value))),
        }
    }

    pub fn fconst(&mut self, value: f32) {
        if value == 0.0 && value.is_sign_positive() {
            self.op(FCONST_0);
        } else if value == 1.0 {
            self.op(FCONST_1);
        } else if value == 2.0 {
            self.op(FCONST_2);
        } else {
            self.insns.push(Insn::Ldc(LdcValue::Float(value)));
        }
    }

    pub fn dconst(&mut self, value: f64) {
        if value == 0.0 && value.is_sign_positive() {
            self.op(DCONST_0);
        } else if value == 1.0 {
            self.op(DCONST_1);
        } else {
            self.insns.push(Insn::Ldc(LdcValue::Double(value)));
        }
    }

    pub fn aconst(&mut self, value: &str) {
        self.insns.push(Insn::Ldc(LdcValue::String(value.to_string())));
    }

    pub fn aconst_null(&mut self) {
        self.op(ACONST_NULL);
    }

    /// Pushes the zero value of a type
    pub fn zero(&mut self, ty: &JvmType) {
        match ty {
            JvmType::Void => {}
            JvmType::Long => self.lconst(0),
            JvmType::Float => self.fconst(0.0),
            JvmType::Double => self.dconst(0.0),
            JvmType::Object(_) | JvmType::Array(_) => self.aconst_null(),
            _ => self.iconst(0),
        }
    }

    // locals

    pub fn load(&mut self, index: u16, ty: &JvmType) {
        self.insns.push(Insn::Var(ty.opcode(ILOAD), index));
    }

    pub fn store(&mut self, index: u16, ty: &JvmType) {
        self.insns.push(Insn::Var(ty.opcode(ISTORE), index));
    }

    pub fn iinc(&mut self, index: u16, delta: i16) {
        self.insns.push(Insn::Iinc(index, delta));
    }

    // arrays

    pub fn array_load(&mut self, element: &JvmType) {
        self.op(element.opcode(IALOAD));
    }

    pub fn array_store(&mut self, element: &JvmType) {
        self.op(element.opcode(IASTORE));
    }

    pub fn newarray(&mut self, element: &JvmType) {
        use opcodes::array_types::*;
        let code = match element {
            JvmType::Boolean => T_BOOLEAN,
            JvmType::Char => T_CHAR,
            JvmType::Byte => T_BYTE,
            JvmType::Short => T_SHORT,
            JvmType::Int => T_INT,
            JvmType::Float => T_FLOAT,
            JvmType::Long => T_LONG,
            JvmType::Double => T_DOUBLE,
            other => {
                self.insns.push(Insn::Type(ANEWARRAY, other.internal_name()));
                return;
            }
        };
        self.insns.push(Insn::IntOp(NEWARRAY, code as i32));
    }

    // stack

    pub fn pop_value(&mut self, ty: &JvmType) {
        match ty.size() {
            0 => {}
            2 => self.op(POP2),
            _ => self.op(POP),
        }
    }

    pub fn dup_value(&mut self, ty: &JvmType) {
        match ty.size() {
            0 => {}
            2 => self.op(DUP2),
            _ => self.op(DUP),
        }
    }

    /// Duplicates a value of `top` size under `below` slots of stack
    pub fn dup_under(&mut self, top: u16, below: u16) {
        match (top, below) {
            (0, _) => {}
            (1, 0) => self.op(DUP),
            (2, 0) => self.op(DUP2),
            (1, 1) => self.op(DUP_X1),
            (1, 2) => self.op(DUP_X2),
            (2, 1) => self.op(DUP2_X1),
            (2, 2) => self.op(DUP2_X2),
            // stack shapes deeper than two slots never occur for single receivers
            _ => self.op(DUP_X2),
        }
    }

    pub fn swap(&mut self) {
        self.op(SWAP);
    }

    // fields and methods

    fn field(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        self.insns.push(Insn::Field {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
    }

    pub fn getfield(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.field(GETFIELD, owner, name, descriptor);
    }

    pub fn putfield(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.field(PUTFIELD, owner, name, descriptor);
    }

    pub fn getstatic(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.field(GETSTATIC, owner, name, descriptor);
    }

    pub fn putstatic(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.field(PUTSTATIC, owner, name, descriptor);
    }

    fn method(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, interface: bool) {
        self.insns.push(Insn::Method {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        });
    }

    pub fn invokevirtual(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.method(INVOKEVIRTUAL, owner, name, descriptor, false);
    }

    pub fn invokespecial(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.method(INVOKESPECIAL, owner, name, descriptor, false);
    }

    pub fn invokestatic(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.method(INVOKESTATIC, owner, name, descriptor, false);
    }

    pub fn invokeinterface(&mut self, owner: &str, name: &str, descriptor: &str) {
        self.method(INVOKEINTERFACE, owner, name, descriptor, true);
    }

    pub fn invoke(&mut self, kind: InvokeKind, owner: &str, name: &str, descriptor: &str) {
        self.method(kind.opcode(), owner, name, descriptor, kind == InvokeKind::Interface);
    }

    // types

    pub fn anew(&mut self, internal_name: &str) {
        self.insns.push(Insn::Type(NEW, internal_name.to_string()));
    }

    pub fn checkcast(&mut self, ty: &JvmType) {
        self.insns.push(Insn::Type(CHECKCAST, ty.internal_name()));
    }

    pub fn instance_of(&mut self, ty: &JvmType) {
        self.insns.push(Insn::Type(INSTANCEOF, ty.internal_name()));
    }

    // arithmetic

    pub fn arith(&mut self, int_opcode: u8, ty: &JvmType) {
        self.op(ty.opcode(int_opcode));
    }

    pub fn neg(&mut self, ty: &JvmType) {
        self.op(ty.opcode(INEG));
    }

    /// Primitive conversion between two stack types
    pub fn cast(&mut self, from: &JvmType, to: &JvmType) {
        if from == to {
            return;
        }
        match (from, to) {
            (JvmType::Double, JvmType::Float) => self.op(D2F),
            (JvmType::Double, JvmType::Long) => self.op(D2L),
            (JvmType::Double, _) => {
                self.op(D2I);
                self.cast(&JvmType::Int, to);
            }
            (JvmType::Float, JvmType::Double) => self.op(F2D),
            (JvmType::Float, JvmType::Long) => self.op(F2L),
            (JvmType::Float, _) => {
                self.op(F2I);
                self.cast(&JvmType::Int, to);
            }
            (JvmType::Long, JvmType::Double) => self.op(L2D),
            (JvmType::Long, JvmType::Float) => self.op(L2F),
            (JvmType::Long, _) => {
                self.op(L2I);
                self.cast(&JvmType::Int, to);
            }
            (_, JvmType::Byte) => self.op(I2B),
            (_, JvmType::Char) => self.op(I2C),
            (_, JvmType::Short) => self.op(I2S),
            (_, JvmType::Double) => self.op(I2D),
            (_, JvmType::Float) => self.op(I2F),
            (_, JvmType::Long) => self.op(I2L),
            _ => {}
        }
    }

    // control flow

    pub fn jump(&mut self, opcode: u8, label: Label) {
        self.insns.push(Insn::Jump(opcode, label));
    }

    pub fn goto_(&mut self, label: Label) {
        self.jump(GOTO, label);
    }

    pub fn ifeq(&mut self, label: Label) {
        self.jump(IFEQ, label);
    }

    /// Pushes the comparison result of two wide or floating operands
    pub fn compare(&mut self, ty: &JvmType, nan_greater: bool) {
        match ty {
            JvmType::Long => self.op(LCMP),
            JvmType::Float => self.op(if nan_greater { FCMPG } else { FCMPL }),
            JvmType::Double => self.op(if nan_greater { DCMPG } else { DCMPL }),
            _ => {}
        }
    }

    pub fn areturn(&mut self, ty: &JvmType) {
        self.op(ty.opcode(IRETURN));
    }
}
