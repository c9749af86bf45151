//! Bytecode encoding of recorded instructions
//!
//! Encoding runs in two passes: the first sizes every instruction and places
//! labels, the second writes bytes with resolved branch offsets. `max_stack`
//! comes from a linear walk over the same instructions.

use std::collections::HashMap;

use crate::codegen::insn::{Insn, Label, LdcValue, LocalVariable};
use crate::codegen::jvm_type::{JvmType, MethodType};
use crate::codegen::opcodes::*;
use crate::common::error::{Error, Result};

use super::attribute::{
    AttributeInfo, CodeAttribute, LineNumberTableAttribute, LocalVariableEntry, LocalVariableTableAttribute,
};
use super::constpool::ConstantPool;

/// Pool index of an `ldc` operand
fn ldc_index(pool: &mut ConstantPool, value: &LdcValue) -> Result<u16> {
    match value {
        LdcValue::Int(v) => pool.add_integer(*v),
        LdcValue::Float(v) => pool.add_float(*v),
        LdcValue::Long(v) => pool.add_long(*v),
        LdcValue::Double(v) => pool.add_double(*v),
        LdcValue::String(v) => pool.add_string(v),
        LdcValue::Type(ty) => pool.add_class(&ty.internal_name()),
    }
}

fn is_wide_ldc(value: &LdcValue) -> bool {
    matches!(value, LdcValue::Long(_) | LdcValue::Double(_))
}

fn needs_wide_var(index: u16) -> bool {
    index > u8::MAX as u16
}

fn insn_size(insn: &Insn, pool: &mut ConstantPool) -> Result<u32> {
    Ok(match insn {
        Insn::Op(_) => 1,
        Insn::IntOp(SIPUSH, _) => 3,
        Insn::IntOp(_, _) => 2,
        Insn::Var(_, index) => {
            if needs_wide_var(*index) {
                4
            } else {
                2
            }
        }
        Insn::Iinc(index, delta) => {
            if needs_wide_var(*index) || *delta < i8::MIN as i16 || *delta > i8::MAX as i16 {
                6
            } else {
                3
            }
        }
        Insn::Type(..) | Insn::Field { .. } | Insn::Jump(..) => 3,
        Insn::Method { interface, .. } => {
            if *interface {
                5
            } else {
                3
            }
        }
        Insn::Ldc(value) => {
            let index = ldc_index(pool, value)?;
            if is_wide_ldc(value) || index > u8::MAX as u16 {
                3
            } else {
                2
            }
        }
        Insn::Label(_) | Insn::Line(..) => 0,
    })
}

/// Encodes a method body into a `Code` attribute
pub fn encode(
    insns: &[Insn],
    locals: &[LocalVariable],
    max_locals: u16,
    pool: &mut ConstantPool,
    debug_info: bool,
) -> Result<CodeAttribute> {
    let mut offsets: HashMap<Label, u32> = HashMap::new();
    let mut pc = 0u32;
    for insn in insns {
        if let Insn::Label(label) = insn {
            offsets.insert(*label, pc);
        }
        pc += insn_size(insn, pool)?;
    }
    if pc > u16::MAX as u32 {
        return Err(Error::internal(format!("method body of {} bytes exceeds the 65535 byte limit", pc)));
    }
    let offset_of = |label: &Label| -> Result<u32> {
        offsets
            .get(label)
            .copied()
            .ok_or_else(|| Error::internal(format!("label L{} is never placed", label.0)))
    };

    let mut code = Vec::with_capacity(pc as usize);
    let mut lines = LineNumberTableAttribute::default();
    for insn in insns {
        let at = code.len() as i32;
        match insn {
            Insn::Op(opcode) => code.push(*opcode),
            Insn::IntOp(SIPUSH, value) => {
                code.push(SIPUSH);
                code.extend_from_slice(&(*value as i16).to_be_bytes());
            }
            Insn::IntOp(opcode, value) => {
                code.push(*opcode);
                code.push(*value as u8);
            }
            Insn::Var(opcode, index) => {
                if needs_wide_var(*index) {
                    code.push(WIDE);
                    code.push(*opcode);
                    code.extend_from_slice(&index.to_be_bytes());
                } else {
                    code.push(*opcode);
                    code.push(*index as u8);
                }
            }
            Insn::Iinc(index, delta) => {
                if needs_wide_var(*index) || *delta < i8::MIN as i16 || *delta > i8::MAX as i16 {
                    code.push(WIDE);
                    code.push(IINC);
                    code.extend_from_slice(&index.to_be_bytes());
                    code.extend_from_slice(&delta.to_be_bytes());
                } else {
                    code.push(IINC);
                    code.push(*index as u8);
                    code.push(*delta as i8 as u8);
                }
            }
            Insn::Type(opcode, name) => {
                code.push(*opcode);
                code.extend_from_slice(&pool.add_class(name)?.to_be_bytes());
            }
            Insn::Field { opcode, owner, name, descriptor } => {
                code.push(*opcode);
                code.extend_from_slice(&pool.add_field_ref(owner, name, descriptor)?.to_be_bytes());
            }
            Insn::Method { opcode, owner, name, descriptor, interface } => {
                code.push(*opcode);
                if *interface {
                    code.extend_from_slice(&pool.add_interface_method_ref(owner, name, descriptor)?.to_be_bytes());
                    let method_type = MethodType::parse(descriptor)?;
                    code.push((method_type.arguments_size() + 1) as u8);
                    code.push(0);
                } else {
                    code.extend_from_slice(&pool.add_method_ref(owner, name, descriptor)?.to_be_bytes());
                }
            }
            Insn::Jump(opcode, label) => {
                let delta = offset_of(label)? as i32 - at;
                let delta = i16::try_from(delta)
                    .map_err(|_| Error::internal(format!("branch offset {} does not fit in 16 bits", delta)))?;
                code.push(*opcode);
                code.extend_from_slice(&delta.to_be_bytes());
            }
            Insn::Ldc(value) => {
                let index = ldc_index(pool, value)?;
                if is_wide_ldc(value) {
                    code.push(LDC2_W);
                    code.extend_from_slice(&index.to_be_bytes());
                } else if index > u8::MAX as u16 {
                    code.push(LDC_W);
                    code.extend_from_slice(&index.to_be_bytes());
                } else {
                    code.push(LDC);
                    code.push(index as u8);
                }
            }
            Insn::Label(_) => {}
            Insn::Line(line, label) => {
                lines.add_line_number(offset_of(label)? as u16, (*line).min(u16::MAX as u32) as u16);
            }
        }
    }

    let mut attributes = Vec::new();
    if debug_info {
        if !lines.entries.is_empty() {
            attributes.push(AttributeInfo::new(pool, "LineNumberTable", lines.to_bytes())?);
        }
        if !locals.is_empty() {
            let mut table = LocalVariableTableAttribute::default();
            for local in locals {
                let start = offset_of(&local.start)?;
                let end = offset_of(&local.end)?;
                table.entries.push(LocalVariableEntry {
                    start_pc: start as u16,
                    length: end.saturating_sub(start) as u16,
                    name_index: pool.add_utf8(&local.name)?,
                    descriptor_index: pool.add_utf8(&local.descriptor)?,
                    index: local.index,
                });
            }
            attributes.push(AttributeInfo::new(pool, "LocalVariableTable", table.to_bytes())?);
        }
    }

    Ok(CodeAttribute {
        max_stack: max_stack(insns)?,
        max_locals,
        code,
        attributes,
    })
}

/// Net operand stack change of one instruction, in slots
pub fn stack_effect(insn: &Insn) -> Result<i32> {
    Ok(match insn {
        Insn::Op(opcode) => op_effect(*opcode)?,
        Insn::IntOp(NEWARRAY, _) => 0,
        Insn::IntOp(..) => 1,
        Insn::Var(opcode, _) => match *opcode {
            LLOAD | DLOAD => 2,
            ILOAD | FLOAD | ALOAD => 1,
            LSTORE | DSTORE => -2,
            _ => -1,
        },
        Insn::Iinc(..) => 0,
        Insn::Type(NEW, _) => 1,
        Insn::Type(..) => 0,
        Insn::Field { opcode, descriptor, .. } => {
            let size = JvmType::from_descriptor(descriptor)?.size() as i32;
            match *opcode {
                GETSTATIC => size,
                PUTSTATIC => -size,
                GETFIELD => size - 1,
                _ => -size - 1,
            }
        }
        Insn::Method { opcode, descriptor, .. } => {
            let method_type = MethodType::parse(descriptor)?;
            let receiver = if *opcode == INVOKESTATIC { 0 } else { 1 };
            method_type.return_type.size() as i32 - method_type.arguments_size() as i32 - receiver
        }
        Insn::Jump(opcode, _) => match *opcode {
            GOTO => 0,
            IFEQ..=IFLE | IFNULL | IFNONNULL => -1,
            _ => -2,
        },
        Insn::Ldc(value) => {
            if is_wide_ldc(value) {
                2
            } else {
                1
            }
        }
        Insn::Label(_) | Insn::Line(..) => 0,
    })
}

fn op_effect(opcode: u8) -> Result<i32> {
    Ok(match opcode {
        NOP | SWAP | INEG..=0x77 | I2F | L2D | F2I | D2L | I2B | I2C | I2S | ARRAYLENGTH | RETURN => 0,
        ACONST_NULL | ICONST_M1..=0x08 | FCONST_0..=FCONST_2 => 1,
        LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 => 2,
        LALOAD | DALOAD => 0,
        IALOAD..=SALOAD => -1,
        LASTORE | DASTORE => -4,
        IASTORE..=SASTORE => -3,
        POP => -1,
        POP2 => -2,
        DUP | DUP_X1 | DUP_X2 => 1,
        DUP2 | DUP2_X1 | DUP2_X2 => 2,
        IADD..=0x73 => {
            if (opcode - IADD) % 2 == 1 {
                -2
            } else {
                -1
            }
        }
        IAND..=0x83 => {
            if (opcode - IAND) % 2 == 1 {
                -2
            } else {
                -1
            }
        }
        I2L | I2D | F2L | F2D => 1,
        L2I | L2F | D2I | D2F => -1,
        LCMP | DCMPL | DCMPG => -3,
        FCMPL | FCMPG => -1,
        LRETURN | DRETURN => -2,
        IRETURN | FRETURN | ARETURN | ATHROW => -1,
        other => {
            return Err(Error::internal(format!("no stack effect known for {}", opcode_name(other))));
        }
    })
}

fn ends_block(insn: &Insn) -> bool {
    match insn {
        Insn::Jump(GOTO, _) => true,
        Insn::Op(opcode) => matches!(*opcode, IRETURN..=RETURN | ATHROW),
        _ => false,
    }
}

/// Deepest operand stack reached by the instruction sequence.
///
/// Generated code is structured: every label is either reached by fallthrough
/// or targeted by a jump recorded earlier in the walk.
pub fn max_stack(insns: &[Insn]) -> Result<u16> {
    let mut depth_at: HashMap<Label, i32> = HashMap::new();
    let mut depth = 0i32;
    let mut reachable = true;
    let mut max = 0i32;
    for insn in insns {
        if let Insn::Label(label) = insn {
            if !reachable {
                depth = depth_at.get(label).copied().unwrap_or(0);
                reachable = true;
            } else {
                depth_at.entry(*label).or_insert(depth);
            }
            continue;
        }
        if !reachable {
            continue;
        }
        depth += stack_effect(insn)?;
        if depth < 0 {
            return Err(Error::internal(format!("operand stack underflow at {:?}", insn)));
        }
        max = max.max(depth);
        if let Insn::Jump(_, target) = insn {
            depth_at.entry(*target).or_insert(depth);
        }
        if ends_block(insn) {
            reachable = false;
        }
    }
    Ok(max as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::insn::InstructionAdapter;

    #[test]
    fn test_branches_resolve_to_label_offsets() {
        let mut v = InstructionAdapter::new();
        let end = v.new_label();
        v.load(1, &JvmType::Int);
        v.ifeq(end);
        v.iconst(1);
        v.op(POP);
        v.mark(end);
        v.op(RETURN);
        let mut pool = ConstantPool::new();
        let code = encode(v.insns(), &[], 2, &mut pool, false).unwrap();
        // iload_1 (2) ifeq (3) iconst_1 (1) pop (1) return
        assert_eq!(code.code, vec![ILOAD, 1, IFEQ, 0, 5, 0x04, POP, RETURN]);
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn test_max_stack_counts_wide_values() {
        let mut v = InstructionAdapter::new();
        v.lconst(1);
        v.lconst(0);
        v.op(LCMP);
        v.op(IRETURN);
        assert_eq!(max_stack(v.insns()).unwrap(), 4);
    }
}
