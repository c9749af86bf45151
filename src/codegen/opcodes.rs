//! JVM instruction opcodes emitted by the backend
//!
//! Only the instructions the generators produce are listed. Typed families
//! (`ILOAD`..`ALOAD`, `IADD`..`DADD`, ...) are laid out so that adding the
//! per-type offset from [`crate::codegen::jvm_type::JvmType::opcode`] to the
//! `I` variant selects the right instruction.

use once_cell::sync::Lazy;
use std::collections::HashMap;

macro_rules! opcodes {
    ($($name:ident = $value:expr),* $(,)?) => {
        $(pub const $name: u8 = $value;)*

        static NAMES: Lazy<HashMap<u8, &'static str>> = Lazy::new(|| {
            let mut names = HashMap::new();
            $(names.insert($value, stringify!($name));)*
            names
        });
    };
}

opcodes! {
    NOP = 0x00,
    ACONST_NULL = 0x01,
    ICONST_M1 = 0x02,
    ICONST_0 = 0x03,
    ICONST_1 = 0x04,
    ICONST_2 = 0x05,
    ICONST_3 = 0x06,
    ICONST_4 = 0x07,
    ICONST_5 = 0x08,
    LCONST_0 = 0x09,
    LCONST_1 = 0x0a,
    FCONST_0 = 0x0b,
    FCONST_1 = 0x0c,
    FCONST_2 = 0x0d,
    DCONST_0 = 0x0e,
    DCONST_1 = 0x0f,
    BIPUSH = 0x10,
    SIPUSH = 0x11,
    LDC = 0x12,
    LDC_W = 0x13,
    LDC2_W = 0x14,
    ILOAD = 0x15,
    LLOAD = 0x16,
    FLOAD = 0x17,
    DLOAD = 0x18,
    ALOAD = 0x19,
    IALOAD = 0x2e,
    LALOAD = 0x2f,
    FALOAD = 0x30,
    DALOAD = 0x31,
    AALOAD = 0x32,
    BALOAD = 0x33,
    CALOAD = 0x34,
    SALOAD = 0x35,
    ISTORE = 0x36,
    LSTORE = 0x37,
    FSTORE = 0x38,
    DSTORE = 0x39,
    ASTORE = 0x3a,
    IASTORE = 0x4f,
    LASTORE = 0x50,
    FASTORE = 0x51,
    DASTORE = 0x52,
    AASTORE = 0x53,
    BASTORE = 0x54,
    CASTORE = 0x55,
    SASTORE = 0x56,
    POP = 0x57,
    POP2 = 0x58,
    DUP = 0x59,
    DUP_X1 = 0x5a,
    DUP_X2 = 0x5b,
    DUP2 = 0x5c,
    DUP2_X1 = 0x5d,
    DUP2_X2 = 0x5e,
    SWAP = 0x5f,
    IADD = 0x60,
    ISUB = 0x64,
    IMUL = 0x68,
    IDIV = 0x6c,
    IREM = 0x70,
    INEG = 0x74,
    IAND = 0x7e,
    IXOR = 0x82,
    IINC = 0x84,
    I2L = 0x85,
    I2F = 0x86,
    I2D = 0x87,
    L2I = 0x88,
    L2F = 0x89,
    L2D = 0x8a,
    F2I = 0x8b,
    F2L = 0x8c,
    F2D = 0x8d,
    D2I = 0x8e,
    D2L = 0x8f,
    D2F = 0x90,
    I2B = 0x91,
    I2C = 0x92,
    I2S = 0x93,
    LCMP = 0x94,
    FCMPL = 0x95,
    FCMPG = 0x96,
    DCMPL = 0x97,
    DCMPG = 0x98,
    IFEQ = 0x99,
    IFNE = 0x9a,
    IFLT = 0x9b,
    IFGE = 0x9c,
    IFGT = 0x9d,
    IFLE = 0x9e,
    IF_ICMPEQ = 0x9f,
    IF_ICMPNE = 0xa0,
    IF_ICMPLT = 0xa1,
    IF_ICMPGE = 0xa2,
    IF_ICMPGT = 0xa3,
    IF_ICMPLE = 0xa4,
    IF_ACMPEQ = 0xa5,
    IF_ACMPNE = 0xa6,
    GOTO = 0xa7,
    IRETURN = 0xac,
    LRETURN = 0xad,
    FRETURN = 0xae,
    DRETURN = 0xaf,
    ARETURN = 0xb0,
    RETURN = 0xb1,
    GETSTATIC = 0xb2,
    PUTSTATIC = 0xb3,
    GETFIELD = 0xb4,
    PUTFIELD = 0xb5,
    INVOKEVIRTUAL = 0xb6,
    INVOKESPECIAL = 0xb7,
    INVOKESTATIC = 0xb8,
    INVOKEINTERFACE = 0xb9,
    NEW = 0xbb,
    NEWARRAY = 0xbc,
    ANEWARRAY = 0xbd,
    ARRAYLENGTH = 0xbe,
    ATHROW = 0xbf,
    CHECKCAST = 0xc0,
    INSTANCEOF = 0xc1,
    WIDE = 0xc4,
    IFNULL = 0xc6,
    IFNONNULL = 0xc7,
}

/// `NEWARRAY` operand codes for primitive element types
pub mod array_types {
    pub const T_BOOLEAN: u8 = 4;
    pub const T_CHAR: u8 = 5;
    pub const T_FLOAT: u8 = 6;
    pub const T_DOUBLE: u8 = 7;
    pub const T_BYTE: u8 = 8;
    pub const T_SHORT: u8 = 9;
    pub const T_INT: u8 = 10;
    pub const T_LONG: u8 = 11;
}

/// Mnemonic of an opcode, lowercase as disassemblers print it
pub fn opcode_name(opcode: u8) -> String {
    NAMES
        .get(&opcode)
        .map(|name| name.to_ascii_lowercase())
        .unwrap_or_else(|| format!("op_{:#04x}", opcode))
}

/// Branch opcode testing the opposite condition
pub fn negate_jump(opcode: u8) -> u8 {
    match opcode {
        IFNULL => IFNONNULL,
        IFNONNULL => IFNULL,
        // IFEQ..IF_ACMPNE come in complementary pairs
        op if (IFEQ..=IF_ACMPNE).contains(&op) => ((op + 1) ^ 1) - 1,
        op => op,
    }
}
