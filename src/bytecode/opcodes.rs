//! JVM opcode table
//!
//! Every instruction defined by the class-file format, with its byte value,
//! its `javap` mnemonic and the number of operand bytes that follow it.
//! Variable-length instructions (`tableswitch`, `lookupswitch`) and the
//! `wide` prefix report zero operand bytes; the listing reader rejects them.

use std::fmt;

macro_rules! opcodes {
    ($($variant:ident = $byte:literal, $mnemonic:literal, $operands:literal;)*) => {
        /// JVM opcode enumeration
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant = $byte,)*
        }

        impl Opcode {
            /// Every opcode in byte order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Decode an opcode byte
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// `javap` mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)*
                }
            }

            /// Number of operand bytes following the opcode byte
            pub fn operand_len(self) -> usize {
                match self {
                    $(Opcode::$variant => $operands,)*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "nop", 0;
    AconstNull = 0x01, "aconst_null", 0;
    IconstM1 = 0x02, "iconst_m1", 0;
    Iconst0 = 0x03, "iconst_0", 0;
    Iconst1 = 0x04, "iconst_1", 0;
    Iconst2 = 0x05, "iconst_2", 0;
    Iconst3 = 0x06, "iconst_3", 0;
    Iconst4 = 0x07, "iconst_4", 0;
    Iconst5 = 0x08, "iconst_5", 0;
    Lconst0 = 0x09, "lconst_0", 0;
    Lconst1 = 0x0A, "lconst_1", 0;
    Fconst0 = 0x0B, "fconst_0", 0;
    Fconst1 = 0x0C, "fconst_1", 0;
    Fconst2 = 0x0D, "fconst_2", 0;
    Dconst0 = 0x0E, "dconst_0", 0;
    Dconst1 = 0x0F, "dconst_1", 0;
    Bipush = 0x10, "bipush", 1;
    Sipush = 0x11, "sipush", 2;
    Ldc = 0x12, "ldc", 1;
    LdcW = 0x13, "ldc_w", 2;
    Ldc2W = 0x14, "ldc2_w", 2;
    Iload = 0x15, "iload", 1;
    Lload = 0x16, "lload", 1;
    Fload = 0x17, "fload", 1;
    Dload = 0x18, "dload", 1;
    Aload = 0x19, "aload", 1;
    Iload0 = 0x1A, "iload_0", 0;
    Iload1 = 0x1B, "iload_1", 0;
    Iload2 = 0x1C, "iload_2", 0;
    Iload3 = 0x1D, "iload_3", 0;
    Lload0 = 0x1E, "lload_0", 0;
    Lload1 = 0x1F, "lload_1", 0;
    Lload2 = 0x20, "lload_2", 0;
    Lload3 = 0x21, "lload_3", 0;
    Fload0 = 0x22, "fload_0", 0;
    Fload1 = 0x23, "fload_1", 0;
    Fload2 = 0x24, "fload_2", 0;
    Fload3 = 0x25, "fload_3", 0;
    Dload0 = 0x26, "dload_0", 0;
    Dload1 = 0x27, "dload_1", 0;
    Dload2 = 0x28, "dload_2", 0;
    Dload3 = 0x29, "dload_3", 0;
    Aload0 = 0x2A, "aload_0", 0;
    Aload1 = 0x2B, "aload_1", 0;
    Aload2 = 0x2C, "aload_2", 0;
    Aload3 = 0x2D, "aload_3", 0;
    Iaload = 0x2E, "iaload", 0;
    Laload = 0x2F, "laload", 0;
    Faload = 0x30, "faload", 0;
    Daload = 0x31, "daload", 0;
    Aaload = 0x32, "aaload", 0;
    Baload = 0x33, "baload", 0;
    Caload = 0x34, "caload", 0;
    Saload = 0x35, "saload", 0;
    Istore = 0x36, "istore", 1;
    Lstore = 0x37, "lstore", 1;
    Fstore = 0x38, "fstore", 1;
    Dstore = 0x39, "dstore", 1;
    Astore = 0x3A, "astore", 1;
    Istore0 = 0x3B, "istore_0", 0;
    Istore1 = 0x3C, "istore_1", 0;
    Istore2 = 0x3D, "istore_2", 0;
    Istore3 = 0x3E, "istore_3", 0;
    Lstore0 = 0x3F, "lstore_0", 0;
    Lstore1 = 0x40, "lstore_1", 0;
    Lstore2 = 0x41, "lstore_2", 0;
    Lstore3 = 0x42, "lstore_3", 0;
    Fstore0 = 0x43, "fstore_0", 0;
    Fstore1 = 0x44, "fstore_1", 0;
    Fstore2 = 0x45, "fstore_2", 0;
    Fstore3 = 0x46, "fstore_3", 0;
    Dstore0 = 0x47, "dstore_0", 0;
    Dstore1 = 0x48, "dstore_1", 0;
    Dstore2 = 0x49, "dstore_2", 0;
    Dstore3 = 0x4A, "dstore_3", 0;
    Astore0 = 0x4B, "astore_0", 0;
    Astore1 = 0x4C, "astore_1", 0;
    Astore2 = 0x4D, "astore_2", 0;
    Astore3 = 0x4E, "astore_3", 0;
    Iastore = 0x4F, "iastore", 0;
    Lastore = 0x50, "lastore", 0;
    Fastore = 0x51, "fastore", 0;
    Dastore = 0x52, "dastore", 0;
    Aastore = 0x53, "aastore", 0;
    Bastore = 0x54, "bastore", 0;
    Castore = 0x55, "castore", 0;
    Sastore = 0x56, "sastore", 0;
    Pop = 0x57, "pop", 0;
    Pop2 = 0x58, "pop2", 0;
    Dup = 0x59, "dup", 0;
    DupX1 = 0x5A, "dup_x1", 0;
    DupX2 = 0x5B, "dup_x2", 0;
    Dup2 = 0x5C, "dup2", 0;
    Dup2X1 = 0x5D, "dup2_x1", 0;
    Dup2X2 = 0x5E, "dup2_x2", 0;
    Swap = 0x5F, "swap", 0;
    Iadd = 0x60, "iadd", 0;
    Ladd = 0x61, "ladd", 0;
    Fadd = 0x62, "fadd", 0;
    Dadd = 0x63, "dadd", 0;
    Isub = 0x64, "isub", 0;
    Lsub = 0x65, "lsub", 0;
    Fsub = 0x66, "fsub", 0;
    Dsub = 0x67, "dsub", 0;
    Imul = 0x68, "imul", 0;
    Lmul = 0x69, "lmul", 0;
    Fmul = 0x6A, "fmul", 0;
    Dmul = 0x6B, "dmul", 0;
    Idiv = 0x6C, "idiv", 0;
    Ldiv = 0x6D, "ldiv", 0;
    Fdiv = 0x6E, "fdiv", 0;
    Ddiv = 0x6F, "ddiv", 0;
    Irem = 0x70, "irem", 0;
    Lrem = 0x71, "lrem", 0;
    Frem = 0x72, "frem", 0;
    Drem = 0x73, "drem", 0;
    Ineg = 0x74, "ineg", 0;
    Lneg = 0x75, "lneg", 0;
    Fneg = 0x76, "fneg", 0;
    Dneg = 0x77, "dneg", 0;
    Ishl = 0x78, "ishl", 0;
    Lshl = 0x79, "lshl", 0;
    Ishr = 0x7A, "ishr", 0;
    Lshr = 0x7B, "lshr", 0;
    Iushr = 0x7C, "iushr", 0;
    Lushr = 0x7D, "lushr", 0;
    Iand = 0x7E, "iand", 0;
    Land = 0x7F, "land", 0;
    Ior = 0x80, "ior", 0;
    Lor = 0x81, "lor", 0;
    Ixor = 0x82, "ixor", 0;
    Lxor = 0x83, "lxor", 0;
    Iinc = 0x84, "iinc", 2;
    I2l = 0x85, "i2l", 0;
    I2f = 0x86, "i2f", 0;
    I2d = 0x87, "i2d", 0;
    L2i = 0x88, "l2i", 0;
    L2f = 0x89, "l2f", 0;
    L2d = 0x8A, "l2d", 0;
    F2i = 0x8B, "f2i", 0;
    F2l = 0x8C, "f2l", 0;
    F2d = 0x8D, "f2d", 0;
    D2i = 0x8E, "d2i", 0;
    D2l = 0x8F, "d2l", 0;
    D2f = 0x90, "d2f", 0;
    I2b = 0x91, "i2b", 0;
    I2c = 0x92, "i2c", 0;
    I2s = 0x93, "i2s", 0;
    Lcmp = 0x94, "lcmp", 0;
    Fcmpl = 0x95, "fcmpl", 0;
    Fcmpg = 0x96, "fcmpg", 0;
    Dcmpl = 0x97, "dcmpl", 0;
    Dcmpg = 0x98, "dcmpg", 0;
    Ifeq = 0x99, "ifeq", 2;
    Ifne = 0x9A, "ifne", 2;
    Iflt = 0x9B, "iflt", 2;
    Ifge = 0x9C, "ifge", 2;
    Ifgt = 0x9D, "ifgt", 2;
    Ifle = 0x9E, "ifle", 2;
    IfIcmpeq = 0x9F, "if_icmpeq", 2;
    IfIcmpne = 0xA0, "if_icmpne", 2;
    IfIcmplt = 0xA1, "if_icmplt", 2;
    IfIcmpge = 0xA2, "if_icmpge", 2;
    IfIcmpgt = 0xA3, "if_icmpgt", 2;
    IfIcmple = 0xA4, "if_icmple", 2;
    IfAcmpeq = 0xA5, "if_acmpeq", 2;
    IfAcmpne = 0xA6, "if_acmpne", 2;
    Goto = 0xA7, "goto", 2;
    Jsr = 0xA8, "jsr", 2;
    Ret = 0xA9, "ret", 1;
    Tableswitch = 0xAA, "tableswitch", 0;
    Lookupswitch = 0xAB, "lookupswitch", 0;
    Ireturn = 0xAC, "ireturn", 0;
    Lreturn = 0xAD, "lreturn", 0;
    Freturn = 0xAE, "freturn", 0;
    Dreturn = 0xAF, "dreturn", 0;
    Areturn = 0xB0, "areturn", 0;
    Return = 0xB1, "return", 0;
    Getstatic = 0xB2, "getstatic", 2;
    Putstatic = 0xB3, "putstatic", 2;
    Getfield = 0xB4, "getfield", 2;
    Putfield = 0xB5, "putfield", 2;
    Invokevirtual = 0xB6, "invokevirtual", 2;
    Invokespecial = 0xB7, "invokespecial", 2;
    Invokestatic = 0xB8, "invokestatic", 2;
    Invokeinterface = 0xB9, "invokeinterface", 4;
    Invokedynamic = 0xBA, "invokedynamic", 4;
    New = 0xBB, "new", 2;
    Newarray = 0xBC, "newarray", 1;
    Anewarray = 0xBD, "anewarray", 2;
    Arraylength = 0xBE, "arraylength", 0;
    Athrow = 0xBF, "athrow", 0;
    Checkcast = 0xC0, "checkcast", 2;
    Instanceof = 0xC1, "instanceof", 2;
    Monitorenter = 0xC2, "monitorenter", 0;
    Monitorexit = 0xC3, "monitorexit", 0;
    Wide = 0xC4, "wide", 0;
    Multianewarray = 0xC5, "multianewarray", 3;
    Ifnull = 0xC6, "ifnull", 2;
    Ifnonnull = 0xC7, "ifnonnull", 2;
    GotoW = 0xC8, "goto_w", 4;
    JsrW = 0xC9, "jsr_w", 4;
}

impl Opcode {
    /// Get the byte value of this opcode
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Look up an opcode by its mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == mnemonic)
    }

    /// Whether the operand is a constant pool index
    pub fn references_pool(self) -> bool {
        matches!(
            self,
            Opcode::Ldc
                | Opcode::LdcW
                | Opcode::Ldc2W
                | Opcode::Getstatic
                | Opcode::Putstatic
                | Opcode::Getfield
                | Opcode::Putfield
                | Opcode::Invokevirtual
                | Opcode::Invokespecial
                | Opcode::Invokestatic
                | Opcode::Invokeinterface
                | Opcode::Invokedynamic
                | Opcode::New
                | Opcode::Anewarray
                | Opcode::Checkcast
                | Opcode::Instanceof
                | Opcode::Multianewarray
        )
    }

    /// Opcodes the listing reader cannot represent (variable length,
    /// subroutines, or the `wide` prefix which is implied by operands)
    pub fn is_unrepresentable(self) -> bool {
        matches!(
            self,
            Opcode::Tableswitch
                | Opcode::Lookupswitch
                | Opcode::Jsr
                | Opcode::JsrW
                | Opcode::Ret
                | Opcode::Wide
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
