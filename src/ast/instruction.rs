//! Structured instruction tree
//!
//! Function bodies arrive already nested: a `block`, `loop` or `if` owns its
//! body, so the interpreter never scans for a matching `end`.

use super::types::{RefType, ValType};

/// Block signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValType),
    /// Index into the module's type section
    Type(u32),
}

/// Static operand of a load or store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArg {
    pub align: u32,
    pub offset: u64,
    pub memory: u32,
}

impl MemArg {
    pub fn offset(offset: u64) -> Self {
        MemArg {
            offset,
            ..MemArg::default()
        }
    }
}

/// Constant expression used by global initializers and segment offsets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128(u128),
    GlobalGet(u32),
    RefNull(RefType),
    RefFunc(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // control
    Unreachable,
    Nop,
    Block { ty: BlockType, body: Vec<Instruction> },
    Loop { ty: BlockType, body: Vec<Instruction> },
    If { ty: BlockType, then_body: Vec<Instruction>, else_body: Vec<Instruction> },
    Br(u32),
    BrIf(u32),
    BrTable { labels: Vec<u32>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_idx: u32, table_idx: u32 },

    // reference
    RefNull(RefType),
    RefIsNull,
    RefFunc(u32),

    // parametric
    Drop,
    Select,

    // variable
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    // table
    TableGet(u32),
    TableSet(u32),
    TableSize(u32),
    TableGrow(u32),

    // memory
    I32Load(MemArg),
    I64Load(MemArg),
    F32Load(MemArg),
    F64Load(MemArg),
    I32Load8S(MemArg),
    I32Load8U(MemArg),
    I32Load16S(MemArg),
    I32Load16U(MemArg),
    I64Load8S(MemArg),
    I64Load8U(MemArg),
    I64Load16S(MemArg),
    I64Load16U(MemArg),
    I64Load32S(MemArg),
    I64Load32U(MemArg),
    I32Store(MemArg),
    I64Store(MemArg),
    F32Store(MemArg),
    F64Store(MemArg),
    I32Store8(MemArg),
    I32Store16(MemArg),
    I64Store8(MemArg),
    I64Store16(MemArg),
    I64Store32(MemArg),
    MemorySize(u32),
    MemoryGrow(u32),

    // constants
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    // i32 tests and comparisons
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    // i64 tests and comparisons
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,

    // float comparisons
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    // i32 arithmetic
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // i64 arithmetic
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // float arithmetic
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // conversions
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F32DemoteF64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,
}

impl Instruction {
    /// Binary-format opcode, used to index cost tables
    ///
    /// `0xfc`-prefixed instructions encode as `0xfc00 | sub-opcode`.
    pub fn opcode(&self) -> u16 {
        use Instruction::*;
        match self {
            Unreachable => 0x00,
            Nop => 0x01,
            Block { .. } => 0x02,
            Loop { .. } => 0x03,
            If { .. } => 0x04,
            Br(_) => 0x0c,
            BrIf(_) => 0x0d,
            BrTable { .. } => 0x0e,
            Return => 0x0f,
            Call(_) => 0x10,
            CallIndirect { .. } => 0x11,
            Drop => 0x1a,
            Select => 0x1b,
            LocalGet(_) => 0x20,
            LocalSet(_) => 0x21,
            LocalTee(_) => 0x22,
            GlobalGet(_) => 0x23,
            GlobalSet(_) => 0x24,
            TableGet(_) => 0x25,
            TableSet(_) => 0x26,
            I32Load(_) => 0x28,
            I64Load(_) => 0x29,
            F32Load(_) => 0x2a,
            F64Load(_) => 0x2b,
            I32Load8S(_) => 0x2c,
            I32Load8U(_) => 0x2d,
            I32Load16S(_) => 0x2e,
            I32Load16U(_) => 0x2f,
            I64Load8S(_) => 0x30,
            I64Load8U(_) => 0x31,
            I64Load16S(_) => 0x32,
            I64Load16U(_) => 0x33,
            I64Load32S(_) => 0x34,
            I64Load32U(_) => 0x35,
            I32Store(_) => 0x36,
            I64Store(_) => 0x37,
            F32Store(_) => 0x38,
            F64Store(_) => 0x39,
            I32Store8(_) => 0x3a,
            I32Store16(_) => 0x3b,
            I64Store8(_) => 0x3c,
            I64Store16(_) => 0x3d,
            I64Store32(_) => 0x3e,
            MemorySize(_) => 0x3f,
            MemoryGrow(_) => 0x40,
            I32Const(_) => 0x41,
            I64Const(_) => 0x42,
            F32Const(_) => 0x43,
            F64Const(_) => 0x44,
            I32Eqz => 0x45,
            I32Eq => 0x46,
            I32Ne => 0x47,
            I32LtS => 0x48,
            I32LtU => 0x49,
            I32GtS => 0x4a,
            I32GtU => 0x4b,
            I32LeS => 0x4c,
            I32LeU => 0x4d,
            I32GeS => 0x4e,
            I32GeU => 0x4f,
            I64Eqz => 0x50,
            I64Eq => 0x51,
            I64Ne => 0x52,
            I64LtS => 0x53,
            I64LtU => 0x54,
            I64GtS => 0x55,
            I64GtU => 0x56,
            I64LeS => 0x57,
            I64LeU => 0x58,
            I64GeS => 0x59,
            I64GeU => 0x5a,
            F32Eq => 0x5b,
            F32Ne => 0x5c,
            F32Lt => 0x5d,
            F32Gt => 0x5e,
            F32Le => 0x5f,
            F32Ge => 0x60,
            F64Eq => 0x61,
            F64Ne => 0x62,
            F64Lt => 0x63,
            F64Gt => 0x64,
            F64Le => 0x65,
            F64Ge => 0x66,
            I32Clz => 0x67,
            I32Ctz => 0x68,
            I32Popcnt => 0x69,
            I32Add => 0x6a,
            I32Sub => 0x6b,
            I32Mul => 0x6c,
            I32DivS => 0x6d,
            I32DivU => 0x6e,
            I32RemS => 0x6f,
            I32RemU => 0x70,
            I32And => 0x71,
            I32Or => 0x72,
            I32Xor => 0x73,
            I32Shl => 0x74,
            I32ShrS => 0x75,
            I32ShrU => 0x76,
            I32Rotl => 0x77,
            I32Rotr => 0x78,
            I64Clz => 0x79,
            I64Ctz => 0x7a,
            I64Popcnt => 0x7b,
            I64Add => 0x7c,
            I64Sub => 0x7d,
            I64Mul => 0x7e,
            I64DivS => 0x7f,
            I64DivU => 0x80,
            I64RemS => 0x81,
            I64RemU => 0x82,
            I64And => 0x83,
            I64Or => 0x84,
            I64Xor => 0x85,
            I64Shl => 0x86,
            I64ShrS => 0x87,
            I64ShrU => 0x88,
            I64Rotl => 0x89,
            I64Rotr => 0x8a,
            F32Abs => 0x8b,
            F32Neg => 0x8c,
            F32Ceil => 0x8d,
            F32Floor => 0x8e,
            F32Trunc => 0x8f,
            F32Nearest => 0x90,
            F32Sqrt => 0x91,
            F32Add => 0x92,
            F32Sub => 0x93,
            F32Mul => 0x94,
            F32Div => 0x95,
            F32Min => 0x96,
            F32Max => 0x97,
            F32Copysign => 0x98,
            F64Abs => 0x99,
            F64Neg => 0x9a,
            F64Ceil => 0x9b,
            F64Floor => 0x9c,
            F64Trunc => 0x9d,
            F64Nearest => 0x9e,
            F64Sqrt => 0x9f,
            F64Add => 0xa0,
            F64Sub => 0xa1,
            F64Mul => 0xa2,
            F64Div => 0xa3,
            F64Min => 0xa4,
            F64Max => 0xa5,
            F64Copysign => 0xa6,
            I32WrapI64 => 0xa7,
            I32TruncF32S => 0xa8,
            I32TruncF32U => 0xa9,
            I32TruncF64S => 0xaa,
            I32TruncF64U => 0xab,
            I64ExtendI32S => 0xac,
            I64ExtendI32U => 0xad,
            I64TruncF32S => 0xae,
            I64TruncF32U => 0xaf,
            I64TruncF64S => 0xb0,
            I64TruncF64U => 0xb1,
            F32ConvertI32S => 0xb2,
            F32ConvertI32U => 0xb3,
            F32ConvertI64S => 0xb4,
            F32ConvertI64U => 0xb5,
            F64ConvertI32S => 0xb7,
            F64ConvertI32U => 0xb8,
            F64ConvertI64S => 0xb9,
            F64ConvertI64U => 0xba,
            F32DemoteF64 => 0xb6,
            F64PromoteF32 => 0xbb,
            I32ReinterpretF32 => 0xbc,
            I64ReinterpretF64 => 0xbd,
            F32ReinterpretI32 => 0xbe,
            F64ReinterpretI64 => 0xbf,
            I32Extend8S => 0xc0,
            I32Extend16S => 0xc1,
            I64Extend8S => 0xc2,
            I64Extend16S => 0xc3,
            I64Extend32S => 0xc4,
            RefNull(_) => 0xd0,
            RefIsNull => 0xd1,
            RefFunc(_) => 0xd2,
            TableGrow(_) => 0xfc0f,
            TableSize(_) => 0xfc10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_match_binary_format() {
        assert_eq!(Instruction::I32Add.opcode(), 0x6a);
        assert_eq!(Instruction::Call(3).opcode(), 0x10);
        assert_eq!(
            Instruction::Loop {
                ty: BlockType::Empty,
                body: vec![]
            }
            .opcode(),
            0x03
        );
        assert_eq!(Instruction::TableSize(0).opcode(), 0xfc10);
    }
}
