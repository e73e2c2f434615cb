//! Bytecode instruction definitions.

/// Largest constant index the short `Constant` form can address.
pub const SHORT_CONSTANT_MAX: usize = u8::MAX as usize;
/// Number of constants addressable through `ConstantLong` (24-bit index).
pub const LONG_CONSTANT_LIMIT: usize = 1 << 24;

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants ============
    /// Load a constant: CONSTANT <index:u8>
    Constant = 0,
    /// Load a constant: CONSTANT_LONG <index:u24 little-endian>
    ConstantLong,
    /// Push nil onto the stack
    Nil,
    /// Push true onto the stack
    True,
    /// Push false onto the stack
    False,

    // ============ Comparison ============
    /// Equal: a == b
    Equal,
    /// Greater than: a > b
    Greater,
    /// Less than: a < b
    Less,

    // ============ Arithmetic ============
    /// Add two numbers or concatenate two strings: a + b
    Add,
    /// Subtract two values: a - b
    Subtract,
    /// Multiply two values: a * b
    Multiply,
    /// Divide two values: a / b
    Divide,

    // ============ Unary ============
    /// Logical not: !a
    Not,
    /// Negate a value: -a
    Negate,

    // ============ Control Flow ============
    /// End the current chunk
    Return,
}

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantLong => 3,
            OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Not
            | OpCode::Negate
            | OpCode::Return => 0,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        let op = match byte {
            0 => OpCode::Constant,
            1 => OpCode::ConstantLong,
            2 => OpCode::Nil,
            3 => OpCode::True,
            4 => OpCode::False,
            5 => OpCode::Equal,
            6 => OpCode::Greater,
            7 => OpCode::Less,
            8 => OpCode::Add,
            9 => OpCode::Subtract,
            10 => OpCode::Multiply,
            11 => OpCode::Divide,
            12 => OpCode::Not,
            13 => OpCode::Negate,
            14 => OpCode::Return,
            _ => return None,
        };
        Some(op)
    }

    /// Listing name used by the disassembler.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::ConstantLong => "OP_CONSTANT_LONG",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Return => "OP_RETURN",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// Split a constant index into the three little-endian operand bytes of `ConstantLong`.
pub fn encode_long_index(index: usize) -> [u8; 3] {
    [
        (index & 0xff) as u8,
        ((index >> 8) & 0xff) as u8,
        ((index >> 16) & 0xff) as u8,
    ]
}

/// Reassemble a `ConstantLong` operand.
pub fn decode_long_index(bytes: [u8; 3]) -> usize {
    bytes[0] as usize | (bytes[1] as usize) << 8 | (bytes[2] as usize) << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::Return as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(OpCode::Return as u8 + 1).is_none());
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_long_index_boundaries() {
        for index in [0, 1, 255, 256, 0x1234, 0xff_ffff] {
            let bytes = encode_long_index(index);
            assert_eq!(decode_long_index(bytes), index);
        }
        assert_eq!(encode_long_index(0x0a0b0c), [0x0c, 0x0b, 0x0a]);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::ConstantLong.operand_size(), 3);
        assert_eq!(OpCode::Add.operand_size(), 0);
    }
}
