//! Bytecode chunk containing instructions, constants and line information.

use crate::bytecode::instruction::{
    decode_long_index, encode_long_index, OpCode, LONG_CONSTANT_LIMIT, SHORT_CONSTANT_MAX,
};
use crate::bytecode::value::Value;

/// Capacity of the first code allocation.
const MIN_CODE_CAPACITY: usize = 8;

/// A run of consecutive code bytes emitted for the same source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRun {
    pub line: u32,
    pub count: usize,
}

/// A chunk of bytecode containing instructions and metadata.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The bytecode instructions.
    pub code: Vec<u8>,
    /// The constant pool. Not deduplicated.
    pub constants: Vec<Value>,
    /// Run-length encoded line table; counts sum to `code.len()`.
    lines: Vec<LineRun>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw byte to the chunk.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        if self.code.len() == self.code.capacity() {
            let capacity = if self.code.capacity() < MIN_CODE_CAPACITY {
                MIN_CODE_CAPACITY
            } else {
                self.code.capacity() * 2
            };
            self.code.reserve_exact(capacity - self.code.len());
        }
        self.code.push(byte);

        match self.lines.last_mut() {
            Some(run) if run.line == line => run.count += 1,
            _ => self.lines.push(LineRun { line, count: 1 }),
        }
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write_byte(op.into(), line);
    }

    /// Add a constant to the pool and return its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Add a constant and emit the instruction that loads it, picking the
    /// short form for indices that fit in a byte.
    ///
    /// Returns `None` without touching the chunk once the pool is full.
    pub fn write_constant(&mut self, value: Value, line: u32) -> Option<usize> {
        if self.constants.len() >= LONG_CONSTANT_LIMIT {
            return None;
        }

        let index = self.add_constant(value);
        if index <= SHORT_CONSTANT_MAX {
            self.write_op(OpCode::Constant, line);
            self.write_byte(index as u8, line);
        } else {
            self.write_op(OpCode::ConstantLong, line);
            for byte in encode_long_index(index) {
                self.write_byte(byte, line);
            }
        }
        Some(index)
    }

    /// Read the 24-bit operand starting at `offset`.
    pub fn read_long_index(&self, offset: usize) -> Option<usize> {
        let bytes = self.code.get(offset..offset + 3)?;
        Some(decode_long_index([bytes[0], bytes[1], bytes[2]]))
    }

    /// Source line of the byte at `offset`.
    pub fn line_for_offset(&self, offset: usize) -> Option<u32> {
        let mut remaining = offset;
        for run in &self.lines {
            if remaining < run.count {
                return Some(run.line);
            }
            remaining -= run.count;
        }
        None
    }

    pub fn line_runs(&self) -> &[LineRun] {
        &self.lines
    }

    /// Get the current offset in the code.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_table_roundtrip() {
        let lines = [1, 1, 1, 2, 2, 7, 3, 3, 1, 1, 1, 1, 9];
        let mut chunk = Chunk::new();
        for (i, line) in lines.iter().enumerate() {
            chunk.write_byte(i as u8, *line);
        }

        for (offset, line) in lines.iter().enumerate() {
            assert_eq!(chunk.line_for_offset(offset), Some(*line));
        }
        assert_eq!(chunk.line_for_offset(lines.len()), None);

        let total: usize = chunk.line_runs().iter().map(|r| r.count).sum();
        assert_eq!(total, chunk.code.len());
    }

    #[test]
    fn test_repeated_lines_fold_into_one_run() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 4);
        chunk.write_op(OpCode::Not, 4);
        chunk.write_op(OpCode::Return, 5);
        chunk.write_op(OpCode::Return, 4);

        assert_eq!(
            chunk.line_runs(),
            &[
                LineRun { line: 4, count: 2 },
                LineRun { line: 5, count: 1 },
                LineRun { line: 4, count: 1 },
            ]
        );
    }

    #[test]
    fn test_constants_are_not_deduplicated() {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.add_constant(Value::Number(1.0)), 0);
        assert_eq!(chunk.add_constant(Value::Number(1.0)), 1);
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn test_short_and_long_constant_forms() {
        let mut chunk = Chunk::new();
        for i in 0..=SHORT_CONSTANT_MAX {
            chunk.write_constant(Value::Number(i as f64), 1);
        }
        assert_eq!(chunk.code.len(), 2 * 256);
        assert_eq!(chunk.code[2 * 255], OpCode::Constant as u8);
        assert_eq!(chunk.code[2 * 255 + 1], 255);

        let offset = chunk.current_offset();
        assert_eq!(chunk.write_constant(Value::Number(256.0), 2), Some(256));
        assert_eq!(chunk.code[offset], OpCode::ConstantLong as u8);
        assert_eq!(&chunk.code[offset + 1..], &[0x00, 0x01, 0x00]);
        assert_eq!(chunk.read_long_index(offset + 1), Some(256));
        assert_eq!(chunk.line_for_offset(offset + 3), Some(2));
    }

    #[test]
    fn test_read_long_index_out_of_range() {
        let mut chunk = Chunk::new();
        chunk.write_byte(1, 1);
        chunk.write_byte(2, 1);
        assert_eq!(chunk.read_long_index(0), None);
    }

    #[test]
    fn test_code_grows_from_minimum_capacity() {
        let mut chunk = Chunk::new();
        chunk.write_byte(0, 1);
        assert!(chunk.code.capacity() >= MIN_CODE_CAPACITY);
        for _ in 0..100 {
            chunk.write_byte(0, 1);
        }
        assert_eq!(chunk.len(), 101);
        assert_eq!(chunk.line_runs().len(), 1);
    }
}
