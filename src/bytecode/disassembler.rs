//! Bytecode disassembler for debugging.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::object::Heap;

/// Disassemble a chunk into a human-readable listing, one instruction per line.
pub fn disassemble_chunk(chunk: &Chunk, name: &str, heap: &Heap) -> String {
    let mut output = format!("== {} ==\n", name);

    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(chunk, offset, heap);
        output.push_str(&line);
        output.push('\n');
        offset = next;
    }

    output
}

/// Disassemble a single instruction, returning its text and the offset of the
/// next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, heap: &Heap) -> (String, usize) {
    let mut output = format!("{:04} ", offset);

    // Line number, or | if same as previous
    let line = chunk.line_for_offset(offset);
    if offset > 0 && line == chunk.line_for_offset(offset - 1) {
        output.push_str("   | ");
    } else {
        match line {
            Some(line) => output.push_str(&format!("{:4} ", line)),
            None => output.push_str("   ? "),
        }
    }

    let Some(&byte) = chunk.code.get(offset) else {
        output.push_str("<end of chunk>");
        return (output, offset + 1);
    };
    let Some(opcode) = OpCode::from_u8(byte) else {
        output.push_str(&format!("Unknown opcode {}", byte));
        return (output, offset + 1);
    };

    let next = match opcode {
        OpCode::Constant => {
            let index = chunk.code.get(offset + 1).map(|b| *b as usize);
            output.push_str(&constant_instruction(opcode, chunk, index, heap));
            offset + 2
        }
        OpCode::ConstantLong => {
            let index = chunk.read_long_index(offset + 1);
            output.push_str(&constant_instruction(opcode, chunk, index, heap));
            offset + 4
        }
        _ => {
            output.push_str(opcode.name());
            offset + 1
        }
    };

    (output, next)
}

fn constant_instruction(op: OpCode, chunk: &Chunk, index: Option<usize>, heap: &Heap) -> String {
    let Some(index) = index else {
        return format!("{:<16} <truncated>", op.name());
    };
    let value = match chunk.constants.get(index) {
        Some(value) => heap.format_value(*value),
        None => "<invalid>".to_string(),
    };
    format!("{:<16} {:4} '{}'", op.name(), index, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::compile;
    use crate::bytecode::value::Value;
    use pretty_assertions::assert_eq;

    fn disassemble_source(source: &str) -> String {
        let mut heap = Heap::new();
        let chunk = compile(source, &mut heap).expect("compiles");
        disassemble_chunk(&chunk, "test", &heap)
    }

    #[test]
    fn test_disassemble_simple() {
        let output = disassemble_source("1 + 2");
        assert_eq!(
            output,
            "== test ==\n\
             0000    1 OP_CONSTANT         0 '1'\n\
             0002    | OP_CONSTANT         1 '2'\n\
             0004    | OP_ADD\n\
             0005    | OP_RETURN\n"
        );
    }

    #[test]
    fn test_line_shown_once_per_run() {
        let output = disassemble_source("-\n\"s\"");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[1], "0000    2 OP_CONSTANT         0 's'");
        assert_eq!(lines[2], "0002    | OP_NEGATE");
    }

    #[test]
    fn test_long_constant() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        for i in 0..256 {
            chunk.add_constant(Value::Number(i as f64));
        }
        chunk.write_constant(Value::Number(1.5), 3);

        let (text, next) = disassemble_instruction(&chunk, 0, &heap);
        assert_eq!(text, "0000    3 OP_CONSTANT_LONG  256 '1.5'");
        assert_eq!(next, 4);
    }

    #[test]
    fn test_unknown_opcode() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.write_byte(99, 1);
        chunk.write_op(OpCode::Nil, 2);

        let output = disassemble_chunk(&chunk, "bad", &heap);
        assert_eq!(output, "== bad ==\n0000    1 Unknown opcode 99\n0001    2 OP_NIL\n");
    }
}
