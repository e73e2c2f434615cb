//! Stack-based virtual machine for executing bytecode.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::compiler::compile;
use crate::bytecode::disassembler::{disassemble_chunk, disassemble_instruction};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::object::{Heap, ObjRef};
use crate::bytecode::value::Value;
use crate::config::VmConfig;
use crate::error::{InterpretError, RuntimeError};

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// The virtual machine: operand stack, instruction pointer and the heap that
/// owns every object and the string intern table.
///
/// Instances are independent; the heap lives as long as the VM, so strings
/// interned by one `interpret` call stay valid for the next.
pub struct Vm {
    config: VmConfig,
    stack: Vec<Value>,
    /// Offset of the next byte to read.
    ip: usize,
    /// Offset of the instruction currently executing, for error lines.
    op_offset: usize,
    heap: Heap,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            stack: Vec::with_capacity(config.stack_max),
            config,
            ip: 0,
            op_offset: 0,
            heap: Heap::new(),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Compile `source` against this VM's heap and run it.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        let chunk = compile(source, &mut self.heap)?;

        if self.config.print_code {
            log::debug!("{}", disassemble_chunk(&chunk, "code", &self.heap));
        }

        let value = self.run(&chunk)?;
        log::debug!(
            "interpreted {} bytes; {} objects, {} interned strings",
            chunk.code.len(),
            self.heap.objects().len(),
            self.heap.interned_count()
        );
        Ok(value)
    }

    /// Run a chunk from its first byte until `Return`.
    ///
    /// The stack is reset before running and again after a runtime error.
    pub fn run(&mut self, chunk: &Chunk) -> VMResult<Value> {
        self.stack.clear();
        self.ip = 0;
        self.op_offset = 0;

        let result = self.execute(chunk);
        if result.is_err() {
            self.stack.clear();
        }
        result
    }

    /// Render a value against this VM's heap.
    pub fn format_value(&self, value: Value) -> String {
        self.heap.format_value(value)
    }

    /// Main execution loop.
    fn execute(&mut self, chunk: &Chunk) -> VMResult<Value> {
        loop {
            self.op_offset = self.ip;
            if self.config.trace_execution {
                self.trace(chunk);
            }

            let byte = self.read_byte(chunk)?;
            let Some(opcode) = OpCode::from_u8(byte) else {
                return Err(RuntimeError::UnknownOpcode {
                    byte,
                    offset: self.op_offset,
                });
            };

            match opcode {
                OpCode::Constant => {
                    let index = self.read_byte(chunk)? as usize;
                    let value = self.read_constant(chunk, index)?;
                    self.push(value);
                }

                OpCode::ConstantLong => {
                    let index = chunk
                        .read_long_index(self.ip)
                        .ok_or(RuntimeError::UnexpectedEnd { offset: self.ip })?;
                    self.ip += 3;
                    let value = self.read_constant(chunk, index)?;
                    self.push(value);
                }

                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),

                OpCode::Equal => {
                    let b = self.pop(chunk)?;
                    let a = self.pop(chunk)?;
                    self.push(Value::Bool(a == b));
                }

                OpCode::Greater => self.comparison_op(chunk, |a, b| a > b)?,
                OpCode::Less => self.comparison_op(chunk, |a, b| a < b)?,

                OpCode::Add => {
                    let b = self.pop(chunk)?;
                    let a = self.pop(chunk)?;
                    let result = match (a, b) {
                        (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
                        (Value::Obj(x), Value::Obj(y)) => self.concatenate(chunk, x, y)?,
                        _ => {
                            return Err(self.type_error(
                                chunk,
                                "Operands must be two numbers or two strings.",
                            ))
                        }
                    };
                    self.push(result);
                }

                OpCode::Subtract => self.arithmetic_op(chunk, |a, b| a - b)?,
                OpCode::Multiply => self.arithmetic_op(chunk, |a, b| a * b)?,
                OpCode::Divide => self.arithmetic_op(chunk, |a, b| a / b)?,

                OpCode::Not => {
                    let value = self.pop(chunk)?;
                    self.push(Value::Bool(value.is_falsey()));
                }

                OpCode::Negate => {
                    let value = self.pop(chunk)?;
                    let Value::Number(n) = value else {
                        return Err(self.type_error(chunk, "Operand must be a number."));
                    };
                    self.push(Value::Number(-n));
                }

                OpCode::Return => {
                    return Ok(self.stack.pop().unwrap_or(Value::Nil));
                }
            }
        }
    }

    fn read_byte(&mut self, chunk: &Chunk) -> VMResult<u8> {
        let byte = *chunk
            .code
            .get(self.ip)
            .ok_or(RuntimeError::UnexpectedEnd { offset: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_constant(&self, chunk: &Chunk, index: usize) -> VMResult<Value> {
        chunk
            .constants
            .get(index)
            .copied()
            .ok_or_else(|| RuntimeError::InvalidConstant {
                index,
                line: self.current_line(chunk),
            })
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self, chunk: &Chunk) -> VMResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::StackUnderflow {
                line: self.current_line(chunk),
            })
    }

    fn pop_numbers(&mut self, chunk: &Chunk) -> VMResult<(f64, f64)> {
        let b = self.pop(chunk)?;
        let a = self.pop(chunk)?;
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok((x, y)),
            _ => Err(self.type_error(chunk, "Operands must be numbers.")),
        }
    }

    fn arithmetic_op<F>(&mut self, chunk: &Chunk, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let (a, b) = self.pop_numbers(chunk)?;
        self.push(Value::Number(op(a, b)));
        Ok(())
    }

    fn comparison_op<F>(&mut self, chunk: &Chunk, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> bool,
    {
        let (a, b) = self.pop_numbers(chunk)?;
        self.push(Value::Bool(op(a, b)));
        Ok(())
    }

    /// Join two strings and intern the result.
    fn concatenate(&mut self, chunk: &Chunk, a: ObjRef, b: ObjRef) -> VMResult<Value> {
        let (Some(left), Some(right)) = (self.heap.string(a), self.heap.string(b)) else {
            return Err(self.type_error(chunk, "Operands must be two numbers or two strings."));
        };

        let mut joined = String::with_capacity(left.len() + right.len());
        joined.push_str(left.as_str());
        joined.push_str(right.as_str());
        Ok(Value::Obj(self.heap.take_string(joined)))
    }

    fn current_line(&self, chunk: &Chunk) -> u32 {
        chunk.line_for_offset(self.op_offset).unwrap_or(0)
    }

    fn type_error(&self, chunk: &Chunk, message: &str) -> RuntimeError {
        let error = RuntimeError::type_error(message, self.current_line(chunk));
        log::debug!("runtime error at offset {}: {}", self.op_offset, message);
        error
    }

    fn trace(&self, chunk: &Chunk) {
        let stack: String = self
            .stack
            .iter()
            .map(|value| format!("[ {} ]", self.heap.format_value(*value)))
            .collect();
        let (instruction, _) = disassemble_instruction(chunk, self.op_offset, &self.heap);
        log::trace!("          {}", stack);
        log::trace!("{}", instruction);
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
