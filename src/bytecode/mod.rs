//! Bytecode module for the Lox expression VM.
//!
//! Source text is compiled in a single pass straight into a chunk of bytecode,
//! which a stack-based virtual machine then executes.
//!
//! # Architecture
//!
//! - `instruction`: OpCode definitions for the bytecode instruction set
//! - `value`: Runtime values
//! - `object`: Heap objects, the object registry and string interning
//! - `table`: Open-addressing hash table backing the intern set
//! - `chunk`: Bytecode chunks with a constant pool and run-length line table
//! - `precedence`: Binding powers and parse rules
//! - `compiler`: Pratt parser emitting bytecode as it goes
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Debug output for bytecode inspection

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod object;
pub mod precedence;
pub mod table;
pub mod value;
pub mod vm;

pub use chunk::{Chunk, LineRun};
pub use compiler::{compile, Compiler};
pub use disassembler::{disassemble_chunk, disassemble_instruction};
pub use instruction::OpCode;
pub use object::{hash_string, Heap, Obj, ObjRef, ObjString, ObjType, ObjectRegistry};
pub use table::{StringKey, Table};
pub use value::Value;
pub use vm::{VMResult, Vm};
