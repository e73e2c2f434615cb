//! loxvm: a single-pass bytecode compiler and stack VM for Lox expressions.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! - **Scanner**: hands out tokens on demand, borrowing from the source
//! - **Compiler**: Pratt parser that writes bytecode straight into a chunk
//! - **VM**: fetch-decode-execute loop over the chunk

pub mod bytecode;
pub mod config;
pub mod error;
pub mod lexer;
pub mod repl;

use std::path::Path;

pub use bytecode::{Chunk, Heap, OpCode, Value, Vm};
pub use config::VmConfig;
pub use error::{CompileError, InterpretError, LoxError, RuntimeError};

/// Evaluate an expression and render its value.
pub fn run(source: &str) -> Result<String, InterpretError> {
    run_with_config(source, VmConfig::default())
}

/// Evaluate an expression on a fresh VM built from `config`.
pub fn run_with_config(source: &str, config: VmConfig) -> Result<String, InterpretError> {
    let mut vm = Vm::with_config(config);
    let value = vm.interpret(source)?;
    Ok(vm.format_value(value))
}

/// Evaluate the expression stored in a file.
pub fn run_file(path: &Path, config: VmConfig) -> Result<String, LoxError> {
    let source = std::fs::read_to_string(path)?;
    log::debug!("read {} bytes from {}", source.len(), path.display());
    Ok(run_with_config(&source, config)?)
}

/// Compile an expression and return its disassembly listing.
pub fn disassemble(source: &str) -> Result<String, CompileError> {
    let mut heap = Heap::new();
    let chunk = bytecode::compile(source, &mut heap)?;
    Ok(bytecode::disassemble_chunk(&chunk, "code", &heap))
}
