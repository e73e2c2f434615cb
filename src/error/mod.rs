//! Error types for compilation and execution.

use std::fmt;

use thiserror::Error;

/// Where in the source a syntax error was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At the end-of-input token.
    AtEnd,
    /// At a token, carrying its lexeme.
    At(String),
    /// The scanner rejected the lexeme; the message already describes it.
    Lexical,
}

/// A single compile-time diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub location: ErrorLocation,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, location: ErrorLocation, message: impl Into<String>) -> Self {
        Self {
            line,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::At(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::Lexical => Ok(()),
        }
    }
}

/// Bytecode compilation failure: every diagnostic reported for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub errors: Vec<SyntaxError>,
}

impl CompileError {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }

    /// The first diagnostic, which is the one that triggered panic mode.
    pub fn first(&self) -> Option<&SyntaxError> {
        self.errors.first()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Runtime errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("{message}\n[line {line}] in script")]
    TypeError { message: String, line: u32 },

    #[error("Stack underflow\n[line {line}] in script")]
    StackUnderflow { line: u32 },

    #[error("Invalid constant index {index}\n[line {line}] in script")]
    InvalidConstant { index: usize, line: u32 },

    #[error("Unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("Chunk ended without a return at offset {offset}")]
    UnexpectedEnd { offset: usize },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>, line: u32) -> Self {
        Self::TypeError {
            message: message.into(),
            line,
        }
    }

    /// Source line the error was raised on, if it maps to one.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::TypeError { line, .. } => Some(*line),
            Self::StackUnderflow { line } => Some(*line),
            Self::InvalidConstant { line, .. } => Some(*line),
            Self::UnknownOpcode { .. } | Self::UnexpectedEnd { .. } => None,
        }
    }

    /// Whether this is an internal-consistency failure rather than a user error.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::UnknownOpcode { .. } | Self::UnexpectedEnd { .. } | Self::InvalidConstant { .. }
        )
    }
}

/// Outcome of a failed `interpret` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Process exit status for this outcome (sysexits.h).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => 65,
            Self::Runtime(_) => 70,
        }
    }
}

/// A unified error type for the command line.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoxError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interpret(e) => e.exit_code(),
            Self::Io(_) => 74,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let at = SyntaxError::new(3, ErrorLocation::At("+".to_string()), "Expect expression.");
        assert_eq!(at.to_string(), "[line 3] Error at '+': Expect expression.");

        let end = SyntaxError::new(1, ErrorLocation::AtEnd, "Expect expression.");
        assert_eq!(end.to_string(), "[line 1] Error at end: Expect expression.");

        let lexical = SyntaxError::new(2, ErrorLocation::Lexical, "Unexpected character.");
        assert_eq!(lexical.to_string(), "[line 2] Error: Unexpected character.");
    }

    #[test]
    fn test_compile_error_joins_lines() {
        let err = CompileError::new(vec![
            SyntaxError::new(1, ErrorLocation::Lexical, "Unexpected character."),
            SyntaxError::new(1, ErrorLocation::AtEnd, "Expect expression."),
        ]);
        assert_eq!(
            err.to_string(),
            "[line 1] Error: Unexpected character.\n[line 1] Error at end: Expect expression."
        );
    }

    #[test]
    fn test_runtime_error_display() {
        let err = RuntimeError::type_error("Operands must be numbers.", 4);
        assert_eq!(err.to_string(), "Operands must be numbers.\n[line 4] in script");
        assert_eq!(err.line(), Some(4));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_exit_codes() {
        let compile: InterpretError = CompileError::new(Vec::new()).into();
        let runtime: InterpretError = RuntimeError::StackUnderflow { line: 1 }.into();
        assert_eq!(compile.exit_code(), 65);
        assert_eq!(runtime.exit_code(), 70);

        let io: LoxError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(io.exit_code(), 74);
    }
}
