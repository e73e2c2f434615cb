//! Lexer module: an on-demand scanner over borrowed source text.

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};
