//! Bytecode compiler: parses source text and emits bytecode in a single pass.
//!
//! There is no syntax tree. A Pratt parser driven by [`get_rule`] consumes
//! tokens from the scanner and writes instructions straight into a [`Chunk`].
//! Every byte is tagged with the line of the token that produced it.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::object::Heap;
use crate::bytecode::precedence::{get_rule, InfixRule, Precedence, PrefixRule};
use crate::bytecode::value::Value;
use crate::error::{CompileError, ErrorLocation, SyntaxError};
use crate::lexer::{Scanner, Token, TokenKind};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compile one expression into a chunk ending in `Return`.
///
/// String literals are interned into `heap` as they are parsed, so the heap
/// must be the one the chunk will later run against.
pub fn compile(source: &str, heap: &mut Heap) -> CompileResult<Chunk> {
    let mut compiler = Compiler::new(source, heap);
    compiler.advance();
    compiler.expression();
    compiler.consume(TokenKind::Eof, "Expect end of expression.");
    compiler.finish()
}

/// The bytecode compiler.
pub struct Compiler<'src, 'heap> {
    scanner: Scanner<'src>,
    heap: &'heap mut Heap,
    chunk: Chunk,
    previous: Token<'src>,
    current: Token<'src>,
    /// Sticky; compilation fails if anything was ever reported.
    had_error: bool,
    /// Set after the first report and never cleared: the expression grammar
    /// has no statement boundary to resynchronize on.
    panic_mode: bool,
    errors: Vec<SyntaxError>,
}

impl<'src, 'heap> Compiler<'src, 'heap> {
    pub fn new(source: &'src str, heap: &'heap mut Heap) -> Self {
        Self {
            scanner: Scanner::new(source),
            heap,
            chunk: Chunk::new(),
            previous: Token::eof(1),
            current: Token::eof(1),
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
        }
    }

    /// Emit the trailing return and hand over the chunk, or every diagnostic.
    pub fn finish(mut self) -> CompileResult<Chunk> {
        self.emit_op(OpCode::Return);

        if self.had_error {
            log::debug!("compilation failed with {} error(s)", self.errors.len());
            return Err(CompileError::new(self.errors));
        }

        log::debug!(
            "compiled {} bytes, {} constants, {} line runs",
            self.chunk.code.len(),
            self.chunk.constants.len(),
            self.chunk.line_runs().len()
        );
        Ok(self.chunk)
    }

    // ============ Token stream ============

    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // ============ Expressions ============

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        self.apply_prefix(prefix);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = get_rule(self.previous.kind).infix {
                self.apply_infix(infix);
            }
        }
    }

    fn apply_prefix(&mut self, rule: PrefixRule) {
        match rule {
            PrefixRule::Grouping => self.grouping(),
            PrefixRule::Unary => self.unary(),
            PrefixRule::Number => self.number(),
            PrefixRule::String => self.string(),
            PrefixRule::Literal => self.literal(),
        }
    }

    fn apply_infix(&mut self, rule: InfixRule) {
        match rule {
            InfixRule::Binary => self.binary(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string(&mut self) {
        let lexeme = self.previous.lexeme;
        // Strip the surrounding quotes.
        let chars = &lexeme[1..lexeme.len() - 1];
        let handle = self.heap.copy_string(chars);
        self.emit_constant(Value::Obj(handle));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => {}
        }
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;

        // Operand first, so its value is on the stack when the operator runs.
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Bang => self.emit_op(OpCode::Not),
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            _ => {}
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        let rule = get_rule(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => {}
        }
    }

    // ============ Emission ============

    fn line(&self) -> u32 {
        self.previous.line as u32
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line();
        self.chunk.write_op(op, line);
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn emit_constant(&mut self, value: Value) {
        let line = self.line();
        if self.chunk.write_constant(value, line).is_none() {
            self.error("Too many constants in one chunk.");
        }
    }

    // ============ Diagnostics ============

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::AtEnd,
            TokenKind::Error => ErrorLocation::Lexical,
            _ => ErrorLocation::At(token.lexeme.to_string()),
        };
        self.errors.push(SyntaxError::new(token.line, location, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::object::ObjString;
    use pretty_assertions::assert_eq;

    fn compile_source(source: &str) -> CompileResult<Chunk> {
        let mut heap = Heap::new();
        compile(source, &mut heap)
    }

    fn ops(op: &[OpCode]) -> Vec<u8> {
        op.iter().map(|op| *op as u8).collect()
    }

    #[test]
    fn test_compile_simple_expression() {
        let chunk = compile_source("1 + 2").expect("compiles");
        assert_eq!(
            chunk.code,
            vec![
                OpCode::Constant as u8,
                0,
                OpCode::Constant as u8,
                1,
                OpCode::Add as u8,
                OpCode::Return as u8,
            ]
        );
        assert_eq!(chunk.constants, vec![Value::Number(1.0), Value::Number(2.0)]);
    }

    #[test]
    fn test_factor_binds_tighter_than_term() {
        let chunk = compile_source("1 + 2 * 3").expect("compiles");
        // 1 2 3 * +
        assert_eq!(chunk.code[6], OpCode::Multiply as u8);
        assert_eq!(chunk.code[7], OpCode::Add as u8);
    }

    #[test]
    fn test_binary_is_left_associative() {
        let chunk = compile_source("1 - 2 - 3").expect("compiles");
        // 1 2 - 3 -
        assert_eq!(chunk.code[4], OpCode::Subtract as u8);
        assert_eq!(chunk.code[7], OpCode::Subtract as u8);
    }

    #[test]
    fn test_unary_emits_after_operand() {
        let chunk = compile_source("-2").expect("compiles");
        assert_eq!(
            chunk.code,
            vec![
                OpCode::Constant as u8,
                0,
                OpCode::Negate as u8,
                OpCode::Return as u8
            ]
        );
    }

    #[test]
    fn test_grouping_emits_nothing() {
        let chunk = compile_source("(((true)))").expect("compiles");
        assert_eq!(chunk.code, ops(&[OpCode::True, OpCode::Return]));
    }

    #[test]
    fn test_comparison_desugaring() {
        let cases = [
            ("nil != nil", vec![OpCode::Equal, OpCode::Not]),
            ("nil >= nil", vec![OpCode::Less, OpCode::Not]),
            ("nil <= nil", vec![OpCode::Greater, OpCode::Not]),
            ("nil == nil", vec![OpCode::Equal]),
            ("nil < nil", vec![OpCode::Less]),
            ("nil > nil", vec![OpCode::Greater]),
        ];
        for (source, tail) in cases {
            let chunk = compile_source(source).expect("compiles");
            let mut expected = vec![OpCode::Nil, OpCode::Nil];
            expected.extend(tail);
            expected.push(OpCode::Return);
            assert_eq!(chunk.code, ops(&expected), "{}", source);
        }
    }

    #[test]
    fn test_string_literals_are_interned() {
        let mut heap = Heap::new();
        let chunk = compile(r#""hi" == "hi""#, &mut heap).expect("compiles");

        assert_eq!(chunk.constants.len(), 2);
        assert_eq!(chunk.constants[0], chunk.constants[1]);
        let handle = chunk.constants[0].as_obj().expect("object constant");
        assert_eq!(heap.string(handle).map(ObjString::as_str), Some("hi"));
    }

    #[test]
    fn test_lines_follow_tokens() {
        let chunk = compile_source("1 +\n2").expect("compiles");
        assert_eq!(chunk.line_for_offset(0), Some(1));
        assert_eq!(chunk.line_for_offset(2), Some(2));
        // `+` is emitted after its right operand was consumed.
        assert_eq!(chunk.line_for_offset(4), Some(2));
    }

    #[test]
    fn test_expect_expression() {
        let err = compile_source("1 +").unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.to_string(), "[line 1] Error at end: Expect expression.");
    }

    #[test]
    fn test_missing_paren() {
        let err = compile_source("(1 + 2").unwrap_err();
        assert_eq!(
            err.first().map(|e| e.message.as_str()),
            Some("Expect ')' after expression.")
        );
    }

    #[test]
    fn test_trailing_tokens() {
        let err = compile_source("1 2").unwrap_err();
        assert_eq!(err.to_string(), "[line 1] Error at '2': Expect end of expression.");
    }

    #[test]
    fn test_panic_mode_reports_once() {
        let err = compile_source(") ) )").unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.to_string(), "[line 1] Error at ')': Expect expression.");
    }

    #[test]
    fn test_lexical_error_location() {
        let err = compile_source("1 + @").unwrap_err();
        assert_eq!(err.to_string(), "[line 1] Error: Unexpected character.");
    }

    #[test]
    fn test_many_constants_switch_to_long_form() {
        let source = vec!["1"; 300].join(" + ");
        let chunk = compile_source(&source).expect("compiles");
        assert_eq!(chunk.constants.len(), 300);
        assert!(chunk.code.contains(&(OpCode::ConstantLong as u8)));
    }
}
