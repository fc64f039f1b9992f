//! The parser turns the lexer's token stream into a statement tree.
//!
//! It reads two tokens of lookahead and accumulates errors instead of
//! stopping: a bad statement is recorded and skipped so that one mistake does
//! not hide the rest. Which operand kinds a given mnemonic actually accepts
//! is decided later, by the assembler.

use thiserror::Error;

use super::ast::{Operand, Program, Statement};
use super::lexer::{LexError, Lexer};
use super::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(LexError),
    /// An integer literal that does not fit in a 64-bit word.
    #[error("invalid integer literal: {literal} at line {line}")]
    InvalidIntegerLiteral { literal: String, line: usize },
    #[error("invalid syntax: expected {expected}, got {literal} at line {line}")]
    InvalidSyntax {
        expected: &'static str,
        literal: String,
        line: usize,
    },
    #[error("invalid constant definition: {literal} at line {line}")]
    InvalidConstDefinition { literal: String, line: usize },
    #[error("invalid variable definition: {literal} at line {line}")]
    InvalidVariableDefinition { literal: String, line: usize },
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        // A number running into letters is reported with the same kind as an
        // out-of-range literal so callers see one integer-literal failure.
        match err {
            LexError::InvalidNumberLiteral { literal, line } => {
                ParseError::InvalidIntegerLiteral { literal, line }
            }
            other => ParseError::Lex(other),
        }
    }
}

pub struct Parser {
    lexer: Lexer,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
    /// Set once the lexer has failed; the stream is then capped with EOF.
    halted: bool,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        let mut parser = Parser {
            lexer,
            cur: Token::new(TokenKind::Eof, "", 0),
            peek: Token::new(TokenKind::Eof, "", 0),
            errors: Vec::new(),
            halted: false,
        };
        // Prime both lookahead tokens.
        parser.next_token();
        parser.next_token();
        parser
    }

    /// Run the parser, consuming itself and returning the program together
    /// with every error encountered along the way.
    pub fn run(mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();
        while self.cur.kind != TokenKind::Eof {
            if let Some(stmt) = self.statement() {
                program.statements.push(stmt);
            }
            self.next_token();
        }
        (program, self.errors)
    }

    fn statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Instruction => self.instruction(),
            TokenKind::LabelDefinition => Some(Statement::Label(self.cur.clone())),
            TokenKind::ConstantDefinition => self.constant_definition(),
            TokenKind::VariableDefinition => self.variable_definition(),
            _ => {
                self.errors.push(ParseError::InvalidSyntax {
                    expected: "a statement",
                    literal: self.cur.literal.clone(),
                    line: self.cur.line,
                });
                None
            }
        }
    }

    fn constant_definition(&mut self) -> Option<Statement> {
        if self.peek.kind != TokenKind::Ident {
            self.definition_error(ParseError::InvalidConstDefinition {
                literal: self.peek.literal.clone(),
                line: self.peek.line,
            });
            return None;
        }
        self.next_token();
        let name = self.cur.clone();

        if self.peek.kind != TokenKind::Int {
            self.definition_error(ParseError::InvalidConstDefinition {
                literal: self.peek.literal.clone(),
                line: self.peek.line,
            });
            return None;
        }
        self.next_token();
        let value = self.integer_literal()?;

        Some(Statement::Constant { name, value })
    }

    fn variable_definition(&mut self) -> Option<Statement> {
        if self.peek.kind != TokenKind::Ident {
            self.definition_error(ParseError::InvalidVariableDefinition {
                literal: self.peek.literal.clone(),
                line: self.peek.line,
            });
            return None;
        }
        self.next_token();
        let name = self.cur.clone();

        let value = match self.peek.kind {
            TokenKind::Int => {
                self.next_token();
                self.integer_literal()?
            }
            TokenKind::Str => {
                self.next_token();
                Operand::Str {
                    token: self.cur.clone(),
                    value: self.cur.literal.clone(),
                }
            }
            _ => {
                self.definition_error(ParseError::InvalidVariableDefinition {
                    literal: self.peek.literal.clone(),
                    line: self.peek.line,
                });
                return None;
            }
        };

        Some(Statement::Variable { name, value })
    }

    /// Records a malformed-definition error and consumes the offending peek
    /// token so it is not reported a second time as a stray statement.
    fn definition_error(&mut self, err: ParseError) {
        self.errors.push(err);
        self.next_token();
    }

    fn instruction(&mut self) -> Option<Statement> {
        let token = self.cur.clone();

        if token.literal == "MOVE" {
            let operand1 = self.move_operand(true)?;
            if !self.expect_peek(TokenKind::Arrow, "->") {
                return None;
            }
            let operand2 = self.move_operand(false)?;
            return Some(Statement::Instruction {
                token,
                operand1: Some(operand1),
                operand2: Some(operand2),
            });
        }

        let operand1 = match self.peek.kind {
            TokenKind::Register
            | TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Char
            | TokenKind::Str => {
                self.next_token();
                Some(self.operand()?)
            }
            _ => None,
        };

        Some(Statement::Instruction {
            token,
            operand1,
            operand2: None,
        })
    }

    /// Parses one side of a `MOVE a -> b`. The dereference form `*A` is only
    /// permitted on the left.
    fn move_operand(&mut self, deref_allowed: bool) -> Option<Operand> {
        self.next_token();
        match self.cur.kind {
            TokenKind::Register => Some(Operand::Register(self.cur.clone())),
            TokenKind::Ident => Some(Operand::Ident(self.cur.clone())),
            TokenKind::Asterisk if deref_allowed && self.peek.kind == TokenKind::Register => {
                self.next_token();
                Some(Operand::Deref(self.cur.clone()))
            }
            _ => {
                self.errors.push(ParseError::InvalidSyntax {
                    expected: "REGISTER or IDENT",
                    literal: self.cur.literal.clone(),
                    line: self.cur.line,
                });
                None
            }
        }
    }

    /// Parses the current token as a single-operand expression.
    fn operand(&mut self) -> Option<Operand> {
        match self.cur.kind {
            TokenKind::Register => Some(Operand::Register(self.cur.clone())),
            TokenKind::Ident => Some(Operand::Ident(self.cur.clone())),
            TokenKind::Int => self.integer_literal(),
            TokenKind::Char => self.character_literal(),
            TokenKind::Str => Some(Operand::Str {
                token: self.cur.clone(),
                value: self.cur.literal.clone(),
            }),
            _ => None,
        }
    }

    fn integer_literal(&mut self) -> Option<Operand> {
        let token = self.cur.clone();
        match token.literal.parse() {
            Ok(value) => Some(Operand::Int { token, value }),
            Err(_) => {
                self.errors.push(ParseError::InvalidIntegerLiteral {
                    literal: token.literal,
                    line: self.cur.line,
                });
                None
            }
        }
    }

    fn character_literal(&mut self) -> Option<Operand> {
        let token = self.cur.clone();
        match token.literal.trim_matches('\'').chars().next() {
            Some(value) => Some(Operand::Char { token, value }),
            None => {
                self.errors.push(ParseError::InvalidSyntax {
                    expected: "a character literal",
                    literal: token.literal,
                    line: self.cur.line,
                });
                None
            }
        }
    }

    fn expect_peek(&mut self, kind: TokenKind, expected: &'static str) -> bool {
        self.next_token();
        if self.cur.kind == kind {
            return true;
        }
        self.errors.push(ParseError::InvalidSyntax {
            expected,
            literal: self.cur.literal.clone(),
            line: self.cur.line,
        });
        false
    }

    fn next_token(&mut self) {
        let line = self.peek.line;
        let next = if self.halted {
            Token::new(TokenKind::Eof, "", line)
        } else {
            match self.lexer.next_token() {
                Ok(token) => token,
                Err(err) => {
                    self.halted = true;
                    self.errors.push(err.into());
                    Token::new(TokenKind::Eof, "", line)
                }
            }
        };
        self.cur = std::mem::replace(&mut self.peek, next);
    }
}
