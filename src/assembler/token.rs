//! Token kinds for G-assembly source.

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Illegal,
    Eof,
    Instruction,
    Register,
    LabelDefinition,
    ConstantDefinition,
    VariableDefinition,
    Ident,
    Int,
    Char,
    Str,
    Arrow,
    Asterisk,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Instruction => "INSTRUCTION",
            TokenKind::Register => "REGISTER",
            TokenKind::LabelDefinition => "LABEL_DEFINITION",
            TokenKind::ConstantDefinition => "CONSTANT_DEFINITION",
            TokenKind::VariableDefinition => "VARIABLE_DEFINITION",
            TokenKind::Ident => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::Char => "CHAR",
            TokenKind::Str => "STRING",
            TokenKind::Arrow => "ARROW",
            TokenKind::Asterisk => "ASTERISK",
        };
        write!(f, "{}", name)
    }
}

/// A token together with its source text and the 1-based line it appeared on.
/// Character literals keep their surrounding quotes; string literals do not.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: usize,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, literal: S, line: usize) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
        }
    }
}

/// Classifies an identifier against the fixed tables of mnemonics, register
/// names, and pragmas. Anything unknown is a plain identifier.
pub fn lookup_ident(ident: &str) -> TokenKind {
    match ident {
        "HALT" | "NOOP" | "MOVE" | "OUTA" | "INCA" | "INCX" | "INCY" | "DECA" | "DECX"
        | "DECY" | "ADDA" | "MULA" | "SETA" | "SETX" | "SETY" | "PSHA" | "POPA" | "JUMP"
        | "JXNZ" => TokenKind::Instruction,
        "A" | "X" | "Y" => TokenKind::Register,
        "CONS" => TokenKind::ConstantDefinition,
        "VARB" => TokenKind::VariableDefinition,
        _ => TokenKind::Ident,
    }
}
