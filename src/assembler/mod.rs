//! The assembler module is in charge of taking G-assembly source and
//! producing a loadable word vector.
//!
//! It does this with a hand-written lexer, a two-token-lookahead recursive
//! descent parser, and a single code generation pass that records forward
//! references and patches them once every symbol is known.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

use std::collections::HashMap;
use std::convert::TryFrom;

use log::debug;
use thiserror::Error;

use self::ast::{Operand, Program, Statement};
use self::lexer::Lexer;
use self::parser::{ParseError, Parser};
use self::token::Token;
use crate::machine::{Op, Register};
use crate::Word;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A mnemonic with no entry in the opcode table.
    #[error("undefined instruction: {literal} at line {line}")]
    UndefinedInstruction { literal: String, line: usize },
    /// An operand kind this mnemonic does not accept.
    #[error("invalid operand: {literal} at line {line}")]
    InvalidOperand { literal: String, line: usize },
    /// A register that is not permitted in this position.
    #[error("invalid register: {literal} at line {line}")]
    InvalidRegister { literal: String, line: usize },
    /// A reference to a name that was never defined.
    #[error("unknown identifier: {literal} at line {line}")]
    UnknownIdentifier { literal: String, line: usize },
    /// A name already bound as a label, constant, or variable.
    #[error("duplicate definition: {literal} at line {line}")]
    DuplicateDefinition { literal: String, line: usize },
}

/// Assembles G-assembly source all the way to a loadable word vector.
/// Parse errors are surfaced one at a time, first one wins.
pub fn assemble(source: &str) -> Result<Vec<Word>, AsmError> {
    let (program, errors) = Parser::new(Lexer::new(source)).run();
    if let Some(err) = errors.into_iter().next() {
        return Err(err.into());
    }
    debug!("parsed {} statements", program.statements.len());
    Assembler::new().run(&program)
}

/// Labels, constants, and variables live in three disjoint tables but share
/// one namespace: defining a name twice is rejected no matter which tables
/// are involved, and lookup tries labels, then constants, then variables.
#[derive(Default)]
pub struct SymbolTable {
    labels: HashMap<String, Word>,
    constants: HashMap<String, Word>,
    variables: HashMap<String, Word>,
}

impl SymbolTable {
    pub fn define_label(&mut self, name: &str, address: Word) -> bool {
        !self.defined(name) && self.labels.insert(name.to_string(), address).is_none()
    }

    pub fn define_constant(&mut self, name: &str, value: Word) -> bool {
        !self.defined(name) && self.constants.insert(name.to_string(), value).is_none()
    }

    pub fn define_variable(&mut self, name: &str, address: Word) -> bool {
        !self.defined(name) && self.variables.insert(name.to_string(), address).is_none()
    }

    pub fn lookup(&self, name: &str) -> Option<Word> {
        self.labels
            .get(name)
            .or_else(|| self.constants.get(name))
            .or_else(|| self.variables.get(name))
            .copied()
    }

    fn defined(&self, name: &str) -> bool {
        self.labels.contains_key(name)
            || self.constants.contains_key(name)
            || self.variables.contains_key(name)
    }
}

/// A forward reference: `image[address]` holds a placeholder to be rewritten
/// with the value `name` resolves to.
struct Patch {
    name: String,
    line: usize,
    address: usize,
}

/// Walks the statement tree appending words to the image. Label and variable
/// addresses are image-relative; the machine adds its own memory offset.
pub struct Assembler {
    image: Vec<Word>,
    symbols: SymbolTable,
    patches: Vec<Patch>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler {
            image: Vec::new(),
            symbols: SymbolTable::default(),
            patches: Vec::new(),
        }
    }

    /// Run the assembler over a parsed program, consuming itself and
    /// returning the image.
    pub fn run(mut self, program: &Program) -> Result<Vec<Word>, AsmError> {
        for stmt in &program.statements {
            self.statement(stmt)?;
        }
        self.fixup()?;
        Ok(self.image)
    }

    fn statement(&mut self, stmt: &Statement) -> Result<(), AsmError> {
        match stmt {
            Statement::Label(token) => {
                let name = token.literal.trim_start_matches('.');
                self.define(token, |symbols, address| {
                    symbols.define_label(name, address)
                })
            }
            Statement::Constant { name, value } => {
                let word = match value {
                    Operand::Int { value, .. } => *value,
                    other => return Err(invalid_operand(other)),
                };
                self.define(name, |symbols, _| {
                    symbols.define_constant(&name.literal, word)
                })
            }
            Statement::Variable { name, value } => {
                self.define(name, |symbols, address| {
                    symbols.define_variable(&name.literal, address)
                })?;
                match value {
                    Operand::Int { value, .. } => self.image.push(*value),
                    Operand::Str { value, .. } => {
                        // One word per rune, no terminator.
                        self.image.extend(value.chars().map(|c| c as Word));
                    }
                    other => return Err(invalid_operand(other)),
                }
                Ok(())
            }
            Statement::Instruction {
                token,
                operand1,
                operand2,
            } => self.instruction(token, operand1.as_ref(), operand2.as_ref()),
        }
    }

    fn define<F>(&mut self, token: &Token, define: F) -> Result<(), AsmError>
    where
        F: FnOnce(&mut SymbolTable, Word) -> bool,
    {
        let address = self.image.len() as Word;
        if !define(&mut self.symbols, address) {
            return Err(AsmError::DuplicateDefinition {
                literal: token.literal.clone(),
                line: token.line,
            });
        }
        Ok(())
    }

    fn instruction(
        &mut self,
        token: &Token,
        operand1: Option<&Operand>,
        operand2: Option<&Operand>,
    ) -> Result<(), AsmError> {
        if token.literal == "MOVE" {
            return self.mov(token, operand1, operand2);
        }

        let op = match Op::from_mnemonic(&token.literal) {
            Some(op) => op,
            None => {
                return Err(AsmError::UndefinedInstruction {
                    literal: token.literal.clone(),
                    line: token.line,
                })
            }
        };

        if !op.takes_operand() {
            if let Some(operand) = operand1.or(operand2) {
                return Err(invalid_operand(operand));
            }
            self.image.push(op as Word);
            return Ok(());
        }

        let operand = match operand1 {
            Some(operand) => operand,
            None => {
                return Err(AsmError::InvalidOperand {
                    literal: token.literal.clone(),
                    line: token.line,
                })
            }
        };

        self.image.push(op as Word);
        match op {
            Op::Seta | Op::Setx | Op::Sety => self.immediate(operand),
            Op::Adda | Op::Mula => {
                let code = match operand {
                    Operand::Register(register) => register_code(register)?,
                    other => return Err(invalid_operand(other)),
                };
                self.image.push(code);
                Ok(())
            }
            Op::Jump | Op::Jxnz => self.jump_target(operand),
            // The MOVE family is only reachable through `mov`.
            _ => Err(AsmError::UndefinedInstruction {
                literal: token.literal.clone(),
                line: token.line,
            }),
        }
    }

    /// Emits the operand word for SETA/SETX/SETY: a literal value, or a
    /// placeholder patched with whatever the name resolves to.
    fn immediate(&mut self, operand: &Operand) -> Result<(), AsmError> {
        match operand {
            Operand::Int { value, .. } => self.image.push(*value),
            Operand::Char { value, .. } => self.image.push(*value as Word),
            Operand::Ident(token) => self.patch(token),
            other => return Err(invalid_operand(other)),
        }
        Ok(())
    }

    /// Emits the target word for JUMP/JXNZ: an explicit address or a patched
    /// label reference.
    fn jump_target(&mut self, operand: &Operand) -> Result<(), AsmError> {
        match operand {
            Operand::Int { value, .. } => self.image.push(*value),
            Operand::Ident(token) => self.patch(token),
            other => return Err(invalid_operand(other)),
        }
        Ok(())
    }

    /// MOVE is a family of opcodes picked by the shapes of its operands:
    ///
    /// - `A -> X|Y` copies the accumulator into another register.
    /// - `*A -> X|Y` loads the word A points at into another register.
    /// - `A -> name` stores the accumulator into a variable slot.
    /// - `name -> A` loads a variable slot into the accumulator.
    fn mov(
        &mut self,
        token: &Token,
        operand1: Option<&Operand>,
        operand2: Option<&Operand>,
    ) -> Result<(), AsmError> {
        let (src, dst) = match (operand1, operand2) {
            (Some(src), Some(dst)) => (src, dst),
            _ => {
                return Err(AsmError::InvalidOperand {
                    literal: token.literal.clone(),
                    line: token.line,
                })
            }
        };

        match (src, dst) {
            (Operand::Register(src), Operand::Register(dst)) => {
                accumulator_only(src)?;
                let code = register_code(dst)?;
                self.image.push(Op::Mova as Word);
                self.image.push(code);
            }
            (Operand::Deref(src), Operand::Register(dst)) => {
                accumulator_only(src)?;
                let code = register_code(dst)?;
                self.image.push(Op::Mvdr as Word);
                self.image.push(code);
            }
            (Operand::Register(src), Operand::Ident(name)) => {
                accumulator_only(src)?;
                self.image.push(Op::Mvav as Word);
                self.patch(name);
            }
            (Operand::Ident(name), Operand::Register(dst)) => {
                if dst.literal != "A" {
                    return Err(AsmError::InvalidOperand {
                        literal: dst.literal.clone(),
                        line: dst.line,
                    });
                }
                self.image.push(Op::Mvva as Word);
                self.patch(name);
            }
            (src, _) => return Err(invalid_operand(src)),
        }
        Ok(())
    }

    /// Appends a placeholder word and records the fixup for it.
    fn patch(&mut self, token: &Token) {
        self.image.push(0);
        self.patches.push(Patch {
            name: token.literal.clone(),
            line: token.line,
            address: self.image.len() - 1,
        });
    }

    fn fixup(&mut self) -> Result<(), AsmError> {
        debug!("resolving {} forward references", self.patches.len());
        for patch in &self.patches {
            match self.symbols.lookup(&patch.name) {
                Some(value) => self.image[patch.address] = value,
                None => {
                    return Err(AsmError::UnknownIdentifier {
                        literal: patch.name.clone(),
                        line: patch.line,
                    })
                }
            }
        }
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// The source side of a MOVE must be the accumulator.
fn accumulator_only(register: &Token) -> Result<(), AsmError> {
    if register.literal == "A" {
        return Ok(());
    }
    Err(AsmError::InvalidOperand {
        literal: register.literal.clone(),
        line: register.line,
    })
}

/// Encodes a destination register operand. Only X and Y may be written
/// through a register code; the accumulator is reached by its own opcodes.
fn register_code(register: &Token) -> Result<Word, AsmError> {
    match register.literal.as_str() {
        "X" => Ok(Register::X as Word),
        "Y" => Ok(Register::Y as Word),
        _ => Err(AsmError::InvalidRegister {
            literal: register.literal.clone(),
            line: register.line,
        }),
    }
}

fn invalid_operand(operand: &Operand) -> AsmError {
    let token = operand.token();
    AsmError::InvalidOperand {
        literal: token.literal.clone(),
        line: token.line,
    }
}

/// Renders a best-effort listing of an image: opcodes are decoded together
/// with their operand word, anything undecodable is shown as a bare value.
/// For an image holding only instructions this reproduces the stream exactly.
pub fn disassemble(image: &[Word]) -> Vec<(usize, String)> {
    let mut listing = Vec::new();
    let mut i = 0;
    while i < image.len() {
        if let Ok(op) = Op::try_from(image[i]) {
            if !op.takes_operand() {
                listing.push((i, op.to_string()));
                i += 1;
                continue;
            }
            if i + 1 < image.len() {
                listing.push((i, format!("{} {}", op, image[i + 1])));
                i += 2;
                continue;
            }
        }
        listing.push((i, image[i].to_string()));
        i += 1;
    }
    listing
}
