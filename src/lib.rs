//! The G-machine is a small virtual CPU with its own assembly language.
//!
//! Source text is assembled into a flat vector of 64-bit words which can be
//! executed directly, or serialized as a binary image and executed later.
//! The toolchain is split into three layers:
//!
//! - [`assembler`] turns G-assembly source into a word vector: a lexer, a
//!   parser producing a statement tree, and a code generator that lays out
//!   words and resolves labels, constants, and variables.
//! - [`image`] reads and writes the binary image format (bare big-endian
//!   words, no header).
//! - [`machine`] executes a loaded word vector against a register file and a
//!   fixed-size memory split into a stack region and a program/data region.
//!
//! The `gc` binary compiles a `.g` source file to an image; the `gr` binary
//! loads an image and runs it.

use std::io::{Read, Write};

use thiserror::Error;

pub mod assembler;
pub mod image;
pub mod machine;

pub use crate::assembler::{assemble, AsmError};
pub use crate::machine::Machine;

/// The machine's uniform cell size. Opcodes, operands, addresses, and stored
/// data are all words, and arithmetic wraps modulo 2^64.
pub type Word = u64;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Asm(#[from] AsmError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Reads G-assembly source from `input`, assembles it, and writes the binary
/// image to `out`. Unlike the machine's OUTA instruction, write errors here
/// are fatal.
pub fn compile<R: Read, W: Write>(mut input: R, out: W) -> Result<(), Error> {
    let mut source = String::new();
    input.read_to_string(&mut source)?;
    let program = assembler::assemble(&source)?;
    image::encode(&program, out)?;
    Ok(())
}
