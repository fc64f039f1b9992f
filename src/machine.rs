//! The G-machine proper: a register file and a fixed-size word memory.
//!
//! Memory is split into a stack region at the bottom and a program/data
//! region above it. The program counter is relative to the program region, so
//! the addresses the assembler bakes into an image are image-relative and the
//! machine adds [`MEM_OFFSET`] on every access. Faults never panic and never
//! surface as host errors: they set the `E` register and stop the machine.

use std::convert::TryFrom;
use std::fmt;
use std::io::Write;

use crate::assembler::{self, AsmError};
use crate::Word;

/// Total memory size in words.
pub const MEM_SIZE: Word = 1024;
/// The stack occupies `memory[0..STACK_SIZE]`.
pub const STACK_SIZE: Word = 256;
/// Base of the program/data region; loaded images start here.
pub const MEM_OFFSET: Word = STACK_SIZE;

pub const EXCEPTION_OK: Word = 0;
pub const EXCEPTION_ILLEGAL_INSTRUCTION: Word = 1;
pub const EXCEPTION_OUT_OF_MEMORY: Word = 2;

/// The opcode set. Word 0 is deliberately unassigned so that executing
/// zeroed memory faults instead of doing something quiet.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Op {
    Halt = 1,
    Noop,
    Outa,
    Inca,
    Incx,
    Incy,
    Deca,
    Decx,
    Decy,
    Adda,
    Mula,
    /// `MOVE A -> X|Y`: copy the accumulator into the coded register.
    Mova,
    /// `MOVE *A -> X|Y`: load the word A points at into the coded register.
    Mvdr,
    /// `MOVE A -> name`: store the accumulator at the operand address.
    Mvav,
    /// `MOVE name -> A`: load the word at the operand address into A.
    Mvva,
    Seta,
    Setx,
    Sety,
    Psha,
    Popa,
    Jump,
    Jxnz,
}

impl Op {
    /// Maps a source mnemonic to its opcode. The MOVE family is absent here:
    /// `MOVE` resolves to one of four opcodes by operand shape, in the
    /// assembler.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Op> {
        use Op::*;
        Some(match mnemonic {
            "HALT" => Halt,
            "NOOP" => Noop,
            "OUTA" => Outa,
            "INCA" => Inca,
            "INCX" => Incx,
            "INCY" => Incy,
            "DECA" => Deca,
            "DECX" => Decx,
            "DECY" => Decy,
            "ADDA" => Adda,
            "MULA" => Mula,
            "SETA" => Seta,
            "SETX" => Setx,
            "SETY" => Sety,
            "PSHA" => Psha,
            "POPA" => Popa,
            "JUMP" => Jump,
            "JXNZ" => Jxnz,
            _ => return None,
        })
    }

    /// Whether one operand word follows the opcode in the instruction stream.
    pub fn takes_operand(self) -> bool {
        use Op::*;
        matches!(
            self,
            Adda | Mula | Mova | Mvdr | Mvav | Mvva | Seta | Setx | Sety | Jump | Jxnz
        )
    }
}

impl TryFrom<Word> for Op {
    type Error = Word;

    fn try_from(value: Word) -> Result<Self, Self::Error> {
        use Op::*;
        Ok(match value {
            1 => Halt,
            2 => Noop,
            3 => Outa,
            4 => Inca,
            5 => Incx,
            6 => Incy,
            7 => Deca,
            8 => Decx,
            9 => Decy,
            10 => Adda,
            11 => Mula,
            12 => Mova,
            13 => Mvdr,
            14 => Mvav,
            15 => Mvva,
            16 => Seta,
            17 => Setx,
            18 => Sety,
            19 => Psha,
            20 => Popa,
            21 => Jump,
            22 => Jxnz,
            _ => return Err(value),
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Op::Halt => "HALT",
            Op::Noop => "NOOP",
            Op::Outa => "OUTA",
            Op::Inca => "INCA",
            Op::Incx => "INCX",
            Op::Incy => "INCY",
            Op::Deca => "DECA",
            Op::Decx => "DECX",
            Op::Decy => "DECY",
            Op::Adda => "ADDA",
            Op::Mula => "MULA",
            Op::Mova => "MOVA",
            Op::Mvdr => "MVDR",
            Op::Mvav => "MVAV",
            Op::Mvva => "MVVA",
            Op::Seta => "SETA",
            Op::Setx => "SETX",
            Op::Sety => "SETY",
            Op::Psha => "PSHA",
            Op::Popa => "POPA",
            Op::Jump => "JUMP",
            Op::Jxnz => "JXNZ",
        };
        write!(f, "{}", name)
    }
}

/// Register codes as they appear in operand words.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    A = 0,
    X = 1,
    Y = 2,
}

impl TryFrom<Word> for Register {
    type Error = Word;

    fn try_from(value: Word) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Register::A),
            1 => Ok(Register::X),
            2 => Ok(Register::Y),
            _ => Err(value),
        }
    }
}

/// A G-machine instance. Registers and memory are public so tests and tools
/// can observe the final state; `out` is the sink OUTA writes to.
pub struct Machine<W> {
    /// Program counter, relative to [`MEM_OFFSET`].
    pub p: Word,
    /// Stack pointer, absolute, grows up towards [`STACK_SIZE`].
    pub s: Word,
    pub a: Word,
    pub x: Word,
    pub y: Word,
    /// Fault code; zero while running normally.
    pub e: Word,
    pub memory: Vec<Word>,
    out: W,
}

impl<W: Write> Machine<W> {
    pub fn new(out: W) -> Self {
        Machine {
            p: 0,
            s: 0,
            a: 0,
            x: 0,
            y: 0,
            e: EXCEPTION_OK,
            memory: vec![0; MEM_SIZE as usize],
            out,
        }
    }

    /// Copies an image into the program/data region. Words that do not fit
    /// are dropped.
    pub fn load(&mut self, program: &[Word]) {
        let base = MEM_OFFSET as usize;
        for (slot, word) in self.memory[base..].iter_mut().zip(program) {
            *slot = *word;
        }
    }

    /// Loads an image and runs it.
    pub fn run_program(&mut self, program: &[Word]) {
        self.load(program);
        self.run();
    }

    /// Assembles source and runs the resulting image.
    pub fn assemble_and_run(&mut self, source: &str) -> Result<(), AsmError> {
        let program = assembler::assemble(source)?;
        self.run_program(&program);
        Ok(())
    }

    /// Executes until HALT or a fault. On a fault `E` holds the exception
    /// code and execution stops; the host sees no error either way.
    pub fn run(&mut self) {
        loop {
            let instruction = match self.next() {
                Some(word) => word,
                None => return,
            };
            let op = match Op::try_from(instruction) {
                Ok(op) => op,
                Err(_) => {
                    self.e = EXCEPTION_ILLEGAL_INSTRUCTION;
                    return;
                }
            };
            match op {
                Op::Halt => return,
                Op::Noop => {}
                Op::Outa => {
                    // Sink errors are deliberately swallowed; OUTA is
                    // fire-and-forget.
                    let _ = self.out.write_all(&self.a.to_be_bytes());
                }
                Op::Inca => self.a = self.a.wrapping_add(1),
                Op::Incx => self.x = self.x.wrapping_add(1),
                Op::Incy => self.y = self.y.wrapping_add(1),
                Op::Deca => self.a = self.a.wrapping_sub(1),
                Op::Decx => self.x = self.x.wrapping_sub(1),
                Op::Decy => self.y = self.y.wrapping_sub(1),
                Op::Adda => match self.register_operand() {
                    Some(value) => self.a = self.a.wrapping_add(value),
                    None => return,
                },
                Op::Mula => match self.register_operand() {
                    Some(value) => self.a = self.a.wrapping_mul(value),
                    None => return,
                },
                Op::Mova => {
                    let value = self.a;
                    if !self.write_register_operand(value) {
                        return;
                    }
                }
                Op::Mvdr => {
                    let value = match self.load_word(self.a) {
                        Some(value) => value,
                        None => return,
                    };
                    if !self.write_register_operand(value) {
                        return;
                    }
                }
                Op::Mvav => {
                    let address = match self.next() {
                        Some(word) => word,
                        None => return,
                    };
                    if !self.store_word(address, self.a) {
                        return;
                    }
                }
                Op::Mvva => {
                    let address = match self.next() {
                        Some(word) => word,
                        None => return,
                    };
                    match self.load_word(address) {
                        Some(value) => self.a = value,
                        None => return,
                    }
                }
                Op::Seta => match self.next() {
                    Some(value) => self.a = value,
                    None => return,
                },
                Op::Setx => match self.next() {
                    Some(value) => self.x = value,
                    None => return,
                },
                Op::Sety => match self.next() {
                    Some(value) => self.y = value,
                    None => return,
                },
                Op::Psha => {
                    if self.s >= STACK_SIZE {
                        self.e = EXCEPTION_OUT_OF_MEMORY;
                        return;
                    }
                    self.memory[self.s as usize] = self.a;
                    self.s += 1;
                }
                Op::Popa => {
                    if self.s == 0 {
                        self.e = EXCEPTION_ILLEGAL_INSTRUCTION;
                        return;
                    }
                    self.s -= 1;
                    self.a = self.memory[self.s as usize];
                }
                Op::Jump => match self.next() {
                    Some(target) => self.p = target,
                    None => return,
                },
                Op::Jxnz => {
                    if self.x != 0 {
                        match self.next() {
                            Some(target) => self.p = target,
                            None => return,
                        }
                    } else {
                        self.p += 1;
                    }
                }
            }
        }
    }

    /// Borrow of the output sink, mainly for tests that capture OUTA bytes.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Fetches the word at P and advances. Running off the end of memory
    /// faults with an out-of-memory exception.
    fn next(&mut self) -> Option<Word> {
        if self.p >= MEM_SIZE - MEM_OFFSET {
            self.e = EXCEPTION_OUT_OF_MEMORY;
            return None;
        }
        let word = self.memory[(MEM_OFFSET + self.p) as usize];
        self.p += 1;
        Some(word)
    }

    /// Reads an operand word naming X or Y and returns that register's value.
    fn register_operand(&mut self) -> Option<Word> {
        let code = self.next()?;
        match Register::try_from(code) {
            Ok(Register::X) => Some(self.x),
            Ok(Register::Y) => Some(self.y),
            _ => {
                self.e = EXCEPTION_ILLEGAL_INSTRUCTION;
                None
            }
        }
    }

    /// Reads an operand word naming X or Y and stores `value` there.
    fn write_register_operand(&mut self, value: Word) -> bool {
        let code = match self.next() {
            Some(code) => code,
            None => return false,
        };
        match Register::try_from(code) {
            Ok(Register::X) => self.x = value,
            Ok(Register::Y) => self.y = value,
            _ => {
                self.e = EXCEPTION_ILLEGAL_INSTRUCTION;
                return false;
            }
        }
        true
    }

    /// Reads the word at an image-relative address.
    fn load_word(&mut self, address: Word) -> Option<Word> {
        if address >= MEM_SIZE - MEM_OFFSET {
            self.e = EXCEPTION_OUT_OF_MEMORY;
            return None;
        }
        Some(self.memory[(MEM_OFFSET + address) as usize])
    }

    /// Writes the word at an image-relative address.
    fn store_word(&mut self, address: Word, value: Word) -> bool {
        if address >= MEM_SIZE - MEM_OFFSET {
            self.e = EXCEPTION_OUT_OF_MEMORY;
            return false;
        }
        self.memory[(MEM_OFFSET + address) as usize] = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn machine() -> Machine<io::Sink> {
        Machine::new(io::sink())
    }

    #[test]
    fn test_new() {
        let machine = machine();
        assert_eq!(0, machine.p);
        assert_eq!(0, machine.s);
        assert_eq!(0, machine.a);
        assert_eq!(0, machine.x);
        assert_eq!(0, machine.y);
        assert_eq!(EXCEPTION_OK, machine.e);
        assert_eq!(MEM_SIZE as usize, machine.memory.len());
        assert_eq!(0, machine.memory[MEM_SIZE as usize - 1]);
    }

    #[test]
    fn test_load_copies_image_into_program_region() {
        let mut machine = machine();
        let program = vec![Op::Inca as Word, Op::Halt as Word];
        machine.load(&program);
        for (i, word) in program.iter().enumerate() {
            assert_eq!(*word, machine.memory[MEM_OFFSET as usize + i]);
        }
        assert_eq!(0, machine.a);
    }

    #[test]
    fn test_halt() {
        let mut machine = machine();
        machine.assemble_and_run("HALT").unwrap();
        assert_eq!(1, machine.p);
        assert_eq!(EXCEPTION_OK, machine.e);
    }

    #[test]
    fn test_noop() {
        let mut machine = machine();
        machine.assemble_and_run("NOOP\nHALT").unwrap();
        assert_eq!(2, machine.p);
        assert_eq!(EXCEPTION_OK, machine.e);
    }

    #[test]
    fn test_inc_and_dec() {
        let mut machine = machine();
        machine
            .assemble_and_run("INCA\nINCX\nINCX\nINCY\nDECY\nHALT")
            .unwrap();
        assert_eq!(1, machine.a);
        assert_eq!(2, machine.x);
        assert_eq!(0, machine.y);
    }

    #[test]
    fn test_deca_wraps() {
        let mut machine = machine();
        machine.assemble_and_run("DECA\nHALT").unwrap();
        assert_eq!(Word::max_value(), machine.a);
    }

    #[test]
    fn test_set_registers() {
        let mut machine = machine();
        machine.assemble_and_run("SETA 5\nSETX 6\nSETY 7\nHALT").unwrap();
        assert_eq!(5, machine.a);
        assert_eq!(6, machine.x);
        assert_eq!(7, machine.y);
    }

    #[test]
    fn test_set_accepts_character_literal() {
        let mut machine = machine();
        machine.assemble_and_run("SETA 'h'\nHALT").unwrap();
        assert_eq!('h' as Word, machine.a);
    }

    #[test]
    fn test_adda() {
        let mut machine = machine();
        machine
            .assemble_and_run("\nSETA 6\nMOVE A -> X\nSETA 4\nADDA X\nHALT\n")
            .unwrap();
        assert_eq!(10, machine.a);

        let mut machine = self::machine();
        machine
            .assemble_and_run("\nSETA 6\nMOVE A -> Y\nSETA 4\nADDA Y\nHALT\n")
            .unwrap();
        assert_eq!(10, machine.a);
    }

    #[test]
    fn test_mula() {
        let mut machine = machine();
        machine
            .assemble_and_run("\nSETA 5\nMOVE A -> X\nSETA 2\nMULA X\nHALT\n")
            .unwrap();
        assert_eq!(10, machine.a);
    }

    #[test]
    fn test_mula_wraps() {
        let mut machine = machine();
        let mut program = Vec::new();
        program.extend_from_slice(&[Op::Seta as Word, Word::max_value()]);
        program.extend_from_slice(&[Op::Setx as Word, 2]);
        program.extend_from_slice(&[Op::Mula as Word, Register::X as Word]);
        program.push(Op::Halt as Word);
        machine.run_program(&program);
        assert_eq!(Word::max_value().wrapping_mul(2), machine.a);
        assert_eq!(EXCEPTION_OK, machine.e);
    }

    #[test]
    fn test_outa_writes_big_endian_bytes() {
        let mut machine = Machine::new(Vec::new());
        machine.assemble_and_run("SETA 1\nOUTA\nHALT").unwrap();
        assert_eq!(&vec![0u8, 0, 0, 0, 0, 0, 0, 1], machine.output());
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "failed to write data"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_outa_swallows_sink_errors() {
        let mut machine = Machine::new(FailingSink);
        machine.assemble_and_run("SETA 1\nOUTA\nINCA\nHALT").unwrap();
        assert_eq!(EXCEPTION_OK, machine.e);
        assert_eq!(2, machine.a);
    }

    #[test]
    fn test_jump() {
        let mut machine = machine();
        machine
            .assemble_and_run("\nJUMP 3\nHALT\nSETA 41\nINCA\nHALT\n")
            .unwrap();
        assert_eq!(42, machine.a);
        assert_eq!(EXCEPTION_OK, machine.e);
    }

    #[test]
    fn test_jxnz() {
        let mut machine = machine();
        machine
            .assemble_and_run(
                "
SETA 0
SETX 10
.loop
INCA
DECX
JXNZ loop
HALT
",
            )
            .unwrap();
        assert_eq!(10, machine.a);
        assert_eq!(0, machine.x);
    }

    #[test]
    fn test_psha() {
        let mut machine = machine();
        machine.assemble_and_run("SETA 42\nPSHA\nHALT").unwrap();
        assert_eq!(42, machine.a);
        assert_eq!(1, machine.s);
        assert_eq!(42, machine.memory[0]);
    }

    #[test]
    fn test_popa() {
        let mut machine = machine();
        machine
            .assemble_and_run("\nSETA 42\nPSHA\nSETA 3\nPOPA\nHALT\n")
            .unwrap();
        assert_eq!(42, machine.a);
        assert_eq!(0, machine.s);
    }

    #[test]
    fn test_stack_overflow_faults() {
        let mut machine = machine();
        machine.s = STACK_SIZE;
        machine.assemble_and_run("PSHA\nHALT").unwrap();
        assert_eq!(EXCEPTION_OUT_OF_MEMORY, machine.e);
    }

    #[test]
    fn test_stack_underflow_faults() {
        let mut machine = machine();
        machine.assemble_and_run("POPA\nHALT").unwrap();
        assert_eq!(EXCEPTION_ILLEGAL_INSTRUCTION, machine.e);
    }

    #[test]
    fn test_move_to_x_and_y() {
        let mut machine = machine();
        machine
            .assemble_and_run("\nSETA 42\nMOVE A -> X\nHALT\n")
            .unwrap();
        assert_eq!(42, machine.x);

        let mut machine = self::machine();
        machine
            .assemble_and_run("\nSETA 42\nMOVE A -> Y\nHALT\n")
            .unwrap();
        assert_eq!(42, machine.y);
    }

    #[test]
    fn test_move_dereferenced_register() {
        let mut machine = machine();
        machine
            .assemble_and_run(
                "
JUMP start
VARB num 42
.start
SETA num
MOVE *A -> X
HALT
",
            )
            .unwrap();
        assert_eq!(42, machine.x);
    }

    #[test]
    fn test_move_accumulator_to_variable() {
        let mut machine = machine();
        machine
            .assemble_and_run(
                "
JUMP start
VARB num 0
.start
SETA 42
MOVE A -> num
HALT
",
            )
            .unwrap();
        assert_eq!(42, machine.memory[MEM_OFFSET as usize + 2]);
    }

    #[test]
    fn test_move_variable_to_accumulator() {
        let mut machine = machine();
        machine
            .assemble_and_run(
                "
JUMP start
VARB num 42
.start
MOVE num -> A
HALT
",
            )
            .unwrap();
        assert_eq!(42, machine.a);
    }

    #[test]
    fn test_move_to_unknown_identifier_fails() {
        let mut machine = machine();
        let err = machine.assemble_and_run("MOVE A -> Z").unwrap_err();
        assert!(matches!(err, AsmError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_integer_variable_lands_in_memory() {
        let mut machine = machine();
        machine.assemble_and_run("VARB num 42").unwrap();
        assert_eq!(42, machine.memory[MEM_OFFSET as usize]);
    }

    #[test]
    fn test_string_variable_lands_in_memory() {
        let mut machine = machine();
        machine.assemble_and_run("VARB msg \"hello world\"").unwrap();
        let base = MEM_OFFSET as usize;
        let want: Vec<Word> = "hello world".chars().map(|c| c as Word).collect();
        assert_eq!(want, machine.memory[base..base + want.len()].to_vec());
    }

    #[test]
    fn test_illegal_instruction_faults() {
        let mut machine = machine();
        machine.run_program(&[0]);
        assert_eq!(EXCEPTION_ILLEGAL_INSTRUCTION, machine.e);
    }

    #[test]
    fn test_running_off_memory_faults() {
        // A NOOP in the last memory cell executes; the fetch after it has
        // nowhere left to read from.
        let mut machine = machine();
        machine.p = MEM_SIZE - STACK_SIZE - 1;
        machine.memory[(MEM_SIZE - 1) as usize] = Op::Noop as Word;
        machine.run();
        assert_eq!(EXCEPTION_OUT_OF_MEMORY, machine.e);
    }

    #[test]
    fn test_halt_in_last_cell_halts_cleanly() {
        let mut machine = machine();
        machine.p = MEM_SIZE - STACK_SIZE - 1;
        machine.memory[(MEM_SIZE - 1) as usize] = Op::Halt as Word;
        machine.run();
        assert_eq!(EXCEPTION_OK, machine.e);
        assert_eq!(MEM_SIZE - STACK_SIZE, machine.p);
    }

    #[test]
    fn test_program_counter_past_memory_faults() {
        let mut machine = machine();
        machine.p = MEM_SIZE;
        machine.run();
        assert_eq!(EXCEPTION_OUT_OF_MEMORY, machine.e);
    }

    #[test]
    fn test_bad_register_code_faults() {
        let mut machine = machine();
        machine.run_program(&[Op::Adda as Word, 9, Op::Halt as Word]);
        assert_eq!(EXCEPTION_ILLEGAL_INSTRUCTION, machine.e);
    }

    #[test]
    fn test_factorial() {
        let tests = vec![
            (1, 1),
            (2, 2),
            (3, 6),
            (4, 24),
            (5, 120),
            (6, 720),
            (7, 5040),
        ];
        for (n, want) in tests {
            let mut machine = machine();
            let program = format!(
                "
SETA 1
SETX {}
.factorial
MULA X
DECX
JXNZ factorial
HALT
",
                n
            );
            machine.assemble_and_run(&program).unwrap();
            assert_eq!(want, machine.a, "{}!", n);
        }
    }
}
