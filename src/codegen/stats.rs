//! Instruction statistics for generated or parsed listings

use crate::isa::{Instruction, Opcode};
use std::fmt;

/// Line and opcode counts of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramStats {
    /// All lines, including annotations and blanks
    pub lines: usize,
    pub annotations: usize,
    pub blank: usize,
    pub instructions: usize,
    /// Indexed by `Opcode::bits()`
    pub by_opcode: [usize; 4],
}

impl ProgramStats {
    pub fn add_instruction(&mut self, instr: &Instruction) {
        self.lines += 1;
        self.instructions += 1;
        self.by_opcode[instr.opcode.bits() as usize] += 1;
    }

    pub fn add_annotation(&mut self) {
        self.lines += 1;
        self.annotations += 1;
    }

    pub fn add_blank(&mut self) {
        self.lines += 1;
        self.blank += 1;
    }

    /// Instructions with the given opcode
    pub fn count(&self, opcode: Opcode) -> usize {
        self.by_opcode[opcode.bits() as usize]
    }
}

impl fmt::Display for ProgramStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total lines: {} (including {} comments)",
            self.lines,
            self.annotations + self.blank
        )?;
        writeln!(f, "Actual instructions: {}", self.instructions)?;
        for op in Opcode::ALL {
            writeln!(f, "  {} instructions: {}", op, self.count(op))?;
        }
        Ok(())
    }
}
