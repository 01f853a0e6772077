//! Opcode - the 2-bit operation type at bits 18-17
//!
//! | Bits | Opcode | Purpose                                       |
//! |------|--------|-----------------------------------------------|
//! | 00   | NOOP   | Idle slot                                     |
//! | 01   | PROG   | Program a core with a kernel function         |
//! | 10   | EXE    | One micro-operation on a programmed core      |
//! | 11   | END    | Close the core's program                      |

use std::fmt;

/// Operation type (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Opcode {
    /// No operation
    NoOp = 0b00,
    /// Program a core
    Prog = 0b01,
    /// Execute a micro-operation
    Exe = 0b10,
    /// End of a core's program
    End = 0b11,
}

impl Opcode {
    /// All opcodes in encoding order
    pub const ALL: [Opcode; 4] = [Self::NoOp, Self::Prog, Self::Exe, Self::End];

    /// Raw 2-bit value
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode from the low two bits of `value`
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::NoOp,
            0b01 => Self::Prog,
            0b10 => Self::Exe,
            _ => Self::End,
        }
    }

    /// Mnemonic used in listings and diagnostics
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::NoOp => "NOOP",
            Self::Prog => "PROG",
            Self::Exe => "EXE",
            Self::End => "END",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
