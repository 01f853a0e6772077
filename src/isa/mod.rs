//! PIM ISA - 24-bit instruction words for the matrix-multiply controller
//!
//! ## Format: 24-bit instructions
//!
//! ```text
//! [ZERO:5][OPCODE:2][CORE:6][READ:1][WRITE:1][ADDRESS:9]
//! ```
//!
//! - OPCODE: NOOP=00, PROG=01, EXE=10, END=11
//! - CORE: core pointer (0-63, masked)
//! - READ/WRITE: memory access flags
//! - ADDRESS: physical row, offset, function id or control sentinel (0-511, masked)
//!
//! Words are exchanged as 6-digit lowercase hex strings (24 bits / 4 bits per digit).
//!
//! ## Example Program (one core, M=N=K=1)
//!
//! ```text
//! 020401    PROG c00 R- @001   program MATMUL
//! 040400    EXE  c00 R- @000   load A row
//! 040000    EXE  c00 -- @000   A offset
//! 040000    EXE  c00 -- @000   clear accumulator
//! 040401    EXE  c00 R- @001   load B row
//! 040000    EXE  c00 -- @000   B offset
//! 040002    EXE  c00 -- @002   multiply-accumulate
//! 040202    EXE  c00 -W @002   store C row
//! 040000    EXE  c00 -- @000   C offset
//! 060000    END  c00 -- @000
//! ```

mod instruction;
mod micro_op;
mod opcode;

pub use instruction::Instruction;
pub use micro_op::{KernelFunction, MicroOp, CLEAR_SENTINEL, MAC_SENTINEL};
pub use opcode::Opcode;

/// Number of hex digits per instruction word
pub const HEX_DIGITS: usize = 6;

/// Mask of the 24 bits an instruction word occupies
pub const WORD_MASK: u32 = 0x00FF_FFFF;

/// Opcode field position and width
pub const OPCODE_SHIFT: u32 = 17;
pub const OPCODE_MASK: u32 = 0x3;

/// Core pointer field position and width
pub const CORE_SHIFT: u32 = 11;
pub const CORE_MASK: u32 = 0x3F;

/// Flag bit positions
pub const READ_BIT: u32 = 10;
pub const WRITE_BIT: u32 = 9;

/// Address field position and width
pub const ADDRESS_SHIFT: u32 = 0;
pub const ADDRESS_MASK: u32 = 0x1FF;

/// Number of distinct core pointers
pub const MAX_CORES: usize = (CORE_MASK + 1) as usize;

/// Number of distinct address values
pub const ADDRESS_SPACE: usize = (ADDRESS_MASK + 1) as usize;
