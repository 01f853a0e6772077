//! MicroOp - semantic micro-operations and their lowering to raw fields
//!
//! The wire format overloads the address field: PROG carries a kernel
//! function id there, and EXE uses it for memory rows, intra-row offsets,
//! and control sentinels alike. The generator only ever builds `MicroOp`s;
//! the overloaded encoding lives in [`MicroOp::lower`] and nowhere else.
//!
//! | MicroOp              | Opcode | R | W | Address field         |
//! |----------------------|--------|---|---|-----------------------|
//! | ProgramCore          | PROG   | 1 | 0 | function id (1=MATMUL)|
//! | LoadAddress          | EXE    | 1 | 0 | physical row          |
//! | LoadOffset           | EXE    | 0 | 0 | offset within row     |
//! | ClearAccumulator     | EXE    | 0 | 0 | 0                     |
//! | MultiplyAccumulate   | EXE    | 0 | 0 | 2                     |
//! | StoreAddress         | EXE    | 0 | 1 | physical row          |
//! | StoreOffset          | EXE    | 0 | 0 | offset within row     |
//! | EndCore              | END    | 0 | 0 | 0                     |

use super::Instruction;
use std::fmt;

/// EXE address value that clears the accumulator
pub const CLEAR_SENTINEL: usize = 0;

/// EXE address value that multiplies the two most recent operands into the accumulator
pub const MAC_SENTINEL: usize = 2;

/// Kernel function a core is programmed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelFunction {
    /// Dense matrix multiplication
    MatMul,
}

impl KernelFunction {
    /// Function id carried in the PROG address field
    pub const fn id(self) -> usize {
        match self {
            Self::MatMul => 1,
        }
    }
}

/// One semantic step of a core program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicroOp {
    /// Program the core with a kernel function
    ProgramCore { function: KernelFunction },
    /// Select a physical row to read from
    LoadAddress { row: usize },
    /// Select the element offset within the row just addressed
    LoadOffset { offset: usize },
    /// Zero the accumulator
    ClearAccumulator,
    /// Accumulator += product of the two most recently loaded operands
    MultiplyAccumulate,
    /// Select a physical row to write the accumulator to
    StoreAddress { row: usize },
    /// Select the element offset for the pending store
    StoreOffset { offset: usize },
    /// Terminate the core program
    EndCore,
}

impl MicroOp {
    /// Lower to the raw instruction for `core`
    pub const fn lower(&self, core: usize) -> Instruction {
        match *self {
            Self::ProgramCore { function } => Instruction::prog(core, true, false, function.id()),
            Self::LoadAddress { row } => Instruction::exe(core, true, false, row),
            Self::LoadOffset { offset } => Instruction::exe(core, false, false, offset),
            Self::ClearAccumulator => Instruction::exe(core, false, false, CLEAR_SENTINEL),
            Self::MultiplyAccumulate => Instruction::exe(core, false, false, MAC_SENTINEL),
            Self::StoreAddress { row } => Instruction::exe(core, false, true, row),
            Self::StoreOffset { offset } => Instruction::exe(core, false, false, offset),
            Self::EndCore => Instruction::end(core, false, false, 0),
        }
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramCore { function } => write!(f, "program {:?}", function),
            Self::LoadAddress { row } => write!(f, "load row {}", row),
            Self::LoadOffset { offset } => write!(f, "load offset {}", offset),
            Self::ClearAccumulator => write!(f, "clear acc"),
            Self::MultiplyAccumulate => write!(f, "mac"),
            Self::StoreAddress { row } => write!(f, "store row {}", row),
            Self::StoreOffset { offset } => write!(f, "store offset {}", offset),
            Self::EndCore => write!(f, "end"),
        }
    }
}
