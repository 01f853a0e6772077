//! # pimgen - Matrix Multiplication for Processing-in-Memory
//!
//! Compiles `C = A * B` into per-core programs for a PIM controller with a
//! 24-bit instruction word. Each core owns a contiguous block of output rows
//! and multiplies against operands laid out in row-addressed memory.
//!
//! ## Pipeline
//!
//! 1. **Dimensions**: `M x K * K x N`, given directly or by a dimension contract
//! 2. **Layout**: A, B and C packed into disjoint row regions
//! 3. **Partition**: output rows dealt out to cores in contiguous blocks
//! 4. **Generation**: one PROG..END program per core, built on the rayon pool
//! 5. **Output**: hex listing with `# Binary:` notes, packed image, three-address code
//!
//! ## Example
//!
//! ```ignore
//! use pimgen::{compile, CompilerConfig, Dimensions};
//!
//! let dims = Dimensions::new(4, 3, 2)?;
//! let program = compile(&dims, &CompilerConfig::default().with_cores(2))?;
//! std::fs::write("output.pim", program.render_listing())?;
//! println!("{}", program.stats());
//! ```

// Instruction set - 24-bit words and the micro-ops lowered to them
pub mod isa;
pub use isa::{Instruction, KernelFunction, MicroOp, Opcode};

// Problem shape
pub mod dims;
pub use dims::{load_contract, save_contract, DimensionContract, Dimensions};

// Memory layout and work partitioning
pub mod layout;
pub use layout::{plan, Matrix, MatrixRegion, MemoryMap, RowCapacity};
pub mod partition;
pub use partition::{partition, Partition, WorkAssignment};

// Code generation
pub mod codegen;
pub use codegen::{
    compile, expected_instruction_count, generate_core_program, CompiledProgram, CoreProgram,
    ProgramLine, ProgramStats,
};

// Configuration
pub mod config;
pub use config::CompilerConfig;

// Output formats
pub mod image;
pub mod listing;
pub use listing::{hex_to_binary, parse_listing, render_listing, ListingEntry};
pub mod tac;
pub use tac::{generate_three_address_code, ThreeAddressCode};

// Error types
mod error;
pub use error::{PimError, Result};

// Validation utilities
pub mod validate;
pub use validate::{
    validate_directory, validate_file, validate_listing, ValidationResult, ValidationSummary,
};
