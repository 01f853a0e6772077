//! Binary image for compiled programs
//!
//! Packed form of the instruction stream for loading straight into the
//! controller, without the text listing.
//!
//! ## Binary Format
//!
//! ```text
//! HEADER (32 bytes, little-endian fields)
//! ├── Magic:       "PIMB" (4 bytes)
//! ├── Version:     u16 (format version)
//! ├── CoreCount:   u16 (cores with a program)
//! ├── WordCount:   u32 (number of instructions)
//! ├── RowCapacity: u32 (elements per memory row)
//! ├── Checksum:    u64 (FNV-1a of the payload)
//! └── Reserved:    8 bytes
//!
//! PAYLOAD (word_count * 3 bytes)
//! └── Each instruction: 24-bit word, big-endian
//! ```

use crate::codegen::CompiledProgram;
use crate::isa::{Instruction, Opcode};
use anyhow::{Context, Result};
use std::path::Path;

/// Magic bytes at the start of every image
pub const IMAGE_MAGIC: [u8; 4] = *b"PIMB";

/// Current image format version
pub const IMAGE_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Bytes per packed instruction
pub const WORD_SIZE: usize = 3;

/// Image header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub version: u16,
    pub core_count: u16,
    pub word_count: u32,
    pub row_capacity: u32,
    /// FNV-1a over the payload
    pub checksum: u64,
}

impl ImageHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&IMAGE_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.core_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.word_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.row_capacity.to_le_bytes());
        buf[16..24].copy_from_slice(&self.checksum.to_le_bytes());
        // 24..32 reserved
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            anyhow::bail!("Header too short: {} bytes", data.len());
        }
        if data[0..4] != IMAGE_MAGIC {
            anyhow::bail!(
                "Invalid magic: expected PIMB, got {:?}",
                String::from_utf8_lossy(&data[0..4])
            );
        }

        let version = u16::from_le_bytes(data[4..6].try_into()?);
        if version != IMAGE_VERSION {
            anyhow::bail!("Unsupported image version {} (expected {})", version, IMAGE_VERSION);
        }

        Ok(Self {
            version,
            core_count: u16::from_le_bytes(data[6..8].try_into()?),
            word_count: u32::from_le_bytes(data[8..12].try_into()?),
            row_capacity: u32::from_le_bytes(data[12..16].try_into()?),
            checksum: u64::from_le_bytes(data[16..24].try_into()?),
        })
    }
}

/// A decoded image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramImage {
    pub header: ImageHeader,
    pub instructions: Vec<Instruction>,
}

impl ProgramImage {
    /// Hex words, one per instruction, for writing back out as a listing
    pub fn to_lines(&self) -> Vec<String> {
        self.instructions.iter().map(Instruction::to_hex).collect()
    }

    /// Instructions split at each PROG
    pub fn core_blocks(&self) -> Vec<&[Instruction]> {
        let mut blocks = Vec::new();
        let mut start = 0;
        for (idx, instr) in self.instructions.iter().enumerate() {
            if instr.opcode == Opcode::Prog && idx > start {
                blocks.push(&self.instructions[start..idx]);
                start = idx;
            }
        }
        if start < self.instructions.len() {
            blocks.push(&self.instructions[start..]);
        }
        blocks
    }
}

/// Pack a compiled program into an image
pub fn serialize(program: &CompiledProgram) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(program.instruction_count() * WORD_SIZE);
    for instr in program.instructions() {
        payload.extend_from_slice(&instr.to_bytes());
    }

    let header = ImageHeader {
        version: IMAGE_VERSION,
        core_count: u16::try_from(program.cores.len()).context("Too many cores for image")?,
        word_count: u32::try_from(program.instruction_count())
            .context("Too many instructions for image")?,
        row_capacity: u32::try_from(program.memory_map.row_capacity.get())
            .context("Row capacity does not fit the image header")?,
        checksum: checksum(&payload),
    };

    let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
    output.extend_from_slice(&header.to_bytes());
    output.extend(payload);
    Ok(output)
}

/// Unpack and verify an image
pub fn deserialize(data: &[u8]) -> Result<ProgramImage> {
    let header = ImageHeader::from_bytes(data)?;

    let payload_end = HEADER_SIZE + header.word_count as usize * WORD_SIZE;
    if payload_end != data.len() {
        anyhow::bail!(
            "Image length mismatch: header says {} bytes, have {}",
            payload_end,
            data.len()
        );
    }

    let payload = &data[HEADER_SIZE..payload_end];
    let actual = checksum(payload);
    if actual != header.checksum {
        anyhow::bail!(
            "Checksum mismatch: expected {:016x}, got {:016x}",
            header.checksum,
            actual
        );
    }

    let instructions = payload
        .chunks_exact(WORD_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: [u8; WORD_SIZE] = chunk.try_into()?;
            Instruction::from_bytes(&bytes).with_context(|| format!("Instruction {} is invalid", i))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProgramImage {
        header,
        instructions,
    })
}

/// Save a compiled program as an image file
pub fn save_to_file(program: &CompiledProgram, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, serialize(program)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Load an image file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ProgramImage> {
    let path = path.as_ref();
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    deserialize(&data)
}

/// 64-bit FNV-1a
fn checksum(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
