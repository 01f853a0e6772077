//! Listing format - the line-oriented text form of a program
//!
//! ```text
//! # PIM Instructions for Matrix Multiplication      <- annotation
//! # Matrix dimensions: 1x1 * 1x1
//! # Using 1 cores
//!                                                   <- blank
//! # Instructions for Core 0 (Rows 0 to 0)
//! 020401 # Binary: 000000100000010000000001         <- instruction
//! 040400 # Binary: 000001000000010000000000
//! ...
//! ```
//!
//! An instruction line is a 6-digit hex word, optionally followed by a
//! `# Binary:` note. Lines starting with `#` and blank lines carry no
//! instructions.

use crate::codegen::{ProgramStats, ANNOTATION_MARKER};
use crate::error::{PimError, Result};
use crate::isa::Instruction;
use std::path::Path;

/// Prefix of the bit-string note after an instruction word
pub const BINARY_NOTE: &str = "Binary:";

/// Bit string for a hex string, four bits per digit
///
/// Digits are accepted in either case. Any other character becomes `????`.
pub fn hex_to_binary(hex: &str) -> String {
    hex.chars()
        .map(|c| match c.to_digit(16) {
            Some(nibble) => format!("{:04b}", nibble),
            None => "????".to_string(),
        })
        .collect()
}

/// Render listing lines as text, adding a `# Binary:` note to instructions
pub fn render_listing<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for line in lines {
        let line = line.as_ref();
        if line.is_empty() || line.starts_with(ANNOTATION_MARKER) {
            out.push_str(line);
        } else {
            out.push_str(&format!(
                "{} {} {} {}",
                line,
                ANNOTATION_MARKER,
                BINARY_NOTE,
                hex_to_binary(line)
            ));
        }
        out.push('\n');
    }
    out
}

/// Write a rendered listing to disk
pub fn write_listing<P: AsRef<Path>, S: AsRef<str>>(path: P, lines: &[S]) -> Result<()> {
    std::fs::write(path, render_listing(lines))?;
    Ok(())
}

/// One instruction line read back from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// 1-based source line
    pub line: usize,
    pub instruction: Instruction,
    /// Bit string from a trailing `# Binary:` note
    pub binary_note: Option<String>,
}

impl ListingEntry {
    /// True if there is no note, or the note matches the word
    pub fn note_matches(&self) -> bool {
        self.binary_note
            .as_deref()
            .map_or(true, |bits| bits == hex_to_binary(&self.instruction.to_hex()))
    }
}

/// Parse listing text into its instruction entries
pub fn parse_listing(source: &str) -> Result<Vec<ListingEntry>> {
    Ok(scan(source)?.0)
}

/// Line and opcode counts of listing text
pub fn listing_stats(source: &str) -> Result<ProgramStats> {
    Ok(scan(source)?.1)
}

/// Read and parse a listing file
pub fn read_listing<P: AsRef<Path>>(path: P) -> Result<Vec<ListingEntry>> {
    parse_listing(&std::fs::read_to_string(path)?)
}

fn scan(source: &str) -> Result<(Vec<ListingEntry>, ProgramStats)> {
    let mut entries = Vec::new();
    let mut stats = ProgramStats::default();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() {
            stats.add_blank();
            continue;
        }
        if text.starts_with(ANNOTATION_MARKER) {
            stats.add_annotation();
            continue;
        }

        let (word, note) = match text.split_once(ANNOTATION_MARKER) {
            Some((word, note)) => (word.trim(), Some(note.trim())),
            None => (text, None),
        };
        let instruction = Instruction::from_hex(word).map_err(|e| PimError::Listing {
            line,
            message: e.to_string(),
        })?;
        let binary_note = note
            .and_then(|n| n.strip_prefix(BINARY_NOTE))
            .map(|bits| bits.trim().to_string());

        stats.add_instruction(&instruction);
        entries.push(ListingEntry {
            line,
            instruction,
            binary_note,
        });
    }

    Ok((entries, stats))
}
