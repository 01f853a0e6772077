//! Instruction - 24-bit instruction word for the PIM controller
//!
//! ## Format
//!
//! ```text
//! 23      19 18  17 16        11  10   9   8          0
//! [ZERO:5  ][OPCODE:2][CORE:6  ][R:1][W:1][ADDRESS:9   ]
//! ```
//!
//! Fields wider than their slot are masked, never rejected: the core pointer
//! wraps at 64 and the address at 512.
//!
//! ## Examples
//!
//! ```text
//! PROG core=5, read, addr=1
//!   OPCODE  = 01       -> 0x20000
//!   CORE    = 5 << 11  -> 0x02800
//!   READ    = 1 << 10  -> 0x00400
//!   ADDRESS = 1        -> 0x00001
//!   word    = 0x022C01 -> "022c01"
//! ```

use super::{
    Opcode, ADDRESS_MASK, ADDRESS_SHIFT, CORE_MASK, CORE_SHIFT, HEX_DIGITS, OPCODE_MASK,
    OPCODE_SHIFT, READ_BIT, WORD_MASK, WRITE_BIT,
};
use crate::error::{PimError, Result};
use std::fmt;

/// A decoded PIM instruction (fields already masked to their widths)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Operation type
    pub opcode: Opcode,
    /// Core pointer (0-63)
    pub core: u8,
    /// Read flag
    pub read: bool,
    /// Write flag
    pub write: bool,
    /// Address or control value (0-511)
    pub address: u16,
}

impl Instruction {
    /// Instruction width in bits
    pub const BITS: u32 = 24;

    /// Create an instruction, masking `core` and `address` to their field widths
    pub const fn new(opcode: Opcode, core: usize, read: bool, write: bool, address: usize) -> Self {
        Self {
            opcode,
            core: (core & CORE_MASK as usize) as u8,
            read,
            write,
            address: (address & ADDRESS_MASK as usize) as u16,
        }
    }

    // =========================================================================
    // Constructors (one per opcode, shared layout)
    // =========================================================================

    /// NOOP instruction (all fields zero)
    pub const fn no_op() -> Self {
        Self::new(Opcode::NoOp, 0, false, false, 0)
    }

    /// PROG instruction
    pub const fn prog(core: usize, read: bool, write: bool, address: usize) -> Self {
        Self::new(Opcode::Prog, core, read, write, address)
    }

    /// EXE instruction
    pub const fn exe(core: usize, read: bool, write: bool, address: usize) -> Self {
        Self::new(Opcode::Exe, core, read, write, address)
    }

    /// END instruction
    pub const fn end(core: usize, read: bool, write: bool, address: usize) -> Self {
        Self::new(Opcode::End, core, read, write, address)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Pack into a 24-bit word (bits 23-19 always zero)
    pub const fn encode(&self) -> u32 {
        ((self.opcode.bits() as u32) << OPCODE_SHIFT)
            | ((self.core as u32 & CORE_MASK) << CORE_SHIFT)
            | ((self.read as u32) << READ_BIT)
            | ((self.write as u32) << WRITE_BIT)
            | ((self.address as u32 & ADDRESS_MASK) << ADDRESS_SHIFT)
    }

    /// Unpack a word produced by [`encode`](Self::encode)
    pub fn decode(word: u32) -> Result<Self> {
        let payload = (OPCODE_MASK << OPCODE_SHIFT) | (CORE_MASK << CORE_SHIFT)
            | (1 << READ_BIT) | (1 << WRITE_BIT) | ADDRESS_MASK;
        if word & !payload != 0 {
            return Err(PimError::malformed(
                format!("{:#08x}", word),
                "reserved bits 23-19 must be zero",
            ));
        }

        Ok(Self {
            opcode: Opcode::from_bits(((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8),
            core: ((word >> CORE_SHIFT) & CORE_MASK) as u8,
            read: (word >> READ_BIT) & 1 != 0,
            write: (word >> WRITE_BIT) & 1 != 0,
            address: ((word >> ADDRESS_SHIFT) & ADDRESS_MASK) as u16,
        })
    }

    /// Render as a zero-padded, lowercase 6-digit hex string
    pub fn to_hex(&self) -> String {
        format!("{:0width$x}", self.encode() & WORD_MASK, width = HEX_DIGITS)
    }

    /// Parse a 6-digit hex word (either case)
    pub fn from_hex(text: &str) -> Result<Self> {
        if text.len() != HEX_DIGITS {
            return Err(PimError::malformed(
                text,
                format!("expected {} hex digits, got {}", HEX_DIGITS, text.len()),
            ));
        }
        if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PimError::malformed(text, "non-hex character"));
        }
        let word = u32::from_str_radix(text, 16)
            .map_err(|e| PimError::malformed(text, e.to_string()))?;
        Self::decode(word)
    }

    /// Big-endian 3-byte form used by the binary image
    pub const fn to_bytes(&self) -> [u8; 3] {
        let word = self.encode();
        [(word >> 16) as u8, (word >> 8) as u8, word as u8]
    }

    /// Parse the 3-byte big-endian form
    pub fn from_bytes(bytes: &[u8; 3]) -> Result<Self> {
        Self::decode(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} c{:02} {}{} @{:03}",
            self.opcode.mnemonic(),
            self.core,
            if self.read { 'R' } else { '-' },
            if self.write { 'W' } else { '-' },
            self.address,
        )
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::no_op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prog_reference_word() {
        let instr = Instruction::prog(5, true, false, 1);
        assert_eq!(instr.encode(), (1 << 17) | (5 << 11) | (1 << 10) | 1);
        assert_eq!(instr.encode(), 0x22C01);
        assert_eq!(instr.to_hex(), "022c01");
    }

    #[test]
    fn test_no_op_is_zero() {
        assert_eq!(Instruction::no_op().encode(), 0);
        assert_eq!(Instruction::no_op().to_hex(), "000000");
    }

    #[test]
    fn test_opcode_bits() {
        assert_eq!(Instruction::exe(0, false, false, 0).encode(), 0x40000);
        assert_eq!(Instruction::end(0, false, false, 0).encode(), 0x60000);
        assert_eq!(Instruction::end(0, false, false, 0).to_hex(), "060000");
    }

    #[test]
    fn test_silent_masking() {
        let instr = Instruction::exe(64 + 3, false, true, 512 + 17);
        assert_eq!(instr.core, 3);
        assert_eq!(instr.address, 17);
        assert_eq!(instr, Instruction::exe(3, false, true, 17));
    }

    #[test]
    fn test_encode_masks_struct_literal_fields() {
        let raw = Instruction {
            opcode: Opcode::Exe,
            core: 200,
            read: false,
            write: false,
            address: 5000,
        };
        assert_eq!(raw.encode(), Instruction::exe(200, false, false, 5000).encode());

        let decoded = Instruction::decode(raw.encode()).unwrap();
        assert_eq!(decoded.opcode, Opcode::Exe);
        assert_eq!(decoded.core, 200 & 63);
        assert!(!decoded.read);
        assert!(!decoded.write);
        assert_eq!(decoded.address, 5000 & 511);
    }

    #[test]
    fn test_high_bits_always_zero() {
        let instr = Instruction::end(usize::MAX, true, true, usize::MAX);
        assert_eq!(instr.encode() >> 19, 0);
        assert_eq!(instr.to_hex(), "07ffff");
    }

    #[test]
    fn test_hex_roundtrip_recovers_masked_fields() {
        let instr = Instruction::exe(70, true, false, 1000);
        let parsed = Instruction::from_hex(&instr.to_hex()).unwrap();
        assert_eq!(parsed.opcode, Opcode::Exe);
        assert_eq!(parsed.core, 70 % 64);
        assert!(parsed.read);
        assert!(!parsed.write);
        assert_eq!(parsed.address, (1000 % 512) as u16);
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        assert_eq!(
            Instruction::from_hex("022C01").unwrap(),
            Instruction::prog(5, true, false, 1)
        );
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Instruction::from_hex("22c01").is_err());
        assert!(Instruction::from_hex("0x2c01").is_err());
        assert!(Instruction::from_hex("0g2c01").is_err());
        // Reserved bits set
        assert!(Instruction::from_hex("f00000").is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let instr = Instruction::exe(9, false, true, 300);
        let bytes = instr.to_bytes();
        assert_eq!(bytes, [0x04, 0x4B, 0x2C]);
        assert_eq!(Instruction::from_bytes(&bytes).unwrap(), instr);
    }

    #[test]
    fn test_display() {
        let display = Instruction::exe(3, true, false, 17).to_string();
        assert!(display.starts_with("EXE"));
        assert!(display.contains("c03"));
        assert!(display.contains("R-"));
        assert!(display.contains("@017"));
    }
}
