use crate::error::{Chip8Error, Result};

/// Total addressable memory.
pub const MEM_SIZE: usize = 4096;
/// Programs are loaded (and start executing) here. Everything below is reserved for the
/// interpreter, we only use it to hold the font sprites.
pub const PROGRAM_START: usize = 0x200;
/// Address of the built-in hex digit sprites.
pub const FONT_ADDR: usize = 0x000;
/// Every font glyph is 5 rows tall.
pub const FONT_GLYPH_SIZE: usize = 5;

const FONT: [u8; 16 * FONT_GLYPH_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // '0'
    0x20, 0x60, 0x20, 0x20, 0x70, // '1'
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // '2'
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // '3'
    0x90, 0x90, 0xF0, 0x10, 0x10, // '4'
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // '5'
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // '6'
    0xF0, 0x10, 0x20, 0x40, 0x40, // '7'
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // '8'
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // '9'
    0xF0, 0x90, 0xF0, 0x90, 0x90, // 'A'
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // 'B'
    0xF0, 0x80, 0x80, 0x80, 0xF0, // 'C'
    0xE0, 0x90, 0x90, 0x90, 0xE0, // 'D'
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // 'E'
    0xF0, 0x80, 0xF0, 0x80, 0x80, // 'F'
];

/// Flat, bounds-checked byte store.
pub struct Memory {
    bytes: [u8; MEM_SIZE],
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Zeroed memory with the font installed.
    pub fn new() -> Self {
        let mut memory = Memory {
            bytes: [0; MEM_SIZE],
        };
        memory.reset();
        memory
    }

    /// Zero everything and re-install the font sprites.
    pub fn reset(&mut self) {
        self.bytes = [0; MEM_SIZE];
        self.bytes[FONT_ADDR..FONT_ADDR + FONT.len()].copy_from_slice(&FONT);
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Fails unless every address in `address..address + len` is addressable.
    pub fn check_range(&self, address: usize, len: usize) -> Result<()> {
        if len == 0 {
            // an empty range may sit right at the end
            if address > self.bytes.len() {
                return Err(Chip8Error::OutOfBounds {
                    address,
                    size: self.bytes.len(),
                });
            }
            return Ok(());
        }
        let last = address.saturating_add(len - 1);
        if last >= self.bytes.len() {
            return Err(Chip8Error::OutOfBounds {
                address: last,
                size: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, address: usize) -> Result<u8> {
        self.check_range(address, 1)?;
        Ok(self.bytes[address])
    }

    pub fn set(&mut self, address: usize, value: u8) -> Result<()> {
        self.check_range(address, 1)?;
        self.bytes[address] = value;
        Ok(())
    }

    /// Reads a big-endian opcode. Both bytes must be addressable.
    pub fn fetch16(&self, address: usize) -> Result<u16> {
        self.check_range(address, 2)?;
        Ok(((self.bytes[address] as u16) << 8) | (self.bytes[address + 1] as u16))
    }

    /// Borrow `len` bytes starting at `address`.
    pub fn slice(&self, address: usize, len: usize) -> Result<&[u8]> {
        self.check_range(address, len)?;
        Ok(&self.bytes[address..address + len])
    }

    /// Copy a program image to the load address. Memory is untouched if it doesn't fit.
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        let max = self.bytes.len() - PROGRAM_START;
        if program.len() > max {
            return Err(Chip8Error::RomTooLarge {
                len: program.len(),
                max,
            });
        }
        self.bytes[PROGRAM_START..PROGRAM_START + program.len()].copy_from_slice(program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_installed_and_rest_zeroed() {
        let m = Memory::new();
        assert_eq!(m.slice(FONT_ADDR, 5).unwrap(), &[0xF0, 0x90, 0x90, 0x90, 0xF0]);
        // 'F' is the last glyph
        assert_eq!(m.get(FONT_ADDR + 15 * FONT_GLYPH_SIZE + 4).unwrap(), 0x80);
        assert!(m.bytes[FONT.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reset_clears_program_but_keeps_font() -> Result<()> {
        let mut m = Memory::new();
        m.load_program(&[0x12, 0x34])?;
        m.set(FONT_ADDR, 0)?;
        m.reset();
        assert_eq!(m.get(PROGRAM_START)?, 0);
        assert_eq!(m.get(FONT_ADDR)?, 0xF0);
        Ok(())
    }

    #[test]
    fn test_fetch16_is_big_endian() -> Result<()> {
        let mut m = Memory::new();
        m.set(0x300, 0xA2)?;
        m.set(0x301, 0xF0)?;
        assert_eq!(m.fetch16(0x300)?, 0xA2F0);
        Ok(())
    }

    #[test]
    fn test_fetch16_needs_both_bytes() {
        let m = Memory::new();
        assert!(m.fetch16(MEM_SIZE - 2).is_ok());
        assert_eq!(
            m.fetch16(MEM_SIZE - 1),
            Err(Chip8Error::OutOfBounds {
                address: MEM_SIZE,
                size: MEM_SIZE
            })
        );
    }

    #[test]
    fn test_out_of_bounds_is_reported() {
        let mut m = Memory::new();
        assert!(m.get(MEM_SIZE - 1).is_ok());
        assert!(matches!(m.get(MEM_SIZE), Err(Chip8Error::OutOfBounds { .. })));
        assert!(matches!(m.set(MEM_SIZE + 7, 1), Err(Chip8Error::OutOfBounds { .. })));
        assert!(m.check_range(MEM_SIZE - 3, 3).is_ok());
        assert!(m.check_range(MEM_SIZE - 3, 4).is_err());
        assert!(m.check_range(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_program_load() -> Result<()> {
        let mut m = Memory::new();
        m.load_program(&[0x00, 0xe0])?; // clear screen
        assert_eq!(m.slice(PROGRAM_START, 2)?, &[0x00, 0xe0]);
        Ok(())
    }

    #[test]
    fn test_program_that_fills_memory_exactly_loads() {
        let mut m = Memory::new();
        let program = vec![0xAB; MEM_SIZE - PROGRAM_START];
        assert!(m.load_program(&program).is_ok());
        assert_eq!(m.get(MEM_SIZE - 1).unwrap(), 0xAB);
    }

    #[test]
    fn test_oversized_program_is_rejected_untouched() {
        let mut m = Memory::new();
        m.load_program(&[0x11, 0x22]).unwrap();
        let program = vec![0xFF; MEM_SIZE - PROGRAM_START + 1];
        assert_eq!(
            m.load_program(&program),
            Err(Chip8Error::RomTooLarge {
                len: MEM_SIZE - PROGRAM_START + 1,
                max: MEM_SIZE - PROGRAM_START
            })
        );
        assert_eq!(m.slice(PROGRAM_START, 3).unwrap(), &[0x11, 0x22, 0x00]);
    }
}
