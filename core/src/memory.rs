use crate::error::{Chip8Error, Result};

/// Where programs are loaded and execution starts
pub const PROGRAM_START: u16 = 0x200;

/// Where the built-in hex glyphs live
pub const FONT_START: u16 = 0x050;

pub static DEFAULT_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Bytes per glyph in the built-in font
pub const FONT_GLYPH_SIZE: u16 = 5;

/// Flat byte-addressable RAM. Every access is checked against the size
/// chosen at construction.
#[derive(Clone, Debug)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Memory {
        let mut memory = Memory {
            bytes: vec![0u8; size],
        };
        memory.load_font(&DEFAULT_FONT);
        memory
    }

    /// Copy a font into the glyph region. A memory too small to hold it is
    /// left untouched.
    pub fn load_font(&mut self, font: &[u8; 80]) {
        let start = FONT_START as usize;
        if let Some(region) = self.bytes.get_mut(start..start + font.len()) {
            region.copy_from_slice(font);
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read(&self, addr: u16) -> Result<u8> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or_else(|| self.out_of_range(addr as usize))
    }

    pub fn write(&mut self, addr: u16, data: u8) -> Result<()> {
        let size = self.bytes.len();
        match self.bytes.get_mut(addr as usize) {
            Some(byte) => {
                *byte = data;
                Ok(())
            }
            None => Err(Chip8Error::AddressOutOfRange {
                addr: addr as usize,
                size,
            }),
        }
    }

    /// Big-endian 16 bit word, as instructions are stored
    pub fn read_u16_be(&self, addr: u16) -> Result<u16> {
        let bytes = self.slice(addr as usize, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Range-checked view of `len` bytes starting at `addr`
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        let end = self.checked_end(addr, len)?;
        Ok(&self.bytes[addr..end])
    }

    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8]> {
        let end = self.checked_end(addr, len)?;
        Ok(&mut self.bytes[addr..end])
    }

    /// Copy a program to PROGRAM_START. Fails before touching memory if it
    /// does not fit.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        let start = PROGRAM_START as usize;
        if rom.len() + start > self.bytes.len() {
            return Err(Chip8Error::RomTooLarge {
                len: rom.len(),
                capacity: self.bytes.len().saturating_sub(start),
            });
        }
        self.bytes[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn checked_end(&self, addr: usize, len: usize) -> Result<usize> {
        let end = addr + len;
        if end > self.bytes.len() {
            // report the first byte that falls outside
            return Err(self.out_of_range(addr.max(self.bytes.len())));
        }
        Ok(end)
    }

    fn out_of_range(&self, addr: usize) -> Chip8Error {
        Chip8Error::AddressOutOfRange {
            addr,
            size: self.bytes.len(),
        }
    }
}
