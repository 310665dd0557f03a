use crate::error::{Chip8Error, Result};
use crate::memory::PROGRAM_START;

pub const STACK_DEPTH: usize = 16;

/// Index of the flag register
pub const VF: usize = 0xF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    /// General purpose registers
    pub v: [u8; 16],
    /// Index register
    pub i: u16,
    /// Program counter
    pub pc: u16,
    /// Stack pointer
    pub sp: u8,
    /// Call stack
    pub stack: [u16; STACK_DEPTH],
}

impl Default for Registers {
    fn default() -> Registers {
        Registers {
            v: [0u8; 16],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            stack: [0u16; STACK_DEPTH],
        }
    }
}

impl Registers {
    pub fn new() -> Registers {
        Registers::default()
    }

    pub fn get(&self, idx: usize) -> Result<u8> {
        self.v
            .get(idx)
            .copied()
            .ok_or(Chip8Error::RegisterOutOfRange(idx))
    }

    pub fn set(&mut self, idx: usize, value: u8) -> Result<()> {
        let reg = self
            .v
            .get_mut(idx)
            .ok_or(Chip8Error::RegisterOutOfRange(idx))?;
        *reg = value;
        Ok(())
    }

    pub fn push(&mut self, addr: u16) -> Result<()> {
        let sp = self.sp as usize;
        if sp >= STACK_DEPTH {
            return Err(Chip8Error::StackOverflow);
        }
        self.stack[sp] = addr;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp as usize])
    }

    /// Active part of the call stack, oldest frame first
    pub fn frames(&self) -> &[u16] {
        &self.stack[..(self.sp as usize).min(STACK_DEPTH)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, 0x200);
        assert_eq!(regs.sp, 0);
        assert_eq!(regs.i, 0);
        assert!(regs.frames().is_empty());
    }

    #[test]
    fn test_register_index() {
        let mut regs = Registers::new();
        regs.set(0xF, 7).unwrap();
        assert_eq!(regs.get(0xF).unwrap(), 7);
        assert!(matches!(regs.get(16), Err(Chip8Error::RegisterOutOfRange(16))));
        assert!(regs.set(16, 1).is_err());
    }

    #[test]
    fn test_push_pop() {
        let mut regs = Registers::new();
        regs.push(0x202).unwrap();
        regs.push(0x302).unwrap();
        assert_eq!(regs.frames(), &[0x202, 0x302]);
        assert_eq!(regs.pop().unwrap(), 0x302);
        assert_eq!(regs.pop().unwrap(), 0x202);
    }

    #[test]
    fn test_stack_overflow() {
        let mut regs = Registers::new();
        for n in 0..16 {
            regs.push(n).unwrap();
        }
        assert!(matches!(regs.push(0xABC), Err(Chip8Error::StackOverflow)));
        assert_eq!(regs.sp, 16);
    }

    #[test]
    fn test_stack_underflow() {
        let mut regs = Registers::new();
        assert!(matches!(regs.pop(), Err(Chip8Error::StackUnderflow)));
        assert_eq!(regs.sp, 0);
    }
}
