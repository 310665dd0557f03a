use thiserror::Error;

pub type Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("memory access out of range: 0x{addr:04x} (memory size 0x{size:x})")]
    AddressOutOfRange { addr: usize, size: usize },

    #[error("register index out of range: V{0:X}")]
    RegisterOutOfRange(usize),

    #[error("call stack overflow")]
    StackOverflow,

    #[error("call stack underflow")]
    StackUnderflow,

    #[error("ROM of {len} bytes does not fit in {capacity} bytes of program memory")]
    RomTooLarge { len: usize, capacity: usize },

    #[error("state memory size {found} does not match this machine ({expected})")]
    StateSizeMismatch { expected: usize, found: usize },

    #[error("state was saved by a different variant")]
    StateVariantMismatch,

    #[error("state truncated: needed {needed} more bytes, {available} available")]
    StateTruncated { needed: usize, available: usize },

    #[error("invalid state field: {0}")]
    InvalidState(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
