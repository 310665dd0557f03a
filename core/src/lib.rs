//! Interpreter core for CHIP-8, SUPER-CHIP and XO-CHIP programs.
//!
//! A host builds a [`Chip8`] with [`Chip8Builder`], calls [`Chip8::step`] at
//! its chosen instruction rate and [`Chip8::tick`] at 60Hz, forwards key
//! events with [`Chip8::set_key`] and renders [`Chip8::display`]. Audio is
//! produced on the host's own thread from the shared [`SoundEngine`].

mod chip8;
mod color;
mod display;
mod error;
mod input;
mod instruction;
mod memory;
mod registers;
mod snapshot;
mod sound;
mod timers;
mod variant;

pub use chip8::{Chip8, Chip8Builder, WaitState, AUDIO_BUFFER_SIZE};
pub use color::{
    frame_bytes, Chip8Color, Chip8ColorParseError, Palette, DEFAULT_BACKGROUND_COLOR,
    DEFAULT_BLEND_COLOR, DEFAULT_FOREGROUND_COLOR, DEFAULT_PLANE2_COLOR, FRAME_PIXELS,
};
pub use display::{
    planes_in, ColorMode, Display, Framebuffer, Resolution, SpriteEdge, HIRES_HEIGHT,
    HIRES_WIDTH, LOWRES_HEIGHT, LOWRES_WIDTH, PLANE_COUNT, SCROLL_COLUMNS,
};
pub use error::{Chip8Error, Result};
pub use input::{Keypad, NUM_KEYS};
pub use instruction::Instruction;
pub use memory::{Memory, DEFAULT_FONT, FONT_GLYPH_SIZE, FONT_START, PROGRAM_START};
pub use registers::{Registers, STACK_DEPTH, VF};
pub use snapshot::snapshot_size;
pub use sound::{
    SoundEngine, AMPLITUDE, BEEP_FREQUENCY, DEFAULT_SAMPLE_RATE, MAX_VOLUME, PATTERN_BITS,
    PATTERN_BYTES, PATTERN_RATE, SILENCE,
};
pub use timers::Timers;
pub use variant::{
    Capabilities, Quirks, Variant, CHIP8_MEMORY_SIZE, SCHIP_MEMORY_SIZE, XOCHIP_MEMORY_SIZE,
};
