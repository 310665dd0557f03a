//! Binary save states.
//!
//! Everything is little-endian and laid out in a fixed order:
//!
//! | field                     | size          |
//! |---------------------------|---------------|
//! | variant                   | u8            |
//! | quirks                    | 3 x u8        |
//! | memory size               | u32           |
//! | memory                    | memory size   |
//! | V0..VF                    | 16 x u8       |
//! | I, PC                     | u16, u16      |
//! | SP                        | u8            |
//! | stack                     | 16 x u16      |
//! | delay, sound timers       | u8, u8        |
//! | keys                      | 16 x u8       |
//! | framebuffer               | 64 x 128 u8   |
//! | resolution, colour mode   | u8, u8        |
//! | active planes             | u8            |
//! | buzzer phase              | u32           |
//! | muted, volume             | u8, u8        |
//! | buzzer on, playing        | u8, u8        |
//! | pattern cursor            | u32           |
//! | current pattern           | 16 x u8       |
//! | audio pattern buffer      | 256 x u8      |
//! | wait state, wait key      | u8, u8        |
//! | frame ready               | u8            |
//!
//! A blob is parsed and validated completely before any of it is applied.

use crate::chip8::{Chip8, WaitState, AUDIO_BUFFER_SIZE};
use crate::display::{ColorMode, Framebuffer, Resolution, HIRES_HEIGHT, HIRES_WIDTH};
use crate::error::{Chip8Error, Result};
use crate::input::NUM_KEYS;
use crate::registers::{Registers, STACK_DEPTH};
use crate::sound::{SoundState, MAX_VOLUME, PATTERN_BITS, PATTERN_BYTES};
use crate::timers::Timers;
use crate::variant::{Quirks, Variant};

/// Size of a snapshot for a machine with `memory_size` bytes of RAM
pub fn snapshot_size(memory_size: usize) -> usize {
    4 + 4
        + memory_size
        + 16
        + 2
        + 2
        + 1
        + STACK_DEPTH * 2
        + 2
        + NUM_KEYS
        + HIRES_WIDTH * HIRES_HEIGHT
        + 3
        + 4
        + 4
        + 4
        + PATTERN_BYTES
        + AUDIO_BUFFER_SIZE
        + 3
}

/// Fully decoded copy of the machine state
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    variant: Variant,
    quirks: Quirks,
    memory: Vec<u8>,
    regs: Registers,
    timers: Timers,
    keys: [bool; NUM_KEYS],
    fb: Box<Framebuffer>,
    resolution: Resolution,
    color_mode: ColorMode,
    active_planes: u8,
    sound: SoundState,
    audio_buffer: [u8; AUDIO_BUFFER_SIZE],
    wait: WaitState,
    frame_ready: bool,
}

impl Snapshot {
    pub fn capture(chip: &Chip8) -> Snapshot {
        Snapshot {
            variant: chip.variant,
            quirks: chip.quirks,
            memory: chip.memory.as_slice().to_vec(),
            regs: chip.regs.clone(),
            timers: chip.timers,
            keys: *chip.keypad.keys(),
            fb: Box::new(*chip.display.framebuffer()),
            resolution: chip.display.resolution(),
            color_mode: chip.display.color_mode(),
            active_planes: chip.display.active_planes(),
            sound: chip.sound.capture(),
            audio_buffer: chip.audio_buffer,
            wait: chip.wait,
            frame_ready: chip.frame_ready,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer(Vec::with_capacity(snapshot_size(self.memory.len())));

        w.u8(self.variant.tag());
        w.bool(self.quirks.shift_uses_vy);
        w.bool(self.quirks.load_store_increment_i);
        w.bool(self.quirks.jump_with_vx);
        w.u32(self.memory.len() as u32);
        w.bytes(&self.memory);

        w.bytes(&self.regs.v);
        w.u16(self.regs.i);
        w.u16(self.regs.pc);
        w.u8(self.regs.sp);
        for addr in self.regs.stack {
            w.u16(addr);
        }

        w.u8(self.timers.delay);
        w.u8(self.timers.sound);
        for key in self.keys {
            w.bool(key);
        }

        for row in self.fb.iter() {
            w.bytes(row);
        }
        w.u8(self.resolution.tag());
        w.u8(self.color_mode.tag());
        w.u8(self.active_planes);

        w.u32(self.sound.phase);
        w.bool(self.sound.muted);
        w.u8(self.sound.volume);
        w.bool(self.sound.buzzer_on);
        w.bool(self.sound.playing);
        w.u32(self.sound.pattern_cursor);
        w.bytes(&self.sound.pattern);
        w.bytes(&self.audio_buffer);

        let (tag, key) = self.wait.tag();
        w.u8(tag);
        w.u8(key);
        w.bool(self.frame_ready);

        w.0
    }

    /// Decode and validate a blob for a machine of the given variant
    pub fn parse(bytes: &[u8], variant: Variant, memory_size: usize) -> Result<Snapshot> {
        let mut r = Reader { bytes, pos: 0 };

        let stored_variant = Variant::from_tag(r.u8()?).ok_or(Chip8Error::InvalidState("variant"))?;
        let quirks = Quirks {
            shift_uses_vy: r.bool()?,
            load_store_increment_i: r.bool()?,
            jump_with_vx: r.bool()?,
        };

        if stored_variant != variant {
            return Err(Chip8Error::StateVariantMismatch);
        }
        let stored_size = r.u32()? as usize;
        if stored_size != memory_size {
            return Err(Chip8Error::StateSizeMismatch {
                expected: memory_size,
                found: stored_size,
            });
        }
        if bytes.len() != snapshot_size(memory_size) {
            return Err(Chip8Error::StateSizeMismatch {
                expected: snapshot_size(memory_size),
                found: bytes.len(),
            });
        }
        let memory = r.take(memory_size)?.to_vec();

        let mut regs = Registers::new();
        regs.v.copy_from_slice(r.take(16)?);
        regs.i = r.u16()?;
        regs.pc = r.u16()?;
        regs.sp = r.u8()?;
        if regs.sp as usize > STACK_DEPTH {
            return Err(Chip8Error::InvalidState("stack pointer"));
        }
        for slot in regs.stack.iter_mut() {
            *slot = r.u16()?;
        }

        let timers = Timers {
            delay: r.u8()?,
            sound: r.u8()?,
        };
        let mut keys = [false; NUM_KEYS];
        for key in keys.iter_mut() {
            *key = r.bool()?;
        }

        let mut fb = Box::new([[0u8; HIRES_WIDTH]; HIRES_HEIGHT]);
        for row in fb.iter_mut() {
            row.copy_from_slice(r.take(HIRES_WIDTH)?);
        }
        if fb.iter().flatten().any(|p| *p > 0b11) {
            return Err(Chip8Error::InvalidState("pixel value"));
        }
        let resolution = Resolution::from_tag(r.u8()?).ok_or(Chip8Error::InvalidState("resolution"))?;
        let color_mode = ColorMode::from_tag(r.u8()?).ok_or(Chip8Error::InvalidState("colour mode"))?;
        let active_planes = r.u8()?;
        if active_planes > 0b11 {
            return Err(Chip8Error::InvalidState("active planes"));
        }

        let mut sound = SoundState {
            phase: r.u32()?,
            muted: r.bool()?,
            volume: r.u8()?,
            buzzer_on: r.bool()?,
            playing: r.bool()?,
            pattern_cursor: r.u32()?,
            pattern: [0u8; PATTERN_BYTES],
        };
        sound.pattern.copy_from_slice(r.take(PATTERN_BYTES)?);
        if sound.volume > MAX_VOLUME {
            return Err(Chip8Error::InvalidState("volume"));
        }
        // the cursor counts samples, so only a rough sanity bound applies
        if sound.pattern_cursor > PATTERN_BITS * 1024 {
            return Err(Chip8Error::InvalidState("pattern cursor"));
        }

        let mut audio_buffer = [0u8; AUDIO_BUFFER_SIZE];
        audio_buffer.copy_from_slice(r.take(AUDIO_BUFFER_SIZE)?);

        let (tag, key) = (r.u8()?, r.u8()?);
        let wait = WaitState::from_tag(tag, key).ok_or(Chip8Error::InvalidState("wait state"))?;
        let frame_ready = r.bool()?;

        Ok(Snapshot {
            variant: stored_variant,
            quirks,
            memory,
            regs,
            timers,
            keys,
            fb,
            resolution,
            color_mode,
            active_planes,
            sound,
            audio_buffer,
            wait,
            frame_ready,
        })
    }

    /// Overwrite `chip` with this state. Cannot fail; `parse` has already
    /// checked everything.
    pub fn apply(self, chip: &mut Chip8) {
        chip.quirks = self.quirks;
        chip.memory.as_mut_slice().copy_from_slice(&self.memory);
        chip.regs = self.regs;
        chip.timers = self.timers;
        chip.keypad.set_keys(self.keys);
        chip.display
            .restore(*self.fb, self.resolution, self.color_mode, self.active_planes);
        chip.sound.restore(&self.sound);
        chip.audio_buffer = self.audio_buffer;
        chip.wait = self.wait;
        chip.frame_ready = self.frame_ready;
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.0.push(v as u8);
    }

    fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.0.extend_from_slice(v);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len() - self.pos;
        if len > available {
            return Err(Chip8Error::StateTruncated {
                needed: len,
                available,
            });
        }
        let chunk = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(chunk)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Chip8Error::InvalidState("flag byte")),
        }
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
