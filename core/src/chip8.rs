// CHIP-8 / SUPER-CHIP / XO-CHIP interpreter
//
// Useful links:
// * [Guide to making a CHIP-8 emulator](https://tobiasvl.github.io/blog/write-a-chip-8-emulator/)
// * [XO-CHIP specification](https://johnearnest.github.io/Octo/docs/XO-ChipSpecification.html)
// * [SUPER-CHIP 1.1 reference](https://github.com/Chromatophore/HP48-Superchip)
//

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::display::{planes_in, ColorMode, Display, Resolution};
use crate::error::Result;
use crate::input::Keypad;
use crate::instruction::Instruction;
use crate::memory::{Memory, FONT_GLYPH_SIZE, FONT_START};
use crate::registers::{Registers, VF};
use crate::snapshot::Snapshot;
use crate::sound::{SoundEngine, DEFAULT_SAMPLE_RATE, PATTERN_BYTES};
use crate::timers::Timers;
use crate::variant::{Capabilities, Quirks, Variant};

/// Size of the XO-CHIP audio pattern buffer (16 patterns of 16 bytes)
pub const AUDIO_BUFFER_SIZE: usize = 256;

/// Why the interpreter is re-executing the same instruction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WaitState {
    Running,
    /// A draw is waiting for the next 60Hz tick
    Vblank,
    /// FX0A is waiting for any key
    KeyPress,
    /// FX0A captured this key and waits for it to be released
    KeyRelease(u8),
}

impl WaitState {
    pub(crate) fn tag(self) -> (u8, u8) {
        match self {
            WaitState::Running => (0, 0),
            WaitState::Vblank => (1, 0),
            WaitState::KeyPress => (2, 0),
            WaitState::KeyRelease(key) => (3, key),
        }
    }

    pub(crate) fn from_tag(tag: u8, key: u8) -> Option<WaitState> {
        match tag {
            0 => Some(WaitState::Running),
            1 => Some(WaitState::Vblank),
            2 => Some(WaitState::KeyPress),
            3 if key < 16 => Some(WaitState::KeyRelease(key)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Chip8Builder {
    variant: Variant,
    /// Overrides the variant's default quirks
    quirks: Option<Quirks>,
    rom: Option<Vec<u8>>,
    // PRNG Seed
    rng_seed: Option<u64>,
    sample_rate: u32,
    /// Share an existing engine instead of creating one
    sound: Option<Arc<SoundEngine>>,
    vblank_wait: bool,
    /// Log every executed instruction
    debug: bool,
}

impl Default for Chip8Builder {
    fn default() -> Chip8Builder {
        Chip8Builder {
            variant: Variant::CHIP_8,
            quirks: None,
            rom: None,
            rng_seed: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sound: None,
            vblank_wait: true,
            debug: false,
        }
    }
}

impl Chip8Builder {
    pub fn new() -> Chip8Builder {
        Chip8Builder::default()
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = Some(quirks);
        self
    }

    pub fn with_rom(mut self, rom: Vec<u8>) -> Self {
        self.rom = Some(rom);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_sound_engine(mut self, sound: Arc<SoundEngine>) -> Self {
        self.sound = Some(sound);
        self
    }

    /// Limit draws to one per `tick()`
    pub fn with_vblank_wait(mut self, vblank_wait: bool) -> Self {
        self.vblank_wait = vblank_wait;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn build(&self) -> Result<Chip8> {
        let caps = Capabilities::from(self.variant);

        // Memory comes with the font already in place
        let mut memory = Memory::new(caps.memory_size);
        if let Some(rom) = &self.rom {
            memory.load_rom(rom)?;
        }

        let mut display = Display::new();
        if caps.color_planes {
            display.set_color_mode(ColorMode::TwoPlane);
        }

        // Pseudo random number generator
        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let sound = match &self.sound {
            Some(sound) => Arc::clone(sound),
            None => Arc::new(SoundEngine::new(self.sample_rate)),
        };

        let quirks = self.quirks.unwrap_or_else(|| Quirks::for_variant(self.variant));
        info!(
            "built {} machine, {} bytes of memory, {:?}",
            self.variant, caps.memory_size, quirks
        );

        Ok(Chip8 {
            variant: self.variant,
            caps,
            quirks,
            memory,
            regs: Registers::new(),
            timers: Timers::new(),
            keypad: Keypad::new(),
            display,
            sound,
            audio_buffer: [0u8; AUDIO_BUFFER_SIZE],
            rng,
            wait: WaitState::Running,
            frame_ready: true,
            vblank_wait: self.vblank_wait,
            debug: self.debug,
        })
    }
}

#[derive(Debug)]
pub struct Chip8 {
    pub(crate) variant: Variant,
    pub(crate) caps: Capabilities,
    pub(crate) quirks: Quirks,
    pub(crate) memory: Memory,
    pub(crate) regs: Registers,
    pub(crate) timers: Timers,
    pub(crate) keypad: Keypad,
    pub(crate) display: Display,
    /// Shared with the host's audio callback
    pub(crate) sound: Arc<SoundEngine>,
    /// XO-CHIP pattern storage written by FX75 and read by 00Dn
    pub(crate) audio_buffer: [u8; AUDIO_BUFFER_SIZE],
    /// PRNG Generator
    pub(crate) rng: StdRng,
    pub(crate) wait: WaitState,
    /// Raised by `tick`, lowered by a draw
    pub(crate) frame_ready: bool,
    pub(crate) vblank_wait: bool,
    pub(crate) debug: bool,
}

impl Chip8 {
    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.keypad.set_key(key, pressed);
    }

    /// Release every key, for when the host loses track of held keys
    pub fn release_keys(&mut self) {
        self.keypad.release_all();
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn sound(&self) -> &SoundEngine {
        &self.sound
    }

    /// Handle for the host's audio callback
    pub fn sound_handle(&self) -> Arc<SoundEngine> {
        Arc::clone(&self.sound)
    }

    pub fn audio_buffer(&self) -> &[u8; AUDIO_BUFFER_SIZE] {
        &self.audio_buffer
    }

    pub fn wait_state(&self) -> WaitState {
        self.wait
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        self.memory.load_rom(rom)?;
        info!("loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Execute one instruction. On error the program counter is left on the
    /// faulting instruction and nothing else has changed.
    pub fn step(&mut self) -> Result<()> {
        let pc = self.regs.pc;
        let result = self.fetch_execute();
        if let Err(err) = &result {
            warn!("0x{:04x}: {}", pc, err);
            self.regs.pc = pc;
        }

        // Buzzer follows the sound timer
        if self.timers.sound > 0 {
            self.sound.start();
        } else {
            self.sound.stop();
        }

        result
    }

    /// 60Hz heartbeat: decrements timers and opens the next draw window
    pub fn tick(&mut self) {
        self.timers.tick();
        self.frame_ready = true;
    }

    /// Serialize the whole machine
    pub fn snapshot(&self) -> Vec<u8> {
        Snapshot::capture(self).to_bytes()
    }

    /// Replace the machine state with a serialized one. The blob is fully
    /// validated first; on error nothing has changed.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot = Snapshot::parse(bytes, self.variant, self.caps.memory_size)?;
        snapshot.apply(self);
        Ok(())
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.snapshot())?;
        info!("saved state to {}", path.display());
        Ok(())
    }

    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.restore(&bytes)?;
        info!("loaded state from {}", path.display());
        Ok(())
    }

    fn fetch_execute(&mut self) -> Result<()> {
        let pc = self.regs.pc;
        let opcode = self.memory.read_u16_be(pc)?;
        let inst = Instruction::decode(opcode, &self.caps);

        if self.debug {
            debug!("0x{:04x}: 0x{:04x} {}", pc, opcode, inst);
        }

        self.regs.pc = pc.wrapping_add(inst.size());
        self.execute(inst)
    }

    fn execute(&mut self, inst: Instruction) -> Result<()> {
        match inst {
            Instruction::ClearScreen => self.display.clear(),
            Instruction::Return => self.regs.pc = self.regs.pop()?,
            Instruction::ScrollDown(n) => self.display.scroll_down(self.scroll_lines(n)),
            Instruction::ScrollUp(n) => self.display.scroll_up(self.scroll_lines(n)),
            Instruction::ScrollRight => self.display.scroll_right(),
            Instruction::ScrollLeft => self.display.scroll_left(),
            Instruction::Exit => trace!("ignoring exit"),
            Instruction::LowRes => self.set_resolution(Resolution::Low),
            Instruction::HighRes => self.set_resolution(Resolution::High),
            Instruction::PlayPattern(n) => {
                let start = n as usize * PATTERN_BYTES;
                let mut pattern = [0u8; PATTERN_BYTES];
                pattern.copy_from_slice(&self.audio_buffer[start..start + PATTERN_BYTES]);
                self.sound.play_pattern(&pattern);
            }
            Instruction::Jump(addr) => self.regs.pc = addr,
            Instruction::Call(addr) => {
                self.regs.push(self.regs.pc)?;
                self.regs.pc = addr;
            }
            Instruction::SkipEqImm(x, nn) => self.skip_if(self.v(x) == nn),
            Instruction::SkipNeImm(x, nn) => self.skip_if(self.v(x) != nn),
            Instruction::SkipEqReg(x, y) => self.skip_if(self.v(x) == self.v(y)),
            Instruction::SkipNeReg(x, y) => self.skip_if(self.v(x) != self.v(y)),
            Instruction::SaveRange(x, y) => {
                let regs = register_range(x, y);
                let dest = self.memory.slice_mut(self.regs.i as usize, regs.len())?;
                for (byte, reg) in dest.iter_mut().zip(&regs) {
                    *byte = self.regs.v[*reg];
                }
            }
            Instruction::LoadRange(x, y) => {
                let regs = register_range(x, y);
                let src = self.memory.slice(self.regs.i as usize, regs.len())?;
                for (byte, reg) in src.iter().zip(&regs) {
                    self.regs.v[*reg] = *byte;
                }
            }
            Instruction::SetImm(x, nn) => self.set_v(x, nn),
            Instruction::AddImm(x, nn) => self.set_v(x, self.v(x).wrapping_add(nn)),
            Instruction::Assign(x, y) => self.set_v(x, self.v(y)),
            Instruction::Or(x, y) => self.logic(x, self.v(x) | self.v(y)),
            Instruction::And(x, y) => self.logic(x, self.v(x) & self.v(y)),
            Instruction::Xor(x, y) => self.logic(x, self.v(x) ^ self.v(y)),
            Instruction::Add(x, y) => {
                let (res, carry) = self.v(x).overflowing_add(self.v(y));
                self.set_v(x, res);
                self.regs.v[VF] = carry as u8;
            }
            Instruction::Sub(x, y) => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.set_v(x, vx.wrapping_sub(vy));
                self.regs.v[VF] = (vx >= vy) as u8;
            }
            Instruction::SubReverse(x, y) => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.set_v(x, vy.wrapping_sub(vx));
                self.regs.v[VF] = (vy >= vx) as u8;
            }
            Instruction::ShiftRight(x, y) => {
                let src = self.shift_source(x, y);
                self.set_v(x, src >> 1);
                self.regs.v[VF] = src & 0x01;
            }
            Instruction::ShiftLeft(x, y) => {
                let src = self.shift_source(x, y);
                self.set_v(x, src << 1);
                self.regs.v[VF] = src >> 7;
            }
            Instruction::SetIndex(addr) => self.regs.i = addr,
            Instruction::JumpOffset(addr, x) => {
                let offset = if self.quirks.jump_with_vx {
                    self.v(x)
                } else {
                    self.v(0)
                };
                self.regs.pc = addr.wrapping_add(offset as u16);
            }
            Instruction::Random(x, nn) => {
                let n = self.rng.next_u32() as u8;
                self.set_v(x, n & nn);
            }
            Instruction::Draw(x, y, n) => self.draw(x, y, n)?,
            Instruction::SkipKeyPressed(x) => self.skip_if(self.keypad.is_pressed(self.v(x))),
            Instruction::SkipKeyNotPressed(x) => {
                self.skip_if(!self.keypad.is_pressed(self.v(x)))
            }
            Instruction::LongIndex => {
                // Operand is the word after the opcode, already skipped
                self.regs.i = self.memory.read_u16_be(self.regs.pc.wrapping_sub(2))?;
            }
            Instruction::SelectPlanes(x) => self.display.set_active_planes(self.v(x)),
            Instruction::GetDelay(x) => self.set_v(x, self.timers.delay),
            Instruction::WaitKey(x) => self.wait_key(x),
            Instruction::SetDelay(x) => self.timers.delay = self.v(x),
            Instruction::SetSound(x) => self.timers.sound = self.v(x),
            Instruction::AddIndex(x) => self.regs.i = self.regs.i.wrapping_add(self.v(x) as u16),
            Instruction::FontChar(x) => {
                self.regs.i = FONT_START + (self.v(x) & 0xF) as u16 * FONT_GLYPH_SIZE;
            }
            Instruction::Bcd(x) => {
                let vx = self.v(x);
                let dest = self.memory.slice_mut(self.regs.i as usize, 3)?;
                dest.copy_from_slice(&[vx / 100, (vx / 10) % 10, vx % 10]);
            }
            Instruction::Store(x) => {
                let len = x as usize + 1;
                let dest = self.memory.slice_mut(self.regs.i as usize, len)?;
                dest.copy_from_slice(&self.regs.v[..len]);
                self.advance_index(len);
            }
            Instruction::Load(x) => {
                let len = x as usize + 1;
                let src = self.memory.slice(self.regs.i as usize, len)?;
                self.regs.v[..len].copy_from_slice(src);
                self.advance_index(len);
            }
            Instruction::SaveAudio(x) => {
                let len = x as usize + 1;
                self.audio_buffer[..len].copy_from_slice(&self.regs.v[..len]);
            }
            Instruction::LoadAudio(x) => {
                let len = x as usize + 1;
                self.regs.v[..len].copy_from_slice(&self.audio_buffer[..len]);
            }
            Instruction::Unknown(opcode) => trace!("ignoring unknown opcode 0x{:04x}", opcode),
        }
        Ok(())
    }

    fn v(&self, reg: u8) -> u8 {
        self.regs.v[(reg & 0xF) as usize]
    }

    fn set_v(&mut self, reg: u8, value: u8) {
        self.regs.v[(reg & 0xF) as usize] = value;
    }

    fn logic(&mut self, x: u8, value: u8) {
        self.set_v(x, value);
        if self.caps.logic_resets_vf {
            self.regs.v[VF] = 0;
        }
    }

    fn shift_source(&self, x: u8, y: u8) -> u8 {
        if self.quirks.shift_uses_vy {
            self.v(y)
        } else {
            self.v(x)
        }
    }

    fn advance_index(&mut self, len: usize) {
        if self.quirks.load_store_increment_i {
            self.regs.i = self.regs.i.wrapping_add(len as u16);
        }
    }

    /// Skip the next instruction, which is two words long if it is F000 NNNN
    fn skip_if(&mut self, cond: bool) {
        if !cond {
            return;
        }
        let pc = self.regs.pc;
        let size = self
            .memory
            .read_u16_be(pc)
            .map(|opcode| Instruction::decode(opcode, &self.caps).size())
            .unwrap_or(2);
        self.regs.pc = pc.wrapping_add(size);
    }

    fn rewind(&mut self, wait: WaitState) {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        if self.wait != wait {
            trace!("waiting: {:?}", wait);
        }
        self.wait = wait;
    }

    fn scroll_lines(&self, n: u8) -> usize {
        if self.caps.scroll_doubles_in_hires && self.display.resolution() == Resolution::High {
            n as usize * 2
        } else {
            n as usize
        }
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.display.set_resolution(resolution);
        info!("switched to {:?} resolution", resolution);
    }

    fn wait_key(&mut self, x: u8) {
        match self.wait {
            WaitState::KeyRelease(key) if self.keypad.is_pressed(key) => {
                self.rewind(WaitState::KeyRelease(key));
            }
            WaitState::KeyRelease(_) => self.wait = WaitState::Running,
            _ => match self.keypad.pressed_key() {
                Some(key) => {
                    self.set_v(x, key);
                    self.rewind(WaitState::KeyRelease(key));
                }
                None => self.rewind(WaitState::KeyPress),
            },
        }
    }

    // DXYN: draw an N pixels tall sprite from the memory location that the I index register
    // is holding to the screen, at the horizontal X coordinate in VX and the Y coordinate in VY
    fn draw(&mut self, x: u8, y: u8, n: u8) -> Result<()> {
        if self.vblank_wait && !self.frame_ready {
            self.rewind(WaitState::Vblank);
            return Ok(());
        }

        let wide = n == 0 && self.caps.super_chip;
        let block = if wide { 32 } else { n as usize };
        let planes: Vec<u8> = planes_in(self.display.target_planes()).collect();

        // Every enabled plane reads its own block, plane 0 first
        let data = self
            .memory
            .slice(self.regs.i as usize, block * planes.len())?
            .to_vec();

        let (ox, oy) = (self.v(x), self.v(y));
        let edge = self.caps.sprite_edge;
        let mut collision = false;
        for (plane, sprite) in planes.iter().zip(data.chunks(block.max(1))) {
            collision |= self.display.draw_plane(ox, oy, sprite, wide, *plane, edge);
        }

        self.regs.v[VF] = collision as u8;
        self.frame_ready = false;
        self.wait = WaitState::Running;
        Ok(())
    }
}

/// Registers VX..=VY in transfer order, descending when X > Y
fn register_range(x: u8, y: u8) -> Vec<usize> {
    let (x, y) = ((x & 0xF) as usize, (y & 0xF) as usize);
    if x <= y {
        (x..=y).collect()
    } else {
        (y..=x).rev().collect()
    }
}
