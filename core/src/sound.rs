//! Buzzer and XO-CHIP pattern synthesiser.
//!
//! The interpreter thread writes and the host's audio callback reads through
//! a shared `Arc<SoundEngine>`. Every field is an atomic so the callback never
//! blocks. Pattern playback state (generation, playing flag and cursor) lives
//! in a single word: the interpreter starts a new generation, and the
//! callback only commits its progress with a compare-exchange against the
//! word it read, so a restart can never be undone by a late callback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Buzzer pitch in Hz
pub const BEEP_FREQUENCY: u32 = 440;

/// Output level of an unsigned 8 bit stream at rest
pub const SILENCE: u8 = 128;

/// Peak deviation from SILENCE at full volume
pub const AMPLITUDE: i32 = 64;

pub const PATTERN_BYTES: usize = 16;
pub const PATTERN_BITS: u32 = (PATTERN_BYTES * 8) as u32;

/// Playback rate of XO-CHIP patterns, in bits per second
pub const PATTERN_RATE: u32 = 4000;

pub const MAX_VOLUME: u8 = 100;

// Layout of the pattern track word
const TRACK_PLAYING: u32 = 1 << 31;
const TRACK_GENERATION_SHIFT: u32 = 23;
const TRACK_CURSOR_MASK: u32 = (1 << TRACK_GENERATION_SHIFT) - 1;

fn track(generation: u32, playing: bool, cursor: u32) -> u32 {
    let generation = (generation & 0xFF) << TRACK_GENERATION_SHIFT;
    let playing = if playing { TRACK_PLAYING } else { 0 };
    generation | playing | (cursor & TRACK_CURSOR_MASK)
}

fn track_generation(track: u32) -> u32 {
    (track >> TRACK_GENERATION_SHIFT) & 0xFF
}

#[derive(Debug)]
pub struct SoundEngine {
    sample_rate: u32,
    buzzer_on: AtomicBool,
    pattern: [AtomicU8; PATTERN_BYTES],
    /// Generation, playing flag and samples of the current pattern already
    /// rendered, packed so they change together
    track: AtomicU32,
    /// Position inside the buzzer's square wave period
    phase: AtomicU32,
    volume: AtomicU8,
    muted: AtomicBool,
    /// Bumped by `force_silence`; hosts drop buffered audio when it changes
    flushes: AtomicU32,
}

impl Default for SoundEngine {
    fn default() -> SoundEngine {
        SoundEngine::new(DEFAULT_SAMPLE_RATE)
    }
}

impl SoundEngine {
    pub fn new(sample_rate: u32) -> SoundEngine {
        SoundEngine {
            sample_rate: sample_rate.max(1),
            buzzer_on: AtomicBool::new(false),
            pattern: Default::default(),
            track: AtomicU32::new(0),
            phase: AtomicU32::new(0),
            volume: AtomicU8::new(MAX_VOLUME),
            muted: AtomicBool::new(false),
            flushes: AtomicU32::new(0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn start(&self) {
        self.buzzer_on.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.buzzer_on.store(false, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.buzzer_on.load(Ordering::Relaxed)
    }

    /// Whether a pattern is currently being played back
    pub fn is_playing(&self) -> bool {
        self.track.load(Ordering::Acquire) & TRACK_PLAYING != 0
    }

    /// True when the next rendered samples would not be silence
    pub fn is_audible(&self) -> bool {
        !self.is_muted() && self.volume() > 0 && (self.is_on() || self.is_playing())
    }

    /// Start playing a 128 bit pattern from its first bit
    pub fn play_pattern(&self, pattern: &[u8; PATTERN_BYTES]) {
        // Park the callback while the bytes change
        let generation = self.new_generation(false, 0);
        for (slot, byte) in self.pattern.iter().zip(pattern) {
            slot.store(*byte, Ordering::Relaxed);
        }
        self.track.store(track(generation, true, 0), Ordering::Release);
    }

    /// Replace the track with a fresh generation, returning that generation
    fn new_generation(&self, playing: bool, cursor: u32) -> u32 {
        let previous = self
            .track
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some(track(track_generation(old) + 1, playing, cursor))
            })
            .unwrap_or_else(|old| old);
        track_generation(previous) + 1
    }

    pub fn pattern(&self) -> [u8; PATTERN_BYTES] {
        let mut bytes = [0u8; PATTERN_BYTES];
        for (byte, slot) in bytes.iter_mut().zip(&self.pattern) {
            *byte = slot.load(Ordering::Relaxed);
        }
        bytes
    }

    /// Stop everything right away, used when the host pauses
    pub fn force_silence(&self) {
        self.stop();
        self.new_generation(false, 0);
        self.phase.store(0, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        log::debug!("audio flushed");
    }

    /// Number of times `force_silence` has been called
    pub fn flush_count(&self) -> u32 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Volume in percent, clamped to 0..=100
    pub fn set_volume(&self, percent: u8) {
        self.volume.store(percent.min(MAX_VOLUME), Ordering::Relaxed);
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> u32 {
        self.phase.load(Ordering::Relaxed)
    }

    pub fn pattern_cursor(&self) -> u32 {
        self.track.load(Ordering::Acquire) & TRACK_CURSOR_MASK
    }

    /// Fill `out` with unsigned 8 bit mono samples. This is the body of the
    /// host's audio callback.
    pub fn render(&self, out: &mut [u8]) {
        if self.is_muted() || (!self.is_on() && !self.is_playing()) {
            out.fill(SILENCE);
            return;
        }

        let volume = self.volume() as i32;
        let period = (self.sample_rate / BEEP_FREQUENCY).max(2);
        let samples_per_bit = (self.sample_rate / PATTERN_RATE).max(1);

        for sample in out.iter_mut() {
            if let Some(value) = self.next_pattern_sample(samples_per_bit, volume) {
                *sample = value;
                continue;
            }

            if self.is_on() {
                let phase = self.phase.load(Ordering::Relaxed) % period;
                *sample = level(phase < period / 2, volume);
                self.phase.store((phase + 1) % period, Ordering::Relaxed);
            } else {
                *sample = SILENCE;
            }
        }
    }

    /// Advance the pattern by one sample, or None when no pattern is playing.
    /// Losing the compare-exchange means the interpreter restarted or
    /// silenced the track, so the sample is recomputed from the new word.
    fn next_pattern_sample(&self, samples_per_bit: u32, volume: i32) -> Option<u8> {
        loop {
            let current = self.track.load(Ordering::Acquire);
            if current & TRACK_PLAYING == 0 {
                return None;
            }

            let generation = track_generation(current);
            let cursor = current & TRACK_CURSOR_MASK;
            let bit = cursor / samples_per_bit;
            let (value, next) = if bit < PATTERN_BITS {
                let high = self.pattern_bit(bit);
                (level(high, volume), track(generation, true, cursor + 1))
            } else {
                (SILENCE, track(generation, false, 0))
            };

            if self
                .track
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(value);
            }
        }
    }

    fn pattern_bit(&self, bit: u32) -> bool {
        let byte = self.pattern[(bit / 8) as usize].load(Ordering::Relaxed);
        (byte >> (7 - bit % 8)) & 1 == 1
    }

    pub(crate) fn restore(&self, state: &SoundState) {
        self.phase.store(state.phase, Ordering::Relaxed);
        self.set_muted(state.muted);
        self.set_volume(state.volume);
        self.buzzer_on.store(state.buzzer_on, Ordering::Relaxed);
        for (slot, byte) in self.pattern.iter().zip(&state.pattern) {
            slot.store(*byte, Ordering::Relaxed);
        }
        self.new_generation(state.playing, state.pattern_cursor);
    }

    pub(crate) fn capture(&self) -> SoundState {
        SoundState {
            phase: self.phase(),
            muted: self.is_muted(),
            volume: self.volume(),
            buzzer_on: self.is_on(),
            playing: self.is_playing(),
            pattern_cursor: self.pattern_cursor(),
            pattern: self.pattern(),
        }
    }
}

/// Plain copy of the engine's fields, used by save states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SoundState {
    pub phase: u32,
    pub muted: bool,
    pub volume: u8,
    pub buzzer_on: bool,
    pub playing: bool,
    pub pattern_cursor: u32,
    pub pattern: [u8; PATTERN_BYTES],
}

fn level(high: bool, volume: i32) -> u8 {
    let base = if high { AMPLITUDE } else { -AMPLITUDE };
    (SILENCE as i32 + base * volume / MAX_VOLUME as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_silent_when_idle() {
        let engine = SoundEngine::default();
        let mut out = [0u8; 64];
        engine.render(&mut out);
        assert!(out.iter().all(|s| *s == SILENCE));
        assert!(!engine.is_audible());
    }

    #[test]
    fn test_buzzer_square_wave() {
        let engine = SoundEngine::new(44100);
        engine.start();
        let mut out = [0u8; 100];
        engine.render(&mut out);
        // period is 100 samples: 50 high then 50 low
        assert!(out[..50].iter().all(|s| *s == 192));
        assert!(out[50..].iter().all(|s| *s == 64));
        assert_eq!(engine.phase(), 0);
    }

    #[test]
    fn test_volume_scales_output() {
        let engine = SoundEngine::new(44100);
        engine.set_volume(50);
        engine.start();
        let mut out = [0u8; 1];
        engine.render(&mut out);
        assert_eq!(out[0], 160);
    }

    #[test]
    fn test_volume_clamped() {
        let engine = SoundEngine::default();
        engine.set_volume(250);
        assert_eq!(engine.volume(), 100);
    }

    #[test]
    fn test_mute_outputs_silence() {
        let engine = SoundEngine::default();
        engine.start();
        engine.set_muted(true);
        let mut out = [0u8; 32];
        engine.render(&mut out);
        assert!(out.iter().all(|s| *s == SILENCE));
        assert!(!engine.is_audible());
    }

    #[test]
    fn test_pattern_plays_once() {
        // 8000Hz gives two samples per pattern bit
        let engine = SoundEngine::new(8000);
        let mut pattern = [0u8; PATTERN_BYTES];
        pattern[0] = 0b1000_0000;
        engine.play_pattern(&pattern);
        assert!(engine.is_playing());

        let mut out = [0u8; 4];
        engine.render(&mut out);
        assert_eq!(out, [192, 192, 64, 64]);

        let mut rest = [0u8; 256];
        engine.render(&mut rest);
        assert!(!engine.is_playing());
        assert_eq!(rest[255], SILENCE);
    }

    #[test]
    fn test_pattern_has_priority_over_buzzer() {
        let engine = SoundEngine::new(4000);
        engine.start();
        engine.play_pattern(&[0u8; PATTERN_BYTES]);
        let mut out = [0u8; 8];
        engine.render(&mut out);
        assert!(out.iter().all(|s| *s == 64));
        assert_eq!(engine.pattern_cursor(), 8);
    }

    #[test]
    fn test_stop_leaves_pattern_running() {
        let engine = SoundEngine::default();
        engine.start();
        engine.play_pattern(&[0xFF; PATTERN_BYTES]);
        engine.stop();
        assert!(engine.is_playing());
        assert!(engine.is_audible());
    }

    #[test]
    fn test_force_silence() {
        let engine = SoundEngine::default();
        engine.start();
        engine.play_pattern(&[0xFF; PATTERN_BYTES]);
        let mut out = [0u8; 16];
        engine.render(&mut out);

        engine.force_silence();

        assert!(!engine.is_on());
        assert!(!engine.is_playing());
        assert_eq!(engine.pattern_cursor(), 0);
        assert_eq!(engine.flush_count(), 1);
        engine.render(&mut out);
        assert!(out.iter().all(|s| *s == SILENCE));
    }

    #[test]
    fn test_render_from_another_thread() {
        let engine = Arc::new(SoundEngine::default());
        let callback = Arc::clone(&engine);
        let handle = thread::spawn(move || {
            let mut out = [0u8; 512];
            for _ in 0..200 {
                callback.render(&mut out);
            }
        });
        for n in 0..200u32 {
            if n % 2 == 0 {
                engine.start();
            } else {
                engine.stop();
            }
            engine.play_pattern(&[n as u8; PATTERN_BYTES]);
        }
        handle.join().unwrap();
        assert_eq!(engine.pattern(), [199u8; PATTERN_BYTES]);
    }

    #[test]
    fn test_restart_is_never_undone_by_callback() {
        // Callback at pattern rate, one sample per call
        let engine = Arc::new(SoundEngine::new(PATTERN_RATE));
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let engine = Arc::clone(&engine);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut out = [0u8; 1];
                while running.load(Ordering::Relaxed) {
                    engine.render(&mut out);
                    thread::sleep(std::time::Duration::from_micros(250));
                }
            })
        };

        let mut stopped = 0;
        for _ in 0..200_000 {
            engine.play_pattern(&[0xFF; PATTERN_BYTES]);
            if !engine.is_playing() {
                stopped += 1;
            }
        }
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(stopped, 0, "freshly started patterns reported as stopped");
    }

    #[test]
    fn test_generation_wraps() {
        let engine = SoundEngine::new(PATTERN_RATE);
        for _ in 0..300 {
            engine.force_silence();
        }
        engine.play_pattern(&[0xFF; PATTERN_BYTES]);
        let mut out = [0u8; 3];
        engine.render(&mut out);
        assert!(engine.is_playing());
        assert_eq!(engine.pattern_cursor(), 3);
    }

    #[test]
    fn test_capture_restore() {
        let engine = SoundEngine::default();
        engine.set_volume(40);
        engine.set_muted(true);
        engine.start();
        engine.play_pattern(&[0xA5; PATTERN_BYTES]);
        let state = engine.capture();

        let other = SoundEngine::default();
        other.restore(&state);
        assert_eq!(other.capture(), state);
    }
}
