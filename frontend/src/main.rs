use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{ensure, Context};
use chip8x_core::{
    frame_bytes, Chip8, Chip8Builder, Chip8Color, Palette, Quirks, SoundEngine, Variant,
    DEFAULT_SAMPLE_RATE, FRAME_PIXELS, HIRES_HEIGHT, HIRES_WIDTH, LOWRES_HEIGHT, LOWRES_WIDTH,
    MAX_VOLUME,
};
use clap::Parser;
use log::{error, info, warn};
use sdl2::{
    audio::{AudioCallback, AudioDevice, AudioSpecDesired},
    event::Event,
    keyboard::{Keycode, Mod},
    pixels::{Color, PixelFormatEnum},
};

/// Timer and vblank rate
const TICK_RATE: u32 = 60;

/// Volume change per key press
const VOLUME_STEP: u8 = 10;

/// Backlog dropped after a stall instead of being run in one burst
const MAX_LAG: Duration = Duration::from_millis(100);

/// CHIP-8 / SUPER-CHIP / XO-CHIP Emulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Filepath to the ROM file that will be executed
    #[clap(index = 1)]
    rom: PathBuf,

    /// Machine variant: chip8, schip or xochip
    #[clap(long, default_value = "chip8")]
    variant: Variant,

    /// Instructions per second [default: 700, 1000 or 2000 depending on the variant]
    #[clap(short, long)]
    ips: Option<u32>,

    /// Display scaling factor, in window pixels per low resolution pixel
    #[clap(short, long, default_value_t = 10)]
    scale: u32,

    /// Background Color as HEX 0xAABBFF [default: 0x000000]
    #[clap(long)]
    background: Option<Chip8Color>,

    /// Foreground Color as HEX 0xAABBFF [default: 0xFFFFFF]
    #[clap(long)]
    foreground: Option<Chip8Color>,

    /// XO-CHIP second plane Color as HEX [default: 0xAAAAAA]
    #[clap(long)]
    plane2_color: Option<Chip8Color>,

    /// XO-CHIP color where both planes overlap as HEX [default: 0x555555]
    #[clap(long)]
    blend_color: Option<Chip8Color>,

    /// PRNG seed
    #[clap(long)]
    seed: Option<u64>,

    /// Volume in percent
    #[clap(long, default_value_t = MAX_VOLUME, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: u8,

    /// Start muted
    #[clap(long)]
    mute: bool,

    /// Save state file used by Ctrl+S / Ctrl+L [default: ROM path with .state extension]
    #[clap(long)]
    state: Option<PathBuf>,

    /// Log every executed instruction
    #[clap(short, long)]
    debug: bool,

    /// Override the 8XY6/8XYE quirk: shift VY instead of VX
    #[clap(long)]
    shift_vy: Option<bool>,

    /// Override the FX55/FX65 quirk: advance I after load/store
    #[clap(long)]
    load_store_inc: Option<bool>,

    /// Override the BNNN quirk: add VX instead of V0
    #[clap(long)]
    jump_vx: Option<bool>,
}

/// Everything needed to rebuild the machine on reset or variant change
struct Session {
    rom: Vec<u8>,
    variant: Variant,
    args: Args,
    sound: Arc<SoundEngine>,
}

impl Session {
    fn quirks(&self) -> Quirks {
        let mut quirks = Quirks::for_variant(self.variant);
        if let Some(shift_vy) = self.args.shift_vy {
            quirks.shift_uses_vy = shift_vy;
        }
        if let Some(load_store_inc) = self.args.load_store_inc {
            quirks.load_store_increment_i = load_store_inc;
        }
        if let Some(jump_vx) = self.args.jump_vx {
            quirks.jump_with_vx = jump_vx;
        }
        quirks
    }

    fn ips(&self) -> u32 {
        self.args.ips.unwrap_or_else(|| self.variant.default_ips())
    }

    fn build(&self) -> anyhow::Result<Chip8> {
        self.sound.force_silence();

        let mut builder = Chip8Builder::new()
            .with_variant(self.variant)
            .with_quirks(self.quirks())
            .with_rom(self.rom.clone())
            .with_sound_engine(Arc::clone(&self.sound))
            .with_debug(self.args.debug);

        if let Some(seed) = self.args.seed {
            builder = builder.with_rng_seed(seed);
        }

        builder
            .build()
            .with_context(|| format!("failed to start {} machine", self.variant))
    }

    fn state_path(&self) -> PathBuf {
        self.args
            .state
            .clone()
            .unwrap_or_else(|| self.args.rom.with_extension("state"))
    }
}

/// Feeds the host audio device from the shared engine
struct EngineCallback(Arc<SoundEngine>);

impl AudioCallback for EngineCallback {
    type Channel = u8;

    fn callback(&mut self, out: &mut [u8]) {
        self.0.render(out);
    }
}

/// Output device, absent when the host has no audio
struct Audio(Option<AudioDevice<EngineCallback>>);

impl Audio {
    fn pause(&self) {
        if let Some(device) = &self.0 {
            device.pause();
        }
    }

    fn resume(&self) {
        if let Some(device) = &self.0 {
            device.resume();
        }
    }
}

fn open_audio(
    sdl_context: &sdl2::Sdl,
) -> anyhow::Result<(Arc<SoundEngine>, AudioDevice<EngineCallback>)> {
    let audio_subsystem = sdl_context
        .audio()
        .map_err(anyhow::Error::msg)
        .context("failed to initialise SDL audio")?;

    let desired = AudioSpecDesired {
        freq: Some(DEFAULT_SAMPLE_RATE as i32),
        channels: Some(1),
        samples: Some(512),
    };

    let mut engine = None;
    let device = audio_subsystem
        .open_playback(None, &desired, |obtained| {
            info!("audio device: {} Hz, {} samples", obtained.freq, obtained.samples);
            let sound = Arc::new(SoundEngine::new(obtained.freq.max(1) as u32));
            engine = Some(Arc::clone(&sound));
            EngineCallback(sound)
        })
        .map_err(anyhow::Error::msg)
        .context("failed to open audio device")?;

    let engine = engine.context("audio device did not report a format")?;
    Ok((engine, device))
}

/// Map a host key to a keypad key: 0-9 and A-F
fn keypad_key(keycode: Keycode) -> Option<u8> {
    let key = match keycode {
        Keycode::Num0 => 0x0,
        Keycode::Num1 => 0x1,
        Keycode::Num2 => 0x2,
        Keycode::Num3 => 0x3,
        Keycode::Num4 => 0x4,
        Keycode::Num5 => 0x5,
        Keycode::Num6 => 0x6,
        Keycode::Num7 => 0x7,
        Keycode::Num8 => 0x8,
        Keycode::Num9 => 0x9,
        Keycode::A => 0xA,
        Keycode::B => 0xB,
        Keycode::C => 0xC,
        Keycode::D => 0xD,
        Keycode::E => 0xE,
        Keycode::F => 0xF,
        _ => return None,
    };
    Some(key)
}

/// What the window title shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Status {
    variant: Variant,
    paused: bool,
    muted: bool,
    volume: u8,
}

impl Status {
    fn new(chip: &Chip8, paused: bool) -> Status {
        Status {
            variant: chip.variant(),
            paused,
            muted: chip.sound().is_muted(),
            volume: chip.sound().volume(),
        }
    }

    fn title(&self) -> String {
        let mut title = format!("chip8x - {}", self.variant);
        if self.muted {
            title.push_str(" [muted]");
        } else {
            title.push_str(&format!(" [{}%]", self.volume));
        }
        if self.paused {
            title.push_str(" (paused)");
        }
        title
    }
}

/// Deadline to schedule from, skipping ahead when it lags `now` too far
fn drop_backlog(deadline: Instant, now: Instant) -> Instant {
    if now.duration_since(deadline) > MAX_LAG {
        now
    } else {
        deadline
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    ensure!(
        (1..=100).contains(&args.scale),
        "Display scaling factor must be between [1-100]"
    );
    if let Some(ips) = args.ips {
        ensure!(
            (1..=1_000_000).contains(&ips),
            "Instructions per second [1-1000000]"
        );
    }

    let rom = std::fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM file {}", args.rom.display()))?;

    let palette = Palette::new(
        args.background.unwrap_or(Palette::default().colors[0]),
        args.foreground.unwrap_or(Palette::default().colors[1]),
        args.plane2_color.unwrap_or(Palette::default().colors[2]),
        args.blend_color.unwrap_or(Palette::default().colors[3]),
    );

    let sdl_context = sdl2::init()
        .map_err(anyhow::Error::msg)
        .context("failed to initialise SDL")?;
    let video_subsystem = sdl_context
        .video()
        .map_err(anyhow::Error::msg)
        .context("failed to initialise SDL video")?;

    // Audio is optional, the machine runs silently without a device
    let (sound, audio) = match open_audio(&sdl_context) {
        Ok((sound, device)) => (sound, Audio(Some(device))),
        Err(err) => {
            warn!("{:#}, continuing without sound", err);
            (Arc::new(SoundEngine::default()), Audio(None))
        }
    };
    sound.set_volume(args.volume);
    sound.set_muted(args.mute);
    audio.resume();

    let mut session = Session {
        rom,
        variant: args.variant,
        args,
        sound,
    };
    let mut chip = session.build()?;

    let mut status = Status::new(&chip, false);
    let window = video_subsystem
        .window(
            &status.title(),
            LOWRES_WIDTH as u32 * session.args.scale,
            LOWRES_HEIGHT as u32 * session.args.scale,
        )
        .position_centered()
        .build()
        .context("failed to create window")?;

    let mut canvas = window
        .into_canvas()
        .build()
        .context("failed to create canvas")?;

    let background = palette.colors[0];
    canvas.set_draw_color(Color::RGB(background.r, background.g, background.b));
    canvas.clear();
    canvas.present();

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(
            PixelFormatEnum::RGBX8888,
            HIRES_WIDTH as u32,
            HIRES_HEIGHT as u32,
        )
        .context("failed to create texture")?;
    let mut frame = vec![palette.colors[0]; FRAME_PIXELS];

    let mut event_pump = sdl_context
        .event_pump()
        .map_err(anyhow::Error::msg)
        .context("failed to create event pump")?;

    let tick_interval = Duration::from_secs(1) / TICK_RATE;
    let mut step_interval = Duration::from_secs(1) / session.ips();
    let mut next_step = Instant::now();
    let mut next_tick = next_step;
    let mut paused = false;
    let mut redraw = true;

    'running: loop {
        // Process events
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(keycode),
                    keymod,
                    repeat: false,
                    ..
                } if keymod.intersects(Mod::LCTRLMOD | Mod::RCTRLMOD) => match keycode {
                    Keycode::P => {
                        paused = !paused;
                        if paused {
                            // Silence right away and drop the rest of the beep
                            audio.pause();
                            session.sound.force_silence();
                            chip.timers_mut().sound = 0;
                            chip.release_keys();
                        } else {
                            audio.resume();
                        }
                        info!("{}", if paused { "paused" } else { "resumed" });
                    }
                    Keycode::R => {
                        audio.pause();
                        chip = session.build()?;
                        paused = false;
                        audio.resume();
                        info!("reset");
                    }
                    Keycode::S => {
                        let path = session.state_path();
                        if let Err(err) = chip.save_state(&path) {
                            error!("failed to save state to {}: {}", path.display(), err);
                        }
                    }
                    Keycode::L => {
                        let path = session.state_path();
                        audio.pause();
                        session.sound.force_silence();
                        if let Err(err) = chip.load_state(&path) {
                            error!("failed to load state from {}: {}", path.display(), err);
                        }
                        // Held host keys are unknown after a load
                        chip.release_keys();
                        if !paused {
                            audio.resume();
                        }
                        redraw = true;
                    }
                    _ => {}
                },
                Event::KeyDown {
                    keycode: Some(Keycode::F1),
                    repeat: false,
                    ..
                } => {
                    audio.pause();
                    session.variant = session.variant.next();
                    chip = session.build()?;
                    step_interval = Duration::from_secs(1) / session.ips();
                    paused = false;
                    audio.resume();
                    info!("switched to {}", session.variant);
                }
                Event::KeyDown {
                    keycode: Some(Keycode::M),
                    repeat: false,
                    ..
                } => {
                    let muted = !session.sound.is_muted();
                    session.sound.set_muted(muted);
                    info!("{}", if muted { "muted" } else { "unmuted" });
                }
                Event::KeyDown {
                    keycode: Some(Keycode::Minus),
                    ..
                } => {
                    let volume = session.sound.volume().saturating_sub(VOLUME_STEP);
                    session.sound.set_volume(volume);
                    info!("volume {}%", session.sound.volume());
                }
                Event::KeyDown {
                    keycode: Some(Keycode::Equals),
                    ..
                } => {
                    let volume = session.sound.volume().saturating_add(VOLUME_STEP);
                    session.sound.set_volume(volume);
                    info!("volume {}%", session.sound.volume());
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(key) = keypad_key(keycode) {
                        chip.set_key(key, true);
                    }
                }
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(key) = keypad_key(keycode) {
                        chip.set_key(key, false);
                    }
                }
                _ => {}
            }
        }

        let current = Status::new(&chip, paused);
        if current != status {
            status = current;
            canvas
                .window_mut()
                .set_title(&status.title())
                .context("failed to set window title")?;
        }

        let now = Instant::now();
        if paused {
            next_step = now;
            next_tick = now;
        } else {
            next_step = drop_backlog(next_step, now);
            next_tick = drop_backlog(next_tick, now);

            // Execute every CHIP-8 instruction that is due
            while next_step <= now {
                if let Err(err) = chip.step() {
                    error!("emulation stopped: {}", err);
                    paused = true;
                    audio.pause();
                    session.sound.force_silence();
                    break;
                }
                next_step += step_interval;
            }

            // Step timers at 60Hz, and redraw once per tick
            while next_tick <= now {
                chip.tick();
                next_tick += tick_interval;
                redraw = true;
            }
        }

        if redraw {
            palette.render(chip.display(), &mut frame);

            // Copy the rendered frame into GPU texture
            texture
                .update(None, frame_bytes(&frame), HIRES_WIDTH * 4)
                .context("failed to update texture")?;

            canvas
                .copy(&texture, None, None)
                .map_err(anyhow::Error::msg)
                .context("failed to copy texture")?;
            canvas.present();
            redraw = false;
        }

        // Wait until the next instruction or tick is due
        let wake = next_step.min(next_tick);
        if let Some(delay) = wake.checked_duration_since(Instant::now()) {
            std::thread::sleep(delay.min(tick_interval));
        } else if paused {
            std::thread::sleep(tick_interval);
        }
    }

    Ok(())
}
