use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use gbemu_core::emulator::{Emulator, EmulatorOptions, DMG_CLOCK_SPEED};
use gbemu_core::sink::NullSink;
use gumdrop::Options;
use log::LevelFilter;
use simplelog::{CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

const FPS: u64 = 60;

#[derive(Options, Debug)]
struct AppOptions {
    /// Print this help message
    help: bool,
    /// The ROM file to run
    #[options(free)]
    rom_path: PathBuf,
    /// CPU speed multiplier
    #[options(default = "1")]
    speed: u32,
    /// Log level: off, error, warn, info, debug, trace
    #[options(default = "info")]
    log_level: String,
}

fn main() {
    let opts = AppOptions::parse_args_default_or_exit();
    let level = opts.log_level.parse().unwrap_or(LevelFilter::Info);

    if let Err(e) = init_logging(level).and_then(|_| run(opts)) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: LevelFilter) -> anyhow::Result<()> {
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> =
        vec![TermLogger::new(level, Config::default(), TerminalMode::Mixed)];

    if let Some(dirs) = directories::ProjectDirs::from("top", "hirtol", "gbemu") {
        let log_dir = dirs.data_local_dir();
        if fs::create_dir_all(log_dir).is_ok() {
            if let Ok(file) = fs::File::create(log_dir.join("gbemu.log")) {
                loggers.push(WriteLogger::new(level, Config::default(), file));
            }
        }
    }

    CombinedLogger::init(loggers).context("failed to initialise logging")
}

fn run(opts: AppOptions) -> anyhow::Result<()> {
    let rom = fs::read(&opts.rom_path).with_context(|| format!("reading ROM file {:?}", opts.rom_path))?;

    let mut emulator = Emulator::new(rom, Some(opts.rom_path.clone()), EmulatorOptions::default())
        .with_context(|| format!("loading ROM {:?}", opts.rom_path))?;

    log::info!("running {:?} as {:?}", emulator.game_title(), emulator.emulated_model());

    let speed = opts.speed.max(1) as u64;
    let cycles_per_frame = (DMG_CLOCK_SPEED * speed) / FPS;
    let frame_budget = Duration::from_secs_f64(1.0 / FPS as f64);

    let mut sink = NullSink::default();

    loop {
        let frame_start = Instant::now();
        emulator.run_for(cycles_per_frame, &mut sink);
        let elapsed = frame_start.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }
}
