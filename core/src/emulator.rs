//! Top-level wiring: owns the `CPU`/`Memory` pair and drives them in
//! cycle-bounded chunks, pushing finished scanlines and completed frames out
//! through a [`Sink`] as they become available.
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::EmulatorError;
use crate::hardware::cartridge::rtc::Rtc;
use crate::hardware::cartridge::Cartridge;
use crate::hardware::cpu::CPU;
use crate::hardware::memory::MemoryMapper;
use crate::hardware::mmu::Memory;
use crate::hardware::ppu::palette::{DisplayColour, RGB, DEFAULT_DISPLAY_COLOURS};
use crate::hardware::ppu::RESOLUTION_WIDTH;
use crate::hardware::GameBoyModel;
use crate::io::joypad::InputKey;
use crate::sink::Sink;

/// The unscaled DMG/CGB system clock, in Hz. CGB double-speed mode runs the
/// CPU at twice this rate; `Memory::get_speed_shift` is how the rest of the
/// system finds out.
pub const DMG_CLOCK_SPEED: u64 = 4_194_304;

/// Carries the handful of things that have to be decided once, at load time,
/// rather than derived from the cartridge itself.
#[derive(Debug, Clone)]
pub struct EmulatorOptions {
    /// Forces DMG or CGB mode regardless of the cartridge's own CGB flag.
    /// `None` defers to the header.
    pub model_override: Option<GameBoyModel>,
    /// Previously-persisted battery RAM, used if no `.sav` file is found next
    /// to the ROM path (or no ROM path was given at all). Ignored if its
    /// length doesn't match what the cartridge's header declares.
    pub saved_ram: Option<Vec<u8>>,
    /// Previously-persisted RTC state, paired with `saved_ram` the same way.
    pub saved_rtc: Option<[u8; Rtc::BYTE_LEN]>,
    /// The RGB look applied when a sink asks for DMG shades to be resolved
    /// via [`Emulator::resolve_dmg_colour`]. Purely cosmetic; the raw 2-bit
    /// shade stream `draw_line_dmg` gets is unaffected.
    pub display_colour: DisplayColour,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        EmulatorOptions {
            model_override: None,
            saved_ram: None,
            saved_rtc: None,
            display_colour: DEFAULT_DISPLAY_COLOURS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmulatorOptionsBuilder {
    model_override: Option<GameBoyModel>,
    saved_ram: Option<Vec<u8>>,
    saved_rtc: Option<[u8; Rtc::BYTE_LEN]>,
    display_colour: DisplayColour,
}

impl Default for EmulatorOptionsBuilder {
    fn default() -> Self {
        EmulatorOptionsBuilder::from(EmulatorOptions::default())
    }
}

impl EmulatorOptionsBuilder {
    pub fn new() -> Self {
        EmulatorOptionsBuilder::default()
    }

    pub fn model_override(mut self, model: Option<GameBoyModel>) -> Self {
        self.model_override = model;
        self
    }

    pub fn saved_ram(mut self, ram: Option<Vec<u8>>) -> Self {
        self.saved_ram = ram;
        self
    }

    pub fn saved_rtc(mut self, rtc: Option<[u8; Rtc::BYTE_LEN]>) -> Self {
        self.saved_rtc = rtc;
        self
    }

    pub fn display_colour(mut self, colour: DisplayColour) -> Self {
        self.display_colour = colour;
        self
    }

    pub fn build(self) -> EmulatorOptions {
        EmulatorOptions {
            model_override: self.model_override,
            saved_ram: self.saved_ram,
            saved_rtc: self.saved_rtc,
            display_colour: self.display_colour,
        }
    }
}

impl From<EmulatorOptions> for EmulatorOptionsBuilder {
    fn from(from: EmulatorOptions) -> Self {
        EmulatorOptionsBuilder {
            model_override: from.model_override,
            saved_ram: from.saved_ram,
            saved_rtc: from.saved_rtc,
            display_colour: from.display_colour,
        }
    }
}

fn wall_clock_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct Emulator {
    cpu: CPU<Memory>,
    /// The scanline the frame buffer has been drained up to; everything in
    /// `0..next_line` for the line currently being rendered has already been
    /// pushed through the sink.
    next_line: u8,
    display_colour: DisplayColour,
}

impl Emulator {
    /// Loads `rom` and boots straight past where a boot ROM would have left
    /// off (§4.2 of the core's CPU reset state). `rom_path`, if given, is
    /// used only to derive a battery-save path next to the ROM file.
    pub fn new(rom: Vec<u8>, rom_path: Option<PathBuf>, options: EmulatorOptions) -> Result<Self, EmulatorError> {
        let cartridge =
            Cartridge::new(rom, rom_path, options.saved_ram, options.saved_rtc, wall_clock_seconds)?;
        let model = options.model_override.unwrap_or(GameBoyModel::Cgb);
        let mmu = Memory::new(cartridge, model);

        Ok(Emulator { cpu: CPU::new(mmu), next_line: 0, display_colour: options.display_colour })
    }

    /// Resolves a DMG 2-bit shade (as handed to [`crate::sink::Sink::draw_line_dmg`])
    /// to RGB under this emulator's configured [`DisplayColour`]. A
    /// convenience for sinks that want an RGB DMG look; the canonical output
    /// remains the raw shade stream.
    pub fn resolve_dmg_colour(&self, shade: u8) -> RGB {
        self.display_colour.get_colour(shade)
    }

    pub fn emulated_model(&self) -> GameBoyModel {
        self.cpu.mmu.emulated_model()
    }

    pub fn game_title(&self) -> &str {
        self.cpu.mmu.cartridge().map(|c| c.game_title()).unwrap_or("")
    }

    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.cpu.mmu.cartridge().and_then(|c| c.battery_ram())
    }

    pub fn press_key(&mut self, key: InputKey) {
        self.cpu.mmu.joypad_register.press_key(key, &mut self.cpu.mmu.interrupts);
    }

    pub fn release_key(&mut self, key: InputKey) {
        self.cpu.mmu.joypad_register.release_key(key, &mut self.cpu.mmu.interrupts);
    }

    /// Executes whole instructions until at least `target_cycles` T-states
    /// have elapsed, pushing every scanline and frame completed along the
    /// way through `sink`. Returns the number of cycles actually executed,
    /// which is `>= target_cycles` and `< target_cycles + 24` (the longest
    /// instruction on this ISA).
    pub fn run_for(&mut self, target_cycles: u64, sink: &mut impl Sink) -> u64 {
        sink.refresh_input();

        let start = self.cpu.cycles_performed as u64;
        while (self.cpu.cycles_performed as u64) - start < target_cycles {
            self.cpu.step_cycle();
            self.drain_scanlines(sink);
            if self.cpu.consume_vblank() {
                sink.flip();
            }
        }

        (self.cpu.cycles_performed as u64) - start
    }

    /// Runs until exactly one V-blank has fired, draining every scanline of
    /// the frame that produced it through `sink`.
    pub fn run_to_vblank(&mut self, sink: &mut impl Sink) {
        sink.refresh_input();

        loop {
            self.cpu.step_cycle();
            self.drain_scanlines(sink);
            if self.cpu.consume_vblank() {
                sink.flip();
                break;
            }
        }
    }

    /// Pushes every scanline that has finished rendering since the last call
    /// through the sink. The PPU renders a line's pixels into its own
    /// internal buffer the instant Mode 3 starts on that line and then
    /// advances `current_line()`.
    fn drain_scanlines(&mut self, sink: &mut impl Sink) {
        let current = self.cpu.mmu.ppu.current_line();
        if current < self.next_line {
            // A new frame started; VBlank already reset current_line to 0.
            self.next_line = 0;
        }

        while self.next_line < current && (self.next_line as usize) < crate::hardware::ppu::RESOLUTION_HEIGHT {
            let row = self.next_line as usize;
            let start = row * RESOLUTION_WIDTH;

            if self.cpu.mmu.emulated_model().is_cgb() {
                let mut line = [0u16; RESOLUTION_WIDTH];
                line.copy_from_slice(&self.cpu.mmu.ppu.cgb_frame_buffer()[start..start + RESOLUTION_WIDTH]);
                sink.draw_line_gbc(self.next_line, &line);
            } else {
                let mut line = [0u8; RESOLUTION_WIDTH];
                line.copy_from_slice(&self.cpu.mmu.ppu.dmg_frame_buffer()[start..start + RESOLUTION_WIDTH]);
                sink.draw_line_dmg(self.next_line, &line);
            }

            self.next_line += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ppu::RESOLUTION_HEIGHT;

    fn blank_rom() -> Vec<u8> {
        // ROM-only, 2 banks (32 KiB), no mapper. Header fields beyond the
        // mapper/size bytes are left zeroed; nothing under test reads them.
        vec![0u8; 0x8000]
    }

    #[derive(Default)]
    struct RecordingSink {
        dmg_lines_drawn: Vec<u8>,
        flips: u32,
    }

    impl Sink for RecordingSink {
        fn draw_line_dmg(&mut self, ly: u8, _line: &[u8; RESOLUTION_WIDTH]) {
            self.dmg_lines_drawn.push(ly);
        }

        fn draw_line_gbc(&mut self, _ly: u8, _line: &[u16; RESOLUTION_WIDTH]) {
            panic!("blank_rom runs DMG-forced; no CGB lines expected");
        }

        fn flip(&mut self) {
            self.flips += 1;
        }
    }

    fn dmg_emulator() -> Emulator {
        let options = EmulatorOptions { model_override: Some(GameBoyModel::Dmg), ..EmulatorOptions::default() };
        Emulator::new(blank_rom(), None, options).unwrap()
    }

    #[test]
    fn new_honours_model_override() {
        let emu = dmg_emulator();
        assert_eq!(emu.emulated_model(), GameBoyModel::Dmg);
    }

    #[test]
    fn run_for_executes_at_least_the_requested_cycles() {
        let mut emu = dmg_emulator();
        let mut sink = RecordingSink::default();
        let executed = emu.run_for(1_000, &mut sink);
        assert!(executed >= 1_000);
        assert!(executed < 1_000 + 24);
    }

    #[test]
    fn run_to_vblank_draws_every_visible_scanline_in_order_exactly_once() {
        let mut emu = dmg_emulator();
        let mut sink = RecordingSink::default();
        emu.run_to_vblank(&mut sink);

        assert_eq!(sink.flips, 1);
        let expected: Vec<u8> = (0..RESOLUTION_HEIGHT as u8).collect();
        assert_eq!(sink.dmg_lines_drawn, expected);
    }

    #[test]
    fn run_to_vblank_twice_restarts_scanline_draining_from_zero() {
        let mut emu = dmg_emulator();
        let mut sink = RecordingSink::default();
        emu.run_to_vblank(&mut sink);
        emu.run_to_vblank(&mut sink);

        assert_eq!(sink.flips, 2);
        assert_eq!(sink.dmg_lines_drawn.len(), RESOLUTION_HEIGHT * 2);
        assert_eq!(sink.dmg_lines_drawn[RESOLUTION_HEIGHT], 0);
    }

    #[test]
    fn press_and_release_key_do_not_panic_without_a_running_game() {
        let mut emu = dmg_emulator();
        emu.press_key(InputKey::A);
        emu.release_key(InputKey::A);
    }

    #[test]
    fn battery_ram_is_none_for_a_pure_rom_cartridge() {
        let emu = dmg_emulator();
        assert!(emu.battery_ram().is_none());
    }

    #[test]
    fn resolve_dmg_colour_uses_the_configured_palette() {
        let colour = DisplayColour {
            white: RGB(1, 2, 3),
            light_grey: RGB(4, 5, 6),
            dark_grey: RGB(7, 8, 9),
            black: RGB(10, 11, 12),
        };
        let options = EmulatorOptions { display_colour: colour, ..EmulatorOptions::default() };
        let emu = Emulator::new(blank_rom(), None, options).unwrap();
        assert_eq!(emu.resolve_dmg_colour(0), RGB(1, 2, 3));
        assert_eq!(emu.resolve_dmg_colour(3), RGB(10, 11, 12));
    }
}
