use gbemu_core::emulator::{Emulator, EmulatorOptions};
use gbemu_core::hardware::ppu::RESOLUTION_WIDTH;
use gbemu_core::sink::NullSink;
use gbemu_core::{GameBoyModel, InputKey};

fn rom_with_title(title: &str, cgb_flag: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x134..0x134 + title.len()].copy_from_slice(title.as_bytes());
    rom[0x143] = cgb_flag;
    rom[0x147] = 0x00; // ROM only
    rom[0x148] = 0x00; // 2 banks
    rom[0x149] = 0x00; // no external RAM
    rom
}

#[derive(Default)]
struct CountingSink {
    dmg_lines: u32,
    gbc_lines: u32,
    flips: u32,
}

impl gbemu_core::sink::Sink for CountingSink {
    fn draw_line_dmg(&mut self, _ly: u8, _line: &[u8; RESOLUTION_WIDTH]) {
        self.dmg_lines += 1;
    }

    fn draw_line_gbc(&mut self, _ly: u8, _line: &[u16; RESOLUTION_WIDTH]) {
        self.gbc_lines += 1;
    }

    fn flip(&mut self) {
        self.flips += 1;
    }
}

#[test]
fn dmg_cartridge_runs_a_full_frame_through_the_sink() {
    let rom = rom_with_title("TESTROM", 0x00);
    let mut emu = Emulator::new(rom, None, EmulatorOptions::default()).unwrap();
    assert_eq!(emu.emulated_model(), GameBoyModel::Dmg);
    assert_eq!(emu.game_title(), "TESTROM");

    let mut sink = CountingSink::default();
    emu.run_to_vblank(&mut sink);

    assert_eq!(sink.flips, 1);
    assert_eq!(sink.dmg_lines, 144);
    assert_eq!(sink.gbc_lines, 0);
}

#[test]
fn cgb_flagged_cartridge_defaults_to_cgb_model_and_draws_gbc_lines() {
    let rom = rom_with_title("CGBGAME", 0x80);
    let mut emu = Emulator::new(rom, None, EmulatorOptions::default()).unwrap();
    assert_eq!(emu.emulated_model(), GameBoyModel::Cgb);

    let mut sink = CountingSink::default();
    emu.run_to_vblank(&mut sink);

    assert_eq!(sink.flips, 1);
    assert_eq!(sink.gbc_lines, 144);
    assert_eq!(sink.dmg_lines, 0);
}

#[test]
fn model_override_forces_dmg_even_for_a_cgb_flagged_cartridge() {
    let rom = rom_with_title("CGBGAME", 0x80);
    let options = EmulatorOptions { model_override: Some(GameBoyModel::Dmg), ..EmulatorOptions::default() };
    let emu = Emulator::new(rom, None, options).unwrap();
    assert_eq!(emu.emulated_model(), GameBoyModel::Dmg);
}

#[test]
fn held_input_survives_several_frames_without_panicking() {
    let rom = rom_with_title("TESTROM", 0x00);
    let mut emu = Emulator::new(rom, None, EmulatorOptions::default()).unwrap();
    let mut sink = NullSink::default();

    emu.press_key(InputKey::Start);
    for _ in 0..3 {
        emu.run_to_vblank(&mut sink);
    }
    emu.release_key(InputKey::Start);
}

#[test]
fn rom_too_small_to_hold_a_header_is_rejected() {
    let rom = vec![0u8; 0x10];
    assert!(Emulator::new(rom, None, EmulatorOptions::default()).is_err());
}
