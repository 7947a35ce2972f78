pub mod header;
pub mod mbc;
pub mod rtc;
pub mod save;

use std::path::PathBuf;

use log::{debug, warn};

use crate::error::EmulatorError;
use crate::hardware::cartridge::header::{CartridgeHeader, MapperKind};
use crate::hardware::cartridge::mbc::Mbc;
use crate::hardware::cartridge::rtc::Rtc;
use crate::scheduler::{Scheduler, Token};

/// MBC2's embedded RAM is a fixed 512 nibbles regardless of what the header
/// happens to declare for cartridge RAM size.
const MBC2_RAM_BYTES: usize = 512;

#[derive(Debug)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    rom: Vec<u8>,
    ram: Vec<u8>,
    mbc: Mbc,
    save_path: Option<PathBuf>,
    dirty: bool,
}

impl Cartridge {
    /// `saved_ram`/`saved_rtc` let a host hand over previously-persisted
    /// battery state directly (e.g. loaded from a non-filesystem store) as a
    /// fallback for when no `.sav` file is found next to `rom_path` — the
    /// on-disk file still wins when both are present, since it reflects
    /// whatever was most recently flushed.
    pub fn new(
        rom: Vec<u8>,
        rom_path: Option<PathBuf>,
        saved_ram: Option<Vec<u8>>,
        saved_rtc: Option<[u8; Rtc::BYTE_LEN]>,
        now: fn() -> u64,
    ) -> Result<Self, EmulatorError> {
        let header = CartridgeHeader::new(&rom)?;

        let ram_len = if header.mapper == MapperKind::Mbc2 {
            MBC2_RAM_BYTES
        } else {
            header.ram_banks * header.ram_bank_size
        };

        let rtc = if header.has_rtc { Some(Rtc::new(now)) } else { None };
        let mut mbc = Mbc::new(header.mapper, rtc);
        let mut ram = vec![0u8; ram_len];

        let save_path = if header.has_battery { rom_path.map(|p| save::save_path_for(&p)) } else { None };

        let mut loaded_from_file = false;
        if let Some(path) = &save_path {
            if let Some(loaded) = save::load(path, ram_len, header.has_rtc)? {
                ram = loaded.ram;
                if let (Some(bytes), Some(rtc)) = (loaded.rtc_bytes, mbc.rtc_mut()) {
                    rtc.load_bytes(&bytes);
                }
                debug!("loaded save data for {:?} ({} bytes)", path, ram_len);
                loaded_from_file = true;
            }
        }

        if !loaded_from_file && header.has_battery {
            if let Some(bytes) = saved_ram.filter(|b| b.len() == ram_len) {
                ram = bytes;
                if let (Some(bytes), Some(rtc)) = (saved_rtc, mbc.rtc_mut()) {
                    rtc.load_bytes(&bytes);
                }
                debug!("loaded host-supplied save data ({} bytes)", ram_len);
            }
        }

        Ok(Cartridge {
            header,
            rom,
            ram,
            mbc,
            save_path,
            dirty: false,
        })
    }

    pub fn game_title(&self) -> &str {
        &self.header.title
    }

    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.header.has_battery {
            Some(&self.ram)
        } else {
            None
        }
    }

    fn rom_bank_count(&self) -> usize {
        self.header.rom_banks
    }

    pub fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => {
                let bank = self.mbc.low_rom_bank() % self.rom_bank_count();
                self.rom[bank * 0x4000 + address as usize]
            }
            0x4000..=0x7FFF => {
                let bank = self.mbc.high_rom_bank() % self.rom_bank_count();
                self.rom[bank * 0x4000 + (address - 0x4000) as usize]
            }
            0xA000..=0xBFFF => self.read_ram(address),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, address: u16) -> u8 {
        if let Some(reg) = self.mbc.rtc_register() {
            return self.mbc.rtc().map(|rtc| rtc.read_register(reg)).unwrap_or(0xFF);
        }
        if !self.mbc.ram_enabled() || self.ram.is_empty() {
            return 0xFF;
        }
        if self.header.mapper == MapperKind::Mbc2 {
            let index = (address - 0xA000) as usize % MBC2_RAM_BYTES;
            return self.ram[index] | 0xF0;
        }
        match self.mbc.ram_bank() {
            Some(bank) => {
                let bank_size = self.header.ram_bank_size;
                let index = bank * bank_size + (address - 0xA000) as usize;
                self.ram.get(index).copied().unwrap_or(0xFF)
            }
            None => 0xFF,
        }
    }

    pub fn write(&mut self, address: u16, value: u8, scheduler: &mut Scheduler) {
        match address {
            0x0000..=0x7FFF => self.mbc.write_rom(address, value),
            0xA000..=0xBFFF => self.write_ram(address, value, scheduler),
            _ => {}
        }
    }

    fn write_ram(&mut self, address: u16, value: u8, scheduler: &mut Scheduler) {
        if let Some(reg) = self.mbc.rtc_register() {
            if let Some(rtc) = self.mbc.rtc_mut() {
                rtc.write_register(reg, value);
                self.mark_dirty(scheduler);
            }
            return;
        }
        if !self.mbc.ram_enabled() || self.ram.is_empty() {
            return;
        }
        if self.header.mapper == MapperKind::Mbc2 {
            let index = (address - 0xA000) as usize % MBC2_RAM_BYTES;
            // Only the lower nibble is wired up; the rest always reads high.
            self.ram[index] = value & 0x0F;
            self.mark_dirty(scheduler);
            return;
        }
        if let Some(bank) = self.mbc.ram_bank() {
            let bank_size = self.header.ram_bank_size;
            let index = bank * bank_size + (address - 0xA000) as usize;
            if let Some(slot) = self.ram.get_mut(index) {
                *slot = value;
                self.mark_dirty(scheduler);
            }
        }
    }

    fn mark_dirty(&mut self, scheduler: &mut Scheduler) {
        self.dirty = true;
        scheduler.schedule(Token::Cart, save::QUIET_PERIOD_CYCLES);
    }

    /// Called when the CART scheduler token fires: flushes to disk if a
    /// write landed since the last flush, then parks the token again.
    pub fn sync(&mut self, scheduler: &mut Scheduler) {
        scheduler.resync(Token::Cart);
        if self.dirty {
            self.flush();
        }
        scheduler.cancel(Token::Cart);
    }

    /// Flushes battery-backed RAM (and RTC state, if present) to disk
    /// immediately, regardless of the quiet-period timer. Used on cartridge
    /// eviction / emulator shutdown as well as from `sync`.
    pub fn flush(&mut self) {
        if let Some(path) = &self.save_path {
            let rtc_bytes = self.mbc.rtc().map(Rtc::to_bytes);
            match save::flush(path, &self.ram, rtc_bytes) {
                Ok(()) => self.dirty = false,
                Err(e) => warn!("failed to flush save data to {:?}: {}", path, e),
            }
        }
    }
}

impl Drop for Cartridge {
    fn drop(&mut self) {
        if self.dirty {
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with(mapper: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
        let banks = 2usize << rom_size.min(8);
        let mut rom = vec![0u8; banks * 0x4000];
        rom[0x147] = mapper;
        rom[0x148] = rom_size;
        rom[0x149] = ram_size;
        rom
    }

    #[test]
    fn mbc1_bank_zero_aliasing_reads_through_to_bank_one() {
        let mut rom = rom_with(0x01, 0x01, 0x00); // MBC1, 4 banks, no RAM
        rom[0x4000] = 0xAB;
        let mut cart = Cartridge::new(rom, None, None, None, || 0).unwrap();
        cart.write(0x2000, 0x00, &mut Scheduler::new());
        assert_eq!(cart.read(0x4000), 0xAB);
    }

    #[test]
    fn mbc5_switchable_bank_zero_is_distinct_from_bank_one() {
        let mut rom = rom_with(0x19, 0x01, 0x00);
        rom[0x4000] = 0x11;
        rom[0x8000] = 0x22;
        let mut cart = Cartridge::new(rom, None, None, None, || 0).unwrap();
        assert_eq!(cart.read(0x4000), 0x11);
        cart.write(0x2000, 0x02, &mut Scheduler::new());
        assert_eq!(cart.read(0x4000), 0x22);
        cart.write(0x2000, 0x00, &mut Scheduler::new());
        assert_eq!(cart.read(0x4000), 0x00);
    }

    #[test]
    fn ram_write_sets_dirty_and_schedules_cart_flush() {
        let rom = rom_with(0x03, 0x00, 0x02); // MBC1+RAM+BATTERY, 1 bank RAM
        let mut cart = Cartridge::new(rom, None, None, None, || 0).unwrap();
        let mut scheduler = Scheduler::new();
        cart.write(0x0000, 0x0A, &mut scheduler); // enable RAM
        cart.write(0xA000, 0x42, &mut scheduler);
        assert!(cart.dirty);
        assert_ne!(scheduler.next_event_for(Token::Cart), crate::scheduler::NEVER);
        assert_eq!(cart.read(0xA000), 0x42);
    }

    #[test]
    fn host_supplied_ram_is_used_when_no_save_file_exists() {
        let rom = rom_with(0x03, 0x00, 0x02); // MBC1+RAM+BATTERY, 1 bank RAM
        let saved_ram = vec![0x7E; 0x2000];
        let mut cart = Cartridge::new(rom, None, Some(saved_ram.clone()), None, || 0).unwrap();
        let mut scheduler = Scheduler::new();
        cart.write(0x0000, 0x0A, &mut scheduler); // enable RAM
        assert_eq!(cart.read(0xA000), 0x7E);
        assert_eq!(cart.battery_ram(), Some(saved_ram.as_slice()));
    }

    #[test]
    fn mismatched_length_host_supplied_ram_is_ignored() {
        let rom = rom_with(0x03, 0x00, 0x02); // expects 0x2000 bytes of RAM
        let wrong_len_ram = vec![0x11; 0x10];
        let mut cart = Cartridge::new(rom, None, Some(wrong_len_ram), None, || 0).unwrap();
        let mut scheduler = Scheduler::new();
        cart.write(0x0000, 0x0A, &mut scheduler);
        assert_eq!(cart.read(0xA000), 0x00);
    }
}
