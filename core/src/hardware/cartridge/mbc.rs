//! Mapper bank-register state and the address translation rules for each of
//! MBC1/2/3/5. Kept as one enum dispatched over in `mod.rs` rather than a
//! `dyn` trait object, since every variant's RAM storage is uniform (a flat
//! byte slice owned by the surrounding `Cartridge`) and an enum match reads
//! far closer to how the CPU's own opcode dispatch is written.
use crate::hardware::cartridge::rtc::Rtc;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mbc1Mode {
    Simple,
    Advanced,
}

#[derive(Debug)]
pub enum Mbc {
    None,
    Mbc1 {
        bank_lo: u8,
        bank_hi: u8,
        mode: Mbc1Mode,
        ram_enabled: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enabled: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank_or_rtc: u8,
        ram_enabled: bool,
        rtc: Option<Rtc>,
        latch_armed: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enabled: bool,
    },
}

impl Mbc {
    pub fn new(mapper: crate::hardware::cartridge::header::MapperKind, rtc: Option<Rtc>) -> Self {
        use crate::hardware::cartridge::header::MapperKind::*;
        match mapper {
            None => Mbc::None,
            Mbc1 => Mbc::Mbc1 {
                bank_lo: 1,
                bank_hi: 0,
                mode: Mbc1Mode::Simple,
                ram_enabled: false,
            },
            Mbc2 => Mbc::Mbc2 {
                rom_bank: 1,
                ram_enabled: false,
            },
            Mbc3 => Mbc::Mbc3 {
                rom_bank: 1,
                ram_bank_or_rtc: 0,
                ram_enabled: false,
                rtc,
                latch_armed: false,
            },
            Mbc5 => Mbc::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enabled: false,
            },
        }
    }

    /// The ROM bank visible at 0x0000..0x3FFF. Only MBC1 in advanced mode
    /// ever maps something other than bank 0 here.
    pub fn low_rom_bank(&self) -> usize {
        match self {
            Mbc::Mbc1 {
                bank_hi,
                mode: Mbc1Mode::Advanced,
                ..
            } => (*bank_hi as usize) << 5,
            _ => 0,
        }
    }

    /// The ROM bank visible at 0x4000..0x7FFF.
    pub fn high_rom_bank(&self) -> usize {
        match self {
            Mbc::None => 1,
            Mbc::Mbc1 { bank_lo, bank_hi, .. } => ((*bank_hi as usize) << 5) | (*bank_lo as usize),
            Mbc::Mbc2 { rom_bank, .. } => *rom_bank as usize,
            Mbc::Mbc3 { rom_bank, .. } => *rom_bank as usize,
            Mbc::Mbc5 { rom_bank, .. } => *rom_bank as usize,
        }
    }

    /// The RAM bank visible at 0xA000..0xBFFF, or `None` if the region is
    /// currently mapped to an RTC register (MBC3) or RAM is disabled.
    pub fn ram_bank(&self) -> Option<usize> {
        match self {
            Mbc::None => Some(0),
            Mbc::Mbc1 {
                bank_hi,
                mode: Mbc1Mode::Advanced,
                ram_enabled: true,
                ..
            } => Some(*bank_hi as usize),
            Mbc::Mbc1 { ram_enabled: true, .. } => Some(0),
            Mbc::Mbc2 { ram_enabled: true, .. } => Some(0),
            Mbc::Mbc3 {
                ram_bank_or_rtc,
                ram_enabled: true,
                ..
            } if *ram_bank_or_rtc < 0x08 => Some(*ram_bank_or_rtc as usize),
            Mbc::Mbc5 {
                ram_bank, ram_enabled: true, ..
            } => Some(*ram_bank as usize),
            _ => None,
        }
    }

    pub fn ram_enabled(&self) -> bool {
        match self {
            Mbc::None => true,
            Mbc::Mbc1 { ram_enabled, .. }
            | Mbc::Mbc2 { ram_enabled, .. }
            | Mbc::Mbc3 { ram_enabled, .. }
            | Mbc::Mbc5 { ram_enabled, .. } => *ram_enabled,
        }
    }

    pub fn rtc_register(&self) -> Option<u8> {
        match self {
            Mbc::Mbc3 {
                ram_bank_or_rtc,
                rtc: Some(_),
                ..
            } if *ram_bank_or_rtc >= 0x08 && *ram_bank_or_rtc <= 0x0C => Some(*ram_bank_or_rtc),
            _ => None,
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        match self {
            Mbc::Mbc3 { rtc, .. } => rtc.as_ref(),
            _ => None,
        }
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match self {
            Mbc::Mbc3 { rtc, .. } => rtc.as_mut(),
            _ => None,
        }
    }

    /// Handles a write into the 0x0000..0x7FFF ROM-mapped command region.
    pub fn write_rom(&mut self, address: u16, value: u8) {
        match self {
            Mbc::None => {}
            Mbc::Mbc1 {
                bank_lo,
                bank_hi,
                mode,
                ram_enabled,
            } => match address {
                0x0000..=0x1FFF => *ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    let masked = value & 0b0001_1111;
                    *bank_lo = if masked == 0 { 1 } else { masked };
                }
                0x4000..=0x5FFF => *bank_hi = value & 0b0000_0011,
                0x6000..=0x7FFF => *mode = if value & 1 == 0 { Mbc1Mode::Simple } else { Mbc1Mode::Advanced },
                _ => {}
            },
            Mbc::Mbc2 { rom_bank, ram_enabled } => {
                if address <= 0x3FFF {
                    // Bit 8 of the address distinguishes RAM-enable from
                    // bank-select writes within the same 0x0000..0x3FFF span.
                    if address & 0x0100 == 0 {
                        *ram_enabled = value & 0x0F == 0x0A;
                    } else {
                        let masked = value & 0x0F;
                        *rom_bank = if masked == 0 { 1 } else { masked };
                    }
                }
            }
            Mbc::Mbc3 {
                rom_bank,
                ram_bank_or_rtc,
                ram_enabled,
                rtc,
                latch_armed,
            } => match address {
                0x0000..=0x1FFF => *ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    let masked = value & 0b0111_1111;
                    *rom_bank = if masked == 0 { 1 } else { masked };
                }
                0x4000..=0x5FFF => *ram_bank_or_rtc = value,
                0x6000..=0x7FFF => {
                    if value == 0 {
                        *latch_armed = true;
                    } else if value == 1 && *latch_armed {
                        if let Some(rtc) = rtc {
                            rtc.latch();
                        }
                        *latch_armed = false;
                    }
                }
                _ => {}
            },
            Mbc::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enabled,
            } => match address {
                0x0000..=0x1FFF => *ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x2FFF => *rom_bank = (*rom_bank & 0x100) | value as u16,
                0x3000..=0x3FFF => *rom_bank = (*rom_bank & 0x0FF) | (((value & 1) as u16) << 8),
                0x4000..=0x5FFF => *ram_bank = value & 0x0F,
                _ => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::cartridge::header::MapperKind;

    #[test]
    fn mbc1_bank_zero_aliases_to_bank_one() {
        let mut mbc = Mbc::new(MapperKind::Mbc1, None);
        mbc.write_rom(0x2000, 0x00);
        assert_eq!(mbc.high_rom_bank(), 1);
    }

    #[test]
    fn mbc1_advanced_mode_banks_the_low_window() {
        let mut mbc = Mbc::new(MapperKind::Mbc1, None);
        mbc.write_rom(0x6000, 0x01);
        mbc.write_rom(0x4000, 0x01);
        assert_eq!(mbc.low_rom_bank(), 0x20);
    }

    #[test]
    fn mbc5_bank_zero_is_valid_in_switchable_window() {
        let mut mbc = Mbc::new(MapperKind::Mbc5, None);
        mbc.write_rom(0x2000, 0x00);
        assert_eq!(mbc.high_rom_bank(), 0);
    }

    #[test]
    fn mbc3_latches_rtc_on_rising_edge() {
        let mut mbc = Mbc::new(MapperKind::Mbc3, Some(Rtc::new(|| 12345)));
        mbc.write_rom(0x6000, 0x00);
        mbc.write_rom(0x6000, 0x01);
        // Latch should have fired once; a second 1 without an intervening 0
        // must not re-latch.
        if let Mbc::Mbc3 { latch_armed, .. } = &mbc {
            assert!(!latch_armed);
        } else {
            unreachable!()
        }
    }
}
