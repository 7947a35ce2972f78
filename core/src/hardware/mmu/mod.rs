use std::fmt;
use std::fmt::{Debug, Formatter};

use log::warn;

use hram::Hram;

use crate::hardware::apu::{APU, APU_MEM_END, APU_MEM_START, WAVE_SAMPLE_END, WAVE_SAMPLE_START};
use crate::hardware::cartridge::Cartridge;
use crate::hardware::memory::MemoryMapper;
use crate::hardware::mmu::cgb_mem::CgbData;
use crate::hardware::mmu::dma::{HdmaState, OamDmaState};
use crate::hardware::mmu::wram::Wram;
use crate::hardware::ppu::memory_binds::{
    CGB_BACKGROUND_COLOR_INDEX, CGB_BACKGROUND_PALETTE_DATA, CGB_OBJECT_PALETTE_DATA, CGB_OBJECT_PRIORITY_MODE,
    CGB_SPRITE_COLOR_INDEX, CGB_VRAM_BANK_REGISTER, TILEMAP_9800_START, TILEMAP_9C00_END,
};
use crate::hardware::ppu::tiledata::{TILE_BLOCK_0_START, TILE_BLOCK_2_END};
use crate::hardware::ppu::{
    BG_PALETTE, DMA_TRANSFER, LCD_CONTROL_REGISTER, LCD_STATUS_REGISTER, LYC_REGISTER, LY_REGISTER, Mode,
    OB_PALETTE_0, OB_PALETTE_1, PPU, SCX_REGISTER, SCY_REGISTER, WX_REGISTER, WY_REGISTER,
};
use crate::hardware::GameBoyModel;
use crate::io::interrupts::{InterruptFlags, Interrupts};
use crate::io::joypad::{JoyPad, JOYPAD_REGISTER};
use crate::io::timer::{Timer, DIVIDER_REGISTER, TIMER_CONTROL, TIMER_COUNTER, TIMER_MODULO};
use crate::scheduler::{Scheduler, Token};

pub mod cgb_mem;
pub mod dma;
mod hram;
mod wram;

pub const MEMORY_SIZE: usize = 0x10000;
/// 16 KB ROM bank, usually 00. From Cartridge, read-only
pub const ROM_BANK_00_START: u16 = 0x0000;
/// 16 KB Rom Bank 01~NN. From cartridge, switchable bank via Memory Bank. Read-only.
pub const ROM_BANK_NN_END: u16 = 0x7FFF;
/// 8 KB of External Ram, in cartridge, switchable bank if any. Could hold save data.
pub const EXTERNAL_RAM_START: u16 = 0xA000;
pub const EXTERNAL_RAM_END: u16 = 0xBFFF;
/// 4 KB Work RAM bank 0
pub const WRAM_BANK_00_START: u16 = 0xC000;
pub const WRAM_BANK_00_END: u16 = 0xCFFF;
/// 4 KB Work RAM bank 1~N. Only bank 1 in Non-CGB mode, switchable bank 1~7 in CGB mode.
pub const WRAM_BANK_NN_START: u16 = 0xD000;
pub const WRAM_BANK_NN_END: u16 = 0xDFFF;
/// Mirror of C000~DDFF (ECHO RAM). Typically not used.
pub const ECHO_RAM_START: u16 = 0xE000;
pub const ECHO_RAM_END: u16 = 0xFDFF;
/// Sprite attribute table (OAM)
pub const OAM_ATTRIBUTE_START: u16 = 0xFE00;
pub const OAM_ATTRIBUTE_END: u16 = 0xFE9F;
/// Not usable
pub const NOT_USABLE_START: u16 = 0xFEA0;
pub const NOT_USABLE_END: u16 = 0xFEFF;
/// I/O Registers
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;

/// Serial transfer data; read back whatever was last written, no link-cable
/// peer is ever attached.
pub const SIO_DATA: u16 = 0xFF01;
pub const SIO_CONT: u16 = 0xFF02;

pub const CGB_PREPARE_SWITCH: u16 = 0xFF4D;
/// Specifies the higher byte of the HDMA source address. Always reads 0xFF.
pub const CGB_HDMA_1: u16 = 0xFF51;
/// Specifies the lower byte of the HDMA source address. Always reads 0xFF.
pub const CGB_HDMA_2: u16 = 0xFF52;
/// Specifies the higher byte of the HDMA destination address. Always reads 0xFF.
pub const CGB_HDMA_3: u16 = 0xFF53;
/// Specifies the lower byte of the HDMA destination address. Always reads 0xFF.
pub const CGB_HDMA_4: u16 = 0xFF54;
/// Transfer length/mode/start register; starts the copy when written.
pub const CGB_HDMA_5: u16 = 0xFF55;
/// Infrared port; not emulated, reads back whatever was last written.
pub const CGB_RP: u16 = 0xFF56;
/// Work ram bank switching.
pub const CGB_WRAM_BANK: u16 = 0xFF70;

/// The flag used to signal that an interrupt is pending.
pub const INTERRUPTS_FLAG: u16 = 0xFF0F;
/// High Ram (HRAM)
pub const HRAM_START: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;
/// Interrupts Enable Register (IE)
pub const INTERRUPTS_ENABLE: u16 = 0xFFFF;
/// The value to return for an invalid or unimplemented read.
pub const INVALID_READ: u8 = 0xFF;

pub struct Memory {
    cartridge: Cartridge,
    pub scheduler: Scheduler,
    emulated_model: GameBoyModel,
    cgb_data: CgbData,
    hdma: HdmaState,
    oam_dma: OamDmaState,
    last_ppu_mode: Mode,

    pub ppu: PPU,
    pub apu: APU,
    pub hram: Hram,
    pub wram: Wram,

    pub joypad_register: JoyPad,
    pub timer: Timer,
    pub interrupts: Interrupts,

    sio_data: u8,
    sio_control: u8,
    infrared: u8,
}

impl Memory {
    pub fn new(cartridge: Cartridge, emulated_model: GameBoyModel) -> Self {
        let emulated_model = if cartridge.header.cgb_flag { emulated_model } else { GameBoyModel::Dmg };

        Memory {
            cartridge,
            scheduler: Scheduler::new(),
            emulated_model,
            cgb_data: CgbData::new(),
            hdma: HdmaState::default(),
            oam_dma: OamDmaState::default(),
            last_ppu_mode: Mode::HBlank,
            ppu: PPU::new(emulated_model),
            apu: APU::new(),
            hram: Hram::new(),
            wram: Wram::new(),
            joypad_register: JoyPad::new(),
            timer: Timer::new(),
            interrupts: Interrupts::new(),
            sio_data: 0,
            sio_control: 0,
            infrared: 0,
        }
    }

    pub fn read_byte(&mut self, address: u16) -> u8 {
        match address {
            ROM_BANK_00_START..=ROM_BANK_NN_END => self.cartridge.read(address),
            TILE_BLOCK_0_START..=TILE_BLOCK_2_END => self.ppu.get_tile_byte(address),
            TILEMAP_9800_START..=TILEMAP_9C00_END => self.ppu.get_tilemap_byte(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_bank_n(address),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.read_echo_ram(address),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => self.ppu.get_oam_byte(address),
            NOT_USABLE_START..=NOT_USABLE_END => self.non_usable_call(address),
            IO_START..=IO_END => self.read_io_byte(address),
            HRAM_START..=HRAM_END => self.hram.read_byte(address),
            INTERRUPTS_ENABLE => self.interrupts.interrupt_enable.bits(),
            _ => panic!("Reading memory that is out of bounds: 0x{:04X}", address),
        }
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_00_START..=ROM_BANK_NN_END => self.cartridge.write(address, value, &mut self.scheduler),
            TILE_BLOCK_0_START..=TILE_BLOCK_2_END => self.ppu.set_tile_byte(address, value),
            TILEMAP_9800_START..=TILEMAP_9C00_END => self.ppu.set_tilemap_byte(address, value),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.write(address, value, &mut self.scheduler),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.write_bank_0(address, value),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.write_bank_n(address, value),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.write_echo_ram(address, value),
            OAM_ATTRIBUTE_START..=OAM_ATTRIBUTE_END => self.ppu.set_oam_byte(address, value),
            NOT_USABLE_START..=NOT_USABLE_END => log::trace!("Write to non-usable memory: 0x{:04X}", address),
            IO_START..=IO_END => self.write_io_byte(address, value),
            HRAM_START..=HRAM_END => self.hram.set_byte(address, value),
            INTERRUPTS_ENABLE => self.interrupts.interrupt_enable = InterruptFlags::from_bits_truncate(value),
            _ => panic!("Writing to memory that is not in bounds: 0x{:04X}", address),
        }
    }

    fn read_io_byte(&mut self, address: u16) -> u8 {
        let shift = self.get_speed_shift();
        match address {
            JOYPAD_REGISTER => self.joypad_register.get_register(),
            SIO_DATA => self.sio_data,
            SIO_CONT => self.sio_control,
            DIVIDER_REGISTER => self.timer.divider_register(),
            TIMER_COUNTER => self.timer.timer_counter(),
            TIMER_MODULO => self.timer.timer_modulo(),
            TIMER_CONTROL => self.timer.timer_control(),
            INTERRUPTS_FLAG => self.interrupts.read_if(),
            APU_MEM_START..=APU_MEM_END => self.apu.read_register(address, &mut self.scheduler, shift),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.read_wave_sample(address, &mut self.scheduler, shift),
            LCD_CONTROL_REGISTER => self.ppu.get_lcd_control(),
            LCD_STATUS_REGISTER => self.ppu.get_lcd_status(),
            SCY_REGISTER => self.ppu.get_scy(),
            SCX_REGISTER => self.ppu.get_scx(),
            LY_REGISTER => self.ppu.get_ly(),
            LYC_REGISTER => self.ppu.get_lyc(),
            DMA_TRANSFER => (self.oam_dma.current_source() >> 8) as u8,
            BG_PALETTE => self.ppu.get_bg_palette(),
            OB_PALETTE_0 => self.ppu.get_oam_palette_0(),
            OB_PALETTE_1 => self.ppu.get_oam_palette_1(),
            WY_REGISTER => self.ppu.get_window_y(),
            WX_REGISTER => self.ppu.get_window_x(),
            CGB_PREPARE_SWITCH => {
                if self.emulated_model.is_cgb() {
                    self.cgb_data.read_prepare_switch()
                } else {
                    INVALID_READ
                }
            }
            CGB_VRAM_BANK_REGISTER => self.ppu.get_vram_bank(),
            CGB_HDMA_1 | CGB_HDMA_2 | CGB_HDMA_3 | CGB_HDMA_4 => INVALID_READ,
            CGB_HDMA_5 => {
                if self.emulated_model.is_dmg() {
                    INVALID_READ
                } else {
                    self.hdma.read_control()
                }
            }
            CGB_RP => self.infrared,
            CGB_BACKGROUND_COLOR_INDEX => self.ppu.get_bg_color_palette_index(),
            CGB_BACKGROUND_PALETTE_DATA => self.ppu.get_bg_palette_data(),
            CGB_SPRITE_COLOR_INDEX => self.ppu.get_sprite_color_palette_index(),
            CGB_OBJECT_PALETTE_DATA => self.ppu.get_obj_palette_data(),
            CGB_OBJECT_PRIORITY_MODE => self.ppu.get_object_priority(),
            CGB_WRAM_BANK => self.wram.read_bank_select(),
            _ => INVALID_READ,
        }
    }

    fn write_io_byte(&mut self, address: u16, value: u8) {
        let shift = self.get_speed_shift();
        let model = self.emulated_model;
        match address {
            JOYPAD_REGISTER => self.joypad_register.set_register(value, &mut self.interrupts),
            SIO_DATA => self.sio_data = value,
            SIO_CONT => self.sio_control = value,
            DIVIDER_REGISTER => self.timer.set_divider(&mut self.scheduler),
            TIMER_COUNTER => self.timer.set_timer_counter(&mut self.scheduler, value),
            TIMER_MODULO => self.timer.set_tma(&mut self.scheduler, value),
            TIMER_CONTROL => self.timer.set_timer_control(&mut self.scheduler, value),
            INTERRUPTS_FLAG => self.interrupts.write_if(value),
            APU_MEM_START..=APU_MEM_END => self.apu.write_register(address, value, &mut self.scheduler, model, shift),
            WAVE_SAMPLE_START..=WAVE_SAMPLE_END => self.apu.write_wave_sample(address, value, &mut self.scheduler, shift),
            LCD_CONTROL_REGISTER => self.ppu.set_lcd_control(value, &mut self.interrupts),
            LCD_STATUS_REGISTER => self.ppu.set_lcd_status(value, &mut self.interrupts),
            SCY_REGISTER => self.ppu.set_scy(value),
            SCX_REGISTER => self.ppu.set_scx(value),
            LY_REGISTER => {}
            LYC_REGISTER => self.ppu.set_lyc(value, &mut self.interrupts),
            DMA_TRANSFER => self.start_oam_dma(value),
            BG_PALETTE => self.ppu.set_bg_palette(value),
            OB_PALETTE_0 => self.ppu.set_oam_palette_0(value),
            OB_PALETTE_1 => self.ppu.set_oam_palette_1(value),
            WY_REGISTER => self.ppu.set_window_y(value),
            WX_REGISTER => self.ppu.set_window_x(value),
            CGB_PREPARE_SWITCH if self.emulated_model.is_cgb() => self.cgb_data.write_prepare_switch(value),
            CGB_PREPARE_SWITCH => {}
            CGB_VRAM_BANK_REGISTER => self.ppu.set_vram_bank(value),
            CGB_HDMA_1 => self.hdma.set_source_high(value),
            CGB_HDMA_2 => self.hdma.set_source_low(value),
            CGB_HDMA_3 => self.hdma.set_destination_high(value),
            CGB_HDMA_4 => self.hdma.set_destination_low(value),
            CGB_HDMA_5 => {
                if let Some(blocks) = self.hdma.write_control(value) {
                    self.perform_hdma_bulk(blocks);
                }
            }
            CGB_RP => self.infrared = value,
            CGB_BACKGROUND_COLOR_INDEX => self.ppu.set_bg_color_palette_index(value),
            CGB_BACKGROUND_PALETTE_DATA => self.ppu.set_bg_palette_data(value),
            CGB_SPRITE_COLOR_INDEX => self.ppu.set_sprite_color_palette_index(value),
            CGB_OBJECT_PALETTE_DATA => self.ppu.set_obj_palette_data(value),
            CGB_OBJECT_PRIORITY_MODE => self.ppu.set_object_priority(value),
            CGB_WRAM_BANK => self.wram.write_bank_select(value),
            _ => {}
        }
    }

    /// Starts an OAM DMA transfer 4 cycles from now; the copy itself
    /// proceeds one byte per cycle, driven by `Token::Dma`.
    fn start_oam_dma(&mut self, value: u8) {
        self.oam_dma.start(value);
        self.ppu.oam_dma_started();
        self.scheduler.schedule(Token::Dma, 4);
    }

    /// Copies one byte of an in-flight OAM DMA transfer; called directly from
    /// `do_m_cycle` rather than through [`Scheduler::check`] since it needs
    /// the full bus (`read_byte`), which a disjoint-field closure can't reach.
    fn advance_oam_dma(&mut self) {
        self.scheduler.resync(Token::Dma);
        let source = self.oam_dma.current_source();
        let index = (source & 0xFF) as u8;
        let value = self.read_byte(source);
        self.ppu.oam_dma_write_byte(index, value);

        if self.oam_dma.advance() {
            self.ppu.oam_dma_finished();
            self.scheduler.cancel(Token::Dma);
        } else {
            self.scheduler.schedule(Token::Dma, 4);
        }
    }

    /// Performs a GDMA (bulk) transfer immediately, advancing the scheduler
    /// by the 2-cycles-per-byte cost of the copy.
    fn perform_hdma_bulk(&mut self, blocks: u8) {
        for block in 0..blocks as u16 {
            let source = self.hdma.source().wrapping_add(block * 16);
            let destination = self.hdma.destination().wrapping_add(block * 16);
            for i in 0..16u16 {
                let value = self.read_byte(source + i);
                self.write_byte(destination + i, value);
            }
            self.hdma.advance_block();
        }

        let cycles = blocks as i32 * 16 * (2 << self.get_speed_shift());
        self.scheduler.add_cycles(cycles);
    }

    /// Copies one 16-byte block of an armed hblank-mode HDMA transfer, on the
    /// HBlank transition that follows it being armed.
    fn perform_hdma_hblank_block(&mut self) {
        let source = self.hdma.source();
        let destination = self.hdma.destination();
        for i in 0..16u16 {
            let value = self.read_byte(source + i);
            self.write_byte(destination + i, value);
        }
        self.hdma.advance_block();
    }

    fn service_hdma(&mut self) {
        let mode = self.ppu.get_current_mode();
        if mode == Mode::HBlank && self.last_ppu_mode != Mode::HBlank && self.hdma.is_hblank_active() {
            self.perform_hdma_hblank_block();
        }
        self.last_ppu_mode = mode;
    }

    /// Simply returns 0xFF while also printing a warning to the logger.
    fn non_usable_call(&self, address: u16) -> u8 {
        warn!("ROM accessed non-usable memory: 0x{:04X}", address);
        INVALID_READ
    }

    pub fn get_speed_shift(&self) -> u64 {
        self.cgb_data.double_speed as u64
    }

    /// Services the `STOP` instruction's CGB speed-switch handling. Returns
    /// `true` if a speed switch took place, which costs the CPU extra cycles
    /// on real hardware.
    pub fn perform_stop(&mut self) -> bool {
        if self.cgb_data.should_prepare() {
            self.cgb_data.toggle_speed();
            true
        } else {
            false
        }
    }
}

impl MemoryMapper for Memory {
    fn read_byte(&mut self, address: u16) -> u8 {
        Memory::read_byte(self, address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        Memory::write_byte(self, address, value)
    }

    fn boot_rom_finished(&self) -> bool {
        true
    }

    fn emulated_model(&self) -> GameBoyModel {
        self.emulated_model
    }

    fn cartridge(&self) -> Option<&Cartridge> {
        Some(&self.cartridge)
    }

    fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    fn turn_on_lcd(&mut self) {
        self.ppu.turn_on_lcd(&mut self.interrupts);
    }

    fn turn_off_lcd(&mut self) {
        self.ppu.turn_off_lcd();
    }

    fn perform_stop(&mut self) -> bool {
        Memory::perform_stop(self)
    }

    fn do_m_cycle(&mut self) -> bool {
        self.scheduler.add_cycles(4);

        let mut vblank_occurred = false;
        if let Some(flags) = self.ppu.do_cycle(4) {
            self.interrupts.insert_interrupt(flags);
            if flags.contains(InterruptFlags::VBLANK) {
                vblank_occurred = true;
                let shift = self.get_speed_shift();
                self.apu.synchronise(&mut self.scheduler, shift);
            }
        }

        self.service_hdma();

        if self.oam_dma.is_active() && self.scheduler.t >= self.scheduler.next_event_for(Token::Dma) {
            self.advance_oam_dma();
        }

        let timer = &mut self.timer;
        let interrupts = &mut self.interrupts;
        let cartridge = &mut self.cartridge;
        self.scheduler.check(|sched, token| match token {
            Token::Timer => {
                if let Some(flag) = timer.sync(sched) {
                    interrupts.insert_interrupt(flag);
                }
            }
            Token::Cart => cartridge.sync(sched),
            _ => {}
        });

        vblank_occurred
    }
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Memory {{ cartridge: {:?}, scheduler: {:?} }}", self.cartridge, self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_rom() -> Vec<u8> {
        vec![0u8; 0x8000]
    }

    fn memory() -> Memory {
        let cartridge = Cartridge::new(blank_rom(), None, None, None, || 0).unwrap();
        Memory::new(cartridge, GameBoyModel::Dmg)
    }

    #[test]
    fn echo_ram_mirrors_work_ram_bank_0_both_ways() {
        let mut mem = memory();
        mem.write_byte(0xC010, 0x42);
        assert_eq!(mem.read_byte(0xE010), 0x42);

        mem.write_byte(0xE020, 0x24);
        assert_eq!(mem.read_byte(0xC020), 0x24);
    }

    #[test]
    fn hram_round_trips() {
        let mut mem = memory();
        mem.write_byte(0xFF90, 0xAB);
        assert_eq!(mem.read_byte(0xFF90), 0xAB);
    }

    #[test]
    fn interrupt_enable_register_round_trips_through_bitflags() {
        let mut mem = memory();
        mem.write_byte(INTERRUPTS_ENABLE, 0b0001_1111);
        assert_eq!(mem.read_byte(INTERRUPTS_ENABLE), 0b0001_1111);
    }

    #[test]
    fn oam_dma_copies_source_bytes_into_oam_one_per_cycle() {
        let mut mem = memory();
        for i in 0..0xA0u16 {
            mem.write_byte(0xC000 + i, i as u8);
        }

        // DMA source high byte: 0xC0 -> copies from 0xC000..0xC0A0 into OAM.
        mem.write_byte(DMA_TRANSFER, 0xC0);

        // 4 cycles to arm, then 0xA0 bytes at 4 cycles each.
        for _ in 0..(4 + 0xA0 * 4) {
            mem.do_m_cycle();
        }

        for i in 0..0xA0u16 {
            assert_eq!(mem.read_byte(OAM_ATTRIBUTE_START + i), i as u8, "byte {} mismatched", i);
        }
    }

    #[test]
    fn non_cgb_cartridge_forces_dmg_even_with_cgb_requested() {
        let cartridge = Cartridge::new(blank_rom(), None, None, None, || 0).unwrap();
        let mem = Memory::new(cartridge, GameBoyModel::Cgb);
        assert_eq!(mem.emulated_model(), GameBoyModel::Dmg);
    }
}
