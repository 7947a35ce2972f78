use std::fmt::Debug;

use crate::hardware::cartridge::Cartridge;
use crate::hardware::GameBoyModel;
use crate::io::interrupts::Interrupts;

/// The bus every CPU instruction and DMA transfer goes through. Implemented
/// by [`crate::hardware::mmu::Memory`]; kept as a trait so the CPU can be
/// tested against a bare-bones fake bus without dragging in a whole console.
pub trait MemoryMapper: Debug {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    fn boot_rom_finished(&self) -> bool;
    fn emulated_model(&self) -> GameBoyModel;
    /// The current cartridge, if one is inserted (always `Some` once booted).
    fn cartridge(&self) -> Option<&Cartridge>;
    fn interrupts(&self) -> &Interrupts;
    fn interrupts_mut(&mut self) -> &mut Interrupts;
    fn turn_on_lcd(&mut self);
    fn turn_off_lcd(&mut self);
    /// Services a `STOP` instruction's CGB double-speed switch. Returns
    /// `true` if a speed switch actually took place.
    fn perform_stop(&mut self) -> bool;
    /// Advance every component by one M-cycle (4 T-states). Returns `true`
    /// if this cycle produced a V-blank.
    fn do_m_cycle(&mut self) -> bool;
}
