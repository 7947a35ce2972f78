use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::hardware::cartridge::Cartridge;
use crate::hardware::cpu::execute::JumpModifier;
use crate::hardware::cpu::CPU;
use crate::hardware::memory::MemoryMapper;
use crate::hardware::registers::Reg16::*;
use crate::hardware::registers::Reg8::*;
use crate::hardware::GameBoyModel;
use crate::io::interrupts::{Interrupt, Interrupts};

struct TestMemory {
    mem: [u8; 0x10000],
    interrupts: Interrupts,
    stop_prepared: bool,
    toggled_speed: bool,
}

impl TestMemory {
    fn new() -> Self {
        TestMemory {
            mem: [0; 0x10000],
            interrupts: Interrupts::new(),
            stop_prepared: false,
            toggled_speed: false,
        }
    }
}

impl MemoryMapper for TestMemory {
    fn read_byte(&mut self, address: u16) -> u8 {
        self.mem[address as usize]
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.mem[address as usize] = value;
    }

    fn boot_rom_finished(&self) -> bool {
        true
    }

    fn emulated_model(&self) -> GameBoyModel {
        GameBoyModel::Dmg
    }

    fn cartridge(&self) -> Option<&Cartridge> {
        None
    }

    fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    fn turn_on_lcd(&mut self) {}

    fn turn_off_lcd(&mut self) {}

    fn perform_stop(&mut self) -> bool {
        if self.stop_prepared {
            self.toggled_speed = true;
            true
        } else {
            false
        }
    }

    fn do_m_cycle(&mut self) -> bool {
        false
    }
}

impl Debug for TestMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TestMemory")
    }
}

fn initial_cpu() -> CPU<TestMemory> {
    CPU::new(TestMemory::new())
}

fn set_short(cpu: &mut CPU<TestMemory>, address: u16, value: u16) {
    cpu.mmu.write_byte(address, (value & 0xFF) as u8);
    cpu.mmu.write_byte(address.wrapping_add(1), (value >> 8) as u8);
}

#[test]
fn load_16bit_register_to_register() {
    let mut cpu = initial_cpu();
    cpu.registers.sp = 0x200;
    cpu.registers.set_hl(0x500);

    cpu.load_16bit(SP, HL);

    assert_eq!(cpu.registers.sp, 0x500);
}

#[test]
fn increment_sets_half_carry_and_zero() {
    let mut cpu = initial_cpu();
    cpu.registers.b = 0xFF;

    cpu.increment(B);

    assert_eq!(cpu.registers.b, 0);
    assert!(cpu.registers.zf());
    assert!(cpu.registers.h());
    assert!(!cpu.registers.n());
}

#[test]
fn relative_jump_advances_pc_when_condition_met() {
    let mut cpu = initial_cpu();
    cpu.registers.pc = 0x100;
    set_short(&mut cpu, 0x100, 0x05);

    cpu.relative_jump(JumpModifier::Always);

    assert_eq!(cpu.registers.pc, 0x106);
}

#[test]
fn interrupt_dispatch_respects_priority_and_clears_ime() {
    let mut cpu = initial_cpu();
    cpu.ime = true;
    cpu.registers.pc = 0x150;
    cpu.registers.sp = 0xFFFE;
    cpu.mmu.interrupts_mut().interrupt_enable = crate::io::interrupts::InterruptFlags::all();
    cpu.mmu.interrupts_mut().request(Interrupt::Timer);
    cpu.mmu.interrupts_mut().request(Interrupt::VBlank);

    let dispatched = cpu.handle_interrupts();

    assert!(dispatched);
    // VBlank has higher priority than Timer even though Timer was requested first.
    assert_eq!(cpu.registers.pc, Interrupt::VBlank.vector());
    assert!(!cpu.ime);
    assert!(cpu.mmu.interrupts().pending().is_some());
}

#[test]
fn halted_cpu_wakes_on_pending_unmasked_interrupt_without_ime() {
    let mut cpu = initial_cpu();
    cpu.ime = false;
    cpu.halted = true;
    cpu.mmu.interrupts_mut().interrupt_enable = crate::io::interrupts::InterruptFlags::TIMER;
    cpu.mmu.interrupts_mut().request(Interrupt::Timer);

    cpu.step_cycle();

    assert!(!cpu.halted);
}

#[test]
fn stop_toggles_speed_when_prepared() {
    let mut cpu = initial_cpu();
    cpu.registers.pc = 0x100;
    cpu.mmu.stop_prepared = true;

    cpu.stop();

    assert!(cpu.mmu.toggled_speed);
    assert!(!cpu.halted);
}

#[test]
fn stop_halts_when_not_prepared() {
    let mut cpu = initial_cpu();
    cpu.registers.pc = 0x100;

    cpu.stop();

    assert!(!cpu.mmu.toggled_speed);
    assert!(cpu.halted);
}
