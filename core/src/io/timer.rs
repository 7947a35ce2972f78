use crate::io::interrupts::InterruptFlags;
use crate::io::timer::InputClock::C256;
use crate::scheduler::{Scheduler, Token};

/// This register is incremented at rate of 16384Hz. Writing any value to
/// this register resets it to 00h.
pub const DIVIDER_REGISTER: u16 = 0xFF04;
/// Incremented at the rate selected by `TIMER_CONTROL`. When it overflows it
/// is reloaded from `TIMER_MODULO` and a TIMER interrupt is requested.
pub const TIMER_COUNTER: u16 = 0xFF05;
/// The value loaded into `TIMER_COUNTER` on overflow.
pub const TIMER_MODULO: u16 = 0xFF06;
/// Enable bit plus a 2-bit clock select.
pub const TIMER_CONTROL: u16 = 0xFF07;

#[derive(Debug, Copy, Clone)]
enum InputClock {
    C16 = 0x1,
    C64 = 0x2,
    C256 = 0x3,
    C1024 = 0x0,
}

#[derive(Debug, Copy, Clone)]
pub struct TimerControl {
    timer_enabled: bool,
    input_select: InputClock,
}

/// The DIV/TIMA/TMA/TAC block. Rather than being ticked every 4 cycles it is
/// a scheduler-driven device: it is only visited by [`Timer::sync`] when its
/// own `next_event` fires, and is responsible for rescheduling itself before
/// returning.
#[derive(Debug)]
pub struct Timer {
    system_clock: u16,
    timer_counter: u8,
    timer_modulo: u8,
    timer_control: TimerControl,
    /// TIMA overflowed last sync and is due to be reloaded from TMA and
    /// raise TIMER on the next sync, 4 cycles later.
    overflowed: bool,
    /// True only during the sync that performs the TMA reload, so a write to
    /// TIMA or TMA landing in that exact cycle observes the quirked behavior.
    just_overflowed: bool,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            system_clock: 0,
            timer_counter: 0,
            timer_modulo: 0,
            timer_control: TimerControl::default(),
            overflowed: false,
            just_overflowed: false,
        }
    }

    pub fn divider_register(&self) -> u8 {
        (self.system_clock >> 8) as u8
    }

    pub fn timer_counter(&self) -> u8 {
        self.timer_counter
    }

    pub fn timer_modulo(&self) -> u8 {
        self.timer_modulo
    }

    pub fn timer_control(&self) -> u8 {
        self.timer_control.to_bits()
    }

    /// Brings the timer current with the scheduler's `T`, handles any
    /// pending TIMA overflow, and reschedules the next wake-up. Returns the
    /// interrupt to raise, if any.
    pub fn sync(&mut self, scheduler: &mut Scheduler) -> Option<InterruptFlags> {
        let delta = scheduler.resync(Token::Timer);
        let mut result = None;
        self.just_overflowed = false;

        if self.overflowed {
            self.timer_counter = self.timer_modulo;
            self.overflowed = false;
            self.just_overflowed = true;
            result = Some(InterruptFlags::TIMER);
        }

        let old_sys_clock = self.system_clock;
        self.system_clock = self.system_clock.wrapping_add(delta as u16);

        if self.timer_control.timer_enabled {
            let select_bit = self.timer_control.input_select.to_relevant_bit();
            if self.fallen_sys_clock(old_sys_clock, select_bit) {
                self.tick_timer();
            }
        }

        self.reschedule(scheduler);
        result
    }

    fn fallen_sys_clock(&self, old_clock: u16, select_bit: u16) -> bool {
        (old_clock & select_bit) != 0 && (self.system_clock & select_bit) == 0
    }

    fn tick_timer(&mut self) {
        let (new_value, overflowed) = self.timer_counter.overflowing_add(1);
        self.timer_counter = new_value;
        // The reload and interrupt are deferred to the next sync, 4 cycles
        // from now, matching real hardware's one-instruction delay.
        self.overflowed = overflowed;
    }

    /// Schedules the next time this device needs servicing: 4 cycles away if
    /// an overflow reload is pending, the next falling edge of the selected
    /// bit if the timer is running, or never if it's stopped (the divider
    /// itself never needs a wake-up; it's read lazily off `system_clock`).
    fn reschedule(&mut self, scheduler: &mut Scheduler) {
        if self.overflowed {
            scheduler.schedule(Token::Timer, 4);
        } else if self.timer_control.timer_enabled {
            let bit = self.timer_control.input_select.to_relevant_bit();
            scheduler.schedule(Token::Timer, Self::cycles_until_fall(self.system_clock, bit));
        } else {
            scheduler.cancel(Token::Timer);
        }
    }

    /// Cycles from the current divider value until the selected bit next
    /// falls from 1 to 0 (it falls exactly once per `2 * bit` cycles).
    fn cycles_until_fall(system_clock: u16, bit: u16) -> i32 {
        let period = (bit as u32) * 2;
        let phase = (system_clock as u32) % period;
        (if phase == 0 { period } else { period - phase }) as i32
    }

    /// Write to the `TIMA` register. If written to in the 4-cycle window
    /// after an overflow but before the TMA reload lands, cancels the
    /// pending reload and interrupt; if written in the exact cycle the
    /// reload lands, the write is discarded in favor of TMA.
    pub fn set_timer_counter(&mut self, scheduler: &mut Scheduler, value: u8) {
        self.sync(scheduler);
        if self.overflowed {
            self.overflowed = false;
        }
        if self.just_overflowed {
            self.timer_counter = self.timer_modulo;
        } else {
            self.timer_counter = value;
        }
        self.reschedule(scheduler);
    }

    /// Write to `TMA`. If written during the same cycle TIMA is reloaded,
    /// the new value is used for that reload instead of the old one.
    pub fn set_tma(&mut self, scheduler: &mut Scheduler, value: u8) {
        self.sync(scheduler);
        if self.just_overflowed {
            self.timer_counter = value;
        }
        self.timer_modulo = value;
        self.reschedule(scheduler);
    }

    /// Write to the divider register; always resets it to 0x00. If the
    /// system clock was already past the halfway point of the selected
    /// period, the falling-edge detector fires immediately.
    pub fn set_divider(&mut self, scheduler: &mut Scheduler) {
        self.sync(scheduler);
        let old_sys_clock = self.system_clock;
        self.system_clock = 0;
        if self.timer_control.timer_enabled
            && self.fallen_sys_clock(old_sys_clock, self.timer_control.input_select.to_relevant_bit())
        {
            self.tick_timer();
        }
        self.reschedule(scheduler);
    }

    pub fn set_timer_control(&mut self, scheduler: &mut Scheduler, value: u8) {
        self.sync(scheduler);
        let old_control = self.timer_control;
        self.timer_control = TimerControl::from(value);
        let old_select_bit = old_control.input_select.to_relevant_bit();
        let select_bit = self.timer_control.input_select.to_relevant_bit();

        // Disabling the timer mid-period still fires the falling-edge
        // detector if the system clock was already past halfway.
        if old_control.timer_enabled && !self.timer_control.timer_enabled && (self.system_clock & select_bit) != 0 {
            self.tick_timer();
        }

        // Swapping to a faster-falling select bit while already past its
        // halfway point triggers an immediate extra tick.
        if old_control.timer_enabled
            && self.timer_control.timer_enabled
            && (self.system_clock & old_select_bit) != 0
            && (self.system_clock & select_bit) == 0
        {
            self.tick_timer();
        }

        self.reschedule(scheduler);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerControl {
    pub fn to_bits(&self) -> u8 {
        let result = if self.timer_enabled { 0x4 } else { 0 };
        result | self.input_select as u8
    }
}

impl Default for TimerControl {
    fn default() -> Self {
        TimerControl {
            input_select: C256,
            timer_enabled: false,
        }
    }
}

impl From<u8> for TimerControl {
    fn from(val: u8) -> Self {
        TimerControl {
            timer_enabled: val & 0b0000_0100 > 0,
            input_select: InputClock::from(val),
        }
    }
}

impl From<u8> for InputClock {
    fn from(val: u8) -> Self {
        match val & 0x3 {
            0x0 => InputClock::C1024,
            0x1 => InputClock::C16,
            0x2 => InputClock::C64,
            0x3 => InputClock::C256,
            _ => unreachable!("masked to 2 bits"),
        }
    }
}

impl InputClock {
    pub fn to_relevant_bit(&self) -> u16 {
        match self {
            InputClock::C16 => 0x0008,
            InputClock::C64 => 0x0020,
            InputClock::C256 => 0x0080,
            InputClock::C1024 => 0x0200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tima_overflow_reloads_from_tma_after_delay() {
        let mut scheduler = Scheduler::new();
        let mut timer = Timer::new();
        timer.set_timer_control(&mut scheduler, 0b101); // enabled, C16
        timer.set_tma(&mut scheduler, 0x42);
        timer.timer_counter = 0xFF;

        // Advance to the next falling edge of bit 3 (16 cycles away from 0).
        scheduler.add_cycles(scheduler.next_event_for(Token::Timer) - scheduler.t);
        let irq = timer.sync(&mut scheduler);
        assert!(irq.is_none(), "overflow is deferred by one sync");
        assert_eq!(timer.timer_counter, 0x00);

        scheduler.add_cycles(4);
        let irq = timer.sync(&mut scheduler);
        assert_eq!(irq, Some(InterruptFlags::TIMER));
        assert_eq!(timer.timer_counter, 0x42);
    }

    #[test]
    fn divider_write_resets_to_zero() {
        let mut scheduler = Scheduler::new();
        let mut timer = Timer::new();
        scheduler.add_cycles(1000);
        timer.system_clock = 1234;
        timer.set_divider(&mut scheduler);
        assert_eq!(timer.divider_register(), 0);
    }

    #[test]
    fn disabled_timer_cancels_scheduled_wakeup() {
        let mut scheduler = Scheduler::new();
        let mut timer = Timer::new();
        timer.set_timer_control(&mut scheduler, 0b101);
        assert_ne!(scheduler.next_event_for(Token::Timer), crate::scheduler::NEVER);
        timer.set_timer_control(&mut scheduler, 0b001);
        assert_eq!(scheduler.next_event_for(Token::Timer), crate::scheduler::NEVER);
    }
}
