use bitflags::bitflags;

bitflags! {
    /// Mirrors both IF and IE; IF's upper 3 bits always read as 1 (enforced
    /// in [`Interrupts::read_if`], not here, since IE has no such quirk).
    pub struct InterruptFlags: u8 {
        const VBLANK = 0b0000_0001;
        const LCD_STAT = 0b0000_0010;
        const TIMER = 0b0000_0100;
        const SERIAL = 0b0000_1000;
        const INPUT = 0b0001_0000;
    }
}

/// The five interrupt sources, in priority order (lowest value serviced
/// first).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    VBlank = 0b0000_0001,
    LcdStat = 0b0000_0010,
    Timer = 0b0000_0100,
    Serial = 0b0000_1000,
    Input = 0b0001_0000,
}

impl Interrupt {
    pub const ORDER: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Input,
    ];

    pub fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x40,
            Interrupt::LcdStat => 0x48,
            Interrupt::Timer => 0x50,
            Interrupt::Serial => 0x58,
            Interrupt::Input => 0x60,
        }
    }

    pub fn flag(self) -> InterruptFlags {
        InterruptFlags::from_bits_truncate(self as u8)
    }
}

/// Holds the IF/IE register pair. IF's upper 3 bits are unconnected on
/// hardware and always read 1.
#[derive(Debug, Clone)]
pub struct Interrupts {
    interrupt_flag: InterruptFlags,
    pub interrupt_enable: InterruptFlags,
}

impl Interrupts {
    const UNUSED_IF_BITS: u8 = 0b1110_0000;

    pub fn new() -> Self {
        Interrupts {
            interrupt_flag: InterruptFlags::empty(),
            interrupt_enable: InterruptFlags::empty(),
        }
    }

    pub fn request(&mut self, interrupt: Interrupt) {
        self.interrupt_flag.insert(interrupt.flag());
    }

    pub fn insert_interrupt(&mut self, flags: InterruptFlags) {
        self.interrupt_flag.insert(flags);
    }

    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.interrupt_flag.remove(interrupt.flag());
    }

    /// The pending interrupt with the highest priority, if any, after
    /// masking against IE.
    pub fn pending(&self) -> Option<Interrupt> {
        Interrupt::ORDER
            .iter()
            .copied()
            .find(|i| self.interrupt_flag.contains(i.flag()) && self.interrupt_enable.contains(i.flag()))
    }

    pub fn any_pending_unmasked(&self) -> bool {
        !(self.interrupt_flag & self.interrupt_enable).is_empty()
    }

    pub fn read_if(&self) -> u8 {
        self.interrupt_flag.bits() | Self::UNUSED_IF_BITS
    }

    pub fn write_if(&mut self, value: u8) {
        self.interrupt_flag = InterruptFlags::from_bits_truncate(value);
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_matches_bit_order() {
        let order: Vec<u8> = Interrupt::ORDER.iter().map(|i| *i as u8).collect();
        assert_eq!(order, vec![0x01, 0x02, 0x04, 0x08, 0x10]);
    }

    #[test]
    fn read_if_upper_bits_always_one() {
        let interrupts = Interrupts::new();
        assert_eq!(interrupts.read_if() & 0b1110_0000, 0b1110_0000);
    }

    #[test]
    fn pending_respects_enable_mask_and_priority() {
        let mut interrupts = Interrupts::new();
        interrupts.request(Interrupt::Timer);
        interrupts.request(Interrupt::VBlank);
        // Only TIMER is enabled, so it should be the only one observed despite
        // VBLANK having higher priority.
        interrupts.interrupt_enable = InterruptFlags::TIMER;
        assert_eq!(interrupts.pending(), Some(Interrupt::Timer));

        interrupts.interrupt_enable.insert(InterruptFlags::VBLANK);
        assert_eq!(interrupts.pending(), Some(Interrupt::VBlank));
    }
}
