//! MBC3's real-time clock. Modeled relative to a wall-clock source rather
//! than ticked per-cycle, since its resolution (seconds) is far coarser than
//! anything the scheduler tracks.

/// Snapshot of the clock at the moment it was last latched, which is what
/// the CPU actually reads back through the RTC registers.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RtcSnapshot {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_low: u8,
    /// Bit 0: day counter bit 8. Bit 6: halt. Bit 7: day counter carry.
    pub day_high: u8,
}

pub struct Rtc {
    /// Wall-clock seconds at which the counter would read zero, were it not
    /// halted. Advancing the clock is just re-deriving elapsed seconds from
    /// `now() - base`.
    base: u64,
    /// Seconds elapsed before the most recent halt; `None` while running.
    halted_at: Option<u64>,
    latch: RtcSnapshot,
    now: fn() -> u64,
}

const SECS_PER_DAY: u64 = 86_400;
const DAY_CARRY_BIT: u8 = 0b1000_0000;
const HALT_BIT: u8 = 0b0100_0000;
const DAY_HIGH_BIT: u8 = 0b0000_0001;

impl Rtc {
    pub fn new(now: fn() -> u64) -> Self {
        Rtc {
            base: now(),
            halted_at: None,
            latch: RtcSnapshot::default(),
            now,
        }
    }

    fn elapsed_seconds(&self) -> u64 {
        match self.halted_at {
            Some(frozen) => frozen,
            None => (self.now)().saturating_sub(self.base),
        }
    }

    /// Latches the current running value into the readable snapshot. Real
    /// hardware does this on a 0→1 transition of the write to 0x6000..0x7FFF;
    /// the caller is responsible for edge-detecting that and only calling
    /// this once per transition.
    pub fn latch(&mut self) {
        let elapsed = self.elapsed_seconds();
        let days = elapsed / SECS_PER_DAY;
        let carry = days > 0x1FF;
        let days = days & 0x1FF;

        self.latch = RtcSnapshot {
            seconds: (elapsed % 60) as u8,
            minutes: ((elapsed / 60) % 60) as u8,
            hours: ((elapsed / 3600) % 24) as u8,
            day_low: (days & 0xFF) as u8,
            day_high: ((days >> 8) as u8 & DAY_HIGH_BIT)
                | if self.halted_at.is_some() { HALT_BIT } else { 0 }
                | if carry { DAY_CARRY_BIT } else { 0 },
        };
    }

    pub fn read_register(&self, index: u8) -> u8 {
        match index {
            0x08 => self.latch.seconds,
            0x09 => self.latch.minutes,
            0x0A => self.latch.hours,
            0x0B => self.latch.day_low,
            0x0C => self.latch.day_high,
            _ => 0xFF,
        }
    }

    /// Writes rebase `base`/`halted_at` so the change takes effect
    /// immediately rather than waiting for the next latch.
    pub fn write_register(&mut self, index: u8, value: u8) {
        let mut elapsed = self.elapsed_seconds();
        let days = elapsed / SECS_PER_DAY;
        let rest = elapsed % SECS_PER_DAY;
        let (h, m, s) = (rest / 3600, (rest / 60) % 60, rest % 60);

        elapsed = match index {
            0x08 => days * SECS_PER_DAY + h * 3600 + m * 60 + (value as u64 % 60),
            0x09 => days * SECS_PER_DAY + h * 3600 + (value as u64 % 60) * 60 + s,
            0x0A => days * SECS_PER_DAY + (value as u64 % 24) * 3600 + m * 60 + s,
            0x0B => (days & !0xFF | value as u64) * SECS_PER_DAY + rest,
            0x0C => {
                let new_days = (days & 0xFF) | (((value & DAY_HIGH_BIT) as u64) << 8);
                let halt = value & HALT_BIT != 0;
                let halted_elapsed = new_days * SECS_PER_DAY + rest;
                if halt {
                    self.halted_at = Some(halted_elapsed);
                } else {
                    self.halted_at = None;
                    self.base = (self.now)().saturating_sub(halted_elapsed);
                }
                return;
            }
            _ => return,
        };

        match self.halted_at {
            Some(_) => self.halted_at = Some(elapsed),
            None => self.base = (self.now)().saturating_sub(elapsed),
        }
    }

    /// Packs the clock into the save-file tail format: two big-endian u64
    /// timestamps (`base`, halt timestamp or 0), a halted flag, then the 5
    /// latched register bytes.
    pub const BYTE_LEN: usize = 22;

    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..8].copy_from_slice(&self.base.to_be_bytes());
        out[8..16].copy_from_slice(&self.halted_at.unwrap_or(0).to_be_bytes());
        out[16] = self.halted_at.is_some() as u8;
        out[17] = self.latch.seconds;
        out[18] = self.latch.minutes;
        out[19] = self.latch.hours;
        out[20] = self.latch.day_low;
        out[21] = self.latch.day_high;
        out
    }

    pub fn load_bytes(&mut self, bytes: &[u8; Self::BYTE_LEN]) {
        self.base = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let halt_ts = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
        self.halted_at = if bytes[16] != 0 { Some(halt_ts) } else { None };
        self.latch = RtcSnapshot {
            seconds: bytes[17],
            minutes: bytes[18],
            hours: bytes[19],
            day_low: bytes[20],
            day_high: bytes[21],
        };
    }
}

impl std::fmt::Debug for Rtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rtc")
            .field("base", &self.base)
            .field("halted_at", &self.halted_at)
            .field("latch", &self.latch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_clock() -> u64 {
        1_000_000
    }

    #[test]
    fn latch_reads_back_elapsed_time() {
        let mut rtc = Rtc::new(fixed_clock);
        rtc.base = fixed_clock() - 3661; // 1h 1m 1s elapsed
        rtc.latch();
        assert_eq!(rtc.read_register(0x0A), 1);
        assert_eq!(rtc.read_register(0x09), 1);
        assert_eq!(rtc.read_register(0x08), 1);
    }

    #[test]
    fn halting_freezes_elapsed_time() {
        let mut rtc = Rtc::new(fixed_clock);
        rtc.base = fixed_clock() - 10;
        rtc.write_register(0x0C, HALT_BIT);
        assert!(rtc.halted_at.is_some());
        let frozen = rtc.elapsed_seconds();
        assert_eq!(rtc.elapsed_seconds(), frozen);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut rtc = Rtc::new(fixed_clock);
        rtc.base = fixed_clock() - 500;
        rtc.latch();
        let bytes = rtc.to_bytes();
        let mut restored = Rtc::new(fixed_clock);
        restored.load_bytes(&bytes);
        assert_eq!(restored.base, rtc.base);
        assert_eq!(restored.latch, rtc.latch);
    }
}
