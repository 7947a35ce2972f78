//! The cycle scheduler: a global simulated-cycle counter `T` plus, for each
//! device token, a `last_sync`/`next_event` pair. The CPU is the only thing
//! that advances `T`; every other device is a "pull-mode" actor brought
//! current on demand by [`Scheduler::check`].
use std::fmt;

/// Used when a device has nothing scheduled; far enough away that it will
/// never spuriously become `first_event` during a normal run.
pub const NEVER: i32 = 10_000_000;

/// The five devices that participate in lazy catch-up. Order here is also
/// the service order within a single [`Scheduler::check`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(usize)]
pub enum Token {
    Ppu = 0,
    Dma = 1,
    Timer = 2,
    Cart = 3,
    Spu = 4,
}

const TOKEN_COUNT: usize = 5;
const TOKENS_IN_ORDER: [Token; TOKEN_COUNT] = [Token::Ppu, Token::Dma, Token::Timer, Token::Spu, Token::Cart];

/// Tracks the global cycle counter and the per-device sync bookkeeping.
/// Deliberately signed 32-bit: `rebase` relies on being able to subtract `T`
/// from timestamps that may sit slightly ahead of `T` without the
/// subtraction underflowing unsigned.
pub struct Scheduler {
    /// The global, monotonically increasing (until `rebase`) cycle counter.
    pub t: i32,
    last_sync: [i32; TOKEN_COUNT],
    next_event: [i32; TOKEN_COUNT],
    first_event: i32,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            t: 0,
            last_sync: [0; TOKEN_COUNT],
            next_event: [NEVER; TOKEN_COUNT],
            first_event: NEVER,
        }
    }

    #[inline]
    pub fn add_cycles(&mut self, cycles: i32) {
        self.t += cycles;
    }

    /// Returns cycles elapsed since the token was last synced, and marks it
    /// current as of `T`. Must be the first thing a sync function does.
    #[inline]
    pub fn resync(&mut self, token: Token) -> i32 {
        let idx = token as usize;
        let delta = self.t - self.last_sync[idx];
        self.last_sync[idx] = self.t;
        delta
    }

    /// Schedules `token`'s next wake-up `delta` cycles from now and
    /// recomputes the cached minimum.
    #[inline]
    pub fn schedule(&mut self, token: Token, delta: i32) {
        let idx = token as usize;
        self.next_event[idx] = self.t + delta;
        self.recompute_first_event();
    }

    /// Parks a token indefinitely (e.g. LCD off, DMA idle).
    #[inline]
    pub fn cancel(&mut self, token: Token) {
        self.next_event[token as usize] = NEVER;
        self.recompute_first_event();
    }

    #[inline]
    fn recompute_first_event(&mut self) {
        self.first_event = *self.next_event.iter().min().unwrap();
    }

    #[inline]
    pub fn first_event(&self) -> i32 {
        self.first_event
    }

    #[inline]
    pub fn next_event_for(&self, token: Token) -> i32 {
        self.next_event[token as usize]
    }

    #[inline]
    pub fn last_sync_for(&self, token: Token) -> i32 {
        self.last_sync[token as usize]
    }

    /// Services every token whose `next_event` has fired, in the fixed
    /// PPU → DMA → TIMER → SPU → CART order, via the supplied callback.
    /// `sync_fn` is expected to call the matching device's sync function and
    /// reschedule it (or cancel it) before returning.
    pub fn check(&mut self, mut sync_fn: impl FnMut(&mut Scheduler, Token)) {
        while self.t >= self.first_event {
            for &token in TOKENS_IN_ORDER.iter() {
                if self.t >= self.next_event[token as usize] {
                    sync_fn(self, token);
                }
            }
            // sync_fn calls are expected to always advance next_event past T;
            // if they didn't (a bug) this would loop forever, so re-derive
            // first_event defensively instead of trusting stale state.
            self.recompute_first_event();
        }
    }

    /// Subtracts `T` from every timestamp and zeroes `T`, to keep the
    /// signed 32-bit counters from drifting toward overflow during a long
    /// run. Safe to call whenever `T` sits at a point where every token is
    /// current (i.e. right after a `check()`).
    pub fn rebase(&mut self) {
        let t = self.t;
        for idx in 0..TOKEN_COUNT {
            self.last_sync[idx] -= t;
            if self.next_event[idx] != NEVER {
                self.next_event[idx] -= t;
            }
        }
        if self.first_event != NEVER {
            self.first_event -= t;
        }
        self.t = 0;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scheduler {{ t: {}, first_event: {}, next_event: {:?} }}",
            self.t, self.first_event, self.next_event
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_tracks_minimum() {
        let mut s = Scheduler::new();
        s.schedule(Token::Ppu, 80);
        s.schedule(Token::Timer, 1024);
        assert_eq!(s.first_event(), 80);
        s.schedule(Token::Dma, 40);
        assert_eq!(s.first_event(), 40);
    }

    #[test]
    fn resync_reports_elapsed_delta() {
        let mut s = Scheduler::new();
        s.add_cycles(100);
        assert_eq!(s.resync(Token::Cart), 100);
        s.add_cycles(50);
        assert_eq!(s.resync(Token::Cart), 50);
    }

    #[test]
    fn check_services_due_tokens_in_fixed_order() {
        let mut s = Scheduler::new();
        s.schedule(Token::Timer, 10);
        s.schedule(Token::Ppu, 10);
        s.add_cycles(10);

        let mut order = Vec::new();
        s.check(|sched, token| {
            order.push(token);
            sched.schedule(token, 1_000);
        });

        assert_eq!(order, vec![Token::Ppu, Token::Timer]);
    }

    #[test]
    fn rebase_keeps_relative_offsets() {
        let mut s = Scheduler::new();
        s.add_cycles(1_000);
        s.schedule(Token::Spu, 64);
        let absolute_next = s.next_event_for(Token::Spu);
        s.rebase();
        assert_eq!(s.t, 0);
        assert_eq!(s.next_event_for(Token::Spu), absolute_next - 1_000);
    }

    #[test]
    fn cancel_parks_token_at_never() {
        let mut s = Scheduler::new();
        s.schedule(Token::Dma, 40);
        s.cancel(Token::Dma);
        assert_eq!(s.next_event_for(Token::Dma), NEVER);
    }
}
