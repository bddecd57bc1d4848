use core::cmp;

use crate::time::{Duration, Expiration, Instant};
use super::{ExpiryHandle, Notify, Restart, Timer, TimerError};

/// A timer on a simulated clock.
///
/// Time only moves when [`advance_to`] is called, which fires every deadline that passed on the
/// way, in order. Restarts are scheduled one interval after the deadline that fired, not after
/// the instant the clock was advanced to, so skipping ahead does not drift the schedule.
///
/// Used for deterministic tests of a coalescer and for running one inside an event loop that
/// keeps its own time.
///
/// [`advance_to`]: #method.advance_to
pub struct VirtualTimer<N> {
    expiry: ExpiryHandle<N>,
    clock: spin::Mutex<Clock>,
}

#[derive(Debug)]
struct Clock {
    now: Instant,
    deadline: Expiration,
    interval: Duration,
    /// Bumped by every `start` and `cancel`, to detect them during a callback.
    generation: u64,
    firing: bool,
}

impl<N: Notify> VirtualTimer<N> {
    /// A disarmed timer at the origin of the clock.
    pub fn new(expiry: ExpiryHandle<N>) -> Self {
        Self::starting_at(expiry, Instant::ZERO)
    }

    /// A disarmed timer with the clock at `now`.
    pub fn starting_at(expiry: ExpiryHandle<N>, now: Instant) -> Self {
        VirtualTimer {
            expiry,
            clock: spin::Mutex::new(Clock {
                now,
                deadline: Expiration::Never,
                interval: Duration::from_millis(0),
                generation: 0,
                firing: false,
            }),
        }
    }

    /// The current simulated time.
    pub fn now(&self) -> Instant {
        self.clock.lock().now
    }

    /// The next deadline.
    pub fn deadline(&self) -> Expiration {
        self.clock.lock().deadline
    }

    /// Move the clock forward to `now`, firing all deadlines up to and including it.
    ///
    /// The clock never moves backwards, an earlier `now` only fires what is already due. Returns
    /// the number of expiries.
    pub fn advance_to(&self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            let (deadline, generation) = {
                let mut clock = self.clock.lock();
                match clock.deadline {
                    Expiration::When(deadline) if clock.deadline.is_due(now) => {
                        clock.now = cmp::max(clock.now, deadline);
                        clock.firing = true;
                        (deadline, clock.generation)
                    },
                    _ => {
                        clock.now = cmp::max(clock.now, now);
                        break;
                    },
                }
            };

            let restart = self.expiry.fire();
            fired += 1;

            let mut clock = self.clock.lock();
            clock.firing = false;
            if clock.generation == generation {
                clock.deadline = match restart {
                    Restart::Yes => Expiration::When(deadline + clock.interval),
                    Restart::No => Expiration::Never,
                };
            }
        }

        fired
    }
}

impl<N> Timer for VirtualTimer<N> {
    fn start(&self, interval: Duration) -> Result<(), TimerError> {
        let mut clock = self.clock.lock();
        clock.interval = interval;
        clock.deadline = Expiration::When(clock.now + interval);
        clock.generation += 1;
        Ok(())
    }

    fn cancel(&self) {
        let mut clock = self.clock.lock();
        clock.deadline = Expiration::Never;
        clock.generation += 1;
    }

    fn is_active(&self) -> bool {
        let clock = self.clock.lock();
        clock.firing || clock.deadline != Expiration::Never
    }
}
