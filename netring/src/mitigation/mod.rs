//! Coalescing of arrival signals into a bounded rate of notifications.
//!
//! A receive path that signals once per packet would wake its reader once per packet. The
//! coalescer instead works as follows:
//!
//! * the first arrival on an idle coalescer notifies immediately and starts a timer;
//! * later arrivals only mark pending work while the timer runs;
//! * when the timer expires with pending work, one notification flushes all of it and the timer
//!   is restarted;
//! * when the timer expires without pending work, the coalescer becomes idle again.
//!
//! At most one notification is emitted per timer interval and no arrival is ever left without a
//! notification following it.
//!
//! ## Structure
//!
//! [`Mitigation`] is the state machine on its own, without a timer or a notification target.
//! Its transitions happen under a lock scoped to the state alone; the caller acts on the returned
//! decision after the lock is released, so a slow notification never blocks the arrival path.
//!
//! [`Coalescer`] drives a `Mitigation` with a [`Timer`] service and a [`Notify`] target. The timer
//! calls back into the coalescer through an [`ExpiryHandle`].
//!
//! [`Mitigation`]: struct.Mitigation.html
//! [`Coalescer`]: struct.Coalescer.html
//! [`Timer`]: trait.Timer.html
//! [`Notify`]: trait.Notify.html
//! [`ExpiryHandle`]: struct.ExpiryHandle.html
use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::sync::Arc;
use thiserror::Error;

use crate::FnHandler;
use crate::time::Duration;

mod sim;
#[cfg(feature = "std")]
mod thread;

#[cfg(test)]
mod tests;

pub use self::sim::VirtualTimer;
#[cfg(feature = "std")]
pub use self::thread::ThreadTimer;

/// The state of a coalescer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// No timer armed and no pending work.
    Idle,
    /// Timer running, no work arrived since it was armed or since the last notification.
    ArmedClean,
    /// Timer running, with work that has not been notified yet.
    ArmedPending,
    /// Coalescing is disabled, every arrival notifies immediately.
    ///
    /// Entered when the timer service fails or after the coalescer was cancelled.
    Passthrough,
}

/// What to do about an arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arrival {
    /// Notify now and start the timer.
    NotifyAndArm,
    /// Nothing to do now, the next expiry flushes the work.
    Deferred,
    /// Notify now, there is no timer.
    Notify,
}

/// What to do about a timer expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// Pending work was flushed: notify and restart the timer.
    NotifyAndRearm,
    /// No work arrived during the interval: stop the timer.
    Quiesce,
    /// The timer should not have been running: stop it, nothing to notify.
    Stale,
}

/// The decision of an expiry callback, to the timer service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Restart {
    /// Run again, one interval after the previous deadline.
    Yes,
    /// Stop the timer.
    No,
}

/// Failure of a timer service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum TimerError {
    /// The timer service does not exist or could not be started.
    #[error("timer service unavailable")]
    Unavailable,
    /// The timer service was shut down.
    #[error("timer service shut down")]
    Shutdown,
}

/// The sans-IO coalescing state machine.
#[derive(Debug)]
pub struct Mitigation {
    state: spin::Mutex<State>,
}

/// A relative one-shot timer that can restart itself.
///
/// The timer calls an expiry callback, usually [`ExpiryHandle::fire`], once its deadline passes.
/// If the callback returns `Restart::Yes` the next deadline is one interval after the previous
/// one.
///
/// Methods take `&self` since the arrival path and the teardown path use the timer concurrently
/// with the timer's own expiry context.
///
/// [`ExpiryHandle::fire`]: struct.ExpiryHandle.html#method.fire
pub trait Timer {
    /// Arm the timer to expire `interval` from now.
    ///
    /// A `start` that overlaps with a running expiry callback wins over that callback's return
    /// value: the timer ends up armed with the new deadline.
    fn start(&self, interval: Duration) -> Result<(), TimerError>;

    /// Disarm the timer.
    ///
    /// Must not return while an expiry callback is still executing, unless called from within
    /// that callback. No callback begins after `cancel` returned, until the next `start`.
    fn cancel(&self);

    /// Check if the timer is armed or its callback is running.
    fn is_active(&self) -> bool;
}

/// Delivers a notification to whatever waits for data.
///
/// Must not block: it is called on the arrival path and in the timer's expiry context.
pub trait Notify {
    /// Wake the waiting entity.
    fn notify(&self);
}

/// Counters of a coalescer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Arrival signals received.
    pub arrivals: usize,
    /// Notifications emitted.
    pub notifications: usize,
    /// Timer expiries handled.
    pub expiries: usize,
}

/// Coalesces arrival signals into notifications with a timer.
pub struct Coalescer<T: Timer, N: Notify> {
    shared: Arc<Shared<N>>,
    timer: T,
    interval: Duration,
}

/// The expiry callback of a coalescer, to be owned by its timer.
pub struct ExpiryHandle<N> {
    shared: Arc<Shared<N>>,
}

struct Shared<N> {
    machine: Mitigation,
    notify: N,
    /// Arrivals between their state transition and the end of their timer start.
    arming: AtomicUsize,
    arrivals: AtomicUsize,
    notifications: AtomicUsize,
    expiries: AtomicUsize,
}

impl Mitigation {
    /// A new, idle state machine.
    pub const fn new() -> Self {
        Mitigation {
            state: spin::Mutex::new(State::Idle),
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        *self.state.lock()
    }

    /// Transition on an arrival signal.
    pub fn on_arrival(&self) -> Arrival {
        let mut state = self.state.lock();
        match *state {
            State::Idle => {
                *state = State::ArmedClean;
                Arrival::NotifyAndArm
            },
            State::ArmedClean | State::ArmedPending => {
                *state = State::ArmedPending;
                Arrival::Deferred
            },
            State::Passthrough => Arrival::Notify,
        }
    }

    /// Transition on a timer expiry.
    pub fn on_expiry(&self) -> Expiry {
        let mut state = self.state.lock();
        match *state {
            State::ArmedPending => {
                *state = State::ArmedClean;
                Expiry::NotifyAndRearm
            },
            State::ArmedClean => {
                *state = State::Idle;
                Expiry::Quiesce
            },
            State::Idle | State::Passthrough => Expiry::Stale,
        }
    }

    /// Stop coalescing, every further arrival notifies immediately.
    ///
    /// Returns `true` if work was pending, which the caller must then notify.
    pub fn disable(&self) -> bool {
        let mut state = self.state.lock();
        let pending = *state == State::ArmedPending;
        *state = State::Passthrough;
        pending
    }
}

impl Default for Mitigation {
    fn default() -> Self {
        Mitigation::new()
    }
}

impl<T: Timer, N: Notify> Coalescer<T, N> {
    /// Create an idle coalescer.
    ///
    /// `make_timer` receives the expiry callback and returns the timer that will call it. A timer
    /// service that can not be created can be passed as `None`: the coalescer then falls back to
    /// a notification per arrival.
    pub fn new<F>(interval: Duration, notify: N, make_timer: F) -> Self
        where F: FnOnce(ExpiryHandle<N>) -> T,
    {
        let shared = Arc::new(Shared {
            machine: Mitigation::new(),
            notify,
            arming: AtomicUsize::new(0),
            arrivals: AtomicUsize::new(0),
            notifications: AtomicUsize::new(0),
            expiries: AtomicUsize::new(0),
        });
        let timer = make_timer(ExpiryHandle { shared: Arc::clone(&shared) });

        Coalescer {
            shared,
            timer,
            interval,
        }
    }

    /// Signal that work arrived.
    ///
    /// Called from the arrival path. Never blocks beyond the state transition and the timer start.
    pub fn signal_arrival(&self) {
        self.shared.arrivals.fetch_add(1, Ordering::Relaxed);
        // Registered before the transition so that `cancel` can wait for an arm in flight.
        self.shared.arming.fetch_add(1, Ordering::SeqCst);
        let decision = self.shared.machine.on_arrival();
        let mut flush = false;
        if decision == Arrival::NotifyAndArm {
            if let Err(err) = self.timer.start(self.interval) {
                net_warn!("mitigation: timer failed ({}), notifying every arrival", err);
                flush = self.shared.machine.disable();
            } else if self.shared.machine.state() == State::Passthrough {
                // Cancelled while we were arming.
                self.timer.cancel();
            }
        }
        self.shared.arming.fetch_sub(1, Ordering::SeqCst);

        match decision {
            Arrival::NotifyAndArm | Arrival::Notify => self.shared.deliver(),
            Arrival::Deferred => (),
        }
        if flush {
            self.shared.deliver();
        }
    }

    /// Cancel the timer and stop coalescing.
    ///
    /// Synchronous: no expiry callback is running once this returns, and none will run. Pending
    /// work is flushed with a final notification. Arrivals after this call notify immediately.
    pub fn cancel(&self) {
        // No arrival can arm the timer once the state is `Passthrough`.
        self.disable();
        while self.shared.arming.load(Ordering::SeqCst) != 0 {
            core::hint::spin_loop();
        }
        self.timer.cancel();
    }

    /// Check if the timer is armed or firing.
    pub fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.shared.machine.state()
    }

    /// The coalescing interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The counters so far.
    pub fn stats(&self) -> Stats {
        self.shared.stats()
    }

    /// The timer service.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// The notification target.
    pub fn notifier(&self) -> &N {
        &self.shared.notify
    }

    fn disable(&self) {
        if self.shared.machine.disable() {
            self.shared.deliver();
        }
    }
}

impl<T: Timer, N: Notify> Drop for Coalescer<T, N> {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

impl<N: Notify> ExpiryHandle<N> {
    /// Handle the expiry of the coalescer's timer.
    ///
    /// Called from the timer's expiry context. Returns whether the timer should run again.
    pub fn fire(&self) -> Restart {
        self.shared.expiries.fetch_add(1, Ordering::Relaxed);
        match self.shared.machine.on_expiry() {
            Expiry::NotifyAndRearm => {
                self.shared.deliver();
                Restart::Yes
            },
            Expiry::Quiesce | Expiry::Stale => Restart::No,
        }
    }

    /// The coalescer's state.
    pub fn state(&self) -> State {
        self.shared.machine.state()
    }
}

impl<N> Clone for ExpiryHandle<N> {
    fn clone(&self) -> Self {
        ExpiryHandle { shared: Arc::clone(&self.shared) }
    }
}

impl<N: Notify> Shared<N> {
    fn deliver(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        self.notify.notify();
    }

    fn stats(&self) -> Stats {
        Stats {
            arrivals: self.arrivals.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            expiries: self.expiries.load(Ordering::Relaxed),
        }
    }
}

/// The missing timer service.
impl<T: Timer> Timer for Option<T> {
    fn start(&self, interval: Duration) -> Result<(), TimerError> {
        match self {
            Some(timer) => timer.start(interval),
            None => Err(TimerError::Unavailable),
        }
    }

    fn cancel(&self) {
        if let Some(timer) = self {
            timer.cancel()
        }
    }

    fn is_active(&self) -> bool {
        self.as_ref().map_or(false, Timer::is_active)
    }
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
    fn start(&self, interval: Duration) -> Result<(), TimerError> {
        (**self).start(interval)
    }

    fn cancel(&self) {
        (**self).cancel()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

/// A coalescer is the rate limited notification target of an arrival path.
impl<T: Timer, N: Notify> Notify for Coalescer<T, N> {
    fn notify(&self) {
        self.signal_arrival()
    }
}

impl<F: Fn()> Notify for FnHandler<F> {
    fn notify(&self) {
        (self.0)()
    }
}

impl<N: Notify + ?Sized> Notify for &'_ N {
    fn notify(&self) {
        (**self).notify()
    }
}

impl<N: Notify + ?Sized> Notify for Arc<N> {
    fn notify(&self) {
        (**self).notify()
    }
}
