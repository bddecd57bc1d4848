use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::mitigation::Notify;

/// A notification target a thread can block on.
///
/// Ringing never blocks beyond a short critical section. Rings that happen while nobody waits are
/// remembered, several of them collapse into a single wakeup.
#[derive(Debug, Default)]
pub struct Doorbell {
    state: Mutex<Bell>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct Bell {
    pending: bool,
    rings: u64,
}

impl Doorbell {
    /// A silent doorbell.
    pub fn new() -> Self {
        Doorbell::default()
    }

    /// Ring the bell, waking one waiter.
    pub fn ring(&self) {
        let mut bell = self.state.lock();
        bell.pending = true;
        bell.rings += 1;
        self.cond.notify_one();
    }

    /// Block until the bell was rung, then reset it.
    pub fn wait(&self) {
        let mut bell = self.state.lock();
        while !bell.pending {
            self.cond.wait(&mut bell);
        }
        bell.pending = false;
    }

    /// Block until the bell was rung or `timeout` passed.
    ///
    /// Returns `true` and resets the bell if it was rung.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut bell = self.state.lock();
        if !bell.pending {
            let _ = self.cond.wait_while_for(&mut bell, |bell| !bell.pending, timeout);
        }
        let rung = bell.pending;
        bell.pending = false;
        rung
    }

    /// Check if the bell was rung since the last wait, without resetting it.
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// The number of rings so far.
    pub fn rings(&self) -> u64 {
        self.state.lock().rings
    }
}

impl Notify for Doorbell {
    fn notify(&self) {
        self.ring()
    }
}
