use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::time::Duration;
use super::{Restart, Timer, TimerError};

/// A wall clock timer serviced by a dedicated thread.
///
/// The callback runs on the timer thread without any lock of the timer held, so it may start or
/// cancel the timer itself. Restarted deadlines are forwarded past the current time in steps of
/// the interval, missed periods are not fired in a burst.
///
/// Dropping the timer cancels it and joins the thread.
pub struct ThreadTimer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    id: ThreadId,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    deadline: Option<Instant>,
    interval: Duration,
    /// Bumped by every `start` and `cancel`, to detect them during a callback.
    generation: u64,
    firing: bool,
    shutdown: bool,
}

impl ThreadTimer {
    /// Spawn the timer thread, initially disarmed.
    pub fn spawn<F>(callback: F) -> Result<Self, TimerError>
        where F: FnMut() -> Restart + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                deadline: None,
                interval: Duration::from_millis(0),
                generation: 0,
                firing: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });

        let thread = thread::Builder::new()
            .name("netring-timer".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared, callback)
            })
            .map_err(|_| TimerError::Unavailable)?;

        Ok(ThreadTimer {
            shared,
            id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    fn on_timer_thread(&self) -> bool {
        thread::current().id() == self.id
    }
}

fn run<F>(shared: &Shared, mut callback: F)
    where F: FnMut() -> Restart,
{
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        let deadline = match state.deadline {
            None => {
                shared.cond.wait(&mut state);
                continue;
            },
            Some(deadline) => deadline,
        };

        if Instant::now() < deadline {
            shared.cond.wait_until(&mut state, deadline);
            continue;
        }

        let generation = state.generation;
        state.firing = true;
        let restart = MutexGuard::unlocked(&mut state, &mut callback);
        state.firing = false;

        if state.generation == generation {
            state.deadline = match restart {
                Restart::Yes => Some(forward(deadline, state.interval, Instant::now())),
                Restart::No => None,
            };
        }

        shared.cond.notify_all();
    }
}

/// The first deadline after `now` in steps of `interval` from `deadline`.
fn forward(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    if interval.is_zero() {
        return now;
    }

    let mut next = deadline + interval;
    if next <= now {
        let behind = now.duration_since(next).as_nanos() / interval.as_nanos();
        // At most one step past `now`, saturating for absurd gaps.
        let steps = u32::try_from(behind + 1).unwrap_or(u32::MAX);
        next += interval * steps;
    }
    next
}

impl Timer for ThreadTimer {
    fn start(&self, interval: Duration) -> Result<(), TimerError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(TimerError::Shutdown);
        }

        state.interval = interval;
        state.deadline = Some(Instant::now() + interval);
        state.generation += 1;
        self.shared.cond.notify_all();
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        state.generation += 1;
        self.shared.cond.notify_all();

        if self.on_timer_thread() {
            return;
        }

        while state.firing {
            self.shared.cond.wait(&mut state);
        }
    }

    fn is_active(&self) -> bool {
        let state = self.shared.state.lock();
        state.firing || state.deadline.is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.deadline = None;
            self.shared.cond.notify_all();
        }

        if self.on_timer_thread() {
            return;
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                net_warn!("mitigation: timer thread panicked");
            }
        }
    }
}
