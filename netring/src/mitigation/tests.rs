use core::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::FnHandler;
use crate::time::{Duration, Expiration, Instant};
use super::*;

use proptest::prelude::*;

fn at(millis: i64) -> Instant {
    Instant::from_millis(millis)
}

/// A timer whose start always fails.
struct Broken;

impl Timer for Broken {
    fn start(&self, _: Duration) -> Result<(), TimerError> {
        Err(TimerError::Unavailable)
    }

    fn cancel(&self) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// A timer that runs a hook from inside `cancel`, after disarming.
#[derive(Default)]
struct Interleaved {
    armed: Cell<bool>,
    on_cancel: RefCell<Option<Box<dyn Fn()>>>,
}

impl Timer for Interleaved {
    fn start(&self, _: Duration) -> Result<(), TimerError> {
        self.armed.set(true);
        Ok(())
    }

    fn cancel(&self) {
        self.armed.set(false);
        let hook = self.on_cancel.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_active(&self) -> bool {
        self.armed.get()
    }
}

#[test]
fn transitions() {
    let machine = Mitigation::new();
    assert_eq!(machine.state(), State::Idle);
    assert_eq!(machine.on_expiry(), Expiry::Stale);

    assert_eq!(machine.on_arrival(), Arrival::NotifyAndArm);
    assert_eq!(machine.state(), State::ArmedClean);
    assert_eq!(machine.on_arrival(), Arrival::Deferred);
    assert_eq!(machine.state(), State::ArmedPending);
    assert_eq!(machine.on_arrival(), Arrival::Deferred);
    assert_eq!(machine.state(), State::ArmedPending);

    assert_eq!(machine.on_expiry(), Expiry::NotifyAndRearm);
    assert_eq!(machine.state(), State::ArmedClean);
    assert_eq!(machine.on_expiry(), Expiry::Quiesce);
    assert_eq!(machine.state(), State::Idle);
}

#[test]
fn disable_reports_pending() {
    let machine = Mitigation::new();
    assert!(!machine.disable());
    assert_eq!(machine.state(), State::Passthrough);
    assert_eq!(machine.on_arrival(), Arrival::Notify);
    assert_eq!(machine.on_expiry(), Expiry::Stale);

    let machine = Mitigation::new();
    machine.on_arrival();
    assert!(!machine.disable());

    let machine = Mitigation::new();
    machine.on_arrival();
    machine.on_arrival();
    assert!(machine.disable());
}

#[test]
fn coalesces_burst() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(100),
        FnHandler(|| count.set(count.get() + 1)),
        VirtualTimer::new);
    let timer = coalescer.timer();

    // Arrivals at 0, 5, 50 and 200 notify at 0, 100 and 200.
    timer.advance_to(at(0));
    coalescer.signal_arrival();
    assert_eq!(count.get(), 1);
    assert_eq!(timer.deadline(), Expiration::When(at(100)));

    timer.advance_to(at(5));
    coalescer.signal_arrival();
    timer.advance_to(at(50));
    coalescer.signal_arrival();
    assert_eq!(count.get(), 1);
    assert_eq!(coalescer.state(), State::ArmedPending);

    assert_eq!(timer.advance_to(at(100)), 1);
    assert_eq!(count.get(), 2);
    assert_eq!(coalescer.state(), State::ArmedClean);
    assert_eq!(timer.deadline(), Expiration::When(at(200)));

    // The expiry at 200 finds nothing pending and quiesces, the arrival at 200 re-arms.
    assert_eq!(timer.advance_to(at(200)), 1);
    assert_eq!(coalescer.state(), State::Idle);
    assert!(!coalescer.is_active());
    coalescer.signal_arrival();
    assert_eq!(count.get(), 3);
    assert_eq!(timer.deadline(), Expiration::When(at(300)));

    assert_eq!(coalescer.stats(), Stats { arrivals: 4, notifications: 3, expiries: 2 });
}

#[test]
fn single_arrival_notifies_once() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        VirtualTimer::new);

    coalescer.signal_arrival();
    assert!(coalescer.is_active());
    coalescer.timer().advance_to(at(1000));
    assert_eq!(count.get(), 1);
    assert_eq!(coalescer.state(), State::Idle);
    assert!(!coalescer.is_active());
}

#[test]
fn restart_keeps_schedule() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        VirtualTimer::new);
    let timer = coalescer.timer();

    coalescer.signal_arrival();
    coalescer.signal_arrival();
    // Jumping far ahead fires the restarted deadline on the initial grid.
    assert_eq!(timer.advance_to(at(25)), 2);
    assert_eq!(count.get(), 2);
    assert_eq!(coalescer.state(), State::Idle);
    assert_eq!(timer.now(), at(25));
}

#[test]
fn cancel_flushes_and_passes_through() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        VirtualTimer::new);

    coalescer.signal_arrival();
    coalescer.signal_arrival();
    assert_eq!(count.get(), 1);

    coalescer.cancel();
    assert_eq!(count.get(), 2);
    assert!(!coalescer.is_active());
    assert_eq!(coalescer.state(), State::Passthrough);
    assert_eq!(coalescer.timer().advance_to(at(100)), 0);

    coalescer.signal_arrival();
    coalescer.signal_arrival();
    assert_eq!(count.get(), 4);
}

#[test]
fn failing_timer_falls_back() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        |_| Broken);

    coalescer.signal_arrival();
    assert_eq!(coalescer.state(), State::Passthrough);
    coalescer.signal_arrival();
    coalescer.signal_arrival();
    assert_eq!(count.get(), 3);
}

#[test]
fn missing_timer_falls_back() {
    let count = Cell::new(0);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        |_| None::<Broken>);

    coalescer.signal_arrival();
    coalescer.signal_arrival();
    assert_eq!(count.get(), 2);
    assert!(!coalescer.is_active());
}

#[test]
fn expiry_after_cancel_is_stale() {
    let count = Cell::new(0);
    let handle = RefCell::new(None);
    let coalescer = Coalescer::new(
        Duration::from_millis(10),
        FnHandler(|| count.set(count.get() + 1)),
        |expiry: ExpiryHandle<_>| {
            *handle.borrow_mut() = Some(expiry.clone());
            VirtualTimer::new(expiry)
        });

    coalescer.signal_arrival();
    coalescer.signal_arrival();
    coalescer.cancel();
    assert_eq!(count.get(), 2);

    // A timer that raced the cancellation must not notify or restart.
    let expiry = handle.borrow_mut().take().unwrap();
    assert_eq!(expiry.fire(), Restart::No);
    assert_eq!(expiry.state(), State::Passthrough);
    assert_eq!(count.get(), 2);
}

#[test]
fn arrival_during_cancel_does_not_arm() {
    let count = Rc::new(Cell::new(0));
    let coalescer = Rc::new(Coalescer::new(
        Duration::from_millis(10),
        FnHandler({
            let count = Rc::clone(&count);
            move || count.set(count.get() + 1)
        }),
        |_| Interleaved::default()));

    let weak: Weak<Coalescer<Interleaved, _>> = Rc::downgrade(&coalescer);
    *coalescer.timer().on_cancel.borrow_mut() = Some(Box::new(move || {
        if let Some(coalescer) = weak.upgrade() {
            coalescer.signal_arrival();
        }
    }));

    // The arrival lands while the timer is being disarmed, on an idle coalescer.
    coalescer.cancel();
    assert!(!coalescer.is_active());
    assert_eq!(coalescer.state(), State::Passthrough);
    assert_eq!(count.get(), 1);
    assert_eq!(coalescer.stats(), Stats { arrivals: 1, notifications: 1, expiries: 0 });
}

#[derive(Clone, Copy, Debug)]
enum Event {
    Arrival,
    Advance(u8),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Arrival),
        (1u8..40).prop_map(Event::Advance),
    ]
}

proptest! {
    /// Every arrival is followed by a notification no later than one interval after it, and
    /// notifications are at least one interval apart.
    #[test]
    fn bounded_latency(events in proptest::collection::vec(event(), 1..64)) {
        let interval = 10;
        let notified = RefCell::new(Vec::<i64>::new());
        let now = Cell::new(0i64);
        let coalescer = Coalescer::new(
            Duration::from_millis(interval as u64),
            FnHandler(|| notified.borrow_mut().push(now.get())),
            VirtualTimer::new);
        let timer = coalescer.timer();

        let mut arrivals = Vec::new();
        for event in events {
            match event {
                Event::Arrival => {
                    arrivals.push(now.get());
                    coalescer.signal_arrival();
                },
                Event::Advance(step) => {
                    let target = now.get() + i64::from(step);
                    // Step through each deadline so notifications record their own time.
                    while let Expiration::When(deadline) = timer.deadline() {
                        if deadline > at(target) {
                            break;
                        }
                        now.set(deadline.total_millis());
                        timer.advance_to(deadline);
                    }
                    now.set(target);
                    timer.advance_to(at(target));
                },
            }
        }

        // Flush the tail.
        while let Expiration::When(deadline) = timer.deadline() {
            now.set(deadline.total_millis());
            timer.advance_to(deadline);
        }

        let notified = notified.borrow();
        for &arrival in &arrivals {
            prop_assert!(notified.iter().any(|&n| n >= arrival && n <= arrival + interval));
        }
        for pair in notified.windows(2) {
            prop_assert!(pair[1] - pair[0] >= interval);
        }
        prop_assert!(notified.len() <= arrivals.len());
        prop_assert_eq!(coalescer.state(), State::Idle);
    }
}
