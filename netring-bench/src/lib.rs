//! Threaded benchmark of a ring pair with a loopback device.
//!
//! Three threads share the rings:
//!
//! * the sender ingests packets into the transmit ring;
//! * the device polls the transmit ring, forwards into the receive ring and signals arrivals to a
//!   coalescer;
//! * the receiver drains the receive ring and sleeps on a doorbell rung by the coalescer.
mod score;

pub mod config;
pub use score::Score;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use netring::mitigation::{Coalescer, ThreadTimer};
use netring::nic::{Doorbell, Loopback, Port};
use netring::ring::{Publish, Ring};
use netring::{sg, Error};

use config::Config;

/// Longest sleep of the receiver, guards against a missed final wakeup.
const RECV_TIMEOUT: Duration = Duration::from_millis(10);

pub fn run(config: &Config) -> Result<Score, Error> {
    config.ring().validate()?;
    // A packet must fit the ring, or the sender would wait forever.
    let largest = usize::from(config.buf_size) * config.slots as usize;
    if config.length == 0 || config.length > largest || config.burst == 0 {
        return Err(Error::BadConfig);
    }

    let (port, device) = Port::with_loopback(config.ring())?;
    let (tx, rx, Publish) = port.into_inner();

    let doorbell = Arc::new(Doorbell::new());
    let coalescer = Coalescer::new(config.interval(), Arc::clone(&doorbell), |expiry| {
        if config.no_mitigation {
            return None;
        }
        match ThreadTimer::spawn(move || expiry.fire()) {
            Ok(timer) => Some(timer),
            Err(err) => {
                tracing::warn!("no timer thread ({}), notifying every packet", err);
                None
            },
        }
    });

    let sender_done = AtomicBool::new(false);
    let device_done = AtomicBool::new(false);
    let sent = AtomicU64::new(0);
    let start = Instant::now();

    let mut score = thread::scope(|scope| {
        scope.spawn(|| {
            let count = send(tx, config);
            sent.store(count, Ordering::Relaxed);
            sender_done.store(true, Ordering::Release);
        });

        let device_thread = scope.spawn(|| {
            let stats = forward(device, config.burst, &coalescer, &sender_done);
            // Flush whatever the timer still holds back.
            coalescer.cancel();
            device_done.store(true, Ordering::Release);
            stats
        });

        let mut score = receive(rx, config, &doorbell, &device_done);
        if let Ok(stats) = device_thread.join() {
            score.dropped = stats.dropped as u64;
        }
        score
    });

    score.time = start.elapsed();
    score.sent = sent.load(Ordering::Relaxed);
    score.notifications = coalescer.stats().notifications as u64;
    tracing::debug!(?score, "benchmark finished");
    Ok(score)
}

fn send(mut tx: Ring, config: &Config) -> u64 {
    let packet: Vec<u8> = (0..config.length).map(|i| i as u8).collect();
    let chunk = config.length.div_ceil(config.segments.max(1));
    let segments: Vec<&[u8]> = packet.chunks(chunk).collect();

    let mut sent = 0;
    while sent < config.packets as u64 {
        match sg::ingest(&mut tx, &segments, Publish) {
            Ok(_) => sent += 1,
            Err(Error::OutOfSpace) => {
                if tx.sync() == 0 {
                    thread::yield_now();
                }
            },
            Err(err) => {
                tracing::error!("send failed: {}", err);
                break;
            },
        }
    }

    tracing::debug!(sent, "sender done");
    sent
}

fn forward(
    mut device: Loopback,
    burst: usize,
    coalescer: &Coalescer<Option<ThreadTimer>, Arc<Doorbell>>,
    sender_done: &AtomicBool,
) -> netring::nic::Stats {
    loop {
        if device.poll(burst, coalescer) > 0 {
            continue;
        }

        if sender_done.load(Ordering::Acquire) {
            // Everything sent is visible now.
            while device.poll(burst, coalescer) > 0 {}
            break;
        }

        thread::yield_now();
    }

    let stats = device.stats();
    tracing::debug!(forwarded = stats.forwarded, dropped = stats.dropped, "device done");
    stats
}

fn receive(mut rx: Ring, config: &Config, doorbell: &Doorbell, device_done: &AtomicBool) -> Score {
    let mut buffer = vec![0u8; config.length];
    let mut score = Score::default();

    loop {
        let drained = sg::drain(&mut rx, &mut [&mut buffer[..]]);
        if drained.copied > 0 {
            score.received += 1;
            score.data_len += drained.copied as u64;
            if drained.loss || drained.incomplete {
                score.truncated += 1;
            }
            continue;
        }

        if rx.sync() > 0 {
            continue;
        }

        if device_done.load(Ordering::Acquire) {
            if rx.sync() == 0 {
                break;
            }
            continue;
        }

        if doorbell.wait_timeout(RECV_TIMEOUT) {
            score.wakeups += 1;
        }
    }

    tracing::debug!(received = score.received, "receiver done");
    score
}
