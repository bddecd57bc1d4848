//! Implementation of a software loop-back device.
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::mitigation::Notify;
use crate::ring::{Publish, Ring, Role};
use crate::sg;

/// A software loop-back device.
///
/// Owns the device ends of a port's rings: the consumer of the transmit ring and the producer of
/// the receive ring. Every packet taken from the former is copied into the latter through a
/// staging buffer large enough for the biggest packet the transmit ring can hold.
pub struct Loopback {
    tx: Ring,
    rx: Ring,
    staging: Vec<u8>,
    stats: Stats,
}

/// Counters of a loop-back device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Packets moved to the receive ring.
    pub forwarded: usize,
    /// Packets dropped because the receive ring was full.
    pub dropped: usize,
    /// Packets truncated because they did not fit the staging buffer.
    pub truncated: usize,
    /// Bytes moved to the receive ring.
    pub bytes: usize,
}

impl Loopback {
    /// Create a loop-back device between a transmit consumer and a receive producer ring.
    pub fn new(tx: Ring, rx: Ring) -> Result<Self> {
        assert_eq!(tx.role(), Role::Consumer, "transmit ring must be the consumer end");
        assert_eq!(rx.role(), Role::Producer, "receive ring must be the producer end");

        let largest = (tx.capacity() as usize)
            .checked_mul(usize::from(tx.buf_size()))
            .ok_or(Error::AllocationFailure)?;
        let mut staging = Vec::new();
        staging.try_reserve_exact(largest)
            .map_err(|_| Error::AllocationFailure)?;
        staging.resize(largest, 0);

        Ok(Loopback {
            tx,
            rx,
            staging,
            stats: Stats::default(),
        })
    }

    /// Move up to `max` packets from the transmit to the receive ring.
    ///
    /// Every packet that reaches the receive ring is signalled to `arrivals` on its own, usually a
    /// coalescer that turns the signals into notifications. A packet that finds the receive ring
    /// full is dropped.
    ///
    /// Returns the number of packets taken from the transmit ring.
    pub fn poll<A>(&mut self, max: usize, arrivals: &A) -> usize
        where A: Notify + ?Sized,
    {
        self.tx.sync();
        self.rx.sync();

        let mut count = 0;
        while count < max && self.tx.avail() > 0 {
            let drained = sg::drain(&mut self.tx, &mut [&mut self.staging[..]]);
            count += 1;
            if drained.loss || drained.incomplete {
                self.stats.truncated += 1;
            }

            if drained.copied == 0 {
                continue;
            }

            let packet = &self.staging[..drained.copied];
            let mut result = sg::ingest(&mut self.rx, &[packet], Publish);
            if result == Err(Error::OutOfSpace) {
                // Reclaim what the host has received in the meantime.
                self.rx.sync();
                result = sg::ingest(&mut self.rx, &[packet], Publish);
            }

            match result {
                Ok(bytes) => {
                    self.stats.forwarded += 1;
                    self.stats.bytes += bytes;
                    arrivals.notify();
                },
                Err(err) => {
                    self.stats.dropped += 1;
                    net_debug!("loopback: dropped packet of {} bytes: {}", drained.copied, err);
                },
            }
        }

        if count > 0 {
            net_trace!("loopback: polled {} packets", count);
        }
        count
    }

    /// The counters so far.
    pub fn stats(&self) -> Stats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use crate::FnHandler;
    use crate::mitigation::{Coalescer, State, VirtualTimer};
    use crate::nic::Port;
    use crate::ring::Config;
    use crate::time::{Duration, Instant};
    use super::*;

    #[test]
    fn simple_loopback() {
        let (mut port, mut device) = Port::with_loopback(Config::new(8, 16)).unwrap();
        let arrivals = Cell::new(0);
        let counter = FnHandler(|| arrivals.set(arrivals.get() + 1));

        for packet in [&b"one"[..], &b"two"[..], &[7u8; 40][..]] {
            port.send(&[packet]).unwrap();
        }

        assert_eq!(device.poll(2, &counter), 2);
        assert_eq!(device.poll(8, &counter), 1);
        assert_eq!(device.poll(8, &counter), 0);
        assert_eq!(arrivals.get(), 3);
        assert_eq!(device.stats(), Stats { forwarded: 3, dropped: 0, truncated: 0, bytes: 46 });

        let mut buffer = [0u8; 64];
        assert_eq!(port.recv(&mut [&mut buffer[..]]).copied, 3);
        assert_eq!(&buffer[..3], b"one");
        assert_eq!(port.recv(&mut [&mut buffer[..]]).copied, 3);
        assert_eq!(&buffer[..3], b"two");
        assert_eq!(port.recv(&mut [&mut buffer[..]]).copied, 40);
    }

    #[test]
    fn drops_when_receive_ring_full() {
        let (mut port, mut device) = Port::with_loopback(Config::new(2, 4)).unwrap();
        port.send(&[&b"aaaa"[..]]).unwrap();
        port.send(&[&b"bbbb"[..]]).unwrap();
        assert_eq!(device.poll(8, &FnHandler(|| ())), 2);

        port.send(&[&b"cccc"[..]]).unwrap();
        assert_eq!(device.poll(8, &FnHandler(|| ())), 1);
        assert_eq!(device.stats().dropped, 1);
        assert_eq!(device.stats().forwarded, 2);

        let mut buffer = [0u8; 4];
        port.recv(&mut [&mut buffer[..]]);
        assert_eq!(&buffer, b"aaaa");
    }

    #[test]
    fn burst_is_coalesced() {
        let (mut port, mut device) = Port::with_loopback(Config::new(16, 64)).unwrap();
        let wakeups = Cell::new(0);
        let coalescer = Coalescer::new(
            Duration::from_millis(50),
            FnHandler(|| wakeups.set(wakeups.get() + 1)),
            VirtualTimer::new);

        for _ in 0..10 {
            port.send(&[&b"burst"[..]]).unwrap();
        }
        assert_eq!(device.poll(usize::MAX, &coalescer), 10);
        assert_eq!(wakeups.get(), 1);
        assert_eq!(coalescer.state(), State::ArmedPending);

        coalescer.timer().advance_to(Instant::from_millis(50));
        assert_eq!(wakeups.get(), 2);
        coalescer.timer().advance_to(Instant::from_millis(100));
        assert_eq!(coalescer.state(), State::Idle);
        assert_eq!(coalescer.stats().arrivals, 10);
    }
}
