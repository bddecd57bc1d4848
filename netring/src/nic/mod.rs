//! Host side transport glue around a pair of rings.
//!
//! A [`Port`] is the endpoint a host transport talks to: it sends packets into a transmit ring and
//! receives packets from a receive ring. The device on the other side of both rings is emulated by
//! [`Loopback`], which moves every transmitted packet back into the receive ring and signals its
//! arrival to a [`Coalescer`].
//!
//! Waiting for notifications is possible with a [`Doorbell`] when `std` is available.
//!
//! [`Port`]: struct.Port.html
//! [`Loopback`]: struct.Loopback.html
//! [`Coalescer`]: ../mitigation/struct.Coalescer.html
//! [`Doorbell`]: struct.Doorbell.html
use crate::error::Result;
use crate::ring::{Config, Publish, Ring, Role, SyncHook};
use crate::sg::{self, Drained};

#[cfg(feature = "std")]
mod doorbell;
mod loopback;

#[cfg(feature = "std")]
pub use self::doorbell::Doorbell;
pub use self::loopback::{Loopback, Stats};

/// The host endpoint of a transmit and a receive ring.
#[derive(Debug)]
pub struct Port<H = Publish> {
    tx: Ring,
    rx: Ring,
    hook: H,
}

impl Port {
    /// Allocate a transmit and a receive ring with the same configuration.
    ///
    /// Returns the port with the device ends of both rings, first the consumer of the transmit
    /// ring then the producer of the receive ring.
    pub fn with_loopback(config: Config) -> Result<(Port, Loopback)> {
        let (tx, device_tx) = Ring::pair(config)?;
        let (device_rx, rx) = Ring::pair(config)?;
        let device = Loopback::new(device_tx, device_rx)?;
        Ok((Port::new(tx, rx, Publish), device))
    }
}

impl<H: SyncHook> Port<H> {
    /// Create a port from the producer of a transmit ring and the consumer of a receive ring.
    ///
    /// The `hook` publishes every sent packet.
    pub fn new(tx: Ring, rx: Ring, hook: H) -> Self {
        assert_eq!(tx.role(), Role::Producer, "transmit ring must be the producer end");
        assert_eq!(rx.role(), Role::Consumer, "receive ring must be the consumer end");
        Port { tx, rx, hook }
    }

    /// Send one packet made of `segments`.
    ///
    /// Fails with `OutOfSpace` when the transmit ring has too few free slots even after
    /// reclaiming the ones the device has finished with. Nothing is sent in that case.
    pub fn send(&mut self, segments: &[&[u8]]) -> Result<usize> {
        let needed = sg::slots_needed(segments, usize::from(self.tx.buf_size()));
        if needed > self.tx.avail() as usize {
            self.tx.sync();
        }
        sg::ingest(&mut self.tx, segments, &mut self.hook)
    }

    /// Receive one packet into `segments`.
    pub fn recv(&mut self, segments: &mut [&mut [u8]]) -> Drained {
        if self.rx.avail() == 0 {
            self.rx.sync();
        }
        sg::drain(&mut self.rx, segments)
    }

    /// Check if a packet of at least one slot can be sent.
    pub fn writable(&mut self) -> bool {
        self.tx.avail() > 0 || self.tx.sync() > 0
    }

    /// Check if a packet is ready to be received.
    pub fn readable(&mut self) -> bool {
        self.rx.avail() > 0 || self.rx.sync() > 0
    }

    /// The transmit ring.
    pub fn tx(&self) -> &Ring {
        &self.tx
    }

    /// The receive ring.
    pub fn rx(&self) -> &Ring {
        &self.rx
    }

    /// Split into the transmit ring, the receive ring and the hook.
    pub fn into_inner(self) -> (Ring, Ring, H) {
        (self.tx, self.rx, self.hook)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::FnHandler;
    use super::*;

    #[test]
    fn port_roundtrip() {
        let (mut port, mut device) = Port::with_loopback(Config::new(4, 8)).unwrap();
        assert!(port.writable());
        assert!(!port.readable());

        assert_eq!(port.send(&[&b"hello, "[..], &b"world"[..]]), Ok(12));
        assert_eq!(device.poll(usize::MAX, &FnHandler(|| ())), 1);

        let mut buffer = [0u8; 32];
        assert!(port.readable());
        let drained = port.recv(&mut [&mut buffer[..]]);
        assert_eq!(&buffer[..drained.copied], b"hello, world");
        assert!(!port.readable());
    }

    #[test]
    fn writable_after_device_drains() {
        let (mut port, mut device) = Port::with_loopback(Config::new(2, 4)).unwrap();
        port.send(&[&b"12345678"[..]]).unwrap();
        assert!(!port.writable());
        assert_eq!(port.send(&[&b"x"[..]]), Err(Error::OutOfSpace));

        device.poll(1, &FnHandler(|| ()));
        assert!(port.writable());
        assert_eq!(port.send(&[&b"x"[..]]), Ok(1));
    }

    #[test]
    fn hook_runs_per_packet() {
        let (tx, _device_tx) = Ring::pair(Config::new(4, 4)).unwrap();
        let (_device_rx, rx) = Ring::pair(Config::new(4, 4)).unwrap();
        let mut sent = 0;
        let mut port = Port::new(tx, rx, FnHandler(|ring: &mut Ring| {
            sent += 1;
            ring.release();
        }));

        port.send(&[&b"abcdef"[..]]).unwrap();
        port.send(&[&b"gh"[..]]).unwrap();
        drop(port);
        assert_eq!(sent, 2);
    }

    #[test]
    #[should_panic]
    fn rejects_swapped_rings() {
        let (producer, consumer) = Ring::pair(Config::new(2, 4)).unwrap();
        let _ = Port::new(consumer, producer, Publish);
    }
}
