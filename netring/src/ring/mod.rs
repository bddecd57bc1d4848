//! The slotted ring buffer.
//!
//! A ring is created as a pair of [`Ring`] handles, one for the producer and one for the consumer
//! side. Each handle owns a window of slots starting at `cur` and spanning `avail` slots. The
//! scatter-gather adapters in [`sg`] fill and empty that window and then publish.
//!
//! ## Visibility
//!
//! Progress crosses from one side to the other only at explicit synchronization points:
//!
//! * [`Ring::release`] stores this side's cursor with `Release` ordering. Every slot write done
//!   before it is visible to a peer that loads the cursor with `Acquire`.
//! * [`Ring::sync`] releases and then acquires the peer's cursor, recomputing `avail`.
//!
//! In between the `avail` count of a side is a lower bound, never an overestimate.
//!
//! ## Ownership
//!
//! There is exactly one producer and one consumer. The handles are `Send` but not `Clone` and all
//! mutating methods take `&mut self`, so a second concurrent owner per direction needs external
//! mutual exclusion by construction.
//!
//! [`Ring`]: struct.Ring.html
//! [`sg`]: ../sg/index.html
//! [`Ring::release`]: struct.Ring.html#method.release
//! [`Ring::sync`]: struct.Ring.html#method.sync
use core::fmt;
use core::sync::atomic::Ordering;

use alloc::sync::Arc;

use crate::FnHandler;
use crate::error::{Error, Result};

mod shared;
mod slot;

use self::shared::Shared;
pub use self::slot::{Slot, SlotFlags};

/// The fixed geometry of a ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Number of slots, the ring capacity.
    pub slots: u32,
    /// Size of each slot buffer in bytes.
    pub buf_size: u16,
    /// Mark the first slot of every ingested packet with `VNET_HDR`.
    pub vnet_header: bool,
}

/// Which side of the ring a handle belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Fills slots and hands them to the consumer.
    Producer,
    /// Empties slots and hands them back to the producer.
    Consumer,
}

/// A cursor position on the ring.
///
/// Positions count modulo twice the capacity. Two positions that refer to the same slot index can
/// then still be told apart, which distinguishes a full ring from an empty one for any capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    raw: u32,
}

/// One side of a slotted ring.
pub struct Ring {
    shared: Arc<Shared>,
    role: Role,
    cur: Position,
    avail: u32,
}

/// A read-only view of an owned slot.
#[derive(Clone, Copy, Debug)]
pub struct SlotView<'a> {
    /// The slot metadata.
    pub slot: Slot,
    /// The valid bytes of the slot's buffer.
    pub data: &'a [u8],
}

/// Mutable access to an owned slot and its whole buffer.
pub(crate) struct SlotMut<'a> {
    pub(crate) slot: &'a mut Slot,
    pub(crate) buffer: &'a mut [u8],
}

/// The synchronization step invoked after a batch of slots has been written.
///
/// Called exactly once per successful ingest, after the ring's cursors have been committed. An
/// implementation must make the new slots visible to the consumer, usually by calling
/// [`Ring::sync`], and may notify the consumer's transport afterwards.
///
/// [`Ring::sync`]: struct.Ring.html#method.sync
pub trait SyncHook {
    /// Publish the ring's committed cursors.
    fn sync(&mut self, ring: &mut Ring);
}

/// The hook that only publishes, with no further notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct Publish;

impl Config {
    /// A ring with `slots` buffers of `buf_size` bytes each.
    pub fn new(slots: u32, buf_size: u16) -> Self {
        Config {
            slots,
            buf_size,
            vnet_header: false,
        }
    }

    /// Enable marking the first slot of each packet with `VNET_HDR`.
    pub fn with_vnet_header(self) -> Self {
        Config { vnet_header: true, ..self }
    }

    /// Check that the configuration can be realized.
    pub fn validate(&self) -> Result<()> {
        if self.slots == 0 || self.slots > u32::MAX / 4 || self.buf_size == 0 {
            return Err(Error::BadConfig);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(256, 2048)
    }
}

impl Position {
    /// The position of the first slot.
    pub const START: Position = Position { raw: 0 };

    /// The slot index this position refers to.
    pub fn index(self, capacity: u32) -> u32 {
        if self.raw >= capacity {
            self.raw - capacity
        } else {
            self.raw
        }
    }

    /// The position `count` slots further.
    ///
    /// `count` must not exceed the capacity.
    pub fn advance(self, count: u32, capacity: u32) -> Position {
        debug_assert!(count <= capacity);
        let wrap = 2 * capacity;
        let raw = self.raw + count;
        Position { raw: if raw >= wrap { raw - wrap } else { raw } }
    }

    /// The number of slots from `self` forward to `later`.
    pub fn distance_to(self, later: Position, capacity: u32) -> u32 {
        let wrap = 2 * capacity;
        if later.raw >= self.raw {
            later.raw - self.raw
        } else {
            later.raw + wrap - self.raw
        }
    }

    fn from_raw(raw: u32) -> Self {
        Position { raw }
    }
}

impl Ring {
    /// Allocate a ring and return its producer and consumer handles.
    ///
    /// The producer initially owns all slots, the consumer none.
    pub fn pair(config: Config) -> Result<(Ring, Ring)> {
        let shared = Arc::new(Shared::new(config)?);
        let producer = Ring {
            shared: Arc::clone(&shared),
            role: Role::Producer,
            cur: Position::START,
            avail: config.slots,
        };
        let consumer = Ring {
            shared,
            role: Role::Consumer,
            cur: Position::START,
            avail: 0,
        };

        net_debug!("ring allocated: {} slots of {} bytes", config.slots, config.buf_size);
        Ok((producer, consumer))
    }

    /// The side of this handle.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The configuration the ring was created with.
    pub fn config(&self) -> Config {
        self.shared.config
    }

    /// The number of slots.
    pub fn capacity(&self) -> u32 {
        self.shared.config.slots
    }

    /// The size of each slot's buffer.
    pub fn buf_size(&self) -> u16 {
        self.shared.config.buf_size
    }

    /// Index of the next slot this side will use.
    pub fn cur(&self) -> u32 {
        self.cur.index(self.capacity())
    }

    /// The cursor as a position.
    pub fn position(&self) -> Position {
        self.cur
    }

    /// Number of slots currently owned by this side, starting at `cur`.
    pub fn avail(&self) -> u32 {
        self.avail
    }

    /// The slot index following `idx`.
    pub fn next_index(&self, idx: u32) -> u32 {
        debug_assert!(idx < self.capacity());
        let next = idx.wrapping_add(1);
        if next >= self.capacity() {
            0
        } else {
            next
        }
    }

    /// View the `n`-th owned slot counted from `cur`.
    ///
    /// Returns `None` if the slot is not owned by this side, i.e. `n >= avail`.
    pub fn slot(&self, n: u32) -> Option<SlotView<'_>> {
        if n >= self.avail {
            return None;
        }

        let idx = self.cur.advance(n, self.capacity()).index(self.capacity());
        // SAFETY: `n < avail`, so the slot is inside our window.
        let slot = *unsafe { self.shared.slot(idx) };
        let buffer = unsafe { self.shared.buffer(slot.buf_idx()) };
        let len = usize::from(slot.len()).min(buffer.len());
        Some(SlotView {
            slot,
            data: &buffer[..len],
        })
    }

    /// Mutably access the `n`-th owned slot counted from `cur`.
    ///
    /// Panics if the slot is not owned by this side.
    pub(crate) fn owned_mut(&mut self, n: u32) -> SlotMut<'_> {
        assert!(n < self.avail, "slot outside of the owned window");
        let idx = self.cur.advance(n, self.capacity()).index(self.capacity());
        // SAFETY: `n < avail`, so the slot is inside our window. We hold `&mut self` and return a
        // single slot with its buffer, no other borrow of either exists.
        let slot = unsafe { self.shared.slot_mut(idx) };
        let buffer = unsafe { self.shared.buffer_mut(slot.buf_idx()) };
        SlotMut { slot, buffer }
    }

    /// Move `cur` forward by `count` slots, giving them up locally.
    ///
    /// The slots become visible to the peer on the next `release` or `sync`.
    pub(crate) fn commit(&mut self, count: u32) {
        assert!(count <= self.avail, "committing slots that are not owned");
        self.cur = self.cur.advance(count, self.capacity());
        self.avail -= count;
    }

    /// Publish the committed cursor to the peer.
    pub fn release(&self) {
        let raw = self.cur.raw;
        match self.role {
            Role::Producer => self.shared.head.store(raw, Ordering::Release),
            Role::Consumer => self.shared.tail.store(raw, Ordering::Release),
        }
    }

    /// Publish the committed cursor and acquire the peer's progress.
    ///
    /// Returns the updated number of available slots.
    pub fn sync(&mut self) -> u32 {
        self.release();
        let capacity = self.capacity();
        self.avail = match self.role {
            Role::Producer => {
                let tail = Position::from_raw(self.shared.tail.load(Ordering::Acquire));
                capacity - tail.distance_to(self.cur, capacity)
            },
            Role::Consumer => {
                let head = Position::from_raw(self.shared.head.load(Ordering::Acquire));
                self.cur.distance_to(head, capacity)
            },
        };
        net_trace!("{:?} sync: cur={} avail={}", self.role, self.cur(), self.avail);
        self.avail
    }

    #[cfg(test)]
    pub(crate) fn slot_flags(&self, idx: u32) -> SlotFlags {
        // Tests only inspect slots while no other handle is in use.
        unsafe { self.shared.slot(idx) }.flags()
    }

    #[cfg(test)]
    pub(crate) fn slot_len(&self, idx: u32) -> u16 {
        unsafe { self.shared.slot(idx) }.len()
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Ring")
            .field("role", &self.role)
            .field("capacity", &self.capacity())
            .field("cur", &self.cur())
            .field("avail", &self.avail)
            .finish()
    }
}

impl SyncHook for Publish {
    fn sync(&mut self, ring: &mut Ring) {
        ring.sync();
    }
}

impl<F> SyncHook for FnHandler<F>
    where F: FnMut(&mut Ring)
{
    fn sync(&mut self, ring: &mut Ring) {
        (self.0)(ring)
    }
}

impl<H: SyncHook + ?Sized> SyncHook for &'_ mut H {
    fn sync(&mut self, ring: &mut Ring) {
        (**self).sync(ring)
    }
}
