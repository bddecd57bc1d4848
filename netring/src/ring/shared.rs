//! The storage shared by both sides of a ring.
//!
//! Slots and buffers live in `UnsafeCell`s because the two sides write to them concurrently, each
//! to a disjoint window. The windows are delimited by two published positions:
//!
//! * `head`, stored by the producer: every slot before it has been handed to the consumer.
//! * `tail`, stored by the consumer: every slot before it has been handed back to the producer.
//!
//! The consumer owns `[tail, head)`, the producer owns `[head, tail + capacity)`. Each side only
//! ever shrinks its own window locally and only grows it by loading the peer's position, so a
//! window never overlaps the peer's.
use core::cell::UnsafeCell;
use core::slice;
use core::sync::atomic::AtomicU32;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use super::{Config, Slot};

pub(crate) struct Shared {
    pub(crate) config: Config,
    slots: Box<[UnsafeCell<Slot>]>,
    memory: Box<[UnsafeCell<u8>]>,
    pub(crate) head: AtomicU32,
    pub(crate) tail: AtomicU32,
}

// SAFETY: all access to the cells goes through `Ring`, which only touches slots inside the window
// owned by its side. The windows are disjoint by the publication protocol described above.
unsafe impl Sync for Shared {}

impl Shared {
    pub(crate) fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let count = config.slots as usize;
        let bytes = count
            .checked_mul(usize::from(config.buf_size))
            .ok_or(Error::AllocationFailure)?;

        let mut slots = Vec::new();
        slots.try_reserve_exact(count)
            .map_err(|_| Error::AllocationFailure)?;
        slots.extend((0..config.slots).map(|idx| UnsafeCell::new(Slot::with_buffer(idx))));

        let mut memory = Vec::new();
        memory.try_reserve_exact(bytes)
            .map_err(|_| Error::AllocationFailure)?;
        memory.resize_with(bytes, || UnsafeCell::new(0u8));

        Ok(Shared {
            config,
            slots: slots.into_boxed_slice(),
            memory: memory.into_boxed_slice(),
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
        })
    }

    /// Requires: the slot at `idx` is inside the caller's window and not otherwise borrowed.
    pub(crate) unsafe fn slot(&self, idx: u32) -> &Slot {
        #[allow(unused_unsafe)]
        unsafe { &*self.slots[idx as usize].get() }
    }

    /// Requires: the slot at `idx` is inside the caller's window and not otherwise borrowed.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, idx: u32) -> &mut Slot {
        #[allow(unused_unsafe)]
        unsafe { &mut *self.slots[idx as usize].get() }
    }

    /// Requires: a slot referring to this buffer is inside the caller's window.
    pub(crate) unsafe fn buffer(&self, buf_idx: u32) -> &[u8] {
        let cells = self.buffer_cells(buf_idx);
        #[allow(unused_unsafe)]
        unsafe { slice::from_raw_parts(UnsafeCell::raw_get(cells.as_ptr()), cells.len()) }
    }

    /// Requires: a slot referring to this buffer is inside the caller's window and the buffer is
    /// not otherwise borrowed.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn buffer_mut(&self, buf_idx: u32) -> &mut [u8] {
        let cells = self.buffer_cells(buf_idx);
        #[allow(unused_unsafe)]
        unsafe { slice::from_raw_parts_mut(UnsafeCell::raw_get(cells.as_ptr()), cells.len()) }
    }

    fn buffer_cells(&self, buf_idx: u32) -> &[UnsafeCell<u8>] {
        let size = usize::from(self.config.buf_size);
        let start = buf_idx as usize * size;
        &self.memory[start..start + size]
    }
}
