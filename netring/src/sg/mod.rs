//! Copying between caller scatter-gather lists and ring slots.
//!
//! A scatter-gather list is an ordered sequence of byte segments. Segments are consumed strictly
//! in order and a segment is exhausted once all of its bytes have been copied. On the ring side a
//! packet is a run of consecutive slots of which all but the last carry `MORE_FRAGMENTS`.
//!
//! * [`ingest`] copies one packet from source segments into free slots of a producer ring.
//! * [`drain`] copies one packet from filled slots of a consumer ring into destination segments.
//!
//! Both leave the ring in a consistent state on every return path: a slot is either fully written
//! and flagged, or not handed over at all.
//!
//! [`ingest`]: fn.ingest.html
//! [`drain`]: fn.drain.html
mod drain;
mod ingest;


pub use self::drain::{drain, drain_limited, Drained};
pub use self::ingest::{ingest, slots_needed};

/// Writes into a destination list, segment after segment.
struct Gather<'a, 'b> {
    segments: &'a mut [&'b mut [u8]],
    /// Index of the current segment.
    current: usize,
    /// Offset within the current segment.
    offset: usize,
    /// Bytes that may still be written in total.
    budget: usize,
}

impl<'a, 'b> Gather<'a, 'b> {
    fn new(segments: &'a mut [&'b mut [u8]], budget: usize) -> Self {
        Gather {
            segments,
            current: 0,
            offset: 0,
            budget,
        }
    }

    /// The number of bytes that can be written at most.
    fn capacity(&self) -> usize {
        let total: usize = self.segments.iter().map(|segment| segment.len()).sum();
        total.min(self.budget)
    }

    /// Copy a prefix of `src`, returning its length.
    ///
    /// Returns `0` only when the destination is exhausted or `src` is empty.
    fn put(&mut self, src: &[u8]) -> usize {
        while self.budget > 0 && self.current < self.segments.len() {
            let segment = &mut self.segments[self.current][self.offset..];
            if segment.is_empty() {
                self.current += 1;
                self.offset = 0;
                continue;
            }

            let count = segment.len().min(src.len()).min(self.budget);
            segment[..count].copy_from_slice(&src[..count]);
            self.offset += count;
            self.budget -= count;
            return count;
        }

        0
    }
}
