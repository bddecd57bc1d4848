use crate::error::{Error, Result};
use crate::ring::{Ring, SlotFlags, SyncHook};

/// Copy one packet from a list of source segments into the ring.
///
/// All segments together form a single logical packet. Its bytes are packed into consecutive
/// slots starting at `cur`, each slot filled up to the ring's buffer size before the next one is
/// started, regardless of where one segment ends and the next begins. All slots but the last one
/// written carry `MORE_FRAGMENTS`. Empty segments contribute nothing.
///
/// The number of required slots is known before the first byte is copied. If it exceeds `avail`
/// the call fails with `OutOfSpace` and neither a slot nor a cursor of the ring is modified.
/// Otherwise the cursors are committed once all slots are written and `hook` is invoked exactly
/// once to publish the whole batch.
///
/// Returns the number of bytes written, which is the total length of all segments. A packet with
/// no bytes at all writes nothing and does not invoke the hook.
///
/// ## Example
///
/// ```
/// use netring::ring::{Config, Publish, Ring};
/// use netring::sg::ingest;
///
/// let (mut producer, _consumer) = Ring::pair(Config::new(4, 1500))?;
/// let head = [0u8; 2000];
/// let tail = [1u8; 1200];
///
/// assert_eq!(ingest(&mut producer, &[&head[..], &tail[..]], Publish)?, 3200);
/// // Slots of 1500, 1500 and 200 bytes.
/// assert_eq!(producer.avail(), 1);
/// # Ok::<(), netring::Error>(())
/// ```
pub fn ingest<H>(ring: &mut Ring, segments: &[&[u8]], mut hook: H) -> Result<usize>
    where H: SyncHook,
{
    let slot_cap = usize::from(ring.buf_size());
    let needed = slots_needed(segments, slot_cap);

    if needed == 0 {
        return Ok(0);
    }

    if needed > ring.avail() as usize {
        net_debug!("ingest: {} slots needed, {} available", needed, ring.avail());
        return Err(Error::OutOfSpace);
    }

    let first = if ring.config().vnet_header {
        SlotFlags::MORE_FRAGMENTS | SlotFlags::VNET_HDR
    } else {
        SlotFlags::MORE_FRAGMENTS
    };

    let mut written = 0u32;
    let mut fill = 0usize;
    let mut bytes = 0usize;

    for segment in segments {
        let mut rest: &[u8] = segment;
        while !rest.is_empty() {
            let target = ring.owned_mut(written);
            let count = (slot_cap - fill).min(rest.len());
            target.buffer[fill..fill + count].copy_from_slice(&rest[..count]);
            fill += count;
            bytes += count;
            rest = &rest[count..];

            if fill == slot_cap {
                seal(ring, written, fill, first);
                written += 1;
                fill = 0;
            }
        }
    }

    if fill > 0 {
        seal(ring, written, fill, first);
        written += 1;
    }

    debug_assert_eq!(written as usize, needed);
    let last = ring.owned_mut(written - 1);
    let mut flags = last.slot.flags();
    flags.remove(SlotFlags::MORE_FRAGMENTS);
    last.slot.set_flags(flags);

    ring.commit(written);
    hook.sync(ring);

    net_trace!("ingest: {} bytes in {} slots", bytes, written);
    Ok(bytes)
}

/// The number of slots a packet made of `segments` occupies with buffers of `slot_cap` bytes.
pub fn slots_needed(segments: &[&[u8]], slot_cap: usize) -> usize {
    let total: usize = segments.iter().map(|segment| segment.len()).sum();
    total.div_ceil(slot_cap)
}

/// Finish the `n`-th owned slot with `len` valid bytes.
fn seal(ring: &mut Ring, n: u32, len: usize, first: SlotFlags) {
    let target = ring.owned_mut(n);
    // Never more than the buffer size, which is a `u16`.
    target.slot.set_len(len as u16);
    target.slot.set_flags(if n == 0 { first } else { SlotFlags::MORE_FRAGMENTS });
}
