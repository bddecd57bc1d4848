use crate::ring::Ring;
use super::Gather;

/// The outcome of a drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Drained {
    /// Bytes copied into the destination.
    pub copied: usize,
    /// The destination was too small and the rest of the packet was discarded.
    ///
    /// Fragments can not be rewound once consumed. The discarded bytes are lost.
    pub loss: bool,
    /// The ring ran out of slots while the packet announced more fragments.
    pub incomplete: bool,
}

/// Copy one packet from the ring into a list of destination segments.
///
/// Equivalent to `drain_limited` with no limit besides the destination itself.
///
/// ## Example
///
/// ```
/// use netring::ring::{Config, Publish, Ring};
/// use netring::sg::{drain, ingest};
///
/// let (mut producer, mut consumer) = Ring::pair(Config::new(4, 1500))?;
/// ingest(&mut producer, &[&b"hello "[..], &b"world"[..]], Publish)?;
///
/// consumer.sync();
/// let mut buffer = [0u8; 16];
/// let drained = drain(&mut consumer, &mut [&mut buffer[..]]);
/// assert_eq!(&buffer[..drained.copied], b"hello world");
/// assert!(!drained.loss);
/// # Ok::<(), netring::Error>(())
/// ```
pub fn drain(ring: &mut Ring, segments: &mut [&mut [u8]]) -> Drained {
    drain_limited(ring, segments, usize::MAX)
}

/// Copy one packet from the ring into at most `requested_len` bytes of destination segments.
///
/// Reads slot after slot starting at `cur`, following `MORE_FRAGMENTS`, and writes the bytes
/// into the segments in order. Every slot that is read is consumed: `cur` moves past it and
/// `avail` shrinks. The call stops at the end of the packet, when the ring has no further slot,
/// or when the destination is exhausted. In the last case the remaining fragments of the packet
/// are consumed without copying and the result reports `loss`. The progress is published to the
/// producer before returning.
///
/// Nothing is consumed when the ring has no available slot or the destination can not hold a
/// single byte.
pub fn drain_limited(ring: &mut Ring, segments: &mut [&mut [u8]], requested_len: usize)
    -> Drained
{
    let mut dest = Gather::new(segments, requested_len);
    if ring.avail() == 0 || dest.capacity() == 0 {
        return Drained::default();
    }

    let mut result = Drained::default();
    let mut used = 0u32;

    loop {
        let view = match ring.slot(used) {
            Some(view) => view,
            None => {
                result.incomplete = true;
                break;
            },
        };

        let mut offset = 0;
        while offset < view.data.len() {
            let count = dest.put(&view.data[offset..]);
            if count == 0 {
                break;
            }
            offset += count;
        }

        result.copied += offset;
        used += 1;
        let mut more = view.slot.has_more_fragments();

        if offset < view.data.len() {
            result.loss = true;
            // Skip the rest of this packet.
            while more {
                match ring.slot(used) {
                    Some(view) => {
                        more = view.slot.has_more_fragments();
                        used += 1;
                    },
                    None => {
                        result.incomplete = true;
                        break;
                    },
                }
            }
            break;
        }

        if !more {
            break;
        }
    }

    ring.commit(used);
    ring.release();

    if result.loss {
        net_warn!("drain: destination too small, packet truncated to {} bytes", result.copied);
    }
    if result.incomplete {
        net_warn!("drain: ran out of slots with a pending incomplete packet");
    }
    net_trace!("drain: {} bytes from {} slots", result.copied, used);

    result
}
