use byteorder::{ByteOrder, NativeEndian};

use crate::error::{Error, Result};
use crate::ring::{Ring, Slot, SlotFlags};

byte_wrapper! {
    /// A byte sequence representing one slot descriptor.
    #[derive(Debug, PartialEq, Eq)]
    pub struct slot_desc([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const BUF_IDX: Field = 0..4;
    pub(crate) const LEN:     Field = 4..6;
    pub(crate) const FLAGS:   Field = 6..8;
    pub(crate) const PTR:     Field = 8..16;
}

/// The decoded content of a slot descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotRepr {
    /// Index of the buffer in the arena.
    pub buf_idx: u32,
    /// Valid bytes in the buffer.
    pub len: u16,
    /// Fragment and header flags.
    pub flags: SlotFlags,
    /// Byte offset of the buffer within the arena.
    pub ptr: u64,
}

impl slot_desc {
    /// Imbue a raw octet buffer with descriptor structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with descriptor structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of `new_unchecked` and `check_len`.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Shorthand for a combination of `new_unchecked_mut` and `check_len`.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::PTR.end {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// The length of one descriptor.
    pub const fn buffer_len() -> usize {
        field::PTR.end
    }

    /// Unwrap the descriptor as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the buffer index field.
    pub fn buf_idx(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::BUF_IDX])
    }

    /// Return the length field.
    pub fn len(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::LEN])
    }

    /// Return the flags field.
    pub fn flags(&self) -> SlotFlags {
        SlotFlags::from_bits(NativeEndian::read_u16(&self.0[field::FLAGS]))
    }

    /// Return the buffer pointer field.
    pub fn ptr(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::PTR])
    }

    /// Set the buffer index field.
    pub fn set_buf_idx(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::BUF_IDX], value)
    }

    /// Set the length field.
    pub fn set_len(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::LEN], value)
    }

    /// Set the flags field.
    pub fn set_flags(&mut self, value: SlotFlags) {
        NativeEndian::write_u16(&mut self.0[field::FLAGS], value.bits())
    }

    /// Set the buffer pointer field.
    pub fn set_ptr(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::PTR], value)
    }
}

impl SlotRepr {
    /// Parse a descriptor and return a high-level representation.
    pub fn parse(desc: &slot_desc) -> Result<SlotRepr> {
        desc.check_len()?;
        Ok(SlotRepr {
            buf_idx: desc.buf_idx(),
            len: desc.len(),
            flags: desc.flags(),
            ptr: desc.ptr(),
        })
    }

    /// The representation of a slot whose buffers are `buf_size` bytes each.
    pub fn from_slot(slot: Slot, buf_size: u16) -> SlotRepr {
        SlotRepr {
            buf_idx: slot.buf_idx(),
            len: slot.len(),
            flags: slot.flags(),
            ptr: u64::from(slot.buf_idx()) * u64::from(buf_size),
        }
    }

    /// Return the length of a descriptor that will be emitted from this representation.
    pub const fn buffer_len(&self) -> usize {
        slot_desc::buffer_len()
    }

    /// Emit a high-level representation into a descriptor.
    pub fn emit(&self, desc: &mut slot_desc) {
        desc.set_buf_idx(self.buf_idx);
        desc.set_len(self.len);
        desc.set_flags(self.flags);
        desc.set_ptr(self.ptr);
    }
}

impl Ring {
    /// Write the descriptors of all slots owned by this side into `out`, in ring order from `cur`.
    ///
    /// Returns the number of descriptors written, which is `avail`. Fails with `Truncated`,
    /// writing nothing, if `out` can not hold all of them.
    pub fn export_descriptors(&self, out: &mut [u8]) -> Result<usize> {
        let count = self.avail() as usize;
        let needed = count
            .checked_mul(slot_desc::buffer_len())
            .ok_or(Error::Truncated)?;
        if out.len() < needed {
            return Err(Error::Truncated);
        }

        let chunks = out.chunks_exact_mut(slot_desc::buffer_len());
        for (n, chunk) in (0..self.avail()).zip(chunks) {
            // Inside the owned window by the loop bound.
            if let Some(view) = self.slot(n) {
                let repr = SlotRepr::from_slot(view.slot, self.buf_size());
                repr.emit(slot_desc::new_unchecked_mut(chunk));
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::ring::{Config, Publish};
    use crate::sg::ingest;
    use super::*;

    static DESC_BYTES: [u8; 16] = {
        let mut bytes = [0u8; 16];
        let idx = 3u32.to_ne_bytes();
        let len = 1500u16.to_ne_bytes();
        let flags = 0x0060u16.to_ne_bytes();
        let ptr = 6144u64.to_ne_bytes();
        let mut i = 0;
        while i < 8 {
            if i < 4 {
                bytes[i] = idx[i];
            }
            if i < 2 {
                bytes[4 + i] = len[i];
                bytes[6 + i] = flags[i];
            }
            bytes[8 + i] = ptr[i];
            i += 1;
        }
        bytes
    };

    fn desc_repr() -> SlotRepr {
        SlotRepr {
            buf_idx: 3,
            len: 1500,
            flags: SlotFlags::MORE_FRAGMENTS | SlotFlags::VNET_HDR,
            ptr: 6144,
        }
    }

    #[test]
    fn test_deconstruct() {
        let desc = slot_desc::new_checked(&DESC_BYTES[..]).unwrap();
        assert_eq!(desc.buf_idx(), 3);
        assert_eq!(desc.len(), 1500);
        assert!(desc.flags().contains(SlotFlags::MORE_FRAGMENTS));
        assert_eq!(desc.ptr(), 6144);
        assert_eq!(SlotRepr::parse(desc), Ok(desc_repr()));
    }

    #[test]
    fn test_construct() {
        let mut bytes = [0xa5u8; 16];
        let desc = slot_desc::new_unchecked_mut(&mut bytes);
        desc_repr().emit(desc);
        assert_eq!(desc.as_bytes(), &DESC_BYTES[..]);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(slot_desc::new_checked(&DESC_BYTES[..15]), Err(Error::Truncated));
    }

    #[test]
    fn export_owned_window() {
        let (mut producer, mut consumer) = Ring::pair(Config::new(4, 8)).unwrap();
        ingest(&mut producer, &[&b"0123456789"[..]], Publish).unwrap();
        consumer.sync();

        let mut table = [0u8; 64];
        assert_eq!(consumer.export_descriptors(&mut table), Ok(2));
        let first = SlotRepr::parse(slot_desc::new_unchecked(&table[..16])).unwrap();
        let second = SlotRepr::parse(slot_desc::new_unchecked(&table[16..32])).unwrap();
        assert_eq!(first, SlotRepr { buf_idx: 0, len: 8, flags: SlotFlags::MORE_FRAGMENTS, ptr: 0 });
        assert_eq!(second, SlotRepr { buf_idx: 1, len: 2, flags: SlotFlags::EMPTY, ptr: 8 });
        assert_eq!(&table[32..], &[0u8; 32][..]);

        // The producer still owns the two remaining slots, starting at index 2.
        let mut short = [0u8; 31];
        assert_eq!(producer.export_descriptors(&mut short), Err(Error::Truncated));
        let mut table = [0u8; 32];
        assert_eq!(producer.export_descriptors(&mut table), Ok(2));
        assert_eq!(slot_desc::new_unchecked(&table[..16]).buf_idx(), 2);
    }
}
