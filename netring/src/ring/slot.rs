use core::{fmt, ops};

/// The metadata of one ring slot.
///
/// Refers to a buffer of the ring's arena by index. Only `len` and `flags` change during the
/// lifetime of a ring, the buffer reference is fixed at setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slot {
    buf_idx: u32,
    len: u16,
    flags: SlotFlags,
}

/// Flag bits of a slot.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SlotFlags(u16);

impl Slot {
    pub(crate) fn with_buffer(buf_idx: u32) -> Self {
        Slot { buf_idx, len: 0, flags: SlotFlags::EMPTY }
    }

    /// The index of the buffer within the ring's arena.
    pub fn buf_idx(&self) -> u32 {
        self.buf_idx
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> u16 {
        self.len
    }

    /// Check if the slot holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The flags of the slot.
    pub fn flags(&self) -> SlotFlags {
        self.flags
    }

    /// Check if another slot of the same packet follows this one.
    pub fn has_more_fragments(&self) -> bool {
        self.flags.contains(SlotFlags::MORE_FRAGMENTS)
    }

    pub(crate) fn set_len(&mut self, len: u16) {
        self.len = len;
    }

    pub(crate) fn set_flags(&mut self, flags: SlotFlags) {
        self.flags = flags;
    }
}

impl SlotFlags {
    /// No flag set.
    pub const EMPTY: SlotFlags = SlotFlags(0);

    /// This slot is not the last slot of its packet.
    pub const MORE_FRAGMENTS: SlotFlags = SlotFlags(0x0020);

    /// The slot starts with a virtio-net header.
    ///
    /// Only set on the first slot of a packet and only by rings configured to carry the header.
    pub const VNET_HDR: SlotFlags = SlotFlags(0x0040);

    /// Reinterpret raw bits, keeping unknown bits intact.
    pub const fn from_bits(bits: u16) -> Self {
        SlotFlags(bits)
    }

    /// The raw bit representation.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if all bits of `other` are set.
    pub const fn contains(self, other: SlotFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set all bits of `other`.
    pub fn insert(&mut self, other: SlotFlags) {
        self.0 |= other.0;
    }

    /// Clear all bits of `other`.
    pub fn remove(&mut self, other: SlotFlags) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for SlotFlags {
    type Output = SlotFlags;

    fn bitor(self, rhs: SlotFlags) -> SlotFlags {
        SlotFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for SlotFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_set();
        if self.contains(SlotFlags::MORE_FRAGMENTS) {
            list.entry(&"MORE_FRAGMENTS");
        }
        if self.contains(SlotFlags::VNET_HDR) {
            list.entry(&"VNET_HDR");
        }
        let unknown = self.0 & !(SlotFlags::MORE_FRAGMENTS.0 | SlotFlags::VNET_HDR.0);
        if unknown != 0 {
            list.entry(&format_args!("{:#06x}", unknown));
        }
        list.finish()
    }
}
