/*! Byte representation of slot descriptors.

A ring in a mapped region is a table of fixed-size descriptors that both sides read and write in
place. This module provides that layout for the slots of a [`Ring`], on two levels:

 * [`slot_desc`] extracts fields from and inserts fields into a sequence of octets.
 * [`SlotRepr`] is the compact, high-level form that can be parsed from and emitted into one.

All fields use the native byte order, descriptors are shared with a peer on the same host and never
cross a network.

[`Ring`]: ../ring/struct.Ring.html
[`slot_desc`]: struct.slot_desc.html
[`SlotRepr`]: struct.SlotRepr.html
*/

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod slot;

pub use self::slot::{
    slot_desc,
    SlotRepr};
