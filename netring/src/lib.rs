//! Slotted packet rings for zero-copy packet I/O.
//!
//! ## Table of contents
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The ring module](ring/index.html)
//! 3. [Scatter-gather adapters](sg/index.html)
//!    1. [Ingest](sg/fn.ingest.html)
//!    1. [Drain](sg/fn.drain.html)
//! 4. [Notification mitigation](mitigation/index.html)
//! 5. [Host transport glue](nic/index.html)
//! 6. [The slot descriptor layout](wire/index.html)
//!
//! ## Design and relevant core concepts
//!
//! A ring is a fixed number of slots, each referring to one fixed-size buffer in an arena that is
//! allocated exactly once when the ring is set up. A producer and a consumer exchange packets by
//! handing slots back and forth, never by allocating or moving the buffers themselves. Packets
//! larger than one buffer span several consecutive slots, all but the last one carrying the
//! `MORE_FRAGMENTS` flag.
//!
//! Each side owns a contiguous window of slots, described by its cursor `cur` and the count
//! `avail`. Nothing the other side does is observed until the side explicitly synchronizes, and
//! nothing this side does is observed by the peer until it publishes. There is no locking inside
//! a ring: one owner per direction is a precondition, enforced by the `&mut` receivers.
//!
//! Arrivals on the receive path are coalesced by a [`Coalescer`] which turns bursts of arrivals
//! into at most one notification per timer interval, without ever dropping one.
//!
//! [`Coalescer`]: mitigation/struct.Coalescer.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

/// The `alloc` crate, rings are allocated once during setup.
pub extern crate alloc;

#[macro_use] mod macros;
pub mod error;
pub mod mitigation;
pub mod nic;
pub mod ring;
pub mod sg;
pub mod time;
pub mod wire;

pub use self::error::{Error, Result};

/// A standard wrapper for a function implementing one of the callback traits.
///
/// Keeps the type alias overhead low by providing a single wrapper type that implements the
/// synchronization hook and the notification traits, where applicable.
pub struct FnHandler<F>(pub F);
