//! Memory and Relay: the two state primitives step composition reads
//! and writes through.
//!
//! A [`Memory`] cell is a share-safe, mutex-guarded slot with
//! address-based identity. A [`Relay`] is a get/set view that may be
//! backed directly by a cell, derived from another relay by [`Relay::map`],
//! or fixed as a constant — steps never hold a bare `Memory` across an
//! API boundary, they hold the `Relay` view a caller chose to give them.

pub mod memory;
pub mod relay;

pub use memory::Memory;
pub use relay::{Relay, RelayReadOnly};
