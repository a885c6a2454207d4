//! Domain types shared by every Fridge Rescue crate.
//!
//! Nothing in here performs I/O. The lock, event, and API crates build on
//! these definitions so that lock names, bus channel names, and notification
//! categories are spelled the same way in every process.

pub mod error;
pub mod naming;
pub mod notification;
pub mod types;
