//! Data models shared across Attache crates.

mod event;
mod object;

pub use event::*;
pub use object::*;
