//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod collection;
mod memory_kind;
mod tag_match_mode;

pub use collection::*;
pub use memory_kind::*;
pub use tag_match_mode::*;
