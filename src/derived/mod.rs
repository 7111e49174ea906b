//! Small combinators built on top of the core cell/observer machinery:
//! caching ([`store`]), dependency-free reads ([`peek`]), the
//! previous-value cell ([`previous`]), change-filtering, and the
//! failure-reifying [`maybe_cell`].

pub mod change_filter;
pub mod maybe;
pub mod peek;
pub mod previous;
pub mod store;

pub use change_filter::changes_only;
pub use maybe::{maybe_cell, Maybe};
pub use peek::peek;
pub use previous::previous;
pub use store::store;
