//! Persistent SSZ collections for the beacon state.
//!
//! Elements are stored in an `Arc` node tree with fixed-size leaf buckets. Cloning a
//! collection copies one pointer, mutating an element copies only the nodes on the path to
//! its leaf, and every node caches its hash tree root until the path through it is touched
//! again.

pub mod diff;
pub mod error;
mod hash;
pub mod list;
mod tree;
pub mod vector;

pub use error::PersistentError;
pub use list::PersistentList;
pub use tree::Iter;
pub use vector::PersistentVector;
