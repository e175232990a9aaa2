//! Block store core: superblock, bitmap allocator, chain writer, growth and
//! the store handle that ties them together.

pub mod allocator;
pub mod block;
pub mod chain;
pub mod config;
pub mod error;
pub mod flush;
pub mod growth;
pub mod header;
pub mod inspect;
pub mod io;
pub mod shared;
pub mod store;

pub use store::{Store, StoreStats};
