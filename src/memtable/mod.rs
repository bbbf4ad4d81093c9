#[allow(clippy::module_inception)]
pub mod memtable;
pub mod skiplist;

pub use memtable::{InternalKey, MemTable, ValueType};
pub use skiplist::SkipList;
