pub mod cursor;
pub mod db;
pub mod error;
pub mod iterator;
pub mod memtable;
pub mod scheduler;
pub mod snapshot;
pub mod statistics;
pub mod util;

pub use cursor::Cursor;
pub use db::{DB, DBOptions, ReadOptions, WriteBatch, WriteOptions};
pub use error::Error;
pub use iterator::{DBIterator, Iterator};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use snapshot::Snapshot;
pub use statistics::Statistics;
pub use util::{Result, Slice, Status};
