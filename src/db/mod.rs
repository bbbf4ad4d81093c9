mod db;
mod options;
mod write_batch;

pub use db::DB;
pub use options::{DBOptions, ReadOptions, WriteOptions};
pub use write_batch::{WriteBatch, WriteOp};
