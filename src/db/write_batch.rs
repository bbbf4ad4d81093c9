use crate::util::Slice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Slice, value: Slice },
    Delete { key: Slice },
}

impl WriteOp {
    pub fn key(&self) -> &Slice {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// Writes applied to the store as one unit
///
/// Every operation in a batch gets its own sequence number, but the batch
/// becomes visible to snapshots and cursors all at once.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    /// Sum of key and value sizes
    data_size: usize,
}

impl WriteBatch {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        WriteBatch {
            ops: Vec::with_capacity(capacity),
            data_size: 0,
        }
    }

    pub fn put(&mut self, key: impl Into<Slice>, value: impl Into<Slice>) {
        let (key, value) = (key.into(), value.into());
        self.data_size += key.size() + value.size();
        self.ops.push(WriteOp::Put { key, value });
    }

    pub fn delete(&mut self, key: impl Into<Slice>) {
        let key = key.into();
        self.data_size += key.size();
        self.ops.push(WriteOp::Delete { key });
    }

    /// Operations in insertion order
    #[inline]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.data_size = 0;
    }
}
