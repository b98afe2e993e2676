use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{Result, TableId, TransactionId};
use crate::storage::HeapFileIterator;
use crate::tuple::{Tuple, TupleDesc};

/// Scans every tuple of one table in page order.
///
/// Pages are read through the buffer pool under shared locks held by `txn`.
/// The reported schema prefixes each field name with the table alias,
/// e.g. `u.id`.
pub struct SeqScan<'a> {
    table_id: TableId,
    alias: String,
    desc: Arc<TupleDesc>,
    inner: HeapFileIterator<'a>,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        pool: &'a BufferPool,
        txn: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> Result<Self> {
        let file = pool.catalog().database_file(table_id)?;
        let desc = Arc::new(file.tuple_desc().with_alias(alias));
        Ok(Self {
            table_id,
            alias: alias.to_string(),
            desc,
            inner: file.iter(pool, txn),
        })
    }

    /// Scans `table_id` using its catalog name as the alias.
    pub fn of_table(pool: &'a BufferPool, txn: TransactionId, table_id: TableId) -> Result<Self> {
        let name = pool.catalog().table_name(table_id)?;
        Self::new(pool, txn, table_id, &name)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn rewind(&mut self) {
        self.inner.rewind();
    }
}

impl Iterator for SeqScan<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
