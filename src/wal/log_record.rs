use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::common::{PageId, Result, TableId, TransactionId};
use crate::storage::page::HeapPage;

/// Durable logging collaborator of the buffer pool.
///
/// `write` records the image pair of a page about to be written; `force`
/// returns only once every record written before it is durable.
pub trait LogSink: Send + Sync {
    fn write(&self, txn: TransactionId, before: &HeapPage, after: &HeapPage) -> Result<()>;

    fn force(&self) -> Result<()>;
}

/// One logged page update.
///
/// Encoded as:
///
/// ```text
/// | total_len u32 | txn u64 | table_id u32 | page_no u32 |
/// | before_len u32 | before bytes | after_len u32 | after bytes |
/// ```
///
/// All integers are little-endian; `total_len` counts the bytes after itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub txn: TransactionId,
    pub page_id: PageId,
    pub before: Bytes,
    pub after: Bytes,
}

impl LogRecord {
    pub fn new(txn: TransactionId, before: &HeapPage, after: &HeapPage) -> Self {
        Self {
            txn,
            page_id: after.page_id(),
            before: Bytes::copy_from_slice(before.page_data()),
            after: Bytes::copy_from_slice(after.page_data()),
        }
    }

    pub fn encode(&self) -> Bytes {
        let body_len = 8 + 4 + 4 + 4 + self.before.len() + 4 + self.after.len();
        let mut buf = BytesMut::with_capacity(4 + body_len);
        buf.put_u32_le(body_len as u32);
        buf.put_u64_le(self.txn.as_u64());
        buf.put_u32_le(self.page_id.table_id.as_u32());
        buf.put_u32_le(self.page_id.page_no);
        buf.put_u32_le(self.before.len() as u32);
        buf.put_slice(&self.before);
        buf.put_u32_le(self.after.len() as u32);
        buf.put_slice(&self.after);
        buf.freeze()
    }

    /// Decodes one record from the front of `buf`, advancing past it.
    /// Returns None on a truncated or malformed record.
    pub fn decode(buf: &mut Bytes) -> Option<Self> {
        if buf.remaining() < 4 {
            return None;
        }
        let body_len = buf.get_u32_le() as usize;
        if buf.remaining() < body_len || body_len < 24 {
            return None;
        }
        let mut body = buf.split_to(body_len);

        let txn = TransactionId(body.get_u64_le());
        let table_id = TableId::new(body.get_u32_le());
        let page_no = body.get_u32_le();

        let before_len = body.get_u32_le() as usize;
        if body.remaining() < before_len + 4 {
            return None;
        }
        let before = body.split_to(before_len);

        let after_len = body.get_u32_le() as usize;
        if body.remaining() != after_len {
            return None;
        }
        let after = body.split_to(after_len);

        Some(Self {
            txn,
            page_id: PageId::new(table_id, page_no),
            before,
            after,
        })
    }
}

/// A log kept in memory. Useful for tests and for tools that only need to
/// observe what the buffer pool would have logged.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
    forces: AtomicUsize,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record written so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Returns how many times the log was forced.
    pub fn force_count(&self) -> usize {
        self.forces.load(Ordering::Relaxed)
    }
}

impl LogSink for MemoryLog {
    fn write(&self, txn: TransactionId, before: &HeapPage, after: &HeapPage) -> Result<()> {
        self.records.lock().push(LogRecord::new(txn, before, after));
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.forces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
