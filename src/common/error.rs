use thiserror::Error;

use super::types::{PageId, RecordId, TableId, TransactionId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{txn} aborted: lock on {page_id} not granted in time")]
    TransactionAborted { txn: TransactionId, page_id: PageId },

    #[error("Buffer pool is full, every resident page is dirty")]
    BufferPoolFull,

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("No table named {0:?}")]
    TableNameNotFound(String),

    #[error("Tuple {0} not found")]
    TupleNotFound(RecordId),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Tuple has no record id")]
    InvalidRecordId,

    #[error("Page {0} has no free slot")]
    PageFull(PageId),

    #[error("Tuple does not match the table schema: {0}")]
    SchemaMismatch(String),

    #[error("Invalid catalog entry on line {line}: {reason}")]
    SchemaParse { line: usize, reason: String },

    #[error("Log error: {0}")]
    Log(String),

    #[error("{path} hashes to {id}, already used by {existing}")]
    TableIdCollision {
        id: TableId,
        path: String,
        existing: String,
    },
}

pub type Result<T> = std::result::Result<T, QuarryError>;
