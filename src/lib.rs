//! Quarry - a transactional heap-file storage engine in Rust
//!
//! Tables are stored as heap files of fixed-size pages. All page access made
//! on behalf of a transaction goes through a buffer pool that takes
//! page-level shared/exclusive locks (strict two-phase locking) and keeps
//! uncommitted changes in memory until the transaction ends.
//!
//! # Architecture
//!
//! - **Storage** (`storage`): heap files and their page format
//!   - `DiskManager`: reads and writes whole pages at fixed offsets
//!   - `HeapPage`: slot bitmap header followed by fixed-width tuple slots
//!   - `HeapFile`: unordered tuple storage, inserts/deletes through the pool
//!
//! - **Buffer Pool** (`buffer`): page cache with NO-STEAL/FORCE commit
//!   - `BufferPool`: lock-mediated page access, eviction, commit and abort
//!   - `LruCache`: recency-ordered map the pool picks victims from
//!
//! - **Transactions** (`transaction`): page-level `LockManager` with
//!   timeout-based deadlock avoidance
//!
//! - **Log** (`wal`): `LogSink` collaborator receiving before/after images
//!
//! - **Catalog** (`catalog`): table name, schema and file registry
//!
//! - **Execution** (`execution`): sequential scan, filter and aggregate operators
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::common::{Config, TransactionId};
//! use quarry::database::Database;
//! use quarry::tuple::{Field, FieldType, Tuple, TupleDesc};
//!
//! let db = Database::new(Config::default());
//! let desc = TupleDesc::new(&[FieldType::Int, FieldType::String], &["id", "name"]);
//! let file = db.create_heap_file("users.dat", "users", desc).unwrap();
//!
//! let pool = db.buffer_pool();
//! let txn = TransactionId::next();
//! let mut tuple = Tuple::new(
//!     Arc::clone(file.tuple_desc()),
//!     vec![Field::Int(1), Field::string("ada")],
//! )
//! .unwrap();
//! pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();
//! pool.transaction_complete(txn, true).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod database;
pub mod execution;
pub mod storage;
pub mod transaction;
pub mod tuple;
pub mod wal;

// Re-export commonly used types at the crate root
pub use buffer::BufferPool;
pub use common::{PageId, Permissions, QuarryError, RecordId, Result, TableId, TransactionId};
pub use database::Database;
