//! End-to-end tests of commit, abort and the operators on top of them

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use quarry::common::{Config, Permissions, QuarryError, TransactionId};
use quarry::execution::{Filter, Op, Predicate, SeqScan};
use quarry::storage::page::HeapPage;
use quarry::storage::HeapFile;
use quarry::tuple::{Field, FieldType, Tuple, TupleDesc};
use quarry::wal::{LogFile, LogSink, MemoryLog};
use quarry::{Database, Result};
use tempfile::TempDir;

fn config() -> Config {
    Config::new(4096, 20).with_max_lock_wait(Duration::from_millis(500))
}

fn user_desc() -> TupleDesc {
    TupleDesc::new(&[FieldType::Int, FieldType::String], &["id", "name"])
}

fn user(file: &HeapFile, id: i32, name: &str) -> Tuple {
    Tuple::new(
        Arc::clone(file.tuple_desc()),
        vec![Field::Int(id), Field::string(name)],
    )
    .unwrap()
}

fn ids(file: &Arc<HeapFile>, db: &Database) -> Vec<i32> {
    let pool = db.buffer_pool();
    let txn = TransactionId::next();
    let mut ids: Vec<i32> = file
        .iter(&pool, txn)
        .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
        .collect();
    pool.transaction_complete(txn, true).unwrap();
    ids.sort();
    ids
}

#[test]
fn test_commit_is_durable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.dat");

    {
        let db = Database::new(config());
        let file = db.create_heap_file(&path, "users", user_desc()).unwrap();
        let pool = db.buffer_pool();
        let txn = TransactionId::next();
        for id in 0..5 {
            pool.insert_tuple(txn, file.id(), &mut user(&file, id, "durable"))
                .unwrap();
        }
        pool.transaction_complete(txn, true).unwrap();
    }

    // a fresh database sees the committed rows on disk
    let db = Database::new(config());
    let file = db.create_heap_file(&path, "users", user_desc()).unwrap();
    assert_eq!(ids(&file, &db), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_uncommitted_changes_stay_off_disk() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(config());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let setup = TransactionId::next();
    pool.insert_tuple(setup, file.id(), &mut user(&file, 1, "committed"))
        .unwrap();
    pool.transaction_complete(setup, true).unwrap();

    let txn = TransactionId::next();
    let mut pending = user(&file, 2, "pending");
    pool.insert_tuple(txn, file.id(), &mut pending).unwrap();

    let pid = pending.record_id().unwrap().page_id;
    assert_eq!(file.read_page(pid).unwrap().tuples().len(), 1);
    pool.transaction_complete(txn, true).unwrap();
    assert_eq!(file.read_page(pid).unwrap().tuples().len(), 2);
}

#[test]
fn test_abort_restores_committed_state() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(config());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let setup = TransactionId::next();
    let mut kept = user(&file, 1, "kept");
    pool.insert_tuple(setup, file.id(), &mut kept).unwrap();
    pool.transaction_complete(setup, true).unwrap();

    let txn = TransactionId::next();
    pool.insert_tuple(txn, file.id(), &mut user(&file, 2, "ghost"))
        .unwrap();
    pool.delete_tuple(txn, &kept).unwrap();
    pool.transaction_complete(txn, false).unwrap();

    let pid = kept.record_id().unwrap().page_id;
    let reader = TransactionId::next();
    let page = pool.get_page(reader, pid, Permissions::ReadOnly).unwrap();
    assert!(!page.read().is_dirty());
    assert_eq!(page.read().tuples(), vec![kept]);
    pool.transaction_complete(reader, true).unwrap();
    assert_eq!(ids(&file, &db), vec![1]);
}

#[test]
fn test_commit_writes_log_before_page() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("quarry.log");
    let log = Arc::new(LogFile::open(&log_path).unwrap());
    let db = Database::with_log(config(), log.clone());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let txn = TransactionId::next();
    let mut tuple = user(&file, 7, "logged");
    pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();
    pool.transaction_complete(txn, true).unwrap();

    let records = LogFile::read_records(&log_path).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.txn, txn);
    assert_eq!(record.page_id, tuple.record_id().unwrap().page_id);

    let desc = Arc::clone(file.tuple_desc());
    let after = HeapPage::new(record.page_id, Arc::clone(&desc), record.after.to_vec());
    let before = HeapPage::new(record.page_id, desc, record.before.to_vec());
    assert_eq!(after.tuples(), vec![tuple]);
    assert!(before.tuples().is_empty());
    assert_eq!(&record.after[..], file.read_page(record.page_id).unwrap().page_data());
}

/// Accepts records but can never make them durable.
struct UnforceableLog;

impl LogSink for UnforceableLog {
    fn write(&self, _txn: TransactionId, _before: &HeapPage, _after: &HeapPage) -> Result<()> {
        Ok(())
    }

    fn force(&self) -> Result<()> {
        Err(QuarryError::Log("disk full".to_string()))
    }
}

#[test]
fn test_failed_commit_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let db = Database::with_log(config(), Arc::new(UnforceableLog));
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let t1 = TransactionId::next();
    let mut tuple = user(&file, 1, "unlogged");
    pool.insert_tuple(t1, file.id(), &mut tuple).unwrap();
    let pid = tuple.record_id().unwrap().page_id;

    let result = pool.transaction_complete(t1, true);
    assert!(matches!(result, Err(QuarryError::Log(_))));
    assert!(!pool.holds_lock(t1, pid));
    assert!(file.read_page(pid).unwrap().tuples().is_empty());

    // the next writer sees the committed state, not t1's insert
    let t2 = TransactionId::next();
    let page = pool.get_page(t2, pid, Permissions::ReadWrite).unwrap();
    assert!(page.read().tuples().is_empty());
    assert_eq!(page.read().dirtier(), None);

    let mut tuple = user(&file, 2, "after");
    pool.insert_tuple(t2, file.id(), &mut tuple).unwrap();
    let page = pool.get_page(t2, pid, Permissions::ReadWrite).unwrap();
    assert_eq!(page.read().dirtier(), Some(t2));
    assert!(page.read().before_image().tuples().is_empty());
    pool.transaction_complete(t2, false).unwrap();
}

#[test]
fn test_abort_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(MemoryLog::new());
    let db = Database::with_log(config(), log.clone());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let txn = TransactionId::next();
    pool.insert_tuple(txn, file.id(), &mut user(&file, 1, "gone"))
        .unwrap();
    let writes_before = file.disk_manager().num_writes();
    pool.transaction_complete(txn, false).unwrap();

    assert!(log.records().is_empty());
    assert_eq!(log.force_count(), 0);
    assert_eq!(file.disk_manager().num_writes(), writes_before);
    assert!(db.log().force().is_ok());
}

#[test]
fn test_concurrent_inserters() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(config());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                let mut committed = Vec::new();
                for i in 0..10 {
                    let id = t * 100 + i;
                    // retry until the insert gets through without a lock timeout
                    loop {
                        let txn = TransactionId::next();
                        let mut tuple = user(&file, id, "worker");
                        match pool.insert_tuple(txn, file.id(), &mut tuple) {
                            Ok(()) => {
                                pool.transaction_complete(txn, true).unwrap();
                                committed.push(id);
                                break;
                            }
                            Err(QuarryError::TransactionAborted { .. }) => {
                                pool.transaction_complete(txn, false).unwrap();
                            }
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
                committed
            })
        })
        .collect();

    let mut expected: Vec<i32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    expected.sort();
    assert_eq!(ids(&file, &db), expected);
}

#[test]
fn test_scan_and_filter() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(config());
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let txn = TransactionId::next();
    for (id, name) in [(1, "ada"), (2, "grace"), (3, "adele")] {
        pool.insert_tuple(txn, file.id(), &mut user(&file, id, name))
            .unwrap();
    }

    let scan = SeqScan::new(&pool, txn, file.id(), "u").unwrap();
    assert_eq!(scan.tuple_desc().field_name(0), Some("u.id"));
    let predicate = Predicate::new(1, Op::Like, Field::string("ad"));
    let names: Vec<String> = Filter::new(predicate, scan)
        .map(|t| t.unwrap().field(1).and_then(Field::as_str).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["ada", "adele"]);

    let mut scan = SeqScan::of_table(&pool, txn, file.id()).unwrap();
    assert_eq!(scan.alias(), "users");
    assert_eq!(scan.by_ref().count(), 3);
    scan.rewind();
    assert_eq!(scan.count(), 3);
    pool.transaction_complete(txn, true).unwrap();
}

#[test]
fn test_schema_file_tables_are_usable() {
    let dir = TempDir::new().unwrap();
    let schema = dir.path().join("catalog.txt");
    fs::write(&schema, "users (id int pk, name string)\n").unwrap();

    let db = Database::new(config());
    db.load_schema(&schema).unwrap();
    let catalog = db.catalog();
    let table_id = catalog.table_id("users").unwrap();
    let file = catalog.database_file(table_id).unwrap();

    let pool = db.buffer_pool();
    let txn = TransactionId::next();
    pool.insert_tuple(txn, table_id, &mut user(&file, 1, "from schema"))
        .unwrap();
    pool.transaction_complete(txn, true).unwrap();
    assert_eq!(ids(&file, &db), vec![1]);
}
