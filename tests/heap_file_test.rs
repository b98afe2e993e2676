//! Integration tests for heap files

use std::sync::Arc;
use std::time::Duration;

use quarry::common::{Config, PageId, Permissions, QuarryError, SlotId, TransactionId};
use quarry::storage::HeapFile;
use quarry::tuple::{Field, FieldType, Tuple, TupleDesc};
use quarry::Database;
use tempfile::TempDir;

fn create_db() -> Database {
    Database::new(Config::new(4096, 50).with_max_lock_wait(Duration::from_millis(200)))
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

#[test]
fn test_insert_into_empty_file() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    assert_eq!(file.num_pages().unwrap(), 0);
    let mut tuple = user(&file, 1, "ada");
    pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();

    assert_eq!(file.num_pages().unwrap(), 1);
    let rid = tuple.record_id().unwrap();
    assert_eq!(rid.page_id, PageId::new(file.id(), 0));
    assert_eq!(rid.slot_id, SlotId::new(0));

    let page = pool.get_page(txn, rid.page_id, Permissions::ReadOnly).unwrap();
    let page = page.read();
    assert!(page.is_slot_used(0));
    assert_eq!(page.dirtier(), Some(txn));
    assert_eq!(page.tuple(SlotId::new(0)).unwrap(), tuple);
}

#[test]
fn test_insert_spills_to_new_page() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    db.set_page_size(512);
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    // 136-byte tuples: floor(512 * 8 / (136 * 8 + 1)) = 3 slots per page
    let mut last = None;
    for id in 0..7 {
        let mut tuple = user(&file, id, "x");
        pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();
        last = tuple.record_id();
    }

    assert_eq!(file.num_pages().unwrap(), 3);
    let last = last.unwrap();
    assert_eq!(last.page_id.page_no, 2);
    assert_eq!(last.slot_id, SlotId::new(0));
}

#[test]
fn test_delete_frees_slot_for_reuse() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    let mut tuples: Vec<Tuple> = (0..3).map(|id| user(&file, id, "u")).collect();
    for tuple in &mut tuples {
        pool.insert_tuple(txn, file.id(), tuple).unwrap();
    }
    pool.delete_tuple(txn, &tuples[1]).unwrap();

    let remaining: Vec<i32> = file
        .iter(&pool, txn)
        .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
        .collect();
    assert_eq!(remaining, vec![0, 2]);

    let mut again = user(&file, 9, "again");
    pool.insert_tuple(txn, file.id(), &mut again).unwrap();
    assert_eq!(again.record_id().unwrap().slot_id, SlotId::new(1));
}

#[test]
fn test_delete_errors() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    let mut tuple = user(&file, 1, "once");
    pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();
    pool.delete_tuple(txn, &tuple).unwrap();
    assert!(matches!(
        pool.delete_tuple(txn, &tuple),
        Err(QuarryError::EmptySlot(0))
    ));

    let unplaced = user(&file, 2, "never inserted");
    assert!(matches!(
        pool.delete_tuple(txn, &unplaced),
        Err(QuarryError::InvalidRecordId)
    ));
}

#[test]
fn test_insert_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();

    let other = Arc::new(TupleDesc::new(&[FieldType::Int], &["id"]));
    let mut tuple = Tuple::new(other, vec![Field::Int(1)]).unwrap();
    let result = pool.insert_tuple(TransactionId::next(), file.id(), &mut tuple);
    assert!(matches!(result, Err(QuarryError::SchemaMismatch(_))));
    assert_eq!(file.num_pages().unwrap(), 0);
}

#[test]
fn test_iterator_skips_empty_pages_and_rewinds() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    db.set_page_size(512);
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    let mut tuples: Vec<Tuple> = (0..7).map(|id| user(&file, id, "row")).collect();
    for tuple in &mut tuples {
        pool.insert_tuple(txn, file.id(), tuple).unwrap();
    }
    // empty the middle page
    for tuple in &tuples[3..6] {
        pool.delete_tuple(txn, tuple).unwrap();
    }

    let mut iter = file.iter(&pool, txn);
    let ids: Vec<i32> = iter
        .by_ref()
        .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 6]);
    assert!(iter.next().is_none());

    iter.rewind();
    assert_eq!(iter.count(), 4);
}

#[test]
fn test_page_write_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    let pool = db.buffer_pool();
    let txn = TransactionId::next();

    let mut tuple = user(&file, 5, "persisted");
    pool.insert_tuple(txn, file.id(), &mut tuple).unwrap();
    pool.transaction_complete(txn, true).unwrap();

    let pid = tuple.record_id().unwrap().page_id;
    let page = file.read_page(pid).unwrap();
    file.write_page(&page).unwrap();
    assert_eq!(file.read_page(pid).unwrap().page_data(), page.page_data());

    // reopening the same path yields the same table
    let reopened = HeapFile::open(file.path(), user_desc(), 4096).unwrap();
    assert_eq!(reopened.id(), file.id());
    assert_eq!(reopened.read_page(pid).unwrap().tuples(), vec![tuple]);
}

#[test]
fn test_read_page_past_end() {
    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();

    let result = file.read_page(PageId::new(file.id(), 0));
    assert!(matches!(result, Err(QuarryError::PageNotFound(_))));
}

#[test]
fn test_table_id_is_crc32_of_absolute_path() {
    // CRC-32 check value of "123456789"
    assert_eq!(
        HeapFile::table_id_for(std::path::Path::new("123456789")),
        quarry::TableId::new(0xCBF4_3926)
    );

    let dir = TempDir::new().unwrap();
    let db = create_db();
    let file = db.create_heap_file(dir.path().join("users.dat"), "users", user_desc()).unwrap();
    assert_eq!(file.id(), HeapFile::table_id_for(file.absolute_path()));
    assert!(file.absolute_path().is_absolute());
}
