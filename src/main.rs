use std::sync::Arc;

use quarry::common::{Config, TransactionId};
use quarry::execution::{AggOp, Aggregate, Filter, Op, Predicate, SeqScan};
use quarry::tuple::{Field, FieldType, Tuple, TupleDesc};
use quarry::wal::LogFile;
use quarry::Database;

fn main() {
    println!("Quarry - a transactional heap-file storage engine");
    println!("=================================================\n");

    let dir = std::env::temp_dir().join(format!("quarry-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create demo directory");

    let log = Arc::new(LogFile::open(dir.join("quarry.log")).expect("Failed to open log"));
    let db = Database::with_log(Config::new(4096, 10), log);
    println!("Created database with a 10 page buffer pool in {}", dir.display());

    let desc = TupleDesc::new(&[FieldType::Int, FieldType::String], &["id", "name"]);
    let file = db
        .create_heap_file(dir.join("users.dat"), "users", desc)
        .expect("Failed to create table");
    let pool = db.buffer_pool();
    println!("Created table users ({})\n", file.tuple_desc());

    // Committed insert
    let txn = TransactionId::next();
    for (id, name) in [(1, "ada"), (2, "grace"), (3, "edsger")] {
        let mut tuple = Tuple::new(
            Arc::clone(file.tuple_desc()),
            vec![Field::Int(id), Field::string(name)],
        )
        .expect("Failed to build tuple");
        pool.insert_tuple(txn, file.id(), &mut tuple)
            .expect("Failed to insert tuple");
        println!("{} inserted ({}) at {:?}", txn, tuple, tuple.record_id());
    }
    pool.transaction_complete(txn, true).expect("Commit failed");
    println!("{} committed, file has {} page(s)\n", txn, file.num_pages().unwrap_or(0));

    // Aborted insert
    let txn = TransactionId::next();
    let mut tuple = Tuple::new(
        Arc::clone(file.tuple_desc()),
        vec![Field::Int(4), Field::string("ghost")],
    )
    .expect("Failed to build tuple");
    pool.insert_tuple(txn, file.id(), &mut tuple)
        .expect("Failed to insert tuple");
    pool.transaction_complete(txn, false).expect("Abort failed");
    println!("{} inserted ({}) and aborted\n", txn, tuple);

    // Scan what survived
    let txn = TransactionId::next();
    let scan = SeqScan::new(&pool, txn, file.id(), "u").expect("Failed to open scan");
    println!("Scanning with schema {}:", scan.tuple_desc());
    let predicate = Predicate::new(0, Op::GreaterThanOrEq, Field::Int(2));
    for tuple in Filter::new(predicate, scan) {
        match tuple {
            Ok(tuple) => println!("  - {}", tuple),
            Err(e) => println!("  ! {}", e),
        }
    }

    // Count the rows that survived
    let scan = SeqScan::new(&pool, txn, file.id(), "u").expect("Failed to open scan");
    let scan_desc = Arc::clone(scan.tuple_desc());
    let count = Aggregate::new(scan, &scan_desc, 0, None, AggOp::Count)
        .expect("Failed to build aggregate");
    for tuple in count {
        match tuple {
            Ok(tuple) => println!("count(u.id) = {}", tuple),
            Err(e) => println!("  ! {}", e),
        }
    }
    pool.transaction_complete(txn, true).expect("Commit failed");

    drop(pool);
    drop(db);
    std::fs::remove_dir_all(&dir).ok();
    println!("\nDemo completed successfully!");
}
