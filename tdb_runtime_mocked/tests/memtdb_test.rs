#[macro_use]
extern crate hamcrest;

use hamcrest::prelude::*;
use tdb_runtime::consts::{
    CLEAR_IF_FIRST, DEFAULT, ERR_EXISTS, ERR_IO, ERR_NOEXIST, ERR_RDONLY, INSERT, MODIFY, O_CREAT,
    O_RDONLY, O_RDWR, O_TRUNC, REPLACE, USR_RW,
};
use tdb_runtime::{Datum, TdbRuntime};
use tdb_runtime_mocked::{CallCounts, MemContext, MemTdb, WANT_ERROR};

fn open_rw(db: &MemTdb, name: &str) -> MemContext {
    db.open(name, 0, DEFAULT, O_RDWR | O_CREAT, USR_RW).unwrap()
}

fn store(db: &MemTdb, ctx: &mut MemContext, key: &[u8], value: &[u8], flag: i32) -> i32 {
    db.store(ctx, Datum::from_slice(key), Datum::from_slice(value), flag)
}

#[test]
fn open_fails_for_path_with_want_error() {
    let db = MemTdb::new();
    let name = format!("bad{WANT_ERROR}.tdb");

    assert!(db.open(&name, 0, DEFAULT, O_RDWR | O_CREAT, USR_RW).is_none());
    assert_that!(db.calls().open, is(equal_to(1)));
}

#[test]
fn injected_open_failure_can_be_cleared() {
    let db = MemTdb::new();
    db.fail_open("a.tdb");
    assert!(db.open("a.tdb", 0, DEFAULT, O_RDWR | O_CREAT, USR_RW).is_none());

    db.clear_failures();
    assert!(db.open("a.tdb", 0, DEFAULT, O_RDWR | O_CREAT, USR_RW).is_some());
}

#[test]
fn insert_refuses_existing_key() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");

    assert_eq!(store(&db, &mut ctx, b"k", b"v1", INSERT), 0);
    assert_eq!(store(&db, &mut ctx, b"k", b"v2", INSERT), -1);
    assert_that!(db.error(&ctx), is(equal_to(ERR_EXISTS)));
    assert_eq!(db.errorstr(&ctx), "Record exists");
    assert_eq!(db.get_record("a.tdb", b"k"), Some(b"v1".to_vec()));
}

#[test]
fn modify_refuses_missing_key() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");

    assert_eq!(store(&db, &mut ctx, b"k", b"v", MODIFY), -1);
    assert_that!(db.error(&ctx), is(equal_to(ERR_NOEXIST)));

    assert_eq!(store(&db, &mut ctx, b"k", b"v", REPLACE), 0);
    assert_eq!(store(&db, &mut ctx, b"k", b"w", MODIFY), 0);
    assert_eq!(db.get_record("a.tdb", b"k"), Some(b"w".to_vec()));
}

#[test]
fn read_only_context_refuses_store() {
    let db = MemTdb::new();
    db.add_record("ro.tdb", b"k", b"v");
    let mut ctx = db.open("ro.tdb", 0, DEFAULT, O_RDONLY, USR_RW).unwrap();

    assert_eq!(store(&db, &mut ctx, b"k", b"w", REPLACE), -1);
    assert_that!(db.error(&ctx), is(equal_to(ERR_RDONLY)));

    let datum = db.fetch(&mut ctx, Datum::from_slice(b"k")).unwrap();
    assert_eq!(datum.as_slice(), b"v");
}

#[test]
fn fetch_missing_key_is_null_with_noexist() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");

    assert!(db.fetch(&mut ctx, Datum::from_slice(b"nope")).is_none());
    assert_that!(db.error(&ctx), is(equal_to(ERR_NOEXIST)));
    assert_eq!(db.live_buffers(), 0);
}

#[test]
fn io_failure_on_marked_key() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");
    let key = [b'k', WANT_ERROR as u8];

    assert_eq!(store(&db, &mut ctx, &key, b"v", REPLACE), -1);
    assert_that!(db.error(&ctx), is(equal_to(ERR_IO)));
    assert!(db.fetch(&mut ctx, Datum::from_slice(&key)).is_none());
    assert_that!(db.error(&ctx), is(equal_to(ERR_IO)));
}

#[test]
fn records_survive_close_and_reopen() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");
    assert_eq!(store(&db, &mut ctx, b"k", b"v", INSERT), 0);
    assert_eq!(db.close(&mut ctx), 0);
    assert_eq!(db.open_contexts("a.tdb"), 0);

    let mut ctx = open_rw(&db, "a.tdb");
    let datum = db.fetch(&mut ctx, Datum::from_slice(b"k")).unwrap();
    assert_eq!(datum.as_slice(), b"v");
}

#[test]
fn trunc_and_clear_if_first_wipe_records() {
    let db = MemTdb::new();
    db.add_record("t.tdb", b"k", b"v");
    let _ctx = db.open("t.tdb", 0, DEFAULT, O_RDWR | O_TRUNC, USR_RW).unwrap();
    assert_eq!(db.get_record("t.tdb", b"k"), None);

    db.add_record("c.tdb", b"k", b"v");
    let _first = db.open("c.tdb", 0, CLEAR_IF_FIRST, O_RDWR, USR_RW).unwrap();
    assert_eq!(db.get_record("c.tdb", b"k"), None);

    db.add_record("c.tdb", b"k", b"v");
    let _second = db.open("c.tdb", 0, CLEAR_IF_FIRST, O_RDWR, USR_RW).unwrap();
    assert_eq!(db.get_record("c.tdb", b"k"), Some(b"v".to_vec()));
}

#[test]
fn injected_close_failure_keeps_context_usable() {
    let db = MemTdb::new();
    let mut ctx = open_rw(&db, "a.tdb");
    db.fail_close("a.tdb");

    assert_eq!(db.close(&mut ctx), -1);
    assert_that!(db.error(&ctx), is(equal_to(ERR_IO)));
    assert_eq!(store(&db, &mut ctx, b"k", b"v", REPLACE), 0);

    db.clear_failures();
    assert_eq!(db.close(&mut ctx), 0);
}

#[test]
fn clones_share_counters() {
    let db = MemTdb::new();
    let other = db.clone();
    let mut ctx = open_rw(&other, "a.tdb");
    store(&other, &mut ctx, b"k", b"v", REPLACE);
    other.close(&mut ctx);

    assert_eq!(
        db.calls(),
        CallCounts {
            open: 1,
            close: 1,
            store: 1,
            fetch: 0,
        }
    );
    assert_eq!(db.calls().total(), 3);
}
