#[macro_use]
extern crate hamcrest;

use hamcrest::prelude::*;
use tdb_runtime_mocked::MemTdb;
use tdbshare::{consts, Error, OpenOptions, Registry, Status, StoreMode};

fn registry() -> (MemTdb, Registry<MemTdb>) {
    let db = MemTdb::new();
    (db.clone(), Registry::new(db))
}

#[test]
fn second_open_aliases_first() {
    let (db, registry) = registry();
    let h1 = registry.open_default("a.db").into_result().unwrap();
    let h2 = registry.open_default("a.db").into_result().unwrap();

    assert!(h1.same_state(&h2));
    assert_that!(db.calls().open, is(equal_to(1)));
    assert_that!(registry.len(), is(equal_to(1)));
}

#[test]
fn open_options_of_alias_are_ignored() {
    let (db, registry) = registry();
    let h1 = registry.open_default("a.db").into_result().unwrap();
    let h2 = registry
        .open_checked("a.db", &OpenOptions::new().read_only().hash_size(7))
        .unwrap();

    // Still writable: the read-only options never reached the engine.
    h2.store("k", "v", StoreMode::Replace).unwrap();
    assert_eq!(h1.fetch("k").unwrap(), "v");
    assert_that!(db.calls().open, is(equal_to(1)));
}

#[test]
fn debug_flag_is_shared() {
    let (_db, registry) = registry();
    let h1 = registry.open_default("a.db").handle;
    let h2 = registry.open_default("a.db").handle;

    assert!(!h1.debug());
    assert!(registry.toggle_debug(&h1));
    assert!(h2.debug());
    assert!(!h2.toggle_debug());
    assert!(!h1.debug());
}

#[test]
fn close_is_shared() {
    let (_db, registry) = registry();
    let h1 = registry.open_default("a.db").handle;
    let h2 = h1.clone();

    registry.close(&h1).unwrap();
    assert!(h2.is_closed());
    assert_eq!(h2.to_string(), r#"DB{pth:"a.db", Dbg:false, nil}"#);
}

#[test]
fn close_on_closed_does_not_reach_engine() {
    let (db, registry) = registry();
    let h1 = registry.open_default("a.db").handle;
    let h2 = registry.open_default("a.db").handle;

    h1.close().unwrap();
    let calls = db.calls().total();

    let err = h2.close().unwrap_err();
    assert!(err.is_already_closed());
    assert_that!(db.calls().total(), is(equal_to(calls)));
}

#[test]
fn failed_close_keeps_handle_open() {
    let (db, registry) = registry();
    let handle = registry.open_default("a.db").handle;
    db.fail_close("a.db");

    let err = handle.close().unwrap_err();
    assert_eq!(err.status(), Some(Status::Io));
    assert!(!handle.is_closed());
    handle.store("k", "v", StoreMode::Insert).unwrap();

    db.clear_failures();
    handle.close().unwrap();
    assert!(handle.is_closed());
}

#[test]
fn failed_open_registers_closed_entry() {
    let (db, registry) = registry();
    db.fail_open("a.db");

    let opened = registry.open_default("a.db");
    assert!(!opened.is_ok());
    assert!(matches!(opened.error, Some(Error::EngineUnavailable { ref path }) if path == "a.db"));
    assert!(opened.handle.is_closed());
    assert!(registry.contains("a.db"));

    let stores = db.calls().store;
    let err = opened.handle.store("k", "v", StoreMode::Replace).unwrap_err();
    assert!(err.is_already_closed());
    assert_that!(db.calls().store, is(equal_to(stores)));

    db.clear_failures();
    let retry = registry.open_default("a.db").into_result().unwrap();
    assert!(retry.same_state(&opened.handle));
    assert!(!opened.handle.is_closed());
}

#[test]
fn reopen_installs_context_in_place() {
    let (db, registry) = registry();
    let h1 = registry.open_default("a.db").handle;
    h1.close().unwrap();

    let h2 = registry.open_default("a.db").into_result().unwrap();
    assert!(h1.same_state(&h2));
    assert!(!h1.is_closed());
    assert_that!(db.calls().open, is(equal_to(2)));
    assert_that!(registry.len(), is(equal_to(1)));
}

#[test]
fn paths_are_not_normalised() {
    let (db, registry) = registry();
    let h1 = registry.open_default("a.db").handle;
    let h2 = registry.open_default("./a.db").handle;

    assert!(!h1.same_state(&h2));
    assert_eq!(registry.paths(), vec!["./a.db", "a.db"]);
    assert_that!(db.calls().open, is(equal_to(2)));
}

#[test]
fn open_passes_options_to_engine() {
    let (db, registry) = registry();
    db.add_record("ro.db", b"k", b"v");
    let options = OpenOptions::new().open_flags(consts::O_RDONLY);
    let handle = registry.open_checked("ro.db", &options).unwrap();

    let err = handle.store("k", "w", StoreMode::Replace).unwrap_err();
    assert_eq!(err.status(), Some(Status::RdOnly));
    assert_eq!(handle.fetch("k").unwrap(), "v");
}

#[test]
fn shutdown_closes_open_states() {
    let (db, registry) = registry();
    let a = registry.open_default("a.db").handle;
    let b = registry.open_default("b.db").handle;
    let c = registry.open_default("c.db").handle;
    c.close().unwrap();

    let errors = registry.shutdown();
    assert!(errors.is_empty());
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert_that!(db.calls().close, is(equal_to(3)));
    assert_that!(registry.len(), is(equal_to(3)));
}

#[test]
fn shutdown_reports_failures() {
    let (db, registry) = registry();
    let a = registry.open_default("a.db").handle;
    let b = registry.open_default("b.db").handle;
    db.fail_close("b.db");

    let errors = registry.shutdown();
    assert_that!(errors.len(), is(equal_to(1)));
    assert_eq!(errors[0].status(), Some(Status::Io));
    assert!(a.is_closed());
    assert!(!b.is_closed());
}

#[test]
fn close_failure_that_releases_context_can_be_retried() {
    let (db, registry) = registry();
    let handle = registry.open_default("a.db").handle;
    handle.store("k", "v", StoreMode::Insert).unwrap();
    db.fail_close_releasing("a.db");

    let err = handle.close().unwrap_err();
    assert_eq!(err.status(), Some(Status::Io));
    assert!(!handle.is_closed());

    let err = handle.store("k", "w", StoreMode::Replace).unwrap_err();
    assert_eq!(err.status(), Some(Status::Einval));

    handle.close().unwrap();
    assert!(handle.is_closed());

    db.clear_failures();
    let reopened = registry.open_default("a.db").into_result().unwrap();
    assert!(reopened.same_state(&handle));
    assert_that!(db.calls().open, is(equal_to(2)));
    assert_eq!(reopened.fetch("k").unwrap(), "v");
}

#[test]
fn failed_reopen_of_closed_path_stays_closed() {
    let (db, registry) = registry();
    let handle = registry.open_default("a.db").handle;
    handle.store("k", "v", StoreMode::Insert).unwrap();
    handle.close().unwrap();
    db.fail_open("a.db");

    let opened = registry.open_default("a.db");
    assert!(matches!(opened.error, Some(Error::EngineUnavailable { ref path }) if path == "a.db"));
    assert!(opened.handle.is_closed());
    assert!(opened.handle.same_state(&handle));
    assert!(handle.fetch("k").unwrap_err().is_already_closed());
    assert_that!(registry.len(), is(equal_to(1)));

    db.clear_failures();
    let reopened = registry.open_default("a.db").into_result().unwrap();
    assert!(!handle.is_closed());
    assert_eq!(reopened.fetch("k").unwrap(), "v");
}

#[test]
fn dropping_registry_detaches_open_contexts() {
    let db = MemTdb::new();
    {
        let registry = Registry::new(db.clone());
        let _a = registry.open_default("a.db").into_result().unwrap();
        assert_that!(db.open_contexts("a.db"), is(equal_to(1)));
    }
    assert_that!(db.open_contexts("a.db"), is(equal_to(0)));

    db.add_record("a.db", b"k", b"v");
    let registry = Registry::new(db.clone());
    let options = OpenOptions::new().tdb_flags(consts::CLEAR_IF_FIRST);
    let handle = registry.open_checked("a.db", &options).unwrap();
    assert!(matches!(handle.fetch("k"), Err(Error::NotFoundOrIoFailure)));
}
