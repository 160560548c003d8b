#![no_main]

use docseq::contracts::CounterStore;
use docseq::storage::{RocksDbConnection, RocksDbCounterStore};
use libfuzzer_sys::fuzz_target;
use tempfile::TempDir;

fuzz_target!(|data: &[u8]| {
    // Split the input into a model and a field name
    // Invalid UTF-8 becomes replacement chars
    let text = String::from_utf8_lossy(data);
    let (model, field) = text.split_once('\0').unwrap_or((&*text, "no"));

    let dir = TempDir::new().unwrap();
    let connection = RocksDbConnection::open_path(dir.path()).unwrap();
    let store = RocksDbCounterStore::initialize(&connection).unwrap();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    // A created counter is found under exactly its own identity
    let counter = rt.block_on(store.create_counter(model, field, 0)).unwrap();
    let found = rt.block_on(store.find_counter(model, field)).unwrap();
    assert_eq!(found.as_ref(), Some(&counter));
    assert_eq!(rt.block_on(store.advance(&counter, 1)).unwrap(), 1);

    let listed = store.list_counters().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].model, model);
    assert_eq!(listed[0].field, field);
});
