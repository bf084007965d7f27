//! Mock construction helpers

use datahub_rs::backup::BackupStore;
use datahub_rs::handler::PushCallback;
use datahub_rs::{HandlerValue, Result};
use mockall::mock;
use std::sync::{Arc, Mutex};

mock! {
    pub Store {}

    impl BackupStore for Store {
        fn write(&mut self, name: &str, data: &[u8]) -> Result<()>;
        fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;
        fn remove(&mut self, name: &str) -> Result<()>;
        fn list(&self) -> Result<Vec<String>>;
    }
}

/// A store mock that has nothing stored and accepts any removal.
pub fn empty_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_read().returning(|_| Ok(None));
    store.expect_list().returning(|| Ok(Vec::new()));
    store.expect_remove().returning(|_| Ok(()));
    store
}

/// Values seen by a push handler, in delivery order.
pub type Recorded = Arc<Mutex<Vec<(f64, HandlerValue)>>>;

/// A push callback that records what it is called with.
pub fn recorder() -> (Recorded, PushCallback) {
    let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: PushCallback = Box::new(move |timestamp: f64, value: &HandlerValue| {
        sink.lock().unwrap().push((timestamp, value.clone()));
    });
    (seen, callback)
}

/// Just the values from a recording.
pub fn values(recorded: &Recorded) -> Vec<HandlerValue> {
    recorded.lock().unwrap().iter().map(|(_, v)| v.clone()).collect()
}
