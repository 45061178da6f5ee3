#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex as StdMutex};

use rentala_lib::entity::{PropertyFields, PropertyPatch};
use rentala_lib::SnapshotCache;
use serde_json::Value;
use tracing::subscriber::{self, DefaultGuard};
use tracing_subscriber::{fmt, EnvFilter};

mod util;
use util::{clock, store_with, FakeApi, HOUR};

struct BufferWriter(Arc<StdMutex<Vec<u8>>>);

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn init_buffer_subscriber() -> (Arc<StdMutex<Vec<u8>>>, DefaultGuard) {
    let buffer: Arc<StdMutex<Vec<u8>>> = Arc::new(StdMutex::new(Vec::new()));
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("rentala=debug"))
        .with_writer(move || BufferWriter(writer.clone()))
        .json()
        .finish();
    let guard = subscriber::set_default(subscriber);
    (buffer, guard)
}

fn events(buffer: &Arc<StdMutex<Vec<u8>>>) -> Vec<Value> {
    let raw = String::from_utf8(buffer.lock().unwrap().clone()).expect("log utf8");
    raw.lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("json log line"))
        .collect()
}

fn find<'a>(events: &'a [Value], name: &str) -> Option<&'a Value> {
    events.iter().find(|e| e["fields"]["event"] == name)
}

#[tokio::test]
async fn offline_lifecycle_is_logged_under_the_crate_target() {
    let (buffer, _guard) = init_buffer_subscriber();
    let clock = clock();
    let api = FakeApi::<PropertyFields>::new(clock.clone());
    api.set_failing(true);
    let mut store = store_with(&api, &SnapshotCache::in_memory(), &clock);

    store.load().await;
    let created = store.create(PropertyFields::named("Lake View")).await.unwrap();
    store
        .update(
            &created.entity.id,
            PropertyPatch {
                rent: Some(7_800.0),
                ..PropertyPatch::default()
            },
        )
        .await
        .unwrap();

    let logged = events(&buffer);
    let failed = find(&logged, "load_failed").expect("load_failed logged");
    assert_eq!(failed["level"], "WARN");
    assert_eq!(failed["target"], "rentala");
    assert_eq!(failed["fields"]["kind"], "properties");
    assert_eq!(failed["fields"]["error_kind"], "network");

    assert!(find(&logged, "create_sync_failed").is_some());
    let created_event = find(&logged, "entity_created").expect("entity_created logged");
    assert_eq!(created_event["fields"]["id"], created.entity.id.as_str());
    assert!(find(&logged, "update_deferred").is_some());
}

#[tokio::test]
async fn failed_delete_asks_for_reconciliation() {
    let (buffer, _guard) = init_buffer_subscriber();
    let clock = clock();
    let api = FakeApi::<PropertyFields>::new(clock.clone());
    let id = api.seed(PropertyFields::named("Tech Park"));
    let mut store = store_with(&api, &SnapshotCache::in_memory(), &clock);
    store.load().await;

    api.set_failing(true);
    store.delete(&id).await.unwrap();
    api.set_failing(false);
    clock.advance(HOUR);
    store.load().await;

    let logged = events(&buffer);
    let pending = find(&logged, "delete_needs_reconciliation").expect("warned on failed delete");
    assert_eq!(pending["fields"]["id"], "1");
    assert!(find(&logged, "load_resurrected").is_some());
    assert!(find(&logged, "load_live").is_some());
}
