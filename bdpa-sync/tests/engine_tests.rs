//! End-to-end drain scenarios against a scripted in-process remote.

use async_trait::async_trait;
use bdpa_cloud::{RemoteError, RemoteResult, RemoteStore};
use bdpa_storage::{RecordStore, SyncQueue};
use bdpa_sync::{ConnectivityMonitor, DrainOutcome, SyncEngine, SyncError};
use bdpa_types::{EntityKind, ItemStatus, Operation, SyncConfig, SyncStatus};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One recorded remote call: `(operation, kind, target id)`.
type Call = (String, String, String);

/// Gate that lets a test hold the remote mid-call.
struct Gate {
    entered: Notify,
    release: Notify,
}

/// Scripted remote store. Fails the first `transport_failures` calls with a
/// transport error, answers a conflict for any target in `conflict_ids`, and
/// records every call it receives.
#[derive(Default)]
struct MockRemote {
    transport_failures: AtomicUsize,
    conflict_ids: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    gate: Mutex<Option<Arc<Gate>>>,
    after_success: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl MockRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fail_next(&self, times: usize) {
        self.transport_failures.store(times, Ordering::SeqCst);
    }

    fn conflict_on(&self, target_id: &str) {
        self.conflict_ids.lock().unwrap().insert(target_id.to_string());
    }

    fn hold_calls(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate { entered: Notify::new(), release: Notify::new() });
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn on_success(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.after_success.lock().unwrap() = Some(Box::new(hook));
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, op: &str, kind: EntityKind, target_id: &str) -> RemoteResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), kind.to_string(), target_id.to_string()));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.conflict_ids.lock().unwrap().contains(target_id) {
            return Err(RemoteError::Conflict {
                entity: kind.to_string(),
                id: target_id.to_string(),
                detail: "versión remota más reciente".into(),
            });
        }
        if self.transport_failures.load(Ordering::SeqCst) > 0 {
            self.transport_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(RemoteError::Transport("conexión rechazada".into()));
        }
        if let Some(hook) = self.after_success.lock().unwrap().as_ref() {
            hook();
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn create_record(&self, kind: EntityKind, payload: &Value) -> RemoteResult<String> {
        let id = payload.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
        self.respond("create", kind, &id).await?;
        Ok(id)
    }

    async fn update_record(&self, kind: EntityKind, id: &str, _payload: &Value) -> RemoteResult<()> {
        self.respond("update", kind, id).await
    }

    async fn delete_record(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        self.respond("delete", kind, id).await
    }

    async fn upload_photo(&self, bucket: &str, path: &str, _bytes: &[u8]) -> RemoteResult<String> {
        self.respond("upload", EntityKind::Foto, path).await?;
        Ok(format!("https://cdn.test/{bucket}/{path}"))
    }
}

struct Fixture {
    engine: Arc<SyncEngine>,
    queue: SyncQueue,
    records: RecordStore,
    monitor: ConnectivityMonitor,
    remote: Arc<MockRemote>,
}

fn fixture(online: bool) -> Fixture {
    let queue = SyncQueue::open_in_memory().unwrap();
    let records = RecordStore::open_in_memory().unwrap();
    let monitor = ConnectivityMonitor::new(online);
    let remote = MockRemote::new();
    let engine = Arc::new(SyncEngine::new(
        queue.clone(),
        records.clone(),
        remote.clone(),
        monitor.clone(),
        SyncConfig::default(),
        "avances-fotos",
    ));
    Fixture { engine, queue, records, monitor, remote }
}

fn avance_payload(id: &str) -> Value {
    json!({
        "id": id,
        "obra_id": "obra-encinos",
        "fecha": "2026-08-20T12:00:00Z",
        "torre": "A",
        "piso": 1,
        "sector": "Poniente",
        "tipo_espacio": "unidad",
        "ubicacion": "A101",
        "categoria": "cableado",
        "porcentaje": 40,
        "foto_path": null,
        "foto_url": null,
        "observaciones": null,
        "usuario_id": "u-1",
        "sync_status": "local",
        "last_sync": null,
        "created_at": "2026-08-20T12:00:00Z",
        "updated_at": "2026-08-20T12:00:00Z",
        "deleted_at": null
    })
}

fn enqueue_create(f: &Fixture, id: &str) {
    f.engine
        .enqueue_mutation(EntityKind::Avance, Operation::Create, id, avance_payload(id))
        .unwrap();
}

#[tokio::test]
async fn offline_create_queues_and_drains_on_reconnect() {
    let f = fixture(false);
    enqueue_create(&f, "a-1");

    // Offline: the record exists locally, the mutation waits in the queue.
    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Local);
    assert_eq!(f.queue.pending_count().unwrap(), 1);
    assert_eq!(f.engine.drain().await.unwrap(), DrainOutcome::Skipped);

    f.monitor.set_online(true);
    let outcome = f.engine.drain().await.unwrap();
    match outcome {
        DrainOutcome::Finished(report) => {
            assert_eq!(report.completed, 1);
            assert_eq!(report.parked, 0);
        }
        other => panic!("expected a finished pass, got {other:?}"),
    }

    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert!(record.last_sync.is_some());
    assert!(f.queue.is_empty().unwrap());
}

#[tokio::test]
async fn updates_replay_in_enqueue_order_without_coalescing() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    for pct in [50u8, 75, 100] {
        f.engine
            .enqueue_mutation(
                EntityKind::Avance,
                Operation::Update,
                "a-1",
                json!({ "porcentaje": pct }),
            )
            .unwrap();
    }

    let outcome = f.engine.drain().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.completed == 4));

    // All three updates hit the remote, oldest first, after the create.
    let calls = f.remote.calls();
    let ops: Vec<&str> = calls.iter().map(|(op, _, _)| op.as_str()).collect();
    assert_eq!(ops, ["create", "update", "update", "update"]);
    assert!(f.queue.is_empty().unwrap());
}

#[tokio::test]
async fn transient_failure_retries_on_next_drain() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    f.remote.fail_next(1);

    let outcome = f.engine.drain().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.retried == 1 && r.completed == 0));

    // Back to pending with the attempt recorded; the record stays local.
    let items = f.queue.pending_items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].attempt_count, 1);
    assert!(items[0].last_error.as_deref().unwrap().contains("conexión rechazada"));
    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Local);

    // Next trigger succeeds.
    let outcome = f.engine.drain().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.completed == 1));
    assert!(f.queue.is_empty().unwrap());
}

#[tokio::test]
async fn retry_budget_exhaustion_parks_item_and_stops_retrying() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    f.remote.fail_next(usize::MAX);

    for _ in 0..3 {
        f.engine.drain().await.unwrap();
    }

    let item = f.queue.failed_items().unwrap().pop().expect("item parked");
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.attempt_count, 3);
    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert_eq!(record.sync_status, SyncStatus::Failed);

    let errors = f.engine.errors();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].is_conflict);
    assert_eq!(errors[0].target_id, "a-1");

    // Parked items are invisible to further drains.
    let calls_before = f.remote.calls().len();
    assert_eq!(f.engine.drain().await.unwrap(), DrainOutcome::Skipped);
    assert_eq!(f.remote.calls().len(), calls_before);
}

#[tokio::test]
async fn manual_retry_rearms_parked_item() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    f.remote.fail_next(3);
    for _ in 0..3 {
        f.engine.drain().await.unwrap();
    }
    let item = f.queue.failed_items().unwrap().pop().unwrap();

    f.engine.retry_item(item.id).unwrap();
    let rearmed = f.queue.get(item.id).unwrap().unwrap();
    assert_eq!(rearmed.status, ItemStatus::Pending);
    assert_eq!(rearmed.attempt_count, 0);

    let outcome = f.engine.drain().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.completed == 1));
    assert_eq!(
        f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap().sync_status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn conflict_parks_immediately_without_blocking_the_pass() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    enqueue_create(&f, "a-2");
    enqueue_create(&f, "a-3");
    f.remote.conflict_on("a-2");

    let outcome = f.engine.drain().await.unwrap();
    match outcome {
        DrainOutcome::Finished(report) => {
            assert_eq!(report.completed, 2);
            assert_eq!(report.conflicts, 1);
            assert_eq!(report.retried, 0);
        }
        other => panic!("expected a finished pass, got {other:?}"),
    }

    // The conflicted item parks on the first attempt, payload intact.
    let item = f.queue.failed_items().unwrap().pop().unwrap();
    assert_eq!(item.target_id, "a-2");
    assert_eq!(item.payload, avance_payload("a-2"));
    assert_eq!(
        f.records.get(EntityKind::Avance, "a-2").unwrap().unwrap().sync_status,
        SyncStatus::Conflict
    );
    // Neighbors are unaffected.
    for id in ["a-1", "a-3"] {
        assert_eq!(
            f.records.get(EntityKind::Avance, id).unwrap().unwrap().sync_status,
            SyncStatus::Synced
        );
    }
    let errors = f.engine.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_conflict);
}

#[tokio::test]
async fn concurrent_drain_is_a_noop() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    let gate = f.remote.hold_calls();

    let engine = f.engine.clone();
    let first = tokio::spawn(async move { engine.drain().await });
    gate.entered.notified().await;

    // First drain is parked inside the remote call; a second trigger bounces.
    assert!(f.engine.snapshot().unwrap().is_syncing);
    assert_eq!(f.engine.drain().await.unwrap(), DrainOutcome::Skipped);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.completed == 1));
    assert!(!f.engine.snapshot().unwrap().is_syncing);
}

#[tokio::test]
async fn connectivity_loss_mid_pass_abandons_remaining_items() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    enqueue_create(&f, "a-2");
    enqueue_create(&f, "a-3");

    // The first successful call drops the link.
    let monitor = f.monitor.clone();
    f.remote.on_success(move || monitor.set_online(false));

    let outcome = f.engine.drain().await.unwrap();
    match outcome {
        DrainOutcome::Finished(report) => {
            assert_eq!(report.completed, 1);
            assert_eq!(report.abandoned, 2);
        }
        other => panic!("expected a finished pass, got {other:?}"),
    }

    // Abandoned items stay pending, untouched, in order.
    let pending = f.queue.pending_items().unwrap();
    let targets: Vec<&str> = pending.iter().map(|i| i.target_id.as_str()).collect();
    assert_eq!(targets, ["a-2", "a-3"]);
    assert_eq!(pending[0].attempt_count, 0);
}

#[tokio::test]
async fn delete_keeps_tombstone_until_remote_confirms() {
    let f = fixture(false);
    enqueue_create(&f, "a-1");
    f.engine
        .enqueue_mutation(EntityKind::Avance, Operation::Delete, "a-1", json!({}))
        .unwrap();

    // Tombstoned: hidden from list views but still present for replay.
    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert!(record.deleted_at.is_some());
    assert!(f.records.list(EntityKind::Avance, false).unwrap().is_empty());
    assert_eq!(f.records.list(EntityKind::Avance, true).unwrap().len(), 1);

    f.monitor.set_online(true);
    f.engine.drain().await.unwrap();

    // Remote confirmed both mutations; the row is physically gone.
    assert!(f.records.get(EntityKind::Avance, "a-1").unwrap().is_none());
    assert!(f.queue.is_empty().unwrap());
}

#[tokio::test]
async fn foto_upload_merges_public_url_into_owning_avance() {
    let dir = tempfile::tempdir().unwrap();
    let foto_path = dir.path().join("a-1.jpg");
    std::fs::write(&foto_path, b"\xff\xd8fake jpeg").unwrap();

    let f = fixture(true);
    enqueue_create(&f, "a-1");
    f.engine
        .enqueue_foto("a-1", foto_path.to_str().unwrap(), "obra-encinos/a-1.jpg")
        .unwrap();

    let outcome = f.engine.drain().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Finished(r) if r.completed == 2));

    let record = f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap();
    assert_eq!(
        record.data.get("foto_url").and_then(Value::as_str),
        Some("https://cdn.test/avances-fotos/obra-encinos/a-1.jpg")
    );
    // The upload itself was a distinct call.
    assert!(f.remote.calls().iter().any(|(op, _, _)| op == "upload"));
}

#[tokio::test]
async fn failed_foto_upload_does_not_touch_record_status() {
    let f = fixture(true);
    enqueue_create(&f, "a-1");
    f.engine.drain().await.unwrap();

    // Photo file missing on disk: the upload fails locally as a transport
    // error, but the already-synced record keeps its status.
    f.engine
        .enqueue_foto("a-1", "/no/such/file.jpg", "obra-encinos/a-1.jpg")
        .unwrap();
    for _ in 0..3 {
        f.engine.drain().await.unwrap();
    }

    assert_eq!(f.queue.failed_count().unwrap(), 1);
    assert_eq!(
        f.records.get(EntityKind::Avance, "a-1").unwrap().unwrap().sync_status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn invalid_payload_never_reaches_the_queue() {
    let f = fixture(true);
    let mut payload = avance_payload("a-1");
    payload["porcentaje"] = json!(150);

    let err = f
        .engine
        .enqueue_mutation(EntityKind::Avance, Operation::Create, "a-1", payload)
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(f.queue.is_empty().unwrap());
    assert!(f.records.get(EntityKind::Avance, "a-1").unwrap().is_none());
}

#[tokio::test]
async fn snapshot_reflects_queue_and_connectivity() {
    let f = fixture(false);
    enqueue_create(&f, "a-1");
    enqueue_create(&f, "a-2");

    let snap = f.engine.snapshot().unwrap();
    assert!(!snap.is_online);
    assert!(!snap.is_syncing);
    assert_eq!(snap.queue_length, 2);
    assert_eq!(snap.pending_count, 2);
    assert_eq!(snap.failed_count, 0);
    assert!(snap.last_sync_at.is_none());

    f.monitor.set_online(true);
    f.engine.drain().await.unwrap();

    let snap = f.engine.snapshot().unwrap();
    assert!(snap.is_online);
    assert_eq!(snap.queue_length, 0);
    assert!(snap.last_sync_at.is_some());
}

#[tokio::test]
async fn empty_queue_drain_is_skipped() {
    let f = fixture(true);
    assert_eq!(f.engine.drain().await.unwrap(), DrainOutcome::Skipped);
    assert!(f.remote.calls().is_empty());
}
