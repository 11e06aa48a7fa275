//! Cycle runner and scheduler behaviour with an in-process registry and store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bulksync_core::{ApplicationRecord, LifecycleBundles, ProcessGuid, Recipe, RecipeBuilder};
use bulksync_db_memory::InMemoryStore;
use bulksync_registry::{DynFetcher, FetchError, ScriptedRegistry};
use bulksync_server::sync::CycleAbort;
use bulksync_server::{CycleOutcome, CycleRunner, SchedulerState, SyncScheduler};
use bulksync_storage::{DesiredStateRecord, DesiredStateStore, DynStore, StoreError, StoreVersion};
use tokio_util::sync::CancellationToken;

fn builder() -> Arc<RecipeBuilder> {
    let bundles = LifecycleBundles::from_json(r#"{"cflinuxfs2": "cflinuxfs2/lifecycle.tgz"}"#)
        .unwrap();
    Arc::new(RecipeBuilder::new("127.0.0.1:20515", bundles))
}

fn app(guid: &str, instances: u32) -> ApplicationRecord {
    serde_json::from_value(serde_json::json!({
        "process_guid": guid,
        "droplet_uri": format!("http://blobstore/{guid}"),
        "stack": "cflinuxfs2",
        "memory_mb": 128,
        "disk_mb": 256,
        "num_instances": instances
    }))
    .unwrap()
}

fn seeded_store(builder: &RecipeBuilder, guids: &[&str]) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::with_recipes(
        guids.iter().map(|g| builder.build(&app(g, 1)).unwrap()),
    ))
}

fn runner(store: &Arc<InMemoryStore>, registry: &Arc<ScriptedRegistry>, fetch_timeout: Duration) -> CycleRunner {
    let store: DynStore = store.clone();
    let fetcher: DynFetcher = registry.clone();
    CycleRunner::new(store, fetcher, builder(), 4, fetch_timeout)
}

/// Delays every write and counts how many were started.
struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
    writes_started: AtomicUsize,
}

#[async_trait]
impl DesiredStateStore for SlowStore {
    async fn list(&self) -> Result<Vec<DesiredStateRecord>, StoreError> {
        self.inner.list().await
    }

    async fn upsert(
        &self,
        recipe: &Recipe,
        expected: Option<StoreVersion>,
    ) -> Result<StoreVersion, StoreError> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.upsert(recipe, expected).await
    }

    async fn delete(
        &self,
        process_guid: &ProcessGuid,
        expected: Option<StoreVersion>,
    ) -> Result<(), StoreError> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.delete(process_guid, expected).await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}

fn guid_list(guids: &[&str]) -> Vec<ProcessGuid> {
    guids.iter().map(|g| ProcessGuid::new(*g)).collect()
}

#[tokio::test]
async fn completed_cycle_creates_and_deletes() {
    let builder = builder();
    let store = seeded_store(&builder, &["A", "B"]);
    let registry = Arc::new(ScriptedRegistry::new(vec![vec![app("A", 1)], vec![app("C", 1)]]));

    let outcome = runner(&store, &registry, Duration::from_secs(5))
        .run(&CancellationToken::new())
        .await;

    let CycleOutcome::Completed(report) = outcome else {
        panic!("cycle did not complete: {outcome:?}");
    };
    assert_eq!(report.batches, 2);
    assert_eq!(report.records, 2);
    assert_eq!((report.created, report.deleted, report.unchanged), (1, 1, 1));
    assert_eq!(store.guids().await, guid_list(&["A", "C"]));
}

#[tokio::test]
async fn fetch_failure_applies_observed_pages_but_never_deletes() {
    let builder = builder();
    let store = seeded_store(&builder, &["A", "old"]);
    let registry = Arc::new(
        ScriptedRegistry::new(vec![vec![app("A", 3), app("new", 1)], vec![app("late", 1)]])
            .fail_on_page(1, FetchError::Unauthorized(401)),
    );

    let outcome = runner(&store, &registry, Duration::from_secs(5))
        .run(&CancellationToken::new())
        .await;

    let CycleOutcome::Aborted { reason, report } = outcome else {
        panic!("cycle should abort");
    };
    assert!(matches!(reason, CycleAbort::Fetch(FetchError::Unauthorized(401))));
    assert_eq!((report.created, report.updated, report.deleted), (1, 1, 0));
    assert_eq!(store.guids().await, guid_list(&["A", "new", "old"]));
    assert_eq!(store.get(&"A".into()).await.unwrap().instances(), 3);
}

#[tokio::test]
async fn failed_write_is_retried_by_the_next_cycle() {
    let builder = builder();
    let store = seeded_store(&builder, &[]);
    store.inject_write_failure("b").await;
    let registry = Arc::new(ScriptedRegistry::new(vec![vec![app("a", 1), app("b", 1)]]));
    let runner = runner(&store, &registry, Duration::from_secs(5));

    let first = runner.run(&CancellationToken::new()).await;
    assert!(first.is_completed());
    assert_eq!(first.report().created, 1);
    assert_eq!(first.report().failed, 1);
    assert_eq!(store.len().await, 1);

    let second = runner.run(&CancellationToken::new()).await;
    assert_eq!(second.report().created, 1);
    assert_eq!(second.report().unchanged, 1);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn inconsistent_listing_aborts_without_deletes() {
    let builder = builder();
    let store = seeded_store(&builder, &["old"]);
    let registry = Arc::new(ScriptedRegistry::new(vec![vec![app("a", 1)], vec![app("a", 2)]]));

    let outcome = runner(&store, &registry, Duration::from_secs(5))
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(
        outcome,
        CycleOutcome::Aborted { reason: CycleAbort::InconsistentListing { .. }, .. }
    ));
    assert!(store.get(&"old".into()).await.is_some());
}

#[tokio::test]
async fn cancelled_token_prevents_any_write() {
    let builder = builder();
    let store = seeded_store(&builder, &["old"]);
    let registry = Arc::new(ScriptedRegistry::new(vec![vec![app("a", 1)]]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = runner(&store, &registry, Duration::from_secs(5)).run(&cancel).await;

    assert!(matches!(outcome, CycleOutcome::Aborted { reason: CycleAbort::Cancelled, .. }));
    assert_eq!(registry.calls(), 0);
    assert_eq!(store.guids().await, guid_list(&["old"]));
}

#[tokio::test(start_paused = true)]
async fn slow_page_times_out_per_call() {
    let builder = builder();
    let store = seeded_store(&builder, &["old"]);
    let registry = Arc::new(
        ScriptedRegistry::new(vec![vec![app("a", 1)]]).with_delay(Duration::from_secs(60)),
    );

    let outcome = runner(&store, &registry, Duration::from_secs(5))
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(
        outcome,
        CycleOutcome::Aborted { reason: CycleAbort::Fetch(FetchError::Timeout(_)), .. }
    ));
    assert_eq!(store.guids().await, guid_list(&["old"]));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_fetch() {
    let builder = builder();
    let store = seeded_store(&builder, &["old"]);
    let registry = Arc::new(
        ScriptedRegistry::new(vec![vec![app("a", 1)]]).with_delay(Duration::from_secs(20)),
    );
    let runner = runner(&store, &registry, Duration::from_secs(60));
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(registry.calls(), 1);
    cancel.cancel();

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Aborted { reason: CycleAbort::Cancelled, .. }));
    assert_eq!(store.guids().await, guid_list(&["old"]));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_starting_new_writes() {
    let store = Arc::new(SlowStore {
        inner: InMemoryStore::new(),
        delay: Duration::from_secs(1),
        writes_started: AtomicUsize::new(0),
    });
    let page = (0..10).map(|i| app(&format!("app-{i}"), 1)).collect();
    let registry: DynFetcher = Arc::new(ScriptedRegistry::new(vec![page]));
    let dyn_store: DynStore = store.clone();
    let runner = CycleRunner::new(dyn_store, registry, builder(), 1, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.writes_started.load(Ordering::SeqCst), 2);
    cancel.cancel();

    let outcome = task.await.unwrap();
    let CycleOutcome::Aborted { reason, report } = outcome else {
        panic!("cycle should abort on cancellation");
    };
    assert!(matches!(reason, CycleAbort::Cancelled));
    // The write in flight at cancellation completes; nothing else starts.
    assert_eq!(store.writes_started.load(Ordering::SeqCst), 2);
    assert_eq!(report.created, 2);
    assert_eq!(store.inner.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn scheduler_drops_ticks_while_a_cycle_runs() {
    let builder = builder();
    let store = seeded_store(&builder, &[]);
    let registry = Arc::new(
        ScriptedRegistry::new(vec![vec![app("a", 1)]]).with_delay(Duration::from_secs(3)),
    );
    let scheduler = SyncScheduler::new(
        runner(&store, &registry, Duration::from_secs(10)),
        Duration::from_secs(1),
    );

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let stats = handle.stats();
    assert_eq!(stats.cycles_started, 1);
    assert_eq!(stats.ticks_dropped, 2);
    assert_eq!(registry.calls(), 1);
    assert_eq!(handle.state(), SchedulerState::Fetching);

    let mut state = handle.subscribe();
    handle.shutdown().await.unwrap();
    assert_eq!(*state.borrow_and_update(), SchedulerState::Stopped);
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn scheduler_converges_over_successive_cycles() {
    let builder = builder();
    let store = seeded_store(&builder, &["stale"]);
    let registry = Arc::new(ScriptedRegistry::new(vec![vec![app("a", 1), app("b", 1)]]));
    let scheduler = SyncScheduler::new(
        runner(&store, &registry, Duration::from_secs(10)),
        Duration::from_secs(30),
    );

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.guids().await, guid_list(&["a", "b"]));
    assert_eq!(handle.state(), SchedulerState::Idle);

    registry.set_pages(vec![vec![app("b", 2)]]);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.guids().await, guid_list(&["b"]));
    assert_eq!(store.get(&"b".into()).await.unwrap().instances(), 2);

    let stats = handle.stats();
    assert_eq!(stats.cycles_completed, 2);
    assert_eq!(stats.ticks_dropped, 0);
    handle.shutdown().await.unwrap();
}
