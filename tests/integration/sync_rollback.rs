//! Integration tests for optimistic writes: rollback, per-task ordering
//! and the write timeout.
//!
//! Time-sensitive tests run on a paused Tokio clock, so store latency is
//! simulated without real sleeps.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use taskorbit::store::StoreError;
use taskorbit::store::memory::{InMemoryTaskStore, StoreCall};
use taskorbit::sync::{Mutation, MutationDispatcher, MutationKind, SyncError, SyncEvent};
use taskorbit_proto::{Category, Task, TaskId, TaskPatch};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

const OWNER: &str = "ada@example.com";
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const LATENCY: Duration = Duration::from_millis(200);

fn make_task(id: &str, category: Category, position: f64) -> Task {
    Task {
        id: TaskId::new(id),
        title: id.to_uppercase(),
        description: format!("about {id}"),
        category,
        owner: OWNER.to_string(),
        author: "Ada".to_string(),
        timestamp: Utc::now(),
        status: "pending".to_string(),
        position: Some(position),
    }
}

async fn loaded(
    tasks: Vec<Task>,
) -> (
    MutationDispatcher<InMemoryTaskStore>,
    mpsc::Receiver<SyncEvent>,
) {
    let (dispatcher, events) =
        MutationDispatcher::new(InMemoryTaskStore::with_tasks(tasks), WRITE_TIMEOUT, 64);
    dispatcher.load(OWNER).await.expect("load should succeed");
    (dispatcher, events)
}

fn move_to(id: &str, category: Category) -> Mutation {
    Mutation::PatchCategory {
        task_id: TaskId::new(id),
        category,
        position: None,
        anchor: None,
    }
}

fn rename(id: &str, title: &str) -> Mutation {
    Mutation::PatchFields {
        task_id: TaskId::new(id),
        title: Some(title.to_string()),
        description: None,
    }
}

fn board() -> Vec<Task> {
    vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::ToDo, 1024.0),
        make_task("c", Category::InProgress, 2048.0),
    ]
}

// ===========================================================================
// Rollback
// ===========================================================================

#[tokio::test]
async fn failed_category_patch_restores_cache_exactly() {
    let (dispatcher, mut events) = loaded(board()).await;
    let before = dispatcher.cache();

    dispatcher.store().fail_next(StoreError::Status {
        status: 500,
        message: "boom".to_string(),
    });
    let ticket = dispatcher.dispatch(move_to("a", Category::Done)).unwrap();
    assert_eq!(
        dispatcher.get(&TaskId::new("a")).unwrap().category,
        Category::Done
    );

    let err = ticket.outcome().await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(StoreError::Status { status: 500, .. })));
    assert_eq!(dispatcher.cache(), before);

    assert_eq!(
        events.recv().await,
        Some(SyncEvent::RolledBack {
            task_id: TaskId::new("a"),
            kind: MutationKind::PatchCategory,
            error: err,
        })
    );
}

#[tokio::test]
async fn failed_delete_puts_task_back_in_its_slot() {
    let (dispatcher, _events) = loaded(board()).await;
    let before = dispatcher.cache();

    dispatcher
        .store()
        .fail_next(StoreError::Network("connection reset".to_string()));
    let ticket = dispatcher
        .dispatch(Mutation::Delete {
            task_id: TaskId::new("a"),
        })
        .unwrap();
    assert!(dispatcher.get(&TaskId::new("a")).is_none());

    assert!(ticket.outcome().await.is_err());
    assert_eq!(dispatcher.cache(), before);
    assert_eq!(
        dispatcher.columns().ids(Category::ToDo),
        [TaskId::new("a"), TaskId::new("b")]
    );
}

#[tokio::test]
async fn failed_create_leaves_no_trace() {
    let (dispatcher, _events) = loaded(board()).await;
    let before = dispatcher.cache();

    let mut task = make_task("local", Category::Done, 4096.0);
    task.id = TaskId::generate();
    dispatcher.store().fail_next(StoreError::Unavailable("down".to_string()));
    let ticket = dispatcher.dispatch(Mutation::Create { task }).unwrap();
    assert_eq!(dispatcher.columns().column(Category::Done).len(), 1);

    assert!(ticket.outcome().await.is_err());
    assert_eq!(dispatcher.cache(), before);
    assert_eq!(dispatcher.store().tasks().len(), 3);
}

#[tokio::test]
async fn unauthorized_write_asks_for_sign_in() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().fail_next(StoreError::Unauthorized);
    let err = dispatcher
        .dispatch(rename("b", "Nope"))
        .unwrap()
        .outcome()
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Unauthorized);
    assert!(err.requires_sign_in());
    assert_eq!(dispatcher.get(&TaskId::new("b")).unwrap().title, "B");
}

#[tokio::test]
async fn later_edit_survives_earlier_rollback() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().fail_next(StoreError::Status {
        status: 500,
        message: String::new(),
    });

    let moved = dispatcher.dispatch(move_to("a", Category::Done)).unwrap();
    let renamed = dispatcher.dispatch(rename("a", "Renamed")).unwrap();
    let task = dispatcher.get(&TaskId::new("a")).unwrap();
    assert_eq!(task.category, Category::Done);
    assert_eq!(task.title, "Renamed");

    assert!(moved.outcome().await.is_err());
    assert!(renamed.outcome().await.is_ok());

    let task = dispatcher.get(&TaskId::new("a")).unwrap();
    assert_eq!(task.category, Category::ToDo);
    assert_eq!(task.title, "Renamed");
    assert_eq!(dispatcher.store().get(&TaskId::new("a")).unwrap(), task);
}

#[tokio::test]
async fn other_tasks_are_untouched_by_a_rollback() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().fail_next(StoreError::Timeout);

    let failing = dispatcher.dispatch(move_to("a", Category::Done)).unwrap();
    assert!(failing.outcome().await.is_err());
    let ok = dispatcher.dispatch(move_to("c", Category::Done)).unwrap();
    ok.outcome().await.unwrap();

    assert_eq!(dispatcher.columns().ids(Category::Done), [TaskId::new("c")]);
    assert_eq!(
        dispatcher.columns().ids(Category::ToDo),
        [TaskId::new("a"), TaskId::new("b")]
    );
}

// ===========================================================================
// Ordering
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn writes_to_one_task_are_serialized_in_dispatch_order() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().set_latency(Some(LATENCY));
    let started = Instant::now();

    let first = dispatcher.dispatch(move_to("a", Category::InProgress)).unwrap();
    let second = dispatcher.dispatch(rename("a", "Halfway")).unwrap();
    let third = dispatcher.dispatch(move_to("a", Category::Done)).unwrap();
    assert_eq!(dispatcher.pending_count(&TaskId::new("a")), 3);

    first.outcome().await.unwrap();
    second.outcome().await.unwrap();
    third.outcome().await.unwrap();

    // Each write waited for the previous one.
    assert!(started.elapsed() >= LATENCY * 3);
    assert!(dispatcher.is_idle());

    let writes: Vec<StoreCall> = dispatcher
        .store()
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, StoreCall::Fetch(_)))
        .collect();
    let a = TaskId::new("a");
    assert_eq!(
        writes,
        [
            StoreCall::Patch(
                a.clone(),
                TaskPatch {
                    category: Some(Category::InProgress),
                    ..TaskPatch::default()
                }
            ),
            StoreCall::Patch(
                a.clone(),
                TaskPatch {
                    title: Some("Halfway".to_string()),
                    ..TaskPatch::default()
                }
            ),
            StoreCall::Patch(
                a,
                TaskPatch {
                    category: Some(Category::Done),
                    ..TaskPatch::default()
                }
            ),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn writes_to_different_tasks_run_concurrently() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().set_latency(Some(LATENCY));
    let started = Instant::now();

    let a = dispatcher.dispatch(move_to("a", Category::Done)).unwrap();
    let c = dispatcher.dispatch(move_to("c", Category::Done)).unwrap();
    a.outcome().await.unwrap();
    c.outcome().await.unwrap();

    assert!(started.elapsed() < LATENCY * 2);
}

#[tokio::test(start_paused = true)]
async fn create_followups_target_the_store_id() {
    let (dispatcher, _events) = loaded(vec![]).await;
    dispatcher.store().set_latency(Some(LATENCY));

    let task = make_task("draft", Category::ToDo, 0.0);
    let created = dispatcher.dispatch(Mutation::Create { task }).unwrap();
    let moved = dispatcher.dispatch(move_to("draft", Category::Done)).unwrap();

    let server_id = created.outcome().await.unwrap();
    assert_eq!(moved.outcome().await, Ok(server_id.clone()));

    let calls = dispatcher.store().calls();
    assert!(calls.contains(&StoreCall::Patch(
        server_id.clone(),
        TaskPatch {
            category: Some(Category::Done),
            ..TaskPatch::default()
        }
    )));
    assert_eq!(
        dispatcher.store().get(&server_id).unwrap().category,
        Category::Done
    );
    assert_eq!(dispatcher.get(&TaskId::new("draft")).unwrap().id, server_id);
    assert_eq!(dispatcher.snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn anchor_on_an_uncommitted_task_follows_its_store_id() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher.store().set_latency(Some(LATENCY));

    let created = dispatcher
        .dispatch(Mutation::Create {
            task: make_task("draft", Category::ToDo, 2048.0),
        })
        .unwrap();
    tokio::time::sleep(LATENCY / 2).await;
    // Keeps a's lane busy past the create's commit.
    let renamed = dispatcher.dispatch(rename("a", "First")).unwrap();
    let reordered = dispatcher
        .dispatch(Mutation::Reorder {
            task_id: TaskId::new("a"),
            position: 1536.0,
            anchor: Some(TaskId::new("draft")),
        })
        .unwrap();

    let server_id = created.outcome().await.unwrap();
    renamed.outcome().await.unwrap();
    reordered.outcome().await.unwrap();

    let expected = vec![TaskId::new("b"), TaskId::new("a"), server_id];
    assert_eq!(dispatcher.columns().ids(Category::ToDo), expected);
    dispatcher.load(OWNER).await.unwrap();
    assert_eq!(dispatcher.columns().ids(Category::ToDo), expected);
}

// ===========================================================================
// Timeout
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn slow_write_times_out_and_rolls_back() {
    let (dispatcher, mut events) = loaded(board()).await;
    let before = dispatcher.cache();
    dispatcher.store().set_latency(Some(WRITE_TIMEOUT * 3));

    let ticket = dispatcher.dispatch(move_to("b", Category::Done)).unwrap();
    assert_eq!(ticket.outcome().await, Err(SyncError::Timeout(WRITE_TIMEOUT)));
    assert_eq!(dispatcher.cache(), before);

    let Some(SyncEvent::RolledBack { kind, error, .. }) = events.recv().await else {
        panic!("expected a rollback event");
    };
    assert_eq!(kind, MutationKind::PatchCategory);
    assert_eq!(error, SyncError::Timeout(WRITE_TIMEOUT));
}

#[tokio::test(start_paused = true)]
async fn write_just_inside_the_timeout_commits() {
    let (dispatcher, _events) = loaded(board()).await;
    dispatcher
        .store()
        .set_latency(Some(WRITE_TIMEOUT - Duration::from_millis(1)));

    let ticket = dispatcher.dispatch(move_to("b", Category::Done)).unwrap();
    assert_eq!(ticket.outcome().await, Ok(TaskId::new("b")));
    assert_eq!(
        dispatcher.store().get(&TaskId::new("b")).unwrap().category,
        Category::Done
    );
}
