//! Integration tests for the board: load, add, drag, edit and delete
//! against an in-memory store.
//!
//! Covers the column partition after drags, field validation before any
//! store call, and store-assigned ids replacing client ids.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::time::Duration;

use chrono::Utc;

use taskorbit::board::{Board, BoardError, DragState, DropTarget, TaskDraft};
use taskorbit::session::{Session, SessionUser};
use taskorbit::store::memory::{InMemoryTaskStore, StoreCall};
use taskorbit::sync::{DispatchError, MutationDispatcher};
use taskorbit_proto::{Category, Task, TaskId, ValidationError};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

const OWNER: &str = "ada@example.com";

/// Creates a stored task with an explicit order key.
fn make_task(id: &str, category: Category, position: f64) -> Task {
    Task {
        id: TaskId::new(id),
        title: id.to_uppercase(),
        description: String::new(),
        category,
        owner: OWNER.to_string(),
        author: "Ada".to_string(),
        timestamp: Utc::now(),
        status: "pending".to_string(),
        position: Some(position),
    }
}

/// Builds a board for Ada over a store holding `tasks`, already loaded.
async fn loaded_board(tasks: Vec<Task>) -> Board<InMemoryTaskStore> {
    let session = Session::fixed(SessionUser {
        email: OWNER.to_string(),
        display_name: "Ada".to_string(),
        photo_url: None,
    });
    let (dispatcher, _events) = MutationDispatcher::new(
        InMemoryTaskStore::with_tasks(tasks),
        Duration::from_secs(10),
        64,
    );
    let board = Board::new(session, dispatcher);
    board.load().await.expect("initial load should succeed");
    board
}

/// Ids of one column, top to bottom.
fn column_ids(board: &Board<InMemoryTaskStore>, category: Category) -> Vec<String> {
    board
        .columns()
        .ids(category)
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn draft(title: &str, category: Category) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: String::new(),
        category,
    }
}

// ===========================================================================
// Loading
// ===========================================================================

#[tokio::test]
async fn load_partitions_by_category() {
    let board = loaded_board(vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::Done, 1024.0),
        make_task("c", Category::ToDo, 2048.0),
        make_task("d", Category::InProgress, 3072.0),
    ])
    .await;

    assert_eq!(column_ids(&board, Category::ToDo), ["a", "c"]);
    assert_eq!(column_ids(&board, Category::InProgress), ["d"]);
    assert_eq!(column_ids(&board, Category::Done), ["b"]);
    assert_eq!(board.columns().total(), 4);
}

#[tokio::test]
async fn load_ignores_other_owners() {
    let mut foreign = make_task("x", Category::ToDo, 0.0);
    foreign.owner = "bob@example.com".to_string();
    let board = loaded_board(vec![foreign, make_task("a", Category::ToDo, 1.0)]).await;
    assert_eq!(column_ids(&board, Category::ToDo), ["a"]);
}

// ===========================================================================
// Dragging
// ===========================================================================

#[tokio::test]
async fn drag_onto_empty_column_moves_task() {
    let mut board = loaded_board(vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::ToDo, 1024.0),
    ])
    .await;

    assert!(board.begin_drag(&TaskId::new("a")));
    assert!(board.update_drag_target(DropTarget::Column(Category::InProgress)));
    let ticket = board
        .end_drag(Some(DropTarget::Column(Category::InProgress)))
        .unwrap()
        .expect("a cross-column drop dispatches a write");

    // Optimistic: visible before the store answers.
    assert_eq!(column_ids(&board, Category::ToDo), ["b"]);
    assert_eq!(column_ids(&board, Category::InProgress), ["a"]);

    assert_eq!(ticket.outcome().await, Ok(TaskId::new("a")));
    let stored = board.dispatcher().store().get(&TaskId::new("a")).unwrap();
    assert_eq!(stored.category, Category::InProgress);
    assert_eq!(board.task(&TaskId::new("a")).unwrap().category, Category::InProgress);
}

#[tokio::test]
async fn drag_over_task_in_other_column_lands_above_it() {
    let mut board = loaded_board(vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::Done, 1024.0),
        make_task("c", Category::Done, 2048.0),
    ])
    .await;

    let ticket = board
        .move_task(&TaskId::new("a"), DropTarget::Task(TaskId::new("c")))
        .unwrap()
        .unwrap();
    assert_eq!(column_ids(&board, Category::Done), ["b", "a", "c"]);
    ticket.outcome().await.unwrap();

    let position = board.task(&TaskId::new("a")).unwrap().position.unwrap();
    assert!(position > 1024.0 && position < 2048.0);
    assert_eq!(*board.drag_state(), DragState::Idle);
}

#[tokio::test]
async fn reorder_within_column_follows_array_move() {
    let mut board = loaded_board(vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::ToDo, 1024.0),
        make_task("c", Category::ToDo, 2048.0),
    ])
    .await;

    let ticket = board
        .move_task(&TaskId::new("a"), DropTarget::Task(TaskId::new("c")))
        .unwrap()
        .unwrap();
    assert_eq!(column_ids(&board, Category::ToDo), ["b", "c", "a"]);
    ticket.outcome().await.unwrap();

    // A same-column move only touches the order key.
    let calls = board.dispatcher().store().calls();
    let Some(StoreCall::Patch(id, patch)) = calls.last() else {
        panic!("expected a patch, got {calls:?}");
    };
    assert_eq!(id, &TaskId::new("a"));
    assert_eq!(patch.category, None);
    assert_eq!(patch.position, Some(3072.0));
}

#[tokio::test]
async fn reorder_in_unkeyed_column_survives_reload() {
    let unkeyed = |id: &str| Task {
        position: None,
        ..make_task(id, Category::ToDo, 0.0)
    };
    let mut board = loaded_board(vec![unkeyed("a"), unkeyed("b"), unkeyed("c")]).await;

    board
        .move_task(&TaskId::new("a"), DropTarget::Task(TaskId::new("c")))
        .unwrap()
        .unwrap()
        .outcome()
        .await
        .unwrap();
    assert_eq!(column_ids(&board, Category::ToDo), ["b", "c", "a"]);

    // Every task in the column now carries a key.
    let stored = board.dispatcher().store().tasks();
    assert!(stored.iter().all(|t| t.position.is_some()));

    board.load().await.unwrap();
    assert_eq!(column_ids(&board, Category::ToDo), ["b", "c", "a"]);
}

#[tokio::test]
async fn repeated_drops_into_the_same_gap_keep_order_on_reload() {
    let mut board = loaded_board(vec![
        make_task("a", Category::ToDo, 1024.0),
        make_task("b", Category::ToDo, 2048.0),
        make_task("c", Category::ToDo, 3072.0),
    ])
    .await;

    // Each drop lands right below `a`, halving the gap to its key.
    for _ in 0..60 {
        let ids = board.columns().ids(Category::ToDo);
        board
            .move_task(&ids[2], DropTarget::Task(ids[1].clone()))
            .unwrap()
            .unwrap()
            .outcome()
            .await
            .unwrap();
        assert_eq!(
            board.columns().ids(Category::ToDo),
            [ids[0].clone(), ids[2].clone(), ids[1].clone()]
        );
    }

    let before = column_ids(&board, Category::ToDo);
    let keys: Vec<f64> = board
        .columns()
        .column(Category::ToDo)
        .iter()
        .filter_map(|t| t.position)
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    board.load().await.unwrap();
    assert_eq!(column_ids(&board, Category::ToDo), before);
}

#[tokio::test]
async fn drop_on_itself_changes_nothing() {
    let mut board = loaded_board(vec![make_task("a", Category::ToDo, 0.0)]).await;
    let before = board.columns();

    let ticket = board
        .move_task(&TaskId::new("a"), DropTarget::Task(TaskId::new("a")))
        .unwrap();
    assert!(ticket.is_none());
    assert_eq!(board.columns(), before);
    assert_eq!(board.dispatcher().store().write_count(), 0);
}

#[tokio::test]
async fn cancelled_drag_changes_nothing() {
    let mut board = loaded_board(vec![
        make_task("a", Category::ToDo, 0.0),
        make_task("b", Category::Done, 1.0),
    ])
    .await;

    assert!(board.begin_drag(&TaskId::new("a")));
    board.update_drag_target(DropTarget::Column(Category::Done));
    assert!(board.end_drag(None).unwrap().is_none());
    assert_eq!(column_ids(&board, Category::ToDo), ["a"]);
    assert_eq!(board.dispatcher().store().write_count(), 0);
}

#[tokio::test]
async fn moving_unknown_task_is_rejected() {
    let mut board = loaded_board(vec![]).await;
    let err = board
        .move_task(&TaskId::new("ghost"), DropTarget::Column(Category::Done))
        .unwrap_err();
    assert_eq!(
        err,
        BoardError::Dispatch(DispatchError::UnknownTask(TaskId::new("ghost")))
    );
}

// ===========================================================================
// Add / edit / delete
// ===========================================================================

#[tokio::test]
async fn add_task_adopts_store_id() {
    let board = loaded_board(vec![make_task("a", Category::ToDo, 0.0)]).await;
    let ticket = board.add_task(draft("Write docs", Category::ToDo)).unwrap();
    let client_id = ticket.task_id().clone();
    assert!(board.task(&client_id).is_some());

    let server_id = ticket.outcome().await.unwrap();
    assert_ne!(server_id, client_id);
    // The client id keeps resolving to the committed record.
    assert_eq!(board.task(&client_id).unwrap().id, server_id);

    let task = board.task(&server_id).unwrap();
    assert_eq!(task.title, "Write docs");
    assert_eq!(task.position, Some(1024.0));
    assert_eq!(column_ids(&board, Category::ToDo), ["a", server_id.as_str()]);
}

#[tokio::test]
async fn overlong_title_is_rejected_before_any_store_call() {
    let board = loaded_board(vec![]).await;
    let calls_before = board.dispatcher().store().calls().len();

    let err = board
        .add_task(draft(&"x".repeat(51), Category::ToDo))
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Dispatch(DispatchError::Invalid(ValidationError::TitleTooLong { .. }))
    ));
    assert_eq!(board.dispatcher().store().calls().len(), calls_before);
    assert_eq!(board.columns().total(), 0);
}

#[tokio::test]
async fn fifty_character_title_is_accepted() {
    let board = loaded_board(vec![]).await;
    let ticket = board.add_task(draft(&"x".repeat(50), Category::Done)).unwrap();
    assert!(ticket.outcome().await.is_ok());
    assert_eq!(board.dispatcher().store().tasks().len(), 1);
}

#[tokio::test]
async fn overlong_description_is_rejected() {
    let board = loaded_board(vec![make_task("a", Category::ToDo, 0.0)]).await;
    let err = board
        .edit_task(&TaskId::new("a"), None, Some("d".repeat(201)))
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Dispatch(DispatchError::Invalid(_))
    ));
    assert_eq!(board.dispatcher().store().write_count(), 0);
}

#[tokio::test]
async fn edit_then_delete() {
    let board = loaded_board(vec![make_task("a", Category::ToDo, 0.0)]).await;
    let id = TaskId::new("a");

    let edit = board
        .edit_task(&id, Some("Renamed".to_string()), Some("notes".to_string()))
        .unwrap();
    let delete = board.delete_task(&id).unwrap();
    assert!(board.task(&id).is_none());

    edit.outcome().await.unwrap();
    delete.outcome().await.unwrap();
    assert!(board.dispatcher().store().get(&id).is_none());
    assert_eq!(board.columns().total(), 0);
}
