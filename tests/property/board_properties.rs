//! Property-based tests for the board's pure parts.
//!
//! Properties tested:
//! - Partitioning is a stable, exhaustive split by category.
//! - A drop inside one column keeps every column's size.
//! - A drop into another column moves exactly one task and keeps the total.
//! - Repeated upserts of one id leave exactly one cache entry.
//! - Order keys from `position_between` stay strictly between their neighbours.
//! - After a drop, the destination column's keys increase in display order,
//!   even when some tasks had no key before.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use taskorbit::board::drag::position_between;
use taskorbit::board::{DragController, DragOutcome, DropTarget, TaskCache, partition};
use taskorbit::sync::Mutation;
use taskorbit_proto::{Category, Task, TaskId};

// --- Strategies ---

/// Strategy for generating an arbitrary `Category`.
fn arb_category() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::ToDo),
        Just(Category::InProgress),
        Just(Category::Done),
    ]
}

fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

/// Strategy for generating a board of 1..24 tasks with distinct ids and
/// increasing order keys.
fn arb_board() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec((arb_category(), "[a-z ]{1,20}"), 1..24).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (category, title))| Task {
                id: TaskId::new(format!("t{i}")),
                title,
                description: String::new(),
                category,
                owner: "ada@example.com".to_string(),
                author: "Ada".to_string(),
                timestamp: fixed_timestamp(),
                status: "pending".to_string(),
                position: Some(f64::from(u32::try_from(i).unwrap_or(u32::MAX)) * 1024.0),
            })
            .collect()
    })
}

/// Strategy for a board plus a task to drag and a drop target on it.
fn arb_drop() -> impl Strategy<Value = (Vec<Task>, usize, DropTarget)> {
    arb_board().prop_flat_map(|tasks| {
        let len = tasks.len();
        let target = prop_oneof![
            (0..len).prop_map(|i| DropTarget::Task(TaskId::new(format!("t{i}")))),
            arb_category().prop_map(DropTarget::Column),
        ];
        (Just(tasks), 0..len, target)
    })
}

/// Applies a completed drag to a cache built from `tasks`.
fn drop_into_cache(tasks: &[Task], dragged: usize, target: DropTarget) -> (TaskCache, DragOutcome) {
    let mut cache = TaskCache::new();
    cache.replace_all(tasks.to_vec());
    let columns = partition(&cache.snapshot());
    let mut drag = DragController::new();
    assert!(drag.begin_drag(&tasks[dragged].id, &columns));
    drag.update_drag_target(target.clone());
    let outcome = drag.end_drag(Some(target), &columns);
    if let DragOutcome::Moved(transition) = &outcome {
        for rekey in Mutation::rekeys(transition) {
            rekey.apply(&mut cache);
        }
        Mutation::from_transition(transition).apply(&mut cache);
    }
    (cache, outcome)
}

fn column_sizes(cache: &TaskCache) -> [usize; 3] {
    let columns = partition(&cache.snapshot());
    Category::ALL.map(|c| columns.column(c).len())
}

// --- Property tests ---

proptest! {
    /// Every task lands in its own category's column, in input order.
    #[test]
    fn partition_is_stable_and_exhaustive(tasks in arb_board()) {
        let columns = partition(&tasks);
        prop_assert_eq!(columns.total(), tasks.len());
        for category in Category::ALL {
            let expected: Vec<TaskId> = tasks
                .iter()
                .filter(|t| t.category == category)
                .map(|t| t.id.clone())
                .collect();
            prop_assert_eq!(columns.ids(category), expected);
        }
    }

    /// Dropping within the origin column never changes column sizes.
    #[test]
    fn same_column_drop_keeps_sizes((tasks, dragged, target) in arb_drop()) {
        let origin = tasks[dragged].category;
        let same_column = match &target {
            DropTarget::Column(c) => *c == origin,
            DropTarget::Task(id) => tasks.iter().any(|t| &t.id == id && t.category == origin),
        };
        prop_assume!(same_column);

        let mut before = TaskCache::new();
        before.replace_all(tasks.clone());
        let (after, _) = drop_into_cache(&tasks, dragged, target);
        prop_assert_eq!(column_sizes(&after), column_sizes(&before));
        prop_assert_eq!(after.len(), tasks.len());
    }

    /// A drop into another column moves one task there and keeps the total.
    #[test]
    fn cross_column_drop_moves_one_task((tasks, dragged, target) in arb_drop()) {
        let origin = tasks[dragged].category;
        let destination = match &target {
            DropTarget::Column(c) => *c,
            DropTarget::Task(id) => tasks
                .iter()
                .find(|t| &t.id == id)
                .map_or(origin, |t| t.category),
        };
        prop_assume!(destination != origin);

        let mut before = TaskCache::new();
        before.replace_all(tasks.clone());
        let sizes_before = column_sizes(&before);
        let (after, outcome) = drop_into_cache(&tasks, dragged, target);
        prop_assert!(matches!(outcome, DragOutcome::Moved(_)), "expected a move");

        let sizes_after = column_sizes(&after);
        prop_assert_eq!(sizes_after[origin.index()], sizes_before[origin.index()] - 1);
        prop_assert_eq!(sizes_after[destination.index()], sizes_before[destination.index()] + 1);
        prop_assert_eq!(after.len(), tasks.len());
        prop_assert_eq!(after.get(&tasks[dragged].id).map(|t| t.category), Some(destination));
    }

    /// However many times one id is upserted, the snapshot holds it once.
    #[test]
    fn upsert_keeps_one_entry_per_id(
        tasks in arb_board(),
        titles in prop::collection::vec("[a-z]{1,10}", 1..8),
    ) {
        let mut cache = TaskCache::new();
        cache.replace_all(tasks.clone());
        let mut target = tasks[0].clone();
        for title in &titles {
            target.title.clone_from(title);
            cache.upsert(target.clone());
        }
        let snapshot = cache.snapshot();
        prop_assert_eq!(snapshot.len(), tasks.len());
        prop_assert_eq!(snapshot.iter().filter(|t| t.id == target.id).count(), 1);
        prop_assert_eq!(cache.get(&target.id).map(|t| t.title.clone()), titles.last().cloned());
    }

    /// Keys written by a drop reproduce the displayed destination order.
    #[test]
    fn destination_keys_follow_display_order(
        (tasks, dragged, target) in arb_drop(),
        unkeyed in prop::collection::vec(any::<bool>(), 24),
    ) {
        let tasks: Vec<Task> = tasks
            .into_iter()
            .zip(unkeyed)
            .map(|(t, drop_key)| Task {
                position: if drop_key { None } else { t.position },
                ..t
            })
            .collect();
        let (after, outcome) = drop_into_cache(&tasks, dragged, target);
        let DragOutcome::Moved(transition) = outcome else {
            return Ok(());
        };
        let keys: Vec<Option<f64>> = partition(&after.snapshot())
            .column(transition.to.category)
            .iter()
            .map(|t| t.position)
            .collect();
        prop_assert!(keys.iter().all(Option::is_some), "unkeyed task left: {:?}", keys);
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys out of order: {:?}", keys);
    }

    /// A key between two distinct neighbours lies strictly between them.
    #[test]
    fn position_between_stays_inside(a in -1.0e9f64..1.0e9, gap in 1.0e-3f64..1.0e6) {
        let b = a + gap;
        let mid = position_between(Some(a), Some(b));
        prop_assert!(a < mid && mid < b, "{} !< {} !< {}", a, mid, b);
        prop_assert!(position_between(Some(a), None) > a);
        prop_assert!(position_between(None, Some(a)) < a);
    }
}
