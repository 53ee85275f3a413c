//! Mutation dispatcher: optimistic apply, per-task FIFO writes, rollback.
//!
//! Each task with unacknowledged mutations owns a *lane*: the last state
//! the store acknowledged for that task (its baseline) plus the queue of
//! mutations not yet settled. The cache always equals every lane's
//! baseline with its queue replayed on top. Only the head of a lane is in
//! flight; one worker task drains a lane front to back.
//!
//! When a write settles, the baseline is restored, the head is folded in
//! (success) or discarded (failure), and the rest of the queue is replayed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use taskorbit_proto::{Task, TaskId};

use super::mutation::{Mutation, MutationKind, WriteOutcome};
use super::{DispatchError, FetchError, MutationTicket, SyncError, SyncEvent};
use crate::board::cache::{Anchor, TaskCache};
use crate::board::partition::{Columns, partition};
use crate::store::TaskStore;

/// A task's record and display slot, or its absence.
#[derive(Debug, Clone)]
struct Slot {
    task: Option<Task>,
    anchor: Anchor,
}

impl Slot {
    fn capture(cache: &TaskCache, id: &TaskId) -> Self {
        Self {
            task: cache.get(id).cloned(),
            anchor: cache.slot_of(id).flatten(),
        }
    }

    fn restore(&self, cache: &mut TaskCache, id: &TaskId) {
        match &self.task {
            Some(task) => cache.place_before(task.clone(), self.anchor.as_ref()),
            None => {
                cache.remove(id);
            }
        }
    }
}

#[derive(Debug)]
struct Pending {
    mutation: Mutation,
    reply: oneshot::Sender<Result<TaskId, SyncError>>,
}

#[derive(Debug)]
struct Lane {
    baseline: Slot,
    pending: VecDeque<Pending>,
}

/// A mutation whose write has settled, ready to be reported.
struct Settled {
    reply: oneshot::Sender<Result<TaskId, SyncError>>,
    kind: MutationKind,
    task_id: TaskId,
    result: Result<TaskId, SyncError>,
}

#[derive(Debug, Default)]
struct State {
    cache: TaskCache,
    /// Task ID -> lane, for tasks with unsettled mutations.
    lanes: HashMap<TaskId, Lane>,
    /// Client-generated ID -> store-assigned ID, for committed creates
    /// whose task still exists.
    aliases: HashMap<TaskId, TaskId>,
}

impl State {
    /// Replaces the cache with fetched records and replays every lane.
    fn rebase(&mut self, tasks: Vec<Task>) {
        self.cache.replace_all(tasks);
        let Self {
            cache,
            lanes,
            aliases,
        } = self;
        aliases.retain(|_, id| cache.contains(id) || lanes.contains_key(id));
        for (id, lane) in lanes.iter_mut() {
            lane.baseline = Slot::capture(cache, id);
        }
        for lane in lanes.values() {
            for pending in &lane.pending {
                pending.mutation.apply(cache);
            }
        }
    }

    /// Settles the head of the lane under `key` with `result`.
    ///
    /// Returns the settled mutations and the key the lane continues under,
    /// or `None` if the lane is drained.
    fn settle(
        &mut self,
        key: &TaskId,
        result: Result<WriteOutcome, SyncError>,
    ) -> (Vec<Settled>, Option<TaskId>) {
        let Some(mut lane) = self.lanes.remove(key) else {
            return (Vec::new(), None);
        };
        let Some(head) = lane.pending.pop_front() else {
            return (Vec::new(), None);
        };
        let kind = head.mutation.kind();
        let mut key = key.clone();
        let mut settled = Vec::new();

        match result {
            Ok(WriteOutcome::Created(assigned)) if kind == MutationKind::Create => {
                // A load may already have brought in the stored record.
                let committed = self.cache.get(&assigned).cloned().or_else(|| {
                    let Mutation::Create { task } = &head.mutation else {
                        return None;
                    };
                    let mut task = task.clone();
                    task.id = assigned.clone();
                    Some(task)
                });
                self.cache.rekey(&key, &assigned);
                for pending in &mut lane.pending {
                    pending.mutation.retarget(&assigned);
                }
                self.retarget_anchors(&key, &assigned);
                self.aliases.insert(key, assigned.clone());
                lane.baseline = Slot {
                    task: committed,
                    anchor: self.cache.slot_of(&assigned).flatten(),
                };
                key = assigned;
                settled.push(Settled::ok(head, &key));
            }
            Ok(_) => {
                lane.baseline.restore(&mut self.cache, &key);
                head.mutation.apply(&mut self.cache);
                lane.baseline = Slot::capture(&self.cache, &key);
                if kind == MutationKind::Delete {
                    self.aliases.retain(|_, id| *id != key);
                }
                settled.push(Settled::ok(head, &key));
            }
            Err(error) => {
                settled.push(Settled::failed(head, &key, error.clone()));
                // Everything queued behind a failed create targets a task
                // the store never saw.
                if kind == MutationKind::Create {
                    settled.extend(
                        lane.pending
                            .drain(..)
                            .map(|p| Settled::failed(p, &key, error.clone())),
                    );
                }
            }
        }

        lane.baseline.restore(&mut self.cache, &key);
        for pending in &lane.pending {
            pending.mutation.apply(&mut self.cache);
        }

        if lane.pending.is_empty() {
            (settled, None)
        } else {
            self.lanes.insert(key.clone(), lane);
            (settled, Some(key))
        }
    }

    /// Points every queued anchor and saved slot that names `old` at `new`.
    fn retarget_anchors(&mut self, old: &TaskId, new: &TaskId) {
        for lane in self.lanes.values_mut() {
            if lane.baseline.anchor.as_ref() == Some(old) {
                lane.baseline.anchor = Some(new.clone());
            }
            for pending in &mut lane.pending {
                pending.mutation.retarget_anchor(old, new);
            }
        }
    }
}

impl Settled {
    fn ok(pending: Pending, task_id: &TaskId) -> Self {
        Self {
            reply: pending.reply,
            kind: pending.mutation.kind(),
            task_id: task_id.clone(),
            result: Ok(task_id.clone()),
        }
    }

    fn failed(pending: Pending, task_id: &TaskId, error: SyncError) -> Self {
        Self {
            reply: pending.reply,
            kind: pending.mutation.kind(),
            task_id: task_id.clone(),
            result: Err(error),
        }
    }
}

struct Shared<S> {
    state: Mutex<State>,
    store: S,
    events: mpsc::Sender<SyncEvent>,
    write_timeout: Duration,
}

impl<S> Shared<S> {
    fn report(&self, settled: Settled) {
        let event = match &settled.result {
            Ok(task_id) => {
                tracing::debug!(%task_id, kind = %settled.kind, "mutation committed");
                SyncEvent::Committed {
                    task_id: task_id.clone(),
                    kind: settled.kind,
                }
            }
            Err(error) => {
                tracing::warn!(
                    task_id = %settled.task_id,
                    kind = %settled.kind,
                    error = %error,
                    "mutation rolled back"
                );
                SyncEvent::RolledBack {
                    task_id: settled.task_id.clone(),
                    kind: settled.kind,
                    error: error.clone(),
                }
            }
        };
        // Receivers may be gone (view torn down); that is fine.
        let _ = settled.reply.send(settled.result);
        let _ = self.events.try_send(event);
    }
}

/// Applies mutations optimistically and writes them to a [`TaskStore`].
///
/// Cloning yields another handle to the same cache and queues.
pub struct MutationDispatcher<S: TaskStore + 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: TaskStore + 'static> Clone for MutationDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: TaskStore + 'static> MutationDispatcher<S> {
    /// Creates a dispatcher over `store` with an empty cache.
    ///
    /// Each remote call is bounded by `write_timeout`. Returns the
    /// dispatcher and a receiver for [`SyncEvent`]s.
    pub fn new(
        store: S,
        write_timeout: Duration,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (events, event_rx) = mpsc::channel(event_buffer.max(1));
        let dispatcher = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                store,
                events,
                write_timeout,
            }),
        };
        (dispatcher, event_rx)
    }

    /// The store writes go to.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Fetches `owner`'s tasks and replaces the cache with them.
    ///
    /// Mutations still in flight are replayed on top of the fetched
    /// records. Returns the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the store fails or times out; the cache is
    /// left unchanged.
    pub async fn load(&self, owner: &str) -> Result<Vec<Task>, FetchError> {
        let timeout = self.shared.write_timeout;
        let tasks = tokio::time::timeout(timeout, self.shared.store.fetch_by_owner(owner))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;
        tracing::debug!(owner, count = tasks.len(), "tasks loaded");

        let mut state = self.shared.state.lock();
        state.rebase(tasks);
        Ok(state.cache.snapshot())
    }

    /// Applies `mutation` to the cache and queues its remote write.
    ///
    /// Returns as soon as the optimistic effect is visible. The write runs
    /// after any earlier mutation of the same task has settled. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Invalid`] if field rules fail (nothing is sent).
    /// - [`DispatchError::UnknownTask`] if the target is not in the cache.
    /// - [`DispatchError::DuplicateTask`] if a create reuses a known id.
    pub fn dispatch(&self, mut mutation: Mutation) -> Result<MutationTicket, DispatchError> {
        mutation.validate()?;
        let (reply, rx) = oneshot::channel();

        let (key, idle) = {
            let mut state = self.shared.state.lock();
            if let Some(assigned) = state.aliases.get(mutation.task_id()).cloned() {
                mutation.retarget(&assigned);
            }
            let key = mutation.task_id().clone();
            let known = state.lanes.contains_key(&key) || state.cache.contains(&key);
            match (mutation.kind(), known) {
                (MutationKind::Create, true) => return Err(DispatchError::DuplicateTask(key)),
                (MutationKind::Create, false) | (_, true) => {}
                (_, false) => return Err(DispatchError::UnknownTask(key)),
            }

            let State { cache, lanes, .. } = &mut *state;
            let lane = lanes.entry(key.clone()).or_insert_with(|| Lane {
                baseline: Slot::capture(cache, &key),
                pending: VecDeque::new(),
            });
            mutation.apply(cache);
            let idle = lane.pending.is_empty();
            tracing::debug!(
                task_id = %key,
                kind = %mutation.kind(),
                queued = lane.pending.len(),
                "mutation applied"
            );
            lane.pending.push_back(Pending { mutation, reply });
            (key, idle)
        };

        if idle {
            tokio::spawn(run_lane(Arc::clone(&self.shared), key.clone()));
        }
        Ok(MutationTicket::new(key, rx))
    }

    /// Every cached task in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.shared.state.lock().cache.snapshot()
    }

    /// The cache partitioned into board columns.
    #[must_use]
    pub fn columns(&self) -> Columns {
        partition(&self.snapshot())
    }

    /// The cached record for `id`, following create aliases.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        let state = self.shared.state.lock();
        let id = state.aliases.get(id).unwrap_or(id);
        state.cache.get(id).cloned()
    }

    /// A copy of the whole cache.
    #[must_use]
    pub fn cache(&self) -> TaskCache {
        self.shared.state.lock().cache.clone()
    }

    /// Number of unsettled mutations for `id`, the in-flight one included.
    #[must_use]
    pub fn pending_count(&self, id: &TaskId) -> usize {
        let state = self.shared.state.lock();
        let id = state.aliases.get(id).unwrap_or(id);
        state.lanes.get(id).map_or(0, |lane| lane.pending.len())
    }

    /// Returns `true` when no write is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.state.lock().lanes.is_empty()
    }
}

/// Drains the lane under `key`, one write at a time.
async fn run_lane<S: TaskStore + 'static>(shared: Arc<Shared<S>>, mut key: TaskId) {
    loop {
        let write = {
            let state = shared.state.lock();
            match state.lanes.get(&key).and_then(|lane| lane.pending.front()) {
                Some(head) => head.mutation.remote_write(),
                None => return,
            }
        };

        let result = match tokio::time::timeout(shared.write_timeout, write.send(&shared.store))
            .await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::Timeout(shared.write_timeout)),
        };

        let (settled, next) = shared.state.lock().settle(&key, result);
        for item in settled {
            shared.report(item);
        }
        match next {
            Some(next) => key = next,
            None => return,
        }
    }
}
