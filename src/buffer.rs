// model = "claude-opus-4-5"
// created = "2026-02-03"
// modified = "2026-02-05"
// driver = "Isaac Clayton"

//! The buffer: fan-out/fan-in coordination around one document.
//!
//! The buffer owns the authoritative `EditNotification` and a version
//! counter. Registering a collaborator spawns one or two worker tasks
//! that loop for the collaborator's whole life:
//!
//! - push worker (async flavor): `next_notification` -> `push`
//! - pull worker (async flavor): `pull` -> `sink_response`
//! - sync worker: `next_notification` -> `edit` -> `sink_response`
//!
//! # Locking
//!
//! The CRDT state is immutable, so only the *reference* to the current
//! state needs protection. `mu` guards that reference plus the version
//! and membership bookkeeping, and is never held across an await. A
//! separate async mutex serializes integrations: the expensive pure
//! fold runs between two short `mu` critical sections, so readers are
//! never blocked behind it.
//!
//! # Wakeups
//!
//! Every state change that could unblock a waiter (version bump,
//! shutdown, membership change) bumps a watch-channel epoch. Waiters
//! re-check their predicate on every epoch change, which is the
//! condition-variable discipline of the locking above.
//!
//! # Shutdown
//!
//! `close` commits `shutdown = true` (waking everyone), then joins all
//! workers. Collaborators observe the flag in their next notification
//! and answer with `done` responses; once every registered collaborator
//! has declared itself quiescent, `next_notification` fails with the
//! shutdown sentinel and the remaining workers unwind.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::collaborator::AsyncCollaborator;
use crate::collaborator::CollaboratorHandle;
use crate::collaborator::SyncCollaborator;
use crate::edit::integrate_response;
use crate::edit::EditNotification;
use crate::edit::EditResponse;

/// Control signal for worker loops.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer is quiescing; the worker should exit its loop.
    #[error("buffer is shutting down")]
    Shutdown,
}

/// Per-collaborator bookkeeping the buffer maintains.
pub struct Registration {
    index: usize,
    handle: CollaboratorHandle,
    marks: Mutex<Marks>,
}

#[derive(Clone, Copy, Default)]
struct Marks {
    last_change: Option<Instant>,
    last_response: Option<Instant>,
    last_request: Option<Instant>,
}

impl Registration {
    fn name(&self) -> &str {
        return self.handle.name();
    }

    fn mark_change(&self) {
        self.marks.lock().expect("marks lock poisoned").last_change = Some(Instant::now());
    }

    fn mark_response(&self) {
        self.marks.lock().expect("marks lock poisoned").last_response = Some(Instant::now());
    }

    fn mark_request(&self) {
        self.marks.lock().expect("marks lock poisoned").last_request = Some(Instant::now());
    }
}

/// Timestamp snapshot for one collaborator, for status display.
#[derive(Clone, Debug)]
pub struct CollaboratorProfile {
    /// The collaborator's stable name.
    pub name: String,
    /// When the buffer last began integrating its work.
    pub last_change: Option<Instant>,
    /// When it last produced a response.
    pub last_response: Option<Instant>,
    /// When it last received a notification.
    pub last_request: Option<Instant>,
}

struct BufferState {
    state: EditNotification,
    version: u64,
    last_used: Instant,
    registrations: Vec<Arc<Registration>>,
    done: HashSet<usize>,
    declared_no_edit: HashSet<usize>,
}

impl BufferState {
    fn all_edits_complete(&self) -> bool {
        return self.state.shutdown
            && self.declared_no_edit.len() == self.registrations.len();
    }
}

struct Shared {
    mu: Mutex<BufferState>,
    /// Serializes integrations so only one response folds at a time.
    update_slot: tokio::sync::Mutex<()>,
    /// Bumped on every wakeup-worthy change; waiters re-check on change.
    epoch: watch::Sender<u64>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, BufferState> {
        return self.mu.lock().expect("buffer lock poisoned");
    }

    fn wake(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    /// Record that a collaborator will never produce work again.
    fn finish(&self, reg: &Registration) {
        {
            let mut st = self.state();
            st.done.insert(reg.index);
            st.declared_no_edit.insert(reg.index);
        }
        self.wake();
        trace!(collaborator = reg.name(), "worker finished");
    }

    /// Block until the buffer has something for this collaborator: a
    /// version it has not processed, or the end of all edits (which
    /// fails with `Shutdown`). New versions are debounced against user
    /// activity before they are handed out.
    async fn next_notification(
        &self,
        reg: &Registration,
        last_processed: &mut u64,
    ) -> Result<EditNotification, BufferError> {
        enum Ready {
            NewVersion,
            Complete,
            Wait,
        }

        let mut epoch_rx = self.epoch.subscribe();
        loop {
            epoch_rx.borrow_and_update();
            let ready = {
                let st = self.state();
                if st.version != *last_processed {
                    Ready::NewVersion
                } else if st.all_edits_complete() {
                    Ready::Complete
                } else {
                    Ready::Wait
                }
            };
            match ready {
                Ready::NewVersion => break,
                Ready::Complete => {
                    self.state().done.insert(reg.index);
                    self.wake();
                    return Err(BufferError::Shutdown);
                }
                Ready::Wait => {
                    let _ = epoch_rx.changed().await;
                }
            }
        }

        // A fresh version. Unless this is the collaborator's first
        // notification, hold it back until the typing burst settles:
        // wait out both the idle floor and the latency floor, looping
        // while the user keeps the document in use. Shutdown cuts the
        // whole wait short.
        let first_saw_change = Instant::now();
        if *last_processed != 0 {
            loop {
                let (last_used_at_start, wait) = {
                    let st = self.state();
                    if st.state.shutdown {
                        break;
                    }
                    let now = Instant::now();
                    let idle_time = now.duration_since(st.last_used);
                    let time_from_change = now.duration_since(first_saw_change);
                    trace!(
                        collaborator = reg.name(),
                        ?idle_time,
                        ?time_from_change,
                        "debouncing"
                    );
                    let wait = std::cmp::max(
                        reg.handle.push_delay_from_idle().saturating_sub(idle_time),
                        reg.handle.push_delay_from_start().saturating_sub(time_from_change),
                    );
                    (st.last_used, wait)
                };
                if timeout(wait, self.shutdown_seen(&mut epoch_rx)).await.is_ok() {
                    break;
                }
                let st = self.state();
                if st.last_used == last_used_at_start || st.state.shutdown {
                    break;
                }
                // still typing; wait out the new burst
            }
        }

        let notification = {
            let st = self.state();
            *last_processed = st.version;
            reg.mark_request();
            st.state.clone()
        };
        debug!(collaborator = reg.name(), version = *last_processed, "notify");
        return Ok(notification);
    }

    /// Resolve once `shutdown` is set. Used only under a timeout.
    async fn shutdown_seen(&self, epoch_rx: &mut watch::Receiver<u64>) {
        loop {
            epoch_rx.borrow_and_update();
            if self.state().state.shutdown {
                return;
            }
            if epoch_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Serialized mutation of the authoritative state. The fold `f` is
    /// pure and runs outside `mu`; commit installs the result, bumps
    /// the version, and re-snapshots which collaborators can claim "no
    /// edits past this point" (only those already done).
    async fn update_state<F>(&self, reg: Option<&Registration>, become_used: bool, f: F)
    where
        F: FnOnce(&mut EditNotification),
    {
        let _slot = self.update_slot.lock().await;
        let mut local = {
            let st = self.state();
            if let Some(reg) = reg {
                reg.mark_change();
            }
            st.state.clone()
        };

        f(&mut local);

        {
            let mut st = self.state();
            st.version += 1;
            st.declared_no_edit = st.done.clone();
            st.state = local;
            if become_used {
                st.last_used = Instant::now();
            }
        }
        self.wake();
    }

    /// Fold a collaborator's response into the buffer. Update-bearing
    /// responses advance the version; empty ones only record that the
    /// collaborator has nothing to add to the version it saw. A `done`
    /// response additionally retires the collaborator and fails with
    /// `Shutdown` so its worker loop exits.
    async fn sink_response(
        &self,
        reg: &Registration,
        response: EditResponse,
    ) -> Result<(), BufferError> {
        reg.mark_response();

        if response.has_updates() {
            debug!(collaborator = reg.name(), "integrating");
            self.update_state(Some(reg), response.become_used, |state| {
                integrate_response(&response, state);
            })
            .await;
        } else {
            trace!(collaborator = reg.name(), "empty update");
            {
                let mut st = self.state();
                if response.become_used {
                    st.last_used = Instant::now();
                }
                st.declared_no_edit.insert(reg.index);
            }
            self.wake();
        }

        if response.done {
            self.finish(reg);
            return Err(BufferError::Shutdown);
        }
        return Ok(());
    }
}

/// A live, shared document and the workers that feed it.
///
/// Must be created and used inside a tokio runtime. Call [`Buffer::close`]
/// for an orderly shutdown; a buffer dropped without closing aborts its
/// workers.
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    /// Create an empty buffer with no collaborators.
    pub fn new() -> Buffer {
        let (epoch, _) = watch::channel(0u64);
        // Treat a fresh buffer as long idle so the first real edit is
        // delivered without an idle wait.
        let last_used = Instant::now()
            .checked_sub(Duration::from_secs(1_000_000))
            .unwrap_or_else(Instant::now);
        return Buffer {
            shared: Arc::new(Shared {
                mu: Mutex::new(BufferState {
                    state: EditNotification::new(),
                    version: 0,
                    last_used,
                    registrations: Vec::new(),
                    done: HashSet::new(),
                    declared_no_edit: HashSet::new(),
                }),
                update_slot: tokio::sync::Mutex::new(()),
                epoch,
                workers: Mutex::new(Vec::new()),
            }),
        };
    }

    /// Register a push/pull collaborator and spawn its two workers.
    pub fn add_async(&self, collaborator: Arc<dyn AsyncCollaborator>) {
        let reg = self.register(CollaboratorHandle::Async(collaborator.clone()));

        let shared = self.shared.clone();
        let push_reg = reg.clone();
        let push_collaborator = collaborator.clone();
        self.spawn(async move {
            run_push(&shared, &push_reg, &*push_collaborator).await;
            shared.finish(&push_reg);
        });

        let shared = self.shared.clone();
        self.spawn(async move {
            run_pull(&shared, &reg, &*collaborator).await;
            shared.finish(&reg);
        });
    }

    /// Register a request/response collaborator and spawn its worker.
    pub fn add_sync(&self, collaborator: Arc<dyn SyncCollaborator>) {
        let reg = self.register(CollaboratorHandle::Sync(collaborator.clone()));

        let shared = self.shared.clone();
        self.spawn(async move {
            run_sync(&shared, &reg, &*collaborator).await;
            shared.finish(&reg);
        });
    }

    /// The current version. Strictly increases by one per integrated
    /// update.
    pub fn version(&self) -> u64 {
        return self.shared.state().version;
    }

    /// A snapshot of the authoritative state.
    pub fn snapshot(&self) -> EditNotification {
        return self.shared.state().state.clone();
    }

    /// Timestamp bookkeeping for every registered collaborator.
    pub fn profile(&self) -> Vec<CollaboratorProfile> {
        let st = self.shared.state();
        return st
            .registrations
            .iter()
            .map(|reg| {
                let marks = *reg.marks.lock().expect("marks lock poisoned");
                return CollaboratorProfile {
                    name: reg.name().to_string(),
                    last_change: marks.last_change,
                    last_response: marks.last_response,
                    last_request: marks.last_request,
                };
            })
            .collect();
    }

    /// Quiesce: commit the shutdown flag, then join every worker. All
    /// collaborators are given the chance to answer the shutdown
    /// notification with their final response.
    pub async fn close(&self) {
        debug!("buffer closing");
        self.shared
            .update_state(None, false, |state| state.shutdown = true)
            .await;
        let workers: Vec<JoinHandle<()>> = {
            let mut workers = self.shared.workers.lock().expect("workers lock poisoned");
            workers.drain(..).collect()
        };
        for worker in workers {
            let _ = worker.await;
        }
        debug!("buffer closed");
    }

    fn register(&self, handle: CollaboratorHandle) -> Arc<Registration> {
        let reg = {
            let mut st = self.shared.state();
            let reg = Arc::new(Registration {
                index: st.registrations.len(),
                handle,
                marks: Mutex::new(Marks::default()),
            });
            st.registrations.push(reg.clone());
            reg
        };
        // membership affects the quiescence predicate
        self.shared.wake();
        debug!(collaborator = reg.name(), "registered");
        return reg;
    }

    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.shared
            .workers
            .lock()
            .expect("workers lock poisoned")
            .push(handle);
    }
}

impl Default for Buffer {
    fn default() -> Self {
        return Self::new();
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // close() drains the list; anything left here was not given an
        // orderly shutdown.
        if let Ok(mut workers) = self.shared.workers.lock() {
            for worker in workers.drain(..) {
                worker.abort();
            }
        }
    }
}

async fn run_push(shared: &Shared, reg: &Registration, collaborator: &dyn AsyncCollaborator) {
    let mut last_processed = 0u64;
    loop {
        let notification = match shared.next_notification(reg, &mut last_processed).await {
            Ok(notification) => notification,
            Err(BufferError::Shutdown) => return,
        };
        if let Err(error) = collaborator.push(notification).await {
            warn!(collaborator = reg.name(), error = %error, "push broke");
            return;
        }
    }
}

async fn run_pull(shared: &Shared, reg: &Registration, collaborator: &dyn AsyncCollaborator) {
    loop {
        let response = match collaborator.pull().await {
            Ok(response) => response,
            Err(error) => {
                warn!(collaborator = reg.name(), error = %error, "pull broke");
                return;
            }
        };
        match shared.sink_response(reg, response).await {
            Ok(()) => {}
            Err(BufferError::Shutdown) => return,
        }
    }
}

async fn run_sync(shared: &Shared, reg: &Registration, collaborator: &dyn SyncCollaborator) {
    let mut last_processed = 0u64;
    loop {
        let notification = match shared.next_notification(reg, &mut last_processed).await {
            Ok(notification) => notification,
            Err(BufferError::Shutdown) => return,
        };
        let response = match collaborator.edit(notification).await {
            Ok(response) => response,
            Err(error) => {
                warn!(collaborator = reg.name(), error = %error, "edit broke");
                return;
            }
        };
        match shared.sink_response(reg, response).await {
            Ok(()) => {}
            Err(BufferError::Shutdown) => return,
        }
    }
}
