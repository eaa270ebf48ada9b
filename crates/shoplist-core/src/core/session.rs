//! Per-user sessions with time-based expiry.
//!
//! Each user owns one slot in the table. The slot's async mutex serializes
//! every event of that user, including the first one that creates the
//! backend user record, so concurrent lookups for a new user resolve it once.
//!
//! Expiry is a spawned sleep per slot. Touching a session aborts that task
//! and spawns a new one. Abort-then-spawn is not atomic: a timer that already
//! woke up can still retire the slot right after a lookup returned it. The
//! caller then finishes its event on a detached session and the next event
//! starts a fresh one.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tokio::task::AbortHandle;

use crate::backend::{BoundUser, ListBackend, RemoteUser, UserIdentity, UserDirectory};
use crate::core::error::{CoreError, CoreResult};
use crate::core::selection::SelectionSet;

/// How long a session lives without activity.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(180);

/// State kept for one user between events.
pub struct Session {
    pub user_id: i64,
    pub chat_id: i64,
    pub current_node: String,
    /// Operation last dispatched to `current_node`. Free-text handlers use it
    /// to know which list or day they are looking at.
    pub current_data: String,
    /// Message edited in place by callback renders.
    pub last_message_id: Option<i64>,
    pub user: RemoteUser,
    /// List client scoped to `user`'s access token.
    pub lists: Arc<dyn ListBackend>,
    pub selection: SelectionSet,
}

impl Session {
    pub fn new(user_id: i64, chat_id: i64, start_node: &str, bound: BoundUser) -> Self {
        Self {
            user_id,
            chat_id,
            current_node: start_node.to_string(),
            current_data: String::new(),
            last_message_id: None,
            user: bound.user,
            lists: bound.lists,
            selection: SelectionSet::new(),
        }
    }

    pub fn set_position(&mut self, node: &str, data: &str) {
        node.clone_into(&mut self.current_node);
        data.clone_into(&mut self.current_data);
    }

    /// Moves the session back to `start_node` and drops the selection.
    pub fn reset(&mut self, start_node: &str) {
        self.set_position(start_node, "");
        self.selection.clear();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("chat_id", &self.chat_id)
            .field("current_node", &self.current_node)
            .field("current_data", &self.current_data)
            .field("last_message_id", &self.last_message_id)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a user's session for the duration of one event.
pub type SessionGuard = OwnedMappedMutexGuard<Option<Session>, Session>;

struct Slot {
    session: Arc<AsyncMutex<Option<Session>>>,
    expiry: Mutex<Option<AbortHandle>>,
    retired: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Self {
            session: Arc::new(AsyncMutex::new(None)),
            expiry: Mutex::new(None),
            retired: AtomicBool::new(false),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

type SlotTable = Mutex<HashMap<i64, Arc<Slot>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes `slot` from the table if it is still the registered one.
fn retire(slots: &SlotTable, user_id: i64, slot: &Arc<Slot>) -> bool {
    let mut table = lock(slots);
    if table
        .get(&user_id)
        .is_some_and(|current| Arc::ptr_eq(current, slot))
    {
        table.remove(&user_id);
        slot.retired.store(true, Ordering::SeqCst);
        true
    } else {
        false
    }
}

/// Retires a slot left without a session when its lookup is dropped before
/// finishing, so a cancelled first contact does not leave a slot that never
/// expires.
struct PendingSlot<'a> {
    slots: &'a SlotTable,
    user_id: i64,
    slot: Arc<Slot>,
    settled: bool,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // A lookup holding or waiting for the lock settles the slot itself.
        if let Ok(session) = self.slot.session.try_lock()
            && session.is_none()
            && retire(self.slots, self.user_id, &self.slot)
        {
            tracing::debug!(user_id = self.user_id, "abandoned session slot retired");
        }
    }
}

/// Session table keyed by platform user id.
pub struct SessionStore {
    directory: Arc<dyn UserDirectory>,
    ttl: Duration,
    start_node: String,
    slots: Arc<SlotTable>,
}

impl SessionStore {
    pub fn new(directory: Arc<dyn UserDirectory>, ttl: Duration, start_node: &str) -> Self {
        Self {
            directory,
            ttl,
            start_node: start_node.to_string(),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn start_node(&self) -> &str {
        &self.start_node
    }

    /// Returns the user's session, creating it (and resolving the backend
    /// user) on first contact, and renews its expiry deadline.
    ///
    /// The returned guard holds the user's slot; other events of the same
    /// user wait until it is dropped.
    ///
    /// # Errors
    /// Propagates the user directory error unchanged when creation fails.
    pub async fn get(&self, identity: &UserIdentity, chat_id: i64) -> CoreResult<SessionGuard> {
        let user_id = identity.user_id;
        loop {
            let slot = self.slot_for(user_id);
            let mut pending = PendingSlot {
                slots: &self.slots,
                user_id,
                slot: Arc::clone(&slot),
                settled: false,
            };
            let mut guard = Arc::clone(&slot.session).lock_owned().await;

            if slot.is_retired() {
                let anomaly = CoreError::race_anomaly(user_id);
                tracing::warn!(
                    user_id,
                    kind = %anomaly.kind,
                    "{}; starting fresh",
                    anomaly.message
                );
                continue;
            }

            if guard.is_none() {
                match self.directory.resolve_or_create(identity, chat_id).await {
                    Ok(bound) => {
                        tracing::info!(
                            user_id,
                            chat_id,
                            community_id = %bound.user.community_id,
                            "session created"
                        );
                        *guard = Some(Session::new(user_id, chat_id, &self.start_node, bound));
                    }
                    Err(err) => {
                        retire(&self.slots, user_id, &slot);
                        return Err(err);
                    }
                }
            }

            self.touch(user_id, &slot);
            pending.settled = true;
            return map_guard(guard, user_id);
        }
    }

    /// Whether a live session exists for `user_id`.
    pub fn contains(&self, user_id: i64) -> bool {
        lock(&self.slots).contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_for(&self, user_id: i64) -> Arc<Slot> {
        let mut table = lock(&self.slots);
        Arc::clone(
            table
                .entry(user_id)
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    fn touch(&self, user_id: i64, slot: &Arc<Slot>) {
        let weak: Weak<Slot> = Arc::downgrade(slot);
        let slots = Arc::clone(&self.slots);
        let ttl = self.ttl;
        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(slot) = weak.upgrade()
                && retire(&slots, user_id, &slot)
            {
                tracing::info!(user_id, "session expired");
            }
        });

        let previous = lock(&slot.expiry).replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

fn map_guard(guard: OwnedMutexGuard<Option<Session>>, user_id: i64) -> CoreResult<SessionGuard> {
    OwnedMutexGuard::try_map(guard, Option::as_mut)
        .map_err(|_guard| CoreError::race_anomaly(user_id))
}
