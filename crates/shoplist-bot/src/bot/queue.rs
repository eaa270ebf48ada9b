use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::bot::context::BotContext;
use crate::handlers::update::handle_update;
use crate::telegram::Update;

/// Queue key: Telegram user id. Updates of one user run in order, different
/// users run concurrently.
type QueueKey = i64;

pub(crate) type UserQueueMap = Arc<Mutex<HashMap<QueueKey, mpsc::UnboundedSender<Update>>>>;

pub(crate) fn new_user_queues() -> UserQueueMap {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Routes an update to its sender's queue. Updates from bots, from unknown
/// senders and from users outside the allowlist are dropped.
pub(crate) async fn dispatch_update(
    queues: &UserQueueMap,
    context: &Arc<BotContext>,
    update: Update,
) {
    let Some(user_id) = accepted_sender(context, &update) else {
        return;
    };
    enqueue_update(queues, context, user_id, update).await;
}

fn accepted_sender(context: &BotContext, update: &Update) -> Option<i64> {
    let Some(user) = update.sender() else {
        tracing::debug!(update_id = update.update_id, "ignoring update without sender");
        return None;
    };

    if user.is_bot {
        return None;
    }

    if !context.is_allowed(user.id) {
        tracing::info!(user_id = user.id, "denied user outside allowlist");
        return None;
    }

    Some(user.id)
}

/// Sends while holding the map lock, so a worker retiring under the same lock
/// never drops an update.
async fn enqueue_update(
    queues: &UserQueueMap,
    context: &Arc<BotContext>,
    key: QueueKey,
    update: Update,
) {
    let mut map = queues.lock().await;
    let update = match map.get(&key) {
        Some(sender) => match sender.send(update) {
            Ok(()) => return,
            Err(err) => {
                tracing::warn!(user_id = key, "queue worker gone; starting a new one");
                err.0
            }
        },
        None => update,
    };

    let (sender, receiver) = mpsc::unbounded_channel();
    spawn_queue_worker(
        key,
        receiver,
        sender.clone(),
        Arc::clone(context),
        Arc::clone(queues),
    );
    if sender.send(update).is_err() {
        tracing::error!(user_id = key, "dropping update: new queue worker is gone");
    }
    map.insert(key, sender);
}

/// Processes one user's updates in order. Exits after a session TTL without
/// updates and removes its own map entry.
fn spawn_queue_worker(
    key: QueueKey,
    mut receiver: mpsc::UnboundedReceiver<Update>,
    own_sender: mpsc::UnboundedSender<Update>,
    context: Arc<BotContext>,
    queues: UserQueueMap,
) {
    let idle = context.sessions().ttl();
    tokio::spawn(async move {
        loop {
            match tokio::time::timeout(idle, receiver.recv()).await {
                Ok(Some(update)) => {
                    let update_id = update.update_id;
                    if let Err(err) = handle_update(context.as_ref(), update).await {
                        tracing::error!(
                            user_id = key,
                            update_id,
                            "update handling error: {err:#}"
                        );
                    }
                }
                Ok(None) => break,
                Err(_elapsed) => {
                    let mut map = queues.lock().await;
                    if !receiver.is_empty() {
                        continue;
                    }
                    if map
                        .get(&key)
                        .is_some_and(|sender| sender.same_channel(&own_sender))
                    {
                        map.remove(&key);
                    }
                    tracing::debug!(user_id = key, "idle queue worker stopped");
                    break;
                }
            }
        }
    });
}
