use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{
    BackendFuture, BoundUser, ListBackend, MemoryBackend, UserDirectory, UserIdentity,
};
use crate::core::error::CoreError;

pub(crate) fn identity(user_id: i64) -> UserIdentity {
    UserIdentity {
        user_id,
        username: Some(format!("user{user_id}")),
    }
}

/// Directory over a [`MemoryBackend`] that counts calls and can be slowed
/// down or made to fail.
pub(crate) struct FakeDirectory {
    backend: MemoryBackend,
    attempts: AtomicUsize,
    creations: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl FakeDirectory {
    pub(crate) fn new() -> Self {
        Self {
            backend: MemoryBackend::new(),
            attempts: AtomicUsize::new(0),
            creations: AtomicUsize::new(0),
            delay: None,
            fail: false,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions bound, i.e. successful resolutions.
    pub(crate) fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

impl UserDirectory for FakeDirectory {
    fn resolve_or_create<'a>(
        &'a self,
        identity: &'a UserIdentity,
        chat_id: i64,
    ) -> BackendFuture<'a, BoundUser> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CoreError::transport("backend unreachable"));
            }
            let user = self.backend.resolve_user(identity, chat_id);
            self.creations.fetch_add(1, Ordering::SeqCst);
            let lists: Arc<dyn ListBackend> = Arc::new(self.backend.scoped(user.id));
            Ok(BoundUser { user, lists })
        })
    }
}
