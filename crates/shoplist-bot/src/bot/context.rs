use std::collections::HashSet;

use shoplist_core::core::{Router, SessionStore};

use crate::telegram::TelegramClient;

pub(crate) struct BotContext {
    client: TelegramClient,
    sessions: SessionStore,
    router: Router,
    allowlist_user_ids: HashSet<i64>,
    debug_tokens: bool,
}

impl BotContext {
    pub(crate) fn new(
        client: TelegramClient,
        sessions: SessionStore,
        router: Router,
        allowlist_user_ids: HashSet<i64>,
        debug_tokens: bool,
    ) -> Self {
        Self {
            client,
            sessions,
            router,
            allowlist_user_ids,
            debug_tokens,
        }
    }

    pub(crate) fn client(&self) -> &TelegramClient {
        &self.client
    }

    pub(crate) fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(crate) fn router(&self) -> &Router {
        &self.router
    }

    /// Whether `user_id` may use the bot. An empty allowlist admits everyone.
    pub(crate) fn is_allowed(&self, user_id: i64) -> bool {
        self.allowlist_user_ids.is_empty() || self.allowlist_user_ids.contains(&user_id)
    }

    pub(crate) fn debug_tokens(&self) -> bool {
        self.debug_tokens
    }
}
