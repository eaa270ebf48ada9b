//! In-process backend.
//!
//! Keeps users, lists and items in memory. Used for `shoplist bot --in-memory`
//! and as the collaborator in tests. Lists belong to the community of the user
//! that created them, which is looked up on every call so community changes
//! take effect immediately.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Datelike, NaiveDate};

use super::{
    BackendFuture, BoundUser, Item, ListBackend, ListKind, RemoteUser, ShoppingList,
    UserDirectory, UserIdentity,
};
use crate::core::error::{CoreError, CoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    users: Vec<RemoteUser>,
    lists: Vec<(String, ShoppingList)>,
    items: Vec<(i64, Item)>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn community_of(&self, user_id: i64) -> CoreResult<String> {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.community_id.clone())
            .ok_or_else(|| CoreError::not_found(format!("user {user_id}")))
    }

    fn community_lists(&self, community: &str) -> impl Iterator<Item = &ShoppingList> {
        self.lists
            .iter()
            .filter(move |(owner, _)| owner == community)
            .map(|(_, list)| list)
    }

    fn list_exists(&self, list_id: i64) -> bool {
        self.lists.iter().any(|(_, list)| list.id == list_id)
    }
}

/// Shared in-memory store. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// List client acting as `user_id`.
    pub fn scoped(&self, user_id: i64) -> MemoryLists {
        MemoryLists {
            backend: self.clone(),
            user_id,
        }
    }

    /// Creates or finds a user directly, bypassing the directory trait.
    pub fn resolve_user(&self, identity: &UserIdentity, chat_id: i64) -> RemoteUser {
        let mut state = self.state();
        if let Some(user) = state
            .users
            .iter()
            .find(|user| user.telegram_id == identity.user_id)
        {
            return user.clone();
        }
        let id = state.next_id();
        let user = RemoteUser {
            id,
            telegram_id: identity.user_id,
            chat_id,
            username: identity.username.clone(),
            community_id: uuid::Uuid::new_v4().simple().to_string(),
            token: uuid::Uuid::new_v4().simple().to_string(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }
}

impl UserDirectory for MemoryBackend {
    fn resolve_or_create<'a>(
        &'a self,
        identity: &'a UserIdentity,
        chat_id: i64,
    ) -> BackendFuture<'a, BoundUser> {
        Box::pin(async move {
            let user = self.resolve_user(identity, chat_id);
            let lists: Arc<dyn ListBackend> = Arc::new(self.scoped(user.id));
            Ok(BoundUser { user, lists })
        })
    }
}

/// [`ListBackend`] view of a [`MemoryBackend`] for one user.
#[derive(Debug, Clone)]
pub struct MemoryLists {
    backend: MemoryBackend,
    user_id: i64,
}

impl MemoryLists {
    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> CoreResult<T>) -> CoreResult<T> {
        f(&mut self.backend.state())
    }
}

impl ListBackend for MemoryLists {
    fn get_items(&self, list_id: i64) -> BackendFuture<'_, Vec<Item>> {
        let result = self.with_state(|state| {
            if !state.list_exists(list_id) {
                return Err(CoreError::not_found(format!("list {list_id}")));
            }
            Ok(state
                .items
                .iter()
                .filter(|(owner, _)| *owner == list_id)
                .map(|(_, item)| item.clone())
                .collect())
        });
        Box::pin(async move { result })
    }

    fn add_item<'a>(&'a self, list_id: i64, name: &'a str) -> BackendFuture<'a, ()> {
        let result = self.with_state(|state| {
            if !state.list_exists(list_id) {
                return Err(CoreError::not_found(format!("list {list_id}")));
            }
            let id = state.next_id();
            state.items.push((
                list_id,
                Item {
                    id,
                    name: name.to_string(),
                },
            ));
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn remove_items<'a>(&'a self, ids: &'a [i64]) -> BackendFuture<'a, ()> {
        let result = self.with_state(|state| {
            state.items.retain(|(_, item)| !ids.contains(&item.id));
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn get_list(&self, list_id: i64) -> BackendFuture<'_, ShoppingList> {
        let result = self.with_state(|state| {
            state
                .lists
                .iter()
                .find(|(_, list)| list.id == list_id)
                .map(|(_, list)| list.clone())
                .ok_or_else(|| CoreError::not_found(format!("list {list_id}")))
        });
        Box::pin(async move { result })
    }

    fn get_special_list(&self, kind: ListKind) -> BackendFuture<'_, i64> {
        let result = self.with_state(|state| {
            let community = state.community_of(self.user_id)?;
            state
                .community_lists(&community)
                .find(|list| list.kind == kind)
                .map(|list| list.id)
                .ok_or_else(|| CoreError::not_found(format!("special list {kind:?}")))
        });
        Box::pin(async move { result })
    }

    fn create_list_with_kind<'a>(
        &'a self,
        date: NaiveDate,
        name: &'a str,
        kind: ListKind,
    ) -> BackendFuture<'a, i64> {
        let result = self.with_state(|state| {
            let community = state.community_of(self.user_id)?;
            let id = state.next_id();
            state.lists.push((
                community,
                ShoppingList {
                    id,
                    name: name.to_string(),
                    date,
                    kind,
                },
            ));
            Ok(id)
        });
        Box::pin(async move { result })
    }

    fn get_lists_by_day(&self, date: NaiveDate) -> BackendFuture<'_, Vec<ShoppingList>> {
        let result = self.with_state(|state| {
            let community = state.community_of(self.user_id)?;
            Ok(state
                .community_lists(&community)
                .filter(|list| list.kind == ListKind::Regular && list.date == date)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn get_list_days(&self, month: NaiveDate) -> BackendFuture<'_, Vec<u32>> {
        let result = self.with_state(|state| {
            let community = state.community_of(self.user_id)?;
            let days: BTreeSet<u32> = state
                .community_lists(&community)
                .filter(|list| {
                    list.kind == ListKind::Regular
                        && list.date.year() == month.year()
                        && list.date.month() == month.month()
                })
                .map(|list| list.date.day())
                .collect();
            Ok(days.into_iter().collect())
        });
        Box::pin(async move { result })
    }

    fn get_users_by_community<'a>(
        &'a self,
        community_id: &'a str,
    ) -> BackendFuture<'a, Vec<RemoteUser>> {
        let result = self.with_state(|state| {
            Ok(state
                .users
                .iter()
                .filter(|user| user.community_id == community_id)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn get_user_by_telegram_id(&self, telegram_id: i64) -> BackendFuture<'_, RemoteUser> {
        let result = self.with_state(|state| {
            state
                .users
                .iter()
                .find(|user| user.telegram_id == telegram_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found(format!("telegram user {telegram_id}")))
        });
        Box::pin(async move { result })
    }

    fn update_user<'a>(
        &'a self,
        id: i64,
        community_id: Option<&'a str>,
        name: Option<&'a str>,
    ) -> BackendFuture<'a, ()> {
        let result = self.with_state(|state| {
            let user = state
                .users
                .iter_mut()
                .find(|user| user.id == id)
                .ok_or_else(|| CoreError::not_found(format!("user {id}")))?;
            if let Some(community_id) = community_id {
                community_id.clone_into(&mut user.community_id);
            }
            if let Some(name) = name {
                user.username = Some(name.to_string());
            }
            Ok(())
        });
        Box::pin(async move { result })
    }
}
