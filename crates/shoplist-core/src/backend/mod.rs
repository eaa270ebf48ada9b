//! List-backend collaborator.
//!
//! The bot never talks to storage directly. Everything goes through the
//! [`ListBackend`] and [`UserDirectory`] seams so the routing core can be
//! driven by the REST client in production and by fakes in tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::error::CoreResult;

mod memory;
mod rest;

pub use memory::{MemoryBackend, MemoryLists};
pub use rest::{RestBackend, RestSettings};

/// Boxed future returned by collaborator calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = CoreResult<T>> + Send + 'a>>;

/// Kind of a shopping list. Checklist and current list are singletons per
/// community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "i64", into = "i64")]
pub enum ListKind {
    #[default]
    Regular,
    Checklist,
    CurrentList,
}

impl From<i64> for ListKind {
    fn from(value: i64) -> Self {
        match value {
            1 => ListKind::Checklist,
            2 => ListKind::CurrentList,
            _ => ListKind::Regular,
        }
    }
}

impl From<ListKind> for i64 {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Regular => 0,
            ListKind::Checklist => 1,
            ListKind::CurrentList => 2,
        }
    }
}

/// User record held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    pub telegram_id: i64,
    pub chat_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub community_id: String,
    /// Access token scoping list calls made on behalf of this user.
    #[serde(default)]
    pub token: String,
}

impl RemoteUser {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("no username")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub kind: ListKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

/// Platform identity of the sender of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: i64,
    pub username: Option<String>,
}

/// A resolved user together with a list client scoped to their token.
#[derive(Clone)]
pub struct BoundUser {
    pub user: RemoteUser,
    pub lists: Arc<dyn ListBackend>,
}

impl std::fmt::Debug for BoundUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundUser")
            .field("user_id", &self.user.id)
            .field("community_id", &self.user.community_id)
            .finish_non_exhaustive()
    }
}

/// Resolves the backend user for a platform identity, creating it on first
/// contact. Failures propagate unchanged; callers do not retry.
pub trait UserDirectory: Send + Sync {
    fn resolve_or_create<'a>(
        &'a self,
        identity: &'a UserIdentity,
        chat_id: i64,
    ) -> BackendFuture<'a, BoundUser>;
}

/// List operations, already scoped to one user's access token.
pub trait ListBackend: Send + Sync {
    fn get_items(&self, list_id: i64) -> BackendFuture<'_, Vec<Item>>;

    fn add_item<'a>(&'a self, list_id: i64, name: &'a str) -> BackendFuture<'a, ()>;

    fn remove_items<'a>(&'a self, ids: &'a [i64]) -> BackendFuture<'a, ()>;

    fn get_list(&self, list_id: i64) -> BackendFuture<'_, ShoppingList>;

    /// Id of the community's special list of `kind`.
    fn get_special_list(&self, kind: ListKind) -> BackendFuture<'_, i64>;

    fn create_list_with_kind<'a>(
        &'a self,
        date: NaiveDate,
        name: &'a str,
        kind: ListKind,
    ) -> BackendFuture<'a, i64>;

    fn get_lists_by_day(&self, date: NaiveDate) -> BackendFuture<'_, Vec<ShoppingList>>;

    /// Days of the month containing `month` that have at least one list.
    fn get_list_days(&self, month: NaiveDate) -> BackendFuture<'_, Vec<u32>>;

    fn get_users_by_community<'a>(
        &'a self,
        community_id: &'a str,
    ) -> BackendFuture<'a, Vec<RemoteUser>>;

    fn get_user_by_telegram_id(&self, telegram_id: i64) -> BackendFuture<'_, RemoteUser>;

    fn update_user<'a>(
        &'a self,
        id: i64,
        community_id: Option<&'a str>,
        name: Option<&'a str>,
    ) -> BackendFuture<'a, ()>;
}

/// Returns the id of the special list of `kind`, creating it dated `today`
/// when the backend has none.
///
/// # Errors
/// Propagates backend errors other than `NotFound`.
pub async fn ensure_special_list(
    lists: &dyn ListBackend,
    kind: ListKind,
    name: &str,
    today: NaiveDate,
) -> CoreResult<i64> {
    match lists.get_special_list(kind).await {
        Ok(id) => Ok(id),
        Err(err) if err.is_not_found() => {
            tracing::info!(?kind, "creating missing special list");
            lists.create_list_with_kind(today, name, kind).await
        }
        Err(err) => Err(err),
    }
}

/// Items of a list, with `NotFound` treated as an empty list.
///
/// # Errors
/// Propagates backend errors other than `NotFound`.
pub async fn items_or_empty(lists: &dyn ListBackend, list_id: i64) -> CoreResult<Vec<Item>> {
    match lists.get_items(list_id).await {
        Ok(items) => Ok(items),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}
