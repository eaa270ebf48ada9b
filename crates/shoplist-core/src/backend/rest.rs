//! HTTP client for the shopping-list REST service.
//!
//! Every call carries the access token as the `accesstoken` query parameter.
//! Responses are wrapped as `{"data": ...}`. Reads use the read timeout, writes
//! the write timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    BackendFuture, BoundUser, Item, ListBackend, ListKind, RemoteUser, ShoppingList,
    UserDirectory, UserIdentity,
};
use crate::core::error::{CoreError, CoreResult};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(20);

/// Lists are created at noon; the service stores a time next to the date.
const LIST_TIME: &str = "12:00:00";

#[derive(Debug, Clone)]
pub struct RestSettings {
    pub base_url: String,
    /// Token used for directory calls, before any user is known.
    pub token: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl RestSettings {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// REST-backed [`UserDirectory`] and [`ListBackend`].
///
/// Cloning is cheap and shares the connection pool. [`RestBackend::with_token`]
/// derives a client acting as another user.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    settings: Arc<RestSettings>,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    #[serde(default)]
    telegram_id: i64,
    #[serde(default)]
    chat_id: i64,
    #[serde(default)]
    telegram_username: Option<String>,
    #[serde(default, rename = "comunity_id")]
    community_id: String,
    #[serde(default)]
    token: String,
}

impl From<WireUser> for RemoteUser {
    fn from(wire: WireUser) -> Self {
        RemoteUser {
            id: wire.id,
            telegram_id: wire.telegram_id,
            chat_id: wire.chat_id,
            username: wire.telegram_username,
            community_id: wire.community_id,
            token: wire.token,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "comunity_id")]
    community_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireShopping {
    id: i64,
    #[serde(default)]
    name: String,
    date: NaiveDate,
    #[serde(default, rename = "type")]
    kind: ListKind,
}

impl From<WireShopping> for ShoppingList {
    fn from(wire: WireShopping) -> Self {
        ShoppingList {
            id: wire.id,
            name: wire.name,
            date: wire.date,
            kind: wire.kind,
        }
    }
}

#[derive(Debug, Serialize)]
struct ShoppingBody<'a> {
    date: String,
    name: &'a str,
    /// The service derives the owner from the access token.
    owner_id: i64,
    time: &'a str,
    #[serde(rename = "type")]
    kind: ListKind,
}

#[derive(Debug, Deserialize)]
struct WireId {
    #[serde(default)]
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    id: i64,
    #[serde(default)]
    product_name: String,
}

#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    list_id: i64,
    product_name: &'a str,
    quantity: u32,
    complete: bool,
    category_id: i64,
}

#[derive(Debug, Serialize)]
struct DeleteItemsBody<'a> {
    ids: &'a [i64],
}

/// Classifies a reqwest error into a `CoreError`.
fn classify_reqwest_error(err: &reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::transport(format!("request timed out: {err}"))
    } else if err.is_connect() {
        CoreError::transport(format!("connection failed: {err}"))
    } else if err.is_decode() {
        CoreError::transport(format!("invalid response body: {err}"))
    } else {
        CoreError::transport(format!("network error: {err}"))
    }
}

impl RestBackend {
    /// # Errors
    /// Returns `Validation` if the HTTP client cannot be built.
    pub fn new(settings: RestSettings) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| CoreError::validation(format!("http client: {err}")))?;
        let token = settings.token.clone();
        Ok(Self {
            http,
            settings: Arc::new(settings),
            token,
        })
    }

    /// Same connection pool, different access token.
    #[must_use]
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            settings: Arc::clone(&self.settings),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> CoreResult<reqwest::Response> {
        let timeout = if method == Method::GET {
            self.settings.read_timeout
        } else {
            self.settings.write_timeout
        };
        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .timeout(timeout)
            .query(&[("accesstoken", self.token.as_str())])
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "backend request");
        let response = request
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%method, path, status = status.as_u16(), "backend error status");
            return Err(CoreError::http_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Sends a request and unwraps the `data` envelope. `None` means the
    /// service answered without data.
    async fn fetch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> CoreResult<Option<T>> {
        let response = self.send(method, path, query, body).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CoreResult<Option<T>> {
        self.fetch::<T, ()>(Method::GET, path, query, None).await
    }

    async fn users(&self, query: &[(&str, String)]) -> CoreResult<Vec<RemoteUser>> {
        let users: Vec<WireUser> = self.get("/users", query).await?.unwrap_or_default();
        Ok(users.into_iter().map(RemoteUser::from).collect())
    }

    async fn find_user(&self, telegram_id: i64) -> CoreResult<RemoteUser> {
        self.users(&[("telegram_user_id", telegram_id.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found(format!("telegram user {telegram_id}")))
    }

    async fn create_user(&self, identity: &UserIdentity, chat_id: i64) -> CoreResult<RemoteUser> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let community_id = uuid::Uuid::new_v4().simple().to_string();
        let body = UserBody {
            token: Some(&token),
            telegram_username: Some(identity.username.as_deref().unwrap_or_default()),
            telegram_id: Some(identity.user_id),
            community_id: Some(&community_id),
            chat_id: Some(chat_id),
        };
        let created: Vec<WireUser> = self
            .fetch(Method::POST, "/users", &[], Some(&body))
            .await?
            .unwrap_or_default();
        created
            .into_iter()
            .next()
            .map(RemoteUser::from)
            .ok_or_else(|| CoreError::transport("user creation returned no user"))
    }

    fn bind(&self, user: RemoteUser) -> BoundUser {
        let lists: Arc<dyn ListBackend> = if user.token.is_empty() {
            tracing::warn!(user_id = user.id, "user has no access token; using the bot token");
            Arc::new(self.clone())
        } else {
            Arc::new(self.with_token(user.token.clone()))
        };
        BoundUser { user, lists }
    }
}

impl UserDirectory for RestBackend {
    fn resolve_or_create<'a>(
        &'a self,
        identity: &'a UserIdentity,
        chat_id: i64,
    ) -> BackendFuture<'a, BoundUser> {
        Box::pin(async move {
            let user = match self.find_user(identity.user_id).await {
                Ok(user) => user,
                Err(err) if err.is_not_found() => {
                    tracing::info!(telegram_id = identity.user_id, "registering new user");
                    self.create_user(identity, chat_id).await?
                }
                Err(err) => return Err(err),
            };
            Ok(self.bind(user))
        })
    }
}

impl ListBackend for RestBackend {
    fn get_items(&self, list_id: i64) -> BackendFuture<'_, Vec<Item>> {
        Box::pin(async move {
            let items: Vec<WireItem> = self
                .get(&format!("/shoppings/{list_id}/items"), &[])
                .await?
                .unwrap_or_default();
            Ok(items
                .into_iter()
                .map(|item| Item {
                    id: item.id,
                    name: item.product_name,
                })
                .collect())
        })
    }

    fn add_item<'a>(&'a self, list_id: i64, name: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let body = ItemBody {
                list_id,
                product_name: name,
                quantity: 1,
                complete: false,
                category_id: 0,
            };
            self.send(Method::POST, "/items", &[], Some(&body)).await?;
            Ok(())
        })
    }

    fn remove_items<'a>(&'a self, ids: &'a [i64]) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let body = DeleteItemsBody { ids };
            self.send(Method::DELETE, "/items", &[], Some(&body)).await?;
            Ok(())
        })
    }

    fn get_list(&self, list_id: i64) -> BackendFuture<'_, ShoppingList> {
        Box::pin(async move {
            self.get::<WireShopping>(&format!("/shoppings/{list_id}"), &[])
                .await?
                .map(ShoppingList::from)
                .ok_or_else(|| CoreError::not_found(format!("list {list_id}")))
        })
    }

    fn get_special_list(&self, kind: ListKind) -> BackendFuture<'_, i64> {
        Box::pin(async move {
            let wire = i64::from(kind);
            self.get::<WireId>(&format!("/shoppings/special/{wire}"), &[])
                .await?
                .and_then(|found| found.id)
                .ok_or_else(|| CoreError::not_found(format!("special list {kind:?}")))
        })
    }

    fn create_list_with_kind<'a>(
        &'a self,
        date: NaiveDate,
        name: &'a str,
        kind: ListKind,
    ) -> BackendFuture<'a, i64> {
        Box::pin(async move {
            let body = ShoppingBody {
                date: date.format("%Y-%m-%d").to_string(),
                name,
                owner_id: 0,
                time: LIST_TIME,
                kind,
            };
            self.fetch::<WireId, _>(Method::POST, "/shoppings", &[], Some(&body))
                .await?
                .and_then(|created| created.id)
                .ok_or_else(|| CoreError::transport("list creation returned no id"))
        })
    }

    fn get_lists_by_day(&self, date: NaiveDate) -> BackendFuture<'_, Vec<ShoppingList>> {
        Box::pin(async move {
            let path = format!(
                "/shoppings/{}/{}/{}",
                date.year(),
                date.month(),
                date.day()
            );
            let lists: Vec<WireShopping> = self.get(&path, &[]).await?.unwrap_or_default();
            Ok(lists
                .into_iter()
                .map(ShoppingList::from)
                .filter(|list| list.kind == ListKind::Regular)
                .collect())
        })
    }

    fn get_list_days(&self, month: NaiveDate) -> BackendFuture<'_, Vec<u32>> {
        Box::pin(async move {
            let path = format!("/shoppings/days/{}/{}", month.year(), month.month());
            let mut days: Vec<u32> = self.get(&path, &[]).await?.unwrap_or_default();
            days.sort_unstable();
            days.dedup();
            Ok(days)
        })
    }

    fn get_users_by_community<'a>(
        &'a self,
        community_id: &'a str,
    ) -> BackendFuture<'a, Vec<RemoteUser>> {
        Box::pin(async move {
            self.users(&[("comunity_id", community_id.to_string())])
                .await
        })
    }

    fn get_user_by_telegram_id(&self, telegram_id: i64) -> BackendFuture<'_, RemoteUser> {
        Box::pin(self.find_user(telegram_id))
    }

    fn update_user<'a>(
        &'a self,
        id: i64,
        community_id: Option<&'a str>,
        name: Option<&'a str>,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let body = UserBody {
                token: None,
                telegram_username: name,
                telegram_id: None,
                community_id,
                chat_id: None,
            };
            self.send(Method::PUT, &format!("/users/{id}"), &[], Some(&body))
                .await?;
            Ok(())
        })
    }
}
