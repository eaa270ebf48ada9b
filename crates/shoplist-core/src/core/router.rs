//! Node registry and event dispatch.
//!
//! Screens are nodes. A node never keeps a session: it gets one explicitly on
//! every call, so one node instance serves all users concurrently. Which node
//! runs next is decided by the tokens a node puts on its buttons.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::codec;
use crate::core::error::{CoreError, CoreResult};
use crate::core::output::Output;
use crate::core::session::Session;

/// Boxed future returned by node handlers.
pub type NodeFuture<'a> = Pin<Box<dyn Future<Output = CoreResult<Output>> + Send + 'a>>;

/// Capabilities of a screen.
pub trait Node: Send + Sync {
    /// A button of this node was pressed. `operation` is the token part after
    /// the node name.
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a>;

    /// Free text arrived while this node is the current one.
    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        current_data: &'a str,
        text: &'a str,
    ) -> NodeFuture<'a>;
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Inline button press carrying its token.
    Callback { token: String },
    /// Free-text message.
    Message { text: String },
}

/// Node registry. Holds no per-user state.
#[derive(Clone, Default)]
pub struct Router {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.node_names();
        names.sort_unstable();
        f.debug_struct("Router").field("nodes", &names).finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_node(mut self, name: &str, node: Arc<dyn Node>) -> Self {
        self.register(name, node);
        self
    }

    /// Registers `node` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: &str, node: Arc<dyn Node>) {
        if self.nodes.insert(name.to_string(), node).is_some() {
            tracing::warn!(node = name, "node registered twice; keeping the last one");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    fn lookup(&self, name: &str) -> CoreResult<&Arc<dyn Node>> {
        self.nodes
            .get(name)
            .ok_or_else(|| CoreError::node_not_found(name))
    }

    /// Routes `event` to its node.
    ///
    /// A button press moves the session to the node named in its token before
    /// the handler runs. Free text goes to the session's current node.
    ///
    /// # Errors
    /// Returns `Validation` for malformed tokens, `NodeNotFound` for
    /// unregistered nodes (the session is left untouched), and whatever the
    /// node returns.
    pub async fn dispatch(&self, session: &mut Session, event: &Event) -> CoreResult<Output> {
        match event {
            Event::Callback { token } => {
                let (node, operation) = codec::decode(token)?;
                let handler = self.lookup(node)?;
                tracing::debug!(user_id = session.user_id, node, operation, "callback");
                session.set_position(node, operation);
                handler.on_callback(session, operation).await
            }
            Event::Message { text } => {
                let handler = self.lookup(&session.current_node)?;
                tracing::debug!(
                    user_id = session.user_id,
                    node = %session.current_node,
                    "message"
                );
                let current_data = session.current_data.clone();
                handler.on_message(session, &current_data, text).await
            }
        }
    }
}
