pub mod codec;
pub mod error;
pub mod output;
pub mod router;
pub mod selection;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use output::{Button, Keyboard, Output};
pub use router::{Event, Node, NodeFuture, Router};
pub use selection::SelectionSet;
pub use session::{Session, SessionGuard, SessionStore};
