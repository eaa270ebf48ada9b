pub(crate) mod context;
pub(crate) mod queue;

pub(crate) use context::BotContext;
pub(crate) use queue::{dispatch_update, new_user_queues};
