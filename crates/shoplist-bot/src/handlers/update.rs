use anyhow::Result;
use shoplist_core::backend::UserIdentity;
use shoplist_core::core::codec::{self, START};
use shoplist_core::core::{CoreError, Event, Output, Session};

use crate::bot::context::BotContext;
use crate::commands::is_restart_command;
use crate::render::{keyboard_markup, message_text, prefixed};
use crate::telegram::{CallbackQuery, Message, Update, User};

const SESSION_EXPIRED_NOTICE: &str = "Session expired.";

pub(crate) async fn handle_update(context: &BotContext, update: Update) -> Result<()> {
    if let Some(query) = update.callback_query {
        handle_callback(context, query).await
    } else if let Some(message) = update.message {
        handle_text(context, message).await
    } else {
        Ok(())
    }
}

fn identity(user: &User) -> UserIdentity {
    UserIdentity {
        user_id: user.id,
        username: user.username.clone(),
    }
}

fn start_event(start_node: &str) -> Event {
    Event::Callback {
        token: codec::encode(start_node, START),
    }
}

/// Logs an error that ended processing and tells the user.
async fn report_error(context: &BotContext, chat_id: i64, err: &CoreError) {
    tracing::warn!(
        chat_id,
        kind = %err.kind,
        details = err.details.as_deref().unwrap_or_default(),
        "{}",
        err.message
    );
    if let Err(send_err) = context
        .client()
        .send_message(chat_id, err.user_message(), None)
        .await
    {
        tracing::warn!(chat_id, "failed to report error to user: {send_err:#}");
    }
}

async fn handle_text(context: &BotContext, message: Message) -> Result<()> {
    let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    let mut session = match context.sessions().get(&identity(from), chat_id).await {
        Ok(session) => session,
        Err(err) => {
            report_error(context, chat_id, &err).await;
            return Ok(());
        }
    };

    let event = if is_restart_command(text) {
        let start_node = context.sessions().start_node();
        session.reset(start_node);
        start_event(start_node)
    } else {
        Event::Message {
            text: text.to_string(),
        }
    };
    tracing::debug!(user_id = from.id, chat_id, node = %session.current_node, "text received");

    let output = match context.router().dispatch(&mut session, &event).await {
        Ok(output) => output,
        Err(err) => {
            report_error(context, chat_id, &err).await;
            return Ok(());
        }
    };

    send_new(context, &mut session, &output.text, &output).await?;
    deliver_extras(context, &session, &output).await;
    Ok(())
}

async fn handle_callback(context: &BotContext, query: CallbackQuery) -> Result<()> {
    let result = process_callback(context, &query).await;
    if let Err(err) = context.client().answer_callback_query(&query.id).await {
        tracing::warn!(user_id = query.from.id, "failed to answer callback query: {err:#}");
    }
    result
}

async fn process_callback(context: &BotContext, query: &CallbackQuery) -> Result<()> {
    let Some(token) = query.data.as_deref() else {
        return Ok(());
    };
    let chat_id = query
        .message
        .as_ref()
        .map_or(query.from.id, |message| message.chat.id);

    let mut session = match context.sessions().get(&identity(&query.from), chat_id).await {
        Ok(session) => session,
        Err(err) => {
            report_error(context, chat_id, &err).await;
            return Ok(());
        }
    };

    let Some(message_id) = session.last_message_id else {
        // Fresh session: whatever the button meant belongs to an expired one.
        tracing::info!(user_id = query.from.id, token, "callback on expired session");
        let start_node = context.sessions().start_node();
        session.reset(start_node);
        let output = match context
            .router()
            .dispatch(&mut session, &start_event(start_node))
            .await
        {
            Ok(output) => output,
            Err(err) => {
                report_error(context, chat_id, &err).await;
                return Ok(());
            }
        };
        let text = prefixed(SESSION_EXPIRED_NOTICE, &output.text);
        send_new(context, &mut session, &text, &output).await?;
        deliver_extras(context, &session, &output).await;
        return Ok(());
    };

    tracing::debug!(user_id = query.from.id, chat_id, token, "button pressed");
    let event = Event::Callback {
        token: token.to_string(),
    };
    let output = match context.router().dispatch(&mut session, &event).await {
        Ok(output) => output,
        Err(err) => {
            report_error(context, chat_id, &err).await;
            return Ok(());
        }
    };

    let text = if context.debug_tokens() {
        prefixed(token, &output.text)
    } else {
        output.text.clone()
    };
    let markup = keyboard_markup(&output.keyboard);
    if let Err(err) = context
        .client()
        .edit_message_text(chat_id, message_id, &message_text(&text), markup.as_ref())
        .await
    {
        tracing::warn!(chat_id, message_id, "edit failed, sending a new message: {err:#}");
        send_new(context, &mut session, &text, &output).await?;
    }
    deliver_extras(context, &session, &output).await;
    Ok(())
}

/// Sends `text` with the output's keyboard as a new message and makes it the
/// one later callbacks edit.
async fn send_new(
    context: &BotContext,
    session: &mut Session,
    text: &str,
    output: &Output,
) -> Result<()> {
    let markup = keyboard_markup(&output.keyboard);
    let sent = context
        .client()
        .send_message(session.chat_id, &message_text(text), markup.as_ref())
        .await?;
    session.last_message_id = Some(sent.message_id);
    Ok(())
}

/// Broadcast text and image. Failures are logged; the user already has the
/// main response.
async fn deliver_extras(context: &BotContext, session: &Session, output: &Output) {
    if let Some(notice) = output.broadcast_text.as_deref() {
        broadcast(context, session, notice).await;
    }
    if let Some(image) = output.image.as_ref()
        && let Err(err) = context
            .client()
            .send_photo(session.chat_id, image.clone())
            .await
    {
        tracing::warn!(chat_id = session.chat_id, "failed to send image: {err:#}");
    }
}

/// Sends `notice` to every other member of the session user's community.
async fn broadcast(context: &BotContext, session: &Session, notice: &str) {
    let members = match session
        .lists
        .get_users_by_community(&session.user.community_id)
        .await
    {
        Ok(members) => members,
        Err(err) => {
            tracing::warn!(
                user_id = session.user_id,
                kind = %err.kind,
                "cannot load community: {}",
                err.message
            );
            return;
        }
    };

    for member in members
        .iter()
        .filter(|member| member.telegram_id != session.user.telegram_id)
    {
        if let Err(err) = context
            .client()
            .send_message(member.chat_id, &message_text(notice), None)
            .await
        {
            tracing::warn!(chat_id = member.chat_id, "broadcast failed: {err:#}");
        }
    }
}
