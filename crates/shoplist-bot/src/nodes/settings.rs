use shoplist_core::backend::RemoteUser;
use shoplist_core::core::codec::START;
use shoplist_core::core::{
    Button, CoreError, CoreResult, Keyboard, Node, NodeFuture, Output, Session,
};

use super::{FIRSTPAGE, SETTINGS, start_button};

const LEAVE: &str = "leave";

const NOT_IN_GROUP_TEXT: &str =
    "You are not in a group. Send a member's Telegram ID to join their group.";
const ALREADY_IN_GROUP_NOTE: &str = "You are already in a group.";
const NOT_A_NUMBER_NOTE: &str = "The member ID must be a number.";
const MEMBER_NOT_FOUND_NOTE: &str = "Member not found. Check the ID.";
const OWN_ID_NOTE: &str = "That is your own ID.";
const JOINED_NOTE: &str = "You joined the group.";
const LEFT_NOTE: &str = "You left the group.";

/// Version, identity and community membership.
pub(crate) struct Settings {
    service_version: String,
}

impl Settings {
    pub(crate) fn new(service_version: String) -> Self {
        Self { service_version }
    }

    async fn render(&self, session: &Session, note: Option<&str>) -> CoreResult<Output> {
        let members = members(session).await?;

        let mut lines = Vec::new();
        if let Some(note) = note {
            lines.push(note.to_string());
        }
        lines.push(format!("Bot version: {}", self.service_version));
        lines.push(format!("Your Telegram ID: {}.", session.user.telegram_id));

        let mut keyboard = Keyboard::new();
        if members.len() > 1 {
            lines.push("Group members:".to_string());
            for member in &members {
                lines.push(format!("- {} ({})", member.display_name(), member.telegram_id));
            }
            keyboard.push_row(vec![Button::new("Leave group", SETTINGS, LEAVE)]);
        } else {
            lines.push(NOT_IN_GROUP_TEXT.to_string());
        }
        keyboard.push_row(vec![start_button("⬅ Menu", FIRSTPAGE)]);

        Ok(Output::new(lines.join("\n"), keyboard))
    }
}

async fn members(session: &Session) -> CoreResult<Vec<RemoteUser>> {
    match session
        .lists
        .get_users_by_community(&session.user.community_id)
        .await
    {
        Ok(members) => Ok(members),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err.in_node(SETTINGS)),
    }
}

/// Moves the session's user into `community_id`.
async fn switch_community(session: &mut Session, community_id: String) -> CoreResult<()> {
    session
        .lists
        .update_user(session.user.id, Some(&community_id), None)
        .await
        .map_err(|err| err.in_node(SETTINGS))?;
    tracing::info!(user_id = session.user_id, "community changed");
    session.user.community_id = community_id;
    Ok(())
}

/// Joins the community of the user with the Telegram id in `text`. Returns
/// the note to show.
async fn join(session: &mut Session, text: &str) -> CoreResult<&'static str> {
    if members(session).await?.len() > 1 {
        return Ok(ALREADY_IN_GROUP_NOTE);
    }
    let Ok(telegram_id) = text.trim().parse::<i64>() else {
        return Ok(NOT_A_NUMBER_NOTE);
    };
    if telegram_id == session.user.telegram_id {
        return Ok(OWN_ID_NOTE);
    }
    let member = match session.lists.get_user_by_telegram_id(telegram_id).await {
        Ok(member) => member,
        Err(err) if err.is_not_found() => return Ok(MEMBER_NOT_FOUND_NOTE),
        Err(err) => return Err(err.in_node(SETTINGS)),
    };
    switch_community(session, member.community_id).await?;
    Ok(JOINED_NOTE)
}

impl Node for Settings {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            match operation {
                START => self.render(session, None).await,
                LEAVE => {
                    let community = uuid::Uuid::new_v4().simple().to_string();
                    switch_community(session, community).await?;
                    self.render(session, Some(LEFT_NOTE)).await
                }
                other => Err(
                    CoreError::validation(format!("unknown command '{other}'")).in_node(SETTINGS),
                ),
            }
        })
    }

    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        _current_data: &'a str,
        text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let note = join(session, text).await?;
            self.render(session, Some(note)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use shoplist_core::backend::{ListBackend, ListKind};
    use shoplist_core::core::ErrorKind;

    use super::super::testing::{Harness, labels, tokens};

    #[tokio::test]
    async fn shows_version_and_id_when_alone() {
        let mut harness = Harness::new().await;

        let output = harness.press("settings_start").await;

        assert_eq!(
            output.text,
            "Bot version: 1.2.3\nYour Telegram ID: 1.\n\
             You are not in a group. Send a member's Telegram ID to join their group."
        );
        assert_eq!(tokens(&output), vec!["firstpage_start"]);
    }

    #[tokio::test]
    async fn joining_shares_lists_with_the_member() {
        let mut harness = Harness::new().await;
        let other = Harness::session_for(&harness.backend, 2).await;
        let shared = other
            .lists
            .create_list_with_kind(super::super::testing::today(), "Their list", ListKind::Regular)
            .await
            .unwrap();
        harness.press("settings_start").await;

        let output = harness.send("2").await;

        assert!(output.text.starts_with("You joined the group.\n"));
        assert!(output.text.contains("- user1 (1)"));
        assert!(output.text.contains("- user2 (2)"));
        assert_eq!(labels(&output), vec!["Leave group", "⬅ Menu"]);
        assert_eq!(harness.session.user.community_id, other.user.community_id);
        assert_eq!(
            harness.session.lists.get_list(shared).await.unwrap().name,
            "Their list"
        );
    }

    #[tokio::test]
    async fn leaving_moves_to_a_fresh_community() {
        let mut harness = Harness::new().await;
        let other = Harness::session_for(&harness.backend, 2).await;
        harness.press("settings_start").await;
        harness.send("2").await;

        let output = harness.press("settings_leave").await;

        assert!(output.text.starts_with("You left the group.\n"));
        assert!(output.text.contains("You are not in a group."));
        assert_ne!(harness.session.user.community_id, other.user.community_id);
    }

    #[tokio::test]
    async fn join_feedback() {
        let mut harness = Harness::new().await;
        harness.press("settings_start").await;

        let output = harness.send("abc").await;
        assert!(output.text.starts_with("The member ID must be a number."));

        let output = harness.send("99").await;
        assert!(output.text.starts_with("Member not found. Check the ID."));

        let output = harness.send("1").await;
        assert!(output.text.starts_with("That is your own ID."));

        Harness::session_for(&harness.backend, 2).await;
        Harness::session_for(&harness.backend, 3).await;
        harness.send("2").await;
        let output = harness.send("3").await;
        assert!(output.text.starts_with("You are already in a group."));
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let mut harness = Harness::new().await;
        let err = harness.try_press("settings_reboot").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
