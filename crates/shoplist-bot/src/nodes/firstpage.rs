use shoplist_core::core::codec::START;
use shoplist_core::core::{CoreError, Keyboard, Node, NodeFuture, Output, Session};

use super::{CALENDAR, CHECKLIST, CURRENTLIST, FIRSTPAGE, SETTINGS, start_button};

const MENU_TEXT: &str = "Menu";

/// Main menu.
pub(crate) struct FirstPage;

fn menu() -> Output {
    let keyboard = Keyboard::new()
        .row(vec![start_button("Current list", CURRENTLIST)])
        .row(vec![start_button("Checklist", CHECKLIST)])
        .row(vec![start_button("Settings", SETTINGS)])
        .row(vec![start_button("Calendar", CALENDAR)]);
    Output::new(MENU_TEXT, keyboard)
}

impl Node for FirstPage {
    fn on_callback<'a>(&'a self, _session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            if operation == START {
                Ok(menu())
            } else {
                Err(CoreError::validation(format!("unknown command '{operation}'"))
                    .in_node(FIRSTPAGE))
            }
        })
    }

    fn on_message<'a>(
        &'a self,
        _session: &'a mut Session,
        _current_data: &'a str,
        _text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async { Ok(menu()) })
    }
}

#[cfg(test)]
mod tests {
    use shoplist_core::core::ErrorKind;

    use super::super::testing::{Harness, labels, tokens};

    #[tokio::test]
    async fn start_shows_menu() {
        let mut harness = Harness::new().await;
        let output = harness.press("firstpage_start").await;

        assert_eq!(output.text, "Menu");
        assert_eq!(
            labels(&output),
            vec!["Current list", "Checklist", "Settings", "Calendar"]
        );
        assert_eq!(
            tokens(&output),
            vec![
                "currentlist_start",
                "checklist_start",
                "settings_start",
                "calendar_start"
            ]
        );
    }

    #[tokio::test]
    async fn any_text_shows_menu_again() {
        let mut harness = Harness::new().await;
        let output = harness.send("hello").await;
        assert_eq!(output.text, "Menu");
        assert_eq!(output.keyboard.rows.len(), 4);
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let mut harness = Harness::new().await;
        let err = harness.try_press("firstpage_nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
