use chrono::NaiveDate;
use shoplist_core::backend::ListKind;
use shoplist_core::core::codec::{self, Command};
use shoplist_core::core::{Button, CoreResult, Keyboard, Node, NodeFuture, Output, Session};

use super::{CALENDAR, DAYSHOPPINGS, SHOPPINGITEMS, entered_name};

/// Regular lists of one day. Sending a name creates a list on that day.
pub(crate) struct DayShoppings;

fn parse_day(data: &str) -> CoreResult<NaiveDate> {
    codec::parse_day_code(data).map_err(|err| err.in_node(DAYSHOPPINGS))
}

async fn render(session: &Session, day: NaiveDate) -> CoreResult<Output> {
    let lists = match session.lists.get_lists_by_day(day).await {
        Ok(lists) => lists,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err.in_node(DAYSHOPPINGS)),
    };

    let date = day.format("%d.%m.%Y");
    let text = if lists.is_empty() {
        format!("{date} No lists for this day. Send a place name to add one.")
    } else {
        format!("{date} Lists for this day. Send a place name to add one.")
    };

    let mut keyboard = Keyboard::new();
    for (index, list) in lists.iter().enumerate() {
        let operation = Command::Show { list_id: list.id }.to_operation();
        keyboard.push_row(vec![Button::new(
            format!("{}. {}", index + 1, list.name),
            SHOPPINGITEMS,
            &operation,
        )]);
    }
    keyboard.push_row(vec![Button::new(
        "⬅ Calendar",
        CALENDAR,
        &codec::month_code(day),
    )]);
    Ok(Output::new(text, keyboard))
}

impl Node for DayShoppings {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            let day = parse_day(operation)?;
            render(session, day).await
        })
    }

    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        current_data: &'a str,
        text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let day = parse_day(current_data)?;
            if let Some(name) = entered_name(text) {
                let list_id = session
                    .lists
                    .create_list_with_kind(day, name, ListKind::Regular)
                    .await
                    .map_err(|err| err.in_node(DAYSHOPPINGS))?;
                tracing::info!(user_id = session.user_id, list_id, "list created");
            }
            render(session, day).await
        })
    }
}

#[cfg(test)]
mod tests {
    use shoplist_core::core::ErrorKind;

    use super::super::testing::{Harness, labels, tokens};

    #[tokio::test]
    async fn empty_day_offers_only_the_way_back() {
        let mut harness = Harness::new().await;
        let output = harness.press("dayshoppings_d2024-05-20").await;

        assert_eq!(
            output.text,
            "20.05.2024 No lists for this day. Send a place name to add one."
        );
        assert_eq!(tokens(&output), vec!["calendar_m2024-05"]);
    }

    #[tokio::test]
    async fn text_creates_a_list_on_that_day() {
        let mut harness = Harness::new().await;
        harness.press("dayshoppings_d2024-05-20").await;

        let output = harness.send("  Bakery ").await;

        assert_eq!(
            output.text,
            "20.05.2024 Lists for this day. Send a place name to add one."
        );
        assert_eq!(labels(&output), vec!["1. Bakery", "⬅ Calendar"]);
        let token = &tokens(&output)[0];
        assert!(token.starts_with("shoppingitems_"));
        assert!(token.trim_start_matches("shoppingitems_").parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn blank_text_only_re_renders() {
        let mut harness = Harness::new().await;
        harness.press("dayshoppings_d2024-05-20").await;

        let output = harness.send("   ").await;
        assert_eq!(output.keyboard.rows.len(), 1);
    }

    #[tokio::test]
    async fn lists_of_other_days_are_not_shown() {
        let mut harness = Harness::new().await;
        harness.press("dayshoppings_d2024-05-20").await;
        harness.send("Bakery").await;

        let output = harness.press("dayshoppings_d2024-05-21").await;
        assert_eq!(labels(&output), vec!["⬅ Calendar"]);
    }

    #[tokio::test]
    async fn bad_day_code_is_rejected() {
        let mut harness = Harness::new().await;
        let err = harness.try_press("dayshoppings_2024-05-20").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
