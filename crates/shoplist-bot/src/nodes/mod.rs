//! Screens of the bot.
//!
//! Every screen is a [`Node`] registered under its name. Buttons carry
//! `<node>_<operation>` tokens, so the next screen is whatever node a button
//! names.

use std::sync::Arc;

use chrono::NaiveDate;
use shoplist_core::backend::{Item, RemoteUser, ShoppingList, items_or_empty};
use shoplist_core::core::codec::{self, BulkOperation};
use shoplist_core::core::{Button, CoreError, CoreResult, Output, Router, SelectionSet, Session};

mod calendar;
mod checklist;
mod currentlist;
mod dayshoppings;
mod firstpage;
mod settings;
mod shoppingitems;

use calendar::Calendar;
use checklist::Checklist;
use currentlist::CurrentList;
use dayshoppings::DayShoppings;
use firstpage::FirstPage;
use settings::Settings;
use shoppingitems::ShoppingItems;

pub const FIRSTPAGE: &str = "firstpage";
pub const CALENDAR: &str = "calendar";
pub const DAYSHOPPINGS: &str = "dayshoppings";
pub const SHOPPINGITEMS: &str = "shoppingitems";
pub const CHECKLIST: &str = "checklist";
pub const CURRENTLIST: &str = "currentlist";
pub const SETTINGS: &str = "settings";

/// Source of "today" for calendars and newly created special lists.
pub type Clock = fn() -> NaiveDate;

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Values the screens need besides the session.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub service_version: String,
    pub today: Clock,
}

impl NodeOptions {
    pub fn new(service_version: impl Into<String>) -> Self {
        Self {
            service_version: service_version.into(),
            today: local_today,
        }
    }
}

/// Router with every screen registered.
pub fn router(options: &NodeOptions) -> Router {
    Router::new()
        .with_node(FIRSTPAGE, Arc::new(FirstPage))
        .with_node(CALENDAR, Arc::new(Calendar::new(options.today)))
        .with_node(DAYSHOPPINGS, Arc::new(DayShoppings))
        .with_node(SHOPPINGITEMS, Arc::new(ShoppingItems))
        .with_node(CHECKLIST, Arc::new(Checklist::new(options.today)))
        .with_node(CURRENTLIST, Arc::new(CurrentList::new(options.today)))
        .with_node(
            SETTINGS,
            Arc::new(Settings::new(options.service_version.clone())),
        )
}

/// Button that opens `node` from its start.
pub(crate) fn start_button(label: &str, node: &str) -> Button {
    Button::new(label, node, codec::START)
}

/// Appends U+0332 after every character.
pub(crate) fn underline(text: &str) -> String {
    combine(text, '\u{0332}')
}

/// Appends U+0336 after every character.
pub(crate) fn strike_through(text: &str) -> String {
    combine(text, '\u{0336}')
}

fn combine(text: &str, mark: char) -> String {
    let mut result = String::with_capacity(text.len() * 3);
    for ch in text.chars() {
        result.push(ch);
        result.push(mark);
    }
    result
}

/// How selected items stand out in a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    StrikeThrough,
    Underline,
}

impl Marker {
    fn apply(self, text: &str) -> String {
        match self {
            Marker::StrikeThrough => strike_through(text),
            Marker::Underline => underline(text),
        }
    }
}

/// One numbered row per item; pressing an item toggles its selection.
pub(crate) fn item_rows(
    node: &str,
    list_id: i64,
    items: &[Item],
    selection: &SelectionSet,
    marker: Marker,
) -> Vec<Vec<Button>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let name = if selection.contains(item.id) {
                marker.apply(&item.name)
            } else {
                item.name.clone()
            };
            let operation = codec::Command::Toggle {
                list_id,
                item_id: item.id,
            }
            .to_operation();
            vec![Button::new(
                format!("{}. {name}", index + 1),
                node,
                &operation,
            )]
        })
        .collect()
}

/// Button starting a bulk operation on `list_id`.
pub(crate) fn bulk_button(label: &str, node: &str, list_id: i64, op: BulkOperation) -> Button {
    let operation = codec::Command::Bulk { list_id, op }.to_operation();
    Button::new(label, node, &operation)
}

/// Names in `source` that are not yet in `existing`, without repeats.
pub(crate) fn missing_items<'a>(source: &'a [Item], existing: &[Item]) -> Vec<&'a Item> {
    let mut seen: Vec<&str> = existing.iter().map(|item| item.name.as_str()).collect();
    let mut missing = Vec::new();
    for item in source {
        if !seen.contains(&item.name.as_str()) {
            seen.push(&item.name);
            missing.push(item);
        }
    }
    missing
}

/// Community notice sent when someone adds an item.
pub(crate) fn item_added_notice(user: &RemoteUser, item: &str, list: &ShoppingList) -> String {
    format!(
        "{}({}) added '{item}' to '{}' ({})",
        user.display_name(),
        user.telegram_id,
        list.name,
        list.date.format("%Y-%m-%d"),
    )
}

pub(crate) fn unsupported(node: &str, op: BulkOperation) -> CoreError {
    CoreError::validation(format!("{op:?} is not available")).in_node(node)
}

/// Trimmed free text, or `None` when there is nothing to add.
pub(crate) fn entered_name(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|name| !name.is_empty())
}

/// Adds the entered item to `list_id` and returns the notice for the rest of
/// the community, or `None` when the text was blank.
pub(crate) async fn add_entered_item(
    session: &Session,
    node: &str,
    list_id: i64,
    text: &str,
) -> CoreResult<Option<String>> {
    let Some(name) = entered_name(text) else {
        return Ok(None);
    };
    session
        .lists
        .add_item(list_id, name)
        .await
        .map_err(|err| err.in_node(node))?;
    tracing::info!(user_id = session.user_id, list_id, node, "item added");
    let list = session
        .lists
        .get_list(list_id)
        .await
        .map_err(|err| err.in_node(node))?;
    Ok(Some(item_added_notice(&session.user, name, &list)))
}

/// Adds to `target` every item of `source` whose name it does not hold yet.
/// Returns the ids of the source items that were copied.
pub(crate) async fn copy_missing(
    session: &Session,
    node: &str,
    source: &[Item],
    target: i64,
) -> CoreResult<Vec<i64>> {
    let existing = items_or_empty(session.lists.as_ref(), target)
        .await
        .map_err(|err| err.in_node(node))?;
    let missing = missing_items(source, &existing);
    for item in &missing {
        session
            .lists
            .add_item(target, &item.name)
            .await
            .map_err(|err| err.in_node(node))?;
    }
    tracing::debug!(user_id = session.user_id, target, added = missing.len(), node, "items copied");
    Ok(missing.iter().map(|item| item.id).collect())
}

/// Removes the selected items that belong to `list_id` and unselects them.
/// Selected ids of other lists are left alone.
pub(crate) async fn delete_selected(
    session: &mut Session,
    node: &str,
    list_id: i64,
) -> CoreResult<()> {
    if session.selection.is_empty() {
        return Ok(());
    }
    let items = items_or_empty(session.lists.as_ref(), list_id)
        .await
        .map_err(|err| err.in_node(node))?;
    let (doomed, kept): (Vec<i64>, Vec<i64>) = session
        .selection
        .ids()
        .iter()
        .copied()
        .partition(|id| items.iter().any(|item| item.id == *id));
    if !doomed.is_empty() {
        session
            .lists
            .remove_items(&doomed)
            .await
            .map_err(|err| err.in_node(node))?;
    }
    tracing::info!(
        user_id = session.user_id,
        list_id,
        removed = doomed.len(),
        node,
        "selected items deleted"
    );
    session.selection.set_all(kept);
    Ok(())
}

/// Renders `output` with the broadcast notice attached when there is one.
pub(crate) fn announce(output: Output, notice: Option<String>) -> Output {
    match notice {
        Some(notice) => output.with_broadcast(notice),
        None => output,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_every_character() {
        assert_eq!(underline("ab"), "a\u{0332}b\u{0332}");
        assert_eq!(strike_through("é"), "é\u{0336}");
        assert_eq!(underline(""), "");
    }

    #[test]
    fn missing_items_skip_existing_and_repeated_names() {
        let item = |id, name: &str| Item {
            id,
            name: name.to_string(),
        };
        let source = vec![item(1, "milk"), item(2, "eggs"), item(3, "eggs")];
        let existing = vec![item(9, "milk")];

        let missing = missing_items(&source, &existing);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, 2);
    }

    #[test]
    fn item_rows_encode_toggle_tokens() {
        let items = vec![Item {
            id: 45,
            name: "tea".to_string(),
        }];
        let mut selection = SelectionSet::new();
        selection.toggle(45);

        let rows = item_rows(CURRENTLIST, 123, &items, &selection, Marker::StrikeThrough);
        assert_eq!(rows[0][0].token, "currentlist_123i45");
        assert_eq!(rows[0][0].label, format!("1. {}", strike_through("tea")));
    }

    #[test]
    fn every_screen_is_registered() {
        let router = router(&testing::options());
        for name in [
            FIRSTPAGE,
            CALENDAR,
            DAYSHOPPINGS,
            SHOPPINGITEMS,
            CHECKLIST,
            CURRENTLIST,
            SETTINGS,
        ] {
            assert!(router.contains(name), "{name} missing");
        }
    }
}
