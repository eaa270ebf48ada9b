use shoplist_core::backend::{ListKind, items_or_empty};
use shoplist_core::core::codec::{self, BulkOperation, Command};
use shoplist_core::core::{Button, CoreResult, Keyboard, Node, NodeFuture, Output, Session};

use super::{
    DAYSHOPPINGS, Marker, SHOPPINGITEMS, add_entered_item, announce, bulk_button, copy_missing,
    delete_selected, item_rows, unsupported,
};

/// Items of a regular list.
pub(crate) struct ShoppingItems;

fn parse(operation: &str) -> CoreResult<Command> {
    codec::parse_operation(operation).map_err(|err| err.in_node(SHOPPINGITEMS))
}

async fn render(session: &Session, list_id: i64) -> CoreResult<Output> {
    let list = session
        .lists
        .get_list(list_id)
        .await
        .map_err(|err| err.in_node(SHOPPINGITEMS))?;
    let items = items_or_empty(session.lists.as_ref(), list_id)
        .await
        .map_err(|err| err.in_node(SHOPPINGITEMS))?;

    let text = format!(
        "{} ({}). Send an item name to add it.",
        list.name,
        list.date.format("%d.%m.%Y")
    );

    let mut keyboard = Keyboard::new();
    for row in item_rows(
        SHOPPINGITEMS,
        list_id,
        &items,
        &session.selection,
        Marker::StrikeThrough,
    ) {
        keyboard.push_row(row);
    }

    let mut controls = Vec::new();
    if !session.selection.is_empty() {
        controls.push(bulk_button(
            "⊗ Selected",
            SHOPPINGITEMS,
            list_id,
            BulkOperation::Delete,
        ));
    }
    controls.push(bulk_button(
        "↑ From current",
        SHOPPINGITEMS,
        list_id,
        BulkOperation::AddFromCurrent,
    ));
    controls.push(bulk_button(
        "↑ From checklist",
        SHOPPINGITEMS,
        list_id,
        BulkOperation::AddFromChecklist,
    ));
    keyboard.push_row(controls);
    keyboard.push_row(vec![Button::new(
        "⬅ Lists",
        DAYSHOPPINGS,
        &codec::day_code(list.date),
    )]);

    Ok(Output::new(text, keyboard))
}

/// Copies the missing items of the community's special list of `kind` into
/// `list_id`. With `take` the copied source items are removed afterwards;
/// items skipped as duplicates stay in the source.
async fn pull_from(session: &Session, kind: ListKind, list_id: i64, take: bool) -> CoreResult<()> {
    let source_id = match session.lists.get_special_list(kind).await {
        Ok(id) => id,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err.in_node(SHOPPINGITEMS)),
    };
    let source = items_or_empty(session.lists.as_ref(), source_id)
        .await
        .map_err(|err| err.in_node(SHOPPINGITEMS))?;
    let copied = copy_missing(session, SHOPPINGITEMS, &source, list_id).await?;

    if take && !copied.is_empty() {
        session
            .lists
            .remove_items(&copied)
            .await
            .map_err(|err| err.in_node(SHOPPINGITEMS))?;
    }
    Ok(())
}

async fn run_bulk(session: &mut Session, list_id: i64, op: BulkOperation) -> CoreResult<()> {
    match op {
        BulkOperation::Delete => delete_selected(session, SHOPPINGITEMS, list_id).await,
        BulkOperation::AddFromCurrent => {
            pull_from(session, ListKind::CurrentList, list_id, true).await
        }
        BulkOperation::AddFromChecklist => {
            pull_from(session, ListKind::Checklist, list_id, false).await
        }
        BulkOperation::SelectAll | BulkOperation::CopyToCurrent => {
            Err(unsupported(SHOPPINGITEMS, op))
        }
    }
}

impl Node for ShoppingItems {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            let command = parse(operation)?;
            match command {
                Command::Show { .. } => session.selection.clear(),
                Command::Toggle { item_id, .. } => {
                    session.selection.toggle(item_id);
                }
                Command::Bulk { list_id, op } => run_bulk(session, list_id, op).await?,
            }
            render(session, command.list_id()).await
        })
    }

    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        current_data: &'a str,
        text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let list_id = parse(current_data)?.list_id();
            let notice = add_entered_item(session, SHOPPINGITEMS, list_id, text).await?;
            let output = render(session, list_id).await?;
            Ok(announce(output, notice))
        })
    }
}

#[cfg(test)]
mod tests {
    use shoplist_core::backend::{ListBackend, ListKind};
    use shoplist_core::core::ErrorKind;

    use super::super::strike_through;
    use super::super::testing::{Harness, labels, tokens};

    async fn open(harness: &mut Harness, names: &[&str]) -> i64 {
        let list_id = harness.list("Market", ListKind::Regular).await;
        harness.add(list_id, names).await;
        harness.press(&format!("shoppingitems_{list_id}")).await;
        list_id
    }

    async fn item_ids(harness: &Harness, list_id: i64) -> Vec<i64> {
        harness
            .session
            .lists
            .get_items(list_id)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    #[tokio::test]
    async fn shows_items_and_controls() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk", "eggs"]).await;

        let output = harness.press(&format!("shoppingitems_{list_id}")).await;

        assert_eq!(
            output.text,
            "Market (15.05.2024). Send an item name to add it."
        );
        assert_eq!(
            labels(&output),
            vec![
                "1. milk",
                "2. eggs",
                "↑ From current",
                "↑ From checklist",
                "⬅ Lists"
            ]
        );
        assert_eq!(tokens(&output).last().unwrap(), "dayshoppings_d2024-05-15");
    }

    #[tokio::test]
    async fn pressing_an_item_twice_unselects_it() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk"]).await;
        let item = item_ids(&harness, list_id).await[0];
        let token = format!("shoppingitems_{list_id}i{item}");

        let selected = harness.press(&token).await;
        assert_eq!(labels(&selected)[0], format!("1. {}", strike_through("milk")));
        assert_eq!(labels(&selected)[1], "⊗ Selected");

        let unselected = harness.press(&token).await;
        assert_eq!(labels(&unselected)[0], "1. milk");
        assert!(harness.session.selection.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_selected_items() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk", "eggs"]).await;
        let ids = item_ids(&harness, list_id).await;
        harness
            .press(&format!("shoppingitems_{list_id}i{}", ids[0]))
            .await;

        harness.press(&format!("shoppingitems_{list_id}!")).await;

        assert_eq!(harness.names(list_id).await, vec!["eggs"]);
        assert!(harness.session.selection.is_empty());
    }

    #[tokio::test]
    async fn showing_the_list_drops_the_selection() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk"]).await;
        let item = item_ids(&harness, list_id).await[0];
        harness.press(&format!("shoppingitems_{list_id}i{item}")).await;

        harness.press(&format!("shoppingitems_{list_id}")).await;
        assert!(harness.session.selection.is_empty());
    }

    #[tokio::test]
    async fn from_current_moves_missing_items() {
        let mut harness = Harness::new().await;
        let current = harness.list("current", ListKind::CurrentList).await;
        harness.add(current, &["bread", "eggs"]).await;
        let list_id = open(&mut harness, &["milk"]).await;

        harness.press(&format!("shoppingitems_{list_id}^")).await;

        assert_eq!(harness.names(list_id).await, vec!["milk", "bread", "eggs"]);
        assert!(harness.names(current).await.is_empty());
    }

    #[tokio::test]
    async fn from_current_keeps_items_the_list_already_has() {
        let mut harness = Harness::new().await;
        let current = harness.list("current", ListKind::CurrentList).await;
        harness.add(current, &["milk", "bread"]).await;
        let list_id = open(&mut harness, &["milk"]).await;

        harness.press(&format!("shoppingitems_{list_id}^")).await;

        assert_eq!(harness.names(list_id).await, vec!["milk", "bread"]);
        assert_eq!(harness.names(current).await, vec!["milk"]);
    }

    #[tokio::test]
    async fn delete_leaves_selections_of_other_lists() {
        let mut harness = Harness::new().await;
        let checklist = harness.list("checklist", ListKind::Checklist).await;
        harness.add(checklist, &["soap"]).await;
        let soap = item_ids(&harness, checklist).await[0];
        let list_id = open(&mut harness, &["milk"]).await;
        harness.session.selection.toggle(soap);

        harness.press(&format!("shoppingitems_{list_id}!")).await;

        assert_eq!(harness.names(checklist).await, vec!["soap"]);
        assert_eq!(harness.names(list_id).await, vec!["milk"]);
        assert!(harness.session.selection.contains(soap));
    }

    #[tokio::test]
    async fn from_checklist_copies_and_keeps_source() {
        let mut harness = Harness::new().await;
        let checklist = harness.list("checklist", ListKind::Checklist).await;
        harness.add(checklist, &["salt", "salt", "oil"]).await;
        let list_id = open(&mut harness, &[]).await;

        harness.press(&format!("shoppingitems_{list_id}#")).await;

        assert_eq!(harness.names(list_id).await, vec!["salt", "oil"]);
        assert_eq!(harness.names(checklist).await.len(), 3);
    }

    #[tokio::test]
    async fn missing_special_list_just_renders() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk"]).await;

        let output = harness.press(&format!("shoppingitems_{list_id}^")).await;
        assert_eq!(labels(&output)[0], "1. milk");
    }

    #[tokio::test]
    async fn text_adds_item_and_broadcasts() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &[]).await;

        let output = harness.send("cheese").await;

        assert_eq!(harness.names(list_id).await, vec!["cheese"]);
        assert_eq!(
            output.broadcast_text.as_deref(),
            Some("user1(1) added 'cheese' to 'Market' (2024-05-15)")
        );
    }

    #[tokio::test]
    async fn select_all_is_not_offered_here() {
        let mut harness = Harness::new().await;
        let list_id = open(&mut harness, &["milk"]).await;

        let err = harness
            .try_press(&format!("shoppingitems_{list_id}*"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
