use shoplist_core::backend::{Item, ListKind, ensure_special_list, items_or_empty};
use shoplist_core::core::codec::{self, BulkOperation, Command, START};
use shoplist_core::core::{CoreResult, Keyboard, Node, NodeFuture, Output, Session};

use super::currentlist::CURRENT_LIST_NAME;
use super::{
    CHECKLIST, Clock, FIRSTPAGE, Marker, add_entered_item, announce, bulk_button, copy_missing,
    delete_selected, item_rows, start_button, unsupported,
};

const CHECKLIST_NAME: &str = "Checklist";
const CHECKLIST_TEXT: &str = "Checklist. Send an item name to add it.";
const COPIED_NOTE: &str = "Items copied.";
const NOTHING_TO_COPY_NOTE: &str = "No new items to add.";

/// The community's checklist of things bought regularly. Selected items can
/// be copied to the current list.
pub(crate) struct Checklist {
    today: Clock,
}

impl Checklist {
    pub(crate) fn new(today: Clock) -> Self {
        Self { today }
    }

    async fn list_id(&self, session: &Session, data: &str) -> CoreResult<i64> {
        if data == START {
            ensure_special_list(
                session.lists.as_ref(),
                ListKind::Checklist,
                CHECKLIST_NAME,
                (self.today)(),
            )
            .await
            .map_err(|err| err.in_node(CHECKLIST))
        } else {
            codec::parse_operation(data)
                .map(|command| command.list_id())
                .map_err(|err| err.in_node(CHECKLIST))
        }
    }

    /// Copies the selected items the current list lacks. Returns the note
    /// shown above the list.
    async fn copy_to_current(
        &self,
        session: &mut Session,
        items: &[Item],
    ) -> CoreResult<&'static str> {
        let selected: Vec<Item> = items
            .iter()
            .filter(|item| session.selection.contains(item.id))
            .cloned()
            .collect();
        let current = ensure_special_list(
            session.lists.as_ref(),
            ListKind::CurrentList,
            CURRENT_LIST_NAME,
            (self.today)(),
        )
        .await
        .map_err(|err| err.in_node(CHECKLIST))?;

        let copied = copy_missing(session, CHECKLIST, &selected, current).await?;
        if copied.is_empty() {
            return Ok(NOTHING_TO_COPY_NOTE);
        }
        session.selection.clear();
        Ok(COPIED_NOTE)
    }

    async fn run_bulk(
        &self,
        session: &mut Session,
        list_id: i64,
        op: BulkOperation,
    ) -> CoreResult<Option<&'static str>> {
        match op {
            BulkOperation::SelectAll => {
                let items = items_or_empty(session.lists.as_ref(), list_id)
                    .await
                    .map_err(|err| err.in_node(CHECKLIST))?;
                session.selection.set_all(items.iter().map(|item| item.id));
                Ok(None)
            }
            BulkOperation::Delete => {
                delete_selected(session, CHECKLIST, list_id).await?;
                Ok(None)
            }
            BulkOperation::CopyToCurrent => {
                let items = items_or_empty(session.lists.as_ref(), list_id)
                    .await
                    .map_err(|err| err.in_node(CHECKLIST))?;
                self.copy_to_current(session, &items).await.map(Some)
            }
            BulkOperation::AddFromCurrent | BulkOperation::AddFromChecklist => {
                Err(unsupported(CHECKLIST, op))
            }
        }
    }
}

async fn render(session: &Session, list_id: i64, note: Option<&str>) -> CoreResult<Output> {
    let items = items_or_empty(session.lists.as_ref(), list_id)
        .await
        .map_err(|err| err.in_node(CHECKLIST))?;

    let mut keyboard = Keyboard::new();
    for row in item_rows(
        CHECKLIST,
        list_id,
        &items,
        &session.selection,
        Marker::Underline,
    ) {
        keyboard.push_row(row);
    }

    let mut controls = vec![start_button("⬅ Menu", FIRSTPAGE)];
    if !items.is_empty() {
        controls.push(bulk_button(
            "Select all",
            CHECKLIST,
            list_id,
            BulkOperation::SelectAll,
        ));
    }
    keyboard.push_row(controls);
    if !session.selection.is_empty() {
        keyboard.push_row(vec![
            bulk_button("Delete", CHECKLIST, list_id, BulkOperation::Delete),
            bulk_button(
                "To current list",
                CHECKLIST,
                list_id,
                BulkOperation::CopyToCurrent,
            ),
        ]);
    }

    let text = match note {
        Some(note) => format!("{note}\n{CHECKLIST_TEXT}"),
        None => CHECKLIST_TEXT.to_string(),
    };
    Ok(Output::new(text, keyboard))
}

impl Node for Checklist {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            if operation == START {
                session.selection.clear();
                let list_id = self.list_id(session, operation).await?;
                return render(session, list_id, None).await;
            }

            let command = codec::parse_operation(operation).map_err(|err| err.in_node(CHECKLIST))?;
            let note = match command {
                Command::Show { .. } => {
                    session.selection.clear();
                    None
                }
                Command::Toggle { item_id, .. } => {
                    session.selection.toggle(item_id);
                    None
                }
                Command::Bulk { list_id, op } => self.run_bulk(session, list_id, op).await?,
            };
            render(session, command.list_id(), note).await
        })
    }

    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        current_data: &'a str,
        text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let list_id = self.list_id(session, current_data).await?;
            let notice = add_entered_item(session, CHECKLIST, list_id, text).await?;
            let output = render(session, list_id, None).await?;
            Ok(announce(output, notice))
        })
    }
}
