use shoplist_core::backend::{ListKind, ensure_special_list, items_or_empty};
use shoplist_core::core::codec::{self, BulkOperation, Command, START};
use shoplist_core::core::{CoreResult, Keyboard, Node, NodeFuture, Output, Session};

use super::{
    CURRENTLIST, Clock, FIRSTPAGE, Marker, add_entered_item, announce, bulk_button,
    delete_selected, item_rows, start_button, unsupported,
};

pub(crate) const CURRENT_LIST_NAME: &str = "Current list";
const CURRENT_LIST_TEXT: &str = "Current list. Send an item name to add it.";

/// What the community needs to buy next, independent of any shop or day.
pub(crate) struct CurrentList {
    today: Clock,
}

impl CurrentList {
    pub(crate) fn new(today: Clock) -> Self {
        Self { today }
    }

    async fn list_id(&self, session: &Session, data: &str) -> CoreResult<i64> {
        if data == START {
            ensure_special_list(
                session.lists.as_ref(),
                ListKind::CurrentList,
                CURRENT_LIST_NAME,
                (self.today)(),
            )
            .await
            .map_err(|err| err.in_node(CURRENTLIST))
        } else {
            codec::parse_operation(data)
                .map(|command| command.list_id())
                .map_err(|err| err.in_node(CURRENTLIST))
        }
    }
}

async fn render(session: &Session, list_id: i64) -> CoreResult<Output> {
    let items = items_or_empty(session.lists.as_ref(), list_id)
        .await
        .map_err(|err| err.in_node(CURRENTLIST))?;

    let mut keyboard = Keyboard::new();
    for row in item_rows(
        CURRENTLIST,
        list_id,
        &items,
        &session.selection,
        Marker::StrikeThrough,
    ) {
        keyboard.push_row(row);
    }

    let mut controls = vec![start_button("⬅ Menu", FIRSTPAGE)];
    if !session.selection.is_empty() {
        controls.push(bulk_button(
            "Delete",
            CURRENTLIST,
            list_id,
            BulkOperation::Delete,
        ));
    }
    keyboard.push_row(controls);

    Ok(Output::new(CURRENT_LIST_TEXT, keyboard))
}

impl Node for CurrentList {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            if operation == START {
                session.selection.clear();
                let list_id = self.list_id(session, operation).await?;
                return render(session, list_id).await;
            }

            let command =
                codec::parse_operation(operation).map_err(|err| err.in_node(CURRENTLIST))?;
            match command {
                Command::Show { .. } => session.selection.clear(),
                Command::Toggle { item_id, .. } => {
                    session.selection.toggle(item_id);
                }
                Command::Bulk {
                    list_id,
                    op: BulkOperation::Delete,
                } => delete_selected(session, CURRENTLIST, list_id).await?,
                Command::Bulk { op, .. } => return Err(unsupported(CURRENTLIST, op)),
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
            let list_id = self.list_id(session, current_data).await?;
            let notice = add_entered_item(session, CURRENTLIST, list_id, text).await?;
            let output = render(session, list_id).await?;
            Ok(announce(output, notice))
        })
    }
}
