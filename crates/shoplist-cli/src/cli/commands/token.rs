//! Token inspection.

use anyhow::{Context, Result};
use shoplist_core::core::codec::{self, BulkOperation, Command, MAX_TOKEN_BYTES, START};

pub fn inspect(token: &str) -> Result<()> {
    for line in describe(token)? {
        println!("{line}");
    }
    Ok(())
}

fn describe(token: &str) -> Result<Vec<String>> {
    let (node, operation) = codec::decode(token).context("decode token")?;
    let mut lines = vec![
        format!("node: {node}"),
        format!("operation: {operation}"),
        format!("action: {}", action(operation)),
    ];
    if token.len() > MAX_TOKEN_BYTES {
        lines.push(format!(
            "warning: {} bytes, Telegram accepts at most {MAX_TOKEN_BYTES}",
            token.len()
        ));
    }
    Ok(lines)
}

fn action(operation: &str) -> String {
    if operation == START {
        return "open the screen".to_string();
    }
    if let Ok(day) = codec::parse_day_code(operation) {
        return format!("show day {}", day.format("%Y-%m-%d"));
    }
    if let Ok(month) = codec::parse_month_code(operation) {
        return format!("show month {}", month.format("%B %Y"));
    }
    match codec::parse_operation(operation) {
        Ok(Command::Show { list_id }) => format!("show list {list_id}"),
        Ok(Command::Toggle { list_id, item_id }) => {
            format!("toggle item {item_id} on list {list_id}")
        }
        Ok(Command::Bulk { list_id, op }) => format!("{} on list {list_id}", bulk_label(op)),
        Err(_) => "screen-specific operation".to_string(),
    }
}

fn bulk_label(op: BulkOperation) -> &'static str {
    match op {
        BulkOperation::SelectAll => "select all",
        BulkOperation::Delete => "delete selected",
        BulkOperation::CopyToCurrent => "copy selected to current list",
        BulkOperation::AddFromCurrent => "move current list items",
        BulkOperation::AddFromChecklist => "copy checklist items",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_list_operations() {
        assert_eq!(action("12"), "show list 12");
        assert_eq!(action("12i3"), "toggle item 3 on list 12");
        assert_eq!(action("12!"), "delete selected on list 12");
        assert_eq!(action("7^"), "move current list items on list 7");
    }

    #[test]
    fn describes_calendar_codes() {
        assert_eq!(action("start"), "open the screen");
        assert_eq!(action("d2024-05-15"), "show day 2024-05-15");
        assert_eq!(action("m2024-05"), "show month May 2024");
        assert_eq!(action("leave"), "screen-specific operation");
    }

    #[test]
    fn splits_on_first_separator() {
        let lines = describe("calendar_m2024-05").unwrap();
        assert_eq!(lines[0], "node: calendar");
        assert_eq!(lines[1], "operation: m2024-05");
    }

    #[test]
    fn warns_about_long_tokens() {
        let token = format!("shoppingitems_{}", "1".repeat(60));
        let lines = describe(&token).unwrap();
        assert!(lines.last().unwrap().starts_with("warning:"));
    }

    #[test]
    fn rejects_tokens_without_node() {
        assert!(describe("_start").is_err());
        assert!(describe("start").is_err());
    }
}
