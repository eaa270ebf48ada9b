//! Button token grammar.
//!
//! A token is `<node>_<operation>`. The operation of list screens is itself a
//! tiny grammar:
//!
//! - `123`      show list 123
//! - `123i45`   toggle selection of item 45 in list 123
//! - `123!`     start a bulk operation (the trailing sigil picks which one)
//!
//! Selection state never travels in a token; it stays in the session because
//! Telegram caps `callback_data` at 64 bytes.

use chrono::{Datelike, NaiveDate};

use crate::core::error::{CoreError, CoreResult};

/// Separator between node name and operation.
pub const SEPARATOR: char = '_';
/// Marker between list id and item id in a selection operation.
pub const ITEM_MARKER: char = 'i';
/// Telegram `callback_data` limit in bytes.
pub const MAX_TOKEN_BYTES: usize = 64;
/// Operation used to open a node from scratch.
pub const START: &str = "start";

const DAY_CODE_FORMAT: &str = "d%Y-%m-%d";
const MONTH_CODE_PREFIX: char = 'm';

/// Bulk operations triggered by a trailing sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperation {
    SelectAll,
    Delete,
    CopyToCurrent,
    AddFromCurrent,
    AddFromChecklist,
}

const BULK_SIGILS: &[(char, BulkOperation)] = &[
    ('*', BulkOperation::SelectAll),
    ('!', BulkOperation::Delete),
    ('&', BulkOperation::CopyToCurrent),
    ('^', BulkOperation::AddFromCurrent),
    ('#', BulkOperation::AddFromChecklist),
];

impl BulkOperation {
    pub fn from_sigil(sigil: char) -> Option<Self> {
        BULK_SIGILS
            .iter()
            .find_map(|(candidate, op)| (*candidate == sigil).then_some(*op))
    }

    pub fn sigil(self) -> char {
        BULK_SIGILS
            .iter()
            .find_map(|(sigil, op)| (*op == self).then_some(*sigil))
            .unwrap_or('!')
    }
}

/// Parsed list-screen operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Render the list.
    Show { list_id: i64 },
    /// Toggle one item in the session selection, then render.
    Toggle { list_id: i64, item_id: i64 },
    /// Run a bulk operation over the list.
    Bulk { list_id: i64, op: BulkOperation },
}

impl Command {
    pub fn list_id(&self) -> i64 {
        match self {
            Command::Show { list_id }
            | Command::Toggle { list_id, .. }
            | Command::Bulk { list_id, .. } => *list_id,
        }
    }

    pub fn is_start_operation(&self) -> bool {
        matches!(self, Command::Bulk { .. })
    }

    pub fn operation_kind(&self) -> Option<BulkOperation> {
        match self {
            Command::Bulk { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn selected_item_id(&self) -> Option<i64> {
        match self {
            Command::Toggle { item_id, .. } => Some(*item_id),
            _ => None,
        }
    }

    /// Renders the command back into its operation string.
    pub fn to_operation(&self) -> String {
        match self {
            Command::Show { list_id } => list_id.to_string(),
            Command::Toggle { list_id, item_id } => format!("{list_id}{ITEM_MARKER}{item_id}"),
            Command::Bulk { list_id, op } => format!("{list_id}{}", op.sigil()),
        }
    }
}

/// Joins a node name and an operation into a button token.
pub fn encode(node: &str, operation: &str) -> String {
    let token = format!("{node}{SEPARATOR}{operation}");
    if token.len() > MAX_TOKEN_BYTES {
        tracing::warn!(
            node,
            len = token.len(),
            "button token exceeds {MAX_TOKEN_BYTES} bytes"
        );
    }
    token
}

/// Splits a token on the first separator. The operation may contain more
/// separators.
///
/// # Errors
/// Returns a validation error when the token has no separator or no node name.
pub fn decode(token: &str) -> CoreResult<(&str, &str)> {
    match token.split_once(SEPARATOR) {
        Some((node, operation)) if !node.is_empty() => Ok((node, operation)),
        _ => Err(CoreError::validation(format!("malformed token '{token}'"))),
    }
}

/// Parses a list-screen operation.
///
/// A trailing bulk sigil wins over an embedded item marker, so `12i3!` is a
/// delete on list `12i3` (which then fails the numeric parse), never a toggle.
///
/// # Errors
/// Returns a validation error when a list or item id is not numeric.
pub fn parse_operation(operation: &str) -> CoreResult<Command> {
    if let Some(last) = operation.chars().next_back()
        && let Some(op) = BulkOperation::from_sigil(last)
    {
        let list_id = parse_id(&operation[..operation.len() - last.len_utf8()], operation)?;
        return Ok(Command::Bulk { list_id, op });
    }

    if let Some((list, item)) = operation.split_once(ITEM_MARKER) {
        return Ok(Command::Toggle {
            list_id: parse_id(list, operation)?,
            item_id: parse_id(item, operation)?,
        });
    }

    Ok(Command::Show {
        list_id: parse_id(operation, operation)?,
    })
}

fn parse_id(value: &str, operation: &str) -> CoreResult<i64> {
    value.parse::<i64>().map_err(|err| {
        CoreError::validation(format!("invalid id '{value}' in operation '{operation}'"))
            .with_details(err.to_string())
    })
}

/// `d2024-05-31`
pub fn day_code(day: NaiveDate) -> String {
    day.format(DAY_CODE_FORMAT).to_string()
}

/// # Errors
/// Returns a validation error when the code is not `dYYYY-MM-DD`.
pub fn parse_day_code(code: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(code, DAY_CODE_FORMAT).map_err(|err| {
        CoreError::validation(format!("invalid day code '{code}'")).with_details(err.to_string())
    })
}

/// `m2024-05`, identifying the month of `day`.
pub fn month_code(day: NaiveDate) -> String {
    format!("{MONTH_CODE_PREFIX}{:04}-{:02}", day.year(), day.month())
}

/// Returns the first day of the encoded month.
///
/// # Errors
/// Returns a validation error when the code is not `mYYYY-MM`.
pub fn parse_month_code(code: &str) -> CoreResult<NaiveDate> {
    let invalid = || CoreError::validation(format!("invalid month code '{code}'"));
    let rest = code.strip_prefix(MONTH_CODE_PREFIX).ok_or_else(invalid)?;
    let (year, month) = rest.split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_err| invalid())?;
    let month = month.parse::<u32>().map_err(|_err| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)
}
