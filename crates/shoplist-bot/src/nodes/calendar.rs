use chrono::{Datelike, Months, NaiveDate};
use shoplist_core::core::codec::{self, START};
use shoplist_core::core::{Button, CoreResult, Keyboard, Node, NodeFuture, Output, Session};

use super::{CALENDAR, Clock, DAYSHOPPINGS, FIRSTPAGE, start_button, underline};

const CALENDAR_TEXT: &str = "Calendar";
const WEEK_DAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const BLANK: &str = " ";
/// Navigation stops one year away from today.
const NAVIGATION_LIMIT_DAYS: i64 = 365;

/// Month grid. Days with lists are underlined and open that day's lists.
pub(crate) struct Calendar {
    today: Clock,
}

impl Calendar {
    pub(crate) fn new(today: Clock) -> Self {
        Self { today }
    }

    fn month_of(&self, operation: &str) -> CoreResult<NaiveDate> {
        if operation == START {
            Ok(first_of_month((self.today)()))
        } else {
            codec::parse_month_code(operation).map_err(|err| err.in_node(CALENDAR))
        }
    }

    async fn render(&self, session: &Session, month: NaiveDate) -> CoreResult<Output> {
        let days = match session.lists.get_list_days(month).await {
            Ok(days) => days,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.in_node(CALENDAR)),
        };
        Ok(Output::new(
            CALENDAR_TEXT,
            month_grid(month, &days, (self.today)()),
        ))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn previous_month(month: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    if (today - month).num_days() >= NAVIGATION_LIMIT_DAYS {
        return None;
    }
    month.checked_sub_months(Months::new(1))
}

fn next_month(month: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    if (month - today).num_days() >= NAVIGATION_LIMIT_DAYS {
        return None;
    }
    month.checked_add_months(Months::new(1))
}

/// Builds the keyboard for the month starting at `month`.
///
/// Cells that do nothing re-render the same month.
fn month_grid(month: NaiveDate, list_days: &[u32], today: NaiveDate) -> Keyboard {
    let current = codec::month_code(month);
    let idle = |label: &str| Button::new(label, CALENDAR, &current);

    let mut keyboard = Keyboard::new()
        .row(vec![idle(&month.format("%B %Y").to_string())])
        .row(WEEK_DAYS.into_iter().map(&idle).collect());

    let offset = month.weekday().num_days_from_monday() as usize;
    let mut row: Vec<Button> = (0..offset).map(|_| idle(BLANK)).collect();
    for day in month.iter_days().take_while(|day| day.month() == month.month()) {
        let mut label = day.day().to_string();
        if list_days.contains(&day.day()) {
            label = underline(&label);
        }
        row.push(Button::new(label, DAYSHOPPINGS, &codec::day_code(day)));
        if row.len() == WEEK_DAYS.len() {
            keyboard.push_row(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        row.resize_with(WEEK_DAYS.len(), || idle(BLANK));
        keyboard.push_row(row);
    }

    let previous = previous_month(month, today).map_or_else(
        || idle(BLANK),
        |prev| Button::new("<", CALENDAR, &codec::month_code(prev)),
    );
    let next = next_month(month, today).map_or_else(
        || idle(BLANK),
        |next| Button::new(">", CALENDAR, &codec::month_code(next)),
    );
    keyboard.row(vec![previous, start_button("Back", FIRSTPAGE), next])
}

impl Node for Calendar {
    fn on_callback<'a>(&'a self, session: &'a mut Session, operation: &'a str) -> NodeFuture<'a> {
        Box::pin(async move {
            let month = self.month_of(operation)?;
            self.render(session, month).await
        })
    }

    fn on_message<'a>(
        &'a self,
        session: &'a mut Session,
        current_data: &'a str,
        _text: &'a str,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let month = self
                .month_of(current_data)
                .unwrap_or_else(|_err| first_of_month((self.today)()));
            self.render(session, month).await
        })
    }
}
