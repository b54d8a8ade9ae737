//! Calendar-month windows relative to "today"
//!
//! Windows are always computed from the `today` argument at call time.
//! Callers pass the current local date on every run; nothing here caches
//! a window across calls.

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::models::PeriodWindow;

/// Current local date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = first_of_month(date);
    let next_first = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first);
    (next_first - first).num_days() as u32
}

/// Last day of the month containing `date`
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date) + Duration::days(days_in_month(date) as i64 - 1)
}

/// [first, last] day of the calendar month before `today`
///
/// Handles year rollover: today = 2025-01-15 gives 2024-12-01 .. 2024-12-31.
pub fn previous_month_window(today: NaiveDate) -> PeriodWindow {
    let last = first_of_month(today) - Duration::days(1);
    PeriodWindow {
        start: first_of_month(last),
        end: last,
    }
}

/// [first day of current month, yesterday]
///
/// Today's partial day is excluded. On the first of the month there is no
/// complete day yet, so the window is None.
pub fn current_month_window(today: NaiveDate) -> Option<PeriodWindow> {
    PeriodWindow::new(first_of_month(today), today - Duration::days(1))
}

/// The whole current month (the forecast horizon)
pub fn current_month_span(today: NaiveDate) -> PeriodWindow {
    PeriodWindow {
        start: first_of_month(today),
        end: last_of_month(today),
    }
}
