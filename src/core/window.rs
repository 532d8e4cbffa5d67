//! The trailing date window covered by a report

use chrono::{Days, NaiveDate};

/// Days reached back from today. Today itself is included as well.
pub const WINDOW_DAYS: u64 = 90;

/// Returns `today - 90 ..= today` in ascending order (91 dates).
pub fn trailing(today: NaiveDate) -> Vec<NaiveDate> {
    (0..=WINDOW_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}
