//! Calendar source for month directories and report subjects

use chrono::NaiveDate;

/// Supplies "today" in the server's calendar
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the server's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Clock pinned to a single date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Storage directory name for the month containing `date` (e.g. `202403`)
pub fn month_dir_name(date: NaiveDate) -> String {
    date.format("%Y%m").to_string()
}
