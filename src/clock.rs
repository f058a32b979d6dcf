use chrono::{Local, NaiveDate};

use crate::month::YearMonth;

/// Source of the wall-clock "now" used for defaulting and highlighting.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    fn current_month(&self) -> YearMonth {
        YearMonth::from(self.today())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day. Used for reproducible output and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_month() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(clock.current_month(), YearMonth::new(2024, 12).unwrap());
    }

    #[test]
    fn local_clock_matches_default_month() {
        // Could straddle midnight at month end, so compare twice.
        let before = YearMonth::default();
        let current = LocalClock.current_month();
        let after = YearMonth::default();
        assert!(current == before || current == after);
    }
}
