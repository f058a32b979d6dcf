use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::Write;

use crate::error::{Error, ErrorKind, Result};
use crate::month::YearMonth;

pub const COLUMNS: usize = 7;
pub const ROWS: usize = 6;
pub const CELLS: usize = COLUMNS * ROWS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl Default for WeekStart {
    fn default() -> Self {
        WeekStart::Sunday
    }
}

impl WeekStart {
    pub fn first_weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    /// Zero-based column of `weekday` in a week starting at `self`.
    pub fn column_of(self, weekday: Weekday) -> usize {
        match self {
            WeekStart::Sunday => weekday.num_days_from_sunday() as usize,
            WeekStart::Monday => weekday.num_days_from_monday() as usize,
        }
    }

    pub fn weekdays(self) -> [Weekday; COLUMNS] {
        let mut days = [self.first_weekday(); COLUMNS];
        for col in 1..COLUMNS {
            days[col] = days[col - 1].succ();
        }
        days
    }
}

/// A chrono strftime pattern used for month labels, checked on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelFormat(String);

impl LabelFormat {
    pub const DEFAULT: &'static str = "%B %Y";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn format(&self, month: &YearMonth) -> String {
        let mut label = String::new();
        if write!(label, "{}", month.first_day().format(&self.0)).is_err() {
            // Patterns asking for time fields cannot be rendered from a date.
            log::warn!("Label format '{}' does not apply to dates", self.0);
            return month.to_string();
        }
        label
    }
}

impl Default for LabelFormat {
    fn default() -> Self {
        LabelFormat(Self::DEFAULT.to_owned())
    }
}

impl TryFrom<String> for LabelFormat {
    type Error = Error;

    fn try_from(pattern: String) -> Result<Self> {
        if StrftimeItems::new(&pattern).any(|item| item == Item::Error) {
            return Err(Error::new(
                ErrorKind::InvalidFormat,
                &format!("'{}' is not a valid label format", pattern),
            ));
        }
        Ok(LabelFormat(pattern))
    }
}

impl From<LabelFormat> for String {
    fn from(format: LabelFormat) -> Self {
        format.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    day: Option<u32>,
    is_today: bool,
    is_selected: bool,
    weekday: Weekday,
}

impl GridCell {
    fn empty(weekday: Weekday) -> Self {
        GridCell {
            day: None,
            is_today: false,
            is_selected: false,
            weekday,
        }
    }

    pub fn day(&self) -> Option<u32> {
        self.day
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_none()
    }

    pub fn is_today(&self) -> bool {
        self.is_today
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    /// Weekday of the cell's column, also set for empty cells.
    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }
}

/// A month laid out on a fixed 6x7 grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    label: String,
    cells: [GridCell; CELLS],
    anchor: YearMonth,
    week_start: WeekStart,
}

impl MonthGrid {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cells(&self) -> &[GridCell; CELLS] {
        &self.cells
    }

    pub fn anchor(&self) -> YearMonth {
        self.anchor
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(COLUMNS)
    }

    pub fn index_of(&self, day: u32) -> Option<usize> {
        self.cells.iter().position(|cell| cell.day == Some(day))
    }

    pub fn today_index(&self) -> Option<usize> {
        self.cells.iter().position(GridCell::is_today)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.cells.iter().position(GridCell::is_selected)
    }
}

pub struct GridBuilder {
    target: YearMonth,
    week_start: WeekStart,
    today: Option<NaiveDate>,
    selected: Option<NaiveDate>,
    label_format: LabelFormat,
}

impl GridBuilder {
    pub fn new(target: YearMonth) -> Self {
        GridBuilder {
            target,
            week_start: WeekStart::default(),
            today: None,
            selected: None,
            label_format: LabelFormat::default(),
        }
    }

    pub fn week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today_opt(mut self, today: Option<NaiveDate>) -> Self {
        self.today = today;
        self
    }

    pub fn selected(mut self, selected: NaiveDate) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn selected_opt(mut self, selected: Option<NaiveDate>) -> Self {
        self.selected = selected;
        self
    }

    pub fn label_format(mut self, label_format: LabelFormat) -> Self {
        self.label_format = label_format;
        self
    }

    pub fn build(self) -> MonthGrid {
        let target = self.target;
        let num_days = target.num_days();
        let offset = self.week_start.column_of(target.first_day().weekday());

        let weekdays = self.week_start.weekdays();
        let mut cells = [GridCell::empty(weekdays[0]); CELLS];
        for (idx, cell) in cells.iter_mut().enumerate() {
            cell.weekday = weekdays[idx % COLUMNS];
        }

        let highlighted = |date: Option<NaiveDate>| {
            date.filter(|d| target.contains(d)).map(|d| d.day())
        };
        let today = highlighted(self.today);
        let selected = highlighted(self.selected);

        for day in 1..=num_days {
            let idx = offset + day as usize - 1;
            debug_assert!(idx < CELLS, "day {} of {} lands outside the grid", day, target);

            let cell = &mut cells[idx];
            cell.day = Some(day);
            cell.is_today = today == Some(day);
            cell.is_selected = selected == Some(day);
        }

        MonthGrid {
            label: self.label_format.format(&target),
            cells,
            anchor: target,
            week_start: self.week_start,
        }
    }
}

/// Lays out `target` with Sunday as the first column, highlighting `today`
/// when it falls into `target`.
pub fn compute_grid(target: YearMonth, today: Option<NaiveDate>) -> MonthGrid {
    GridBuilder::new(target).today_opt(today).build()
}
