use chrono::Weekday;
use std::fmt::{self, Display};
use std::io::Write;
use termion::color;

use crate::error::{Error, ErrorKind, Result};
use crate::grid::{GridCell, MonthGrid};
use crate::store::InstanceId;

pub const DEFAULT_TODAY_SYMBOL: char = '*';
pub const DEFAULT_SELECTED_SYMBOL: char = '>';

/// Turns a computed grid into something visible for one widget instance.
pub trait Renderer {
    fn render(&mut self, id: InstanceId, grid: &MonthGrid) -> Result<()>;
}

struct DayCell<'a> {
    cell: &'a GridCell,
    today_symbol: Option<char>,
    selected_symbol: Option<char>,
    colored: bool,
}

/// Saturdays in blue, Sundays in red.
fn weekend_color(cell: &GridCell) -> Option<String> {
    if !cell.is_weekend() {
        return None;
    }

    match cell.weekday() {
        Weekday::Sat => Some(color::Fg(color::Blue).to_string()),
        _ => Some(color::Fg(color::Red).to_string()),
    }
}

impl DayCell<'_> {
    const CELL_WIDTH: usize = 4;
}

impl Display for DayCell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = match self.cell.day() {
            Some(day) => day,
            None => return write!(f, "{:width$}", "", width = Self::CELL_WIDTH),
        };

        let arg_today = if self.cell.is_today() {
            self.today_symbol.unwrap_or(' ')
        } else {
            ' '
        };

        let arg_selected = if self.cell.is_selected() {
            self.selected_symbol.unwrap_or(' ')
        } else {
            ' '
        };

        write!(f, "{}{}", arg_today, arg_selected)?;

        let fg = if self.colored {
            weekend_color(self.cell)
        } else {
            None
        };

        match fg {
            Some(fg) => write!(f, "{}{:>2}{}", fg, day, color::Fg(color::Reset)),
            None => write!(f, "{:>2}", day),
        }
    }
}

/// Prints the month as plain text: label, weekday header and six rows.
pub struct TextRenderer<W: Write> {
    out: W,
    today_symbol: Option<char>,
    selected_symbol: Option<char>,
    colored: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        TextRenderer {
            out,
            today_symbol: Some(DEFAULT_TODAY_SYMBOL),
            selected_symbol: Some(DEFAULT_SELECTED_SYMBOL),
            colored: false,
        }
    }

    /// Colors weekend days with terminal escape codes.
    pub fn colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn today_symbol_opt(mut self, symbol: Option<char>) -> Self {
        self.today_symbol = symbol;
        self
    }

    pub fn selected_symbol_opt(mut self, symbol: Option<char>) -> Self {
        self.selected_symbol = symbol;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_grid(&mut self, grid: &MonthGrid) -> std::io::Result<()> {
        writeln!(self.out, "{}", grid.label())?;

        let header: String = grid
            .week_start()
            .weekdays()
            .iter()
            .map(|day| format!("{:>width$}", day.to_string(), width = DayCell::CELL_WIDTH))
            .collect();
        writeln!(self.out, "{}", header)?;

        for row in grid.rows() {
            let line: String = row
                .iter()
                .map(|cell| {
                    DayCell {
                        cell,
                        today_symbol: self.today_symbol,
                        selected_symbol: self.selected_symbol,
                        colored: self.colored,
                    }
                    .to_string()
                })
                .collect();
            writeln!(self.out, "{}", line.trim_end())?;
        }

        self.out.flush()
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, id: InstanceId, grid: &MonthGrid) -> Result<()> {
        log::debug!("Rendering {} for instance {}", grid.anchor(), id);
        self.write_grid(grid).map_err(|e| {
            Error::new(
                ErrorKind::Render,
                &format!("Could not draw instance {}: {}", id, e),
            )
        })
    }
}
