use chrono::NaiveDate;

use crate::config::Config;
use crate::error::Result;
use crate::grid::{GridBuilder, LabelFormat, MonthGrid, WeekStart};
use crate::month::Direction;
use crate::render::Renderer;
use crate::store::{InstanceId, InstanceStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    Update,
    PrevMonth,
    NextMonth,
    Select(NaiveDate),
    Delete,
}

/// Drives render and navigation requests for all widget instances.
pub struct WidgetHost<R: Renderer> {
    store: InstanceStateStore,
    renderer: R,
    week_start: WeekStart,
    label_format: LabelFormat,
}

impl<R: Renderer> WidgetHost<R> {
    pub fn new(store: InstanceStateStore, renderer: R) -> Self {
        WidgetHost {
            store,
            renderer,
            week_start: WeekStart::default(),
            label_format: LabelFormat::default(),
        }
    }

    pub fn from_config(config: &Config, store: InstanceStateStore, renderer: R) -> Self {
        WidgetHost {
            store,
            renderer,
            week_start: config.week_start,
            label_format: config.label_format.clone(),
        }
    }

    pub fn store(&self) -> &InstanceStateStore {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn grid(&self, id: InstanceId) -> MonthGrid {
        GridBuilder::new(self.store.current(id))
            .week_start(self.week_start)
            .label_format(self.label_format.clone())
            .today(self.store.clock().today())
            .selected_opt(self.store.selected(id))
            .build()
    }

    pub fn render(&mut self, id: InstanceId) -> Result<()> {
        let grid = self.grid(id);
        self.renderer.render(id, &grid)
    }

    /// Renders every instance, continuing past failures. Reports the first
    /// failure, if any.
    pub fn update(&mut self, ids: &[InstanceId]) -> Result<()> {
        let mut first_err = None;

        for &id in ids {
            if let Err(e) = self.render(id) {
                log::warn!("Could not update instance {}: {}", id, e);
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    pub fn handle(&mut self, id: InstanceId, cmd: Cmd) -> Result<()> {
        match cmd {
            Cmd::Update => self.render(id),
            Cmd::PrevMonth => {
                self.store.advance(id, Direction::Prev);
                self.render(id)
            }
            Cmd::NextMonth => {
                self.store.advance(id, Direction::Next);
                self.render(id)
            }
            Cmd::Select(date) => {
                self.store.select(id, date);
                self.render(id)
            }
            Cmd::Delete => self.store.remove(id),
        }
    }

    /// Forgets the state of removed instances. Returns how many could not
    /// be deleted.
    pub fn deleted(&mut self, ids: &[InstanceId]) -> usize {
        self.store.remove_all(ids.iter().copied())
    }
}
