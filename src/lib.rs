pub mod clock;
pub mod config;
pub mod error;
pub mod grid;
pub mod host;
pub mod month;
pub mod render;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use grid::{compute_grid, GridBuilder, GridCell, MonthGrid, WeekStart};
pub use month::{Direction, YearMonth};
pub use store::{InstanceId, InstanceStateStore};
