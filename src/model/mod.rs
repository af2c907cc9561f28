pub mod day_data;
pub mod interval;

pub use day_data::{DayData, Readings};
pub use interval::{IntervalLength, SiteId, SiteSettings, Uom, UOM};
