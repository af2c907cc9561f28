pub mod chart;

pub use chart::Chart;

use crate::model::UOM;
use crate::tracker::{Phase, TrackerSnapshot};
use chrono::NaiveDate;
use serde::Serialize;

/// Inputs of the calendar picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarProps {
    pub value: NaiveDate,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub consumption: f64,
    pub generation: f64,
    pub uom: &'static str,
}

/// Everything a client needs to draw the daily page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyView {
    pub phase: Phase,
    pub calendar: CalendarProps,
    pub totals: Totals,
    pub chart: Chart,
}

impl DailyView {
    pub fn from_snapshot(snapshot: &TrackerSnapshot) -> Self {
        let day = &snapshot.day;

        Self {
            phase: snapshot.phase,
            calendar: CalendarProps {
                value: snapshot.selected_date,
                min_date: snapshot.min_date,
                max_date: snapshot.max_date,
            },
            totals: Totals {
                consumption: day.meter_consumption_total(),
                generation: day.meter_generation_total(),
                uom: UOM.name,
            },
            chart: Chart::breakdown(day, &UOM),
        }
    }
}
