use crate::model::interval::IntervalLength;
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// The five raw series of a day document, one entry per interval.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Readings {
    pub meter_consumptions: Vec<f64>,
    pub meter_generations: Vec<f64>,
    pub solar_generations: Vec<f64>,
    pub charge_quantities: Vec<f64>,
    pub discharge_quantities: Vec<f64>,
}

impl Readings {
    fn lengths(&self) -> [usize; 5] {
        [
            self.meter_consumptions.len(),
            self.meter_generations.len(),
            self.solar_generations.len(),
            self.charge_quantities.len(),
            self.discharge_quantities.len(),
        ]
    }
}

/// One day of interval readings.
///
/// Immutable once built: every update produces a new instance. Totals and
/// labels are computed on access. Series of different lengths are tolerated;
/// positions missing from a shorter series are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub struct DayData {
    interval_date: NaiveDate,
    interval_length: IntervalLength,
    readings: Readings,
}

impl DayData {
    pub fn new(interval_date: NaiveDate, interval_length: IntervalLength, readings: Readings) -> Self {
        Self {
            interval_date,
            interval_length,
            readings,
        }
    }

    /// A day with no readings at all.
    pub fn empty(interval_date: NaiveDate, interval_length: IntervalLength) -> Self {
        Self::new(interval_date, interval_length, Readings::default())
    }

    /// The placeholder shown before any document arrives: yesterday, no data.
    pub fn empty_yesterday(today: NaiveDate, interval_length: IntervalLength) -> Self {
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self::empty(yesterday, interval_length)
    }

    pub fn interval_date(&self) -> NaiveDate {
        self.interval_date
    }

    pub fn meter_consumptions(&self) -> &[f64] {
        &self.readings.meter_consumptions
    }

    pub fn meter_generations(&self) -> &[f64] {
        &self.readings.meter_generations
    }

    pub fn solar_generations(&self) -> &[f64] {
        &self.readings.solar_generations
    }

    pub fn charge_quantities(&self) -> &[f64] {
        &self.readings.charge_quantities
    }

    pub fn discharge_quantities(&self) -> &[f64] {
        &self.readings.discharge_quantities
    }

    pub fn is_empty(&self) -> bool {
        self.interval_count() == 0
    }

    /// Number of labelled intervals: the length of the longest series.
    pub fn interval_count(&self) -> usize {
        self.readings.lengths().into_iter().max().unwrap_or(0)
    }

    /// Length every series shares, i.e. the shortest one.
    pub fn aligned_len(&self) -> usize {
        self.readings.lengths().into_iter().min().unwrap_or(0)
    }

    /// 1-based positions of the intervals.
    pub fn intervals(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.interval_count()
    }

    /// Wall-clock "HH:MM" start of each interval.
    pub fn interval_labels(&self) -> Vec<String> {
        let midnight = self.interval_date.and_time(NaiveTime::MIN);
        let step = self.interval_length.duration();

        self.intervals()
            .map(|position| {
                let offset = step * (position as i32 - 1);
                (midnight + offset).format("%H:%M").to_string()
            })
            .collect()
    }

    pub fn meter_consumption_total(&self) -> f64 {
        round_to_tenth(self.readings.meter_consumptions.iter().sum())
    }

    pub fn meter_generation_total(&self) -> f64 {
        round_to_tenth(self.readings.meter_generations.iter().sum())
    }
}

/// Rounds to one decimal place, halves away from zero.
fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
