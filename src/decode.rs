//! Decoding of loosely-typed day documents into [`DayData`].
//!
//! A day document looks like
//!
//! ```json
//! {
//!   "interval_date": "2024-03-10T00:00:00+11:00",
//!   "meter_consumptions_kwh": [0.21, 0.19],
//!   "meter_generations_kwh": [0.0, 0.0],
//!   "solar_generations_kwh": [0.0, 0.0],
//!   "charge_quantities_kwh": [0.0, 0.0],
//!   "discharge_quantities_kwh": [0.2, 0.18]
//! }
//! ```
//!
//! Every array is optional. A document without a usable `interval_date`
//! decodes to [`Decoded::Empty`], never to an error.

use crate::model::{DayData, IntervalLength, Readings, SiteSettings};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const INTERVAL_DATE: &str = "interval_date";
pub const METER_CONSUMPTIONS: &str = "meter_consumptions_kwh";
pub const METER_GENERATIONS: &str = "meter_generations_kwh";
pub const SOLAR_GENERATIONS: &str = "solar_generations_kwh";
pub const CHARGE_QUANTITIES: &str = "charge_quantities_kwh";
pub const DISCHARGE_QUANTITIES: &str = "discharge_quantities_kwh";

/// Outcome of decoding one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Valid(DayData),
    Empty,
}

impl Decoded {
    pub fn into_option(self) -> Option<DayData> {
        match self {
            Decoded::Valid(day) => Some(day),
            Decoded::Empty => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentDecoder {
    interval_length: IntervalLength,
    utc_offset: FixedOffset,
    empty: Arc<DayData>,
}

impl DocumentDecoder {
    /// `today` fixes the date of the shared empty sentinel.
    pub fn new(settings: &SiteSettings, today: NaiveDate) -> Self {
        Self {
            interval_length: settings.interval_length,
            utc_offset: settings.utc_offset,
            empty: Arc::new(DayData::empty_yesterday(today, settings.interval_length)),
        }
    }

    /// The shared "empty yesterday" sentinel.
    pub fn empty(&self) -> Arc<DayData> {
        Arc::clone(&self.empty)
    }

    pub fn decode(&self, document: Option<&Value>) -> Decoded {
        let Some(document) = document else {
            debug!("Absent day document, nothing to decode");
            return Decoded::Empty;
        };

        let Some(interval_date) = self.interval_date(document) else {
            warn!("Invalid day document without a usable {}: {}", INTERVAL_DATE, document);
            return Decoded::Empty;
        };

        let readings = Readings {
            meter_consumptions: read_series(document, METER_CONSUMPTIONS),
            meter_generations: read_series(document, METER_GENERATIONS),
            solar_generations: read_series(document, SOLAR_GENERATIONS),
            charge_quantities: read_series(document, CHARGE_QUANTITIES),
            discharge_quantities: read_series(document, DISCHARGE_QUANTITIES),
        };

        let day = DayData::new(interval_date, self.interval_length, readings);
        let per_day = self.interval_length.per_day();
        if day.interval_count() > per_day {
            warn!(
                %interval_date,
                intervals = day.interval_count(),
                "Day document holds more than {} {} intervals, labels run past midnight",
                per_day,
                self.interval_length
            );
        }

        Decoded::Valid(day)
    }

    /// Decodes, falling back to the shared sentinel.
    pub fn decode_or_empty(&self, document: Option<&Value>) -> Arc<DayData> {
        match self.decode(document) {
            Decoded::Valid(day) => Arc::new(day),
            Decoded::Empty => self.empty(),
        }
    }

    /// Local calendar date of a document, if it carries one.
    pub fn interval_date(&self, document: &Value) -> Option<NaiveDate> {
        document
            .get(INTERVAL_DATE)
            .and_then(|value| parse_interval_date(value, &self.utc_offset))
    }
}

/// Accepts an RFC 3339 timestamp, a `YYYY-MM-DD` date, or a Firestore
/// timestamp object (`seconds`/`_seconds` plus optional nanoseconds).
pub fn parse_interval_date(value: &Value, utc_offset: &FixedOffset) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(utc_offset).date_naive());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
        }
        Value::Object(fields) => {
            let seconds = ["seconds", "_seconds"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_i64))?;
            let nanos = ["nanos", "nanoseconds", "_nanoseconds"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_u64))
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).ok()?;

            DateTime::from_timestamp(seconds, nanos)
                .map(|dt| dt.with_timezone(utc_offset).date_naive())
        }
        _ => None,
    }
}

fn read_series(document: &Value, field: &str) -> Vec<f64> {
    match document.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let values: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
            values.unwrap_or_else(|| {
                debug!("Non-numeric entries in {}, treating as absent", field);
                Vec::new()
            })
        }
        Some(other) => {
            debug!("Expected an array for {}, got {}", field, other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SiteId;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn decoder_with_offset(offset_hours: i32) -> DocumentDecoder {
        let settings = SiteSettings::new(
            SiteId::new("6408091979"),
            IntervalLength::ThirtyMinutes,
            FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        );
        DocumentDecoder::new(&settings, date(2024, 3, 11))
    }

    fn decoder() -> DocumentDecoder {
        decoder_with_offset(0)
    }

    fn full_document() -> Value {
        json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": [0.5, 1.25, 0.35],
            "meter_generations_kwh": [0.0, 0.4, 2.0],
            "solar_generations_kwh": [0.0, 1.0, 3.5],
            "charge_quantities_kwh": [0.0, 0.1, 1.0],
            "discharge_quantities_kwh": [0.2, 0.0, 0.0]
        })
    }

    #[test]
    fn test_decode_full_document() {
        let day = decoder().decode(Some(&full_document())).into_option().unwrap();

        assert_eq!(day.interval_date(), date(2024, 3, 10));
        assert_eq!(day.meter_consumptions(), &[0.5, 1.25, 0.35]);
        assert_eq!(day.solar_generations(), &[0.0, 1.0, 3.5]);
        assert_eq!(day.discharge_quantities(), &[0.2, 0.0, 0.0]);
        assert_eq!(day.meter_consumption_total(), 2.1);
    }

    #[test]
    fn test_decode_missing_arrays_become_empty() {
        let doc = json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": [1.0, 2.0],
            "solar_generations_kwh": null
        });

        let day = decoder().decode(Some(&doc)).into_option().unwrap();

        assert_eq!(day.meter_consumptions(), &[1.0, 2.0]);
        assert!(day.meter_generations().is_empty());
        assert!(day.solar_generations().is_empty());
        assert!(day.charge_quantities().is_empty());
        assert!(day.discharge_quantities().is_empty());
    }

    #[test]
    fn test_decode_non_numeric_array_becomes_empty() {
        let doc = json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": [1.0, "oops"],
            "meter_generations_kwh": "not an array"
        });

        let day = decoder().decode(Some(&doc)).into_option().unwrap();

        assert!(day.meter_consumptions().is_empty());
        assert!(day.meter_generations().is_empty());
    }

    #[test]
    fn test_decode_passes_negative_values_through() {
        let doc = json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": [-1.5]
        });

        let day = decoder().decode(Some(&doc)).into_option().unwrap();

        assert_eq!(day.meter_consumptions(), &[-1.5]);
    }

    #[test]
    fn test_decode_without_interval_date_is_the_sentinel() {
        let decoder = decoder();
        let doc = json!({ "meter_consumptions_kwh": [1.0] });

        assert_eq!(decoder.decode(Some(&doc)), Decoded::Empty);
        assert!(Arc::ptr_eq(&decoder.decode_or_empty(Some(&doc)), &decoder.empty()));
        assert_eq!(decoder.empty().interval_date(), date(2024, 3, 10));
    }

    #[test]
    fn test_decode_absent_document_is_the_sentinel() {
        let decoder = decoder();

        assert_eq!(decoder.decode(None), Decoded::Empty);
        assert!(Arc::ptr_eq(&decoder.decode_or_empty(None), &decoder.empty()));
    }

    #[test]
    fn test_decode_unparseable_interval_date_is_empty() {
        let doc = json!({ "interval_date": "last tuesday" });

        assert_eq!(decoder().decode(Some(&doc)), Decoded::Empty);
    }

    #[test]
    fn test_decode_rfc3339_uses_site_offset() {
        let doc = json!({ "interval_date": "2024-03-09T13:00:00Z" });

        let utc = decoder().decode(Some(&doc)).into_option().unwrap();
        let melbourne = decoder_with_offset(11).decode(Some(&doc)).into_option().unwrap();

        assert_eq!(utc.interval_date(), date(2024, 3, 9));
        assert_eq!(melbourne.interval_date(), date(2024, 3, 10));
    }

    #[test]
    fn test_decode_firestore_timestamp_object() {
        // 2024-03-10T00:00:00Z
        let doc = json!({ "interval_date": { "_seconds": 1710028800, "_nanoseconds": 0 } });
        let day = decoder().decode(Some(&doc)).into_option().unwrap();
        assert_eq!(day.interval_date(), date(2024, 3, 10));

        let doc = json!({ "interval_date": { "seconds": 1710028800 } });
        let day = decoder().decode(Some(&doc)).into_option().unwrap();
        assert_eq!(day.interval_date(), date(2024, 3, 10));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = decoder();
        let doc = full_document();

        assert_eq!(decoder.decode(Some(&doc)), decoder.decode(Some(&doc)));
    }

    #[test]
    fn test_consumption_total_matches_rounded_sum() {
        let doc = json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": [0.11, 0.22, 0.33, 0.44]
        });

        let day = decoder().decode(Some(&doc)).into_option().unwrap();

        assert_eq!(day.meter_consumption_total(), 1.1);
    }

    #[test]
    fn test_overlong_day_is_kept_whole() {
        let doc = json!({
            "interval_date": "2024-03-10",
            "meter_consumptions_kwh": vec![0.1; 50]
        });

        let day = decoder().decode(Some(&doc)).into_option().unwrap();
        let labels = day.interval_labels();

        assert!(day.interval_count() > IntervalLength::ThirtyMinutes.per_day());
        assert_eq!(labels.len(), 50);
        assert_eq!(labels[47], "23:30");
        assert_eq!(labels[48], "00:00");
    }
}
