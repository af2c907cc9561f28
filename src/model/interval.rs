use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of measure of every reading in a day document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Uom {
    pub id: &'static str,
    pub name: &'static str,
}

pub const UOM: Uom = Uom {
    id: "KWH",
    name: "kWh",
};

/// Sampling granularity of all metering series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum IntervalLength {
    FifteenMinutes,
    #[default]
    ThirtyMinutes,
}

impl IntervalLength {
    pub fn minutes(self) -> u32 {
        match self {
            IntervalLength::FifteenMinutes => 15,
            IntervalLength::ThirtyMinutes => 30,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }

    /// Number of intervals in a full calendar day.
    pub fn per_day(self) -> usize {
        (24 * 60 / self.minutes()) as usize
    }
}

impl TryFrom<u32> for IntervalLength {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            15 => Ok(IntervalLength::FifteenMinutes),
            30 => Ok(IntervalLength::ThirtyMinutes),
            other => Err(format!(
                "interval length must be 15 or 30 minutes, got {}",
                other
            )),
        }
    }
}

impl From<IntervalLength> for u32 {
    fn from(length: IntervalLength) -> Self {
        length.minutes()
    }
}

impl fmt::Display for IntervalLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Identifier of the metered site whose day documents are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Site-wide constants handed to the decoder and the range tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub site_id: SiteId,
    pub interval_length: IntervalLength,
    /// Offset used to turn document timestamps into local calendar dates.
    pub utc_offset: FixedOffset,
}

impl SiteSettings {
    pub fn new(site_id: SiteId, interval_length: IntervalLength, utc_offset: FixedOffset) -> Self {
        Self {
            site_id,
            interval_length,
            utc_offset,
        }
    }

    /// Today's date at the site.
    pub fn today(&self) -> chrono::NaiveDate {
        chrono::Utc::now()
            .with_timezone(&self.utc_offset)
            .date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_length_from_minutes() {
        assert_eq!(
            IntervalLength::try_from(15),
            Ok(IntervalLength::FifteenMinutes)
        );
        assert_eq!(IntervalLength::try_from(30), Ok(IntervalLength::ThirtyMinutes));
        assert!(IntervalLength::try_from(20).is_err());
    }

    #[test]
    fn test_interval_length_per_day() {
        assert_eq!(IntervalLength::ThirtyMinutes.per_day(), 48);
        assert_eq!(IntervalLength::FifteenMinutes.per_day(), 96);
    }

    #[test]
    fn test_interval_length_deserializes_from_minutes() {
        let length: IntervalLength = serde_yaml::from_str("15").unwrap();
        assert_eq!(length, IntervalLength::FifteenMinutes);

        let result: Result<IntervalLength, _> = serde_yaml::from_str("45");
        assert!(result.is_err());
    }
}
