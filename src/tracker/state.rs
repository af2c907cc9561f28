use crate::decode::{Decoded, DocumentDecoder};
use crate::model::DayData;
use crate::store::DateKey;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lower bound used until the earliest-day feed reports in.
pub fn far_past() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Subscription lifecycle, as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    RangeKnown,
    DayLoading,
    DayLoaded,
}

/// What the owner of the selected-day subscription has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resubscribe {
    Keep,
    /// Drop the selected-day subscription; the latest-day feed carries the day.
    Release,
    /// Replace the selected-day subscription with one for this day.
    Subscribe(DateKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub phase: Phase,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub selected_date: NaiveDate,
    pub day: Arc<DayData>,
}

/// Known date range plus the selected day.
///
/// Fed by three independent live feeds and by user date requests, in any
/// order. Deliveries are idempotent: applying the same document twice leaves
/// an equal state. Never fails; unusable input leaves the state untouched.
#[derive(Debug)]
pub struct RangeTracker {
    decoder: DocumentDecoder,
    min_date: NaiveDate,
    max_date: NaiveDate,
    selected_date: NaiveDate,
    day: Arc<DayData>,
    min_known: bool,
    max_known: bool,
    following_latest: bool,
    loading: bool,
    loaded: bool,
}

impl RangeTracker {
    pub fn new(decoder: DocumentDecoder) -> Self {
        let day = decoder.empty();
        let yesterday = day.interval_date();

        Self {
            decoder,
            min_date: far_past(),
            max_date: yesterday,
            selected_date: yesterday,
            day,
            min_known: false,
            max_known: false,
            following_latest: true,
            loading: false,
            loaded: false,
        }
    }

    pub fn min_date(&self) -> NaiveDate {
        self.min_date
    }

    pub fn max_date(&self) -> NaiveDate {
        self.max_date
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn day(&self) -> &Arc<DayData> {
        &self.day
    }

    pub fn is_following_latest(&self) -> bool {
        self.following_latest
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::DayLoading
        } else if self.loaded {
            Phase::DayLoaded
        } else if self.min_known || self.max_known {
            Phase::RangeKnown
        } else {
            Phase::Uninitialized
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            phase: self.phase(),
            min_date: self.min_date,
            max_date: self.max_date,
            selected_date: self.selected_date,
            day: Arc::clone(&self.day),
        }
    }

    /// Latest-day delivery: moves the upper bound and, while the view
    /// follows the newest day, the selection and the displayed day.
    pub fn apply_latest(&mut self, document: Option<&Value>) -> Resubscribe {
        let Decoded::Valid(day) = self.decoder.decode(document) else {
            debug!("Latest-day delivery without a day, ignoring");
            return Resubscribe::Keep;
        };

        let date = day.interval_date();
        self.max_date = date;
        self.max_known = true;

        if !self.following_latest {
            debug!(%date, selected = %self.selected_date, "Newest day moved, keeping user selection");
            return Resubscribe::Keep;
        }

        let moved = self.selected_date != date;
        if moved {
            info!(%date, "Following newest day");
        }
        self.selected_date = date;
        self.day = Arc::new(day);
        self.loading = false;
        self.loaded = true;

        if moved {
            Resubscribe::Release
        } else {
            Resubscribe::Keep
        }
    }

    /// Earliest-day delivery: only moves the lower bound. The selection and
    /// the displayed day are left alone, even when they now fall below it.
    pub fn apply_earliest(&mut self, document: Option<&Value>) {
        let Some(date) = self
            .decoder
            .decode(document)
            .into_option()
            .map(|day| day.interval_date())
        else {
            debug!("Earliest-day delivery without a day, ignoring");
            return;
        };

        if self.selected_date < date {
            debug!(%date, selected = %self.selected_date, "Earliest day moved past the selection");
        }
        self.min_date = date;
        self.min_known = true;
    }

    /// Selected-day delivery: replaces the displayed day. An absent
    /// document shows the empty sentinel.
    pub fn apply_selected(&mut self, document: Option<&Value>) {
        self.day = self.decoder.decode_or_empty(document);
        self.loading = false;
        self.loaded = true;
    }

    /// User date request. Dates before the earliest known day are ignored;
    /// later dates, including ones past the newest day, are accepted.
    pub fn request_date(&mut self, date: NaiveDate) -> Resubscribe {
        if date < self.min_date {
            warn!(%date, min = %self.min_date, "Ignoring date before earliest available day");
            return Resubscribe::Keep;
        }

        self.select(date)
    }

    fn select(&mut self, date: NaiveDate) -> Resubscribe {
        self.selected_date = date;
        self.following_latest = self.max_known && date == self.max_date;
        self.loading = true;
        Resubscribe::Subscribe(DateKey::new(date))
    }
}
