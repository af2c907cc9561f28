//! Read-only access to the day documents of a site.
//!
//! Every query is live: a [`Subscription`] first yields the current result
//! and then a new [`FeedEvent`] each time the result changes. Dropping the
//! subscription releases the listener.

pub mod memory;

pub use memory::MemoryStore;

use crate::model::SiteId;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered deliveries per subscription before the producer waits.
pub const FEED_BUFFER: usize = 16;

/// Document id of a day, formatted `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date key: {0:?}")]
pub struct InvalidDateKey(String);

impl FromStr for DateKey {
    type Err = InvalidDateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDateKey(s.to_string());

        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year = s[0..4].parse().map_err(|_| invalid())?;
        let month = s[4..6].parse().map_err(|_| invalid())?;
        let day = s[6..8].parse().map_err(|_| invalid())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(DateKey)
            .ok_or_else(invalid)
    }
}

/// The three live queries the dashboard needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Ordered by interval date descending, limit 1.
    Latest,
    /// Ordered by interval date ascending, limit 1.
    Earliest,
    ByDate(DateKey),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Latest => f.write_str("latest"),
            Query::Earliest => f.write_str("earliest"),
            Query::ByDate(key) => write!(f, "date:{}", key),
        }
    }
}

/// Transport-level failure reported on a live feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feed failure: {0}")]
pub struct FeedError(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Current query result; `None` when no document matches.
    Document(Option<Value>),
    Error(FeedError),
}

/// Owned handle on a live query.
#[derive(Debug)]
pub struct Subscription {
    query: Query,
    events: mpsc::Receiver<FeedEvent>,
}

impl Subscription {
    /// Creates a subscription together with the sender feeding it. The
    /// producer sees the sender close once the subscription is dropped.
    pub fn channel(query: Query) -> (mpsc::Sender<FeedEvent>, Subscription) {
        let (tx, events) = mpsc::channel(FEED_BUFFER);
        (tx, Subscription { query, events })
    }

    pub fn query(&self) -> Query {
        self.query
    }

    /// Next delivery, or `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }
}

pub trait DocumentStore: Send + Sync + 'static {
    fn subscribe(&self, site: &SiteId, query: Query) -> Subscription;

    fn latest(&self, site: &SiteId) -> Subscription {
        self.subscribe(site, Query::Latest)
    }

    fn earliest(&self, site: &SiteId) -> Subscription {
        self.subscribe(site, Query::Earliest)
    }

    fn by_date(&self, site: &SiteId, key: DateKey) -> Subscription {
        self.subscribe(site, Query::ByDate(key))
    }
}
