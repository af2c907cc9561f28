use crate::model::SiteId;
use crate::store::{DocumentStore, FeedError, FeedEvent, Query, Subscription};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum StoreEvent {
    Changed(SiteId),
    Failed(String),
}

type Days = BTreeMap<NaiveDate, Value>;

struct Inner {
    sites: RwLock<HashMap<SiteId, Days>>,
    changes: broadcast::Sender<StoreEvent>,
    listeners: Arc<AtomicUsize>,
}

impl Inner {
    async fn query(&self, site: &SiteId, query: Query) -> Option<Value> {
        let sites = self.sites.read().await;
        let days = sites.get(site)?;

        match query {
            Query::Latest => days.last_key_value().map(|(_, doc)| doc.clone()),
            Query::Earliest => days.first_key_value().map(|(_, doc)| doc.clone()),
            Query::ByDate(key) => days.get(&key.date()).cloned(),
        }
    }
}

/// In-process live cache of day documents, ordered by interval date.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                sites: RwLock::new(HashMap::new()),
                changes,
                listeners: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Inserts or replaces the document of a day.
    pub async fn upsert(&self, site: &SiteId, date: NaiveDate, document: Value) {
        {
            let mut sites = self.inner.sites.write().await;
            sites.entry(site.clone()).or_default().insert(date, document);
        }
        debug!(%site, %date, "Day document stored");
        self.notify(StoreEvent::Changed(site.clone()));
    }

    /// Returns whether a document was removed.
    pub async fn remove(&self, site: &SiteId, date: NaiveDate) -> bool {
        let removed = {
            let mut sites = self.inner.sites.write().await;
            sites
                .get_mut(site)
                .and_then(|days| days.remove(&date))
                .is_some()
        };
        if removed {
            debug!(%site, %date, "Day document removed");
            self.notify(StoreEvent::Changed(site.clone()));
        }
        removed
    }

    /// Current result of a query, without subscribing.
    pub async fn get(&self, site: &SiteId, query: Query) -> Option<Value> {
        self.inner.query(site, query).await
    }

    pub async fn document_count(&self, site: &SiteId) -> usize {
        let sites = self.inner.sites.read().await;
        sites.get(site).map_or(0, BTreeMap::len)
    }

    /// Delivers a transport failure to every live feed.
    pub fn report_failure(&self, message: impl Into<String>) {
        self.notify(StoreEvent::Failed(message.into()));
    }

    /// Number of live feeds that have not been released yet.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.load(Ordering::SeqCst)
    }

    fn notify(&self, event: StoreEvent) {
        if self.inner.changes.send(event).is_err() {
            debug!("No live feeds to notify");
        }
    }
}

struct ListenerGuard(Arc<AtomicUsize>);

impl ListenerGuard {
    fn acquire(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(&self, site: &SiteId, query: Query) -> Subscription {
        let (tx, subscription) = Subscription::channel(query);
        let inner = Arc::clone(&self.inner);
        let site = site.clone();
        // Subscribe before the first read so no change slips in between.
        let mut changes = inner.changes.subscribe();
        let guard = ListenerGuard::acquire(&inner.listeners);

        tokio::spawn(async move {
            let _guard = guard;
            let mut current = inner.query(&site, query).await;
            if tx.send(FeedEvent::Document(current.clone())).await.is_err() {
                return;
            }

            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    event = changes.recv() => event,
                };

                let delivery = match event {
                    Ok(StoreEvent::Changed(changed)) if changed == site => {
                        let result = inner.query(&site, query).await;
                        if result == current {
                            continue;
                        }
                        current = result;
                        FeedEvent::Document(current.clone())
                    }
                    Ok(StoreEvent::Changed(_)) => continue,
                    Ok(StoreEvent::Failed(message)) => FeedEvent::Error(FeedError(message)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%site, %query, skipped, "Live feed lagged, re-reading");
                        let result = inner.query(&site, query).await;
                        if result == current {
                            continue;
                        }
                        current = result;
                        FeedEvent::Document(current.clone())
                    }
                    Err(RecvError::Closed) => break,
                };

                if tx.send(delivery).await.is_err() {
                    break;
                }
            }

            debug!(%site, %query, "Live feed released");
        });

        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DateKey;
    use serde_json::json;
    use std::time::Duration;

    fn site() -> SiteId {
        SiteId::new("6408091979")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doc(day: &str) -> Value {
        json!({ "interval_date": day, "meter_consumptions_kwh": [0.5] })
    }

    async fn next_document(subscription: &mut Subscription) -> Option<Value> {
        match tokio::time::timeout(Duration::from_secs(1), subscription.next()).await {
            Ok(Some(FeedEvent::Document(document))) => document,
            other => panic!("expected a document delivery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_latest_and_earliest_queries() {
        let store = MemoryStore::new();
        store.upsert(&site(), date(2024, 1, 1), doc("2024-01-01")).await;
        store.upsert(&site(), date(2024, 3, 10), doc("2024-03-10")).await;
        store.upsert(&site(), date(2024, 2, 15), doc("2024-02-15")).await;

        assert_eq!(store.get(&site(), Query::Latest).await, Some(doc("2024-03-10")));
        assert_eq!(store.get(&site(), Query::Earliest).await, Some(doc("2024-01-01")));
        assert_eq!(
            store
                .get(&site(), Query::ByDate(DateKey::new(date(2024, 2, 15))))
                .await,
            Some(doc("2024-02-15"))
        );
        assert_eq!(store.document_count(&site()).await, 3);
    }

    #[tokio::test]
    async fn test_feed_delivers_initial_result_then_changes() {
        let store = MemoryStore::new();
        let mut latest = store.latest(&site());

        assert_eq!(next_document(&mut latest).await, None);

        store.upsert(&site(), date(2024, 3, 9), doc("2024-03-09")).await;
        assert_eq!(next_document(&mut latest).await, Some(doc("2024-03-09")));

        store.upsert(&site(), date(2024, 3, 10), doc("2024-03-10")).await;
        assert_eq!(next_document(&mut latest).await, Some(doc("2024-03-10")));
    }

    #[tokio::test]
    async fn test_feed_skips_unrelated_changes() {
        let store = MemoryStore::new();
        store.upsert(&site(), date(2024, 3, 10), doc("2024-03-10")).await;
        let mut earliest = store.earliest(&site());
        assert_eq!(next_document(&mut earliest).await, Some(doc("2024-03-10")));

        // A newer day does not change the earliest result.
        store.upsert(&site(), date(2024, 3, 11), doc("2024-03-11")).await;
        store.upsert(&SiteId::new("other"), date(2020, 1, 1), doc("2020-01-01")).await;
        store.upsert(&site(), date(2024, 1, 1), doc("2024-01-01")).await;

        assert_eq!(next_document(&mut earliest).await, Some(doc("2024-01-01")));
    }

    #[tokio::test]
    async fn test_by_date_feed_sees_removal() {
        let store = MemoryStore::new();
        let key = DateKey::new(date(2024, 2, 15));
        store.upsert(&site(), key.date(), doc("2024-02-15")).await;

        let mut day = store.by_date(&site(), key);
        assert_eq!(next_document(&mut day).await, Some(doc("2024-02-15")));

        assert!(store.remove(&site(), key.date()).await);
        assert_eq!(next_document(&mut day).await, None);
        assert!(!store.remove(&site(), key.date()).await);
    }

    #[tokio::test]
    async fn test_failures_reach_live_feeds() {
        let store = MemoryStore::new();
        let mut latest = store.latest(&site());
        assert_eq!(next_document(&mut latest).await, None);

        store.report_failure("broker unreachable");

        let event = tokio::time::timeout(Duration::from_secs(1), latest.next())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(FeedEvent::Error(FeedError("broker unreachable".to_string())))
        );
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_listener() {
        let store = MemoryStore::new();
        let mut latest = store.latest(&site());
        next_document(&mut latest).await;
        assert_eq!(store.listener_count(), 1);

        drop(latest);

        tokio::time::timeout(Duration::from_secs(1), async {
            while store.listener_count() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
