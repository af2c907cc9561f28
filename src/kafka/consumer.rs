use crate::decode::{parse_interval_date, INTERVAL_DATE};
use crate::error::Result;
use crate::model::SiteSettings;
use crate::store::{DateKey, MemoryStore};
use chrono::NaiveDate;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// What a single day-document message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Upserted(NaiveDate),
    Removed(NaiveDate),
    Skipped,
}

/// Create a Kafka consumer configured for the day-document topic
pub fn create_consumer(
    brokers: &str,
    group_id: &str,
    auto_offset_reset: &str,
) -> Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", group_id)
        .set("bootstrap.servers", brokers)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", auto_offset_reset)
        .set("session.timeout.ms", "6000")
        .set("enable.partition.eof", "false")
        .create()?;

    Ok(consumer)
}

/// Run the Kafka consumer loop, replicating day documents into the store
pub async fn run_consumer(
    consumer: StreamConsumer,
    topic: String,
    store: MemoryStore,
    settings: SiteSettings,
) -> Result<()> {
    consumer.subscribe(&[&topic])?;
    info!("Subscribed to Kafka topic: {}", topic);

    loop {
        match consumer.recv().await {
            Ok(message) => {
                match apply_message(&store, &settings, message.key(), message.payload()).await {
                    Ok(Applied::Skipped) => {}
                    Ok(applied) => debug!("Applied day document: {:?}", applied),
                    Err(e) => {
                        warn!("Failed to parse day document as JSON: {}", e);
                        if let Some(s) = message.payload().and_then(|p| std::str::from_utf8(p).ok()) {
                            debug!("Raw payload: {}", s);
                        }
                    }
                }
            }
            Err(e) => {
                error!("Kafka error: {}", e);
                store.report_failure(e.to_string());
                // Sleep briefly before retrying
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Applies one message to the store.
///
/// The message key is the `YYYYMMDD` document id; without one, the day comes
/// from the document's own `interval_date`. An empty payload deletes the day.
pub async fn apply_message(
    store: &MemoryStore,
    settings: &SiteSettings,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> Result<Applied> {
    let key_date = key
        .and_then(|k| std::str::from_utf8(k).ok())
        .and_then(|k| k.parse::<DateKey>().ok())
        .map(DateKey::date);

    let payload = match payload {
        Some(p) if !p.is_empty() => p,
        _ => {
            let Some(date) = key_date else {
                warn!("Received tombstone without a usable date key");
                return Ok(Applied::Skipped);
            };
            store.remove(&settings.site_id, date).await;
            return Ok(Applied::Removed(date));
        }
    };

    let document: Value = serde_json::from_slice(payload)?;

    let date = key_date.or_else(|| {
        document
            .get(INTERVAL_DATE)
            .and_then(|value| parse_interval_date(value, &settings.utc_offset))
    });

    match date {
        Some(date) => {
            store.upsert(&settings.site_id, date, document).await;
            Ok(Applied::Upserted(date))
        }
        None => {
            warn!("Day document without key or {}, skipping", INTERVAL_DATE);
            Ok(Applied::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IntervalLength, SiteId};
    use crate::store::Query;
    use chrono::FixedOffset;
    use serde_json::json;

    fn settings() -> SiteSettings {
        SiteSettings::new(
            SiteId::new("6408091979"),
            IntervalLength::ThirtyMinutes,
            FixedOffset::east_opt(10 * 3600).unwrap(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_consumer() {
        // Creating a consumer does not connect, so no broker is needed
        let result = create_consumer("localhost:9092", "test-group", "latest");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_apply_keyed_document() {
        let store = MemoryStore::new();
        let doc = json!({ "interval_date": "2024-03-10", "meter_consumptions_kwh": [1.0] });
        let payload = serde_json::to_vec(&doc).unwrap();

        let applied = apply_message(&store, &settings(), Some(b"20240310"), Some(&payload))
            .await
            .unwrap();

        assert_eq!(applied, Applied::Upserted(date(2024, 3, 10)));
        assert_eq!(store.get(&settings().site_id, Query::Latest).await, Some(doc));
    }

    #[tokio::test]
    async fn test_apply_unkeyed_document_uses_interval_date() {
        let store = MemoryStore::new();
        // 14:00 UTC is already the next day at +10:00
        let payload = br#"{"interval_date": "2024-03-09T14:00:00Z"}"#;

        let applied = apply_message(&store, &settings(), None, Some(payload))
            .await
            .unwrap();

        assert_eq!(applied, Applied::Upserted(date(2024, 3, 10)));
    }

    #[tokio::test]
    async fn test_apply_tombstone_removes_day() {
        let store = MemoryStore::new();
        let payload = br#"{"interval_date": "2024-03-10"}"#;
        apply_message(&store, &settings(), Some(b"20240310"), Some(payload))
            .await
            .unwrap();

        let applied = apply_message(&store, &settings(), Some(b"20240310"), None)
            .await
            .unwrap();

        assert_eq!(applied, Applied::Removed(date(2024, 3, 10)));
        assert_eq!(store.document_count(&settings().site_id).await, 0);
    }

    #[tokio::test]
    async fn test_apply_skips_undated_document() {
        let store = MemoryStore::new();

        let applied = apply_message(&store, &settings(), Some(b"latest"), Some(b"{}"))
            .await
            .unwrap();

        assert_eq!(applied, Applied::Skipped);
        assert_eq!(store.document_count(&settings().site_id).await, 0);
    }

    #[tokio::test]
    async fn test_apply_rejects_invalid_json() {
        let store = MemoryStore::new();

        let result = apply_message(&store, &settings(), Some(b"20240310"), Some(b"not json")).await;

        assert!(result.is_err());
    }
}
