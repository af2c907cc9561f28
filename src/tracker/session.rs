use crate::decode::DocumentDecoder;
use crate::error::{AppError, Result};
use crate::model::{SiteId, SiteSettings};
use crate::store::{DocumentStore, FeedEvent, Subscription};
use crate::tracker::state::{RangeTracker, Resubscribe, TrackerSnapshot};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    SelectDate(NaiveDate),
}

/// Cloneable sender side of a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn select_date(&self, date: NaiveDate) -> Result<()> {
        self.commands
            .send(SessionCommand::SelectDate(date))
            .await
            .map_err(|_| AppError::Internal("daily session has stopped".to_string()))
    }
}

/// One viewer's range tracker together with its live subscriptions.
///
/// All deliveries and commands are handled by a single task, one at a time.
/// Dropping the session stops the task and releases every subscription.
pub struct DailySession {
    handle: SessionHandle,
    state: watch::Receiver<TrackerSnapshot>,
    task: JoinHandle<()>,
}

impl DailySession {
    pub fn spawn(store: Arc<dyn DocumentStore>, settings: &SiteSettings, today: NaiveDate) -> Self {
        let tracker = RangeTracker::new(DocumentDecoder::new(settings, today));
        let (state_tx, state) = watch::channel(tracker.snapshot());
        let (commands, commands_rx) = mpsc::channel(16);

        let task = tokio::spawn(run(
            store,
            settings.site_id.clone(),
            tracker,
            commands_rx,
            state_tx,
        ));

        Self {
            handle: SessionHandle { commands },
            state,
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub async fn select_date(&self, date: NaiveDate) -> Result<()> {
        self.handle.select_date(date).await
    }

    /// Receiver notified on every state change.
    pub fn state(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }
}

impl Drop for DailySession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn next_event(feed: &mut Option<Subscription>) -> Option<FeedEvent> {
    match feed {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    site: SiteId,
    mut tracker: RangeTracker,
    mut commands: mpsc::Receiver<SessionCommand>,
    state: watch::Sender<TrackerSnapshot>,
) {
    let mut latest = Some(store.latest(&site));
    let mut earliest = Some(store.earliest(&site));
    let mut selected: Option<Subscription> = None;
    info!(%site, "Daily session started");

    loop {
        let change = tokio::select! {
            event = next_event(&mut latest) => match event {
                Some(FeedEvent::Document(document)) => tracker.apply_latest(document.as_ref()),
                Some(FeedEvent::Error(e)) => {
                    warn!(%site, "Latest-day feed: {}", e);
                    Resubscribe::Keep
                }
                None => {
                    warn!(%site, "Latest-day feed closed");
                    latest = None;
                    Resubscribe::Keep
                }
            },
            event = next_event(&mut earliest) => match event {
                Some(FeedEvent::Document(document)) => {
                    tracker.apply_earliest(document.as_ref());
                    Resubscribe::Keep
                }
                Some(FeedEvent::Error(e)) => {
                    warn!(%site, "Earliest-day feed: {}", e);
                    Resubscribe::Keep
                }
                None => {
                    warn!(%site, "Earliest-day feed closed");
                    earliest = None;
                    Resubscribe::Keep
                }
            },
            event = next_event(&mut selected) => match event {
                Some(FeedEvent::Document(document)) => {
                    tracker.apply_selected(document.as_ref());
                    Resubscribe::Keep
                }
                Some(FeedEvent::Error(e)) => {
                    warn!(%site, "Selected-day feed: {}", e);
                    Resubscribe::Keep
                }
                None => {
                    warn!(%site, "Selected-day feed closed");
                    selected = None;
                    Resubscribe::Keep
                }
            },
            command = commands.recv() => match command {
                Some(SessionCommand::SelectDate(date)) => tracker.request_date(date),
                None => break,
            },
        };

        match change {
            Resubscribe::Keep => {}
            Resubscribe::Release => {
                if selected.take().is_some() {
                    debug!(%site, "Selected-day subscription released");
                }
            }
            Resubscribe::Subscribe(key) => {
                let next = store.by_date(&site, key);
                let query = next.query();
                // The old feed goes away only once the new one is in place.
                let previous = selected.replace(next);
                drop(previous);
                debug!(%site, %query, "Selected-day subscription replaced");
            }
        }

        let snapshot = tracker.snapshot();
        state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    info!(%site, "Daily session closed");
}
