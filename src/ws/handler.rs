use crate::model::SiteSettings;
use crate::store::DocumentStore;
use crate::tracker::DailySession;
use crate::ws::connection::handle_connection;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub settings: SiteSettings,
    pub max_connections: usize,
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, settings: SiteSettings, max_connections: usize) -> Self {
        Self {
            store,
            settings,
            max_connections,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Claims one of the `max_connections` slots, if any is left.
    pub fn try_acquire_slot(&self) -> Option<ConnectionSlot> {
        let max = self.max_connections;
        self.connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            })
            .ok()?;

        Some(ConnectionSlot {
            connections: Arc::clone(&self.connections),
        })
    }
}

/// Held for the lifetime of a WebSocket connection.
#[derive(Debug)]
pub struct ConnectionSlot {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle WebSocket upgrade request on /ws/daily
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let Some(slot) = state.try_acquire_slot() else {
        warn!(
            "Rejecting WebSocket upgrade, {} connections open",
            state.max_connections
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket upgrade accepted for client {}", client_id);

    let session = DailySession::spawn(
        Arc::clone(&state.store),
        &state.settings,
        state.settings.today(),
    );

    Ok(ws.on_upgrade(move |socket: WebSocket| async move {
        handle_connection(socket, session, client_id).await;
        drop(slot);
    }))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
