pub mod connection;
pub mod handler;
pub mod protocol;
pub mod routes;

pub use handler::{health_check, ws_handler, AppState, ConnectionSlot};
pub use protocol::{ClientMessage, ServerMessage};
pub use routes::create_router;
