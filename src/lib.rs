pub mod breakdown;
pub mod config;
pub mod decode;
pub mod error;
pub mod kafka;
pub mod model;
pub mod store;
pub mod tracker;
pub mod view;
pub mod ws;

// Re-export commonly used items
pub use config::Config;
pub use decode::DocumentDecoder;
pub use error::{AppError, Result};
pub use model::{DayData, SiteSettings};
pub use store::{DocumentStore, MemoryStore};
pub use tracker::{DailySession, RangeTracker};
pub use view::DailyView;
pub use ws::{AppState, ClientMessage, ServerMessage};
