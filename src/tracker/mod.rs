pub mod session;
pub mod state;

pub use session::{DailySession, SessionCommand, SessionHandle};
pub use state::{far_past, Phase, RangeTracker, Resubscribe, TrackerSnapshot};
