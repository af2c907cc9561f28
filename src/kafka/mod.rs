pub mod consumer;

pub use consumer::{apply_message, create_consumer, run_consumer, Applied};
