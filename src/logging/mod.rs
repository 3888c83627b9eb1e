//! Session event logging.

mod jsonl;

pub use jsonl::{SessionEvent, SessionLog};
