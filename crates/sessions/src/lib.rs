//! Durable per-identity conversation history.
//!
//! Each conversation is stored as a JSONL file (one message per line) at
//! `<data_dir>/conversations/<identity>.jsonl`, next to a small JSON sidecar
//! holding the record fields that are not messages (current variant,
//! metadata, timestamps). Writers take an advisory file lock so concurrent
//! appends never interleave.

pub mod error;
pub mod key;
pub mod message;
pub mod record;
pub mod store;

pub use {
    error::{Error, Result},
    key::ConversationIdentity,
    message::{Message, Role},
    record::ConversationRecord,
    store::{DEFAULT_HISTORY_LIMIT, HistoryStore, HistoryStoreExt, JsonlHistoryStore},
};
