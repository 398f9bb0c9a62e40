//! Conversation pipeline: one inbound message in, one reply out.
//!
//! Turns for the same identity are serialized by an async lock held from the
//! user append through the assistant append; different identities run fully
//! concurrently.

pub mod error;
pub mod locks;
pub mod orchestrator;

pub use {
    error::{Error, Result},
    locks::IdentityLocks,
    orchestrator::{Orchestrator, Turn, TurnKind},
};
