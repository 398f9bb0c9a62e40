//! Route inbound messages to agent variants.
//!
//! Selection order:
//! 1. The classifier names a variant (keyword or model backed).
//! 2. Unknown names and classifier failures fall back to the default variant.
//! 3. A variant with required slots only takes over once the user's own
//!    messages supply every slot; until then the turn is a clarification.
//! 4. A clarification the user leaves unanswered is asked once; the next
//!    message that adds no slot goes to the default variant.

pub mod classifier;
pub mod error;
pub mod resolve;
pub mod slots;

pub use {
    classifier::{Classifier, KeywordClassifier, ModelClassifier},
    error::{Error, Result},
    resolve::{RouteDecision, Router, RoutingState, clarification_text},
    slots::SlotDetector,
};
