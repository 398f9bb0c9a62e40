//! WhatsApp transport over the Twilio Messaging API.
//!
//! Outbound sends go through the REST API; inbound webhook replies are
//! answered with TwiML.

pub mod config;
pub mod outbound;
pub mod twiml;

pub use {
    config::{TWILIO_API_BASE, TwilioAccount, with_whatsapp_prefix},
    outbound::TwilioOutbound,
    twiml::{empty_response, messaging_response},
};
