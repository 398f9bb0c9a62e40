//! Outbound channel seam: the transport trait, reply segmentation and
//! ordered delivery.

pub mod delivery;
pub mod error;
pub mod plugin;
pub mod segment;

pub use {
    delivery::{DeliveryReport, deliver},
    error::{Error, Result},
    plugin::ChannelOutbound,
    segment::{DEFAULT_CHUNK_LIMIT, Chunk, part_suffix, split, split_chunks, suffix_len},
};
