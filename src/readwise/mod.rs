//! Readwise API integration.
//!
//! Defines the payload format, the sender trait the export pipeline
//! depends on, and the HTTP client implementation.

pub mod client;

pub use client::{
    HighlightSender, ItemOutcome, ReadwiseClient, ReadwiseClientConfig, ReadwisePayload,
};
