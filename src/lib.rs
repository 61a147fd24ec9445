//! kindle2readwise - export Kindle "My Clippings.txt" highlights to Readwise.
//!
//! The pipeline: [`parser`] turns the clippings file into records,
//! [`storage`] deduplicates them by content fingerprint and keeps a
//! ledger of export sessions, [`readwise`] delivers new highlights in
//! batches, and [`export`] orchestrates one run end to end. [`cli`]
//! wraps it all in the `k2r` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod readwise;
pub mod storage;

pub use error::{Error, Result};
