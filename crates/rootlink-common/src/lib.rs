// ============================================
// File: crates/rootlink-common/src/lib.rs
// ============================================
//! # Rootlink Common - Shared Types Library
//!
//! ## Creation Reason
//! Holds the small set of types every other rootlink crate agrees on:
//! certificate aliases, text charsets, timestamps and the base error.
//!
//! ## Main Functionality
//! - [`types`]: `Alias` (certificate fingerprint) and `Charset`
//! - [`time`]: Unix `Timestamp` used by persisted trust records
//! - [`error`]: `CommonError` and its `Result` alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                rootlink-node                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   rootlink-core        rootlink-transport           │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             rootlink-common  ◄── You are here       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is a leaf: no internal dependencies, keep it that way
//! - `Alias` values are persisted; their textual form must stay stable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::Timestamp;
pub use types::{Alias, Charset};
