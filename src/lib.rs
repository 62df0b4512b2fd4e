//! Tapedeck - cassette stack and recording gatekeeper for HTTP tests
//!
//! Tests insert named cassettes onto a stack; an interception adapter reports
//! each outbound interaction and the deck decides whether, and where, it is
//! recorded.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod adapter;
pub mod cassette;
pub mod config;
pub mod deck;
pub mod error;
pub mod interaction;
pub mod sink;

pub use deck::Deck;
pub use error::{DeckError, Result};
