//! Playback - Record/replay HTTP proxy for deterministic tests
//!
//! Point your code at the player instead of the real service: in record
//! mode it forwards to the upstream and captures every exchange into a
//! named record of a JSON cassette; in play mode it serves the recorded
//! responses back, verifying each live request against the recorded one.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod error;
pub mod mock;
pub mod network;
pub mod player;
pub mod proxy;

pub use cassette::{Cassette, Record};
pub use error::{PlaybackError, Result};
pub use player::Player;
