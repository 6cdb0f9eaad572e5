//! # Audio Module
//!
//! Voice sessions and playback for every guild the bot is in.
//!
//! ## Architecture
//!
//! ### [`controller`] - Voice Session Controller
//! - One session per guild: the connected channel plus at most one track
//! - Join/move, play, pause/resume, volume and stop
//! - Discards resolutions that finish after a `stop` or a newer `play`
//!
//! ### [`source`] - Audio Source
//! - A resolved track (title + direct media URL) with its volume
//!
//! ### [`transport`] - Voice Transport
//! - Songbird-backed connect, disconnect and track start
//! - Completion events sent back to the controller
//!
//! ## Playback states
//!
//! ```text
//!            play             pause
//!   idle ─────────▶ playing ─────────▶ paused
//!    ▲                 │  ◀─────────     │
//!    │                 │     resume      │
//!    └─────────────────┴─────────────────┘
//!          stop / track ended
//! ```

pub mod controller;
pub mod source;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
