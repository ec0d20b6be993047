//! Serpent Arena Server Library
//!
//! Authoritative simulation core for a real-time multiplayer serpent arena:
//! movement, growth, server-side collision detection on a worker pool,
//! anti-cheat, safe spawning, AI bots and per-viewer area-of-interest
//! snapshots. Sessions, accounts and transport live outside this crate and
//! talk to it through [`game::simulation::Simulation`].

pub mod anticheat;
pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
