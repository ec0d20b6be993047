//! Server-side cheat detection
//!
//! Movement plausibility (teleports), sustained self-overlap, inactivity and
//! input sanity. Violations that kill map onto a [`DeathCause`].
//!
//! [`DeathCause`]: crate::game::state::DeathCause

pub mod validator;

pub use validator::{AntiCheatValidator, CheatViolation};
