pub mod clock;
pub mod collision;
pub mod constants;
pub mod performance;
pub mod scheduler;
pub mod simulation;
pub mod spatial;
pub mod state;
pub mod stats;
pub mod systems;
