pub mod arena;
pub mod bot;
pub mod food;
pub mod movement;
pub mod spawn;
