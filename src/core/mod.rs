// src/core/mod.rs - Session controller

pub mod controller;
pub mod notice;
pub mod pacing;
pub mod prompt;
pub mod session;

pub use controller::{SessionController, TurnDisplay, TurnPhase, TurnReport};
pub use session::{SessionState, TokenCount};
