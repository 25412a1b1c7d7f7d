//! ReelSync Player - Turns a project into ordered output
//!
//! This crate provides:
//! - Pieces: one per playable content item, owning its source and adapters
//! - The reorder queue that puts video back into output order
//! - Tracking of regions with no content, filled with black and silence
//! - The player itself, stepped one decode at a time

pub mod empty;
pub mod factory;
pub mod piece;
pub mod player;
pub mod shuffler;

pub use empty::Empty;
pub use factory::{SourceFactory, SyntheticFactory};
pub use piece::Piece;
pub use player::{Player, PlayerEvent, PlayerHandle, PlayerOptions, PlayerState, PlayerVideo};
pub use shuffler::Shuffler;
