//! Integration test crate for ReelSync.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every reelsync crate to verify they work together.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod audio;

#[cfg(test)]
mod player;
