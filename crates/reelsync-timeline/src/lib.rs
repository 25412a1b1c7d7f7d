//! ReelSync Timeline - What is placed on the output timeline
//!
//! Implements the timeline structure:
//! - Content items with video, audio, text and reel-package parts
//! - The project, its output settings and its reels
//! - Reel partitioning of packaged content and pass-through checks

pub mod content;
pub mod project;
pub mod reels;

pub use content::{AudioContent, Content, ReelPackage, TextContent, VideoContent};
pub use project::{Project, ReelMode, ReferencedReel};
pub use reels::{
    can_reference, reel_periods, CannotReference, PackageReader, ReelAssets, StaticPackageReader,
};
