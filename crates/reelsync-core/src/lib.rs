//! ReelSync Core - Foundation types for the timeline engine
//!
//! This crate provides the fundamental types used throughout ReelSync:
//! - Time representation (ContentTime, DCPTime, FrameRate, FrameRateChange)
//! - Decoded image and audio buffers
//! - Identifiers shared between decoders, mixers and the player
//! - The error type

pub mod audio_buffers;
pub mod decoded;
pub mod error;
pub mod frame;
pub mod time;
pub mod types;

pub use audio_buffers::AudioBuffers;
pub use decoded::{ContentAudio, ContentText, ContentVideo, Decoded, DecodedEvent, TextPayload};
pub use error::{ReelError, Result};
pub use frame::{Image, ImagePlane, PixelFormat, SharedImage};
pub use time::{
    ContentTime, ContentTimePeriod, DCPTime, DCPTimePeriod, Frame, FrameRate, FrameRateChange,
    TimePeriod, TICKS_PER_SECOND,
};
pub use types::{
    AudioStream, Eyes, MediaKind, Part, PieceId, Size, Standard, StreamId, VideoFrameType,
};

/// Buffering limits shared across the engine.
pub mod limits {
    /// Decoded frames kept per video decoder for gap-fill.
    pub const VIDEO_CACHE_FRAMES: usize = 16;

    /// Longest run of missing frames that is filled by repeating a frame.
    pub const MAX_GAP_FILL: i64 = 16;

    /// Video emissions the reorder queue may hold.
    pub const SHUFFLER_CAPACITY: usize = 64;

    /// Frames fed to the resampler per processing chunk.
    pub const RESAMPLER_CHUNK_FRAMES: usize = 1024;
}
