//! Payloads emitted by the per-piece decode adapters.
//!
//! Adapters tag everything with the [`PieceId`] they were built for and
//! send it to the player as a [`DecodedEvent`].

use crate::audio_buffers::AudioBuffers;
use crate::frame::SharedImage;
use crate::time::{ContentTimePeriod, Frame};
use crate::types::{Eyes, Part, PieceId, StreamId};

/// One video frame ready for placement on the output timeline.
#[derive(Debug, Clone)]
pub struct ContentVideo {
    /// Output-rate frame index counted from the start of the content
    pub frame: Frame,
    pub eyes: Eyes,
    /// Part of `image` to use for `eyes`
    pub part: Part,
    pub image: SharedImage,
}

/// A block of audio at the content's resampled rate.
#[derive(Debug, Clone)]
pub struct ContentAudio {
    pub audio: AudioBuffers,
    /// Position of the first sample, in resampled frames from content start
    pub frame: Frame,
}

/// The body of a subtitle or caption.
#[derive(Debug, Clone)]
pub enum TextPayload {
    Plain(String),
    Bitmap(SharedImage),
}

/// A subtitle or caption with the content-time period it is shown for.
#[derive(Debug, Clone)]
pub struct ContentText {
    pub track: String,
    pub period: ContentTimePeriod,
    pub payload: TextPayload,
}

/// Anything an adapter can emit.
#[derive(Debug, Clone)]
pub enum Decoded {
    Video(ContentVideo),
    Audio { stream: StreamId, audio: ContentAudio },
    Text(ContentText),
}

/// A decoded payload and the piece it came from.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub piece: PieceId,
    pub decoded: Decoded,
}
