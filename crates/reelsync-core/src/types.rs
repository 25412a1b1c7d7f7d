//! Small identifiers and enumerations shared by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key of one audio stream within a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Index of a piece inside the player that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceId(pub usize);

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "piece#{}", self.0)
    }
}

/// Which eye(s) an image is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Eyes {
    /// A 2D image, seen by both eyes
    #[default]
    Both,
    Left,
    Right,
}

impl Eyes {
    /// Sort key at equal time: left (and 2D) before right.
    pub fn order(self) -> u8 {
        match self {
            Eyes::Both | Eyes::Left => 0,
            Eyes::Right => 1,
        }
    }
}

/// The three kinds of media a content item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
    Text,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Packaging standard of reel-structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Standard {
    #[default]
    Smpte,
    Interop,
}

/// How video frames from a source are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoFrameType {
    #[default]
    TwoD,
    /// Left eye in the left half of each image, right eye in the right half
    ThreeDLeftRight,
    /// Left eye in the top half, right eye in the bottom half
    ThreeDTopBottom,
    /// Alternate frames carry left then right
    ThreeDAlternate,
}

impl VideoFrameType {
    pub fn is_3d(self) -> bool {
        !matches!(self, VideoFrameType::TwoD)
    }
}

/// Which part of a decoded image belongs to an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Part {
    #[default]
    Whole,
    LeftHalf,
    RightHalf,
    TopHalf,
    BottomHalf,
}

/// Description of one audio stream of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub id: StreamId,
    /// Native sample rate
    pub frame_rate: u32,
    pub channels: usize,
    /// Length in samples at the native rate
    pub length: i64,
}

impl AudioStream {
    pub fn new(id: u32, frame_rate: u32, channels: usize, length: i64) -> Self {
        Self {
            id: StreamId(id),
            frame_rate,
            channels,
            length,
        }
    }
}

/// Size of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 2K flat container
    pub const FLAT_2K: Self = Self::new(1998, 1080);
    /// 2K scope container
    pub const SCOPE_2K: Self = Self::new(2048, 858);
}

impl Default for Size {
    fn default() -> Self {
        Self::FLAT_2K
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
