//! Content items placed on the output timeline.

use crate::reels::PackageReader;
use num_rational::Rational64;
use reelsync_core::{
    AudioStream, ContentTime, DCPTime, DCPTimePeriod, Frame, FrameRate, FrameRateChange,
    MediaKind, Size, Standard, VideoFrameType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Video part of a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoContent {
    pub frame_rate: FrameRate,
    /// Length in logical frames (pairs, for alternating 3D)
    pub length: Frame,
    pub frame_type: VideoFrameType,
    pub size: Size,
    /// Whether the video is shown at all
    pub use_video: bool,
}

impl VideoContent {
    pub fn new(frame_rate: FrameRate, length: Frame) -> Self {
        Self {
            frame_rate,
            length,
            frame_type: VideoFrameType::TwoD,
            size: Size::FLAT_2K,
            use_video: true,
        }
    }
}

/// Audio part of a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioContent {
    pub streams: Vec<AudioStream>,
    /// Delay in milliseconds; negative moves the audio earlier
    pub delay_ms: i64,
    pub gain_db: f64,
}

impl AudioContent {
    pub fn new(streams: Vec<AudioStream>) -> Self {
        Self {
            streams,
            delay_ms: 0,
            gain_db: 0.0,
        }
    }

    /// Length of the longest stream.
    pub fn length(&self) -> ContentTime {
        self.streams
            .iter()
            .map(|s| ContentTime::from_samples(s.length, s.frame_rate))
            .max()
            .unwrap_or(ContentTime::ZERO)
    }
}

/// Subtitle or caption part of a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub tracks: Vec<String>,
    pub length: ContentTime,
    pub use_text: bool,
}

/// Reel-structured, previously encoded material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReelPackage {
    pub standard: Standard,
    /// Reel lengths in output frames, when known without reading the package
    pub reel_lengths: Option<Vec<Frame>>,
    pub encrypted: bool,
    pub kdm_valid: bool,
    pub reference_video: bool,
    pub reference_audio: bool,
    pub reference_text: bool,
    #[serde(skip)]
    pub reader: Option<Arc<dyn PackageReader>>,
}

impl ReelPackage {
    /// Whether the essence of `kind` is to be passed through unchanged.
    pub fn references(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.reference_video,
            MediaKind::Audio => self.reference_audio,
            MediaKind::Text => self.reference_text,
        }
    }

    pub fn set_reference(&mut self, kind: MediaKind, reference: bool) {
        match kind {
            MediaKind::Video => self.reference_video = reference,
            MediaKind::Audio => self.reference_audio = reference,
            MediaKind::Text => self.reference_text = reference,
        }
    }

    /// Encrypted material needs a valid KDM.
    pub fn can_be_played(&self) -> bool {
        !self.encrypted || self.kdm_valid
    }
}

/// One item on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub name: String,
    /// Where the (trimmed) content starts on the output timeline
    pub position: DCPTime,
    pub trim_start: ContentTime,
    pub trim_end: ContentTime,
    /// Play faster or slower than the video's own rate
    pub speed: Option<Rational64>,
    pub video: Option<VideoContent>,
    pub audio: Option<AudioContent>,
    pub text: Option<TextContent>,
    pub package: Option<ReelPackage>,
}

impl Content {
    /// Empty content; add parts with the `with_*` methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            position: DCPTime::ZERO,
            trim_start: ContentTime::ZERO,
            trim_end: ContentTime::ZERO,
            speed: None,
            video: None,
            audio: None,
            text: None,
            package: None,
        }
    }

    pub fn with_position(mut self, position: DCPTime) -> Self {
        self.position = position;
        self
    }

    pub fn with_trim(mut self, start: ContentTime, end: ContentTime) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    pub fn with_video(mut self, video: VideoContent) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_audio(mut self, audio: AudioContent) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_text(mut self, text: TextContent) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_package(mut self, package: ReelPackage) -> Self {
        self.package = Some(package);
        self
    }

    /// Whether this content carries `kind` at all.
    pub fn has(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video.as_ref().is_some_and(|v| v.use_video),
            MediaKind::Audio => self.audio.as_ref().is_some_and(|a| !a.streams.is_empty()),
            MediaKind::Text => self.text.as_ref().is_some_and(|t| t.use_text),
        }
    }

    /// Whether `kind` is passed through from the package rather than decoded.
    pub fn references(&self, kind: MediaKind) -> bool {
        self.package.as_ref().is_some_and(|p| p.references(kind))
    }

    pub fn can_be_played(&self) -> bool {
        self.package.as_ref().map_or(true, ReelPackage::can_be_played)
    }

    /// How this content's frames map onto the output rate.
    pub fn frc(&self, dcp_rate: FrameRate) -> FrameRateChange {
        let source = self.video.as_ref().map_or(dcp_rate, |v| v.frame_rate);
        FrameRateChange::with_speed(source, dcp_rate, self.speed.unwrap_or_else(|| Rational64::from_integer(1)))
    }

    /// Output length before trimming.
    pub fn full_length(&self, dcp_rate: FrameRate) -> DCPTime {
        let frc = self.frc(dcp_rate);
        let video = self
            .video
            .as_ref()
            .map(|v| ContentTime::from_frames(v.length, v.frame_rate))
            .unwrap_or(ContentTime::ZERO);
        let audio = self.audio.as_ref().map_or(ContentTime::ZERO, AudioContent::length);
        let text = self.text.as_ref().map_or(ContentTime::ZERO, |t| t.length);
        DCPTime::from_content(video.max(audio).max(text), &frc)
    }

    /// Output length after trimming, never negative.
    pub fn length_after_trim(&self, dcp_rate: FrameRate) -> DCPTime {
        let frc = self.frc(dcp_rate);
        let trimmed = DCPTime::from_content(self.trim_start + self.trim_end, &frc);
        (self.full_length(dcp_rate) - trimmed).max(DCPTime::ZERO)
    }

    pub fn end(&self, dcp_rate: FrameRate) -> DCPTime {
        self.position + self.length_after_trim(dcp_rate)
    }

    /// `[position, end)` on the output timeline.
    pub fn period(&self, dcp_rate: FrameRate) -> DCPTimePeriod {
        DCPTimePeriod::new(self.position, self.end(dcp_rate))
    }

    /// Rate the audio is resampled to so that, after any speed change, it
    /// plays at `audio_rate`.
    pub fn resampled_audio_rate(&self, dcp_rate: FrameRate, audio_rate: u32) -> u32 {
        let frc = self.frc(dcp_rate);
        if !frc.change_speed {
            return audio_rate;
        }
        let rate = Rational64::from_integer(audio_rate as i64) / frc.speed_up;
        rate.round().to_integer() as u32
    }
}
