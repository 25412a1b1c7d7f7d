//! The project: output settings, content and reels.

use crate::content::Content;
use crate::reels::{self, CannotReference};
use reelsync_core::{DCPTime, DCPTimePeriod, Frame, FrameRate, MediaKind, Size, Standard};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// How the output is divided into reels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReelMode {
    /// One reel for everything
    #[default]
    Single,
    /// A reel boundary wherever video content starts or ends, and at every
    /// reel boundary of packaged content
    ByVideoContent,
    /// Reels of a fixed length (the last may be shorter)
    ByLength(DCPTime),
}

/// Output settings and the content placed on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub video_frame_rate: FrameRate,
    pub audio_frame_rate: u32,
    pub audio_channels: usize,
    pub standard: Standard,
    pub reel_mode: ReelMode,
    pub three_d: bool,
    pub container: Size,
    pub content: Vec<Content>,
}

/// A stretch of packaged essence that is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedReel {
    pub content: Uuid,
    pub kind: MediaKind,
    /// Where the reel plays on the output
    pub period: DCPTimePeriod,
    /// Frames trimmed from the start of the packaged reel
    pub entry_point: Frame,
    /// Frames used from the packaged reel
    pub duration: Frame,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            video_frame_rate: FrameRate::FPS_24,
            audio_frame_rate: 48000,
            audio_channels: 6,
            standard: Standard::Smpte,
            reel_mode: ReelMode::Single,
            three_d: false,
            container: Size::FLAT_2K,
            content: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Content) {
        info!(name = %content.name, position = %content.position, "Adding content");
        self.content.push(content);
    }

    pub fn content_by_id(&self, id: Uuid) -> Option<&Content> {
        self.content.iter().find(|c| c.id == id)
    }

    /// End of the last content, rounded up to a whole frame.
    pub fn length(&self) -> DCPTime {
        self.content
            .iter()
            .map(|c| c.end(self.video_frame_rate))
            .max()
            .unwrap_or(DCPTime::ZERO)
            .ceil_to_frame(self.video_frame_rate)
    }

    /// The output's reels, in order.
    pub fn reels(&self) -> Vec<DCPTimePeriod> {
        let length = self.length();
        match self.reel_mode {
            ReelMode::Single => vec![DCPTimePeriod::new(DCPTime::ZERO, length)],
            ReelMode::ByVideoContent => {
                let rate = self.video_frame_rate;
                let mut splits = vec![DCPTime::ZERO, length];
                for content in self.content.iter().filter(|c| c.has(MediaKind::Video)) {
                    splits.push(content.position);
                    splits.push(content.end(rate));
                    if content.package.is_some() {
                        splits.extend(reels::reel_periods(content, rate).iter().map(|p| p.from));
                    }
                }
                splits.retain(|&t| t >= DCPTime::ZERO && t <= length);
                splits.sort();
                splits.dedup();

                let periods: Vec<DCPTimePeriod> = splits
                    .windows(2)
                    .map(|w| DCPTimePeriod::new(w[0], w[1]))
                    .collect();
                if periods.is_empty() {
                    vec![DCPTimePeriod::new(DCPTime::ZERO, length)]
                } else {
                    periods
                }
            }
            ReelMode::ByLength(reel) if reel > DCPTime::ZERO => {
                let mut periods = Vec::new();
                let mut from = DCPTime::ZERO;
                while from < length {
                    let to = (from + reel).min(length);
                    periods.push(DCPTimePeriod::new(from, to));
                    from = to;
                }
                if periods.is_empty() {
                    periods.push(DCPTimePeriod::new(DCPTime::ZERO, length));
                }
                periods
            }
            ReelMode::ByLength(_) => vec![DCPTimePeriod::new(DCPTime::ZERO, length)],
        }
    }

    /// Content carrying `kind` whose period overlaps `period`.
    pub fn overlapping(&self, kind: MediaKind, period: DCPTimePeriod) -> Vec<&Content> {
        self.content
            .iter()
            .filter(|c| c.has(kind))
            .filter(|c| c.period(self.video_frame_rate).overlap(period).is_some())
            .collect()
    }

    /// Whether the `kind` essence of `content` can be passed through.
    pub fn can_reference(&self, content: &Content, kind: MediaKind) -> Result<(), CannotReference> {
        reels::can_reference(self, content, kind)
    }

    /// Every reel of packaged essence marked for pass-through.
    pub fn referenced_reels(&self) -> Vec<ReferencedReel> {
        let rate = self.video_frame_rate;
        let mut referenced = Vec::new();
        for content in &self.content {
            let kinds: Vec<MediaKind> = [MediaKind::Video, MediaKind::Audio, MediaKind::Text]
                .into_iter()
                .filter(|&k| content.references(k))
                .collect();
            if kinds.is_empty() {
                continue;
            }
            let whole = content.period(rate);
            let untrimmed = reels::untrimmed_reels(content, rate)
                .unwrap_or_else(|| vec![whole]);
            for reel in untrimmed {
                let Some(period) = reel.overlap(whole) else {
                    continue;
                };
                let entry_point = (period.from - reel.from).frames_round(rate);
                let duration = period.duration().frames_round(rate);
                for &kind in &kinds {
                    referenced.push(ReferencedReel {
                        content: content.id,
                        kind,
                        period,
                        entry_point,
                        duration,
                    });
                }
            }
        }
        referenced
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled Project")
    }
}
