//! Synthetic source producing test patterns and tones.
//!
//! Used by the demo binary and the tests in place of a real decoder. The
//! knobs reproduce the awkward behaviour real decoders show: frames that are
//! never delivered, fewer frames than the content claims, and failure part
//! way through.

use crate::source::{Emitter, Source};
use reelsync_core::{
    AudioBuffers, AudioStream, ContentText, ContentTime, Frame, FrameRate, Image, ReelError,
    Result, SharedImage, Size, VideoFrameType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Video produced by a [`SyntheticSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticVideo {
    pub frame_rate: FrameRate,
    pub size: Size,
    pub layout: VideoFrameType,
    /// Logical frames delivered before the source reports it is done
    pub frames: Frame,
    /// Native frame indices that are never delivered
    pub skip: Vec<Frame>,
}

impl SyntheticVideo {
    pub fn new(frame_rate: FrameRate, frames: Frame) -> Self {
        Self {
            frame_rate,
            size: Size::new(64, 36),
            layout: VideoFrameType::TwoD,
            frames,
            skip: Vec::new(),
        }
    }

    fn native_frames(&self) -> Frame {
        match self.layout {
            VideoFrameType::ThreeDAlternate => self.frames * 2,
            _ => self.frames,
        }
    }

    fn logical(&self, native: Frame) -> Frame {
        match self.layout {
            VideoFrameType::ThreeDAlternate => native / 2,
            _ => native,
        }
    }
}

/// One tone stream produced by a [`SyntheticSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticAudio {
    /// Rate, channels and length in samples
    pub stream: AudioStream,
    pub tone_hz: f32,
}

/// Everything a [`SyntheticSource`] delivers.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub video: Option<SyntheticVideo>,
    pub audio: Vec<SyntheticAudio>,
    /// Samples per audio block
    pub audio_block: usize,
    pub text: Vec<ContentText>,
    /// Fail with a decoder error on reaching this time
    pub fail_at: Option<ContentTime>,
    /// Inaccurate seeks land on a multiple of this many frames
    pub keyframe_interval: Frame,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            video: None,
            audio: Vec::new(),
            audio_block: 2000,
            text: Vec::new(),
            fail_at: None,
            keyframe_interval: 1,
        }
    }
}

impl SyntheticConfig {
    /// Video only.
    pub fn video(video: SyntheticVideo) -> Self {
        Self {
            video: Some(video),
            ..Default::default()
        }
    }

    /// Add a tone stream.
    pub fn with_audio(mut self, stream: AudioStream, tone_hz: f32) -> Self {
        self.audio.push(SyntheticAudio { stream, tone_hz });
        self
    }
}

/// A deterministic [`Source`].
pub struct SyntheticSource {
    config: SyntheticConfig,
    image: Option<SharedImage>,
    next_frame: Frame,
    next_samples: Vec<Frame>,
    next_text: usize,
    failed: bool,
}

/// What the source will deliver next.
enum Next {
    Video(Frame),
    Audio(usize),
    Text(usize),
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let image = config
            .video
            .as_ref()
            .map(|v| Arc::new(Image::test_pattern(v.size)));
        let next_samples = vec![0; config.audio.len()];
        debug!(
            video = config.video.is_some(),
            audio_streams = config.audio.len(),
            texts = config.text.len(),
            "Created synthetic source"
        );
        Self {
            config,
            image,
            next_frame: 0,
            next_samples,
            next_text: 0,
            failed: false,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn next(&self) -> Option<(ContentTime, Next)> {
        let mut best: Option<(ContentTime, Next)> = None;
        let mut offer = |time: ContentTime, next: Next| {
            if best.as_ref().map_or(true, |(t, _)| time < *t) {
                best = Some((time, next));
            }
        };

        if let Some(video) = &self.config.video {
            if self.next_frame < video.native_frames() {
                let time = ContentTime::from_frames(video.logical(self.next_frame), video.frame_rate);
                offer(time, Next::Video(self.next_frame));
            }
        }
        for (i, audio) in self.config.audio.iter().enumerate() {
            if self.next_samples[i] < audio.stream.length {
                let time = ContentTime::from_samples(self.next_samples[i], audio.stream.frame_rate);
                offer(time, Next::Audio(i));
            }
        }
        if let Some(text) = self.config.text.get(self.next_text) {
            offer(text.period.from, Next::Text(self.next_text));
        }
        best
    }

    fn tone(audio: &SyntheticAudio, from: Frame, frames: usize) -> AudioBuffers {
        let rate = audio.stream.frame_rate as f32;
        let channel: Vec<f32> = (0..frames)
            .map(|i| {
                let n = (from + i as Frame) as f32;
                (2.0 * std::f32::consts::PI * audio.tone_hz * n / rate).sin() * 0.25
            })
            .collect();
        AudioBuffers::from_planar(vec![channel; audio.stream.channels])
    }
}

impl Source for SyntheticSource {
    fn pass(&mut self, out: &mut dyn Emitter) -> Result<bool> {
        if self.failed {
            return Err(ReelError::Decoder("synthetic source already failed".into()));
        }
        let Some((time, next)) = self.next() else {
            return Ok(true);
        };
        if self.config.fail_at.is_some_and(|at| time >= at) {
            self.failed = true;
            warn!(%time, "Synthetic source failing");
            return Err(ReelError::Decoder(format!("synthetic failure at {}", time)));
        }

        match next {
            Next::Video(native) => {
                self.next_frame += 1;
                let skipped = self
                    .config
                    .video
                    .as_ref()
                    .is_some_and(|v| v.skip.contains(&native));
                if let (false, Some(image)) = (skipped, &self.image) {
                    out.video(native, image.clone())?;
                }
            }
            Next::Audio(i) => {
                let audio = &self.config.audio[i];
                let from = self.next_samples[i];
                let frames = (audio.stream.length - from).min(self.config.audio_block as Frame) as usize;
                let data = Self::tone(audio, from, frames);
                let stream = audio.stream.id;
                self.next_samples[i] += frames as Frame;
                out.audio(stream, data, time)?;
            }
            Next::Text(i) => {
                self.next_text += 1;
                out.text(self.config.text[i].clone())?;
            }
        }
        Ok(false)
    }

    fn seek(&mut self, time: ContentTime, accurate: bool) -> Result<()> {
        let time = time.max(ContentTime::ZERO);
        if let Some(video) = &self.config.video {
            let mut frame = time.frames_floor(video.frame_rate);
            if !accurate && self.config.keyframe_interval > 1 {
                frame -= frame % self.config.keyframe_interval;
            }
            self.next_frame = match video.layout {
                VideoFrameType::ThreeDAlternate => frame * 2,
                _ => frame,
            };
        }
        for (i, audio) in self.config.audio.iter().enumerate() {
            self.next_samples[i] = time.samples_round(audio.stream.frame_rate);
        }
        self.next_text = self
            .config
            .text
            .iter()
            .position(|t| t.period.to > time)
            .unwrap_or(self.config.text.len());
        self.failed = false;
        debug!(%time, accurate, "Synthetic source seek");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CollectingEmitter;

    fn run(source: &mut SyntheticSource, out: &mut CollectingEmitter) -> Result<()> {
        while !source.pass(out)? {}
        Ok(())
    }

    #[test]
    fn test_delivers_everything_in_time_order() {
        let config = SyntheticConfig::video(SyntheticVideo::new(FrameRate::FPS_24, 24))
            .with_audio(AudioStream::new(0, 48000, 2, 48000), 440.0);
        let mut source = SyntheticSource::new(config);
        let mut out = CollectingEmitter::default();
        run(&mut source, &mut out).unwrap();
        assert_eq!(out.video.len(), 24);
        let samples: usize = out.audio.iter().map(|(_, a, _)| a.frames()).sum();
        assert_eq!(samples, 48000);
        assert!(out.audio.windows(2).all(|w| w[0].2 < w[1].2));
    }

    #[test]
    fn test_skipped_frames_are_missing() {
        let mut video = SyntheticVideo::new(FrameRate::FPS_24, 10);
        video.skip = vec![3, 4];
        let mut source = SyntheticSource::new(SyntheticConfig::video(video));
        let mut out = CollectingEmitter::default();
        run(&mut source, &mut out).unwrap();
        let frames: Vec<Frame> = out.video.iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![0, 1, 2, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_failure_is_a_decoder_error() {
        let mut config = SyntheticConfig::video(SyntheticVideo::new(FrameRate::FPS_24, 24));
        config.fail_at = Some(ContentTime::from_frames(5, FrameRate::FPS_24));
        let mut source = SyntheticSource::new(config);
        let mut out = CollectingEmitter::default();
        let result = run(&mut source, &mut out);
        assert!(matches!(result, Err(ReelError::Decoder(_))));
        assert_eq!(out.video.len(), 5);
    }

    #[test]
    fn test_inaccurate_seek_lands_on_keyframe() {
        let mut config = SyntheticConfig::video(SyntheticVideo::new(FrameRate::FPS_24, 48));
        config.keyframe_interval = 12;
        let mut source = SyntheticSource::new(config);
        source.seek(ContentTime::from_frames(30, FrameRate::FPS_24), false).unwrap();
        let mut out = CollectingEmitter::default();
        source.pass(&mut out).unwrap();
        assert_eq!(out.video[0].0, 24);

        source.seek(ContentTime::from_frames(30, FrameRate::FPS_24), true).unwrap();
        source.pass(&mut out).unwrap();
        assert_eq!(out.video[1].0, 30);
    }
}
