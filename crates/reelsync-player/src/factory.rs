//! Creating a source for each content item.

use reelsync_core::{
    ContentText, ContentTimePeriod, FrameRate, ReelError, Result, Size, TextPayload,
};
use reelsync_media::{Source, SyntheticConfig, SyntheticSource, SyntheticVideo};
use reelsync_timeline::Content;
use std::collections::HashMap;
use uuid::Uuid;

/// Makes the decoder for a content item.
pub trait SourceFactory: Send + Sync {
    fn create(&self, content: &Content) -> Result<Box<dyn Source>>;
}

/// Builds [`SyntheticSource`]s that deliver what each content item declares,
/// unless a specific configuration was registered for it.
#[derive(Debug, Clone, Default)]
pub struct SyntheticFactory {
    overrides: HashMap<Uuid, SyntheticConfig>,
    /// Size of generated test patterns
    pub image_size: Option<Size>,
}

impl SyntheticFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for the content with `id`.
    pub fn with_config(mut self, id: Uuid, config: SyntheticConfig) -> Self {
        self.overrides.insert(id, config);
        self
    }

    /// A configuration that delivers exactly what `content` declares.
    pub fn config_for(&self, content: &Content) -> SyntheticConfig {
        let mut config = SyntheticConfig::default();
        if let Some(video) = &content.video {
            config.video = Some(SyntheticVideo {
                frame_rate: video.frame_rate,
                size: self.image_size.unwrap_or(video.size),
                layout: video.frame_type,
                frames: video.length,
                skip: Vec::new(),
            });
        }
        if let Some(audio) = &content.audio {
            for stream in &audio.streams {
                config = config.with_audio(stream.clone(), 440.0);
            }
            let block_rate = content
                .video
                .as_ref()
                .map_or(FrameRate::FPS_24, |v| v.frame_rate);
            if let Some(first) = audio.streams.first() {
                // Roughly one video frame of audio per block
                config.audio_block =
                    (first.frame_rate as f64 / block_rate.to_fps_f64()).ceil().max(1.0) as usize;
            }
        }
        if let Some(text) = &content.text {
            config.text = text
                .tracks
                .iter()
                .map(|track| ContentText {
                    track: track.clone(),
                    period: ContentTimePeriod::new(Default::default(), text.length),
                    payload: TextPayload::Plain(format!("{} ({})", content.name, track)),
                })
                .collect();
        }
        config
    }
}

impl SourceFactory for SyntheticFactory {
    fn create(&self, content: &Content) -> Result<Box<dyn Source>> {
        let config = match self.overrides.get(&content.id) {
            Some(config) => config.clone(),
            None => self.config_for(content),
        };
        if config.audio.iter().any(|a| a.stream.frame_rate == 0) {
            return Err(ReelError::InvalidParameter(format!(
                "{}: audio stream with no sample rate",
                content.name
            )));
        }
        Ok(Box::new(SyntheticSource::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_core::AudioStream;
    use reelsync_timeline::{AudioContent, VideoContent};

    #[test]
    fn test_config_matches_content() {
        let content = Content::new("c")
            .with_video(VideoContent::new(FrameRate::FPS_24, 48))
            .with_audio(AudioContent::new(vec![AudioStream::new(0, 48000, 2, 96000)]));
        let config = SyntheticFactory::new().config_for(&content);
        assert_eq!(config.video.as_ref().map(|v| v.frames), Some(48));
        assert_eq!(config.audio.len(), 1);
        assert_eq!(config.audio_block, 2000);
    }
}
