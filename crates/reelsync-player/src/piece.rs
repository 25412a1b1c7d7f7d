//! A piece: one content item with its source and decode adapters.

use reelsync_audio::AudioDecoder;
use reelsync_core::{
    AudioBuffers, ContentText, ContentTime, DCPTime, Frame, FrameRate, FrameRateChange, PieceId,
    Result, SharedImage, StreamId,
};
use reelsync_media::{Emitter, Source, TextDecoder, VideoDecoder};
use reelsync_timeline::Content;
use std::sync::Arc;
use tracing::debug;

/// Routes what a source emits to the adapters of its piece.
struct PieceEmitter<'a> {
    video: Option<&'a mut VideoDecoder>,
    audio: Option<&'a mut AudioDecoder>,
    text: Option<&'a mut TextDecoder>,
}

impl Emitter for PieceEmitter<'_> {
    fn video(&mut self, frame: Frame, image: SharedImage) -> Result<()> {
        match self.video.as_deref_mut() {
            Some(video) => video.receive(frame, image),
            None => Ok(()),
        }
    }

    fn audio(&mut self, stream: StreamId, data: AudioBuffers, time: ContentTime) -> Result<()> {
        match self.audio.as_deref_mut() {
            Some(audio) => audio.give(stream, data, time),
            None => Ok(()),
        }
    }

    fn text(&mut self, text: ContentText) -> Result<()> {
        match self.text.as_deref_mut() {
            Some(decoder) => decoder.give(text),
            None => Ok(()),
        }
    }
}

pub struct Piece {
    pub id: PieceId,
    pub content: Arc<Content>,
    pub frc: FrameRateChange,
    source: Box<dyn Source>,
    pub(crate) video: Option<VideoDecoder>,
    pub(crate) audio: Option<AudioDecoder>,
    pub(crate) text: Option<TextDecoder>,
    /// Content time of the last seek (or the trimmed start)
    base: ContentTime,
    done: bool,
}

impl Piece {
    pub fn new(
        id: PieceId,
        content: Arc<Content>,
        frc: FrameRateChange,
        source: Box<dyn Source>,
        video: Option<VideoDecoder>,
        audio: Option<AudioDecoder>,
        text: Option<TextDecoder>,
    ) -> Self {
        let base = content.trim_start;
        Self {
            id,
            content,
            frc,
            source,
            video,
            audio,
            text,
            base,
            done: false,
        }
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn set_done(&mut self) {
        self.done = true;
    }

    /// Whether this piece will emit any audio.
    pub fn has_active_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| !a.ignored())
    }

    /// Output time of a content time inside this piece.
    pub fn content_to_dcp(&self, time: ContentTime) -> DCPTime {
        let offset = (time - self.content.trim_start).max(ContentTime::ZERO);
        self.content.position + DCPTime::from_content(offset, &self.frc)
    }

    /// Content time of an output time inside this piece.
    pub fn dcp_to_content(&self, time: DCPTime) -> ContentTime {
        let offset = (time - self.content.position).max(DCPTime::ZERO);
        ContentTime::from_dcp(offset, &self.frc) + self.content.trim_start
    }

    /// How far this piece has got, on the output timeline.
    ///
    /// An adapter that has run out stops holding the piece back, so a short
    /// audio stream does not pin the piece to where the audio ended.
    pub fn position(&self) -> DCPTime {
        // Text only drives the position when there is nothing else, since a
        // long subtitle would otherwise hold the piece at its start.
        let adapters = [
            self.video.as_ref().map(|v| (v.position(), v.done())),
            self.audio.as_ref().map(|a| (a.position(), a.done())),
        ];
        let content = match (self.video.is_some() || self.audio.is_some(), &self.text) {
            (false, Some(text)) => text.position(),
            _ => {
                let mut live = adapters.iter().flatten().filter(|(_, done)| !done).peekable();
                if live.peek().is_some() {
                    live.filter_map(|(position, _)| *position).min()
                } else {
                    adapters.iter().flatten().filter_map(|(position, _)| *position).max()
                }
            }
        };
        let content = content.unwrap_or(self.base);
        self.content_to_dcp(content)
    }

    /// Where this piece's video has got to, if it will emit any more.
    pub fn video_position(&self) -> Option<DCPTime> {
        let video = self.video.as_ref().filter(|v| !v.ignored() && !v.done())?;
        Some(self.content_to_dcp(video.position().unwrap_or(self.base)))
    }

    /// Decode one step. Returns `true` when the source is exhausted.
    pub fn pass(&mut self) -> Result<bool> {
        let mut emitter = PieceEmitter {
            video: self.video.as_mut(),
            audio: self.audio.as_mut(),
            text: self.text.as_mut(),
        };
        self.source.pass(&mut emitter)
    }

    /// The source is finished: flush the adapters.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(video) = self.video.as_mut() {
            video.finish()?;
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.flush()?;
        }
        debug!(piece = %self.id, content = %self.content.name, "Piece finished");
        Ok(())
    }

    /// Move the source and adapters to content time `time`.
    pub fn seek(&mut self, time: ContentTime, accurate: bool) -> Result<()> {
        self.source.seek(time, accurate)?;
        if let Some(video) = self.video.as_mut() {
            let rate: FrameRate = self.frc.source;
            video.seek(time.frames_floor(rate), accurate);
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.seek()?;
        }
        if let Some(text) = self.text.as_mut() {
            text.seek();
        }
        self.base = time;
        self.done = false;
        Ok(())
    }
}
