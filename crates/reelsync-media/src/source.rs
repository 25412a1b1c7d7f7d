//! The decoder collaborator interface.
//!
//! A [`Source`] is whatever turns a content item into decoded images, audio
//! and text. It knows nothing about the output timeline: it reports native
//! frame indices and content times, and the decode adapters take it from
//! there.

use reelsync_core::{AudioBuffers, ContentText, ContentTime, Frame, Result, SharedImage, StreamId};

/// Receives what a source decodes during one `pass()`.
pub trait Emitter {
    /// A video frame at its native index from the start of the content.
    fn video(&mut self, frame: Frame, image: SharedImage) -> Result<()>;

    /// A block of audio for `stream` that starts at `time`.
    fn audio(&mut self, stream: StreamId, data: AudioBuffers, time: ContentTime) -> Result<()>;

    fn text(&mut self, text: ContentText) -> Result<()>;
}

/// A decoder for one content item.
pub trait Source: Send {
    /// Decode one step, emitting into `out`.
    ///
    /// Returns `true` once the source has nothing more to give. A
    /// `ReelError::Decoder` means the source failed and cannot continue.
    fn pass(&mut self, out: &mut dyn Emitter) -> Result<bool>;

    /// Move to `time`. With `accurate` unset the source may land earlier.
    fn seek(&mut self, time: ContentTime, accurate: bool) -> Result<()>;
}

/// Records everything emitted, for tests and tooling.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    pub video: Vec<(Frame, SharedImage)>,
    pub audio: Vec<(StreamId, AudioBuffers, ContentTime)>,
    pub text: Vec<ContentText>,
}

impl Emitter for CollectingEmitter {
    fn video(&mut self, frame: Frame, image: SharedImage) -> Result<()> {
        self.video.push((frame, image));
        Ok(())
    }

    fn audio(&mut self, stream: StreamId, data: AudioBuffers, time: ContentTime) -> Result<()> {
        self.audio.push((stream, data, time));
        Ok(())
    }

    fn text(&mut self, text: ContentText) -> Result<()> {
        self.text.push(text);
        Ok(())
    }
}
