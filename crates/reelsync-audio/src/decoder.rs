//! Per-piece audio decode adapter.
//!
//! Takes raw decoded audio from a source, places it on the content's
//! resampled timeline, applies the content's delay and converts sample
//! rates. Output goes to the player as [`DecodedEvent`]s.

use crate::resampler::Resampler;
use crossbeam_channel::Sender;
use reelsync_core::{
    AudioBuffers, AudioStream, ContentAudio, ContentTime, Decoded, DecodedEvent, Frame, PieceId,
    ReelError, Result, StreamId,
};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What an [`AudioDecoder`] needs to know about its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    pub streams: Vec<AudioStream>,
    /// Delay applied to all streams, in milliseconds (may be negative)
    pub delay_ms: i64,
    /// Rate every stream is converted to
    pub resampled_rate: u32,
}

impl AudioSettings {
    fn delay(&self) -> ContentTime {
        ContentTime::from_seconds(self.delay_ms as f64 / 1000.0)
    }

    /// The delay as a frame count at the resampled rate.
    pub fn delay_frames(&self) -> Frame {
        self.delay().samples_round(self.resampled_rate)
    }
}

/// Audio adapter owned by one piece.
pub struct AudioDecoder {
    piece: PieceId,
    settings: AudioSettings,
    fast: bool,
    ignore: bool,
    /// Running position per stream; `None` until the first data after a seek
    positions: HashMap<StreamId, Option<Frame>>,
    resamplers: HashMap<StreamId, Resampler>,
    /// End of the input seen for each stream since the last seek
    received: HashMap<StreamId, ContentTime>,
    /// Set once the current segment has been flushed
    flushed: bool,
    tx: Sender<DecodedEvent>,
}

impl AudioDecoder {
    pub fn new(piece: PieceId, settings: AudioSettings, fast: bool, tx: Sender<DecodedEvent>) -> Self {
        let positions = settings.streams.iter().map(|s| (s.id, None)).collect();
        debug!(
            %piece,
            streams = settings.streams.len(),
            delay_ms = settings.delay_ms,
            resampled_rate = settings.resampled_rate,
            "Created audio decoder"
        );
        Self {
            piece,
            settings,
            fast,
            ignore: false,
            positions,
            resamplers: HashMap::new(),
            received: HashMap::new(),
            flushed: false,
            tx,
        }
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    /// Suppress all output from now on.
    pub fn set_ignore(&mut self) {
        self.ignore = true;
    }

    pub fn ignored(&self) -> bool {
        self.ignore
    }

    /// Running position of one stream, in resampled frames.
    pub fn stream_position(&self, stream: StreamId) -> Option<Frame> {
        self.positions.get(&stream).copied().flatten()
    }

    /// Whether all of `stream`'s declared length has been given.
    pub fn stream_done(&self, stream: StreamId) -> bool {
        let Some(declared) = self.settings.streams.iter().find(|s| s.id == stream) else {
            return false;
        };
        let length = ContentTime::from_samples(declared.length, declared.frame_rate);
        self.received.get(&stream).is_some_and(|&end| end >= length)
    }

    /// Whether every stream has been given all of its declared length.
    pub fn done(&self) -> bool {
        self.settings.streams.iter().all(|s| self.stream_done(s.id))
    }

    /// The earliest position of any stream that is still receiving data.
    ///
    /// Streams that have run out stop holding the position back; once all
    /// have, this is the latest of their positions.
    pub fn position(&self) -> Option<ContentTime> {
        let live = self
            .positions
            .iter()
            .filter(|(&stream, _)| !self.stream_done(stream))
            .filter_map(|(_, &position)| position)
            .min();
        let frame = match live {
            Some(frame) => frame,
            None if self.done() => self.positions.values().flatten().max().copied()?,
            None => return None,
        };
        Some(ContentTime::from_samples(frame, self.settings.resampled_rate))
    }

    /// Accept a block of audio for `stream` that the source says starts at `time`.
    pub fn give(&mut self, stream: StreamId, data: AudioBuffers, time: ContentTime) -> Result<()> {
        let native_rate = self
            .settings
            .streams
            .iter()
            .find(|s| s.id == stream)
            .map(|s| s.frame_rate)
            .ok_or(ReelError::UnknownStream(stream))?;
        let established = *self
            .positions
            .get(&stream)
            .ok_or(ReelError::UnknownStream(stream))?;

        let input_end = time + ContentTime::from_samples(data.frame_count(), native_rate);
        let received = self.received.entry(stream).or_insert(input_end);
        *received = (*received).max(input_end);
        let rate = self.settings.resampled_rate;

        if self.ignore {
            // Keep counting so the piece still advances.
            let end = (time + self.settings.delay() + ContentTime::from_samples(data.frame_count(), native_rate))
                .samples_round(rate);
            let next = established.map_or(end, |p| p.max(end));
            self.positions.insert(stream, Some(next));
            return Ok(());
        }

        let mut position = match established {
            Some(position) => position,
            None => {
                let start = time.samples_round(rate);
                let delay = self.settings.delay_frames();
                if delay > 0 {
                    let silence = AudioBuffers::silent(data.channels(), delay as usize);
                    self.emit(stream, silence, start)?;
                }
                start + delay
            }
        };

        let data = if native_rate != rate {
            let channels = data.channels();
            let fast = self.fast;
            let resampler = match self.resamplers.entry(stream) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    debug!(%stream, from = native_rate, to = rate, "Creating resampler");
                    e.insert(Resampler::new(native_rate, rate, channels, fast)?)
                }
            };
            resampler.run(&data)?
        } else {
            data
        };

        if !data.is_empty() {
            let frames = data.frame_count();
            self.emit(stream, data, position)?;
            position += frames;
        }
        self.positions.insert(stream, Some(position));
        trace!(%stream, position, "Audio position advanced");
        Ok(())
    }

    /// Drain resamplers and lay down trailing silence for a negative delay.
    ///
    /// Runs once per segment; further calls before new data do nothing.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        self.drain_resamplers()?;

        let delay = self.settings.delay_frames();
        if delay < 0 && !self.ignore {
            let streams: Vec<(StreamId, usize)> =
                self.settings.streams.iter().map(|s| (s.id, s.channels)).collect();
            for (stream, channels) in streams {
                if let Some(position) = self.stream_position(stream) {
                    let silence = AudioBuffers::silent(channels, (-delay) as usize);
                    self.emit(stream, silence, position)?;
                    self.positions.insert(stream, Some(position - delay));
                }
            }
        }
        debug!(piece = %self.piece, "Flushed audio decoder");
        Ok(())
    }

    /// Prepare for data from a new point in the content.
    pub fn seek(&mut self) -> Result<()> {
        if let Err(e) = self.drain_resamplers() {
            warn!(piece = %self.piece, error = %e, "Resampler drain failed during seek");
        }
        for resampler in self.resamplers.values_mut() {
            resampler.reset();
        }
        for position in self.positions.values_mut() {
            *position = None;
        }
        self.received.clear();
        self.flushed = false;
        Ok(())
    }

    /// Emit each resampler's tail at its stream's running position.
    fn drain_resamplers(&mut self) -> Result<()> {
        let mut streams: Vec<StreamId> = self.resamplers.keys().copied().collect();
        streams.sort();
        for stream in streams {
            let tail = match self.resamplers.get_mut(&stream) {
                Some(resampler) => resampler.flush()?,
                None => continue,
            };
            if tail.is_empty() || self.ignore {
                continue;
            }
            if let Some(position) = self.stream_position(stream) {
                let frames = tail.frame_count();
                self.emit(stream, tail, position)?;
                self.positions.insert(stream, Some(position + frames));
            }
        }
        Ok(())
    }

    fn emit(&self, stream: StreamId, audio: AudioBuffers, frame: Frame) -> Result<()> {
        self.tx
            .send(DecodedEvent {
                piece: self.piece,
                decoded: Decoded::Audio {
                    stream,
                    audio: ContentAudio { audio, frame },
                },
            })
            .map_err(|_| ReelError::Internal(format!("{}: event channel closed", self.piece)))
    }
}
