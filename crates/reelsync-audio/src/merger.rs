//! Audio merger: sums audio from every active piece into one stream.
//!
//! Each piece pushes blocks tagged with their output start time. Pulling up
//! to a time returns everything before it as one contiguous buffer, with
//! overlapping contributions added sample for sample and silence wherever
//! nothing was pushed.

use reelsync_core::{AudioBuffers, DCPTime, Frame, PieceId};
use tracing::trace;

/// A block waiting to be pulled.
#[derive(Debug, Clone)]
struct PendingBlock {
    piece: PieceId,
    /// First frame at the output audio rate
    start: Frame,
    audio: AudioBuffers,
}

impl PendingBlock {
    fn end(&self) -> Frame {
        self.start + self.audio.frame_count()
    }
}

/// Mixes per-piece audio into the output channel layout.
pub struct AudioMerger {
    channels: usize,
    frame_rate: u32,
    blocks: Vec<PendingBlock>,
    /// End of the last pull; anything earlier is discarded on push
    pulled_to: Option<Frame>,
}

impl AudioMerger {
    /// Create a merger producing `channels` channels at `frame_rate` Hz.
    pub fn new(channels: usize, frame_rate: u32) -> Self {
        Self {
            channels,
            frame_rate,
            blocks: Vec::new(),
            pulled_to: None,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Whether anything is waiting to be pulled.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Add a block from `piece` that starts at `time`.
    pub fn push(&mut self, piece: PieceId, audio: AudioBuffers, time: DCPTime) {
        let mut audio = if audio.channels() == self.channels {
            audio
        } else {
            audio.remap(self.channels)
        };
        let mut start = time.samples_round(self.frame_rate);

        if let Some(pulled_to) = self.pulled_to {
            if start < pulled_to {
                let late = (pulled_to - start) as usize;
                trace!(%piece, late, "Trimming audio that arrived after it was pulled");
                audio.trim_start(late);
                start = pulled_to;
            }
        }

        if !audio.is_empty() {
            self.blocks.push(PendingBlock { piece, start, audio });
        }
    }

    /// Mix everything before `to` into one buffer.
    ///
    /// Returns the buffer and its start time, or `None` when nothing
    /// pending starts before `to`.
    pub fn pull(&mut self, to: DCPTime) -> Option<(AudioBuffers, DCPTime)> {
        let to = to.samples_round(self.frame_rate);
        let from = self
            .blocks
            .iter()
            .map(|b| b.start)
            .filter(|&start| start < to)
            .min()?;

        let mut out = AudioBuffers::silent(self.channels, (to - from) as usize);
        for block in &self.blocks {
            let overlap_from = block.start.max(from);
            let overlap_to = block.end().min(to);
            if overlap_to <= overlap_from {
                continue;
            }
            out.accumulate_frames(
                &block.audio,
                (overlap_to - overlap_from) as usize,
                (overlap_from - block.start) as usize,
                (overlap_from - from) as usize,
            );
        }

        self.blocks.retain_mut(|block| {
            if block.end() <= to {
                return false;
            }
            if block.start < to {
                block.audio.trim_start((to - block.start) as usize);
                block.start = to;
            }
            true
        });
        self.pulled_to = Some(self.pulled_to.map_or(to, |p| p.max(to)));

        trace!(from, to, pending = self.blocks.len(), "Pulled merged audio");
        Some((out, DCPTime::from_samples(from, self.frame_rate)))
    }

    /// Drop everything, for a seek.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.pulled_to = None;
    }

    /// End of the latest pending block.
    pub fn end(&self) -> Option<DCPTime> {
        self.blocks
            .iter()
            .map(PendingBlock::end)
            .max()
            .map(|end| DCPTime::from_samples(end, self.frame_rate))
    }

    /// Pieces that still have audio waiting.
    pub fn pending_pieces(&self) -> Vec<PieceId> {
        let mut pieces: Vec<PieceId> = self.blocks.iter().map(|b| b.piece).collect();
        pieces.sort();
        pieces.dedup();
        pieces
    }
}
