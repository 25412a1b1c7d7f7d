//! Per-piece text adapter: forwards subtitles and captions to the player.

use crossbeam_channel::Sender;
use reelsync_core::{ContentText, ContentTime, Decoded, DecodedEvent, PieceId, ReelError, Result};
use tracing::trace;

pub struct TextDecoder {
    piece: PieceId,
    ignore: bool,
    /// Start of the latest text seen
    position: Option<ContentTime>,
    tx: Sender<DecodedEvent>,
}

impl TextDecoder {
    pub fn new(piece: PieceId, tx: Sender<DecodedEvent>) -> Self {
        Self {
            piece,
            ignore: false,
            position: None,
            tx,
        }
    }

    pub fn set_ignore(&mut self) {
        self.ignore = true;
    }

    pub fn ignored(&self) -> bool {
        self.ignore
    }

    pub fn position(&self) -> Option<ContentTime> {
        self.position
    }

    pub fn give(&mut self, text: ContentText) -> Result<()> {
        let from = text.period.from;
        self.position = Some(self.position.map_or(from, |p| p.max(from)));
        if self.ignore {
            return Ok(());
        }
        trace!(piece = %self.piece, track = %text.track, period = %text.period, "Text");
        self.tx
            .send(DecodedEvent {
                piece: self.piece,
                decoded: Decoded::Text(text),
            })
            .map_err(|_| ReelError::Internal(format!("{}: event channel closed", self.piece)))
    }

    pub fn seek(&mut self) {
        self.position = None;
    }
}
