//! Per-piece video decode adapter.
//!
//! Frames arrive from the source at native indices. The adapter keeps a
//! small cache of recent frames so that frames the source skipped, or never
//! delivered before it ran dry, can be filled by repeating an earlier one.
//! Everything it emits has been through the content's frame rate change,
//! so frame numbers are at the output rate.
//!
//! For stereoscopic content, the cache key is the logical frame (a pair of
//! native frames for alternating-eye sources).

use crossbeam_channel::Sender;
use reelsync_core::limits::{MAX_GAP_FILL, VIDEO_CACHE_FRAMES};
use reelsync_core::{
    ContentTime, ContentVideo, Decoded, DecodedEvent, Eyes, Frame, FrameRateChange, Part, PieceId,
    ReelError, Result, SharedImage, VideoFrameType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// What a [`VideoDecoder`] needs to know about its content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VideoSettings {
    pub frame_type: VideoFrameType,
    /// Declared length in logical frames
    pub length: Frame,
    pub frc: FrameRateChange,
}

/// One image to emit and which eye it is for.
#[derive(Debug, Clone)]
pub struct EyeImage {
    pub eyes: Eyes,
    pub part: Part,
    pub image: SharedImage,
}

/// Answer to [`VideoDecoder::get`].
#[derive(Debug, Clone)]
pub enum VideoLookup {
    /// Images for the requested frame, real or repeated
    Ready(Vec<EyeImage>),
    /// Not decoded yet; the source should be asked for more
    Pending,
    /// Nothing can be produced for this frame
    NoData,
}

/// Cached images of one logical frame.
#[derive(Debug, Clone, Default)]
struct CachedFrame {
    /// The whole image, or the left eye of an alternating pair
    main: Option<SharedImage>,
    /// Right eye of an alternating pair
    right: Option<SharedImage>,
}

/// Video adapter owned by one piece.
pub struct VideoDecoder {
    piece: PieceId,
    settings: VideoSettings,
    cache: BTreeMap<Frame, CachedFrame>,
    /// Last logical frame handled, with the eye for alternating sources
    last: Option<(Frame, Eyes)>,
    /// Requests from here on answer `NoData` until new frames arrive
    no_data_from: Option<Frame>,
    /// Where the last seek went, and whether it was accurate
    seek_target: Option<(Frame, bool)>,
    exhausted: bool,
    ignore: bool,
    tx: Sender<DecodedEvent>,
}

impl VideoDecoder {
    pub fn new(piece: PieceId, settings: VideoSettings, tx: Sender<DecodedEvent>) -> Self {
        debug!(
            %piece,
            frame_type = ?settings.frame_type,
            length = settings.length,
            frc = %settings.frc,
            "Created video decoder"
        );
        Self {
            piece,
            settings,
            cache: BTreeMap::new(),
            last: None,
            no_data_from: None,
            seek_target: None,
            exhausted: false,
            ignore: false,
            tx,
        }
    }

    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    pub fn set_ignore(&mut self) {
        self.ignore = true;
    }

    pub fn ignored(&self) -> bool {
        self.ignore
    }

    /// Number of logical frames currently cached.
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    /// Content time just after the last complete frame handled.
    pub fn position(&self) -> Option<ContentTime> {
        let (frame, eyes) = self.last?;
        let next = match (self.settings.frame_type, eyes) {
            (VideoFrameType::ThreeDAlternate, Eyes::Left) => frame,
            _ => frame + 1,
        };
        Some(ContentTime::from_frames(next, self.settings.frc.source))
    }

    /// Whether nothing more will come: the source is exhausted or the last
    /// declared frame has been handled.
    pub fn done(&self) -> bool {
        if self.exhausted {
            return true;
        }
        let Some((frame, eyes)) = self.last else {
            return false;
        };
        let last = self.settings.length - 1;
        match self.settings.frame_type {
            VideoFrameType::ThreeDAlternate => frame > last || (frame == last && eyes != Eyes::Left),
            _ => frame >= last,
        }
    }

    /// Images for logical `frame`, without emitting anything.
    ///
    /// A frame that is not cached is filled from the nearest earlier cached
    /// frame once it can no longer arrive: the source is exhausted or, when
    /// not `accurate`, has already delivered something later.
    pub fn get(&mut self, frame: Frame, accurate: bool) -> VideoLookup {
        if let Some(cached) = self.cache.get(&frame) {
            return VideoLookup::Ready(self.exact_images(cached));
        }
        if self.no_data_from.is_some_and(|from| frame >= from) {
            return VideoLookup::NoData;
        }

        let later_delivered = self.cache.keys().next_back().is_some_and(|&last| last > frame);
        if !self.exhausted && (accurate || !later_delivered) {
            return VideoLookup::Pending;
        }

        match self.cache.range(..frame).next_back() {
            Some((&earlier, cached)) if frame - earlier <= MAX_GAP_FILL => {
                trace!(piece = %self.piece, frame, from = earlier, "Repeating frame");
                VideoLookup::Ready(self.repeated_images(cached))
            }
            _ => {
                debug!(piece = %self.piece, frame, "No video data");
                self.no_data_from = Some(self.no_data_from.map_or(frame, |f| f.min(frame)));
                VideoLookup::NoData
            }
        }
    }

    /// Accept a decoded frame at its native index.
    pub fn receive(&mut self, native: Frame, image: SharedImage) -> Result<()> {
        let (frame, eyes) = match self.settings.frame_type {
            VideoFrameType::ThreeDAlternate => {
                let eyes = if native.rem_euclid(2) == 0 { Eyes::Left } else { Eyes::Right };
                (native.div_euclid(2), eyes)
            }
            _ => (native, Eyes::Both),
        };

        if let Some((target, true)) = self.seek_target {
            if frame < target {
                trace!(piece = %self.piece, frame, target, "Dropping frame before seek target");
                return Ok(());
            }
        }
        if self.last.is_some_and(|(last, last_eyes)| (frame, eyes.order()) <= (last, last_eyes.order())) {
            trace!(piece = %self.piece, frame, "Dropping repeated frame");
            return Ok(());
        }

        let entry = self.cache.entry(frame).or_default();
        if eyes == Eyes::Right {
            entry.right = Some(image.clone());
        } else {
            entry.main = Some(image.clone());
        }
        while self.cache.len() > VIDEO_CACHE_FRAMES {
            self.cache.pop_first();
        }
        self.clear_no_data_before(frame);
        if let Some((last, _)) = self.last {
            self.fill(last + 1, frame, false)?;
        }
        // A gap too long to fill must not block what comes after this frame.
        self.clear_no_data_before(frame);

        let images = match self.settings.frame_type {
            VideoFrameType::ThreeDAlternate => vec![EyeImage {
                eyes,
                part: Part::Whole,
                image,
            }],
            frame_type => split_eyes(frame_type, image),
        };
        self.emit(frame, images)?;
        self.last = Some((frame, eyes));
        Ok(())
    }

    /// The source has nothing more: fill up to the declared length.
    pub fn finish(&mut self) -> Result<()> {
        self.exhausted = true;
        let from = match self.last {
            Some((frame, _)) => frame + 1,
            None => match self.seek_target {
                Some((target, _)) => target,
                None => 0,
            },
        };
        self.fill(from, self.settings.length, true)
    }

    /// Forget cached frames and prepare for data from logical frame `frame`.
    pub fn seek(&mut self, frame: Frame, accurate: bool) {
        self.cache.clear();
        self.no_data_from = None;
        self.last = None;
        self.exhausted = false;
        self.seek_target = Some((frame, accurate));
    }

    /// Emit gap-fill frames for `[from, to)`, stopping at the first gap
    /// that cannot be filled.
    fn fill(&mut self, from: Frame, to: Frame, accurate: bool) -> Result<()> {
        for frame in from..to {
            match self.get(frame, accurate) {
                VideoLookup::Ready(images) => {
                    self.emit(frame, images)?;
                    self.last = Some((frame, Eyes::Both));
                }
                VideoLookup::Pending | VideoLookup::NoData => break,
            }
        }
        Ok(())
    }

    fn clear_no_data_before(&mut self, frame: Frame) {
        if self.no_data_from.is_some_and(|from| frame >= from) {
            self.no_data_from = None;
        }
    }

    fn exact_images(&self, cached: &CachedFrame) -> Vec<EyeImage> {
        match self.settings.frame_type {
            VideoFrameType::ThreeDAlternate => {
                let mut images = Vec::with_capacity(2);
                if let Some(left) = &cached.main {
                    images.push(EyeImage { eyes: Eyes::Left, part: Part::Whole, image: left.clone() });
                }
                if let Some(right) = &cached.right {
                    images.push(EyeImage { eyes: Eyes::Right, part: Part::Whole, image: right.clone() });
                }
                images
            }
            frame_type => cached
                .main
                .clone()
                .map(|image| split_eyes(frame_type, image))
                .unwrap_or_default(),
        }
    }

    /// Images for repeating `cached` in place of a missing frame; 3D
    /// content gets both eyes even if only one was cached.
    fn repeated_images(&self, cached: &CachedFrame) -> Vec<EyeImage> {
        match self.settings.frame_type {
            VideoFrameType::ThreeDAlternate => {
                let left = cached.main.clone().or_else(|| cached.right.clone());
                let right = cached.right.clone().or_else(|| cached.main.clone());
                left.into_iter()
                    .map(|image| EyeImage { eyes: Eyes::Left, part: Part::Whole, image })
                    .chain(right.map(|image| EyeImage { eyes: Eyes::Right, part: Part::Whole, image }))
                    .collect()
            }
            _ => self.exact_images(cached),
        }
    }

    /// Send `images` for logical `frame` through the frame rate change.
    fn emit(&self, frame: Frame, images: Vec<EyeImage>) -> Result<()> {
        if self.ignore || images.is_empty() {
            return Ok(());
        }
        let frc = &self.settings.frc;
        let outputs: Vec<Frame> = if frc.skip {
            if frame.rem_euclid(2) == 1 {
                return Ok(());
            }
            vec![frame.div_euclid(2)]
        } else {
            (0..frc.repeat).map(|r| frame * frc.repeat + r).collect()
        };

        for output in outputs {
            for eye in &images {
                self.tx
                    .send(DecodedEvent {
                        piece: self.piece,
                        decoded: Decoded::Video(ContentVideo {
                            frame: output,
                            eyes: eye.eyes,
                            part: eye.part,
                            image: eye.image.clone(),
                        }),
                    })
                    .map_err(|_| ReelError::Internal(format!("{}: event channel closed", self.piece)))?;
            }
        }
        Ok(())
    }
}

/// Emissions for one image of a 2D or side-by-side/over-under 3D source.
fn split_eyes(frame_type: VideoFrameType, image: SharedImage) -> Vec<EyeImage> {
    let halves = match frame_type {
        VideoFrameType::ThreeDLeftRight => Some((Part::LeftHalf, Part::RightHalf)),
        VideoFrameType::ThreeDTopBottom => Some((Part::TopHalf, Part::BottomHalf)),
        _ => None,
    };
    match halves {
        Some((left, right)) => vec![
            EyeImage { eyes: Eyes::Left, part: left, image: image.clone() },
            EyeImage { eyes: Eyes::Right, part: right, image },
        ],
        None => vec![EyeImage { eyes: Eyes::Both, part: Part::Whole, image }],
    }
}
