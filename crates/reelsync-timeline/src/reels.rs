//! Reel partitioning of packaged content and pass-through validation.
//!
//! Packaged content is already split into reels. Its essence can only be
//! referenced unchanged when those reels line up exactly with the
//! project's own reels and nothing else competes for the same region.
//! Anything that cannot be checked is answered with a reason, never an
//! error.

use crate::content::Content;
use crate::project::Project;
use reelsync_core::{DCPTime, DCPTimePeriod, Frame, FrameRate, MediaKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Assets found in one reel of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelAssets {
    /// Picture duration in output frames
    pub duration: Frame,
    pub has_picture: bool,
    pub has_sound: bool,
    pub has_text: bool,
}

impl ReelAssets {
    pub fn has(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.has_picture,
            MediaKind::Audio => self.has_sound,
            MediaKind::Text => self.has_text,
        }
    }
}

/// Reads the reel structure of a package.
pub trait PackageReader: Send + Sync + fmt::Debug {
    fn reels(&self) -> Result<Vec<ReelAssets>>;
}

/// A reader with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageReader {
    pub reels: Vec<ReelAssets>,
}

impl PackageReader for StaticPackageReader {
    fn reels(&self) -> Result<Vec<ReelAssets>> {
        Ok(self.reels.clone())
    }
}

/// Why packaged essence cannot be passed through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CannotReference {
    #[error("The content is not a reel package")]
    NotAPackage,

    #[error("The package could not be read: {0}")]
    Unreadable(String),

    #[error("The package is encrypted and there is no valid KDM for it")]
    Encrypted,

    #[error("The package standard differs from the project's")]
    StandardMismatch,

    #[error("The package frame rate differs from the project's")]
    FrameRateMismatch,

    #[error("Reel lengths in the project differ from those in the package; split reels by video content")]
    ReelMismatch,

    #[error("There is other {0} content overlapping this package; remove it")]
    Overlapping(MediaKind),

    #[error("The package does not have {0} in all reels")]
    MissingInReel(MediaKind),
}

/// Reel periods before trimming, starting where the untrimmed content
/// would start.
pub(crate) fn untrimmed_reels(content: &Content, rate: FrameRate) -> Option<Vec<DCPTimePeriod>> {
    let package = content.package.as_ref()?;
    let lengths: Vec<Frame> = match &package.reel_lengths {
        Some(lengths) => lengths.clone(),
        None => match package.reader.as_ref()?.reels() {
            Ok(reels) => reels.iter().map(|r| r.duration).collect(),
            Err(e) => {
                warn!(content = %content.name, error = %e, "Could not read package; guessing one reel");
                return None;
            }
        },
    };
    if lengths.is_empty() {
        return None;
    }

    let frc = content.frc(rate);
    let mut from = content.position - DCPTime::from_content(content.trim_start, &frc);
    Some(
        lengths
            .into_iter()
            .map(|length| {
                let to = from + DCPTime::from_frames(length, rate);
                let period = DCPTimePeriod::new(from, to);
                from = to;
                period
            })
            .collect(),
    )
}

/// The reels of `content` on the output timeline.
///
/// Declared lengths win, then whatever the reader reports; if neither is
/// available the whole content is one reel. The result always tiles
/// `[position, end)` exactly.
pub fn reel_periods(content: &Content, rate: FrameRate) -> Vec<DCPTimePeriod> {
    let whole = content.period(rate);
    let Some(untrimmed) = untrimmed_reels(content, rate) else {
        return vec![whole];
    };

    let mut periods: Vec<DCPTimePeriod> = untrimmed.into_iter().filter_map(|p| p.overlap(whole)).collect();
    if periods.is_empty() {
        return vec![whole];
    }
    if let Some(last) = periods.last_mut() {
        if last.to < whole.to {
            warn!(content = %content.name, missing = %(whole.to - last.to), "Reels end before the content");
            last.to = whole.to;
        }
    }
    periods
}

/// Check whether the `kind` essence of `content` can be passed through.
pub fn can_reference(
    project: &Project,
    content: &Content,
    kind: MediaKind,
) -> std::result::Result<(), CannotReference> {
    let package = content.package.as_ref().ok_or(CannotReference::NotAPackage)?;
    let reader = package
        .reader
        .as_ref()
        .ok_or_else(|| CannotReference::Unreadable("no reader".into()))?;
    let reels = reader
        .reels()
        .map_err(|e| CannotReference::Unreadable(e.to_string()))?;

    if !package.can_be_played() {
        return Err(CannotReference::Encrypted);
    }
    if package.standard != project.standard {
        return Err(CannotReference::StandardMismatch);
    }
    if content.video.as_ref().is_some_and(|v| v.frame_rate != project.video_frame_rate) {
        return Err(CannotReference::FrameRateMismatch);
    }

    let project_reels = project.reels();
    for reel in reel_periods(content, project.video_frame_rate) {
        if !project_reels.contains(&reel) {
            debug!(content = %content.name, %reel, "Reel not in project");
            return Err(CannotReference::ReelMismatch);
        }
    }

    let overlapping = project.overlapping(kind, content.period(project.video_frame_rate));
    if overlapping.len() != 1 || overlapping[0].id != content.id {
        return Err(CannotReference::Overlapping(kind));
    }

    if matches!(kind, MediaKind::Audio | MediaKind::Text) && !reels.iter().all(|r| r.has(kind)) {
        return Err(CannotReference::MissingInReel(kind));
    }

    Ok(())
}
