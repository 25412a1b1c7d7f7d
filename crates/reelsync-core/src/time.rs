//! Time representation for frame- and sample-accurate playback.
//!
//! Times are integer tick counts at [`TICKS_PER_SECOND`], which addresses
//! individual samples at 48kHz and 96kHz. There are two time domains:
//!
//! - [`ContentTime`]: a position inside one piece of content, in that
//!   content's own frame of reference.
//! - [`DCPTime`]: a position on the unified output timeline.
//!
//! The domains are distinct types. The only way across is through a
//! [`FrameRateChange`], via [`DCPTime::from_content`] and
//! [`ContentTime::from_dcp`].

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Tick resolution of every time value.
pub const TICKS_PER_SECOND: i64 = 96_000;

/// A video frame or audio sample index, relative to one stream's rate.
pub type Frame = i64;

/// Marker for a time domain.
pub trait TimeDomain:
    fmt::Debug + Clone + Copy + PartialEq + Eq + PartialOrd + Ord + std::hash::Hash + Default
{
    /// Short label used when formatting.
    const LABEL: &'static str;
}

/// Domain of times local to one content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentDomain;

/// Domain of times on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DcpDomain;

impl TimeDomain for ContentDomain {
    const LABEL: &'static str = "content";
}

impl TimeDomain for DcpDomain {
    const LABEL: &'static str = "dcp";
}

/// Round `num / den` to the nearest integer, halves away from zero.
fn div_round(num: i128, den: i128) -> i64 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let q = if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    };
    q as i64
}

fn div_floor(num: i128, den: i128) -> i64 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    num.div_euclid(den) as i64
}

fn div_ceil(num: i128, den: i128) -> i64 {
    -div_floor(-num, den)
}

/// A point in time (or a duration) in domain `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Time<D: TimeDomain> {
    ticks: i64,
    #[serde(skip)]
    domain: PhantomData<D>,
}

/// A time inside one content item.
pub type ContentTime = Time<ContentDomain>;

/// A time on the output timeline.
pub type DCPTime = Time<DcpDomain>;

impl<D: TimeDomain> Time<D> {
    /// Zero time constant.
    pub const ZERO: Self = Self::from_ticks(0);

    /// Largest representable time.
    pub const MAX: Self = Self::from_ticks(i64::MAX / 4);

    /// Create a time from a raw tick count.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self {
            ticks,
            domain: PhantomData,
        }
    }

    /// Raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    /// Create a time from seconds as a float.
    /// Note: May introduce small precision errors.
    pub fn from_seconds(seconds: f64) -> Self {
        Self::from_ticks((seconds * TICKS_PER_SECOND as f64).round() as i64)
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn seconds(self) -> f64 {
        self.ticks as f64 / TICKS_PER_SECOND as f64
    }

    /// Time of `frames` frames at `rate`, rounded to the nearest tick.
    pub fn from_frames(frames: Frame, rate: FrameRate) -> Self {
        let num = frames as i128 * TICKS_PER_SECOND as i128 * rate.denominator as i128;
        Self::from_ticks(div_round(num, rate.numerator as i128))
    }

    /// Time of `samples` audio samples at `sample_rate` Hz.
    #[inline]
    pub fn from_samples(samples: Frame, sample_rate: u32) -> Self {
        Self::from_frames(samples, FrameRate::from_hz(sample_rate))
    }

    fn frames_parts(self, rate: FrameRate) -> (i128, i128) {
        (
            self.ticks as i128 * rate.numerator as i128,
            TICKS_PER_SECOND as i128 * rate.denominator as i128,
        )
    }

    /// Frame index at `rate`, rounded to nearest.
    pub fn frames_round(self, rate: FrameRate) -> Frame {
        let (num, den) = self.frames_parts(rate);
        div_round(num, den)
    }

    /// Frame index at `rate`, rounded down.
    pub fn frames_floor(self, rate: FrameRate) -> Frame {
        let (num, den) = self.frames_parts(rate);
        div_floor(num, den)
    }

    /// Frame index at `rate`, rounded up.
    pub fn frames_ceil(self, rate: FrameRate) -> Frame {
        let (num, den) = self.frames_parts(rate);
        div_ceil(num, den)
    }

    /// Sample index at `sample_rate` Hz, rounded to nearest.
    #[inline]
    pub fn samples_round(self, sample_rate: u32) -> Frame {
        self.frames_round(FrameRate::from_hz(sample_rate))
    }

    /// This time rounded to the nearest frame boundary at `rate`.
    pub fn round_to_frame(self, rate: FrameRate) -> Self {
        Self::from_frames(self.frames_round(rate), rate)
    }

    /// This time rounded up to a frame boundary at `rate`.
    pub fn ceil_to_frame(self, rate: FrameRate) -> Self {
        Self::from_frames(self.frames_ceil(rate), rate)
    }

    /// Check if this time is zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.ticks == 0
    }

    /// Get the absolute value of this time.
    #[inline]
    pub fn abs(self) -> Self {
        Self::from_ticks(self.ticks.abs())
    }
}

impl DCPTime {
    /// Convert a content time to the output timeline.
    ///
    /// Only the offset *within* the content is converted; callers add the
    /// content's position afterwards.
    pub fn from_content(time: ContentTime, frc: &FrameRateChange) -> Self {
        let su = frc.speed_up;
        Self::from_ticks(div_round(
            time.ticks as i128 * *su.denom() as i128,
            *su.numer() as i128,
        ))
    }
}

impl ContentTime {
    /// Convert an output-timeline offset into the content's time base.
    pub fn from_dcp(time: DCPTime, frc: &FrameRateChange) -> Self {
        let su = frc.speed_up;
        Self::from_ticks(div_round(
            time.ticks as i128 * *su.numer() as i128,
            *su.denom() as i128,
        ))
    }
}

impl<D: TimeDomain> Add for Time<D> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::from_ticks(self.ticks + rhs.ticks)
    }
}

impl<D: TimeDomain> Sub for Time<D> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::from_ticks(self.ticks - rhs.ticks)
    }
}

impl<D: TimeDomain> AddAssign for Time<D> {
    fn add_assign(&mut self, rhs: Self) {
        self.ticks += rhs.ticks;
    }
}

impl<D: TimeDomain> SubAssign for Time<D> {
    fn sub_assign(&mut self, rhs: Self) {
        self.ticks -= rhs.ticks;
    }
}

impl<D: TimeDomain> Neg for Time<D> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::from_ticks(-self.ticks)
    }
}

impl<D: TimeDomain> fmt::Display for Time<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s[{}]", self.seconds(), D::LABEL)
    }
}

/// A half-open period `[from, to)` in domain `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TimePeriod<D: TimeDomain> {
    /// Start (inclusive)
    pub from: Time<D>,
    /// End (exclusive)
    pub to: Time<D>,
}

/// A period inside one content item.
pub type ContentTimePeriod = TimePeriod<ContentDomain>;

/// A period on the output timeline.
pub type DCPTimePeriod = TimePeriod<DcpDomain>;

impl<D: TimeDomain> TimePeriod<D> {
    #[inline]
    pub fn new(from: Time<D>, to: Time<D>) -> Self {
        Self { from, to }
    }

    /// Length of the period.
    #[inline]
    pub fn duration(self) -> Time<D> {
        self.to - self.from
    }

    /// True if the period has no length.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.to <= self.from
    }

    /// Check if a time is within this period.
    #[inline]
    pub fn contains(self, time: Time<D>) -> bool {
        self.from <= time && time < self.to
    }

    /// The overlapping part of two periods, if any.
    pub fn overlap(self, other: Self) -> Option<Self> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        if from < to {
            Some(Self::new(from, to))
        } else {
            None
        }
    }
}

impl<D: TimeDomain> fmt::Display for TimePeriod<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// A whole-number rate, also used for audio sample rates.
    #[inline]
    pub const fn from_hz(hz: u32) -> Self {
        Self::new(hz, 1)
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// The rate as an exact rational.
    #[inline]
    pub fn as_rational(self) -> Rational64 {
        Rational64::new(self.numerator as i64, self.denominator as i64)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_48: Self = Self::new(48, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// How content at one frame rate is fitted to an output frame rate.
///
/// Content close to double the output rate skips every other frame;
/// content close to a fraction of it repeats each frame. Any remaining
/// mismatch is absorbed by running the content slightly fast or slow
/// (`speed_up`), which also applies to its audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateChange {
    /// Rate of the content
    pub source: FrameRate,
    /// Rate of the output
    pub output: FrameRate,
    /// Drop every other source frame
    pub skip: bool,
    /// Emit each source frame this many times
    pub repeat: i64,
    /// True when `speed_up` is not exactly 1
    pub change_speed: bool,
    /// Output duration = content duration / `speed_up`
    pub speed_up: Rational64,
}

impl FrameRateChange {
    /// Fit `source` to `output` at normal playback speed.
    pub fn new(source: FrameRate, output: FrameRate) -> Self {
        Self::with_speed(source, output, Rational64::from_integer(1))
    }

    /// Fit `source` to `output`, with the content played at `speed`.
    pub fn with_speed(source: FrameRate, output: FrameRate, speed: Rational64) -> Self {
        let src = source.as_rational();
        let effective = src * speed;
        let out = output.as_rational();
        let distance = |r: Rational64| if r > out { r - out } else { out - r };

        let mut skip = false;
        let mut repeat = 1;
        if distance(effective / 2) < distance(effective) {
            skip = true;
        } else if distance(effective * 2) < distance(effective) {
            repeat = (out / effective).round().to_integer().max(1);
        }

        let factor = if skip {
            Rational64::new(1, 2)
        } else {
            Rational64::from_integer(repeat)
        };
        let speed_up = out / (src * factor);

        Self {
            source,
            output,
            skip,
            repeat,
            change_speed: speed_up != Rational64::from_integer(1),
            speed_up,
        }
    }

    /// Output frames per source frame: 1/2 when skipping, else `repeat`.
    pub fn factor(&self) -> Rational64 {
        if self.skip {
            Rational64::new(1, 2)
        } else {
            Rational64::from_integer(self.repeat)
        }
    }

    /// Number of output frames for `frames` source frames, rounded to nearest.
    pub fn output_frames(&self, frames: Frame) -> Frame {
        (self.factor() * frames).round().to_integer()
    }
}

impl fmt::Display for FrameRateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skip {
            write!(f, "{} -> {}: every other frame", self.source, self.output)?;
        } else if self.repeat > 1 {
            write!(f, "{} -> {}: each frame x{}", self.source, self.output, self.repeat)?;
        } else {
            write!(f, "{} -> {}: frame for frame", self.source, self.output)?;
        }
        if self.change_speed {
            let percent = *self.speed_up.numer() as f64 * 100.0 / *self.speed_up.denom() as f64;
            write!(f, ", speed {:.2}%", percent)?;
        }
        Ok(())
    }
}
