//! Stateful sample-rate conversion using rubato.
//!
//! Audio arrives in arbitrarily sized blocks while rubato works on fixed
//! chunks, so input is queued until a whole chunk is available. The
//! converter's own latency is dropped from the head of the output, and
//! [`Resampler::flush`] drains whatever is left so that, over one segment
//! (creation or reset up to a flush), the output length is exactly the
//! input length scaled by the rate ratio.

use reelsync_core::limits::RESAMPLER_CHUNK_FRAMES;
use reelsync_core::{AudioBuffers, ReelError, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::{debug, trace};

/// Upper bound on zero-fed drain rounds during a flush.
const MAX_DRAIN_ROUNDS: usize = 16;

/// Converts one stream from `input_rate` to `output_rate`.
pub struct Resampler {
    inner: FastFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Input waiting for a full chunk
    pending: Vec<Vec<f32>>,
    /// Leading output frames that are converter latency
    skip: usize,
    /// Input frames accepted in this segment
    consumed: u64,
    /// Output frames returned in this segment
    produced: u64,
}

impl Resampler {
    /// Create a resampler. `fast` trades quality for speed.
    pub fn new(input_rate: u32, output_rate: u32, channels: usize, fast: bool) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(ReelError::InvalidParameter(format!(
                "cannot resample {} channels from {}Hz to {}Hz",
                channels, input_rate, output_rate
            )));
        }

        let degree = if fast {
            PolynomialDegree::Linear
        } else {
            PolynomialDegree::Septic
        };

        let inner = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            degree,
            RESAMPLER_CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| ReelError::Resample(format!("Failed to create resampler: {}", e)))?;

        debug!(
            input_rate,
            output_rate, channels, fast, "Created resampler"
        );

        let skip = inner.output_delay();
        Ok(Self {
            inner,
            input_rate,
            output_rate,
            channels,
            pending: vec![Vec::new(); channels],
            skip,
            consumed: 0,
            produced: 0,
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Input frames queued but not yet converted.
    pub fn buffered_frames(&self) -> usize {
        self.pending.first().map(Vec::len).unwrap_or(0)
    }

    /// Output frames owed for the input accepted so far in this segment.
    pub fn expected_output(&self) -> u64 {
        let num = self.consumed as u128 * self.output_rate as u128;
        let den = self.input_rate as u128;
        ((num + den / 2) / den) as u64
    }

    /// Convert a block. May return an empty buffer while input is queued.
    pub fn run(&mut self, input: &AudioBuffers) -> Result<AudioBuffers> {
        if input.channels() != self.channels {
            return Err(ReelError::InvalidParameter(format!(
                "resampler has {} channels, got {}",
                self.channels,
                input.channels()
            )));
        }

        for (queue, channel) in self.pending.iter_mut().zip(input.planar()) {
            queue.extend_from_slice(channel);
        }
        self.consumed += input.frames() as u64;

        let mut out = AudioBuffers::silent(self.channels, 0);
        loop {
            let needed = self.inner.input_frames_next();
            if self.buffered_frames() < needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|queue| queue.drain(..needed).collect())
                .collect();
            let converted = self
                .inner
                .process(&chunk, None)
                .map_err(|e| ReelError::Resample(format!("Resampling failed: {}", e)))?;
            self.collect(converted, &mut out);
        }

        trace!(
            input = input.frames(),
            output = out.frames(),
            buffered = self.buffered_frames(),
            "Resampled block"
        );
        Ok(out)
    }

    /// Drain everything still inside the resampler and start a new segment.
    ///
    /// Flushing again without new input returns an empty buffer.
    pub fn flush(&mut self) -> Result<AudioBuffers> {
        let expected = self.expected_output();
        let mut out = AudioBuffers::silent(self.channels, 0);

        if self.buffered_frames() > 0 {
            let chunk = std::mem::replace(&mut self.pending, vec![Vec::new(); self.channels]);
            let converted = self
                .inner
                .process_partial(Some(&chunk), None)
                .map_err(|e| ReelError::Resample(format!("Resampler flush failed: {}", e)))?;
            self.collect(converted, &mut out);
        }

        let mut rounds = 0;
        while self.produced < expected && rounds < MAX_DRAIN_ROUNDS {
            let converted = self
                .inner
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| ReelError::Resample(format!("Resampler flush failed: {}", e)))?;
            if converted.first().map(Vec::len).unwrap_or(0) == 0 {
                break;
            }
            self.collect(converted, &mut out);
            rounds += 1;
        }

        // Zero padding of the last chunk produces more than is owed.
        if self.produced > expected {
            let excess = (self.produced - expected) as usize;
            out.truncate(out.frames().saturating_sub(excess));
        }

        debug!(
            frames = out.frames(),
            expected, "Flushed resampler"
        );
        self.reset();
        Ok(out)
    }

    /// Forget all filter state and queued input.
    pub fn reset(&mut self) {
        self.inner.reset();
        for queue in &mut self.pending {
            queue.clear();
        }
        self.skip = self.inner.output_delay();
        self.consumed = 0;
        self.produced = 0;
    }

    fn collect(&mut self, converted: Vec<Vec<f32>>, out: &mut AudioBuffers) {
        let mut block = AudioBuffers::from_planar(converted);
        let skip = self.skip.min(block.frames());
        block.trim_start(skip);
        self.skip -= skip;
        self.produced += block.frames() as u64;
        out.append(&block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, channels: usize, rate: u32) -> AudioBuffers {
        let data = (0..channels)
            .map(|_| {
                (0..frames)
                    .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin() * 0.5)
                    .collect()
            })
            .collect();
        AudioBuffers::from_planar(data)
    }

    #[test]
    fn test_rejects_zero_channels() {
        assert!(Resampler::new(44100, 48000, 0, false).is_err());
    }

    #[test]
    fn test_small_block_is_queued() {
        let mut resampler = Resampler::new(44100, 48000, 2, false).unwrap();
        let out = resampler.run(&tone(100, 2, 44100)).unwrap();
        assert_eq!(out.frames(), 0);
        assert_eq!(resampler.buffered_frames(), 100);
    }

    #[test]
    fn test_total_output_matches_ratio_after_flush() {
        let mut resampler = Resampler::new(44100, 48000, 2, false).unwrap();
        let mut total = 0;
        for _ in 0..10 {
            total += resampler.run(&tone(1000, 2, 44100)).unwrap().frames();
        }
        total += resampler.flush().unwrap().frames();
        // round(10000 * 48000 / 44100)
        assert_eq!(total, 10884);
    }

    #[test]
    fn test_downsample_total() {
        let mut resampler = Resampler::new(96000, 48000, 1, true).unwrap();
        let mut total = resampler.run(&tone(4801, 1, 96000)).unwrap().frames();
        total += resampler.flush().unwrap().frames();
        assert_eq!(total, 2401);
    }

    #[test]
    fn test_second_flush_is_empty() {
        let mut resampler = Resampler::new(44100, 48000, 2, false).unwrap();
        resampler.run(&tone(3000, 2, 44100)).unwrap();
        assert!(resampler.flush().unwrap().frames() > 0);
        assert_eq!(resampler.flush().unwrap().frames(), 0);
    }

    #[test]
    fn test_channel_mismatch_is_an_error() {
        let mut resampler = Resampler::new(44100, 48000, 2, false).unwrap();
        assert!(resampler.run(&tone(10, 1, 44100)).is_err());
    }

    #[test]
    fn test_reset_discards_queued_input() {
        let mut resampler = Resampler::new(44100, 48000, 1, false).unwrap();
        resampler.run(&tone(500, 1, 44100)).unwrap();
        resampler.reset();
        assert_eq!(resampler.buffered_frames(), 0);
        assert_eq!(resampler.flush().unwrap().frames(), 0);
    }
}
