//! Planar floating-point audio buffers.

use crate::time::Frame;

/// Audio as one `Vec<f32>` per channel, all of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffers {
    data: Vec<Vec<f32>>,
}

impl AudioBuffers {
    /// Silent buffers of the given shape.
    pub fn silent(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![vec![0.0; frames]; channels],
        }
    }

    /// Wrap planar channel data. Channels are truncated to the shortest.
    pub fn from_planar(mut data: Vec<Vec<f32>>) -> Self {
        let frames = data.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut data {
            channel.truncate(frames);
        }
        Self { data }
    }

    pub fn channels(&self) -> usize {
        self.data.len()
    }

    pub fn frames(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.data[index]
    }

    /// All channels, for handing to planar processors.
    pub fn planar(&self) -> &[Vec<f32>] {
        &self.data
    }

    /// Scale every sample.
    pub fn apply_gain(&mut self, linear: f32) {
        for channel in &mut self.data {
            for sample in channel.iter_mut() {
                *sample *= linear;
            }
        }
    }

    /// A copy of `frames` frames starting at `from`, clamped to what exists.
    pub fn slice(&self, from: usize, frames: usize) -> Self {
        let from = from.min(self.frames());
        let to = (from + frames).min(self.frames());
        Self {
            data: self.data.iter().map(|c| c[from..to].to_vec()).collect(),
        }
    }

    /// Drop the first `frames` frames.
    pub fn trim_start(&mut self, frames: usize) {
        let frames = frames.min(self.frames());
        for channel in &mut self.data {
            channel.drain(..frames);
        }
    }

    /// Keep only the first `frames` frames.
    pub fn truncate(&mut self, frames: usize) {
        for channel in &mut self.data {
            channel.truncate(frames);
        }
    }

    /// Append another buffer with the same channel count.
    pub fn append(&mut self, other: &AudioBuffers) {
        if self.data.is_empty() {
            self.data = other.data.clone();
            return;
        }
        for (channel, extra) in self.data.iter_mut().zip(&other.data) {
            channel.extend_from_slice(extra);
        }
    }

    /// Add `frames` frames of `source` (from `read_offset`) into this buffer
    /// at `write_offset`, channel for channel. Channels missing on either
    /// side are left alone.
    pub fn accumulate_frames(
        &mut self,
        source: &AudioBuffers,
        frames: usize,
        read_offset: usize,
        write_offset: usize,
    ) {
        for (dst, src) in self.data.iter_mut().zip(&source.data) {
            let dst = &mut dst[write_offset..write_offset + frames];
            let src = &src[read_offset..read_offset + frames];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s;
            }
        }
    }

    /// Rebuild with `channels` channels, routing channel `i` to channel `i`
    /// and leaving the rest silent.
    pub fn remap(&self, channels: usize) -> Self {
        let frames = self.frames();
        let data = (0..channels)
            .map(|i| self.data.get(i).cloned().unwrap_or_else(|| vec![0.0; frames]))
            .collect();
        Self { data }
    }

    /// Frame count as a signed frame index delta.
    pub fn frame_count(&self) -> Frame {
        self.frames() as Frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_sums() {
        let mut a = AudioBuffers::from_planar(vec![vec![1.0; 4]]);
        let b = AudioBuffers::from_planar(vec![vec![0.5; 2]]);
        a.accumulate_frames(&b, 2, 0, 1);
        assert_eq!(a.channel(0), &[1.0, 1.5, 1.5, 1.0]);
    }

    #[test]
    fn test_slice_and_trim() {
        let mut a = AudioBuffers::from_planar(vec![vec![0.0, 1.0, 2.0, 3.0]]);
        assert_eq!(a.slice(1, 10).channel(0), &[1.0, 2.0, 3.0]);
        a.trim_start(3);
        assert_eq!(a.channel(0), &[3.0]);
    }

    #[test]
    fn test_remap_pads_with_silence() {
        let a = AudioBuffers::from_planar(vec![vec![1.0, 1.0]]);
        let b = a.remap(3);
        assert_eq!(b.channels(), 3);
        assert_eq!(b.channel(2), &[0.0, 0.0]);
    }
}
