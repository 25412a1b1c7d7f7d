//! ReelSync Audio - Audio side of the decode pipeline
//!
//! Architecture:
//! - `Resampler`: Stateful sample-rate conversion with exact flush
//! - `AudioDecoder`: Per-piece stream positions, delay and resampling
//! - `AudioMerger`: Sums audio from overlapping pieces into one stream

pub mod decoder;
pub mod merger;
pub mod resampler;

pub use decoder::{AudioDecoder, AudioSettings};
pub use merger::AudioMerger;
pub use resampler::Resampler;

/// Linear gain for a level in decibels.
pub fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_linear() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 0.001);
    }
}
