//! ReelSync Media - Decoder interface and decode adapters
//!
//! This crate handles:
//! - The `Source`/`Emitter` interface implemented by decoders
//! - Video frame retrieval with gap-fill and stereoscopic handling
//! - Text forwarding
//! - A synthetic test-pattern source

pub mod source;
pub mod synthetic;
pub mod text_decoder;
pub mod video_decoder;

pub use source::{CollectingEmitter, Emitter, Source};
pub use synthetic::{SyntheticAudio, SyntheticConfig, SyntheticSource, SyntheticVideo};
pub use text_decoder::TextDecoder;
pub use video_decoder::{EyeImage, VideoDecoder, VideoLookup, VideoSettings};
