//! Integration tests for the audio path: source, decode adapter and merger.

use crossbeam_channel::{unbounded, Receiver};
use reelsync_audio::{AudioDecoder, AudioMerger, AudioSettings};
use reelsync_core::{
    AudioBuffers, AudioStream, ContentText, ContentTime, DCPTime, Decoded, DecodedEvent, Frame,
    PieceId, Result, SharedImage, StreamId,
};
use reelsync_media::{Emitter, Source, SyntheticConfig, SyntheticSource};

// ── Helpers ────────────────────────────────────────────────────

/// Forwards a source's audio into one decoder.
struct AudioOnly<'a>(&'a mut AudioDecoder);

impl Emitter for AudioOnly<'_> {
    fn video(&mut self, _frame: Frame, _image: SharedImage) -> Result<()> {
        Ok(())
    }

    fn audio(&mut self, stream: StreamId, data: AudioBuffers, time: ContentTime) -> Result<()> {
        self.0.give(stream, data, time)
    }

    fn text(&mut self, _text: ContentText) -> Result<()> {
        Ok(())
    }
}

fn decoder(piece: usize, stream: AudioStream, delay_ms: i64) -> (AudioDecoder, Receiver<DecodedEvent>) {
    let (tx, rx) = unbounded();
    let settings = AudioSettings {
        streams: vec![stream],
        delay_ms,
        resampled_rate: 48000,
    };
    (AudioDecoder::new(PieceId(piece), settings, false, tx), rx)
}

/// Run a tone source for `stream` to exhaustion through `dec`.
fn drain(stream: AudioStream, dec: &mut AudioDecoder) {
    let mut source = SyntheticSource::new(SyntheticConfig::default().with_audio(stream, 440.0));
    let mut emitter = AudioOnly(dec);
    for _ in 0..10_000 {
        if source.pass(&mut emitter).unwrap() {
            emitter.0.flush().unwrap();
            return;
        }
    }
    panic!("source did not finish");
}

fn blocks(rx: &Receiver<DecodedEvent>) -> Vec<(Frame, AudioBuffers)> {
    rx.try_iter()
        .filter_map(|event| match event.decoded {
            Decoded::Audio { audio, .. } => Some((audio.frame, audio.audio)),
            _ => None,
        })
        .collect()
}

fn is_silent(audio: &AudioBuffers) -> bool {
    audio.planar().iter().all(|channel| channel.iter().all(|&s| s == 0.0))
}

// ── Decode adapter ─────────────────────────────────────────────

#[test]
fn resampled_source_is_contiguous_and_exact() {
    let stream = AudioStream::new(0, 44100, 2, 44100);
    let (mut dec, rx) = decoder(0, stream.clone(), 0);
    drain(stream, &mut dec);

    let mut next = 0;
    for (frame, audio) in blocks(&rx) {
        assert_eq!(frame, next);
        next += audio.frame_count();
    }
    assert_eq!(next, 48000);
    assert_eq!(dec.stream_position(StreamId(0)), Some(48000));
}

#[test]
fn delay_leads_with_silence() {
    let stream = AudioStream::new(0, 48000, 2, 4000);
    let (mut dec, rx) = decoder(0, stream.clone(), 1000);
    drain(stream, &mut dec);

    let out = blocks(&rx);
    assert_eq!(out[0].0, 0);
    assert_eq!(out[0].1.frames(), 48000);
    assert!(is_silent(&out[0].1));
    assert_eq!(out[1].0, 48000);
    let total: usize = out.iter().map(|(_, audio)| audio.frames()).sum();
    assert_eq!(total, 48000 + 4000);
}

#[test]
fn second_flush_adds_nothing() {
    let stream = AudioStream::new(0, 44100, 1, 10_000);
    let (mut dec, rx) = decoder(0, stream.clone(), -100);
    drain(stream, &mut dec);
    let before = dec.stream_position(StreamId(0));
    let _ = blocks(&rx);

    dec.flush().unwrap();
    assert!(blocks(&rx).is_empty());
    assert_eq!(dec.stream_position(StreamId(0)), before);
}

#[test]
fn seek_restarts_positions() {
    let stream = AudioStream::new(0, 48000, 2, 96000);
    let (mut dec, rx) = decoder(0, stream, 0);
    dec.give(StreamId(0), AudioBuffers::silent(2, 1000), ContentTime::ZERO).unwrap();
    dec.seek().unwrap();
    assert_eq!(dec.stream_position(StreamId(0)), None);

    let _ = blocks(&rx);
    dec.give(StreamId(0), AudioBuffers::silent(2, 500), ContentTime::from_seconds(1.0))
        .unwrap();
    let out = blocks(&rx);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, 48000);
}

// ── Merging pieces ─────────────────────────────────────────────

#[test]
fn two_decoders_merge_into_one_stream() {
    let a = AudioStream::new(0, 48000, 2, 4800);
    let b = AudioStream::new(0, 44100, 2, 4410);
    let (mut dec_a, rx_a) = decoder(0, a.clone(), 0);
    let (mut dec_b, rx_b) = decoder(1, b.clone(), 0);
    drain(a, &mut dec_a);
    drain(b, &mut dec_b);

    let mut merger = AudioMerger::new(6, 48000);
    // Second piece starts 50 ms into the first
    let offset = DCPTime::from_samples(2400, 48000);
    for (frame, audio) in blocks(&rx_a) {
        merger.push(PieceId(0), audio, DCPTime::from_samples(frame, 48000));
    }
    for (frame, audio) in blocks(&rx_b) {
        merger.push(PieceId(1), audio, offset + DCPTime::from_samples(frame, 48000));
    }
    assert_eq!(merger.pending_pieces(), vec![PieceId(0), PieceId(1)]);
    assert_eq!(merger.end(), Some(DCPTime::from_samples(7200, 48000)));

    let (out, time) = merger.pull(DCPTime::from_samples(7200, 48000)).unwrap();
    assert_eq!(time, DCPTime::ZERO);
    assert_eq!(out.frames(), 7200);
    assert_eq!(out.channels(), 6);
    assert!(out.channel(5).iter().all(|&s| s == 0.0));
    assert!(merger.is_empty());
}

#[test]
fn merged_overlap_is_the_sum() {
    let stream = AudioStream::new(0, 48000, 1, 480);
    let (mut first, rx_first) = decoder(0, stream.clone(), 0);
    let (mut second, rx_second) = decoder(1, stream.clone(), 0);
    drain(stream.clone(), &mut first);
    drain(stream, &mut second);

    let single: Vec<f32> = blocks(&rx_first)
        .into_iter()
        .flat_map(|(_, audio)| audio.channel(0).to_vec())
        .collect();

    let mut merger = AudioMerger::new(1, 48000);
    let mut offset = 0;
    for (frame, audio) in blocks(&rx_second) {
        offset = offset.max(frame + audio.frame_count());
        merger.push(PieceId(1), audio, DCPTime::from_samples(frame, 48000));
    }
    merger.push(
        PieceId(0),
        AudioBuffers::from_planar(vec![single.clone()]),
        DCPTime::ZERO,
    );
    let (out, _) = merger.pull(DCPTime::from_samples(offset, 48000)).unwrap();
    for (i, &sample) in out.channel(0).iter().enumerate() {
        assert!((sample - 2.0 * single[i]).abs() < 1e-6, "sample {}", i);
    }
}
