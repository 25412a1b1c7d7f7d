//! Integration tests for the player.
//!
//! Drives whole projects through reelsync-player with synthetic sources and
//! checks the ordering and continuity of what comes out.

use crossbeam_channel::unbounded;
use proptest::prelude::*;
use reelsync_core::{
    AudioStream, ContentTime, DCPTime, DCPTimePeriod, Decoded, Eyes, Frame, FrameRate,
    FrameRateChange, Image, PieceId, Size, TextPayload, VideoFrameType,
};
use reelsync_media::{SyntheticConfig, SyntheticVideo, VideoDecoder, VideoLookup, VideoSettings};
use reelsync_player::{Player, PlayerEvent, PlayerOptions, PlayerVideo, SyntheticFactory};
use reelsync_timeline::{AudioContent, Content, Project, TextContent, VideoContent};
use std::sync::Arc;
use uuid::Uuid;

// ── Helpers ────────────────────────────────────────────────────

fn frames(n: Frame) -> DCPTime {
    DCPTime::from_frames(n, FrameRate::FPS_24)
}

fn clip(name: &str, length: Frame) -> Content {
    let mut video = VideoContent::new(FrameRate::FPS_24, length);
    video.size = Size::new(16, 9);
    Content::new(name).with_video(video)
}

/// 48 kHz stereo tone of `samples` frames.
fn with_tone(content: Content, samples: i64) -> Content {
    content.with_audio(AudioContent::new(vec![AudioStream::new(0, 48000, 2, samples)]))
}

fn player(project: Project, factory: SyntheticFactory) -> Player {
    let options = PlayerOptions {
        video_container_size: Size::new(16, 9),
        ..Default::default()
    };
    Player::with_options(project, Arc::new(factory), options)
}

fn run(player: &mut Player) -> Vec<PlayerEvent> {
    let events = player.events();
    let mut out = Vec::new();
    for _ in 0..100_000 {
        let done = player.pass().unwrap();
        out.extend(events.try_iter());
        if done {
            return out;
        }
    }
    panic!("player did not finish");
}

fn video(events: &[PlayerEvent]) -> Vec<(DCPTime, PlayerVideo)> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::Video(v, t) => Some((*t, v.clone())),
            _ => None,
        })
        .collect()
}

/// Channel 0 of every audio block, checking they join up.
fn audio_channel_0(events: &[PlayerEvent]) -> Vec<f32> {
    let mut out = Vec::new();
    for event in events {
        if let PlayerEvent::Audio(audio, time) = event {
            assert_eq!(time.samples_round(48000), out.len() as i64, "audio gap or overlap");
            out.extend_from_slice(audio.channel(0));
        }
    }
    out
}

fn sources(out: &[(DCPTime, PlayerVideo)]) -> Vec<Option<Uuid>> {
    out.iter().map(|(_, v)| v.content).collect()
}

// ── Stereoscopic content ───────────────────────────────────────

fn alternate(length: Frame) -> Content {
    let mut content = clip("alt", length);
    if let Some(video) = content.video.as_mut() {
        video.frame_type = VideoFrameType::ThreeDAlternate;
    }
    content
}

#[test]
fn alternate_eyes_in_3d_project() {
    let mut project = Project::new("3d");
    project.three_d = true;
    project.add_content(alternate(4));

    let out = video(&run(&mut player(project, SyntheticFactory::new())));
    let slots: Vec<(DCPTime, Eyes)> = out.iter().map(|(t, v)| (*t, v.eyes)).collect();
    let expected: Vec<(DCPTime, Eyes)> = (0..4)
        .flat_map(|f| [(frames(f), Eyes::Left), (frames(f), Eyes::Right)])
        .collect();
    assert_eq!(slots, expected);
    assert!(out.iter().all(|(_, v)| !v.is_black()));
}

#[test]
fn alternate_content_in_2d_project_uses_left_eye() {
    let mut project = Project::new("2d");
    project.add_content(alternate(4));

    let out = video(&run(&mut player(project, SyntheticFactory::new())));
    assert_eq!(out.len(), 4);
    for (i, (time, v)) in out.iter().enumerate() {
        assert_eq!(*time, frames(i as Frame));
        assert_eq!(v.eyes, Eyes::Both);
    }
}

#[test]
fn alternate_source_repeats_both_eyes_after_running_dry() {
    let (tx, rx) = unbounded();
    let settings = VideoSettings {
        frame_type: VideoFrameType::ThreeDAlternate,
        length: 11,
        frc: FrameRateChange::new(FrameRate::FPS_24, FrameRate::FPS_24),
    };
    let mut decoder = VideoDecoder::new(PieceId(0), settings, tx);
    let image = Arc::new(Image::test_pattern(Size::new(8, 8)));
    for native in 0..18 {
        decoder.receive(native, image.clone()).unwrap();
    }
    decoder.finish().unwrap();

    let emitted: Vec<(Frame, Eyes)> = rx
        .try_iter()
        .filter_map(|e| match e.decoded {
            Decoded::Video(v) => Some((v.frame, v.eyes)),
            _ => None,
        })
        .collect();
    assert_eq!(emitted.len(), 22);
    assert_eq!(&emitted[18..], &[(9, Eyes::Left), (9, Eyes::Right), (10, Eyes::Left), (10, Eyes::Right)]);

    let lookup = |decoder: &mut VideoDecoder| match decoder.get(10, true) {
        VideoLookup::Ready(images) => images,
        other => panic!("expected images, got {:?}", other),
    };
    let first = lookup(&mut decoder);
    let again = lookup(&mut decoder);
    let eyes: Vec<Eyes> = first.iter().map(|i| i.eyes).collect();
    assert_eq!(eyes, vec![Eyes::Left, Eyes::Right]);
    for (a, b) in first.iter().zip(&again) {
        assert!(Arc::ptr_eq(&a.image, &b.image));
    }
}

// ── Layout ─────────────────────────────────────────────────────

#[test]
fn later_content_wins_overlap() {
    let mut project = Project::new("overlap");
    let under = clip("under", 36);
    let over = clip("over", 12).with_position(frames(12));
    let (under_id, over_id) = (under.id, over.id);
    project.add_content(under);
    project.add_content(over);

    let out = video(&run(&mut player(project, SyntheticFactory::new())));
    assert_eq!(out.len(), 36);
    for (i, (time, v)) in out.iter().enumerate() {
        assert_eq!(*time, frames(i as Frame));
        let expected = if (12..24).contains(&i) { over_id } else { under_id };
        assert_eq!(v.content, Some(expected), "frame {}", i);
    }
}

#[test]
fn text_is_placed_on_the_output_timeline() {
    let text = TextContent {
        tracks: vec!["en".into()],
        length: ContentTime::from_seconds(2.0),
        use_text: true,
    };
    let subtitled = clip("sub", 48).with_text(text).with_position(frames(24));

    let cases = [
        (subtitled.clone(), DCPTimePeriod::new(frames(24), frames(72))),
        (
            subtitled.with_trim(ContentTime::from_frames(12, FrameRate::FPS_24), ContentTime::ZERO),
            DCPTimePeriod::new(frames(24), frames(60)),
        ),
    ];
    for (content, expected) in cases {
        let mut project = Project::new("text");
        project.add_content(content);
        let texts: Vec<(String, String, DCPTimePeriod)> = run(&mut player(project, SyntheticFactory::new()))
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::Text {
                    payload: TextPayload::Plain(body),
                    track,
                    period,
                } => Some((body, track, period)),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec![("sub (en)".to_string(), "en".to_string(), expected)]);
    }
}

#[test]
fn ignored_text_is_not_emitted() {
    let text = TextContent {
        tracks: vec!["en".into(), "fr".into()],
        length: ContentTime::from_seconds(1.0),
        use_text: true,
    };
    let mut project = Project::new("quiet");
    project.add_content(clip("sub", 24).with_text(text));
    let mut player = player(project, SyntheticFactory::new());
    player.set_ignore_text(true);
    let out = run(&mut player);
    assert!(!out.iter().any(|e| matches!(e, PlayerEvent::Text { .. })));
    assert_eq!(video(&out).len(), 24);
}

// ── Seeking ────────────────────────────────────────────────────

#[test]
fn inaccurate_seek_starts_at_keyframe() {
    let mut project = Project::new("keyframes");
    let content = clip("a", 48);
    let mut config = SyntheticConfig::video(SyntheticVideo::new(FrameRate::FPS_24, 48));
    config.keyframe_interval = 12;
    let factory = SyntheticFactory::new().with_config(content.id, config);
    project.add_content(content);

    let mut player = player(project, factory);
    player.seek(frames(30), false).unwrap();
    let out = video(&run(&mut player));
    assert_eq!(out.first().map(|(t, _)| *t), Some(frames(24)));
    assert_eq!(out.len(), 24);
    assert!(out.windows(2).all(|w| w[1].0 == w[0].0 + frames(1)));
}

#[test]
fn accurate_seek_after_playing_restarts_output() {
    let mut project = Project::new("again");
    project.add_content(with_tone(clip("a", 24), 48000));
    let mut player = player(project, SyntheticFactory::new());
    let first = run(&mut player);
    assert_eq!(video(&first).len(), 24);

    player.seek(frames(12), true).unwrap();
    let second = run(&mut player);
    let out = video(&second);
    assert_eq!(out.len(), 12);
    assert_eq!(out[0].0, frames(12));
    let audio_start = second.iter().find_map(|e| match e {
        PlayerEvent::Audio(_, t) => Some(*t),
        _ => None,
    });
    assert_eq!(audio_start, Some(frames(12)));
}

// ── Audio ──────────────────────────────────────────────────────

#[test]
fn audio_delay_leads_with_silence() {
    let mut project = Project::new("delay");
    let mut content = with_tone(clip("a", 24), 24000);
    if let Some(audio) = content.audio.as_mut() {
        audio.delay_ms = 500;
    }
    project.add_content(content);

    let samples = audio_channel_0(&run(&mut player(project, SyntheticFactory::new())));
    assert_eq!(samples.len(), 48000);
    assert!(samples[..24000].iter().all(|&s| s == 0.0));
    assert!(samples[24000..24100].iter().any(|&s| s != 0.0));
}

#[test]
fn decoder_failure_keeps_output_continuous() {
    let mut project = Project::new("failing");
    let failing = with_tone(clip("failing", 48), 96000);
    let after = clip("after", 24).with_position(frames(48));
    let (failing_id, after_id) = (failing.id, after.id);

    let factory = SyntheticFactory::new();
    let mut config = factory.config_for(&failing);
    config.fail_at = Some(ContentTime::from_seconds(1.0));
    let factory = factory.with_config(failing_id, config);
    project.add_content(failing);
    project.add_content(after);

    let events = run(&mut player(project, factory));
    let out = video(&events);
    assert_eq!(out.len(), 72);
    assert!(out.iter().enumerate().all(|(i, (t, _))| *t == frames(i as Frame)));

    let from = sources(&out);
    // The last good frame is repeated as far as gap-fill reaches.
    assert!(from[..40].iter().all(|&c| c == Some(failing_id)));
    assert!(from[40..48].iter().all(Option::is_none));
    assert!(from[48..].iter().all(|&c| c == Some(after_id)));

    assert_eq!(audio_channel_0(&events).len(), 3 * 48000);
}

#[test]
fn audio_shorter_than_video() {
    let mut project = Project::new("short audio");
    let content = with_tone(clip("a", 96), 12000);
    let id = content.id;
    project.add_content(content);

    let events = run(&mut player(project, SyntheticFactory::new()));
    let out = video(&events);
    assert_eq!(out.len(), 96);
    for (i, (time, v)) in out.iter().enumerate() {
        assert_eq!(*time, frames(i as Frame));
        assert_eq!(v.content, Some(id), "frame {}", i);
    }
    let samples = audio_channel_0(&events);
    assert_eq!(samples.len(), 4 * 48000);
    assert!(samples[12000..].iter().all(|&s| s == 0.0));
}

#[test]
fn negative_audio_delay_does_not_hold_back_video() {
    let mut project = Project::new("early audio");
    let mut content = with_tone(clip("a", 120), 240000);
    if let Some(audio) = content.audio.as_mut() {
        audio.delay_ms = -3000;
    }
    project.add_content(content);

    let events = run(&mut player(project, SyntheticFactory::new()));
    let out = video(&events);
    assert_eq!(out.len(), 120);
    assert!(out.iter().enumerate().all(|(i, (t, v))| *t == frames(i as Frame) && !v.is_black()));

    let samples = audio_channel_0(&events);
    assert_eq!(samples.len(), 240000);
    // The last three seconds were moved earlier and leave silence behind.
    assert!(samples[96000..].iter().all(|&s| s == 0.0));
}

#[test]
fn mixed_audio_rates_are_contiguous() {
    let mut project = Project::new("rates");
    project.add_content(clip("a", 24).with_audio(AudioContent::new(vec![AudioStream::new(0, 44100, 2, 44100)])));
    project.add_content(
        clip("b", 24)
            .with_position(frames(24))
            .with_audio(AudioContent::new(vec![AudioStream::new(0, 96000, 1, 96000)])),
    );
    let samples = audio_channel_0(&run(&mut player(project, SyntheticFactory::new())));
    assert_eq!(samples.len(), 96000);
}

// ── Continuity ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_slot_filled_once(
        layout in prop::collection::vec(
            (0i64..6, 1i64..20, prop::option::of((1i64..30, -1500i64..1500))),
            1..4,
        )
    ) {
        let mut project = Project::new("layout");
        let mut cursor = 0;
        for (i, (gap, length, audio)) in layout.iter().enumerate() {
            cursor += gap;
            let mut content = clip(&format!("c{}", i), *length).with_position(frames(cursor));
            let mut span = *length;
            if let Some((audio_frames, delay_ms)) = audio {
                content = with_tone(content, audio_frames * 2000);
                if let Some(audio) = content.audio.as_mut() {
                    audio.delay_ms = *delay_ms;
                }
                span = span.max(*audio_frames);
            }
            project.add_content(content);
            cursor += span;
        }

        let events = run(&mut player(project, SyntheticFactory::new()));
        let times: Vec<DCPTime> = video(&events).into_iter().map(|(t, _)| t).collect();
        let expected: Vec<DCPTime> = (0..cursor).map(frames).collect();
        prop_assert_eq!(times, expected);
        prop_assert_eq!(audio_channel_0(&events).len() as i64, cursor * 2000);
    }
}
