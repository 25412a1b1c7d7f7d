//! Integration tests for reels and pass-through of packaged content.
//!
//! Exercises reelsync-timeline with package readers and the player's
//! handling of referenced essence.

use reelsync_core::{DCPTime, DCPTimePeriod, Frame, FrameRate, MediaKind, Size};
use reelsync_player::{Player, PlayerEvent, PlayerOptions, SyntheticFactory};
use reelsync_timeline::{
    reel_periods, CannotReference, Content, Project, ReelAssets, ReelMode, ReelPackage,
    StaticPackageReader, VideoContent,
};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn frames(n: Frame) -> DCPTime {
    DCPTime::from_frames(n, FrameRate::FPS_24)
}

fn picture_reels(lengths: &[Frame]) -> Vec<ReelAssets> {
    lengths
        .iter()
        .map(|&duration| ReelAssets {
            duration,
            has_picture: true,
            has_sound: false,
            has_text: false,
        })
        .collect()
}

fn package(name: &str, lengths: &[Frame]) -> Content {
    let total: Frame = lengths.iter().sum();
    let mut video = VideoContent::new(FrameRate::FPS_24, total);
    video.size = Size::new(16, 9);
    Content::new(name).with_video(video).with_package(ReelPackage {
        reader: Some(Arc::new(StaticPackageReader {
            reels: picture_reels(lengths),
        })),
        ..Default::default()
    })
}

fn video_events(player: &mut Player) -> Vec<(DCPTime, bool)> {
    let events = player.events();
    let mut out = Vec::new();
    for _ in 0..100_000 {
        let done = player.pass().unwrap();
        out.extend(events.try_iter().filter_map(|e| match e {
            PlayerEvent::Video(v, t) => Some((t, v.is_black())),
            _ => None,
        }));
        if done {
            return out;
        }
    }
    panic!("player did not finish");
}

// ── Reel validation ────────────────────────────────────────────

#[test]
fn single_package_reel_against_split_project_fails() {
    let mut project = Project::new("split");
    project.reel_mode = ReelMode::ByLength(frames(500));
    project.add_content(package("pkg", &[1000]));

    assert_eq!(
        project.reels(),
        vec![
            DCPTimePeriod::new(frames(0), frames(500)),
            DCPTimePeriod::new(frames(500), frames(1000)),
        ]
    );
    let content = &project.content[0];
    assert_eq!(
        project.can_reference(content, MediaKind::Video),
        Err(CannotReference::ReelMismatch)
    );
}

#[test]
fn matching_reels_can_be_referenced() {
    let mut project = Project::new("match");
    project.reel_mode = ReelMode::ByLength(frames(500));
    project.add_content(package("pkg", &[500, 500]));

    let content = &project.content[0];
    assert_eq!(project.can_reference(content, MediaKind::Video), Ok(()));
    // No sound in the package
    assert_eq!(
        project.can_reference(content, MediaKind::Audio),
        Err(CannotReference::MissingInReel(MediaKind::Audio))
    );
}

#[test]
fn reader_reels_tile_a_positioned_package() {
    let content = package("pkg", &[10, 20, 30]).with_position(frames(100));
    let periods = reel_periods(&content, FrameRate::FPS_24);
    assert_eq!(periods.len(), 3);
    assert_eq!(periods[0].from, frames(100));
    assert_eq!(periods[2].to, frames(160));
    assert!(periods.windows(2).all(|w| w[0].to == w[1].from));
}

// ── Referenced essence in the player ───────────────────────────

#[test]
fn referenced_video_is_neither_played_nor_blacked() {
    let mut project = Project::new("ref");
    let mut plain = VideoContent::new(FrameRate::FPS_24, 24);
    plain.size = Size::new(16, 9);
    project.add_content(Content::new("plain").with_video(plain));
    let mut referenced = package("pkg", &[24]).with_position(frames(24));
    if let Some(pkg) = referenced.package.as_mut() {
        pkg.set_reference(MediaKind::Video, true);
    }
    project.add_content(referenced);

    let options = PlayerOptions {
        video_container_size: Size::new(16, 9),
        ..Default::default()
    };
    let mut player = Player::with_options(project, Arc::new(SyntheticFactory::new()), options);
    let out = video_events(&mut player);
    assert_eq!(out.len(), 24);
    assert!(out.iter().all(|&(t, black)| t < frames(24) && !black));

    player.set_play_referenced(true);
    player.seek(DCPTime::ZERO, true).unwrap();
    let out = video_events(&mut player);
    assert_eq!(out.len(), 48);
    assert!(out.iter().all(|&(_, black)| !black));
}

#[test]
fn encrypted_content_without_key_is_black() {
    let mut project = Project::new("locked");
    let mut locked = package("locked", &[12]);
    if let Some(pkg) = locked.package.as_mut() {
        pkg.encrypted = true;
    }
    project.add_content(locked);

    let options = PlayerOptions {
        video_container_size: Size::new(16, 9),
        ..Default::default()
    };
    let mut player = Player::with_options(project, Arc::new(SyntheticFactory::new()), options);
    let out = video_events(&mut player);
    assert!(player.pieces().is_empty());
    assert_eq!(out.len(), 12);
    assert!(out.iter().all(|&(_, black)| black));
}
