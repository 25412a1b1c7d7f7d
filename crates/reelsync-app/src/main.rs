//! ReelSync - Timeline player demo
//!
//! Builds a small project from synthetic content, plays it through to the
//! end and logs what came out.

use anyhow::Result;
use clap::Parser;
use reelsync_core::{AudioStream, ContentTime, DCPTime, FrameRate, Size, VideoFrameType};
use reelsync_player::{Player, PlayerEvent, PlayerOptions, SyntheticFactory};
use reelsync_timeline::{AudioContent, Content, Project, ReelMode, TextContent, VideoContent};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "reelsync")]
#[command(version, about = "Play a synthetic ReelSync project and summarize the output", long_about = None)]
struct Args {
    /// Build a stereoscopic project
    #[arg(long = "3d")]
    three_d: bool,

    /// Use the faster, lower quality resampler
    #[arg(long)]
    fast: bool,

    /// Accurately seek here before playing
    #[arg(long, value_name = "SECONDS")]
    seek: Option<f64>,
}

fn demo_project(three_d: bool) -> Project {
    let rate = FrameRate::FPS_24;
    let mut project = Project::new("demo");
    project.three_d = three_d;
    project.audio_channels = 2;
    project.reel_mode = ReelMode::ByVideoContent;
    project.container = Size::new(256, 144);

    let mut opening = VideoContent::new(rate, 48);
    opening.size = Size::new(256, 144);
    if three_d {
        opening.frame_type = VideoFrameType::ThreeDLeftRight;
    }
    let mut opening_audio = AudioContent::new(vec![AudioStream::new(0, 44100, 2, 88200)]);
    opening_audio.delay_ms = 100;
    project.add_content(
        Content::new("opening")
            .with_video(opening)
            .with_audio(opening_audio)
            .with_text(TextContent {
                tracks: vec!["en".into()],
                length: ContentTime::from_seconds(2.0),
                use_text: true,
            }),
    );

    // 25fps material after a one second gap, played slightly slow
    let mut main = VideoContent::new(FrameRate::FPS_25, 50);
    main.size = Size::new(256, 144);
    let mut main_audio = AudioContent::new(vec![AudioStream::new(0, 48000, 6, 96000)]);
    main_audio.gain_db = -6.0;
    project.add_content(
        Content::new("main")
            .with_position(DCPTime::from_frames(72, rate))
            .with_video(main)
            .with_audio(main_audio),
    );
    project
}

#[derive(Debug, Default)]
struct Summary {
    video: usize,
    black: usize,
    audio_frames: i64,
    audio_blocks: usize,
    texts: usize,
    first: Option<DCPTime>,
    last: Option<DCPTime>,
}

impl Summary {
    fn add(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Video(video, time) => {
                self.video += 1;
                if video.is_black() {
                    self.black += 1;
                }
                self.first.get_or_insert(time);
                self.last = Some(time);
            }
            PlayerEvent::Audio(audio, _) => {
                self.audio_blocks += 1;
                self.audio_frames += audio.frame_count();
            }
            PlayerEvent::Text { track, period, .. } => {
                info!(%track, %period, "Text");
                self.texts += 1;
            }
        }
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    info!(?args, "ReelSync starting...");

    let project = demo_project(args.three_d);
    for reel in project.reels() {
        info!(%reel, "Reel");
    }

    let options = PlayerOptions {
        fast: args.fast,
        video_container_size: project.container,
        ..Default::default()
    };
    let mut player = Player::with_options(project, Arc::new(SyntheticFactory::new()), options);
    let events = player.events();

    if let Some(seconds) = args.seek {
        player.seek(DCPTime::from_seconds(seconds), true)?;
    }

    let mut summary = Summary::default();
    let mut passes = 0usize;
    loop {
        let done = player.pass()?;
        passes += 1;
        for event in events.try_iter() {
            summary.add(event);
        }
        if done {
            break;
        }
        if passes > 1_000_000 {
            warn!(passes, "Giving up; the player is not making progress");
            break;
        }
    }

    info!(
        passes,
        video = summary.video,
        black = summary.black,
        audio_blocks = summary.audio_blocks,
        audio_seconds = summary.audio_frames as f64 / player.project().audio_frame_rate as f64,
        texts = summary.texts,
        first = ?summary.first,
        last = ?summary.last,
        "Playback complete"
    );
    Ok(())
}
