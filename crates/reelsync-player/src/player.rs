//! The player: steps decoding across every piece and emits ordered output.
//!
//! Each [`Player::pass`] advances whichever of the pieces, the black filler
//! or the silence filler is furthest behind, by one step. Video goes through
//! the [`Shuffler`], audio through the [`AudioMerger`], text straight out.
//! Everything arrives on the channel returned by [`Player::events`]:
//! - video in time order with the left eye first, exactly one per slot
//! - audio as contiguous blocks with no gaps
//! - text with its period on the output timeline

use crate::empty::Empty;
use crate::factory::SourceFactory;
use crate::piece::Piece;
use crate::shuffler::Shuffler;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use reelsync_audio::{db_to_linear, AudioDecoder, AudioMerger, AudioSettings};
use reelsync_core::{
    AudioBuffers, ContentAudio, ContentText, ContentTime, ContentVideo, DCPTime, DCPTimePeriod,
    Decoded, DecodedEvent, Eyes, Frame, FrameRateChange, Image, MediaKind, Part, PieceId,
    PixelFormat, ReelError, Result, SharedImage, Size, StreamId, TextPayload,
};
use reelsync_media::{TextDecoder, VideoDecoder, VideoSettings};
use reelsync_timeline::Project;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Merger tag for synthesized silence.
const SILENCE: PieceId = PieceId(usize::MAX);

/// How the player decodes and what it leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Cheaper resampling
    pub fast: bool,
    /// Decode essence that would otherwise be passed through from its package
    pub play_referenced: bool,
    pub ignore_video: bool,
    pub ignore_audio: bool,
    pub ignore_text: bool,
    pub video_container_size: Size,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            fast: false,
            play_referenced: false,
            ignore_video: false,
            ignore_audio: false,
            ignore_text: false,
            video_container_size: Size::FLAT_2K,
        }
    }
}

/// One image on its way to the output.
#[derive(Debug, Clone)]
pub struct PlayerVideo {
    pub image: SharedImage,
    pub eyes: Eyes,
    /// Region of `image` holding this eye
    pub part: Part,
    pub container: Size,
    /// Content the image came from; `None` for black
    pub content: Option<Uuid>,
}

impl PlayerVideo {
    pub fn is_black(&self) -> bool {
        self.content.is_none()
    }
}

/// Output of the player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Video(PlayerVideo, DCPTime),
    /// Mixed audio in the project's channel layout, starting at the time given
    Audio(AudioBuffers, DCPTime),
    Text {
        payload: TextPayload,
        track: String,
        period: DCPTimePeriod,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Nothing set up yet
    #[default]
    Idle,
    Running,
}

#[derive(Debug)]
struct Published {
    container_size: Size,
    suspended: bool,
}

/// Player state that another thread may read or change while the driving
/// thread calls [`Player::pass`].
///
/// All access goes through one lock, held only for the field access.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    shared: Arc<Mutex<Published>>,
}

impl PlayerHandle {
    fn new(container_size: Size) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Published {
                container_size,
                suspended: false,
            })),
        }
    }

    pub fn video_container_size(&self) -> Size {
        self.shared.lock().container_size
    }

    fn set_video_container_size(&self, size: Size) {
        self.shared.lock().container_size = size;
    }

    pub fn suspended(&self) -> bool {
        self.shared.lock().suspended
    }

    /// While suspended, [`Player::pass`] and [`Player::seek`] do nothing and
    /// all decode state is kept.
    pub fn set_suspended(&self, suspended: bool) {
        self.shared.lock().suspended = suspended;
    }
}

/// Where a piece's output lands on the timeline.
#[derive(Debug, Clone, Copy)]
struct Placement {
    piece: PieceId,
    content: Uuid,
    period: DCPTimePeriod,
    /// Output time the untrimmed content would start at
    origin: DCPTime,
    frc: FrameRateChange,
    gain: f32,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Piece(usize),
    Black,
    Silence,
}

pub struct Player {
    project: Project,
    factory: Arc<dyn SourceFactory>,
    options: PlayerOptions,
    handle: PlayerHandle,
    state: PlayerState,
    pieces: Vec<Piece>,
    placements: Vec<Placement>,
    pieces_dirty: bool,
    decoded_tx: Sender<DecodedEvent>,
    decoded_rx: Receiver<DecodedEvent>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
    shuffler: Shuffler<PlayerVideo>,
    merger: AudioMerger,
    black: Empty,
    silence: Empty,
    /// Passed-through regions: nothing is synthesized there
    referenced_video: Vec<DCPTimePeriod>,
    referenced_audio: Vec<DCPTimePeriod>,
    /// Next video slot; `None` after an inaccurate seek until something is emitted
    next_video: Option<(DCPTime, Eyes)>,
    /// Next audio sample at the project rate
    next_audio: Option<Frame>,
    /// End of the last audio routed for each stream of each piece
    stream_states: HashMap<(PieceId, StreamId), DCPTime>,
    black_image: Option<SharedImage>,
    /// Time of the last seek
    base: DCPTime,
    finished: bool,
}

impl Player {
    pub fn new(project: Project, factory: Arc<dyn SourceFactory>) -> Self {
        Self::with_options(project, factory, PlayerOptions::default())
    }

    pub fn with_options(project: Project, factory: Arc<dyn SourceFactory>, options: PlayerOptions) -> Self {
        let (decoded_tx, decoded_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();
        let merger = AudioMerger::new(project.audio_channels, project.audio_frame_rate);
        let handle = PlayerHandle::new(options.video_container_size);
        Self {
            project,
            factory,
            options,
            handle,
            state: PlayerState::Idle,
            pieces: Vec::new(),
            placements: Vec::new(),
            pieces_dirty: true,
            decoded_tx,
            decoded_rx,
            events_tx,
            events_rx,
            shuffler: Shuffler::new(),
            merger,
            black: Empty::new(&[], DCPTime::ZERO),
            silence: Empty::new(&[], DCPTime::ZERO),
            referenced_video: Vec::new(),
            referenced_audio: Vec::new(),
            next_video: None,
            next_audio: None,
            stream_states: HashMap::new(),
            black_image: None,
            base: DCPTime::ZERO,
            finished: false,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Receiver for everything the player emits.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    /// Where output has got to.
    pub fn position(&self) -> DCPTime {
        let video = self
            .next_video
            .filter(|_| !self.options.ignore_video)
            .map(|(time, _)| time);
        let audio = self
            .next_audio
            .map(|sample| DCPTime::from_samples(sample, self.project.audio_frame_rate));
        video.or(audio).unwrap_or(self.base)
    }

    /// Output time of `time` inside content `content`.
    ///
    /// `None` when the content has no piece, which includes any call made
    /// before the first `pass` or `seek` has built the pieces.
    pub fn content_time_to_dcp(&self, content: Uuid, time: ContentTime) -> Option<DCPTime> {
        self.pieces
            .iter()
            .find(|p| p.content.id == content)
            .map(|p| p.content_to_dcp(time))
    }

    pub fn set_video_container_size(&mut self, size: Size) {
        if self.options.video_container_size == size {
            return;
        }
        self.options.video_container_size = size;
        self.handle.set_video_container_size(size);
        self.black_image = None;
    }

    pub fn set_fast(&mut self, fast: bool) {
        self.change("fast", |o| &mut o.fast, fast);
    }

    pub fn set_play_referenced(&mut self, play_referenced: bool) {
        self.change("play_referenced", |o| &mut o.play_referenced, play_referenced);
    }

    pub fn set_ignore_video(&mut self, ignore: bool) {
        self.change("ignore_video", |o| &mut o.ignore_video, ignore);
    }

    pub fn set_ignore_audio(&mut self, ignore: bool) {
        self.change("ignore_audio", |o| &mut o.ignore_audio, ignore);
    }

    pub fn set_ignore_text(&mut self, ignore: bool) {
        self.change("ignore_text", |o| &mut o.ignore_text, ignore);
    }

    /// Options take effect from the next [`pass`](Self::pass) or
    /// [`seek`](Self::seek), which rebuild the pieces.
    fn change<F>(&mut self, name: &str, field: F, value: bool)
    where
        F: FnOnce(&mut PlayerOptions) -> &mut bool,
    {
        let slot = field(&mut self.options);
        if *slot != value {
            *slot = value;
            self.pieces_dirty = true;
            debug!(option = name, value, "Player option changed");
        }
    }

    /// Run one decode step. Returns `true` once everything has been emitted.
    pub fn pass(&mut self) -> Result<bool> {
        if self.handle.suspended() {
            return Ok(false);
        }
        self.prepare()?;

        if self.project.content.is_empty() {
            if !self.finished {
                self.finished = true;
                if !self.options.ignore_video {
                    for &eyes in self.slot_eyes() {
                        let black = self.black_video(eyes);
                        self.emit_video(DCPTime::ZERO, black);
                    }
                }
                info!(project = %self.project.name, "Empty project");
            }
            return Ok(true);
        }

        let Some((time, step)) = self.earliest() else {
            self.finish()?;
            return Ok(true);
        };
        trace!(%time, ?step, "Pass");

        match step {
            Step::Piece(index) => self.step_piece(index)?,
            Step::Black => self.step_black(time)?,
            Step::Silence => self.step_silence(time),
        }
        self.route_decoded()?;
        self.release();

        if self.earliest().is_none() {
            self.finish()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Move to `time`. An accurate seek emits nothing before `time`; an
    /// inaccurate one starts wherever the sources land.
    pub fn seek(&mut self, time: DCPTime, accurate: bool) -> Result<()> {
        if self.handle.suspended() {
            return Ok(());
        }
        if self.pieces_dirty {
            self.setup_pieces();
        }
        self.mark_running();
        self.seek_pieces(time, accurate)
    }

    fn prepare(&mut self) -> Result<()> {
        if !self.pieces_dirty {
            return Ok(());
        }
        let resume = (self.state == PlayerState::Running).then(|| self.position());
        self.setup_pieces();
        self.mark_running();
        if let Some(time) = resume {
            self.seek_pieces(time, true)?;
        }
        Ok(())
    }

    fn mark_running(&mut self) {
        if self.state == PlayerState::Idle {
            self.state = PlayerState::Running;
            info!(project = %self.project.name, pieces = self.pieces.len(), "Player running");
        }
    }

    /// Build one piece per playable content item.
    fn setup_pieces(&mut self) {
        let rate = self.project.video_frame_rate;
        let audio_rate = self.project.audio_frame_rate;
        let contents = self.project.content.clone();

        self.pieces.clear();
        self.placements.clear();
        self.stream_states.clear();
        self.referenced_video.clear();
        self.referenced_audio.clear();
        self.shuffler.clear();
        self.merger.clear();
        while self.decoded_rx.try_recv().is_ok() {}

        let mut video_covered = Vec::new();
        let mut audio_covered = Vec::new();

        for content in contents {
            if !content.can_be_played() {
                warn!(content = %content.name, "Content cannot be played; skipping");
                continue;
            }
            let source = match self.factory.create(&content) {
                Ok(source) => source,
                Err(e) => {
                    warn!(content = %content.name, error = %e, "Could not open content; skipping");
                    continue;
                }
            };

            let id = PieceId(self.pieces.len());
            let frc = content.frc(rate);
            let period = content.period(rate);

            let video = match &content.video {
                Some(v) if content.has(MediaKind::Video) => {
                    let settings = VideoSettings {
                        frame_type: v.frame_type,
                        length: v.length,
                        frc,
                    };
                    let mut decoder = VideoDecoder::new(id, settings, self.decoded_tx.clone());
                    let referenced = content.references(MediaKind::Video) && !self.options.play_referenced;
                    if referenced {
                        self.referenced_video.push(period);
                    }
                    if referenced || self.options.ignore_video {
                        decoder.set_ignore();
                    }
                    video_covered.push(period);
                    Some(decoder)
                }
                _ => None,
            };

            let audio = match &content.audio {
                Some(a) if content.has(MediaKind::Audio) => {
                    let settings = AudioSettings {
                        streams: a.streams.clone(),
                        delay_ms: a.delay_ms,
                        resampled_rate: content.resampled_audio_rate(rate, audio_rate),
                    };
                    for stream in &a.streams {
                        self.stream_states.insert((id, stream.id), period.from);
                    }
                    let mut decoder =
                        AudioDecoder::new(id, settings, self.options.fast, self.decoded_tx.clone());
                    let referenced = content.references(MediaKind::Audio) && !self.options.play_referenced;
                    if referenced {
                        self.referenced_audio.push(period);
                    }
                    if referenced || self.options.ignore_audio {
                        decoder.set_ignore();
                    }
                    audio_covered.push(period);
                    Some(decoder)
                }
                _ => None,
            };

            let text = content.has(MediaKind::Text).then(|| {
                let mut decoder = TextDecoder::new(id, self.decoded_tx.clone());
                let referenced = content.references(MediaKind::Text) && !self.options.play_referenced;
                if referenced || self.options.ignore_text {
                    decoder.set_ignore();
                }
                decoder
            });

            let gain = content.audio.as_ref().map_or(1.0, |a| db_to_linear(a.gain_db));
            self.placements.push(Placement {
                piece: id,
                content: content.id,
                period,
                origin: content.position - DCPTime::from_content(content.trim_start, &frc),
                frc,
                gain,
            });
            debug!(piece = %id, content = %content.name, %period, %frc, "Created piece");
            self.pieces
                .push(Piece::new(id, Arc::new(content), frc, source, video, audio, text));
        }

        let length = self.project.length();
        self.black = Empty::new(&video_covered, length);
        self.silence = Empty::new(&audio_covered, length);
        self.referenced_video.sort();
        self.referenced_audio.sort();
        self.next_video = Some((DCPTime::ZERO, self.first_eye()));
        self.next_audio = Some(0);
        self.base = DCPTime::ZERO;
        self.finished = false;
        self.pieces_dirty = false;
        info!(pieces = self.pieces.len(), %length, "Pieces set up");
    }

    fn seek_pieces(&mut self, time: DCPTime, accurate: bool) -> Result<()> {
        debug!(%time, accurate, "Seek");
        let rate = self.project.video_frame_rate;
        self.shuffler.clear();
        self.merger.clear();
        while self.decoded_rx.try_recv().is_ok() {}

        for piece in &mut self.pieces {
            let period = piece.content.period(rate);
            if time < period.from {
                let start = piece.content.trim_start;
                piece.seek(start, true)?;
            } else if time < period.to {
                let target = piece.dcp_to_content(time);
                piece.seek(target, accurate)?;
            } else {
                piece.set_done();
            }
        }
        // Whatever the adapters flushed while seeking belongs to the old position.
        while self.decoded_rx.try_recv().is_ok() {}

        for ((piece, _), state) in self.stream_states.iter_mut() {
            let from = self.placements.get(piece.0).map_or(time, |p| p.period.from);
            *state = time.max(from);
        }
        self.black.set_position(time);
        self.silence.set_position(time);

        if accurate {
            self.next_video = Some((time.round_to_frame(rate), self.first_eye()));
            self.next_audio = Some(time.samples_round(self.project.audio_frame_rate));
        } else {
            self.next_video = None;
            self.next_audio = None;
        }
        self.base = time;
        self.finished = false;
        Ok(())
    }

    /// Whatever is furthest behind; pieces win ties.
    fn earliest(&self) -> Option<(DCPTime, Step)> {
        let mut best: Option<(DCPTime, Step)> = None;
        let mut offer = |time: DCPTime, step: Step| {
            if best.map_or(true, |(t, _)| time < t) {
                best = Some((time, step));
            }
        };
        for (index, piece) in self.pieces.iter().enumerate() {
            if !piece.done() {
                offer(piece.position(), Step::Piece(index));
            }
        }
        if !self.options.ignore_video && !self.black.done() {
            offer(self.black.position(), Step::Black);
        }
        if !self.options.ignore_audio && !self.silence.done() {
            offer(self.silence.position(), Step::Silence);
        }
        best
    }

    fn step_piece(&mut self, index: usize) -> Result<()> {
        let rate = self.project.video_frame_rate;
        let piece = &mut self.pieces[index];

        if piece.position() >= piece.content.end(rate) {
            debug!(piece = %piece.id, "Piece reached its end");
            piece.finish()?;
            piece.set_done();
            return Ok(());
        }

        match piece.pass() {
            Ok(false) => Ok(()),
            Ok(true) => {
                piece.finish()?;
                piece.set_done();
                Ok(())
            }
            Err(ReelError::Decoder(message)) => {
                warn!(
                    piece = %piece.id,
                    content = %piece.content.name,
                    error = %message,
                    "Decoder failed; ending piece"
                );
                if let Err(e) = piece.finish() {
                    warn!(piece = %piece.id, error = %e, "Flush after decoder failure failed");
                }
                piece.set_done();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn step_black(&mut self, time: DCPTime) -> Result<()> {
        for &eyes in self.slot_eyes() {
            let black = self.black_video(eyes);
            self.shuffler.push(time, eyes, 0, black)?;
        }
        self.black.set_position(time + self.one_frame());
        Ok(())
    }

    fn step_silence(&mut self, time: DCPTime) {
        let Some(period) = self.silence.period_at_position() else {
            self.silence.set_position(self.project.length());
            return;
        };
        let rate = self.project.audio_frame_rate;
        let to = (time + self.one_frame()).min(period.to);
        let from_sample = time.samples_round(rate);
        let frames = to.samples_round(rate) - from_sample;
        if frames > 0 {
            let silence = AudioBuffers::silent(self.project.audio_channels, frames as usize);
            self.merger.push(SILENCE, silence, DCPTime::from_samples(from_sample, rate));
        }
        self.silence.set_position(to);
    }

    fn route_decoded(&mut self) -> Result<()> {
        while let Ok(event) = self.decoded_rx.try_recv() {
            let Some(placement) = self.placements.get(event.piece.0).copied() else {
                warn!(piece = %event.piece, "Output from an unknown piece");
                continue;
            };
            match event.decoded {
                Decoded::Video(video) => self.route_video(&placement, video)?,
                Decoded::Audio { stream, audio } => self.route_audio(&placement, stream, audio),
                Decoded::Text(text) => self.route_text(&placement, text),
            }
        }
        Ok(())
    }

    fn route_video(&mut self, at: &Placement, video: ContentVideo) -> Result<()> {
        let time = at.origin + DCPTime::from_frames(video.frame, self.project.video_frame_rate);
        if !at.period.contains(time) {
            trace!(piece = %at.piece, %time, "Video outside its content");
            return Ok(());
        }
        let eyes: &[Eyes] = match (self.project.three_d, video.eyes) {
            (false, Eyes::Right) => return Ok(()),
            (false, _) => &[Eyes::Both],
            (true, Eyes::Both) => &[Eyes::Left, Eyes::Right],
            (true, Eyes::Left) => &[Eyes::Left],
            (true, Eyes::Right) => &[Eyes::Right],
        };
        let container = self.handle.video_container_size();
        for &eyes in eyes {
            let item = PlayerVideo {
                image: video.image.clone(),
                eyes,
                part: video.part,
                container,
                content: Some(at.content),
            };
            self.shuffler.push(time, eyes, at.piece.0 + 1, item)?;
        }
        Ok(())
    }

    fn route_audio(&mut self, at: &Placement, stream: StreamId, audio: ContentAudio) {
        let rate = self.project.audio_frame_rate;
        let ContentAudio { audio: mut data, frame } = audio;
        let mut start = (at.origin + DCPTime::from_samples(frame, rate)).samples_round(rate);
        let period_from = at.period.from.samples_round(rate);
        let period_to = at.period.to.samples_round(rate);

        let end = (start + data.frame_count()).min(period_to);
        let state = self.stream_states.entry((at.piece, stream)).or_insert(at.period.from);
        *state = (*state).max(DCPTime::from_samples(end, rate));

        if start < period_from {
            let cut = period_from - start;
            if cut >= data.frame_count() {
                return;
            }
            data.trim_start(cut as usize);
            start = period_from;
        }
        if start + data.frame_count() > period_to {
            data.truncate((period_to - start).max(0) as usize);
        }
        if data.is_empty() {
            return;
        }

        if at.gain != 1.0 {
            data.apply_gain(at.gain);
        }
        if data.channels() != self.project.audio_channels {
            data = data.remap(self.project.audio_channels);
        }
        self.merger.push(at.piece, data, DCPTime::from_samples(start, rate));
    }

    fn route_text(&mut self, at: &Placement, text: ContentText) {
        let from = at.origin + DCPTime::from_content(text.period.from, &at.frc);
        let to = at.origin + DCPTime::from_content(text.period.to, &at.frc);
        let Some(period) = DCPTimePeriod::new(from, to).overlap(at.period) else {
            trace!(piece = %at.piece, track = %text.track, "Text outside its content");
            return;
        };
        self.send(PlayerEvent::Text {
            payload: text.payload,
            track: text.track,
            period,
        });
    }

    /// Hand on whatever can no longer be preceded by something else.
    fn release(&mut self) {
        let mut watermark = self
            .pieces
            .iter()
            .filter(|p| !p.done())
            .filter_map(Piece::video_position)
            .min();
        if !self.options.ignore_video && !self.black.done() {
            let black = self.black.position();
            watermark = Some(watermark.map_or(black, |w| w.min(black)));
        }
        let ready = match watermark {
            Some(watermark) => self.shuffler.release(watermark),
            None => self.shuffler.flush(),
        };
        for (time, video) in ready {
            self.emit_video(time, video);
        }

        let pieces = &self.pieces;
        let mut pull_to = self
            .stream_states
            .iter()
            .filter(|((piece, stream), _)| {
                pieces.get(piece.0).is_some_and(|p| {
                    !p.done()
                        && p.has_active_audio()
                        && !p.audio.as_ref().is_some_and(|a| a.stream_done(*stream))
                })
            })
            .map(|(_, &time)| time)
            .min();
        if !self.options.ignore_audio && !self.silence.done() {
            let silence = self.silence.position();
            pull_to = Some(pull_to.map_or(silence, |t| t.min(silence)));
        }
        if let Some(to) = pull_to.or_else(|| self.merger.end()) {
            if let Some((audio, time)) = self.merger.pull(to) {
                self.emit_audio(audio, time);
            }
        }
    }

    /// Everything is exhausted: empty the queues and fill to the end.
    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.route_decoded()?;

        for (time, video) in self.shuffler.flush() {
            self.emit_video(time, video);
        }
        if let Some(end) = self.merger.end() {
            if let Some((audio, time)) = self.merger.pull(end) {
                self.emit_audio(audio, time);
            }
        }

        let length = self.project.length();
        if !self.options.ignore_video {
            self.fill_black(length, self.first_eye());
        }
        if !self.options.ignore_audio {
            self.fill_silence(length.samples_round(self.project.audio_frame_rate));
        }
        info!(%length, "Player finished");
        Ok(())
    }

    fn emit_video(&mut self, time: DCPTime, video: PlayerVideo) {
        let time = time.round_to_frame(self.project.video_frame_rate);
        let eyes = video.eyes;
        if let Some((next, next_eyes)) = self.next_video {
            if (time, eyes.order()) < (next, next_eyes.order()) {
                trace!(%time, ?eyes, "Dropping video behind the output position");
                return;
            }
            self.fill_black(time, eyes);
        }
        self.send(PlayerEvent::Video(video, time));

        let after = self.after(time, eyes);
        self.next_video = Some(match self.next_video {
            Some(next) if (next.0, next.1.order()) > (after.0, after.1.order()) => next,
            _ => after,
        });
    }

    /// Black for every slot from the next one up to (not including) `to`.
    fn fill_black(&mut self, to: DCPTime, to_eyes: Eyes) {
        let rate = self.project.video_frame_rate;
        while let Some((time, eyes)) = self.next_video {
            if (time, eyes.order()) >= (to, to_eyes.order()) {
                break;
            }
            let referenced = self
                .referenced_video
                .iter()
                .find(|p| p.contains(time))
                .map(|p| p.to.ceil_to_frame(rate));
            if let Some(skip_to) = referenced {
                self.next_video = Some((skip_to, self.first_eye()));
                continue;
            }
            let black = self.black_video(eyes);
            self.send(PlayerEvent::Video(black, time));
            self.next_video = Some(self.after(time, eyes));
        }
    }

    fn emit_audio(&mut self, audio: AudioBuffers, time: DCPTime) {
        let rate = self.project.audio_frame_rate;
        let start = time.samples_round(rate);
        if self.referenced_audio.is_empty() {
            self.emit_audio_block(audio, start);
            return;
        }

        // Cut out passed-through regions.
        let end = start + audio.frame_count();
        let holes: Vec<(Frame, Frame)> = self
            .referenced_audio
            .iter()
            .map(|p| (p.from.samples_round(rate), p.to.samples_round(rate)))
            .filter(|&(from, to)| to > start && from < end)
            .collect();
        let mut cursor = start;
        for (from, to) in holes {
            if from > cursor {
                let block = audio.slice((cursor - start) as usize, (from - cursor) as usize);
                self.emit_audio_block(block, cursor);
            }
            cursor = cursor.max(to.min(end));
        }
        if cursor < end {
            let block = audio.slice((cursor - start) as usize, (end - cursor) as usize);
            self.emit_audio_block(block, cursor);
        }
    }

    fn emit_audio_block(&mut self, mut audio: AudioBuffers, mut start: Frame) {
        if let Some(next) = self.next_audio {
            if start < next {
                let late = next - start;
                if late >= audio.frame_count() {
                    trace!(start, next, "Dropping audio behind the output position");
                    return;
                }
                audio.trim_start(late as usize);
                start = next;
            }
            self.fill_silence(start);
        }
        let frames = audio.frame_count();
        if frames == 0 {
            return;
        }
        let time = DCPTime::from_samples(start, self.project.audio_frame_rate);
        self.send(PlayerEvent::Audio(audio, time));
        self.next_audio = Some(self.next_audio.map_or(start + frames, |n| n.max(start + frames)));
    }

    /// Silence from the next sample up to `to`, at most a frame per block.
    fn fill_silence(&mut self, to: Frame) {
        let rate = self.project.audio_frame_rate;
        let block = self.one_frame().samples_round(rate).max(1);
        while let Some(next) = self.next_audio {
            if next >= to {
                break;
            }
            let mut skip_to = None;
            let mut frames = (to - next).min(block);
            for period in &self.referenced_audio {
                let (from, until) = (period.from.samples_round(rate), period.to.samples_round(rate));
                if from <= next && next < until {
                    skip_to = Some(until);
                } else if from > next {
                    frames = frames.min(from - next);
                }
            }
            if let Some(until) = skip_to {
                self.next_audio = Some(until);
                continue;
            }
            let silence = AudioBuffers::silent(self.project.audio_channels, frames as usize);
            self.send(PlayerEvent::Audio(silence, DCPTime::from_samples(next, rate)));
            self.next_audio = Some(next + frames);
        }
    }

    fn black_video(&mut self, eyes: Eyes) -> PlayerVideo {
        let container = self.handle.video_container_size();
        let cached = self.black_image.clone().filter(|image| image.size == container);
        let image = match cached {
            Some(image) => image,
            None => {
                let image = Arc::new(Image::black(container, PixelFormat::Rgba8));
                self.black_image = Some(image.clone());
                image
            }
        };
        PlayerVideo {
            image,
            eyes,
            part: Part::Whole,
            container,
            content: None,
        }
    }

    /// The slot after `(time, eyes)`.
    fn after(&self, time: DCPTime, eyes: Eyes) -> (DCPTime, Eyes) {
        if self.project.three_d && eyes == Eyes::Left {
            (time, Eyes::Right)
        } else {
            (time + self.one_frame(), self.first_eye())
        }
    }

    fn first_eye(&self) -> Eyes {
        if self.project.three_d {
            Eyes::Left
        } else {
            Eyes::Both
        }
    }

    fn slot_eyes(&self) -> &'static [Eyes] {
        if self.project.three_d {
            &[Eyes::Left, Eyes::Right]
        } else {
            &[Eyes::Both]
        }
    }

    fn one_frame(&self) -> DCPTime {
        DCPTime::from_frames(1, self.project.video_frame_rate)
    }

    fn send(&self, event: PlayerEvent) {
        // The player keeps its own receiver, so the channel never closes.
        let _ = self.events_tx.send(event);
    }
}
