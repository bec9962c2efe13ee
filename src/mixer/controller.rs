// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Stream set controller.
//!
//! Owns every playback stream for the current track and keeps them locked
//! to the transport clock. All mute/solo/volume changes go through the
//! setters here, which recompute effective gains for the whole set: solo
//! on one stream changes every other stream's output.

use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};
use crate::mixer::stream::{
    AudioSink, MasterMix, PlaybackStream, Readiness, Stem, StreamId, StreamRole,
};
use crate::mixer::{effective_volume, MixContext};
use crate::transport::{FocusHandle, TransportClock};

/// Partial update for one stream's mix state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStateChange {
    pub muted: Option<bool>,
    pub solo: Option<bool>,
    pub volume: Option<f32>,
}

/// Partial update for the master mix.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterChange {
    pub volume: Option<f32>,
    pub muted: Option<bool>,
}

/// The set of playback streams for one track, time-locked to one clock.
pub struct StreamSet {
    clock: TransportClock,
    streams: Vec<PlaybackStream>,
    master: MasterMix,
}

impl StreamSet {
    /// Create an empty set for a track of the given duration.
    pub fn new(duration: f64, focus: Option<FocusHandle>) -> Self {
        let clock = match focus {
            Some(focus) => TransportClock::new(duration).with_focus(focus),
            None => TransportClock::new(duration),
        };
        Self {
            clock,
            streams: Vec::new(),
            master: MasterMix::default(),
        }
    }

    pub fn clock(&self) -> &TransportClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut TransportClock {
        &mut self.clock
    }

    pub fn master(&self) -> MasterMix {
        self.master
    }

    pub fn streams(&self) -> &[PlaybackStream] {
        &self.streams
    }

    pub fn has_stems(&self) -> bool {
        self.streams
            .iter()
            .any(|s| matches!(s.role(), StreamRole::Stem(_)))
    }

    /// Add (or replace) the main full-mix stream.
    pub fn add_main(&mut self, url: &str, sink: Box<dyn AudioSink>) -> StreamId {
        self.streams.retain(|s| s.role() != StreamRole::Main);
        let mut stream = PlaybackStream::new(StreamRole::Main, url, sink);
        if self.clock.is_playing() {
            stream.set_needs_resync(true);
        }
        let id = stream.id();
        self.streams.push(stream);
        self.refresh_duration();
        self.recompute_gains();
        id
    }

    /// Add one stem stream. A stem of the same kind is replaced: a new
    /// separation run produces a new set, it never mutates in place. A
    /// stream created mid-playback is marked to catch up on its next
    /// ready state.
    pub fn add_stem(&mut self, stem: &Stem, sink: Box<dyn AudioSink>) -> StreamId {
        self.streams
            .retain(|s| s.role() != StreamRole::Stem(stem.kind));
        let mut stream = PlaybackStream::new(StreamRole::Stem(stem.kind), &stem.audio_url, sink);
        if self.clock.is_playing() {
            stream.set_needs_resync(true);
        }
        let id = stream.id();
        self.streams.push(stream);
        self.refresh_duration();
        self.recompute_gains();
        id
    }

    /// Replace the whole stem set.
    pub fn set_stems(&mut self, stems: Vec<(Stem, Box<dyn AudioSink>)>) {
        self.streams
            .retain(|s| !matches!(s.role(), StreamRole::Stem(_)));
        let playing = self.clock.is_playing();
        for (stem, sink) in stems {
            let mut stream = PlaybackStream::new(StreamRole::Stem(stem.kind), &stem.audio_url, sink);
            if playing {
                stream.set_needs_resync(true);
            }
            self.streams.push(stream);
        }
        self.refresh_duration();
        self.recompute_gains();
    }

    /// Drop every stream handle. The clock survives so the transport can
    /// keep reporting position during a stem-set swap.
    pub fn release_streams(&mut self) {
        for stream in &mut self.streams {
            stream.sink_mut().pause();
        }
        self.streams.clear();
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    /// Toggle playback; returns whether the set is now playing.
    pub fn toggle_play(&mut self) -> bool {
        if self.clock.is_playing() {
            self.pause();
            false
        } else {
            self.play();
            true
        }
    }

    /// Start playback. The clock requests playback focus first, then every
    /// ready stream is seeked to the transport position and started.
    /// Streams that are not ready, or that fail to start, do not block the
    /// others: they are marked for resync and catch up opportunistically.
    /// Idempotent: calling `play()` while already playing is a no-op.
    pub fn play(&mut self) {
        if self.clock.is_playing() {
            return;
        }
        self.clock.play();
        let position = self.clock.current_time();
        self.recompute_gains();
        for stream in &mut self.streams {
            match stream.readiness() {
                Readiness::Ready => {
                    stream.sink_mut().seek(position);
                    if let Err(err) = stream.sink_mut().play() {
                        warn!(stream = ?stream.id(), %err, "stream failed to start");
                        stream.set_needs_resync(true);
                    }
                }
                Readiness::Loading | Readiness::Failed => {
                    stream.set_needs_resync(true);
                }
            }
        }
        debug!(streams = self.streams.len(), position, "stream set playing");
    }

    /// Pause the clock and every stream. Idempotent.
    pub fn pause(&mut self) {
        self.clock.pause();
        for stream in &mut self.streams {
            stream.sink_mut().pause();
        }
    }

    /// Pause and rewind everything to the start of the track.
    pub fn stop(&mut self) {
        self.clock.stop();
        for stream in &mut self.streams {
            stream.sink_mut().pause();
            stream.sink_mut().seek(0.0);
        }
    }

    /// Skip relative to the current position and propagate like `seek`.
    pub fn skip(&mut self, direction: crate::transport::SkipDirection) {
        self.clock.skip(direction);
        let position = self.clock.current_time();
        for stream in &mut self.streams {
            if stream.readiness() == Readiness::Ready {
                stream.sink_mut().seek(position);
            } else {
                stream.set_needs_resync(true);
            }
        }
    }

    /// Seek the clock and propagate to every stream, whether or not they
    /// are playing. Streams that are not ready are marked for resync.
    pub fn seek(&mut self, time: f64) {
        self.clock.seek(time);
        let position = self.clock.current_time();
        for stream in &mut self.streams {
            if stream.readiness() == Readiness::Ready {
                stream.sink_mut().seek(position);
            } else {
                stream.set_needs_resync(true);
            }
        }
    }

    /// Re-synchronize streams that became ready since the last transport
    /// command. This is a correctness backstop, not an optimization: the
    /// underlying sources start with unknown latency, so a late-ready
    /// stream is seeked to the authoritative position and, if the
    /// transport is playing, started. Returns how many streams caught up.
    pub fn sync_ready_streams(&mut self) -> usize {
        let position = self.clock.current_time();
        let playing = self.clock.is_playing();
        let mut synced = 0;
        for stream in &mut self.streams {
            if stream.needs_resync() && stream.readiness() == Readiness::Ready {
                stream.sink_mut().seek(position);
                if playing {
                    if let Err(err) = stream.sink_mut().play() {
                        warn!(stream = ?stream.id(), %err, "stream failed to catch up");
                        continue;
                    }
                }
                stream.set_needs_resync(false);
                synced += 1;
            }
        }
        if synced > 0 {
            self.refresh_duration();
            self.recompute_gains();
        }
        synced
    }

    /// Update one stream's mix state and recompute gains for the whole
    /// set: a solo change on one stream affects every other stream.
    pub fn set_stream_state(
        &mut self,
        id: StreamId,
        change: StreamStateChange,
    ) -> StudioResult<()> {
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| StudioError::InvalidInput(format!("unknown stream {id:?}")))?;
        if let Some(muted) = change.muted {
            stream.set_muted(muted);
        }
        if let Some(solo) = change.solo {
            stream.set_solo(solo);
        }
        if let Some(volume) = change.volume {
            stream.set_volume(volume);
        }
        self.recompute_gains();
        Ok(())
    }

    /// Update master volume/mute and recompute all gains.
    pub fn set_master(&mut self, change: MasterChange) {
        if let Some(volume) = change.volume {
            self.master.volume = volume.clamp(0.0, 1.0);
        }
        if let Some(muted) = change.muted {
            self.master.muted = muted;
        }
        self.recompute_gains();
    }

    /// Effective output volume of one stream, after mute/solo/master.
    pub fn effective_volume_of(&self, id: StreamId) -> Option<f32> {
        let ctx = self.mix_context();
        self.streams
            .iter()
            .find(|s| s.id() == id)
            .map(|s| effective_volume(s, ctx))
    }

    fn mix_context(&self) -> MixContext {
        MixContext {
            any_solo: self.streams.iter().any(|s| s.solo()),
            has_stems: self.has_stems(),
            master: self.master,
        }
    }

    fn recompute_gains(&mut self) {
        let ctx = self.mix_context();
        for stream in &mut self.streams {
            let gain = effective_volume(stream, ctx);
            stream.sink_mut().set_gain(gain);
        }
    }

    /// Transport duration is the longest duration across loaded streams.
    fn refresh_duration(&mut self) {
        let max = self
            .streams
            .iter()
            .filter_map(|s| s.sink().duration())
            .fold(0.0_f64, f64::max);
        if max > 0.0 {
            self.clock.set_duration(max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::stream::NullSink;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Sink double with externally controllable readiness and failure.
    struct SinkProbe {
        readiness: Cell<Readiness>,
        fail_next_play: Cell<bool>,
        playing: Cell<bool>,
        position: Cell<f64>,
        gain: Cell<f32>,
        duration: Cell<Option<f64>>,
        seeks: RefCell<Vec<f64>>,
    }

    impl SinkProbe {
        fn new(duration: f64) -> Self {
            Self {
                readiness: Cell::new(Readiness::Ready),
                fail_next_play: Cell::new(false),
                playing: Cell::new(false),
                position: Cell::new(0.0),
                gain: Cell::new(1.0),
                duration: Cell::new(Some(duration)),
                seeks: RefCell::new(Vec::new()),
            }
        }
    }

    struct ProbeSink(Rc<SinkProbe>);

    impl AudioSink for ProbeSink {
        fn load(&mut self, _url: &str) {}

        fn play(&mut self) -> Result<(), crate::mixer::SinkError> {
            if self.0.fail_next_play.get() {
                self.0.fail_next_play.set(false);
                return Err(crate::mixer::SinkError::Failed("device busy".into()));
            }
            self.0.playing.set(true);
            Ok(())
        }

        fn pause(&mut self) {
            self.0.playing.set(false);
        }

        fn seek(&mut self, seconds: f64) {
            self.0.position.set(seconds);
            self.0.seeks.borrow_mut().push(seconds);
        }

        fn set_gain(&mut self, gain: f32) {
            self.0.gain.set(gain);
        }

        fn readiness(&self) -> Readiness {
            self.0.readiness.get()
        }

        fn duration(&self) -> Option<f64> {
            self.0.duration.get()
        }
    }

    fn probe(duration: f64) -> (Rc<SinkProbe>, Box<ProbeSink>) {
        let state = Rc::new(SinkProbe::new(duration));
        (Rc::clone(&state), Box::new(ProbeSink(Rc::clone(&state))))
    }

    fn stem(kind: crate::mixer::StemKind) -> Stem {
        Stem {
            id: format!("stem-{}", kind.name()),
            kind,
            audio_url: format!("test://{}.mp3", kind.name()),
        }
    }

    #[test]
    fn test_solo_silences_all_peers() {
        let mut set = StreamSet::new(180.0, None);
        use crate::mixer::StemKind::*;
        let vocals = set.add_stem(&stem(Vocals), Box::new(NullSink::new(180.0)));
        let drums = set.add_stem(&stem(Drums), Box::new(NullSink::new(180.0)));
        let bass = set.add_stem(&stem(Bass), Box::new(NullSink::new(180.0)));

        set.set_stream_state(
            vocals,
            StreamStateChange {
                solo: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(set.effective_volume_of(vocals), Some(1.0));
        assert_eq!(set.effective_volume_of(drums), Some(0.0));
        assert_eq!(set.effective_volume_of(bass), Some(0.0));
    }

    #[test]
    fn test_two_solos_are_both_audible() {
        let mut set = StreamSet::new(180.0, None);
        use crate::mixer::StemKind::*;
        let vocals = set.add_stem(&stem(Vocals), Box::new(NullSink::new(180.0)));
        let drums = set.add_stem(&stem(Drums), Box::new(NullSink::new(180.0)));
        let bass = set.add_stem(&stem(Bass), Box::new(NullSink::new(180.0)));

        for id in [vocals, drums] {
            set.set_stream_state(
                id,
                StreamStateChange {
                    solo: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        assert_eq!(set.effective_volume_of(vocals), Some(1.0));
        assert_eq!(set.effective_volume_of(drums), Some(1.0));
        assert_eq!(set.effective_volume_of(bass), Some(0.0));
    }

    #[test]
    fn test_soloed_and_muted_stream_is_silent_but_still_silences_peers() {
        let mut set = StreamSet::new(180.0, None);
        use crate::mixer::StemKind::*;
        let vocals = set.add_stem(&stem(Vocals), Box::new(NullSink::new(180.0)));
        let drums = set.add_stem(&stem(Drums), Box::new(NullSink::new(180.0)));

        set.set_stream_state(
            vocals,
            StreamStateChange {
                solo: Some(true),
                muted: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        // Mute wins for the stream itself...
        assert_eq!(set.effective_volume_of(vocals), Some(0.0));
        // ...but its solo still silences unsoloed peers.
        assert_eq!(set.effective_volume_of(drums), Some(0.0));
    }

    #[test]
    fn test_main_silent_once_stems_arrive() {
        let mut set = StreamSet::new(180.0, None);
        let main = set.add_main("test://mix.mp3", Box::new(NullSink::new(180.0)));
        assert_eq!(set.effective_volume_of(main), Some(1.0));

        let vocals = set.add_stem(
            &stem(crate::mixer::StemKind::Vocals),
            Box::new(NullSink::new(180.0)),
        );
        assert_eq!(set.effective_volume_of(main), Some(0.0));
        assert_eq!(set.effective_volume_of(vocals), Some(1.0));
    }

    #[test]
    fn test_master_changes_recompute_everything() {
        let mut set = StreamSet::new(180.0, None);
        let main = set.add_main("test://mix.mp3", Box::new(NullSink::new(180.0)));

        set.set_master(MasterChange {
            volume: Some(0.5),
            ..Default::default()
        });
        assert_eq!(set.effective_volume_of(main), Some(0.5));

        set.set_master(MasterChange {
            muted: Some(true),
            ..Default::default()
        });
        assert_eq!(set.effective_volume_of(main), Some(0.0));
    }

    #[test]
    fn test_play_seeks_and_starts_ready_streams() {
        let mut set = StreamSet::new(180.0, None);
        let (state, sink) = probe(180.0);
        set.add_main("test://mix.mp3", sink);

        set.seek(42.0);
        set.play();

        assert!(set.is_playing());
        assert!(state.playing.get());
        assert!((state.position.get() - 42.0).abs() < 0.05);
    }

    #[test]
    fn test_play_twice_has_no_extra_side_effects() {
        let mut set = StreamSet::new(180.0, None);
        let (state, sink) = probe(180.0);
        set.add_main("test://mix.mp3", sink);

        set.play();
        let seeks_after_first = state.seeks.borrow().len();

        set.play();
        assert!(set.is_playing());
        assert_eq!(
            state.seeks.borrow().len(),
            seeks_after_first,
            "a second play must not re-issue commands"
        );
    }

    #[test]
    fn test_stream_added_mid_playback_catches_up() {
        let mut set = StreamSet::new(180.0, None);
        set.add_main("test://mix.mp3", Box::new(NullSink::new(180.0)));
        set.seek(25.0);
        set.play();

        let (late, late_sink) = probe(180.0);
        set.add_stem(&stem(crate::mixer::StemKind::Vocals), late_sink);
        assert!(!late.playing.get());

        assert_eq!(set.sync_ready_streams(), 1);
        assert!(late.playing.get());
        assert!((*late.seeks.borrow().last().unwrap() - 25.0).abs() < 0.1);
    }

    #[test]
    fn test_failed_start_does_not_abort_the_others() {
        let mut set = StreamSet::new(180.0, None);
        let (bad, bad_sink) = probe(180.0);
        bad.fail_next_play.set(true);
        let (good, good_sink) = probe(180.0);

        set.add_stem(&stem(crate::mixer::StemKind::Vocals), bad_sink);
        set.add_stem(&stem(crate::mixer::StemKind::Drums), good_sink);

        set.play();
        assert!(set.is_playing());
        assert!(!bad.playing.get());
        assert!(good.playing.get());
    }

    #[test]
    fn test_loading_stream_catches_up_on_ready() {
        let mut set = StreamSet::new(180.0, None);
        let (late, late_sink) = probe(180.0);
        late.readiness.set(Readiness::Loading);
        set.add_main("test://mix.mp3", late_sink);

        set.seek(30.0);
        set.play();
        assert!(set.is_playing());
        assert!(!late.playing.get(), "loading stream must not be started");

        // Source finishes buffering; the controller re-seeks and starts it.
        late.readiness.set(Readiness::Ready);
        assert_eq!(set.sync_ready_streams(), 1);
        assert!(late.playing.get());
        let last_seek = *late.seeks.borrow().last().unwrap();
        assert!((last_seek - 30.0).abs() < 0.1);
    }

    #[test]
    fn test_seek_propagates_while_paused() {
        let mut set = StreamSet::new(180.0, None);
        let (state, sink) = probe(180.0);
        set.add_main("test://mix.mp3", sink);

        set.seek(66.0);
        assert!(!set.is_playing());
        assert_eq!(state.position.get(), 66.0);
    }

    #[test]
    fn test_duration_follows_longest_stream() {
        let mut set = StreamSet::new(100.0, None);
        set.add_main("test://mix.mp3", Box::new(NullSink::new(215.0)));
        assert_eq!(set.duration(), 215.0);
    }

    #[test]
    fn test_unknown_stream_is_rejected() {
        let mut set = StreamSet::new(100.0, None);
        let err = set
            .set_stream_state(StreamId::next(), StreamStateChange::default())
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
    }

    #[test]
    fn test_set_stems_replaces_the_whole_set() {
        let mut set = StreamSet::new(180.0, None);
        use crate::mixer::StemKind::*;
        set.add_main("test://mix.mp3", Box::new(NullSink::new(180.0)));
        set.add_stem(&stem(Vocals), Box::new(NullSink::new(180.0)));
        set.add_stem(&stem(Drums), Box::new(NullSink::new(180.0)));
        assert_eq!(set.streams().len(), 3);

        // A new separation run delivers a different set.
        set.set_stems(vec![
            (stem(Vocals), Box::new(NullSink::new(180.0)) as Box<dyn AudioSink>),
            (stem(Bass), Box::new(NullSink::new(180.0)) as Box<dyn AudioSink>),
            (stem(Other), Box::new(NullSink::new(180.0)) as Box<dyn AudioSink>),
        ]);

        assert_eq!(set.streams().len(), 4);
        assert!(set.has_stems());
        assert!(set
            .streams()
            .iter()
            .any(|s| s.role() == StreamRole::Stem(Bass)));
        assert!(!set
            .streams()
            .iter()
            .any(|s| s.role() == StreamRole::Stem(Drums)));
    }

    #[test]
    fn test_stop_rewinds_streams() {
        let mut set = StreamSet::new(100.0, None);
        let (state, sink) = probe(100.0);
        set.add_main("test://mix.mp3", sink);

        set.seek(50.0);
        set.play();
        set.stop();

        assert!(!set.is_playing());
        assert!(!state.playing.get());
        assert_eq!(state.position.get(), 0.0);
        assert_eq!(set.current_time(), 0.0);
    }
}
