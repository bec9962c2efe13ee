// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback streams and the audio sink abstraction.
//!
//! A `PlaybackStream` wraps one audio source (the full mix or a single
//! stem) together with its mutable mix state. The actual audio backend is
//! behind the `AudioSink` trait so the engine can run against a real
//! output, a test double, or nothing at all.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

impl StreamId {
    pub fn next() -> Self {
        Self(NEXT_STREAM.fetch_add(1, Ordering::Relaxed))
    }
}

/// Kind of an isolated stem sub-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StemKind {
    Vocals,
    Drums,
    Bass,
    Other,
    Instrumental,
}

impl StemKind {
    /// Parse a stem kind from a backend record; unknown names map to
    /// `Other` rather than failing the whole stem set.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "vocals" | "vocal" => Self::Vocals,
            "drums" | "drum" => Self::Drums,
            "bass" => Self::Bass,
            "instrumental" | "backing" => Self::Instrumental,
            _ => Self::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vocals => "vocals",
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Other => "other",
            Self::Instrumental => "instrumental",
        }
    }
}

/// A stem record as delivered by the stem store. Immutable once created:
/// a new separation run produces a whole new set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stem {
    pub id: String,
    pub kind: StemKind,
    pub audio_url: String,
}

/// What a stream is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// The full mix.
    Main,
    /// One isolated stem.
    Stem(StemKind),
}

/// Buffering state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Still buffering; commands are deferred.
    Loading,
    /// Ready for immediate playback.
    Ready,
    /// The source failed to load. Excluded from playback until it recovers.
    Failed,
}

/// Error from an audio sink operation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SinkError {
    #[error("source is not ready")]
    NotReady,
    #[error("playback failed: {0}")]
    Failed(String),
}

/// Backend abstraction for one audio source.
///
/// Implementations are expected to be cheap command recorders: loading and
/// buffering happen elsewhere, and `readiness()` reflects their progress.
pub trait AudioSink {
    /// Point the sink at a source URL and begin loading it.
    fn load(&mut self, url: &str);

    /// Start playback from the current position.
    fn play(&mut self) -> Result<(), SinkError>;

    /// Pause playback, keeping position.
    fn pause(&mut self);

    /// Move the playhead to an absolute position in seconds.
    fn seek(&mut self, seconds: f64);

    /// Set the output gain, `0.0..=1.0`.
    fn set_gain(&mut self, gain: f32);

    /// Current buffering state.
    fn readiness(&self) -> Readiness;

    /// Source duration, once known.
    fn duration(&self) -> Option<f64>;
}

/// A sink that produces no audio. Always ready; used for silent timing
/// references and for the demo binary.
#[derive(Debug, Default)]
pub struct NullSink {
    url: String,
    duration: Option<f64>,
    playing: bool,
    position: f64,
    gain: f32,
}

impl NullSink {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            gain: 1.0,
            ..Self::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl AudioSink for NullSink {
    fn load(&mut self, url: &str) {
        self.url = url.to_string();
    }

    fn play(&mut self) -> Result<(), SinkError> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    fn readiness(&self) -> Readiness {
        Readiness::Ready
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Master output state shared by every stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterMix {
    pub volume: f32,
    pub muted: bool,
}

impl Default for MasterMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

/// One runtime audio stream with its mix state.
///
/// Mix state may only be mutated through the stream set controller's
/// setters; direct writes would bypass the wholesale gain recomputation.
pub struct PlaybackStream {
    id: StreamId,
    role: StreamRole,
    muted: bool,
    solo: bool,
    volume: f32,
    sink: Box<dyn AudioSink>,
    /// Set when a seek or play happened while the sink was not ready;
    /// cleared after the catch-up resync.
    needs_resync: bool,
}

impl PlaybackStream {
    pub fn new(role: StreamRole, url: &str, mut sink: Box<dyn AudioSink>) -> Self {
        sink.load(url);
        Self {
            id: StreamId::next(),
            role,
            muted: false,
            solo: false,
            volume: 1.0,
            sink,
            needs_resync: false,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn role(&self) -> StreamRole {
        self.role
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn solo(&self) -> bool {
        self.solo
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn readiness(&self) -> Readiness {
        self.sink.readiness()
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub(crate) fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub(crate) fn set_needs_resync(&mut self, needs: bool) {
        self.needs_resync = needs;
    }

    pub(crate) fn sink_mut(&mut self) -> &mut dyn AudioSink {
        self.sink.as_mut()
    }

    pub(crate) fn sink(&self) -> &dyn AudioSink {
        self.sink.as_ref()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Build a ready stream for mix-math tests.
    pub fn test_stream(role: StreamRole) -> PlaybackStream {
        PlaybackStream::new(role, "test://source", Box::new(NullSink::new(100.0)))
    }

    #[test]
    fn test_stem_kind_parse() {
        assert_eq!(StemKind::parse("Vocals"), StemKind::Vocals);
        assert_eq!(StemKind::parse("drum"), StemKind::Drums);
        assert_eq!(StemKind::parse("theremin"), StemKind::Other);
    }

    #[test]
    fn test_stream_loads_sink_on_creation() {
        let s = test_stream(StreamRole::Main);
        assert_eq!(s.readiness(), Readiness::Ready);
        assert_eq!(s.sink().duration(), Some(100.0));
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut s = test_stream(StreamRole::Main);
        s.set_volume(1.7);
        assert_eq!(s.volume(), 1.0);
        s.set_volume(-0.3);
        assert_eq!(s.volume(), 0.0);
    }

    #[test]
    fn test_null_sink_records_commands() {
        let mut sink = NullSink::new(60.0);
        sink.load("test://a.mp3");
        sink.seek(12.5);
        sink.set_gain(0.25);
        assert!(sink.play().is_ok());
        assert_eq!(sink.url(), "test://a.mp3");
        assert_eq!(sink.position(), 12.5);
        assert_eq!(sink.gain(), 0.25);
        assert!(sink.is_playing());
        sink.pause();
        assert!(!sink.is_playing());
    }
}
