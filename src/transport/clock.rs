// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport clock implementation.
//!
//! The clock owns the authoritative playback position. Audio streams are
//! commanded to follow it, never the other way around, so the clock keeps
//! reporting time even while a stream is still buffering.

use std::time::Instant;

use tracing::debug;

use crate::transport::focus::FocusHandle;

/// Default skip amount for `skip()`, in seconds.
pub const DEFAULT_SKIP_SECONDS: f64 = 10.0;

/// Direction for a relative skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    Forward,
    Backward,
}

/// The single authoritative `(current_time, is_playing, duration)` tuple.
///
/// Position is stored as an anchor plus wall-clock elapsed time while
/// playing, so reading the position never requires a mutable borrow.
#[derive(Debug)]
pub struct TransportClock {
    /// Position at the last anchor point, in seconds.
    base_position: f64,
    /// Wall-clock instant of the last anchor point while playing.
    anchor: Option<Instant>,
    /// Track duration in seconds.
    duration: f64,
    /// Skip amount for `skip()`.
    skip_seconds: f64,
    /// Playback focus handle; requested before every transition to playing.
    focus: Option<FocusHandle>,
}

impl TransportClock {
    /// Create a stopped clock for a track of the given duration.
    pub fn new(duration: f64) -> Self {
        Self {
            base_position: 0.0,
            anchor: None,
            duration: duration.max(0.0),
            skip_seconds: DEFAULT_SKIP_SECONDS,
            focus: None,
        }
    }

    /// Attach a playback focus handle. Every `play()` will first ask the
    /// registry to stop every other audio surface.
    pub fn with_focus(mut self, focus: FocusHandle) -> Self {
        self.focus = Some(focus);
        self
    }

    /// Override the skip amount.
    pub fn with_skip_seconds(mut self, seconds: f64) -> Self {
        self.skip_seconds = seconds.max(0.0);
        self
    }

    /// Change the skip amount on a live clock.
    pub fn set_skip_seconds(&mut self, seconds: f64) {
        self.skip_seconds = seconds.max(0.0);
    }

    /// Current position in seconds, clamped to `[0, duration]`.
    pub fn current_time(&self) -> f64 {
        let raw = match self.anchor {
            Some(anchor) => self.base_position + anchor.elapsed().as_secs_f64(),
            None => self.base_position,
        };
        raw.clamp(0.0, self.duration)
    }

    /// Whether the transport is playing.
    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Track duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Update the duration (e.g. when a longer stream finishes loading).
    /// The position is re-clamped against the new bound.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        if self.base_position > self.duration {
            self.base_position = self.duration;
        }
    }

    /// Whether playback has reached the end of the track.
    pub fn has_ended(&self) -> bool {
        self.duration > 0.0 && self.current_time() >= self.duration
    }

    /// Start playback. Idempotent: calling `play()` while already playing
    /// is a no-op. Requests playback focus first, so every other audio
    /// surface in the process is stopped before this one starts.
    pub fn play(&mut self) {
        if self.anchor.is_some() {
            return;
        }
        if let Some(focus) = &self.focus {
            focus.request();
        }
        self.anchor = Some(Instant::now());
        debug!(position = self.base_position, "transport playing");
    }

    /// Pause playback, keeping the current position. Idempotent.
    pub fn pause(&mut self) {
        if let Some(anchor) = self.anchor.take() {
            self.base_position =
                (self.base_position + anchor.elapsed().as_secs_f64()).clamp(0.0, self.duration);
            debug!(position = self.base_position, "transport paused");
        }
    }

    /// Toggle between playing and paused.
    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause and rewind to the start of the track.
    pub fn stop(&mut self) {
        self.anchor = None;
        self.base_position = 0.0;
        debug!("transport stopped");
    }

    /// Seek to an absolute position, clamped to `[0, duration]`. Takes
    /// effect immediately whether or not the transport is playing.
    pub fn seek(&mut self, time: f64) {
        self.base_position = time.clamp(0.0, self.duration);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    /// Skip relative to the current position, clamped to bounds.
    pub fn skip(&mut self, direction: SkipDirection) {
        let amount = match direction {
            SkipDirection::Forward => self.skip_seconds,
            SkipDirection::Backward => -self.skip_seconds,
        };
        let target = self.current_time() + amount;
        self.seek(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.05;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn test_clock_creation() {
        let clock = TransportClock::new(200.0);
        assert!(!clock.is_playing());
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.duration(), 200.0);
    }

    #[test]
    fn test_play_is_idempotent() {
        let mut clock = TransportClock::new(200.0);
        clock.play();
        assert!(clock.is_playing());
        let first = clock.current_time();
        clock.play();
        assert!(clock.is_playing());
        // A second play must not rewind or re-anchor the position.
        assert!(clock.current_time() >= first);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut clock = TransportClock::new(200.0);
        clock.pause();
        assert!(!clock.is_playing());
        clock.play();
        clock.pause();
        clock.pause();
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_seek_clamps_to_bounds() {
        let mut clock = TransportClock::new(200.0);
        clock.seek(150.0);
        assert_close(clock.current_time(), 150.0);

        clock.seek(-10.0);
        assert_eq!(clock.current_time(), 0.0);

        clock.seek(500.0);
        assert_eq!(clock.current_time(), 200.0);
    }

    #[test]
    fn test_seek_while_playing() {
        let mut clock = TransportClock::new(200.0);
        clock.play();
        clock.seek(42.0);
        assert!(clock.is_playing());
        assert_close(clock.current_time(), 42.0);
    }

    #[test]
    fn test_skip_forward_and_back() {
        // Scenario from the transport contract: duration 200s, no stems.
        let mut clock = TransportClock::new(200.0);
        clock.play();
        clock.seek(150.0);
        clock.skip(SkipDirection::Forward);
        assert_close(clock.current_time(), 160.0);

        clock.seek(195.0);
        clock.skip(SkipDirection::Forward);
        assert_eq!(clock.current_time(), 200.0);

        clock.skip(SkipDirection::Backward);
        assert_close(clock.current_time(), 190.0);

        clock.seek(4.0);
        clock.skip(SkipDirection::Backward);
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut clock = TransportClock::new(120.0);
        clock.play();
        clock.seek(60.0);
        clock.stop();
        assert!(!clock.is_playing());
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn test_has_ended() {
        let mut clock = TransportClock::new(30.0);
        assert!(!clock.has_ended());
        clock.seek(30.0);
        assert!(clock.has_ended());
        clock.seek(10.0);
        assert!(!clock.has_ended());
    }

    #[test]
    fn test_set_duration_reclamps_position() {
        let mut clock = TransportClock::new(100.0);
        clock.seek(90.0);
        clock.set_duration(60.0);
        assert_eq!(clock.current_time(), 60.0);
        assert_eq!(clock.duration(), 60.0);
    }

    #[test]
    fn test_custom_skip_amount() {
        let mut clock = TransportClock::new(100.0).with_skip_seconds(5.0);
        clock.seek(50.0);
        clock.skip(SkipDirection::Forward);
        assert_close(clock.current_time(), 55.0);
    }
}
