// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Stream mixing layer.
//!
//! This module provides:
//! - Playback streams wrapping one audio source each (full mix or one stem)
//! - A sink abstraction so different audio backends can be used
//!   interchangeably
//! - The stream set controller that keeps every stream locked to the
//!   transport clock and owns all mute/solo/volume state

pub mod controller;
pub mod stream;

pub use controller::{MasterChange, StreamSet, StreamStateChange};
pub use stream::{
    AudioSink, MasterMix, NullSink, PlaybackStream, Readiness, SinkError, Stem, StemKind,
    StreamId, StreamRole,
};

/// Inputs to the effective-volume computation that depend on the whole
/// stream set rather than on one stream.
#[derive(Debug, Clone, Copy)]
pub struct MixContext {
    /// Whether any stream in the set has solo enabled.
    pub any_solo: bool,
    /// Whether the set contains at least one stem stream. When it does,
    /// the main stream is never audible: stems fully replace it.
    pub has_stems: bool,
    /// Master volume and mute.
    pub master: MasterMix,
}

/// Pure effective-volume function.
///
/// Recomputed wholesale for every stream on any input change; mute always
/// wins for the stream itself, and any active solo silences all unsoloed
/// peers.
pub fn effective_volume(stream: &stream::PlaybackStream, ctx: MixContext) -> f32 {
    if ctx.master.muted || stream.muted() {
        return 0.0;
    }
    if ctx.any_solo && !stream.solo() {
        return 0.0;
    }
    if ctx.has_stems && stream.role() == StreamRole::Main {
        return 0.0;
    }
    stream.volume() * ctx.master.volume
}
