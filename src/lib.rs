// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Studio playback and section-replacement engine.
//!
//! The engine plays a track back as one or more synchronized audio
//! streams (full mix or separated stems) under a single shared transport,
//! and drives the workflow for replacing a selected time range with an
//! AI-regenerated variant: asynchronous job tracking, A/B comparison, and
//! commit-to-version semantics.
//!
//! Audio synthesis, model invocation and persistence are external
//! collaborators behind the traits in [`service`].

pub mod config;
pub mod error;
pub mod mixer;
pub mod replace;
pub mod sections;
pub mod service;
pub mod studio;
pub mod transport;
pub mod versions;

pub use crate::config::StudioConfig;
pub use crate::error::{StudioError, StudioResult};
pub use crate::studio::{StudioSession, TrackInfo, TransportSnapshot};
