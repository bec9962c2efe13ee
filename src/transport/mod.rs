// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport layer: the shared notion of playback position and state.
//!
//! This module provides:
//! - A transport clock that is the single source of truth for
//!   `(current_time, is_playing, duration)` regardless of how many audio
//!   streams exist
//! - A process-wide playback focus registry that guarantees at most one
//!   playing audio surface across the application

pub mod clock;
pub mod focus;

pub use clock::{SkipDirection, TransportClock, DEFAULT_SKIP_SECONDS};
pub use focus::{FocusHandle, FocusRegistry, OwnerId, SharedFocus};
