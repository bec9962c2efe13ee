// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Section replacement: jobs, variants, and the workflow state machine.
//!
//! The user-visible lifecycle is "pick a range, submit for regeneration,
//! await the result, compare variants, commit or discard". The state
//! machine in `workflow` keeps that lifecycle explicit so a late job
//! notification can never resurrect a discarded workflow.

pub mod workflow;

pub use workflow::{ReplacementWorkflow, WorkflowStage};

use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

/// A half-open time range `[start, end)` within the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplacementRange {
    pub start: f64,
    pub end: f64,
}

impl ReplacementRange {
    /// Validate `0 <= start < end <= duration`.
    pub fn validated(start: f64, end: f64, duration: f64) -> StudioResult<Self> {
        if !(0.0..end).contains(&start) || end > duration {
            return Err(StudioError::InvalidInput(format!(
                "range {start:.2}..{end:.2} is outside 0..{duration:.2}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One regeneration job and its result variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementJob {
    pub id: String,
    pub range: ReplacementRange,
    pub status: JobStatus,
    pub variant_a_url: Option<String>,
    pub variant_b_url: Option<String>,
}

impl ReplacementJob {
    pub fn submitted(id: impl Into<String>, range: ReplacementRange) -> Self {
        Self {
            id: id.into(),
            range,
            status: JobStatus::Submitted,
            variant_a_url: None,
            variant_b_url: None,
        }
    }

    /// URL of the given variant, if the job produced it.
    pub fn variant_url(&self, variant: Variant) -> Option<&str> {
        match variant {
            Variant::A => self.variant_a_url.as_deref(),
            Variant::B => self.variant_b_url.as_deref(),
        }
    }
}

/// One of up to two alternative regenerated results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    A,
    B,
}

/// How an accepted variant is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Append a new version and make it primary, superseding the current
    /// audio.
    Replace,
    /// Append a new version without touching the primary.
    AddVersion,
    /// Hand off to the external store as a brand-new track.
    NewTrack,
}

/// What the user asked the generation collaborator to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub track_id: String,
    pub range: ReplacementRange,
    pub instructions: String,
}

/// Outcome of a committed comparison, handed to the version ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReplacement {
    pub job_id: String,
    pub range: ReplacementRange,
    pub audio_url: String,
    pub save_mode: SaveMode,
}
