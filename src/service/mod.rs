// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! External collaborator abstraction layer.
//!
//! The engine consumes four collaborators: a generation service, a version
//! store, a stem store, and a lyric timing provider. Each is a trait so
//! different backends can be used interchangeably; `memory` provides
//! in-process reference implementations for tests and the demo binary.
//!
//! Realtime updates arrive as `StudioEvent`s on per-track subscription
//! channels. Dropping a receiver is the unsubscribe operation.

pub mod memory;

pub use memory::{InMemoryGeneration, InMemoryStemStore, InMemoryVersionStore, StaticLyricTiming};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::StudioError;
use crate::mixer::Stem;
use crate::replace::{JobStatus, ReplacementRequest};
use crate::sections::TimedWord;
use crate::versions::{Version, VersionType};

/// Error from a collaborator call, classified into the engine taxonomy
/// by `into_studio`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// The collaborator could not be reached or timed out.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// Credits exhausted or rate limit hit.
    #[error("capacity: {0}")]
    RateLimited(String),
    /// The collaborator rejected the request as malformed.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The collaborator failed mid-operation; its state is uncertain.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Classify into the engine taxonomy, tagging the originating
    /// operation so the user-visible layer can offer a targeted retry.
    pub fn into_studio(self, operation: &str) -> StudioError {
        match self {
            Self::Unavailable(msg) => StudioError::transient(operation, msg),
            Self::RateLimited(msg) => StudioError::Capacity(msg),
            Self::Rejected(msg) => StudioError::InvalidInput(msg),
            Self::Internal(msg) => StudioError::fatal(operation, msg),
        }
    }
}

/// A generation job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub track_id: String,
    pub status: JobStatus,
    pub variant_a_url: Option<String>,
    pub variant_b_url: Option<String>,
    pub error_message: Option<String>,
}

/// A realtime notification for one track.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    /// A generation job changed state.
    JobUpdated(JobRecord),
    /// A version row was inserted (possibly by another session).
    VersionCreated(Version),
    /// A stem separation run produced a new stem.
    StemAdded(Stem),
}

/// Receiving half of a per-track subscription. Dropping it unsubscribes.
pub type EventReceiver = mpsc::UnboundedReceiver<StudioEvent>;

/// Sending half used by backend implementations.
pub type EventSender = mpsc::UnboundedSender<StudioEvent>;

/// The AI generation collaborator.
pub trait GenerationService {
    /// Submit a section replacement request. Returns the accepted job.
    async fn submit_section_replacement(
        &mut self,
        request: &ReplacementRequest,
    ) -> Result<JobRecord, ServiceError>;

    /// Fetch the current state of a job; used as the polling fallback
    /// when no push notification has arrived.
    async fn job_status(&mut self, job_id: &str) -> Result<JobRecord, ServiceError>;

    /// Subscribe to job updates for one track.
    fn subscribe_jobs(&mut self, track_id: &str) -> EventReceiver;
}

/// The version store collaborator.
pub trait VersionStore {
    async fn list_versions(&mut self, track_id: &str) -> Result<Vec<Version>, ServiceError>;

    async fn create_version(
        &mut self,
        track_id: &str,
        audio_url: &str,
        version_type: VersionType,
    ) -> Result<Version, ServiceError>;

    /// Atomically make one version primary (unset-all-then-set-one). The
    /// store guarantees no concurrent reader observes zero or two
    /// primaries.
    async fn set_primary_version(
        &mut self,
        track_id: &str,
        version_id: &str,
    ) -> Result<(), ServiceError>;

    /// Subscribe to newly inserted versions for one track.
    fn subscribe_versions(&mut self, track_id: &str) -> EventReceiver;
}

/// The stem store collaborator.
pub trait StemStore {
    async fn list_stems(&mut self, track_id: &str) -> Result<Vec<Stem>, ServiceError>;

    /// Subscribe to stems inserted by a separation job running
    /// concurrently with studio use.
    fn subscribe_stems(&mut self, track_id: &str) -> EventReceiver;
}

/// Word-level lyric timing, consumed once per track load.
pub trait LyricTimingProvider {
    async fn word_timings(
        &mut self,
        track_id: &str,
    ) -> Result<Option<Vec<TimedWord>>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = ServiceError::Unavailable("timeout".into()).into_studio("job_status");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("job_status"));

        assert!(matches!(
            ServiceError::RateLimited("no credits".into()).into_studio("submit"),
            StudioError::Capacity(_)
        ));
        assert!(matches!(
            ServiceError::Rejected("bad range".into()).into_studio("submit"),
            StudioError::InvalidInput(_)
        ));
        assert!(matches!(
            ServiceError::Internal("oops".into()).into_studio("set_primary"),
            StudioError::Fatal { .. }
        ));
    }

    #[test]
    fn test_job_record_round_trips_as_json() {
        let record = JobRecord {
            id: "job-1".into(),
            track_id: "track-1".into(),
            status: JobStatus::Completed,
            variant_a_url: Some("test://a.mp3".into()),
            variant_b_url: None,
            error_message: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"completed\""));
        let parsed: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
