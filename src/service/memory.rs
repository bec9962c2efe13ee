// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory collaborator implementations.
//!
//! These back the demo binary and the test suite. They model the real
//! backends faithfully enough to exercise the engine's concurrency rules:
//! jobs complete out of band, versions can be inserted "by another
//! session", and every mutation is announced on the subscription channels.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::mixer::{Stem, StemKind};
use crate::replace::{JobStatus, ReplacementRequest};
use crate::sections::TimedWord;
use crate::service::{
    EventReceiver, EventSender, GenerationService, JobRecord, LyricTimingProvider, ServiceError,
    StemStore, StudioEvent, VersionStore,
};
use crate::versions::{Version, VersionType};

fn broadcast(subscribers: &mut HashMap<String, Vec<EventSender>>, track_id: &str, event: StudioEvent) {
    if let Some(senders) = subscribers.get_mut(track_id) {
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn subscribe(subscribers: &mut HashMap<String, Vec<EventSender>>, track_id: &str) -> EventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    subscribers.entry(track_id.to_string()).or_default().push(tx);
    rx
}

/// Generation backend holding jobs in a map. Jobs never complete on their
/// own: tests and the demo drive them with `complete_job` / `fail_job`,
/// which also push realtime updates.
#[derive(Default)]
pub struct InMemoryGeneration {
    jobs: HashMap<String, JobRecord>,
    subscribers: HashMap<String, Vec<EventSender>>,
    next_id: u64,
    /// When set, the next submission is rejected with this error.
    pub reject_next_submit: Option<ServiceError>,
}

impl InMemoryGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a job to completion with the given variants.
    pub fn complete_job(&mut self, job_id: &str, variant_a: &str, variant_b: Option<&str>) {
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.variant_a_url = Some(variant_a.to_string());
            job.variant_b_url = variant_b.map(str::to_string);
            let event = StudioEvent::JobUpdated(job.clone());
            let track_id = job.track_id.clone();
            broadcast(&mut self.subscribers, &track_id, event);
        }
    }

    /// Drive a job to failure.
    pub fn fail_job(&mut self, job_id: &str, message: &str) {
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.error_message = Some(message.to_string());
            let event = StudioEvent::JobUpdated(job.clone());
            let track_id = job.track_id.clone();
            broadcast(&mut self.subscribers, &track_id, event);
        }
    }

    /// Advance a job without finishing it, as the real backend does while
    /// the model runs.
    pub fn mark_processing(&mut self, job_id: &str) {
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Processing;
            let event = StudioEvent::JobUpdated(job.clone());
            let track_id = job.track_id.clone();
            broadcast(&mut self.subscribers, &track_id, event);
        }
    }

    pub fn job(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.get(job_id)
    }
}

impl GenerationService for InMemoryGeneration {
    async fn submit_section_replacement(
        &mut self,
        request: &ReplacementRequest,
    ) -> Result<JobRecord, ServiceError> {
        if let Some(err) = self.reject_next_submit.take() {
            return Err(err);
        }
        self.next_id += 1;
        let record = JobRecord {
            id: format!("job-{}", self.next_id),
            track_id: request.track_id.clone(),
            status: JobStatus::Submitted,
            variant_a_url: None,
            variant_b_url: None,
            error_message: None,
        };
        self.jobs.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn job_status(&mut self, job_id: &str) -> Result<JobRecord, ServiceError> {
        self.jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| ServiceError::Rejected(format!("unknown job {job_id}")))
    }

    fn subscribe_jobs(&mut self, track_id: &str) -> EventReceiver {
        subscribe(&mut self.subscribers, track_id)
    }
}

/// Version store over a vector of rows, with an atomic primary switch.
#[derive(Default)]
pub struct InMemoryVersionStore {
    rows: Vec<Version>,
    subscribers: HashMap<String, Vec<EventSender>>,
    next_id: u64,
    /// When set, the next `set_primary_version` fails after the store
    /// already unset the old primary, simulating a partial write.
    pub fail_next_primary_switch: bool,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an initial row without announcing it.
    pub fn seed(&mut self, version: Version) {
        self.rows.push(version);
    }

    /// Insert a row as if another session created it, announcing it on
    /// the subscription channel.
    pub fn insert_external(&mut self, version: Version) {
        let track_id = version.track_id.clone();
        self.rows.push(version.clone());
        broadcast(
            &mut self.subscribers,
            &track_id,
            StudioEvent::VersionCreated(version),
        );
    }

    fn stamp(&mut self) -> String {
        self.next_id += 1;
        // Monotonic ISO-8601-shaped stamps; fractional seconds keep them
        // lexically ordered.
        format!("2026-08-06T12:00:00.{:06}Z", self.next_id)
    }

    pub fn rows(&self) -> &[Version] {
        &self.rows
    }
}

impl VersionStore for InMemoryVersionStore {
    async fn list_versions(&mut self, track_id: &str) -> Result<Vec<Version>, ServiceError> {
        Ok(self
            .rows
            .iter()
            .filter(|v| v.track_id == track_id)
            .cloned()
            .collect())
    }

    async fn create_version(
        &mut self,
        track_id: &str,
        audio_url: &str,
        version_type: VersionType,
    ) -> Result<Version, ServiceError> {
        let created_at = self.stamp();
        let version = Version {
            id: format!("version-{}", self.next_id),
            track_id: track_id.to_string(),
            audio_url: audio_url.to_string(),
            created_at,
            is_primary: !self.rows.iter().any(|v| v.track_id == track_id),
            version_type,
        };
        self.rows.push(version.clone());
        Ok(version)
    }

    async fn set_primary_version(
        &mut self,
        track_id: &str,
        version_id: &str,
    ) -> Result<(), ServiceError> {
        if !self
            .rows
            .iter()
            .any(|v| v.track_id == track_id && v.id == version_id)
        {
            return Err(ServiceError::Rejected(format!(
                "unknown version {version_id}"
            )));
        }
        if self.fail_next_primary_switch {
            self.fail_next_primary_switch = false;
            return Err(ServiceError::Internal("write interrupted".into()));
        }
        for row in self.rows.iter_mut().filter(|v| v.track_id == track_id) {
            row.is_primary = row.id == version_id;
        }
        Ok(())
    }

    fn subscribe_versions(&mut self, track_id: &str) -> EventReceiver {
        subscribe(&mut self.subscribers, track_id)
    }
}

/// Stem store over a per-track list.
#[derive(Default)]
pub struct InMemoryStemStore {
    stems: HashMap<String, Vec<Stem>>,
    subscribers: HashMap<String, Vec<EventSender>>,
}

impl InMemoryStemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stem without announcing it.
    pub fn seed(&mut self, track_id: &str, kind: StemKind, audio_url: &str) {
        self.stems
            .entry(track_id.to_string())
            .or_default()
            .push(Stem {
                id: format!("{track_id}-{}", kind.name()),
                kind,
                audio_url: audio_url.to_string(),
            });
    }

    /// Insert a stem as a concurrent separation job would, announcing it.
    pub fn insert_external(&mut self, track_id: &str, kind: StemKind, audio_url: &str) {
        let stem = Stem {
            id: format!("{track_id}-{}", kind.name()),
            kind,
            audio_url: audio_url.to_string(),
        };
        self.stems
            .entry(track_id.to_string())
            .or_default()
            .push(stem.clone());
        broadcast(&mut self.subscribers, track_id, StudioEvent::StemAdded(stem));
    }
}

impl StemStore for InMemoryStemStore {
    async fn list_stems(&mut self, track_id: &str) -> Result<Vec<Stem>, ServiceError> {
        Ok(self.stems.get(track_id).cloned().unwrap_or_default())
    }

    fn subscribe_stems(&mut self, track_id: &str) -> EventReceiver {
        subscribe(&mut self.subscribers, track_id)
    }
}

/// Lyric timing provider answering from a fixed payload.
#[derive(Default)]
pub struct StaticLyricTiming {
    timings: HashMap<String, Vec<TimedWord>>,
}

impl StaticLyricTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, track_id: &str, words: Vec<TimedWord>) {
        self.timings.insert(track_id.to_string(), words);
    }
}

impl LyricTimingProvider for StaticLyricTiming {
    async fn word_timings(
        &mut self,
        track_id: &str,
    ) -> Result<Option<Vec<TimedWord>>, ServiceError> {
        Ok(self.timings.get(track_id).cloned())
    }
}
