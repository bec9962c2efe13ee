// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Version ledger: append-only audio versions with exactly one primary.
//!
//! The ledger mirrors the external version store for one track. Switching
//! the primary is a request/response pair against the store; the local
//! state only moves once the store confirms, so a partial failure can
//! never leave zero or two primaries visible here.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Original,
    SectionReplacement,
    Remix,
    Extend,
    VocalReplacement,
    ArrangementReplacement,
}

/// One audio version of a track, as stored by the version store.
///
/// `created_at` is the store's ISO-8601 timestamp, kept as text: the
/// ledger never does date arithmetic, and ISO-8601 orders lexically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub track_id: String,
    pub audio_url: String,
    pub created_at: String,
    pub is_primary: bool,
    pub version_type: VersionType,
}

/// The per-track version list.
#[derive(Debug, Clone, Default)]
pub struct VersionLedger {
    track_id: String,
    versions: Vec<Version>,
}

impl VersionLedger {
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            versions: Vec::new(),
        }
    }

    /// Replace the local list with the store's answer to `list_versions`.
    /// Normalizes the primary invariant on the way in.
    pub fn load(&mut self, versions: Vec<Version>) {
        self.versions = versions
            .into_iter()
            .filter(|v| v.track_id == self.track_id)
            .collect();
        self.normalize_primary();
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// All versions in insertion order. Ordering beyond "exactly one
    /// primary" is a display concern.
    pub fn list(&self) -> &[Version] {
        &self.versions
    }

    /// Display helper: newest first by the store timestamp.
    pub fn list_recent_first(&self) -> Vec<&Version> {
        let mut sorted: Vec<&Version> = self.versions.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The current primary version, if any version exists.
    pub fn primary(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.is_primary)
    }

    /// Append a version the local session just created through the store.
    pub fn append(&mut self, version: Version) {
        if self.get(&version.id).is_some() {
            return;
        }
        let make_primary = version.is_primary;
        self.versions.push(version);
        if make_primary {
            let id = self.versions.last().map(|v| v.id.clone());
            if let Some(id) = id {
                self.apply_primary(&id).ok();
            }
        }
        self.normalize_primary();
    }

    /// Apply a confirmed primary switch locally: unset all, then set one,
    /// in a single pass so no observer can see zero or two primaries.
    pub fn apply_primary(&mut self, version_id: &str) -> StudioResult<()> {
        if self.get(version_id).is_none() {
            return Err(StudioError::InvalidInput(format!(
                "unknown version {version_id}"
            )));
        }
        for version in &mut self.versions {
            version.is_primary = version.id == version_id;
        }
        debug!(version = %version_id, "primary version switched");
        Ok(())
    }

    /// Merge a version created outside this session (another device, a
    /// job that finished after navigation). Idempotent: merging the same
    /// record twice is a no-op. Returns whether the version was new.
    pub fn merge_external(&mut self, version: Version) -> bool {
        if version.track_id != self.track_id {
            return false;
        }
        if let Some(existing) = self.versions.iter_mut().find(|v| v.id == version.id) {
            let changed_primary = version.is_primary && !existing.is_primary;
            *existing = version;
            if changed_primary {
                let id = existing.id.clone();
                self.apply_primary(&id).ok();
            }
            self.normalize_primary();
            false
        } else {
            debug!(version = %version.id, "external version merged");
            self.append(version);
            true
        }
    }

    /// Keep the invariant: once any version exists, exactly one is
    /// primary. A store that answers with none (or several) is
    /// normalized, preferring the most recently created claimant.
    fn normalize_primary(&mut self) {
        if self.versions.is_empty() {
            return;
        }
        let primaries = self.versions.iter().filter(|v| v.is_primary).count();
        if primaries == 1 {
            return;
        }
        warn!(primaries, "normalizing primary flag");
        let winner = self
            .versions
            .iter()
            .filter(|v| primaries == 0 || v.is_primary)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .map(|v| v.id.clone());
        if let Some(id) = winner {
            for version in &mut self.versions {
                version.is_primary = version.id == id;
            }
        }
    }

    #[cfg(test)]
    fn primary_count(&self) -> usize {
        self.versions.iter().filter(|v| v.is_primary).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: &str, created_at: &str, is_primary: bool) -> Version {
        Version {
            id: id.into(),
            track_id: "track-1".into(),
            audio_url: format!("test://{id}.mp3"),
            created_at: created_at.into(),
            is_primary,
            version_type: VersionType::Original,
        }
    }

    #[test]
    fn test_load_and_primary() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.load(vec![
            version("v1", "2026-08-01T10:00:00Z", true),
            version("v2", "2026-08-02T10:00:00Z", false),
        ]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.primary().unwrap().id, "v1");
        assert_eq!(ledger.primary_count(), 1);
    }

    #[test]
    fn test_load_filters_foreign_tracks() {
        let mut ledger = VersionLedger::new("track-1");
        let mut foreign = version("v9", "2026-08-01T10:00:00Z", true);
        foreign.track_id = "track-2".into();
        ledger.load(vec![version("v1", "2026-08-01T10:00:00Z", true), foreign]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_apply_primary_is_atomic_locally() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.load(vec![
            version("v1", "2026-08-01T10:00:00Z", true),
            version("v2", "2026-08-02T10:00:00Z", false),
            version("v3", "2026-08-03T10:00:00Z", false),
        ]);

        ledger.apply_primary("v3").unwrap();
        assert_eq!(ledger.primary().unwrap().id, "v3");
        assert_eq!(ledger.primary_count(), 1);

        // Unknown version: rejected, previous primary stays authoritative.
        assert!(ledger.apply_primary("missing").is_err());
        assert_eq!(ledger.primary().unwrap().id, "v3");
        assert_eq!(ledger.primary_count(), 1);
    }

    #[test]
    fn test_exactly_one_primary_once_nonempty() {
        let mut ledger = VersionLedger::new("track-1");
        assert!(ledger.primary().is_none());

        // Store answered with no primary at all; the ledger normalizes.
        ledger.load(vec![
            version("v1", "2026-08-01T10:00:00Z", false),
            version("v2", "2026-08-02T10:00:00Z", false),
        ]);
        assert_eq!(ledger.primary_count(), 1);
        assert_eq!(ledger.primary().unwrap().id, "v2");

        // Store answered with two primaries; still exactly one afterwards.
        ledger.load(vec![
            version("v1", "2026-08-01T10:00:00Z", true),
            version("v2", "2026-08-02T10:00:00Z", true),
        ]);
        assert_eq!(ledger.primary_count(), 1);
    }

    #[test]
    fn test_merge_external_is_idempotent() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.load(vec![version("v1", "2026-08-01T10:00:00Z", true)]);

        let incoming = version("v2", "2026-08-02T10:00:00Z", false);
        assert!(ledger.merge_external(incoming.clone()));
        assert!(!ledger.merge_external(incoming));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.primary().unwrap().id, "v1");
    }

    #[test]
    fn test_merge_external_primary_switch() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.load(vec![version("v1", "2026-08-01T10:00:00Z", true)]);

        // Another session made its new version primary.
        ledger.merge_external(version("v2", "2026-08-02T10:00:00Z", true));
        assert_eq!(ledger.primary().unwrap().id, "v2");
        assert_eq!(ledger.primary_count(), 1);
    }

    #[test]
    fn test_merge_external_wrong_track_is_dropped() {
        let mut ledger = VersionLedger::new("track-1");
        let mut foreign = version("v9", "2026-08-01T10:00:00Z", false);
        foreign.track_id = "track-2".into();
        assert!(!ledger.merge_external(foreign));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_recent_first_is_display_only() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.load(vec![
            version("old", "2026-08-01T10:00:00Z", true),
            version("new", "2026-08-03T10:00:00Z", false),
            version("mid", "2026-08-02T10:00:00Z", false),
        ]);

        let recent: Vec<&str> = ledger
            .list_recent_first()
            .iter()
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(recent, vec!["new", "mid", "old"]);

        // The underlying list keeps insertion order.
        assert_eq!(ledger.list()[0].id, "old");
    }

    #[test]
    fn test_append_first_version_becomes_primary() {
        let mut ledger = VersionLedger::new("track-1");
        ledger.append(version("v1", "2026-08-01T10:00:00Z", false));
        assert_eq!(ledger.primary().unwrap().id, "v1");
    }
}
