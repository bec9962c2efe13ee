// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Studio session: the composition root of the engine.
//!
//! A session owns the transport, the stream set, the section model, the
//! replacement workflow and the version ledger for one attached track,
//! and reconciles them with realtime updates from the collaborators.
//!
//! The concurrency model is single-threaded and cooperative: collaborator
//! calls are awaited, realtime updates are drained by `pump()`, and no
//! component mutates another behind its back.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult};
use crate::mixer::{
    AudioSink, MasterChange, MasterMix, Readiness, StreamId, StreamRole, StreamSet,
    StreamStateChange,
};
use crate::replace::workflow::JobUpdateOutcome;
use crate::replace::{
    JobStatus, ReplacementJob, ReplacementRange, ReplacementWorkflow, SaveMode, Variant,
    WorkflowStage,
};
use crate::sections::{lyrics_for_range, ReplacedRange, Section, SectionMap, TimedWord};
use crate::service::{
    EventReceiver, GenerationService, JobRecord, LyricTimingProvider, StemStore, StudioEvent,
    VersionStore,
};
use crate::transport::focus::{shared_registry, FocusHandle, SharedFocus};
use crate::transport::SkipDirection;
use crate::versions::{Version, VersionLedger, VersionType};

/// The track being edited. Owned externally; the engine only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: String,
    pub title: String,
    pub duration: f64,
    pub audio_url: String,
    pub supports_replacement: bool,
}

/// Transport state exposed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub current_time: f64,
    pub is_playing: bool,
    pub duration: f64,
}

/// One stream's state exposed to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamView {
    pub id: StreamId,
    pub role: StreamRole,
    pub muted: bool,
    pub solo: bool,
    pub volume: f32,
    pub effective_volume: f32,
    pub readiness: Readiness,
}

/// Factory for audio sinks; the host supplies the real audio backend.
pub type SinkFactory = Box<dyn Fn() -> Box<dyn AudioSink>>;

/// A/B preview playback for the comparison state.
struct PreviewPlayer {
    sink: Box<dyn AudioSink>,
}

/// Everything owned for the currently attached track.
struct Attached {
    info: TrackInfo,
    focus: FocusHandle,
    streams: Rc<RefCell<StreamSet>>,
    words: Option<Vec<TimedWord>>,
    sections: SectionMap,
    workflow: ReplacementWorkflow,
    ledger: VersionLedger,
    events: Vec<EventReceiver>,
    preview: Option<PreviewPlayer>,
    notices: Vec<String>,
}

/// The studio engine for one user surface.
pub struct StudioSession<G, V, S, L> {
    config: StudioConfig,
    registry: SharedFocus,
    generation: G,
    version_store: V,
    stem_store: S,
    lyrics: L,
    sink_factory: SinkFactory,
    attached: Option<Attached>,
}

impl<G, V, S, L> StudioSession<G, V, S, L>
where
    G: GenerationService,
    V: VersionStore,
    S: StemStore,
    L: LyricTimingProvider,
{
    pub fn new(
        config: StudioConfig,
        generation: G,
        version_store: V,
        stem_store: S,
        lyrics: L,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            config,
            registry: shared_registry(),
            generation,
            version_store,
            stem_store,
            lyrics,
            sink_factory,
            attached: None,
        }
    }

    /// Share a focus registry with other playback surfaces (the global
    /// player, a second studio instance).
    pub fn with_focus_registry(mut self, registry: SharedFocus) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Direct access to the collaborators, for hosts that drive them
    /// outside the session (and for tests).
    pub fn generation_mut(&mut self) -> &mut G {
        &mut self.generation
    }

    pub fn version_store_mut(&mut self) -> &mut V {
        &mut self.version_store
    }

    pub fn stem_store_mut(&mut self) -> &mut S {
        &mut self.stem_store
    }

    pub fn focus_registry(&self) -> SharedFocus {
        Rc::clone(&self.registry)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn track(&self) -> Option<&TrackInfo> {
        self.attached.as_ref().map(|a| &a.info)
    }

    fn attached(&self) -> StudioResult<&Attached> {
        self.attached
            .as_ref()
            .ok_or_else(|| StudioError::InvalidState("no track attached".into()))
    }

    fn attached_mut(&mut self) -> StudioResult<&mut Attached> {
        self.attached
            .as_mut()
            .ok_or_else(|| StudioError::InvalidState("no track attached".into()))
    }

    /// Attach to a track: load versions, stems and lyric timing, build
    /// the stream set, and subscribe to realtime updates. Any previously
    /// attached track is detached first.
    pub async fn attach(&mut self, info: TrackInfo) -> StudioResult<()> {
        self.detach();

        let versions = self
            .version_store
            .list_versions(&info.id)
            .await
            .map_err(|e| e.into_studio("list_versions"))?;
        let mut ledger = VersionLedger::new(info.id.as_str());
        ledger.load(versions);

        // A failing stem listing is non-fatal: the main mix still plays.
        let stems = match self.stem_store.list_stems(&info.id).await {
            Ok(stems) => stems,
            Err(err) => {
                warn!(%err, "stem listing failed, continuing without stems");
                Vec::new()
            }
        };

        // Same for lyric timing: fall back to fixed-size slicing.
        let words = match self.lyrics.word_timings(&info.id).await {
            Ok(words) => words,
            Err(err) => {
                warn!(%err, "lyric timing unavailable, using fallback sections");
                None
            }
        };
        let sections = SectionMap::derive(
            words.as_deref(),
            info.duration,
            self.config.fallback_slice_seconds,
        );

        let focus = FocusHandle::new(Rc::clone(&self.registry));
        let mut set = StreamSet::new(info.duration, Some(focus.clone()));
        set.clock_mut().set_skip_seconds(self.config.skip_seconds);
        set.set_master(MasterChange {
            volume: Some(self.config.master_volume),
            muted: None,
        });

        // The main stream is always created; when stems exist it stays as
        // a silent timing reference until they finish loading.
        let main_audio_url = ledger
            .primary()
            .map(|v| v.audio_url.clone())
            .unwrap_or_else(|| info.audio_url.clone());
        set.add_main(&main_audio_url, (self.sink_factory)());
        for stem in &stems {
            set.add_stem(stem, (self.sink_factory)());
        }

        let streams = Rc::new(RefCell::new(set));

        // Preemption from another surface pauses this one. The callback
        // holds a weak reference so teardown order cannot leak the set.
        let weak: Weak<RefCell<StreamSet>> = Rc::downgrade(&streams);
        focus.register_stop(Box::new(move || {
            if let Some(set) = weak.upgrade() {
                set.borrow_mut().pause();
            }
        }));

        let events = vec![
            self.generation.subscribe_jobs(&info.id),
            self.version_store.subscribe_versions(&info.id),
            self.stem_store.subscribe_stems(&info.id),
        ];

        info!(track = %info.id, stems = stems.len(), "studio attached");
        self.attached = Some(Attached {
            workflow: ReplacementWorkflow::new(info.id.as_str()),
            info,
            focus,
            streams,
            words,
            sections,
            ledger,
            events,
            preview: None,
            notices: Vec::new(),
        });
        Ok(())
    }

    /// Detach from the current track: stop every playing stream, release
    /// all stream handles, then unsubscribe from realtime updates, in
    /// that order. A pending replacement job keeps running server-side
    /// and is reconciled through the ledger on return.
    pub fn detach(&mut self) {
        let Some(mut attached) = self.attached.take() else {
            return;
        };
        if let Some(mut preview) = attached.preview.take() {
            preview.sink.pause();
        }
        attached.streams.borrow_mut().pause();
        attached.streams.borrow_mut().release_streams();
        attached.events.clear();
        attached.focus.release();
        info!(track = %attached.info.id, "studio detached");
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn transport(&self) -> StudioResult<TransportSnapshot> {
        let attached = self.attached()?;
        let set = attached.streams.borrow();
        Ok(TransportSnapshot {
            current_time: set.current_time(),
            is_playing: set.is_playing(),
            duration: set.duration(),
        })
    }

    pub fn play(&mut self) -> StudioResult<()> {
        self.stop_preview_if_any();
        let attached = self.attached()?;
        attached.streams.borrow_mut().play();
        Ok(())
    }

    pub fn pause(&mut self) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().pause();
        Ok(())
    }

    /// Toggle playback; returns whether the transport is now playing.
    pub fn toggle_play(&mut self) -> StudioResult<bool> {
        self.stop_preview_if_any();
        let attached = self.attached()?;
        Ok(attached.streams.borrow_mut().toggle_play())
    }

    pub fn stop(&mut self) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().stop();
        Ok(())
    }

    pub fn seek(&mut self, time: f64) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().seek(time);
        Ok(())
    }

    pub fn skip(&mut self, direction: SkipDirection) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().skip(direction);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mixer
    // ------------------------------------------------------------------

    pub fn set_stream_state(&mut self, id: StreamId, change: StreamStateChange) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().set_stream_state(id, change)
    }

    pub fn set_master(&mut self, change: MasterChange) -> StudioResult<()> {
        let attached = self.attached()?;
        attached.streams.borrow_mut().set_master(change);
        Ok(())
    }

    pub fn master(&self) -> StudioResult<MasterMix> {
        Ok(self.attached()?.streams.borrow().master())
    }

    /// Per-stream mix state for rendering.
    pub fn stream_views(&self) -> StudioResult<Vec<StreamView>> {
        let attached = self.attached()?;
        let set = attached.streams.borrow();
        Ok(set
            .streams()
            .iter()
            .map(|s| StreamView {
                id: s.id(),
                role: s.role(),
                muted: s.muted(),
                solo: s.solo(),
                volume: s.volume(),
                effective_volume: set.effective_volume_of(s.id()).unwrap_or(0.0),
                readiness: s.readiness(),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------

    pub fn sections(&self) -> StudioResult<Vec<Section>> {
        Ok(self.attached()?.sections.sections().to_vec())
    }

    pub fn replaced_ranges(&self) -> StudioResult<Vec<ReplacedRange>> {
        Ok(self.attached()?.sections.replaced_ranges().to_vec())
    }

    /// Lyric excerpt covered by a time range, for prefilling replacement
    /// instructions.
    pub fn lyrics_for_selection(&self, start: f64, end: f64) -> StudioResult<String> {
        let attached = self.attached()?;
        Ok(attached
            .words
            .as_deref()
            .map(|words| lyrics_for_range(words, start, end))
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Replacement workflow
    // ------------------------------------------------------------------

    pub fn workflow_stage(&self) -> WorkflowStage {
        self.attached
            .as_ref()
            .map(|a| a.workflow.stage())
            .unwrap_or(WorkflowStage::Idle)
    }

    pub fn begin_replacement(&mut self) -> StudioResult<()> {
        let attached = self.attached_mut()?;
        let supports = attached.info.supports_replacement;
        attached.workflow.begin_selection(supports)
    }

    pub fn select_section(&mut self, index: usize) -> StudioResult<()> {
        let attached = self.attached_mut()?;
        let duration = attached.info.duration;
        let section = attached
            .sections
            .get(index)
            .cloned()
            .ok_or_else(|| StudioError::InvalidInput(format!("no section {index}")))?;
        attached.workflow.select_section(&section, duration)
    }

    pub fn select_range(&mut self, start: f64, end: f64) -> StudioResult<()> {
        let attached = self.attached_mut()?;
        let duration = attached.info.duration;
        attached.workflow.select_range(start, end, duration)
    }

    pub fn set_instructions(&mut self, text: &str) -> StudioResult<()> {
        self.attached_mut()?.workflow.set_instructions(text)
    }

    /// Confirm the edit and submit the job. Rejected with a busy error
    /// while another job from this workflow is processing.
    pub async fn confirm_replacement(&mut self) -> StudioResult<String> {
        let request = self.attached_mut()?.workflow.confirm()?;
        match self.generation.submit_section_replacement(&request).await {
            Ok(record) => {
                let attached = self.attached_mut()?;
                let mut job = ReplacementJob::submitted(record.id.as_str(), request.range);
                job.status = record.status;
                attached.workflow.job_submitted(job)?;
                Ok(record.id)
            }
            Err(err) => {
                let err = err.into_studio("submit_section_replacement");
                if let Ok(attached) = self.attached_mut() {
                    attached.workflow.submission_failed(&err);
                }
                Err(err)
            }
        }
    }

    /// The range currently selected in the workflow, for rendering.
    pub fn selected_range(&self) -> Option<ReplacementRange> {
        self.attached
            .as_ref()
            .and_then(|a| a.workflow.selected_range())
    }

    pub fn available_variants(&self) -> Vec<Variant> {
        self.attached
            .as_ref()
            .map(|a| a.workflow.available_variants())
            .unwrap_or_default()
    }

    /// Audition one variant in the comparison. Pauses the main transport
    /// and plays the variant audio on a dedicated preview stream.
    pub fn audition(&mut self, variant: Variant) -> StudioResult<()> {
        let preview_volume = self.config.preview_volume;
        let sink = (self.sink_factory)();
        let attached = self.attached_mut()?;
        attached.workflow.set_auditioning(variant)?;
        let url = attached
            .workflow
            .active_job()
            .and_then(|job| job.variant_url(variant))
            .map(str::to_string)
            .ok_or_else(|| StudioError::InvalidState("no comparison in progress".into()))?;

        attached.streams.borrow_mut().pause();
        attached.focus.request();

        let mut preview = PreviewPlayer { sink };
        preview.sink.load(&url);
        preview.sink.set_gain(preview_volume);
        if let Err(err) = preview.sink.play() {
            warn!(%err, "variant preview failed to start");
        }
        attached.preview = Some(preview);
        debug!(?variant, "auditioning variant");
        Ok(())
    }

    pub fn auditioning(&self) -> Option<Variant> {
        self.attached.as_ref().and_then(|a| a.workflow.auditioning())
    }

    fn stop_preview_if_any(&mut self) {
        if let Some(attached) = self.attached.as_mut() {
            if let Some(mut preview) = attached.preview.take() {
                preview.sink.pause();
                debug!("variant preview stopped");
            }
        }
    }

    /// Commit the chosen variant.
    ///
    /// For `Replace` and `AddVersion` a new version is appended through
    /// the store; `Replace` additionally switches the primary. The
    /// workflow only leaves `comparing` once the version row exists, so a
    /// failed store call keeps the comparison (and a retry) available.
    /// `NewTrack` is delegated to the external store and returns `None`.
    pub async fn apply_replacement(
        &mut self,
        variant: Variant,
        save_mode: SaveMode,
    ) -> StudioResult<Option<Version>> {
        let attached = self.attached()?;
        let track_id = attached.info.id.clone();
        let job = attached
            .workflow
            .active_job()
            .cloned()
            .ok_or_else(|| StudioError::InvalidState("no comparison in progress".into()))?;
        let url = job
            .variant_url(variant)
            .ok_or_else(|| {
                StudioError::InvalidInput(format!("variant {variant:?} was not produced"))
            })?
            .to_string();

        if save_mode == SaveMode::NewTrack {
            let attached = self.attached_mut()?;
            let applied = attached.workflow.apply(variant, save_mode)?;
            if let Some(mut preview) = attached.preview.take() {
                preview.sink.pause();
            }
            info!(job = %applied.job_id, "variant handed off as a new track");
            return Ok(None);
        }

        let version = self
            .version_store
            .create_version(&track_id, &url, VersionType::SectionReplacement)
            .await
            .map_err(|e| e.into_studio("create_version"))?;

        let attached = self.attached_mut()?;
        let applied = attached.workflow.apply(variant, save_mode)?;
        if let Some(mut preview) = attached.preview.take() {
            preview.sink.pause();
        }
        attached.ledger.append(version.clone());
        attached.sections.record_replacement(ReplacedRange {
            start: applied.range.start,
            end: applied.range.end,
            result_audio_url: applied.audio_url.clone(),
            job_id: applied.job_id.clone(),
        });

        if save_mode == SaveMode::Replace {
            self.switch_version(&version.id).await?;
        }
        Ok(Some(version))
    }

    /// Reject both variants: nothing is recorded, no version is created.
    pub fn discard_replacement(&mut self) -> StudioResult<()> {
        self.stop_preview_if_any();
        self.attached_mut()?.workflow.discard()
    }

    /// Cancel out of selection, editing or comparison. Any preview audio
    /// is stopped; nothing is recorded.
    pub fn cancel_replacement(&mut self) -> StudioResult<()> {
        self.stop_preview_if_any();
        self.attached_mut()?.workflow.cancel();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------

    pub fn versions(&self) -> StudioResult<Vec<Version>> {
        Ok(self.attached()?.ledger.list().to_vec())
    }

    pub fn versions_recent_first(&self) -> StudioResult<Vec<Version>> {
        Ok(self
            .attached()?
            .ledger
            .list_recent_first()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn primary_version(&self) -> StudioResult<Option<Version>> {
        Ok(self.attached()?.ledger.primary().cloned())
    }

    /// Switch the active version. The two-step unset/set runs inside the
    /// store; on failure the previous primary stays authoritative locally
    /// and a fatal error is surfaced.
    pub async fn switch_version(&mut self, version_id: &str) -> StudioResult<()> {
        let attached = self.attached()?;
        let track_id = attached.info.id.clone();
        if attached.ledger.get(version_id).is_none() {
            return Err(StudioError::InvalidInput(format!(
                "unknown version {version_id}"
            )));
        }
        match self
            .version_store
            .set_primary_version(&track_id, version_id)
            .await
        {
            Ok(()) => self.attached_mut()?.ledger.apply_primary(version_id),
            Err(err) => {
                warn!(%err, version = %version_id, "primary switch failed, keeping previous primary");
                Err(StudioError::fatal(
                    "set_primary_version",
                    format!("could not make {version_id} primary: {err}"),
                ))
            }
        }
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Drain pending realtime updates and housekeeping: late-ready stream
    /// resync and pause-at-end. Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut drained = Vec::new();
        if let Some(attached) = self.attached.as_mut() {
            for receiver in &mut attached.events {
                while let Ok(event) = receiver.try_recv() {
                    drained.push(event);
                }
            }
        }
        let count = drained.len();
        for event in drained {
            self.handle_event(event);
        }

        if let Some(attached) = self.attached.as_mut() {
            let mut set = attached.streams.borrow_mut();
            set.sync_ready_streams();
            if set.is_playing() && set.clock().has_ended() {
                set.pause();
            }
        }
        count
    }

    /// Apply one realtime event.
    pub fn handle_event(&mut self, event: StudioEvent) {
        match event {
            StudioEvent::JobUpdated(record) => self.handle_job_update(record),
            StudioEvent::VersionCreated(version) => {
                if let Some(attached) = self.attached.as_mut() {
                    attached.ledger.merge_external(version);
                }
            }
            StudioEvent::StemAdded(stem) => {
                let sink = (self.sink_factory)();
                if let Some(attached) = self.attached.as_mut() {
                    let mut set = attached.streams.borrow_mut();
                    set.add_stem(&stem, sink);
                    // A stem arriving mid-playback joins at the
                    // authoritative position through the resync path.
                    set.sync_ready_streams();
                }
            }
        }
    }

    fn handle_job_update(&mut self, record: JobRecord) {
        let Some(attached) = self.attached.as_mut() else {
            return;
        };
        if record.track_id != attached.info.id {
            return;
        }
        let outcome = attached.workflow.on_job_update(
            &record.id,
            record.status,
            record.variant_a_url.clone(),
            record.variant_b_url.clone(),
        );
        match outcome {
            JobUpdateOutcome::ReadyToCompare => {
                attached
                    .notices
                    .push("Replacement ready: compare the variants".into());
            }
            JobUpdateOutcome::Failed(message) => {
                attached
                    .notices
                    .push(format!("Section replacement failed: {message}"));
            }
            JobUpdateOutcome::Ignored => {
                // A duplicate delivery for the job under comparison is
                // dropped outright.
                let under_comparison = attached
                    .workflow
                    .active_job()
                    .is_some_and(|job| job.id == record.id);
                // A completion this workflow is no longer waiting on is
                // not auto-surfaced, but the result is not lost: it is
                // merged into the ledger under a job-derived id.
                if record.status == JobStatus::Completed && !under_comparison {
                    if let Some(url) = record.variant_a_url.clone() {
                        attached.ledger.merge_external(Version {
                            id: format!("job-{}", record.id),
                            track_id: record.track_id.clone(),
                            audio_url: url,
                            created_at: String::new(),
                            is_primary: false,
                            version_type: VersionType::SectionReplacement,
                        });
                        debug!(job = %record.id, "late completion merged into ledger");
                    }
                }
            }
        }
    }

    /// Polling fallback for job status when no push update has arrived.
    /// Transient fetch failures are absorbed and retried on the next
    /// poll.
    pub async fn poll_job(&mut self) -> StudioResult<()> {
        let Some(job_id) = self
            .attached
            .as_ref()
            .filter(|a| a.workflow.is_busy())
            .and_then(|a| a.workflow.active_job())
            .map(|job| job.id.clone())
        else {
            return Ok(());
        };
        match self.generation.job_status(&job_id).await {
            Ok(record) => {
                self.handle_job_update(record);
                Ok(())
            }
            Err(err) => {
                warn!(%err, job = %job_id, "job status fetch failed, will retry");
                Ok(())
            }
        }
    }

    /// User-visible notifications accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        self.attached
            .as_mut()
            .map(|a| std::mem::take(&mut a.notices))
            .unwrap_or_default()
    }
}
