// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Replacement workflow state machine.
//!
//! States: `idle -> selecting -> editing -> processing -> comparing`,
//! returning to `idle` after apply, discard, or cancel. Exactly one job
//! may be in `processing` per track from this workflow; a second submit
//! attempt is rejected with a busy error, never queued.

use tracing::{debug, info, warn};

use crate::error::{StudioError, StudioResult};
use crate::replace::{
    AppliedReplacement, JobStatus, ReplacementJob, ReplacementRange, ReplacementRequest, SaveMode,
    Variant,
};
use crate::sections::Section;

/// Public state tag, exposed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Idle,
    Selecting,
    Editing,
    Processing,
    Comparing,
}

/// Internal state with per-state payloads.
enum State {
    Idle,
    Selecting,
    Editing {
        range: ReplacementRange,
        instructions: String,
    },
    Processing {
        job: ReplacementJob,
    },
    Comparing {
        job: ReplacementJob,
        auditioning: Variant,
    },
}

/// What a job status update did to the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdateOutcome {
    /// The update did not belong to this workflow's current state; the
    /// caller may still merge the result into the version ledger.
    Ignored,
    /// The job completed and the workflow moved to `comparing`.
    ReadyToCompare,
    /// The job failed; the workflow returned to `idle`.
    Failed(String),
}

/// The five-state replacement workflow for one track.
pub struct ReplacementWorkflow {
    track_id: String,
    state: State,
}

impl ReplacementWorkflow {
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            state: State::Idle,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        match self.state {
            State::Idle => WorkflowStage::Idle,
            State::Selecting => WorkflowStage::Selecting,
            State::Editing { .. } => WorkflowStage::Editing,
            State::Processing { .. } => WorkflowStage::Processing,
            State::Comparing { .. } => WorkflowStage::Comparing,
        }
    }

    /// Whether a job from this workflow is currently in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, State::Processing { .. })
    }

    /// The in-flight or compared job, if any.
    pub fn active_job(&self) -> Option<&ReplacementJob> {
        match &self.state {
            State::Processing { job } | State::Comparing { job, .. } => Some(job),
            _ => None,
        }
    }

    /// The range currently selected, submitted or compared, for
    /// rendering the selection overlay.
    pub fn selected_range(&self) -> Option<ReplacementRange> {
        match &self.state {
            State::Editing { range, .. } => Some(*range),
            State::Processing { job } | State::Comparing { job, .. } => Some(job.range),
            _ => None,
        }
    }

    /// Enter range selection. Requires the track to support replacement.
    pub fn begin_selection(&mut self, supports_replacement: bool) -> StudioResult<()> {
        if !supports_replacement {
            return Err(StudioError::InvalidInput(
                "this track does not support section replacement".into(),
            ));
        }
        match self.state {
            State::Idle => {
                self.state = State::Selecting;
                Ok(())
            }
            State::Processing { .. } => Err(StudioError::Busy(
                "a section replacement is already processing".into(),
            )),
            _ => Err(StudioError::InvalidState(
                "selection is only available from idle".into(),
            )),
        }
    }

    /// Pick a derived section as the range to replace.
    pub fn select_section(&mut self, section: &Section, duration: f64) -> StudioResult<()> {
        self.select_range(section.start, section.end, duration)
    }

    /// Pick a free-form custom range. Validated synchronously, before any
    /// network call.
    pub fn select_range(&mut self, start: f64, end: f64, duration: f64) -> StudioResult<()> {
        match self.state {
            State::Selecting | State::Editing { .. } => {
                let range = ReplacementRange::validated(start, end, duration)?;
                let instructions = match &self.state {
                    State::Editing { instructions, .. } => instructions.clone(),
                    _ => String::new(),
                };
                debug!(?range, "range selected");
                self.state = State::Editing {
                    range,
                    instructions,
                };
                Ok(())
            }
            _ => Err(StudioError::InvalidState(
                "no selection in progress".into(),
            )),
        }
    }

    /// Update the instructions while editing.
    pub fn set_instructions(&mut self, text: impl Into<String>) -> StudioResult<()> {
        match &mut self.state {
            State::Editing { instructions, .. } => {
                *instructions = text.into();
                Ok(())
            }
            _ => Err(StudioError::InvalidState("nothing is being edited".into())),
        }
    }

    /// Confirm the edit and produce the request to submit. The workflow
    /// stays in `editing` until `job_submitted` reports the accepted job,
    /// so a rejected submission leaves the user's input intact.
    pub fn confirm(&mut self) -> StudioResult<ReplacementRequest> {
        match &self.state {
            State::Editing {
                range,
                instructions,
            } => Ok(ReplacementRequest {
                track_id: self.track_id.clone(),
                range: *range,
                instructions: instructions.clone(),
            }),
            State::Processing { .. } => Err(StudioError::Busy(
                "a section replacement is already processing".into(),
            )),
            _ => Err(StudioError::InvalidState("nothing to confirm".into())),
        }
    }

    /// The generation collaborator accepted the request.
    pub fn job_submitted(&mut self, job: ReplacementJob) -> StudioResult<()> {
        match self.state {
            State::Editing { .. } => {
                info!(job = %job.id, range = ?job.range, "replacement job submitted");
                self.state = State::Processing { job };
                Ok(())
            }
            _ => Err(StudioError::InvalidState(
                "no confirmed edit awaiting submission".into(),
            )),
        }
    }

    /// The submission was rejected. Capacity errors abandon the edit and
    /// return to idle; anything else keeps the edit so a retry can be
    /// offered.
    pub fn submission_failed(&mut self, error: &StudioError) {
        if matches!(error, StudioError::Capacity(_)) {
            warn!(%error, "submission rejected for capacity, abandoning edit");
            self.state = State::Idle;
        }
    }

    /// Apply a job status update (from the realtime channel or a poll).
    ///
    /// Updates for a job this workflow is not waiting on are reported as
    /// `Ignored`: a late completion must not resurrect a discarded
    /// workflow. The caller is still expected to merge such results into
    /// the version ledger.
    pub fn on_job_update(
        &mut self,
        job_id: &str,
        status: JobStatus,
        variant_a_url: Option<String>,
        variant_b_url: Option<String>,
    ) -> JobUpdateOutcome {
        let matches_current = match &self.state {
            State::Processing { job } => job.id == job_id,
            _ => false,
        };
        if !matches_current {
            debug!(job = %job_id, "ignoring update for inactive job");
            return JobUpdateOutcome::Ignored;
        }

        let State::Processing { job } = &mut self.state else {
            return JobUpdateOutcome::Ignored;
        };
        job.status = status;
        job.variant_a_url = variant_a_url;
        job.variant_b_url = variant_b_url;

        match status {
            JobStatus::Completed if job.variant_a_url.is_some() => {
                let job = job.clone();
                info!(job = %job.id, "replacement ready to compare");
                self.state = State::Comparing {
                    job,
                    auditioning: Variant::A,
                };
                JobUpdateOutcome::ReadyToCompare
            }
            JobStatus::Completed => {
                warn!(job = %job_id, "job completed without a variant");
                self.state = State::Idle;
                JobUpdateOutcome::Failed("generation produced no audio".into())
            }
            JobStatus::Failed => {
                warn!(job = %job_id, "replacement job failed");
                self.state = State::Idle;
                JobUpdateOutcome::Failed("generation failed".into())
            }
            JobStatus::Submitted | JobStatus::Processing => JobUpdateOutcome::Ignored,
        }
    }

    /// Variants available for comparison.
    pub fn available_variants(&self) -> Vec<Variant> {
        match &self.state {
            State::Comparing { job, .. } => [Variant::A, Variant::B]
                .into_iter()
                .filter(|v| job.variant_url(*v).is_some())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Which variant is auditioning in the comparison.
    pub fn auditioning(&self) -> Option<Variant> {
        match &self.state {
            State::Comparing { auditioning, .. } => Some(*auditioning),
            _ => None,
        }
    }

    /// Switch the auditioning variant. Rejected when the variant was not
    /// produced, so callers disable the action instead of erroring.
    pub fn set_auditioning(&mut self, variant: Variant) -> StudioResult<()> {
        match &mut self.state {
            State::Comparing { job, auditioning } => {
                if job.variant_url(variant).is_none() {
                    return Err(StudioError::InvalidInput(format!(
                        "variant {variant:?} was not produced"
                    )));
                }
                *auditioning = variant;
                Ok(())
            }
            _ => Err(StudioError::InvalidState("no comparison in progress".into())),
        }
    }

    /// Commit the chosen variant. Terminal: the workflow returns to idle
    /// and hands the applied result to the caller for version creation.
    pub fn apply(&mut self, variant: Variant, save_mode: SaveMode) -> StudioResult<AppliedReplacement> {
        match &self.state {
            State::Comparing { job, .. } => {
                let url = job.variant_url(variant).ok_or_else(|| {
                    StudioError::InvalidInput(format!("variant {variant:?} was not produced"))
                })?;
                let applied = AppliedReplacement {
                    job_id: job.id.clone(),
                    range: job.range,
                    audio_url: url.to_string(),
                    save_mode,
                };
                info!(job = %applied.job_id, ?save_mode, "replacement applied");
                self.state = State::Idle;
                Ok(applied)
            }
            _ => Err(StudioError::InvalidState("no comparison in progress".into())),
        }
    }

    /// Reject both variants. Terminal: no version is created and the
    /// replaced-range history is not touched.
    pub fn discard(&mut self) -> StudioResult<()> {
        match self.state {
            State::Comparing { .. } => {
                info!("replacement discarded");
                self.state = State::Idle;
                Ok(())
            }
            _ => Err(StudioError::InvalidState("no comparison in progress".into())),
        }
    }

    /// Cancel out of any non-idle state back to idle. A job already in
    /// flight keeps running server-side; its completion is reconciled
    /// through the version ledger, not through this workflow.
    pub fn cancel(&mut self) {
        if !matches!(self.state, State::Idle) {
            debug!(stage = ?self.stage(), "workflow cancelled");
            self.state = State::Idle;
        }
    }
}
