//! The workflow engine: owns the mutable `WorkflowState` and every
//! transition. Commands validate locally, claim a phase flag, make exactly
//! one remote call, then apply the outcome in a single locked mutation, so
//! observers only ever see complete before/after snapshots.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{ApiError, ResumeFile, ResumeService};
use crate::errors::WorkflowError;
use crate::session::SessionStore;
use crate::workflow::state::{Operation, WorkflowState};

pub struct WorkflowEngine {
    service: Arc<dyn ResumeService>,
    session: Arc<SessionStore>,
    state: Mutex<WorkflowState>,
    snapshots: watch::Sender<WorkflowState>,
}

impl WorkflowEngine {
    pub fn new(service: Arc<dyn ResumeService>, session: Arc<SessionStore>) -> Self {
        let (snapshots, _) = watch::channel(WorkflowState::default());
        Self {
            service,
            session,
            state: Mutex::new(WorkflowState::default()),
            snapshots,
        }
    }

    /// Watch channel carrying a full state snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.lock().clone()
    }

    /// Replaces the selected resume file. Clears no other field.
    pub fn set_resume_file(&self, file: ResumeFile) {
        let mut state = self.lock();
        state.resume_file = Some(file);
        self.publish(&state);
    }

    /// Replaces the job description verbatim, including the empty string.
    pub fn set_job_description(&self, text: impl Into<String>) {
        let mut state = self.lock();
        state.job_description = text.into();
        self.publish(&state);
    }

    /// Registers the resume and job description with the backend. Success
    /// changes no derived field; the upload only primes the server side.
    pub async fn upload(&self) -> Result<(), WorkflowError> {
        let (file, jd) = self.begin(Operation::Upload)?;
        info!("uploading resume '{}' ({} bytes)", file.file_name, file.bytes.len());
        let result = self.service.upload_resume(&file, &jd).await;
        self.finish(Operation::Upload, result, |_, ()| ())
    }

    /// Fetches the ATS score of the uploaded resume against the current job
    /// description. Touches `original_ats_score` only.
    pub async fn check_ats_score(&self) -> Result<f64, WorkflowError> {
        let (_, jd) = self.begin(Operation::Score)?;
        let result = self.service.ats_score(&jd).await;
        self.finish(Operation::Score, result, |state, score| {
            state.original_ats_score = Some(score.ats_score);
            score.ats_score
        })
    }

    /// Requests the AI rewrite. The rewritten text and the optimized score
    /// land in the same locked mutation: observers never see one without
    /// the other.
    pub async fn rewrite(&self) -> Result<(), WorkflowError> {
        let (_, jd) = self.begin(Operation::Rewrite)?;
        let result = self.service.rewrite(&jd).await;
        self.finish(Operation::Rewrite, result, |state, rewrite| {
            state.rewritten_resume = Some(rewrite.rewritten_resume);
            if let Some(score) = rewrite.ats_score {
                state.optimized_ats_score = Some(score);
            }
        })
    }

    /// Downloads the optimized PDF. Requires a prior successful rewrite.
    /// Returns the blob so the presentation layer can perform the save.
    pub async fn download(&self) -> Result<Bytes, WorkflowError> {
        {
            let mut state = self.lock();
            if state.rewritten_resume.is_none() {
                return Err(WorkflowError::Precondition(
                    "rewrite the resume before downloading".to_string(),
                ));
            }
            if state.phases.get(Operation::Download) {
                return Err(WorkflowError::Busy(Operation::Download));
            }
            state.phases.set(Operation::Download, true);
            self.publish(&state);
        }
        let result = self.service.download_pdf().await;
        self.finish(Operation::Download, result, |state, blob: Bytes| {
            state.download_artifact = Some(blob.clone());
            blob
        })
    }

    /// Drops the credential and hard-resets the workflow state. Keeping
    /// another user's resume data visible after logout is a privacy bug.
    pub fn logout(&self) {
        self.session.clear_token();
        let mut state = self.lock();
        *state = WorkflowState::default();
        self.publish(&state);
        info!("session cleared");
    }

    /// Gate for the input-driven operations: local validation, then the
    /// single-flight check. Neither failure issues a network call.
    fn begin(&self, op: Operation) -> Result<(ResumeFile, String), WorkflowError> {
        let mut state = self.lock();
        let (file, jd) = state.inputs().ok_or_else(|| {
            WorkflowError::Validation(
                "upload a resume and enter a job description first".to_string(),
            )
        })?;
        if state.phases.get(op) {
            return Err(WorkflowError::Busy(op));
        }
        state.phases.set(op, true);
        self.publish(&state);
        Ok((file, jd))
    }

    /// Applies the outcome of a remote call in one locked mutation: the
    /// phase flag clears and, on success, `apply` runs against the same
    /// snapshot. An auth failure performs the logout reset instead, since a
    /// stale credential invalidates everything on screen.
    fn finish<T, R>(
        &self,
        op: Operation,
        result: Result<T, ApiError>,
        apply: impl FnOnce(&mut WorkflowState, T) -> R,
    ) -> Result<R, WorkflowError> {
        let mut state = self.lock();
        match result {
            Ok(value) => {
                state.phases.set(op, false);
                let out = apply(&mut state, value);
                self.publish(&state);
                Ok(out)
            }
            Err(ApiError::Auth) => {
                warn!("{op} rejected: credential expired, resetting session");
                self.session.clear_token();
                *state = WorkflowState::default();
                self.publish(&state);
                Err(WorkflowError::Auth)
            }
            Err(err) => {
                warn!("{op} failed: {err}");
                state.phases.set(op, false);
                self.publish(&state);
                Err(err.into())
            }
        }
    }

    fn publish(&self, state: &WorkflowState) {
        self.snapshots.send_replace(state.clone());
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().expect("workflow state lock poisoned")
    }
}
