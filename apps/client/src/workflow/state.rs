use std::fmt;

use bytes::Bytes;

use crate::api::ResumeFile;

/// The four remote operations the workflow drives. Each owns one phase flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Score,
    Rewrite,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::Score => "ATS score check",
            Operation::Rewrite => "rewrite",
            Operation::Download => "download",
        };
        f.write_str(name)
    }
}

/// In-progress markers, one per operation. The flags are independent:
/// several may be set at once, but each operation is single-flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseFlags {
    pub uploading: bool,
    pub scoring: bool,
    pub rewriting: bool,
    pub downloading: bool,
}

impl PhaseFlags {
    pub fn get(&self, op: Operation) -> bool {
        match op {
            Operation::Upload => self.uploading,
            Operation::Score => self.scoring,
            Operation::Rewrite => self.rewriting,
            Operation::Download => self.downloading,
        }
    }

    pub fn set(&mut self, op: Operation, in_flight: bool) {
        let slot = match op {
            Operation::Upload => &mut self.uploading,
            Operation::Score => &mut self.scoring,
            Operation::Rewrite => &mut self.rewriting,
            Operation::Download => &mut self.downloading,
        };
        *slot = in_flight;
    }

    pub fn any(&self) -> bool {
        self.uploading || self.scoring || self.rewriting || self.downloading
    }
}

/// The complete workflow state: user inputs, derived results and phase flags.
/// Owned exclusively by one `WorkflowEngine`; observers only ever see full
/// snapshots, never a half-applied transition.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub resume_file: Option<ResumeFile>,
    pub job_description: String,
    pub original_ats_score: Option<f64>,
    pub rewritten_resume: Option<String>,
    pub optimized_ats_score: Option<f64>,
    pub download_artifact: Option<Bytes>,
    pub phases: PhaseFlags,
}

impl WorkflowState {
    /// The inputs required by upload, score and rewrite: a resume file plus
    /// a non-empty job description. `None` means the command must fail
    /// validation before any network call.
    pub fn inputs(&self) -> Option<(ResumeFile, String)> {
        match &self.resume_file {
            Some(file) if !self.job_description.is_empty() => {
                Some((file.clone(), self.job_description.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let mut phases = PhaseFlags::default();
        assert!(!phases.any());

        phases.set(Operation::Score, true);
        phases.set(Operation::Rewrite, true);
        assert!(phases.get(Operation::Score));
        assert!(phases.get(Operation::Rewrite));
        assert!(!phases.get(Operation::Upload));
        assert!(phases.any());

        phases.set(Operation::Score, false);
        assert!(!phases.get(Operation::Score));
        assert!(phases.get(Operation::Rewrite));
    }

    #[test]
    fn test_inputs_require_file_and_jd() {
        let mut state = WorkflowState::default();
        assert!(state.inputs().is_none());

        state.job_description = "Senior backend engineer".to_string();
        assert!(state.inputs().is_none());

        state.resume_file = Some(ResumeFile {
            file_name: "resume.pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4 fake"),
        });
        let (file, jd) = state.inputs().expect("both inputs set");
        assert_eq!(file.file_name, "resume.pdf");
        assert_eq!(jd, "Senior backend engineer");

        state.job_description.clear();
        assert!(state.inputs().is_none());
    }
}
