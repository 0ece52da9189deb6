use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::inputs::{FieldValue, Inputs};
use crate::runner::JobOutcome;

/// Shared handle to one session record.
///
/// The dialog engine and a background job both write through the same
/// handle; the mutex keeps `{running, result, reports}` from being read
/// half-written.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Where a session is in the conversation, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogState {
    Collecting { step: usize },
    ReadyToRun,
    Running,
    Completed,
}

/// Per-caller conversational and job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub step: usize,
    pub inputs: Inputs,
    pub running: bool,
    pub result: Option<String>,
    pub reports: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            step: 0,
            inputs: Inputs::new(),
            running: false,
            result: None,
            reports: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self, field_count: usize) -> DialogState {
        if self.running {
            DialogState::Running
        } else if self.step < field_count {
            DialogState::Collecting { step: self.step }
        } else if self.result.is_some() {
            DialogState::Completed
        } else {
            DialogState::ReadyToRun
        }
    }

    /// Stores the answer for the current step and moves to the next one.
    pub fn record_answer(&mut self, key: &str, value: FieldValue) {
        self.inputs.insert(key, value);
        self.step += 1;
        self.touch();
    }

    pub fn start_job(&mut self) {
        self.running = true;
        self.result = None;
        self.reports.clear();
        self.touch();
    }

    pub fn complete_job(&mut self, outcome: JobOutcome) {
        self.running = false;
        self.result = Some(outcome.output);
        self.reports = outcome.reports;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
