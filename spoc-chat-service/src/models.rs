use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spoc_flow::{DialogState, Inputs, Session};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub dialog: DialogState,
    pub step: usize,
    pub inputs: Inputs,
    pub running: bool,
    pub result: Option<String>,
    pub reports: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(session: &Session, field_count: usize) -> Self {
        Self {
            session_id: session.id.clone(),
            dialog: session.state(field_count),
            step: session.step,
            inputs: session.inputs.clone(),
            running: session.running,
            result: session.result.clone(),
            reports: session.reports.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}
