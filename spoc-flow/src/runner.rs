//! Background execution of the external analysis program.
//!
//! [`JobRunner::launch`] is fire-and-forget: it spawns a task that runs the
//! program through a [`JobExecutor`], scans the output directory for HTML
//! reports and writes the outcome onto the session handle captured at
//! launch. A session replaced by `reset` in the meantime never sees it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::error::{FlowError, Result};
use crate::inputs::{FieldValue, Inputs};
use crate::schema::field_keys;
use crate::session::SessionHandle;

/// The seven values the analysis program takes, in argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub input_meas_path: String,
    pub output_path: PathBuf,
    pub system: String,
    pub project_description: String,
    pub signal_list_path: String,
    pub motor_parameter_evaluation: bool,
    pub p_model_vs_sim_comparison: bool,
}

impl JobRequest {
    pub fn from_inputs(inputs: &Inputs) -> Result<Self> {
        Ok(Self {
            input_meas_path: required(inputs, field_keys::INPUT_MEAS_PATH)?.as_arg(),
            output_path: PathBuf::from(required(inputs, field_keys::OUTPUT_PATH)?.as_arg()),
            system: required(inputs, field_keys::SYSTEM)?.as_arg(),
            project_description: required(inputs, field_keys::PROJECT_DESCRIPTION)?.as_arg(),
            signal_list_path: required(inputs, field_keys::SIGNAL_LIST_PATH)?.as_arg(),
            motor_parameter_evaluation: flag(inputs, field_keys::MOTOR_PARAMETER_EVALUATION)?,
            p_model_vs_sim_comparison: flag(inputs, field_keys::P_MODEL_VS_SIM_COMPARISON)?,
        })
    }

    /// Positional arguments handed to the analysis script.
    pub fn args(&self) -> Vec<String> {
        vec![
            self.input_meas_path.clone(),
            self.output_path.display().to_string(),
            self.system.clone(),
            self.project_description.clone(),
            self.signal_list_path.clone(),
            u8::from(self.motor_parameter_evaluation).to_string(),
            u8::from(self.p_model_vs_sim_comparison).to_string(),
        ]
    }
}

fn required<'a>(inputs: &'a Inputs, key: &str) -> Result<&'a FieldValue> {
    inputs
        .get(key)
        .ok_or_else(|| FlowError::MissingInput(key.to_string()))
}

fn flag(inputs: &Inputs, key: &str) -> Result<bool> {
    match required(inputs, key)? {
        FieldValue::Boolean(value) => Ok(*value),
        _ => Err(FlowError::MissingInput(key.to_string())),
    }
}

/// What the program itself produced: stdout on success, stderr otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub success: bool,
    pub output: String,
}

/// Final job result written back onto the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub output: String,
    pub reports: Vec<PathBuf>,
}

/// Runs one analysis to completion. Failures are reported in the output,
/// never as an error.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, request: &JobRequest) -> ExecutionOutput;
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub interpreter: String,
    pub script: PathBuf,
    pub working_dir: Option<PathBuf>,
    /// `None` lets a job run for as long as it takes.
    pub timeout: Option<Duration>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interpreter: "python".to_string(),
            script: PathBuf::from("spoc_main_UI_function.py"),
            working_dir: None,
            timeout: Some(Duration::from_secs(3600)),
        }
    }
}

/// Launches `<interpreter> <script> <args...>` as a child process.
pub struct ProcessExecutor {
    config: JobConfig,
}

impl ProcessExecutor {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl JobExecutor for ProcessExecutor {
    async fn execute(&self, request: &JobRequest) -> ExecutionOutput {
        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(&self.config.script)
            .args(request.args())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        info!(
            interpreter = %self.config.interpreter,
            script = %self.config.script.display(),
            "Starting analysis process"
        );

        let output = command.output();
        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "Analysis process timed out");
                    return ExecutionOutput {
                        success: false,
                        output: format!("Analysis timed out after {} seconds", limit.as_secs()),
                    };
                }
            },
            None => output.await,
        };

        match result {
            Ok(output) if output.status.success() => ExecutionOutput {
                success: true,
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
            },
            Ok(output) => {
                warn!(exit_code = ?output.status.code(), "Analysis process failed");
                ExecutionOutput {
                    success: false,
                    output: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to start analysis process");
                ExecutionOutput {
                    success: false,
                    output: format!("Failed to start analysis: {err}"),
                }
            }
        }
    }
}

/// Lists `*.html` entries directly inside `dir`, in directory order.
/// A missing or unreadable directory yields no reports.
pub async fn scan_reports(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "Output directory not readable");
            return Vec::new();
        }
    };

    let mut reports = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().ends_with(".html") {
            reports.push(entry.path());
        }
    }
    reports
}

#[derive(Clone)]
pub struct JobRunner {
    executor: Arc<dyn JobExecutor>,
}

impl JobRunner {
    pub fn new(executor: Arc<dyn JobExecutor>) -> Self {
        Self { executor }
    }

    pub fn with_process(config: JobConfig) -> Self {
        Self::new(Arc::new(ProcessExecutor::new(config)))
    }

    /// Executes the job and collects its reports, waiting for completion.
    pub async fn run(&self, request: &JobRequest) -> JobOutcome {
        let ExecutionOutput { success, output } = self.executor.execute(request).await;
        let reports = scan_reports(&request.output_path).await;
        JobOutcome {
            success,
            output,
            reports,
        }
    }

    /// Spawns the job and returns immediately; the outcome lands on `session`.
    pub fn launch(&self, request: JobRequest, session: SessionHandle) -> JoinHandle<()> {
        let runner = self.clone();
        let span = tracing::info_span!("analysis_job", output_path = %request.output_path.display());

        tokio::spawn(
            async move {
                let outcome = runner.run(&request).await;
                info!(
                    success = outcome.success,
                    reports = outcome.reports.len(),
                    "Analysis finished"
                );
                session.lock().await.complete_job(outcome);
            }
            .instrument(span),
        )
    }
}
