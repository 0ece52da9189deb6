//! DialogEngine – advances one session by one chat turn.
//!
//! Each turn loads (or creates) the caller's session, locks it for the
//! duration of the turn and applies the first matching rule:
//!
//! 1. `help` / `?` answers with the help text in any state.
//! 2. `reset` / `restart` replaces the session and asks the first question.
//! 3. While a job runs, everything else gets the wait notice.
//! 4. While fields are missing, the message answers the current question.
//! 5. `run` starts the analysis once every answer is in.
//! 6. `status` reports progress or the captured result.
//! 7. `explain...` points at the first report.
//! 8. Anything else gets a nudge towards `help`.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::command::Command;
use crate::error::Result;
use crate::runner::{JobRequest, JobRunner};
use crate::schema::{DialogSchema, FieldSpec};
use crate::session::{DialogState, Session, SessionHandle};
use crate::storage::SessionStore;
use crate::validator::validate;

pub const HELP_TEXT: &str = "<b>SPoC Chatbot Help</b><br>\
<ul>\
<li>Type your inputs step by step as prompted.</li>\
<li><b>run</b>: Start the SPoC analysis after all inputs are collected.</li>\
<li><b>status</b>: Check the progress or result of the analysis.</li>\
<li><b>explain</b>: Get a link to the generated report and summary.</li>\
<li><b>reset</b>: Restart the session and clear all inputs.</li>\
<li><b>help</b>: Show this help message.</li>\
</ul>";
pub const RUNNING_NOTICE: &str = "Analysis is running. Please wait...";
pub const STILL_RUNNING: &str = "Analysis is still running...";
pub const RUN_STARTED: &str =
    "SPoC analysis started. Please wait and type 'status' to check progress.";
pub const NO_RUN_YET: &str = "No analysis has been run yet.";
pub const NOTHING_TO_EXPLAIN: &str = "No report available to explain.";
pub const DEFAULT_REPLY: &str = "Type 'help' for instructions or continue with your input.";

/// Reply to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnResult {
    pub response: String,
    pub state: DialogState,
}

#[derive(Clone)]
pub struct DialogEngine {
    schema: DialogSchema,
    store: Arc<dyn SessionStore>,
    runner: JobRunner,
}

impl DialogEngine {
    pub fn new(schema: DialogSchema, store: Arc<dyn SessionStore>, runner: JobRunner) -> Self {
        Self {
            schema,
            store,
            runner,
        }
    }

    pub fn schema(&self) -> &DialogSchema {
        &self.schema
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Applies one incoming message to the session identified by `session_id`.
    pub async fn handle(&self, session_id: &str, message: &str) -> Result<TurnResult> {
        let message = message.trim();
        let command = Command::parse(message);

        if command == Command::Reset {
            self.store.reset(session_id).await?;
            info!(session_id = %session_id, "Session reset");
            return Ok(TurnResult {
                response: self.schema.first_prompt().to_string(),
                state: DialogState::Collecting { step: 0 },
            });
        }

        let handle = self.store.get_or_create(session_id).await?;
        let mut session = handle.lock().await;
        session.touch();

        let response = self.advance(&mut session, &handle, command, message);
        let state = session.state(self.schema.len());
        debug!(session_id = %session_id, ?command, ?state, "Turn handled");

        Ok(TurnResult { response, state })
    }

    fn advance(
        &self,
        session: &mut Session,
        handle: &SessionHandle,
        command: Command,
        message: &str,
    ) -> String {
        if command == Command::Help {
            return HELP_TEXT.to_string();
        }
        if session.running {
            return RUNNING_NOTICE.to_string();
        }
        if let Some(field) = self.schema.field(session.step) {
            return self.collect(session, field, message);
        }

        match command {
            Command::Run if session.result.is_none() => self.start_run(session, handle),
            Command::Status => render_status(session),
            Command::Explain => render_explain(session),
            _ => DEFAULT_REPLY.to_string(),
        }
    }

    fn collect(&self, session: &mut Session, field: &FieldSpec, message: &str) -> String {
        match validate(message, field.field_type) {
            Ok(value) => {
                info!(session_id = %session.id, field = %field.key, step = session.step, "Input accepted");
                session.record_answer(&field.key, value);
                match self.schema.field(session.step) {
                    Some(next) => next.prompt.clone(),
                    None => render_summary(session),
                }
            }
            Err(err) => {
                debug!(session_id = %session.id, field = %field.key, error = %err, "Input rejected");
                format!("❌ {err} {}", field.prompt)
            }
        }
    }

    fn start_run(&self, session: &mut Session, handle: &SessionHandle) -> String {
        let request = match JobRequest::from_inputs(&session.inputs) {
            Ok(request) => request,
            Err(err) => {
                error!(session_id = %session.id, error = %err, "Cannot build analysis request");
                return format!("❌ {err}");
            }
        };

        session.start_job();
        info!(session_id = %session.id, "Launching analysis");
        self.runner.launch(request, handle.clone());
        RUN_STARTED.to_string()
    }
}

fn render_summary(session: &Session) -> String {
    let lines: Vec<String> = session
        .inputs
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    format!(
        "All inputs collected:<br>{}<br><b>Type 'run' to start analysis.</b>",
        lines.join("<br>")
    )
}

fn render_status(session: &Session) -> String {
    if session.running {
        return STILL_RUNNING.to_string();
    }
    match &session.result {
        Some(result) => {
            let links: Vec<String> = session.reports.iter().map(|r| report_link(r)).collect();
            format!(
                "Analysis complete!\n{result}\nReports:\n{}",
                links.join("\n")
            )
        }
        None => NO_RUN_YET.to_string(),
    }
}

fn render_explain(session: &Session) -> String {
    match session.reports.first() {
        Some(report) => format!(
            "Open the report: {} and review the summary table and plots.",
            report_link(report)
        ),
        None => NOTHING_TO_EXPLAIN.to_string(),
    }
}

/// HTML anchor pointing at a report on the local filesystem.
pub fn report_link(path: &Path) -> String {
    let display = path.display().to_string();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());
    format!(
        "<a href='file:///{}' target='_blank'>{name}</a>",
        display.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ExecutionOutput, JobExecutor};
    use crate::storage::InMemorySessionStore;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    const CALLER: &str = "192.168.1.20";

    /// Holds every job open until the gate is opened, then writes the
    /// configured reports into the output directory.
    struct GatedExecutor {
        gate: Arc<Notify>,
        output: ExecutionOutput,
        reports: Vec<&'static str>,
    }

    #[async_trait]
    impl JobExecutor for GatedExecutor {
        async fn execute(&self, request: &JobRequest) -> ExecutionOutput {
            self.gate.notified().await;
            for name in &self.reports {
                std::fs::write(request.output_path.join(name), "<html/>").unwrap();
            }
            self.output.clone()
        }
    }

    struct Fixture {
        dir: TempDir,
        engine: DialogEngine,
        gate: Arc<Notify>,
    }

    impl Fixture {
        fn new(success: bool, output: &str, reports: Vec<&'static str>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("meas")).unwrap();
            std::fs::create_dir(dir.path().join("out")).unwrap();
            std::fs::write(dir.path().join("signals.csv"), "signal\n").unwrap();

            let gate = Arc::new(Notify::new());
            let executor = GatedExecutor {
                gate: gate.clone(),
                output: ExecutionOutput {
                    success,
                    output: output.to_string(),
                },
                reports,
            };
            let engine = DialogEngine::new(
                DialogSchema::spoc_default(),
                Arc::new(InMemorySessionStore::new()),
                JobRunner::new(Arc::new(executor)),
            );
            Self { dir, engine, gate }
        }

        fn answers(&self) -> Vec<String> {
            let root = self.dir.path();
            vec![
                root.join("meas").display().to_string(),
                root.join("out").display().to_string(),
                "ESP10CU".to_string(),
                "Bench validation".to_string(),
                root.join("signals.csv").display().to_string(),
                "1".to_string(),
                "0".to_string(),
            ]
        }

        async fn send(&self, message: &str) -> TurnResult {
            self.engine.handle(CALLER, message).await.unwrap()
        }

        async fn fill_all(&self) -> TurnResult {
            let mut last = None;
            for answer in self.answers() {
                last = Some(self.send(&answer).await);
            }
            last.unwrap()
        }

        async fn session(&self) -> Session {
            let handle = self.engine.store().get(CALLER).await.unwrap().unwrap();
            handle.lock().await.clone()
        }

        async fn wait_for_job(&self) {
            for _ in 0..200 {
                if !self.session().await.running {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("job did not finish");
        }
    }

    #[tokio::test]
    async fn first_contact_creates_session_and_validates_answer() {
        let fx = Fixture::new(true, "", vec![]);
        let reply = fx.send("/definitely/not/here/at/all").await;
        assert_eq!(
            reply.response,
            "❌ Path does not exist. Enter input measurement folder path:"
        );
        assert_eq!(reply.state, DialogState::Collecting { step: 0 });
        assert_eq!(fx.session().await.step, 0);
    }

    #[tokio::test]
    async fn answers_advance_one_prompt_at_a_time() {
        let fx = Fixture::new(true, "", vec![]);
        let schema = DialogSchema::spoc_default();
        let answers = fx.answers();

        for (i, answer) in answers.iter().enumerate().take(6) {
            let reply = fx.send(answer).await;
            assert_eq!(reply.response, schema.field(i + 1).unwrap().prompt);
            let session = fx.session().await;
            assert_eq!(session.step, i + 1);
            assert_eq!(session.inputs.len(), session.step);
        }

        let reply = fx.send(&answers[6]).await;
        assert_eq!(reply.state, DialogState::ReadyToRun);
        assert!(reply.response.starts_with("All inputs collected:<br>"));
        assert!(reply.response.contains("system: ESP10CU"));
        assert!(reply.response.contains("motor_parameter_evaluation: 1"));
        assert!(reply.response.contains("p_model_vs_sim_comparision: 0"));
        assert!(reply.response.contains("Type 'run' to start analysis."));
    }

    #[tokio::test]
    async fn invalid_boolean_keeps_last_field_open() {
        let fx = Fixture::new(true, "", vec![]);
        for answer in fx.answers().iter().take(6) {
            fx.send(answer).await;
        }

        let reply = fx.send("maybe").await;
        assert_eq!(
            reply.response,
            "❌ Enter 1 or 0. Enable P Model vs Sim Comparison? (1=Yes, 0=No):"
        );
        assert_eq!(reply.state, DialogState::Collecting { step: 6 });
        assert_eq!(fx.session().await.step, 6);
    }

    #[tokio::test]
    async fn commands_during_collection_are_answers() {
        let fx = Fixture::new(true, "", vec![]);
        let answers = fx.answers();
        fx.send(&answers[0]).await;
        fx.send(&answers[1]).await;

        // The system name is free text, so "status" is taken literally.
        let reply = fx.send("status").await;
        assert_eq!(reply.response, "Enter project description:");
        let session = fx.session().await;
        assert_eq!(
            session.inputs.get("system").map(ToString::to_string),
            Some("status".to_string())
        );
    }

    #[tokio::test]
    async fn help_works_in_every_state_without_side_effects() {
        let fx = Fixture::new(true, "", vec![]);
        let reply = fx.send("?").await;
        assert_eq!(reply.response, HELP_TEXT);
        assert_eq!(reply.state, DialogState::Collecting { step: 0 });

        fx.fill_all().await;
        fx.send("run").await;
        let reply = fx.send("HELP").await;
        assert_eq!(reply.response, HELP_TEXT);
        assert_eq!(reply.state, DialogState::Running);
        fx.gate.notify_one();
    }

    #[tokio::test]
    async fn reset_returns_to_first_prompt_from_any_state() {
        let fx = Fixture::new(true, "", vec![]);
        let first = DialogSchema::spoc_default().first_prompt().to_string();

        fx.send(&fx.answers()[0]).await;
        let reply = fx.send("RESET").await;
        assert_eq!(reply.response, first);
        let session = fx.session().await;
        assert_eq!(session.step, 0);
        assert!(session.inputs.is_empty());

        fx.fill_all().await;
        let reply = fx.send("restart").await;
        assert_eq!(reply.response, first);
        assert!(fx.session().await.inputs.is_empty());
    }

    #[tokio::test]
    async fn status_before_run() {
        let fx = Fixture::new(true, "", vec![]);
        fx.fill_all().await;
        assert_eq!(fx.send("status").await.response, NO_RUN_YET);
        assert_eq!(fx.send("explain").await.response, NOTHING_TO_EXPLAIN);
    }

    #[tokio::test]
    async fn run_is_accepted_once_while_running() {
        let fx = Fixture::new(true, "all good", vec!["summary.html"]);
        fx.fill_all().await;

        let reply = fx.send("run").await;
        assert_eq!(reply.response, RUN_STARTED);
        assert_eq!(reply.state, DialogState::Running);
        assert!(fx.session().await.running);

        let before = fx.session().await;
        for message in ["run", "status", "explain", "0", "anything"] {
            let reply = fx.send(message).await;
            assert_eq!(reply.response, RUNNING_NOTICE);
            assert_eq!(reply.state, DialogState::Running);
        }
        let after = fx.session().await;
        assert_eq!(after.step, before.step);
        assert_eq!(after.inputs, before.inputs);
        assert!(after.result.is_none());

        fx.gate.notify_one();
        fx.wait_for_job().await;

        let reply = fx.send("status").await;
        let report = fx.dir.path().join("out").join("summary.html");
        assert_eq!(
            reply.response,
            format!(
                "Analysis complete!\nall good\nReports:\n{}",
                report_link(&report)
            )
        );
        assert_eq!(reply.state, DialogState::Completed);
    }

    #[tokio::test]
    async fn failed_job_shows_error_text() {
        let fx = Fixture::new(false, "Traceback: bad signal list", vec![]);
        fx.fill_all().await;
        fx.send("run").await;
        fx.gate.notify_one();
        fx.wait_for_job().await;

        let reply = fx.send("status").await;
        assert_eq!(
            reply.response,
            "Analysis complete!\nTraceback: bad signal list\nReports:\n"
        );
        assert_eq!(fx.send("explain please").await.response, NOTHING_TO_EXPLAIN);
    }

    #[tokio::test]
    async fn explain_points_at_first_report() {
        let fx = Fixture::new(true, "ok", vec!["summary.html"]);
        fx.fill_all().await;
        fx.send("run").await;
        fx.gate.notify_one();
        fx.wait_for_job().await;

        let reply = fx.send("Explain the results").await;
        let report = fx.dir.path().join("out").join("summary.html");
        assert_eq!(
            reply.response,
            format!(
                "Open the report: {} and review the summary table and plots.",
                report_link(&report)
            )
        );
    }

    #[tokio::test]
    async fn run_after_completion_falls_through() {
        let fx = Fixture::new(true, "ok", vec![]);
        fx.fill_all().await;
        fx.send("run").await;
        fx.gate.notify_one();
        fx.wait_for_job().await;

        let reply = fx.send("run").await;
        assert_eq!(reply.response, DEFAULT_REPLY);
        assert_eq!(reply.state, DialogState::Completed);
    }

    #[tokio::test]
    async fn reset_during_run_discards_stale_result() {
        let fx = Fixture::new(true, "stale", vec![]);
        fx.fill_all().await;
        fx.send("run").await;
        let old = fx.engine.store().get(CALLER).await.unwrap().unwrap();

        let reply = fx.send("reset").await;
        assert_eq!(reply.response, fx.engine.schema().first_prompt());
        assert_eq!(reply.state, DialogState::Collecting { step: 0 });
        fx.gate.notify_one();
        for _ in 0..200 {
            if !old.lock().await.running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(old.lock().await.result.as_deref(), Some("stale"));
        let current = fx.session().await;
        assert!(current.result.is_none());
        assert!(!current.running);
        assert_eq!(current.step, 0);
    }

    #[tokio::test]
    async fn reset_after_completion_starts_over() {
        let fx = Fixture::new(true, "ok", vec!["summary.html"]);
        fx.fill_all().await;
        fx.send("run").await;
        fx.gate.notify_one();
        fx.wait_for_job().await;
        assert_eq!(fx.send("status").await.state, DialogState::Completed);

        let reply = fx.send("reset").await;
        assert_eq!(reply.response, fx.engine.schema().first_prompt());
        let session = fx.session().await;
        assert_eq!(session.step, 0);
        assert!(session.inputs.is_empty());
        assert!(session.result.is_none());
        assert!(session.reports.is_empty());
    }

    #[tokio::test]
    async fn default_reply_when_nothing_matches() {
        let fx = Fixture::new(true, "", vec![]);
        fx.fill_all().await;
        assert_eq!(fx.send("hello there").await.response, DEFAULT_REPLY);
    }

    #[test]
    fn report_link_uses_file_url_and_name() {
        let link = report_link(&PathBuf::from("/srv/out/summary.html"));
        assert_eq!(
            link,
            "<a href='file:///srv/out/summary.html' target='_blank'>summary.html</a>"
        );
    }
}
