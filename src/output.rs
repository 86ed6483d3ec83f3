//! Shared output formatting for mergeplay commands.

use serde::Serialize;

use crate::error::Result;
use crate::lane::LaneStatus;
use crate::scenario::ScenarioReport;

pub const SCHEMA_VERSION: &str = "mergeplay.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    emit_with_status(options, command, "success", data, human)
}

/// Emit a report whose run did not succeed. JSON consumers get the full data
/// under a `failed` status; humans get the report even with `--quiet`.
pub fn emit_partial<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    emit_with_status(options, command, "failed", data, human)
}

fn emit_with_status<T: Serialize>(
    options: OutputOptions,
    command: &str,
    status: &'static str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status,
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet && status == "success" {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    let hint = next_steps.first().map(|step| step.as_str());
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Human rendering of a finished scenario.
pub fn scenario_human(report: &ScenarioReport) -> HumanOutput {
    let header = if report.is_success() {
        "mergeplay run: all lanes done"
    } else {
        "mergeplay run: scenario did not complete"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("play dir", report.play_dir.display().to_string());
    human.push_summary("remote", report.remote.display().to_string());
    human.push_summary("strategy", report.strategy.to_string());
    human.push_summary("aggregation", report.aggregation.to_string());
    let done = report.tasks().filter(|task| task.is_done()).count();
    human.push_summary("tasks done", done.to_string());
    human.push_summary("tasks failed", report.failures().len().to_string());
    human.push_summary("view refreshes", report.refreshes.to_string());

    for lane in &report.lanes {
        let lane_status = match lane.status {
            LaneStatus::Done => "done",
            LaneStatus::Failed => "failed",
            LaneStatus::Aborted => "aborted",
        };
        for task in &lane.tasks {
            let mut line = format!(
                "lane {} ({}): {} {} [{} / {} commits]",
                lane.index,
                lane.kind,
                task.label(),
                task.state,
                task.commits_pushed,
                task.commits_planned
            );
            if let Some(failure) = &task.failure {
                line.push_str(&format!(" at {}", failure.state));
            }
            human.push_detail(line);
        }
        for pending in &lane.incomplete {
            human.push_detail(format!(
                "lane {} ({}): {}/{} not finished (lane {})",
                lane.index, lane.kind, pending.actor, pending.feature, lane_status
            ));
        }
    }

    for (branch, log) in &report.remote_summary.history {
        for commit in log {
            let short = &commit.id[..8.min(commit.id.len())];
            let merged = commit
                .merged_commits
                .as_ref()
                .map(|merged| format!(" (+{} commits)", merged.len()))
                .unwrap_or_default();
            human.push_detail(format!("{branch}: {short} {}{merged}", commit.summary));
        }
    }

    for branch in &report.remote_summary.open_feature_branches {
        human.push_warning(format!("feature branch still open on remote: {branch}"));
    }
    for task in report.failures() {
        if let Some(failure) = &task.failure {
            human.push_warning(format!("{}: {}", task.label(), failure.message));
        }
    }
    human.push_next_step(format!("git -C {} log --graph --oneline --all", report.view.display()));
    human
}

pub fn infer_command_name_from_args() -> String {
    std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with('-'))
        .unwrap_or_else(|| "mergeplay".to_string())
}

fn error_kind(err: &crate::error::Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::Error;

    match err {
        Error::TargetExists(_) => vec!["choose a fresh --play-dir or --repo-name".to_string()],
        Error::InvalidFeatureName(_) => {
            vec!["rename the feature without whitespace".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix mergeplay.toml then retry".to_string()],
        Error::ScenarioFailed { .. } => {
            vec!["rerun with --strategy rebase, or inspect the play dir".to_string()]
        }
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
