use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::error::{CmError, ErrorCode, Result, StructuredError};
use crate::gates::{GateResult, GateStatus};
use crate::pipeline::{RunReport, RunStatus};

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    #[serde(rename = "error")]
    StructuredError {
        code: ErrorCode,
        numeric_code: u16,
        message: String,
        suggestion: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
        recoverable: bool,
        category: String,
    },
}

impl From<StructuredError> for RobotStatus {
    fn from(err: StructuredError) -> Self {
        Self::StructuredError {
            code: err.code,
            numeric_code: err.numeric_code,
            message: err.message,
            suggestion: err.suggestion,
            context: err.context,
            recoverable: err.recoverable,
            category: err.category,
        }
    }
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

impl<T> RobotResponse<T> {
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// One line per rule that failed without blocking, as `stage/rule: message`.
#[must_use]
pub fn gate_warnings(gates: &[GateResult]) -> Vec<String> {
    gates
        .iter()
        .flat_map(|gate| {
            gate.findings
                .iter()
                .filter(|f| f.outcome() == GateStatus::Warn)
                .map(move |f| format!("{}/{}: {}", gate.stage, f.rule, f.message))
        })
        .collect()
}

/// Create a robot error response from a `CmError`, keeping its code,
/// suggestion and context.
pub fn robot_error(err: &CmError) -> RobotResponse<serde_json::Value> {
    RobotResponse {
        status: err.to_structured().into(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
        warnings: Vec::new(),
    }
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>) -> Result<()> {
    emit_json(response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| CmError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 16,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(String::new());
        self.lines.push(text.bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(format!(
            "{} {value}",
            format!("{key:width$}", width = self.key_width).dimmed()
        ));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

#[must_use]
pub fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".green().to_string(),
        RunStatus::Running => "running".cyan().to_string(),
        RunStatus::Halted { stage } => format!("halted at {stage}").yellow().bold().to_string(),
        RunStatus::Failed { stage, .. } => format!("failed at {stage}").red().bold().to_string(),
    }
}

#[must_use]
pub fn gate_label(status: GateStatus) -> String {
    match status {
        GateStatus::Pass => "PASS".green().to_string(),
        GateStatus::Warn => "WARN".yellow().to_string(),
        GateStatus::Block => "BLOCK".red().bold().to_string(),
    }
}

/// Gate verdict plus every rule that did not pass.
pub fn push_gate(layout: &mut HumanLayout, gate: &GateResult) {
    layout.kv(gate.stage.as_str(), &gate_label(gate.status));
    for finding in gate.findings.iter().filter(|f| !f.passed) {
        layout.bullet(&format!(
            "{} [{}] {}",
            finding.rule, finding.severity, finding.message
        ));
    }
}

#[must_use]
pub fn report_layout(report: &RunReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    let title = report
        .job
        .as_ref()
        .map_or_else(|| report.run_id.clone(), |job| job.title.clone());
    layout.title(&title);
    layout
        .kv("run", &report.run_id)
        .kv("status", &status_label(&report.status));
    if let RunStatus::Failed { message, .. } = &report.status {
        layout.kv("error", message);
    }

    if let Some(selection) = &report.selection {
        layout
            .kv("selected", &selection.selected.len().to_string())
            .kv("coverage", &format!("{:.0}%", selection.coverage * 100.0))
            .kv("target met", &selection.target_met.to_string());
        if !selection.gaps.is_empty() {
            layout.kv("gaps", &selection.gaps.join(", "));
        }
    }

    if let Some(ranked) = &report.ranked {
        layout.section("Ranked competencies");
        for entry in &ranked.entries {
            let marker = report
                .selection
                .as_ref()
                .is_some_and(|s| s.selected.contains(&entry.competency_id));
            let line = format!(
                "{:>2}. {} ({:.2}) covers {}",
                entry.rank,
                entry.name,
                entry.score.weighted_total,
                entry.covers.join(", ")
            );
            if marker {
                layout.push_line(line.bold().to_string());
            } else {
                layout.push_line(line.dimmed().to_string());
            }
        }
    }

    if !report.gates.is_empty() {
        layout.section("Gates");
        for gate in &report.gates {
            push_gate(&mut layout, gate);
        }
    }

    if !report.skipped.is_empty() {
        layout.section("Skipped");
        for skipped in &report.skipped {
            layout.kv(skipped.stage.as_str(), &skipped.reason);
        }
    }
    layout
}
