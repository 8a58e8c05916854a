//! Core data models for the research workflow

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::trace::TraceRecord;
use crate::{Result, WorkflowError};

//
// ================= Enums =================
//

/// Declared kind of work for a planned task.
///
/// `Unknown` is the explicit catch-all for unrecognized generator output;
/// the router sends it to data collection rather than failing the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[serde(alias = "data_collection")]
    Collection,
    Analysis,
    RiskAssessment,
    Synthesis,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[serde(alias = "High")]
    High,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Low")]
    Low,
    #[serde(other)]
    Unspecified,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    /// Sort rank: high < medium < low < anything unrecognized.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::Unspecified => 3,
        }
    }
}

//
// ================= Task Spec =================
//

/// A single planned unit of work. Immutable once planned.
///
/// Field aliases accept the older descriptor spelling some generation
/// models still emit (`task_id`, `required_data`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSpec {
    #[serde(alias = "task_id")]
    pub id: String,
    #[serde(alias = "type")]
    pub task_type: TaskType,
    pub description: String,
    #[serde(default, alias = "required_data")]
    pub required_inputs: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
}

//
// ================= Result Store =================
//

/// Append-only map of task id → produced result for one workflow run.
///
/// A task id may be written at most once; a second write is an error,
/// never a silent overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultStore {
    entries: BTreeMap<String, Value>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task_id: &str, value: Value) -> Result<()> {
        if self.entries.contains_key(task_id) {
            return Err(WorkflowError::DuplicateResult(task_id.to_string()));
        }
        self.entries.insert(task_id.to_string(), value);
        Ok(())
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<&Value> {
        self.entries.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

//
// ================= Workflow State =================
//

/// Mutable state of one directive run. Owned exclusively by the driver
/// for the lifetime of the run and discarded afterwards; long-lived facts
/// go to the memory store collaborator, not here.
#[derive(Debug)]
pub struct WorkflowState {
    pub directive: String,
    pub tasks: Vec<TaskSpec>,
    pub results: ResultStore,
    pub current_task: Option<TaskSpec>,
    pub trace: Vec<TraceRecord>,
    pub deadlocked: bool,
}

impl WorkflowState {
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
            tasks: Vec::new(),
            results: ResultStore::new(),
            current_task: None,
            trace: Vec::new(),
            deadlocked: false,
        }
    }

    /// Derived view: result of the first completed risk-assessment task.
    pub fn risk_assessment(&self) -> Option<&Value> {
        self.tasks
            .iter()
            .filter(|t| t.task_type == TaskType::RiskAssessment)
            .find_map(|t| self.results.get(&t.id))
    }

    /// Derived view: report text from the first completed synthesis task.
    ///
    /// Error payloads do not count as a report.
    pub fn final_report(&self) -> Option<String> {
        self.tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Synthesis)
            .find_map(|t| self.results.get(&t.id))
            .and_then(report_text)
    }
}

fn report_text(value: &Value) -> Option<String> {
    if value.get("error").is_some() {
        return None;
    }
    value
        .get("report")
        .and_then(Value::as_str)
        .or_else(|| value.as_str())
        .map(|s| s.to_string())
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// A final report was produced.
    Completed,
    /// The run terminated without a report (e.g. no synthesis task planned).
    Partial,
    /// Incomplete tasks remained but none could make progress.
    Deadlocked,
}

/// Everything a caller gets back from one directive run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub directive: String,
    pub outcome: RunOutcome,
    pub final_report: Option<String>,
    pub results: ResultStore,
    pub trace: Vec<TraceRecord>,
    pub directive_hash: String,
    pub elapsed_ms: u64,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Collection => "collection",
            TaskType::Analysis => "analysis",
            TaskType::RiskAssessment => "risk_assessment",
            TaskType::Synthesis => "synthesis",
            TaskType::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Unspecified => "unspecified",
        };
        write!(f, "{}", s)
    }
}
