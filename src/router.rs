//! Task router
//!
//! Pure mapping from a task's declared type to the handler that executes
//! it. The dispatch is an exhaustive match over the task-type enum.

use crate::models::{TaskSpec, TaskType};
use std::fmt;

/// Identifier of the executor that handles a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    CollectData,
    AnalyzeData,
    AssessRisk,
    Synthesize,
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Handler::CollectData => "collect_data",
            Handler::AnalyzeData => "analyze_data",
            Handler::AssessRisk => "assess_risk",
            Handler::Synthesize => "synthesize",
        };
        write!(f, "{}", s)
    }
}

/// Route a task to its handler.
///
/// Unrecognized task types are treated as data gathering rather than
/// failing the run, so a plan with a stray type keeps the loop alive.
pub fn route(task: &TaskSpec) -> Handler {
    match task.task_type {
        TaskType::Collection => Handler::CollectData,
        TaskType::Analysis => Handler::AnalyzeData,
        TaskType::RiskAssessment => Handler::AssessRisk,
        TaskType::Synthesis => Handler::Synthesize,
        // Unknown work is collected, not rejected.
        TaskType::Unknown => Handler::CollectData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn task_of_type(task_type: TaskType) -> TaskSpec {
        TaskSpec {
            id: "t".to_string(),
            task_type,
            description: String::new(),
            required_inputs: vec![],
            priority: Priority::Medium,
        }
    }

    #[test]
    fn test_routing_table() {
        assert_eq!(route(&task_of_type(TaskType::Collection)), Handler::CollectData);
        assert_eq!(route(&task_of_type(TaskType::Analysis)), Handler::AnalyzeData);
        assert_eq!(route(&task_of_type(TaskType::RiskAssessment)), Handler::AssessRisk);
        assert_eq!(route(&task_of_type(TaskType::Synthesis)), Handler::Synthesize);
    }

    #[test]
    fn test_unknown_type_falls_back_to_collection() {
        assert_eq!(route(&task_of_type(TaskType::Unknown)), Handler::CollectData);
    }
}
