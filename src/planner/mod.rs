//! Task planning
//!
//! Turns a directive into an ordered set of task specifications. The
//! generation collaborator is fallible and its output is never trusted:
//! anything that fails parsing or validation degrades to a fixed default
//! plan, so the workflow is never left without runnable work.

use crate::models::{Priority, TaskSpec, TaskType};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

pub mod gemini;
pub use gemini::GeminiGenerator;

/// Defensive bound on generated plans.
const MAX_TASKS_PER_PLAN: usize = 25;

/// Trait for the task-generation collaborator (LLM controlled).
#[async_trait]
pub trait TaskGenerator: Send + Sync {
    /// Produce raw task descriptors for a directive. Output is untrusted
    /// until it passes the planner's schema check.
    async fn generate(&self, directive: &str) -> crate::Result<String>;
}

/// Mock generator for development & testing.
/// Keeps the system functional without LLM dependency.
pub struct MockGenerator;

#[async_trait]
impl TaskGenerator for MockGenerator {
    async fn generate(&self, directive: &str) -> crate::Result<String> {
        let tasks = serde_json::json!([
            {
                "id": "collect_market_data",
                "task_type": "collection",
                "description": format!("Collect market data and news for: {}", directive),
                "required_inputs": [],
                "priority": "high"
            },
            {
                "id": "analyze_findings",
                "task_type": "analysis",
                "description": "Analyze collected data and extract the dominant narratives",
                "required_inputs": ["collect_market_data"],
                "priority": "medium"
            },
            {
                "id": "assess_risks",
                "task_type": "risk_assessment",
                "description": "Identify risks and contradictory evidence in the analysis",
                "required_inputs": ["collect_market_data", "analyze_findings"],
                "priority": "medium"
            },
            {
                "id": "generate_report",
                "task_type": "synthesis",
                "description": "Synthesize all findings into a final report",
                "required_inputs": ["collect_market_data", "analyze_findings", "assess_risks"],
                "priority": "high"
            }
        ]);

        Ok(tasks.to_string())
    }
}

/// Plans tasks for a directive via the generation collaborator.
pub struct TaskPlanner {
    generator: Box<dyn TaskGenerator>,
}

impl TaskPlanner {
    pub fn new(generator: Box<dyn TaskGenerator>) -> Self {
        Self { generator }
    }

    /// Plan tasks for a directive. Always returns at least one task:
    /// generation or validation failure degrades to the fixed default plan
    /// rather than surfacing an error to the caller.
    pub async fn plan(&self, directive: &str) -> Vec<TaskSpec> {
        match self.try_plan(directive).await {
            Ok(tasks) => {
                debug!(task_count = tasks.len(), "Plan generated");
                tasks
            }
            Err(e) => {
                warn!(error = %e, "Task generation failed, using default plan");
                fallback_plan()
            }
        }
    }

    async fn try_plan(&self, directive: &str) -> crate::Result<Vec<TaskSpec>> {
        let raw = self.generator.generate(directive).await?;
        let tasks = parse_task_list(&raw)?;
        validate_task_list(&tasks)?;
        Ok(tasks)
    }
}

/// Parse raw generator output into task specs.
/// Accepts a bare JSON array or a `{"tasks": [...]}` wrapper, with or
/// without markdown code fences around it.
pub fn parse_task_list(response: &str) -> crate::Result<Vec<TaskSpec>> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        crate::WorkflowError::PlanningError(format!(
            "Failed to parse task list: {} | raw={}",
            e, response
        ))
    })?;

    let list = value
        .as_array()
        .or_else(|| value.get("tasks").and_then(Value::as_array))
        .ok_or_else(|| {
            crate::WorkflowError::PlanningError("Task list is not an array".to_string())
        })?;

    serde_json::from_value(Value::Array(list.clone())).map_err(|e| {
        crate::WorkflowError::PlanningError(format!("Task descriptor schema mismatch: {}", e))
    })
}

/// Validate planning invariants: non-empty, bounded, unique ids, and no
/// dependency naming an id absent from the plan. A dangling dependency is
/// a planning error, never a resolver concern.
pub fn validate_task_list(tasks: &[TaskSpec]) -> crate::Result<()> {
    if tasks.is_empty() {
        return Err(crate::WorkflowError::InvalidTaskList(
            "Plan contains no tasks".to_string(),
        ));
    }

    if tasks.len() > MAX_TASKS_PER_PLAN {
        return Err(crate::WorkflowError::InvalidTaskList(format!(
            "Plan exceeds {} tasks",
            MAX_TASKS_PER_PLAN
        )));
    }

    let mut ids: HashSet<&str> = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.id.as_str()) {
            return Err(crate::WorkflowError::InvalidTaskList(format!(
                "Duplicate task id: {}",
                task.id
            )));
        }
    }

    for task in tasks {
        for dep in &task.required_inputs {
            if !ids.contains(dep.as_str()) {
                return Err(crate::WorkflowError::InvalidTaskList(format!(
                    "Task {} depends on unknown task {}",
                    task.id, dep
                )));
            }
        }
    }

    Ok(())
}

/// Fixed, hand-authored default plan: one task of each type, wired
/// collection → analysis → risk assessment → synthesis.
pub fn fallback_plan() -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            id: "collect_market_data".to_string(),
            task_type: TaskType::Collection,
            description: "Collect relevant market data".to_string(),
            required_inputs: vec![],
            priority: Priority::High,
        },
        TaskSpec {
            id: "analyze_sentiment".to_string(),
            task_type: TaskType::Analysis,
            description: "Analyze market sentiment".to_string(),
            required_inputs: vec!["collect_market_data".to_string()],
            priority: Priority::Medium,
        },
        TaskSpec {
            id: "assess_risks".to_string(),
            task_type: TaskType::RiskAssessment,
            description: "Identify potential risks".to_string(),
            required_inputs: vec![
                "collect_market_data".to_string(),
                "analyze_sentiment".to_string(),
            ],
            priority: Priority::Medium,
        },
        TaskSpec {
            id: "generate_report".to_string(),
            task_type: TaskType::Synthesis,
            description: "Generate final report".to_string(),
            required_inputs: vec![
                "collect_market_data".to_string(),
                "analyze_sentiment".to_string(),
                "assess_risks".to_string(),
            ],
            priority: Priority::High,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MalformedGenerator;

    #[async_trait]
    impl TaskGenerator for MalformedGenerator {
        async fn generate(&self, _directive: &str) -> crate::Result<String> {
            Ok("I could not produce a task list, sorry.".to_string())
        }
    }

    struct DanglingGenerator;

    #[async_trait]
    impl TaskGenerator for DanglingGenerator {
        async fn generate(&self, _directive: &str) -> crate::Result<String> {
            Ok(r#"[
                {"id": "t1", "task_type": "analysis", "description": "a",
                 "required_inputs": ["never_planned"], "priority": "high"}
            ]"#
            .to_string())
        }
    }

    #[tokio::test]
    async fn test_malformed_output_falls_back_to_default_plan() {
        let planner = TaskPlanner::new(Box::new(MalformedGenerator));
        let tasks = planner.plan("Assess AAPL before earnings").await;

        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].task_type, TaskType::Collection);
        assert_eq!(tasks[1].task_type, TaskType::Analysis);
        assert_eq!(tasks[2].task_type, TaskType::RiskAssessment);
        assert_eq!(tasks[3].task_type, TaskType::Synthesis);

        // Chaining: each stage requires every earlier stage.
        assert!(tasks[1].required_inputs.contains(&tasks[0].id));
        assert!(tasks[2].required_inputs.contains(&tasks[0].id));
        assert!(tasks[2].required_inputs.contains(&tasks[1].id));
        assert_eq!(tasks[3].required_inputs.len(), 3);
    }

    #[tokio::test]
    async fn test_dangling_dependency_falls_back() {
        let planner = TaskPlanner::new(Box::new(DanglingGenerator));
        let tasks = planner.plan("anything").await;

        assert_eq!(tasks, fallback_plan());
    }

    #[tokio::test]
    async fn test_mock_generator_produces_valid_plan() {
        let planner = TaskPlanner::new(Box::new(MockGenerator));
        let tasks = planner.plan("Assess AAPL before earnings").await;

        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].id, "collect_market_data");
        assert!(validate_task_list(&tasks).is_ok());
    }

    #[test]
    fn test_parse_strips_markdown_fences() {
        let raw = "```json\n[{\"id\": \"t1\", \"task_type\": \"collection\", \"description\": \"d\"}]\n```";
        let tasks = parse_task_list(raw).unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, Priority::Medium); // default
    }

    #[test]
    fn test_parse_accepts_tasks_wrapper() {
        let raw = r#"{"tasks": [{"id": "t1", "task_type": "synthesis", "description": "d"}]}"#;
        let tasks = parse_task_list(raw).unwrap();

        assert_eq!(tasks[0].task_type, TaskType::Synthesis);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut tasks = fallback_plan();
        tasks[1].id = tasks[0].id.clone();
        tasks[1].required_inputs.clear();

        assert!(validate_task_list(&tasks).is_err());
    }

    #[test]
    fn test_fallback_plan_is_valid() {
        assert!(validate_task_list(&fallback_plan()).is_ok());
    }
}
