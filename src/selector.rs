//! Dependency resolver / task selector
//!
//! Computes which tasks are runnable against the recorded results and
//! picks the next one by priority. Pure read-only logic: calling it twice
//! on unchanged state returns the same answer.

use crate::models::{ResultStore, TaskSpec, TaskType};
use tracing::debug;

/// Outcome of one selection round.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    /// Run this task next.
    Task(&'a TaskSpec),
    /// The loop is over.
    Terminal(TerminalReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    /// Every planned task has a recorded result.
    AllComplete,
    /// A synthesis task has produced its result; the run's report exists.
    ReportReady,
    /// Incomplete tasks remain but none can make progress.
    Deadlock { blocked: Vec<String> },
}

/// Select the next task to execute, or a terminal verdict.
///
/// A task is complete iff its id has a recorded result; runnable iff it is
/// incomplete and every required input has a recorded result. When nothing
/// is runnable, an incomplete collection task (raw data gathering has no
/// upstream needs) breaks the stall; failing that, the plan is deadlocked.
pub fn select_next<'a>(tasks: &'a [TaskSpec], results: &ResultStore) -> Selection<'a> {
    let synthesis_done = tasks
        .iter()
        .any(|t| t.task_type == TaskType::Synthesis && results.contains(&t.id));

    if synthesis_done {
        return Selection::Terminal(TerminalReason::ReportReady);
    }

    let incomplete: Vec<&TaskSpec> = tasks
        .iter()
        .filter(|t| !results.contains(&t.id))
        .collect();

    if incomplete.is_empty() {
        return Selection::Terminal(TerminalReason::AllComplete);
    }

    let mut runnable: Vec<&TaskSpec> = incomplete
        .iter()
        .filter(|t| t.required_inputs.iter().all(|dep| results.contains(dep)))
        .copied()
        .collect();

    if runnable.is_empty() {
        if let Some(task) = incomplete
            .iter()
            .copied()
            .find(|t| t.task_type == TaskType::Collection)
        {
            debug!(task_id = %task.id, "No runnable task, falling back to data collection");
            return Selection::Task(task);
        }

        let blocked: Vec<String> = incomplete.iter().map(|t| t.id.clone()).collect();
        return Selection::Terminal(TerminalReason::Deadlock { blocked });
    }

    // Stable sort: ties keep original planning order.
    runnable.sort_by_key(|t| t.priority.rank());

    Selection::Task(runnable[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use serde_json::json;

    fn task(id: &str, task_type: TaskType, deps: &[&str], priority: Priority) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            task_type,
            description: format!("task {}", id),
            required_inputs: deps.iter().map(|d| d.to_string()).collect(),
            priority,
        }
    }

    #[test]
    fn test_all_complete_is_terminal() {
        let tasks = vec![task("t1", TaskType::Collection, &[], Priority::High)];
        let mut results = ResultStore::new();
        results.record("t1", json!({"ok": true})).unwrap();

        assert_eq!(
            select_next(&tasks, &results),
            Selection::Terminal(TerminalReason::AllComplete)
        );
    }

    #[test]
    fn test_completed_synthesis_is_terminal_even_with_work_left() {
        let tasks = vec![
            task("t1", TaskType::Collection, &[], Priority::Low),
            task("report", TaskType::Synthesis, &[], Priority::High),
        ];
        let mut results = ResultStore::new();
        results.record("report", json!({"report": "done"})).unwrap();

        assert_eq!(
            select_next(&tasks, &results),
            Selection::Terminal(TerminalReason::ReportReady)
        );
    }

    #[test]
    fn test_priority_ordering_beats_declaration_order() {
        let tasks = vec![
            task("medium_first", TaskType::Collection, &[], Priority::Medium),
            task("high_second", TaskType::Collection, &[], Priority::High),
        ];
        let results = ResultStore::new();

        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "high_second"),
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_ties_keep_planning_order() {
        let tasks = vec![
            task("first", TaskType::Collection, &[], Priority::Medium),
            task("second", TaskType::Collection, &[], Priority::Medium),
        ];
        let results = ResultStore::new();

        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "first"),
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_priority_sorts_last() {
        let tasks = vec![
            task("vague", TaskType::Collection, &[], Priority::Unspecified),
            task("low", TaskType::Collection, &[], Priority::Low),
        ];
        let results = ResultStore::new();

        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "low"),
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_dependencies_gate_runnability() {
        let tasks = vec![
            task("analyze", TaskType::Analysis, &["collect"], Priority::High),
            task("collect", TaskType::Collection, &[], Priority::Low),
        ];
        let mut results = ResultStore::new();

        // Analysis is high priority but not runnable yet.
        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "collect"),
            other => panic!("expected a task, got {:?}", other),
        }

        results.record("collect", json!({"data": []})).unwrap();

        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "analyze"),
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_breaks_stall() {
        // Both tasks blocked on each other's chain, but one is collection.
        let tasks = vec![
            task("analyze", TaskType::Analysis, &["stuck"], Priority::High),
            task("stuck", TaskType::Collection, &["analyze"], Priority::Low),
        ];
        let results = ResultStore::new();

        match select_next(&tasks, &results) {
            Selection::Task(t) => assert_eq!(t.id, "stuck"),
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_deadlock_without_collection_tasks() {
        let tasks = vec![
            task("a", TaskType::Analysis, &["b"], Priority::High),
            task("b", TaskType::RiskAssessment, &["a"], Priority::High),
        ];
        let results = ResultStore::new();

        match select_next(&tasks, &results) {
            Selection::Terminal(TerminalReason::Deadlock { blocked }) => {
                assert_eq!(blocked, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected deadlock, got {:?}", other),
        }
    }

    #[test]
    fn test_selection_is_idempotent_on_unchanged_state() {
        let tasks = vec![
            task("t1", TaskType::Collection, &[], Priority::Medium),
            task("t2", TaskType::Collection, &[], Priority::Medium),
        ];
        let results = ResultStore::new();

        let first = select_next(&tasks, &results);
        let second = select_next(&tasks, &results);

        assert_eq!(first, second);
    }
}
