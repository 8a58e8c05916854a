//! Workflow driver — the orchestration state machine
//!
//! DIRECTIVE → PLAN → SELECT → ROUTE → EXECUTE → SELECT → ... → DONE
//!
//! Strictly sequential: one task executes at a time, and the selector
//! never runs concurrently with an executor. The driver owns the
//! `WorkflowState` for the lifetime of one run; callers always get a
//! `WorkflowReport` back, degraded or not — there is no separate failure
//! channel at this boundary.

use crate::executors::{error_payload, ExecutorRegistry};
use crate::models::{RunOutcome, WorkflowReport, WorkflowState};
use crate::planner::TaskPlanner;
use crate::router::{route, Handler};
use crate::selector::{select_next, Selection, TerminalReason};
use crate::trace::{compute_directive_hash, DriverState, TraceRecord};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct WorkflowDriver {
    planner: TaskPlanner,
    registry: ExecutorRegistry,
}

fn execution_state(handler: Handler) -> DriverState {
    match handler {
        Handler::CollectData => DriverState::Collecting,
        Handler::AnalyzeData => DriverState::Analyzing,
        Handler::AssessRisk => DriverState::Assessing,
        Handler::Synthesize => DriverState::Synthesizing,
    }
}

fn transition(
    state: &mut WorkflowState,
    current: &mut DriverState,
    to: DriverState,
    task_id: Option<String>,
) {
    state.trace.push(TraceRecord::new(*current, to, task_id));
    *current = to;
}

impl WorkflowDriver {
    pub fn new(planner: TaskPlanner, registry: ExecutorRegistry) -> Self {
        Self { planner, registry }
    }

    /// Process one directive to completion.
    pub async fn run(&self, directive: &str) -> WorkflowReport {
        let start = Instant::now();
        let mut state = WorkflowState::new(directive);
        let mut current = DriverState::Planning;

        info!(directive = %directive, "Workflow: starting run");

        // === PLAN ===
        state.tasks = self.planner.plan(directive).await;
        debug!(task_count = state.tasks.len(), "Tasks planned");
        transition(&mut state, &mut current, DriverState::Selecting, None);

        // === SELECT / EXECUTE loop ===
        loop {
            // Resolve the selection into an owned value before touching
            // state again; Selection borrows the task list.
            let next = match select_next(&state.tasks, &state.results) {
                Selection::Task(task) => Ok(task.clone()),
                Selection::Terminal(reason) => Err(reason),
            };

            let task = match next {
                Ok(task) => task,
                Err(reason) => {
                    match reason {
                        TerminalReason::AllComplete => {
                            info!("All tasks complete");
                        }
                        TerminalReason::ReportReady => {
                            info!("Final report produced");
                        }
                        TerminalReason::Deadlock { blocked } => {
                            warn!(
                                ?blocked,
                                "Dependency deadlock: incomplete tasks cannot make progress"
                            );
                            state.deadlocked = true;
                        }
                    }
                    transition(&mut state, &mut current, DriverState::Done, None);
                    break;
                }
            };

            let handler = route(&task);
            debug!(task_id = %task.id, handler = %handler, "Dispatching task");

            transition(
                &mut state,
                &mut current,
                execution_state(handler),
                Some(task.id.clone()),
            );
            state.current_task = Some(task.clone());

            let value = match self.registry.get(handler) {
                Some(executor) => match executor.execute(&task, &state.results).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "Executor failed");
                        error_payload(e)
                    }
                },
                None => {
                    warn!(handler = %handler, "No executor registered");
                    error_payload(crate::WorkflowError::ExecutorNotFound(handler.to_string()))
                }
            };

            if let Err(e) = state.results.record(&task.id, value) {
                // Write-once violated; the selector should make this
                // unreachable, so stop rather than loop on a bad plan.
                warn!(task_id = %task.id, error = %e, "Refusing to overwrite result");
                transition(&mut state, &mut current, DriverState::Done, None);
                break;
            }

            state.current_task = None;
            transition(
                &mut state,
                &mut current,
                DriverState::Selecting,
                Some(task.id),
            );
        }

        let final_report = state.final_report();
        let outcome = if state.deadlocked {
            RunOutcome::Deadlocked
        } else if final_report.is_some() {
            RunOutcome::Completed
        } else {
            RunOutcome::Partial
        };

        info!(
            ?outcome,
            results = state.results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow: run finished"
        );

        WorkflowReport {
            directive: state.directive,
            outcome,
            final_report,
            results: state.results,
            trace: state.trace,
            directive_hash: compute_directive_hash(directive),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::Executor;
    use crate::models::{ResultStore, TaskSpec};
    use crate::planner::{TaskGenerator, TaskPlanner};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct ScriptedGenerator(String);

    #[async_trait]
    impl TaskGenerator for ScriptedGenerator {
        async fn generate(&self, _directive: &str) -> crate::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct StubExecutor {
        name: &'static str,
        payload: Value,
    }

    #[async_trait]
    impl Executor for StubExecutor {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, task: &TaskSpec, _results: &ResultStore) -> crate::Result<Value> {
            let mut payload = self.payload.clone();
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("task_id".to_string(), json!(task.id));
            }
            Ok(payload)
        }
    }

    fn stub_registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        registry.register(
            Handler::CollectData,
            Arc::new(StubExecutor {
                name: "collect_data",
                payload: json!({"data": "collected"}),
            }),
        );
        registry.register(
            Handler::AnalyzeData,
            Arc::new(StubExecutor {
                name: "analyze_data",
                payload: json!({"analysis": "steady"}),
            }),
        );
        registry.register(
            Handler::AssessRisk,
            Arc::new(StubExecutor {
                name: "assess_risk",
                payload: json!({"risks": "limited"}),
            }),
        );
        registry.register(
            Handler::Synthesize,
            Arc::new(StubExecutor {
                name: "synthesize",
                payload: json!({"report": "All findings considered, hold."}),
            }),
        );
        registry
    }

    fn driver_for(tasks_json: &str) -> WorkflowDriver {
        WorkflowDriver::new(
            TaskPlanner::new(Box::new(ScriptedGenerator(tasks_json.to_string()))),
            stub_registry(),
        )
    }

    fn executed_ids(report: &WorkflowReport) -> Vec<String> {
        report
            .trace
            .iter()
            .filter(|r| r.to.is_execution())
            .filter_map(|r| r.task_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_dependency_order() {
        let driver = driver_for(
            r#"[
            {"id": "t1", "task_type": "collection", "description": "Collect AAPL data", "required_inputs": [], "priority": "high"},
            {"id": "t2", "task_type": "analysis", "description": "Analyze", "required_inputs": ["t1"], "priority": "medium"},
            {"id": "t3", "task_type": "risk_assessment", "description": "Assess", "required_inputs": ["t1", "t2"], "priority": "medium"},
            {"id": "t4", "task_type": "synthesis", "description": "Report", "required_inputs": ["t1", "t2", "t3"], "priority": "high"}
        ]"#,
        );

        let report = driver.run("Assess AAPL before earnings").await;

        assert_eq!(executed_ids(&report), vec!["t1", "t2", "t3", "t4"]);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(!report.final_report.as_deref().unwrap_or("").is_empty());

        // Exactly 4 execution-state entries, bracketed by planning/done.
        assert_eq!(
            report.trace.iter().filter(|r| r.to.is_execution()).count(),
            4
        );
        assert_eq!(report.trace.first().unwrap().from, DriverState::Planning);
        assert_eq!(report.trace.last().unwrap().to, DriverState::Done);
    }

    #[tokio::test]
    async fn test_each_task_executed_at_most_once() {
        let driver = driver_for(
            r#"[
            {"id": "a", "task_type": "collection", "description": "a", "required_inputs": [], "priority": "low"},
            {"id": "b", "task_type": "collection", "description": "b", "required_inputs": [], "priority": "medium"},
            {"id": "c", "task_type": "analysis", "description": "c", "required_inputs": ["a", "b"], "priority": "high"},
            {"id": "d", "task_type": "risk_assessment", "description": "d", "required_inputs": ["c"], "priority": "low"}
        ]"#,
        );

        let report = driver.run("breadth check").await;
        let executed = executed_ids(&report);

        assert!(executed.len() <= 4);
        let mut unique = executed.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), executed.len());
        assert_eq!(report.results.len(), 4);
    }

    #[tokio::test]
    async fn test_priority_wins_over_declaration_order() {
        let driver = driver_for(
            r#"[
            {"id": "medium_collect", "task_type": "collection", "description": "m", "required_inputs": [], "priority": "medium"},
            {"id": "high_collect", "task_type": "collection", "description": "h", "required_inputs": [], "priority": "high"}
        ]"#,
        );

        let report = driver.run("two collectors").await;

        assert_eq!(executed_ids(&report)[0], "high_collect");
        // No synthesis task planned, so the run is partial by design.
        assert_eq!(report.outcome, RunOutcome::Partial);
    }

    #[tokio::test]
    async fn test_deadlock_terminates_with_diagnostic() {
        let driver = driver_for(
            r#"[
            {"id": "a", "task_type": "analysis", "description": "a", "required_inputs": ["b"], "priority": "high"},
            {"id": "b", "task_type": "risk_assessment", "description": "b", "required_inputs": ["a"], "priority": "high"},
            {"id": "s", "task_type": "synthesis", "description": "s", "required_inputs": ["a", "b"], "priority": "high"}
        ]"#,
        );

        let report = driver.run("unsatisfiable").await;

        assert_eq!(report.outcome, RunOutcome::Deadlocked);
        assert!(report.final_report.is_none());
        assert!(executed_ids(&report).is_empty());
        assert_eq!(report.trace.last().unwrap().to, DriverState::Done);
    }

    #[tokio::test]
    async fn test_unknown_task_type_is_collected() {
        let driver = driver_for(
            r#"[
            {"id": "weird", "task_type": "forecasting", "description": "?", "required_inputs": [], "priority": "high"}
        ]"#,
        );

        let report = driver.run("unknown work").await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(
            report.trace.iter().find(|r| r.to.is_execution()).unwrap().to,
            DriverState::Collecting
        );
    }

    #[tokio::test]
    async fn test_malformed_generation_still_completes_via_fallback() {
        let driver = WorkflowDriver::new(
            TaskPlanner::new(Box::new(ScriptedGenerator("no json here".to_string()))),
            stub_registry(),
        );

        let report = driver.run("Assess AAPL before earnings").await;

        // Fallback plan: collection → analysis → risk → synthesis.
        assert_eq!(
            executed_ids(&report),
            vec![
                "collect_market_data",
                "analyze_sentiment",
                "assess_risks",
                "generate_report"
            ]
        );
        assert_eq!(report.outcome, RunOutcome::Completed);
    }
}
