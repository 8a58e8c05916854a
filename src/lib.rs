//! Market Research Workflow Orchestrator
//!
//! Decomposes a high-level market-research directive into data-collection,
//! analysis, risk-assessment, and synthesis tasks, executes them in
//! dependency order, and assembles a final report:
//! - Plans tasks from a natural-language directive (LLM-generated, with a
//!   fixed fallback plan when generation misbehaves)
//! - Resolves execution order from declared data dependencies
//! - Dispatches each task to the right executor
//! - Terminates when all tasks are satisfied, a report is produced, or the
//!   plan deadlocks — every transition traced for audit
//!
//! WORKFLOW LOOP:
//! DIRECTIVE → PLAN → SELECT → ROUTE → EXECUTE → SELECT → ... → DONE

pub mod api;
pub mod driver;
pub mod error;
pub mod executors;
pub mod gemini;
pub mod market;
pub mod memory;
pub mod models;
pub mod planner;
pub mod router;
pub mod search;
pub mod selector;
pub mod trace;

pub use error::{Result, WorkflowError};

// Re-export common types
pub use models::*;
pub use selector::{select_next, Selection, TerminalReason};
