use market_research_orchestrator::{
    driver::WorkflowDriver,
    executors::default_registry,
    gemini::GeminiClient,
    market::MarketDataClient,
    memory::build_store,
    planner::{MockGenerator, TaskPlanner},
    search::SearchClient,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    dotenv::dotenv().ok();

    info!("Market Research Orchestrator starting");

    let directive = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Assess AAPL before earnings".to_string());

    // Create collaborators
    let llm = Arc::new(GeminiClient::from_env());
    let search = Arc::new(SearchClient::from_env());
    let market = MarketDataClient::from_env();
    let memory = build_store();

    // Create driver (mock generation keeps this runnable without an API key)
    let planner = TaskPlanner::new(Box::new(MockGenerator));
    let registry = default_registry(llm, search, market, memory);
    let driver = WorkflowDriver::new(planner, registry);

    info!(directive = %directive, "Running workflow");

    let report = driver.run(&directive).await;

    println!("\n=== WORKFLOW REPORT ===");
    println!("Directive: {}", report.directive);
    println!("Outcome: {:?}", report.outcome);
    println!("Directive hash: {}", report.directive_hash);
    println!("Elapsed: {} ms", report.elapsed_ms);

    match &report.final_report {
        Some(text) => println!("\nFinal report:\n{}", text),
        None => println!("\nNo final report produced; partial results below."),
    }

    println!("\nResults:");
    for (task_id, value) in report.results.iter() {
        println!("  {}: {}", task_id, value);
    }

    println!("\nTrace:");
    for (i, record) in report.trace.iter().enumerate() {
        match &record.task_id {
            Some(task_id) => println!(
                "  {}: {} -> {} ({})",
                i + 1,
                record.from,
                record.to,
                task_id
            ),
            None => println!("  {}: {} -> {}", i + 1, record.from, record.to),
        }
    }

    Ok(())
}
