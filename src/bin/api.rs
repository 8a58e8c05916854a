use market_research_orchestrator::{
    api::start_server,
    driver::WorkflowDriver,
    executors::default_registry,
    gemini::GeminiClient,
    market::MarketDataClient,
    memory::build_store,
    planner::{GeminiGenerator, TaskPlanner},
    search::SearchClient,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set; generation and analysis run disabled");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Market Research Orchestrator - API Server");
    info!("Port: {}", api_port);

    // Create collaborators — all handles are explicit, no ambient globals
    let llm = Arc::new(GeminiClient::new(gemini_api_key.clone()));
    let search = Arc::new(SearchClient::from_env());
    let market = MarketDataClient::from_env();
    let memory = build_store();

    let planner = TaskPlanner::new(Box::new(GeminiGenerator::new(gemini_api_key)));
    let registry = default_registry(llm, search, market, memory);
    let driver = Arc::new(WorkflowDriver::new(planner, registry));

    info!("Workflow driver initialized");
    info!("Starting API server...");

    start_server(driver, api_port).await?;

    Ok(())
}
