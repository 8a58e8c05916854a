//! Task executors
//!
//! Each executor consumes the upstream results a task declared and
//! produces one result value, stored under the task id. Executors call
//! out to data-source and reasoning collaborators; those failures are
//! captured locally and returned as `{"error": ...}` payloads so nothing
//! ever escapes the driver boundary as a fault.

use crate::gemini::GeminiClient;
use crate::market::{extract_tickers, MarketDataClient};
use crate::memory::{AssetRecord, MemoryStore, NarrativeRecord, ReportRecord, RiskRecord};
use crate::models::{ResultStore, TaskSpec};
use crate::router::Handler;
use crate::search::SearchClient;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Trait for a single task executor.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce the result for one task. Collaborator failures should be
    /// returned as error payloads (`error_payload`), not as `Err`; the
    /// driver converts any escaped `Err` into the same shape.
    async fn execute(&self, task: &TaskSpec, results: &ResultStore) -> crate::Result<Value>;
}

/// Registry mapping handlers to executors.
pub struct ExecutorRegistry {
    executors: HashMap<Handler, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Handler, executor: Arc<dyn Executor>) {
        self.executors.insert(handler, executor);
    }

    pub fn get(&self, handler: Handler) -> Option<Arc<dyn Executor>> {
        self.executors.get(&handler).cloned()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shape a collaborator failure as a storable result.
pub fn error_payload(error: impl std::fmt::Display) -> Value {
    json!({ "error": error.to_string() })
}

/// Collect the payloads of a task's declared inputs into one object.
/// Missing entries are skipped; the selector guarantees they exist for
/// runnable tasks, and the collection stall-breaker runs without them.
fn upstream_payloads(task: &TaskSpec, results: &ResultStore) -> Value {
    let mut upstream = serde_json::Map::new();

    for dep in &task.required_inputs {
        if let Some(value) = results.get(dep) {
            upstream.insert(dep.clone(), value.clone());
        }
    }

    Value::Object(upstream)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

//
// ================= Collection =================
//

const NEWS_RESULTS: usize = 10;
const NEWS_DAYS_BACK: u32 = 3;

/// Gathers quantitative and qualitative raw data for a task: market
/// quotes for tickers found in the description, plus recent news.
pub struct CollectionExecutor {
    market: Option<MarketDataClient>,
    search: Arc<SearchClient>,
    memory: Arc<dyn MemoryStore>,
}

impl CollectionExecutor {
    pub fn new(
        market: Option<MarketDataClient>,
        search: Arc<SearchClient>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            market,
            search,
            memory,
        }
    }
}

#[async_trait]
impl Executor for CollectionExecutor {
    fn name(&self) -> &'static str {
        "collect_data"
    }

    async fn execute(&self, task: &TaskSpec, _results: &ResultStore) -> crate::Result<Value> {
        let tickers = extract_tickers(&task.description);

        let quotes = match (&self.market, tickers.is_empty()) {
            (_, true) => json!(null),
            (None, _) => error_payload("MARKET_DATA_BASE_URL not configured"),
            (Some(market), _) => match market.quote_snapshot(&tickers).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Quote collection failed");
                    error_payload(e)
                }
            },
        };

        let news = match self
            .search
            .search_news(&task.description, NEWS_RESULTS, NEWS_DAYS_BACK)
            .await
        {
            Ok(articles) => {
                for article in &articles {
                    let narrative = NarrativeRecord {
                        narrative_id: Uuid::new_v4(),
                        title: article.title.clone(),
                        summary: truncate(&article.content, 500),
                        source: article.url.clone(),
                        recorded_at: Utc::now(),
                    };
                    if let Err(e) = self.memory.add_narrative(narrative).await {
                        warn!(error = %e, "Failed to persist narrative");
                    }
                }
                json!(articles)
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "News collection failed");
                error_payload(e)
            }
        };

        for symbol in &tickers {
            let last_price = quotes
                .get(symbol)
                .and_then(|q| q.get("price"))
                .and_then(Value::as_f64);

            let asset = AssetRecord {
                symbol: symbol.clone(),
                name: symbol.clone(),
                last_price,
                recorded_at: Utc::now(),
            };
            if let Err(e) = self.memory.add_asset(asset).await {
                warn!(error = %e, "Failed to persist asset");
            }
        }

        Ok(json!({
            "tickers": tickers,
            "quotes": quotes,
            "news": news,
            "collected_at": Utc::now(),
        }))
    }
}

//
// ================= Analysis =================
//

const ANALYSIS_INSTRUCTIONS: &str = r#"You are a market intelligence analyst.
Given raw market data and news, extract sentiment, dominant narratives, and
causal relationships. Be structured and concise; cite which input each
finding came from."#;

pub struct AnalysisExecutor {
    llm: Arc<GeminiClient>,
    memory: Arc<dyn MemoryStore>,
}

impl AnalysisExecutor {
    pub fn new(llm: Arc<GeminiClient>, memory: Arc<dyn MemoryStore>) -> Self {
        Self { llm, memory }
    }
}

#[async_trait]
impl Executor for AnalysisExecutor {
    fn name(&self) -> &'static str {
        "analyze_data"
    }

    async fn execute(&self, task: &TaskSpec, results: &ResultStore) -> crate::Result<Value> {
        let upstream = upstream_payloads(task, results);
        let prompt = format!(
            "Task: {}\n\nUpstream results:\n{}",
            task.description, upstream
        );

        match self.llm.generate(ANALYSIS_INSTRUCTIONS, &prompt).await {
            Ok((answer, confidence)) => {
                let narrative = NarrativeRecord {
                    narrative_id: Uuid::new_v4(),
                    title: truncate(&task.description, 120),
                    summary: truncate(&answer, 500),
                    source: "analysis".to_string(),
                    recorded_at: Utc::now(),
                };
                if let Err(e) = self.memory.add_narrative(narrative).await {
                    warn!(error = %e, "Failed to persist analysis narrative");
                }

                Ok(json!({ "analysis": answer, "confidence": confidence }))
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Analysis failed");
                Ok(error_payload(e))
            }
        }
    }
}

//
// ================= Risk Assessment =================
//

const RISK_INSTRUCTIONS: &str = r#"You are a risk analyst.
Given market analysis results, identify potential risks: contradictory
evidence, low-probability high-impact scenarios, and regulatory or
geopolitical exposure. For each risk give a type, a probability, and an
impact."#;

pub struct RiskExecutor {
    llm: Arc<GeminiClient>,
    memory: Arc<dyn MemoryStore>,
}

impl RiskExecutor {
    pub fn new(llm: Arc<GeminiClient>, memory: Arc<dyn MemoryStore>) -> Self {
        Self { llm, memory }
    }
}

#[async_trait]
impl Executor for RiskExecutor {
    fn name(&self) -> &'static str {
        "assess_risk"
    }

    async fn execute(&self, task: &TaskSpec, results: &ResultStore) -> crate::Result<Value> {
        let upstream = upstream_payloads(task, results);
        let prompt = format!(
            "Task: {}\n\nUpstream results:\n{}",
            task.description, upstream
        );

        match self.llm.generate(RISK_INSTRUCTIONS, &prompt).await {
            Ok((answer, confidence)) => {
                let risk = RiskRecord {
                    risk_id: Uuid::new_v4(),
                    risk_type: "market".to_string(),
                    description: truncate(&answer, 500),
                    severity: "unrated".to_string(),
                    recorded_at: Utc::now(),
                };
                if let Err(e) = self.memory.add_risk(risk).await {
                    warn!(error = %e, "Failed to persist risk");
                }

                Ok(json!({ "risks": answer, "confidence": confidence }))
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Risk assessment failed");
                Ok(error_payload(e))
            }
        }
    }
}

//
// ================= Synthesis =================
//

const SYNTHESIS_INSTRUCTIONS: &str = r#"You are a market analyst responsible for
synthesizing research into clear, actionable reports.

Your report should include:
1. Executive Summary
2. Key Findings
3. Market Analysis
4. Risk Assessment
5. Actionable Recommendations

Use a professional, analytical tone. Where an upstream input carries an
error, say so and qualify the affected conclusions."#;

pub struct SynthesisExecutor {
    llm: Arc<GeminiClient>,
    memory: Arc<dyn MemoryStore>,
}

impl SynthesisExecutor {
    pub fn new(llm: Arc<GeminiClient>, memory: Arc<dyn MemoryStore>) -> Self {
        Self { llm, memory }
    }
}

#[async_trait]
impl Executor for SynthesisExecutor {
    fn name(&self) -> &'static str {
        "synthesize"
    }

    async fn execute(&self, task: &TaskSpec, results: &ResultStore) -> crate::Result<Value> {
        let upstream = upstream_payloads(task, results);
        let prompt = format!(
            "Task: {}\n\nAll collected results:\n{}\n\nSynthesize this information into a comprehensive report:",
            task.description, upstream
        );

        match self.llm.generate(SYNTHESIS_INSTRUCTIONS, &prompt).await {
            Ok((answer, confidence)) => {
                let report = ReportRecord {
                    report_id: Uuid::new_v4(),
                    directive: truncate(&task.description, 500),
                    content: answer.clone(),
                    created_at: Utc::now(),
                };
                if let Err(e) = self.memory.add_report(report).await {
                    warn!(error = %e, "Failed to persist report");
                }

                Ok(json!({ "report": answer, "confidence": confidence }))
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Synthesis failed");
                Ok(error_payload(e))
            }
        }
    }
}

/// Wire the four standard executors to their handlers.
pub fn default_registry(
    llm: Arc<GeminiClient>,
    search: Arc<SearchClient>,
    market: Option<MarketDataClient>,
    memory: Arc<dyn MemoryStore>,
) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();

    registry.register(
        Handler::CollectData,
        Arc::new(CollectionExecutor::new(market, search, memory.clone())),
    );
    registry.register(
        Handler::AnalyzeData,
        Arc::new(AnalysisExecutor::new(llm.clone(), memory.clone())),
    );
    registry.register(
        Handler::AssessRisk,
        Arc::new(RiskExecutor::new(llm.clone(), memory.clone())),
    );
    registry.register(
        Handler::Synthesize,
        Arc::new(SynthesisExecutor::new(llm, memory)),
    );

    registry
}
