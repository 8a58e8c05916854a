//! Gemini-backed task generation
//!
//! Decomposes a market-research directive into task descriptors. The
//! planner treats this output as untrusted; schema checking and the
//! fallback plan live in the planner, not here.

use crate::gemini::GeminiClient;
use crate::planner::TaskGenerator;
use async_trait::async_trait;

const PLANNING_INSTRUCTIONS: &str = r#"You are a market research operations manager.
Your job is to break down high-level market analysis directives into specific, actionable tasks.

For each task, specify:
1. id: a unique snake_case identifier
2. task_type: one of [collection, analysis, risk_assessment, synthesis]
3. description: what needs to be done
4. required_inputs: ids of tasks whose results must exist first (empty for collection)
5. priority: high, medium, or low

Rules:
- Every required_inputs entry must reference an id defined in the same list
- Include exactly one synthesis task, and make it depend on every other task
- Return ONLY a JSON array of tasks, no explanation text"#;

pub struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key),
        }
    }
}

#[async_trait]
impl TaskGenerator for GeminiGenerator {
    async fn generate(&self, directive: &str) -> crate::Result<String> {
        let prompt = format!(
            "Directive: {}\n\nBreak this down into specific tasks:",
            directive
        );

        let (response, _confidence) = self
            .client
            .generate(PLANNING_INSTRUCTIONS, &prompt)
            .await?;

        Ok(response)
    }
}
