//! Tavily search client for news and web content
//!
//! Data-source collaborator used by the collection executor. Credentials
//! are read at construction; a missing key produces a disabled client
//! whose calls return an explicit error result.

use crate::error::WorkflowError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct SearchClient {
    client: Client,
    api_key: Option<String>,
}

/// A single article or page returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published_date: String,
}

impl SearchClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        if api_key.is_none() {
            warn!("TAVILY_API_KEY not set. Search functionality will be disabled.");
        }

        Self { client, api_key }
    }

    /// Build a client from the TAVILY_API_KEY environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Search for recent news articles related to the query.
    pub async fn search_news(
        &self,
        query: &str,
        max_results: usize,
        days_back: u32,
    ) -> crate::Result<Vec<Article>> {
        self.search(query, max_results, "news", Some(days_back)).await
    }

    /// General web search for content related to the query.
    pub async fn search_web(&self, query: &str, max_results: usize) -> crate::Result<Vec<Article>> {
        self.search(query, max_results, "general", None).await
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        topic: &str,
        days: Option<u32>,
    ) -> crate::Result<Vec<Article>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            WorkflowError::SearchError("TAVILY_API_KEY not configured".to_string())
        })?;

        let request = SearchRequest {
            api_key: api_key.clone(),
            query: query.to_string(),
            search_depth: "advanced".to_string(),
            max_results,
            topic: topic.to_string(),
            days,
        };

        info!(topic = topic, "Calling Tavily search API");

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkflowError::SearchError(format!("Tavily request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkflowError::SearchError(format!(
                "Tavily API error: {}",
                error_text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::SearchError(format!("Tavily parse error: {}", e)))?;

        Ok(body.results)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    api_key: String,
    query: String,
    search_depth: String,
    max_results: usize,
    topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Article>,
}
