//! Keyed add/query storage for research facts
//!
//! Two backends: in-memory (development, tests) and Postgres (schema
//! created lazily on first use). Selection happens at construction from
//! the environment; the handle is passed explicitly to the executors.

use crate::error::WorkflowError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

//
// ================= Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub symbol: String,
    pub name: String,
    pub last_price: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeRecord {
    pub narrative_id: Uuid,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRecord {
    pub risk_id: Uuid,
    pub risk_type: String,
    pub description: String,
    pub severity: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: Uuid,
    pub directive: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

//
// ================= Trait =================
//

/// Keyed add/query operations over research facts.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add_asset(&self, asset: AssetRecord) -> crate::Result<()>;
    async fn add_narrative(&self, narrative: NarrativeRecord) -> crate::Result<()>;
    async fn add_risk(&self, risk: RiskRecord) -> crate::Result<()>;
    async fn add_report(&self, report: ReportRecord) -> crate::Result<()>;

    async fn asset_by_symbol(&self, symbol: &str) -> crate::Result<Option<AssetRecord>>;
    async fn risks_by_type(&self, risk_type: &str) -> crate::Result<Vec<RiskRecord>>;
    async fn recent_reports(&self, limit: usize) -> crate::Result<Vec<ReportRecord>>;
}

//
// ================= In-Memory Backend =================
//

pub struct InMemoryStore {
    assets: Arc<RwLock<HashMap<String, AssetRecord>>>,
    narratives: Arc<RwLock<Vec<NarrativeRecord>>>,
    risks: Arc<RwLock<Vec<RiskRecord>>>,
    reports: Arc<RwLock<Vec<ReportRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(RwLock::new(HashMap::new())),
            narratives: Arc::new(RwLock::new(Vec::new())),
            risks: Arc::new(RwLock::new(Vec::new())),
            reports: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add_asset(&self, asset: AssetRecord) -> crate::Result<()> {
        let mut assets = self.assets.write().await;
        assets.insert(asset.symbol.clone(), asset);
        Ok(())
    }

    async fn add_narrative(&self, narrative: NarrativeRecord) -> crate::Result<()> {
        let mut narratives = self.narratives.write().await;
        narratives.push(narrative);
        Ok(())
    }

    async fn add_risk(&self, risk: RiskRecord) -> crate::Result<()> {
        let mut risks = self.risks.write().await;
        risks.push(risk);
        Ok(())
    }

    async fn add_report(&self, report: ReportRecord) -> crate::Result<()> {
        let mut reports = self.reports.write().await;
        reports.push(report);
        Ok(())
    }

    async fn asset_by_symbol(&self, symbol: &str) -> crate::Result<Option<AssetRecord>> {
        let assets = self.assets.read().await;
        Ok(assets.get(symbol).cloned())
    }

    async fn risks_by_type(&self, risk_type: &str) -> crate::Result<Vec<RiskRecord>> {
        let risks = self.risks.read().await;
        Ok(risks
            .iter()
            .filter(|r| r.risk_type == risk_type)
            .cloned()
            .collect())
    }

    async fn recent_reports(&self, limit: usize) -> crate::Result<Vec<ReportRecord>> {
        let reports = self.reports.read().await;
        let mut recent: Vec<ReportRecord> = reports.clone();
        recent.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        recent.truncate(limit);
        Ok(recent)
    }
}

//
// ================= Postgres Backend =================
//

pub struct PgMemoryStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> crate::Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_assets (
                      symbol TEXT PRIMARY KEY,
                      name TEXT NOT NULL,
                      last_price DOUBLE PRECISION,
                      recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_narratives (
                      narrative_id UUID PRIMARY KEY,
                      title TEXT NOT NULL,
                      summary TEXT NOT NULL,
                      source TEXT NOT NULL,
                      recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_risks (
                      risk_id UUID PRIMARY KEY,
                      risk_type TEXT NOT NULL,
                      description TEXT NOT NULL,
                      severity TEXT NOT NULL,
                      recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS research_reports (
                      report_id UUID PRIMARY KEY,
                      directive TEXT NOT NULL,
                      content TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                WorkflowError::DatabaseError(format!(
                    "Failed to initialize research memory schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl MemoryStore for PgMemoryStore {
    async fn add_asset(&self, asset: AssetRecord) -> crate::Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO research_assets (symbol, name, last_price, recorded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (symbol) DO UPDATE
              SET name = EXCLUDED.name,
                  last_price = EXCLUDED.last_price,
                  recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(&asset.symbol)
        .bind(&asset.name)
        .bind(asset.last_price)
        .bind(asset.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to insert asset: {}", e)))?;

        Ok(())
    }

    async fn add_narrative(&self, narrative: NarrativeRecord) -> crate::Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO research_narratives (narrative_id, title, summary, source, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(narrative.narrative_id)
        .bind(&narrative.title)
        .bind(&narrative.summary)
        .bind(&narrative.source)
        .bind(narrative.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to insert narrative: {}", e)))?;

        Ok(())
    }

    async fn add_risk(&self, risk: RiskRecord) -> crate::Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO research_risks (risk_id, risk_type, description, severity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(risk.risk_id)
        .bind(&risk.risk_type)
        .bind(&risk.description)
        .bind(&risk.severity)
        .bind(risk.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to insert risk: {}", e)))?;

        Ok(())
    }

    async fn add_report(&self, report: ReportRecord) -> crate::Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO research_reports (report_id, directive, content, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(report.report_id)
        .bind(&report.directive)
        .bind(&report.content)
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to insert report: {}", e)))?;

        Ok(())
    }

    async fn asset_by_symbol(&self, symbol: &str) -> crate::Result<Option<AssetRecord>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT symbol, name, last_price, recorded_at
            FROM research_assets
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to load asset: {}", e)))?;

        Ok(row.map(|row| AssetRecord {
            symbol: row.try_get("symbol").unwrap_or_default(),
            name: row.try_get("name").unwrap_or_default(),
            last_price: row.try_get("last_price").ok(),
            recorded_at: row.try_get("recorded_at").unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn risks_by_type(&self, risk_type: &str) -> crate::Result<Vec<RiskRecord>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT risk_id, risk_type, description, severity, recorded_at
            FROM research_risks
            WHERE risk_type = $1
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(risk_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to load risks: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| RiskRecord {
                risk_id: row.try_get("risk_id").unwrap_or_else(|_| Uuid::new_v4()),
                risk_type: row.try_get("risk_type").unwrap_or_default(),
                description: row.try_get("description").unwrap_or_default(),
                severity: row.try_get("severity").unwrap_or_default(),
                recorded_at: row.try_get("recorded_at").unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    async fn recent_reports(&self, limit: usize) -> crate::Result<Vec<ReportRecord>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT report_id, directive, content, created_at
            FROM research_reports
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WorkflowError::DatabaseError(format!("Failed to load reports: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| ReportRecord {
                report_id: row.try_get("report_id").unwrap_or_else(|_| Uuid::new_v4()),
                directive: row.try_get("directive").unwrap_or_default(),
                content: row.try_get("content").unwrap_or_default(),
                created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}

/// Build a memory store from the environment: Postgres when POSTGRES_URL
/// or DATABASE_URL is set and the pool can be created, in-memory otherwise.
pub fn build_store() -> Arc<dyn MemoryStore> {
    let database_url = env::var("POSTGRES_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok();

    if let Some(url) = database_url {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&url)
        {
            Ok(pool) => {
                tracing::info!("Research memory backend: postgres");
                return Arc::new(PgMemoryStore::new(pool));
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to initialize postgres memory backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    tracing::info!("Research memory backend: in-memory");
    Arc::new(InMemoryStore::new())
}
