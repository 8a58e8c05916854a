//! Research memory
//!
//! Long-lived facts produced by executors — assets, narratives, risks,
//! and reports — persisted across workflow runs. Consumed only by the
//! executors, never by the driver, selector, or router.

pub mod store;

pub use store::{
    build_store, AssetRecord, InMemoryStore, MemoryStore, NarrativeRecord, PgMemoryStore,
    ReportRecord, RiskRecord,
};
