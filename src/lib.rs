//! Single-URL site auditing: fetch a page, run independent probes against it
//! concurrently and merge their findings, including near-duplicate content
//! across the crawled site, into one report.

pub mod analyzer;
pub mod api;
pub mod combinators;
pub mod config;
pub mod crawler;
pub mod data_models;
pub mod error;
pub mod fetcher;
pub mod llm;
pub mod orchestrator;
pub mod probes;
pub mod report;
pub mod shingles;
pub mod similarity;

pub use config::{AuditConfig, Settings};
pub use error::AuditError;
pub use orchestrator::AuditOrchestrator;
pub use report::AuditReport;
