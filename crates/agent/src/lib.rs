//! Query pipeline - natural-language store questions to validated queries
//!
//! This crate turns a merchant's question into a read-only analytics query and
//! a business-friendly answer:
//! - Classifies the question into a structured `Intent`
//! - Plans the tables, fields, and aggregation that answer it
//! - Generates a constrained SQL-like query
//! - Validates the query against a fixed allowlist before anything runs
//! - Formats executor rows into an answer with a confidence label
//!
//! # Architecture
//!
//! The pipeline is linear, with no retries or back-edges:
//! 1. **Intent Classification** (`classifier`) - text → `Intent`
//! 2. **Source Planning** (`planner`) - `Intent` → `Plan`
//! 3. **Query Generation** (`generator`) - `(Intent, Plan)` → query text
//! 4. **Validation** (`validator`) - query text → `ValidationResult`
//! 5. **Formatting** (`formatter`) - rows → answer text + confidence
//!
//! `runtime::QueryPipeline` runs the stages and makes the single awaited call
//! to the configured `DataExecutor`.
//!
//! # Safety Principle
//!
//! The validator is the only safety boundary. A query that fails any check is
//! returned as a rejection and is never handed to the executor.

pub mod classifier;
pub mod formatter;
pub mod generator;
pub mod planner;
pub mod runtime;
pub mod validator;

pub use classifier::IntentClassifier;
pub use formatter::AnswerFormatter;
pub use generator::QueryGenerator;
pub use planner::{PlanError, SourcePlanner};
pub use runtime::{QueryPipeline, QueryRequest, ReferenceDate};
pub use validator::QueryValidator;
