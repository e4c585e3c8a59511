//! # Railtriage
//!
//! Backend for a railway complaint intake and triage service. A submitted
//! complaint image is classified by an offline-trained model, falling back
//! to a vision-language analyzer when the model is unavailable or
//! unconfident; GPS fixes resolve to nearest-station railway context, and
//! ticket images run through OCR into structured train details. Every
//! submission ends as a persisted complaint record.
//!
//! ## Architecture
//!
//! ```text
//! Submission → TriageEngine ─┬─ OnnxClassifier (local model)
//!                            ├─ GeminiAnalyzer (HTTP fallback)
//!                            ├─ StationIndex (GPS → railway context)
//!                            ├─ TextExtractor (ticket OCR → train details)
//!                            └─ SqliteStorage (complaint records)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use railtriage::config::Config;
//! use railtriage::analyzer::GeminiAnalyzer;
//! use railtriage::classifier::OnnxClassifier;
//! use railtriage::ocr::TextExtractor;
//! use railtriage::stations::StationIndex;
//! use railtriage::storage::SqliteStorage;
//! use railtriage::triage::TriageEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let analyzer = Arc::new(GeminiAnalyzer::new(&config.analyzer, config.request.clone())?);
//!     let classifier = Arc::new(OnnxClassifier::new(config.classifier.clone()));
//!     let stations = Arc::new(StationIndex::load(&config.stations.path));
//!     let ocr = TextExtractor::new(config.ocr.default_engine, config.ocr.model_dir.clone());
//!     let engine = TriageEngine::new(
//!         classifier,
//!         analyzer,
//!         storage,
//!         stations,
//!         ocr,
//!         config.classifier.confidence_threshold,
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Vision-language fallback analyzer and response parsing.
pub mod analyzer;
/// Offline image classifier adapter.
pub mod classifier;
/// Configuration management from environment variables.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Ticket OCR pipeline and engine selection.
pub mod ocr;
/// Prompts for the vision-language analyzer.
pub mod prompts;
/// Nearest-station resolution from GPS coordinates.
pub mod stations;
/// Complaint record storage layer.
pub mod storage;
/// Ticket text parsing into structured train details.
pub mod ticket;
/// Triage orchestrator tying the collaborators together.
pub mod triage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use triage::{Submission, TriageEngine};
