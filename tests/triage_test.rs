//! Integration tests for the triage orchestrator
//!
//! Exercises the decision policy with fake classifier and analyzer
//! collaborators against in-memory storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use railtriage::analyzer::{IssueAnalysis, VisionAnalyzer};
use railtriage::classifier::{ClassificationResult, IssueClassifier};
use railtriage::error::{AnalyzerError, AnalyzerResult, AppError};
use railtriage::ocr::{EngineKind, TextExtractor};
use railtriage::stations::{StationIndex, StationRecord};
use railtriage::storage::{ComplaintStatus, Priority, SqliteStorage, Storage};
use railtriage::ticket::Provenance;
use railtriage::triage::{GpsFix, Submission, TicketInput, TriageEngine};

/// Classifier fake returning a fixed result.
struct FixedClassifier {
    result: ClassificationResult,
}

impl FixedClassifier {
    fn confident(category: &str, confidence: f64) -> Self {
        let mut probabilities = HashMap::new();
        probabilities.insert(category.to_string(), confidence);
        Self {
            result: ClassificationResult {
                category: Some(category.to_string()),
                confidence,
                probabilities,
                model_used: true,
            },
        }
    }

    fn unavailable() -> Self {
        Self {
            result: ClassificationResult::unavailable(),
        }
    }
}

impl IssueClassifier for FixedClassifier {
    fn classify(&self, _image_bytes: &[u8]) -> ClassificationResult {
        self.result.clone()
    }
}

/// Analyzer fake returning a fixed outcome and counting invocations.
struct FixedAnalyzer {
    outcome: Result<IssueAnalysis, String>,
    calls: AtomicUsize,
}

impl FixedAnalyzer {
    fn succeeding() -> Self {
        Self {
            outcome: Ok(IssueAnalysis {
                issue_category: "Cleanliness, Sanitation & Hygiene".to_string(),
                issue_details: "Dirty washbasin in coach B2".to_string(),
                priority: Priority::Low,
                department: "Housekeeping & Sanitation".to_string(),
                complaint_description: "The washbasin area needs cleaning.".to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAnalyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        _image_bytes: &[u8],
        _mime_type: &str,
        _user_text: Option<&str>,
    ) -> AnalyzerResult<IssueAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(analysis) => Ok(analysis.clone()),
            Err(message) => Err(AnalyzerError::Unavailable {
                message: message.clone(),
            }),
        }
    }
}

fn test_stations() -> Arc<StationIndex> {
    Arc::new(StationIndex::from_records(vec![StationRecord {
        name: "New Delhi".to_string(),
        code: Some("NDLS".to_string()),
        lat: 28.6419,
        lon: 77.2194,
    }]))
}

async fn build_engine(
    classifier: FixedClassifier,
    analyzer: Arc<FixedAnalyzer>,
) -> (TriageEngine, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
    let engine = TriageEngine::new(
        Arc::new(classifier),
        analyzer,
        storage.clone() as Arc<dyn Storage>,
        test_stations(),
        TextExtractor::new(EngineKind::Neural, PathBuf::from("/nonexistent")),
        0.5,
    );
    (engine, storage)
}

fn submission() -> Submission {
    Submission {
        owner: "user-1".to_string(),
        image: vec![1, 2, 3, 4],
        image_filename: Some("issue.jpg".to_string()),
        text: None,
        gps: None,
        ticket: None,
    }
}

#[cfg(test)]
mod decision_tests {
    use super::*;

    #[tokio::test]
    async fn test_confident_classifier_skips_analyzer() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("fire_smoke", 0.92), analyzer.clone()).await;

        let record = engine.triage(submission()).await.unwrap();

        assert_eq!(record.issue_category.as_deref(), Some("Fire Smoke"));
        assert_eq!(record.priority, Some(Priority::Critical));
        assert_eq!(
            record.department.as_deref(),
            Some("Emergency Services / RPF")
        );
        assert_eq!(record.issue_details.as_deref(), Some("AI-detected: Fire Smoke"));
        assert_eq!(record.ai_confidence, Some(0.92));
        assert_eq!(record.status, ComplaintStatus::Pending);
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfident_classifier_falls_back_to_analyzer() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.31), analyzer.clone()).await;

        let record = engine.triage(submission()).await.unwrap();

        assert_eq!(
            record.issue_category.as_deref(),
            Some("Cleanliness, Sanitation & Hygiene")
        );
        assert_eq!(record.priority, Some(Priority::Low));
        assert_eq!(
            record.issue_details.as_deref(),
            Some("Dirty washbasin in coach B2")
        );
        assert_eq!(record.description, "The washbasin area needs cleaning.");
        // Confidence is only recorded when the offline model decided.
        assert_eq!(record.ai_confidence, None);
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_model_falls_back_to_analyzer() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) = build_engine(FixedClassifier::unavailable(), analyzer.clone()).await;

        let record = engine.triage(submission()).await.unwrap();

        assert_eq!(
            record.department.as_deref(),
            Some("Housekeeping & Sanitation")
        );
        assert_eq!(record.ai_confidence, None);
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_both_collaborators_failing_files_degraded_complaint() {
        let analyzer = Arc::new(FixedAnalyzer::failing("GEMINI_API_KEY not configured"));
        let (engine, _) = build_engine(FixedClassifier::unavailable(), analyzer).await;

        let record = engine.triage(submission()).await.unwrap();

        assert_eq!(
            record.issue_category.as_deref(),
            Some("Other / Miscellaneous")
        );
        assert_eq!(record.priority, Some(Priority::Medium));
        assert_eq!(record.department.as_deref(), Some("Railway Administration"));
        assert_eq!(record.description, "Image analysis unavailable.");
        assert!(record
            .issue_details
            .as_deref()
            .unwrap()
            .contains("GEMINI_API_KEY not configured"));
        assert_eq!(record.ai_confidence, None);
    }

    #[tokio::test]
    async fn test_user_text_wins_over_generated_description() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("crowd", 0.8), analyzer).await;

        let mut sub = submission();
        sub.text = Some("Severe overcrowding on platform 4".to_string());
        let record = engine.triage(sub).await.unwrap();

        assert_eq!(record.description, "Severe overcrowding on platform 4");
    }

    #[tokio::test]
    async fn test_empty_image_is_invalid_input() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) = build_engine(FixedClassifier::unavailable(), analyzer).await;

        let mut sub = submission();
        sub.image = Vec::new();
        let err = engine.triage(sub).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput { .. }));
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;

    #[tokio::test]
    async fn test_gps_fix_attaches_railway_context() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let mut sub = submission();
        sub.gps = Some(GpsFix {
            latitude: 28.6419,
            longitude: 77.2194,
            accuracy_m: Some(5.0),
        });
        let record = engine.triage(sub).await.unwrap();

        let location = record.location.expect("location should be attached");
        assert_eq!(location.nearest_station.as_deref(), Some("New Delhi"));
        assert!(location
            .railway_context
            .contains("at or very close to station premises"));
    }

    #[tokio::test]
    async fn test_invalid_gps_is_dropped_silently() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let mut sub = submission();
        sub.gps = Some(GpsFix {
            latitude: 120.0,
            longitude: 77.0,
            accuracy_m: None,
        });
        let record = engine.triage(sub).await.unwrap();

        assert!(record.location.is_none());
        assert_eq!(record.status, ComplaintStatus::Pending);
    }

    #[tokio::test]
    async fn test_manual_train_details_attach_with_manual_provenance() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let mut sub = submission();
        sub.ticket = Some(TicketInput::Manual {
            json: r#"{"trainNumber": "12951", "coachNumber": "B2"}"#.to_string(),
        });
        let record = engine.triage(sub).await.unwrap();

        let details = record.train_details.expect("train details should be attached");
        assert_eq!(details.train_number.as_deref(), Some("12951"));
        assert_eq!(details.coach_number.as_deref(), Some("B2"));
        assert_eq!(details.provenance, Provenance::Manual);
    }

    #[tokio::test]
    async fn test_malformed_manual_train_details_are_ignored() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let mut sub = submission();
        sub.ticket = Some(TicketInput::Manual {
            json: "not json at all".to_string(),
        });
        let record = engine.triage(sub).await.unwrap();

        assert!(record.train_details.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_ticket_file_yields_no_details() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let mut sub = submission();
        sub.ticket = Some(TicketInput::File {
            data: b"garbage bytes".to_vec(),
            filename: "ticket.jpg".to_string(),
        });
        let record = engine.triage(sub).await.unwrap();

        assert!(record.train_details.is_none());
    }
}

#[cfg(test)]
mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_complaint_id_format_and_retrievability() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, storage) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let record = engine.triage(submission()).await.unwrap();

        assert!(record.complaint_id.starts_with("RM-"));
        assert_eq!(record.complaint_id.len(), "RM-20260801-XXXXXX".len());

        let fetched = storage
            .get_by_complaint_id(&record.complaint_id)
            .await
            .unwrap()
            .expect("triaged complaint should be retrievable");
        assert_eq!(fetched.complaint_id, record.complaint_id);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_ids() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, storage) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(
                async move { engine.triage(submission()).await },
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            ids.insert(record.complaint_id);
        }

        assert_eq!(ids.len(), 8);
        assert_eq!(storage.list_for_owner("user-1").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_successive_submissions_get_distinct_ids() {
        let analyzer = Arc::new(FixedAnalyzer::succeeding());
        let (engine, _) =
            build_engine(FixedClassifier::confident("trash", 0.9), analyzer).await;

        let first = engine.triage(submission()).await.unwrap();
        let second = engine.triage(submission()).await.unwrap();

        assert_ne!(first.complaint_id, second.complaint_id);
    }
}
