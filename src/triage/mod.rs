//! Complaint triage orchestrator.
//!
//! Runs the decision policy over one submission: classify the image with the
//! offline model, fall back to the vision-language analyzer when the model is
//! unavailable or unconfident, attach location and ticket context, and
//! persist the record. Collaborator failures degrade the record, they never
//! fail the submission; only invalid input and storage failures do.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::analyzer::VisionAnalyzer;
use crate::classifier::IssueClassifier;
use crate::error::{AppError, AppResult, StorageError};
use crate::ocr::TextExtractor;
use crate::stations::{LocationContext, StationIndex};
use crate::storage::{NewComplaint, ComplaintRecord, Priority, Storage};
use crate::ticket::{Provenance, TrainDetails};

/// Complaint id prefix; the full id is `RM-YYYYMMDD-XXXXXX`.
const ID_PREFIX: &str = "RM";
/// Random suffix alphabet and length for complaint ids.
const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_SUFFIX_LEN: usize = 6;
/// Bound on id collision retries before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

/// Category used when neither the classifier nor the analyzer produced one.
const FALLBACK_CATEGORY: &str = "Other / Miscellaneous";
/// Department used for unrouted categories.
const FALLBACK_DEPARTMENT: &str = "Railway Administration";

/// Classifier categories with their routing: (class, department, priority).
const CLASS_ROUTING: [(&str, &str, Priority); 5] = [
    (
        "crowd",
        "Railway Administration / Crowd Management",
        Priority::High,
    ),
    ("dirty_toilet", "Housekeeping & Sanitation", Priority::Medium),
    ("fire_smoke", "Emergency Services / RPF", Priority::Critical),
    ("food", "Catering & Railway Administration", Priority::Medium),
    ("trash", "Housekeeping & Sanitation", Priority::Medium),
];

/// Department routed for a classifier category.
pub fn department_for_class(category: &str) -> &'static str {
    CLASS_ROUTING
        .iter()
        .find(|(class, _, _)| *class == category)
        .map(|(_, department, _)| *department)
        .unwrap_or(FALLBACK_DEPARTMENT)
}

/// Priority routed for a classifier category.
pub fn priority_for_class(category: &str) -> Priority {
    CLASS_ROUTING
        .iter()
        .find(|(class, _, _)| *class == category)
        .map(|(_, _, priority)| *priority)
        .unwrap_or(Priority::Medium)
}

/// Human-readable form of a classifier category
/// ("dirty_toilet" -> "Dirty Toilet").
pub fn display_category(category: &str) -> String {
    category
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A GPS fix supplied with a submission.
#[derive(Debug, Clone, Copy)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

/// Optional ticket context supplied with a submission.
#[derive(Debug, Clone)]
pub enum TicketInput {
    /// A ticket image or PDF to run through OCR.
    File { data: Vec<u8>, filename: String },
    /// Manually entered train details as a JSON object.
    Manual { json: String },
}

/// One complaint submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Opaque owner reference.
    pub owner: String,
    /// Complaint image bytes; required.
    pub image: Vec<u8>,
    pub image_filename: Option<String>,
    /// Free-text description from the user.
    pub text: Option<String>,
    pub gps: Option<GpsFix>,
    pub ticket: Option<TicketInput>,
}

/// What the pipeline decided about the image, before persistence.
#[derive(Debug, Clone)]
struct Decision {
    issue_category: String,
    issue_details: String,
    priority: Priority,
    department: String,
    description: String,
    /// Set only when the offline classifier made the decision.
    ai_confidence: Option<f64>,
}

/// The triage pipeline with its injected collaborators.
pub struct TriageEngine {
    classifier: Arc<dyn IssueClassifier>,
    analyzer: Arc<dyn VisionAnalyzer>,
    storage: Arc<dyn Storage>,
    stations: Arc<StationIndex>,
    ocr: TextExtractor,
    confidence_threshold: f64,
}

impl TriageEngine {
    pub fn new(
        classifier: Arc<dyn IssueClassifier>,
        analyzer: Arc<dyn VisionAnalyzer>,
        storage: Arc<dyn Storage>,
        stations: Arc<StationIndex>,
        ocr: TextExtractor,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            classifier,
            analyzer,
            storage,
            stations,
            ocr,
            confidence_threshold,
        }
    }

    /// Run the full triage pipeline over one submission and persist the
    /// resulting complaint.
    pub async fn triage(&self, submission: Submission) -> AppResult<ComplaintRecord> {
        if submission.image.is_empty() {
            return Err(AppError::InvalidInput {
                message: "image file is required".to_string(),
            });
        }
        if submission.owner.trim().is_empty() {
            return Err(AppError::InvalidInput {
                message: "owner is required".to_string(),
            });
        }

        let decision = self.decide(&submission).await;
        let location = self.resolve_location(submission.gps.as_ref());
        let train_details = self.resolve_ticket(submission.ticket.clone()).await;

        let new_complaint = NewComplaint {
            complaint_id: String::new(),
            owner: submission.owner.clone(),
            description: decision.description.clone(),
            priority: Some(decision.priority),
            issue_category: Some(decision.issue_category.clone()),
            issue_details: Some(decision.issue_details.clone()),
            department: Some(decision.department.clone()),
            ai_confidence: decision.ai_confidence,
            image_filename: submission.image_filename.clone(),
        };

        let record = self
            .insert_with_fresh_id(new_complaint, location.as_ref(), train_details.as_ref())
            .await?;

        info!(
            complaint_id = %record.complaint_id,
            category = %decision.issue_category,
            priority = %decision.priority,
            model_used = decision.ai_confidence.is_some(),
            "Complaint triaged"
        );

        Ok(record)
    }

    /// Classifier-first decision with analyzer fallback.
    async fn decide(&self, submission: &Submission) -> Decision {
        let classifier = Arc::clone(&self.classifier);
        let image = submission.image.clone();

        // Inference is CPU-bound; keep it off the async runtime.
        let result = tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Classifier task panicked, treating model as unavailable");
                crate::classifier::ClassificationResult::unavailable()
            });

        if let Some(category) = result
            .category
            .as_deref()
            .filter(|_| result.model_used && result.confidence >= self.confidence_threshold)
        {
            debug!(
                category,
                confidence = result.confidence,
                "Classifier confident, skipping analyzer"
            );
            let display = display_category(category);
            return Decision {
                issue_category: display.clone(),
                issue_details: format!("AI-detected: {}", display),
                priority: priority_for_class(category),
                department: department_for_class(category).to_string(),
                description: submission
                    .text
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("Issue category: {}", display)),
                ai_confidence: Some(result.confidence),
            };
        }

        let mime_type = mime_for_filename(submission.image_filename.as_deref());
        match self
            .analyzer
            .analyze(&submission.image, mime_type, submission.text.as_deref())
            .await
        {
            Ok(analysis) => Decision {
                issue_category: analysis.issue_category,
                issue_details: analysis.issue_details,
                priority: analysis.priority,
                department: analysis.department,
                description: submission
                    .text
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(analysis.complaint_description),
                ai_confidence: None,
            },
            Err(e) => {
                warn!(error = %e, "Vision analysis failed, filing degraded complaint");
                Decision {
                    issue_category: FALLBACK_CATEGORY.to_string(),
                    issue_details: e.to_string(),
                    priority: Priority::Medium,
                    department: FALLBACK_DEPARTMENT.to_string(),
                    description: submission
                        .text
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| "Image analysis unavailable.".to_string()),
                    ai_confidence: None,
                }
            }
        }
    }

    /// Resolve the GPS fix to railway context. Invalid coordinates drop the
    /// location rather than failing the submission.
    fn resolve_location(&self, gps: Option<&GpsFix>) -> Option<LocationContext> {
        let fix = gps?;
        match self
            .stations
            .resolve(fix.latitude, fix.longitude, fix.accuracy_m)
        {
            Ok(context) => Some(context),
            Err(e) => {
                warn!(error = %e, "Location ignored");
                None
            }
        }
    }

    /// Resolve ticket context from OCR or manual entry. Both paths are
    /// best-effort; empty or malformed input yields no train details.
    async fn resolve_ticket(&self, ticket: Option<TicketInput>) -> Option<TrainDetails> {
        match ticket? {
            TicketInput::File { data, filename } => {
                let ocr = self.ocr.clone();
                let details =
                    tokio::task::spawn_blocking(move || ocr.extract_train_details(&data, &filename))
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "Ticket OCR task panicked");
                            TrainDetails::default()
                        });
                if details.is_empty() && details.raw_text.is_none() {
                    None
                } else {
                    Some(details)
                }
            }
            TicketInput::Manual { json } => match serde_json::from_str::<TrainDetails>(&json) {
                Ok(mut details) => {
                    details.provenance = Provenance::Manual;
                    if details.is_empty() {
                        None
                    } else {
                        Some(details)
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Manual train details malformed, ignored");
                    None
                }
            },
        }
    }

    /// Insert with a freshly generated id, retrying on the rare collision.
    async fn insert_with_fresh_id(
        &self,
        mut complaint: NewComplaint,
        location: Option<&LocationContext>,
        train_details: Option<&TrainDetails>,
    ) -> AppResult<ComplaintRecord> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            complaint.complaint_id = generate_complaint_id();
            match self
                .storage
                .insert_complaint(&complaint, location, train_details)
                .await
            {
                Ok(record) => return Ok(record),
                Err(StorageError::Conflict { complaint_id }) => {
                    warn!(complaint_id, attempt, "Complaint id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal {
            message: format!(
                "could not generate a unique complaint id after {} attempts",
                MAX_ID_ATTEMPTS
            ),
        })
    }
}

/// Generate a public complaint id, "RM-YYYYMMDD-XXXXXX".
pub fn generate_complaint_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect();
    format!("{}-{}-{}", ID_PREFIX, Utc::now().format("%Y%m%d"), suffix)
}

/// MIME type for an image filename, defaulting to JPEG.
fn mime_for_filename(filename: Option<&str>) -> &'static str {
    let ext = filename
        .and_then(|f| f.rsplit('.').next())
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}
