//! Record store for complaints, locations, and train details.
//!
//! Defines the domain types persisted for each complaint, the [`Storage`]
//! trait the orchestrator depends on, and the SQLite implementation.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::stations::LocationContext;
use crate::ticket::TrainDetails;

/// Lifecycle status of a complaint.
///
/// The triage pipeline only ever sets `pending`; later transitions are
/// admin-driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    /// Newly filed, awaiting triage by an administrator.
    #[default]
    Pending,
    /// Picked up by a department.
    InProgress,
    /// Closed as resolved.
    Resolved,
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplaintStatus::Pending => write!(f, "pending"),
            ComplaintStatus::InProgress => write!(f, "in_progress"),
            ComplaintStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ComplaintStatus::Pending),
            "in_progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            _ => Err(format!("Unknown complaint status: {}", s)),
        }
    }
}

/// Complaint priority assigned at triage time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "CRITICAL"),
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Ok(Priority::Critical),
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Payload for inserting a new complaint.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    /// Public complaint id, "RM-YYYYMMDD-XXXXXX".
    pub complaint_id: String,
    /// Opaque owner reference supplied by the auth collaborator.
    pub owner: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub issue_category: Option<String>,
    pub issue_details: Option<String>,
    /// Department suggested by the pipeline.
    pub department: Option<String>,
    /// Numeric confidence; set only when the offline classifier decided.
    pub ai_confidence: Option<f64>,
    pub image_filename: Option<String>,
}

/// A persisted complaint with its optional location and train details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintRecord {
    /// Internal row id.
    pub id: i64,
    /// Public complaint id, immutable once assigned.
    pub complaint_id: String,
    pub owner: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub priority: Option<Priority>,
    pub issue_category: Option<String>,
    pub issue_details: Option<String>,
    /// Department suggested by the triage pipeline.
    pub department: Option<String>,
    /// Department assigned by an administrator, independent of the
    /// suggestion.
    pub assigned_department: Option<String>,
    pub ai_confidence: Option<f64>,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_details: Option<TrainDetails>,
}

/// Admin listing filters.
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub category: Option<String>,
    /// Substring match against nearest station or railway context.
    pub station: Option<String>,
    pub train_number: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregated complaint counts for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub by_category: HashMap<String, i64>,
    pub by_status: HashMap<String, i64>,
    pub by_priority: HashMap<String, i64>,
}

/// Record-store contract used by the triage orchestrator and the admin
/// surface.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a complaint with its optional location and train details as
    /// one transaction. A duplicate complaint id fails with
    /// [`crate::error::StorageError::Conflict`].
    async fn insert_complaint(
        &self,
        complaint: &NewComplaint,
        location: Option<&LocationContext>,
        train_details: Option<&TrainDetails>,
    ) -> StorageResult<ComplaintRecord>;

    /// Whether a complaint with the given public id exists.
    async fn exists_with_id(&self, complaint_id: &str) -> StorageResult<bool>;

    /// Fetch a complaint by public id.
    async fn get_by_complaint_id(&self, complaint_id: &str) -> StorageResult<Option<ComplaintRecord>>;

    /// List complaints for one owner, newest first.
    async fn list_for_owner(&self, owner: &str) -> StorageResult<Vec<ComplaintRecord>>;

    /// Admin listing with optional filters, newest first.
    async fn list(&self, filter: &ComplaintFilter) -> StorageResult<Vec<ComplaintRecord>>;

    /// Update the status of a complaint (admin-driven transition).
    async fn update_status(
        &self,
        complaint_id: &str,
        status: ComplaintStatus,
    ) -> StorageResult<ComplaintRecord>;

    /// Assign a department, independent of the pipeline suggestion.
    async fn assign_department(
        &self,
        complaint_id: &str,
        department: &str,
    ) -> StorageResult<ComplaintRecord>;

    /// Aggregate counts by category, status, and priority.
    async fn insights(&self) -> StorageResult<Insights>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            "pending".parse::<ComplaintStatus>().unwrap(),
            ComplaintStatus::Pending
        );
        assert_eq!(
            "in_progress".parse::<ComplaintStatus>().unwrap(),
            ComplaintStatus::InProgress
        );
        assert_eq!(
            "Resolved".parse::<ComplaintStatus>().unwrap(),
            ComplaintStatus::Resolved
        );
        assert!("closed".parse::<ComplaintStatus>().is_err());
        assert_eq!(ComplaintStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_priority_round_trip() {
        assert_eq!("CRITICAL".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert!("URGENT".parse::<Priority>().is_err());
        assert_eq!(Priority::High.to_string(), "HIGH");
    }

    #[test]
    fn test_priority_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"CRITICAL\""
        );
        let p: Priority = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }

    #[test]
    fn test_complaint_record_serializes_camel_case() {
        let record = ComplaintRecord {
            id: 1,
            complaint_id: "RM-20260801-A1B2C3".to_string(),
            owner: "user-42".to_string(),
            description: "Broken fan".to_string(),
            status: ComplaintStatus::Pending,
            priority: Some(Priority::Medium),
            issue_category: Some("Faulty Amenities & Infrastructure".to_string()),
            issue_details: None,
            department: Some("Electrical & Maintenance".to_string()),
            assigned_department: None,
            ai_confidence: Some(0.91),
            image_filename: Some("fan.jpg".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            location: None,
            train_details: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["complaintId"], "RM-20260801-A1B2C3");
        assert_eq!(json["issueCategory"], "Faulty Amenities & Infrastructure");
        assert_eq!(json["aiConfidence"], 0.91);
        assert_eq!(json["status"], "pending");
        assert!(json.get("location").is_none());
    }
}
