use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::QueryBuilder;
use std::str::FromStr;
use tracing::info;

use super::{
    ComplaintFilter, ComplaintRecord, ComplaintStatus, Insights, NewComplaint, Storage,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::stations::LocationContext;
use crate::ticket::TrainDetails;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance (for tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Attach location and train details to a complaint row.
    async fn hydrate(&self, row: ComplaintRow) -> StorageResult<ComplaintRecord> {
        let location: Option<LocationRow> = sqlx::query_as(
            r#"
            SELECT latitude, longitude, accuracy_m, nearest_station, station_code,
                   station_proximity_km, railway_context, captured_at
            FROM complaint_locations
            WHERE complaint_id = ?
            "#,
        )
        .bind(row.id)
        .fetch_optional(&self.pool)
        .await?;

        let train: Option<TrainRow> = sqlx::query_as(
            r#"
            SELECT train_number, train_name, coach_number, seat_number,
                   boarding_station, destination_station, provenance, raw_text
            FROM train_details
            WHERE complaint_id = ?
            "#,
        )
        .bind(row.id)
        .fetch_optional(&self.pool)
        .await?;

        let mut record: ComplaintRecord = row.into();
        record.location = location.map(|l| l.into());
        record.train_details = train.map(|t| t.into());
        Ok(record)
    }

    async fn require_by_complaint_id(&self, complaint_id: &str) -> StorageResult<ComplaintRecord> {
        self.get_by_complaint_id(complaint_id)
            .await?
            .ok_or_else(|| StorageError::ComplaintNotFound {
                complaint_id: complaint_id.to_string(),
            })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn insert_complaint(
        &self,
        complaint: &NewComplaint,
        location: Option<&LocationContext>,
        train_details: Option<&TrainDetails>,
    ) -> StorageResult<ComplaintRecord> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO complaints (
                complaint_id, owner, description, status, priority,
                issue_category, issue_details, department, ai_confidence,
                image_filename, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&complaint.complaint_id)
        .bind(&complaint.owner)
        .bind(&complaint.description)
        .bind(ComplaintStatus::Pending.to_string())
        .bind(complaint.priority.map(|p| p.to_string()))
        .bind(&complaint.issue_category)
        .bind(&complaint.issue_details)
        .bind(&complaint.department)
        .bind(complaint.ai_confidence)
        .bind(&complaint.image_filename)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict {
                complaint_id: complaint.complaint_id.clone(),
            },
            _ => StorageError::Sqlx(e),
        })?;

        let db_id = result.last_insert_rowid();

        if let Some(loc) = location {
            sqlx::query(
                r#"
                INSERT INTO complaint_locations (
                    complaint_id, latitude, longitude, accuracy_m, nearest_station,
                    station_code, station_proximity_km, railway_context, captured_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(db_id)
            .bind(loc.latitude)
            .bind(loc.longitude)
            .bind(loc.accuracy_m)
            .bind(&loc.nearest_station)
            .bind(&loc.station_code)
            .bind(loc.station_proximity_km)
            .bind(&loc.railway_context)
            .bind(loc.captured_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(train) = train_details {
            sqlx::query(
                r#"
                INSERT INTO train_details (
                    complaint_id, train_number, train_name, coach_number, seat_number,
                    boarding_station, destination_station, provenance, raw_text, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(db_id)
            .bind(&train.train_number)
            .bind(&train.train_name)
            .bind(&train.coach_number)
            .bind(&train.seat_number)
            .bind(&train.boarding_station)
            .bind(&train.destination_station)
            .bind(train.provenance.to_string())
            .bind(&train.raw_text)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.require_by_complaint_id(&complaint.complaint_id).await
    }

    async fn exists_with_id(&self, complaint_id: &str) -> StorageResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM complaints WHERE complaint_id = ?")
                .bind(complaint_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn get_by_complaint_id(
        &self,
        complaint_id: &str,
    ) -> StorageResult<Option<ComplaintRecord>> {
        let row: Option<ComplaintRow> = sqlx::query_as(
            r#"
            SELECT id, complaint_id, owner, description, status, priority,
                   issue_category, issue_details, department, assigned_department,
                   ai_confidence, image_filename, created_at, updated_at
            FROM complaints
            WHERE complaint_id = ?
            "#,
        )
        .bind(complaint_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_owner(&self, owner: &str) -> StorageResult<Vec<ComplaintRecord>> {
        let rows: Vec<ComplaintRow> = sqlx::query_as(
            r#"
            SELECT id, complaint_id, owner, description, status, priority,
                   issue_category, issue_details, department, assigned_department,
                   ai_confidence, image_filename, created_at, updated_at
            FROM complaints
            WHERE owner = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.hydrate(row).await?);
        }
        Ok(records)
    }

    async fn list(&self, filter: &ComplaintFilter) -> StorageResult<Vec<ComplaintRecord>> {
        let mut qb = QueryBuilder::new(
            "SELECT DISTINCT c.id, c.complaint_id, c.owner, c.description, c.status, \
             c.priority, c.issue_category, c.issue_details, c.department, \
             c.assigned_department, c.ai_confidence, c.image_filename, \
             c.created_at, c.updated_at FROM complaints c",
        );

        if filter.station.is_some() {
            qb.push(" JOIN complaint_locations l ON l.complaint_id = c.id");
        }
        if filter.train_number.is_some() {
            qb.push(" JOIN train_details t ON t.complaint_id = c.id");
        }

        qb.push(" WHERE 1 = 1");

        if let Some(status) = filter.status {
            qb.push(" AND c.status = ").push_bind(status.to_string());
        }
        if let Some(category) = &filter.category {
            qb.push(" AND c.issue_category = ").push_bind(category.clone());
        }
        if let Some(station) = &filter.station {
            let pattern = format!("%{}%", station);
            qb.push(" AND (l.nearest_station LIKE ")
                .push_bind(pattern.clone())
                .push(" OR l.railway_context LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(train_number) = &filter.train_number {
            qb.push(" AND (t.train_number = ")
                .push_bind(train_number.clone())
                .push(" OR t.train_number LIKE ")
                .push_bind(format!("%{}%", train_number))
                .push(")");
        }

        qb.push(" ORDER BY c.created_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(100))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0));

        let rows: Vec<ComplaintRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.hydrate(row).await?);
        }
        Ok(records)
    }

    async fn update_status(
        &self,
        complaint_id: &str,
        status: ComplaintStatus,
    ) -> StorageResult<ComplaintRecord> {
        let result = sqlx::query(
            "UPDATE complaints SET status = ?, updated_at = ? WHERE complaint_id = ?",
        )
        .bind(status.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(complaint_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ComplaintNotFound {
                complaint_id: complaint_id.to_string(),
            });
        }

        self.require_by_complaint_id(complaint_id).await
    }

    async fn assign_department(
        &self,
        complaint_id: &str,
        department: &str,
    ) -> StorageResult<ComplaintRecord> {
        let result = sqlx::query(
            "UPDATE complaints SET assigned_department = ?, updated_at = ? WHERE complaint_id = ?",
        )
        .bind(department)
        .bind(Utc::now().to_rfc3339())
        .bind(complaint_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ComplaintNotFound {
                complaint_id: complaint_id.to_string(),
            });
        }

        self.require_by_complaint_id(complaint_id).await
    }

    async fn insights(&self) -> StorageResult<Insights> {
        let by_category: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT issue_category, COUNT(id)
            FROM complaints
            WHERE issue_category IS NOT NULL
            GROUP BY issue_category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(id) FROM complaints GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_priority: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT priority, COUNT(id)
            FROM complaints
            WHERE priority IS NOT NULL
            GROUP BY priority
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Insights {
            by_category: by_category.into_iter().collect(),
            by_status: by_status.into_iter().collect(),
            by_priority: by_priority.into_iter().collect(),
        })
    }
}

// Internal row types for SQLx mapping

#[derive(sqlx::FromRow)]
struct ComplaintRow {
    id: i64,
    complaint_id: String,
    owner: String,
    description: String,
    status: String,
    priority: Option<String>,
    issue_category: Option<String>,
    issue_details: Option<String>,
    department: Option<String>,
    assigned_department: Option<String>,
    ai_confidence: Option<f64>,
    image_filename: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<ComplaintRow> for ComplaintRecord {
    fn from(row: ComplaintRow) -> Self {
        Self {
            id: row.id,
            complaint_id: row.complaint_id,
            owner: row.owner,
            description: row.description,
            status: row.status.parse().unwrap_or_default(),
            priority: row.priority.and_then(|p| p.parse().ok()),
            issue_category: row.issue_category,
            issue_details: row.issue_details,
            department: row.department,
            assigned_department: row.assigned_department,
            ai_confidence: row.ai_confidence,
            image_filename: row.image_filename,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            location: None,
            train_details: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    latitude: f64,
    longitude: f64,
    accuracy_m: Option<f64>,
    nearest_station: Option<String>,
    station_code: Option<String>,
    station_proximity_km: Option<f64>,
    railway_context: String,
    captured_at: String,
}

impl From<LocationRow> for LocationContext {
    fn from(row: LocationRow) -> Self {
        Self {
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy_m: row.accuracy_m,
            nearest_station: row.nearest_station,
            station_code: row.station_code,
            station_proximity_km: row.station_proximity_km,
            railway_context: row.railway_context,
            captured_at: parse_timestamp(&row.captured_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TrainRow {
    train_number: Option<String>,
    train_name: Option<String>,
    coach_number: Option<String>,
    seat_number: Option<String>,
    boarding_station: Option<String>,
    destination_station: Option<String>,
    provenance: String,
    raw_text: Option<String>,
}

impl From<TrainRow> for TrainDetails {
    fn from(row: TrainRow) -> Self {
        Self {
            train_number: row.train_number,
            train_name: row.train_name,
            coach_number: row.coach_number,
            seat_number: row.seat_number,
            boarding_station: row.boarding_station,
            destination_station: row.destination_station,
            provenance: row.provenance.parse().unwrap_or_default(),
            raw_text: row.raw_text,
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
