use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Complaint not found: {complaint_id}")]
    ComplaintNotFound { complaint_id: String },

    #[error("Complaint id already exists: {complaint_id}")]
    Conflict { complaint_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Vision-language analyzer errors
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer unavailable: {message}")]
    Unavailable { message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse analysis response: {message}")]
    Parse { message: String, raw: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Image classifier errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Image decode failed: {message}")]
    Decode { message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },
}

/// OCR pipeline errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode failed: {message}")]
    Decode { message: String },

    #[error("OCR engine failed: {message}")]
    Engine { message: String },
}

/// Location resolution errors
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for analyzer operations
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Result type alias for classifier operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Result type alias for OCR operations
pub type OcrResult<T> = Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::InvalidInput {
            message: "image file is required".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input: image file is required");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Conflict {
            complaint_id: "RM-20260801-A1B2C3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Complaint id already exists: RM-20260801-A1B2C3"
        );

        let err = StorageError::ComplaintNotFound {
            complaint_id: "RM-20260801-XXXXXX".to_string(),
        };
        assert_eq!(err.to_string(), "Complaint not found: RM-20260801-XXXXXX");
    }

    #[test]
    fn test_analyzer_error_display() {
        let err = AnalyzerError::Unavailable {
            message: "GEMINI_API_KEY not set".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Analyzer unavailable: GEMINI_API_KEY not set"
        );

        let err = AnalyzerError::Parse {
            message: "missing required field: priority".to_string(),
            raw: "{}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse analysis response: missing required field: priority"
        );

        let err = AnalyzerError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_location_error_display() {
        let err = LocationError::InvalidCoordinate {
            latitude: 120.0,
            longitude: 77.2,
        };
        assert_eq!(
            err.to_string(),
            "Invalid coordinate: latitude 120, longitude 77.2"
        );
    }

    #[test]
    fn test_error_conversion_to_app_error() {
        let storage_err = StorageError::Query {
            message: "syntax error".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));

        let analyzer_err = AnalyzerError::Timeout { timeout_ms: 1000 };
        let app_err: AppError = analyzer_err.into();
        assert!(matches!(app_err, AppError::Analyzer(_)));

        let location_err = LocationError::InvalidCoordinate {
            latitude: -91.0,
            longitude: 0.0,
        };
        let app_err: AppError = location_err.into();
        assert!(matches!(app_err, AppError::Location(_)));
    }
}
