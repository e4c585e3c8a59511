use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::ocr::EngineKind;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub classifier: ClassifierConfig,
    pub ocr: OcrConfig,
    pub stations: StationConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Vision-language analyzer (Gemini) configuration.
///
/// The API key is optional: without it the analyzer reports itself
/// unavailable at call time and the pipeline degrades, it is not a
/// startup error.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Image classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    pub classes_path: PathBuf,
    /// Minimum classifier confidence before falling back to the analyzer.
    pub confidence_threshold: f64,
}

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub default_engine: EngineKind,
    /// Recognition model directory for the neural reader.
    pub model_dir: PathBuf,
}

/// Station index configuration
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub path: PathBuf,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let analyzer = AnalyzerConfig {
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com".to_string()
            }),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
        };

        let classifier = ClassifierConfig {
            model_path: PathBuf::from(
                env::var("ML_MODEL_PATH")
                    .unwrap_or_else(|_| "./models/railway_issue_model.onnx".to_string()),
            ),
            classes_path: PathBuf::from(
                env::var("ML_CLASSES_PATH")
                    .unwrap_or_else(|_| "./models/railway_model_classes.json".to_string()),
            ),
            confidence_threshold: env::var("ML_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.5),
        };

        let ocr = OcrConfig {
            default_engine: match env::var("OCR_ENGINE")
                .unwrap_or_else(|_| "neural".to_string())
                .to_lowercase()
                .as_str()
            {
                "tesseract" => EngineKind::Tesseract,
                _ => EngineKind::Neural,
            },
            model_dir: PathBuf::from(
                env::var("OCR_MODEL_DIR").unwrap_or_else(|_| "./models/ocr".to_string()),
            ),
        };

        let stations = StationConfig {
            path: PathBuf::from(
                env::var("STATIONS_JSON_PATH")
                    .unwrap_or_else(|_| "./data/railway_stations.json".to_string()),
            ),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/complaints.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        Ok(Config {
            analyzer,
            classifier,
            ocr,
            stations,
            database,
            logging,
            request,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}
