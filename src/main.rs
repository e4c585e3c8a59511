use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use railtriage::analyzer::GeminiAnalyzer;
use railtriage::classifier::OnnxClassifier;
use railtriage::config::{Config, LogFormat};
use railtriage::ocr::TextExtractor;
use railtriage::stations::StationIndex;
use railtriage::storage::{ComplaintFilter, ComplaintStatus, SqliteStorage, Storage};
use railtriage::triage::{GpsFix, Submission, TicketInput, TriageEngine};

#[derive(Parser)]
#[command(name = "railtriage", version, about = "Railway complaint intake and triage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a complaint image for triage
    Submit {
        /// Owner reference the complaint is filed under
        #[arg(long)]
        owner: String,
        /// Path to the complaint image
        #[arg(long)]
        image: PathBuf,
        /// Free-text description of the issue
        #[arg(long)]
        text: Option<String>,
        /// GPS latitude in degrees
        #[arg(long, requires = "longitude")]
        latitude: Option<f64>,
        /// GPS longitude in degrees
        #[arg(long, requires = "latitude")]
        longitude: Option<f64>,
        /// GPS accuracy in meters
        #[arg(long)]
        accuracy: Option<f64>,
        /// Path to a ticket image or PDF to run through OCR
        #[arg(long, conflicts_with = "train_details")]
        ticket: Option<PathBuf>,
        /// Manually entered train details as a JSON object
        #[arg(long)]
        train_details: Option<String>,
    },
    /// Show one complaint by its public id
    Show {
        complaint_id: String,
    },
    /// List complaints with optional filters
    List {
        /// Filter by owner instead of the admin-wide listing
        #[arg(long)]
        owner: Option<String>,
        /// Filter by status (pending, in_progress, resolved)
        #[arg(long)]
        status: Option<ComplaintStatus>,
        /// Filter by issue category
        #[arg(long)]
        category: Option<String>,
        /// Substring filter on nearest station or railway context
        #[arg(long)]
        station: Option<String>,
        /// Filter by train number
        #[arg(long)]
        train: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    /// Update the status of a complaint
    SetStatus {
        complaint_id: String,
        /// New status (pending, in_progress, resolved)
        status: ComplaintStatus,
    },
    /// Assign a department to a complaint
    Assign {
        complaint_id: String,
        department: String,
    },
    /// Aggregate complaint counts by category, status, and priority
    Insights,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Arc::new(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Submit {
            owner,
            image,
            text,
            latitude,
            longitude,
            accuracy,
            ticket,
            train_details,
        } => {
            let analyzer = Arc::new(GeminiAnalyzer::new(
                &config.analyzer,
                config.request.clone(),
            )?);
            let classifier = Arc::new(OnnxClassifier::new(config.classifier.clone()));
            let stations = Arc::new(StationIndex::load(&config.stations.path));
            let ocr = TextExtractor::new(config.ocr.default_engine, config.ocr.model_dir.clone());

            let engine = TriageEngine::new(
                classifier,
                analyzer,
                storage,
                stations,
                ocr,
                config.classifier.confidence_threshold,
            );

            let image_bytes = std::fs::read(&image)?;
            let image_filename = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());

            let gps = match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(GpsFix {
                    latitude,
                    longitude,
                    accuracy_m: accuracy,
                }),
                _ => None,
            };

            let ticket_input = match (ticket, train_details) {
                (Some(path), _) => {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    Some(TicketInput::File {
                        data: std::fs::read(&path)?,
                        filename,
                    })
                }
                (None, Some(json)) => Some(TicketInput::Manual { json }),
                (None, None) => None,
            };

            let record = engine
                .triage(Submission {
                    owner,
                    image: image_bytes,
                    image_filename,
                    text,
                    gps,
                    ticket: ticket_input,
                })
                .await?;
            print_json(&record)?;
        }
        Command::Show { complaint_id } => {
            match storage.get_by_complaint_id(&complaint_id).await? {
                Some(record) => print_json(&record)?,
                None => {
                    eprintln!("Complaint not found: {}", complaint_id);
                    std::process::exit(1);
                }
            }
        }
        Command::List {
            owner,
            status,
            category,
            station,
            train,
            limit,
            offset,
        } => {
            let records = match owner {
                Some(owner) => storage.list_for_owner(&owner).await?,
                None => {
                    storage
                        .list(&ComplaintFilter {
                            status,
                            category,
                            station,
                            train_number: train,
                            limit,
                            offset,
                        })
                        .await?
                }
            };
            print_json(&records)?;
        }
        Command::SetStatus {
            complaint_id,
            status,
        } => {
            let record = storage.update_status(&complaint_id, status).await?;
            print_json(&record)?;
        }
        Command::Assign {
            complaint_id,
            department,
        } => {
            let record = storage.assign_department(&complaint_id, &department).await?;
            print_json(&record)?;
        }
        Command::Insights => {
            let insights = storage.insights().await?;
            print_json(&insights)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
