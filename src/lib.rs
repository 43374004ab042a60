pub mod catalog; // Drug Catalog, Alias Index, Rule Index, snapshots
pub mod config;
pub mod interaction; // Extraction, resolution, aggregation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::EngineConfig;
use interaction::{AssessmentRequest, EngineError, InteractionEngine, RiskAssessment};

#[derive(Debug, Parser)]
#[command(name = config::APP_NAME)]
#[command(version = config::APP_VERSION)]
#[command(about = "Match label text against a drug catalog and report interaction risk", long_about = None)]
pub struct CliArgs {
    /// Catalog directory holding drug_classes.json, drugs.json and interaction_rules.json
    #[arg(short, long, env = config::CATALOG_DIR_ENV)]
    pub catalog_dir: PathBuf,

    /// Engine config JSON (defaults when absent)
    #[arg(long, env = config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Medication the patient already takes (repeatable)
    #[arg(long = "known", value_name = "NAME")]
    pub known: Vec<String>,

    /// Raw label text fragments
    pub fragments: Vec<String>,
}

impl CliArgs {
    pub fn request(&self) -> AssessmentRequest {
        AssessmentRequest {
            fragments: self.fragments.clone(),
            known_medications: self.known.clone(),
        }
    }
}

/// Load config and catalog, then run one assessment.
pub fn assess_once(
    catalog_dir: &Path,
    config_path: Option<&Path>,
    request: &AssessmentRequest,
) -> Result<RiskAssessment, EngineError> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = InteractionEngine::load_dir(catalog_dir, config)?;
    engine.assess(request)
}

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("rxguard starting v{}", config::APP_VERSION);

    let args = CliArgs::parse();

    let assessment = match assess_once(&args.catalog_dir, args.config.as_deref(), &args.request()) {
        Ok(assessment) => assessment,
        Err(e) => {
            tracing::error!(error = %e, "Assessment failed");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&assessment) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to render assessment: {e}");
            ExitCode::FAILURE
        }
    }
}
