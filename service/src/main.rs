//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use tokio::io::BufReader;

use senior_ml_core::{ModelRegistry, ScoringService};
use senior_ml_service::{logging, Dispatcher, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = logging::init(&settings) {
        eprintln!("logger already installed: {}", e);
    }

    info!(
        "Starting {} v{} (debug={}, max_concurrent_requests={})",
        settings.service_name,
        senior_ml_core::VERSION,
        settings.debug,
        settings.max_concurrent_requests
    );

    // trained models are supplied externally; none ship with the binary
    let models = Arc::new(ModelRegistry::empty());
    models.log_inventory();

    let service = Arc::new(ScoringService::new(models));
    let dispatcher = Dispatcher::new(service, &settings);

    let outcome = match std::env::args().nth(1) {
        Some(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => dispatcher.run(BufReader::new(file), tokio::io::stdout()).await,
            Err(e) => {
                error!("Cannot open input file {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            dispatcher
                .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
        }
    };

    match outcome {
        Ok(count) => {
            info!("Processed {} requests", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Request stream failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
