use log::{error, info, warn};
use relik_gomodel::indexing::PatternConventionDetector;
use relik_gomodel::utils::io::export_report_to_json;
use relik_gomodel::{Analyzer, AnalyzerConfig, CancellationToken, analyze_project, version};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

fn main() -> ExitCode {
    // Initialize logger
    if std::env::var_os("RUST_LOG").is_none() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        error!("Not enough arguments provided");
        eprintln!("Usage: {} <project_root> [output_path] [num_workers]", args[0]);
        eprintln!("Version: {}", version());
        return ExitCode::FAILURE;
    }

    let root_path = Path::new(&args[1]);
    let output_path = if args.len() >= 3 {
        Path::new(&args[2])
    } else {
        Path::new("go_model.json")
    };

    let cli_workers = if args.len() >= 4 {
        match args[3].parse::<usize>() {
            Ok(workers) => Some(workers),
            Err(_) => {
                warn!("Invalid worker count provided, using the configured default");
                None
            }
        }
    } else {
        None
    };

    // Optional config next to the project
    let config_path = root_path.join("gomodel.json");
    let config = if config_path.is_file() {
        match AnalyzerConfig::from_json_file(&config_path) {
            Ok(config) => {
                info!("Loaded analyzer config from {:?}", config_path);
                config
            }
            Err(e) => {
                warn!("Ignoring unreadable config {:?}: {}", config_path, e);
                AnalyzerConfig::default()
            }
        }
    } else {
        AnalyzerConfig::default()
    };

    let num_workers = config.workers_for(cli_workers);

    info!("Relik Go model v{}", version());
    info!("Analyzing project at: {:?}", root_path);
    info!("Using {} workers", num_workers);

    let start_time = Instant::now();
    let analyzer = Analyzer::new(config).with_convention_detector(Arc::new(PatternConventionDetector::default()));

    let report = match analyze_project(&analyzer, &CancellationToken::new(), root_path, num_workers) {
        Ok(report) => report,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = export_report_to_json(&report, output_path) {
        error!("Export failed: {}", e);
        return ExitCode::FAILURE;
    }

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2?}", elapsed);
    info!("Output saved to: {:?}", output_path);

    ExitCode::SUCCESS
}
