use crate::AnalysisReport;
use crate::error::{AnalysisError, Result};
use log::{error, info};
use std::fs;
use std::path::Path;

pub fn export_report_to_json(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    info!(
        "Exporting {} packages, {} dependency edges and {} interfaces to JSON: {:?}",
        report.project.packages.len(),
        report.dependencies.edges.len(),
        report.interfaces.interfaces.len(),
        output_path
    );

    let json = serde_json::to_string_pretty(report).map_err(|e| {
        error!("Failed to serialize report to JSON: {}", e);
        AnalysisError::from(e)
    })?;

    match fs::write(output_path, &json) {
        Ok(_) => {
            info!("Successfully wrote {} bytes to {:?}", json.len(), output_path);
            Ok(())
        }
        Err(e) => {
            error!("Failed to write JSON to file {:?}: {}", output_path, e);
            Err(AnalysisError::io(output_path, e))
        }
    }
}
