pub mod analysis;
pub mod config;
pub mod error;
pub mod indexing;
pub mod model;
pub mod parsers;
pub mod utils;

pub use analysis::{DependencyGraph, InterfaceAnalysis};
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Result};
pub use indexing::{Analyzer, CancellationToken};
pub use model::{Package, Project};

use log::{debug, info};
use serde::Serialize;
use std::path::Path;

/// Everything one run produces, as handed to downstream renderers.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub project: Project,
    pub dependencies: DependencyGraph,
    pub interfaces: InterfaceAnalysis,
}

pub fn analyze(root_path: &Path) -> Result<Project> {
    Analyzer::default().analyze(root_path)
}

pub fn analyze_with_context(token: &CancellationToken, root_path: &Path) -> Result<Project> {
    Analyzer::default().analyze_with_context(token, root_path)
}

pub fn analyze_parallel(token: &CancellationToken, root_path: &Path, worker_count: usize) -> Result<Project> {
    Analyzer::default().analyze_parallel(token, root_path, worker_count)
}

pub fn analyze_dependencies(project: &Project) -> Result<DependencyGraph> {
    analysis::analyze_dependencies(project)
}

pub fn analyze_interfaces(project: &Project) -> Result<InterfaceAnalysis> {
    analysis::analyze_interfaces(project)
}

/// Parallel extraction followed by both structural analyses.
pub fn analyze_project(
    analyzer: &Analyzer,
    token: &CancellationToken,
    root_path: &Path,
    worker_count: usize,
) -> Result<AnalysisReport> {
    info!("Analyzing Go project at: {:?}", root_path);
    let project = analyzer.analyze_parallel(token, root_path, worker_count)?;

    debug!("Building dependency graph for module {}", project.module);
    let dependencies = analyze_dependencies(&project)?;

    debug!("Matching interfaces across {} packages", project.packages.len());
    let interfaces = analyze_interfaces(&project)?;

    Ok(AnalysisReport {
        project,
        dependencies,
        interfaces,
    })
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
