use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "vendor",
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "bin",
    "build",
    "dist",
    "out",
    "target",
    "testdata",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub ignore_dirs: Vec<String>,
    pub skip_hidden: bool,
    /// 0 selects the number of available CPUs.
    pub worker_count: usize,
    /// 0 selects twice the worker count.
    pub queue_capacity: usize,
    pub include_tests: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            skip_hidden: true,
            worker_count: 0,
            queue_capacity: 0,
            include_tests: false,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.ignore_dirs.push(dir.into());
        self
    }

    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    pub fn with_include_tests(mut self, include_tests: bool) -> Self {
        self.include_tests = include_tests;
        self
    }

    pub fn effective_workers(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_count
        }
    }

    /// An explicit nonzero request wins over the configured count.
    pub fn workers_for(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(workers) if workers > 0 => workers,
            _ => self.effective_workers(),
        }
    }

    /// Queue bound for `workers` workers.
    pub fn effective_queue_capacity(&self, workers: usize) -> usize {
        if self.queue_capacity == 0 {
            workers.max(1) * 2
        } else {
            self.queue_capacity
        }
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_falls_back_to_cpu_count() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.effective_workers(), num_cpus::get().max(1));
        assert_eq!(config.effective_queue_capacity(config.effective_workers()), config.effective_workers() * 2);
        assert_eq!(config.with_worker_count(3).effective_workers(), 3);
    }

    #[test]
    fn configured_workers_apply_without_an_explicit_request() {
        let config = AnalyzerConfig::default().with_worker_count(6);
        assert_eq!(config.workers_for(None), 6);
        assert_eq!(config.workers_for(Some(0)), 6);
        assert_eq!(config.workers_for(Some(2)), 2);
        assert_eq!(AnalyzerConfig::default().workers_for(None), num_cpus::get().max(1));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gomodel.json");
        std::fs::write(&path, r#"{ "worker_count": 4, "include_tests": true }"#).unwrap();

        let config = AnalyzerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.worker_count, 4);
        assert!(config.include_tests);
        assert!(config.skip_hidden);
        assert!(config.is_ignored_dir("vendor"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AnalyzerConfig::from_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }
}
