use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::indexing::cancel::CancellationToken;
use crate::indexing::conventions::ConventionDetector;
use crate::indexing::extractor::extract_package;
use crate::indexing::framework::{detect_framework, detect_module};
use crate::indexing::logger::{AnalysisLogger, LogFacade};
use crate::model::{ConventionTarget, Package, Project};
use crate::parsers::is_hidden_name;
use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError};
use log::Level;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// How long the aggregator waits on results before re-checking cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One directory to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub dir: PathBuf,
    pub import_path: String,
}

type UnitResult = (WorkUnit, Result<Option<Package>>);

pub struct Analyzer {
    config: AnalyzerConfig,
    logger: Arc<dyn AnalysisLogger>,
    conventions: Option<Arc<dyn ConventionDetector>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Analyzer {
            config,
            logger: Arc::new(LogFacade),
            conventions: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn AnalysisLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_convention_detector(mut self, detector: Arc<dyn ConventionDetector>) -> Self {
        self.conventions = Some(detector);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, root: &Path) -> Result<Project> {
        self.analyze_with_context(&CancellationToken::new(), root)
    }

    /// Sequential analysis on the calling thread.
    pub fn analyze_with_context(&self, token: &CancellationToken, root: &Path) -> Result<Project> {
        let started = Instant::now();
        let (mut project, units) = self.prepare(token, root)?;
        self.log(Level::Info, format!("Analyzing {} directories sequentially", units.len()));

        for unit in units {
            token.check()?;
            let result = extract_package(&unit.dir, &unit.import_path, self.config.include_tests);
            self.record(&mut project, unit, result);
        }

        token.check()?;
        Ok(self.finish(project, started))
    }

    /// Fans directories out to `worker_count` workers (0 selects the
    /// configured default) and aggregates on the calling thread.
    pub fn analyze_parallel(
        &self,
        token: &CancellationToken,
        root: &Path,
        worker_count: usize,
    ) -> Result<Project> {
        let started = Instant::now();
        let (mut project, units) = self.prepare(token, root)?;

        let workers = self.config.workers_for(Some(worker_count));
        let capacity = self.config.effective_queue_capacity(workers);

        self.log(
            Level::Info,
            format!(
                "Analyzing {} directories with {} workers (queue capacity {})",
                units.len(),
                workers,
                capacity
            ),
        );

        // One extra thread for the producer
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers + 1)
            .thread_name(|i| format!("gomodel-worker-{}", i))
            .build()
            .map_err(|e| AnalysisError::WorkerPool(e.to_string()))?;

        let (task_tx, task_rx) = channel::bounded::<WorkUnit>(capacity);
        let (result_tx, result_rx) = channel::bounded::<UnitResult>(capacity);
        let include_tests = self.config.include_tests;

        let aggregated = pool.in_place_scope(|scope| {
            let producer_token = token.clone();
            scope.spawn(move |_| {
                for unit in units {
                    if producer_token.is_cancelled() || task_tx.send(unit).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let worker_token = token.clone();
                scope.spawn(move |_| {
                    for unit in task_rx.iter() {
                        if worker_token.is_cancelled() {
                            break;
                        }
                        let result = extract_package(&unit.dir, &unit.import_path, include_tests);
                        if result_tx.send((unit, result)).is_err() {
                            break;
                        }
                    }
                });
            }

            // Only workers hold these now; the result queue closes when they finish
            drop(task_rx);
            drop(result_tx);

            self.aggregate(token, &mut project, result_rx)
        });

        aggregated?;
        token.check()?;
        Ok(self.finish(project, started))
    }

    fn prepare(&self, token: &CancellationToken, root: &Path) -> Result<(Project, Vec<WorkUnit>)> {
        token.check()?;

        if !root.is_dir() {
            return Err(AnalysisError::InvalidRoot(root.to_path_buf()));
        }

        let module = detect_module(root);
        let mut project = Project::new(root, module.clone());
        project.framework = detect_framework(root);
        if let Some(framework) = &project.framework {
            self.log(
                Level::Info,
                format!("Detected {} application descriptor {:?}", framework.framework, framework.descriptor),
            );
        }

        let units = self.enumerate(root, &module);
        Ok((project, units))
    }

    /// Every directory under `root` that survives the ignore list, root first.
    pub fn enumerate(&self, root: &Path, module: &str) -> Vec<WorkUnit> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_pruned(entry));

        let mut units = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.log(Level::Warn, format!("Skipping unreadable entry: {}", e));
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.into_path();
            let import_path = import_path_for(root, &dir, module);
            units.push(WorkUnit { dir, import_path });
        }

        units
    }

    fn is_pruned(&self, entry: &walkdir::DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        self.config.is_ignored_dir(&name) || (self.config.skip_hidden && is_hidden_name(&name))
    }

    fn aggregate(
        &self,
        token: &CancellationToken,
        project: &mut Project,
        results: Receiver<UnitResult>,
    ) -> Result<()> {
        loop {
            match results.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok((unit, result)) => {
                    // Results that arrive after cancellation are discarded
                    token.check()?;
                    self.record(project, unit, result);
                }
                Err(RecvTimeoutError::Timeout) => token.check()?,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn record(&self, project: &mut Project, unit: WorkUnit, result: Result<Option<Package>>) {
        match result {
            Ok(Some(mut package)) => {
                if let Some(detector) = &self.conventions {
                    package.conventions = detector.detect(&package);
                    annotate_conventions(&mut package);
                }
                self.log(
                    Level::Debug,
                    format!("Package {} at {:?}", package.import_path, unit.dir),
                );
                project.packages.push(package);
            }
            Ok(None) => self.log(Level::Trace, format!("No package in {:?}", unit.dir)),
            Err(e) => self.log(Level::Warn, format!("Skipping {:?}: {}", unit.dir, e)),
        }
    }

    fn finish(&self, mut project: Project, started: Instant) -> Project {
        project
            .packages
            .sort_by(|a, b| a.import_path.cmp(&b.import_path));

        self.log(
            Level::Info,
            format!(
                "Analyzed {} packages ({} types, {} functions) in {:.2?}",
                project.packages.len(),
                project.type_count(),
                project.function_count(),
                started.elapsed()
            ),
        );

        project
    }

    fn log(&self, level: Level, message: String) {
        self.logger.log(level, &message);
    }
}

/// Copies detected conventions onto the tagged declarations.
fn annotate_conventions(package: &mut Package) {
    for convention in &package.conventions {
        match convention.kind {
            ConventionTarget::Type => {
                if let Some(ty) = package.types.iter_mut().find(|t| t.name == convention.target) {
                    ty.convention = Some(convention.name.clone());
                }
            }
            ConventionTarget::Function => {
                if let Some(function) = package
                    .functions
                    .iter_mut()
                    .find(|f| !f.is_method() && f.name == convention.target)
                {
                    function.convention = Some(convention.name.clone());
                }
            }
        }
    }
}

/// `module` for the root, `module/rel/path` below it.
pub fn import_path_for(root: &Path, dir: &Path, module: &str) -> String {
    let relative: Vec<String> = dir
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    if relative.is_empty() {
        module.to_string()
    } else if module.is_empty() {
        relative.join("/")
    } else {
        format!("{}/{}", module, relative.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::logger::MemoryLogger;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn import_paths_join_module_and_relative_dir() {
        let root = Path::new("/src/shop");
        assert_eq!(import_path_for(root, root, "example.com/shop"), "example.com/shop");
        assert_eq!(
            import_path_for(root, &root.join("internal/repo"), "example.com/shop"),
            "example.com/shop/internal/repo"
        );
        assert_eq!(import_path_for(root, &root.join("cmd"), ""), "cmd");
    }

    #[test]
    fn enumeration_prunes_ignored_and_hidden_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in ["api", "vendor/lib", ".git/objects", ".cache/x", "internal/store", "node_modules/m"] {
            fs::create_dir_all(root.join(rel)).unwrap();
        }

        let analyzer = Analyzer::default();
        let units = analyzer.enumerate(root, "example.com/app");
        let paths: Vec<&str> = units.iter().map(|u| u.import_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["example.com/app", "example.com/app/api", "example.com/app/internal", "example.com/app/internal/store"]
        );

        let permissive = Analyzer::new(AnalyzerConfig::default().with_skip_hidden(false));
        let units = permissive.enumerate(root, "example.com/app");
        assert!(units.iter().any(|u| u.import_path.ends_with(".cache/x")));
        assert!(!units.iter().any(|u| u.import_path.contains("vendor")));
    }

    #[test]
    fn broken_directory_is_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "go.mod", "module example.com/app\n");
        write(root, "good/good.go", "package good\n\nfunc Fine() {}\n");
        write(root, "bad/bad.go", "package bad\n\nfunc (\n");

        let logger = Arc::new(MemoryLogger::new());
        let analyzer = Analyzer::default().with_logger(logger.clone());

        let sequential = analyzer.analyze(root).unwrap();
        assert_eq!(sequential.packages.len(), 1);
        assert_eq!(sequential.packages[0].import_path, "example.com/app/good");

        let parallel = analyzer
            .analyze_parallel(&CancellationToken::new(), root, 2)
            .unwrap();
        assert_eq!(parallel.packages.len(), 1);

        let warnings = logger.messages_at(Level::Warn);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.contains("bad")));
    }

    #[test]
    fn invalid_root_is_rejected() {
        let err = Analyzer::default()
            .analyze(Path::new("/definitely/not/a/go/project"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRoot(_)));
    }
}
