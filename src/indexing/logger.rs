use log::Level;
use std::sync::Mutex;

/// Diagnostic sink handed to the orchestrator instead of a process-wide logger.
pub trait AnalysisLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl AnalysisLogger for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "relik_gomodel::analyzer", level, "{}", message);
    }
}

/// Keeps records in memory; each instance is independent of every other.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl AnalysisLogger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}
