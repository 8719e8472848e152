//! Bounded registry of recently produced artifacts.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use mdeck_models::Artifact;

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Keeps the N most recent artifacts, newest first. Recording a new entry
/// beyond capacity evicts the oldest.
#[derive(Debug)]
pub struct ArtifactRegistry {
    capacity: usize,
    entries: Mutex<VecDeque<Artifact>>,
}

impl ArtifactRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Registry sized by the engine configuration, pre-seeded with the
    /// most recent files from the configured output directory.
    pub fn from_config(config: &EngineConfig) -> Self {
        let registry = Self::new(config.registry_capacity);
        if let Some(dir) = &config.output_dir {
            if let Ok(existing) = Self::scan_dir(dir, config.registry_capacity) {
                // scan_dir returns newest first; record in reverse so the
                // newest ends up at the front.
                for artifact in existing.into_iter().rev() {
                    registry.record(artifact);
                }
            }
        }
        registry
    }

    pub fn record(&self, artifact: Artifact) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if self.capacity == 0 {
            return;
        }
        if entries.len() == self.capacity {
            entries.pop_back();
        }
        entries.push_front(artifact);
    }

    /// Record a file on disk by path.
    pub fn record_path(&self, path: impl AsRef<Path>) -> EngineResult<Artifact> {
        let artifact = Artifact::from_path(path)?;
        self.record(artifact.clone());
        Ok(artifact)
    }

    /// Current entries, newest first.
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan a directory for existing files, newest first by modification
    /// time, capped at `limit`. Used to seed the registry on startup.
    pub fn scan_dir(dir: impl AsRef<Path>, limit: usize) -> EngineResult<Vec<Artifact>> {
        let mut artifacts: Vec<Artifact> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Ok(artifact) = Artifact::from_path(entry.path()) {
                    artifacts.push(artifact);
                }
            }
        }
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        artifacts.truncate(limit);
        Ok(artifacts)
    }
}
