//! Symptom timeline: an append-only list of health log entries, newest first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::backend::{Backend, BackendError};
use crate::models::{HealthLogEntry, MAX_SEVERITY, MIN_SEVERITY};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Describe the symptom first")]
    EmptyDescription,

    #[error("Severity must be between {MIN_SEVERITY} and {MAX_SEVERITY}, got {0}")]
    SeverityOutOfRange(u8),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct HealthTimeline {
    backend: Arc<dyn Backend>,
    entries: Mutex<Vec<HealthLogEntry>>,
}

impl HealthTimeline {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries_mut(&self) -> MutexGuard<'_, Vec<HealthLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self) -> Vec<HealthLogEntry> {
        self.entries_mut().clone()
    }

    pub async fn refresh(&self) -> Result<Vec<HealthLogEntry>, TimelineError> {
        let mut logs = self.backend.health_logs().await?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        tracing::debug!(count = logs.len(), "Health log refreshed");
        *self.entries_mut() = logs.clone();
        Ok(logs)
    }

    pub async fn record(
        &self,
        description: &str,
        severity: u8,
    ) -> Result<HealthLogEntry, TimelineError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TimelineError::EmptyDescription);
        }
        if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&severity) {
            return Err(TimelineError::SeverityOutOfRange(severity));
        }

        let entry = self.backend.create_health_log(description, severity).await?;
        tracing::info!(id = %entry.id, severity, "Symptom logged");
        self.entries_mut().insert(0, entry.clone());
        Ok(entry)
    }
}
