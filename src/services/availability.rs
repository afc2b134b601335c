use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::OnceCell;

use crate::{models::Availability, services::providers::StatusProbe};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session-long memo of per-video liveness
///
/// Each id gets its own once-cell, so a probe runs at most once per id even
/// when the foreground and a prefetch ask for it at the same moment; the
/// second caller waits on the first probe's result. Probe failures and
/// timeouts are stored as `Up` and never retried. Entries live until the
/// owning engine is replaced.
pub struct AvailabilityCache {
    probe: Arc<dyn StatusProbe>,
    timeout: Duration,
    entries: Mutex<HashMap<String, Arc<OnceCell<Availability>>>>,
}

impl AvailabilityCache {
    pub fn new(probe: Arc<dyn StatusProbe>) -> Self {
        Self::with_timeout(probe, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(probe: Arc<dyn StatusProbe>, timeout: Duration) -> Self {
        Self {
            probe,
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Memoized liveness, probing on first lookup
    pub async fn availability(&self, id: &str) -> Availability {
        let cell = self.cell(id);
        if let Some(known) = cell.get() {
            tracing::debug!(video_id = %id, availability = %known, "Cache hit");
            return *known;
        }

        *cell.get_or_init(|| self.run_probe(id)).await
    }

    pub async fn is_down(&self, id: &str) -> bool {
        self.availability(id).await.is_down()
    }

    /// Memoized value without probing; `None` when nothing is settled yet
    pub fn known(&self, id: &str) -> Option<Availability> {
        self.lock()
            .get(id)
            .and_then(|cell| cell.get().copied())
    }

    pub fn known_down(&self, id: &str) -> bool {
        self.known(id).is_some_and(Availability::is_down)
    }

    /// Number of ids with a settled value
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, id: &str) -> Arc<OnceCell<Availability>> {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Availability>>>> {
        // entries are only ever inserted whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_probe(&self, id: &str) -> Availability {
        tracing::debug!(video_id = %id, probe = self.probe.name(), "Cache miss, probing");

        match tokio::time::timeout(self.timeout, self.probe.probe(id)).await {
            Ok(Ok(Availability::Unknown)) | Ok(Ok(Availability::Up)) => Availability::Up,
            Ok(Ok(Availability::Down)) => {
                tracing::info!(video_id = %id, "Video is down");
                Availability::Down
            }
            Ok(Err(e)) => {
                tracing::warn!(video_id = %id, error = %e, "Status probe failed, assuming up");
                Availability::Up
            }
            Err(_) => {
                tracing::warn!(
                    video_id = %id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Status probe timed out, assuming up"
                );
                Availability::Up
            }
        }
    }
}
