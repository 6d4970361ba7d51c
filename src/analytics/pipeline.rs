//! Asynchronous click pipeline.
//!
//! `notify` is fire-and-forget: it pushes the payload onto a bounded queue
//! and returns immediately, so the redirect response never waits on
//! analytics. A pool of workers drains the queue and drives each click
//! through Resolving -> Enriching -> Persisting; persistence failures are
//! retried with exponential backoff and then dropped. Click loss is an
//! accepted failure mode; nothing here surfaces to the visitor.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::analytics::enricher::{
    is_bot, referer_domain, DeviceGeoEnricher, EdgeGeoHeaders, Enrichment,
};
use crate::storages::{ClickEvent, ClickMetadata, LinkStore, ShortLink};

/// Raw click notification captured on the redirect path.
#[derive(Debug, Clone, Default)]
pub struct ClickPayload {
    pub code: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub language: Option<String>,
    /// Edge geo headers captured at request time; the pipeline runs after
    /// the response is gone, so these cannot be re-read later.
    pub edge_geo: Option<EdgeGeoHeaders>,
}

impl ClickPayload {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// Exponential backoff: `base * 2^attempt`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: usize) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt as u32)
    }
}

/// Terminal state of one click notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Tracked { click_id: String },
    /// The code never resolved; retrying cannot help.
    LinkNotFound,
    /// Persistence failed after all retries; the click is lost.
    Dropped,
}

/// Processes a single click end to end. Shared by all pipeline workers and
/// usable directly in tests.
pub struct ClickTracker {
    store: Arc<dyn LinkStore>,
    enricher: Arc<DeviceGeoEnricher>,
    retry: RetryPolicy,
    persist_timeout: Duration,
}

impl ClickTracker {
    pub fn new(
        store: Arc<dyn LinkStore>,
        enricher: Arc<DeviceGeoEnricher>,
        retry: RetryPolicy,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            enricher,
            retry,
            persist_timeout,
        }
    }

    pub async fn track(&self, payload: ClickPayload) -> TrackOutcome {
        // Resolving
        let link = match self.store.find_by_code(&payload.code).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!("Click for unknown code {}, dropping", payload.code);
                return TrackOutcome::LinkNotFound;
            }
            Err(e) => {
                warn!("Click resolution failed for {}: {}", payload.code, e);
                return TrackOutcome::Dropped;
            }
        };

        // Enriching always proceeds, partial geo is fine
        let enrichment = self
            .enricher
            .enrich(
                payload.user_agent.as_deref(),
                payload.ip.as_deref().unwrap_or(""),
                payload.edge_geo.as_ref(),
            )
            .await;

        let event = Self::build_event(&link, &payload, enrichment);
        let click_id = event.id.clone();

        // Persisting, with bounded retry. One insert per attempt; a success
        // ends the loop, so a retried click yields exactly one record.
        for attempt in 0..self.retry.max_attempts {
            match timeout(self.persist_timeout, self.store.insert_click(event.clone())).await {
                Ok(Ok(())) => {
                    debug!("Click tracked for {} ({})", payload.code, click_id);
                    return TrackOutcome::Tracked { click_id };
                }
                Ok(Err(e)) => {
                    warn!(
                        "Click persist attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        payload.code,
                        e
                    );
                }
                Err(_) => {
                    warn!(
                        "Click persist attempt {}/{} timed out for {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        payload.code
                    );
                }
            }

            if attempt + 1 < self.retry.max_attempts {
                sleep(self.retry.delay(attempt)).await;
            }
        }

        error!(
            "Failed to persist click for {} after {} attempts, dropping",
            payload.code, self.retry.max_attempts
        );
        TrackOutcome::Dropped
    }

    fn build_event(link: &ShortLink, payload: &ClickPayload, enrichment: Enrichment) -> ClickEvent {
        let geo = enrichment.geo;
        let device = enrichment.device;

        ClickEvent {
            id: Uuid::new_v4().to_string(),
            link_id: link.id.clone(),
            ip_address: payload.ip.clone(),
            user_agent: payload.user_agent.clone(),
            referer: payload.referer.clone(),
            country: geo.country,
            city: geo.city,
            region: geo.region,
            timezone: geo.timezone,
            device: device.as_ref().map(|d| d.device.clone()),
            browser: device.as_ref().map(|d| d.browser.clone()),
            os: device.as_ref().map(|d| d.os.clone()),
            created_at: chrono::Utc::now(),
            metadata: ClickMetadata {
                referer_domain: payload.referer.as_deref().and_then(referer_domain),
                language: payload.language.clone(),
                is_bot: payload.user_agent.as_deref().map(is_bot).unwrap_or(false),
                isp: geo.isp,
                org: geo.org,
                asn: geo.asn,
            },
        }
    }
}

/// Bounded queue + worker pool in front of a [`ClickTracker`].
#[derive(Clone)]
pub struct ClickPipeline {
    tx: mpsc::Sender<ClickPayload>,
    handles: Arc<StdMutex<Vec<JoinHandle<()>>>>,
}

impl ClickPipeline {
    /// Spawn the worker pool. Workers run until every pipeline handle has
    /// been dropped or [`shutdown`](Self::shutdown) is called.
    pub fn spawn(tracker: ClickTracker, queue_capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<ClickPayload>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let tracker = Arc::new(tracker);

        let mut handles = Vec::new();
        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                loop {
                    let payload = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    match payload {
                        Some(payload) => {
                            trace!("Worker {} processing click for {}", worker_id, payload.code);
                            tracker.track(payload).await;
                        }
                        None => break,
                    }
                }
                debug!("Click worker {} stopped", worker_id);
            }));
        }

        Self {
            tx,
            handles: Arc::new(StdMutex::new(handles)),
        }
    }

    /// Fire-and-forget notification. Never blocks; a full queue drops the
    /// click with a warning.
    pub fn notify(&self, payload: ClickPayload) {
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                warn!("Click queue full, dropping click for {}", payload.code);
            }
            Err(TrySendError::Closed(payload)) => {
                warn!("Click pipeline closed, dropping click for {}", payload.code);
            }
        }
    }

    /// Close the queue and wait for the workers to drain it. Consumes the
    /// pipeline; other clones must be dropped for the workers to stop.
    pub async fn shutdown(self) {
        let Self { tx, handles } = self;
        drop(tx);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = handles.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
