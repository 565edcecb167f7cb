//! Background lifecycle manager for the recognition backend.
//!
//! Constructing a [`ResourceLoader`] is cheap and non-blocking; the heavy
//! backend load runs on a dedicated thread and publishes its handle only
//! after the full load + warm-up succeeds. Callers poll readiness through
//! `is_ready` / `wait_until_ready` and fetch the shared handle with `handle`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, BoundingBox, RecognitionBackend};

/// Fixed poll interval for `wait_until_ready`.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Edge length of the synthetic grayscale probe used by warm-up and the
/// heavy health check.
const PROBE_SIZE: u32 = 160;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("recognition backend is not ready")]
    ResourceUnavailable,
}

/// Lifecycle of the process-wide backend load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Snapshot for the external health/monitoring surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// "healthy" | "initializing" | "unhealthy".
    pub status: &'static str,
    pub models_ready: bool,
    pub loading: bool,
    /// Unix timestamp (seconds) at which the snapshot was taken.
    pub timestamp: f64,
}

/// Produces a loaded backend. Runs on the loader's background thread; any
/// error (or panic) terminates that attempt in `Failed`.
pub type BackendFactory =
    dyn Fn() -> Result<Arc<dyn RecognitionBackend>, BackendError> + Send + Sync;

struct LoaderInner {
    state: ModelState,
    /// Wall-clock time of the last state transition.
    since: SystemTime,
    /// Published only when `state == Ready`.
    backend: Option<Arc<dyn RecognitionBackend>>,
    /// Bumped on every `initialize`; an attempt only publishes its result
    /// while it is still the newest generation.
    generation: u64,
}

/// Process-wide handle to the recognition backend lifecycle.
///
/// Construct once at composition time and pass by reference (or `Arc`) to
/// every component that needs readiness queries or the backend handle.
pub struct ResourceLoader {
    inner: Arc<Mutex<LoaderInner>>,
    factory: Arc<BackendFactory>,
    poll_interval: Duration,
}

impl ResourceLoader {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RecognitionBackend>, BackendError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(LoaderInner {
                state: ModelState::Uninitialized,
                since: SystemTime::now(),
                backend: None,
                generation: 0,
            })),
            factory: Arc::new(factory),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Shrink the poll interval. Intended for tests; the default is 200 ms.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoaderInner> {
        // A poisoned lock only means a previous holder panicked; the state
        // machine itself stays coherent, so keep going with the inner value.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start (or restart) the background load.
    ///
    /// A no-op while an attempt is already in flight, or once Ready, unless
    /// `force_restart` is set. A restart does not cancel a still-running
    /// prior attempt; the generation counter ensures only the newest
    /// attempt's result is published.
    pub fn initialize(&self, force_restart: bool) {
        let generation = {
            let mut inner = self.lock();
            match inner.state {
                ModelState::Loading if !force_restart => {
                    tracing::info!("backend initialization already in progress");
                    return;
                }
                ModelState::Ready if !force_restart => {
                    tracing::debug!("backend already loaded");
                    return;
                }
                _ => {}
            }
            inner.generation += 1;
            inner.state = ModelState::Loading;
            inner.since = SystemTime::now();
            inner.backend = None;
            inner.generation
        };

        let factory = Arc::clone(&self.factory);
        let shared = Arc::clone(&self.inner);

        let spawned = std::thread::Builder::new()
            .name("rollcall-loader".into())
            .spawn(move || {
                let started = Instant::now();
                tracing::info!(generation, "backend load started");

                let outcome = catch_unwind(AssertUnwindSafe(|| load_and_warm(&*factory)))
                    .unwrap_or_else(|_| {
                        Err(BackendError::LoadFailed("backend factory panicked".into()))
                    });

                let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
                if inner.generation != generation {
                    tracing::warn!(generation, "discarding result of stale load attempt");
                    return;
                }
                inner.since = SystemTime::now();
                match outcome {
                    Ok(backend) => {
                        inner.backend = Some(backend);
                        inner.state = ModelState::Ready;
                        tracing::info!(
                            generation,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "backend ready"
                        );
                    }
                    Err(err) => {
                        inner.backend = None;
                        inner.state = ModelState::Failed;
                        tracing::error!(generation, error = %err, "backend load failed");
                    }
                }
            });

        if let Err(err) = spawned {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.state = ModelState::Failed;
                inner.since = SystemTime::now();
            }
            tracing::error!(error = %err, "failed to spawn loader thread");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.lock().state
    }

    /// Wall-clock time of the last state transition.
    pub fn last_transition(&self) -> SystemTime {
        self.lock().since
    }

    /// Non-blocking readiness probe.
    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    /// Block until Ready, polling at a fixed interval.
    ///
    /// Returns `false` immediately once the attempt has terminated in
    /// `Failed`, or when `timeout` elapses. A zero timeout behaves exactly
    /// like [`is_ready`](Self::is_ready).
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.state() {
                ModelState::Ready => return true,
                ModelState::Failed => return false,
                ModelState::Uninitialized | ModelState::Loading => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Health probe. `light` consults only the cached readiness flag; the
    /// heavy variant additionally runs one trivial detection and one trivial
    /// classification against synthetic input. Never panics or propagates an
    /// error; every failure mode reports `false`.
    pub fn health_check(&self, light: bool) -> bool {
        let backend = {
            let inner = self.lock();
            if inner.state != ModelState::Ready {
                return false;
            }
            if light {
                return true;
            }
            inner.backend.clone()
        };
        let Some(backend) = backend else {
            return false;
        };

        let probed = catch_unwind(AssertUnwindSafe(|| probe_backend(&*backend)));
        match probed {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "heavy health check failed");
                false
            }
            Err(_) => {
                tracing::warn!("heavy health check panicked");
                false
            }
        }
    }

    /// Fetch the shared backend handle.
    pub fn handle(&self) -> Result<Arc<dyn RecognitionBackend>, LoaderError> {
        let inner = self.lock();
        if inner.state != ModelState::Ready {
            return Err(LoaderError::ResourceUnavailable);
        }
        inner
            .backend
            .clone()
            .ok_or(LoaderError::ResourceUnavailable)
    }

    /// Snapshot for the external health endpoint.
    pub fn status_report(&self) -> StatusReport {
        let inner = self.lock();
        let (status, models_ready, loading) = match inner.state {
            ModelState::Ready => ("healthy", true, false),
            ModelState::Loading => ("initializing", false, true),
            ModelState::Uninitialized | ModelState::Failed => ("unhealthy", false, false),
        };
        StatusReport {
            status,
            models_ready,
            loading,
            timestamp: unix_now(),
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Run the factory, then a minimal warm-up: one detect over a blank frame
/// and one predict over either the first reported face or the full frame.
fn load_and_warm(factory: &BackendFactory) -> Result<Arc<dyn RecognitionBackend>, BackendError> {
    let backend = factory()?;

    let blank = vec![0u8; (PROBE_SIZE * PROBE_SIZE) as usize];
    let faces = backend.detect(&blank, PROBE_SIZE, PROBE_SIZE)?;
    let face = faces.first().copied().unwrap_or(full_frame_box());
    backend.predict(&blank, PROBE_SIZE, PROBE_SIZE, &face)?;

    Ok(backend)
}

/// One trivial detect + one trivial predict over a random grayscale probe.
fn probe_backend(backend: &dyn RecognitionBackend) -> Result<(), BackendError> {
    let mut probe = vec![0u8; (PROBE_SIZE * PROBE_SIZE) as usize];
    rand::thread_rng().fill(&mut probe[..]);

    let faces = backend.detect(&probe, PROBE_SIZE, PROBE_SIZE)?;
    let face = faces.first().copied().unwrap_or(full_frame_box());
    backend.predict(&probe, PROBE_SIZE, PROBE_SIZE, &face)?;
    Ok(())
}

fn full_frame_box() -> BoundingBox {
    BoundingBox {
        x: 0.0,
        y: 0.0,
        width: PROBE_SIZE as f32,
        height: PROBE_SIZE as f32,
    }
}
