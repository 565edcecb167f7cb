//! Session recorder engine.
//!
//! One dedicated OS thread drives capture windows, one at a time. Each
//! request opens a fresh frame source that the loop owns exclusively and
//! releases on every exit path (normal, cancelled, or failed). The loader
//! must report Ready before a window starts; the session record is written
//! exactly once, even when nobody was recognized.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_capture::{CaptureError, FrameSource};
use rollcall_core::{resolve, LoaderError, Prediction, Resolution, ResourceLoader};
use rollcall_store::{Layout, SessionRecord, StoreError};

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error(transparent)]
    Resource(#[from] LoaderError),
    #[error("capture device error: {0}")]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("recorder thread exited")]
    ChannelClosed,
}

/// Result of one capture window.
#[derive(Debug, Serialize)]
pub struct SessionOutcome {
    /// Where the session record was written.
    pub path: PathBuf,
    /// Distinct identities marked present.
    pub recognized: usize,
    /// Frames processed within the window.
    pub frames: usize,
}

/// Opens the capture device for one session. Called on the engine thread;
/// the returned source is dropped before the session record is written.
pub type SourceFactory = dyn Fn() -> Result<Box<dyn FrameSource>, CaptureError> + Send + Sync;

/// Tunables fixed at spawn time.
pub struct RecorderConfig {
    pub confidence_threshold: f32,
    pub warmup_frames: usize,
}

enum RecorderRequest {
    Run {
        subject: String,
        duration: Duration,
        reply: oneshot::Sender<Result<SessionOutcome, RecorderError>>,
    },
}

/// Clone-safe handle to the recorder thread.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderRequest>,
    cancel: Arc<AtomicBool>,
}

impl RecorderHandle {
    /// Run one bounded capture window and persist its session record.
    pub async fn run_session(
        &self,
        subject: String,
        duration: Duration,
    ) -> Result<SessionOutcome, RecorderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderRequest::Run {
                subject,
                duration,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RecorderError::ChannelClosed)?;
        reply_rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Ask the in-flight session to stop. Cooperative: the loop checks the
    /// flag once per frame, then persists what it has.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Spawn the recorder on a dedicated OS thread.
pub fn spawn_recorder(
    loader: Arc<ResourceLoader>,
    layout: Layout,
    source_factory: Arc<SourceFactory>,
    config: RecorderConfig,
) -> RecorderHandle {
    let (tx, mut rx) = mpsc::channel::<RecorderRequest>(4);
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let spawned = std::thread::Builder::new()
        .name("rollcall-recorder".into())
        .spawn(move || {
            tracing::info!("recorder thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    RecorderRequest::Run {
                        subject,
                        duration,
                        reply,
                    } => {
                        worker_cancel.store(false, Ordering::SeqCst);
                        let result = run_session(
                            &loader,
                            &layout,
                            &*source_factory,
                            &config,
                            &subject,
                            duration,
                            &worker_cancel,
                        );
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("recorder thread exiting");
        });
    if let Err(err) = spawned {
        tracing::error!(error = %err, "failed to spawn recorder thread");
    }

    RecorderHandle { tx, cancel }
}

/// Drive one capture window and write its session record.
fn run_session(
    loader: &ResourceLoader,
    layout: &Layout,
    source_factory: &SourceFactory,
    config: &RecorderConfig,
    subject: &str,
    duration: Duration,
    cancel: &AtomicBool,
) -> Result<SessionOutcome, RecorderError> {
    // Readiness gate before the device is ever touched.
    let backend = loader.handle()?;

    let roster = rollcall_store::load_roster(&layout.roster_path())?;
    let labels = rollcall_store::load_label_map(&layout.label_map_path())?;
    tracing::info!(
        subject,
        roster = roster.len(),
        labels = labels.len(),
        duration_secs = duration.as_secs(),
        "session starting"
    );

    let mut record = SessionRecord::new(subject, chrono::Local::now().naive_local());

    // Scoped acquisition: `source` is dropped on every path out of this
    // function, including the error returns inside the loop.
    let mut source = source_factory()?;
    source.warm_up(config.warmup_frames);

    let deadline = Instant::now() + duration;
    let mut frames = 0usize;

    while Instant::now() < deadline {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(subject, frames, "session cancelled");
            break;
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(CaptureError::StreamEnded) => {
                tracing::info!(subject, frames, "frame stream ended");
                break;
            }
            Err(err) => return Err(err.into()),
        };
        frames += 1;

        let faces = match backend.detect(&frame.data, frame.width, frame.height) {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(error = %err, sequence = frame.sequence, "detection failed; skipping frame");
                continue;
            }
        };

        for face in &faces {
            let prediction = backend
                .predict(&frame.data, frame.width, frame.height, face)
                .unwrap_or_else(|err| {
                    tracing::debug!(error = %err, "prediction failed; treating face as unknown");
                    Prediction {
                        label: None,
                        confidence: f32::MAX,
                    }
                });

            match resolve(
                prediction.label,
                prediction.confidence,
                &labels,
                &roster,
                config.confidence_threshold,
            ) {
                Resolution::Identified { enrollment, name } => {
                    if record.mark_present(&enrollment, &name) {
                        tracing::info!(
                            enrollment = %enrollment,
                            name = %name,
                            confidence = prediction.confidence,
                            "marked present"
                        );
                    }
                }
                Resolution::Unknown => {}
            }
        }
    }

    drop(source);

    let path = rollcall_store::write_session(&layout.subject_dir(subject), &record)?;
    Ok(SessionOutcome {
        path,
        recognized: record.len(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_capture::ScriptedSource;
    use rollcall_core::{RecognitionBackend, ScriptedBackend, SyntheticBackend};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(2);

    fn ready_loader(backend: Arc<dyn RecognitionBackend>) -> Arc<ResourceLoader> {
        let loader = Arc::new(
            ResourceLoader::new(move || Ok(Arc::clone(&backend)))
                .with_poll_interval(Duration::from_millis(10)),
        );
        loader.initialize(false);
        assert!(loader.wait_until_ready(WAIT));
        loader
    }

    fn seeded_layout(dir: &TempDir) -> Layout {
        let layout = Layout::new(dir.path());
        rollcall_store::register(&layout.roster_path(), "E001", "Alice").unwrap();
        rollcall_store::register(&layout.roster_path(), "E002", "Bob").unwrap();
        let mut map = rollcall_core::LabelMap::new();
        map.insert(0, "E001");
        map.insert(1, "E002");
        rollcall_store::write_label_map(&layout.label_map_path(), &map).unwrap();
        layout
    }

    fn config() -> RecorderConfig {
        RecorderConfig {
            confidence_threshold: 70.0,
            warmup_frames: 0,
        }
    }

    fn scripted_factory(frames: usize) -> Arc<SourceFactory> {
        Arc::new(move || Ok(Box::new(ScriptedSource::blank(frames, 8, 8)) as Box<dyn FrameSource>))
    }

    fn pred(label: u32, confidence: f32) -> Prediction {
        Prediction {
            label: Some(label),
            confidence,
        }
    }

    #[test]
    fn session_resolves_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);

        // E001 twice (second ignored), E002 once, one above-threshold face.
        let backend = Arc::new(ScriptedBackend::from_predictions(vec![
            vec![pred(0, 30.0)],
            vec![pred(0, 20.0), pred(2, 95.0)],
            vec![pred(1, 10.0)],
        ]));
        let loader = ready_loader(backend);

        let outcome = run_session(
            &loader,
            &layout,
            &*scripted_factory(3),
            &config(),
            "physics",
            Duration::from_secs(30),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(outcome.recognized, 2);
        assert_eq!(outcome.frames, 3);

        let loaded = rollcall_store::read_session(&outcome.path).unwrap();
        let enrollments: Vec<&str> =
            loaded.rows.iter().map(|r| r.enrollment.as_str()).collect();
        assert_eq!(enrollments, vec!["E001", "E002"]);
    }

    #[test]
    fn empty_session_still_persists() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);
        let loader = ready_loader(Arc::new(SyntheticBackend));

        let outcome = run_session(
            &loader,
            &layout,
            &*scripted_factory(4),
            &config(),
            "physics",
            Duration::from_secs(30),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(outcome.recognized, 0);
        assert!(outcome.path.exists());
        let loaded = rollcall_store::read_session(&outcome.path).unwrap();
        assert!(loaded.rows.is_empty());
        assert_eq!(loaded.date_columns.len(), 1);
    }

    #[test]
    fn not_ready_fails_before_opening_device() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);
        let loader = Arc::new(ResourceLoader::new(|| {
            Ok(Arc::new(SyntheticBackend) as Arc<dyn RecognitionBackend>)
        }));
        // Never initialized: Uninitialized, not Ready.

        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let factory: Arc<SourceFactory> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSource::blank(1, 8, 8)) as Box<dyn FrameSource>)
        });

        let err = run_session(
            &loader,
            &layout,
            &*factory,
            &config(),
            "physics",
            Duration::from_secs(1),
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RecorderError::Resource(LoaderError::ResourceUnavailable)
        ));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_persists_partial_record() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);
        let loader = ready_loader(Arc::new(SyntheticBackend));

        // Flag already set: the loop exits before its first frame but the
        // record is still written.
        let outcome = run_session(
            &loader,
            &layout,
            &*scripted_factory(100),
            &config(),
            "physics",
            Duration::from_secs(3600),
            &AtomicBool::new(true),
        )
        .unwrap();

        assert_eq!(outcome.frames, 0);
        assert!(outcome.path.exists());
    }

    #[test]
    fn capture_failure_aborts_without_record() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);
        let loader = ready_loader(Arc::new(SyntheticBackend));

        let factory: Arc<SourceFactory> = Arc::new(|| {
            Err(CaptureError::DeviceNotFound("/dev/video9".into()))
        });

        let err = run_session(
            &loader,
            &layout,
            &*factory,
            &config(),
            "physics",
            Duration::from_secs(1),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(matches!(err, RecorderError::Capture(_)));
        assert!(!layout.subject_dir("physics").exists());
    }

    #[test]
    fn warmup_frames_do_not_reach_the_backend() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);

        // Only the post-warm-up frame carries the scripted face.
        let backend = Arc::new(ScriptedBackend::from_predictions(vec![
            vec![pred(0, 30.0)],
        ]));
        let loader = ready_loader(backend);

        let mut recorder_config = config();
        recorder_config.warmup_frames = 2;

        // 3 scripted frames: 2 discarded by warm-up, 1 processed.
        let outcome = run_session(
            &loader,
            &layout,
            &*scripted_factory(3),
            &recorder_config,
            "physics",
            Duration::from_secs(30),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(outcome.frames, 1);
        assert_eq!(outcome.recognized, 1);
    }

    #[tokio::test]
    async fn handle_round_trip() {
        let dir = TempDir::new().unwrap();
        let layout = seeded_layout(&dir);
        let loader = ready_loader(Arc::new(SyntheticBackend));

        let handle = spawn_recorder(
            loader,
            layout,
            scripted_factory(2),
            config(),
        );

        let outcome = handle
            .run_session("chemistry".into(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome.frames, 2);
        assert!(outcome.path.exists());
    }
}
