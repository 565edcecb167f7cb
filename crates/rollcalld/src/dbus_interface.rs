use std::sync::Arc;
use std::time::Duration;

use zbus::interface;

use rollcall_core::ResourceLoader;
use rollcall_store::Layout;

use crate::recorder::RecorderHandle;

/// D-Bus interface for the rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
pub struct AttendanceService {
    pub loader: Arc<ResourceLoader>,
    pub recorder: RecorderHandle,
    pub layout: Layout,
    pub default_session: Duration,
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Daemon health as a JSON document.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let report = self.loader.status_report();
        serde_json::to_string(&report)
            .map_err(|e| zbus::fdo::Error::Failed(format!("status serialization: {e}")))
    }

    /// Whether recognition resources are loaded and usable.
    async fn is_ready(&self) -> bool {
        self.loader.is_ready()
    }

    /// Liveness probe. A light check inspects state only; a heavy check also
    /// pushes a synthetic frame through the loaded backend.
    async fn health_check(&self, light: bool) -> zbus::fdo::Result<bool> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || loader.health_check(light))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("health probe task: {e}")))
    }

    /// Kick off a (re)load of recognition resources. Returns immediately;
    /// poll `Status` or `IsReady` for completion.
    async fn reload_models(&self, force_restart: bool) {
        tracing::info!(force_restart, "reload requested");
        self.loader.initialize(force_restart);
    }

    /// Run one capture window for `subject` and persist its session record.
    /// `duration_secs` of 0 uses the daemon's configured default. Returns a
    /// JSON summary of the session outcome.
    async fn start_session(&self, subject: &str, duration_secs: u64) -> zbus::fdo::Result<String> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("subject is empty".into()));
        }
        let duration = if duration_secs == 0 {
            self.default_session
        } else {
            Duration::from_secs(duration_secs)
        };
        tracing::info!(subject, duration_secs = duration.as_secs(), "session requested");

        let outcome = self
            .recorder
            .run_session(subject.to_string(), duration)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        serde_json::to_string(&outcome)
            .map_err(|e| zbus::fdo::Error::Failed(format!("outcome serialization: {e}")))
    }

    /// Ask the in-flight capture window to stop early. The partial session
    /// record is still persisted.
    async fn cancel_session(&self) {
        tracing::info!("session cancel requested");
        self.recorder.cancel();
    }

    /// Rebuild the consolidated attendance table for `subject` from its
    /// session records. Returns the path of the written table.
    async fn aggregate(&self, subject: &str) -> zbus::fdo::Result<String> {
        let subject = subject.trim().to_string();
        if subject.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("subject is empty".into()));
        }
        let layout = self.layout.clone();
        let (path, table) = tokio::task::spawn_blocking(move || {
            rollcall_store::aggregate_and_write(&layout, &subject)
        })
        .await
        .map_err(|e| zbus::fdo::Error::Failed(format!("aggregation task: {e}")))?
        .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            rows = table.rows.len(),
            "attendance table written"
        );
        Ok(path.display().to_string())
    }
}
